//! `hrd`: run HRProfiler for homologous recombination deficiency analysis.
//!
//! Parses the run parameters, echoes them, and hands one request to the
//! Python `HRProfiler` package. Any analysis failure exits with status 1.

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use hrd_runner::core::params::{
    CnvFileType, DEFAULT_GENOME, DEFAULT_HRD_THRESHOLD, DEFAULT_NREPLICATES, Organ, RunParams,
    parse_threshold,
};
use hrd_runner::driver::{RunOutcome, run_profiler};
use hrd_runner::exit_codes;
use hrd_runner::io::analysis::HrProfilerBackend;
use hrd_runner::io::config::{DEFAULT_CONFIG_PATH, load_config};
use hrd_runner::logging;

#[derive(Parser, Debug)]
#[command(
    name = "hrd",
    version,
    about = "Run HRProfiler for Homologous Recombination Deficiency analysis"
)]
struct Cli {
    /// Directory with filtered VCF files
    #[arg(long, value_name = "PATH")]
    snv_dir: PathBuf,

    /// Directory with segment files
    #[arg(long, value_name = "PATH")]
    cnv_dir: PathBuf,

    /// Directory to save results
    #[arg(long, value_name = "PATH")]
    output_dir: PathBuf,

    /// CNV file type
    #[arg(long, value_enum, default_value_t = CnvFileType::Ascat)]
    cnv_file_type: CnvFileType,

    /// Organ type for prediction
    #[arg(long, value_enum, default_value_t = Organ::Breast)]
    organ: Organ,

    /// Reference genome version
    #[arg(long, default_value = DEFAULT_GENOME)]
    genome: String,

    /// HRD probability threshold
    #[arg(
        long,
        default_value_t = DEFAULT_HRD_THRESHOLD,
        value_parser = parse_threshold,
        allow_negative_numbers = true
    )]
    hrd_threshold: f64,

    /// Number of bootstrap replicates
    #[arg(long, default_value_t = DEFAULT_NREPLICATES)]
    nreplicates: u32,

    /// Backend configuration file (TOML); missing file means defaults
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Print the analysis request as JSON instead of running it
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    fn params(&self) -> RunParams {
        RunParams {
            snv_dir: self.snv_dir.clone(),
            cnv_dir: self.cnv_dir.clone(),
            output_dir: self.output_dir.clone(),
            cnv_file_type: self.cnv_file_type,
            organ: self.organ,
            genome: self.genome.clone(),
            hrd_threshold: self.hrd_threshold,
            nreplicates: self.nreplicates,
        }
    }
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(outcome) => std::process::exit(outcome.exit_code()),
        Err(err) => {
            eprintln!("error: {:#}", err);
            std::process::exit(exit_codes::FAILED);
        }
    }
}

fn run(cli: &Cli) -> Result<RunOutcome> {
    let config = load_config(&cli.config).context("load backend config")?;
    let backend = HrProfilerBackend::new(config);
    // Unlocked handles: the analysis output pumps write to the same streams.
    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    run_profiler(&cli.params(), &backend, cli.dry_run, &mut stdout, &mut stderr)
}
