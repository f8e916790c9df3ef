//! Console text for a run: banner, parameter echo, completion and failure.
//!
//! Rendering writes to any [`Write`] so the exact layout can be tested without
//! capturing process output.

use std::io::{self, Write};
use std::path::Path;

use crate::core::params::RunParams;

const RULE_WIDTH: usize = 60;
const TITLE: &str = "HRProfiler - Homologous Recombination Deficiency Analysis";

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

/// Render a float the way Python's `str(float)` does.
///
/// Debug already picks the same shortest digits and the same switch to
/// scientific notation (below 1e-4, from 1e16); Python additionally signs
/// the exponent and pads it to two digits (`1e-05`, `1e+16`).
fn format_float(value: f64) -> String {
    let repr = format!("{value:?}");
    match repr.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => repr,
    }
}

/// Write the start banner followed by the resolved parameters.
pub fn write_banner<W: Write>(out: &mut W, params: &RunParams) -> io::Result<()> {
    writeln!(out, "{}", rule())?;
    writeln!(out, "{TITLE}")?;
    writeln!(out, "{}", rule())?;
    writeln!(out, "\nParameters:")?;
    writeln!(out, "  SNV Directory:    {}", params.snv_dir.display())?;
    writeln!(out, "  CNV Directory:    {}", params.cnv_dir.display())?;
    writeln!(out, "  CNV File Type:    {}", params.cnv_file_type)?;
    writeln!(out, "  Output Directory: {}", params.output_dir.display())?;
    writeln!(out, "  Organ Type:       {}", params.organ)?;
    writeln!(out, "  Genome:           {}", params.genome)?;
    writeln!(out, "  HRD Threshold:    {}", format_float(params.hrd_threshold))?;
    writeln!(out, "  N Replicates:     {}", params.nreplicates)?;
    writeln!(out, "\nStarting analysis...\n")
}

/// Write the completion banner naming the results directory.
pub fn write_success<W: Write>(out: &mut W, output_dir: &Path) -> io::Result<()> {
    writeln!(out, "\n{}", rule())?;
    writeln!(out, "✓ HRProfiler completed successfully!")?;
    writeln!(out, "{}", rule())?;
    writeln!(out, "\nResults saved to: {}\n", output_dir.display())
}

/// Write the single failure line. `message` is reported verbatim.
pub fn write_failure<W: Write>(out: &mut W, message: &str) -> io::Result<()> {
    writeln!(out, "\n✗ Error running HRProfiler: {message}")
}
