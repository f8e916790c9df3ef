//! Run parameters and the keyword arguments forwarded to HRProfiler.
//!
//! These types define the contract between the CLI and the analysis backend.
//! The serialized [`AnalysisRequest`] keys must match the external
//! `HRProfiler(...)` signature exactly.

use std::fmt;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Copy-number caller whose segment files live in the CNV directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[value(rename_all = "UPPER")]
#[serde(rename_all = "UPPERCASE")]
pub enum CnvFileType {
    Ascat,
    Sequenza,
    Facets,
    Purple,
}

impl CnvFileType {
    pub fn as_str(self) -> &'static str {
        match self {
            CnvFileType::Ascat => "ASCAT",
            CnvFileType::Sequenza => "SEQUENZA",
            CnvFileType::Facets => "FACETS",
            CnvFileType::Purple => "PURPLE",
        }
    }
}

impl fmt::Display for CnvFileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tissue model used for the HRD prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[value(rename_all = "UPPER")]
#[serde(rename_all = "UPPERCASE")]
pub enum Organ {
    Breast,
    Ovarian,
}

impl Organ {
    pub fn as_str(self) -> &'static str {
        match self {
            Organ::Breast => "BREAST",
            Organ::Ovarian => "OVARIAN",
        }
    }
}

impl fmt::Display for Organ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const DEFAULT_GENOME: &str = "GRCh38";
pub const DEFAULT_HRD_THRESHOLD: f64 = 0.5;
pub const DEFAULT_NREPLICATES: u32 = 20;

/// Parse `--hrd-threshold`. Any finite float is accepted; `nan` and `inf`
/// are rejected because the JSON request has no encoding for them.
pub fn parse_threshold(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|e| format!("invalid float '{raw}': {e}"))?;
    if !value.is_finite() {
        return Err(format!("threshold must be a finite number, got '{raw}'"));
    }
    Ok(value)
}

/// User-facing parameters resolved from the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct RunParams {
    /// Directory with filtered VCF files.
    pub snv_dir: PathBuf,
    /// Directory with segment files.
    pub cnv_dir: PathBuf,
    /// Directory the analysis writes its results into.
    pub output_dir: PathBuf,
    pub cnv_file_type: CnvFileType,
    pub organ: Organ,
    /// Reference genome build, passed through unchecked.
    pub genome: String,
    /// HRD probability threshold.
    pub hrd_threshold: f64,
    /// Number of bootstrap replicates.
    pub nreplicates: u32,
}

impl RunParams {
    /// Parameters with every optional field at its default.
    pub fn with_defaults(snv_dir: PathBuf, cnv_dir: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            snv_dir,
            cnv_dir,
            output_dir,
            cnv_file_type: CnvFileType::Ascat,
            organ: Organ::Breast,
            genome: DEFAULT_GENOME.to_string(),
            hrd_threshold: DEFAULT_HRD_THRESHOLD,
            nreplicates: DEFAULT_NREPLICATES,
        }
    }
}

/// Keyword arguments for the single `HRProfiler(...)` call.
///
/// The fields not exposed on the command line are fixed by
/// [`AnalysisRequest::from_params`]: exome data, no indel directory, no
/// bootstrap, normalized signatures and prediction plots enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub genome: String,
    pub exome: bool,
    #[serde(rename = "INDELS_DIR")]
    pub indels_dir: Option<PathBuf>,
    #[serde(rename = "SNV_DIR")]
    pub snv_dir: PathBuf,
    #[serde(rename = "CNV_DIR")]
    pub cnv_dir: PathBuf,
    #[serde(rename = "RESULT_DIR")]
    pub result_dir: PathBuf,
    pub cnv_file_type: CnvFileType,
    pub bootstrap: bool,
    pub nreplicates: u32,
    pub normalize: bool,
    pub hrd_prob_thresh: f64,
    pub plot_predictions: bool,
    pub organ: Organ,
}

impl AnalysisRequest {
    pub fn from_params(params: &RunParams) -> Self {
        Self {
            genome: params.genome.clone(),
            exome: true,
            indels_dir: None,
            snv_dir: params.snv_dir.clone(),
            cnv_dir: params.cnv_dir.clone(),
            result_dir: params.output_dir.clone(),
            cnv_file_type: params.cnv_file_type,
            bootstrap: false,
            nreplicates: params.nreplicates,
            normalize: true,
            hrd_prob_thresh: params.hrd_threshold,
            plot_predictions: true,
            organ: params.organ,
        }
    }
}
