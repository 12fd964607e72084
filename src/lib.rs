//! # genescanner-rs - GeneScan peak cleaning
//!
//! Reads fragment-length electrophoresis peak tables, collapses clusters of
//! adjacent peaks ("mountain ranges") into one representative peak each, and
//! reports every surviving peak's area as a percentage of its sample.

pub mod cluster;
pub mod percentage;
pub mod pipeline;
pub mod report;
pub mod resolve;
pub mod table;
pub mod utils;

use serde::Serialize;

/// A single detected fragment measurement
#[derive(Debug, Clone, PartialEq)]
pub struct Peak {
    pub sample_name: String,
    pub size: f64,
    pub height: f64,
    pub area: f64,
}

impl Peak {
    pub fn new(sample_name: String, size: f64, height: f64, area: f64) -> Self {
        Self {
            sample_name,
            size,
            height,
            area,
        }
    }
}

/// Outcome of cluster resolution for one peak
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeakStatus {
    Kept,
    Removed,
}

/// Terminal state of a peak once the whole pipeline has run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PeakFate {
    Retained,
    Filtered,
    Removed,
}

impl PeakFate {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeakFate::Retained => "Retained",
            PeakFate::Filtered => "Filtered",
            PeakFate::Removed => "Removed",
        }
    }
}

/// A peak that survived cluster resolution, annotated with its area share
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPeak {
    pub peak: Peak,
    pub percentage: f64,
}

/// A peak from the input together with its terminal state
#[derive(Debug, Clone, PartialEq)]
pub struct LabelledPeak {
    pub peak: Peak,
    pub fate: PeakFate,
    pub percentage: Option<f64>,
}

/// Configuration parameters for peak cleaning
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub peak_gap: f64,          // Max size difference between neighbours of one cluster
    pub cluster_size: usize,    // Largest cluster collapsed to a single peak
    pub filter_threshold: f64,  // Minimum percentage a peak needs to be reported
    pub precision: Option<u32>, // Decimal places kept in percentages
    pub num_processes: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            peak_gap: 1.7,
            cluster_size: 3,
            filter_threshold: 0.0,
            precision: None,
            num_processes: 1,
        }
    }
}

/// Error types for the genescanner library
#[derive(Debug, thiserror::Error)]
pub enum GeneScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing required columns {missing:?}: expected {expected:?}, found {found:?}")]
    MissingColumns {
        missing: Vec<String>,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Invalid peak record: {0}")]
    InvalidPeak(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Total retained area is zero for samples: {}", .samples.join(", "))]
    ZeroArea { samples: Vec<String> },

    #[error("File not found: {0}")]
    FileNotFound(String),
}

pub type GeneScanResult<T> = Result<T, GeneScanError>;
