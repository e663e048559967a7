//! Per-frame similarity metrics parsed from FFmpeg stats logs.

pub mod grammar;
pub mod series;

use crate::error::CompareError;
use std::fmt;
use std::str::FromStr;

pub use series::{load_series, MetricSeries};

/// Supported comparison metric
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Structural similarity, FFmpeg `ssim` filter
    Ssim,
}

impl MetricKind {
    /// FFmpeg filter name producing this metric's stats file
    pub fn filter_name(&self) -> &'static str {
        match self {
            MetricKind::Ssim => "ssim",
        }
    }

    /// Y axis label for the chart
    pub fn axis_label(&self) -> &'static str {
        match self {
            MetricKind::Ssim => "SSIM (dB)",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Ssim => write!(f, "SSIM"),
        }
    }
}

impl FromStr for MetricKind {
    type Err = CompareError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            "ssim" => Ok(MetricKind::Ssim),
            _ => Err(CompareError::UnsupportedMetric {
                name: name.to_string(),
            }),
        }
    }
}

/// One parsed log line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricSample {
    /// 1-based frame number
    pub frame: u64,
    /// Raw similarity ratio in [0, 1]
    pub similarity: f64,
    /// Per-frame decibel value, `f64::INFINITY` for a perfect match
    pub decibel: f64,
}
