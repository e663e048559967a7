//! Turning a complete stats log into a validated metric series.

use super::{grammar, MetricKind, MetricSample};
use crate::error::{CompareError, LineError, Result};
use std::fs;
use std::path::Path;

/// Prefix of log files created by the collector, `cmpv-<title>-<random>.log`
pub const LOG_PREFIX: &str = "cmpv";
/// Separator between the prefix, the title and the random suffix
pub const LOG_SEPARATOR: char = '-';

/// One input's full per-frame series and its aggregate score
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSeries {
    title: String,
    kind: MetricKind,
    samples: Vec<MetricSample>,
    aggregate_db: f64,
}

impl MetricSeries {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Samples in frame order, never empty
    pub fn samples(&self) -> &[MetricSample] {
        &self.samples
    }

    /// Aggregate over the whole series, independent of any downsampling
    pub fn aggregate_db(&self) -> f64 {
        self.aggregate_db
    }

    /// `(frame, per-frame dB)` pairs for plotting
    pub fn points(&self) -> Vec<(f64, f64)> {
        self.samples
            .iter()
            .map(|s| (s.frame as f64, s.decibel))
            .collect()
    }
}

/// Read a stats log from disk and build its series.
pub fn load_series<P: AsRef<Path>>(path: P, kind: MetricKind) -> Result<MetricSeries> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| CompareError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8(bytes).map_err(|source| CompareError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    parse_series(&text, path, kind)
}

/// Build a series from log text; `path` supplies the title and error context.
pub fn parse_series(text: &str, path: &Path, kind: MetricKind) -> Result<MetricSeries> {
    let data = text.trim();
    if data.is_empty() {
        return Err(CompareError::EmptyLog {
            path: path.to_path_buf(),
        });
    }

    let parse_error = |line: usize, cause: LineError| CompareError::LogParse {
        path: path.to_path_buf(),
        line,
        cause,
    };

    let mut samples: Vec<MetricSample> = Vec::new();
    for (idx, line) in data.split('\n').enumerate() {
        let sample = match kind {
            MetricKind::Ssim => grammar::parse_line(line),
        }
        .map_err(|cause| parse_error(idx + 1, cause))?;

        match samples.last() {
            None if sample.frame != 1 => {
                return Err(parse_error(idx + 1, LineError::FirstFrame { found: sample.frame }));
            }
            Some(prev) if sample.frame <= prev.frame => {
                return Err(parse_error(
                    idx + 1,
                    LineError::FrameOrder {
                        previous: prev.frame,
                        found: sample.frame,
                    },
                ));
            }
            _ => {}
        }
        samples.push(sample);
    }

    let aggregate_db = aggregate_db(&samples);
    log::debug!(
        "{}: {} frames, {:.3} dB aggregate",
        path.display(),
        samples.len(),
        aggregate_db
    );

    Ok(MetricSeries {
        title: derive_title(path),
        kind,
        samples,
        aggregate_db,
    })
}

/// Aggregate decibel score over all samples.
///
/// Follows FFmpeg's `vf_ssim.c` convention: with `N` frames and similarity
/// sum `S`, the score is `10 * (log10(N) - log10(N - S))`. This is not the
/// mean of the per-frame decibel column. A perfect series gives `+inf`.
pub fn aggregate_db(samples: &[MetricSample]) -> f64 {
    let weight = samples.len() as f64;
    let sum: f64 = samples.iter().map(|s| s.similarity).sum();
    10.0 * (weight.log10() - (weight - sum).log10())
}

/// Display title for a log path.
///
/// Collector logs (`cmpv-<title>-<random>.log`) yield `<title>`, any other
/// file yields its stem. An empty result falls back to the file name.
pub fn derive_title(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let prefix = format!("{}{}", LOG_PREFIX, LOG_SEPARATOR);
    let title = if stem.starts_with(&prefix) {
        let rest = &stem[prefix.len()..];
        match rest.rsplit_once(LOG_SEPARATOR) {
            Some((head, _suffix)) => head.to_string(),
            None => rest.to_string(),
        }
    } else {
        stem
    };

    if title.is_empty() {
        name
    } else {
        title
    }
}
