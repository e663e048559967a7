//! Line grammar of the FFmpeg `ssim` stats file.
//!
//! A line looks like
//! `n:1 Y:0.982387 U:0.988289 V:0.990085 All:0.984746 (18.167849)`.
//! Only the `n:`, `All:` and parenthesised tokens matter; everything around
//! them is engine-defined.

use super::MetricSample;
use crate::error::LineError;
use regex::Regex;
use std::sync::OnceLock;

fn line_regex() -> &'static Regex {
    static LINE_RE: OnceLock<Regex> = OnceLock::new();
    LINE_RE.get_or_init(|| {
        Regex::new(r"\bn:(\d+)\s.*\bAll:(\d+(?:\.\d+)?)\s.*\((inf|\d+(?:\.\d+)?)\)")
            .expect("static regex")
    })
}

/// Parse one stats line into a sample.
pub fn parse_line(line: &str) -> Result<MetricSample, LineError> {
    let malformed = || LineError::Malformed(line.to_string());

    let caps = line_regex().captures(line).ok_or_else(malformed)?;

    let frame: u64 = caps[1].parse().map_err(|_| malformed())?;
    let similarity: f64 = caps[2].parse().map_err(|_| malformed())?;
    let decibel = match &caps[3] {
        "inf" => f64::INFINITY,
        value => value.parse().map_err(|_| malformed())?,
    };

    // Anything above 1 would push the similarity sum past the sample count
    if frame == 0 || !(0.0..=1.0).contains(&similarity) {
        return Err(malformed());
    }

    Ok(MetricSample {
        frame,
        similarity,
        decibel,
    })
}

/// Render a sample in the engine's line format.
#[cfg(test)]
pub fn format_line(sample: &MetricSample) -> String {
    let db = if sample.decibel.is_infinite() {
        "inf".to_string()
    } else {
        format!("{:.6}", sample.decibel)
    };
    let ratio = sample.similarity;
    format!(
        "n:{} Y:{:.6} U:{:.6} V:{:.6} All:{:.6} ({})",
        sample.frame, ratio, ratio, ratio, ratio, db
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ffmpeg_line() {
        let line = "n:1 Y:0.982387 U:0.988289 V:0.990085 All:0.984746 (18.167849)";
        let s = parse_line(line).unwrap();
        assert_eq!(s.frame, 1);
        assert_eq!(s.similarity, 0.984746);
        assert_eq!(s.decibel, 18.167849);
    }

    #[test]
    fn test_parse_infinite_decibel() {
        let s = parse_line("n:42 Y:1.000000 U:1.000000 V:1.000000 All:1.000000 (inf)").unwrap();
        assert_eq!(s.frame, 42);
        assert_eq!(s.similarity, 1.0);
        assert!(s.decibel.is_infinite());
    }

    #[test]
    fn test_parse_tolerates_surrounding_text() {
        let s = parse_line("  n:7 R:0.9 G:0.9 B:0.9 All:0.9 (10.000000) trailing").unwrap();
        assert_eq!(s.frame, 7);
        assert_eq!(s.similarity, 0.9);
        assert_eq!(s.decibel, 10.0);
    }

    #[test]
    fn test_missing_all_token() {
        let line = "n:3 Y:0.98 U:0.98 V:0.98 (17.0)";
        assert_eq!(parse_line(line), Err(LineError::Malformed(line.to_string())));
    }

    #[test]
    fn test_tokens_out_of_order() {
        let line = "All:0.98 n:3 (17.0)";
        assert!(matches!(parse_line(line), Err(LineError::Malformed(_))));
    }

    #[test]
    fn test_rejects_similarity_above_one() {
        assert!(parse_line("n:1 All:1.5 (3.0)").is_err());
    }

    #[test]
    fn test_rejects_frame_zero() {
        assert!(parse_line("n:0 All:0.5 (3.0)").is_err());
    }

    #[test]
    fn test_round_trip() {
        let samples = [
            MetricSample { frame: 1, similarity: 0.984746, decibel: 18.167849 },
            MetricSample { frame: 250, similarity: 0.5, decibel: 3.010300 },
            MetricSample { frame: 9000, similarity: 1.0, decibel: f64::INFINITY },
        ];
        for sample in samples {
            assert_eq!(parse_line(&format_line(&sample)).unwrap(), sample);
        }
    }
}
