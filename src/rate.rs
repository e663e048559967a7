//! Frame rate parsing for the time axis.

/// Video rate abbreviations, see ffmpeg-utils(1)
pub const VIDEO_RATES: &[(&str, f64)] = &[
    ("ntsc", 30000.0 / 1001.0),
    ("pal", 25.0),
    ("qntsc", 30000.0 / 1001.0),
    ("qpal", 25.0),
    ("sntsc", 30000.0 / 1001.0),
    ("spal", 25.0),
    ("film", 24.0),
    ("ntsc-film", 24000.0 / 1001.0),
];

/// Parse `ntsc-film`, `60`, `59.94` or `30000/1001` into frames per second.
pub fn parse_rate(value: &str) -> Result<f64, String> {
    let value = value.trim();
    let fps = if let Some(&(_, fps)) = VIDEO_RATES.iter().find(|(name, _)| *name == value) {
        fps
    } else if let Some((num, den)) = value.split_once('/') {
        let num: f64 = num.trim().parse().map_err(|_| format!("bad fps: {value}"))?;
        let den: f64 = den.trim().parse().map_err(|_| format!("bad fps: {value}"))?;
        num / den
    } else {
        value.parse().map_err(|_| format!("bad fps: {value}"))?
    };

    if fps.is_finite() && fps > 0.0 {
        Ok(fps)
    } else {
        Err(format!("bad fps: {value}"))
    }
}
