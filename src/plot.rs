//! Comparison chart rendering.
//!
//! All series go into one figure: one colored line per input, the input's
//! title and aggregate score written past the end of its line, and an x axis
//! in either frame numbers or `HH:MM:SS` timestamps.

use crate::error::{CompareError, Result};
use crate::metrics::MetricSeries;
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;
use std::path::{Path, PathBuf};

/// Tableau 20 palette
#[rustfmt::skip]
pub const TABLEAU20: [(u8, u8, u8); 20] = [
    (31, 119, 180), (255, 127, 14), (174, 199, 232), (255, 187, 120),
    (44, 160, 44), (152, 223, 138), (214, 39, 40), (255, 152, 150),
    (148, 103, 189), (197, 176, 213), (140, 86, 75), (196, 156, 148),
    (227, 119, 194), (247, 182, 210), (127, 127, 127), (199, 199, 199),
    (188, 189, 34), (219, 219, 141), (23, 190, 207), (158, 218, 229),
];

/// Points drawn per series before downsampling kicks in
pub const MAX_POINTS: usize = 250;
/// Canvas size in pixels (20:12)
pub const FIGURE_SIZE: (u32, u32) = (2000, 1200);

const TITLE_SEPARATOR: &str = " vs ";
const TIME_TICKS: usize = 10;
const FRAME_TICKS: usize = 12;
const Y_TICKS: usize = 8;
/// Y range used when no series has a finite value (every frame identical)
const FALLBACK_Y_RANGE: (f64, f64) = (0.0, 60.0);

/// Output image format, picked from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Svg,
    #[cfg(feature = "bitmap")]
    Bitmap,
}

impl ImageFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "svg" => Ok(ImageFormat::Svg),
            #[cfg(feature = "bitmap")]
            "png" | "bmp" | "jpg" | "jpeg" => Ok(ImageFormat::Bitmap),
            _ => Err(CompareError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// One rendering request
#[derive(Debug, Clone)]
pub struct ChartSpec {
    /// Series in input order; legend and color order follow it
    pub series: Vec<MetricSeries>,
    /// Frame rate; when set the x axis shows timestamps
    pub fps: Option<f64>,
    pub output: PathBuf,
    pub size: (u32, u32),
    pub max_points: usize,
}

impl ChartSpec {
    pub fn new<P: Into<PathBuf>>(series: Vec<MetricSeries>, output: P) -> Self {
        Self {
            series,
            fps: None,
            output: output.into(),
            size: FIGURE_SIZE,
            max_points: MAX_POINTS,
        }
    }

    pub fn with_fps(mut self, fps: Option<f64>) -> Self {
        self.fps = fps;
        self
    }
}

/// Plot-ready view of a series
#[derive(Debug, Clone)]
struct RenderSeries {
    title: String,
    aggregate_db: f64,
    color: RGBColor,
    points: Vec<(f64, f64)>,
}

/// Palette color for the series at `index`
pub fn series_color(index: usize) -> RGBColor {
    let (r, g, b) = TABLEAU20[index % TABLEAU20.len()];
    RGBColor(r, g, b)
}

/// Fixed-stride subsample for display.
///
/// Series at or below `max_points` are returned unchanged; longer ones keep
/// every `len / max_points`-th point starting with the first.
pub fn downsample(points: &[(f64, f64)], max_points: usize) -> Vec<(f64, f64)> {
    if max_points == 0 || points.len() <= max_points {
        return points.to_vec();
    }
    let stride = points.len() / max_points;
    points.iter().step_by(stride).copied().collect()
}

/// Chart title: series titles in input order
pub fn chart_title(series: &[MetricSeries]) -> String {
    series
        .iter()
        .map(|s| s.title())
        .collect::<Vec<_>>()
        .join(TITLE_SEPARATOR)
}

/// `HH:MM:SS` for a 1-based frame number, truncated to whole seconds.
pub fn format_timestamp(frame: f64, fps: f64) -> String {
    let t = ((frame - 1.0) / fps).floor().max(0.0) as u64;
    format!("{:02}:{:02}:{:02}", t / 3600, t % 3600 / 60, t % 60)
}

fn format_aggregate(db: f64) -> String {
    format!("{:.3} avg", db)
}

fn format_tick(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", (value * 100.0).round() / 100.0)
    }
}

fn validate(series: &[MetricSeries]) -> Result<()> {
    let first = series.first().ok_or(CompareError::NoSeries)?;
    if let Some(other) = series.iter().find(|s| s.kind() != first.kind()) {
        return Err(CompareError::UnsupportedMetric {
            name: format!("{} mixed with {}", other.kind(), first.kind()),
        });
    }
    Ok(())
}

fn prepare(spec: &ChartSpec) -> Vec<RenderSeries> {
    spec.series
        .iter()
        .enumerate()
        .map(|(i, series)| RenderSeries {
            title: series.title().to_string(),
            aggregate_db: series.aggregate_db(),
            color: series_color(i),
            points: downsample(&series.points(), spec.max_points),
        })
        .collect()
}

/// X range from frame 1 to the last frame, plus room for the end labels.
fn x_range(layers: &[RenderSeries]) -> (f64, f64) {
    let last = layers
        .iter()
        .filter_map(|l| l.points.last().map(|p| p.0))
        .fold(1.0_f64, f64::max);
    let room = ((last - 1.0) * 0.12).max(4.0);
    (1.0, last + room)
}

fn y_range(layers: &[RenderSeries]) -> (f64, f64) {
    let (lo, hi) = layers
        .iter()
        .flat_map(|l| l.points.iter().map(|p| p.1))
        .filter(|y| y.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), y| {
            (lo.min(y), hi.max(y))
        });
    if !lo.is_finite() {
        return FALLBACK_Y_RANGE;
    }
    let pad = ((hi - lo) * 0.08).max(1.0);
    ((lo - pad).max(0.0), hi + pad)
}

/// Value of the first label plotters would place on `lo..hi` with `count` labels.
fn first_key_point(lo: f64, hi: f64, count: usize) -> Option<f64> {
    RangedCoordf64::from(lo..hi).key_points(count).first().copied()
}

/// Horizontal gridlines at the y labels, minus the outermost two.
fn inner_gridlines(lo: f64, hi: f64, count: usize) -> Vec<f64> {
    let keys = RangedCoordf64::from(lo..hi).key_points(count);
    if keys.len() <= 2 {
        return Vec::new();
    }
    keys[1..keys.len() - 1].to_vec()
}

/// Where the end-of-line labels go: the last finite point, or the last frame
/// at the top of the plot when every frame is a perfect match.
fn label_anchor(points: &[(f64, f64)], y_top: f64) -> Option<(f64, f64)> {
    points
        .iter()
        .rev()
        .find(|(_, y)| y.is_finite())
        .copied()
        .or_else(|| points.last().map(|&(x, _)| (x, y_top)))
}

fn draw_chart<DB: DrawingBackend>(
    backend: DB,
    spec: &ChartSpec,
    layers: &[RenderSeries],
) -> std::result::Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let root = backend.into_drawing_area();
    root.fill(&WHITE)?;

    let (x_lo, x_hi) = x_range(layers);
    let (y_lo, y_hi) = y_range(layers);
    let x_labels = if spec.fps.is_some() { TIME_TICKS } else { FRAME_TICKS };

    // First x and y labels sit on the plot edge
    let hidden_x = first_key_point(x_lo, x_hi, x_labels);
    let hidden_y = first_key_point(y_lo, y_hi, Y_TICKS);

    let title = chart_title(&spec.series);
    let metric = spec.series[0].kind();

    let mut chart = ChartBuilder::on(&root)
        .caption(&title, ("sans-serif", 38))
        .margin(30)
        .x_label_area_size(80)
        .y_label_area_size(100)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)?;

    let x_formatter = |x: &f64| {
        if Some(*x) == hidden_x {
            return String::new();
        }
        match spec.fps {
            Some(fps) => format_timestamp(*x, fps),
            None => format_tick(*x),
        }
    };
    let y_formatter = |y: &f64| {
        if Some(*y) == hidden_y {
            String::new()
        } else {
            format_tick(*y)
        }
    };

    // Only the left and bottom axis lines are drawn, no top/right border
    chart
        .configure_mesh()
        .x_labels(x_labels)
        .y_labels(Y_TICKS)
        .x_desc(if spec.fps.is_some() { "Time (s)" } else { "Frame (n)" })
        .y_desc(metric.axis_label())
        .axis_desc_style(("sans-serif", 28))
        .label_style(("sans-serif", 22))
        .x_label_formatter(&x_formatter)
        .y_label_formatter(&y_formatter)
        .set_all_tick_mark_size(0)
        .disable_y_mesh()
        .bold_line_style(BLACK.mix(0.12))
        .light_line_style(TRANSPARENT)
        .axis_style(BLACK.mix(0.5))
        .draw()?;

    // Y gridlines without the outermost two
    chart.draw_series(
        inner_gridlines(y_lo, y_hi, Y_TICKS)
            .into_iter()
            .map(|y| PathElement::new(vec![(x_lo, y), (x_hi, y)], BLACK.mix(0.12))),
    )?;

    for layer in layers {
        // Perfect-match frames have no finite value and break the line
        for segment in layer.points.split(|(_, y)| !y.is_finite()) {
            if segment.is_empty() {
                continue;
            }
            chart.draw_series(LineSeries::new(
                segment.iter().copied(),
                layer.color.stroke_width(2),
            ))?;
        }

        let Some((x, y)) = label_anchor(&layer.points, y_hi) else {
            continue;
        };
        let title_style = ("sans-serif", 24).into_font().color(&layer.color);
        let avg_style = ("sans-serif", 20).into_font().color(&layer.color);
        chart.draw_series(std::iter::once(
            EmptyElement::at((x, y))
                + Text::new(layer.title.clone(), (8, 0), title_style)
                + Text::new(format_aggregate(layer.aggregate_db), (8, 28), avg_style),
        ))?;
    }

    root.present()?;
    Ok(())
}

/// Render the chart described by `spec` to `spec.output`.
pub fn render_chart(spec: &ChartSpec) -> Result<()> {
    validate(&spec.series)?;
    let format = ImageFormat::from_path(&spec.output)?;
    let layers = prepare(spec);
    log::debug!(
        "rendering {} series to {} ({:?})",
        layers.len(),
        spec.output.display(),
        format
    );

    let write_error = |reason: String| CompareError::RenderWrite {
        path: spec.output.clone(),
        reason,
    };
    match format {
        ImageFormat::Svg => {
            let backend = SVGBackend::new(&spec.output, spec.size);
            draw_chart(backend, spec, &layers).map_err(|e| write_error(e.to_string()))
        }
        #[cfg(feature = "bitmap")]
        ImageFormat::Bitmap => {
            let backend = BitMapBackend::new(&spec.output, spec.size);
            draw_chart(backend, spec, &layers).map_err(|e| write_error(e.to_string()))
        }
    }
}
