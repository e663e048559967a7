//! cmpv - compare videos frame by frame and draw a chart.
//!
//! Runs FFmpeg's SSIM filter for every input against a reference, parses the
//! per-frame logs and renders all series into one comparison chart.

mod collect;
mod error;
mod interrupt;
mod metrics;
mod plot;
mod rate;
mod report;

use anyhow::{Context, Result};
use clap::Parser;
use collect::{collect_logs, is_collected_log, CollectionRequest, FfmpegEngine, RunState};
use error::CompareError;
use metrics::{load_series, MetricKind};
use plot::{render_chart, ChartSpec, ImageFormat};
use report::{format_count, QuietReporter, Reporter, TerminalReporter};
use std::path::PathBuf;
use std::process::ExitCode;

const EXAMPLES: &str = "\
Examples:
  # Compare two videos using SSIM
  cmpv --ref orig.mkv 1.mkv 2.mkv
  # Fix ref resolution
  cmpv --ref orig.mkv --refvf scale=640:-1 1.mkv
  # Show time on x axis
  cmpv --ref orig.mkv -r ntsc-film 1.mkv 2.mkv
  # Redraw from kept logs
  cmpv -o graph.svg /tmp/cmpv-1-ab12cd.log /tmp/cmpv-2-ef34gh.log";

#[cfg(feature = "bitmap")]
const DEFAULT_OUTPUT: &str = "graph.png";
#[cfg(not(feature = "bitmap"))]
const DEFAULT_OUTPUT: &str = "graph.svg";

/// Exit status after SIGINT, as a shell reports it
const INTERRUPTED_STATUS: u8 = 130;

/// Shell-split raw FFmpeg options
#[derive(Debug, Clone, Default, PartialEq)]
struct RawOptions(Vec<String>);

fn parse_raw_options(value: &str) -> Result<RawOptions, String> {
    shlex::split(value)
        .map(RawOptions)
        .ok_or_else(|| format!("unbalanced quoting in {value:?}"))
}

/// Compare videos frame by frame and draw a nice graph
#[derive(Parser, Debug)]
#[command(name = "cmpv")]
#[command(author, version, about, long_about = None, after_help = EXAMPLES)]
struct Args {
    /// Input files (e.g. in.mkv) or already collected logs (e.g. /tmp/cmpv-in-123.log)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Reference (original) path, required unless only logs are given
    #[arg(long = "ref", visible_alias = "refpath")]
    reference: Option<PathBuf>,

    /// Destination graph path
    #[arg(short = 'o', long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Limit the duration of data read from the inputs (seconds or hh:mm:ss[.xxx])
    #[arg(short = 't', long)]
    duration: Option<String>,

    /// Show timestamps instead of frame numbers using this rate (ntsc-film, ntsc, 60.0, 30000/1001)
    #[arg(short = 'r', long = "rate", value_parser = rate::parse_rate)]
    fps: Option<f64>,

    /// Filters to preprocess main files, e.g. vflip,crop=800:600
    #[arg(long)]
    mainvf: Option<String>,

    /// Filters to preprocess the reference, e.g. scale=-1:360
    #[arg(long)]
    refvf: Option<String>,

    /// Additional raw FFmpeg options, e.g. --fo='-frames 100'
    #[arg(long, allow_hyphen_values = true, value_parser = parse_raw_options)]
    fo: Option<RawOptions>,

    /// Raw FFmpeg options inserted before main files, e.g. --mainfo='-r 8'
    #[arg(long, allow_hyphen_values = true, value_parser = parse_raw_options)]
    mainfo: Option<RawOptions>,

    /// Raw FFmpeg options inserted before the reference, e.g. --reffo='-itsoffset 10'
    #[arg(long, allow_hyphen_values = true, value_parser = parse_raw_options)]
    reffo: Option<RawOptions>,

    /// Comparison metric
    #[arg(long, default_value = "ssim")]
    metric: String,

    /// FFmpeg binary
    #[arg(long, env = "VTOOLS_FFMPEG", default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    /// Directory for collected metric logs (default: system temp dir)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Keep collected metric logs for additional use
    #[arg(short = 'k', long)]
    keep_logs: bool,

    /// Enable verbose mode
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Suppress status lines
    #[arg(short = 'q', long)]
    quiet: bool,
}

impl Args {
    fn collection_request(&self, metric: MetricKind) -> CollectionRequest {
        let raw = |opts: &Option<RawOptions>| opts.clone().unwrap_or_default().0;
        let mut request = CollectionRequest::new(self.reference.clone());
        request.main_filters = self.mainvf.clone();
        request.ref_filters = self.refvf.clone();
        request.global_opts = raw(&self.fo);
        request.main_opts = raw(&self.mainfo);
        request.ref_opts = raw(&self.reffo);
        request.duration = self.duration.clone();
        request.verbose = self.verbose;
        if let Some(ref dir) = self.log_dir {
            request.log_dir = dir.clone();
        }
        request.metric = metric;
        request
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

/// Collect, parse and draw. Logs created along the way land in `state`.
fn run(args: &Args, state: &mut RunState, reporter: &dyn Reporter) -> Result<()> {
    let metric: MetricKind = args.metric.parse()?;
    // Fail on a bad destination before spending time in FFmpeg
    ImageFormat::from_path(&args.output)?;
    if args.reference.is_none() {
        if let Some(input) = args.inputs.iter().find(|p| !is_collected_log(p)) {
            return Err(CompareError::MissingReference {
                input: input.clone(),
            }
            .into());
        }
    }

    let request = args.collection_request(metric);
    let engine = FfmpegEngine::new(&args.ffmpeg);
    let logs = collect_logs(&request, &args.inputs, &engine, state, reporter)
        .context("Failed to collect metrics")?;

    let mut series = Vec::with_capacity(logs.len());
    for log_path in &logs {
        check_interrupt()?;
        let s = load_series(log_path, metric)?;
        reporter.info(&format!(
            "{}: {} frames, {:.3} dB",
            s.title(),
            format_count(s.samples().len()),
            s.aggregate_db()
        ));
        series.push(s);
    }

    check_interrupt()?;
    let spec = ChartSpec::new(series, &args.output).with_fps(args.fps);
    reporter.result(&format!(
        "Saving {}",
        args.output
            .file_name()
            .unwrap_or(args.output.as_os_str())
            .to_string_lossy()
    ));
    render_chart(&spec)?;
    Ok(())
}

fn check_interrupt() -> std::result::Result<(), CompareError> {
    if interrupt::interrupted() {
        return Err(CompareError::Interrupted);
    }
    Ok(())
}

/// Process exit status; Ctrl-C wins even if the run got through.
fn exit_status(result: &Result<()>, interrupted: bool) -> u8 {
    match result {
        _ if interrupted => INTERRUPTED_STATUS,
        Ok(()) => 0,
        Err(_) => 1,
    }
}

/// Remove logs created by this run unless asked to keep them.
fn cleanup(state: &RunState, keep_logs: bool, reporter: &dyn Reporter) {
    if keep_logs || state.created_logs().is_empty() {
        return;
    }
    reporter.result("Removing logs");
    for path in state.created_logs() {
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                eprintln!("Error during cleanup: {}: {}", path.display(), e);
            }
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);
    interrupt::install();

    let reporter: Box<dyn Reporter> = if args.quiet {
        Box::new(QuietReporter)
    } else {
        Box::new(TerminalReporter::new())
    };

    let mut state = RunState::new();
    let result = run(&args, &mut state, reporter.as_ref());
    cleanup(&state, args.keep_logs, reporter.as_ref());

    let status = exit_status(&result, interrupt::interrupted());
    if status == INTERRUPTED_STATUS {
        eprintln!("Aborted");
    } else if let Err(e) = result {
        if args.verbose {
            eprintln!("Cannot proceed due to the following error: {:?}", e);
        } else {
            eprintln!("Cannot proceed due to the following error: {:#}", e);
        }
    }
    ExitCode::from(status)
}
