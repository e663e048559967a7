//! Metric log collection by running FFmpeg per input.

use crate::error::{CompareError, Result};
use crate::interrupt;
use crate::metrics::series::{LOG_PREFIX, LOG_SEPARATOR};
use crate::metrics::MetricKind;
use crate::report::Reporter;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Immutable collection settings shared by every input
#[derive(Debug, Clone)]
pub struct CollectionRequest {
    /// Reference (original) media
    pub reference: Option<PathBuf>,
    /// Filters applied to each input before comparison, e.g. `vflip,crop=800:600`
    pub main_filters: Option<String>,
    /// Filters applied to the reference before comparison
    pub ref_filters: Option<String>,
    /// Raw options appended before the output
    pub global_opts: Vec<String>,
    /// Raw options inserted before each input
    pub main_opts: Vec<String>,
    /// Raw options inserted before the reference
    pub ref_opts: Vec<String>,
    /// Duration limit (`-t`), seconds or `hh:mm:ss[.xxx]`
    pub duration: Option<String>,
    /// Let FFmpeg log at `info` instead of `error`
    pub verbose: bool,
    /// Where new metric logs are created
    pub log_dir: PathBuf,
    pub metric: MetricKind,
}

impl CollectionRequest {
    pub fn new(reference: Option<PathBuf>) -> Self {
        Self {
            reference,
            main_filters: None,
            ref_filters: None,
            global_opts: Vec::new(),
            main_opts: Vec::new(),
            ref_opts: Vec::new(),
            duration: None,
            verbose: false,
            log_dir: std::env::temp_dir(),
            metric: MetricKind::Ssim,
        }
    }
}

/// Artifacts created by this run, kept separate from configuration
#[derive(Debug, Default)]
pub struct RunState {
    created_logs: Vec<PathBuf>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_log(&mut self, path: PathBuf) {
        self.created_logs.push(path);
    }

    /// Logs created by the collector, in creation order
    pub fn created_logs(&self) -> &[PathBuf] {
        &self.created_logs
    }
}

/// Runs the comparison engine with a prepared argument vector
pub trait Engine {
    /// Run to completion and return the exit code (`None` if killed by a signal).
    ///
    /// With `check_code`, a non-zero exit is an `EngineExit` error.
    fn run(&self, args: &[OsString], check_code: bool) -> Result<Option<i32>>;
}

/// Spawns the FFmpeg binary with inherited stdio
pub struct FfmpegEngine {
    program: PathBuf,
}

impl FfmpegEngine {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Engine for FfmpegEngine {
    fn run(&self, args: &[OsString], check_code: bool) -> Result<Option<i32>> {
        log::debug!("running {} {:?}", self.program.display(), args);

        let status = Command::new(&self.program)
            .args(args)
            .status()
            .map_err(|source| CompareError::EngineInvocation {
                program: self.program.clone(),
                source,
            })?;

        if interrupt::interrupted() {
            return Err(CompareError::Interrupted);
        }
        if check_code && !status.success() {
            return Err(CompareError::EngineExit {
                code: status.code(),
            });
        }
        Ok(status.code())
    }
}

/// Whether an input is an already collected metric log
pub fn is_collected_log(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "log")
}

/// Escape a value for use inside a quoted filtergraph argument.
///
/// See ffmpeg-filters(1), "Notes on filtergraph escaping".
pub fn escape_filter_arg(arg: &str) -> String {
    arg.replace('\\', r"\\")
        .replace('\'', r"'\\\''")
        .replace(':', r"\:")
}

/// Filtergraph comparing input 0 against input 1, writing stats to `log_path`.
pub fn filter_graph(request: &CollectionRequest, log_path: &Path) -> String {
    let prefilter = if request.main_filters.is_some() || request.ref_filters.is_some() {
        format!(
            "[0:v]{}[main];[1:v]{}[ref];[main][ref]",
            request.main_filters.as_deref().unwrap_or("null"),
            request.ref_filters.as_deref().unwrap_or("null"),
        )
    } else {
        String::new()
    };
    format!(
        "{}{}=f='{}'",
        prefilter,
        request.metric.filter_name(),
        escape_filter_arg(&log_path.to_string_lossy())
    )
}

/// Full FFmpeg argument vector for one input.
pub fn engine_args(
    request: &CollectionRequest,
    input: &Path,
    reference: &Path,
    log_path: &Path,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-hide_banner".into(), "-stats".into()];

    // Inputs
    args.extend(request.main_opts.iter().map(OsString::from));
    args.push("-i".into());
    args.push(input.into());
    args.extend(request.ref_opts.iter().map(OsString::from));
    args.push("-i".into());
    args.push(reference.into());

    // Filters
    args.push("-lavfi".into());
    args.push(filter_graph(request, log_path).into());

    // Other
    args.push("-map".into());
    args.push("v".into());
    args.push("-loglevel".into());
    args.push(if request.verbose { "info" } else { "error" }.into());
    if let Some(ref duration) = request.duration {
        args.push("-t".into());
        args.push(duration.into());
    }
    args.extend(request.global_opts.iter().map(OsString::from));
    args.push("-f".into());
    args.push("null".into());
    args.push("-".into());
    args
}

/// Create an empty `cmpv-<title>-<random>.log` in the log directory.
fn create_log(request: &CollectionRequest, input: &Path) -> Result<PathBuf> {
    let title = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let prefix = format!("{LOG_PREFIX}{LOG_SEPARATOR}{title}{LOG_SEPARATOR}");

    let log_error = |source| CompareError::LogCreate {
        dir: request.log_dir.clone(),
        source,
    };
    let file = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".log")
        .tempfile_in(&request.log_dir)
        .map_err(log_error)?;
    file.into_temp_path().keep().map_err(|e| log_error(e.error))
}

/// Obtain one metric log per input, in input order.
///
/// Existing `.log` inputs are used as is. Every log created here is recorded
/// in `state` before FFmpeg runs, so a failed run can still clean up.
pub fn collect_logs(
    request: &CollectionRequest,
    inputs: &[PathBuf],
    engine: &dyn Engine,
    state: &mut RunState,
    reporter: &dyn Reporter,
) -> Result<Vec<PathBuf>> {
    let mut logs = Vec::with_capacity(inputs.len());

    for input in inputs {
        if interrupt::interrupted() {
            return Err(CompareError::Interrupted);
        }
        if is_collected_log(input) {
            logs.push(input.clone());
            continue;
        }

        let reference = request
            .reference
            .as_deref()
            .ok_or_else(|| CompareError::MissingReference {
                input: input.clone(),
            })?;

        let log_path = create_log(request, input)?;
        state.record_log(log_path.clone());
        reporter.info(&format!(
            "{}: saving metrics to {}",
            input.file_name().unwrap_or(input.as_os_str()).to_string_lossy(),
            log_path.display()
        ));

        engine.run(&engine_args(request, input, reference, &log_path), true)?;
        logs.push(log_path);
    }

    Ok(logs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::QuietReporter;
    use std::cell::RefCell;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    /// Writes a fixed stats file to the path named in the filtergraph
    struct FakeEngine {
        lines: &'static str,
        exit_code: i32,
        calls: RefCell<Vec<Vec<String>>>,
    }

    impl FakeEngine {
        fn new(lines: &'static str, exit_code: i32) -> Self {
            Self {
                lines,
                exit_code,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Engine for FakeEngine {
        fn run(&self, args: &[OsString], check_code: bool) -> Result<Option<i32>> {
            let args = strings(args);
            let graph = &args[args.iter().position(|a| a == "-lavfi").unwrap() + 1];
            let start = graph.find("ssim=f='").unwrap() + "ssim=f='".len();
            let log = &graph[start..graph.len() - 1];
            std::fs::write(log, self.lines).unwrap();
            self.calls.borrow_mut().push(args);

            if check_code && self.exit_code != 0 {
                return Err(CompareError::EngineExit {
                    code: Some(self.exit_code),
                });
            }
            Ok(Some(self.exit_code))
        }
    }

    fn request(dir: &Path) -> CollectionRequest {
        let mut request = CollectionRequest::new(Some(PathBuf::from("orig.mkv")));
        request.log_dir = dir.to_path_buf();
        request
    }

    #[test]
    fn test_escape_filter_arg() {
        assert_eq!(escape_filter_arg("/tmp/plain.log"), "/tmp/plain.log");
        assert_eq!(escape_filter_arg(r"C:\logs\a.log"), r"C\:\\logs\\a.log");
        assert_eq!(escape_filter_arg("it's"), r"it'\\\''s");
        assert_eq!(escape_filter_arg(r"a\'b"), r"a\\'\\\''b");
    }

    #[test]
    fn test_filter_graph_plain() {
        let request = CollectionRequest::new(None);
        assert_eq!(
            filter_graph(&request, Path::new("/tmp/x.log")),
            "ssim=f='/tmp/x.log'"
        );
    }

    #[test]
    fn test_filter_graph_with_prefilters() {
        let mut request = CollectionRequest::new(None);
        request.ref_filters = Some("scale=-1:360".to_string());
        assert_eq!(
            filter_graph(&request, Path::new("/tmp/x.log")),
            "[0:v]null[main];[1:v]scale=-1:360[ref];[main][ref]ssim=f='/tmp/x.log'"
        );

        request.main_filters = Some("vflip".to_string());
        request.ref_filters = None;
        assert_eq!(
            filter_graph(&request, Path::new("/tmp/x.log")),
            "[0:v]vflip[main];[1:v]null[ref];[main][ref]ssim=f='/tmp/x.log'"
        );
    }

    #[test]
    fn test_engine_args_minimal() {
        let request = CollectionRequest::new(None);
        let args = engine_args(
            &request,
            Path::new("1.mkv"),
            Path::new("orig.mkv"),
            Path::new("/tmp/x.log"),
        );
        assert_eq!(
            strings(&args),
            vec![
                "-hide_banner", "-stats", "-i", "1.mkv", "-i", "orig.mkv", "-lavfi",
                "ssim=f='/tmp/x.log'", "-map", "v", "-loglevel", "error", "-f", "null", "-",
            ]
        );
    }

    #[test]
    fn test_engine_args_full() {
        let mut request = CollectionRequest::new(None);
        request.main_opts = vec!["-r".into(), "8".into()];
        request.ref_opts = vec!["-itsoffset".into(), "10".into()];
        request.global_opts = vec!["-frames".into(), "100".into()];
        request.duration = Some("00:01:00".into());
        request.verbose = true;
        let args = engine_args(
            &request,
            Path::new("1.mkv"),
            Path::new("orig.mkv"),
            Path::new("/tmp/x.log"),
        );
        assert_eq!(
            strings(&args),
            vec![
                "-hide_banner", "-stats", "-r", "8", "-i", "1.mkv", "-itsoffset", "10", "-i",
                "orig.mkv", "-lavfi", "ssim=f='/tmp/x.log'", "-map", "v", "-loglevel", "info",
                "-t", "00:01:00", "-frames", "100", "-f", "null", "-",
            ]
        );
    }

    #[test]
    fn test_collect_logs_in_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::new("n:1 All:0.9 (10.0)\n", 0);
        let mut state = RunState::new();
        let inputs = vec![
            PathBuf::from("first.mkv"),
            PathBuf::from("/old/cmpv-prev-abc123.log"),
            PathBuf::from("second.mkv"),
        ];

        let logs = collect_logs(&request(dir.path()), &inputs, &engine, &mut state, &QuietReporter)
            .unwrap();

        assert_eq!(logs.len(), 3);
        assert_eq!(logs[1], PathBuf::from("/old/cmpv-prev-abc123.log"));
        assert_eq!(state.created_logs(), &[logs[0].clone(), logs[2].clone()]);
        assert_eq!(engine.calls.borrow().len(), 2);

        let name = logs[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("cmpv-first-"));
        assert!(name.ends_with(".log"));
        assert!(logs[2].starts_with(dir.path()));
        assert_eq!(std::fs::read_to_string(&logs[2]).unwrap(), "n:1 All:0.9 (10.0)\n");
    }

    #[test]
    fn test_failed_engine_still_records_log() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::new("", 1);
        let mut state = RunState::new();

        let err = collect_logs(
            &request(dir.path()),
            &[PathBuf::from("clip.mkv")],
            &engine,
            &mut state,
            &QuietReporter,
        )
        .unwrap_err();

        assert!(matches!(err, CompareError::EngineExit { code: Some(1) }));
        assert_eq!(state.created_logs().len(), 1);
        assert!(state.created_logs()[0].exists());
    }

    #[test]
    fn test_missing_reference() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = request(dir.path());
        req.reference = None;
        let mut state = RunState::new();

        let err = collect_logs(
            &req,
            &[PathBuf::from("clip.mkv")],
            &FakeEngine::new("", 0),
            &mut state,
            &QuietReporter,
        )
        .unwrap_err();
        assert!(matches!(err, CompareError::MissingReference { .. }));
        assert!(state.created_logs().is_empty());
    }

    #[test]
    fn test_ffmpeg_engine_spawn_failure() {
        let engine = FfmpegEngine::new("/nonexistent/ffmpeg-binary");
        let err = engine.run(&[], true).unwrap_err();
        assert!(matches!(err, CompareError::EngineInvocation { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_ffmpeg_engine_exit_code() {
        let engine = FfmpegEngine::new("false");
        let err = engine.run(&[], true).unwrap_err();
        assert!(matches!(err, CompareError::EngineExit { code: Some(1) }));

        // Diagnostic runs may ignore the exit code
        assert_eq!(engine.run(&[], false).unwrap(), Some(1));
        assert_eq!(FfmpegEngine::new("true").run(&[], true).unwrap(), Some(0));
    }
}
