//! Error types for the comparison pipeline.
//!
//! Every stage returns `CompareError`; presentation is left to `main`.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline stages.
pub type Result<T> = std::result::Result<T, CompareError>;

/// Why a single log line was rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LineError {
    #[error("malformed line: {0:?}")]
    Malformed(String),

    #[error("frame {found} does not follow frame {previous}")]
    FrameOrder { previous: u64, found: u64 },

    #[error("series must start at frame 1, found frame {found}")]
    FirstFrame { found: u64 },
}

/// Pipeline error.
#[derive(Error, Debug)]
pub enum CompareError {
    // Collection
    #[error("failed to run FFmpeg ({program:?})")]
    EngineInvocation {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("FFmpeg exited with error (code {})", exit_code(.code))]
    EngineExit { code: Option<i32> },

    #[error("aborted")]
    Interrupted,

    #[error("no log for {input:?}, reference is required")]
    MissingReference { input: PathBuf },

    #[error("cannot create metric log in {dir:?}")]
    LogCreate {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Parsing
    #[error("cannot read {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode {path:?} as UTF-8")]
    Decode {
        path: PathBuf,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("empty log ({path:?})")]
    EmptyLog { path: PathBuf },

    #[error("cannot parse {path:?} at line {line}")]
    LogParse {
        path: PathBuf,
        line: usize,
        #[source]
        cause: LineError,
    },

    #[error("unsupported metric: {name}")]
    UnsupportedMetric { name: String },

    // Rendering
    #[error("no metric series to draw")]
    NoSeries,

    #[error("unsupported chart format: {path:?}")]
    UnsupportedFormat { path: PathBuf },

    #[error("cannot write chart {path:?}: {reason}")]
    RenderWrite { path: PathBuf, reason: String },
}

fn exit_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}
