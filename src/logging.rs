//! Diagnostic logging for qsh.
//!
//! Query output and reported errors go to the session sinks; tracing events
//! go to a separate target so the two never interleave. By default that is
//! a per-run log file, `--log-stderr` selects stderr for debugging.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use tracing_subscriber::EnvFilter;

use crate::error::{Result, ShellError};

/// Environment variable overriding the log file location.
pub const LOG_FILE_ENV: &str = "QSH_LOG_FILE";

/// Directive used when `RUST_LOG` is unset.
const DEFAULT_DIRECTIVE: &str = "info";

/// Directive used when `RUST_LOG` is unset and `-v` was given.
const VERBOSE_DIRECTIVE: &str = "info,qsh=debug";

const LOG_DIR: &str = "qsh";
const LOG_FILE: &str = "qsh.log";

/// Where tracing events are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    /// A log file, truncated at startup.
    File(PathBuf),
    Stderr,
}

impl LogTarget {
    /// Picks the target for this run.
    pub fn select(log_stderr: bool) -> Self {
        if log_stderr {
            Self::Stderr
        } else {
            Self::File(log_path())
        }
    }
}

/// Installs the global subscriber for `target`.
///
/// On failure nothing is installed and the caller decides whether to warn.
pub fn init(target: &LogTarget, verbose: bool) -> Result<()> {
    let filter = env_filter(std::env::var("RUST_LOG").ok().as_deref(), verbose);
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match target {
        LogTarget::Stderr => builder.with_writer(std::io::stderr).try_init(),
        LogTarget::File(path) => {
            let file = open_log_file(path)?;
            builder.with_writer(file).with_ansi(false).try_init()
        }
    };
    installed.map_err(|e| ShellError::internal(format!("Could not install logger: {e}")))
}

/// Builds the event filter. A valid `RUST_LOG` wins over `-v`.
fn env_filter(rust_log: Option<&str>, verbose: bool) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(fallback_directive(verbose)))
}

fn fallback_directive(verbose: bool) -> &'static str {
    if verbose {
        VERBOSE_DIRECTIVE
    } else {
        DEFAULT_DIRECTIVE
    }
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            ShellError::io(format!(
                "Could not create log directory {}: {e}",
                parent.display()
            ))
        })?;
    }
    File::create(path).map_err(|e| {
        ShellError::io(format!("Could not create log file {}: {e}", path.display()))
    })
}

/// The log file for this run: `$QSH_LOG_FILE`, else `qsh/qsh.log` under
/// the platform state directory.
pub fn log_path() -> PathBuf {
    resolve_log_path(
        std::env::var_os(LOG_FILE_ENV).map(PathBuf::from),
        dirs::state_dir(),
        dirs::config_dir(),
    )
}

fn resolve_log_path(
    explicit: Option<PathBuf>,
    state_dir: Option<PathBuf>,
    config_dir: Option<PathBuf>,
) -> PathBuf {
    if let Some(path) = explicit.filter(|p| !p.as_os_str().is_empty()) {
        return path;
    }
    match state_dir.or(config_dir) {
        Some(dir) => dir.join(LOG_DIR).join(LOG_FILE),
        None => std::env::temp_dir().join(LOG_FILE),
    }
}
