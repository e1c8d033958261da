//! Session context for qsh.
//!
//! A `Session` is created once at startup and passed by reference through
//! every component. It owns the output and error sinks, the session
//! variables, the resource references and the run-mode flags.

mod resources;

pub use resources::{ResourceType, Resources};

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::error::ShellError;

/// Variable controlling whether a header line precedes local query results.
pub const PRINT_HEADER: &str = "cli.print.header";

/// Variable controlling whether a failed statement aborts its input unit.
pub const IGNORE_ERRORS: &str = "cli.ignore.errors";

/// Variable enabling the `bias on` sampling rewrite.
pub const SAMPLING_ENABLED: &str = "sampling.enabled";

/// Default name of the key-frequency side file used by the sampling rewrite.
pub const KEY_SUMMARY_FILE: &str = "_temp_key_summary.dat";

/// A writable output destination.
pub type Sink = Box<dyn Write + Send>;

/// Where non-built-in statements are executed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// In-process query engine.
    #[default]
    Local,
    /// Remote server session.
    Remote { host: String, port: u16 },
}

impl ExecutionMode {
    /// Returns true if statements go to a remote server.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }
}

/// Mutable state of one shell session.
pub struct Session {
    mode: ExecutionMode,
    out: Sink,
    err: Sink,
    /// Echo each statement before executing it.
    pub verbose: bool,
    /// Suppress informational messages (timings).
    pub silent: bool,
    /// Init files given explicitly on the command line.
    pub init_files: Vec<PathBuf>,
    /// Single execution string (`-e`).
    pub exec_string: Option<String>,
    /// Script file to run (`-f`).
    pub file_name: Option<PathBuf>,
    /// Side file the sampling rewrite writes key frequencies to.
    pub key_summary_file: PathBuf,
    resources: Resources,
    variables: BTreeMap<String, String>,
    initial_variables: BTreeMap<String, String>,
}

impl Session {
    /// Creates a session writing to the given sinks.
    pub fn new(mode: ExecutionMode, out: Sink, err: Sink) -> Self {
        Self {
            mode,
            out,
            err,
            verbose: false,
            silent: false,
            init_files: Vec::new(),
            exec_string: None,
            file_name: None,
            key_summary_file: PathBuf::from(KEY_SUMMARY_FILE),
            resources: Resources::default(),
            variables: BTreeMap::new(),
            initial_variables: BTreeMap::new(),
        }
    }

    /// Creates a session writing to the process's stdout and stderr.
    pub fn stdio(mode: ExecutionMode) -> Self {
        Self::new(mode, Box::new(io::stdout()), Box::new(io::stderr()))
    }

    /// Seeds the session variables. `reset` restores to this set.
    pub fn with_variables(mut self, variables: BTreeMap<String, String>) -> Self {
        self.initial_variables = variables.clone();
        self.variables = variables;
        self
    }

    /// Returns the execution mode, fixed for the session's lifetime.
    pub fn mode(&self) -> &ExecutionMode {
        &self.mode
    }

    /// Returns the output sink.
    pub fn out(&mut self) -> &mut (dyn Write + Send) {
        self.out.as_mut()
    }

    /// Returns the error sink.
    pub fn err(&mut self) -> &mut (dyn Write + Send) {
        self.err.as_mut()
    }

    /// Returns both sinks at once, for concurrent draining.
    pub fn sinks(&mut self) -> (&mut (dyn Write + Send), &mut (dyn Write + Send)) {
        (self.out.as_mut(), self.err.as_mut())
    }

    /// Writes one line to the output sink.
    pub fn println(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.out, "{line}")
    }

    /// Writes one line to the error sink.
    pub fn print_error(&mut self, msg: &str) {
        // Nothing sensible can be done if stderr itself is gone.
        let _ = writeln!(self.err, "{msg}");
    }

    /// Writes an informational line to the error sink unless silent.
    pub fn print_info(&mut self, msg: &str) {
        if !self.silent {
            let _ = writeln!(self.err, "{msg}");
        }
    }

    /// Reports an error to the error sink and the log.
    pub fn report(&mut self, error: &ShellError) {
        warn!("{}: {}", error.category(), error);
        self.print_error(&error.to_string());
    }

    /// Flushes both sinks.
    pub fn flush(&mut self) {
        let _ = self.out.flush();
        let _ = self.err.flush();
    }

    /// Returns the resource references held by this session.
    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    /// Returns the resource references for modification.
    pub fn resources_mut(&mut self) -> &mut Resources {
        &mut self.resources
    }

    /// Looks up a session variable.
    pub fn var(&self, key: &str) -> Option<&str> {
        self.variables.get(key).map(String::as_str)
    }

    /// Assigns a session variable.
    pub fn set_var(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(key.into(), value.into());
    }

    /// Returns all session variables, sorted by key.
    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    /// Restores the variables the session started with.
    pub fn reset_vars(&mut self) {
        self.variables = self.initial_variables.clone();
    }

    /// Reads a boolean variable; anything but `true` (any case) is false.
    pub fn flag(&self, key: &str) -> bool {
        self.var(key)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    }

    /// Whether local query results are preceded by a header line.
    pub fn print_header(&self) -> bool {
        self.flag(PRINT_HEADER)
    }

    /// Whether a failed statement lets the rest of its input unit run.
    pub fn ignore_errors(&self) -> bool {
        self.flag(IGNORE_ERRORS)
    }

    /// Whether the `bias on` sampling rewrite is active.
    pub fn sampling_enabled(&self) -> bool {
        self.flag(SAMPLING_ENABLED)
    }
}

/// An in-memory sink that can be cloned and read back.
///
/// Used wherever output has to be captured instead of printed.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        let bytes = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Returns a boxed sink writing into this buffer.
    pub fn sink(&self) -> Sink {
        Box::new(self.clone())
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut bytes = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
