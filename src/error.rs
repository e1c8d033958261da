//! Error types for qsh.
//!
//! Every failure the shell reports belongs to one of these categories. The
//! `Display` form always starts with a category prefix so that scripted
//! consumers reading the error stream can tell them apart.

use thiserror::Error;

/// Response code reported for remote transport failures.
pub const TRANSPORT_ERROR_CODE: i32 = -10002;

/// Main error type for qsh operations.
#[derive(Error, Debug)]
pub enum ShellError {
    /// Malformed built-in invocation (bad `list` type, missing `limit=`, etc.)
    #[error("Usage: {0}")]
    Usage(String),

    /// The local query engine rejected or failed a statement.
    #[error("Query error: {0}")]
    Query(String),

    /// Local file access failed (side files, sourced scripts, init files).
    #[error("I/O error: {0}")]
    Io(String),

    /// The remote server reported an error carrying its own response code.
    #[error("Server error: {message}")]
    Server { code: i32, message: String },

    /// The remote protocol itself failed (connection lost, TLS, decoding).
    #[error("Transport error: {0}")]
    Transport(String),

    /// A shell escape could not be spawned or exited unsuccessfully.
    #[error("Shell command error: {0}")]
    Subprocess(String),

    /// Configuration errors (invalid config file, bad flag values, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ShellError {
    /// Creates a usage error with the given message.
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates an I/O error with the given message.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Creates a server error carrying the server's response code.
    pub fn server(code: i32, msg: impl Into<String>) -> Self {
        Self::Server {
            code,
            message: msg.into(),
        }
    }

    /// Creates a transport error with the given message.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Creates a subprocess error with the given message.
    pub fn subprocess(msg: impl Into<String>) -> Self {
        Self::Subprocess(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Usage(_) => "Usage Error",
            Self::Query(_) => "Query Error",
            Self::Io(_) => "I/O Error",
            Self::Server { .. } => "Server Error",
            Self::Transport(_) => "Transport Error",
            Self::Subprocess(_) => "Shell Command Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Returns the response code a statement failing with this error yields.
    pub fn response_code(&self) -> i32 {
        match self {
            Self::Server { code, .. } => *code,
            Self::Transport(_) => TRANSPORT_ERROR_CODE,
            Self::Config(_) => 2,
            Self::Usage(_)
            | Self::Query(_)
            | Self::Io(_)
            | Self::Subprocess(_)
            | Self::Internal(_) => 1,
        }
    }
}

impl From<std::io::Error> for ShellError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Result type alias using ShellError.
pub type Result<T> = std::result::Result<T, ShellError>;
