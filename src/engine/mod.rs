//! Execution backends for qsh.
//!
//! Two structurally different backends sit behind these traits: an
//! in-process engine driven statement by statement through a
//! [`QueryProcessor`] handle, and a remote session that is paged through
//! with [`RemoteSession::fetch_n`].

mod functions;
pub mod mock;
mod postgres;
mod sqlite;

pub use functions::FUNCTION_NAMES;
pub use mock::{MockEngine, MockFailure, MockRemote, MockResult};
pub use postgres::{sqlstate_code, PostgresSession};
pub use sqlite::{SqliteEngine, MEMORY_DATABASE};

use crate::error::Result;
use async_trait::async_trait;

/// Response code for statements the local engine cannot compile.
pub const COMPILE_ERROR_CODE: i32 = 10;

/// Response code for statements that fail while executing.
pub const EXECUTION_ERROR_CODE: i32 = 12;

/// Outcome of starting or finishing a statement on the local engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Zero on success.
    pub code: i32,
    /// Engine message accompanying a nonzero code.
    pub message: Option<String>,
}

impl Response {
    /// A successful response.
    pub fn ok() -> Self {
        Self {
            code: 0,
            message: None,
        }
    }

    /// A failed response with the engine's code and message.
    pub fn failed(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    /// Returns true if the code is zero.
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

/// Handle driving one statement through the local engine.
///
/// Call order: `run`, then `get_results` until it returns false, then
/// `close`. `close` must be called on every path, including after a
/// failed `run`.
#[async_trait]
pub trait QueryProcessor: Send {
    /// Compiles and starts the statement.
    async fn run(&mut self, statement: &str) -> Response;

    /// Appends the next batch of rendered rows. Returns false once the
    /// result set is exhausted and nothing was appended.
    async fn get_results(&mut self, rows: &mut Vec<String>) -> Result<bool>;

    /// Field names of the running statement's result, in order.
    fn schema(&self) -> &[String];

    /// Releases the handle. A nonzero code reports a failure on release.
    async fn close(&mut self) -> i32;
}

/// An in-process query engine.
pub trait QueryEngine: Send + Sync {
    /// Returns a fresh handle for one statement.
    fn processor(&self) -> Box<dyn QueryProcessor>;

    /// Names of the functions the engine knows, for completion.
    fn function_names(&self) -> Vec<String> {
        FUNCTION_NAMES.iter().map(|s| s.to_string()).collect()
    }
}

/// A session on a remote query server.
///
/// Errors are [`crate::error::ShellError::Server`] when the server
/// rejected the statement and [`crate::error::ShellError::Transport`] when
/// the exchange itself failed.
#[async_trait]
pub trait RemoteSession: Send {
    /// Sends a statement for execution.
    async fn execute(&mut self, statement: &str) -> Result<()>;

    /// Fetches at most `max_lines` result lines. A shorter page is the last.
    async fn fetch_n(&mut self, max_lines: usize) -> Result<Vec<String>>;

    /// Releases server-side state held for the last statement.
    async fn clean(&mut self) -> Result<()>;
}

/// The execution backend chosen for a session.
pub enum Backend {
    Local(Box<dyn QueryEngine>),
    Remote(Box<dyn RemoteSession>),
}

impl Backend {
    /// Function names to offer for completion.
    pub fn function_names(&self) -> Vec<String> {
        match self {
            Self::Local(engine) => engine.function_names(),
            Self::Remote(_) => FUNCTION_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }
}
