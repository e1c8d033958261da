//! Remote statement execution.
//!
//! Sends a statement to the remote session and pages its result lines to
//! the output sink.

use tracing::debug;

use crate::engine::RemoteSession;
use crate::error::ShellError;
use crate::session::Session;

/// Page size for result fetches. A shorter page ends the result set.
pub const LINES_TO_FETCH: usize = 40;

/// Executes statements on a remote session.
pub struct RemoteExecutor<'a> {
    remote: &'a mut dyn RemoteSession,
}

impl<'a> RemoteExecutor<'a> {
    pub fn new(remote: &'a mut dyn RemoteSession) -> Self {
        Self { remote }
    }

    /// Executes one statement and returns its response code.
    ///
    /// Cleanup always runs. A cleanup failure is reported but leaves the
    /// code unchanged.
    pub async fn execute(&mut self, session: &mut Session, statement: &str) -> i32 {
        let ret = match self.fetch_all(session, statement).await {
            Ok(()) => 0,
            Err(e) => failure_code(session, e),
        };
        if let Err(e) = self.remote.clean().await {
            session.report(&e);
        }
        ret
    }

    async fn fetch_all(&mut self, session: &mut Session, statement: &str) -> Result<(), ShellError> {
        self.remote.execute(statement).await?;
        let mut pages = 0usize;
        loop {
            let lines = self.remote.fetch_n(LINES_TO_FETCH).await?;
            pages += 1;
            for line in &lines {
                if session.println(line).is_err() {
                    debug!("Output closed after {pages} pages");
                    return Ok(());
                }
            }
            if lines.len() < LINES_TO_FETCH {
                debug!("Fetched {pages} pages");
                return Ok(());
            }
        }
    }
}

/// A server error carrying code 0 marks the normal end of results.
fn failure_code(session: &mut Session, error: ShellError) -> i32 {
    if let ShellError::Server { code: 0, .. } = error {
        return 0;
    }
    session.report(&error);
    error.response_code()
}
