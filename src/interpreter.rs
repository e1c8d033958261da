//! The statement interpreter.
//!
//! Takes blocks of input text, splits them into statements and routes each
//! one to its handler. Sourced files are processed on an explicit stack of
//! frames rather than by recursion, so the error policy applies the same
//! way at every nesting level.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::commands::handlers::{handle_list, handle_shell};
use crate::commands::{Command, CommandRouter};
use crate::engine::Backend;
use crate::error::{Result, ShellError};
use crate::exec::{LocalExecutor, RemoteExecutor};
use crate::session::Session;
use crate::splitter::split_statements;

/// File name of the startup script looked up in the default locations.
pub const INIT_FILE_NAME: &str = ".qshrc";

/// Environment variable naming the installation root.
pub const HOME_ENV: &str = "QSH_HOME";

/// Nesting limit for `source`.
const MAX_SOURCE_DEPTH: usize = 64;

/// Exit status when the batch script cannot be read.
pub const UNREADABLE_FILE_CODE: i32 = 3;

/// How processing of an input unit ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// All statements ran, or one failed and stopped the unit.
    Code(i32),
    /// The process must exit now with this status.
    Exit(i32),
}

impl Outcome {
    /// The status carried by either variant.
    pub fn code(&self) -> i32 {
        match self {
            Self::Code(code) | Self::Exit(code) => *code,
        }
    }
}

/// What one statement asks the driver to do next.
enum Step {
    Done(i32),
    Exit(i32),
    Enter(String),
}

/// One input unit being worked through.
struct Frame {
    text: String,
    pos: usize,
    last: i32,
}

impl Frame {
    fn new(text: String) -> Self {
        Self {
            text,
            pos: 0,
            last: 0,
        }
    }

    fn next_statement(&mut self) -> Option<String> {
        let mut statements = split_statements(&self.text[self.pos..]);
        let statement = statements.next();
        self.pos += statements.consumed();
        statement
    }
}

/// Records `code` as the latest result of the innermost frame.
///
/// A failing code abandons the frame unless errors are ignored; the code
/// then becomes the result of the `source` statement in the enclosing frame.
/// Returns the final code once the outermost frame has been abandoned.
fn settle(frames: &mut Vec<Frame>, code: i32, ignore_errors: bool) -> Option<i32> {
    while let Some(frame) = frames.last_mut() {
        frame.last = code;
        if code == 0 || ignore_errors {
            return None;
        }
        frames.pop();
    }
    Some(code)
}

/// Interprets statements against one session and backend.
pub struct Interpreter {
    session: Session,
    backend: Backend,
}

impl Interpreter {
    pub fn new(session: Session, backend: Backend) -> Self {
        Self { session, backend }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Processes every statement of `text`.
    ///
    /// Without the ignore-errors flag, the first failing statement stops the
    /// unit and its code is returned. Otherwise the last statement's code
    /// is returned.
    pub async fn process_line(&mut self, text: &str) -> Outcome {
        let mut frames = vec![Frame::new(text.to_string())];

        loop {
            let Some(frame) = frames.last_mut() else {
                return Outcome::Code(0);
            };
            let Some(statement) = frame.next_statement() else {
                let finished = frame.last;
                frames.pop();
                if frames.is_empty() {
                    return Outcome::Code(finished);
                }
                let ignore = self.session.ignore_errors();
                if let Some(code) = settle(&mut frames, finished, ignore) {
                    return Outcome::Code(code);
                }
                continue;
            };

            let step = self.process_cmd(&statement, frames.len()).await;
            self.session.flush();
            match step {
                Step::Exit(code) => return Outcome::Exit(code),
                Step::Enter(text) => frames.push(Frame::new(text)),
                Step::Done(code) => {
                    let ignore = self.session.ignore_errors();
                    if let Some(code) = settle(&mut frames, code, ignore) {
                        return Outcome::Code(code);
                    }
                }
            }
        }
    }

    /// Runs the statements of a script file.
    ///
    /// Fails only if the file cannot be read.
    pub async fn process_file(&mut self, path: &Path) -> Result<Outcome> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ShellError::io(format!("{}: {e}", path.display())))?;
        info!("Processing file {}", path.display());
        Ok(self.process_line(&text).await)
    }

    /// Runs the session's batch input: the exec string if set, otherwise
    /// the script file. Returns `None` when neither is set and the caller
    /// should go interactive.
    pub async fn run_batch(&mut self) -> Option<Outcome> {
        if let Some(text) = self.session.exec_string.clone() {
            return Some(self.process_line(&text).await);
        }

        let path = self.session.file_name.clone()?;
        Some(match tokio::fs::read_to_string(&path).await {
            Ok(text) => {
                info!("Processing file {}", path.display());
                self.process_line(&text).await
            }
            Err(e) => {
                self.session
                    .print_error(&format!("Could not open input file for reading. ({e})"));
                Outcome::Exit(UNREADABLE_FILE_CODE)
            }
        })
    }

    /// Runs the init files, silently.
    ///
    /// The explicitly configured files run if there are any; otherwise the
    /// default locations under `install_root` and `home` that exist. The
    /// first failing file ends the process with its code.
    pub async fn process_init_files(
        &mut self,
        install_root: Option<&Path>,
        home: Option<&Path>,
    ) -> Outcome {
        let files = if self.session.init_files.is_empty() {
            default_init_files(install_root, home)
                .into_iter()
                .filter(|path| path.exists())
                .collect()
        } else {
            self.session.init_files.clone()
        };

        let saved_silent = self.session.silent;
        self.session.silent = true;
        let mut outcome = Outcome::Code(0);
        for file in files {
            debug!("Running init file {}", file.display());
            let result = match self.process_file(&file).await {
                Ok(result) => result,
                Err(e) => {
                    self.session.report(&e);
                    Outcome::Code(e.response_code())
                }
            };
            match result {
                Outcome::Code(0) => {}
                Outcome::Code(code) | Outcome::Exit(code) => {
                    info!("Init file {} ended with {code}", file.display());
                    outcome = Outcome::Exit(code);
                    break;
                }
            }
        }
        self.session.silent = saved_silent;
        outcome
    }

    /// Dispatches one statement.
    async fn process_cmd(&mut self, statement: &str, depth: usize) -> Step {
        let command = CommandRouter::parse(statement);
        debug!("Dispatching {command:?}");

        match command {
            Command::Quit => Step::Exit(0),
            Command::Source(path) => match self.load_source(&path, depth) {
                Ok(text) => Step::Enter(text),
                Err(e) => {
                    self.session.report(&e);
                    Step::Done(e.response_code())
                }
            },
            Command::Shell(line) => Step::Done(handle_shell(&mut self.session, &line).await),
            Command::List { resource, values } => Step::Done(handle_list(
                &mut self.session,
                resource.as_deref(),
                &values,
            )),
            Command::Query(statement) => Step::Done(match &mut self.backend {
                Backend::Local(engine) => {
                    LocalExecutor::new(engine.as_ref())
                        .execute(&mut self.session, &statement)
                        .await
                }
                Backend::Remote(remote) => {
                    RemoteExecutor::new(remote.as_mut())
                        .execute(&mut self.session, &statement)
                        .await
                }
            }),
        }
    }

    fn load_source(&self, path: &str, depth: usize) -> Result<String> {
        if depth >= MAX_SOURCE_DEPTH {
            return Err(ShellError::usage(format!(
                "source nested deeper than {MAX_SOURCE_DEPTH} files at {path}"
            )));
        }
        if !Path::new(path).is_file() {
            return Err(ShellError::io(format!("File: {path} is not a file.")));
        }
        std::fs::read_to_string(path)
            .map_err(|e| ShellError::io(format!("Failed processing file {path} {e}")))
    }
}

/// Default init file locations: under the installation root, then home.
pub fn default_init_files(install_root: Option<&Path>, home: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Some(root) = install_root {
        files.push(root.join("bin").join(INIT_FILE_NAME));
    }
    if let Some(home) = home {
        files.push(home.join(INIT_FILE_NAME));
    }
    files
}
