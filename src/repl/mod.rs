//! Interactive loop for qsh.
//!
//! Reads lines with `rustyline`, gathers them until a line ends a
//! statement and hands the gathered text to the interpreter.

pub mod completion;

pub use completion::{CompletionSet, QshHelper};

use std::path::PathBuf;

use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{CompletionType, Config, EditMode, Editor};
use tracing::{debug, info, warn};

use crate::error::{Result, ShellError};
use crate::interpreter::{Interpreter, Outcome};
use crate::session::ExecutionMode;
use crate::splitter::ends_statement;

/// Default prompt text.
pub const DEFAULT_PROMPT: &str = "qsh";

/// History file name under the home directory.
pub const HISTORY_FILE: &str = ".qsh_history";

const MAX_HISTORY: usize = 10_000;

/// Primary and continuation prompts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    primary: String,
    continuation: String,
}

impl Prompt {
    /// Builds the prompts for `base`. Remote sessions show their endpoint.
    pub fn new(base: &str, mode: &ExecutionMode) -> Self {
        let primary = match mode {
            ExecutionMode::Local => format!("{base}> "),
            ExecutionMode::Remote { host, port } => format!("[{host}:{port}] {base}> "),
        };
        let continuation = " ".repeat(primary.chars().count());
        Self {
            primary,
            continuation,
        }
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }

    /// Blank prompt as wide as the primary one.
    pub fn continuation(&self) -> &str {
        &self.continuation
    }
}

/// Gathers physical lines into input units.
#[derive(Debug, Default)]
pub struct LineAccumulator {
    lines: Vec<String>,
}

impl LineAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a line. Returns the gathered text once the line ends a statement.
    pub fn push(&mut self, line: &str) -> Option<String> {
        if !self.is_pending() && line.trim().is_empty() {
            return None;
        }
        self.lines.push(line.to_string());
        if !ends_statement(line) {
            return None;
        }
        let text = self.lines.join("\n");
        self.lines.clear();
        Some(text)
    }

    /// True while a statement is being continued over several lines.
    pub fn is_pending(&self) -> bool {
        !self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

/// Feeds one physical line. Returns the outcome when a unit was processed.
pub async fn feed_line(
    interp: &mut Interpreter,
    acc: &mut LineAccumulator,
    line: &str,
) -> Option<Outcome> {
    let text = acc.push(line)?;
    Some(interp.process_line(&text).await)
}

/// Default location of the history file.
pub fn history_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(HISTORY_FILE))
}

/// Runs the interactive loop until end of input or an exit request.
///
/// Returns the code of the last processed unit.
pub async fn run_interactive(
    interp: &mut Interpreter,
    prompt: &Prompt,
    history: Option<PathBuf>,
) -> Result<Outcome> {
    let config = Config::builder()
        .max_history_size(MAX_HISTORY)
        .map_err(editor_error)?
        .history_ignore_dups(true)
        .map_err(editor_error)?
        .history_ignore_space(true)
        .completion_type(CompletionType::List)
        .edit_mode(EditMode::Emacs)
        .auto_add_history(false)
        .build();

    let mut rl: Editor<QshHelper, DefaultHistory> =
        Editor::with_config(config).map_err(editor_error)?;
    let completions = CompletionSet::with_sql_keywords(interp.backend().function_names());
    debug!("Loaded {} completion candidates", completions.len());
    rl.set_helper(Some(QshHelper::new(completions)));

    if let Some(path) = &history {
        if let Err(e) = rl.load_history(path) {
            debug!("No history loaded from {}: {e}", path.display());
        }
    }

    let mut acc = LineAccumulator::new();
    let mut ret = 0;
    let outcome = loop {
        let current = if acc.is_pending() {
            prompt.continuation()
        } else {
            prompt.primary()
        };
        match rl.readline(current) {
            Ok(line) => {
                let _ = rl.add_history_entry(line.as_str());
                match feed_line(interp, &mut acc, &line).await {
                    Some(Outcome::Exit(code)) => break Outcome::Exit(code),
                    Some(Outcome::Code(code)) => ret = code,
                    None => {}
                }
            }
            Err(ReadlineError::Interrupted) => {
                acc.clear();
            }
            Err(ReadlineError::Eof) => {
                info!("End of input");
                break Outcome::Code(ret);
            }
            Err(e) => {
                save_history(&mut rl, history.as_ref());
                return Err(editor_error(e));
            }
        }
    };

    save_history(&mut rl, history.as_ref());
    Ok(outcome)
}

fn save_history(rl: &mut Editor<QshHelper, DefaultHistory>, path: Option<&PathBuf>) {
    if let Some(path) = path {
        if let Err(e) = rl.save_history(path) {
            warn!("Failed to save history to {}: {e}", path.display());
        }
    }
}

fn editor_error(e: ReadlineError) -> ShellError {
    ShellError::internal(format!("Line editor failed: {e}"))
}
