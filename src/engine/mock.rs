//! Scriptable backends for testing.
//!
//! Both mocks are cheap to clone and share their state, so a test can hand
//! one clone to the interpreter and inspect the other afterwards.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{QueryEngine, QueryProcessor, RemoteSession, Response};
use crate::error::{Result, ShellError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Scripted outcome of one statement on [`MockEngine`].
#[derive(Debug, Clone, Default)]
pub struct MockResult {
    schema: Vec<String>,
    rows: Vec<String>,
    run: Option<(i32, String)>,
    close_code: i32,
    fail_after: Option<(usize, String)>,
}

impl MockResult {
    /// A statement producing `rows` under the field names `schema`.
    pub fn rows(schema: &[&str], rows: &[&str]) -> Self {
        Self {
            schema: schema.iter().map(|s| s.to_string()).collect(),
            rows: rows.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    /// A statement rejected by `run` with `code`.
    pub fn failure(code: i32, message: &str) -> Self {
        Self {
            run: Some((code, message.to_string())),
            ..Self::default()
        }
    }

    /// Makes `close` report `code`.
    pub fn with_close_code(mut self, code: i32) -> Self {
        self.close_code = code;
        self
    }

    /// Makes result retrieval fail after `count` rows were handed out.
    pub fn failing_after(mut self, count: usize, message: &str) -> Self {
        self.fail_after = Some((count, message.to_string()));
        self
    }
}

#[derive(Debug, Default)]
struct EngineState {
    scripts: HashMap<String, MockResult>,
    executed: Vec<String>,
    closed: usize,
}

/// A local engine answering from a script.
///
/// Statements without a script succeed with no rows.
#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    state: Arc<Mutex<EngineState>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the outcome of `statement`.
    pub fn on(self, statement: &str, result: MockResult) -> Self {
        lock(&self.state)
            .scripts
            .insert(statement.to_string(), result);
        self
    }

    /// Statements passed to `run`, in order.
    pub fn executed(&self) -> Vec<String> {
        lock(&self.state).executed.clone()
    }

    /// Number of processors closed so far.
    pub fn closed(&self) -> usize {
        lock(&self.state).closed
    }
}

impl QueryEngine for MockEngine {
    fn processor(&self) -> Box<dyn QueryProcessor> {
        Box::new(MockProcessor {
            state: Arc::clone(&self.state),
            current: MockResult::default(),
            handed_out: 0,
            done: true,
        })
    }
}

struct MockProcessor {
    state: Arc<Mutex<EngineState>>,
    current: MockResult,
    handed_out: usize,
    done: bool,
}

#[async_trait]
impl QueryProcessor for MockProcessor {
    async fn run(&mut self, statement: &str) -> Response {
        let script = {
            let mut state = lock(&self.state);
            state.executed.push(statement.to_string());
            state.scripts.get(statement).cloned().unwrap_or_default()
        };
        self.handed_out = 0;
        self.done = false;
        self.current = script;
        match &self.current.run {
            Some((code, message)) => {
                self.done = true;
                Response::failed(*code, message.clone())
            }
            None => Response::ok(),
        }
    }

    async fn get_results(&mut self, rows: &mut Vec<String>) -> Result<bool> {
        if self.done {
            return Ok(false);
        }
        let limit = match &self.current.fail_after {
            Some((count, message)) if self.handed_out >= *count => {
                self.done = true;
                return Err(ShellError::query(message.clone()));
            }
            Some((count, _)) => (*count).min(self.current.rows.len()),
            None => self.current.rows.len(),
        };
        rows.extend(self.current.rows[self.handed_out..limit].iter().cloned());
        let appended = limit - self.handed_out;
        self.handed_out = limit;
        if self.current.fail_after.is_none() {
            self.done = true;
        }
        Ok(appended > 0)
    }

    fn schema(&self) -> &[String] {
        &self.current.schema
    }

    async fn close(&mut self) -> i32 {
        lock(&self.state).closed += 1;
        self.done = true;
        self.current.close_code
    }
}

/// A scripted remote failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    Server(i32, String),
    Transport(String),
}

impl MockFailure {
    fn to_error(&self) -> ShellError {
        match self {
            Self::Server(code, message) => ShellError::server(*code, message.clone()),
            Self::Transport(message) => ShellError::transport(message.clone()),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct RemoteScript {
    lines: Vec<String>,
    on_execute: Option<MockFailure>,
    after_lines: Option<MockFailure>,
}

#[derive(Debug, Default)]
struct RemoteState {
    scripts: HashMap<String, RemoteScript>,
    executed: Vec<String>,
    fetch_calls: usize,
    clean_calls: usize,
    fail_clean: bool,
}

/// A remote session answering from a script.
#[derive(Debug, Clone, Default)]
pub struct MockRemote {
    state: Arc<Mutex<RemoteState>>,
    lines: Arc<Mutex<VecDeque<String>>>,
    after_lines: Arc<Mutex<Option<MockFailure>>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(self, statement: &str, script: RemoteScript) -> Self {
        lock(&self.state)
            .scripts
            .insert(statement.to_string(), script);
        self
    }

    /// `statement` produces `lines`.
    pub fn on_lines(self, statement: &str, lines: &[&str]) -> Self {
        let lines = lines.iter().map(|s| s.to_string()).collect();
        self.script(
            statement,
            RemoteScript {
                lines,
                ..RemoteScript::default()
            },
        )
    }

    /// `statement` produces `lines`, then fetching past them fails.
    pub fn on_lines_then(self, statement: &str, lines: &[&str], failure: MockFailure) -> Self {
        let lines = lines.iter().map(|s| s.to_string()).collect();
        self.script(
            statement,
            RemoteScript {
                lines,
                on_execute: None,
                after_lines: Some(failure),
            },
        )
    }

    /// `statement` is rejected by the server with `code`.
    pub fn on_server_error(self, statement: &str, code: i32, message: &str) -> Self {
        self.script(
            statement,
            RemoteScript {
                on_execute: Some(MockFailure::Server(code, message.to_string())),
                ..RemoteScript::default()
            },
        )
    }

    /// Executing `statement` fails in transport.
    pub fn on_transport_error(self, statement: &str, message: &str) -> Self {
        self.script(
            statement,
            RemoteScript {
                on_execute: Some(MockFailure::Transport(message.to_string())),
                ..RemoteScript::default()
            },
        )
    }

    /// Makes every `clean` fail in transport.
    pub fn failing_clean(self) -> Self {
        lock(&self.state).fail_clean = true;
        self
    }

    /// Statements passed to `execute`, in order.
    pub fn executed(&self) -> Vec<String> {
        lock(&self.state).executed.clone()
    }

    pub fn fetch_calls(&self) -> usize {
        lock(&self.state).fetch_calls
    }

    pub fn clean_calls(&self) -> usize {
        lock(&self.state).clean_calls
    }
}

#[async_trait]
impl RemoteSession for MockRemote {
    async fn execute(&mut self, statement: &str) -> Result<()> {
        let script = {
            let mut state = lock(&self.state);
            state.executed.push(statement.to_string());
            state.scripts.get(statement).cloned().unwrap_or_default()
        };
        if let Some(failure) = &script.on_execute {
            return Err(failure.to_error());
        }
        *lock(&self.lines) = script.lines.into_iter().collect();
        *lock(&self.after_lines) = script.after_lines;
        Ok(())
    }

    async fn fetch_n(&mut self, max_lines: usize) -> Result<Vec<String>> {
        lock(&self.state).fetch_calls += 1;
        let mut lines = lock(&self.lines);
        if lines.is_empty() {
            if let Some(failure) = lock(&self.after_lines).take() {
                return Err(failure.to_error());
            }
        }
        let n = max_lines.min(lines.len());
        Ok(lines.drain(..n).collect())
    }

    async fn clean(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        state.clean_calls += 1;
        lock(&self.lines).clear();
        lock(&self.after_lines).take();
        if state.fail_clean {
            return Err(ShellError::transport("clean failed"));
        }
        Ok(())
    }
}
