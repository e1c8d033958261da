//! Administrative command processors.
//!
//! These run in place of the query engine when a local statement starts
//! with one of their tokens. They share the query path's response-code
//! contract but never produce result rows.

use std::path::Path;

use tracing::debug;

use crate::error::ShellError;
use crate::session::{ResourceType, Session};

/// A command handled by the shell rather than the query engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Processor {
    Set,
    Reset,
    Add,
    Delete,
}

impl Processor {
    /// Resolves a leading token, case-insensitively, given the text after it.
    ///
    /// `add` and `delete` are claimed only when followed by nothing or by a
    /// resource type, so SQL such as `DELETE FROM t` still reaches the engine.
    pub fn resolve(token: &str, args: &str) -> Option<Self> {
        let names_resource = || {
            args.split_whitespace()
                .next()
                .map_or(true, |kind| kind.parse::<ResourceType>().is_ok())
        };
        match token.to_lowercase().as_str() {
            "set" => Some(Self::Set),
            "reset" => Some(Self::Reset),
            "add" if names_resource() => Some(Self::Add),
            "delete" if names_resource() => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            Self::Set => "set",
            Self::Reset => "reset",
            Self::Add => "add",
            Self::Delete => "delete",
        }
    }

    /// Runs the processor on the text after its token.
    pub fn run(&self, session: &mut Session, args: &str) -> i32 {
        debug!("Processor {} with {:?}", self.token(), args);
        let result = match self {
            Self::Set => set(session, args),
            Self::Reset => {
                session.reset_vars();
                Ok(0)
            }
            Self::Add => add(session, args),
            Self::Delete => delete(session, args),
        };
        match result {
            Ok(code) => code,
            Err(e) => {
                session.report(&e);
                e.response_code()
            }
        }
    }
}

fn set(session: &mut Session, args: &str) -> Result<i32, ShellError> {
    let args = args.trim();
    if args.is_empty() {
        let lines: Vec<String> = session
            .vars()
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        for line in lines {
            session.println(&line)?;
        }
        return Ok(0);
    }

    match args.split_once('=') {
        Some((key, value)) => {
            let key = key.trim();
            if key.is_empty() {
                return Err(ShellError::usage("set [<key>[=<value>]]"));
            }
            session.set_var(key, value.trim());
        }
        None => {
            let line = match session.var(args) {
                Some(value) => format!("{args}={value}"),
                None => format!("{args} is undefined"),
            };
            session.println(&line)?;
        }
    }
    Ok(0)
}

fn resource_usage(command: &str) -> ShellError {
    ShellError::usage(format!(
        "{command} [{}] <value> [<value>]*",
        ResourceType::enumeration()
    ))
}

fn add(session: &mut Session, args: &str) -> Result<i32, ShellError> {
    let mut tokens = args.split_whitespace();
    let kind: ResourceType = tokens
        .next()
        .ok_or_else(|| resource_usage("add"))?
        .parse()
        .map_err(|_| resource_usage("add"))?;
    let values: Vec<&str> = tokens.collect();
    if values.is_empty() {
        return Err(resource_usage("add"));
    }

    let mut code = 0;
    for value in values {
        if !Path::new(value).exists() {
            session.report(&ShellError::io(format!("{value} does not exist")));
            code = 1;
            continue;
        }
        if session.resources_mut().add(kind, value) {
            session.print_info(&format!("Added resource: {value}"));
        }
    }
    Ok(code)
}

fn delete(session: &mut Session, args: &str) -> Result<i32, ShellError> {
    let mut tokens = args.split_whitespace();
    let kind: ResourceType = tokens
        .next()
        .ok_or_else(|| resource_usage("delete"))?
        .parse()
        .map_err(|_| resource_usage("delete"))?;
    let values: Vec<String> = tokens.map(String::from).collect();
    session.resources_mut().remove(kind, &values);
    Ok(0)
}
