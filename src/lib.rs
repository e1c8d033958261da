//! qsh - An interactive query shell with local and remote execution.
//!
//! This library exposes the core modules for use by the binary and the
//! integration tests.

pub mod cli;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod exec;
pub mod interpreter;
pub mod logging;
pub mod repl;
pub mod session;
pub mod splitter;
