//! Handlers for the built-in commands.
//!
//! Each handler writes to the session's sinks and returns a response code.

pub mod resources;
pub mod shell;

pub use resources::handle_list;
pub use shell::handle_shell;
