//! Command classification and built-in handling for qsh.
//!
//! Parsing is kept apart from execution so that statement classification
//! can be unit tested without a backend.

pub mod handlers;
pub mod processors;
pub mod router;

pub use processors::Processor;
pub use router::{split_first_token, Command, CommandRouter};
