//! Statement execution for qsh.
//!
//! One adapter per backend kind. Both take a statement that is not a
//! built-in, stream its output to the session and return a response code.

pub mod local;
pub mod remote;
pub mod sampling;

pub use local::LocalExecutor;
pub use remote::{RemoteExecutor, LINES_TO_FETCH};
pub use sampling::BiasedSample;
