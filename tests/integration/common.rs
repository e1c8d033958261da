//! Shared helpers for the integration tests.

use qsh::engine::{Backend, MockEngine, MockRemote, SqliteEngine};
use qsh::interpreter::Interpreter;
use qsh::session::{ExecutionMode, Session, SharedBuffer};

/// An interpreter with captured output and error sinks.
pub struct Harness {
    pub interp: Interpreter,
    pub out: SharedBuffer,
    pub err: SharedBuffer,
}

fn silent_session(mode: ExecutionMode) -> (Session, SharedBuffer, SharedBuffer) {
    let out = SharedBuffer::new();
    let err = SharedBuffer::new();
    let mut session = Session::new(mode, out.sink(), err.sink());
    session.silent = true;
    (session, out, err)
}

/// Local mode over the given mock engine.
pub fn with_mock(engine: &MockEngine) -> Harness {
    let (session, out, err) = silent_session(ExecutionMode::Local);
    let interp = Interpreter::new(session, Backend::Local(Box::new(engine.clone())));
    Harness { interp, out, err }
}

/// Local mode over a fresh in-memory SQLite database.
pub async fn with_sqlite() -> Harness {
    let engine = SqliteEngine::open(":memory:")
        .await
        .expect("in-memory database opens");
    let (session, out, err) = silent_session(ExecutionMode::Local);
    let interp = Interpreter::new(session, Backend::Local(Box::new(engine)));
    Harness { interp, out, err }
}

/// Remote mode over the given mock session.
pub fn with_remote(remote: &MockRemote) -> Harness {
    let mode = ExecutionMode::Remote {
        host: "warehouse".to_string(),
        port: 10000,
    };
    let (session, out, err) = silent_session(mode);
    let interp = Interpreter::new(session, Backend::Remote(Box::new(remote.clone())));
    Harness { interp, out, err }
}
