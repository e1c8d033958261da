//! The `!` shell escape.
//!
//! The command line is handed to the platform shell. Its stdout and stderr
//! are copied to the session's sinks while the child runs; both copies
//! finish before the exit status is returned.

use std::io::{self, Write};
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::ShellError;
use crate::session::Session;

const DRAIN_BUFFER_SIZE: usize = 8192;

/// Runs `line` and returns its exit status as the response code.
pub async fn handle_shell(session: &mut Session, line: &str) -> i32 {
    match run(session, line).await {
        Ok(code) => code,
        Err(e) => {
            session.report(&e);
            e.response_code()
        }
    }
}

fn shell_command(line: &str) -> Command {
    #[cfg(unix)]
    let mut command = {
        let mut command = Command::new("sh");
        command.arg("-c").arg(line);
        command
    };
    #[cfg(not(unix))]
    let mut command = {
        let mut command = Command::new("cmd");
        command.arg("/C").arg(line);
        command
    };
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    command
}

async fn run(session: &mut Session, line: &str) -> Result<i32, ShellError> {
    session.flush();
    let mut child = shell_command(line)
        .spawn()
        .map_err(|e| ShellError::subprocess(format!("Failed to run '{line}': {e}")))?;
    info!("Spawned shell command (pid {:?})", child.id());

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let (out, err) = session.sinks();
    let (out_copied, err_copied, status) =
        tokio::join!(drain(stdout, out), drain(stderr, err), child.wait());

    let status =
        status.map_err(|e| ShellError::subprocess(format!("Failed to wait for child: {e}")))?;
    for copied in [out_copied, err_copied] {
        if let Err(e) = copied {
            debug!("Child output copy ended early: {e}");
        }
    }
    session.flush();

    match status.code() {
        Some(0) => Ok(0),
        Some(code) => {
            session.report(&ShellError::subprocess(format!(
                "Command failed with exit code = {code}"
            )));
            Ok(code)
        }
        None => Err(ShellError::subprocess("Command terminated by signal")),
    }
}

/// Copies a child stream into a sink until end of stream.
async fn drain<R>(reader: Option<R>, sink: &mut (dyn Write + Send)) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Ok(());
    };
    let mut buf = vec![0u8; DRAIN_BUFFER_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        sink.write_all(&buf[..n])?;
    }
    sink.flush()
}
