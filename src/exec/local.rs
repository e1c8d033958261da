//! Local statement execution.
//!
//! Drives one statement through the in-process engine: administrative
//! processors first, then the query engine with header printing and
//! incremental result streaming.

use std::io;
use std::path::Path;
use std::time::Instant;

use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info};

use super::sampling::{self, BiasedSample};
use crate::commands::{split_first_token, Processor};
use crate::engine::QueryEngine;
use crate::error::ShellError;
use crate::session::Session;

/// Executes statements against a local engine.
pub struct LocalExecutor<'a> {
    engine: &'a dyn QueryEngine,
}

impl<'a> LocalExecutor<'a> {
    pub fn new(engine: &'a dyn QueryEngine) -> Self {
        Self { engine }
    }

    /// Executes one statement and returns its response code.
    pub async fn execute(&self, session: &mut Session, statement: &str) -> i32 {
        if session.sampling_enabled() && sampling::is_biased(statement) {
            return self.execute_sampled(session, statement).await;
        }
        self.run_statement(session, statement, None).await
    }

    /// Runs the sampling rewrite of a `bias on` statement.
    async fn execute_sampled(&self, session: &mut Session, statement: &str) -> i32 {
        let sample = match BiasedSample::parse(statement) {
            Ok(sample) => sample,
            Err(e) => {
                session.report(&e);
                return e.response_code();
            }
        };
        info!(
            "Building biased samples of {} on {:?}",
            sample.table_name(),
            sample.columns()
        );

        let summary_file = session.key_summary_file.clone();
        let ret = self
            .run_statement(session, &sample.summary_query(), Some(summary_file.as_path()))
            .await;
        if ret != 0 {
            return ret;
        }

        let summary = match tokio::fs::read_to_string(&summary_file).await {
            Ok(summary) => summary,
            Err(e) => {
                let e = ShellError::io(format!("{}: {e}", summary_file.display()));
                session.report(&e);
                return e.response_code();
            }
        };

        let mut ret = 0;
        for line in summary.lines().filter(|l| !l.trim().is_empty()) {
            let (drop, create) = match sample.sample_statements(line) {
                Ok(pair) => pair,
                Err(e) => {
                    session.report(&e);
                    return e.response_code();
                }
            };
            for derived in [drop, create] {
                let _ = session.println(&derived);
                ret = self.run_statement(session, &derived, None).await;
            }
        }
        ret
    }

    /// Runs one statement, copying result rows to `side_file` as well when given.
    pub async fn run_statement(
        &self,
        session: &mut Session,
        statement: &str,
        side_file: Option<&Path>,
    ) -> i32 {
        let (token, args) = split_first_token(statement);
        if let Some(processor) = Processor::resolve(token, args) {
            if session.verbose {
                let _ = session.println(&format!("{token} {args}"));
            }
            return processor.run(session, args);
        }

        let start = Instant::now();
        if session.verbose {
            let _ = session.println(statement);
        }

        let mut processor = self.engine.processor();
        let response = processor.run(statement).await;
        if !response.is_ok() {
            let message = response.message.unwrap_or_default();
            session.report(&ShellError::query(message));
            processor.close().await;
            return response.code;
        }

        if session.print_header() && !processor.schema().is_empty() {
            let header = processor.schema().join("\t");
            let _ = session.println(&header);
        }

        let mut ret = 0;
        let mut side = match side_file {
            Some(path) => match File::create(path).await {
                Ok(file) => Some(BufWriter::new(file)),
                Err(e) => {
                    session.report(&ShellError::io(format!("Cannot write key summary: {e}")));
                    ret = 1;
                    None
                }
            },
            None => None,
        };

        let mut rows = Vec::new();
        let mut streamed = 0usize;
        'drain: loop {
            match processor.get_results(&mut rows).await {
                Ok(true) => {
                    for row in rows.drain(..) {
                        if session.println(&row).is_err() {
                            debug!("Output closed, abandoning remaining rows");
                            break 'drain;
                        }
                        streamed += 1;
                        let Some(writer) = side.as_mut() else {
                            continue;
                        };
                        if let Err(e) = write_line(writer, &row).await {
                            session.report(&ShellError::io(format!(
                                "Cannot write key summary: {e}"
                            )));
                            ret = 1;
                            side = None;
                        }
                    }
                }
                Ok(false) => break,
                Err(e) => {
                    session.report(&e);
                    ret = e.response_code();
                    break;
                }
            }
        }
        if let Some(mut writer) = side.take() {
            if let Err(e) = writer.flush().await {
                session.report(&ShellError::io(format!("Cannot write key summary: {e}")));
                ret = 1;
            }
        }

        let close_code = processor.close().await;
        if ret == 0 {
            ret = close_code;
        }

        let elapsed = start.elapsed();
        debug!("Streamed {streamed} rows in {elapsed:?}");
        if elapsed.as_millis() > 0 {
            let seconds = elapsed.as_millis() as f64 / 1000.0;
            session.print_info(&format!("Time taken: {seconds} seconds"));
        }
        ret
    }
}

/// Appends `row` and a newline to the side file.
async fn write_line(writer: &mut BufWriter<File>, row: &str) -> io::Result<()> {
    writer.write_all(row.as_bytes()).await?;
    writer.write_all(b"\n").await
}
