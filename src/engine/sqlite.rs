//! In-process SQLite engine.
//!
//! Provides `SqliteEngine`, the local backend. Each statement runs on a
//! spawned task that streams rendered rows over a bounded channel, so a
//! result set is never held in memory as a whole.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Executor, Row, Statement, TypeInfo, ValueRef};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{QueryEngine, QueryProcessor, Response, COMPILE_ERROR_CODE, EXECUTION_ERROR_CODE};
use crate::error::{Result, ShellError};

/// Database name selecting a private in-memory database.
pub const MEMORY_DATABASE: &str = ":memory:";

/// Rows buffered between the streaming task and the reader.
const ROW_CHANNEL_CAPACITY: usize = 256;

/// Maximum rows handed out by one `get_results` call.
const FETCH_BATCH_SIZE: usize = 100;

/// Local SQLite engine.
#[derive(Debug, Clone)]
pub struct SqliteEngine {
    pool: SqlitePool,
}

impl SqliteEngine {
    /// Opens the database at `database`, or an in-memory one for `:memory:`.
    ///
    /// The pool keeps exactly one connection alive for the whole session so
    /// that an in-memory database is not lost between statements.
    pub async fn open(database: &str) -> Result<Self> {
        let options = if database.is_empty() || database == MEMORY_DATABASE {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| ShellError::config(format!("Invalid local database: {e}")))?
        } else {
            SqliteConnectOptions::new()
                .filename(database)
                .create_if_missing(true)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await
            .map_err(|e| ShellError::query(format!("Failed to open local database: {e}")))?;

        info!("Local engine opened ({})", display_name(database));
        Ok(Self { pool })
    }

    /// Closes the underlying pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl QueryEngine for SqliteEngine {
    fn processor(&self) -> Box<dyn QueryProcessor> {
        Box::new(SqliteProcessor::new(self.pool.clone()))
    }
}

fn display_name(database: &str) -> &str {
    if database.is_empty() {
        MEMORY_DATABASE
    } else {
        database
    }
}

/// Events sent from the streaming task.
enum RowEvent {
    Row(String),
    Failed(String),
}

/// Handle for one statement on the SQLite engine.
struct SqliteProcessor {
    pool: SqlitePool,
    schema: Vec<String>,
    rows: Option<mpsc::Receiver<RowEvent>>,
    pending: Option<String>,
    failure: Option<String>,
    task: Option<JoinHandle<()>>,
}

impl SqliteProcessor {
    fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            schema: Vec::new(),
            rows: None,
            pending: None,
            failure: None,
            task: None,
        }
    }
}

#[async_trait]
impl QueryProcessor for SqliteProcessor {
    async fn run(&mut self, statement: &str) -> Response {
        self.close().await;

        let prepared = match (&self.pool).prepare(statement).await {
            Ok(prepared) => prepared,
            Err(e) => {
                debug!("Prepare failed: {e}");
                return Response::failed(COMPILE_ERROR_CODE, describe_error(&e));
            }
        };
        self.schema = prepared
            .columns()
            .iter()
            .map(|col| col.name().to_string())
            .collect();

        let (tx, mut rx) = mpsc::channel(ROW_CHANNEL_CAPACITY);
        let pool = self.pool.clone();
        let sql = statement.to_string();
        self.task = Some(tokio::spawn(stream_rows(pool, sql, tx)));

        // Row-less statements finish before the first event, so their
        // execution errors are known here.
        match rx.recv().await {
            Some(RowEvent::Failed(message)) => {
                self.close().await;
                Response::failed(EXECUTION_ERROR_CODE, message)
            }
            Some(RowEvent::Row(row)) => {
                self.pending = Some(row);
                self.rows = Some(rx);
                Response::ok()
            }
            None => Response::ok(),
        }
    }

    async fn get_results(&mut self, rows: &mut Vec<String>) -> Result<bool> {
        if let Some(message) = self.failure.take() {
            return Err(ShellError::query(message));
        }
        if let Some(row) = self.pending.take() {
            rows.push(row);
        }
        let Some(rx) = self.rows.as_mut() else {
            return Ok(!rows.is_empty());
        };

        let mut finished = false;
        while rows.len() < FETCH_BATCH_SIZE {
            let event = if rows.is_empty() {
                rx.recv().await
            } else {
                match rx.try_recv() {
                    Ok(event) => Some(event),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => None,
                }
            };
            match event {
                Some(RowEvent::Row(row)) => rows.push(row),
                Some(RowEvent::Failed(message)) => {
                    finished = true;
                    if rows.is_empty() {
                        self.rows = None;
                        return Err(ShellError::query(message));
                    }
                    // Hand out what arrived first; the failure surfaces next call.
                    self.failure = Some(message);
                    break;
                }
                None => {
                    finished = true;
                    break;
                }
            }
        }
        if finished {
            self.rows = None;
        }
        Ok(!rows.is_empty())
    }

    fn schema(&self) -> &[String] {
        &self.schema
    }

    async fn close(&mut self) -> i32 {
        self.rows = None;
        self.pending = None;
        self.failure = None;
        let Some(task) = self.task.take() else {
            return 0;
        };
        task.abort();
        match task.await {
            Err(e) if e.is_panic() => 1,
            _ => 0,
        }
    }
}

/// Runs one statement and forwards its rows until done or the reader leaves.
async fn stream_rows(pool: SqlitePool, sql: String, tx: mpsc::Sender<RowEvent>) {
    let mut rows = sqlx::query(&sql).fetch(&pool);
    loop {
        let event = match rows.try_next().await {
            Ok(Some(row)) => RowEvent::Row(render_row(&row)),
            Ok(None) => break,
            Err(e) => RowEvent::Failed(describe_error(&e)),
        };
        let failed = matches!(event, RowEvent::Failed(_));
        if tx.send(event).await.is_err() || failed {
            break;
        }
    }
}

/// Renders a row as tab-separated text.
fn render_row(row: &SqliteRow) -> String {
    (0..row.len())
        .map(|i| render_value(row, i))
        .collect::<Vec<_>>()
        .join("\t")
}

/// Renders one value using its storage class.
fn render_value(row: &SqliteRow, index: usize) -> String {
    let type_name = match row.try_get_raw(index) {
        Ok(raw) if !raw.is_null() => raw.type_info().name().to_uppercase(),
        _ => return "NULL".to_string(),
    };

    let rendered = match type_name.as_str() {
        "INTEGER" | "INT4" | "INT8" | "BOOLEAN" => row
            .try_get_unchecked::<i64, _>(index)
            .map(|v| v.to_string()),
        "REAL" => row
            .try_get_unchecked::<f64, _>(index)
            .map(|v| v.to_string()),
        "BLOB" => row
            .try_get_unchecked::<Vec<u8>, _>(index)
            .map(|v| format!("<{} bytes>", v.len())),
        _ => row.try_get_unchecked::<String, _>(index),
    };
    rendered.unwrap_or_else(|_| "NULL".to_string())
}

/// Extracts the engine's own message from a sqlx error.
fn describe_error(error: &sqlx::Error) -> String {
    match error {
        sqlx::Error::Database(db) => db.message().to_string(),
        other => other.to_string(),
    }
}
