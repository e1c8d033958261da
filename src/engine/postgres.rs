//! PostgreSQL remote session.
//!
//! Queries are paged through a server-side cursor so that a large result
//! set is fetched a page at a time. Other statements run directly and
//! their (usually empty) output is buffered.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use sqlparser::ast::Statement;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::{ConnectOptions, Connection, Executor, Row};
use tracing::{debug, warn};

use super::RemoteSession;
use crate::config::ConnectionConfig;
use crate::error::{Result, ShellError};

/// Maximum number of connection retry attempts.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// Name of the cursor used to page query results.
const CURSOR_NAME: &str = "qsh_cursor";

/// Where the rows of the last statement come from.
#[derive(Debug, Default)]
enum Pending {
    #[default]
    Idle,
    /// Rows are read from the open cursor.
    Cursor { owns_transaction: bool },
    /// Rows were returned all at once and are served from memory.
    Buffered(VecDeque<String>),
}

/// A session on a PostgreSQL server over one dedicated connection.
pub struct PostgresSession {
    conn: PgConnection,
    pending: Pending,
    /// Set while the user has an explicit transaction open.
    user_transaction: bool,
    host: String,
    port: u16,
}

impl PostgresSession {
    /// Connects to the server described by `config`, retrying transient
    /// failures with exponential backoff.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let conn_str = config.to_connection_string()?;
        let options: PgConnectOptions = conn_str
            .parse()
            .map_err(|e| ShellError::config(format!("Invalid connection string: {e}")))?;
        let options = options.disable_statement_logging();

        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);
        let mut attempt = 1;
        let conn = loop {
            debug!("Connection attempt {} of {}", attempt, MAX_RETRY_ATTEMPTS);
            match PgConnection::connect_with(&options).await {
                Ok(conn) => break conn,
                Err(e) if attempt < MAX_RETRY_ATTEMPTS && is_transient_error(&e) => {
                    warn!(
                        "Connection attempt {} failed (transient error), retrying in {:?}",
                        attempt, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(map_connection_error(e, config)),
            }
        };

        debug!("Connected to {}", config.display_string());
        Ok(Self {
            conn,
            pending: Pending::Idle,
            user_transaction: false,
            host: config.host.clone().unwrap_or_else(|| "localhost".to_string()),
            port: config.port,
        })
    }

    /// Host this session is connected to.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port this session is connected to.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Closes the connection.
    pub async fn close(self) -> Result<()> {
        self.conn.close().await.map_err(map_error)
    }

    /// Runs `sql` without bind arguments, so it goes over the simple query
    /// protocol and every column comes back in text format.
    async fn simple(&mut self, sql: &str) -> Result<Vec<PgRow>> {
        Executor::fetch_all(&mut self.conn, sql)
            .await
            .map_err(map_error)
    }

    async fn open_cursor(&mut self, statement: &str) -> Result<()> {
        let owns_transaction = !self.user_transaction;
        if owns_transaction {
            self.simple("BEGIN").await?;
        }
        self.pending = Pending::Cursor { owns_transaction };
        let declare = format!("DECLARE {CURSOR_NAME} NO SCROLL CURSOR FOR {statement}");
        self.simple(&declare).await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteSession for PostgresSession {
    async fn execute(&mut self, statement: &str) -> Result<()> {
        self.clean().await?;

        match classify(statement) {
            StatementKind::Query => self.open_cursor(statement).await,
            kind => {
                let rows = self.simple(statement).await?;
                match kind {
                    StatementKind::Begin => self.user_transaction = true,
                    StatementKind::End => self.user_transaction = false,
                    _ => {}
                }
                self.pending = Pending::Buffered(rows.iter().map(render_row).collect());
                Ok(())
            }
        }
    }

    async fn fetch_n(&mut self, max_lines: usize) -> Result<Vec<String>> {
        if let Pending::Cursor { .. } = self.pending {
            let fetch = format!("FETCH FORWARD {max_lines} FROM {CURSOR_NAME}");
            let rows = self.simple(&fetch).await?;
            return Ok(rows.iter().map(render_row).collect());
        }
        match &mut self.pending {
            Pending::Buffered(lines) => {
                let n = max_lines.min(lines.len());
                Ok(lines.drain(..n).collect())
            }
            _ => Ok(Vec::new()),
        }
    }

    async fn clean(&mut self) -> Result<()> {
        match std::mem::take(&mut self.pending) {
            Pending::Cursor {
                owns_transaction: true,
            } => {
                // Ends the transaction whether or not it was aborted.
                self.simple("COMMIT").await?;
            }
            Pending::Cursor {
                owns_transaction: false,
            } => {
                self.simple(&format!("CLOSE {CURSOR_NAME}")).await?;
            }
            Pending::Idle | Pending::Buffered(_) => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatementKind {
    Query,
    Begin,
    End,
    Other,
}

/// Decides how a statement is run. Anything that does not parse is sent
/// as-is so the server can report on it.
fn classify(statement: &str) -> StatementKind {
    let Ok(parsed) = Parser::parse_sql(&PostgreSqlDialect {}, statement) else {
        return StatementKind::Other;
    };
    match parsed.as_slice() {
        [Statement::Query(_)] => StatementKind::Query,
        [Statement::StartTransaction { .. }] => StatementKind::Begin,
        [Statement::Commit { .. }] | [Statement::Rollback { .. }] => StatementKind::End,
        _ => StatementKind::Other,
    }
}

/// Renders a row as tab-separated text. Simple-protocol results arrive in
/// text format, so every value decodes as a string.
fn render_row(row: &PgRow) -> String {
    (0..row.len())
        .map(|i| {
            row.try_get_unchecked::<Option<String>, _>(i)
                .ok()
                .flatten()
                .unwrap_or_else(|| "NULL".to_string())
        })
        .collect::<Vec<_>>()
        .join("\t")
}

/// Derives a numeric response code from a SQLSTATE: its class, the first
/// two characters. Classes that are not numeric, or class 00, map to 1.
pub fn sqlstate_code(sqlstate: &str) -> i32 {
    sqlstate
        .get(..2)
        .and_then(|class| class.parse::<i32>().ok())
        .filter(|code| *code != 0)
        .unwrap_or(1)
}

/// Splits sqlx errors into server-reported and transport failures.
fn map_error(error: sqlx::Error) -> ShellError {
    match error {
        sqlx::Error::Database(db) => {
            let code = db.code().map(|c| sqlstate_code(&c)).unwrap_or(1);
            ShellError::server(code, db.message())
        }
        other => ShellError::transport(other.to_string()),
    }
}

/// Determines if an error is transient and worth retrying.
fn is_transient_error(error: &sqlx::Error) -> bool {
    let error_str = error.to_string().to_lowercase();

    [
        "connection refused",
        "timed out",
        "timeout",
        "temporarily unavailable",
        "connection reset",
        "broken pipe",
    ]
    .iter()
    .any(|needle| error_str.contains(needle))
}

/// Maps connection failures to messages naming the target.
fn map_connection_error(error: sqlx::Error, config: &ConnectionConfig) -> ShellError {
    let host = config.host.as_deref().unwrap_or("localhost");
    let port = config.port;
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        ShellError::transport(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("authentication failed") {
        let user = config.user.as_deref().unwrap_or("unknown");
        ShellError::transport(format!("Authentication failed for user '{user}'."))
    } else {
        map_error(error)
    }
}
