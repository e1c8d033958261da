//! The `bias on` sampling rewrite.
//!
//! A statement of the form
//!
//! ```text
//! select * from <table> bias on <col>[,<col>]* limit=<n>
//! ```
//!
//! is not run as written. A grouped count per key is run first, with its
//! rows captured to a side file. Each side-file line then yields a
//! `DROP TABLE` and `CREATE TABLE ... AS` pair building one sample table
//! per distinct key. Keys seen more than `n` times get a `samplewith`
//! ratio of `n / frequency`.
//!
//! The statement is taken apart positionally; no SQL parsing is done.

use crate::error::{Result, ShellError};

/// Marker phrase selecting the rewrite.
pub const BIAS_MARKER: &str = "bias on";

/// Marker introducing the per-key row limit.
pub const LIMIT_MARKER: &str = "limit=";

const SAMPLE_TABLE_PREFIX: &str = "qsh_sample";

fn usage() -> ShellError {
    ShellError::usage(format!(
        "select * from <table> {BIAS_MARKER} <column>[,<column>]* {LIMIT_MARKER}<n>"
    ))
}

/// Byte offset of the first case-insensitive occurrence of the bias marker.
fn find_marker(text: &str) -> Option<usize> {
    text.to_ascii_lowercase().find(BIAS_MARKER)
}

/// Returns true if `statement` asks for the sampling rewrite.
pub fn is_biased(statement: &str) -> bool {
    find_marker(statement).is_some()
}

/// A parsed `bias on` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct BiasedSample {
    /// The statement without the limit clause.
    command: String,
    /// Everything before the bias marker.
    base: String,
    /// The column list as written after the marker.
    columns_text: String,
    columns: Vec<String>,
    per_key_limit: f64,
}

impl BiasedSample {
    pub fn parse(statement: &str) -> Result<Self> {
        let (command, limit) = statement.split_once(LIMIT_MARKER).ok_or_else(usage)?;
        let limit = limit.split(LIMIT_MARKER).next().unwrap_or_default();
        let per_key_limit: f64 = limit.trim().parse().map_err(|_| usage())?;

        let at = find_marker(command).ok_or_else(usage)?;
        let base = &command[..at];
        let columns_text = &command[at + BIAS_MARKER.len()..];
        let columns: Vec<String> = columns_text
            .split(',')
            .map(|c| c.trim().to_string())
            .collect();
        if columns.iter().any(String::is_empty) {
            return Err(usage());
        }

        Ok(Self {
            command: command.to_string(),
            base: base.to_string(),
            columns_text: columns_text.to_string(),
            columns,
            per_key_limit,
        })
    }

    /// The grouped query producing one `key...\tcount` line per distinct key.
    pub fn summary_query(&self) -> String {
        let counted = self
            .command
            .replace('*', &format!("{},count(*)", self.columns_text));
        let head = match find_marker(&counted) {
            Some(at) => &counted[..at],
            None => counted.as_str(),
        };
        format!("{head} group by {}", self.columns_text)
    }

    /// The table sampled from: the last word before the marker.
    pub fn table_name(&self) -> &str {
        self.base.split_whitespace().last().unwrap_or_default()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn per_key_limit(&self) -> f64 {
        self.per_key_limit
    }

    /// Builds the drop and create statements for one side-file line.
    pub fn sample_statements(&self, key_line: &str) -> Result<(String, String)> {
        let fields: Vec<&str> = key_line.split('\t').collect();
        let frequency: f64 = fields
            .get(self.columns.len())
            .and_then(|f| f.trim().parse().ok())
            .ok_or_else(|| {
                ShellError::usage(format!("malformed key summary line: {key_line}"))
            })?;

        let mut table = sanitize_table_name(&format!(
            "{SAMPLE_TABLE_PREFIX}_{}_{}",
            self.table_name(),
            self.per_key_limit as i64
        ));
        let mut conditions = Vec::with_capacity(self.columns.len());
        for (column, key) in self.columns.iter().zip(&fields) {
            let key = key.trim();
            conditions.push(format!("{column} = {key}"));
            table.push_str(&format!("_{column}_{key}"));
        }

        let mut query = format!("{} where {}", self.base, conditions.join(" AND "));
        if self.per_key_limit < frequency {
            query.push_str(&format!(" samplewith {}", self.per_key_limit / frequency));
        }

        Ok((
            format!("DROP TABLE {table}"),
            format!("CREATE TABLE {table} AS {query}"),
        ))
    }
}

/// Makes a generated table name safe: `.` becomes `POINT`, quotes vanish.
pub fn sanitize_table_name(name: &str) -> String {
    name.replace('.', "POINT").replace('"', "")
}
