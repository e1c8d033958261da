//! Statement classification.
//!
//! Looks at the leading token of one statement and decides which path
//! handles it. Classification never fails: anything unrecognized is a
//! query for the active backend.

/// A classified statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Exit the process with status 0.
    Quit,
    /// Run the statements of a script file.
    Source(String),
    /// Run a shell command line.
    Shell(String),
    /// List resource references of a type, optionally filtered.
    List {
        resource: Option<String>,
        values: Vec<String>,
    },
    /// Hand the statement to the execution backend.
    Query(String),
}

/// Parses statements into commands.
pub struct CommandRouter;

impl CommandRouter {
    /// Classifies one statement.
    pub fn parse(statement: &str) -> Command {
        let statement = statement.trim();
        let (token, rest) = split_first_token(statement);
        let keyword = token.to_lowercase();

        if matches!(statement.to_lowercase().as_str(), "quit" | "exit") {
            return Command::Quit;
        }
        if keyword == "source" {
            return Command::Source(rest.to_string());
        }
        if let Some(line) = statement.strip_prefix('!') {
            return Command::Shell(line.to_string());
        }
        if keyword == "list" {
            let mut args = rest.split_whitespace().map(String::from);
            return Command::List {
                resource: args.next(),
                values: args.collect(),
            };
        }
        Command::Query(statement.to_string())
    }
}

/// Splits off the first whitespace-delimited token. The remainder is trimmed.
pub fn split_first_token(statement: &str) -> (&str, &str) {
    let statement = statement.trim();
    match statement.find(char::is_whitespace) {
        Some(i) => (&statement[..i], statement[i..].trim()),
        None => (statement, ""),
    }
}
