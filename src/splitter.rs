//! Statement splitting.
//!
//! Splits a block of input text on `;` into trimmed statements. A fragment
//! ending in a backslash continues into the next fragment: the backslash is
//! dropped and a literal `;` is kept. A continuation still open when the
//! text runs out is discarded. Quotes and comments are not interpreted.

use tracing::debug;

/// The statement terminator.
pub const TERMINATOR: char = ';';

/// Escape character that turns a following terminator into a literal.
pub const ESCAPE: char = '\\';

/// Lazy iterator over the statements of one text block.
///
/// Each call to [`split_statements`] starts a fresh pass over the text.
#[derive(Debug, Clone)]
pub struct Statements<'a> {
    text: &'a str,
    pos: usize,
}

/// Splits `text` into statements.
pub fn split_statements(text: &str) -> Statements<'_> {
    Statements { text, pos: 0 }
}

impl<'a> Statements<'a> {
    /// Number of bytes of the source text consumed so far.
    pub fn consumed(&self) -> usize {
        self.pos
    }
}

impl Iterator for Statements<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let mut command = String::new();

        while self.pos < self.text.len() {
            let rest = &self.text[self.pos..];
            let fragment = match rest.find(TERMINATOR) {
                Some(i) => {
                    self.pos += i + TERMINATOR.len_utf8();
                    &rest[..i]
                }
                None => {
                    self.pos = self.text.len();
                    rest
                }
            };

            if let Some(escaped) = fragment.strip_suffix(ESCAPE) {
                command.push_str(escaped);
                command.push(TERMINATOR);
                continue;
            }

            command.push_str(fragment);
            let statement = command.trim();
            if statement.is_empty() {
                continue;
            }
            return Some(statement.to_string());
        }

        if !command.trim().is_empty() {
            debug!("Dropping unfinished statement: {}", command.trim());
        }
        None
    }
}

/// Returns true if an input line completes a statement.
///
/// The trimmed line must end with the terminator, and that terminator must
/// not be escaped.
pub fn ends_statement(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.ends_with(TERMINATOR) && !trimmed.ends_with("\\;")
}
