//! Tab completion.
//!
//! The candidate set is built once per session from the backend's function
//! names and the SQL keyword list. Completion is by prefix on the word
//! under the cursor, so identifiers missing from the set never block
//! matches elsewhere in the line.

use regex::Regex;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};
use sqlparser::keywords::ALL_KEYWORDS;

/// Characters that separate completion words.
fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '[' | ']')
}

/// Sorted, de-duplicated completion candidates.
#[derive(Debug, Clone, Default)]
pub struct CompletionSet {
    candidates: Vec<String>,
}

impl CompletionSet {
    /// Builds the set from function names and keywords.
    ///
    /// Function names that are plain identifiers get a `(` appended.
    /// Keywords are added as written and lower-cased.
    pub fn new<F, K>(function_names: F, keywords: K) -> Self
    where
        F: IntoIterator,
        F::Item: AsRef<str>,
        K: IntoIterator,
        K::Item: AsRef<str>,
    {
        let identifier = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok();
        let mut candidates = Vec::new();

        for name in function_names {
            let name = name.as_ref();
            if identifier.as_ref().is_some_and(|re| re.is_match(name)) {
                candidates.push(format!("{name}("));
            } else {
                candidates.push(name.to_string());
            }
        }
        for keyword in keywords {
            let keyword = keyword.as_ref();
            candidates.push(keyword.to_string());
            candidates.push(keyword.to_lowercase());
        }

        candidates.sort();
        candidates.dedup();
        Self { candidates }
    }

    /// The set for `function_names` plus every SQL keyword.
    pub fn with_sql_keywords(function_names: Vec<String>) -> Self {
        Self::new(function_names, ALL_KEYWORDS.iter())
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Returns where the word under the cursor starts and its completions.
    ///
    /// A unique completion is followed by a space, except after `(`.
    pub fn complete(&self, line: &str, pos: usize) -> (usize, Vec<String>) {
        let head = line.get(..pos).unwrap_or(line);
        let start = head
            .char_indices()
            .filter(|(_, c)| is_delimiter(*c))
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        let word = &head[start..];

        let mut matches: Vec<String> = self
            .candidates
            .iter()
            .filter(|c| c.starts_with(word))
            .cloned()
            .collect();

        if let [only] = matches.as_mut_slice() {
            only.push(' ');
            if only.ends_with("( ") {
                only.pop();
            }
        }
        (start, matches)
    }
}

/// Line editor helper offering the completion set.
pub struct QshHelper {
    completions: CompletionSet,
}

impl QshHelper {
    pub fn new(completions: CompletionSet) -> Self {
        Self { completions }
    }
}

impl Completer for QshHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let (start, matches) = self.completions.complete(line, pos);
        let pairs = matches
            .into_iter()
            .map(|replacement| Pair {
                display: replacement.trim_end().to_string(),
                replacement,
            })
            .collect();
        Ok((start, pairs))
    }
}

impl Hinter for QshHelper {
    type Hint = String;
}

impl Highlighter for QshHelper {}

impl Validator for QshHelper {}

impl Helper for QshHelper {}
