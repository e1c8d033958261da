//! Session-held resource references (jars, files, archives).

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ShellError;

/// Kind of auxiliary artifact a session can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Jar,
    File,
    Archive,
}

impl ResourceType {
    /// All resource types, in the order they appear in usage messages.
    pub const ALL: [ResourceType; 3] = [Self::Jar, Self::File, Self::Archive];

    /// Returns the canonical upper-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jar => "JAR",
            Self::File => "FILE",
            Self::Archive => "ARCHIVE",
        }
    }

    /// Returns the `JAR|FILE|ARCHIVE` enumeration used in usage lines.
    pub fn enumeration() -> String {
        Self::ALL
            .iter()
            .map(ResourceType::as_str)
            .collect::<Vec<_>>()
            .join("|")
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = ShellError;

    /// Case-insensitive, and a single trailing `s` is accepted (`jars`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        let name = upper.strip_suffix('S').unwrap_or(&upper);
        match name {
            "JAR" => Ok(Self::Jar),
            "FILE" => Ok(Self::File),
            "ARCHIVE" => Ok(Self::Archive),
            _ => Err(ShellError::usage(format!(
                "unknown resource type '{s}', expected one of {}",
                Self::enumeration()
            ))),
        }
    }
}

/// Resource references keyed by type, kept in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Resources {
    by_type: HashMap<ResourceType, Vec<String>>,
}

impl Resources {
    /// Registers a value. Returns false if it was already held.
    pub fn add(&mut self, kind: ResourceType, value: impl Into<String>) -> bool {
        let value = value.into();
        let held = self.by_type.entry(kind).or_default();
        if held.contains(&value) {
            return false;
        }
        held.push(value);
        true
    }

    /// Removes the given values, or every value of `kind` when `values` is empty.
    pub fn remove(&mut self, kind: ResourceType, values: &[String]) {
        if values.is_empty() {
            self.by_type.remove(&kind);
            return;
        }
        if let Some(held) = self.by_type.get_mut(&kind) {
            held.retain(|v| !values.contains(v));
        }
    }

    /// Lists held values of `kind`, restricted to `filter` when one is given.
    pub fn list(&self, kind: ResourceType, filter: Option<&[String]>) -> Vec<&str> {
        let Some(held) = self.by_type.get(&kind) else {
            return Vec::new();
        };
        held.iter()
            .filter(|v| filter.map_or(true, |f| f.contains(v)))
            .map(String::as_str)
            .collect()
    }

    /// Returns true if no references of any type are held.
    pub fn is_empty(&self) -> bool {
        self.by_type.values().all(Vec::is_empty)
    }
}
