//! Path pattern lists used by profiles, the pushable allow-list, safety
//! rules and push selection.

use glob::{MatchOptions, Pattern};

use crate::{Error, Result};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone)]
enum Entry {
    /// Exact path, or a directory covering everything below it
    Prefix(String),
    /// Glob without `/`, matched against the file name
    Name(Pattern),
    /// Glob with `/`, matched against the whole relative path
    Full(Pattern),
}

impl Entry {
    fn parse(raw: &str) -> Result<Option<Self>> {
        let trimmed = raw.trim().trim_start_matches("./").trim_end_matches('/');
        if trimmed.is_empty() {
            return Ok(None);
        }
        if !trimmed.contains(['*', '?', '[']) {
            return Ok(Some(Self::Prefix(trimmed.to_string())));
        }
        let pattern = Pattern::new(trimmed).map_err(|e| Error::Config {
            message: format!("invalid pattern '{}': {}", raw, e),
        })?;
        Ok(Some(if trimmed.contains('/') {
            Self::Full(pattern)
        } else {
            Self::Name(pattern)
        }))
    }

    fn matches(&self, key: &str) -> bool {
        match self {
            Self::Prefix(prefix) => {
                key == prefix
                    || key
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
            Self::Name(pattern) => {
                let name = key.rsplit('/').next().unwrap_or(key);
                pattern.matches_with(name, MATCH_OPTIONS)
            }
            Self::Full(pattern) => pattern.matches_with(key, MATCH_OPTIONS),
        }
    }
}

/// An ordered list of path patterns matched against relative keys.
///
/// Entries without glob characters match the path itself and everything
/// beneath it (`commands` covers `commands/review.md`). A glob without `/`
/// matches the file name at any depth (`*.json`). A glob with `/` matches the
/// whole key (`hooks/**`).
#[derive(Debug, Clone, Default)]
pub struct PathPatterns {
    entries: Vec<Entry>,
}

impl PathPatterns {
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries = Vec::new();
        for raw in patterns {
            if let Some(entry) = Entry::parse(raw.as_ref())? {
                entries.push(entry);
            }
        }
        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn matches(&self, key: &str) -> bool {
        self.entries.iter().any(|entry| entry.matches(key))
    }
}
