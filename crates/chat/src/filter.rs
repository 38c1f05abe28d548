//! Content filter: regex substitution over outgoing chat messages.
//!
//! Patterns are compiled once at construction; a pattern that fails to
//! compile refuses the whole service rather than silently passing content
//! through.

use regex::{Regex, RegexSet};

use wr_domain::{Error, Result};

pub struct ContentFilter {
    set: RegexSet,
    patterns: Vec<Regex>,
    replacement: String,
}

impl ContentFilter {
    pub fn new(patterns: &[String], replacement: &str) -> Result<Self> {
        let set = RegexSet::new(patterns)
            .map_err(|e| Error::InvalidInput(format!("filter pattern does not compile: {e}")))?;
        let compiled = patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    Error::InvalidInput(format!("filter pattern does not compile: {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            set,
            patterns: compiled,
            replacement: replacement.to_owned(),
        })
    }

    /// Substitute every match of every pattern. The cheap `RegexSet` probe
    /// skips the per-pattern pass for clean content.
    pub fn apply(&self, content: &str) -> String {
        if self.patterns.is_empty() || !self.set.is_match(content) {
            return content.to_owned();
        }
        let mut filtered = content.to_owned();
        for pattern in &self.patterns {
            filtered = pattern
                .replace_all(&filtered, self.replacement.as_str())
                .into_owned();
        }
        filtered
    }
}
