//! Cache invalidation
//!
//! Entries leave the cache for one of the [`InvalidationReason`]s below.
//! Pattern invalidation matches keys with shell-style globs ([`GlobPattern`]),
//! which lets callers sweep a whole namespace (`"search:v3:*"`).

use crate::error::{CacheError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Reason an entry was removed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvalidationReason {
    /// Entry expired based on TTL
    Expired,

    /// Explicit delete by key
    Manual,

    /// Evicted because the layer ran out of budget
    SizeLimit,

    /// Removed by tag eviction
    TagMatch { tag: String },

    /// Removed by a glob sweep
    PatternMatch { pattern: String },

    /// Removed for being older than a cutoff
    Age { max_age_secs: u64 },

    /// Layer cleared
    Cleared,
}

impl std::fmt::Display for InvalidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidationReason::Expired => write!(f, "TTL expired"),
            InvalidationReason::Manual => write!(f, "manual invalidation"),
            InvalidationReason::SizeLimit => write!(f, "cache size limit reached"),
            InvalidationReason::TagMatch { tag } => write!(f, "tag match: {}", tag),
            InvalidationReason::PatternMatch { pattern } => write!(f, "pattern match: {}", pattern),
            InvalidationReason::Age { max_age_secs } => {
                write!(f, "older than {}s", max_age_secs)
            }
            InvalidationReason::Cleared => write!(f, "layer cleared"),
        }
    }
}

/// Compiled shell-style glob: `*` matches any run, `?` one character,
/// `[abc]` / `[!abc]` a character class. Everything else is literal.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    regex: Regex,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(&glob_to_regex(pattern))
            .map_err(|e| CacheError::Config(format!("invalid glob pattern {:?}: {}", pattern, e)))?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn matches(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');

    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                // Find the closing bracket; an unterminated class is a literal '['
                match chars.clone().position(|c| c == ']') {
                    Some(end) if end > 0 => {
                        let body: String = chars.by_ref().take(end).collect();
                        chars.next(); // ']'
                        out.push('[');
                        let body = match body.strip_prefix('!') {
                            Some(negated) => {
                                out.push('^');
                                negated.to_string()
                            }
                            None => body,
                        };
                        for b in body.chars() {
                            if matches!(b, '\\' | '[' | ']' | '^' | '&' | '~') {
                                out.push('\\');
                            }
                            out.push(b);
                        }
                        out.push(']');
                    }
                    _ => out.push_str(&regex::escape("[")),
                }
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }

    out.push('$');
    out
}
