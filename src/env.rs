//! Environment lookup.
//!
//! Everything that reads the process environment goes through [`Env`] so the
//! resolution rules can be exercised against a plain map in tests.

use std::collections::HashMap;

pub trait Env {
    fn var(&self, key: &str) -> Option<String>;

    /// Value of `key`, treating an empty or whitespace-only value as unset.
    fn non_blank(&self, key: &str) -> Option<String> {
        self.var(key).filter(|v| !v.trim().is_empty())
    }
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Env for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl Env for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_are_unset() {
        let env: HashMap<String, String> = [
            ("EMPTY".to_string(), String::new()),
            ("SPACES".to_string(), "   ".to_string()),
            ("SET".to_string(), "value".to_string()),
        ]
        .into_iter()
        .collect();

        assert_eq!(env.var("EMPTY").as_deref(), Some(""));
        assert!(env.non_blank("EMPTY").is_none());
        assert!(env.non_blank("SPACES").is_none());
        assert!(env.non_blank("MISSING").is_none());
        assert_eq!(env.non_blank("SET").as_deref(), Some("value"));
    }
}
