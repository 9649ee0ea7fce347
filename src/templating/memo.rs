use std::collections::HashMap;

/// Resolved document-wide replacements, keyed by replacement key.
///
/// Owned by one report run. A key resolved once (even to `""` after a
/// failure) is never resolved again in that run.
#[derive(Debug, Default)]
pub struct ReplacementMemo {
    values: HashMap<String, String>,
}

impl ReplacementMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
