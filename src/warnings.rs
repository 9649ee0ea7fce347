//! Ordered collection of non-fatal warnings raised during a report run.
//!
//! Nothing that lands here aborts the pipeline. The list is surfaced once,
//! in insertion order, when the run completes.

#[derive(Debug, Default, Clone)]
pub struct WarningLog {
    entries: Vec<String>,
}

impl WarningLog {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Record a warning and echo it to the log.
    pub fn add(&mut self, warning: impl Into<String>) {
        let warning = warning.into();
        log::warn!("{}", warning);
        self.entries.push(warning);
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.entries.iter().any(|entry| entry.contains(needle))
    }

    pub fn into_vec(self) -> Vec<String> {
        self.entries
    }
}
