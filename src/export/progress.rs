/// Run progress, 0 to 100.
#[derive(Debug, Default, Clone)]
pub struct ProgressTracker {
    percent: f64,
    history: Vec<f64>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `delta` percent (clamped at 100) and log the new total.
    pub fn advance(&mut self, delta: f64) -> f64 {
        self.percent = (self.percent + delta.max(0.0)).min(100.0);
        self.history.push(self.percent);
        log::info!("EXECUTION: {:.2}%", self.percent);
        self.percent
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }

    /// Every value reported so far.
    pub fn history(&self) -> &[f64] {
        &self.history
    }
}
