pub mod add_features;
pub mod config;
pub mod derive;
pub mod export;
pub mod geometry;
pub mod host;
pub mod localize;
pub mod overflow;
pub mod portal;
pub mod service;
pub mod templating;
pub mod warnings;
pub mod workspace;

pub use crate::config::ReportConfig;
pub use crate::export::{ReportError, ReportOutcome, ReportRequest, ReportRunner};
pub use crate::warnings::WarningLog;

/// Initialise `env_logger`, defaulting `RUST_LOG` to `info`.
pub fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(env).init();
}
