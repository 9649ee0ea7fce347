//! Report export: drives every other module through one report run.
//!
//! A run opens the template project, prepares its working directory, signs in
//! to the portal, registers the AOI, then walks the configured layouts in
//! order. Each layout goes through AOI setup, map substitution, text
//! substitution and either an overflow (one page per row chunk) or a single
//! export, and its pages are inserted into the combined document.

pub mod orchestrator;
pub mod progress;
pub mod tables;


pub use orchestrator::{LayoutStage, PagePlacement, ReportOutcome, ReportRequest, ReportRunner};
pub use progress::ProgressTracker;
pub use tables::{prepare_table_layer, PreparedTable};

use thiserror::Error;

use crate::config::ConfigError;
use crate::derive::DeriveError;
use crate::host::HostError;
use crate::localize::{CacheError, LocalizeError};
use crate::workspace::WorkspaceError;

/// Failures that end a run. Everything else degrades to a warning.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("template project unavailable: {0}")]
    TemplateProject(#[source] HostError),
    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),
    #[error("feature cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("AOI input has no polygon features")]
    EmptyAoi,
    #[error("report document error: {0}")]
    Document(#[source] HostError),
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error(transparent)]
    Localize(#[from] LocalizeError),
    #[error(transparent)]
    Derive(#[from] DeriveError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Host(#[from] HostError),
}
