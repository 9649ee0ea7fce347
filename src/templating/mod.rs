//! Text templating: `@@@key@@@` placeholders in layout text elements are
//! replaced by values resolved from typed replacement descriptors.
//!
//! Per-layout replacements are resolved every time a layout needs them.
//! Document-wide (generic) replacements are resolved at most once per run and
//! kept in a [`ReplacementMemo`] the caller owns.

pub mod descriptor;
pub mod memo;
pub mod resolver;
pub mod substitute;


pub use descriptor::{ReplacementDescriptor, ReplacementKind};
pub use memo::ReplacementMemo;
pub use resolver::TokenResolver;
pub use substitute::{layout_mentions, placeholder, substitute_layout, substitute_text};

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

use crate::host::MapHost;
use crate::localize::CacheError;
use crate::service::ServiceError;
use crate::warnings::WarningLog;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("invalid replacement descriptor: {0}")]
    Descriptor(#[source] serde_json::Error),
    #[error("AOI '{0}' has no geometry yet")]
    MissingAoi(String),
    #[error("statistic '{0}' missing from response")]
    MissingStatistic(String),
    #[error("unknown area unit '{0}'")]
    UnknownUnit(String),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Fill in the placeholders of one layout.
///
/// The layout's own replacements go first, then the generic ones. Only keys
/// whose placeholder actually appears on the layout are resolved.
pub async fn replace_layout_text(
    resolver: &TokenResolver<'_>,
    host: &mut dyn MapHost,
    layout: &str,
    layout_replacements: &IndexMap<String, Value>,
    generic_replacements: &IndexMap<String, Value>,
    memo: &mut ReplacementMemo,
    warnings: &mut WarningLog,
) {
    for (key, raw) in layout_replacements {
        if !layout_mentions(host, layout, key) {
            continue;
        }
        let value = resolver.resolve_raw(key, raw, warnings).await;
        apply(host, layout, key, &value, warnings);
    }

    for (key, raw) in generic_replacements {
        if !layout_mentions(host, layout, key) {
            continue;
        }
        let value = match memo.get(key) {
            Some(value) => value.to_string(),
            None => {
                let value = resolver.resolve_raw(key, raw, warnings).await;
                memo.insert(key.as_str(), value.as_str());
                value
            }
        };
        apply(host, layout, key, &value, warnings);
    }
}

fn apply(host: &mut dyn MapHost, layout: &str, key: &str, value: &str, warnings: &mut WarningLog) {
    match substitute_layout(host, layout, key, value) {
        Ok(changed) => log::debug!("Replaced {} in {} element(s) of {}", placeholder(key), changed, layout),
        Err(err) => warnings.add(format!("WARNING: Could not replace text {} on {}: {}", placeholder(key), layout, err)),
    }
}
