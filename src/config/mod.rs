//! Report configuration.
//!
//! The whole run is driven by one `config.json`: the template project, the
//! AOI style, the layouts to export (in declaration order), their table and
//! reference layers, and the text replacements. Secrets and paths can be
//! overridden from the environment (a `.env` file is honoured).

pub mod validation;

#[cfg(test)]
mod tests;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

fn default_gdb_name() -> String {
    "report_cache".to_string()
}

fn default_report_filename() -> String {
    "report".to_string()
}

fn default_max_report_buffer() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_map_frames() -> IndexMap<String, String> {
    let mut frames = IndexMap::new();
    frames.insert("map".to_string(), "Map Frame".to_string());
    frames.insert("inset_map".to_string(), "Inset Map Frame".to_string());
    frames
}

fn default_statistics_max_retries() -> u32 {
    8
}

fn default_localize_buffer_percent() -> f64 {
    100.0
}

fn default_fill_color() -> Vec<u8> {
    vec![0, 0, 0, 0]
}

fn default_outline_color() -> Vec<u8> {
    vec![255, 0, 0, 100]
}

fn default_outline_size() -> f64 {
    2.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Template project the host opens before the run.
    pub project_name: String,
    /// Name of the feature-cache store (`<gdb_name>.gdb`) inside the run directory.
    #[serde(default = "default_gdb_name")]
    pub gdb_name: String,
    #[serde(default = "default_report_filename")]
    pub report_filename: String,
    /// How many run directories to keep under `reports/`.
    #[serde(default = "default_max_report_buffer")]
    pub max_report_buffer: usize,
    #[serde(default)]
    pub external_url: Option<String>,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub verify_tls: bool,
    #[serde(default)]
    pub portal: PortalConfig,
    pub aoi: AoiConfig,
    /// Map kind (`map`, `inset_map`) to the name of the layout frame element showing it.
    #[serde(default = "default_map_frames")]
    pub map_frames: IndexMap<String, String>,
    /// Name of the table element whose presence enables pagination.
    #[serde(default)]
    pub table_frame_element: Option<String>,
    pub layouts: IndexMap<String, LayoutConfig>,
    /// Document-wide replacement descriptors, kept raw and parsed when first used.
    #[serde(default)]
    pub generic_replacement: IndexMap<String, Value>,
    #[serde(default = "default_statistics_max_retries")]
    pub statistics_max_retries: u32,
    #[serde(default = "default_localize_buffer_percent")]
    pub localize_buffer_percent: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default, alias = "app_id")]
    pub client_id: Option<String>,
    #[serde(default, alias = "app_secret")]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub referer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AoiConfig {
    /// Display name of the AOI layer in every map.
    pub name: String,
    #[serde(default = "default_fill_color")]
    pub fill_color: Vec<u8>,
    #[serde(default = "default_outline_color")]
    pub outline_color: Vec<u8>,
    #[serde(default = "default_outline_size")]
    pub outline_size: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub name: String,
    #[serde(default)]
    pub map: Option<String>,
    #[serde(default)]
    pub inset_map: Option<String>,
    /// Absolute page index of this layout's first page in the final document.
    pub placement: usize,
    #[serde(default)]
    pub preserve_extent: bool,
    #[serde(default)]
    pub extent_buffer_percent: Option<f64>,
    #[serde(default)]
    pub replacement: IndexMap<String, Value>,
    #[serde(default)]
    pub max_table_rows: Option<usize>,
    #[serde(default)]
    pub aoi_outline_color: Option<Vec<u8>>,
    #[serde(default)]
    pub aoi_outline_size: Option<f64>,
    /// Template layer name to remote service URL.
    #[serde(default)]
    pub localize_layers: IndexMap<String, String>,
    #[serde(default)]
    pub table_layers: IndexMap<String, LayerConfig>,
}

impl LayoutConfig {
    /// Map this layout declares for a map-frame kind.
    pub fn map_for(&self, kind: &str) -> Option<&str> {
        match kind {
            "map" => self.map.as_deref(),
            "inset_map" => self.inset_map.as_deref(),
            _ => None,
        }
    }
}

/// A dissolve statistic kept on a visible field, written `["FIELD", "STAT"]` in config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct VisibleField {
    pub name: String,
    pub statistic: String,
}

impl From<(String, String)> for VisibleField {
    fn from((name, statistic): (String, String)) -> Self {
        Self { name, statistic }
    }
}

impl From<VisibleField> for (String, String) {
    fn from(field: VisibleField) -> Self {
        (field.name, field.statistic)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Template layer name in the layout's map.
    pub name: String,
    /// Feature service layer URL.
    pub source: String,
    #[serde(default)]
    pub clip: bool,
    #[serde(default)]
    pub visible_fields: Vec<VisibleField>,
    #[serde(default)]
    pub dissolve_field: Option<String>,
    #[serde(default)]
    pub acres_replace: Option<String>,
    #[serde(default)]
    pub percent_of_field_replace: Option<String>,
    #[serde(default = "default_true")]
    pub paginate: bool,
}

impl ReportConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&raw).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        log::info!("Loaded config from {} ({} layouts)", path.display(), config.layouts.len());
        Ok(config)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: ReportConfig = serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `.env`, read the config named by `REPORT_CONFIG` (or `default_path`)
    /// and apply environment overrides.
    pub fn from_env(default_path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let path = env::var("REPORT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_path.as_ref().to_path_buf());

        let mut config = Self::load(&path)?;
        config.apply_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    /// Override portal settings from `lookup` (the environment, in production).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let overrides: [(&str, &mut Option<String>); 6] = [
            ("PORTAL_URL", &mut self.portal.url),
            ("PORTAL_USERNAME", &mut self.portal.username),
            ("PORTAL_PASSWORD", &mut self.portal.password),
            ("PORTAL_CLIENT_ID", &mut self.portal.client_id),
            ("PORTAL_CLIENT_SECRET", &mut self.portal.client_secret),
            ("PORTAL_REFRESH_TOKEN", &mut self.portal.refresh_token),
        ];

        for (key, slot) in overrides {
            if let Some(value) = lookup(key).filter(|value| !value.is_empty()) {
                log::debug!("{} overrides the configured value", key);
                *slot = Some(value);
            }
        }
    }

    /// Every structural problem at once, joined into one `ConfigError::Invalid`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let problems = validation::validate_config(self);
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems.join("; ")))
        }
    }

    pub fn frame_name(&self, kind: &str) -> Option<&str> {
        self.map_frames.get(kind).map(String::as_str)
    }
}
