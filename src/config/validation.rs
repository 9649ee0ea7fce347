//! Structural checks run right after the config is parsed.

use super::{LayerConfig, LayoutConfig, ReportConfig};

/// Problems found in the config, each prefixed with its dotted path.
pub type Problems = Vec<String>;

fn empty(problems: &mut Problems, path: &str) {
    invalid(problems, path, "must not be empty");
}

fn invalid(problems: &mut Problems, path: &str, message: &str) {
    problems.push(format!("[{}] {}", path, message));
}

pub fn validate_config(config: &ReportConfig) -> Problems {
    let mut problems = Problems::new();

    if config.project_name.trim().is_empty() {
        empty(&mut problems, "project_name");
    }
    if config.gdb_name.trim().is_empty() {
        empty(&mut problems, "gdb_name");
    }
    if config.aoi.name.trim().is_empty() {
        empty(&mut problems, "aoi.name");
    }
    if config.layouts.is_empty() {
        invalid(
            &mut problems,
            "layouts",
            "no layouts configured; declare at least one layout with a name and a placement",
        );
    }
    if !(config.localize_buffer_percent.is_finite() && config.localize_buffer_percent >= 0.0) {
        invalid(&mut problems, "localize_buffer_percent", "must be a non-negative number");
    }

    for (key, layout) in &config.layouts {
        validate_layout(&format!("layouts.{}", key), layout, &mut problems);
    }

    problems
}

fn validate_layout(path: &str, layout: &LayoutConfig, problems: &mut Problems) {
    if layout.name.trim().is_empty() {
        empty(problems, &format!("{}.name", path));
    }
    if layout.max_table_rows == Some(0) {
        invalid(
            problems,
            &format!("{}.max_table_rows", path),
            "must be greater than zero; remove the key to use the default page size",
        );
    }
    if let Some(percent) = layout.extent_buffer_percent {
        if !(percent.is_finite() && percent >= 0.0) {
            invalid(
                problems,
                &format!("{}.extent_buffer_percent", path),
                "must be a non-negative number",
            );
        }
    }
    if !layout.table_layers.is_empty() && layout.map.is_none() {
        invalid(problems, &format!("{}.map", path), "table layers need a map to live in");
    }

    for (key, layer) in &layout.table_layers {
        validate_layer(&format!("{}.table_layers.{}", path, key), layer, problems);
    }
    for (name, url) in &layout.localize_layers {
        if url.trim().is_empty() {
            empty(problems, &format!("{}.localize_layers.{}", path, name));
        }
    }
}

fn validate_layer(path: &str, layer: &LayerConfig, problems: &mut Problems) {
    if layer.name.trim().is_empty() {
        empty(problems, &format!("{}.name", path));
    }
    if layer.source.trim().is_empty() {
        empty(problems, &format!("{}.source", path));
    }
    if layer
        .visible_fields
        .iter()
        .any(|field| field.name.trim().is_empty() || field.statistic.trim().is_empty())
    {
        invalid(
            problems,
            &format!("{}.visible_fields", path),
            "entries need a field and a statistic, written as [\"FIELD\", \"FIRST\"]",
        );
    }
}
