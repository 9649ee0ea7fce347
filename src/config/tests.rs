use std::collections::HashMap;

use serde_json::json;
use tempfile::tempdir;

use super::*;

fn sample() -> Value {
    json!({
        "project_name": "ReportTemplate",
        "gdb_name": "cache",
        "max_report_buffer": 3,
        "external_url": "https://reports.example.com",
        "portal": {"app_id": "abc", "app_secret": "shh"},
        "aoi": {"name": "Area of Interest"},
        "table_frame_element": "Table Frame",
        "layouts": {
            "zoning": {
                "name": "Zoning Layout",
                "map": "Zoning",
                "placement": 2,
                "max_table_rows": 20,
                "replacement": {"title": {"type": "text", "value": "Zoning"}},
                "table_layers": {
                    "zones": {
                        "name": "Zoning Districts",
                        "source": "https://svc/FeatureServer/0",
                        "clip": true,
                        "visible_fields": [["ZONE", "FIRST"], ["NAME", "FIRST"]],
                        "dissolve_field": "ZONE",
                        "acres_replace": "ACRES",
                        "percent_of_field_replace": "PERCENT"
                    }
                }
            },
            "cover": {"name": "Cover", "map": "Cover", "placement": 0}
        },
        "generic_replacement": {"date": {"type": "text", "value": "today"}}
    })
}

#[test]
fn test_parse_full_config() {
    let config = ReportConfig::from_json_str(&sample().to_string()).unwrap();

    assert_eq!(config.project_name, "ReportTemplate");
    assert_eq!(config.max_report_buffer, 3);
    assert!(config.verify_tls);
    assert_eq!(config.statistics_max_retries, 8);
    assert_eq!(config.localize_buffer_percent, 100.0);
    assert_eq!(config.aoi.outline_color, vec![255, 0, 0, 100]);
    assert_eq!(config.frame_name("map"), Some("Map Frame"));
    assert_eq!(config.portal.client_id.as_deref(), Some("abc"));
    assert_eq!(config.portal.client_secret.as_deref(), Some("shh"));

    let zoning = &config.layouts["zoning"];
    let zones = &zoning.table_layers["zones"];
    assert!(zones.clip && zones.paginate);
    assert_eq!(
        zones.visible_fields[0],
        VisibleField {
            name: "ZONE".into(),
            statistic: "FIRST".into()
        }
    );
    assert_eq!(zoning.map_for("map"), Some("Zoning"));
    assert_eq!(zoning.map_for("inset_map"), None);
}

#[test]
fn test_layouts_keep_declaration_order() {
    let config = ReportConfig::from_json_str(&sample().to_string()).unwrap();
    let keys: Vec<&str> = config.layouts.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["zoning", "cover"]);
}

#[test]
fn test_validation_collects_every_problem() {
    let mut raw = sample();
    raw["project_name"] = json!("");
    raw["layouts"]["zoning"]["max_table_rows"] = json!(0);
    raw["layouts"]["zoning"]["table_layers"]["zones"]["source"] = json!(" ");

    let err = ReportConfig::from_json_str(&raw.to_string()).unwrap_err();
    let message = err.to_string();

    assert!(matches!(err, ConfigError::Invalid(_)));
    assert!(message.contains("project_name"));
    assert!(message.contains("layouts.zoning.max_table_rows"));
    assert!(message.contains("layouts.zoning.table_layers.zones.source"));
}

#[test]
fn test_missing_layouts_key_is_a_parse_error() {
    let err = ReportConfig::from_json_str(r#"{"project_name": "x", "aoi": {"name": "AOI"}}"#).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn test_load_reports_missing_file() {
    let dir = tempdir().unwrap();
    let err = ReportConfig::load(dir.path().join("missing.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn test_load_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, sample().to_string()).unwrap();

    let config = ReportConfig::load(&path).unwrap();
    assert_eq!(config.layouts.len(), 2);
}

#[test]
fn test_overrides_replace_portal_secrets() {
    let mut config = ReportConfig::from_json_str(&sample().to_string()).unwrap();
    let env: HashMap<&str, &str> = HashMap::from([
        ("PORTAL_URL", "https://portal.example.com/portal"),
        ("PORTAL_CLIENT_SECRET", "rotated"),
        ("PORTAL_USERNAME", ""),
    ]);

    config.apply_overrides(|key| env.get(key).map(|value| value.to_string()));

    assert_eq!(config.portal.url.as_deref(), Some("https://portal.example.com/portal"));
    assert_eq!(config.portal.client_secret.as_deref(), Some("rotated"));
    assert_eq!(config.portal.client_id.as_deref(), Some("abc"));
    assert_eq!(config.portal.username, None);
}
