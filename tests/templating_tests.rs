mod common;

use aoi_report::geometry::{AoiRegistry, FeatureSet};
use aoi_report::localize::FeatureCache;
use aoi_report::templating::{replace_layout_text, ReplacementDescriptor, ReplacementMemo, TokenResolver};
use aoi_report::WarningLog;
use common::{unit_aoi, FakeHost, MockRestClient};
use indexmap::IndexMap;
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};

fn open_cache(dir: &TempDir) -> FeatureCache {
    FeatureCache::open(dir.path().join("store.gdb"), dir.path().join("json")).unwrap()
}

fn registry_with_aoi() -> AoiRegistry {
    let mut registry = AoiRegistry::new();
    registry.entry("AOI").geometry_or_resolve(&unit_aoi());
    registry
}

fn replacements(entries: &[(&str, Value)]) -> IndexMap<String, Value> {
    entries
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

fn assert_close_pair(text: &str, x: f64, y: f64) {
    let parts: Vec<f64> = text.split(',').map(|part| part.parse().unwrap()).collect();
    assert_eq!(parts.len(), 2, "{}", text);
    assert!((parts[0] - x).abs() < 1e-9 && (parts[1] - y).abs() < 1e-9, "{}", text);
}

fn town_host() -> FakeHost {
    FakeHost::new()
        .with_layout("Zoning Layout", &[("title", "Zoning for @@@town@@@"), ("date", "@@@date@@@")], &[])
        .with_layout("Wetlands Layout", &[("title", "Wetlands in @@@town@@@")], &[])
}

#[tokio::test]
async fn test_generic_replacement_resolved_once_per_run() {
    let dir = tempdir().unwrap();
    let cache = open_cache(&dir);
    let registry = AoiRegistry::new();
    let client = MockRestClient::new(|_, _| json!({"features": [{"attributes": {"TOWN": "Acton"}}]}));
    let generic = replacements(&[(
        "town",
        json!({"type": "query", "service": "https://svc/MapServer/4", "return_field": "TOWN"}),
    )]);
    let resolver = TokenResolver::new(&client, &cache, &registry, "AOI", None, 8);

    for _run in 0..2 {
        let mut host = town_host();
        let mut memo = ReplacementMemo::new();
        let mut warnings = WarningLog::new();
        for layout in ["Zoning Layout", "Wetlands Layout"] {
            replace_layout_text(&resolver, &mut host, layout, &IndexMap::new(), &generic, &mut memo, &mut warnings).await;
        }
        assert_eq!(host.text("Zoning Layout", "title").as_deref(), Some("Zoning for Acton"));
        assert_eq!(host.text("Wetlands Layout", "title").as_deref(), Some("Wetlands in Acton"));
        assert!(warnings.is_empty());
    }

    // one request per run
    assert_eq!(client.requests_to("/query").await.len(), 2);
}

#[tokio::test]
async fn test_layout_replacements_are_not_memoized() {
    let dir = tempdir().unwrap();
    let cache = open_cache(&dir);
    let registry = AoiRegistry::new();
    let client = MockRestClient::new(|_, _| json!({"features": [{"attributes": {"TOWN": "Bolton"}}]}));
    let layout_replacements = replacements(&[(
        "town",
        json!({"type": "query", "service": "https://svc/MapServer/4", "return_field": "TOWN", "prepend": "Town of "}),
    )]);
    let resolver = TokenResolver::new(&client, &cache, &registry, "AOI", None, 8);
    let mut host = town_host();
    let mut memo = ReplacementMemo::new();
    let mut warnings = WarningLog::new();

    for layout in ["Zoning Layout", "Wetlands Layout"] {
        replace_layout_text(&resolver, &mut host, layout, &layout_replacements, &IndexMap::new(), &mut memo, &mut warnings).await;
    }

    assert_eq!(client.requests().await.len(), 2);
    assert!(memo.is_empty());
    assert_eq!(host.text("Wetlands Layout", "title").as_deref(), Some("Wetlands in Town of Bolton"));
    // untouched placeholder of a key nobody configured
    assert_eq!(host.text("Zoning Layout", "date").as_deref(), Some("@@@date@@@"));
}

#[tokio::test]
async fn test_unused_placeholder_is_never_resolved() {
    let dir = tempdir().unwrap();
    let cache = open_cache(&dir);
    let registry = AoiRegistry::new();
    let client = MockRestClient::new(|_, _| json!({"features": []}));
    let generic = replacements(&[(
        "county",
        json!({"type": "query", "service": "https://svc/MapServer/5", "return_field": "COUNTY"}),
    )]);
    let resolver = TokenResolver::new(&client, &cache, &registry, "AOI", None, 8);
    let mut host = town_host();

    replace_layout_text(
        &resolver,
        &mut host,
        "Zoning Layout",
        &IndexMap::new(),
        &generic,
        &mut ReplacementMemo::new(),
        &mut WarningLog::new(),
    )
    .await;

    assert!(client.requests().await.is_empty());
}

#[tokio::test]
async fn test_query_with_several_matches_uses_placeholder() {
    let dir = tempdir().unwrap();
    let cache = open_cache(&dir);
    let registry = registry_with_aoi();
    let client = MockRestClient::new(|_, _| {
        json!({"features": [{"attributes": {"TOWN": "Acton"}}, {"attributes": {"TOWN": "Boxborough"}}]})
    });
    let resolver = TokenResolver::new(&client, &cache, &registry, "AOI", Some("tok"), 8);
    let descriptor = ReplacementDescriptor::from_value(&json!({
        "type": "query",
        "service": "https://svc/MapServer/4",
        "return_field": "TOWN",
        "in_aoi": true,
        "multiple_value_placeholder": "Several towns"
    }))
    .unwrap();

    assert_eq!(resolver.resolve(&descriptor).await.unwrap(), "Several towns");

    let request = &client.requests().await[0];
    assert_eq!(request.payload.get("geometryType"), Some("esriGeometryPolygon"));
    assert_eq!(request.payload.get("returnDistinctValues"), Some("true"));
    assert_eq!(request.payload.get("token"), Some("tok"));
}

#[tokio::test]
async fn test_centroid_query_sends_a_point() {
    let dir = tempdir().unwrap();
    let cache = open_cache(&dir);
    let registry = registry_with_aoi();
    let client = MockRestClient::new(|_, _| json!({"features": []}));
    let resolver = TokenResolver::new(&client, &cache, &registry, "AOI", None, 8);
    let descriptor = ReplacementDescriptor::from_value(&json!({
        "type": "query",
        "service": "https://svc/MapServer/4",
        "return_field": "TOWN",
        "in_aoi": "AOI",
        "use_centroid": true
    }))
    .unwrap();

    assert_eq!(resolver.resolve(&descriptor).await.unwrap(), "");
    let request = &client.requests().await[0];
    assert_eq!(request.payload.get("geometryType"), Some("esriGeometryPoint"));
    assert_close_pair(request.payload.get("geometry").unwrap(), 5.0, 5.0);
}

#[tokio::test]
async fn test_statistics_grow_pixel_size_then_format() {
    let dir = tempdir().unwrap();
    let cache = open_cache(&dir);
    let registry = registry_with_aoi();
    let client = MockRestClient::new(|_, payload| match payload.get("pixelSize") {
        Some("120,120") => json!({"statistics": [{"min": 1.0, "max": 9.0, "mean": 2.5}]}),
        _ => json!({"error": {"code": 400, "message": "The requested image exceeds the size limit."}}),
    });
    let resolver = TokenResolver::new(&client, &cache, &registry, "AOI", None, 8);
    let descriptor = ReplacementDescriptor::from_value(&json!({
        "type": "computeStatisticsHistograms",
        "service": "https://img/ImageServer",
        "pixel_size": 30,
        "rendering_rule": {"rasterFunction": "Slope"},
        "in_aoi": true,
        "calc": "mean",
        "units": "%",
        "conversion_coefficient": 2
    }))
    .unwrap();

    assert_eq!(resolver.resolve(&descriptor).await.unwrap(), "5.00 %");

    let sizes: Vec<String> = client
        .requests()
        .await
        .iter()
        .map(|request| request.payload.get("pixelSize").unwrap_or_default().to_string())
        .collect();
    assert_eq!(sizes, vec!["30,30", "60,60", "120,120"]);
    assert!(client.requests().await[0].url.ends_with("/computeStatisticsHistograms"));
}

#[tokio::test]
async fn test_statistics_retry_ceiling_becomes_warning() {
    let dir = tempdir().unwrap();
    let cache = open_cache(&dir);
    let registry = registry_with_aoi();
    let client = MockRestClient::new(|_, _| json!({"error": {"code": 400, "message": "too large"}}));
    let resolver = TokenResolver::new(&client, &cache, &registry, "AOI", None, 3);
    let raw = json!({"type": "statistics", "service": "https://img/ImageServer", "pixel_size": 10});
    let mut warnings = WarningLog::new();

    let value = resolver.resolve_raw("slope", &raw, &mut warnings).await;

    assert_eq!(value, "");
    assert_eq!(client.requests().await.len(), 4);
    assert!(warnings.contains("slope"));
}

#[tokio::test]
async fn test_calculate_reads_the_local_cache() {
    let dir = tempdir().unwrap();
    let cache = open_cache(&dir);
    cache.write("AOI", &unit_aoi()).unwrap();
    let registry = AoiRegistry::new();
    let client = MockRestClient::new(|_, _| json!({}));
    let resolver = TokenResolver::new(&client, &cache, &registry, "AOI", None, 8);

    let centroid = ReplacementDescriptor::from_value(&json!({"type": "calculate", "layer": "AOI", "property": "centroid"})).unwrap();
    assert_close_pair(&resolver.resolve(&centroid).await.unwrap(), 5.0, 5.0);

    let area = ReplacementDescriptor::from_value(&json!({"type": "calculate", "layer": "AOI", "area_unit": "SquareMeters"})).unwrap();
    let square_meters: f64 = resolver.resolve(&area).await.unwrap().parse().unwrap();
    assert!((square_meters - 100.0).abs() < 1.0, "got {}", square_meters);

    assert!(client.requests().await.is_empty());
}

#[tokio::test]
async fn test_query_without_matches_is_empty() {
    let dir = tempdir().unwrap();
    let cache = open_cache(&dir);
    let registry = registry_with_aoi();
    let client = MockRestClient::new(|_, _| json!({"features": []}));
    let resolver = TokenResolver::new(&client, &cache, &registry, "AOI", None, 8);
    let descriptor = ReplacementDescriptor::from_value(&json!({
        "type": "query",
        "service": "https://svc/MapServer/4",
        "return_field": "TOWN",
        "in_aoi": true
    }))
    .unwrap();

    assert_eq!(resolver.resolve(&descriptor).await.unwrap(), "");
    assert_eq!(client.requests().await.len(), 1);
}

#[tokio::test]
async fn test_calculate_area_of_points_is_zero() {
    let dir = tempdir().unwrap();
    let cache = open_cache(&dir);
    let wells: FeatureSet = serde_json::from_value(json!({
        "geometryType": "esriGeometryPoint",
        "spatialReference": {"wkid": 102100},
        "features": [{"attributes": {"OBJECTID": 1}, "geometry": {"x": 3.0, "y": 4.0}}]
    }))
    .unwrap();
    cache.write("Wells", &wells).unwrap();
    let registry = AoiRegistry::new();
    let client = MockRestClient::new(|_, _| json!({}));
    let resolver = TokenResolver::new(&client, &cache, &registry, "AOI", None, 8);

    let area = ReplacementDescriptor::from_value(&json!({"type": "calculate", "layer": "Wells", "area_unit": "ACRES"})).unwrap();
    assert_eq!(resolver.resolve(&area).await.unwrap(), "0");

    let centroid = ReplacementDescriptor::from_value(&json!({"type": "calculate", "layer": "Wells", "property": "centroid"})).unwrap();
    assert_close_pair(&resolver.resolve(&centroid).await.unwrap(), 3.0, 4.0);
    assert!(client.requests().await.is_empty());
}
