use serde_json::Value;

use crate::geometry::measure::geodesic_acres;
use crate::geometry::{Feature, FeatureSet};

/// Rewrite the acres and percent-of-total fields of every feature.
///
/// Areas are geodesic, in acres, formatted to two decimals. When the total is
/// zero every percentage is `0.00`. Returns the total area.
pub fn recompute_area_fields(
    features: &mut FeatureSet,
    acres_field: Option<&str>,
    percent_field: Option<&str>,
) -> f64 {
    let set_wkid = features.wkid();
    let areas: Vec<f64> = features
        .features
        .iter()
        .map(|feature| match &feature.geometry {
            Some(geometry) if geometry.is_polygon() => {
                let wkid = geometry
                    .spatial_reference
                    .as_ref()
                    .and_then(|sr| sr.latest_wkid.or(sr.wkid))
                    .or(set_wkid);
                geodesic_acres(geometry, wkid)
            }
            _ => 0.0,
        })
        .collect();

    let total: f64 = areas.iter().sum();

    for (feature, area) in features.features.iter_mut().zip(&areas) {
        if let Some(field) = acres_field {
            set_attribute(feature, field, format!("{:.2}", area));
        }
        if let Some(field) = percent_field {
            let percent = if total > 0.0 { area / total * 100.0 } else { 0.0 };
            set_attribute(feature, field, format!("{:.2}", percent));
        }
    }

    log::debug!("Recomputed area fields for {} features ({:.2} acres)", areas.len(), total);
    total
}

/// Write `value` into an existing field regardless of its case, or add it.
fn set_attribute(feature: &mut Feature, field: &str, value: String) {
    let key = feature
        .attributes
        .keys()
        .find(|name| name.eq_ignore_ascii_case(field))
        .cloned()
        .unwrap_or_else(|| field.to_string());
    feature.attributes.insert(key, Value::String(value));
}
