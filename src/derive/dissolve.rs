use geo::MultiPolygon;
use indexmap::IndexMap;
use serde_json::{Map, Number, Value};

use super::DeriveError;
use crate::config::VisibleField;
use crate::geometry::measure::same_spatial_reference;
use crate::geometry::overlay::{aoi_polygons, clip, to_esri_polygon, union_all};
use crate::geometry::{attribute_text, AoiGeometry, Feature, FeatureSet, POLYGON_GEOMETRY_TYPE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statistic {
    First,
    Last,
    Sum,
    Mean,
    Min,
    Max,
    Range,
    Count,
}

impl Statistic {
    pub fn parse(name: &str) -> Result<Self, DeriveError> {
        match name.trim().to_ascii_uppercase().as_str() {
            "FIRST" => Ok(Statistic::First),
            "LAST" => Ok(Statistic::Last),
            "SUM" => Ok(Statistic::Sum),
            "MEAN" => Ok(Statistic::Mean),
            "MIN" => Ok(Statistic::Min),
            "MAX" => Ok(Statistic::Max),
            "RANGE" => Ok(Statistic::Range),
            "COUNT" => Ok(Statistic::Count),
            _ => Err(DeriveError::UnknownStatistic(name.to_string())),
        }
    }

    fn apply(self, values: &[&Value]) -> Value {
        let present: Vec<&Value> = values.iter().copied().filter(|v| !v.is_null()).collect();
        let numbers: Vec<f64> = present.iter().filter_map(|v| numeric(v)).collect();

        match self {
            Statistic::First => present.first().map(|v| (*v).clone()).unwrap_or(Value::Null),
            Statistic::Last => present.last().map(|v| (*v).clone()).unwrap_or(Value::Null),
            Statistic::Count => Value::from(present.len()),
            Statistic::Sum => number(numbers.iter().sum()),
            Statistic::Mean if numbers.is_empty() => Value::Null,
            Statistic::Mean => number(numbers.iter().sum::<f64>() / numbers.len() as f64),
            Statistic::Min => numbers.iter().copied().reduce(f64::min).map(number).unwrap_or(Value::Null),
            Statistic::Max => numbers.iter().copied().reduce(f64::max).map(number).unwrap_or(Value::Null),
            Statistic::Range => match (
                numbers.iter().copied().reduce(f64::min),
                numbers.iter().copied().reduce(f64::max),
            ) {
                (Some(min), Some(max)) => number(max - min),
                _ => Value::Null,
            },
        }
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn number(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}

/// Name a dissolve statistic is written under before [`restore_field_names`].
pub fn statistic_field_name(field: &VisibleField) -> String {
    format!("{}_{}", field.statistic.trim().to_ascii_uppercase(), field.name)
}

/// Clip every feature to the AOI, then dissolve by `dissolve_field`.
///
/// Features with no overlap are dropped. Groups keep the order in which their
/// key first appears. Each output feature carries a fresh `OBJECTID`, the
/// dissolve value, and one `<STAT>_<field>` attribute per visible field.
pub fn clip_and_dissolve(
    source: &FeatureSet,
    aoi: &AoiGeometry,
    dissolve_field: Option<&str>,
    visible_fields: &[VisibleField],
) -> Result<FeatureSet, DeriveError> {
    let boundary = aoi_polygons(aoi);
    if boundary.0.is_empty() {
        return Err(DeriveError::EmptyAoi);
    }
    if let (Some(layer), Some(aoi)) = (source.wkid(), aoi.wkid()) {
        if !same_spatial_reference(layer, aoi) {
            return Err(DeriveError::SpatialReferenceMismatch { layer, aoi });
        }
    }
    let statistics = visible_fields
        .iter()
        .map(|field| Statistic::parse(&field.statistic).map(|stat| (field, stat)))
        .collect::<Result<Vec<_>, _>>()?;

    let null = Value::Null;
    let mut groups: IndexMap<String, Vec<(&Feature, MultiPolygon<f64>)>> = IndexMap::new();
    for feature in &source.features {
        let clipped = match feature.geometry.as_ref().and_then(|g| clip(g, &boundary)) {
            Some(clipped) => clipped,
            None => continue,
        };
        let key = dissolve_field
            .and_then(|field| feature.attribute(field))
            .map(attribute_text)
            .unwrap_or_default();
        groups.entry(key).or_default().push((feature, clipped));
    }

    let features = groups
        .into_iter()
        .enumerate()
        .map(|(index, (_, members))| {
            let mut attributes = Map::new();
            attributes.insert("OBJECTID".to_string(), Value::from(index + 1));

            if let Some(field) = dissolve_field {
                let value = members
                    .first()
                    .and_then(|(feature, _)| feature.attribute(field))
                    .cloned()
                    .unwrap_or(Value::Null);
                attributes.insert(field.to_string(), value);
            }

            for (field, stat) in &statistics {
                let values: Vec<&Value> = members
                    .iter()
                    .map(|(feature, _)| feature.attribute(&field.name).unwrap_or(&null))
                    .collect();
                attributes.insert(statistic_field_name(field), stat.apply(&values));
            }

            let geometry = union_all(members.into_iter().map(|(_, polygons)| polygons));
            Feature {
                attributes,
                geometry: Some(to_esri_polygon(&geometry)),
            }
        })
        .collect();

    Ok(FeatureSet {
        geometry_type: Some(POLYGON_GEOMETRY_TYPE.to_string()),
        spatial_reference: source.spatial_reference.clone(),
        features,
        extra: Map::new(),
    })
}

/// Rename `<STAT>_<field>` attributes back to `<field>`.
pub fn restore_field_names(features: &mut FeatureSet, visible_fields: &[VisibleField]) {
    for feature in &mut features.features {
        for field in visible_fields {
            if let Some(value) = feature.attributes.remove(&statistic_field_name(field)) {
                feature.attributes.insert(field.name.clone(), value);
            }
        }
    }
}
