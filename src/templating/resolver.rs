use serde_json::Value;

use super::descriptor::{AoiFilter, CalculateProperty, CalculateSpec, QuerySpec, StatisticsSpec};
use super::{ReplacementDescriptor, ReplacementKind, TemplateError};
use crate::geometry::measure::{centroid, geodesic_area, AreaUnit};
use crate::geometry::{attribute_text, AoiGeometry, AoiRegistry};
use crate::localize::FeatureCache;
use crate::service::{
    endpoint, parse_feature_set, parse_statistics, post_statistics, post_with_token_retry, FormPayload,
    GeometryFilter, RestClient,
};
use crate::warnings::WarningLog;

/// Everything a descriptor may need to resolve itself.
pub struct TokenResolver<'a> {
    client: &'a dyn RestClient,
    cache: &'a FeatureCache,
    aois: &'a AoiRegistry,
    default_aoi: &'a str,
    token: Option<&'a str>,
    statistics_max_retries: u32,
}

impl<'a> TokenResolver<'a> {
    pub fn new(
        client: &'a dyn RestClient,
        cache: &'a FeatureCache,
        aois: &'a AoiRegistry,
        default_aoi: &'a str,
        token: Option<&'a str>,
        statistics_max_retries: u32,
    ) -> Self {
        Self {
            client,
            cache,
            aois,
            default_aoi,
            token,
            statistics_max_retries,
        }
    }

    /// Resolve a descriptor to its final text, prepend and append included.
    pub async fn resolve(&self, descriptor: &ReplacementDescriptor) -> Result<String, TemplateError> {
        let value = match &descriptor.kind {
            ReplacementKind::Text { value } => attribute_text(value),
            ReplacementKind::Query(spec) => self.query(spec).await?,
            ReplacementKind::Identify(spec) => self.statistics("identify", spec).await?,
            ReplacementKind::Statistics(spec) => self.statistics("computeStatisticsHistograms", spec).await?,
            ReplacementKind::Calculate(spec) => self.calculate(spec)?,
        };
        Ok(descriptor.wrap(&value))
    }

    /// Resolve a raw config entry. Any failure is recorded as a warning and yields `""`.
    pub async fn resolve_raw(&self, key: &str, raw: &Value, warnings: &mut WarningLog) -> String {
        let result = match ReplacementDescriptor::from_value(raw) {
            Ok(descriptor) => self.resolve(&descriptor).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(value) => value,
            Err(err) => {
                warnings.add(format!("WARNING: Could not resolve replacement '{}': {}", key, err));
                String::new()
            }
        }
    }

    fn aoi_geometry(&self, filter: Option<&AoiFilter>) -> Result<Option<&AoiGeometry>, TemplateError> {
        let name = match filter.and_then(|filter| filter.aoi_name(self.default_aoi)) {
            Some(name) => name,
            None => return Ok(None),
        };
        self.aois
            .geometry(name)
            .map(Some)
            .ok_or_else(|| TemplateError::MissingAoi(name.to_string()))
    }

    async fn query(&self, spec: &QuerySpec) -> Result<String, TemplateError> {
        let mut payload = FormPayload::json()
            .with("returnGeometry", "false")
            .with("returnDistinctValues", "true")
            .with("where", spec.where_clause.as_str())
            .with("outFields", spec.return_field.as_str());

        if let Some(aoi) = self.aoi_geometry(spec.in_aoi.as_ref())? {
            let filter = if spec.use_centroid {
                centroid(&aoi.to_esri_geometry()).map(|(x, y)| GeometryFilter::Point {
                    x,
                    y,
                    wkid: aoi.wkid(),
                })
            } else {
                Some(GeometryFilter::Polygon(aoi.clone()))
            };
            if let Some(filter) = filter {
                payload = payload.with_filter(&filter);
            }
        }
        let payload = payload.with_token(self.token);

        let url = endpoint(&spec.service, "query");
        let body = post_with_token_retry(self.client, &url, &payload).await?;
        let features = parse_feature_set(&url, body)?;

        Ok(match features.features.as_slice() {
            [] => String::new(),
            [only] => only
                .attribute(&spec.return_field)
                .map(attribute_text)
                .unwrap_or_default(),
            _ => spec.multiple_value_placeholder.clone(),
        })
    }

    async fn statistics(&self, operation: &str, spec: &StatisticsSpec) -> Result<String, TemplateError> {
        let mut payload = FormPayload::json();
        if let Some(rule) = &spec.rendering_rule {
            payload.insert("renderingRule", rule.to_string());
        }
        if let Some(aoi) = self.aoi_geometry(spec.in_aoi.as_ref())? {
            payload = payload.with_filter(&GeometryFilter::Polygon(aoi.clone()));
        }
        let payload = payload.with_token(self.token);

        let url = endpoint(&spec.service, operation);
        let body = post_statistics(
            self.client,
            &url,
            &payload,
            spec.pixel_size,
            self.statistics_max_retries,
        )
        .await?;

        let calc = spec.calc.as_deref().unwrap_or("mean");
        let found = if body.get("statistics").is_some() {
            parse_statistics(&url, body)?.value(calc)
        } else {
            // identify answers with a single pixel value
            body.get("value").and_then(|value| match value {
                Value::Number(number) => number.as_f64(),
                Value::String(text) => text.trim().parse().ok(),
                _ => None,
            })
        };
        let value = found.ok_or_else(|| TemplateError::MissingStatistic(calc.to_string()))?;

        let value = value * spec.conversion_coefficient.unwrap_or(1.0);
        Ok(format!("{:.2} {}", value, spec.units).trim_end().to_string())
    }

    fn calculate(&self, spec: &CalculateSpec) -> Result<String, TemplateError> {
        let source = self.cache.read(&spec.layer)?;
        let first = match source.features.first() {
            Some(feature) => feature,
            None => return Ok(String::new()),
        };
        let geometry = match &first.geometry {
            Some(geometry) => geometry,
            None => return Ok("0".to_string()),
        };

        match spec.property {
            CalculateProperty::Area if source.is_polygon() => {
                let unit = match spec.area_unit.as_deref().filter(|unit| !unit.is_empty()) {
                    Some(name) => AreaUnit::from_name(name).ok_or_else(|| TemplateError::UnknownUnit(name.to_string()))?,
                    None => AreaUnit::SquareMeters,
                };
                let wkid = geometry
                    .spatial_reference
                    .as_ref()
                    .and_then(|sr| sr.latest_wkid.or(sr.wkid))
                    .or(source.wkid());
                Ok(unit.from_square_meters(geodesic_area(geometry, wkid)).to_string())
            }
            CalculateProperty::Area => Ok("0".to_string()),
            CalculateProperty::Centroid => Ok(centroid(geometry)
                .map(|(x, y)| format!("{},{}", x, y))
                .unwrap_or_default()),
        }
    }
}
