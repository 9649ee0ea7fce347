use crate::geometry::{AoiGeometry, AoiInfo, FeatureSet};
use crate::host::{swap_in_local_copy, LayerHandle, MapHost};
use crate::service::{endpoint, parse_feature_set, post_with_token_retry, FormPayload, GeometryFilter, RestClient};
use crate::warnings::WarningLog;

use super::{simplify_layer_name, FeatureCache, LocalizeError};

/// Copies remote layers into the feature cache and re-points template layers at them.
pub struct LayerLocalizer<'a> {
    client: &'a dyn RestClient,
    cache: &'a FeatureCache,
    token: Option<&'a str>,
}

impl<'a> LayerLocalizer<'a> {
    pub fn new(client: &'a dyn RestClient, cache: &'a FeatureCache, token: Option<&'a str>) -> Self {
        Self { client, cache, token }
    }

    pub fn cache(&self) -> &FeatureCache {
        self.cache
    }

    /// Localize the template layer `layer_name` of `map`.
    ///
    /// A cached copy is reused without any network call. Otherwise the layer
    /// is queried from `source_url` (optionally spatially filtered) and cached.
    /// Either way the template layer ends up pointing at the local copy. On
    /// failure a warning is recorded and the untouched template is returned;
    /// `None` only when the template itself is missing.
    pub async fn localize(
        &self,
        host: &mut dyn MapHost,
        map: &str,
        layer_name: &str,
        source_url: &str,
        filter: Option<&GeometryFilter>,
        warnings: &mut WarningLog,
    ) -> Option<LayerHandle> {
        let template = match host.find_layer(map, layer_name) {
            Some(layer) => layer,
            None => {
                warnings.add(format!(
                    "WARNING: Could not find layer {} in map {} to localize",
                    layer_name, map
                ));
                return None;
            }
        };

        match self
            .localize_template(host, map, &template, source_url, filter)
            .await
        {
            Ok(layer) => Some(layer),
            Err(err) => {
                warnings.add(format!(
                    "WARNING: Could not localize layer {}: {}",
                    layer_name, err
                ));
                Some(template)
            }
        }
    }

    async fn localize_template(
        &self,
        host: &mut dyn MapHost,
        map: &str,
        template: &LayerHandle,
        source_url: &str,
        filter: Option<&GeometryFilter>,
    ) -> Result<LayerHandle, LocalizeError> {
        let key = simplify_layer_name(&template.name);

        if self.cache.contains(&key) {
            log::info!("Reusing cached copy of {}", template.name);
        } else {
            let features = self.query(source_url, self.query_payload(filter), &key).await?;
            self.cache.write(&key, &features)?;
        }

        Ok(swap_in_local_copy(host, map, template, &self.cache.path_for(&key), &key)?)
    }

    fn query_payload(&self, filter: Option<&GeometryFilter>) -> FormPayload {
        let payload = FormPayload::feature_query().with_token(self.token);
        match filter {
            Some(filter) => payload.with_filter(filter),
            None => payload,
        }
    }

    async fn query(&self, source_url: &str, payload: FormPayload, key: &str) -> Result<FeatureSet, LocalizeError> {
        let url = endpoint(source_url, "query");
        log::info!("Querying {}", url);
        let body = post_with_token_retry(self.client, &url, &payload).await?;
        self.cache.write_payload(key, &body)?;
        Ok(parse_feature_set(&url, body)?)
    }

    /// Features of `layer_name` intersecting the exact AOI polygon, returned
    /// in the AOI's spatial reference.
    ///
    /// Fetched once per layer per AOI and kept in `info` for the rest of the run.
    pub async fn fetch_definition(
        &self,
        info: &mut AoiInfo,
        layer_name: &str,
        source_url: &str,
        aoi: &AoiGeometry,
    ) -> Result<FeatureSet, LocalizeError> {
        if let Some(features) = info.definition(layer_name) {
            log::debug!("Definition of {} already fetched for this AOI", layer_name);
            return Ok(features.clone());
        }

        let filter = GeometryFilter::Polygon(aoi.clone());
        let mut payload = self.query_payload(Some(&filter));
        if let Some(wkid) = aoi.wkid() {
            payload.insert("outSR", wkid.to_string());
        }
        let features = self
            .query(source_url, payload, &simplify_layer_name(layer_name))
            .await?;
        info.insert_definition(layer_name, features.clone());
        Ok(features)
    }
}
