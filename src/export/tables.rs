use crate::config::LayerConfig;
use crate::derive::{clip_and_dissolve, clipped_layer_name, recompute_area_fields, restore_field_names};
use crate::geometry::{AoiGeometry, AoiInfo, FeatureSet};
use crate::host::{swap_in_local_copy, HostError, LayerHandle, MapHost};
use crate::localize::{simplify_layer_name, LayerLocalizer};

use super::TableError;

/// A table layer now backed by AOI-filtered local data.
#[derive(Debug, Clone)]
pub struct PreparedTable {
    pub layer: LayerHandle,
    /// Rows behind the layer after clip, dissolve and area recomputation.
    pub rows: FeatureSet,
}

/// Fill the template table layer `config.name` with the features that fall in the AOI.
///
/// The AOI definition of the layer is fetched once per run. A clipping layer
/// is clipped to the AOI and dissolved, then renamed with the
/// `(CLIPPED_DISSOLVED)` suffix. Area fields are recomputed on whatever ends up
/// in the layer, and the host refreshes its unique-value classes.
pub async fn prepare_table_layer(
    localizer: &LayerLocalizer<'_>,
    host: &mut dyn MapHost,
    map: &str,
    info: &mut AoiInfo,
    aoi: &AoiGeometry,
    config: &LayerConfig,
) -> Result<PreparedTable, TableError> {
    let template = host
        .find_layer(map, &config.name)
        .ok_or_else(|| HostError::LayerNotFound {
            map: map.to_string(),
            layer: config.name.clone(),
        })?;

    let definition = localizer
        .fetch_definition(info, &config.name, &config.source, aoi)
        .await?;

    let mut rows = if config.clip {
        let mut dissolved = clip_and_dissolve(
            &definition,
            aoi,
            config.dissolve_field.as_deref(),
            &config.visible_fields,
        )?;
        restore_field_names(&mut dissolved, &config.visible_fields);
        dissolved
    } else {
        definition
    };

    let total = recompute_area_fields(
        &mut rows,
        config.acres_replace.as_deref(),
        config.percent_of_field_replace.as_deref(),
    );

    let final_name = if config.clip {
        clipped_layer_name(&config.name)
    } else {
        config.name.clone()
    };
    let key = simplify_layer_name(&final_name);
    let path = localizer.cache().write(&key, &rows)?;

    let mut layer = swap_in_local_copy(host, map, &template, &path, &key)?;
    if config.clip {
        layer = host.rename_layer(map, &layer, &final_name)?;
    }
    host.refresh_symbology(map, &layer)?;

    log::info!(
        "Prepared table layer {} ({} rows, {:.2} acres)",
        layer.name,
        rows.features.len(),
        total
    );
    Ok(PreparedTable { layer, rows })
}
