//! Capabilities borrowed from the map-authoring host.
//!
//! The report pipeline never touches the host's object model directly. An
//! embedding application implements [`MapHost`] (layouts, maps, layers, text
//! elements, page export) and [`PageDocument`] (the combined output), and
//! tests drive the pipeline with in-memory doubles.

use std::path::Path;

use thiserror::Error;

use crate::geometry::Extent;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("template project '{0}' could not be opened")]
    ProjectUnavailable(String),
    #[error("layout '{0}' not found")]
    LayoutNotFound(String),
    #[error("map '{0}' not found")]
    MapNotFound(String),
    #[error("layer '{layer}' not found in map '{map}'")]
    LayerNotFound { map: String, layer: String },
    #[error("element '{element}' not found on layout '{layout}'")]
    ElementNotFound { layout: String, element: String },
    #[error("host operation failed: {0}")]
    Operation(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Opaque reference to a layer the host owns.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LayerHandle {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextElement {
    pub name: String,
    pub text: String,
}

/// Polygon outline styling, colors as RGBA.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlineStyle {
    pub fill_color: Vec<u8>,
    pub outline_color: Vec<u8>,
    pub outline_size: f64,
}

pub trait MapHost {
    /// Open the template project. Failure ends the run.
    fn open_project(&mut self, project_name: &str) -> Result<(), HostError>;

    fn has_layout(&self, layout: &str) -> bool;

    fn has_map(&self, map: &str) -> bool;

    fn find_layer(&self, map: &str, name: &str) -> Option<LayerHandle>;

    /// Add a layer backed by a local feature-cache entry.
    fn add_layer_from_path(&mut self, map: &str, path: &Path, name: &str) -> Result<LayerHandle, HostError>;

    /// Point `template` at the data behind `source`, keeping the template's
    /// symbology and labelling, then remove `source` from the map.
    fn swap_source(&mut self, map: &str, template: &LayerHandle, source: &LayerHandle) -> Result<LayerHandle, HostError>;

    fn rename_layer(&mut self, map: &str, layer: &LayerHandle, name: &str) -> Result<LayerHandle, HostError>;

    fn remove_layer(&mut self, map: &str, layer: &LayerHandle) -> Result<(), HostError>;

    /// Layer-level row filter; `1=1` shows every row.
    fn set_row_filter(&mut self, map: &str, layer: &LayerHandle, predicate: &str) -> Result<(), HostError>;

    fn set_outline_style(&mut self, map: &str, layer: &LayerHandle, style: &OutlineStyle) -> Result<(), HostError>;

    /// Rebuild unique-value classes from the values now present in the layer.
    fn refresh_symbology(&mut self, map: &str, layer: &LayerHandle) -> Result<(), HostError>;

    fn set_frame_map(&mut self, layout: &str, frame: &str, map: &str) -> Result<(), HostError>;

    fn set_frame_extent(&mut self, layout: &str, frame: &str, extent: Extent) -> Result<(), HostError>;

    /// Extent of `layer` as drawn in the named frame.
    fn layer_extent(&self, layout: &str, frame: &str, layer: &LayerHandle) -> Result<Extent, HostError>;

    fn text_elements(&self, layout: &str) -> Vec<TextElement>;

    fn set_text(&mut self, layout: &str, element: &str, text: &str) -> Result<(), HostError>;

    fn has_element(&self, layout: &str, element: &str) -> bool;

    fn export_page(&mut self, layout: &str, path: &Path) -> Result<(), HostError>;

    fn create_document(&mut self, path: &Path) -> Result<Box<dyn PageDocument>, HostError>;
}

/// Add the cache entry at `path` and point `template` at it.
///
/// When the swap fails the added layer is taken out of the map again, so the
/// template is the only copy left.
pub fn swap_in_local_copy(
    host: &mut dyn MapHost,
    map: &str,
    template: &LayerHandle,
    path: &Path,
    name: &str,
) -> Result<LayerHandle, HostError> {
    let local = host.add_layer_from_path(map, path, name)?;
    host.swap_source(map, template, &local).map_err(|err| {
        if let Err(cleanup) = host.remove_layer(map, &local) {
            log::warn!("Could not remove {} from map {}: {}", local.name, map, cleanup);
        }
        err
    })
}

/// The multi-page output being assembled.
pub trait PageDocument {
    /// Insert every page of the artifact at `path` before page `index`.
    fn insert_pages(&mut self, path: &Path, index: usize) -> Result<(), HostError>;

    fn save_and_close(&mut self) -> Result<(), HostError>;
}
