#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use aoi_report::config::ReportConfig;
use aoi_report::geometry::{Extent, FeatureSet};
use aoi_report::host::{HostError, LayerHandle, MapHost, OutlineStyle, PageDocument, TextElement};
use aoi_report::service::{FormPayload, RestClient, ServiceError};
use serde_json::{json, Value};

/// One request seen by [`MockRestClient`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub payload: FormPayload,
}

type Responder = Box<dyn Fn(&str, &FormPayload) -> Value + Send + Sync>;

/// Rest client answering from a closure and recording every request.
pub struct MockRestClient {
    responder: Responder,
    requests: Arc<tokio::sync::Mutex<Vec<RecordedRequest>>>,
}

impl MockRestClient {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str, &FormPayload) -> Value + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            requests: Arc::new(tokio::sync::Mutex::new(Vec::new())),
        }
    }

    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().await.clone()
    }

    /// Requests whose URL ends with `suffix`.
    pub async fn requests_to(&self, suffix: &str) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .await
            .iter()
            .filter(|request| request.url.ends_with(suffix))
            .cloned()
            .collect()
    }
}

#[async_trait::async_trait]
impl RestClient for MockRestClient {
    async fn post_form(&self, url: &str, payload: &FormPayload) -> Result<Value, ServiceError> {
        let mut requests = self.requests.lock().await;
        requests.push(RecordedRequest {
            url: url.to_string(),
            payload: payload.clone(),
        });
        Ok((self.responder)(url, payload))
    }
}

/// Square polygon feature in Web Mercator.
pub fn square_feature(object_id: i64, xmin: f64, ymin: f64, size: f64) -> Value {
    let (xmax, ymax) = (xmin + size, ymin + size);
    json!({
        "attributes": {"OBJECTID": object_id},
        "geometry": {
            "rings": [[[xmin, ymin], [xmin, ymax], [xmax, ymax], [xmax, ymin], [xmin, ymin]]]
        }
    })
}

pub fn feature_set(features: Vec<Value>) -> Value {
    json!({
        "geometryType": "esriGeometryPolygon",
        "spatialReference": {"wkid": 102100, "latestWkid": 3857},
        "features": features
    })
}

/// AOI with the single ring `[[0,0],[10,0],[10,10],[0,10],[0,0]]`.
pub fn unit_aoi() -> FeatureSet {
    serde_json::from_value(json!({
        "geometryType": "esriGeometryPolygon",
        "spatialReference": {"wkid": 102100},
        "features": [{
            "attributes": {"OBJECTID": 1},
            "geometry": {"rings": [[[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0], [0.0, 0.0]]]}
        }]
    }))
    .unwrap()
}

pub fn parse_config(value: Value) -> ReportConfig {
    ReportConfig::from_json_str(&value.to_string()).unwrap()
}

#[derive(Debug, Clone)]
pub struct FakeLayer {
    pub handle: LayerHandle,
    pub source: Option<PathBuf>,
    pub filter: String,
    pub style: Option<OutlineStyle>,
    pub refreshed: usize,
}

#[derive(Debug, Default, Clone)]
pub struct FakeLayout {
    pub texts: Vec<TextElement>,
    pub elements: HashSet<String>,
    pub frame_maps: HashMap<String, String>,
    pub frame_extents: HashMap<String, Extent>,
}

/// A page export and the row filters active while it was taken.
#[derive(Debug, Clone)]
pub struct ExportRecord {
    pub layout: String,
    pub path: PathBuf,
    pub filters: Vec<String>,
}

#[derive(Debug, Default, Clone)]
pub struct DocumentState {
    pub path: Option<PathBuf>,
    pub inserts: Vec<(PathBuf, usize)>,
    pub saved: bool,
}

pub struct RecordingDocument {
    state: Arc<std::sync::Mutex<DocumentState>>,
}

impl PageDocument for RecordingDocument {
    fn insert_pages(&mut self, path: &Path, index: usize) -> Result<(), HostError> {
        if !path.exists() {
            return Err(HostError::Operation(format!("{} does not exist", path.display())));
        }
        let mut state = self.state.lock().unwrap();
        state.inserts.push((path.to_path_buf(), index));
        Ok(())
    }

    fn save_and_close(&mut self) -> Result<(), HostError> {
        let mut state = self.state.lock().unwrap();
        if let Some(path) = &state.path {
            fs::write(path, b"%PDF-combined")?;
        }
        state.saved = true;
        Ok(())
    }
}

/// In-memory map authoring host.
#[derive(Default)]
pub struct FakeHost {
    pub opened: Option<String>,
    pub missing_project: bool,
    maps: HashMap<String, Vec<FakeLayer>>,
    layouts: HashMap<String, FakeLayout>,
    next_id: u64,
    /// `swap_source` fails for templates with this name.
    pub failing_swap: Option<String>,
    /// `set_row_filter` fails for predicates containing this text.
    pub failing_filter: Option<String>,
    pub exports: Vec<ExportRecord>,
    pub document: Arc<std::sync::Mutex<DocumentState>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_map(mut self, map: &str, layers: &[&str]) -> Self {
        let mut entries = Vec::new();
        for name in layers {
            self.next_id += 1;
            entries.push(FakeLayer {
                handle: LayerHandle {
                    id: self.next_id,
                    name: name.to_string(),
                },
                source: None,
                filter: "1=1".to_string(),
                style: None,
                refreshed: 0,
            });
        }
        self.maps.insert(map.to_string(), entries);
        self
    }

    pub fn with_layout(mut self, layout: &str, texts: &[(&str, &str)], elements: &[&str]) -> Self {
        self.layouts.insert(
            layout.to_string(),
            FakeLayout {
                texts: texts
                    .iter()
                    .map(|(name, text)| TextElement {
                        name: name.to_string(),
                        text: text.to_string(),
                    })
                    .collect(),
                elements: elements.iter().map(|name| name.to_string()).collect(),
                ..FakeLayout::default()
            },
        );
        self
    }

    pub fn layer(&self, map: &str, name: &str) -> Option<&FakeLayer> {
        self.maps.get(map)?.iter().find(|layer| layer.handle.name == name)
    }

    pub fn layer_names(&self, map: &str) -> Vec<String> {
        self.maps
            .get(map)
            .map(|layers| layers.iter().map(|layer| layer.handle.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn text(&self, layout: &str, element: &str) -> Option<String> {
        self.layouts
            .get(layout)?
            .texts
            .iter()
            .find(|text| text.name == element)
            .map(|text| text.text.clone())
    }

    pub fn frame_extent(&self, layout: &str, frame: &str) -> Option<Extent> {
        self.layouts.get(layout)?.frame_extents.get(frame).copied()
    }

    pub fn frame_map(&self, layout: &str, frame: &str) -> Option<String> {
        self.layouts.get(layout)?.frame_maps.get(frame).cloned()
    }

    pub fn document_state(&self) -> DocumentState {
        self.document.lock().unwrap().clone()
    }

    fn layer_mut(&mut self, map: &str, id: u64) -> Result<&mut FakeLayer, HostError> {
        self.maps
            .get_mut(map)
            .ok_or_else(|| HostError::MapNotFound(map.to_string()))?
            .iter_mut()
            .find(|layer| layer.handle.id == id)
            .ok_or_else(|| HostError::LayerNotFound {
                map: map.to_string(),
                layer: id.to_string(),
            })
    }

    fn layout_mut(&mut self, layout: &str) -> Result<&mut FakeLayout, HostError> {
        self.layouts
            .get_mut(layout)
            .ok_or_else(|| HostError::LayoutNotFound(layout.to_string()))
    }
}

impl MapHost for FakeHost {
    fn open_project(&mut self, project_name: &str) -> Result<(), HostError> {
        if self.missing_project {
            return Err(HostError::ProjectUnavailable(project_name.to_string()));
        }
        self.opened = Some(project_name.to_string());
        Ok(())
    }

    fn has_layout(&self, layout: &str) -> bool {
        self.layouts.contains_key(layout)
    }

    fn has_map(&self, map: &str) -> bool {
        self.maps.contains_key(map)
    }

    fn find_layer(&self, map: &str, name: &str) -> Option<LayerHandle> {
        self.layer(map, name).map(|layer| layer.handle.clone())
    }

    fn add_layer_from_path(&mut self, map: &str, path: &Path, name: &str) -> Result<LayerHandle, HostError> {
        if !path.exists() {
            return Err(HostError::Operation(format!("{} does not exist", path.display())));
        }
        self.next_id += 1;
        let handle = LayerHandle {
            id: self.next_id,
            name: name.to_string(),
        };
        self.maps
            .get_mut(map)
            .ok_or_else(|| HostError::MapNotFound(map.to_string()))?
            .push(FakeLayer {
                handle: handle.clone(),
                source: Some(path.to_path_buf()),
                filter: "1=1".to_string(),
                style: None,
                refreshed: 0,
            });
        Ok(handle)
    }

    fn swap_source(&mut self, map: &str, template: &LayerHandle, source: &LayerHandle) -> Result<LayerHandle, HostError> {
        if self.failing_swap.as_deref() == Some(template.name.as_str()) {
            return Err(HostError::Operation(format!("cannot update {}", template.name)));
        }
        let path = self.layer_mut(map, source.id)?.source.clone();
        self.layer_mut(map, template.id)?.source = path;
        if let Some(layers) = self.maps.get_mut(map) {
            layers.retain(|layer| layer.handle.id != source.id);
        }
        Ok(template.clone())
    }

    fn rename_layer(&mut self, map: &str, layer: &LayerHandle, name: &str) -> Result<LayerHandle, HostError> {
        let entry = self.layer_mut(map, layer.id)?;
        entry.handle.name = name.to_string();
        Ok(entry.handle.clone())
    }

    fn remove_layer(&mut self, map: &str, layer: &LayerHandle) -> Result<(), HostError> {
        self.layer_mut(map, layer.id)?;
        if let Some(layers) = self.maps.get_mut(map) {
            layers.retain(|entry| entry.handle.id != layer.id);
        }
        Ok(())
    }

    fn set_row_filter(&mut self, map: &str, layer: &LayerHandle, predicate: &str) -> Result<(), HostError> {
        if self
            .failing_filter
            .as_deref()
            .is_some_and(|needle| predicate.contains(needle))
        {
            return Err(HostError::Operation(format!("bad filter {}", predicate)));
        }
        self.layer_mut(map, layer.id)?.filter = predicate.to_string();
        Ok(())
    }

    fn set_outline_style(&mut self, map: &str, layer: &LayerHandle, style: &OutlineStyle) -> Result<(), HostError> {
        self.layer_mut(map, layer.id)?.style = Some(style.clone());
        Ok(())
    }

    fn refresh_symbology(&mut self, map: &str, layer: &LayerHandle) -> Result<(), HostError> {
        self.layer_mut(map, layer.id)?.refreshed += 1;
        Ok(())
    }

    fn set_frame_map(&mut self, layout: &str, frame: &str, map: &str) -> Result<(), HostError> {
        if !self.maps.contains_key(map) {
            return Err(HostError::MapNotFound(map.to_string()));
        }
        self.layout_mut(layout)?
            .frame_maps
            .insert(frame.to_string(), map.to_string());
        Ok(())
    }

    fn set_frame_extent(&mut self, layout: &str, frame: &str, extent: Extent) -> Result<(), HostError> {
        self.layout_mut(layout)?
            .frame_extents
            .insert(frame.to_string(), extent);
        Ok(())
    }

    fn layer_extent(&self, _layout: &str, _frame: &str, layer: &LayerHandle) -> Result<Extent, HostError> {
        let source = self
            .maps
            .values()
            .flatten()
            .find(|entry| entry.handle.id == layer.id)
            .and_then(|entry| entry.source.clone())
            .ok_or_else(|| HostError::Operation(format!("{} has no data", layer.name)))?;

        let raw = fs::read_to_string(&source)?;
        let features: FeatureSet =
            serde_json::from_str(&raw).map_err(|err| HostError::Operation(err.to_string()))?;
        let rings: Vec<_> = features
            .features
            .iter()
            .filter_map(|feature| feature.geometry.as_ref()?.rings.clone())
            .flatten()
            .collect();
        Extent::from_rings(&rings).ok_or_else(|| HostError::Operation(format!("{} is empty", layer.name)))
    }

    fn text_elements(&self, layout: &str) -> Vec<TextElement> {
        self.layouts
            .get(layout)
            .map(|entry| entry.texts.clone())
            .unwrap_or_default()
    }

    fn set_text(&mut self, layout: &str, element: &str, text: &str) -> Result<(), HostError> {
        let entry = self
            .layout_mut(layout)?
            .texts
            .iter_mut()
            .find(|entry| entry.name == element)
            .ok_or_else(|| HostError::ElementNotFound {
                layout: layout.to_string(),
                element: element.to_string(),
            })?;
        entry.text = text.to_string();
        Ok(())
    }

    fn has_element(&self, layout: &str, element: &str) -> bool {
        self.layouts
            .get(layout)
            .is_some_and(|entry| entry.elements.contains(element))
    }

    fn export_page(&mut self, layout: &str, path: &Path) -> Result<(), HostError> {
        if !self.layouts.contains_key(layout) {
            return Err(HostError::LayoutNotFound(layout.to_string()));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, format!("%PDF-fake {}", layout))?;

        let filters = self
            .maps
            .values()
            .flatten()
            .filter(|layer| layer.filter != "1=1")
            .map(|layer| layer.filter.clone())
            .collect();
        self.exports.push(ExportRecord {
            layout: layout.to_string(),
            path: path.to_path_buf(),
            filters,
        });
        Ok(())
    }

    fn create_document(&mut self, path: &Path) -> Result<Box<dyn PageDocument>, HostError> {
        self.document.lock().unwrap().path = Some(path.to_path_buf());
        Ok(Box::new(RecordingDocument {
            state: Arc::clone(&self.document),
        }))
    }
}
