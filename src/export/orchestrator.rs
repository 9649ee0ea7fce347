use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{LayerConfig, LayoutConfig, ReportConfig};
use crate::geometry::measure::{project_to_web_mercator, Projection};
use crate::geometry::{
    buffer_extent, resolve_extent, AoiGeometry, AoiRegistry, Extent, ExtentInput, FeatureSet,
};
use crate::host::{swap_in_local_copy, HostError, LayerHandle, MapHost, OutlineStyle, PageDocument};
use crate::localize::{simplify_layer_name, FeatureCache, LayerLocalizer};
use crate::overflow::{paginate, read_rows, DEFAULT_PAGE_SIZE, UNRESTRICTED};
use crate::portal;
use crate::service::{GeometryFilter, RestClient};
use crate::templating::{replace_layout_text, ReplacementMemo, TokenResolver};
use crate::warnings::WarningLog;
use crate::workspace::{clean_old_runs, external_report_url, RunWorkspace};

use super::{prepare_table_layer, PreparedTable, ProgressTracker, ReportError};

/// Buffer around the AOI layer when a layout fits its map to the AOI.
pub const DEFAULT_AOI_BUFFER_PERCENT: f64 = 10.0;
pub const INSET_BUFFER_PERCENT: f64 = 50.0;

const SETUP_PROGRESS: f64 = 5.0;
const AOI_PROGRESS: f64 = 10.0;
const LAYOUTS_PROGRESS: f64 = 80.0;
const SAVE_PROGRESS: f64 = 2.0;
const CLEANUP_PROGRESS: f64 = 3.0;

/// Input of one report run.
#[derive(Debug, Clone)]
pub struct ReportRequest {
    /// AOI features, Web Mercator or WGS84.
    pub aoi: FeatureSet,
    /// Extent the caller was looking at, used by `preserve_extent` layouts
    /// and as the spatial filter for localized layers.
    pub extent: Option<ExtentInput>,
    /// Map names to export. Empty means every layout.
    pub map_types: Vec<String>,
}

impl ReportRequest {
    pub fn new(aoi: FeatureSet) -> Self {
        Self {
            aoi,
            extent: None,
            map_types: Vec::new(),
        }
    }

    pub fn with_extent(mut self, extent: impl Into<ExtentInput>) -> Self {
        self.extent = Some(extent.into());
        self
    }

    pub fn with_map_types<I, S>(mut self, map_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.map_types = map_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn wants(&self, map: &str) -> bool {
        self.map_types.is_empty() || self.map_types.iter().any(|wanted| wanted == map)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutStage {
    AoiSetup,
    MapSubstitution,
    TextSubstitution,
    OverflowExport,
    SingleExport,
    Done,
}

impl fmt::Display for LayoutStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LayoutStage::AoiSetup => "AOI_SETUP",
            LayoutStage::MapSubstitution => "MAP_SUBSTITUTION",
            LayoutStage::TextSubstitution => "TEXT_SUBSTITUTION",
            LayoutStage::OverflowExport => "OVERFLOW_EXPORT",
            LayoutStage::SingleExport => "SINGLE_EXPORT",
            LayoutStage::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// A page artifact and the document index it was inserted at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagePlacement {
    pub layout: String,
    pub path: PathBuf,
    pub index: usize,
}

#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub report_path: PathBuf,
    pub run_dir: PathBuf,
    pub external_url: Option<String>,
    /// Non-fatal problems, in the order they happened.
    pub warnings: Vec<String>,
    pub pages: Vec<PagePlacement>,
    pub stages: Vec<(String, LayoutStage)>,
    pub progress: f64,
}

/// The AOI layer of a layout's map and, when the layout has one, of its inset map.
struct AoiLayers {
    main: LayerHandle,
    inset: Option<LayerHandle>,
}

/// State shared by every layout of one run.
struct RunState<'a> {
    workspace: &'a RunWorkspace,
    cache: &'a FeatureCache,
    token: Option<&'a str>,
    request: &'a ReportRequest,
    aoi: &'a AoiGeometry,
    localize_filter: Option<&'a GeometryFilter>,
    registry: AoiRegistry,
    memo: ReplacementMemo,
    warnings: WarningLog,
    document: Box<dyn PageDocument>,
    pages: Vec<PagePlacement>,
    stages: Vec<(String, LayoutStage)>,
    placement_bumper: usize,
}

impl RunState<'_> {
    fn enter(&mut self, layout: &str, stage: LayoutStage) {
        log::debug!("{}: {}", layout, stage);
        self.stages.push((layout.to_string(), stage));
    }
}

pub struct ReportRunner {
    config: ReportConfig,
    client: Arc<dyn RestClient>,
    root: PathBuf,
    run_name: Option<String>,
}

impl ReportRunner {
    /// `root` is the folder holding `reports/`.
    pub fn new(config: ReportConfig, client: Arc<dyn RestClient>, root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            client,
            root: root.into(),
            run_name: None,
        }
    }

    /// Use a fixed run folder name instead of the current timestamp.
    pub fn with_run_name(mut self, run_name: impl Into<String>) -> Self {
        self.run_name = Some(run_name.into());
        self
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    /// Produce the combined report for `request`.
    ///
    /// Only setup failures are returned as errors. Everything that goes wrong
    /// inside a layout becomes a warning in the outcome and the run goes on.
    pub async fn run(&self, host: &mut dyn MapHost, request: &ReportRequest) -> Result<ReportOutcome, ReportError> {
        let config = &self.config;
        let mut warnings = WarningLog::new();
        let mut progress = ProgressTracker::new();

        host.open_project(&config.project_name)
            .map_err(ReportError::TemplateProject)?;

        let workspace = match &self.run_name {
            Some(name) => RunWorkspace::initialize_named(
                &self.root,
                name,
                &config.gdb_name,
                config.output_dir.as_deref(),
            )?,
            None => RunWorkspace::initialize(&self.root, &config.gdb_name, config.output_dir.as_deref())?,
        };
        let cache = FeatureCache::open(workspace.store_dir(), workspace.json_dir())?;
        let token = portal::sign_in(self.client.as_ref(), &config.portal, &mut warnings).await;
        progress.advance(SETUP_PROGRESS);

        let mut registry = AoiRegistry::new();
        let aoi = self.register_aoi(request, &cache, &mut registry, &mut warnings)?;

        let report_path = workspace.report_path(&config.report_filename);
        let document = host
            .create_document(&report_path)
            .map_err(ReportError::Document)?;
        progress.advance(AOI_PROGRESS);

        let localize_filter = request
            .extent
            .as_ref()
            .and_then(|raw| resolve_extent(raw, config.localize_buffer_percent, &mut warnings))
            .map(GeometryFilter::Envelope);

        let mut run = RunState {
            workspace: &workspace,
            cache: &cache,
            token: token.as_deref(),
            request,
            aoi: &aoi,
            localize_filter: localize_filter.as_ref(),
            registry,
            memo: ReplacementMemo::new(),
            warnings,
            document,
            pages: Vec::new(),
            stages: Vec::new(),
            placement_bumper: 0,
        };

        let share = if config.layouts.is_empty() {
            LAYOUTS_PROGRESS
        } else {
            LAYOUTS_PROGRESS / config.layouts.len() as f64
        };
        for (key, layout) in &config.layouts {
            match layout.map.as_deref() {
                Some(map) if request.wants(map) => self.export_layout(host, &mut run, layout, map).await,
                _ => log::info!("Skipping layout {}: map type not requested", key),
            }
            progress.advance(share);
        }
        if config.layouts.is_empty() {
            progress.advance(share);
        }

        run.document.save_and_close().map_err(ReportError::Document)?;
        let external_url = config
            .external_url
            .as_deref()
            .map(|url| external_report_url(&report_path, url));
        progress.advance(SAVE_PROGRESS);

        let RunState {
            mut warnings,
            pages,
            stages,
            ..
        } = run;
        if let Err(err) = clean_old_runs(&self.root, config.max_report_buffer.max(1), &mut warnings) {
            warnings.add(format!("WARNING: Could not clean old reports: {}", err));
        }
        progress.advance(CLEANUP_PROGRESS);

        log::info!("Report written to {}", report_path.display());
        Ok(ReportOutcome {
            report_path,
            run_dir: workspace.run_dir().to_path_buf(),
            external_url,
            warnings: warnings.into_vec(),
            pages,
            stages,
            progress: progress.percent(),
        })
    }

    /// Project the AOI, cache it under the AOI layer name and resolve its geometry.
    fn register_aoi(
        &self,
        request: &ReportRequest,
        cache: &FeatureCache,
        registry: &mut AoiRegistry,
        warnings: &mut WarningLog,
    ) -> Result<AoiGeometry, ReportError> {
        let mut features = request.aoi.clone();
        if let Projection::Unsupported(wkid) = project_to_web_mercator(&mut features) {
            warnings.add(format!(
                "WARNING: AOI spatial reference {} cannot be projected to Web Mercator, using it as is",
                wkid
            ));
        }

        let aoi_name = &self.config.aoi.name;
        let geometry = registry.entry(aoi_name).geometry_or_resolve(&features).clone();
        if geometry.is_empty() {
            return Err(ReportError::EmptyAoi);
        }
        cache.write(&simplify_layer_name(aoi_name), &features)?;
        Ok(geometry)
    }

    async fn export_layout(&self, host: &mut dyn MapHost, run: &mut RunState<'_>, layout: &LayoutConfig, map: &str) {
        let config = &self.config;
        let name = layout.name.as_str();
        if !host.has_layout(name) {
            run.warnings
                .add(format!("WARNING: Layout {} not found in project, skipping", name));
            return;
        }
        if !host.has_map(map) {
            run.warnings
                .add(format!("WARNING: Map {} for layout {} not found, skipping", map, name));
            return;
        }
        log::info!("Exporting layout {}", name);

        run.enter(name, LayoutStage::AoiSetup);
        let aoi_layers = self.setup_aoi_layers(host, run, layout, map);

        let localizer = LayerLocalizer::new(self.client.as_ref(), run.cache, run.token);
        for (layer, source) in &layout.localize_layers {
            localizer
                .localize(host, map, layer, source, run.localize_filter, &mut run.warnings)
                .await;
        }

        let mut tables: Vec<(&str, &LayerConfig, PreparedTable)> = Vec::new();
        for (key, table) in &layout.table_layers {
            let info = run.registry.entry(&config.aoi.name);
            match prepare_table_layer(&localizer, host, map, info, run.aoi, table).await {
                Ok(prepared) => tables.push((key.as_str(), table, prepared)),
                Err(err) => run.warnings.add(format!(
                    "WARNING: Could not prepare table layer {}: {}",
                    table.name, err
                )),
            }
        }

        run.enter(name, LayoutStage::MapSubstitution);
        for (kind, frame) in &config.map_frames {
            if let Some(target) = layout.map_for(kind) {
                if let Err(err) = host.set_frame_map(name, frame, target) {
                    run.warnings
                        .add(format!("WARNING: Could not set {} on layout {}: {}", frame, name, err));
                }
            }
        }
        self.set_extents(host, run, layout, aoi_layers.as_ref());

        run.enter(name, LayoutStage::TextSubstitution);
        let resolver = TokenResolver::new(
            self.client.as_ref(),
            run.cache,
            &run.registry,
            &config.aoi.name,
            run.token,
            config.statistics_max_retries,
        );
        replace_layout_text(
            &resolver,
            host,
            name,
            &layout.replacement,
            &config.generic_replacement,
            &mut run.memo,
            &mut run.warnings,
        )
        .await;

        let has_table_frame = config
            .table_frame_element
            .as_deref()
            .is_some_and(|element| host.has_element(name, element));
        let paginates = tables.iter().any(|(_, table, _)| table.paginate);
        let overflow_pages = if has_table_frame && paginates {
            run.enter(name, LayoutStage::OverflowExport);
            self.export_overflow(host, run, layout, map, &tables)
        } else {
            0
        };

        if overflow_pages == 0 {
            run.enter(name, LayoutStage::SingleExport);
            let path = run.workspace.page_path(map);
            let index = layout.placement + run.placement_bumper;
            export_and_insert(host, run, name, path, index);
        }
        run.enter(name, LayoutStage::Done);
    }

    /// Put the AOI on the layout's map (and inset map) and style its outline.
    fn setup_aoi_layers(
        &self,
        host: &mut dyn MapHost,
        run: &mut RunState<'_>,
        layout: &LayoutConfig,
        map: &str,
    ) -> Option<AoiLayers> {
        let aoi = &self.config.aoi;
        let key = simplify_layer_name(&aoi.name);
        let path = run.cache.path_for(&key);
        let style = OutlineStyle {
            fill_color: aoi.fill_color.clone(),
            outline_color: layout
                .aoi_outline_color
                .clone()
                .unwrap_or_else(|| aoi.outline_color.clone()),
            outline_size: layout.aoi_outline_size.unwrap_or(aoi.outline_size),
        };

        let mut attach = |host: &mut dyn MapHost, target: &str| -> Option<LayerHandle> {
            let result = attach_aoi(host, target, &aoi.name, &key, &path).and_then(|layer| {
                host.set_outline_style(target, &layer, &style)?;
                Ok(layer)
            });
            match result {
                Ok(layer) => Some(layer),
                Err(err) => {
                    run.warnings
                        .add(format!("WARNING: Could not add the AOI to map {}: {}", target, err));
                    None
                }
            }
        };

        let main = attach(host, map)?;
        let inset = layout
            .inset_map
            .as_deref()
            .filter(|inset| host.has_map(inset))
            .and_then(|inset| attach(host, inset));
        Some(AoiLayers { main, inset })
    }

    fn set_extents(&self, host: &mut dyn MapHost, run: &mut RunState<'_>, layout: &LayoutConfig, aoi: Option<&AoiLayers>) {
        let name = layout.name.as_str();
        let request = run.request;

        if let Some(frame) = self.config.frame_name("map") {
            let extent = if layout.preserve_extent {
                request.extent.as_ref().and_then(|raw| {
                    resolve_extent(raw, layout.extent_buffer_percent.unwrap_or(0.0), &mut run.warnings)
                })
            } else {
                aoi.and_then(|layers| {
                    let percent = layout
                        .extent_buffer_percent
                        .unwrap_or(DEFAULT_AOI_BUFFER_PERCENT);
                    aoi_extent(host, name, frame, &layers.main, percent, &mut run.warnings)
                })
            };
            apply_extent(host, name, frame, extent, &mut run.warnings);
        }

        let inset = aoi.and_then(|layers| layers.inset.as_ref());
        if let (Some(frame), Some(inset_layer)) = (self.config.frame_name("inset_map"), inset) {
            let extent = if layout.preserve_extent {
                request
                    .extent
                    .as_ref()
                    .and_then(|raw| resolve_extent(raw, INSET_BUFFER_PERCENT, &mut run.warnings))
            } else {
                aoi_extent(host, name, frame, inset_layer, INSET_BUFFER_PERCENT, &mut run.warnings)
            };
            apply_extent(host, name, frame, extent, &mut run.warnings);
        }
    }

    /// Export one page per row chunk of every paginating table layer.
    ///
    /// Every inserted page after the layout's first one moves the placement
    /// bumper by one, so later tables and layouts land after these pages.
    /// Returns the number of pages inserted.
    fn export_overflow(
        &self,
        host: &mut dyn MapHost,
        run: &mut RunState<'_>,
        layout: &LayoutConfig,
        map: &str,
        tables: &[(&str, &LayerConfig, PreparedTable)],
    ) -> usize {
        let name = layout.name.as_str();
        let page_size = layout.max_table_rows.unwrap_or(DEFAULT_PAGE_SIZE);
        let mut exported = 0;

        for (key, table, prepared) in tables.iter().filter(|(_, table, _)| table.paginate) {
            let ids = read_rows(&prepared.rows, table.acres_replace.as_deref());
            let pages = paginate(&ids, page_size);
            log::info!(
                "{} rows of {} split into {} page(s) on {}",
                ids.len(),
                prepared.layer.name,
                pages.len(),
                name
            );

            for (idx, page) in pages.iter().enumerate() {
                if let Err(err) = host.set_row_filter(map, &prepared.layer, &page.predicate) {
                    run.warnings.add(format!(
                        "WARNING: Could not filter {} for page {}: {}",
                        prepared.layer.name,
                        idx + 1,
                        err
                    ));
                    continue;
                }
                let path = run.workspace.page_path(&format!("{}_{}_{}", map, key, idx));
                let offset = usize::from(exported > 0);
                let index = layout.placement + run.placement_bumper + offset;
                if export_and_insert(host, run, name, path, index) {
                    run.placement_bumper += offset;
                    exported += 1;
                }
            }

            if let Err(err) = host.set_row_filter(map, &prepared.layer, UNRESTRICTED) {
                run.warnings.add(format!(
                    "WARNING: Could not reset the filter of {}: {}",
                    prepared.layer.name, err
                ));
            }
        }
        exported
    }
}

/// Re-point the AOI template of `map` at the cached AOI, or add the cached AOI when there is no template.
fn attach_aoi(host: &mut dyn MapHost, map: &str, aoi_name: &str, key: &str, path: &Path) -> Result<LayerHandle, HostError> {
    match host.find_layer(map, aoi_name) {
        Some(template) => swap_in_local_copy(host, map, &template, path, key),
        None => {
            let added = host.add_layer_from_path(map, path, key)?;
            host.rename_layer(map, &added, aoi_name)
        }
    }
}

fn aoi_extent(
    host: &dyn MapHost,
    layout: &str,
    frame: &str,
    layer: &LayerHandle,
    buffer_percent: f64,
    warnings: &mut WarningLog,
) -> Option<Extent> {
    let result = host
        .layer_extent(layout, frame, layer)
        .map_err(|err| err.to_string())
        .and_then(|extent| buffer_extent(extent, buffer_percent).map_err(|err| err.to_string()));
    match result {
        Ok(extent) => Some(extent),
        Err(err) => {
            warnings.add(format!("WARNING: Could not buffer the AOI extent: {}", err));
            None
        }
    }
}

fn apply_extent(host: &mut dyn MapHost, layout: &str, frame: &str, extent: Option<Extent>, warnings: &mut WarningLog) {
    if let Some(extent) = extent {
        if let Err(err) = host.set_frame_extent(layout, frame, extent) {
            warnings.add(format!(
                "WARNING: Could not set the extent of {} on {}: {}",
                frame, layout, err
            ));
        }
    }
}

/// Export `layout` to `path` and insert it at `index`. Failure is a warning.
fn export_and_insert(host: &mut dyn MapHost, run: &mut RunState<'_>, layout: &str, path: PathBuf, index: usize) -> bool {
    let result = host
        .export_page(layout, &path)
        .and_then(|()| run.document.insert_pages(&path, index));
    match result {
        Ok(()) => {
            log::info!("Inserted {} at page {}", path.display(), index);
            run.pages.push(PagePlacement {
                layout: layout.to_string(),
                path,
                index,
            });
            true
        }
        Err(err) => {
            run.warnings
                .add(format!("WARNING: Could not export layout {}: {}", layout, err));
            false
        }
    }
}
