use std::collections::{HashMap, HashSet};
use std::num::NonZeroU16;

use eframe::egui;
use egui::{Color32, Margin, Style};
use lru::LruCache;
use tokio::sync::mpsc;

use crate::layers::menu::{MenuEffect, MenuState};
use crate::layers::popup::PopupRun;
use crate::layers::query::{AttributeRequest, ClickSeq, QueryEffect, QueryEngine};
use crate::layers::spec::{
    NodeId, SECTION_BASE, SECTION_GEOJSON, SECTION_OVERLAYS, SECTION_QUERIES,
};
use crate::layers::factory::LayerSource;
use crate::map::bounds::Coordinate;
use crate::map::layer::{MapMarker, MapTile, OutlineLayer, VectorLayer};
use crate::map::map::{ActiveLayers, Map, MapState, TileKey};
use crate::maps_api::arcgis::{
    AttributeQueryResponse, GeoJsonFile, GeoJsonGeometry, GeometryQueryResponse,
};
use crate::maps_api::fetch::{FetchResult, ServiceClient};

const MAP_ID: &str = "peakmap_map";

/// Completed network work, delivered back to the UI thread over the channel.
enum NetEvent {
    Tile(TileKey, FetchResult<MapTile>),
    File(String, FetchResult<GeoJsonFile>),
    OverlayFeatures(NodeId, FetchResult<GeoJsonFile>),
    Attributes {
        source: NodeId,
        seq: ClickSeq,
        result: FetchResult<AttributeQueryResponse>,
    },
    Geometry {
        source: NodeId,
        object_id: i64,
        seq: ClickSeq,
        result: FetchResult<GeometryQueryResponse>,
    },
}

/// One row of a rendered menu section, flattened out of the tree up front so
/// rendering does not hold a borrow across the mutating handlers.
struct MenuRow {
    id: NodeId,
    name: String,
    depth: usize,
    folder: bool,
}

pub struct PeakApp {
    menu: MenuState,
    engine: QueryEngine,
    active: ActiveLayers,
    tile_cache: LruCache<TileKey, MapTile>,
    pending_tiles: HashSet<TileKey>,
    /// Fetched feature-service overlays, kept so re-toggling is instant.
    feature_overlays: HashMap<NodeId, VectorLayer>,
    pending_overlays: HashSet<NodeId>,
    client: ServiceClient,
    sender: mpsc::UnboundedSender<NetEvent>,
    receiver: mpsc::UnboundedReceiver<NetEvent>,
    runtime: tokio::runtime::Runtime,
    map_viewport: egui::Vec2,
}

impl PeakApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        menu: MenuState,
        initial_effects: Vec<MenuEffect>,
    ) -> Self {
        cc.egui_ctx.set_style(Self::get_dark_theme_style(&cc.egui_ctx));
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(8)
            .thread_name("layer-fetcher")
            .thread_stack_size(3 * 1024 * 1024)
            .enable_all()
            .build()
            .expect("Unable to create runtime");
        let (sender, receiver) = mpsc::unbounded_channel();

        let mut app = Self {
            menu,
            engine: QueryEngine::new(),
            active: ActiveLayers::default(),
            tile_cache: LruCache::new(NonZeroU16::new(512).unwrap_or(NonZeroU16::MAX).into()),
            pending_tiles: HashSet::new(),
            feature_overlays: HashMap::new(),
            pending_overlays: HashSet::new(),
            client: ServiceClient::new(),
            sender,
            receiver,
            runtime,
            map_viewport: egui::vec2(1024.0, 768.0),
        };

        // Enable the query sources the initial selection turned on, with
        // their outline color overrides.
        for id in app.menu.enabled_queries() {
            if let Some(query) = app.menu.tree().node(id).query.clone() {
                app.engine.enable_source(id, query);
            }
        }
        for (id, color) in app.menu.armed_queries().to_vec() {
            if let Some(query) = app.menu.tree().node(id).query.clone() {
                app.engine.arm_source(id, query, color);
            }
        }

        app.apply_menu_effects(&cc.egui_ctx, initial_effects);
        app
    }

    // --- effect application --------------------------------------------

    fn apply_menu_effects(&mut self, ctx: &egui::Context, effects: Vec<MenuEffect>) {
        for effect in effects {
            match effect {
                MenuEffect::AddLayer(id) => self.attach_layer(ctx, id),
                MenuEffect::RemoveLayer(id) => self.active.remove(id),
                MenuEffect::SetMaxZoom(zoom) => {
                    Self::with_map_state(ctx, |state| state.set_max_zoom(zoom));
                }
                MenuEffect::FetchFile(path) => self.spawn_file(ctx, path),
                MenuEffect::FitBounds(bounds) => {
                    let viewport = self.map_viewport;
                    Self::with_map_state(ctx, |state| state.fit_bounds(&bounds, viewport));
                }
            }
        }
    }

    fn attach_layer(&mut self, ctx: &egui::Context, id: NodeId) {
        match self.menu.tree().key_path(id).first().map(String::as_str) {
            Some(SECTION_BASE) => {
                if let Some(kind) = self.menu.tree().kind(id).cloned() {
                    self.active.set_base(id, kind);
                }
            }
            Some(SECTION_OVERLAYS) => {
                let Some(kind) = self.menu.tree().kind(id).cloned() else {
                    return;
                };
                // Feature-service overlays render as vectors, fetched whole
                // on first attach.
                if matches!(kind.source, LayerSource::FeatureQuery { .. }) {
                    if let Some(layer) = self.feature_overlays.get(&id) {
                        self.active.add_vector(id, layer.clone());
                    } else if self.pending_overlays.insert(id) {
                        self.spawn_overlay_features(ctx, id, &kind);
                    }
                } else {
                    self.active.add_overlay(id, kind);
                }
            }
            _ => {
                if let Some(layer) = self.menu.state(id).layer.clone() {
                    self.active.add_vector(id, layer);
                }
            }
        }
    }

    /// Build the vector rendition of a feature-service overlay from its
    /// GeoJSON query result, styled per the node's declaration.
    fn overlay_vector_layer(&self, id: NodeId, file: &GeoJsonFile) -> VectorLayer {
        let spec = self.menu.tree().node(id);
        let mut layer = VectorLayer {
            markers: Vec::new(),
            outlines: Vec::new(),
        };
        for feature in &file.features {
            let Some(geometry) = &feature.geometry else {
                continue;
            };
            match geometry {
                GeoJsonGeometry::Point { coordinates } if coordinates.len() >= 2 => {
                    let position = Coordinate::new(coordinates[1], coordinates[0]);
                    layer.markers.push(match spec.point_to_layer {
                        Some(make) => make(&feature.properties, position),
                        None => MapMarker {
                            position,
                            label: String::new(),
                            color: spec
                                .style
                                .map(|s| s.for_feature(&feature.properties).color)
                                .unwrap_or(Color32::from_rgb(51, 136, 255)),
                            attributes: feature.properties.clone(),
                        },
                    });
                }
                GeoJsonGeometry::Point { .. } => {}
                other => {
                    let style = spec
                        .style
                        .map(|s| s.for_feature(&feature.properties))
                        .unwrap_or_default();
                    layer.outlines.push(OutlineLayer::from_geojson(other, style));
                }
            }
        }
        layer
    }

    fn apply_query_effects(&mut self, ctx: &egui::Context, effects: Vec<QueryEffect>) {
        for effect in effects {
            match effect {
                QueryEffect::ShowOutline(id, outline) => self.active.set_outline(id, outline),
                QueryEffect::RemoveOutline(id) => self.active.remove_outline(id),
                QueryEffect::FetchGeometry {
                    source,
                    object_id,
                    seq,
                } => self.spawn_geometry(ctx, source, object_id, seq),
                QueryEffect::DisableSource(id) => {
                    self.menu.toggle_query(id, false);
                    self.active.remove_outline(id);
                }
            }
        }
    }

    fn with_map_state(ctx: &egui::Context, mutate: impl FnOnce(&mut MapState)) {
        let id = egui::Id::new(MAP_ID);
        let mut state = MapState::load(ctx, id);
        mutate(&mut state);
        state.store(ctx, id);
    }

    // --- async fetches --------------------------------------------------

    fn spawn_tile(&mut self, ctx: &egui::Context, key: TileKey) {
        let Some(kind) = self.menu.tree().kind(key.0).cloned() else {
            return;
        };
        let (node, z, x, y) = key;
        let client = self.client.clone();
        let sender = self.sender.clone();
        let requester = ctx.clone();
        self.runtime.spawn(async move {
            let result = client.fetch_tile(&kind, z, x, y).await;
            let _ = sender.send(NetEvent::Tile((node, z, x, y), result));
            requester.request_repaint();
        });
    }

    fn spawn_overlay_features(
        &mut self,
        ctx: &egui::Context,
        id: NodeId,
        kind: &crate::layers::factory::LayerKind,
    ) {
        let Some(url) = kind.feature_query_url() else {
            self.pending_overlays.remove(&id);
            return;
        };
        let client = self.client.clone();
        let sender = self.sender.clone();
        let requester = ctx.clone();
        self.runtime.spawn(async move {
            let result = client.fetch_geojson_file(&url).await;
            let _ = sender.send(NetEvent::OverlayFeatures(id, result));
            requester.request_repaint();
        });
    }

    fn spawn_file(&mut self, ctx: &egui::Context, path: String) {
        let client = self.client.clone();
        let sender = self.sender.clone();
        let requester = ctx.clone();
        self.runtime.spawn(async move {
            let result = client.fetch_geojson_file(&path).await;
            let _ = sender.send(NetEvent::File(path, result));
            requester.request_repaint();
        });
    }

    fn spawn_attribute_queries(&mut self, ctx: &egui::Context, requests: Vec<AttributeRequest>) {
        for request in requests {
            let client = self.client.clone();
            let sender = self.sender.clone();
            let requester = ctx.clone();
            self.runtime.spawn(async move {
                let result = client.query_attributes(&request.query, request.point).await;
                let _ = sender.send(NetEvent::Attributes {
                    source: request.source,
                    seq: request.seq,
                    result,
                });
                requester.request_repaint();
            });
        }
    }

    fn spawn_geometry(&mut self, ctx: &egui::Context, source: NodeId, object_id: i64, seq: ClickSeq) {
        let Some(query) = self.menu.tree().node(source).query.clone() else {
            return;
        };
        let client = self.client.clone();
        let sender = self.sender.clone();
        let requester = ctx.clone();
        self.runtime.spawn(async move {
            let result = client.fetch_geometry(&query, object_id).await;
            let _ = sender.send(NetEvent::Geometry {
                source,
                object_id,
                seq,
                result,
            });
            requester.request_repaint();
        });
    }

    fn drain_events(&mut self, ctx: &egui::Context) {
        while let Ok(event) = self.receiver.try_recv() {
            match event {
                NetEvent::Tile(key, Ok(tile)) => {
                    self.tile_cache.put(key, tile);
                    self.pending_tiles.remove(&key);
                }
                NetEvent::Tile(key, Err(e)) => {
                    log::warn!("tile {:?} failed: {}", key, e);
                    self.pending_tiles.remove(&key);
                }
                NetEvent::File(path, Ok(file)) => {
                    let effects = self.menu.file_loaded(&path, &file);
                    self.apply_menu_effects(ctx, effects);
                }
                NetEvent::File(path, Err(e)) => {
                    log::warn!("geojson file {} failed: {}", path, e);
                }
                NetEvent::OverlayFeatures(id, Ok(file)) => {
                    self.pending_overlays.remove(&id);
                    let layer = self.overlay_vector_layer(id, &file);
                    self.feature_overlays.insert(id, layer.clone());
                    if self.menu.state(id).attached {
                        self.active.add_vector(id, layer);
                    }
                }
                NetEvent::OverlayFeatures(id, Err(e)) => {
                    self.pending_overlays.remove(&id);
                    log::warn!("overlay feature fetch for {:?} failed: {}", id, e);
                }
                NetEvent::Attributes {
                    source,
                    seq,
                    result,
                } => match result {
                    Ok(response) => {
                        let effects = self.engine.handle_attribute_response(source, seq, response);
                        self.apply_query_effects(ctx, effects);
                    }
                    Err(e) => log::warn!("attribute query for {:?} failed: {}", source, e),
                },
                NetEvent::Geometry {
                    source,
                    object_id,
                    seq,
                    result,
                } => {
                    let effects = self.engine.handle_geometry_response(
                        source,
                        object_id,
                        seq,
                        result.map_err(|e| e.to_string()),
                    );
                    self.apply_query_effects(ctx, effects);
                }
            }
        }
    }

    // --- menu rendering --------------------------------------------------

    fn section_rows(&self, section: &str) -> Vec<MenuRow> {
        let tree = self.menu.tree();
        let Some(root) = tree.section(section) else {
            return Vec::new();
        };
        let mut rows = Vec::new();
        let mut stack: Vec<(NodeId, usize)> = tree
            .children(root)
            .iter()
            .rev()
            .map(|&id| (id, 0))
            .collect();
        while let Some((id, depth)) = stack.pop() {
            let node = tree.node(id);
            rows.push(MenuRow {
                id,
                name: node.display_name(),
                depth,
                folder: !node.is_leaf(),
            });
            for &child in tree.children(id).iter().rev() {
                stack.push((child, depth + 1));
            }
        }
        rows
    }

    /// Top-level overlay rows paired with their version children, collected
    /// up front so rendering owns the data it iterates.
    fn overlay_rows(&self) -> Vec<(MenuRow, Vec<(NodeId, String)>)> {
        let tree = self.menu.tree();
        let Some(root) = tree.section(SECTION_OVERLAYS) else {
            return Vec::new();
        };
        tree.children(root)
            .iter()
            .map(|&id| {
                let node = tree.node(id);
                let versions = tree
                    .children(id)
                    .iter()
                    .map(|&child| (child, tree.node(child).display_name()))
                    .collect();
                (
                    MenuRow {
                        id,
                        name: node.display_name(),
                        depth: 0,
                        folder: !node.is_leaf(),
                    },
                    versions,
                )
            })
            .collect()
    }

    fn layers_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::left("layer_menu")
            .default_width(280.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    ui.heading("Base maps");
                    let active_base = self.menu.active_base();
                    for row in self.section_rows(SECTION_BASE) {
                        if ui.radio(active_base == Some(row.id), &row.name).clicked() {
                            let effects = self.menu.select_base(row.id);
                            self.apply_menu_effects(ctx, effects);
                        }
                    }

                    ui.separator();
                    ui.heading("Overlays");
                    // Folders are radio groups of "versions" behind a single
                    // checkbox; leaves are plain checkboxes.
                    for (row, versions) in self.overlay_rows() {
                        let mut checked = self.menu.state(row.id).checked;
                        if ui.checkbox(&mut checked, &row.name).changed() {
                            let effects = self.menu.toggle_overlay(row.id, checked);
                            self.apply_menu_effects(ctx, effects);
                        }
                        if row.folder {
                            let selected = self.menu.selected_version(row.id);
                            ui.indent(row.id, |ui| {
                                for (version, name) in versions {
                                    if ui.radio(selected == Some(version), name).clicked() {
                                        let effects =
                                            self.menu.select_version(row.id, version);
                                        self.apply_menu_effects(ctx, effects);
                                    }
                                }
                            });
                        }
                    }

                    ui.separator();
                    ui.heading("Peaks");
                    for row in self.section_rows(SECTION_GEOJSON) {
                        ui.horizontal(|ui| {
                            ui.add_space(row.depth as f32 * 16.0);
                            let mut checked = self.menu.state(row.id).checked;
                            if ui.checkbox(&mut checked, &row.name).changed() {
                                let effects = self.menu.toggle_geojson(row.id, checked);
                                self.apply_menu_effects(ctx, effects);
                            }
                        });
                    }

                    ui.separator();
                    ui.heading("Click queries");
                    for row in self.section_rows(SECTION_QUERIES) {
                        let mut checked = self.menu.state(row.id).checked;
                        if ui.checkbox(&mut checked, &row.name).changed() {
                            self.menu.toggle_query(row.id, checked);
                            if checked {
                                if let Some(query) =
                                    self.menu.tree().node(row.id).query.clone()
                                {
                                    self.engine.enable_source(row.id, query);
                                }
                            } else {
                                let effects = self.engine.disable_source(row.id);
                                self.apply_query_effects(ctx, effects);
                            }
                        }
                    }
                });
            });
    }

    // --- popups ----------------------------------------------------------

    fn popup_windows(&mut self, ctx: &egui::Context) {
        for source in self.engine.sources_with_results() {
            let title = self.menu.tree().node(source).display_name();
            let Some((content, page, pages)) = self.engine.popup(source) else {
                continue;
            };
            let runs = content.runs();
            let mismatch = self.engine.area_mismatch(source);
            let outline_on = self.engine.show_outline(source);
            let override_color = self.engine.color_override(source);

            let mut step: i32 = 0;
            let mut ztf = false;
            let mut new_outline_on = outline_on;
            let mut new_color = override_color;

            egui::Window::new(title)
                .id(egui::Id::new(("popup", source)))
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    let mut line: Vec<&PopupRun> = Vec::new();
                    for run in runs.iter().chain(std::iter::once(&PopupRun::Break)) {
                        match run {
                            PopupRun::Break => {
                                if !line.is_empty() {
                                    ui.horizontal_wrapped(|ui| {
                                        for item in line.drain(..) {
                                            if let PopupRun::Text { text, bold, link } = item {
                                                let rich = if *bold {
                                                    egui::RichText::new(text).strong()
                                                } else {
                                                    egui::RichText::new(text)
                                                };
                                                match link {
                                                    Some(url) => {
                                                        ui.hyperlink_to(rich, url);
                                                    }
                                                    None => {
                                                        ui.label(rich);
                                                    }
                                                }
                                            }
                                        }
                                    });
                                }
                            }
                            PopupRun::ZoomToFit => {
                                if ui.button("Zoom to fit").clicked() {
                                    ztf = true;
                                }
                            }
                            text => line.push(text),
                        }
                    }

                    if mismatch {
                        ui.colored_label(
                            Color32::YELLOW,
                            "Reported acreage differs from the boundary's area",
                        );
                    }

                    ui.separator();
                    ui.horizontal(|ui| {
                        if pages > 1 {
                            if ui.button("<").clicked() {
                                step = -1;
                            }
                            ui.label(format!("{} / {}", page, pages));
                            if ui.button(">").clicked() {
                                step = 1;
                            }
                        }
                        ui.checkbox(&mut new_outline_on, "Outline");
                        let mut color = new_color.unwrap_or(Color32::from_rgb(0x33, 0x88, 0xff));
                        if ui.color_edit_button_srgba(&mut color).changed() {
                            new_color = Some(color);
                        }
                        if new_color.is_some() && ui.small_button("std").clicked() {
                            new_color = None;
                        }
                    });
                });

            if step != 0 {
                let effects = self.engine.step(source, step);
                self.apply_query_effects(ctx, effects);
            }
            if new_outline_on != outline_on {
                let effects = self.engine.set_show_outline(source, new_outline_on);
                self.apply_query_effects(ctx, effects);
            }
            if new_color != override_color {
                let effects = self.engine.set_color_override(source, new_color);
                self.apply_query_effects(ctx, effects);
            }
            if ztf {
                if let Some(bounds) = self.engine.outline_bounds(source) {
                    let viewport = self.map_viewport;
                    Self::with_map_state(ctx, |state| state.fit_bounds(&bounds, viewport));
                }
            }
        }
    }
}

impl eframe::App for PeakApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // F11 toggles fullscreen
        if let Some(new_fullscreen) = ctx.input(|i| {
            if i.key_pressed(egui::Key::F11) {
                Some(!i.viewport().fullscreen.unwrap_or(false))
            } else {
                None
            }
        }) {
            ctx.send_viewport_cmd(egui::ViewportCommand::Fullscreen(new_fullscreen));
            ctx.send_viewport_cmd(egui::ViewportCommand::Decorations(!new_fullscreen));
            ctx.send_viewport_cmd(egui::ViewportCommand::Maximized(!new_fullscreen));
            ctx.send_viewport_cmd(egui::ViewportCommand::Focus);
        }

        self.drain_events(ctx);
        self.layers_panel(ctx);

        egui::TopBottomPanel::bottom("attribution_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                for attribution in self.active.attributions() {
                    match &attribution.url {
                        Some(url) => {
                            ui.hyperlink_to(&attribution.text, url);
                        }
                        None => {
                            ui.label(&attribution.text);
                        }
                    }
                    ui.separator();
                }
            });
        });

        let frame = egui::Frame {
            fill: egui::Color32::TRANSPARENT,
            inner_margin: Margin::same(0.0),
            outer_margin: Margin::same(0.0),
            ..Default::default()
        };
        let mut missing_tiles = Vec::new();
        let mut clicked: Option<Coordinate> = None;
        egui::CentralPanel::default().frame(frame).show(ctx, |ui| {
            ui.style_mut().debug.debug_on_hover = false;
            self.map_viewport = ui.available_size();
            let map = Map::new(
                MAP_ID,
                &self.active,
                &mut self.tile_cache,
                &mut missing_tiles,
                &mut clicked,
            )
            .viewport_size(self.map_viewport);
            ui.add(map);
        });

        for key in missing_tiles {
            if !self.pending_tiles.contains(&key) && self.tile_cache.peek(&key).is_none() {
                self.spawn_tile(ctx, key);
                self.pending_tiles.insert(key);
            }
        }

        if let Some(point) = clicked {
            let (_, requests, effects) = self.engine.begin_click(point);
            self.apply_query_effects(ctx, effects);
            self.spawn_attribute_queries(ctx, requests);
        }

        self.popup_windows(ctx);
    }
}

impl PeakApp {
    pub fn get_dark_theme_style(ctx: &egui::Context) -> Style {
        use egui::{
            style::{Selection, Visuals, Widgets},
            Color32, FontFamily, FontId, Rounding, Stroke, TextStyle,
        };

        let mut style = (*ctx.style()).clone();

        style.text_styles = [
            (TextStyle::Heading, FontId::new(20.0, FontFamily::Proportional)),
            (TextStyle::Body, FontId::new(16.0, FontFamily::Proportional)),
            (TextStyle::Monospace, FontId::new(14.0, FontFamily::Monospace)),
            (TextStyle::Button, FontId::new(16.0, FontFamily::Proportional)),
            (TextStyle::Small, FontId::new(12.0, FontFamily::Proportional)),
        ]
        .into();

        let primary_bg_color = Color32::from_rgb(32, 33, 36);

        style.visuals = Visuals::dark();
        style.visuals.override_text_color = Some(Color32::LIGHT_GRAY);
        style.visuals.widgets = Widgets {
            noninteractive: egui::style::WidgetVisuals {
                bg_fill: primary_bg_color,
                bg_stroke: Stroke::new(1.0, Color32::from_gray(60)),
                fg_stroke: Stroke::new(1.0, Color32::LIGHT_GRAY),
                rounding: Rounding::same(4.0),
                weak_bg_fill: Color32::from_gray(32),
                expansion: 0.0,
            },
            inactive: egui::style::WidgetVisuals {
                bg_fill: primary_bg_color,
                bg_stroke: Stroke::new(1.0, Color32::from_gray(75)),
                fg_stroke: Stroke::new(1.0, Color32::LIGHT_GRAY),
                rounding: Rounding::same(4.0),
                weak_bg_fill: Color32::from_gray(32),
                expansion: 0.0,
            },
            hovered: egui::style::WidgetVisuals {
                bg_fill: Color32::from_rgb(50, 50, 50),
                bg_stroke: Stroke::new(1.0, Color32::WHITE),
                fg_stroke: Stroke::new(1.0, Color32::WHITE),
                rounding: Rounding::same(4.0),
                weak_bg_fill: Color32::from_gray(32),
                expansion: 0.5,
            },
            active: egui::style::WidgetVisuals {
                bg_fill: Color32::from_rgb(60, 60, 60),
                bg_stroke: Stroke::new(1.0, Color32::WHITE),
                fg_stroke: Stroke::new(1.0, Color32::WHITE),
                rounding: Rounding::same(4.0),
                weak_bg_fill: Color32::from_gray(32),
                expansion: 2.0,
            },
            open: egui::style::WidgetVisuals {
                bg_fill: Color32::from_rgb(40, 40, 40),
                bg_stroke: Stroke::new(1.0, Color32::WHITE),
                fg_stroke: Stroke::new(1.0, Color32::WHITE),
                rounding: Rounding::same(4.0),
                weak_bg_fill: Color32::from_gray(32),
                expansion: 0.0,
            },
        };

        style.visuals.selection = Selection {
            bg_fill: Color32::from_rgb(75, 75, 75),
            stroke: Stroke::new(1.0, Color32::WHITE),
        };

        style.visuals.window_rounding = Rounding::same(6.0);
        style.visuals.window_shadow = egui::Shadow {
            offset: egui::vec2(0.0, 1.0),
            blur: 3.0,
            spread: 0.0,
            color: Color32::from_black_alpha(128),
        };
        style.visuals.window_fill = primary_bg_color;
        style.visuals.window_stroke = Stroke::new(1.0, Color32::from_gray(60));
        style.visuals.panel_fill = primary_bg_color;

        style.spacing.window_margin = egui::Margin::same(4.0);
        style.spacing.button_padding = egui::vec2(2.0, 2.0);

        style
    }
}
