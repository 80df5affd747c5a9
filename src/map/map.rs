use egui::epaint::{Color32, Pos2, Rect, Stroke};
use egui::{pos2, vec2, Sense, Ui, Vec2, Widget};
use lru::LruCache;
use serde::{Deserialize, Serialize};

use super::bounds::{Coordinate, GeoBounds};
use super::layer::{MapTile, OutlineLayer, VectorLayer};
use crate::layers::factory::{Attribution, LayerKind, LayerSource};
use crate::layers::spec::NodeId;

pub const TILE_PX: f64 = 256.0;

/// Forward Web Mercator into the unit square: (0,0) is the north-west
/// corner of the world, (1,1) the south-east.
pub fn mercator_unit(coordinate: &Coordinate) -> (f64, f64) {
    let x = (coordinate.longitude() + 180.0) / 360.0;
    let lat_rad = coordinate.latitude().to_radians();
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / std::f64::consts::PI) / 2.0;
    (x, y)
}

pub fn coordinate_from_unit(x: f64, y: f64) -> Coordinate {
    let longitude = x * 360.0 - 180.0;
    let latitude = ((std::f64::consts::PI * (1.0 - 2.0 * y)).sinh()).atan().to_degrees();
    Coordinate::new(latitude, longitude)
}

#[derive(Clone, Serialize, Deserialize)]
pub struct MapState {
    center: Coordinate,
    zoom: f32,
    max_zoom: u8,
    dragging: bool,
    drag_start: Option<Pos2>,
}

impl Default for MapState {
    fn default() -> Self {
        Self {
            // Lone Pine, gateway to the High Sierra.
            center: Coordinate::new(36.6, -118.06),
            zoom: 8.0,
            max_zoom: 23,
            dragging: false,
            drag_start: None,
        }
    }
}

impl MapState {
    pub fn load(ctx: &egui::Context, id: egui::Id) -> Self {
        ctx.data_mut(|d| d.get_persisted::<Self>(id).unwrap_or_default())
    }

    pub fn store(self, ctx: &egui::Context, id: egui::Id) {
        ctx.data_mut(|d| d.insert_persisted(id, self));
    }

    pub fn set_max_zoom(&mut self, max_zoom: u8) {
        self.max_zoom = max_zoom;
        self.zoom = self.zoom.min(max_zoom as f32);
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn center(&self) -> Coordinate {
        self.center
    }

    /// Center and zoom so the given bounds fill the viewport.
    pub fn fit_bounds(&mut self, bounds: &GeoBounds, viewport: Vec2) {
        let (x0, y0) = mercator_unit(&Coordinate::new(bounds.north(), bounds.west()));
        let (x1, y1) = mercator_unit(&Coordinate::new(bounds.south(), bounds.east()));
        let dx = (x1 - x0).abs().max(1e-9);
        let dy = (y1 - y0).abs().max(1e-9);
        let world_px = (viewport.x as f64 / dx).min(viewport.y as f64 / dy);
        self.zoom = ((world_px / TILE_PX).log2() as f32).clamp(0.0, self.max_zoom as f32);
        self.center = coordinate_from_unit((x0 + x1) / 2.0, (y0 + y1) / 2.0);
    }
}

/// One raster layer's place in the paint stack.
#[derive(Debug, Clone)]
pub struct RasterSlot {
    pub node: NodeId,
    pub kind: LayerKind,
}

/// Everything currently attached to the map, in paint order: one base
/// raster, overlay rasters, vector overlays, then query outlines on top.
#[derive(Default)]
pub struct ActiveLayers {
    base: Option<RasterSlot>,
    overlays: Vec<RasterSlot>,
    vectors: Vec<(NodeId, VectorLayer)>,
    outlines: Vec<(NodeId, OutlineLayer)>,
}

impl ActiveLayers {
    pub fn set_base(&mut self, node: NodeId, kind: LayerKind) {
        self.base = Some(RasterSlot { node, kind });
    }

    pub fn add_overlay(&mut self, node: NodeId, kind: LayerKind) {
        if !self.overlays.iter().any(|slot| slot.node == node) {
            self.overlays.push(RasterSlot { node, kind });
        }
    }

    pub fn add_vector(&mut self, node: NodeId, layer: VectorLayer) {
        if !self.vectors.iter().any(|(n, _)| *n == node) {
            self.vectors.push((node, layer));
        }
    }

    /// Detach whatever this node contributed, raster or vector.
    pub fn remove(&mut self, node: NodeId) {
        if self.base.as_ref().map(|slot| slot.node) == Some(node) {
            self.base = None;
        }
        self.overlays.retain(|slot| slot.node != node);
        self.vectors.retain(|(n, _)| *n != node);
    }

    pub fn set_outline(&mut self, node: NodeId, outline: OutlineLayer) {
        self.remove_outline(node);
        self.outlines.push((node, outline));
    }

    pub fn remove_outline(&mut self, node: NodeId) {
        self.outlines.retain(|(n, _)| *n != node);
    }

    pub fn rasters(&self) -> impl Iterator<Item = &RasterSlot> {
        self.base.iter().chain(self.overlays.iter())
    }

    pub fn attributions(&self) -> Vec<&Attribution> {
        self.rasters()
            .filter_map(|slot| slot.kind.attribution.as_ref())
            .collect()
    }
}

pub type TileKey = (NodeId, u32, u32, u32);

/// The interactive map widget: drag to pan, scroll to zoom, click to query.
/// Tiles come from the shared LRU cache; anything missing is reported so the
/// shell can fetch it.
pub struct Map<'a> {
    id: egui::Id,
    layers: &'a ActiveLayers,
    tile_cache: &'a mut LruCache<TileKey, MapTile>,
    missing_tiles: &'a mut Vec<TileKey>,
    clicked: &'a mut Option<Coordinate>,
    viewport_size: Vec2,
}

impl<'a> Map<'a> {
    pub fn new(
        id_source: impl std::hash::Hash,
        layers: &'a ActiveLayers,
        tile_cache: &'a mut LruCache<TileKey, MapTile>,
        missing_tiles: &'a mut Vec<TileKey>,
        clicked: &'a mut Option<Coordinate>,
    ) -> Self {
        Self {
            id: egui::Id::new(id_source),
            layers,
            tile_cache,
            missing_tiles,
            clicked,
            viewport_size: vec2(1024.0, 768.0),
        }
    }

    pub fn viewport_size(mut self, size: Vec2) -> Self {
        self.viewport_size = size;
        self
    }

    fn to_screen(rect: &Rect, state: &MapState, coordinate: &Coordinate) -> Pos2 {
        let world_px = TILE_PX * 2.0_f64.powf(state.zoom as f64);
        let (cx, cy) = mercator_unit(&state.center);
        let (x, y) = mercator_unit(coordinate);
        pos2(
            rect.center().x + ((x - cx) * world_px) as f32,
            rect.center().y + ((y - cy) * world_px) as f32,
        )
    }

    fn visible_tiles(rect: &Rect, state: &MapState, layer_max_zoom: u8) -> Vec<(u32, u32, u32)> {
        let z = (state.zoom.floor() as u8).min(layer_max_zoom) as u32;
        let scale = 2u32.pow(z);
        let world_px = TILE_PX * 2.0_f64.powf(state.zoom as f64);
        let (cx, cy) = mercator_unit(&state.center);

        let half_w = rect.width() as f64 / 2.0 / world_px;
        let half_h = rect.height() as f64 / 2.0 / world_px;
        let min_x = ((cx - half_w) * scale as f64).floor().max(0.0) as u32;
        let max_x = ((cx + half_w) * scale as f64).floor().min(scale as f64 - 1.0) as u32;
        let min_y = ((cy - half_h) * scale as f64).floor().max(0.0) as u32;
        let max_y = ((cy + half_h) * scale as f64).floor().min(scale as f64 - 1.0) as u32;

        let mut tiles = Vec::new();
        for x in min_x..=max_x {
            for y in min_y..=max_y {
                tiles.push((z, x, y));
            }
        }
        tiles
    }

    fn tile_rect(rect: &Rect, state: &MapState, z: u32, x: u32, y: u32) -> Rect {
        let world_px = TILE_PX * 2.0_f64.powf(state.zoom as f64);
        let (cx, cy) = mercator_unit(&state.center);
        let scale = 2.0_f64.powi(z as i32);
        let min = pos2(
            rect.center().x + ((x as f64 / scale - cx) * world_px) as f32,
            rect.center().y + ((y as f64 / scale - cy) * world_px) as f32,
        );
        let size = (world_px / scale) as f32;
        Rect::from_min_size(min, vec2(size, size))
    }
}

impl<'a> Widget for Map<'a> {
    fn ui(self, ui: &mut Ui) -> egui::Response {
        let mut state = MapState::load(ui.ctx(), self.id);

        let (rect, response) =
            ui.allocate_exact_size(self.viewport_size, Sense::click_and_drag());

        ui.painter()
            .rect(rect, 0.0, Color32::from_gray(30), Stroke::new(1.0, Color32::WHITE));
        let map_painter = ui.painter().with_clip_rect(rect);

        // Drag to pan, in mercator units so latitude stays honest.
        if response.dragged() {
            if !state.dragging {
                state.drag_start = response.hover_pos();
                state.dragging = true;
            }
            if let (Some(current), Some(start)) = (response.hover_pos(), state.drag_start) {
                let delta = current - start;
                let world_px = TILE_PX * 2.0_f64.powf(state.zoom as f64);
                let (cx, cy) = mercator_unit(&state.center);
                state.center = coordinate_from_unit(
                    cx - delta.x as f64 / world_px,
                    cy - delta.y as f64 / world_px,
                );
                state.drag_start = Some(current);
            }
        } else if state.dragging {
            state.dragging = false;
            state.drag_start = None;
        }

        // Scroll to zoom, tanh-normalized so wheel and trackpad feel alike.
        if response.hovered() {
            let mut scroll = ui.input(|i| i.smooth_scroll_delta).y;
            if scroll.abs() > f32::EPSILON {
                scroll = (scroll / 10.0).tanh();
                state.zoom = (state.zoom + scroll).clamp(0.0, state.max_zoom as f32);
            }
        }

        // A clean click (not a drag) is a point query.
        if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let world_px = TILE_PX * 2.0_f64.powf(state.zoom as f64);
                let (cx, cy) = mercator_unit(&state.center);
                let x = cx + (pos.x - rect.center().x) as f64 / world_px;
                let y = cy + (pos.y - rect.center().y) as f64 / world_px;
                *self.clicked = Some(coordinate_from_unit(x, y));
            }
        }

        // Raster stack: base first, then overlays with their declared opacity.
        for slot in self.layers.rasters() {
            if matches!(slot.kind.source, LayerSource::FeatureQuery { .. }) {
                continue;
            }
            let tint = Color32::WHITE.gamma_multiply(slot.kind.opacity);
            for (z, x, y) in Self::visible_tiles(&rect, &state, slot.kind.max_zoom) {
                let tile_rect = Self::tile_rect(&rect, &state, z, x, y);
                let key = (slot.node, z, x, y);
                if let Some(tile) = self.tile_cache.get_mut(&key) {
                    if let Some(texture) = tile.texture(ui.ctx()) {
                        map_painter.image(
                            texture.id(),
                            tile_rect,
                            Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0)),
                            tint,
                        );
                        continue;
                    }
                }
                self.missing_tiles.push(key);
                map_painter.rect_filled(tile_rect, 0.0, Color32::from_gray(60));
            }
        }

        // Vector overlays: peak markers and boundary lines.
        for (_, layer) in &self.layers.vectors {
            for outline in &layer.outlines {
                paint_outline(&map_painter, &rect, &state, outline);
            }
            for marker in &layer.markers {
                let at = Self::to_screen(&rect, &state, &marker.position);
                map_painter.circle_filled(at, 5.0, marker.color);
                map_painter.circle_stroke(at, 5.0, Stroke::new(1.0, Color32::BLACK));
                if !marker.label.is_empty() && state.zoom >= 9.0 {
                    map_painter.text(
                        at + vec2(8.0, 0.0),
                        egui::Align2::LEFT_CENTER,
                        &marker.label,
                        egui::FontId::proportional(12.0),
                        Color32::WHITE,
                    );
                }
            }
        }

        // Query outlines sit on top of everything.
        for (_, outline) in &self.layers.outlines {
            paint_outline(&map_painter, &rect, &state, outline);
        }

        state.store(ui.ctx(), self.id);
        response
    }
}

fn paint_outline(painter: &egui::Painter, rect: &Rect, state: &MapState, outline: &OutlineLayer) {
    let stroke = Stroke::new(outline.style.weight, outline.style.color);
    for ring in &outline.rings {
        let points: Vec<Pos2> = ring
            .iter()
            .map(|coordinate| Map::to_screen(rect, state, coordinate))
            .collect();
        if points.len() >= 2 {
            painter.add(egui::Shape::closed_line(points, stroke));
        }
    }
}
