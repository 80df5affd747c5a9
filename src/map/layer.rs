use egui::Color32;
use serde::{Deserialize, Serialize};

use super::bounds::{Coordinate, GeoBounds};
use crate::maps_api::arcgis::{Attributes, EsriGeometry, GeoJsonGeometry};

/// Stroke/fill styling for vector content, the subset of Leaflet-style path
/// options the catalog actually uses.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct LayerStyle {
    pub color: Color32,
    pub weight: f32,
    pub fill: bool,
    pub fill_opacity: f32,
    pub opacity: f32,
}

impl Default for LayerStyle {
    fn default() -> Self {
        Self {
            color: Color32::from_rgb(51, 136, 255),
            weight: 3.0,
            fill: false,
            fill_opacity: 0.2,
            opacity: 1.0,
        }
    }
}

impl LayerStyle {
    pub fn with_color(color: Color32) -> Self {
        Self {
            color,
            ..Default::default()
        }
    }
}

/// Parse a `#rrggbb` CSS color, the form the popup `show` functions return.
pub fn parse_css_color(text: &str) -> Option<Color32> {
    let hex = text.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(Color32::from_rgb(r, g, b))
}

/// One fetched raster tile. The decoded texture is created lazily on first
/// paint so tiles can be built off the UI thread.
pub struct MapTile {
    pub x: u32,
    pub y: u32,
    pub zoom: u32,
    pub geo_bounds: GeoBounds,
    image_data: Vec<u8>,
    texture: Option<egui::TextureHandle>,
}

impl MapTile {
    pub fn new(x: u32, y: u32, zoom: u32, geo_bounds: GeoBounds, image_data: Vec<u8>) -> Self {
        Self {
            x,
            y,
            zoom,
            geo_bounds,
            image_data,
            texture: None,
        }
    }

    pub fn texture(&mut self, ctx: &egui::Context) -> Option<&egui::TextureHandle> {
        if self.texture.is_none() {
            let decoded = image::load_from_memory(&self.image_data).ok()?;
            let rgba = decoded.to_rgba8();
            let (width, height) = rgba.dimensions();
            let color_image = egui::ColorImage::from_rgba_unmultiplied(
                [width as usize, height as usize],
                rgba.as_raw(),
            );
            let texture = ctx.load_texture(
                format!("tile_{}_{}_zoom{}", self.x, self.y, self.zoom),
                color_image,
                egui::TextureOptions::default(),
            );
            self.texture = Some(texture);
        }
        self.texture.as_ref()
    }
}

/// Boundary geometry of one selected feature, as lat/lon rings plus the style
/// chosen by the owning popup's `show`.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlineLayer {
    pub rings: Vec<Vec<Coordinate>>,
    pub style: LayerStyle,
    pub bounds: Option<GeoBounds>,
}

impl OutlineLayer {
    pub fn from_esri(geometry: &EsriGeometry, style: LayerStyle) -> Self {
        let source = geometry
            .rings
            .as_ref()
            .or(geometry.paths.as_ref())
            .cloned()
            .unwrap_or_default();
        let rings: Vec<Vec<Coordinate>> = source
            .iter()
            .map(|ring| {
                ring.iter()
                    .map(|point| Coordinate::new(point[1], point[0]))
                    .collect()
            })
            .collect();
        let bounds = bounds_of(&rings);
        Self {
            rings,
            style,
            bounds,
        }
    }

    pub fn from_geojson(geometry: &GeoJsonGeometry, style: LayerStyle) -> Self {
        let mut rings: Vec<Vec<Coordinate>> = Vec::new();
        match geometry {
            GeoJsonGeometry::LineString { coordinates } => {
                rings.push(line_coords(coordinates));
            }
            GeoJsonGeometry::Polygon { coordinates } => {
                rings.extend(coordinates.iter().map(|ring| line_coords(ring)));
            }
            GeoJsonGeometry::MultiPolygon { coordinates } => {
                for polygon in coordinates {
                    rings.extend(polygon.iter().map(|ring| line_coords(ring)));
                }
            }
            GeoJsonGeometry::Point { .. } => {}
        }
        let bounds = bounds_of(&rings);
        Self {
            rings,
            style,
            bounds,
        }
    }

    pub fn with_style(&self, style: LayerStyle) -> Self {
        Self {
            style,
            ..self.clone()
        }
    }
}

fn line_coords(line: &[Vec<f64>]) -> Vec<Coordinate> {
    line.iter()
        .filter(|point| point.len() >= 2)
        .map(|point| Coordinate::new(point[1], point[0]))
        .collect()
}

fn bounds_of(rings: &[Vec<Coordinate>]) -> Option<GeoBounds> {
    let mut bounds: Option<GeoBounds> = None;
    for ring in rings {
        for point in ring {
            match bounds.as_mut() {
                Some(b) => b.extend(point),
                None => bounds = Some(GeoBounds::from_point(point)),
            }
        }
    }
    bounds
}

/// One point marker built from a GeoJSON feature, with the attributes kept
/// around for hover text.
#[derive(Debug, Clone)]
pub struct MapMarker {
    pub position: Coordinate,
    pub label: String,
    pub color: Color32,
    pub attributes: Attributes,
}

/// Content assigned to a menu node by the GeoJSON distributor: either point
/// markers or boundary rings, plus the bounds the node contributes upward.
#[derive(Debug, Clone)]
pub struct VectorLayer {
    pub markers: Vec<MapMarker>,
    pub outlines: Vec<OutlineLayer>,
}

impl VectorLayer {
    pub fn bounds(&self) -> Option<GeoBounds> {
        let mut bounds: Option<GeoBounds> = None;
        let mut merge = |other: GeoBounds| match bounds.as_mut() {
            Some(b) => *b = b.union(&other),
            None => bounds = Some(other),
        };
        for marker in &self.markers {
            merge(GeoBounds::from_point(&marker.position));
        }
        for outline in &self.outlines {
            if let Some(b) = outline.bounds {
                merge(b);
            }
        }
        bounds
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty() && self.outlines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn css_color_parses_and_rejects() {
        assert_eq!(parse_css_color("#ff0000"), Some(Color32::from_rgb(255, 0, 0)));
        assert_eq!(parse_css_color("#1e90ff"), Some(Color32::from_rgb(30, 144, 255)));
        assert_eq!(parse_css_color("red"), None);
        assert_eq!(parse_css_color("#ff00"), None);
    }

    #[test]
    fn esri_rings_become_latlon_outline_with_bounds() {
        let geometry = EsriGeometry {
            rings: Some(vec![vec![
                [-119.0, 37.0],
                [-119.0, 38.0],
                [-118.0, 38.0],
                [-119.0, 37.0],
            ]]),
            ..Default::default()
        };
        let outline = OutlineLayer::from_esri(&geometry, LayerStyle::default());
        assert_eq!(outline.rings.len(), 1);
        assert_eq!(outline.rings[0][0], Coordinate::new(37.0, -119.0));
        let bounds = outline.bounds.unwrap();
        assert_eq!(bounds.north(), 38.0);
        assert_eq!(bounds.west(), -119.0);
    }

    #[test]
    fn vector_layer_bounds_cover_markers_and_outlines() {
        let layer = VectorLayer {
            markers: vec![MapMarker {
                position: Coordinate::new(36.0, -120.0),
                label: "peak".into(),
                color: Color32::RED,
                attributes: Attributes::default(),
            }],
            outlines: vec![OutlineLayer::from_geojson(
                &GeoJsonGeometry::LineString {
                    coordinates: vec![vec![-118.0, 38.0], vec![-117.5, 38.5]],
                },
                LayerStyle::default(),
            )],
        };
        let bounds = layer.bounds().unwrap();
        assert_eq!(bounds.south(), 36.0);
        assert_eq!(bounds.west(), -120.0);
        assert_eq!(bounds.north(), 38.5);
        assert_eq!(bounds.east(), -117.5);
    }
}
