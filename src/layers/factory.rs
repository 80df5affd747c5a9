use super::spec::{LayerSpec, WmsParams};
use crate::map::bounds::tile_mercator_bbox;

pub const DEFAULT_MAX_ZOOM: u8 = 23;
pub const TILE_SIZE_PX: u32 = 256;

/// Attribution line attached to a materialized layer, optionally linking to
/// the source's metadata endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribution {
    pub text: String,
    pub url: Option<String>,
}

/// How a tile address maps into the request URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileScheme {
    /// Literal `{z}/{x}/{y}` template URL.
    Template,
    /// ArcGIS tile cache, addressed `tile/{z}/{y}/{x}`.
    ArcGis,
}

/// The closed set of rendering strategies a leaf can resolve to. Resolved
/// once at tree load; an unresolvable leaf is a load error, not a first-use
/// surprise.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerSource {
    /// Vector features fetched from a feature-service query endpoint.
    FeatureQuery {
        url: String,
        where_clause: Option<String>,
        fields: Vec<String>,
    },
    /// WMS 1.3.0 GetMap tiles.
    Wms { url: String, params: WmsParams },
    /// Pre-rendered XYZ or ArcGIS cache tiles.
    Tile { url: String, scheme: TileScheme },
    /// Server-side export-image rendering, one request per visible tile.
    ExportImage {
        url: String,
        dynamic_layers: Option<String>,
        export_layers: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerKind {
    pub source: LayerSource,
    pub max_zoom: u8,
    pub min_zoom: u8,
    pub opacity: f32,
    pub attribution: Option<Attribution>,
}

/// True when the URL's last path segment is a numeric feature-service layer
/// id, e.g. `.../FeatureServer/0` or `.../MapServer/2`.
fn is_feature_service_url(url: &str) -> bool {
    let mut segments = url.trim_end_matches('/').rsplit('/');
    let last = segments.next().unwrap_or("");
    let parent = segments.next().unwrap_or("");
    !last.is_empty()
        && last.chars().all(|c| c.is_ascii_digit())
        && (parent.ends_with("FeatureServer") || parent.ends_with("MapServer"))
}

/// Rewrite a `[Name]` attribution into a hyperlink to the source's metadata
/// endpoint; tile caches get `?f=pjson` appended so the link lands on the
/// readable service description.
fn resolve_attribution(spec: &LayerSpec, tile_based: bool) -> Option<Attribution> {
    let raw = spec.attribution.as_ref()?;
    let inner = raw
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'));
    match (inner, spec.url.as_ref()) {
        (Some(name), Some(url)) => {
            let target = if tile_based {
                format!("{}?f=pjson", url)
            } else {
                url.clone()
            };
            Some(Attribution {
                text: name.to_string(),
                url: Some(target),
            })
        }
        _ => Some(Attribution {
            text: raw.clone(),
            url: None,
        }),
    }
}

/// Dispatch a leaf spec to its rendering strategy, in priority order:
/// feature-service URL, then `wms`, then `tile`, falling back to dynamic
/// export-image. Returns None when the leaf declares nothing renderable.
pub fn resolve_kind(spec: &LayerSpec) -> Option<LayerKind> {
    if let Some(make) = spec.make_layer {
        return Some(make(spec));
    }
    let url = spec.url.as_ref()?;

    let source = if is_feature_service_url(url) {
        LayerSource::FeatureQuery {
            url: url.clone(),
            where_clause: spec
                .query
                .as_ref()
                .and_then(|q| q.where_clause.clone()),
            fields: spec
                .query
                .as_ref()
                .map(|q| q.query_fields.clone())
                .unwrap_or_default(),
        }
    } else if let Some(wms) = &spec.wms {
        LayerSource::Wms {
            url: url.clone(),
            params: wms.clone(),
        }
    } else if spec.tile {
        let scheme = if url.contains("{z}") {
            TileScheme::Template
        } else {
            TileScheme::ArcGis
        };
        LayerSource::Tile {
            url: url.clone(),
            scheme,
        }
    } else {
        LayerSource::ExportImage {
            url: url.clone(),
            dynamic_layers: spec.dynamic_layers.as_ref().map(|v| v.to_string()),
            export_layers: spec.export_layers.clone(),
        }
    };

    let tile_based = matches!(source, LayerSource::Tile { .. });
    Some(LayerKind {
        source,
        max_zoom: spec.max_zoom.unwrap_or(DEFAULT_MAX_ZOOM),
        min_zoom: 0,
        opacity: spec.opacity.unwrap_or(1.0),
        attribution: resolve_attribution(spec, tile_based),
    })
}

/// Click-query endpoint of a query-capable node: the query spec's own URL,
/// or the node's service URL joined with its `query_layer` id.
pub fn query_endpoint(spec: &LayerSpec) -> Option<String> {
    if let Some(query) = &spec.query {
        if !query.url.is_empty() {
            return Some(query.url.clone());
        }
    }
    match (&spec.url, spec.query_layer) {
        (Some(url), Some(layer)) => Some(format!("{}/{}", url, layer)),
        _ => None,
    }
}

impl LayerKind {
    /// Request URL for one tile address, per strategy. WMS and export-image
    /// layers compute the tile's Web Mercator meter bbox.
    pub fn tile_url(&self, z: u32, x: u32, y: u32) -> Option<String> {
        match &self.source {
            LayerSource::Tile { url, scheme } => Some(match scheme {
                TileScheme::Template => url
                    .replace("{z}", &z.to_string())
                    .replace("{x}", &x.to_string())
                    .replace("{y}", &y.to_string()),
                TileScheme::ArcGis => format!("{}/tile/{}/{}/{}", url, z, y, x),
            }),
            LayerSource::Wms { url, params } => {
                let (xmin, ymin, xmax, ymax) = tile_mercator_bbox(x, y, z);
                let mut request = format!(
                    "{}?service=WMS&version=1.3.0&request=GetMap&format=image%2Fpng&transparent=true\
                     &layers={}&crs=EPSG%3A3857&width={}&height={}&bbox={},{},{},{}",
                    url, params.layers, TILE_SIZE_PX, TILE_SIZE_PX, xmin, ymin, xmax, ymax
                );
                for (key, value) in &params.extra {
                    request.push_str(&format!("&{}={}", key, value));
                }
                Some(request)
            }
            LayerSource::ExportImage {
                url,
                dynamic_layers,
                export_layers,
            } => {
                let (xmin, ymin, xmax, ymax) = tile_mercator_bbox(x, y, z);
                let mut request = format!(
                    "{}/export?f=image&bbox={},{},{},{}&bboxSR=102113&imageSR=102113&size={},{}\
                     &format=png&transparent=true",
                    url, xmin, ymin, xmax, ymax, TILE_SIZE_PX, TILE_SIZE_PX
                );
                if let Some(json) = dynamic_layers {
                    request.push_str("&dynamicLayers=");
                    request.push_str(&urlencode(json));
                } else if let Some(ids) = export_layers {
                    request.push_str(&format!("&layers=show:{}", ids));
                }
                Some(request)
            }
            LayerSource::FeatureQuery { .. } => None,
        }
    }

    /// Feature fetch URL for a feature-query layer: the whole (optionally
    /// filtered) dataset as GeoJSON.
    pub fn feature_query_url(&self) -> Option<String> {
        let LayerSource::FeatureQuery {
            url,
            where_clause,
            fields,
        } = &self.source
        else {
            return None;
        };
        let where_part = where_clause.as_deref().unwrap_or("1=1");
        let fields_part = if fields.is_empty() {
            "*".to_string()
        } else {
            fields.join(",")
        };
        Some(format!(
            "{}/query?f=geojson&where={}&outFields={}&outSR=4326&returnGeometry=true",
            url,
            urlencode(where_part),
            fields_part
        ))
    }
}

/// Minimal percent-encoding for query-string values.
pub fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::spec::WmsParams;
    use crate::map::bounds::EARTH_RADIUS_M;

    #[test]
    fn feature_service_suffix_wins_over_other_flags() {
        let spec = LayerSpec::new("fires")
            .url("https://host/arcgis/rest/services/fires/FeatureServer/0")
            .tile();
        let kind = resolve_kind(&spec).unwrap();
        assert!(matches!(kind.source, LayerSource::FeatureQuery { .. }));
    }

    #[test]
    fn wms_beats_tile_and_export() {
        let spec = LayerSpec::new("snow")
            .url("https://host/services/snow/MapServer/WMSServer")
            .wms(WmsParams::new("1"))
            .tile();
        let kind = resolve_kind(&spec).unwrap();
        assert!(matches!(kind.source, LayerSource::Wms { .. }));
    }

    #[test]
    fn bare_service_url_falls_back_to_export_image() {
        let spec = LayerSpec::new("wild")
            .url("https://host/arcgis/rest/services/wild/MapServer")
            .export_layers("0");
        let kind = resolve_kind(&spec).unwrap();
        let url = kind.tile_url(0, 0, 0).unwrap();
        assert!(url.contains("/export?f=image"));
        assert!(url.contains("&layers=show:0"));
        assert!(url.contains("bboxSR=102113"));
        let half = std::f64::consts::PI * EARTH_RADIUS_M;
        assert!(url.contains(&format!("bbox={},{},{},{}", -half, -half, half, half)));
    }

    #[test]
    fn dynamic_layers_override_suppresses_show_list() {
        let spec = LayerSpec::new("historic")
            .url("https://host/arcgis/rest/services/topo/MapServer")
            .export_layers("0")
            .dynamic_layers(serde_json::json!([{"id": 0}]));
        let kind = resolve_kind(&spec).unwrap();
        let url = kind.tile_url(3, 1, 2).unwrap();
        assert!(url.contains("dynamicLayers="));
        assert!(!url.contains("layers=show:"));
    }

    #[test]
    fn arcgis_tile_scheme_is_z_y_x() {
        let spec = LayerSpec::new("topo")
            .url("https://basemap.nationalmap.gov/arcgis/rest/services/USGSTopo/MapServer")
            .tile();
        let kind = resolve_kind(&spec).unwrap();
        assert_eq!(
            kind.tile_url(12, 701, 1635).unwrap(),
            "https://basemap.nationalmap.gov/arcgis/rest/services/USGSTopo/MapServer/tile/12/1635/701"
        );
    }

    #[test]
    fn template_tile_scheme_is_z_x_y() {
        let spec = LayerSpec::new("mapbox")
            .url("https://api.mapbox.com/styles/{z}/{x}/{y}?access_token=t")
            .tile();
        let kind = resolve_kind(&spec).unwrap();
        assert_eq!(
            kind.tile_url(12, 701, 1635).unwrap(),
            "https://api.mapbox.com/styles/12/701/1635?access_token=t"
        );
    }

    #[test]
    fn max_zoom_defaults_to_23_and_min_zoom_to_0() {
        let spec = LayerSpec::new("topo")
            .url("https://host/arcgis/rest/services/t/MapServer")
            .tile();
        let kind = resolve_kind(&spec).unwrap();
        assert_eq!(kind.max_zoom, 23);
        assert_eq!(kind.min_zoom, 0);
    }

    #[test]
    fn bracketed_attribution_links_to_metadata() {
        let spec = LayerSpec::new("topo")
            .url("https://basemap.nationalmap.gov/arcgis/rest/services/USGSTopo/MapServer")
            .tile()
            .attribution("[USGS The National Map]");
        let kind = resolve_kind(&spec).unwrap();
        let attribution = kind.attribution.unwrap();
        assert_eq!(attribution.text, "USGS The National Map");
        assert_eq!(
            attribution.url.as_deref(),
            Some("https://basemap.nationalmap.gov/arcgis/rest/services/USGSTopo/MapServer?f=pjson")
        );
    }

    #[test]
    fn bracketed_attribution_on_export_source_links_plain() {
        let spec = LayerSpec::new("wild")
            .url("https://host/arcgis/rest/services/wild/MapServer")
            .export_layers("0")
            .attribution("[Wilderness Connect]");
        let kind = resolve_kind(&spec).unwrap();
        let attribution = kind.attribution.unwrap();
        assert_eq!(attribution.text, "Wilderness Connect");
        assert_eq!(
            attribution.url.as_deref(),
            Some("https://host/arcgis/rest/services/wild/MapServer")
        );
    }

    #[test]
    fn plain_attribution_passes_through_verbatim() {
        let spec = LayerSpec::new("snow")
            .url("https://host/services/snow/MapServer/WMSServer")
            .wms(WmsParams::new("1"))
            .attribution("NOAA NOHRSC");
        let kind = resolve_kind(&spec).unwrap();
        let attribution = kind.attribution.unwrap();
        assert_eq!(attribution.text, "NOAA NOHRSC");
        assert!(attribution.url.is_none());
    }

    #[test]
    fn query_endpoint_prefers_query_url_then_joins_query_layer() {
        let mut spec = LayerSpec::new("wild").url("https://host/services/wild/MapServer");
        spec.query_layer = Some(2);
        assert_eq!(
            query_endpoint(&spec).as_deref(),
            Some("https://host/services/wild/MapServer/2")
        );
    }

    #[test]
    fn urlencode_escapes_reserved_characters() {
        assert_eq!(urlencode("MTFCC='G4020'"), "MTFCC%3D%27G4020%27");
        assert_eq!(urlencode("a b"), "a%20b");
    }
}
