use std::collections::HashMap;
use std::error::Error;
use std::fmt;

use egui::Color32;

use super::factory::{self, LayerKind};
use super::popup::{PopupContent, PopupStyle, PopupTemplate, ShowFn};
use crate::map::bounds::Coordinate;
use crate::map::layer::{LayerStyle, MapMarker};
use crate::maps_api::arcgis::Attributes;

/// WMS request parameters attached to a spec node: the layer list plus any
/// extra key/value pairs forwarded verbatim.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WmsParams {
    pub layers: String,
    pub extra: Vec<(String, String)>,
}

impl WmsParams {
    pub fn new(layers: impl Into<String>) -> Self {
        Self {
            layers: layers.into(),
            extra: Vec::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((key.into(), value.into()));
        self
    }
}

/// Styling declared on a spec node: one fixed style, or derived per feature.
#[derive(Clone, Copy)]
pub enum StyleSpec {
    Fixed(LayerStyle),
    PerFeature(fn(&Attributes) -> LayerStyle),
}

impl StyleSpec {
    pub fn for_feature(&self, attributes: &Attributes) -> LayerStyle {
        match self {
            StyleSpec::Fixed(style) => *style,
            StyleSpec::PerFeature(f) => f(attributes),
        }
    }
}

impl fmt::Debug for StyleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StyleSpec::Fixed(style) => write!(f, "StyleSpec::Fixed({:?})", style),
            StyleSpec::PerFeature(_) => write!(f, "StyleSpec::PerFeature(..)"),
        }
    }
}

pub type PointToLayerFn = fn(&Attributes, Coordinate) -> MapMarker;
pub type MakeLayerFn = fn(&LayerSpec) -> LayerKind;

/// Click-query parameters of a query-capable node.
#[derive(Clone)]
pub struct QuerySpec {
    pub url: String,
    pub query_fields: Vec<String>,
    pub order_by_fields: Option<String>,
    pub where_clause: Option<String>,
    pub object_id_field: String,
    /// Attribute holding a server-reported acreage to sanity-check the
    /// computed outline area against, if the dataset has one.
    pub acreage_field: Option<String>,
    pub popup: PopupTemplate,
    pub show: ShowFn,
}

impl fmt::Debug for QuerySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySpec")
            .field("url", &self.url)
            .field("query_fields", &self.query_fields)
            .field("order_by_fields", &self.order_by_fields)
            .field("where_clause", &self.where_clause)
            .finish_non_exhaustive()
    }
}

impl QuerySpec {
    pub fn new(url: impl Into<String>, template: &str, show: ShowFn) -> Self {
        Self {
            url: url.into(),
            query_fields: Vec::new(),
            order_by_fields: None,
            where_clause: None,
            object_id_field: "OBJECTID".to_string(),
            acreage_field: None,
            popup: PopupTemplate::parse(template),
            show,
        }
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn order_by(mut self, fields: impl Into<String>) -> Self {
        self.order_by_fields = Some(fields.into());
        self
    }

    pub fn where_clause(mut self, clause: impl Into<String>) -> Self {
        self.where_clause = Some(clause.into());
        self
    }

    pub fn object_id_field(mut self, field: impl Into<String>) -> Self {
        self.object_id_field = field.into();
        self
    }

    pub fn acreage_field(mut self, field: impl Into<String>) -> Self {
        self.acreage_field = Some(field.into());
        self
    }
}

/// A child entry: a real node, or an alias redirecting to a sibling key.
#[derive(Debug, Clone)]
pub enum SpecChild {
    Node(LayerSpec),
    Alias(String),
}

/// One node of the declarative layer tree. Purely static configuration;
/// runtime state (materialized layers, checkboxes, aggregated bounds) lives
/// in the menu's parallel arena, keyed by `NodeId`.
#[derive(Debug, Clone, Default)]
pub struct LayerSpec {
    pub name: String,
    pub items: HashMap<String, SpecChild>,
    pub order: Vec<String>,
    pub url: Option<String>,
    pub wms: Option<WmsParams>,
    pub tile: bool,
    pub export_layers: Option<String>,
    pub dynamic_layers: Option<serde_json::Value>,
    pub query_layer: Option<u32>,
    pub max_zoom: Option<u8>,
    pub opacity: Option<f32>,
    pub attribution: Option<String>,
    pub file: Option<String>,
    pub query: Option<QuerySpec>,
    pub style: Option<StyleSpec>,
    pub point_to_layer: Option<PointToLayerFn>,
    pub make_layer: Option<MakeLayerFn>,
}

impl LayerSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn child(mut self, key: impl Into<String>, spec: LayerSpec) -> Self {
        let key = key.into();
        self.order.push(key.clone());
        self.items.insert(key, SpecChild::Node(spec));
        self
    }

    /// Add an alias entry without listing it in `order` (aliases are
    /// resolution shortcuts, not menu rows).
    pub fn alias(mut self, key: impl Into<String>, target: impl Into<String>) -> Self {
        self.items.insert(key.into(), SpecChild::Alias(target.into()));
        self
    }

    /// Replace the render order, possibly narrowing it to hide entries.
    pub fn order<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn wms(mut self, wms: WmsParams) -> Self {
        self.wms = Some(wms);
        self
    }

    pub fn tile(mut self) -> Self {
        self.tile = true;
        self
    }

    pub fn export_layers(mut self, ids: impl Into<String>) -> Self {
        self.export_layers = Some(ids.into());
        self
    }

    pub fn dynamic_layers(mut self, json: serde_json::Value) -> Self {
        self.dynamic_layers = Some(json);
        self
    }

    pub fn max_zoom(mut self, zoom: u8) -> Self {
        self.max_zoom = Some(zoom);
        self
    }

    pub fn opacity(mut self, opacity: f32) -> Self {
        self.opacity = Some(opacity);
        self
    }

    pub fn attribution(mut self, text: impl Into<String>) -> Self {
        self.attribution = Some(text.into());
        self
    }

    pub fn file(mut self, path: impl Into<String>) -> Self {
        self.file = Some(path.into());
        self
    }

    pub fn query(mut self, query: QuerySpec) -> Self {
        self.query = Some(query);
        self
    }

    pub fn style(mut self, style: StyleSpec) -> Self {
        self.style = Some(style);
        self
    }

    pub fn point_to_layer(mut self, f: PointToLayerFn) -> Self {
        self.point_to_layer = Some(f);
        self
    }

    pub fn make_layer(mut self, f: MakeLayerFn) -> Self {
        self.make_layer = Some(f);
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.items.is_empty()
    }

    /// Display name with embedded line-break markers flattened, used both
    /// for single-line rendering and for name-path matching.
    pub fn display_name(&self) -> String {
        self.name.replace('\n', " ")
    }

    /// Resolve one child key, following alias indirection within this node.
    pub fn resolve_child(&self, key: &str) -> Option<&LayerSpec> {
        let mut key = key;
        // Alias chains are short; eight hops means a cycle.
        for _ in 0..8 {
            match self.items.get(key)? {
                SpecChild::Node(node) => return Some(node),
                SpecChild::Alias(target) => key = target,
            }
        }
        None
    }
}

#[derive(Debug)]
pub enum SpecError {
    OrderKeyMissing { path: String, key: String },
    AliasTargetMissing { path: String, key: String, target: String },
    UnknownLayerKind { path: String },
}

impl fmt::Display for SpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecError::OrderKeyMissing { path, key } => {
                write!(f, "order key '{}' missing from items at '{}'", key, path)
            }
            SpecError::AliasTargetMissing { path, key, target } => {
                write!(
                    f,
                    "alias '{}' at '{}' points to missing key '{}'",
                    key, path, target
                )
            }
            SpecError::UnknownLayerKind { path } => {
                write!(f, "leaf '{}' has no resolvable layer kind", path)
            }
        }
    }
}

impl Error for SpecError {}

/// Stable identifier of a node within a validated tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// A validated layer tree: the immutable spec plus a flat index assigning a
/// `NodeId` to every node reachable through `order`. Layer kinds for base
/// and tile-overlay leaves are resolved here so unknown configurations fail
/// at load time instead of at first toggle.
pub struct LayerTree {
    root: LayerSpec,
    key_paths: Vec<Vec<String>>,
    by_path: HashMap<String, NodeId>,
    children: Vec<Vec<NodeId>>,
    parents: Vec<Option<NodeId>>,
    kinds: HashMap<NodeId, LayerKind>,
}

pub const SECTION_BASE: &str = "base";
pub const SECTION_OVERLAYS: &str = "overlays";
pub const SECTION_GEOJSON: &str = "geojson";
pub const SECTION_QUERIES: &str = "queries";

impl LayerTree {
    pub fn new(root: LayerSpec) -> Result<Self, SpecError> {
        let mut tree = Self {
            root,
            key_paths: Vec::new(),
            by_path: HashMap::new(),
            children: Vec::new(),
            parents: Vec::new(),
            kinds: HashMap::new(),
        };
        tree.index()?;
        Ok(tree)
    }

    fn index(&mut self) -> Result<(), SpecError> {
        // Walk order-reachable nodes depth first; the root itself gets id 0
        // with an empty key path.
        let mut stack: Vec<(Vec<String>, Option<NodeId>)> = vec![(Vec::new(), None)];
        let mut renderable_sections = Vec::new();

        while let Some((key_path, parent)) = stack.pop() {
            let id = NodeId(self.key_paths.len());
            let joined = key_path.join("/");
            let node = walk(&self.root, &key_path).expect("indexed path resolves");

            // Validate this node's order/items agreement and alias targets.
            for (key, child) in &node.items {
                if let SpecChild::Alias(target) = child {
                    if node.resolve_child(key).is_none() {
                        return Err(SpecError::AliasTargetMissing {
                            path: joined.clone(),
                            key: key.clone(),
                            target: target.clone(),
                        });
                    }
                }
            }
            let mut child_keys = Vec::new();
            for key in &node.order {
                if node.resolve_child(key).is_none() {
                    return Err(SpecError::OrderKeyMissing {
                        path: joined.clone(),
                        key: key.clone(),
                    });
                }
                child_keys.push(key.clone());
            }

            let renderable_section = match key_path.first().map(String::as_str) {
                Some(SECTION_BASE) | Some(SECTION_OVERLAYS) => true,
                _ => false,
            };
            if renderable_section && node.is_leaf() {
                renderable_sections.push((id, key_path.clone()));
            }

            self.key_paths.push(key_path.clone());
            self.by_path.insert(joined, id);
            self.children.push(Vec::new());
            self.parents.push(parent);
            if let Some(NodeId(p)) = parent {
                self.children[p].push(id);
            }

            // Push children in reverse so the DFS visits them in order.
            for key in child_keys.iter().rev() {
                let mut child_path = key_path.clone();
                child_path.push(key.clone());
                stack.push((child_path, Some(id)));
            }
        }

        // Children were appended in completion order; restore `order` order.
        for list in &mut self.children {
            list.sort();
        }

        // Resolve layer kinds for every renderable leaf up front.
        for (id, key_path) in renderable_sections {
            let node = walk(&self.root, &key_path).expect("indexed path resolves");
            let kind = factory::resolve_kind(node).ok_or(SpecError::UnknownLayerKind {
                path: key_path.join("/"),
            })?;
            self.kinds.insert(id, kind);
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.key_paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.key_paths.is_empty()
    }

    pub fn root_id(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &LayerSpec {
        walk(&self.root, &self.key_paths[id.0]).expect("indexed path resolves")
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.children[id.0]
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents[id.0]
    }

    pub fn key_path(&self, id: NodeId) -> &[String] {
        &self.key_paths[id.0]
    }

    /// Pre-resolved layer kind for base/overlay leaves.
    pub fn kind(&self, id: NodeId) -> Option<&LayerKind> {
        self.kinds.get(&id)
    }

    /// Resolve a `/`-separated key path to a node id, following alias
    /// indirection at each step. Aliased paths land on the canonical id.
    pub fn resolve(&self, path: &str) -> Option<NodeId> {
        if path.is_empty() {
            return Some(self.root_id());
        }
        let mut canonical: Vec<String> = Vec::new();
        let mut node = &self.root;
        for segment in path.split('/') {
            let child = node.resolve_child(segment)?;
            // Recover the canonical key the resolved child sits under.
            let key = node.items.iter().find_map(|(k, c)| match c {
                SpecChild::Node(n) => {
                    if std::ptr::eq(n, child) {
                        Some(k.clone())
                    } else {
                        None
                    }
                }
                SpecChild::Alias(_) => None,
            })?;
            canonical.push(key);
            node = child;
        }
        self.by_path.get(&canonical.join("/")).copied()
    }

    /// Ancestor chain from the root down to (and including) `id`.
    pub fn path_to(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self.parents[current.0] {
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        chain
    }

    pub fn section(&self, key: &str) -> Option<NodeId> {
        self.by_path.get(key).copied()
    }
}

fn walk<'a>(root: &'a LayerSpec, key_path: &[String]) -> Option<&'a LayerSpec> {
    let mut node = root;
    for key in key_path {
        node = node.resolve_child(key)?;
    }
    Some(node)
}

// --- catalog -----------------------------------------------------------

const WILDERNESS_URL: &str =
    "https://services1.arcgis.com/ERdCHt0sNM6dENSD/arcgis/rest/services/Wilderness_Areas_in_the_United_States/FeatureServer/0";
const NF_BOUNDARIES_URL: &str =
    "https://apps.fs.usda.gov/arcx/rest/services/EDW/EDW_ForestSystemBoundaries_01/MapServer/0";
const COUNTY_URL: &str =
    "https://tigerweb.geo.census.gov/arcgis/rest/services/TIGERweb/State_County/MapServer/1";
const BLM_CA_SMA_URL: &str =
    "https://gis.blm.gov/arcgis/rest/services/lands/BLM_Natl_SMA_LimitedScale/MapServer/1";
const BLM_NV_SMA_URL: &str =
    "https://gis.blm.gov/nvarcgis/rest/services/lands/BLM_NV_SMA/MapServer/1";

fn agency_color(agency: &str) -> Color32 {
    match agency {
        "BLM" => Color32::from_rgb(0, 0, 255),
        "FWS" => Color32::from_rgb(255, 165, 0),
        "NPS" => Color32::from_rgb(128, 0, 128),
        "USFS" => Color32::from_rgb(0, 128, 0),
        _ => Color32::from_rgb(102, 102, 102),
    }
}

fn show_wilderness(popup: &mut PopupContent, attributes: &Attributes) -> PopupStyle {
    let name = attributes.get_str("NAME");
    let agency = attributes.get_str("Agency");
    let year = attributes.get_i64("YearDesignated");
    let acres = attributes.get_f64("Acreage");
    popup.set_text([
        name.to_string(),
        agency.to_string(),
        format!("{}", year),
        format_thousands(acres.round() as i64),
    ]);
    if let Some(link) = popup.set_link(attributes.get_str("URL")) {
        link.force_host("wilderness.net");
    }
    PopupStyle::Color(agency_color(agency))
}

fn show_forest(popup: &mut PopupContent, attributes: &Attributes) -> PopupStyle {
    popup.set_text([attributes.get_str("FORESTNAME")]);
    PopupStyle::Color(Color32::from_rgb(0, 128, 0))
}

fn show_county(popup: &mut PopupContent, attributes: &Attributes) -> PopupStyle {
    popup.set_text([format!("{} County", attributes.get_str("BASENAME"))]);
    PopupStyle::Color(Color32::from_rgb(204, 0, 204))
}

/// Shared by the state-level surface-management sources; the datasets expose
/// the same schema, so siblings reuse one implementation.
fn show_sma(popup: &mut PopupContent, attributes: &Attributes) -> PopupStyle {
    let admin = attributes.get_str("ADMIN_AGENCY_CODE");
    popup.set_text([admin.to_string(), attributes.get_str("ADMIN_UNIT_NAME").to_string()]);
    PopupStyle::Color(agency_color(admin))
}

fn format_thousands(value: i64) -> String {
    let raw = value.abs().to_string();
    let mut out = String::new();
    for (i, c) in raw.chars().enumerate() {
        if i > 0 && (raw.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if value < 0 {
        format!("-{}", out)
    } else {
        out
    }
}

fn peak_marker(attributes: &Attributes, position: Coordinate) -> MapMarker {
    let climbed = attributes.get_i64("climbed") != 0;
    MapMarker {
        position,
        label: attributes.get_str("name").to_string(),
        color: if climbed {
            Color32::from_rgb(40, 170, 80)
        } else {
            Color32::from_rgb(200, 40, 40)
        },
        attributes: attributes.clone(),
    }
}

/// Decade-sliced historical topo scans, generated rather than hand-listed.
/// Each child filters the same export service to one scan-year range and the
/// group behaves as a radio: picking a decade swaps the parent's layer.
fn historical_topo() -> LayerSpec {
    let mut folder = LayerSpec::new("Historical Topo").max_zoom(15).opacity(0.8);
    for decade in (1880..1960).step_by(10) {
        let key = format!("t{}", decade);
        let child = LayerSpec::new(format!("{}\u{2013}{}", decade, decade + 9))
            .url("https://historicalmaps.arcgis.com/arcgis/rest/services/USA_Historical_Topo_Maps/MapServer")
            .dynamic_layers(serde_json::json!([{
                "id": 0,
                "source": {"type": "mapLayer", "mapLayerId": 0},
                "definitionExpression":
                    format!("ScanYear >= {} AND ScanYear <= {}", decade, decade + 9),
            }]))
            .max_zoom(15)
            .attribution("[USGS Historical Topographic Maps]");
        folder = folder.child(key, child);
    }
    folder
}

/// The static layer catalog, assembled once at startup. The mapbox token
/// comes from the environment; tree shape and parameters are fixed.
pub fn catalog(mapbox_token: &str) -> Result<LayerTree, SpecError> {
    let base = LayerSpec::new("Base Layers")
        .child(
            "mapbox",
            LayerSpec::new("Mapbox")
                .child(
                    "outdoors",
                    LayerSpec::new("Outdoors")
                        .url(format!(
                            "https://api.mapbox.com/styles/v1/mapbox/outdoors-v12/tiles/{{z}}/{{x}}/{{y}}?access_token={}",
                            mapbox_token
                        ))
                        .tile()
                        .max_zoom(22)
                        .attribution("\u{a9} Mapbox \u{a9} OpenStreetMap"),
                )
                .child(
                    "satellite",
                    LayerSpec::new("Satellite")
                        .url(format!(
                            "https://api.mapbox.com/v4/mapbox.satellite/{{z}}/{{x}}/{{y}}@2x.webp?access_token={}",
                            mapbox_token
                        ))
                        .tile()
                        .max_zoom(22)
                        .attribution("\u{a9} Mapbox \u{a9} Maxar"),
                ),
        )
        .child(
            "esri",
            LayerSpec::new("Esri")
                .child(
                    "usa_topo",
                    LayerSpec::new("USA Topo")
                        .url("https://services.arcgisonline.com/ArcGIS/rest/services/USA_Topo_Maps/MapServer")
                        .tile()
                        .max_zoom(15)
                        .attribution("[Esri]"),
                )
                .child(
                    "imagery",
                    LayerSpec::new("World Imagery")
                        .url("https://services.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer")
                        .tile()
                        .max_zoom(19)
                        .attribution("[Esri]"),
                ),
        )
        .child(
            "usgs",
            LayerSpec::new("USGS")
                .child(
                    "topo",
                    LayerSpec::new("Topo")
                        .url("https://basemap.nationalmap.gov/arcgis/rest/services/USGSTopo/MapServer")
                        .tile()
                        .max_zoom(16)
                        .attribution("[USGS The National Map]"),
                )
                .child(
                    "imagery_topo",
                    LayerSpec::new("Imagery\nTopo")
                        .url("https://basemap.nationalmap.gov/arcgis/rest/services/USGSImageryTopo/MapServer")
                        .tile()
                        .attribution("[USGS The National Map]"),
                ),
        )
        .alias("mb", "mapbox");

    let overlays = LayerSpec::new("Tile Overlays")
        .child(
            "wilderness",
            LayerSpec::new("Wilderness Areas")
                .url("https://gisservices.cfc.umt.edu/arcgis/rest/services/ProtectedAreas/National_Wilderness_Preservation_System/MapServer")
                .export_layers("0")
                .opacity(0.5)
                .max_zoom(15)
                .attribution("[Wilderness Connect]"),
        )
        .child("historic", historical_topo())
        .child(
            "snow",
            LayerSpec::new("Snow Depth")
                .url("https://mapservices.weather.noaa.gov/raster/services/snow/NOHRSC_Snow_Analysis/MapServer/WMSServer")
                .wms(WmsParams::new("1"))
                .opacity(0.6)
                .attribution("NOAA NOHRSC"),
        )
        .child(
            "fires",
            LayerSpec::new("Current Fires")
                .url("https://services3.arcgis.com/T4QMspbfLg3qTGWY/arcgis/rest/services/CY_WildlandFire_Perimeters_ToDate/FeatureServer/0")
                .style(StyleSpec::Fixed(LayerStyle {
                    color: Color32::from_rgb(255, 69, 0),
                    weight: 2.0,
                    fill: true,
                    fill_opacity: 0.25,
                    opacity: 1.0,
                }))
                .attribution("NIFC"),
        )
        .alias("us", "wilderness");

    let geojson = LayerSpec::new("GeoJSON Overlays")
        .child(
            "sierra",
            LayerSpec::new("Sierra Peaks Section")
                .file("data/sierra_peaks.json")
                .point_to_layer(peak_marker)
                .child("peaks", LayerSpec::new("Peaks"))
                .child("emblem", LayerSpec::new("Emblem Peaks")),
        )
        .child(
            "desert",
            LayerSpec::new("Desert Peaks Section")
                .file("data/desert_peaks.json")
                .point_to_layer(peak_marker)
                .child("peaks", LayerSpec::new("Peaks")),
        );

    let queries = LayerSpec::new("Point Queries")
        .child(
            "wilderness",
            LayerSpec::new("Wilderness Areas").query(
                QuerySpec::new(
                    WILDERNESS_URL,
                    "boldlink|br|text|br|Designated |text|br|text| acres|br|ztf",
                    show_wilderness,
                )
                .fields(["OBJECTID", "NAME", "URL", "Agency", "YearDesignated", "Acreage"])
                .order_by("NAME")
                .acreage_field("Acreage"),
            ),
        )
        .child(
            "nf",
            LayerSpec::new("National Forests").query(
                QuerySpec::new(NF_BOUNDARIES_URL, "boldtext|br|ztf", show_forest)
                    .fields(["OBJECTID", "FORESTNAME"])
                    .order_by("FORESTNAME"),
            ),
        )
        .child(
            "counties",
            LayerSpec::new("Counties").query(
                QuerySpec::new(COUNTY_URL, "boldtext|br|ztf", show_county)
                    .fields(["OBJECTID", "BASENAME"])
                    .where_clause("MTFCC='G4020'"),
            ),
        )
        .child(
            "blm_ca",
            LayerSpec::new("BLM CA\nSurface Management").query(
                QuerySpec::new(BLM_CA_SMA_URL, "boldtext|br|text|br|ztf", show_sma)
                    .fields(["OBJECTID", "ADMIN_AGENCY_CODE", "ADMIN_UNIT_NAME"]),
            ),
        )
        .child(
            "blm_nv",
            LayerSpec::new("BLM NV\nSurface Management").query(
                QuerySpec::new(BLM_NV_SMA_URL, "boldtext|br|text|br|ztf", show_sma)
                    .fields(["OBJECTID", "ADMIN_AGENCY_CODE", "ADMIN_UNIT_NAME"]),
            ),
        );

    LayerTree::new(
        LayerSpec::new("Layers")
            .child(SECTION_BASE, base)
            .child(SECTION_OVERLAYS, overlays)
            .child(SECTION_GEOJSON, geojson)
            .child(SECTION_QUERIES, queries),
    )
}
