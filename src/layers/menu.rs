use std::collections::{HashMap, HashSet};

use egui::Color32;

use super::spec::{LayerTree, NodeId, SECTION_BASE, SECTION_GEOJSON, SECTION_OVERLAYS, SECTION_QUERIES};
use crate::map::bounds::{Coordinate, GeoBounds};
use crate::map::layer::{parse_css_color, MapMarker, OutlineLayer, VectorLayer};
use crate::maps_api::arcgis::{GeoJsonFeature, GeoJsonFile, GeoJsonGeometry};

/// Side effects a menu transition asks the map shell to perform. The menu
/// itself never touches the map or the network.
#[derive(Debug, Clone, PartialEq)]
pub enum MenuEffect {
    AddLayer(NodeId),
    RemoveLayer(NodeId),
    SetMaxZoom(u8),
    FetchFile(String),
    FitBounds(GeoBounds),
}

/// Per-assignment bounds policy, decoded from a feature's flags value:
/// bit 0 elects the assignment into bounds aggregation, bit 1 stops the
/// upward extension at the owning file folder instead of the tree root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoundsPolicy {
    pub set_bounds: bool,
    pub stop_at_folder: bool,
}

impl BoundsPolicy {
    pub fn from_flags(flags: u64) -> Self {
        Self {
            set_bounds: flags & 1 != 0,
            stop_at_folder: flags & 2 != 0,
        }
    }
}

/// Runtime state of one node, kept apart from the immutable spec tree.
#[derive(Debug, Default, Clone)]
pub struct NodeState {
    pub checked: bool,
    pub attached: bool,
    pub layer: Option<VectorLayer>,
    pub bounds: Option<GeoBounds>,
}

/// Initial selection, the desktop stand-in for the original URL parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitialSelection {
    pub base: Option<String>,
    pub overlays: Vec<String>,
    pub geojson: Vec<(String, u64)>,
    pub queries: Vec<String>,
    pub points: Vec<(String, Option<Color32>)>,
}

impl InitialSelection {
    pub fn from_env() -> Self {
        let list = |name: &str| -> Vec<String> {
            std::env::var(name)
                .unwrap_or_default()
                .split(',')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        };
        Self {
            base: std::env::var("PEAKMAP_BASE").ok().filter(|s| !s.is_empty()),
            overlays: list("PEAKMAP_OVERLAYS"),
            geojson: list("PEAKMAP_GEOJSON")
                .into_iter()
                .map(|item| match item.split_once(':') {
                    Some((path, flags)) => {
                        (path.to_string(), flags.parse().unwrap_or(0))
                    }
                    None => (item, 0),
                })
                .collect(),
            queries: list("PEAKMAP_QUERIES"),
            points: list("PEAKMAP_POINT")
                .into_iter()
                .map(|item| match item.split_once('=') {
                    Some((path, color)) => (path.to_string(), parse_css_color(color)),
                    None => (item, None),
                })
                .collect(),
        }
    }
}

/// The layer-control menu: four sections over one spec tree, with runtime
/// state held in an arena parallel to the tree's node ids.
pub struct MenuState {
    tree: LayerTree,
    states: Vec<NodeState>,
    active_base: Option<NodeId>,
    /// Selected "version" child per radio-group overlay folder.
    versions: HashMap<NodeId, NodeId>,
    pending_files: HashSet<String>,
    loaded_files: HashSet<String>,
    fit_after_load: HashSet<NodeId>,
    /// Query sources pre-armed for outline display, with color overrides.
    armed: Vec<(NodeId, Option<Color32>)>,
}

impl MenuState {
    pub fn new(tree: LayerTree) -> Self {
        let states = vec![NodeState::default(); tree.len()];
        Self {
            tree,
            states,
            active_base: None,
            versions: HashMap::new(),
            pending_files: HashSet::new(),
            loaded_files: HashSet::new(),
            fit_after_load: HashSet::new(),
            armed: Vec::new(),
        }
    }

    pub fn tree(&self) -> &LayerTree {
        &self.tree
    }

    pub fn state(&self, id: NodeId) -> &NodeState {
        &self.states[id.0]
    }

    pub fn active_base(&self) -> Option<NodeId> {
        self.active_base
    }

    pub fn selected_version(&self, folder: NodeId) -> Option<NodeId> {
        self.versions
            .get(&folder)
            .copied()
            .or_else(|| self.tree.children(folder).first().copied())
    }

    pub fn armed_queries(&self) -> &[(NodeId, Option<Color32>)] {
        &self.armed
    }

    fn section_key(&self, id: NodeId) -> Option<&str> {
        self.tree.key_path(id).first().map(String::as_str)
    }

    // --- base layers ---------------------------------------------------

    /// Radio semantics: the previous base layer is removed, the new one
    /// added, and the map's max zoom follows the new layer's declaration.
    pub fn select_base(&mut self, id: NodeId) -> Vec<MenuEffect> {
        if self.section_key(id) != Some(SECTION_BASE) || !self.tree.node(id).is_leaf() {
            return Vec::new();
        }
        if self.active_base == Some(id) {
            return Vec::new();
        }
        let mut effects = Vec::new();
        if let Some(previous) = self.active_base.take() {
            self.states[previous.0].attached = false;
            effects.push(MenuEffect::RemoveLayer(previous));
        }
        self.active_base = Some(id);
        self.states[id.0].attached = true;
        effects.push(MenuEffect::AddLayer(id));
        let max_zoom = self
            .tree
            .kind(id)
            .map(|kind| kind.max_zoom)
            .unwrap_or(super::factory::DEFAULT_MAX_ZOOM);
        effects.push(MenuEffect::SetMaxZoom(max_zoom));
        effects
    }

    // --- tile overlays -------------------------------------------------

    /// Independent checkbox per overlay. A folder stands for its currently
    /// selected version child.
    pub fn toggle_overlay(&mut self, id: NodeId, on: bool) -> Vec<MenuEffect> {
        if self.section_key(id) != Some(SECTION_OVERLAYS) {
            return Vec::new();
        }
        let target = if self.tree.node(id).is_leaf() {
            id
        } else {
            match self.selected_version(id) {
                Some(child) => child,
                None => return Vec::new(),
            }
        };
        let state = &mut self.states[id.0];
        if state.checked == on {
            return Vec::new();
        }
        state.checked = on;
        self.states[target.0].attached = on;
        if on {
            vec![MenuEffect::AddLayer(target)]
        } else {
            vec![MenuEffect::RemoveLayer(target)]
        }
    }

    /// Radio switch inside a version group: swaps the folder's layer in
    /// place when the folder is attached, otherwise just records the choice.
    pub fn select_version(&mut self, folder: NodeId, child: NodeId) -> Vec<MenuEffect> {
        if !self.tree.children(folder).contains(&child) {
            return Vec::new();
        }
        let previous = self.selected_version(folder);
        if previous == Some(child) {
            return Vec::new();
        }
        self.versions.insert(folder, child);
        if !self.states[folder.0].checked {
            return Vec::new();
        }
        let mut effects = Vec::new();
        if let Some(previous) = previous {
            self.states[previous.0].attached = false;
            effects.push(MenuEffect::RemoveLayer(previous));
        }
        self.states[child.0].attached = true;
        effects.push(MenuEffect::AddLayer(child));
        effects
    }

    // --- point queries -------------------------------------------------

    pub fn toggle_query(&mut self, id: NodeId, on: bool) {
        if self.section_key(id) == Some(SECTION_QUERIES) && self.tree.node(id).query.is_some() {
            self.states[id.0].checked = on;
        }
    }

    pub fn enabled_queries(&self) -> Vec<NodeId> {
        let Some(section) = self.tree.section(SECTION_QUERIES) else {
            return Vec::new();
        };
        self.tree
            .children(section)
            .iter()
            .copied()
            .filter(|id| self.states[id.0].checked)
            .collect()
    }

    // --- geojson overlays ----------------------------------------------

    /// File folder owning a geojson node: the nearest ancestor-or-self with a
    /// backing file.
    fn owning_folder(&self, id: NodeId) -> Option<NodeId> {
        self.tree
            .path_to(id)
            .into_iter()
            .rev()
            .find(|&n| self.tree.node(n).file.is_some())
    }

    pub fn toggle_geojson(&mut self, id: NodeId, on: bool) -> Vec<MenuEffect> {
        if self.section_key(id) != Some(SECTION_GEOJSON) {
            return Vec::new();
        }
        let mut effects = Vec::new();
        if on {
            self.check_geojson(id, &mut effects);
        } else {
            let folder = self.owning_folder(id);
            let loaded = folder
                .map(|f| {
                    let file = self.tree.node(f).file.as_deref().unwrap_or_default();
                    self.loaded_files.contains(file)
                })
                .unwrap_or(false);
            // Before the data arrives there is nothing to detach, so the
            // folder checkbox snaps back to checked.
            if !loaded && !self.tree.node(id).is_leaf() {
                return Vec::new();
            }
            self.uncheck_geojson(id, &mut effects);
        }
        effects
    }

    fn check_geojson(&mut self, id: NodeId, effects: &mut Vec<MenuEffect>) {
        // Cascade up: every ancestor inside the section becomes checked.
        for ancestor in self.tree.path_to(id) {
            if self.section_key(ancestor) == Some(SECTION_GEOJSON) {
                self.states[ancestor.0].checked = true;
            }
        }
        // Cascade down from the toggled node.
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            self.states[node.0].checked = true;
            self.attach_if_loaded(node, effects);
            stack.extend(self.tree.children(node).iter().copied());
        }
        // Lazily fetch the backing file, exactly once.
        if let Some(folder) = self.owning_folder(id) {
            let file = self
                .tree
                .node(folder)
                .file
                .clone()
                .unwrap_or_default();
            if !self.loaded_files.contains(&file) && self.pending_files.insert(file.clone()) {
                effects.push(MenuEffect::FetchFile(file));
            }
        }
    }

    fn uncheck_geojson(&mut self, id: NodeId, effects: &mut Vec<MenuEffect>) {
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            let state = &mut self.states[node.0];
            state.checked = false;
            if state.attached {
                state.attached = false;
                effects.push(MenuEffect::RemoveLayer(node));
            }
            stack.extend(self.tree.children(node).iter().copied());
        }
    }

    fn attach_if_loaded(&mut self, id: NodeId, effects: &mut Vec<MenuEffect>) {
        let state = &mut self.states[id.0];
        if state.layer.is_some() && !state.attached {
            state.attached = true;
            effects.push(MenuEffect::AddLayer(id));
        }
    }

    /// Distribute a fetched GeoJSON file's features to their owning nodes and
    /// attach layers for already-checked nodes. Integrity violations are
    /// logged and dropped; the rest of the file still lands.
    pub fn file_loaded(&mut self, file: &str, data: &GeoJsonFile) -> Vec<MenuEffect> {
        self.pending_files.remove(file);
        if !self.loaded_files.insert(file.to_string()) {
            log::warn!("file {} loaded twice, ignoring", file);
            return Vec::new();
        }

        let Some(section) = self.tree.section(SECTION_GEOJSON) else {
            return Vec::new();
        };
        let folders: Vec<NodeId> = self
            .tree
            .children(section)
            .iter()
            .copied()
            .filter(|&id| self.tree.node(id).file.as_deref() == Some(file))
            .collect();

        // Transient name -> child index, built per visited node for this
        // distribution pass only.
        let mut name_map: HashMap<NodeId, HashMap<String, NodeId>> = HashMap::new();
        let mut effects = Vec::new();

        for &folder in &folders {
            for feature in &data.features {
                if let Some(target) = self.route_feature(folder, feature, &mut name_map) {
                    self.assign_feature(folder, target, feature);
                }
            }
        }

        // Attach whatever the user already checked, and honor any pending
        // zoom-to-fit request now that bounds exist.
        for &folder in &folders {
            let mut stack = vec![folder];
            while let Some(node) = stack.pop() {
                if self.states[node.0].checked {
                    self.attach_if_loaded(node, &mut effects);
                }
                stack.extend(self.tree.children(node).iter().copied());
            }
            if self.fit_after_load.remove(&folder) {
                if let Some(bounds) = self.states[folder.0].bounds {
                    effects.push(MenuEffect::FitBounds(bounds));
                }
            }
        }
        effects
    }

    fn route_feature(
        &self,
        folder: NodeId,
        feature: &GeoJsonFeature,
        name_map: &mut HashMap<NodeId, HashMap<String, NodeId>>,
    ) -> Option<NodeId> {
        let path = feature.name_path();
        if path.is_empty() {
            log::warn!("feature without a name path, dropped");
            return None;
        }
        let mut node = folder;
        for segment in &path {
            let children = name_map.entry(node).or_insert_with(|| {
                self.tree
                    .children(node)
                    .iter()
                    .map(|&child| (self.tree.node(child).display_name(), child))
                    .collect()
            });
            match children.get(*segment) {
                Some(&child) => node = child,
                None => {
                    log::warn!(
                        "name path segment '{}' not found under '{}', feature dropped",
                        segment,
                        self.tree.node(node).display_name()
                    );
                    return None;
                }
            }
        }
        Some(node)
    }

    fn assign_feature(&mut self, folder: NodeId, target: NodeId, feature: &GeoJsonFeature) {
        if self.states[target.0].layer.is_some() {
            log::warn!(
                "node '{}' already has a layer, assignment dropped",
                self.tree.node(target).display_name()
            );
            return;
        }
        if !self.tree.node(target).is_leaf() {
            log::warn!(
                "feature routed to folder '{}', assignment dropped",
                self.tree.node(target).display_name()
            );
            return;
        }
        let Some(geometry) = &feature.geometry else {
            return;
        };

        let layer = self.build_layer(folder, target, feature, geometry);
        let layer_bounds = layer.bounds();
        self.states[target.0].layer = Some(layer);

        let policy = BoundsPolicy::from_flags(feature.flags());
        if policy.set_bounds {
            if let Some(bounds) = layer_bounds {
                for node in self.tree.path_to(target) {
                    if policy.stop_at_folder && node != target && node != folder {
                        continue;
                    }
                    let slot = &mut self.states[node.0].bounds;
                    *slot = Some(match slot {
                        Some(existing) => existing.union(&bounds),
                        None => bounds,
                    });
                }
            }
        }
    }

    fn build_layer(
        &self,
        folder: NodeId,
        target: NodeId,
        feature: &GeoJsonFeature,
        geometry: &GeoJsonGeometry,
    ) -> VectorLayer {
        let folder_spec = self.tree.node(folder);
        let target_spec = self.tree.node(target);
        match geometry {
            GeoJsonGeometry::Point { coordinates } if coordinates.len() >= 2 => {
                let position = Coordinate::new(coordinates[1], coordinates[0]);
                let marker = match target_spec
                    .point_to_layer
                    .or(folder_spec.point_to_layer)
                {
                    Some(make) => make(&feature.properties, position),
                    None => MapMarker {
                        position,
                        label: target_spec.display_name(),
                        color: Color32::from_rgb(51, 136, 255),
                        attributes: feature.properties.clone(),
                    },
                };
                VectorLayer {
                    markers: vec![marker],
                    outlines: Vec::new(),
                }
            }
            GeoJsonGeometry::Point { .. } => VectorLayer {
                markers: Vec::new(),
                outlines: Vec::new(),
            },
            other => {
                let style = target_spec
                    .style
                    .or(folder_spec.style)
                    .map(|s| s.for_feature(&feature.properties))
                    .unwrap_or_default();
                VectorLayer {
                    markers: Vec::new(),
                    outlines: vec![OutlineLayer::from_geojson(other, style)],
                }
            }
        }
    }

    /// Aggregated bounds at any granularity, for zoom-to-fit.
    pub fn bounds(&self, id: NodeId) -> Option<GeoBounds> {
        self.states[id.0].bounds
    }

    // --- initial selection ---------------------------------------------

    /// Apply env-driven startup state. Every identifier is resolved relative
    /// to its section, alias-aware; unresolvable paths are skipped silently.
    pub fn apply_initial(&mut self, selection: &InitialSelection) -> Vec<MenuEffect> {
        let mut effects = Vec::new();

        if let Some(path) = &selection.base {
            if let Some(id) = self.resolve_in(SECTION_BASE, path) {
                effects.extend(self.select_base(id));
            }
        }
        for path in &selection.overlays {
            if let Some(id) = self.resolve_in(SECTION_OVERLAYS, path) {
                effects.extend(self.toggle_overlay(id, true));
            }
        }
        for (path, flags) in &selection.geojson {
            if let Some(id) = self.resolve_in(SECTION_GEOJSON, path) {
                if BoundsPolicy::from_flags(*flags).set_bounds {
                    if let Some(folder) = self.owning_folder(id) {
                        self.fit_after_load.insert(folder);
                    }
                }
                effects.extend(self.toggle_geojson(id, true));
            }
        }
        for path in &selection.queries {
            if let Some(id) = self.resolve_in(SECTION_QUERIES, path) {
                self.toggle_query(id, true);
            }
        }
        for (path, color) in &selection.points {
            if let Some(id) = self.resolve_in(SECTION_QUERIES, path) {
                self.toggle_query(id, true);
                self.armed.push((id, *color));
            }
        }
        effects
    }

    fn resolve_in(&self, section: &str, path: &str) -> Option<NodeId> {
        let id = self.tree.resolve(&format!("{}/{}", section, path));
        if id.is_none() {
            log::debug!("initial selection path '{}/{}' did not resolve", section, path);
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::spec::catalog;

    fn menu() -> MenuState {
        MenuState::new(catalog("test-token").unwrap())
    }

    fn geojson(features: &str) -> GeoJsonFile {
        serde_json::from_str(&format!("{{\"features\": [{}]}}", features)).unwrap()
    }

    const WHITNEY: &str = r#"{
        "properties": {"name": "Peaks", "flags": 1},
        "geometry": {"type": "Point", "coordinates": [-118.2923, 36.5786]}
    }"#;

    #[test]
    fn base_switch_removes_old_adds_new_and_sets_max_zoom() {
        let mut m = menu();
        let a = m.tree().resolve("base/usgs/topo").unwrap();
        let b = m.tree().resolve("base/esri/usa_topo").unwrap();

        let effects = m.select_base(a);
        assert_eq!(
            effects,
            vec![MenuEffect::AddLayer(a), MenuEffect::SetMaxZoom(16)]
        );

        let effects = m.select_base(b);
        assert_eq!(
            effects,
            vec![
                MenuEffect::RemoveLayer(a),
                MenuEffect::AddLayer(b),
                MenuEffect::SetMaxZoom(15)
            ]
        );
    }

    #[test]
    fn base_without_declared_max_zoom_defaults_to_23() {
        let mut m = menu();
        let id = m.tree().resolve("base/usgs/imagery_topo").unwrap();
        let effects = m.select_base(id);
        assert!(effects.contains(&MenuEffect::SetMaxZoom(23)));
    }

    #[test]
    fn reselecting_the_active_base_is_a_no_op() {
        let mut m = menu();
        let id = m.tree().resolve("base/usgs/topo").unwrap();
        m.select_base(id);
        assert!(m.select_base(id).is_empty());
    }

    #[test]
    fn overlay_toggles_are_independent() {
        let mut m = menu();
        let wilderness = m.tree().resolve("overlays/wilderness").unwrap();
        let snow = m.tree().resolve("overlays/snow").unwrap();

        assert_eq!(
            m.toggle_overlay(wilderness, true),
            vec![MenuEffect::AddLayer(wilderness)]
        );
        assert_eq!(m.toggle_overlay(snow, true), vec![MenuEffect::AddLayer(snow)]);
        assert_eq!(
            m.toggle_overlay(wilderness, false),
            vec![MenuEffect::RemoveLayer(wilderness)]
        );
        assert!(m.state(snow).attached);
    }

    #[test]
    fn version_switch_swaps_layer_in_place_while_attached() {
        let mut m = menu();
        let folder = m.tree().resolve("overlays/historic").unwrap();
        let first = m.tree().children(folder)[0];
        let second = m.tree().children(folder)[1];

        assert_eq!(m.toggle_overlay(folder, true), vec![MenuEffect::AddLayer(first)]);
        assert_eq!(
            m.select_version(folder, second),
            vec![MenuEffect::RemoveLayer(first), MenuEffect::AddLayer(second)]
        );
        // Folder checkbox state survived the swap.
        assert!(m.state(folder).checked);
        assert_eq!(
            m.toggle_overlay(folder, false),
            vec![MenuEffect::RemoveLayer(second)]
        );
    }

    #[test]
    fn version_switch_while_detached_only_records_the_choice() {
        let mut m = menu();
        let folder = m.tree().resolve("overlays/historic").unwrap();
        let second = m.tree().children(folder)[1];
        assert!(m.select_version(folder, second).is_empty());
        assert_eq!(m.toggle_overlay(folder, true), vec![MenuEffect::AddLayer(second)]);
    }

    #[test]
    fn three_sibling_toggles_fetch_the_backing_file_once() {
        let mut m = menu();
        let folder = m.tree().resolve("geojson/sierra").unwrap();
        let peaks = m.tree().resolve("geojson/sierra/peaks").unwrap();
        let emblem = m.tree().resolve("geojson/sierra/emblem").unwrap();

        let effects = m.toggle_geojson(peaks, true);
        assert_eq!(
            effects,
            vec![MenuEffect::FetchFile("data/sierra_peaks.json".to_string())]
        );
        // Further toggles while the fetch is in flight issue nothing.
        assert!(m.toggle_geojson(emblem, true).is_empty());
        m.toggle_geojson(emblem, false);
        assert!(m.toggle_geojson(emblem, true).is_empty());
        // Cascade-up checked the folder.
        assert!(m.state(folder).checked);
    }

    #[test]
    fn folder_uncheck_before_load_snaps_back() {
        let mut m = menu();
        let folder = m.tree().resolve("geojson/sierra").unwrap();
        m.toggle_geojson(folder, true);
        assert!(m.toggle_geojson(folder, false).is_empty());
        assert!(m.state(folder).checked);
    }

    #[test]
    fn checking_a_folder_cascades_down() {
        let mut m = menu();
        let folder = m.tree().resolve("geojson/sierra").unwrap();
        let peaks = m.tree().resolve("geojson/sierra/peaks").unwrap();
        let emblem = m.tree().resolve("geojson/sierra/emblem").unwrap();
        m.toggle_geojson(folder, true);
        assert!(m.state(peaks).checked);
        assert!(m.state(emblem).checked);
    }

    #[test]
    fn file_load_distributes_attaches_and_aggregates_bounds() {
        let mut m = menu();
        let peaks = m.tree().resolve("geojson/sierra/peaks").unwrap();
        let folder = m.tree().resolve("geojson/sierra").unwrap();
        m.toggle_geojson(peaks, true);

        let effects = m.file_loaded("data/sierra_peaks.json", &geojson(WHITNEY));
        assert_eq!(effects, vec![MenuEffect::AddLayer(peaks)]);
        let layer = m.state(peaks).layer.as_ref().unwrap();
        assert_eq!(layer.markers.len(), 1);
        assert_eq!(layer.markers[0].label, "Peaks");

        // flags bit 0: bounds flow from the leaf up to the tree root.
        for id in [peaks, folder, m.tree().root_id()] {
            let bounds = m.bounds(id).unwrap();
            assert_eq!(bounds.south(), 36.5786);
            assert_eq!(bounds.west(), -118.2923);
        }
    }

    #[test]
    fn flags_bit_two_skips_intermediate_levels() {
        let mut m = menu();
        let peaks = m.tree().resolve("geojson/sierra/peaks").unwrap();
        let folder = m.tree().resolve("geojson/sierra").unwrap();
        let section = m.tree().section(SECTION_GEOJSON).unwrap();
        m.toggle_geojson(peaks, true);

        let feature = r#"{
            "properties": {"name": "Peaks", "flags": 3},
            "geometry": {"type": "Point", "coordinates": [-118.2923, 36.5786]}
        }"#;
        m.file_loaded("data/sierra_peaks.json", &geojson(feature));
        assert!(m.bounds(peaks).is_some());
        assert!(m.bounds(folder).is_some());
        assert!(m.bounds(section).is_none());
        assert!(m.bounds(m.tree().root_id()).is_none());
    }

    #[test]
    fn zero_flags_leave_bounds_untouched() {
        let mut m = menu();
        let peaks = m.tree().resolve("geojson/sierra/peaks").unwrap();
        m.toggle_geojson(peaks, true);
        let feature = r#"{
            "properties": {"name": "Peaks"},
            "geometry": {"type": "Point", "coordinates": [-118.2923, 36.5786]}
        }"#;
        m.file_loaded("data/sierra_peaks.json", &geojson(feature));
        assert!(m.bounds(peaks).is_none());
    }

    #[test]
    fn unroutable_and_duplicate_assignments_are_dropped_nonfatally() {
        let mut m = menu();
        let peaks = m.tree().resolve("geojson/sierra/peaks").unwrap();
        m.toggle_geojson(peaks, true);

        let features = r#"{
            "properties": {"name": "Peaks", "flags": 1},
            "geometry": {"type": "Point", "coordinates": [-118.2923, 36.5786]}
        }, {
            "properties": {"name": "Peaks", "flags": 1},
            "geometry": {"type": "Point", "coordinates": [-118.0, 37.0]}
        }, {
            "properties": {"name": "No Such Node", "flags": 1},
            "geometry": {"type": "Point", "coordinates": [-117.0, 36.0]}
        }"#;
        m.file_loaded("data/sierra_peaks.json", &geojson(features));

        // First assignment won; the duplicate and the unroutable one dropped.
        let layer = m.state(peaks).layer.as_ref().unwrap();
        assert_eq!(layer.markers.len(), 1);
        assert_eq!(layer.markers[0].position.latitude(), 36.5786);
    }

    #[test]
    fn geometry_routed_to_a_folder_is_dropped() {
        use crate::layers::spec::{LayerSpec, LayerTree};
        let tree = LayerTree::new(
            LayerSpec::new("Layers").child(
                "geojson",
                LayerSpec::new("GeoJSON Overlays").child(
                    "f",
                    LayerSpec::new("Sierra")
                        .file("f.json")
                        .child("g", LayerSpec::new("Group").child("p", LayerSpec::new("Peak"))),
                ),
            ),
        )
        .unwrap();
        let mut m = MenuState::new(tree);
        let group = m.tree().resolve("geojson/f/g").unwrap();
        m.toggle_geojson(group, true);
        // "Group" has children; boundary geometry may only land on leaves.
        let feature = r#"{
            "properties": {"name": "Group", "flags": 1},
            "geometry": {"type": "Polygon",
                         "coordinates": [[[-119.0, 37.0], [-119.0, 38.0], [-118.0, 38.0], [-119.0, 37.0]]]}
        }"#;
        m.file_loaded("f.json", &geojson(feature));
        assert!(m.state(group).layer.is_none());
        assert!(m.bounds(group).is_none());
    }

    #[test]
    fn point_routed_to_a_folder_is_dropped() {
        use crate::layers::spec::{LayerSpec, LayerTree};
        let tree = LayerTree::new(
            LayerSpec::new("Layers").child(
                "geojson",
                LayerSpec::new("GeoJSON Overlays").child(
                    "f",
                    LayerSpec::new("Sierra")
                        .file("f.json")
                        .child("g", LayerSpec::new("Group").child("p", LayerSpec::new("Peak"))),
                ),
            ),
        )
        .unwrap();
        let mut m = MenuState::new(tree);
        let group = m.tree().resolve("geojson/f/g").unwrap();
        m.toggle_geojson(group, true);
        // Leaf-only assignment holds for markers too, not just boundaries.
        let feature = r#"{
            "properties": {"name": "Group", "flags": 1},
            "geometry": {"type": "Point", "coordinates": [-118.2923, 36.5786]}
        }"#;
        m.file_loaded("f.json", &geojson(feature));
        assert!(m.state(group).layer.is_none());
        assert!(m.bounds(group).is_none());
    }

    #[test]
    fn later_checks_after_load_attach_without_refetch() {
        let mut m = menu();
        let peaks = m.tree().resolve("geojson/sierra/peaks").unwrap();
        m.toggle_geojson(peaks, true);
        m.file_loaded("data/sierra_peaks.json", &geojson(WHITNEY));

        assert_eq!(
            m.toggle_geojson(peaks, false),
            vec![MenuEffect::RemoveLayer(peaks)]
        );
        assert_eq!(
            m.toggle_geojson(peaks, true),
            vec![MenuEffect::AddLayer(peaks)]
        );
    }

    #[test]
    fn initial_selection_applies_and_ignores_unresolvable_paths() {
        let mut m = menu();
        let selection = InitialSelection {
            base: Some("mb/outdoors".to_string()),
            overlays: vec!["us".to_string(), "no/such".to_string()],
            geojson: vec![("sierra/peaks".to_string(), 1)],
            queries: vec!["wilderness".to_string(), "bogus".to_string()],
            points: vec![("counties".to_string(), parse_css_color("#cc00cc"))],
        };
        let effects = m.apply_initial(&selection);

        let base = m.tree().resolve("base/mapbox/outdoors").unwrap();
        assert!(effects.contains(&MenuEffect::AddLayer(base)));
        let wilderness_overlay = m.tree().resolve("overlays/wilderness").unwrap();
        assert!(effects.contains(&MenuEffect::AddLayer(wilderness_overlay)));
        assert!(effects.contains(&MenuEffect::FetchFile("data/sierra_peaks.json".to_string())));

        let queries = m.enabled_queries();
        assert_eq!(queries.len(), 2);
        assert_eq!(m.armed_queries().len(), 1);
        assert_eq!(
            m.armed_queries()[0].1,
            Some(Color32::from_rgb(204, 0, 204))
        );
    }

    #[test]
    fn fit_bounds_fires_after_the_flagged_overlay_loads() {
        let mut m = menu();
        let selection = InitialSelection {
            geojson: vec![("sierra/peaks".to_string(), 1)],
            ..Default::default()
        };
        m.apply_initial(&selection);
        let effects = m.file_loaded("data/sierra_peaks.json", &geojson(WHITNEY));
        assert!(effects
            .iter()
            .any(|e| matches!(e, MenuEffect::FitBounds(_))));
    }
}
