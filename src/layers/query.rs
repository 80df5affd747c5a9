use std::collections::HashMap;

use egui::Color32;

use super::area::{acreage_mismatch, ring_area};
use super::popup::PopupContent;
use super::spec::{NodeId, QuerySpec};
use crate::map::bounds::Coordinate;
use crate::map::layer::{LayerStyle, OutlineLayer};
use crate::maps_api::arcgis::{AttributeQueryResponse, Attributes, GeometryQueryResponse};

/// Pagination never shows more than this many features of a result set.
pub const DISPLAY_CAP: usize = 99;

/// Request-generation token: one per map click, compared on every response.
/// Anything carrying an older token is stale and dropped unconditionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClickSeq(pub u64);

/// Attribute query the shell should issue for one enabled source.
#[derive(Debug, Clone)]
pub struct AttributeRequest {
    pub source: NodeId,
    pub query: QuerySpec,
    pub point: Coordinate,
    pub seq: ClickSeq,
}

/// Side effects the engine asks the shell to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryEffect {
    ShowOutline(NodeId, OutlineLayer),
    RemoveOutline(NodeId),
    FetchGeometry {
        source: NodeId,
        object_id: i64,
        seq: ClickSeq,
    },
    /// Geometry fetch failed; the shell unchecks the source's toggle.
    DisableSource(NodeId),
}

/// Current attribute result set of one source.
struct ResultState {
    features: Vec<Attributes>,
    shown: usize,
    pages: usize,
    popup: PopupContent,
    style: LayerStyle,
    area_mismatch: bool,
}

/// Per-source runtime state. The outline cache is unbounded by design; the
/// page's lifetime bounds it in practice.
struct SourceState {
    query: QuerySpec,
    show_outline: bool,
    color_override: Option<Color32>,
    outline: Option<OutlineLayer>,
    outline_id: Option<i64>,
    outline_cache: HashMap<i64, OutlineLayer>,
    active_queries: HashMap<i64, ClickSeq>,
    result: Option<ResultState>,
}

impl SourceState {
    fn new(query: QuerySpec) -> Self {
        Self {
            query,
            show_outline: true,
            color_override: None,
            outline: None,
            outline_id: None,
            outline_cache: HashMap::new(),
            active_queries: HashMap::new(),
            result: None,
        }
    }

    fn current_style(&self) -> LayerStyle {
        let mut style = self
            .result
            .as_ref()
            .map(|r| r.style)
            .unwrap_or_default();
        if let Some(color) = self.color_override {
            style.color = color;
        }
        style
    }

    fn shown_object_id(&self) -> Option<i64> {
        let result = self.result.as_ref()?;
        let attributes = result.features.get(result.shown)?;
        attributes.get(&self.query.object_id_field)?.as_i64()
    }
}

/// The click-query engine. UI-agnostic: the shell feeds it clicks and
/// network responses and applies the effects it returns.
pub struct QueryEngine {
    seq: u64,
    sources: HashMap<NodeId, SourceState>,
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryEngine {
    pub fn new() -> Self {
        Self {
            seq: 0,
            sources: HashMap::new(),
        }
    }

    pub fn enable_source(&mut self, id: NodeId, query: QuerySpec) {
        self.sources.entry(id).or_insert_with(|| SourceState::new(query));
    }

    /// Pre-armed sources keep their outline toggle on and may carry a fixed
    /// color override from the initial selection.
    pub fn arm_source(&mut self, id: NodeId, query: QuerySpec, color: Option<Color32>) {
        let state = self.sources.entry(id).or_insert_with(|| SourceState::new(query));
        state.show_outline = true;
        state.color_override = color;
    }

    pub fn disable_source(&mut self, id: NodeId) -> Vec<QueryEffect> {
        let mut effects = Vec::new();
        if let Some(state) = self.sources.remove(&id) {
            if state.outline.is_some() {
                effects.push(QueryEffect::RemoveOutline(id));
            }
        }
        effects
    }

    pub fn is_enabled(&self, id: NodeId) -> bool {
        self.sources.contains_key(&id)
    }

    /// A new click supersedes everything: bump the sequence token, drop all
    /// displayed results and outlines, and fan out one attribute query per
    /// enabled source.
    pub fn begin_click(
        &mut self,
        point: Coordinate,
    ) -> (ClickSeq, Vec<AttributeRequest>, Vec<QueryEffect>) {
        self.seq += 1;
        let seq = ClickSeq(self.seq);

        let mut effects = Vec::new();
        let mut requests = Vec::new();
        let mut ids: Vec<NodeId> = self.sources.keys().copied().collect();
        ids.sort();
        for id in ids {
            let state = self.sources.get_mut(&id).expect("source exists");
            state.result = None;
            if state.outline.take().is_some() {
                effects.push(QueryEffect::RemoveOutline(id));
            }
            state.outline_id = None;
            requests.push(AttributeRequest {
                source: id,
                query: state.query.clone(),
                point,
                seq,
            });
        }
        (seq, requests, effects)
    }

    /// Attribute response for one source. Stale tokens are dropped; an
    /// absent or empty feature list yields no visible change.
    pub fn handle_attribute_response(
        &mut self,
        source: NodeId,
        seq: ClickSeq,
        response: AttributeQueryResponse,
    ) -> Vec<QueryEffect> {
        if seq.0 != self.seq {
            return Vec::new();
        }
        let Some(state) = self.sources.get_mut(&source) else {
            return Vec::new();
        };
        let Some(features) = response.features else {
            return Vec::new();
        };
        if features.is_empty() {
            return Vec::new();
        }

        let features: Vec<Attributes> = features.into_iter().map(|f| f.attributes).collect();
        let pages = features.len().min(DISPLAY_CAP);
        let mut popup = state.query.popup.instantiate();
        let style = (state.query.show)(&mut popup, &features[0]).to_style();
        state.result = Some(ResultState {
            features,
            shown: 0,
            pages,
            popup,
            style,
            area_mismatch: false,
        });

        self.display_current(source)
    }

    /// Step the result pager without re-querying attributes. `delta` is +-1;
    /// pages wrap in both directions.
    pub fn step(&mut self, source: NodeId, delta: i32) -> Vec<QueryEffect> {
        let Some(state) = self.sources.get_mut(&source) else {
            return Vec::new();
        };
        let Some(result) = state.result.as_mut() else {
            return Vec::new();
        };
        if result.pages == 0 {
            return Vec::new();
        }
        let pages = result.pages as i32;
        result.shown = ((result.shown as i32 + delta).rem_euclid(pages)) as usize;

        let mut popup = state.query.popup.instantiate();
        let style = (state.query.show)(&mut popup, &result.features[result.shown]).to_style();
        result.popup = popup;
        result.style = style;
        result.area_mismatch = false;

        self.display_current(source)
    }

    /// Show the currently paged feature: swap the outline in from cache, or
    /// lazily trigger a geometry fetch, deduplicated per feature id.
    fn display_current(&mut self, source: NodeId) -> Vec<QueryEffect> {
        let state = self.sources.get_mut(&source).expect("source exists");
        let Some(object_id) = state.shown_object_id() else {
            return Vec::new();
        };

        let mut effects = Vec::new();
        if let Some(cached) = state.outline_cache.get(&object_id) {
            let style = state.current_style();
            let outline = cached.with_style(style);
            self.check_area(source, &outline, object_id);
            let state = self.sources.get_mut(&source).expect("source exists");
            state.outline = Some(outline.clone());
            state.outline_id = Some(object_id);
            if state.show_outline {
                effects.push(QueryEffect::ShowOutline(source, outline));
            }
        } else if !state.active_queries.contains_key(&object_id) {
            let seq = ClickSeq(self.seq);
            state.active_queries.insert(object_id, seq);
            effects.push(QueryEffect::FetchGeometry {
                source,
                object_id,
                seq,
            });
        }
        effects
    }

    /// Geometry response for one feature. Success caches the outline and
    /// attaches it if the toggle is on; failure turns the source off.
    pub fn handle_geometry_response(
        &mut self,
        source: NodeId,
        object_id: i64,
        seq: ClickSeq,
        response: Result<GeometryQueryResponse, String>,
    ) -> Vec<QueryEffect> {
        let Some(state) = self.sources.get_mut(&source) else {
            return Vec::new();
        };
        state.active_queries.remove(&object_id);

        let response = match response {
            Ok(response) => response,
            Err(error) => {
                log::error!("geometry fetch for feature {} failed: {}", object_id, error);
                let mut effects = self.disable_source(source);
                effects.push(QueryEffect::DisableSource(source));
                return effects;
            }
        };

        let Some(geometry) = response
            .features
            .into_iter()
            .find_map(|feature| feature.geometry)
        else {
            return Vec::new();
        };

        // The cache keeps the outline under the style `show` computed when
        // the fetch was issued; display-time styling is applied on top.
        let base_style = state.result.as_ref().map(|r| r.style).unwrap_or_default();
        let outline = OutlineLayer::from_esri(&geometry, base_style);
        state.outline_cache.insert(object_id, outline.clone());

        // Only attach when this feature is still the one displayed. A stale
        // token with the same feature still up means the user may have
        // recolored meanwhile, so the then-current style wins.
        if state.shown_object_id() != Some(object_id) {
            return Vec::new();
        }
        let style = if seq.0 != self.seq {
            state.current_style()
        } else {
            let mut style = base_style;
            if let Some(color) = state.color_override {
                style.color = color;
            }
            style
        };
        let outline = outline.with_style(style);
        self.check_area(source, &outline, object_id);

        let state = self.sources.get_mut(&source).expect("source exists");
        state.outline = Some(outline.clone());
        state.outline_id = Some(object_id);
        if state.show_outline {
            vec![QueryEffect::ShowOutline(source, outline)]
        } else {
            Vec::new()
        }
    }

    /// Compare the outline's geodesic area against the server-reported
    /// acreage, when the source declares one.
    fn check_area(&mut self, source: NodeId, outline: &OutlineLayer, object_id: i64) {
        let Some(state) = self.sources.get_mut(&source) else {
            return;
        };
        let Some(field) = state.query.acreage_field.clone() else {
            return;
        };
        let Some(result) = state.result.as_mut() else {
            return;
        };
        let Some(attributes) = result.features.get(result.shown) else {
            return;
        };
        if attributes.get(&state.query.object_id_field).and_then(|v| v.as_i64())
            != Some(object_id)
        {
            return;
        }
        let reported = attributes.get_f64(&field);
        let computed: f64 = outline
            .rings
            .iter()
            .map(|ring| {
                let points: Vec<Vec<f64>> = ring
                    .iter()
                    .map(|c| vec![c.longitude(), c.latitude()])
                    .collect();
                ring_area(&points)
            })
            .sum();
        result.area_mismatch = acreage_mismatch(computed, reported);
        if result.area_mismatch {
            log::warn!(
                "feature {} area differs from reported {} acres by more than 2%",
                object_id,
                reported
            );
        }
    }

    /// Live recolor: a fixed color that persists across subsequent displays
    /// of this source until cleared.
    pub fn set_color_override(
        &mut self,
        source: NodeId,
        color: Option<Color32>,
    ) -> Vec<QueryEffect> {
        let Some(state) = self.sources.get_mut(&source) else {
            return Vec::new();
        };
        state.color_override = color;
        let style = state.current_style();
        if let Some(outline) = state.outline.as_mut() {
            *outline = outline.with_style(style);
            if state.show_outline {
                return vec![QueryEffect::ShowOutline(source, outline.clone())];
            }
        }
        Vec::new()
    }

    pub fn color_override(&self, source: NodeId) -> Option<Color32> {
        self.sources.get(&source)?.color_override
    }

    /// Outline display toggle, separate from query participation.
    pub fn set_show_outline(&mut self, source: NodeId, on: bool) -> Vec<QueryEffect> {
        let Some(state) = self.sources.get_mut(&source) else {
            return Vec::new();
        };
        state.show_outline = on;
        match (&state.outline, on) {
            (Some(outline), true) => vec![QueryEffect::ShowOutline(source, outline.clone())],
            (Some(_), false) => vec![QueryEffect::RemoveOutline(source)],
            _ => Vec::new(),
        }
    }

    pub fn show_outline(&self, source: NodeId) -> bool {
        self.sources
            .get(&source)
            .map(|s| s.show_outline)
            .unwrap_or(false)
    }

    /// Popup content and pager position (1-based page, total pages) for the
    /// source's current result, if any.
    pub fn popup(&self, source: NodeId) -> Option<(&PopupContent, usize, usize)> {
        let result = self.sources.get(&source)?.result.as_ref()?;
        Some((&result.popup, result.shown + 1, result.pages))
    }

    pub fn area_mismatch(&self, source: NodeId) -> bool {
        self.sources
            .get(&source)
            .and_then(|s| s.result.as_ref())
            .map(|r| r.area_mismatch)
            .unwrap_or(false)
    }

    pub fn outline_bounds(&self, source: NodeId) -> Option<crate::map::bounds::GeoBounds> {
        self.sources.get(&source)?.outline.as_ref()?.bounds
    }

    /// Sources with a displayable result, for the shell's popup region.
    pub fn sources_with_results(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .sources
            .iter()
            .filter(|(_, s)| s.result.is_some())
            .map(|(&id, _)| id)
            .collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::popup::{PopupContent, PopupStyle};
    use crate::maps_api::arcgis::FeatureValue;

    fn show_test(popup: &mut PopupContent, attributes: &Attributes) -> PopupStyle {
        popup.set_text([attributes.get_str("NAME")]);
        PopupStyle::Color(Color32::from_rgb(0, 128, 0))
    }

    fn query_spec() -> QuerySpec {
        QuerySpec::new("https://host/FeatureServer/0", "boldtext|br|ztf", show_test)
            .fields(["OBJECTID", "NAME"])
    }

    fn source() -> NodeId {
        NodeId(7)
    }

    fn engine() -> QueryEngine {
        let mut engine = QueryEngine::new();
        engine.enable_source(source(), query_spec());
        engine
    }

    fn attributes(id: i64, name: &str) -> serde_json::Value {
        serde_json::json!({"attributes": {"OBJECTID": id, "NAME": name}})
    }

    fn response(features: &[(i64, &str)]) -> AttributeQueryResponse {
        let features: Vec<serde_json::Value> =
            features.iter().map(|(id, name)| attributes(*id, name)).collect();
        serde_json::from_value(serde_json::json!({ "features": features })).unwrap()
    }

    fn geometry(object_id: i64) -> GeometryQueryResponse {
        serde_json::from_value(serde_json::json!({
            "geometryType": "esriGeometryPolygon",
            "features": [{
                "attributes": {"OBJECTID": object_id},
                "geometry": {"rings": [[[-119.0, 37.0], [-119.0, 38.0], [-118.0, 38.0], [-119.0, 37.0]]]}
            }]
        }))
        .unwrap()
    }

    fn click(engine: &mut QueryEngine) -> ClickSeq {
        let (seq, requests, _) = engine.begin_click(Coordinate::new(37.5, -118.5));
        assert_eq!(requests.len(), 1);
        seq
    }

    #[test]
    fn stale_response_is_dropped_unconditionally() {
        let mut e = engine();
        let first = click(&mut e);
        let second = click(&mut e);
        assert_ne!(first, second);

        // The first click's late response produces no visible change.
        assert!(e
            .handle_attribute_response(source(), first, response(&[(1, "Old")]))
            .is_empty());
        assert!(e.popup(source()).is_none());

        let effects = e.handle_attribute_response(source(), second, response(&[(2, "New")]));
        let (popup, page, pages) = e.popup(source()).unwrap();
        assert_eq!(popup.text(0), "New");
        assert_eq!((page, pages), (1, 1));
        assert!(matches!(
            effects[0],
            QueryEffect::FetchGeometry { object_id: 2, .. }
        ));
    }

    #[test]
    fn empty_or_absent_feature_lists_do_nothing() {
        let mut e = engine();
        let seq = click(&mut e);
        assert!(e
            .handle_attribute_response(source(), seq, response(&[]))
            .is_empty());
        assert!(e
            .handle_attribute_response(source(), seq, AttributeQueryResponse::default())
            .is_empty());
        assert!(e.popup(source()).is_none());
    }

    #[test]
    fn three_feature_stepper_wraps_both_directions() {
        let mut e = engine();
        let seq = click(&mut e);
        e.handle_attribute_response(source(), seq, response(&[(1, "A"), (2, "B"), (3, "C")]));

        let page = |e: &QueryEngine| {
            let (popup, page, pages) = e.popup(source()).unwrap();
            (popup.text(0).to_string(), page, pages)
        };
        assert_eq!(page(&e), ("A".to_string(), 1, 3));
        e.step(source(), 1);
        assert_eq!(page(&e), ("B".to_string(), 2, 3));
        e.step(source(), 1);
        assert_eq!(page(&e), ("C".to_string(), 3, 3));
        e.step(source(), 1);
        assert_eq!(page(&e), ("A".to_string(), 1, 3));
        e.step(source(), -1);
        assert_eq!(page(&e), ("C".to_string(), 3, 3));
    }

    #[test]
    fn display_count_is_capped_at_99() {
        let mut e = engine();
        let seq = click(&mut e);
        let many: Vec<(i64, String)> = (1..=150).map(|i| (i, format!("F{}", i))).collect();
        let many_refs: Vec<(i64, &str)> = many.iter().map(|(i, n)| (*i, n.as_str())).collect();
        e.handle_attribute_response(source(), seq, response(&many_refs));
        let (_, page, pages) = e.popup(source()).unwrap();
        assert_eq!((page, pages), (1, 99));

        // Stepping backward from page 1 wraps to 99, not 150.
        e.step(source(), -1);
        let (popup, page, _) = e.popup(source()).unwrap();
        assert_eq!(page, 99);
        assert_eq!(popup.text(0), "F99");
    }

    #[test]
    fn concurrent_geometry_requests_for_one_feature_deduplicate() {
        let mut e = engine();
        let seq = click(&mut e);
        let effects =
            e.handle_attribute_response(source(), seq, response(&[(5, "A"), (6, "B")]));
        assert_eq!(
            effects
                .iter()
                .filter(|e| matches!(e, QueryEffect::FetchGeometry { .. }))
                .count(),
            1
        );

        // Paging away and back while the fetch is outstanding must not issue
        // a second request for feature 5.
        e.step(source(), 1);
        let effects = e.step(source(), -1);
        assert!(effects
            .iter()
            .all(|e| !matches!(e, QueryEffect::FetchGeometry { object_id: 5, .. })));

        // Once resolved, both triggers see the same cached outline.
        let effects = e.handle_geometry_response(source(), 5, seq, Ok(geometry(5)));
        assert!(matches!(effects[0], QueryEffect::ShowOutline(_, _)));
        e.step(source(), 1);
        let effects = e.step(source(), -1);
        assert!(matches!(effects[0], QueryEffect::ShowOutline(_, _)));
        assert!(effects
            .iter()
            .all(|e| !matches!(e, QueryEffect::FetchGeometry { .. })));
    }

    #[test]
    fn geometry_failure_disables_the_source() {
        let mut e = engine();
        let seq = click(&mut e);
        e.handle_attribute_response(source(), seq, response(&[(9, "X")]));
        let effects =
            e.handle_geometry_response(source(), 9, seq, Err("503".to_string()));
        assert!(effects.contains(&QueryEffect::DisableSource(source())));
        assert!(!e.is_enabled(source()));
    }

    #[test]
    fn new_click_clears_all_displayed_results() {
        let mut e = engine();
        let seq = click(&mut e);
        e.handle_attribute_response(source(), seq, response(&[(1, "A")]));
        e.handle_geometry_response(source(), 1, seq, Ok(geometry(1)));

        let (_, _, effects) = e.begin_click(Coordinate::new(36.0, -119.0));
        assert_eq!(effects, vec![QueryEffect::RemoveOutline(source())]);
        assert!(e.popup(source()).is_none());
    }

    #[test]
    fn stale_geometry_for_the_still_displayed_feature_uses_current_style() {
        let mut e = engine();
        let first = click(&mut e);
        e.handle_attribute_response(source(), first, response(&[(4, "A")]));

        // A second click at the same spot lands on the same feature; the
        // in-flight fetch from the first click is reused.
        let second = click(&mut e);
        let effects = e.handle_attribute_response(source(), second, response(&[(4, "A")]));
        assert!(effects.is_empty(), "fetch already in flight: {:?}", effects);

        // The user recolors while waiting.
        let override_color = Color32::from_rgb(255, 0, 255);
        e.set_color_override(source(), Some(override_color));

        // The geometry arrives carrying the first click's token.
        let effects = e.handle_geometry_response(source(), 4, first, Ok(geometry(4)));
        match &effects[0] {
            QueryEffect::ShowOutline(_, outline) => {
                assert_eq!(outline.style.color, override_color)
            }
            other => panic!("expected ShowOutline, got {:?}", other),
        }
    }

    #[test]
    fn color_override_persists_across_displays_until_cleared() {
        let mut e = engine();
        let purple = Color32::from_rgb(128, 0, 128);
        e.set_color_override(source(), Some(purple));

        let seq = click(&mut e);
        e.handle_attribute_response(source(), seq, response(&[(2, "A")]));
        let effects = e.handle_geometry_response(source(), 2, seq, Ok(geometry(2)));
        match &effects[0] {
            QueryEffect::ShowOutline(_, outline) => assert_eq!(outline.style.color, purple),
            other => panic!("expected ShowOutline, got {:?}", other),
        }

        // Cleared: the next display derives its color from `show` again,
        // served straight from the outline cache.
        e.set_color_override(source(), None);
        let seq = click(&mut e);
        let effects = e.handle_attribute_response(source(), seq, response(&[(2, "A")]));
        match &effects[0] {
            QueryEffect::ShowOutline(_, outline) => {
                assert_eq!(outline.style.color, Color32::from_rgb(0, 128, 0))
            }
            other => panic!("expected cached ShowOutline, got {:?}", other),
        }
    }

    #[test]
    fn outline_toggle_controls_attachment() {
        let mut e = engine();
        e.set_show_outline(source(), false);
        let seq = click(&mut e);
        e.handle_attribute_response(source(), seq, response(&[(3, "A")]));
        let effects = e.handle_geometry_response(source(), 3, seq, Ok(geometry(3)));
        assert!(effects.is_empty());

        // Turning the toggle on attaches the outline already built.
        let effects = e.set_show_outline(source(), true);
        assert!(matches!(effects[0], QueryEffect::ShowOutline(_, _)));
        let effects = e.set_show_outline(source(), false);
        assert_eq!(effects, vec![QueryEffect::RemoveOutline(source())]);
    }

    #[test]
    fn area_mismatch_flags_disagreement_with_reported_acreage() {
        let mut e = QueryEngine::new();
        let spec = QuerySpec::new("https://host/FeatureServer/0", "boldtext", show_test)
            .fields(["OBJECTID", "NAME", "Acreage"])
            .acreage_field("Acreage");
        e.enable_source(source(), spec);

        let seq = click(&mut e);
        let mut attrs = Attributes::default();
        attrs.insert("OBJECTID", FeatureValue::Int(1));
        attrs.insert("NAME", FeatureValue::String("X".to_string()));
        // Wildly wrong acreage for a ~0.5 degree triangle.
        attrs.insert("Acreage", FeatureValue::Double(1.0));
        let response = AttributeQueryResponse {
            features: Some(vec![crate::maps_api::arcgis::QueriedFeature {
                attributes: attrs,
            }]),
            exceeded_transfer_limit: None,
        };
        e.handle_attribute_response(source(), seq, response);
        e.handle_geometry_response(source(), 1, seq, Ok(geometry(1)));
        assert!(e.area_mismatch(source()));
    }
}
