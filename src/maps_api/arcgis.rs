use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One attribute value as it appears in an ArcGIS `attributes` object or a
/// GeoJSON `properties` object. The services mix strings, numbers and nulls
/// freely, so the variants are resolved untagged.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Null,
}

impl FeatureValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FeatureValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::Double(v) => Some(*v),
            FeatureValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FeatureValue::Int(v) => Some(*v),
            FeatureValue::Double(v) => Some(*v as i64),
            _ => None,
        }
    }
}

/// Attribute map of a single remote feature.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Attributes(pub HashMap<String, FeatureValue>);

impl Attributes {
    pub fn get(&self, key: &str) -> Option<&FeatureValue> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> &str {
        self.0.get(key).and_then(|v| v.as_str()).unwrap_or("")
    }

    pub fn get_f64(&self, key: &str) -> f64 {
        self.0.get(key).and_then(|v| v.as_f64()).unwrap_or(0.0)
    }

    pub fn get_i64(&self, key: &str) -> i64 {
        self.0.get(key).and_then(|v| v.as_i64()).unwrap_or(0)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: FeatureValue) {
        self.0.insert(key.into(), value);
    }
}

/// Response to an attribute-only `/query` request (`returnGeometry=false`).
/// `features` is absent when the service answers with an error envelope
/// instead of a result set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttributeQueryResponse {
    pub features: Option<Vec<QueriedFeature>>,
    #[serde(rename = "exceededTransferLimit")]
    pub exceeded_transfer_limit: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueriedFeature {
    pub attributes: Attributes,
}

/// Response to a geometry-by-identifier `/query` request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeometryQueryResponse {
    #[serde(rename = "geometryType")]
    pub geometry_type: Option<String>,
    #[serde(default)]
    pub features: Vec<GeometryFeature>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeometryFeature {
    #[serde(default)]
    pub attributes: Attributes,
    pub geometry: Option<EsriGeometry>,
}

/// Esri JSON geometry. Polygons arrive as `rings`, polylines as `paths`,
/// points as bare x/y.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EsriGeometry {
    pub rings: Option<Vec<Vec<[f64; 2]>>>,
    pub paths: Option<Vec<Vec<[f64; 2]>>>,
    pub x: Option<f64>,
    pub y: Option<f64>,
}

/// GeoJSON geometry, restricted to the types the overlay files and query
/// services actually produce.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum GeoJsonGeometry {
    Point { coordinates: Vec<f64> },
    LineString { coordinates: Vec<Vec<f64>> },
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Vec<f64>>>> },
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeoJsonFeature {
    #[serde(default)]
    pub properties: Attributes,
    pub geometry: Option<GeoJsonGeometry>,
}

impl GeoJsonFeature {
    /// Name path routing this feature to its owning node, one segment per
    /// tree level, split from the `name` property.
    pub fn name_path(&self) -> Vec<&str> {
        let name = self.properties.get_str("name");
        if name.is_empty() {
            return Vec::new();
        }
        name.split('/').collect()
    }

    /// Bounds-policy flags; absent means "do not touch bounds".
    pub fn flags(&self) -> u64 {
        self.properties.get_i64("flags").max(0) as u64
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeoJsonFile {
    #[serde(default)]
    pub features: Vec<GeoJsonFeature>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_response_parses_mixed_value_types() {
        let raw = r#"{
            "features": [
                {"attributes": {"OBJECTID": 12, "NAME": "John Muir", "GIS_ACRES": 652793.5, "WSR": null}}
            ],
            "exceededTransferLimit": false
        }"#;
        let resp: AttributeQueryResponse = serde_json::from_str(raw).unwrap();
        let features = resp.features.unwrap();
        assert_eq!(features.len(), 1);
        let attrs = &features[0].attributes;
        assert_eq!(attrs.get_i64("OBJECTID"), 12);
        assert_eq!(attrs.get_str("NAME"), "John Muir");
        assert_eq!(attrs.get("WSR"), Some(&FeatureValue::Null));
    }

    #[test]
    fn error_envelope_yields_no_features() {
        let raw = r#"{"error": {"code": 400, "message": "Invalid query"}}"#;
        let resp: AttributeQueryResponse = serde_json::from_str(raw).unwrap();
        assert!(resp.features.is_none());
    }

    #[test]
    fn geojson_feature_name_path_and_flags() {
        let raw = r#"{
            "properties": {"name": "Emigrant Wilderness/Grizzly Peak", "flags": 3},
            "geometry": {"type": "Point", "coordinates": [-119.9, 38.2]}
        }"#;
        let feature: GeoJsonFeature = serde_json::from_str(raw).unwrap();
        assert_eq!(
            feature.name_path(),
            vec!["Emigrant Wilderness", "Grizzly Peak"]
        );
        assert_eq!(feature.flags(), 3);
    }

    #[test]
    fn esri_polygon_rings_parse() {
        let raw = r#"{
            "geometryType": "esriGeometryPolygon",
            "features": [{"attributes": {"OBJECTID": 5},
                          "geometry": {"rings": [[[-119.0, 37.0], [-119.0, 38.0], [-118.0, 38.0], [-119.0, 37.0]]]}}]
        }"#;
        let resp: GeometryQueryResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.geometry_type.as_deref(), Some("esriGeometryPolygon"));
        let rings = resp.features[0].geometry.as_ref().unwrap().rings.as_ref().unwrap();
        assert_eq!(rings[0].len(), 4);
    }
}
