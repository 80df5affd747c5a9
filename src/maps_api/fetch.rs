use std::error::Error;

use serde::de::DeserializeOwned;

use super::arcgis::{AttributeQueryResponse, GeoJsonFile, GeometryQueryResponse};
use crate::layers::factory::{urlencode, LayerKind};
use crate::layers::spec::QuerySpec;
use crate::map::bounds::{Coordinate, GeoBounds};
use crate::map::layer::MapTile;

pub type FetchResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// Attribute-only click query at a point: `returnGeometry=false`, the node's
/// field projection, and the declared ordering. Ties in response ordering are
/// exactly the server's `orderByFields`.
pub fn attribute_query_url(query: &QuerySpec, point: Coordinate) -> String {
    let mut url = format!(
        "{}/query?f=json&geometry={},{}&geometryType=esriGeometryPoint\
         &spatialRel=esriSpatialRelIntersects&inSR=4326&returnGeometry=false&outFields={}",
        query.url,
        point.longitude(),
        point.latitude(),
        query.query_fields.join(",")
    );
    if let Some(clause) = &query.where_clause {
        url.push_str("&where=");
        url.push_str(&urlencode(clause));
    }
    if let Some(order) = &query.order_by_fields {
        url.push_str("&orderByFields=");
        url.push_str(&urlencode(order));
    }
    url
}

/// Full-geometry fetch for one feature by identifier.
pub fn geometry_query_url(query: &QuerySpec, object_id: i64) -> String {
    format!(
        "{}/query?f=json&objectIds={}&outFields={}&returnGeometry=true&outSR=4326",
        query.url, object_id, query.object_id_field
    )
}

/// Shared HTTP client for every remote service the layer tree points at.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    client: reqwest::Client,
}

impl Default for ServiceClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> FetchResult<T> {
        log::debug!("fetching {}", url);
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(format!("{} returned {}", url, response.status()).into());
        }
        Ok(response.json::<T>().await?)
    }

    pub async fn query_attributes(
        &self,
        query: &QuerySpec,
        point: Coordinate,
    ) -> FetchResult<AttributeQueryResponse> {
        self.fetch_json(&attribute_query_url(query, point)).await
    }

    pub async fn fetch_geometry(
        &self,
        query: &QuerySpec,
        object_id: i64,
    ) -> FetchResult<GeometryQueryResponse> {
        self.fetch_json(&geometry_query_url(query, object_id)).await
    }

    /// Load a GeoJSON overlay file, from disk for bundled relative paths or
    /// over HTTP for remote ones.
    pub async fn fetch_geojson_file(&self, path: &str) -> FetchResult<GeoJsonFile> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return self.fetch_json(path).await;
        }
        log::debug!("reading {}", path);
        let bytes = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Fetch one rendered tile for a tile/WMS/export-image layer. Failures
    /// carry the request URL and status so the tile-load failure path can
    /// report something useful instead of a silent blank tile.
    pub async fn fetch_tile(
        &self,
        kind: &LayerKind,
        zoom: u32,
        x: u32,
        y: u32,
    ) -> FetchResult<MapTile> {
        let url = kind
            .tile_url(zoom, x, y)
            .ok_or("layer kind does not render tiles")?;
        log::debug!("fetching tile {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(format!("tile request {} failed: {}", url, response.status()).into());
        }
        let bytes = response.bytes().await?;

        let bounds = GeoBounds::from_x_y_zoom(x, y, zoom);
        Ok(MapTile::new(x, y, zoom, bounds, bytes.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::popup::{PopupContent, PopupStyle};
    use crate::maps_api::arcgis::Attributes;
    use egui::Color32;

    fn noop_show(_popup: &mut PopupContent, _attributes: &Attributes) -> PopupStyle {
        PopupStyle::Color(Color32::WHITE)
    }

    #[test]
    fn attribute_query_url_carries_documented_parameters() {
        let query = QuerySpec::new("https://host/FeatureServer/0", "text", noop_show)
            .fields(["OBJECTID", "NAME"])
            .order_by("NAME")
            .where_clause("MTFCC='G4020'");
        let url = attribute_query_url(&query, Coordinate::new(36.5786, -118.2923));
        assert!(url.starts_with("https://host/FeatureServer/0/query?f=json"));
        assert!(url.contains("geometry=-118.2923,36.5786"));
        assert!(url.contains("spatialRel=esriSpatialRelIntersects"));
        assert!(url.contains("inSR=4326"));
        assert!(url.contains("returnGeometry=false"));
        assert!(url.contains("outFields=OBJECTID,NAME"));
        assert!(url.contains("orderByFields=NAME"));
        assert!(url.contains("where=MTFCC%3D%27G4020%27"));
    }

    #[test]
    fn geometry_query_url_requests_one_feature_with_geometry() {
        let query = QuerySpec::new("https://host/FeatureServer/0", "text", noop_show);
        let url = geometry_query_url(&query, 42);
        assert!(url.contains("objectIds=42"));
        assert!(url.contains("returnGeometry=true"));
        assert!(url.contains("outSR=4326"));
    }
}
