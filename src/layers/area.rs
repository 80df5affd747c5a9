use crate::map::bounds::EARTH_RADIUS_M;
use crate::maps_api::arcgis::GeoJsonGeometry;

const SQ_METERS_PER_ACRE: f64 = 4046.8564224;

/// Signed spherical area of one ring in square meters, by the
/// spherical-excess line integral: for each consecutive vertex pair,
/// accumulate the longitude delta weighted by the sines of the latitudes,
/// then scale by R^2/2. A duplicated closing vertex is skipped.
pub fn ring_area(ring: &[Vec<f64>]) -> f64 {
    let mut n = ring.len();
    if n < 3 {
        return 0.0;
    }
    if ring[0] == ring[n - 1] {
        n -= 1;
    }
    if n < 3 {
        return 0.0;
    }

    let mut total = 0.0;
    for i in 0..n {
        let p1 = &ring[i];
        let p2 = &ring[(i + 1) % n];
        total += (p2[0] - p1[0]).to_radians()
            * (2.0 + p1[1].to_radians().sin() + p2[1].to_radians().sin());
    }
    total * EARTH_RADIUS_M * EARTH_RADIUS_M / 2.0
}

fn polygon_area(rings: &[Vec<Vec<f64>>]) -> f64 {
    // Outer ring plus signed hole contributions.
    rings.iter().map(|ring| ring_area(ring)).sum()
}

/// Geodesic area of a GeoJSON geometry in square meters. Non-areal
/// geometries contribute 0.
pub fn geojson_area(geometry: &GeoJsonGeometry) -> f64 {
    match geometry {
        GeoJsonGeometry::Polygon { coordinates } => polygon_area(coordinates),
        GeoJsonGeometry::MultiPolygon { coordinates } => {
            coordinates.iter().map(|polygon| polygon_area(polygon)).sum()
        }
        _ => 0.0,
    }
}

/// Compare a computed outline area against a server-reported acreage,
/// flagging disagreement beyond 2% relative error.
pub fn acreage_mismatch(computed_sq_m: f64, reported_acres: f64) -> bool {
    if reported_acres <= 0.0 {
        return false;
    }
    let computed_acres = computed_sq_m.abs() / SQ_METERS_PER_ACRE;
    (computed_acres - reported_acres).abs() / reported_acres > 0.02
}
