use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters, used for both the Web Mercator projection
/// and geodesic area sums.
pub const EARTH_RADIUS_M: f64 = 6378137.0;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Default for Coordinate {
    fn default() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
        }
    }
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct GeoBounds {
    south: f64, // minimum latitude
    west: f64,  // minimum longitude
    north: f64, // maximum latitude
    east: f64,  // maximum longitude
}

impl GeoBounds {
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    pub fn south(&self) -> f64 {
        self.south
    }

    pub fn west(&self) -> f64 {
        self.west
    }

    pub fn north(&self) -> f64 {
        self.north
    }

    pub fn east(&self) -> f64 {
        self.east
    }

    pub fn center(&self) -> Coordinate {
        Coordinate {
            latitude: (self.south + self.north) / 2.0,
            longitude: (self.west + self.east) / 2.0,
        }
    }

    pub fn contains(&self, other: &GeoBounds) -> bool {
        self.south <= other.south
            && self.west <= other.west
            && self.north >= other.north
            && self.east >= other.east
    }

    pub fn intersects(&self, other: &GeoBounds) -> bool {
        self.south <= other.north
            && self.north >= other.south
            && self.west <= other.east
            && self.east >= other.west
    }

    /// Smallest bounds covering both `self` and `other`.
    pub fn union(&self, other: &GeoBounds) -> GeoBounds {
        GeoBounds {
            south: self.south.min(other.south),
            west: self.west.min(other.west),
            north: self.north.max(other.north),
            east: self.east.max(other.east),
        }
    }

    /// Grow the bounds in place to cover a single coordinate.
    pub fn extend(&mut self, point: &Coordinate) {
        self.south = self.south.min(point.latitude);
        self.west = self.west.min(point.longitude);
        self.north = self.north.max(point.latitude);
        self.east = self.east.max(point.longitude);
    }

    pub fn from_point(point: &Coordinate) -> Self {
        Self {
            south: point.latitude,
            west: point.longitude,
            north: point.latitude,
            east: point.longitude,
        }
    }

    /// Geographic bounds of a Web Mercator tile at x/y/zoom.
    pub fn from_x_y_zoom(x: u32, y: u32, zoom: u32) -> Self {
        let n = 2.0_f64.powi(zoom as i32);

        let west = x as f64 / n * 360.0 - 180.0;
        let east = (x as f64 + 1.0) / n * 360.0 - 180.0;

        // Latitudes come from the inverse Mercator projection.
        let lat_rad_north = ((std::f64::consts::PI * (1.0 - 2.0 * y as f64 / n)).sinh()).atan();
        let lat_rad_south =
            ((std::f64::consts::PI * (1.0 - 2.0 * (y as f64 + 1.0) / n)).sinh()).atan();

        GeoBounds {
            south: lat_rad_south.to_degrees(),
            west,
            north: lat_rad_north.to_degrees(),
            east,
        }
    }
}

/// Web Mercator bounding box of a tile in projected meters, as required by
/// ArcGIS export endpoints (`bboxSR=102113`). The tile grid origin sits at
/// -pi*R on both axes and a tile spans circumference / 2^zoom meters.
pub fn tile_mercator_bbox(x: u32, y: u32, zoom: u32) -> (f64, f64, f64, f64) {
    let half_circumference = std::f64::consts::PI * EARTH_RADIUS_M;
    let tile_meters = 2.0 * half_circumference / 2.0_f64.powi(zoom as i32);

    let xmin = -half_circumference + x as f64 * tile_meters;
    let ymax = half_circumference - y as f64 * tile_meters;

    (xmin, ymax - tile_meters, xmin + tile_meters, ymax)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn zoom_zero_tile_spans_the_world() {
        let bounds = GeoBounds::from_x_y_zoom(0, 0, 0);
        assert_relative_eq!(bounds.west(), -180.0);
        assert_relative_eq!(bounds.east(), 180.0);
        // Web Mercator clips latitude at ~85.05
        assert_relative_eq!(bounds.north(), 85.0511287798066, epsilon = 1e-9);
        assert_relative_eq!(bounds.south(), -85.0511287798066, epsilon = 1e-9);
    }

    #[test]
    fn mercator_bbox_origin_and_extent() {
        let half = std::f64::consts::PI * EARTH_RADIUS_M;
        let (xmin, ymin, xmax, ymax) = tile_mercator_bbox(0, 0, 0);
        assert_relative_eq!(xmin, -half);
        assert_relative_eq!(ymin, -half);
        assert_relative_eq!(xmax, half);
        assert_relative_eq!(ymax, half);

        // At zoom 1 the tile at (1, 0) covers the north-east quadrant.
        let (xmin, ymin, xmax, ymax) = tile_mercator_bbox(1, 0, 1);
        assert_relative_eq!(xmin, 0.0);
        assert_relative_eq!(ymin, 0.0);
        assert_relative_eq!(xmax, half);
        assert_relative_eq!(ymax, half);
    }

    #[test]
    fn union_covers_both_inputs() {
        let a = GeoBounds::new(37.0, -119.0, 38.0, -118.0);
        let b = GeoBounds::new(36.5, -118.5, 37.5, -117.5);
        let u = a.union(&b);
        assert!(u.contains(&a));
        assert!(u.contains(&b));
        assert_relative_eq!(u.south(), 36.5);
        assert_relative_eq!(u.east(), -117.5);
    }

    #[test]
    fn extend_from_point_grows_monotonically() {
        let mut bounds = GeoBounds::from_point(&Coordinate::new(37.0, -118.0));
        bounds.extend(&Coordinate::new(38.0, -119.0));
        assert_relative_eq!(bounds.north(), 38.0);
        assert_relative_eq!(bounds.west(), -119.0);
        assert_relative_eq!(bounds.south(), 37.0);
        assert_relative_eq!(bounds.east(), -118.0);
    }
}
