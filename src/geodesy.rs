// Geodesy module - distances, bearings and the viewer-local scene frame
//
// Provides:
// - great-circle distance and initial bearing on a spherical Earth
// - projection of an aircraft position into the viewer's local scene frame
//
// Local scene frame (consumed by the host scene graph):
//   +X = east, +Y = up, +Z = south
// Rotation is about +Y, in radians.

use std::f64::consts::PI;

use crate::constants::{EARTH_RADIUS_M, HORIZONTAL_SCALE, VERTICAL_SCALE};

/// Degrees to radians conversion factor
const DTOR: f64 = PI / 180.0;

/// Radians to degrees conversion factor
const RTOD: f64 = 180.0 / PI;

/// A geodetic position: latitude/longitude in degrees, altitude in metres
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64, alt: f64) -> Self {
        GeoPoint { lat, lon, alt }
    }
}

/// Scene units per metre, horizontal and vertical are tuned independently
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionScale {
    pub horizontal: f64,
    pub vertical: f64,
}

impl Default for ProjectionScale {
    fn default() -> Self {
        ProjectionScale {
            horizontal: HORIZONTAL_SCALE,
            vertical: VERTICAL_SCALE,
        }
    }
}

/// Offset (x = east, y = up, z = south) and rotation about the up axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub offset: [f64; 3],
    pub rotation: f64,
}

impl Placement {
    /// Length of the horizontal (x/z) part of the offset
    pub fn horizontal_magnitude(&self) -> f64 {
        self.offset[0].hypot(self.offset[2])
    }
}

/// Returns great-circle distance in metres between two points (haversine, altitude ignored)
///
/// Accurate to well under a metre at the tens-of-kilometres scale the feed covers.
///
/// # Example
/// ```
/// let d = flight_ar::geodesy::haversine_distance(51.5074, -0.1278, 48.8566, 2.3522);
/// assert!((d - 343_500.0).abs() < 2_000.0);
/// ```
pub fn haversine_distance(lat0: f64, lon0: f64, lat1: f64, lon1: f64) -> f64 {
    let lat0_rad = lat0 * DTOR;
    let lat1_rad = lat1 * DTOR;
    let dlat = (lat1 - lat0) * DTOR;
    let dlon = (lon1 - lon0) * DTOR;

    let a = (dlat / 2.0).sin().powi(2)
        + lat0_rad.cos() * lat1_rad.cos() * (dlon / 2.0).sin().powi(2);

    // clamp guards against a > 1 from rounding on antipodal points
    2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
}

/// Initial bearing in degrees [0, 360) from point 0 towards point 1
///
/// Coincident points give atan2(0, 0) = 0, i.e. due north.
pub fn initial_bearing(lat0: f64, lon0: f64, lat1: f64, lon1: f64) -> f64 {
    let lat0_rad = lat0 * DTOR;
    let lat1_rad = lat1 * DTOR;
    let dlon = (lon1 - lon0) * DTOR;

    let y = dlon.sin() * lat1_rad.cos();
    let x = lat0_rad.cos() * lat1_rad.sin() - lat0_rad.sin() * lat1_rad.cos() * dlon.cos();

    (y.atan2(x) * RTOD).rem_euclid(360.0)
}

/// Point reached travelling `distance` metres from (lat, lon) on initial `bearing` degrees
///
/// Inverse of `haversine_distance` + `initial_bearing`; returns (lat, lon) in degrees.
pub fn destination_point(lat: f64, lon: f64, distance: f64, bearing: f64) -> (f64, f64) {
    let lat_rad = lat * DTOR;
    let lon_rad = lon * DTOR;
    let brg = bearing * DTOR;
    let delta = distance / EARTH_RADIUS_M;

    let lat2 = (lat_rad.sin() * delta.cos() + lat_rad.cos() * delta.sin() * brg.cos()).asin();
    let lon2 = lon_rad
        + (brg.sin() * delta.sin() * lat_rad.cos()).atan2(delta.cos() - lat_rad.sin() * lat2.sin());

    (lat2 * RTOD, (lon2 * RTOD + 540.0).rem_euclid(360.0) - 180.0)
}

/// Rotation about +Y for a nose heading in degrees clockwise from north.
///
/// rotation = PI - (heading_rad - PI). Getting this off by PI points the model backwards.
pub fn heading_rotation(heading: f64) -> f64 {
    PI - ((heading * DTOR) - PI)
}

/// Project `target` into the scene frame centred on `reference`
///
/// Vertical offset depends only on the target altitude, the reference altitude is not subtracted.
pub fn project(target: &GeoPoint, heading: f64, reference: &GeoPoint, scale: &ProjectionScale) -> Placement {
    let distance = haversine_distance(reference.lat, reference.lon, target.lat, target.lon);
    let bearing = initial_bearing(reference.lat, reference.lon, target.lat, target.lon) * DTOR;

    let east = distance * bearing.sin() * scale.horizontal;
    let north = distance * bearing.cos() * scale.horizontal;
    let up = target.alt * scale.vertical;

    Placement {
        offset: [east, up, -north],
        rotation: heading_rotation(heading),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-6; // Tolerance for floating point comparisons

    #[test]
    fn test_haversine_london_paris() {
        let dist = haversine_distance(51.5074, -0.1278, 48.8566, 2.3522);

        // Should be approximately 344 km
        assert!((dist - 344000.0).abs() < 5000.0, "Distance: {} meters", dist);
    }

    #[test]
    fn test_haversine_same_point() {
        let dist = haversine_distance(51.5, -0.1, 51.5, -0.1);
        assert!(dist.abs() < EPSILON);
    }

    #[test]
    fn test_bearing_cardinal() {
        assert!((initial_bearing(0.0, 0.0, 1.0, 0.0) - 0.0).abs() < EPSILON);
        assert!((initial_bearing(0.0, 0.0, 0.0, 1.0) - 90.0).abs() < EPSILON);
        assert!((initial_bearing(1.0, 0.0, 0.0, 0.0) - 180.0).abs() < EPSILON);
        assert!((initial_bearing(0.0, 1.0, 0.0, 0.0) - 270.0).abs() < EPSILON);
    }

    #[test]
    fn test_bearing_coincident_is_zero() {
        assert_eq!(initial_bearing(43.47, -80.54, 43.47, -80.54), 0.0);
    }

    #[test]
    fn test_project_coincident_points() {
        let reference = GeoPoint::new(43.4729, -80.5402, 320.0);
        for scale in [ProjectionScale::default(), ProjectionScale { horizontal: 1.0 / 140.0, vertical: 1.0 / 20.0 }] {
            let target = GeoPoint::new(reference.lat, reference.lon, 0.0);
            let p = project(&target, 90.0, &reference, &scale);
            assert!(p.offset[0].abs() < EPSILON);
            assert!(p.offset[1].abs() < EPSILON);
            assert!(p.offset[2].abs() < EPSILON);

            // altitude offset only depends on target altitude
            let target = GeoPoint::new(reference.lat, reference.lon, 1000.0);
            let p = project(&target, 90.0, &reference, &scale);
            assert!(p.horizontal_magnitude() < EPSILON);
            assert!((p.offset[1] - 1000.0 * scale.vertical).abs() < EPSILON);
        }
    }

    #[test]
    fn test_project_axes() {
        let reference = GeoPoint::new(0.0, 0.0, 0.0);
        let scale = ProjectionScale { horizontal: 1.0, vertical: 1.0 };

        // due north -> negative z
        let north = project(&GeoPoint::new(0.1, 0.0, 0.0), 0.0, &reference, &scale);
        assert!(north.offset[0].abs() < 1e-6);
        assert!(north.offset[2] < 0.0);

        // due east -> positive x
        let east = project(&GeoPoint::new(0.0, 0.1, 0.0), 0.0, &reference, &scale);
        assert!(east.offset[0] > 0.0);
        assert!(east.offset[2].abs() < 1e-6);
    }

    #[test]
    fn test_heading_rotation() {
        assert!((heading_rotation(0.0) - 2.0 * PI).abs() < EPSILON);
        assert!((heading_rotation(180.0) - PI).abs() < EPSILON);
        assert!((heading_rotation(90.0) - 1.5 * PI).abs() < EPSILON);
    }

    #[test]
    fn test_bearing_distance_roundtrip() {
        let reference = GeoPoint::new(43.4729, -80.5402, 0.0);
        let scale = ProjectionScale::default();

        for &(distance, bearing) in &[(1_000.0, 10.0), (25_000.0, 45.0), (60_000.0, 200.0), (12_345.0, 359.0)] {
            let (lat, lon) = destination_point(reference.lat, reference.lon, distance, bearing);

            let d = haversine_distance(reference.lat, reference.lon, lat, lon);
            let b = initial_bearing(reference.lat, reference.lon, lat, lon);
            assert!((d - distance).abs() < 1e-3, "distance {} vs {}", d, distance);
            assert!((b - bearing).abs() < 1e-6, "bearing {} vs {}", b, bearing);

            // inverting the placement recovers distance and bearing
            let p = project(&GeoPoint::new(lat, lon, 0.0), 0.0, &reference, &scale);
            let east = p.offset[0] / scale.horizontal;
            let north = -p.offset[2] / scale.horizontal;
            assert!((east.hypot(north) - distance).abs() < 1e-3);
            let recovered = east.atan2(north).to_degrees().rem_euclid(360.0);
            assert!((recovered - bearing).abs() < 1e-6, "recovered {} vs {}", recovered, bearing);
        }
    }
}
