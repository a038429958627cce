//! Spatial math for map matching and distance calculations.

use crate::models::GeoPoint;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Precision used by the directions provider for encoded polylines.
const POLYLINE_PRECISION: u32 = 5;

/// Result of projecting a point onto a single line segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentProjection {
    /// Distance from the point to the closest point on the segment, meters.
    pub distance_m: f64,
    /// Fraction along the segment in [0, 1]; 0 for a degenerate segment.
    pub fraction: f64,
}

/// Result of projecting a point onto a polyline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathProjection {
    pub distance_m: f64,
    /// Fraction along the whole polyline in [0, 1], by cumulative length.
    pub fraction: f64,
}

/// Great-circle distance between two points in meters (Haversine formula).
pub fn haversine_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let dphi = (b.lat - a.lat).to_radians();
    let dlambda = (b.lng - a.lng).to_radians();
    let h = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().atan2((1.0 - h).sqrt())
}

// ==== ENU (East-North-Up) Coordinate Conversion ====
// These functions convert between meters and degrees using latitude-aware scaling.

/// Meters per degree of latitude at a given latitude (WGS84 approximation).
pub fn meters_per_deg_lat(lat_deg: f64) -> f64 {
    let lat_rad = lat_deg.to_radians();
    111_132.954 - 559.822 * (2.0 * lat_rad).cos() + 1.175 * (4.0 * lat_rad).cos()
        - 0.0023 * (6.0 * lat_rad).cos()
}

/// Meters per degree of longitude at a given latitude (WGS84 approximation).
pub fn meters_per_deg_lon(lat_deg: f64) -> f64 {
    let lat_rad = lat_deg.to_radians();
    111_412.84 * lat_rad.cos() - 93.5 * (3.0 * lat_rad).cos() + 0.118 * (5.0 * lat_rad).cos()
}

/// Convert a north/south offset in meters to degrees latitude.
pub fn meters_to_lat(meters: f64, ref_lat_deg: f64) -> f64 {
    let meters_per_deg = meters_per_deg_lat(ref_lat_deg).max(1e-9);
    meters / meters_per_deg
}

/// Convert an east/west offset in meters to degrees longitude.
/// Requires the reference latitude for proper scaling.
pub fn meters_to_lon(meters: f64, ref_lat_deg: f64) -> f64 {
    let meters_per_deg = meters_per_deg_lon(ref_lat_deg).max(1e-9);
    meters / meters_per_deg
}

/// Convert degrees latitude to meters using local scaling.
pub fn lat_to_meters(deg: f64, ref_lat_deg: f64) -> f64 {
    deg * meters_per_deg_lat(ref_lat_deg)
}

/// Convert degrees longitude to meters at a given latitude.
pub fn lon_to_meters(deg: f64, ref_lat_deg: f64) -> f64 {
    deg * meters_per_deg_lon(ref_lat_deg)
}

/// Project a point onto the segment from `a` to `b`.
///
/// Works in a local ENU frame anchored at the segment start, which is
/// accurate at city scale. The returned fraction is clamped to [0, 1],
/// so off-end positions resolve to the nearest endpoint.
pub fn project_onto_segment(a: GeoPoint, b: GeoPoint, point: GeoPoint) -> SegmentProjection {
    let ref_lat = a.lat;

    let px = lon_to_meters(point.lng - a.lng, ref_lat);
    let py = lat_to_meters(point.lat - a.lat, ref_lat);

    let sx = lon_to_meters(b.lng - a.lng, ref_lat);
    let sy = lat_to_meters(b.lat - a.lat, ref_lat);

    let seg_len_sq = sx * sx + sy * sy;

    if seg_len_sq < 0.0001 {
        // Segment is essentially a point
        return SegmentProjection {
            distance_m: (px * px + py * py).sqrt(),
            fraction: 0.0,
        };
    }

    // t = ((P-A) · (B-A)) / |B-A|²
    let t = ((px * sx + py * sy) / seg_len_sq).clamp(0.0, 1.0);

    let dx = px - t * sx;
    let dy = py - t * sy;

    SegmentProjection {
        distance_m: (dx * dx + dy * dy).sqrt(),
        fraction: t,
    }
}

/// Total length of a polyline in meters.
pub fn path_length_m(path: &[GeoPoint]) -> f64 {
    path.windows(2).map(|w| haversine_distance(w[0], w[1])).sum()
}

/// Find the closest point on a polyline to `point`.
///
/// Scans every segment and keeps the best projection; ties keep the
/// earliest segment so progress never jumps ahead on self-crossing
/// geometry. Returns `None` only for an empty polyline.
pub fn nearest_point_on_path(path: &[GeoPoint], point: GeoPoint) -> Option<PathProjection> {
    match path {
        [] => None,
        [only] => Some(PathProjection {
            distance_m: haversine_distance(*only, point),
            fraction: 0.0,
        }),
        _ => {
            let total = path_length_m(path);
            let mut covered = 0.0;
            let mut best: Option<PathProjection> = None;

            for pair in path.windows(2) {
                let projection = project_onto_segment(pair[0], pair[1], point);
                let seg_len = haversine_distance(pair[0], pair[1]);

                let closer = best
                    .map(|b| projection.distance_m < b.distance_m)
                    .unwrap_or(true);
                if closer {
                    let along = covered + projection.fraction * seg_len;
                    let fraction = if total > 0.0 {
                        (along / total).clamp(0.0, 1.0)
                    } else {
                        0.0
                    };
                    best = Some(PathProjection {
                        distance_m: projection.distance_m,
                        fraction,
                    });
                }

                covered += seg_len;
            }

            best
        }
    }
}

/// Decode a provider polyline string into points.
///
/// Malformed input decodes to an empty path rather than failing the
/// whole plan; callers treat an empty path as missing geometry.
pub fn decode_path(encoded: &str) -> Vec<GeoPoint> {
    if encoded.is_empty() {
        return Vec::new();
    }
    polyline::decode_polyline(encoded, POLYLINE_PRECISION)
        .map(|line| {
            line.coords()
                .map(|c| GeoPoint::new(c.y, c.x))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_known_distance() {
        // ~111km between these points (1 degree latitude)
        let dist = haversine_distance(GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 0.0));
        assert!((dist - 111_194.0).abs() < 100.0);
    }

    #[test]
    fn haversine_same_point() {
        let p = GeoPoint::new(52.3105, 4.7683);
        assert!(haversine_distance(p, p) < 0.001);
    }

    #[test]
    fn projection_hits_segment_interior() {
        let a = GeoPoint::new(52.0, 4.0);
        let b = GeoPoint::new(52.0, 4.0 + meters_to_lon(1000.0, 52.0));
        // 500m along, 30m north of the segment
        let point = GeoPoint::new(
            52.0 + meters_to_lat(30.0, 52.0),
            4.0 + meters_to_lon(500.0, 52.0),
        );

        let proj = project_onto_segment(a, b, point);
        assert!((proj.distance_m - 30.0).abs() < 1.0, "got {}", proj.distance_m);
        assert!((proj.fraction - 0.5).abs() < 0.01, "got {}", proj.fraction);
    }

    #[test]
    fn projection_clamps_past_the_end() {
        let a = GeoPoint::new(52.0, 4.0);
        let b = GeoPoint::new(52.0, 4.0 + meters_to_lon(100.0, 52.0));
        let past = GeoPoint::new(52.0, 4.0 + meters_to_lon(250.0, 52.0));

        let proj = project_onto_segment(a, b, past);
        assert_eq!(proj.fraction, 1.0);
        assert!((proj.distance_m - 150.0).abs() < 2.0, "got {}", proj.distance_m);
    }

    #[test]
    fn projection_of_degenerate_segment() {
        let a = GeoPoint::new(52.0, 4.0);
        let point = GeoPoint::new(52.0 + meters_to_lat(40.0, 52.0), 4.0);

        let proj = project_onto_segment(a, a, point);
        assert_eq!(proj.fraction, 0.0);
        assert!((proj.distance_m - 40.0).abs() < 1.0);
    }

    #[test]
    fn nearest_point_reports_global_fraction() {
        // L-shaped path: 1000m east then 1000m north.
        let corner_lng = 4.0 + meters_to_lon(1000.0, 52.0);
        let path = vec![
            GeoPoint::new(52.0, 4.0),
            GeoPoint::new(52.0, corner_lng),
            GeoPoint::new(52.0 + meters_to_lat(1000.0, 52.0), corner_lng),
        ];
        // Halfway up the second edge.
        let point = GeoPoint::new(52.0 + meters_to_lat(500.0, 52.0), corner_lng);

        let hit = nearest_point_on_path(&path, point).unwrap();
        assert!(hit.distance_m < 1.0, "got {}", hit.distance_m);
        assert!((hit.fraction - 0.75).abs() < 0.01, "got {}", hit.fraction);
    }

    #[test]
    fn nearest_point_on_empty_and_single_point_paths() {
        let point = GeoPoint::new(52.0, 4.0);
        assert!(nearest_point_on_path(&[], point).is_none());

        let anchor = GeoPoint::new(52.0 + meters_to_lat(80.0, 52.0), 4.0);
        let hit = nearest_point_on_path(&[anchor], point).unwrap();
        assert_eq!(hit.fraction, 0.0);
        assert!((hit.distance_m - 80.0).abs() < 1.0);
    }

    #[test]
    fn decode_path_round_trips_known_polyline() {
        // Classic example string from the polyline format docs.
        let points = decode_path("_p~iF~ps|U_ulLnnqC_mqNvxq`@");
        assert_eq!(points.len(), 3);
        assert!((points[0].lat - 38.5).abs() < 1e-6);
        assert!((points[0].lng - -120.2).abs() < 1e-6);
        assert!((points[2].lat - 43.252).abs() < 1e-6);
        assert!((points[2].lng - -126.453).abs() < 1e-6);
    }

    #[test]
    fn decode_path_tolerates_garbage() {
        assert!(decode_path("").is_empty());
        assert!(decode_path("\u{1}\u{2}").is_empty());
    }
}
