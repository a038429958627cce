//! Demo itinerary and a walker that follows it.

use chrono::{DateTime, Utc};

use gateguard_core::models::{GeoPoint, Leg, RoutePlan, Segment, Stop, StopRole, TravelMode};
use gateguard_core::spatial::{haversine_distance, meters_to_lat, path_length_m};

const WALKING_SPEED_MPS: f64 = 1.4;

fn walking_leg(path: Vec<GeoPoint>) -> Leg {
    let distance_m = path_length_m(&path);
    Leg {
        origin: path.first().copied(),
        destination: path.last().copied(),
        distance_m,
        duration_secs: distance_m / WALKING_SPEED_MPS,
        mode: TravelMode::Walking,
        path: Some(path),
    }
}

/// A walkable layover loop: Schiphol out to the Amsterdamse Bos park
/// and back, roughly 4 km each way.
pub fn demo_plan(scheduled_departure: Option<DateTime<Utc>>) -> RoutePlan {
    let airport = GeoPoint::new(52.3105, 4.7683);
    let canal = GeoPoint::new(52.3142, 4.7901);
    let bridge = GeoPoint::new(52.3128, 4.8064);
    let park = GeoPoint::new(52.3119, 4.8222);

    let mut plan = RoutePlan {
        stops: vec![
            Stop {
                name: "Schiphol Airport".to_string(),
                location: airport,
                role: StopRole::Start,
            },
            Stop {
                name: "Amsterdamse Bos".to_string(),
                location: park,
                role: StopRole::Via,
            },
            Stop {
                name: "Schiphol Airport".to_string(),
                location: airport,
                role: StopRole::End,
            },
        ],
        segments: vec![
            Segment::from_leg(walking_leg(vec![airport, canal, bridge, park])),
            Segment::from_leg(walking_leg(vec![park, bridge, canal, airport])),
        ],
        total_distance_m: 0.0,
        total_duration_secs: 0.0,
        scheduled_departure,
    };
    plan.recompute_totals();
    plan
}

/// Shift a point sideways, in meters north of it.
pub fn offset_north(point: GeoPoint, meters: f64) -> GeoPoint {
    GeoPoint::new(point.lat + meters_to_lat(meters, point.lat), point.lng)
}

/// Walks the concatenated geometry of a plan at constant speed.
pub struct TripWalk {
    points: Vec<GeoPoint>,
    speed_mps: f64,
}

impl TripWalk {
    pub fn new(plan: &RoutePlan, speed_mps: f64) -> Self {
        let mut points: Vec<GeoPoint> = Vec::new();
        for segment in &plan.segments {
            for leg in &segment.legs {
                if let Some(path) = &leg.path {
                    for point in path {
                        if points.last() != Some(point) {
                            points.push(*point);
                        }
                    }
                }
            }
        }
        if points.is_empty() {
            points.extend(plan.stops.iter().map(|stop| stop.location));
        }
        if points.is_empty() {
            points.push(GeoPoint::new(0.0, 0.0));
        }

        Self {
            points,
            speed_mps: speed_mps.max(0.1),
        }
    }

    pub fn total_length_m(&self) -> f64 {
        path_length_m(&self.points)
    }

    pub fn duration_secs(&self) -> f64 {
        self.total_length_m() / self.speed_mps
    }

    /// Position after walking for `elapsed_secs`; clamps to the ends.
    pub fn position_at(&self, elapsed_secs: f64) -> GeoPoint {
        let mut remaining = self.speed_mps * elapsed_secs.max(0.0);
        let mut last = self.points[0];
        for window in self.points.windows(2) {
            let length = haversine_distance(window[0], window[1]);
            if length > 0.0 && remaining <= length {
                let t = remaining / length;
                return GeoPoint::new(
                    window[0].lat + (window[1].lat - window[0].lat) * t,
                    window[0].lng + (window[1].lng - window[0].lng) * t,
                );
            }
            remaining -= length;
            last = window[1];
        }
        last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_plan_is_a_closed_loop() {
        let plan = demo_plan(None);
        assert_eq!(plan.stops.len(), 3);
        assert_eq!(plan.segments.len(), 2);
        assert!(plan.total_distance_m > 6000.0);
        assert!(plan.total_duration_secs > 0.0);

        let start = plan.stops[0].location;
        let end = plan
            .final_stop()
            .map(|stop| stop.location)
            .expect("plan has stops");
        assert!(haversine_distance(start, end) < 1.0);
    }

    #[test]
    fn walker_starts_at_the_airport_and_finishes_there() {
        let plan = demo_plan(None);
        let walk = TripWalk::new(&plan, 1.4);

        let first = walk.position_at(0.0);
        assert!(haversine_distance(first, plan.stops[0].location) < 1.0);

        let last = walk.position_at(walk.duration_secs() + 600.0);
        assert!(haversine_distance(last, plan.stops[0].location) < 1.0);
    }

    #[test]
    fn walker_covers_distance_at_the_given_speed() {
        let plan = demo_plan(None);
        let walk = TripWalk::new(&plan, 2.0);

        let after_minute = walk.position_at(60.0);
        let covered = haversine_distance(walk.position_at(0.0), after_minute);
        // Straight-line displacement can only be shorter than the path.
        assert!(covered > 60.0 && covered <= 121.0);
    }

    #[test]
    fn offset_moves_north_by_the_requested_amount() {
        let point = GeoPoint::new(52.31, 4.77);
        let moved = offset_north(point, 80.0);
        let distance = haversine_distance(point, moved);
        assert!((distance - 80.0).abs() < 0.5);
        assert!(moved.lat > point.lat);
    }
}
