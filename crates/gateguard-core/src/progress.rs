//! Map matching of live positions against the planned route.

use crate::models::{GeoPoint, Leg, Position, Progress, RoutePlan};
use crate::spatial::{self, PathProjection};

/// Best match found while scanning the plan's legs.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    segment_index: usize,
    leg_index: usize,
    distance_m: f64,
    fraction: f64,
    /// Nominal distance covered by everything before this leg.
    before_m: f64,
    leg_distance_m: f64,
}

/// Match a position against every leg of the plan and derive progress.
///
/// Scans all legs and keeps the one whose geometry passes closest to the
/// fix; ties keep the earliest leg in itinerary order. Traveled distance
/// is the nominal distance of everything before the matched leg plus the
/// matched fraction of that leg's nominal distance, so gaps in provider
/// geometry do not distort the ratio.
///
/// Returns `None` only when the plan has no segments. A plan whose legs
/// all lack geometry matches to the start of the route.
pub fn compute_progress(plan: &RoutePlan, position: &Position) -> Option<Progress> {
    if plan.segments.is_empty() {
        return None;
    }

    let point = position.point();
    let mut best: Option<Candidate> = None;
    let mut before_segment = 0.0;

    for (segment_index, segment) in plan.segments.iter().enumerate() {
        let mut within_segment = 0.0;
        for (leg_index, leg) in segment.legs.iter().enumerate() {
            if let Some(projection) = match_leg(leg, point) {
                let closer = best
                    .map(|b| projection.distance_m < b.distance_m)
                    .unwrap_or(true);
                if closer {
                    best = Some(Candidate {
                        segment_index,
                        leg_index,
                        distance_m: projection.distance_m,
                        fraction: projection.fraction,
                        before_m: before_segment + within_segment,
                        leg_distance_m: leg.distance_m,
                    });
                }
            }
            within_segment += leg.distance_m;
        }
        before_segment += segment.distance_m;
    }

    let total = plan.total_distance_m;
    let (segment_index, leg_index, distance_to_route_m, traveled_m) = match best {
        Some(c) => {
            let along = (c.leg_distance_m * c.fraction).clamp(0.0, c.leg_distance_m.max(0.0));
            (c.segment_index, c.leg_index, c.distance_m, c.before_m + along)
        }
        // No leg carried any geometry; answer as if still at the start.
        None => (0, 0, 0.0, 0.0),
    };

    let remaining_m = (total - traveled_m).max(0.0);
    let ratio = if total > 0.0 {
        (traveled_m / total).clamp(0.0, 1.0)
    } else {
        0.0
    };

    Some(Progress {
        segment_index,
        leg_index,
        distance_to_route_m,
        traveled_m,
        remaining_m,
        ratio,
    })
}

/// Project a point onto whatever geometry the leg carries.
///
/// Preference order: detailed path, then the origin→destination chord,
/// then a single known endpoint (distance only, zero traveled fraction).
/// A leg with no geometry at all yields `None` and is skipped.
fn match_leg(leg: &Leg, point: GeoPoint) -> Option<PathProjection> {
    if let Some(path) = leg.path.as_deref() {
        if path.len() >= 2 {
            return spatial::nearest_point_on_path(path, point);
        }
    }

    match (leg.origin, leg.destination) {
        (Some(a), Some(b)) => {
            let projection = spatial::project_onto_segment(a, b, point);
            Some(PathProjection {
                distance_m: projection.distance_m,
                fraction: projection.fraction,
            })
        }
        (Some(endpoint), None) | (None, Some(endpoint)) => Some(PathProjection {
            distance_m: spatial::haversine_distance(endpoint, point),
            fraction: 0.0,
        }),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Segment, Stop, StopRole, TravelMode};
    use crate::spatial::{meters_to_lat, meters_to_lon};
    use chrono::Utc;

    const LAT: f64 = 52.3;
    const LNG: f64 = 4.76;

    fn east(m: f64) -> f64 {
        LNG + meters_to_lon(m, LAT)
    }

    fn north(m: f64) -> f64 {
        LAT + meters_to_lat(m, LAT)
    }

    fn walking_leg(from: GeoPoint, to: GeoPoint, distance_m: f64) -> Leg {
        Leg {
            origin: Some(from),
            destination: Some(to),
            distance_m,
            duration_secs: distance_m / 1.4,
            mode: TravelMode::Walking,
            path: Some(vec![from, to]),
        }
    }

    fn stop(name: &str, location: GeoPoint, role: StopRole) -> Stop {
        Stop {
            name: name.to_string(),
            location,
            role,
        }
    }

    /// Two 1000m eastbound segments laid end to end.
    fn straight_plan() -> RoutePlan {
        let a = GeoPoint::new(LAT, LNG);
        let b = GeoPoint::new(LAT, east(1000.0));
        let c = GeoPoint::new(LAT, east(2000.0));
        let mut plan = RoutePlan {
            stops: vec![
                stop("Airport", a, StopRole::Start),
                stop("Museum", b, StopRole::Via),
                stop("Airport", c, StopRole::End),
            ],
            segments: vec![
                Segment::from_leg(walking_leg(a, b, 1000.0)),
                Segment::from_leg(walking_leg(b, c, 1000.0)),
            ],
            total_distance_m: 0.0,
            total_duration_secs: 0.0,
            scheduled_departure: None,
        };
        plan.recompute_totals();
        plan
    }

    fn fix(lat: f64, lng: f64) -> Position {
        Position::new(lat, lng, 5.0, Utc::now())
    }

    #[test]
    fn position_on_route_has_near_zero_distance() {
        let plan = straight_plan();
        let progress = compute_progress(&plan, &fix(LAT, east(500.0))).unwrap();

        assert!(progress.distance_to_route_m < 1.0, "got {}", progress.distance_to_route_m);
        assert_eq!(progress.segment_index, 0);
        assert!((progress.traveled_m - 500.0).abs() < 5.0);
        assert!((progress.ratio - 0.25).abs() < 0.005);
    }

    #[test]
    fn offset_position_reports_perpendicular_distance() {
        let plan = straight_plan();
        let progress = compute_progress(&plan, &fix(north(60.0), east(1500.0))).unwrap();

        assert!((progress.distance_to_route_m - 60.0).abs() < 2.0);
        assert_eq!(progress.segment_index, 1);
        assert!((progress.traveled_m - 1500.0).abs() < 10.0);
        assert!((progress.ratio - 0.75).abs() < 0.01);
    }

    #[test]
    fn matching_is_idempotent() {
        let plan = straight_plan();
        let position = fix(north(25.0), east(720.0));
        let first = compute_progress(&plan, &position).unwrap();
        let second = compute_progress(&plan, &position).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn ratio_is_monotonic_while_moving_forward() {
        let plan = straight_plan();
        let mut last_ratio = -1.0;
        for step in 0..=20 {
            let progress = compute_progress(&plan, &fix(LAT, east(step as f64 * 100.0))).unwrap();
            assert!(
                progress.ratio >= last_ratio,
                "ratio regressed at step {step}: {} < {last_ratio}",
                progress.ratio
            );
            last_ratio = progress.ratio;
        }
        assert!((last_ratio - 1.0).abs() < 1e-9);
    }

    #[test]
    fn past_the_final_stop_clamps_to_route_end() {
        let plan = straight_plan();
        let progress = compute_progress(&plan, &fix(LAT, east(2600.0))).unwrap();

        assert_eq!(progress.ratio, 1.0);
        assert_eq!(progress.remaining_m, 0.0);
        assert!((progress.distance_to_route_m - 600.0).abs() < 10.0);
    }

    #[test]
    fn ties_resolve_to_the_earliest_leg() {
        // Both segments reuse the same street geometry, so every position
        // matches them equally well; itinerary order must break the tie.
        let a = GeoPoint::new(LAT, LNG);
        let b = GeoPoint::new(LAT, east(1000.0));
        let mut plan = RoutePlan {
            stops: vec![
                stop("Airport", a, StopRole::Start),
                stop("Pier", b, StopRole::Via),
                stop("Airport", a, StopRole::End),
            ],
            segments: vec![
                Segment::from_leg(walking_leg(a, b, 1000.0)),
                Segment::from_leg(walking_leg(a, b, 1000.0)),
            ],
            total_distance_m: 0.0,
            total_duration_secs: 0.0,
            scheduled_departure: None,
        };
        plan.recompute_totals();

        let progress = compute_progress(&plan, &fix(north(15.0), east(300.0))).unwrap();
        assert_eq!(progress.segment_index, 0);
        assert_eq!(progress.leg_index, 0);
    }

    #[test]
    fn chord_fallback_when_path_is_missing() {
        let a = GeoPoint::new(LAT, LNG);
        let b = GeoPoint::new(LAT, east(1000.0));
        let mut leg = walking_leg(a, b, 1000.0);
        leg.path = None;
        let mut plan = RoutePlan {
            stops: vec![
                stop("Airport", a, StopRole::Start),
                stop("Cafe", b, StopRole::End),
            ],
            segments: vec![Segment::from_leg(leg)],
            total_distance_m: 0.0,
            total_duration_secs: 0.0,
            scheduled_departure: None,
        };
        plan.recompute_totals();

        let progress = compute_progress(&plan, &fix(north(20.0), east(400.0))).unwrap();
        assert!((progress.distance_to_route_m - 20.0).abs() < 2.0);
        assert!((progress.ratio - 0.4).abs() < 0.01);
    }

    #[test]
    fn geometry_free_plan_matches_route_start() {
        let bare_leg = Leg {
            origin: None,
            destination: None,
            distance_m: 2000.0,
            duration_secs: 1400.0,
            mode: TravelMode::Transit,
            path: None,
        };
        let mut plan = RoutePlan {
            stops: Vec::new(),
            segments: vec![Segment::from_leg(bare_leg)],
            total_distance_m: 0.0,
            total_duration_secs: 0.0,
            scheduled_departure: None,
        };
        plan.recompute_totals();

        let progress = compute_progress(&plan, &fix(LAT, LNG)).unwrap();
        assert_eq!(progress.segment_index, 0);
        assert_eq!(progress.traveled_m, 0.0);
        assert_eq!(progress.ratio, 0.0);
        assert_eq!(progress.remaining_m, 2000.0);
    }

    #[test]
    fn empty_plan_yields_no_progress() {
        let plan = RoutePlan {
            stops: Vec::new(),
            segments: Vec::new(),
            total_distance_m: 0.0,
            total_duration_secs: 0.0,
            scheduled_departure: None,
        };
        assert!(compute_progress(&plan, &fix(LAT, LNG)).is_none());
    }

    #[test]
    fn single_endpoint_leg_is_matchable_but_contributes_no_travel() {
        let anchor = GeoPoint::new(LAT, LNG);
        let half_blind_leg = Leg {
            origin: Some(anchor),
            destination: None,
            distance_m: 800.0,
            duration_secs: 600.0,
            mode: TravelMode::Walking,
            path: None,
        };
        let mut plan = RoutePlan {
            stops: Vec::new(),
            segments: vec![Segment::from_leg(half_blind_leg)],
            total_distance_m: 0.0,
            total_duration_secs: 0.0,
            scheduled_departure: None,
        };
        plan.recompute_totals();

        let progress = compute_progress(&plan, &fix(north(50.0), LNG)).unwrap();
        assert!((progress.distance_to_route_m - 50.0).abs() < 1.0);
        assert_eq!(progress.traveled_m, 0.0);
    }
}
