//! Deviation-triggered reroute orchestration.
//!
//! The engine decides *when* to reroute with the pure checks here, runs
//! the provider call on a spawned task, and splices the corrective leg
//! into the plan when the answer arrives. The splice replaces everything
//! between the traveler and the next stop; the rest of the itinerary
//! survives untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use gateguard_core::models::{
    DeviationState, DeviationStatus, GeoPoint, Leg, Position, Progress, RerouteAttempt, RoutePlan,
    Segment, Stop, StopRole, TravelMode,
};
use gateguard_core::spatial::haversine_distance;
use gateguard_directions::{DirectionsError, DirectionsProvider, RouteRequest};

use crate::config::RerouteConfig;

/// Label for the synthetic stop a spliced plan starts from.
const REROUTE_START_LABEL: &str = "Current location";

/// Everything captured at request time for one corrective-route call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerouteTicket {
    pub attempt_number: u32,
    pub requested_at: DateTime<Utc>,
    pub from: GeoPoint,
    pub target_name: String,
    pub target_location: GeoPoint,
    pub mode: TravelMode,
    /// Progress at request time; the splice targets this segment.
    pub progress: Progress,
    /// Planned duration of the whole original itinerary, for the
    /// schedule-impact estimate.
    pub plan_duration_secs: f64,
}

/// A corrective route ready to splice into the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerouteResult {
    pub leg: Leg,
    pub attempt: RerouteAttempt,
    /// Progress at request time; names the segment the splice replaces.
    pub progress: Progress,
    /// Floored-at-zero minutes the reroute costs against the schedule.
    pub delta_minutes: i64,
}

/// Should the engine ask the provider for a corrective route right now?
///
/// Yes only when the deviation is confirmed and has lasted the minimum
/// duration, the attempt budget is not exhausted, and we are not inside
/// the spatial-plus-temporal cooldown of the previous attempt.
pub fn should_suggest_reroute(
    deviation: &DeviationState,
    position: &Position,
    attempts: &[RerouteAttempt],
    config: &RerouteConfig,
    now: DateTime<Utc>,
) -> bool {
    if deviation.status != DeviationStatus::Deviated {
        return false;
    }
    if now - deviation.since < chrono::Duration::seconds(config.min_deviation_secs.max(0)) {
        return false;
    }
    if attempts.len() as u32 >= config.max_attempts {
        return false;
    }
    if let Some(last) = attempts.last() {
        let near = haversine_distance(last.from, position.point()) <= config.retry_radius_m;
        let recent =
            now - last.requested_at < chrono::Duration::seconds(config.cooldown_secs.max(0));
        if near && recent {
            debug!(
                attempt = last.attempt_number,
                "previous reroute attempt still cooling down"
            );
            return false;
        }
    }
    true
}

/// The stop a corrective route should aim for: the end of the segment
/// currently in progress, or the final stop when already on the last one.
pub fn resolve_next_stop<'a>(plan: &'a RoutePlan, progress: &Progress) -> Option<&'a Stop> {
    if plan.stops.is_empty() {
        return None;
    }
    let target = (progress.segment_index + 1).min(plan.stops.len() - 1);
    plan.stops.get(target)
}

impl RerouteTicket {
    /// Capture everything a provider call needs. `None` when the plan
    /// has no stops to aim for.
    pub fn prepare(
        plan: &RoutePlan,
        progress: &Progress,
        position: &Position,
        attempt_number: u32,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        let target = resolve_next_stop(plan, progress)?;
        let mode = plan
            .segments
            .get(progress.segment_index)
            .and_then(|segment| segment.legs.get(progress.leg_index))
            .map(|leg| leg.mode)
            .unwrap_or_default();

        Some(Self {
            attempt_number,
            requested_at: now,
            from: position.point(),
            target_name: target.name.clone(),
            target_location: target.location,
            mode,
            progress: *progress,
            plan_duration_secs: plan.total_duration_secs,
        })
    }
}

/// Signed schedule impact of a corrective leg, minutes.
///
/// Compares the corrective leg against the estimated remaining duration
/// of the original plan. Without progress the remainder is taken as half
/// the plan, a deliberately coarse mid-route guess.
pub fn estimate_additional_minutes(
    leg_duration_secs: f64,
    plan_duration_secs: f64,
    ratio: Option<f64>,
) -> i64 {
    let remaining_secs = match ratio {
        Some(ratio) => plan_duration_secs * (1.0 - ratio.clamp(0.0, 1.0)),
        None => plan_duration_secs / 2.0,
    };
    ((leg_duration_secs - remaining_secs) / 60.0).round() as i64
}

/// Ask the provider for a corrective route described by `ticket`.
///
/// Suspends on network I/O; the engine runs this on a spawned task so
/// position samples keep flowing while it is in flight.
pub async fn calculate_reroute(
    provider: &dyn DirectionsProvider,
    ticket: &RerouteTicket,
) -> Result<RerouteResult, DirectionsError> {
    let request = RouteRequest {
        origin: ticket.from,
        destination: ticket.target_location,
        mode: ticket.mode,
    };
    let summary = provider.route(request).await?;
    let leg = summary.into_leg(ticket.from, ticket.target_location, ticket.mode);

    let additional = estimate_additional_minutes(
        leg.duration_secs,
        ticket.plan_duration_secs,
        Some(ticket.progress.ratio),
    );

    Ok(RerouteResult {
        attempt: RerouteAttempt {
            attempt_number: ticket.attempt_number,
            requested_at: ticket.requested_at,
            from: ticket.from,
            to_stop: ticket.target_name.clone(),
            result_leg: Some(leg.clone()),
            additional_minutes: Some(additional),
        },
        progress: ticket.progress,
        // Time saved by a shortcut never inflates slack.
        delta_minutes: additional.max(0),
        leg,
    })
}

/// Record a failed attempt so it still counts against the budget.
pub fn failed_attempt(ticket: &RerouteTicket) -> RerouteAttempt {
    RerouteAttempt {
        attempt_number: ticket.attempt_number,
        requested_at: ticket.requested_at,
        from: ticket.from,
        to_stop: ticket.target_name.clone(),
        result_leg: None,
        additional_minutes: None,
    }
}

/// Splice a corrective leg into the current plan.
///
/// The new plan starts at the traveler's position, runs the corrective
/// leg to the targeted stop, and keeps every stop and segment after it.
/// Totals are recomputed; the scheduled departure is untouched.
pub fn apply_reroute(result: &RerouteResult, plan: &RoutePlan) -> RoutePlan {
    if plan.stops.is_empty() {
        return plan.clone();
    }
    // Stop i+1 terminates segment i.
    let target = (result.progress.segment_index + 1).min(plan.stops.len() - 1);

    let mut stops = Vec::with_capacity(plan.stops.len() - target + 1);
    stops.push(Stop {
        name: REROUTE_START_LABEL.to_string(),
        location: result.attempt.from,
        role: StopRole::Start,
    });
    for (index, stop) in plan.stops.iter().enumerate().skip(target) {
        let role = if index + 1 == plan.stops.len() {
            StopRole::End
        } else {
            StopRole::Via
        };
        stops.push(Stop {
            role,
            ..stop.clone()
        });
    }

    let mut segments = Vec::with_capacity(plan.segments.len().saturating_sub(target) + 1);
    segments.push(Segment::from_leg(result.leg.clone()));
    segments.extend(plan.segments.iter().skip(target).cloned());

    let mut replacement = RoutePlan {
        stops,
        segments,
        total_distance_m: 0.0,
        total_duration_secs: 0.0,
        scheduled_departure: plan.scheduled_departure,
    };
    replacement.recompute_totals();
    replacement
}
