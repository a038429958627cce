//! Core data models for layover navigation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A bare coordinate on the route geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// A location fix received from the device sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lng: f64,
    /// Reported horizontal accuracy radius in meters.
    #[serde(default)]
    pub accuracy_m: f64,
    pub captured_at: DateTime<Utc>,
}

impl Position {
    pub fn new(lat: f64, lng: f64, accuracy_m: f64, captured_at: DateTime<Utc>) -> Self {
        Self {
            lat,
            lng,
            accuracy_m,
            captured_at,
        }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }
}

/// How a leg is traveled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    #[default]
    Walking,
    Transit,
    Driving,
    /// Anything the provider reports that we do not model.
    #[serde(other)]
    Unknown,
}

impl TravelMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TravelMode::Walking => "walking",
            TravelMode::Transit => "transit",
            TravelMode::Driving => "driving",
            TravelMode::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopRole {
    /// Where the itinerary begins, usually the airport.
    Start,
    /// An intermediate attraction or waypoint.
    Via,
    /// Where the itinerary ends, usually back at the airport.
    End,
}

/// A named place the itinerary visits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub name: String,
    pub location: GeoPoint,
    pub role: StopRole,
}

/// One mode-specific hop inside a segment.
///
/// Geometry is best-effort: a leg may carry a detailed path, only its
/// endpoints, or nothing at all. The matcher degrades gracefully through
/// those cases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    #[serde(default)]
    pub origin: Option<GeoPoint>,
    #[serde(default)]
    pub destination: Option<GeoPoint>,
    pub distance_m: f64,
    pub duration_secs: f64,
    #[serde(default)]
    pub mode: TravelMode,
    /// Decoded detailed geometry, when the provider returned one.
    #[serde(default)]
    pub path: Option<Vec<GeoPoint>>,
}

/// The stretch of the itinerary between two consecutive stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub legs: Vec<Leg>,
    pub distance_m: f64,
    pub duration_secs: f64,
}

impl Segment {
    /// Build a single-leg segment, taking totals from the leg.
    pub fn from_leg(leg: Leg) -> Self {
        Self {
            distance_m: leg.distance_m,
            duration_secs: leg.duration_secs,
            legs: vec![leg],
        }
    }
}

/// The planned itinerary the traveler is navigating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePlan {
    pub stops: Vec<Stop>,
    pub segments: Vec<Segment>,
    pub total_distance_m: f64,
    pub total_duration_secs: f64,
    /// Scheduled departure of the onward flight. Slack math always works
    /// from this original time; safety buffers are applied separately.
    #[serde(default)]
    pub scheduled_departure: Option<DateTime<Utc>>,
}

impl RoutePlan {
    /// The stop the whole itinerary returns to, normally the airport.
    pub fn final_stop(&self) -> Option<&Stop> {
        self.stops.last()
    }

    /// Refresh totals from per-segment figures after the plan is edited.
    pub fn recompute_totals(&mut self) {
        self.total_distance_m = self.segments.iter().map(|s| s.distance_m).sum();
        self.total_duration_secs = self.segments.iter().map(|s| s.duration_secs).sum();
    }
}

/// Where along the plan the traveler currently is.
///
/// Pure function of a plan and a position; recomputed per sample and
/// never stored between samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub segment_index: usize,
    pub leg_index: usize,
    /// Perpendicular distance from the fix to the matched geometry.
    pub distance_to_route_m: f64,
    pub traveled_m: f64,
    pub remaining_m: f64,
    /// Fraction of the total planned distance already covered, in [0, 1].
    pub ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviationStatus {
    /// On the route.
    Normal,
    /// Off the route, waiting out the debounce-in window.
    PendingDeviation,
    /// Confirmed off the route.
    Deviated,
    /// Back inside the corridor, waiting out the debounce-out window.
    Recovering,
}

/// Snapshot of the deviation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviationState {
    pub status: DeviationStatus,
    /// Live distance to the route, refreshed on every sample.
    pub distance_m: f64,
    /// When the current status began.
    pub since: DateTime<Utc>,
}

/// Record of one corrective-route request, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerouteAttempt {
    /// 1-based position in this session's attempt sequence.
    pub attempt_number: u32,
    pub requested_at: DateTime<Utc>,
    pub from: GeoPoint,
    /// Name of the stop the corrective route targets.
    pub to_stop: String,
    /// The corrective leg, `None` when the provider call failed.
    #[serde(default)]
    pub result_leg: Option<Leg>,
    /// Signed schedule impact versus the original plan, minutes.
    #[serde(default)]
    pub additional_minutes: Option<i64>,
}

/// Urgency buckets for the return-time alert, most severe first.
///
/// The derived ordering makes `Emergency` the smallest value, so
/// `level < AlertLevel::Safe` reads as "more urgent than safe".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Emergency,
    Urgent,
    Warning,
    Prepare,
    Safe,
}

impl AlertLevel {
    pub const COUNT: usize = 5;

    /// Stable index for per-level bookkeeping arrays.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Emergency and Urgent drive the one-shot emergency mode.
    pub fn is_critical(self) -> bool {
        matches!(self, AlertLevel::Emergency | AlertLevel::Urgent)
    }
}

/// The latest answer to "when do I need to head back?".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnInfo {
    pub level: AlertLevel,
    /// Minutes of freedom left after travel time and the safety buffer.
    pub slack_minutes: i64,
    /// Estimated minutes from the current position back to the airport.
    pub travel_time_minutes: i64,
    /// Minutes until the scheduled departure.
    pub remaining_minutes: i64,
    pub computed_at: DateTime<Utc>,
    /// Whether this computation passed the per-level alert cooldown.
    pub should_alert: bool,
}
