//! Outbound surface of the engine: broadcast events plus a
//! last-known-good snapshot for subscribers that join late.

use serde::{Deserialize, Serialize};

use gateguard_core::deviation::{AccuracyWarning, DeviationEvent};
use gateguard_core::models::{AlertLevel, DeviationState, Progress, ReturnInfo, RoutePlan};

/// One engine announcement. Serialized with a `type` tag so downstream
/// consumers can dispatch without knowing every variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NavEvent {
    /// A position sample was matched against the plan.
    ProgressUpdated { progress: Progress },
    /// A deviation was confirmed or recovered from. Intermediate
    /// debounce states never announce; they only show in the snapshot.
    DeviationChanged {
        state: DeviationState,
        message: String,
    },
    /// The latest fix is too imprecise to trust fully.
    AccuracyWarning {
        warning: AccuracyWarning,
        accuracy_m: f64,
    },
    /// A fresh return-time computation that cleared its level cooldown.
    ReturnInfoUpdated { info: ReturnInfo, message: String },
    /// Slack fell into a critical band for the first time this episode.
    EmergencyMode { slack_minutes: i64 },
    /// A corrective route was spliced into the plan.
    RouteReplaced {
        plan: RoutePlan,
        additional_minutes: i64,
    },
    /// A reroute attempt failed; it still counts against the budget.
    RerouteFailed { attempt_number: u32, reason: String },
    /// The attempt budget is exhausted; no more corrective routes.
    RerouteUnavailable,
}

/// Coalesced view of the trip, published on every change.
///
/// Fields hold the last known-good value; a lost sensor or a failed
/// refresh never blanks them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NavSnapshot {
    pub active: bool,
    pub progress: Option<Progress>,
    pub deviation: Option<DeviationState>,
    pub return_info: Option<ReturnInfo>,
    pub plan: Option<RoutePlan>,
}

/// Human-readable text for a confirmed or recovered deviation.
pub fn deviation_message(event: &DeviationEvent) -> String {
    match event {
        DeviationEvent::Confirmed { distance_m } => {
            format!(
                "You are about {:.0} m off the planned route. Looking for a way back.",
                distance_m
            )
        }
        DeviationEvent::Recovered => "You are back on the planned route.".to_string(),
    }
}

/// Human-readable text for a return-time alert.
pub fn return_message(info: &ReturnInfo) -> String {
    match info.level {
        AlertLevel::Safe => format!(
            "All clear. {} minutes of slack before you need to head back.",
            info.slack_minutes
        ),
        AlertLevel::Prepare => format!(
            "Start wrapping up. {} minutes of slack left.",
            info.slack_minutes
        ),
        AlertLevel::Warning => format!(
            "Time to head back. {} minutes of slack left.",
            info.slack_minutes
        ),
        AlertLevel::Urgent => format!(
            "Leave now. Only {} minutes of slack before your buffer is gone.",
            info.slack_minutes
        ),
        AlertLevel::Emergency => format!(
            "You may miss your departure. You are {} minutes short even before the airport buffer.",
            info.slack_minutes.abs()
        ),
    }
}
