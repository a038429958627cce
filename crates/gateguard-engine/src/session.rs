//! Mutable state for one guided trip.
//!
//! Owned exclusively by the engine task; nothing here is shared or
//! locked. Starting a new trip bumps the generation counter so results
//! from spawned work belonging to an earlier trip can be recognized and
//! discarded when they land.

use chrono::{DateTime, Utc};

use gateguard_core::deviation::{DeviationConfig, DeviationTracker};
use gateguard_core::models::{
    AlertLevel, DeviationState, GeoPoint, Position, Progress, RerouteAttempt, ReturnInfo, RoutePlan,
};

/// Everything the engine tracks between a Start and a Stop.
pub(crate) struct NavSession {
    /// Bumped on every start and stop. Spawned work carries the value
    /// it was born under; mismatched completions are stale.
    pub generation: u64,
    pub plan: Option<RoutePlan>,
    /// Location of the final stop, the return target.
    pub airport: Option<GeoPoint>,
    pub current_position: Option<Position>,
    pub deviation: DeviationTracker,
    pub attempts: Vec<RerouteAttempt>,
    /// Schedule impact of the latest accepted reroute, minutes.
    pub pending_delta_minutes: Option<i64>,
    /// When each alert level last fired, for cooldown de-duplication.
    pub alert_last_fired: [Option<DateTime<Utc>>; AlertLevel::COUNT],
    emergency_latched: bool,
    pub last_progress: Option<Progress>,
    pub last_deviation: Option<DeviationState>,
    pub last_return_info: Option<ReturnInfo>,
}

impl NavSession {
    pub fn new(deviation_config: DeviationConfig) -> Self {
        Self {
            generation: 0,
            plan: None,
            airport: None,
            current_position: None,
            deviation: DeviationTracker::new(deviation_config),
            attempts: Vec::new(),
            pending_delta_minutes: None,
            alert_last_fired: [None; AlertLevel::COUNT],
            emergency_latched: false,
            last_progress: None,
            last_deviation: None,
            last_return_info: None,
        }
    }

    pub fn active(&self) -> bool {
        self.plan.is_some()
    }

    /// Begin guiding `plan`. Clears every trace of the previous trip.
    pub fn start(&mut self, plan: RoutePlan) {
        self.generation += 1;
        self.airport = plan.final_stop().map(|stop| stop.location);
        self.plan = Some(plan);
        self.current_position = None;
        self.deviation.reset();
        self.attempts.clear();
        self.pending_delta_minutes = None;
        self.alert_last_fired = [None; AlertLevel::COUNT];
        self.emergency_latched = false;
        self.last_progress = None;
        self.last_deviation = None;
        self.last_return_info = None;
    }

    pub fn stop(&mut self) {
        self.generation += 1;
        self.plan = None;
        self.airport = None;
        self.current_position = None;
        self.deviation.reset();
        self.attempts.clear();
        self.pending_delta_minutes = None;
        self.alert_last_fired = [None; AlertLevel::COUNT];
        self.emergency_latched = false;
        self.last_progress = None;
        self.last_deviation = None;
        self.last_return_info = None;
    }

    /// Latch emergency mode on the first critical level and report
    /// whether this call was the one that tripped it. Recovering to a
    /// calmer level re-arms the latch.
    pub fn emergency_one_shot(&mut self, level: AlertLevel) -> bool {
        if level.is_critical() {
            if self.emergency_latched {
                false
            } else {
                self.emergency_latched = true;
                true
            }
        } else {
            self.emergency_latched = false;
            false
        }
    }
}
