//! Debounced off-route detection.
//!
//! Raw GPS wobble must never page the traveler. The tracker only confirms
//! a deviation after the excess distance has persisted for a debounce
//! window, and only declares recovery after the traveler has stayed back
//! inside the corridor for a second window.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{DeviationState, DeviationStatus};

/// Tuning for the deviation state machine and GPS accuracy warnings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviationConfig {
    /// Corridor half-width; beyond this a fix counts as off-route.
    pub threshold_m: f64,
    /// Seconds off-route before a deviation is confirmed.
    pub debounce_in_secs: i64,
    /// Seconds back on-route before a deviation is cleared.
    pub debounce_out_secs: i64,
    /// Reported accuracy at which fixes are flagged as degraded.
    pub accuracy_low_m: f64,
    /// Reported accuracy at which fixes are barely usable.
    pub accuracy_very_low_m: f64,
}

impl Default for DeviationConfig {
    fn default() -> Self {
        Self {
            threshold_m: 50.0,
            debounce_in_secs: 20,
            debounce_out_secs: 15,
            accuracy_low_m: 50.0,
            accuracy_very_low_m: 100.0,
        }
    }
}

impl DeviationConfig {
    fn debounce_in(&self) -> Duration {
        Duration::seconds(self.debounce_in_secs.max(0))
    }

    fn debounce_out(&self) -> Duration {
        Duration::seconds(self.debounce_out_secs.max(0))
    }
}

/// One-shot transitions reported by [`DeviationTracker::update`].
///
/// Only confirmed changes surface here; flapping inside the debounce
/// windows stays silent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeviationEvent {
    /// Off-route persisted past the debounce-in window.
    Confirmed { distance_m: f64 },
    /// Back inside the corridor past the debounce-out window.
    Recovered,
}

/// Quality flag for a degraded GPS fix. Informational only; accuracy
/// never gates the deviation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyWarning {
    Low,
    VeryLow,
}

/// Classify a reported accuracy radius against the configured bands.
pub fn accuracy_warning(accuracy_m: f64, config: &DeviationConfig) -> Option<AccuracyWarning> {
    if accuracy_m >= config.accuracy_very_low_m {
        Some(AccuracyWarning::VeryLow)
    } else if accuracy_m >= config.accuracy_low_m {
        Some(AccuracyWarning::Low)
    } else {
        None
    }
}

/// The deviation state machine.
///
/// Driven by one call per position sample with the matched distance to
/// the route. Transitions:
///
/// ```text
/// Normal -> PendingDeviation -> Deviated -> Recovering -> Normal
///              |                               |
///              +-> Normal (noise)              +-> Deviated (relapse)
/// ```
#[derive(Debug, Clone)]
pub struct DeviationTracker {
    config: DeviationConfig,
    status: DeviationStatus,
    distance_m: f64,
    /// When the current status began; `None` until the first sample.
    since: Option<DateTime<Utc>>,
}

impl DeviationTracker {
    pub fn new(config: DeviationConfig) -> Self {
        Self {
            config,
            status: DeviationStatus::Normal,
            distance_m: 0.0,
            since: None,
        }
    }

    pub fn status(&self) -> DeviationStatus {
        self.status
    }

    /// Current snapshot, or `None` before the first sample.
    pub fn state(&self) -> Option<DeviationState> {
        self.since.map(|since| DeviationState {
            status: self.status,
            distance_m: self.distance_m,
            since,
        })
    }

    /// Reset to `Normal`, forgetting any in-flight debounce windows.
    pub fn reset(&mut self) {
        self.status = DeviationStatus::Normal;
        self.distance_m = 0.0;
        self.since = None;
    }

    /// Feed one sample's matched distance into the machine.
    ///
    /// `at` is the sample capture time; all debounce arithmetic uses it
    /// rather than the wall clock so replayed traces behave identically.
    pub fn update(&mut self, distance_m: f64, at: DateTime<Utc>) -> Option<DeviationEvent> {
        self.distance_m = distance_m;
        let outside = distance_m > self.config.threshold_m;
        let since = match self.since {
            Some(since) => since,
            None => {
                self.since = Some(at);
                at
            }
        };

        match self.status {
            DeviationStatus::Normal => {
                if outside {
                    self.enter(DeviationStatus::PendingDeviation, at);
                    if self.config.debounce_in().is_zero() {
                        self.enter(DeviationStatus::Deviated, at);
                        return Some(DeviationEvent::Confirmed { distance_m });
                    }
                }
                None
            }
            DeviationStatus::PendingDeviation => {
                if !outside {
                    // Noise: the excess never survived the debounce window.
                    self.enter(DeviationStatus::Normal, at);
                    None
                } else if at - since >= self.config.debounce_in() {
                    self.enter(DeviationStatus::Deviated, at);
                    Some(DeviationEvent::Confirmed { distance_m })
                } else {
                    None
                }
            }
            DeviationStatus::Deviated => {
                if !outside {
                    self.enter(DeviationStatus::Recovering, at);
                    if self.config.debounce_out().is_zero() {
                        self.enter(DeviationStatus::Normal, at);
                        return Some(DeviationEvent::Recovered);
                    }
                }
                None
            }
            DeviationStatus::Recovering => {
                if outside {
                    // Relapse: stay deviated without re-announcing.
                    self.enter(DeviationStatus::Deviated, at);
                    None
                } else if at - since >= self.config.debounce_out() {
                    self.enter(DeviationStatus::Normal, at);
                    Some(DeviationEvent::Recovered)
                } else {
                    None
                }
            }
        }
    }

    fn enter(&mut self, status: DeviationStatus, at: DateTime<Utc>) {
        self.status = status;
        self.since = Some(at);
    }
}
