//! Slack thresholds and alert-level bucketing.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::AlertLevel;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ThresholdError {
    #[error("alert boundaries must strictly increase: emergency < urgent < warning < prepare")]
    BoundariesNotIncreasing,
    #[error("alert cooldowns must not be negative")]
    NegativeCooldown,
}

/// Slack boundaries and alert pacing, all in minutes.
///
/// A slack value is bucketed by the first boundary it falls below, so
/// the boundaries must strictly increase; [`AlertThresholds::validate`]
/// enforces that before a session starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertThresholds {
    /// Slack below this is an emergency.
    pub emergency_below_min: i64,
    pub urgent_below_min: i64,
    pub warning_below_min: i64,
    pub prepare_below_min: i64,
    /// Safety margin subtracted from every slack computation.
    pub buffer_minutes: i64,
    /// Minimum quiet time between repeated alerts of the same level.
    pub emergency_cooldown_min: i64,
    pub urgent_cooldown_min: i64,
    pub warning_cooldown_min: i64,
    pub prepare_cooldown_min: i64,
    pub safe_cooldown_min: i64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            emergency_below_min: 0,
            urgent_below_min: 10,
            warning_below_min: 30,
            prepare_below_min: 60,
            buffer_minutes: 30,
            emergency_cooldown_min: 5,
            urgent_cooldown_min: 10,
            warning_cooldown_min: 15,
            prepare_cooldown_min: 30,
            safe_cooldown_min: 60,
        }
    }
}

impl AlertThresholds {
    pub fn validate(&self) -> Result<(), ThresholdError> {
        let increasing = self.emergency_below_min < self.urgent_below_min
            && self.urgent_below_min < self.warning_below_min
            && self.warning_below_min < self.prepare_below_min;
        if !increasing {
            return Err(ThresholdError::BoundariesNotIncreasing);
        }

        let cooldowns = [
            self.emergency_cooldown_min,
            self.urgent_cooldown_min,
            self.warning_cooldown_min,
            self.prepare_cooldown_min,
            self.safe_cooldown_min,
        ];
        if cooldowns.iter().any(|&c| c < 0) {
            return Err(ThresholdError::NegativeCooldown);
        }

        Ok(())
    }

    /// Bucket a slack value. Boundaries are exclusive upper bounds, so a
    /// slack exactly on a boundary lands in the calmer bucket.
    pub fn level_for(&self, slack_minutes: i64) -> AlertLevel {
        if slack_minutes < self.emergency_below_min {
            AlertLevel::Emergency
        } else if slack_minutes < self.urgent_below_min {
            AlertLevel::Urgent
        } else if slack_minutes < self.warning_below_min {
            AlertLevel::Warning
        } else if slack_minutes < self.prepare_below_min {
            AlertLevel::Prepare
        } else {
            AlertLevel::Safe
        }
    }

    /// Quiet period for a level; more urgent levels repeat sooner.
    pub fn cooldown_for(&self, level: AlertLevel) -> Duration {
        let minutes = match level {
            AlertLevel::Emergency => self.emergency_cooldown_min,
            AlertLevel::Urgent => self.urgent_cooldown_min,
            AlertLevel::Warning => self.warning_cooldown_min,
            AlertLevel::Prepare => self.prepare_cooldown_min,
            AlertLevel::Safe => self.safe_cooldown_min,
        };
        Duration::minutes(minutes.max(0))
    }
}
