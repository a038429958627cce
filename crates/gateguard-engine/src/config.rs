//! Engine configuration from environment.

use std::env;

use thiserror::Error;

use gateguard_core::alerts::{AlertThresholds, ThresholdError};
use gateguard_core::deviation::DeviationConfig;
use gateguard_core::models::TravelMode;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Thresholds(#[from] ThresholdError),
    #[error("{0} must be positive")]
    NonPositive(&'static str),
}

/// Tuning for the reroute orchestrator.
#[derive(Debug, Clone)]
pub struct RerouteConfig {
    /// How long a confirmed deviation must persist before we ask the
    /// provider for a corrective route.
    pub min_deviation_secs: i64,
    /// Hard cap on reroute requests per session.
    pub max_attempts: u32,
    /// A new attempt this close to the previous one counts as "the same
    /// place" for cooldown purposes.
    pub retry_radius_m: f64,
    /// Quiet time after an attempt before retrying from the same place.
    pub cooldown_secs: i64,
}

impl Default for RerouteConfig {
    fn default() -> Self {
        Self {
            min_deviation_secs: 30,
            max_attempts: 3,
            retry_radius_m: 100.0,
            cooldown_secs: 120,
        }
    }
}

/// Tuning for the return-time calculator.
#[derive(Debug, Clone)]
pub struct ReturnTimeConfig {
    pub thresholds: AlertThresholds,
    /// Cadence of the freshness timer that recomputes ReturnInfo even
    /// while the traveler is stationary.
    pub tick_interval_secs: u64,
    /// Maximum age of a cached travel-time estimate.
    pub estimate_refresh_secs: i64,
    /// Displacement that invalidates a cached estimate early.
    pub significant_move_m: f64,
    /// Mode assumed for the trip back to the airport.
    pub travel_mode: TravelMode,
    /// Assumed speed for the distance heuristic when the provider is
    /// unreachable.
    pub fallback_speed_mps: f64,
    /// Floor for any travel-time estimate, minutes.
    pub min_travel_minutes: i64,
}

impl Default for ReturnTimeConfig {
    fn default() -> Self {
        Self {
            thresholds: AlertThresholds::default(),
            tick_interval_secs: 60,
            estimate_refresh_secs: 300,
            significant_move_m: 250.0,
            travel_mode: TravelMode::Transit,
            fallback_speed_mps: 8.0,
            min_travel_minutes: 10,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default)]
pub struct NavConfig {
    pub deviation: DeviationConfig,
    pub reroute: RerouteConfig,
    pub return_time: ReturnTimeConfig,
}

impl NavConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.deviation.threshold_m = env::var("GATEGUARD_DEVIATION_THRESHOLD_M")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(config.deviation.threshold_m);
        config.deviation.debounce_in_secs = env::var("GATEGUARD_DEBOUNCE_IN_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(config.deviation.debounce_in_secs);
        config.deviation.debounce_out_secs = env::var("GATEGUARD_DEBOUNCE_OUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(config.deviation.debounce_out_secs);

        config.reroute.max_attempts = env::var("GATEGUARD_MAX_REROUTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(config.reroute.max_attempts);
        config.reroute.cooldown_secs = env::var("GATEGUARD_REROUTE_COOLDOWN_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(config.reroute.cooldown_secs);

        config.return_time.thresholds.buffer_minutes = env::var("GATEGUARD_BUFFER_MINUTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(config.return_time.thresholds.buffer_minutes);
        config.return_time.tick_interval_secs = env::var("GATEGUARD_TICK_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(config.return_time.tick_interval_secs);

        config
    }

    /// Reject configurations the state machines cannot run on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.return_time.thresholds.validate()?;

        if self.deviation.threshold_m <= 0.0 {
            return Err(ConfigError::NonPositive("deviation threshold"));
        }
        if self.return_time.tick_interval_secs == 0 {
            return Err(ConfigError::NonPositive("tick interval"));
        }
        if self.return_time.fallback_speed_mps <= 0.0 {
            return Err(ConfigError::NonPositive("fallback speed"));
        }
        if self.reroute.max_attempts == 0 {
            return Err(ConfigError::NonPositive("reroute attempt limit"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(NavConfig::default().validate().is_ok());
    }

    #[test]
    fn bad_thresholds_fail_validation() {
        let mut config = NavConfig::default();
        config.return_time.thresholds.urgent_below_min = 99;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Thresholds(_))
        ));
    }

    #[test]
    fn zero_tick_interval_fails_validation() {
        let mut config = NavConfig::default();
        config.return_time.tick_interval_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::NonPositive(_))));
    }
}
