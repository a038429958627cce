//! Return-to-airport slack computation and travel-time caching.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use gateguard_core::alerts::AlertThresholds;
use gateguard_core::models::{AlertLevel, GeoPoint, ReturnInfo};
use gateguard_core::spatial::haversine_distance;

use crate::config::ReturnTimeConfig;

/// 3 decimal places, roughly 110m cells at the equator.
const CACHE_KEY_SCALE: f64 = 1000.0;
const CACHE_MAX_ENTRIES: usize = 64;

/// One cached provider estimate.
#[derive(Debug, Clone, Copy)]
pub struct TravelEstimate {
    pub minutes: i64,
    /// The exact position the estimate was computed for; displacement
    /// checks measure from here, not from the cell center.
    pub exact: GeoPoint,
    pub computed_at: DateTime<Utc>,
}

/// Last-write-wins travel-time cache keyed by rounded position.
///
/// Written by estimate-refresh tasks and read by the engine loop, hence
/// the concurrent map. Only provider answers are cached; heuristic
/// fallbacks are recomputed every time so a dead provider keeps getting
/// retried.
#[derive(Debug, Default)]
pub struct TravelTimeCache {
    entries: DashMap<(i64, i64), TravelEstimate>,
}

impl TravelTimeCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(point: GeoPoint) -> (i64, i64) {
        (
            (point.lat * CACHE_KEY_SCALE).round() as i64,
            (point.lng * CACHE_KEY_SCALE).round() as i64,
        )
    }

    /// Look up a usable estimate for `point`.
    ///
    /// An entry is reused only while it is younger than `max_age` and the
    /// traveler has moved no more than `significant_move_m` from where it
    /// was computed. Expiry is checked on read; stale entries are left
    /// for [`TravelTimeCache::store`] to prune.
    pub fn lookup(
        &self,
        point: GeoPoint,
        now: DateTime<Utc>,
        max_age: Duration,
        significant_move_m: f64,
    ) -> Option<i64> {
        let entry = self.entries.get(&Self::key(point))?;
        let fresh = now - entry.computed_at < max_age;
        let near = haversine_distance(entry.exact, point) <= significant_move_m;
        (fresh && near).then_some(entry.minutes)
    }

    pub fn store(&self, estimate: TravelEstimate, max_age: Duration) {
        let stored_at = estimate.computed_at;
        self.entries.insert(Self::key(estimate.exact), estimate);
        self.prune(stored_at, max_age);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop expired entries, then the oldest entries beyond the size cap.
    fn prune(&self, now: DateTime<Utc>, max_age: Duration) {
        let mut entries: Vec<((i64, i64), DateTime<Utc>)> = self
            .entries
            .iter()
            .map(|entry| (*entry.key(), entry.value().computed_at))
            .collect();

        for (key, computed_at) in &entries {
            if now - *computed_at > max_age {
                self.entries.remove(key);
            }
        }

        if self.entries.len() <= CACHE_MAX_ENTRIES {
            return;
        }

        entries.sort_by_key(|(_, computed_at)| *computed_at);
        for (key, _) in entries {
            if self.entries.len() <= CACHE_MAX_ENTRIES {
                break;
            }
            self.entries.remove(&key);
        }
    }
}

/// Round a provider duration up to whole minutes, never under a minute.
pub fn minutes_from_secs(duration_secs: f64) -> i64 {
    (duration_secs / 60.0).ceil().max(1.0) as i64
}

/// Straight-line travel-time heuristic for when the provider is down.
///
/// Deliberately pessimistic: rounds up and never goes below the
/// configured floor, so a provider outage biases alerts toward firing
/// earlier rather than later.
pub fn fallback_travel_minutes(
    position: GeoPoint,
    airport: GeoPoint,
    config: &ReturnTimeConfig,
) -> i64 {
    let distance_m = haversine_distance(position, airport);
    let secs = distance_m / config.fallback_speed_mps.max(0.1);
    let minutes = (secs / 60.0).ceil() as i64;
    minutes.max(config.min_travel_minutes)
}

/// Compute slack against the scheduled departure and bucket it.
///
/// `reroute_delta_minutes` is the floored schedule impact of an applied
/// reroute; negative (time-saving) reroutes never inflate slack.
/// `last_fired` tracks the most recent alert per level and is updated
/// in place when this computation passes its level's cooldown.
pub fn compute_return_info(
    thresholds: &AlertThresholds,
    scheduled_departure: DateTime<Utc>,
    travel_minutes: i64,
    reroute_delta_minutes: i64,
    last_fired: &mut [Option<DateTime<Utc>>; AlertLevel::COUNT],
    now: DateTime<Utc>,
) -> ReturnInfo {
    let remaining_minutes = (scheduled_departure - now).num_minutes();
    let slack_minutes =
        remaining_minutes - thresholds.buffer_minutes - travel_minutes - reroute_delta_minutes;

    let level = thresholds.level_for(slack_minutes);
    let cooldown = thresholds.cooldown_for(level);
    let should_alert = match last_fired[level.index()] {
        Some(fired_at) => now - fired_at >= cooldown,
        None => true,
    };
    if should_alert {
        last_fired[level.index()] = Some(now);
    }

    ReturnInfo {
        level,
        slack_minutes,
        travel_time_minutes: travel_minutes,
        remaining_minutes,
        computed_at: now,
        should_alert,
    }
}
