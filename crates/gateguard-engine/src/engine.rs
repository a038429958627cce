//! The navigation engine task.
//!
//! One spawned task owns all trip state. Commands arrive on an mpsc
//! channel, announcements leave on a broadcast channel, and the latest
//! coalesced state is published on a watch channel. Provider calls for
//! reroutes and travel-time refreshes run on their own tasks and report
//! back through internal completion channels, so a slow network never
//! blocks position samples.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use gateguard_core::deviation::{accuracy_warning, DeviationEvent};
use gateguard_core::models::{GeoPoint, Position, RoutePlan};
use gateguard_core::progress::compute_progress;
use gateguard_directions::{DirectionsError, DirectionsProvider, RouteRequest, RouteSummary};

use crate::clock::Clock;
use crate::config::NavConfig;
use crate::events::{deviation_message, return_message, NavEvent, NavSnapshot};
use crate::reroute::{
    apply_reroute, calculate_reroute, failed_attempt, should_suggest_reroute, RerouteResult,
    RerouteTicket,
};
use crate::return_time::{
    compute_return_info, fallback_travel_minutes, minutes_from_secs, TravelEstimate,
    TravelTimeCache,
};
use crate::session::NavSession;

const COMMAND_CHANNEL_CAPACITY: usize = 32;
const EVENT_CHANNEL_CAPACITY: usize = 64;
const COMPLETION_CHANNEL_CAPACITY: usize = 4;

/// Instructions accepted by a running engine.
#[derive(Debug)]
pub enum NavCommand {
    /// Begin guiding `plan`, replacing any active trip.
    Start { plan: RoutePlan },
    /// End the active trip.
    Stop,
    /// A fresh position fix.
    Sample(Position),
    /// The position source went away. Last known-good state is kept.
    SensorLost,
}

/// The engine task is gone and commands can no longer be delivered.
#[derive(Debug, Error)]
#[error("navigation engine has stopped")]
pub struct EngineClosed;

/// Cloneable handle to a running engine.
///
/// Dropping the last handle closes the command channel and ends the
/// engine task.
#[derive(Clone)]
pub struct NavHandle {
    commands: mpsc::Sender<NavCommand>,
    events: broadcast::Sender<NavEvent>,
    snapshot: watch::Receiver<NavSnapshot>,
}

impl NavHandle {
    pub async fn send(&self, command: NavCommand) -> Result<(), EngineClosed> {
        self.commands.send(command).await.map_err(|_| EngineClosed)
    }

    /// Subscribe to engine announcements. Slow subscribers may observe
    /// lag on the broadcast channel; the snapshot never lags.
    pub fn subscribe(&self) -> broadcast::Receiver<NavEvent> {
        self.events.subscribe()
    }

    /// Latest coalesced trip state.
    pub fn snapshot(&self) -> NavSnapshot {
        self.snapshot.borrow().clone()
    }

    /// A watch receiver for callers that want change notifications
    /// instead of polling [`NavHandle::snapshot`].
    pub fn watch(&self) -> watch::Receiver<NavSnapshot> {
        self.snapshot.clone()
    }
}

/// Completion of a spawned corrective-route request.
struct RerouteOutcome {
    generation: u64,
    ticket: RerouteTicket,
    result: Result<RerouteResult, DirectionsError>,
}

/// Completion of a spawned travel-time refresh.
struct RefreshOutcome {
    generation: u64,
    point: GeoPoint,
    result: Result<RouteSummary, DirectionsError>,
}

pub struct NavEngine;

impl NavEngine {
    /// Spawn the engine task and return a handle to it.
    pub fn spawn(
        config: NavConfig,
        provider: Arc<dyn DirectionsProvider>,
        clock: Arc<dyn Clock>,
    ) -> NavHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (snapshot_tx, snapshot_rx) = watch::channel(NavSnapshot::default());

        let session = NavSession::new(config.deviation.clone());
        let task = EngineTask {
            config,
            provider,
            clock,
            events: event_tx.clone(),
            snapshot: snapshot_tx,
            session,
            cache: TravelTimeCache::new(),
            reroute_in_flight: false,
            refresh_in_flight: false,
        };
        tokio::spawn(task.run(command_rx));

        NavHandle {
            commands: command_tx,
            events: event_tx,
            snapshot: snapshot_rx,
        }
    }
}

struct EngineTask {
    config: NavConfig,
    provider: Arc<dyn DirectionsProvider>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<NavEvent>,
    snapshot: watch::Sender<NavSnapshot>,
    session: NavSession,
    cache: TravelTimeCache,
    /// Set when a corrective-route request is outstanding. Cleared only
    /// by its completion, so a restarted trip cannot double-request
    /// while an old call is still in the air.
    reroute_in_flight: bool,
    refresh_in_flight: bool,
}

impl EngineTask {
    async fn run(mut self, mut commands: mpsc::Receiver<NavCommand>) {
        let mut ticker = interval(Duration::from_secs(
            self.config.return_time.tick_interval_secs,
        ));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let (reroute_tx, mut reroute_rx) =
            mpsc::channel::<RerouteOutcome>(COMPLETION_CHANNEL_CAPACITY);
        let (refresh_tx, mut refresh_rx) =
            mpsc::channel::<RefreshOutcome>(COMPLETION_CHANNEL_CAPACITY);

        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else {
                        info!("navigation engine shutting down");
                        break;
                    };
                    self.handle_command(command, &reroute_tx, &refresh_tx);
                }
                _ = ticker.tick() => {
                    if self.session.active() {
                        self.recompute_return_info(&refresh_tx);
                        self.publish_snapshot();
                    }
                }
                Some(outcome) = reroute_rx.recv() => {
                    self.handle_reroute_outcome(outcome);
                }
                Some(outcome) = refresh_rx.recv() => {
                    self.handle_refresh_outcome(outcome);
                }
            }
        }
    }

    fn handle_command(
        &mut self,
        command: NavCommand,
        reroute_tx: &mpsc::Sender<RerouteOutcome>,
        refresh_tx: &mpsc::Sender<RefreshOutcome>,
    ) {
        match command {
            NavCommand::Start { plan } => {
                info!(
                    stops = plan.stops.len(),
                    segments = plan.segments.len(),
                    "starting navigation"
                );
                self.session.start(plan);
                self.cache.clear();
                self.publish_snapshot();
            }
            NavCommand::Stop => {
                info!("stopping navigation");
                self.session.stop();
                self.cache.clear();
                self.publish_snapshot();
            }
            NavCommand::Sample(position) => {
                self.handle_sample(position, reroute_tx, refresh_tx);
            }
            NavCommand::SensorLost => {
                if self.session.current_position.take().is_some() {
                    debug!("position source lost, keeping last known state");
                }
            }
        }
    }

    fn handle_sample(
        &mut self,
        position: Position,
        reroute_tx: &mpsc::Sender<RerouteOutcome>,
        refresh_tx: &mpsc::Sender<RefreshOutcome>,
    ) {
        if !self.session.active() {
            return;
        }

        if let Some(warning) = accuracy_warning(position.accuracy_m, &self.config.deviation) {
            debug!(accuracy_m = position.accuracy_m, "low accuracy fix");
            self.emit(NavEvent::AccuracyWarning {
                warning,
                accuracy_m: position.accuracy_m,
            });
        }

        self.session.current_position = Some(position);

        let matched = self
            .session
            .plan
            .as_ref()
            .and_then(|plan| compute_progress(plan, &position));
        if let Some(progress) = matched {
            self.session.last_progress = Some(progress);
            self.emit(NavEvent::ProgressUpdated { progress });

            match self
                .session
                .deviation
                .update(progress.distance_to_route_m, position.captured_at)
            {
                Some(event) => {
                    match &event {
                        DeviationEvent::Confirmed { distance_m } => {
                            warn!(distance_m, "route deviation confirmed");
                        }
                        DeviationEvent::Recovered => info!("route deviation recovered"),
                    }
                    if let Some(state) = self.session.deviation.state() {
                        self.session.last_deviation = Some(state);
                        self.emit(NavEvent::DeviationChanged {
                            state,
                            message: deviation_message(&event),
                        });
                    }
                }
                None => {
                    self.session.last_deviation = self.session.deviation.state();
                }
            }

            self.maybe_reroute(reroute_tx);
        }

        self.recompute_return_info(refresh_tx);
        self.publish_snapshot();
    }

    /// Kick off a corrective-route request when the deviation warrants
    /// one and nothing blocks it.
    fn maybe_reroute(&mut self, reroute_tx: &mpsc::Sender<RerouteOutcome>) {
        if self.reroute_in_flight {
            return;
        }
        let (Some(deviation), Some(position), Some(progress), Some(plan)) = (
            self.session.last_deviation.as_ref(),
            self.session.current_position.as_ref(),
            self.session.last_progress.as_ref(),
            self.session.plan.as_ref(),
        ) else {
            return;
        };

        let now = self.clock.now();
        if !should_suggest_reroute(
            deviation,
            position,
            &self.session.attempts,
            &self.config.reroute,
            now,
        ) {
            return;
        }

        let attempt_number = self.session.attempts.len() as u32 + 1;
        let Some(ticket) = RerouteTicket::prepare(plan, progress, position, attempt_number, now)
        else {
            return;
        };

        info!(
            attempt = attempt_number,
            target = %ticket.target_name,
            "requesting corrective route"
        );
        self.reroute_in_flight = true;

        let provider = Arc::clone(&self.provider);
        let generation = self.session.generation;
        let tx = reroute_tx.clone();
        tokio::spawn(async move {
            let result = calculate_reroute(provider.as_ref(), &ticket).await;
            let _ = tx
                .send(RerouteOutcome {
                    generation,
                    ticket,
                    result,
                })
                .await;
        });
    }

    fn handle_reroute_outcome(&mut self, outcome: RerouteOutcome) {
        self.reroute_in_flight = false;

        if outcome.generation != self.session.generation {
            debug!("discarding corrective route from a previous trip");
            return;
        }

        match outcome.result {
            Ok(result) => self.apply_reroute_result(result),
            Err(error) => {
                warn!(
                    attempt = outcome.ticket.attempt_number,
                    error = %error,
                    "reroute attempt failed"
                );
                self.session.attempts.push(failed_attempt(&outcome.ticket));
                self.emit(NavEvent::RerouteFailed {
                    attempt_number: outcome.ticket.attempt_number,
                    reason: error.to_string(),
                });
                if self.session.attempts.len() as u32 >= self.config.reroute.max_attempts {
                    warn!("reroute attempts exhausted");
                    self.emit(NavEvent::RerouteUnavailable);
                }
            }
        }
    }

    fn apply_reroute_result(&mut self, result: RerouteResult) {
        let Some(plan) = self.session.plan.as_ref() else {
            return;
        };
        let replacement = apply_reroute(&result, plan);
        let additional = result.attempt.additional_minutes.unwrap_or(0);
        info!(
            attempt = result.attempt.attempt_number,
            additional_minutes = additional,
            "corrective route applied"
        );

        // Old progress indexed the old plan; rematch right away so the
        // snapshot stays coherent.
        self.session.last_progress = self
            .session
            .current_position
            .as_ref()
            .and_then(|position| compute_progress(&replacement, position));
        self.session.attempts.push(result.attempt);
        self.session.pending_delta_minutes = Some(result.delta_minutes);
        self.session.plan = Some(replacement.clone());

        self.emit(NavEvent::RouteReplaced {
            plan: replacement,
            additional_minutes: additional,
        });
        self.publish_snapshot();
    }

    /// Recompute ReturnInfo from the cache, or start a travel-time
    /// refresh when no usable estimate exists.
    fn recompute_return_info(&mut self, refresh_tx: &mpsc::Sender<RefreshOutcome>) {
        let (Some(position), Some(plan), Some(airport)) = (
            self.session.current_position.as_ref(),
            self.session.plan.as_ref(),
            self.session.airport,
        ) else {
            return;
        };
        let Some(scheduled_departure) = plan.scheduled_departure else {
            return;
        };
        // Nothing to report until the route has matched at least once.
        if self.session.last_progress.is_none() {
            return;
        }

        let now = self.clock.now();
        let point = position.point();
        let max_age = chrono::Duration::seconds(self.config.return_time.estimate_refresh_secs);

        if let Some(minutes) = self.cache.lookup(
            point,
            now,
            max_age,
            self.config.return_time.significant_move_m,
        ) {
            self.finish_return_info(minutes, scheduled_departure, now);
            return;
        }

        if self.refresh_in_flight {
            return;
        }
        self.refresh_in_flight = true;

        let request = RouteRequest {
            origin: point,
            destination: airport,
            mode: self.config.return_time.travel_mode,
        };
        let provider = Arc::clone(&self.provider);
        let generation = self.session.generation;
        let tx = refresh_tx.clone();
        tokio::spawn(async move {
            let result = provider.route(request).await;
            let _ = tx
                .send(RefreshOutcome {
                    generation,
                    point,
                    result,
                })
                .await;
        });
    }

    fn handle_refresh_outcome(&mut self, outcome: RefreshOutcome) {
        self.refresh_in_flight = false;

        if outcome.generation != self.session.generation {
            debug!("discarding travel-time estimate from a previous trip");
            return;
        }
        let Some(scheduled_departure) = self
            .session
            .plan
            .as_ref()
            .and_then(|plan| plan.scheduled_departure)
        else {
            return;
        };

        let now = self.clock.now();
        let minutes = match outcome.result {
            Ok(summary) => {
                let minutes = minutes_from_secs(summary.duration_secs);
                let max_age =
                    chrono::Duration::seconds(self.config.return_time.estimate_refresh_secs);
                self.cache.store(
                    TravelEstimate {
                        minutes,
                        exact: outcome.point,
                        computed_at: now,
                    },
                    max_age,
                );
                minutes
            }
            Err(error) => {
                let Some(airport) = self.session.airport else {
                    return;
                };
                warn!(error = %error, "travel-time refresh failed, using distance heuristic");
                fallback_travel_minutes(outcome.point, airport, &self.config.return_time)
            }
        };

        self.finish_return_info(minutes, scheduled_departure, now);
        self.publish_snapshot();
    }

    /// Turn a travel-time estimate into ReturnInfo, fire de-duplicated
    /// alerts, and trip the emergency latch when slack turns critical.
    fn finish_return_info(
        &mut self,
        travel_minutes: i64,
        scheduled_departure: DateTime<Utc>,
        now: DateTime<Utc>,
    ) {
        let delta = self.session.pending_delta_minutes.unwrap_or(0).max(0);
        let info = compute_return_info(
            &self.config.return_time.thresholds,
            scheduled_departure,
            travel_minutes,
            delta,
            &mut self.session.alert_last_fired,
            now,
        );
        self.session.last_return_info = Some(info);

        if info.should_alert {
            self.emit(NavEvent::ReturnInfoUpdated {
                info,
                message: return_message(&info),
            });
        }

        if self.session.emergency_one_shot(info.level) {
            warn!(slack_minutes = info.slack_minutes, "return window critical");
            self.emit(NavEvent::EmergencyMode {
                slack_minutes: info.slack_minutes,
            });
        }
    }

    fn publish_snapshot(&self) {
        let snapshot = NavSnapshot {
            active: self.session.active(),
            progress: self.session.last_progress,
            deviation: self.session.last_deviation,
            return_info: self.session.last_return_info,
            plan: self.session.plan.clone(),
        };
        let _ = self.snapshot.send(snapshot);
    }

    fn emit(&self, event: NavEvent) {
        let _ = self.events.send(event);
    }
}
