//! Offline directions provider for demos and replays.

use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;

use gateguard_core::models::TravelMode;
use gateguard_core::spatial::haversine_distance;
use gateguard_directions::{DirectionsError, DirectionsProvider, RouteRequest, RouteSummary};

/// Detour factor applied to the straight-line distance.
const ROAD_FACTOR: f64 = 1.3;

/// Answers every request locally with a straight-line estimate.
///
/// A configurable latency keeps the engine's in-flight handling honest
/// even without a network.
pub struct StubDirections {
    latency: Duration,
}

impl StubDirections {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }

    fn speed_mps(mode: TravelMode) -> f64 {
        match mode {
            TravelMode::Walking | TravelMode::Unknown => 1.4,
            TravelMode::Transit => 8.0,
            TravelMode::Driving => 11.0,
        }
    }
}

impl DirectionsProvider for StubDirections {
    fn route(
        &self,
        request: RouteRequest,
    ) -> BoxFuture<'static, Result<RouteSummary, DirectionsError>> {
        let latency = self.latency;
        async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            let distance_m =
                haversine_distance(request.origin, request.destination) * ROAD_FACTOR;
            let duration_secs = distance_m / StubDirections::speed_mps(request.mode);
            Ok(RouteSummary {
                distance_m,
                duration_secs,
                polyline: None,
            })
        }
        .boxed()
    }
}
