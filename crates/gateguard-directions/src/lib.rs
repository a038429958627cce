//! The engine's view of the external directions provider.
//!
//! Everything that can route between two points lives behind
//! [`DirectionsProvider`]: the production HTTP client, offline stubs in
//! the simulator, and scripted fakes in engine tests.

pub mod client;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use gateguard_core::models::{GeoPoint, Leg, TravelMode};
use gateguard_core::spatial;

pub use client::HttpDirectionsClient;

/// A single origin-to-destination routing request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub origin: GeoPoint,
    pub destination: GeoPoint,
    pub mode: TravelMode,
}

/// One viable route returned by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSummary {
    pub distance_m: f64,
    pub duration_secs: f64,
    /// Encoded polyline of the detailed path, when the provider has one.
    #[serde(default)]
    pub polyline: Option<String>,
}

impl RouteSummary {
    /// Convert into a route leg, decoding the detailed path when present.
    ///
    /// A polyline that decodes to fewer than two points is treated as
    /// missing geometry so the matcher falls back to the chord.
    pub fn into_leg(self, origin: GeoPoint, destination: GeoPoint, mode: TravelMode) -> Leg {
        let path = self
            .polyline
            .as_deref()
            .map(spatial::decode_path)
            .filter(|path| path.len() >= 2);
        Leg {
            origin: Some(origin),
            destination: Some(destination),
            distance_m: self.distance_m,
            duration_secs: self.duration_secs,
            mode,
            path,
        }
    }
}

/// Failures from the directions provider.
///
/// The first three are provider verdicts the orchestrator counts as
/// spent attempts; the rest are transport-level problems.
#[derive(Debug, Error)]
pub enum DirectionsError {
    /// The provider found no route between the requested points.
    #[error("no route between the requested points")]
    NoRoute,
    /// The provider is rate limiting us.
    #[error("directions provider rate limit hit")]
    RateLimited,
    /// The provider rejected our credentials.
    #[error("directions provider denied the request")]
    Denied,
    /// Any other non-success response.
    #[error("directions provider returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("directions transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Anything that can answer routing requests.
///
/// `route` returns a boxed future so the trait stays object-safe; the
/// engine holds providers as `Arc<dyn DirectionsProvider>` and moves the
/// future onto a spawned task.
pub trait DirectionsProvider: Send + Sync {
    fn route(
        &self,
        request: RouteRequest,
    ) -> BoxFuture<'static, Result<RouteSummary, DirectionsError>>;
}
