//! HTTP client for the directions provider.

use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::{DirectionsError, DirectionsProvider, RouteRequest, RouteSummary};

/// Wire format of a provider route response.
#[derive(Debug, Deserialize)]
struct RouteDoc {
    distance_meters: f64,
    duration_seconds: f64,
    #[serde(default)]
    polyline: Option<String>,
}

/// Directions client speaking the provider's HTTP API.
///
/// Requests time out after 10 seconds, so every reroute or travel-time
/// lookup resolves in bounded time even on a dead network.
pub struct HttpDirectionsClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpDirectionsClient {
    /// Create a new directions client.
    /// An empty API key is treated as unauthenticated access.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        let api_key = if api_key.trim().is_empty() {
            None
        } else {
            Some(api_key)
        };
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.into(),
            api_key,
        }
    }

    async fn fetch_route(
        client: Client,
        base_url: String,
        api_key: Option<String>,
        request: RouteRequest,
    ) -> Result<RouteSummary, DirectionsError> {
        let url = format!("{}/v1/route", base_url);
        debug!(
            mode = request.mode.as_str(),
            "requesting route from directions provider"
        );

        let mut builder = client.get(&url).query(&[
            (
                "origin",
                format!("{},{}", request.origin.lat, request.origin.lng),
            ),
            (
                "destination",
                format!("{},{}", request.destination.lat, request.destination.lng),
            ),
            ("mode", request.mode.as_str().to_string()),
        ]);
        if let Some(key) = api_key.as_deref() {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder.send().await?;
        let status = response.status();

        match status.as_u16() {
            404 => Err(DirectionsError::NoRoute),
            429 => Err(DirectionsError::RateLimited),
            401 | 403 => Err(DirectionsError::Denied),
            _ if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                Err(DirectionsError::Status {
                    status: status.as_u16(),
                    body,
                })
            }
            _ => {
                let doc = response.json::<RouteDoc>().await?;
                Ok(RouteSummary {
                    distance_m: doc.distance_meters,
                    duration_secs: doc.duration_seconds,
                    polyline: doc.polyline,
                })
            }
        }
    }
}

impl DirectionsProvider for HttpDirectionsClient {
    fn route(
        &self,
        request: RouteRequest,
    ) -> BoxFuture<'static, Result<RouteSummary, DirectionsError>> {
        // reqwest::Client is an Arc internally, so cloning into the
        // 'static future is cheap.
        Self::fetch_route(
            self.client.clone(),
            self.base_url.clone(),
            self.api_key.clone(),
            request,
        )
        .boxed()
    }
}
