use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, instrument};
use url::Url;

use crate::{config::AppConfig, errors::ServiceError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RoutingProfile {
    Driving,
    Walking,
    Cycling,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteEstimate {
    pub distance_meters: f64,
    pub duration_seconds: f64,
    pub provider: String,
    pub profile: RoutingProfile,
}

/// Route estimation between two coordinates. Calls are timeout-bounded;
/// failures surface as `ExternalServiceError` and callers degrade to
/// "distance unknown" rather than failing their own request.
#[async_trait]
pub trait RouteEstimator: Send + Sync {
    async fn estimate_route(
        &self,
        profile: RoutingProfile,
        from: Coordinates,
        to: Coordinates,
    ) -> Result<RouteEstimate, ServiceError>;
}

/// Directions-API-backed estimator.
pub struct HttpRoutingService {
    client: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    routes: Vec<DirectionsRoute>,
}

#[derive(Debug, Deserialize)]
struct DirectionsRoute {
    distance: f64,
    duration: f64,
}

impl HttpRoutingService {
    pub fn new(base_url: String, access_token: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url,
            access_token,
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.routing_base_url.clone(),
            cfg.routing_access_token.clone(),
            Duration::from_secs(cfg.routing_timeout_secs),
        )
    }
}

#[async_trait]
impl RouteEstimator for HttpRoutingService {
    #[instrument(skip(self))]
    async fn estimate_route(
        &self,
        profile: RoutingProfile,
        from: Coordinates,
        to: Coordinates,
    ) -> Result<RouteEstimate, ServiceError> {
        let token = self.access_token.as_deref().ok_or_else(|| {
            ServiceError::ExternalServiceError("Routing access token not configured".to_string())
        })?;

        let segments = format!(
            "{},{};{},{}",
            from.longitude, from.latitude, to.longitude, to.latitude
        );
        let mut url = Url::parse(&format!("{}/{}/{}", self.base_url, profile, segments))
            .map_err(|e| {
                ServiceError::ExternalServiceError(format!("Invalid routing URL: {}", e))
            })?;
        url.query_pairs_mut()
            .append_pair("overview", "false")
            .append_pair("alternatives", "false")
            .append_pair("annotations", "duration,distance")
            .append_pair("access_token", token);

        let response = self.client.get(url).send().await.map_err(|e| {
            error!(error = %e, "Routing provider request failed");
            ServiceError::ExternalServiceError("Routing provider unavailable".to_string())
        })?;

        if !response.status().is_success() {
            let status = response.status();
            error!(status = %status, "Routing provider returned an error");
            return Err(ServiceError::ExternalServiceError(format!(
                "Routing provider returned {}",
                status
            )));
        }

        let body: DirectionsResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to decode routing response");
            ServiceError::ExternalServiceError("Malformed routing response".to_string())
        })?;

        let route = body.routes.into_iter().next().ok_or_else(|| {
            ServiceError::ExternalServiceError(
                "No routes available for the provided coordinates".to_string(),
            )
        })?;

        Ok(RouteEstimate {
            distance_meters: route.distance,
            duration_seconds: route.duration,
            provider: "directions".to_string(),
            profile,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_token_fails_as_external_error() {
        let svc = HttpRoutingService::new(
            "https://routing.invalid/v5".to_string(),
            None,
            Duration::from_secs(1),
        );
        let origin = Coordinates {
            latitude: 0.0,
            longitude: 0.0,
        };

        let result = svc
            .estimate_route(RoutingProfile::Driving, origin, origin)
            .await;
        assert!(matches!(
            result,
            Err(ServiceError::ExternalServiceError(_))
        ));
    }
}
