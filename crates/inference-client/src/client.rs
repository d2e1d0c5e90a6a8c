//! Inference service client

use crate::InferenceError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default request timeout for inference calls
const DEFAULT_TIMEOUT_MS: u64 = 15_000;

/// Inference client configuration
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Service base URL, e.g. "http://10.0.0.5:8000"
    pub base_url: String,
    /// Minimum detector confidence the service should count
    pub confidence_threshold: f32,
    /// Timeout for a single HTTP request
    pub request_timeout: Duration,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            confidence_threshold: 0.5,
            request_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    images: &'a [String],
    confidence_threshold: f32,
}

/// Body of a successful `/verify-images` answer
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyResponse {
    pub status: String,
    #[serde(default)]
    pub details: VerifyDetails,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyDetails {
    /// Detections per label (card, crutch, sunglasses, ...)
    #[serde(default)]
    pub totals: BTreeMap<String, u32>,
}

/// Client for the remote detection service
#[derive(Debug, Clone)]
pub struct InferenceClient {
    http: reqwest::Client,
    base_url: String,
    confidence_threshold: f32,
}

impl InferenceClient {
    /// Create a new inference client
    pub fn new(config: InferenceConfig) -> Result<Self, InferenceError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(InferenceError::Config("base URL is empty".into()));
        }
        if !(0.0..=1.0).contains(&config.confidence_threshold) {
            return Err(InferenceError::Config(format!(
                "confidence threshold {} outside [0, 1]",
                config.confidence_threshold
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| InferenceError::Config(e.to_string()))?;

        info!("Creating inference client for {}", base_url);
        Ok(Self {
            http,
            base_url,
            confidence_threshold: config.confidence_threshold,
        })
    }

    /// Service base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Liveness probe: `GET /health`, falling back to `GET /`
    pub async fn health_check(&self) -> Result<(), InferenceError> {
        let mut last_error = String::new();

        for path in ["/health", "/"] {
            let url = format!("{}{}", self.base_url, path);
            match self.http.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!("Inference service healthy at {}", url);
                    return Ok(());
                }
                Ok(response) => last_error = format!("{} answered HTTP {}", url, response.status().as_u16()),
                Err(e) => last_error = format!("{}: {}", url, e),
            }
        }

        warn!("Inference service health check failed: {}", last_error);
        Err(InferenceError::Unavailable(last_error))
    }

    /// Submit JPEG images for verification
    pub async fn verify_images(&self, jpegs: &[Vec<u8>]) -> Result<VerifyResponse, InferenceError> {
        if jpegs.is_empty() {
            return Err(InferenceError::EmptyBatch);
        }

        let images: Vec<String> = jpegs.iter().map(|jpeg| STANDARD.encode(jpeg)).collect();
        let body = VerifyRequest {
            images: &images,
            confidence_threshold: self.confidence_threshold,
        };

        debug!("Submitting {} images for verification", images.len());
        let response = self
            .http
            .post(format!("{}/verify-images", self.base_url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed = response.json::<VerifyResponse>().await?;
        debug!("Inference status '{}' totals {:?}", parsed.status, parsed.details.totals);
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client(base_url: String) -> InferenceClient {
        InferenceClient::new(InferenceConfig {
            base_url,
            confidence_threshold: 0.4,
            request_timeout: Duration::from_secs(2),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_verify_images_posts_base64_and_threshold() {
        let app = Router::new().route(
            "/verify-images",
            post(|Json(body): Json<Value>| async move {
                let images = body["images"].as_array().cloned().unwrap_or_default();
                let threshold = body["confidence_threshold"].as_f64().unwrap_or(0.0);
                assert_eq!(images.len(), 2);
                assert_eq!(images[0], "AQID");
                assert!((threshold - 0.4).abs() < 1e-6);
                Json(json!({"status": "persona discapacitada", "details": {"totals": {"crutch": 1, "sunglasses": 0}}}))
            }),
        );
        let client = client(serve(app).await);

        let response = client.verify_images(&[vec![1, 2, 3], vec![4]]).await.unwrap();
        assert_eq!(response.status, "persona discapacitada");
        assert_eq!(response.details.totals.get("crutch"), Some(&1));
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let app = Router::new().route(
            "/verify-images",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model crashed") }),
        );
        let client = client(serve(app).await);

        match client.verify_images(&[vec![1]]).await {
            Err(InferenceError::Status { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "model crashed");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_batch_rejected() {
        let client = client("http://127.0.0.1:9".to_string());
        assert!(matches!(client.verify_images(&[]).await, Err(InferenceError::EmptyBatch)));
    }

    #[tokio::test]
    async fn test_health_falls_back_to_root() {
        let app = Router::new().route("/", get(|| async { "ok" }));
        let client = client(serve(app).await);
        client.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn test_health_unreachable() {
        let app = Router::new().route("/health", get(|| async { StatusCode::SERVICE_UNAVAILABLE }));
        let client = client(serve(app).await);
        assert!(matches!(client.health_check().await, Err(InferenceError::Unavailable(_))));
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let result = InferenceClient::new(InferenceConfig {
            confidence_threshold: 1.5,
            ..Default::default()
        });
        assert!(matches!(result, Err(InferenceError::Config(_))));
    }
}
