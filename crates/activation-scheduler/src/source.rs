//! Where the working-hours window comes from

use crate::{ScheduleError, ScheduleWindow};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait ScheduleSource: Send + Sync {
    async fn fetch(&self) -> Result<ScheduleWindow, ScheduleError>;
}

/// Fixed window, for kiosks without a configuration backend
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticScheduleSource(pub ScheduleWindow);

#[async_trait]
impl ScheduleSource for StaticScheduleSource {
    async fn fetch(&self) -> Result<ScheduleWindow, ScheduleError> {
        Ok(self.0)
    }
}

#[derive(Debug, Deserialize)]
struct ScheduleBody {
    #[serde(rename = "horaInicio")]
    start: Option<String>,
    #[serde(rename = "horaFin")]
    end: Option<String>,
}

/// `GET {base_url}/{schedule_path}/{team_id}` returning
/// `{"horaInicio": "HH:MM[:SS]", "horaFin": "HH:MM[:SS]"}`
pub struct HttpScheduleSource {
    http: reqwest::Client,
    url: String,
}

impl HttpScheduleSource {
    pub fn new(base_url: &str, schedule_path: &str, team_id: &str, timeout: Duration) -> Result<Self, ScheduleError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ScheduleError::ConfigurationUnavailable(e.to_string()))?;

        let url = format!(
            "{}/{}/{}",
            base_url.trim_end_matches('/'),
            schedule_path.trim_matches('/'),
            team_id
        );
        Ok(Self { http, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ScheduleSource for HttpScheduleSource {
    async fn fetch(&self) -> Result<ScheduleWindow, ScheduleError> {
        let unavailable = |e: reqwest::Error| ScheduleError::ConfigurationUnavailable(e.to_string());

        let response = self.http.get(&self.url).send().await.map_err(unavailable)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScheduleError::ConfigurationUnavailable(format!(
                "{} answered HTTP {}",
                self.url,
                status.as_u16()
            )));
        }

        let body: ScheduleBody = response.json().await.map_err(unavailable)?;
        debug!("Schedule from {}: {:?}", self.url, body);
        Ok(ScheduleWindow::from_times(body.start.as_deref(), body.end.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn source(base: &str) -> HttpScheduleSource {
        HttpScheduleSource::new(base, "/horarios/", "T-7", Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_fetches_window() {
        let app = Router::new().route(
            "/horarios/T-7",
            get(|| async { Json(json!({ "horaInicio": "07:00:00", "horaFin": "19:30:00" })) }),
        );
        let base = serve(app).await;
        let window = source(&base).fetch().await.unwrap();
        assert_eq!(window, ScheduleWindow::new(7, 19).unwrap());
    }

    #[tokio::test]
    async fn test_missing_field_yields_default() {
        let app = Router::new().route("/horarios/T-7", get(|| async { Json(json!({ "horaInicio": "07:00" })) }));
        let base = serve(app).await;
        assert_eq!(source(&base).fetch().await.unwrap(), ScheduleWindow::default());
    }

    #[tokio::test]
    async fn test_http_error_is_unavailable() {
        let app = Router::new().route("/horarios/T-7", get(|| async { StatusCode::SERVICE_UNAVAILABLE }));
        let base = serve(app).await;
        assert!(matches!(
            source(&base).fetch().await,
            Err(ScheduleError::ConfigurationUnavailable(_))
        ));
    }

    #[test]
    fn test_url_joining() {
        assert_eq!(source("http://backend/api/").url(), "http://backend/api/horarios/T-7");
    }
}
