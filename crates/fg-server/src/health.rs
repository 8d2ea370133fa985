//! Health checks
//!
//! Reports process uptime and whether the upload directory is usable.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::warn;

use crate::AppState;

/// Health check status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy | Self::Degraded)
    }
}

/// Individual component health
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Overall health report
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: Vec<ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl HealthReport {
    pub fn http_status(&self) -> StatusCode {
        match self.status {
            HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

pub struct HealthChecker {
    start_time: Instant,
    upload_dir: PathBuf,
}

impl HealthChecker {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            start_time: Instant::now(),
            upload_dir: upload_dir.into(),
        }
    }

    pub async fn check(&self) -> HealthReport {
        let storage = self.check_storage().await;

        HealthReport {
            status: storage.status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            components: vec![storage],
            timestamp: chrono::Utc::now(),
        }
    }

    async fn check_storage(&self) -> ComponentHealth {
        let start = Instant::now();

        let (status, message) = match tokio::fs::metadata(&self.upload_dir).await {
            Ok(meta) if meta.is_dir() && meta.permissions().readonly() => (
                HealthStatus::Unhealthy,
                "Upload directory is read-only".to_string(),
            ),
            Ok(meta) if meta.is_dir() => (
                HealthStatus::Healthy,
                "Upload directory available".to_string(),
            ),
            Ok(_) => (
                HealthStatus::Unhealthy,
                "Upload path is not a directory".to_string(),
            ),
            // Created on the first upload
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (
                HealthStatus::Degraded,
                "Upload directory does not exist yet".to_string(),
            ),
            Err(e) => {
                warn!(path = ?self.upload_dir, error = %e, "Upload directory check failed");
                (HealthStatus::Unhealthy, e.to_string())
            }
        };

        ComponentHealth {
            name: "storage".to_string(),
            status,
            message: Some(message),
            response_time_ms: start.elapsed().as_millis() as u64,
            details: Some(serde_json::json!({
                "path": self.upload_dir.display().to_string(),
            })),
        }
    }
}

/// Simple liveness check
pub async fn liveness() -> &'static str {
    "OK"
}

/// Full health report
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthReport>) {
    let report = state.health.check().await;
    let status = report.http_status();
    (status, Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_existing_directory_is_healthy() {
        let dir = tempfile::tempdir().unwrap();
        let report = HealthChecker::new(dir.path()).check().await;

        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.components[0].name, "storage");
        assert_eq!(report.http_status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_directory_is_degraded() {
        let dir = tempfile::tempdir().unwrap();
        let report = HealthChecker::new(dir.path().join("later")).check().await;

        assert_eq!(report.status, HealthStatus::Degraded);
        assert!(report.status.is_healthy());
    }

    #[tokio::test]
    async fn test_file_path_is_unhealthy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-a-dir");
        std::fs::write(&path, b"x").unwrap();

        let report = HealthChecker::new(&path).check().await;
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert_eq!(report.http_status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
