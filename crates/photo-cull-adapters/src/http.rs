//! HTTP client for the remote scoring service.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use photo_cull_core::{AiScore, BackendError, BlurMeasurement, FaceDetection, QualityAssessor};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const USER_AGENT: &str = concat!("photo-cull/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct FacesResponse {
    #[serde(default)]
    count: Option<usize>,
    #[serde(default)]
    faces: Vec<FaceDetection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlurResponse {
    score: f32,
    is_blurry: bool,
}

#[derive(Debug, Deserialize)]
struct SimilarityResponse {
    score: f32,
}

/// Assessor backed by an HTTP scoring service.
///
/// Every capability is a `POST` with the image uploaded as multipart form
/// data: `{base}/quality`, `{base}/faces` and `{base}/blur` take an `image`
/// part, `{base}/similarity` takes `image_a` and `image_b`.
pub struct HttpAssessor {
    http_client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpAssessor {
    /// Creates a client for the service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Creates a client with a custom per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Service base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        images: &[(&'static str, &Path)],
    ) -> Result<T, BackendError> {
        let mut form = Form::new();
        for &(field, path) in images {
            form = form.part(field, image_part(path).await?);
        }

        let url = format!("{}/{endpoint}", self.base_url);
        debug!(url = %url, "calling scoring service");

        let response = self
            .http_client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(status_error(status, message));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(&e))?;
        serde_json::from_slice(&body).map_err(|e| BackendError::Malformed(e.to_string()))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn transport_error(&self, error: &reqwest::Error) -> BackendError {
        if error.is_timeout() {
            BackendError::Timeout(self.timeout.as_millis() as u64)
        } else {
            BackendError::Connection(error.to_string())
        }
    }
}

impl std::fmt::Debug for HttpAssessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAssessor")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

async fn image_part(path: &Path) -> Result<Part, BackendError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| BackendError::InvalidInput(format!("{}: {e}", path.display())))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    Ok(Part::bytes(bytes).file_name(name))
}

/// Maps an error status to the backend error taxonomy.
fn status_error(status: StatusCode, message: String) -> BackendError {
    match status.as_u16() {
        400 | 413 | 415 | 422 => BackendError::InvalidInput(if message.is_empty() {
            status.to_string()
        } else {
            message
        }),
        code => {
            if code != 429 && code < 500 {
                warn!(status = code, "scoring service refused the request");
            }
            BackendError::Http {
                status: code,
                message,
            }
        }
    }
}

#[async_trait]
impl QualityAssessor for HttpAssessor {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn assess_quality(&self, image: &Path) -> Result<AiScore, BackendError> {
        self.post("quality", &[("image", image)]).await
    }

    async fn detect_faces(&self, image: &Path) -> Result<Vec<FaceDetection>, BackendError> {
        let response: FacesResponse = self.post("faces", &[("image", image)]).await?;
        if let Some(count) = response.count.filter(|&c| c != response.faces.len()) {
            debug!(count, listed = response.faces.len(), "face count mismatch");
        }
        Ok(response.faces)
    }

    async fn detect_blur(&self, image: &Path) -> Result<BlurMeasurement, BackendError> {
        let response: BlurResponse = self.post("blur", &[("image", image)]).await?;
        Ok(BlurMeasurement {
            score: response.score,
            is_blurry: response.is_blurry,
        })
    }

    async fn compare_similarity(&self, a: &Path, b: &Path) -> Result<f32, BackendError> {
        let response: SimilarityResponse = self
            .post("similarity", &[("image_a", a), ("image_b", b)])
            .await?;
        Ok(response.score)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::UNPROCESSABLE_ENTITY, "bad image".into()),
            BackendError::InvalidInput(m) if m == "bad image"
        ));
        assert!(matches!(
            status_error(StatusCode::PAYLOAD_TOO_LARGE, String::new()),
            BackendError::InvalidInput(_)
        ));

        let err = status_error(StatusCode::SERVICE_UNAVAILABLE, String::new());
        assert!(err.is_transient());
        let err = status_error(StatusCode::TOO_MANY_REQUESTS, String::new());
        assert!(err.is_transient());
        let err = status_error(StatusCode::NOT_FOUND, String::new());
        assert!(matches!(err, BackendError::Http { status: 404, .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let assessor = HttpAssessor::new("http://localhost:8000/").unwrap();
        assert_eq!(assessor.base_url(), "http://localhost:8000");
    }

    #[test]
    fn test_blur_response_field_names() {
        let response: BlurResponse =
            serde_json::from_str(r#"{"score": 42.5, "isBlurry": true}"#).unwrap();
        assert!((response.score - 42.5).abs() < f32::EPSILON);
        assert!(response.is_blurry);
    }
}
