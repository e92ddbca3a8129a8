//! HTTP client for the hosted detect/compare endpoints.
//!
//! Both endpoints take form-encoded credentials and return JSON that
//! carries an `error_message` field instead of a non-2xx status when
//! the service rejects a request. The adapters degrade every failure
//! mode — transport error, error field, malformed body — to a neutral
//! result (no faces, confidence 0) so a single bad response can never
//! abort a batch of comparisons.

use std::future::Future;
use std::time::Duration;

use facefind_core::{DetectedFace, FaceRect};
use serde::Deserialize;
use thiserror::Error;

const USER_AGENT: &str = concat!("facefind/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum FaceApiError {
    #[error("http client construction failed: {0}")]
    ClientBuild(#[from] reqwest::Error),
}

/// Connection settings for the remote face service.
#[derive(Debug, Clone)]
pub struct FaceServiceConfig {
    /// Endpoint base, e.g. `https://api-us.faceplusplus.com/facepp/v3`.
    pub base_url: String,
    pub api_key: String,
    pub api_secret: String,
    pub timeout: Duration,
}

/// Seam between the match pipeline and the remote service. The
/// pipeline is generic over this so tests can script detection and
/// comparison outcomes.
pub trait FaceService: Send + Sync {
    /// Detect faces in the image at `image_url`. An image with no
    /// detectable face yields an empty list; so does any remote
    /// failure (callers decide whether an absent face is terminal).
    fn detect(&self, image_url: &str) -> impl Future<Output = Vec<DetectedFace>> + Send;

    /// Compare two face tokens, returning the service's similarity
    /// confidence on its native scale. Any failure yields 0.0.
    fn compare(&self, token_a: &str, token_b: &str) -> impl Future<Output = f64> + Send;
}

/// Wire shape of one detected face.
#[derive(Debug, Deserialize)]
struct WireFace {
    face_token: String,
    face_rectangle: WireRect,
}

#[derive(Debug, Deserialize)]
struct WireRect {
    top: i64,
    left: i64,
    width: i64,
    height: i64,
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    faces: Vec<WireFace>,
    error_message: Option<String>,
}

impl DetectResponse {
    fn into_faces(self) -> Vec<DetectedFace> {
        if let Some(msg) = self.error_message {
            tracing::warn!(error = %msg, "face service rejected detect call");
            return Vec::new();
        }
        self.faces
            .into_iter()
            .map(|f| DetectedFace {
                token: f.face_token,
                rect: FaceRect {
                    top: f.face_rectangle.top,
                    left: f.face_rectangle.left,
                    width: f.face_rectangle.width,
                    height: f.face_rectangle.height,
                },
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct CompareResponse {
    confidence: Option<f64>,
    error_message: Option<String>,
}

impl CompareResponse {
    fn confidence_or_zero(self) -> f64 {
        if let Some(msg) = self.error_message {
            tracing::warn!(error = %msg, "face service rejected compare call");
            return 0.0;
        }
        self.confidence.unwrap_or(0.0)
    }
}

/// Reqwest-backed [`FaceService`] implementation.
pub struct FaceServiceClient {
    http: reqwest::Client,
    config: FaceServiceConfig,
}

impl FaceServiceClient {
    pub fn new(config: FaceServiceConfig) -> Result<Self, FaceApiError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()?;
        Ok(Self { http, config })
    }

    fn credentials(&self) -> [(&'static str, &str); 2] {
        [
            ("api_key", self.config.api_key.as_str()),
            ("api_secret", self.config.api_secret.as_str()),
        ]
    }

    async fn post_form<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        form: &[(&str, &str)],
    ) -> Result<T, reqwest::Error> {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), endpoint);
        self.http.post(&url).form(form).send().await?.json::<T>().await
    }
}

impl FaceService for FaceServiceClient {
    async fn detect(&self, image_url: &str) -> Vec<DetectedFace> {
        let [key, secret] = self.credentials();
        let form = [
            key,
            secret,
            ("image_url", image_url),
            ("return_landmark", "0"),
            ("return_attributes", "none"),
        ];

        match self.post_form::<DetectResponse>("detect", &form).await {
            Ok(response) => {
                let faces = response.into_faces();
                tracing::debug!(image_url, count = faces.len(), "detect completed");
                faces
            }
            Err(err) => {
                tracing::warn!(image_url, error = %err, "detect call failed; treating as no faces");
                Vec::new()
            }
        }
    }

    async fn compare(&self, token_a: &str, token_b: &str) -> f64 {
        let [key, secret] = self.credentials();
        let form = [key, secret, ("face_token1", token_a), ("face_token2", token_b)];

        match self.post_form::<CompareResponse>("compare", &form).await {
            Ok(response) => response.confidence_or_zero(),
            Err(err) => {
                tracing::warn!(error = %err, "compare call failed; treating as confidence 0");
                0.0
            }
        }
    }
}
