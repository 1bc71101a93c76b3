//! HTTP client for the model inference server. Every model the pipeline uses
//! (handwriting recognition, layout detection, sentence embeddings) sits
//! behind this one service, addressed by model name.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::core::config::Settings;

#[derive(Debug, thiserror::Error)]
pub(crate) enum InferenceError {
    #[error("inference server is not configured")]
    NotConfigured,
    #[error("inference request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("inference server returned an error: {0}")]
    Api(String),
    #[error("malformed inference response: {0}")]
    MalformedResponse(String),
}

/// A detected region on the page, in pixel coordinates `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct RegionBox {
    pub(crate) bbox: [f64; 4],
    pub(crate) confidence: f64,
    pub(crate) label: String,
}

#[derive(Debug, Clone)]
pub(crate) struct InferenceClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl InferenceClient {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self, InferenceError> {
        let inference = settings.inference();
        if inference.base_url.is_empty() {
            return Err(InferenceError::NotConfigured);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(inference.request_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: inference.base_url.trim_end_matches('/').to_string(),
            api_key: inference.api_key.clone(),
        })
    }

    /// Asks the server to load model weights ahead of the first request.
    pub(crate) async fn load(&self, model: &str) -> Result<(), InferenceError> {
        let response = self
            .client
            .post(format!("{}/models/{}/load", self.base_url, model))
            .header("X-Api-Key", &self.api_key)
            .send()
            .await?;

        Self::check_status(response).await?;
        Ok(())
    }

    pub(crate) async fn recognize(
        &self,
        model: &str,
        image_b64: &str,
    ) -> Result<String, InferenceError> {
        let response = self
            .client
            .post(format!("{}/models/{}/recognize", self.base_url, model))
            .header("X-Api-Key", &self.api_key)
            .json(&json!({ "image": image_b64 }))
            .send()
            .await?;

        let body: serde_json::Value = Self::check_status(response).await?.json().await?;
        body.get("text")
            .and_then(|value| value.as_str())
            .map(str::to_string)
            .ok_or_else(|| InferenceError::MalformedResponse("missing text field".to_string()))
    }

    pub(crate) async fn detect(
        &self,
        model: &str,
        image_b64: &str,
    ) -> Result<Vec<RegionBox>, InferenceError> {
        let response = self
            .client
            .post(format!("{}/models/{}/detect", self.base_url, model))
            .header("X-Api-Key", &self.api_key)
            .json(&json!({ "image": image_b64 }))
            .send()
            .await?;

        #[derive(Deserialize)]
        struct DetectResponse {
            boxes: Vec<RegionBox>,
        }

        let body: DetectResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|err| InferenceError::MalformedResponse(err.to_string()))?;
        Ok(body.boxes)
    }

    pub(crate) async fn embed(
        &self,
        model: &str,
        text: &str,
    ) -> Result<Vec<f32>, InferenceError> {
        let response = self
            .client
            .post(format!("{}/models/{}/embed", self.base_url, model))
            .header("X-Api-Key", &self.api_key)
            .json(&json!({ "inputs": [text] }))
            .send()
            .await?;

        #[derive(Deserialize)]
        struct EmbedResponse {
            embeddings: Vec<Vec<f32>>,
        }

        let body: EmbedResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|err| InferenceError::MalformedResponse(err.to_string()))?;
        body.embeddings
            .into_iter()
            .next()
            .ok_or_else(|| InferenceError::MalformedResponse("empty embeddings".to_string()))
    }

    async fn check_status(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, InferenceError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(InferenceError::Api(format!("{status}: {body}")))
    }
}
