//! Model access behind capability traits. Pipeline stages ask the provider
//! for a recognizer, detector or embedder by model name and never talk to the
//! inference transport directly, so a stage cannot tell a remote model from a
//! local or stubbed one.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::services::inference::{InferenceClient, InferenceError, RegionBox};

#[async_trait]
pub(crate) trait Recognizer: Send + Sync {
    async fn recognize(&self, image_b64: &str) -> Result<String, InferenceError>;
}

#[async_trait]
pub(crate) trait RegionDetector: Send + Sync {
    async fn detect(&self, image_b64: &str) -> Result<Vec<RegionBox>, InferenceError>;
}

#[async_trait]
pub(crate) trait Embedder: Send + Sync {
    async fn encode(&self, text: &str) -> Result<Vec<f32>, InferenceError>;
}

#[async_trait]
pub(crate) trait ModelProvider: Send + Sync {
    async fn recognizer(&self, model: &str) -> Result<Arc<dyn Recognizer>, InferenceError>;

    async fn region_detector(
        &self,
        model: &str,
    ) -> Result<Arc<dyn RegionDetector>, InferenceError>;

    async fn embedder(&self, model: &str) -> Result<Arc<dyn Embedder>, InferenceError>;
}

struct RemoteModel {
    client: InferenceClient,
    model: String,
}

#[async_trait]
impl Recognizer for RemoteModel {
    async fn recognize(&self, image_b64: &str) -> Result<String, InferenceError> {
        self.client.recognize(&self.model, image_b64).await
    }
}

#[async_trait]
impl RegionDetector for RemoteModel {
    async fn detect(&self, image_b64: &str) -> Result<Vec<RegionBox>, InferenceError> {
        self.client.detect(&self.model, image_b64).await
    }
}

#[async_trait]
impl Embedder for RemoteModel {
    async fn encode(&self, text: &str) -> Result<Vec<f32>, InferenceError> {
        self.client.embed(&self.model, text).await
    }
}

/// Provider backed by the inference server. Each model is warmed up once via
/// the load endpoint; subsequent lookups reuse the cached handle. Without a
/// configured server every lookup reports `NotConfigured` and the stages run
/// on their fallbacks.
pub(crate) struct RemoteModelProvider {
    client: Option<InferenceClient>,
    handles: Mutex<HashMap<String, Arc<RemoteModel>>>,
}

impl RemoteModelProvider {
    pub(crate) fn from_settings(
        settings: &crate::core::config::Settings,
    ) -> Result<Self, InferenceError> {
        let client = match InferenceClient::from_settings(settings) {
            Ok(client) => Some(client),
            Err(InferenceError::NotConfigured) => {
                tracing::warn!("inference server not configured, model stages will degrade");
                None
            }
            Err(err) => return Err(err),
        };

        Ok(Self {
            client,
            handles: Mutex::new(HashMap::new()),
        })
    }

    async fn handle(&self, model: &str) -> Result<Arc<RemoteModel>, InferenceError> {
        let client = self.client.as_ref().ok_or(InferenceError::NotConfigured)?;

        let mut handles = self.handles.lock().await;
        if let Some(handle) = handles.get(model) {
            return Ok(handle.clone());
        }

        client.load(model).await?;
        let handle = Arc::new(RemoteModel {
            client: client.clone(),
            model: model.to_string(),
        });
        handles.insert(model.to_string(), handle.clone());
        Ok(handle)
    }
}

#[async_trait]
impl ModelProvider for RemoteModelProvider {
    async fn recognizer(&self, model: &str) -> Result<Arc<dyn Recognizer>, InferenceError> {
        let handle = self.handle(model).await?;
        Ok(handle)
    }

    async fn region_detector(
        &self,
        model: &str,
    ) -> Result<Arc<dyn RegionDetector>, InferenceError> {
        let handle = self.handle(model).await?;
        Ok(handle)
    }

    async fn embedder(&self, model: &str) -> Result<Arc<dyn Embedder>, InferenceError> {
        let handle = self.handle(model).await?;
        Ok(handle)
    }
}
