pub(crate) mod aggregate;
pub(crate) mod diagram;
pub(crate) mod layout;
pub(crate) mod ocr;
pub(crate) mod runner;
pub(crate) mod scoring;
pub(crate) mod text;

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::services::inference::{InferenceError, RegionBox};
    use crate::services::provider::{
        Embedder, ModelProvider, Recognizer, RegionDetector,
    };

    /// In-memory provider for stage tests. Models not registered behave like
    /// an unreachable inference server.
    #[derive(Default)]
    pub(crate) struct StubProvider {
        pub(crate) text_by_model: HashMap<String, String>,
        pub(crate) boxes: Option<Vec<RegionBox>>,
        pub(crate) embeddings: HashMap<String, Vec<f32>>,
    }

    struct FixedRecognizer(String);

    #[async_trait]
    impl Recognizer for FixedRecognizer {
        async fn recognize(&self, _image_b64: &str) -> Result<String, InferenceError> {
            Ok(self.0.clone())
        }
    }

    struct FixedDetector(Vec<RegionBox>);

    #[async_trait]
    impl RegionDetector for FixedDetector {
        async fn detect(&self, _image_b64: &str) -> Result<Vec<RegionBox>, InferenceError> {
            Ok(self.0.clone())
        }
    }

    struct MapEmbedder(HashMap<String, Vec<f32>>);

    #[async_trait]
    impl Embedder for MapEmbedder {
        async fn encode(&self, text: &str) -> Result<Vec<f32>, InferenceError> {
            self.0
                .get(text)
                .cloned()
                .ok_or_else(|| InferenceError::Api("no embedding for input".to_string()))
        }
    }

    #[async_trait]
    impl ModelProvider for StubProvider {
        async fn recognizer(&self, model: &str) -> Result<Arc<dyn Recognizer>, InferenceError> {
            match self.text_by_model.get(model) {
                Some(text) => Ok(Arc::new(FixedRecognizer(text.clone()))),
                None => Err(InferenceError::NotConfigured),
            }
        }

        async fn region_detector(
            &self,
            _model: &str,
        ) -> Result<Arc<dyn RegionDetector>, InferenceError> {
            match &self.boxes {
                Some(boxes) => Ok(Arc::new(FixedDetector(boxes.clone()))),
                None => Err(InferenceError::NotConfigured),
            }
        }

        async fn embedder(&self, _model: &str) -> Result<Arc<dyn Embedder>, InferenceError> {
            if self.embeddings.is_empty() {
                return Err(InferenceError::NotConfigured);
            }
            Ok(Arc::new(MapEmbedder(self.embeddings.clone())))
        }
    }
}
