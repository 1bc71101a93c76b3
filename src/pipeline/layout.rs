//! Page layout stage. Detects answer regions on the sheet and labels them in
//! reading order so a multi-question page can be split later.

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::services::inference::RegionBox;
use crate::services::provider::ModelProvider;

const STUB_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, Serialize)]
pub(crate) struct QuestionSegment {
    pub(crate) question: String,
    pub(crate) bbox: [f64; 4],
    pub(crate) label: String,
    pub(crate) confidence: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct LayoutOutcome {
    pub(crate) boxes: Vec<RegionBox>,
    pub(crate) confidence: f64,
    pub(crate) question_segments: Vec<QuestionSegment>,
}

pub(crate) struct LayoutStage {
    provider: Arc<dyn ModelProvider>,
    model: String,
}

impl LayoutStage {
    pub(crate) fn new(provider: Arc<dyn ModelProvider>, model: String) -> Self {
        Self { provider, model }
    }

    /// Never errors. When the detector is unavailable or finds nothing, the
    /// outcome is an empty layout at the neutral stub confidence so grading
    /// can still proceed on the whole page.
    pub(crate) async fn detect(&self, image_b64: &str) -> LayoutOutcome {
        let boxes = match self.provider.region_detector(&self.model).await {
            Ok(detector) => match detector.detect(image_b64).await {
                Ok(boxes) => boxes,
                Err(err) => {
                    warn!(error = %err, "layout detection failed");
                    Vec::new()
                }
            },
            Err(err) => {
                warn!(error = %err, "layout detector unavailable");
                Vec::new()
            }
        };

        Self::from_boxes(boxes)
    }

    fn from_boxes(mut boxes: Vec<RegionBox>) -> LayoutOutcome {
        if boxes.is_empty() {
            return LayoutOutcome {
                boxes,
                confidence: STUB_CONFIDENCE,
                question_segments: Vec::new(),
            };
        }

        // Reading order: top of the page first.
        boxes.sort_by(|a, b| a.bbox[1].total_cmp(&b.bbox[1]));

        let confidence =
            boxes.iter().map(|b| b.confidence).sum::<f64>() / boxes.len() as f64;
        let question_segments = boxes
            .iter()
            .enumerate()
            .map(|(index, region)| QuestionSegment {
                question: format!("Q{}", index + 1),
                bbox: region.bbox,
                label: region.label.clone(),
                confidence: region.confidence,
            })
            .collect();

        LayoutOutcome {
            boxes,
            confidence,
            question_segments,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::LayoutStage;
    use crate::pipeline::testing::StubProvider;
    use crate::services::inference::RegionBox;

    fn region(y1: f64, confidence: f64) -> RegionBox {
        RegionBox {
            bbox: [10.0, y1, 400.0, y1 + 120.0],
            confidence,
            label: "handwritten_text".to_string(),
        }
    }

    #[tokio::test]
    async fn averages_confidence_and_numbers_segments_top_down() {
        let provider = StubProvider {
            boxes: Some(vec![region(300.0, 0.9), region(40.0, 0.7)]),
            ..StubProvider::default()
        };
        let stage = LayoutStage::new(Arc::new(provider), "layout".to_string());

        let outcome = stage.detect("aW1n").await;
        assert!((outcome.confidence - 0.8).abs() < 1e-9);
        assert_eq!(outcome.question_segments.len(), 2);
        assert_eq!(outcome.question_segments[0].question, "Q1");
        assert_eq!(outcome.question_segments[0].bbox[1], 40.0);
        assert_eq!(outcome.question_segments[1].question, "Q2");
    }

    #[tokio::test]
    async fn missing_detector_yields_stub_layout() {
        let stage = LayoutStage::new(Arc::new(StubProvider::default()), "layout".to_string());

        let outcome = stage.detect("aW1n").await;
        assert!(outcome.boxes.is_empty());
        assert_eq!(outcome.confidence, 0.5);
        assert!(outcome.question_segments.is_empty());
    }

    #[tokio::test]
    async fn empty_detection_yields_stub_confidence() {
        let provider = StubProvider {
            boxes: Some(Vec::new()),
            ..StubProvider::default()
        };
        let stage = LayoutStage::new(Arc::new(provider), "layout".to_string());

        let outcome = stage.detect("aW1n").await;
        assert_eq!(outcome.confidence, 0.5);
    }
}
