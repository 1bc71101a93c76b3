//! Handwriting recognition stage. Tries the transformer recognizer for the
//! expected language first and falls back to the classical engine when the
//! primary produces nothing usable.

use std::sync::{Arc, OnceLock};

use lingua::{Language, LanguageDetector, LanguageDetectorBuilder};
use tracing::warn;

use crate::services::provider::ModelProvider;

/// Stage confidences are fixed per engine rather than read from the models.
/// The aggregation weights downstream are calibrated against these values.
const PRIMARY_CONFIDENCE_EN: f64 = 0.85;
const PRIMARY_CONFIDENCE_OTHER: f64 = 0.8;
const FALLBACK_CONFIDENCE: f64 = 0.6;

#[derive(Debug, Clone)]
pub(crate) struct OcrOutcome {
    pub(crate) text: String,
    pub(crate) confidence: f64,
    pub(crate) language: String,
    pub(crate) engine: &'static str,
}

pub(crate) struct OcrStage {
    provider: Arc<dyn ModelProvider>,
    model_en: String,
    model_hi: String,
    fallback_model: String,
}

impl OcrStage {
    pub(crate) fn new(
        provider: Arc<dyn ModelProvider>,
        model_en: String,
        model_hi: String,
        fallback_model: String,
    ) -> Self {
        Self {
            provider,
            model_en,
            model_hi,
            fallback_model,
        }
    }

    /// Runs recognition on a base64-encoded page image. `language_hint` comes
    /// from the submission; `auto` or empty means assume English. Never
    /// errors: when every engine fails the outcome carries empty text with
    /// zero confidence and the caller decides what to do with it.
    pub(crate) async fn run(&self, image_b64: &str, language_hint: Option<&str>) -> OcrOutcome {
        let target = match language_hint {
            Some(hint) if !hint.is_empty() && hint != "auto" => hint,
            _ => "en",
        };
        let primary_model = if target.starts_with("hi") {
            &self.model_hi
        } else {
            &self.model_en
        };

        match self.recognize_with(primary_model, image_b64).await {
            Some(text) if !text.trim().is_empty() => {
                let language = detect_language(&text, target);
                let confidence = if language.starts_with("en") {
                    PRIMARY_CONFIDENCE_EN
                } else {
                    PRIMARY_CONFIDENCE_OTHER
                };
                return OcrOutcome {
                    text,
                    confidence,
                    language,
                    engine: "trocr",
                };
            }
            _ => warn!(model = %primary_model, "primary recognizer produced no text"),
        }

        match self.recognize_with(&self.fallback_model, image_b64).await {
            Some(text) if !text.trim().is_empty() => {
                let language = detect_language(&text, target);
                OcrOutcome {
                    text,
                    confidence: FALLBACK_CONFIDENCE,
                    language,
                    engine: "tesseract",
                }
            }
            _ => {
                warn!("all recognizers failed, grading will see an empty answer");
                OcrOutcome {
                    text: String::new(),
                    confidence: 0.0,
                    language: target.to_string(),
                    engine: "none",
                }
            }
        }
    }

    async fn recognize_with(&self, model: &str, image_b64: &str) -> Option<String> {
        let recognizer = match self.provider.recognizer(model).await {
            Ok(recognizer) => recognizer,
            Err(err) => {
                warn!(model = %model, error = %err, "recognizer unavailable");
                return None;
            }
        };
        match recognizer.recognize(image_b64).await {
            Ok(text) => Some(text),
            Err(err) => {
                warn!(model = %model, error = %err, "recognition failed");
                None
            }
        }
    }
}

fn detector() -> &'static LanguageDetector {
    static DETECTOR: OnceLock<LanguageDetector> = OnceLock::new();
    DETECTOR.get_or_init(|| {
        LanguageDetectorBuilder::from_languages(&[Language::English, Language::Hindi]).build()
    })
}

/// Detects the language of recognized text, falling back to the expected
/// language when the text is too short or ambiguous to classify.
pub(crate) fn detect_language(text: &str, fallback: &str) -> String {
    if text.trim().is_empty() {
        return fallback.to_string();
    }
    match detector().detect_language_of(text) {
        Some(Language::Hindi) => "hi".to_string(),
        Some(Language::English) => "en".to_string(),
        _ => fallback.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::{detect_language, OcrStage};
    use crate::pipeline::testing::StubProvider;

    fn stage(texts: &[(&str, &str)]) -> OcrStage {
        let provider = StubProvider {
            text_by_model: texts
                .iter()
                .map(|(model, text)| (model.to_string(), text.to_string()))
                .collect(),
            ..StubProvider::default()
        };
        OcrStage::new(
            Arc::new(provider),
            "primary-en".to_string(),
            "primary-hi".to_string(),
            "fallback".to_string(),
        )
    }

    #[test]
    fn detects_english_and_hindi() {
        assert_eq!(detect_language("the cell is the basic unit of life", "hi"), "en");
        assert_eq!(detect_language("कोशिका जीवन की मूल इकाई है", "en"), "hi");
    }

    #[test]
    fn empty_text_uses_fallback_language() {
        assert_eq!(detect_language("", "hi"), "hi");
        assert_eq!(detect_language("   ", "en"), "en");
    }

    #[tokio::test]
    async fn primary_english_result_gets_high_confidence() {
        let stage = stage(&[("primary-en", "the plant makes food in its leaves")]);
        let outcome = stage.run("aW1n", None).await;
        assert_eq!(outcome.text, "the plant makes food in its leaves");
        assert_eq!(outcome.confidence, 0.85);
        assert_eq!(outcome.language, "en");
        assert_eq!(outcome.engine, "trocr");
    }

    #[tokio::test]
    async fn hindi_hint_routes_to_hindi_model() {
        let stage = stage(&[("primary-hi", "पौधा अपनी पत्तियों में भोजन बनाता है")]);
        let outcome = stage.run("aW1n", Some("hi")).await;
        assert_eq!(outcome.confidence, 0.8);
        assert_eq!(outcome.language, "hi");
    }

    #[tokio::test]
    async fn falls_back_when_primary_is_empty() {
        let stage = stage(&[("primary-en", "   "), ("fallback", "water and sunlight")]);
        let outcome = stage.run("aW1n", Some("en")).await;
        assert_eq!(outcome.text, "water and sunlight");
        assert_eq!(outcome.confidence, 0.6);
        assert_eq!(outcome.engine, "tesseract");
    }

    #[tokio::test]
    async fn total_failure_yields_empty_outcome() {
        let stage = stage(&[]);
        let outcome = stage.run("aW1n", Some("hi")).await;
        assert_eq!(outcome.text, "");
        assert_eq!(outcome.confidence, 0.0);
        assert_eq!(outcome.language, "hi");
        assert_eq!(outcome.engine, "none");
    }

    #[tokio::test]
    async fn auto_hint_means_english() {
        let stage = OcrStage::new(
            Arc::new(StubProvider {
                text_by_model: HashMap::from([(
                    "primary-en".to_string(),
                    "roots absorb water".to_string(),
                )]),
                ..StubProvider::default()
            }),
            "primary-en".to_string(),
            "primary-hi".to_string(),
            "fallback".to_string(),
        );
        let outcome = stage.run("aW1n", Some("auto")).await;
        assert_eq!(outcome.engine, "trocr");
        assert_eq!(outcome.language, "en");
    }
}
