//! Final aggregation. Pure functions that fold the stage outcomes into one
//! confidence figure, the review decision and the persisted breakdown.

use serde_json::{json, Value};

use crate::pipeline::diagram::DiagramOutcome;
use crate::pipeline::layout::LayoutOutcome;
use crate::pipeline::ocr::OcrOutcome;
use crate::pipeline::scoring::ScoreOutcome;

pub(crate) const REVIEW_THRESHOLD: f64 = 0.7;

const OCR_WEIGHT: f64 = 0.4;
const SEMANTIC_WEIGHT: f64 = 0.5;
const LAYOUT_WEIGHT: f64 = 0.1;

#[derive(Debug, Clone)]
pub(crate) struct AggregateOutcome {
    pub(crate) final_marks: f64,
    pub(crate) confidence: f64,
    pub(crate) flagged_for_review: bool,
    pub(crate) details: Value,
}

pub(crate) fn compute_final_confidence(
    ocr_confidence: f64,
    semantic_score: f64,
    layout_confidence: f64,
) -> f64 {
    round4(
        ocr_confidence * OCR_WEIGHT
            + semantic_score * SEMANTIC_WEIGHT
            + layout_confidence * LAYOUT_WEIGHT,
    )
}

pub(crate) fn flag_for_review(confidence: f64) -> bool {
    confidence < REVIEW_THRESHOLD
}

pub(crate) fn aggregate_scores(
    ocr: &OcrOutcome,
    scoring: &ScoreOutcome,
    layout: &LayoutOutcome,
    diagram: &DiagramOutcome,
) -> AggregateOutcome {
    let confidence =
        compute_final_confidence(ocr.confidence, scoring.semantic_score, layout.confidence);
    let flagged_for_review = flag_for_review(confidence);

    let final_marks = (scoring.raw_score * diagram.marks_multiplier)
        .min(scoring.max_marks)
        .max(0.0);

    let details = json!({
        "ocr": {
            "text": &ocr.text,
            "confidence": ocr.confidence,
            "language": &ocr.language,
            "engine": ocr.engine,
        },
        "scoring": {
            "keyword_score": scoring.keyword_score,
            "semantic_score": scoring.semantic_score,
            "matched_keywords": &scoring.matched_keywords,
            "missing_keywords": &scoring.missing_keywords,
            "answer_type": scoring.answer_type,
            "language": &scoring.language,
            "answer_type_weight": scoring.answer_type_weight,
            "raw_score": scoring.raw_score,
            "max_marks": scoring.max_marks,
            "translated": scoring.translated,
            "semantic_fallback": scoring.semantic_fallback,
            "diagram_multiplier": diagram.marks_multiplier,
            "final_marks": final_marks,
        },
        "layout": {
            "confidence": layout.confidence,
            "boxes": &layout.boxes,
            "question_segments": &layout.question_segments,
        },
        "diagram": {
            "has_diagram": diagram.has_diagram,
            "edge_density": diagram.edge_density,
            "marks_multiplier": diagram.marks_multiplier,
        },
    });

    AggregateOutcome {
        final_marks,
        confidence,
        flagged_for_review,
        details,
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::{aggregate_scores, compute_final_confidence, flag_for_review};
    use crate::db::types::AnswerType;
    use crate::pipeline::diagram::DiagramOutcome;
    use crate::pipeline::layout::LayoutOutcome;
    use crate::pipeline::ocr::OcrOutcome;
    use crate::pipeline::scoring::ScoreOutcome;
    use crate::services::inference::RegionBox;

    fn ocr(confidence: f64) -> OcrOutcome {
        OcrOutcome {
            text: "the water cycle has four stages".to_string(),
            confidence,
            language: "en".to_string(),
            engine: "trocr",
        }
    }

    fn scoring(semantic: f64, raw: f64, max: f64) -> ScoreOutcome {
        ScoreOutcome {
            keyword_score: 0.8,
            semantic_score: semantic,
            matched_keywords: vec!["evaporation".to_string()],
            missing_keywords: vec!["condensation".to_string()],
            answer_type: AnswerType::Short,
            language: "en".to_string(),
            answer_type_weight: 1.0,
            raw_score: raw,
            final_score: raw.min(max),
            max_marks: max,
            translated: false,
            semantic_fallback: false,
        }
    }

    fn layout(confidence: f64) -> LayoutOutcome {
        LayoutOutcome {
            boxes: Vec::new(),
            confidence,
            question_segments: Vec::new(),
        }
    }

    fn diagram(multiplier: f64) -> DiagramOutcome {
        DiagramOutcome {
            has_diagram: multiplier >= 1.0,
            edge_density: 0.08,
            marks_multiplier: multiplier,
        }
    }

    #[test]
    fn strong_signals_clear_the_review_threshold() {
        let confidence = compute_final_confidence(0.85, 0.8, 0.7);
        assert_eq!(confidence, 0.81);
        assert!(!flag_for_review(confidence));
    }

    #[test]
    fn weak_signals_get_flagged() {
        let confidence = compute_final_confidence(0.6, 0.5, 0.7);
        assert_eq!(confidence, 0.56);
        assert!(flag_for_review(confidence));
    }

    #[test]
    fn threshold_itself_is_not_flagged() {
        assert!(!flag_for_review(0.7));
        assert!(flag_for_review(0.6999));
    }

    #[test]
    fn diagram_multiplier_halves_the_raw_score() {
        let outcome = aggregate_scores(
            &ocr(0.85),
            &scoring(0.8, 9.0, 10.0),
            &layout(0.7),
            &diagram(0.5),
        );
        assert_eq!(outcome.final_marks, 4.5);
        assert_eq!(outcome.confidence, 0.81);
        assert!(!outcome.flagged_for_review);
    }

    #[test]
    fn adjusted_marks_stay_within_bounds() {
        let overflow = aggregate_scores(
            &ocr(0.85),
            &scoring(1.0, 12.0, 10.0),
            &layout(0.7),
            &diagram(1.0),
        );
        assert_eq!(overflow.final_marks, 10.0);

        let floor = aggregate_scores(
            &ocr(0.0),
            &scoring(0.0, 0.0, 10.0),
            &layout(0.5),
            &diagram(0.5),
        );
        assert_eq!(floor.final_marks, 0.0);
    }

    #[test]
    fn breakdown_carries_every_stage() {
        let outcome = aggregate_scores(
            &ocr(0.85),
            &scoring(0.8, 9.0, 10.0),
            &layout(0.7),
            &diagram(0.5),
        );

        let details = &outcome.details;
        assert_eq!(details["ocr"]["engine"], "trocr");
        assert_eq!(details["scoring"]["diagram_multiplier"], 0.5);
        assert_eq!(details["scoring"]["final_marks"], 4.5);
        assert_eq!(details["scoring"]["missing_keywords"][0], "condensation");
        assert_eq!(details["scoring"]["answer_type"], "short");
        assert_eq!(details["scoring"]["language"], "en");
        assert!(details["layout"]["boxes"].as_array().unwrap().is_empty());
        assert_eq!(details["diagram"]["has_diagram"], false);
    }

    #[test]
    fn breakdown_preserves_per_box_confidences() {
        let detected = LayoutOutcome {
            boxes: vec![RegionBox {
                bbox: [10.0, 20.0, 400.0, 140.0],
                confidence: 0.9,
                label: "handwritten_text".to_string(),
            }],
            confidence: 0.9,
            question_segments: Vec::new(),
        };
        let outcome = aggregate_scores(
            &ocr(0.85),
            &scoring(0.8, 9.0, 10.0),
            &detected,
            &diagram(1.0),
        );

        let boxes = &outcome.details["layout"]["boxes"];
        assert_eq!(boxes[0]["confidence"], 0.9);
        assert_eq!(boxes[0]["bbox"][2], 400.0);
        assert_eq!(boxes[0]["label"], "handwritten_text");
    }

    #[test]
    fn aggregation_is_idempotent() {
        let first = aggregate_scores(
            &ocr(0.85),
            &scoring(0.8, 9.0, 10.0),
            &layout(0.7),
            &diagram(0.5),
        );
        let second = aggregate_scores(
            &ocr(0.85),
            &scoring(0.8, 9.0, 10.0),
            &layout(0.7),
            &diagram(0.5),
        );
        assert_eq!(first.final_marks, second.final_marks);
        assert_eq!(first.confidence, second.confidence);
        assert_eq!(first.details, second.details);
    }
}
