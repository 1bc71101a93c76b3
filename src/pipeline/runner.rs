//! Pipeline orchestration. Stages run in a fixed graph: recognition first,
//! then scoring, layout and diagram analysis concurrently, then aggregation
//! and a single transactional-style write of the evaluation and the
//! submission status.

use std::path::PathBuf;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sqlx::PgPool;
use tracing::warn;

use crate::core::config::Settings;
use crate::core::time::primitive_now_utc;
use crate::db::models::Question;
use crate::db::types::SubmissionStatus;
use crate::pipeline::aggregate::aggregate_scores;
use crate::pipeline::diagram::DiagramStage;
use crate::pipeline::layout::LayoutStage;
use crate::pipeline::ocr::OcrStage;
use crate::pipeline::scoring::{QuestionMeta, ScoringStage};
use crate::repositories::evaluations::{self, EvaluationUpsert};
use crate::repositories::submissions;
use crate::services::provider::ModelProvider;
use crate::services::translate::Translator;

const FEEDBACK_GRADED: &str = "Auto-graded";
const FEEDBACK_FLAGGED: &str = "Low confidence - flagged for teacher review";

#[derive(Debug)]
pub(crate) enum PipelineReport {
    NotFound,
    Completed {
        status: SubmissionStatus,
        final_score: f64,
        confidence: f64,
        flagged: bool,
    },
}

pub(crate) struct Pipeline {
    ocr: OcrStage,
    layout: LayoutStage,
    diagram: DiagramStage,
    scoring: ScoringStage,
    storage_root: PathBuf,
}

impl Pipeline {
    pub(crate) fn from_settings(
        settings: &Settings,
        provider: Arc<dyn ModelProvider>,
        translator: Option<Translator>,
    ) -> Self {
        let inference = settings.inference();
        let scoring_settings = settings.scoring();

        Self {
            ocr: OcrStage::new(
                provider.clone(),
                inference.ocr_model_en.clone(),
                inference.ocr_model_hi.clone(),
                inference.ocr_model_fallback.clone(),
            ),
            layout: LayoutStage::new(provider.clone(), inference.layout_model.clone()),
            diagram: DiagramStage,
            scoring: ScoringStage::new(
                provider,
                inference.embedding_model.clone(),
                translator,
                scoring_settings.keyword_weight,
                scoring_settings.semantic_weight,
            ),
            storage_root: PathBuf::from(&settings.storage().root),
        }
    }

    /// Evaluates one claimed submission end to end. The submission and
    /// evaluation rows are only written once every stage has produced its
    /// outcome; a missing submission writes nothing.
    pub(crate) async fn evaluate(
        &self,
        pool: &PgPool,
        submission_id: &str,
        question: &Question,
    ) -> anyhow::Result<PipelineReport> {
        let Some(submission) = submissions::find_by_id(pool, submission_id).await? else {
            return Ok(PipelineReport::NotFound);
        };

        let image = self.load_image(&submission.storage_path).await;
        let image_b64 = STANDARD.encode(&image);

        let hint = match submission.language.as_str() {
            "" => None,
            hint => Some(hint),
        };
        let ocr = self.ocr.run(&image_b64, hint).await;

        let meta = QuestionMeta {
            keywords: question.keywords.0.clone(),
            model_answer: question.model_answer.clone().unwrap_or_default(),
            marks: question.marks,
            answer_type: question.answer_type,
            language: question.language.clone(),
        };

        let (scoring, layout, diagram) = tokio::join!(
            self.scoring.score(&ocr.text, &meta),
            self.layout.detect(&image_b64),
            self.diagram.analyze(&image),
        );

        let aggregated = aggregate_scores(&ocr, &scoring, &layout, &diagram);

        let status = if aggregated.flagged_for_review {
            SubmissionStatus::Flagged
        } else {
            SubmissionStatus::Graded
        };
        let feedback = if aggregated.flagged_for_review {
            FEEDBACK_FLAGGED
        } else {
            FEEDBACK_GRADED
        };

        let now = primitive_now_utc();
        evaluations::upsert(
            pool,
            EvaluationUpsert {
                submission_id: submission.id.clone(),
                final_score: aggregated.final_marks,
                confidence: aggregated.confidence,
                score_breakdown: aggregated.details,
                feedback: feedback.to_string(),
                student_answer: ocr.text.clone(),
                reference_answer: meta.model_answer.clone(),
                similarity: scoring.semantic_score,
            },
            now,
        )
        .await?;

        submissions::complete(pool, &submission.id, status, &ocr.language, ocr.confidence, now)
            .await?;

        Ok(PipelineReport::Completed {
            status,
            final_score: aggregated.final_marks,
            confidence: aggregated.confidence,
            flagged: aggregated.flagged_for_review,
        })
    }

    /// An unreadable page degrades to an empty image; the stages then produce
    /// their zero outcomes and the submission ends up flagged instead of
    /// stuck.
    async fn load_image(&self, storage_path: &str) -> Vec<u8> {
        let path = self.storage_root.join(storage_path);
        match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "could not read submission image");
                Vec::new()
            }
        }
    }
}
