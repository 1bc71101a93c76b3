use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{AnswerType, SubmissionStatus};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Submission {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) exam_id: String,
    pub(crate) question_id: String,
    pub(crate) storage_path: String,
    pub(crate) status: SubmissionStatus,
    pub(crate) language: String,
    pub(crate) ocr_confidence: Option<f64>,
    pub(crate) processing_started_at: Option<PrimitiveDateTime>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) number: String,
    pub(crate) text: String,
    pub(crate) answer_type: AnswerType,
    pub(crate) keywords: Json<Vec<String>>,
    pub(crate) model_answer: Option<String>,
    pub(crate) marks: f64,
    pub(crate) language: String,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Evaluation {
    pub(crate) id: String,
    pub(crate) submission_id: String,
    pub(crate) final_score: f64,
    pub(crate) confidence: f64,
    pub(crate) score_breakdown: Json<serde_json::Value>,
    pub(crate) feedback: Option<String>,
    pub(crate) student_answer: Option<String>,
    pub(crate) reference_answer: Option<String>,
    pub(crate) similarity: Option<f64>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}
