use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::models::Evaluation;

pub(crate) const COLUMNS: &str = "\
    id, submission_id, final_score, confidence, score_breakdown, feedback, student_answer, \
    reference_answer, similarity, created_at, updated_at";

pub(crate) struct EvaluationUpsert {
    pub(crate) submission_id: String,
    pub(crate) final_score: f64,
    pub(crate) confidence: f64,
    pub(crate) score_breakdown: serde_json::Value,
    pub(crate) feedback: String,
    pub(crate) student_answer: String,
    pub(crate) reference_answer: String,
    pub(crate) similarity: f64,
}

/// One evaluation per submission. Retried runs update the existing row in
/// place instead of inserting a duplicate.
pub(crate) async fn upsert(
    pool: &PgPool,
    params: EvaluationUpsert,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO evaluations (id, submission_id, final_score, confidence, score_breakdown,
                                  feedback, student_answer, reference_answer, similarity,
                                  created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
         ON CONFLICT (submission_id) DO UPDATE
         SET final_score = EXCLUDED.final_score,
             confidence = EXCLUDED.confidence,
             score_breakdown = EXCLUDED.score_breakdown,
             feedback = EXCLUDED.feedback,
             student_answer = EXCLUDED.student_answer,
             reference_answer = EXCLUDED.reference_answer,
             similarity = EXCLUDED.similarity,
             updated_at = EXCLUDED.updated_at",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&params.submission_id)
    .bind(params.final_score)
    .bind(params.confidence)
    .bind(Json(params.score_breakdown))
    .bind(&params.feedback)
    .bind(&params.student_answer)
    .bind(&params.reference_answer)
    .bind(params.similarity)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

pub(crate) async fn list_all(pool: &PgPool) -> Result<Vec<Evaluation>, sqlx::Error> {
    sqlx::query_as::<_, Evaluation>(&format!("SELECT {COLUMNS} FROM evaluations"))
        .fetch_all(pool)
        .await
}
