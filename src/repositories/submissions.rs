use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Submission;
use crate::db::types::SubmissionStatus;

pub(crate) const COLUMNS: &str = "\
    id, user_id, exam_id, question_id, storage_path, status, language, ocr_confidence, \
    processing_started_at, created_at, updated_at";

pub(crate) async fn find_by_id(
    pool: &PgPool,
    submission_id: &str,
) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "SELECT {COLUMNS} FROM submissions WHERE id = $1"
    ))
    .bind(submission_id)
    .fetch_optional(pool)
    .await
}

/// Claims the oldest claimable submission for this worker. Claimable means
/// freshly uploaded, or stuck in processing with its claim released by the
/// stale-recovery loop. Returns `(submission_id, question_id)`.
pub(crate) async fn claim_next_for_processing(
    pool: &PgPool,
    now: PrimitiveDateTime,
) -> Result<Option<(String, String)>, sqlx::Error> {
    sqlx::query_as::<_, (String, String)>(
        "WITH candidate AS (
            SELECT id
            FROM submissions
            WHERE (status = $1 OR (status = $2 AND processing_started_at IS NULL))
            ORDER BY created_at
            FOR UPDATE SKIP LOCKED
            LIMIT 1
        )
        UPDATE submissions
        SET status = $2,
            processing_started_at = $3,
            updated_at = $3
        FROM candidate
        WHERE submissions.id = candidate.id
        RETURNING submissions.id, submissions.question_id",
    )
    .bind(SubmissionStatus::Uploaded)
    .bind(SubmissionStatus::Processing)
    .bind(now)
    .fetch_optional(pool)
    .await
}

/// Records the pipeline outcome on the submission row. Status only ever moves
/// forward here: processing into graded or flagged.
pub(crate) async fn complete(
    pool: &PgPool,
    submission_id: &str,
    status: SubmissionStatus,
    language: &str,
    ocr_confidence: f64,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE submissions
         SET status = $1,
             language = $2,
             ocr_confidence = $3,
             processing_started_at = NULL,
             updated_at = $4
         WHERE id = $5",
    )
    .bind(status)
    .bind(language)
    .bind(ocr_confidence)
    .bind(now)
    .bind(submission_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Releases claims whose worker died mid-run so another worker can pick the
/// submission up again. The status stays `processing`; only the claim
/// timestamp is cleared.
pub(crate) async fn release_stale_claims(
    pool: &PgPool,
    cutoff: PrimitiveDateTime,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE submissions
         SET processing_started_at = NULL
         WHERE status = $1
           AND processing_started_at IS NOT NULL
           AND processing_started_at < $2",
    )
    .bind(SubmissionStatus::Processing)
    .bind(cutoff)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub(crate) async fn status_breakdown(
    pool: &PgPool,
) -> Result<Vec<(SubmissionStatus, i64)>, sqlx::Error> {
    sqlx::query_as::<_, (SubmissionStatus, i64)>(
        "SELECT status, COUNT(id) FROM submissions GROUP BY status",
    )
    .fetch_all(pool)
    .await
}
