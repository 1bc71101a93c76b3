use std::time::Instant;

use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::pipeline::runner::{Pipeline, PipelineReport};
use crate::repositories;

pub(crate) async fn claim_next_submission(pool: &PgPool) -> Result<Option<(String, String)>> {
    let now = primitive_now_utc();
    repositories::submissions::claim_next_for_processing(pool, now)
        .await
        .context("Failed to claim submission")
}

pub(crate) async fn process_submission(
    state: &AppState,
    pipeline: &Pipeline,
    submission_id: &str,
    question_id: &str,
) -> Result<()> {
    let started = Instant::now();

    let question = repositories::questions::find_by_id(state.db(), question_id)
        .await
        .context("Failed to load question")?
        .with_context(|| format!("Question {question_id} not found"))?;

    let report = pipeline
        .evaluate(state.db(), submission_id, &question)
        .await
        .context("Pipeline evaluation failed")?;

    match report {
        PipelineReport::NotFound => {
            tracing::warn!(submission_id, "Claimed submission disappeared before evaluation");
            metrics::counter!("evaluation_jobs_total", "status" => "not_found").increment(1);
        }
        PipelineReport::Completed { status, final_score, confidence, flagged } => {
            tracing::info!(
                submission_id,
                status = status.as_str(),
                final_score,
                confidence,
                flagged,
                "Submission evaluated"
            );
            metrics::counter!("evaluation_jobs_total", "status" => "success").increment(1);
        }
    }

    metrics::histogram!("evaluation_duration_seconds").record(started.elapsed().as_secs_f64());
    Ok(())
}

pub(crate) async fn release_stale_submissions(state: &AppState) -> Result<()> {
    let cutoff = primitive_now_utc()
        - time::Duration::minutes(state.settings().worker().stale_after_minutes as i64);
    let released = repositories::submissions::release_stale_claims(state.db(), cutoff)
        .await
        .context("Failed to release stale submissions")?;

    if released > 0 {
        tracing::warn!(released, "Released stale processing claims");
        metrics::counter!("evaluation_stale_released_total").increment(released);
    }
    Ok(())
}
