use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tokio::time::{interval, sleep, Duration};

use crate::core::state::AppState;
use crate::pipeline::runner::Pipeline;
use crate::services::analytics;
use crate::services::provider::{ModelProvider, RemoteModelProvider};
use crate::services::translate::Translator;
use crate::tasks::evaluate;

pub(crate) async fn run(state: AppState) -> Result<()> {
    let provider: Arc<dyn ModelProvider> =
        Arc::new(RemoteModelProvider::from_settings(state.settings())?);
    let translator = Translator::from_settings(state.settings());
    let pipeline = Arc::new(Pipeline::from_settings(state.settings(), provider, translator));

    let worker = state.settings().worker().clone();
    let concurrency = worker.concurrency as usize;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut handles = Vec::with_capacity(concurrency + 2);
    for _ in 0..concurrency {
        handles.push(tokio::spawn(evaluation_worker(
            state.clone(),
            pipeline.clone(),
            worker.poll_interval_seconds,
            shutdown_rx.clone(),
        )));
    }
    handles.push(tokio::spawn(stale_recovery_loop(state.clone(), shutdown_rx.clone())));
    handles.push(tokio::spawn(analytics_refresh_loop(
        state.clone(),
        worker.analytics_refresh_seconds,
        shutdown_rx.clone(),
    )));

    crate::core::shutdown::shutdown_signal().await;
    if shutdown_tx.send(true).is_err() {
        tracing::warn!("Failed to broadcast shutdown signal to background tasks");
    }

    for handle in handles {
        if let Err(err) = handle.await {
            tracing::error!(error = %err, "Background task join failed");
        }
    }

    Ok(())
}

async fn evaluation_worker(
    state: AppState,
    pipeline: Arc<Pipeline>,
    poll_interval_seconds: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        match evaluate::claim_next_submission(state.db()).await {
            Ok(Some((submission_id, question_id))) => {
                if let Err(err) =
                    evaluate::process_submission(&state, &pipeline, &submission_id, &question_id)
                        .await
                {
                    metrics::counter!("evaluation_jobs_total", "status" => "failed").increment(1);
                    tracing::error!(
                        submission_id,
                        question_id,
                        error = %err,
                        "Failed to evaluate submission"
                    );
                }
                continue;
            }
            Ok(None) => {}
            Err(err) => tracing::error!(error = %err, "Failed to claim submission"),
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            _ = sleep(Duration::from_secs(poll_interval_seconds)) => {}
        }
    }
}

async fn stale_recovery_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let mut tick = interval(Duration::from_secs(60));
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                if let Err(err) = evaluate::release_stale_submissions(&state).await {
                    tracing::error!(error = %err, "release_stale_submissions failed");
                }
            }
        }
    }
}

async fn analytics_refresh_loop(
    state: AppState,
    refresh_seconds: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut tick = interval(Duration::from_secs(refresh_seconds));
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                if let Err(err) = analytics::refresh_overview(&state).await {
                    tracing::error!(error = %err, "refresh_overview failed");
                }
            }
        }
    }
}
