pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod pipeline;
pub(crate) mod repositories;
pub(crate) mod services;
pub(crate) mod tasks;

use crate::core::{config::Settings, state::AppState, telemetry};

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    let state = AppState::new(settings, db_pool);

    tracing::info!(
        environment = %state.settings().runtime().environment.as_str(),
        workers = state.settings().worker().concurrency,
        "ScriptMark evaluation worker starting"
    );

    tasks::scheduler::run(state).await
}
