use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;

pub(crate) async fn upsert(
    pool: &PgPool,
    cache_key: &str,
    payload: &serde_json::Value,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO analytics_cache (cache_key, payload, updated_at)
         VALUES ($1, $2, $3)
         ON CONFLICT (cache_key) DO UPDATE
         SET payload = EXCLUDED.payload,
             updated_at = EXCLUDED.updated_at",
    )
    .bind(cache_key)
    .bind(Json(payload))
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}
