//! Aggregate analytics over graded work, cached in the database so dashboard
//! reads never scan the evaluations table.

use std::collections::HashMap;

use serde_json::json;
use tracing::info;

use crate::core::state::AppState;
use crate::core::time::{format_primitive, primitive_now_utc};
use crate::repositories::{analytics_cache, evaluations, submissions};

const OVERVIEW_CACHE_KEY: &str = "overview";

pub(crate) async fn refresh_overview(state: &AppState) -> anyhow::Result<()> {
    let overview = compute_overview(state).await?;
    let now = primitive_now_utc();
    analytics_cache::upsert(state.db(), OVERVIEW_CACHE_KEY, &overview, now).await?;
    info!("analytics overview refreshed");
    Ok(())
}

async fn compute_overview(state: &AppState) -> anyhow::Result<serde_json::Value> {
    let rows = evaluations::list_all(state.db()).await?;
    let statuses = submissions::status_breakdown(state.db()).await?;

    let average_score = if rows.is_empty() {
        0.0
    } else {
        rows.iter().map(|row| row.final_score).sum::<f64>() / rows.len() as f64
    };

    let mut distribution: HashMap<&str, u64> =
        HashMap::from([("low", 0), ("medium", 0), ("high", 0)]);
    let mut missed_keywords: HashMap<String, u64> = HashMap::new();

    for row in &rows {
        *distribution
            .entry(confidence_bucket(row.confidence))
            .or_default() += 1;

        let missing = row.score_breakdown.0["scoring"]["missing_keywords"].as_array();
        for keyword in missing.into_iter().flatten() {
            if let Some(keyword) = keyword.as_str() {
                *missed_keywords.entry(keyword.to_string()).or_default() += 1;
            }
        }
    }

    let status_breakdown: HashMap<&str, i64> = statuses
        .iter()
        .map(|(status, count)| (status.as_str(), *count))
        .collect();

    Ok(json!({
        "evaluated_count": rows.len(),
        "average_score": average_score,
        "confidence_distribution": distribution,
        "missed_keywords": missed_keywords,
        "status_breakdown": status_breakdown,
        "updated_at": format_primitive(primitive_now_utc()),
    }))
}

fn confidence_bucket(confidence: f64) -> &'static str {
    if confidence < 0.6 {
        "low"
    } else if confidence < 0.8 {
        "medium"
    } else {
        "high"
    }
}

#[cfg(test)]
mod tests {
    use super::confidence_bucket;

    #[test]
    fn buckets_split_at_point_six_and_point_eight() {
        assert_eq!(confidence_bucket(0.0), "low");
        assert_eq!(confidence_bucket(0.59), "low");
        assert_eq!(confidence_bucket(0.6), "medium");
        assert_eq!(confidence_bucket(0.79), "medium");
        assert_eq!(confidence_bucket(0.8), "high");
        assert_eq!(confidence_bucket(1.0), "high");
    }
}
