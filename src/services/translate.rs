use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use crate::core::config::Settings;

/// Client for the translation service used to bring Hindi answers into
/// English before scoring. Optional; when unset the pipeline scores the
/// original text as-is.
#[derive(Debug, Clone)]
pub(crate) struct Translator {
    client: reqwest::Client,
    base_url: String,
}

impl Translator {
    pub(crate) fn from_settings(settings: &Settings) -> Option<Self> {
        let translate = settings.translate();
        if translate.base_url.is_empty() {
            return None;
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(translate.request_timeout_seconds))
            .build()
            .ok()?;

        Some(Self {
            client,
            base_url: translate.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub(crate) async fn to_english(&self, text: &str) -> anyhow::Result<String> {
        #[derive(Deserialize)]
        struct TranslateResponse {
            translated_text: String,
        }

        let response = self
            .client
            .post(format!("{}/translate", self.base_url))
            .json(&json!({ "text": text, "source": "hi", "target": "en" }))
            .send()
            .await?
            .error_for_status()?;

        let body: TranslateResponse = response.json().await?;
        Ok(body.translated_text)
    }
}
