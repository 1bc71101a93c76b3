//! Answer scoring stage. Blends fuzzy keyword coverage with semantic
//! similarity against the model answer, then scales by marks and answer
//! length.

use std::sync::Arc;

use rapidfuzz::fuzz;
use tracing::warn;

use crate::db::types::AnswerType;
use crate::pipeline::text::normalize_text;
use crate::services::provider::ModelProvider;
use crate::services::translate::Translator;

const KEYWORD_MATCH_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone)]
pub(crate) struct QuestionMeta {
    pub(crate) keywords: Vec<String>,
    pub(crate) model_answer: String,
    pub(crate) marks: f64,
    pub(crate) answer_type: AnswerType,
    pub(crate) language: String,
}

#[derive(Debug, Clone)]
pub(crate) struct ScoreOutcome {
    pub(crate) keyword_score: f64,
    pub(crate) semantic_score: f64,
    pub(crate) matched_keywords: Vec<String>,
    pub(crate) missing_keywords: Vec<String>,
    pub(crate) answer_type: AnswerType,
    pub(crate) language: String,
    pub(crate) answer_type_weight: f64,
    pub(crate) raw_score: f64,
    pub(crate) final_score: f64,
    pub(crate) max_marks: f64,
    pub(crate) translated: bool,
    pub(crate) semantic_fallback: bool,
}

pub(crate) struct ScoringStage {
    provider: Arc<dyn ModelProvider>,
    embedding_model: String,
    translator: Option<Translator>,
    keyword_weight: f64,
    semantic_weight: f64,
}

impl ScoringStage {
    pub(crate) fn new(
        provider: Arc<dyn ModelProvider>,
        embedding_model: String,
        translator: Option<Translator>,
        keyword_weight: f64,
        semantic_weight: f64,
    ) -> Self {
        Self {
            provider,
            embedding_model,
            translator,
            keyword_weight,
            semantic_weight,
        }
    }

    /// Scores a recognized answer against the question. Never errors: every
    /// external dependency degrades to a cheaper substitute instead.
    pub(crate) async fn score(&self, answer: &str, meta: &QuestionMeta) -> ScoreOutcome {
        let mut translated = false;
        let mut working_answer = answer.to_string();
        let mut working_reference = meta.model_answer.clone();

        // Keyword lists and embedding references are English; Hindi answers
        // are brought over before matching.
        if meta.language.starts_with("hi") {
            if let Some(translator) = &self.translator {
                translated |= translate_into(translator, &mut working_answer).await;
                translated |= translate_into(translator, &mut working_reference).await;
            }
        }

        let (keyword_score, matched_keywords, missing_keywords) =
            keyword_score(&working_answer, &meta.keywords);

        let (semantic_score, semantic_fallback) = self
            .semantic_score(&working_answer, &working_reference)
            .await;

        let answer_type_weight = match meta.answer_type {
            AnswerType::Short => 1.0,
            AnswerType::Long => 1.1,
            AnswerType::VeryLong => 1.2,
        };

        let raw_score = (self.keyword_weight * keyword_score
            + self.semantic_weight * semantic_score)
            * meta.marks
            * answer_type_weight;
        let final_score = raw_score.min(meta.marks);

        ScoreOutcome {
            keyword_score,
            semantic_score,
            matched_keywords,
            missing_keywords,
            answer_type: meta.answer_type,
            language: meta.language.clone(),
            answer_type_weight,
            raw_score,
            final_score,
            max_marks: meta.marks,
            translated,
            semantic_fallback,
        }
    }

    /// Cosine similarity of sentence embeddings mapped to `[0, 1]`, with a
    /// plain fuzzy ratio standing in when the embedder is unreachable.
    async fn semantic_score(&self, answer: &str, reference: &str) -> (f64, bool) {
        match self.embedded_similarity(answer, reference).await {
            Ok(score) => (score, false),
            Err(err) => {
                warn!(error = %err, "embedding similarity unavailable, using fuzzy ratio");
                let ratio =
                    fuzz::ratio(answer.to_lowercase().chars(), reference.to_lowercase().chars());
                (ratio, true)
            }
        }
    }

    async fn embedded_similarity(&self, answer: &str, reference: &str) -> anyhow::Result<f64> {
        let embedder = self.provider.embedder(&self.embedding_model).await?;
        let (a, b) = tokio::try_join!(embedder.encode(answer), embedder.encode(reference))?;

        let cosine = cosine_similarity(&a, &b)
            .ok_or_else(|| anyhow::anyhow!("degenerate embedding vector"))?;
        Ok((cosine.clamp(-1.0, 1.0) + 1.0) / 2.0)
    }
}

async fn translate_into(translator: &Translator, text: &mut String) -> bool {
    match translator.to_english(text).await {
        Ok(translated) => {
            *text = translated;
            true
        }
        Err(err) => {
            warn!(error = %err, "translation failed, scoring original text");
            false
        }
    }
}

/// Average fuzzy match ratio across all keywords. Every keyword contributes
/// its ratio to the average; the threshold only decides the matched and
/// missing lists reported back to teachers.
fn keyword_score(answer: &str, keywords: &[String]) -> (f64, Vec<String>, Vec<String>) {
    if keywords.is_empty() {
        return (0.0, Vec::new(), Vec::new());
    }

    let normalized_answer = normalize_text(answer);
    let mut total = 0.0;
    let mut matched = Vec::new();
    let mut missing = Vec::new();

    for keyword in keywords {
        let normalized_keyword = normalize_text(keyword);
        let ratio = partial_ratio(&normalized_answer, &normalized_keyword);
        total += ratio;
        if ratio >= KEYWORD_MATCH_THRESHOLD {
            matched.push(keyword.clone());
        } else {
            missing.push(keyword.clone());
        }
    }

    (total / keywords.len() as f64, matched, missing)
}

/// Best-alignment fuzzy match: the highest `ratio` between the shorter
/// string and any same-length window of the longer one, so a keyword buried
/// anywhere in the answer still scores 1.0. `rapidfuzz` only ships the full
/// ratio, not the partial-alignment variant.
fn partial_ratio(s1: &str, s2: &str) -> f64 {
    let first: Vec<char> = s1.chars().collect();
    let second: Vec<char> = s2.chars().collect();
    let (short, long) = if first.len() <= second.len() {
        (first, second)
    } else {
        (second, first)
    };

    if short.is_empty() {
        return fuzz::ratio(short.iter().copied(), long.iter().copied());
    }

    let mut best = 0.0f64;
    for window in long.windows(short.len()) {
        let score = fuzz::ratio(short.iter().copied(), window.iter().copied());
        if score > best {
            best = score;
        }
        if best >= 1.0 {
            break;
        }
    }
    best
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}
