//! AI -> TextRank -> TF-IDF fallback chain (spec §4.8).

use std::sync::Arc;

use futures::future::join_all;
use pkb_core::config::{AiConfig, AnalysisConfig};
use pkb_core::error::{CoreError, Result};
use pkb_core::event::{Event, EventBus, EventKind};
use pkb_core::types::{AnalysisMethod, AnalysisResult};
use reqwest::Client;
use serde::Deserialize;

use crate::language;
use crate::providers;
use crate::textrank;
use crate::tfidf;

const AI_CONFIDENCE: f32 = 0.9;
const FALLBACK_CONFIDENCE: f32 = 0.7;

/// AI's response is expected to be a JSON object carrying keywords and a
/// summary; if it isn't, that's treated the same as any other AI failure —
/// fall through to TextRank.
#[derive(Debug, Deserialize)]
struct AiPayload {
    keywords: Vec<String>,
    summary: String,
}

pub struct AnalysisOrchestrator {
    config: AnalysisConfig,
    ai_config: Option<AiConfig>,
    client: Client,
    events: Arc<EventBus>,
}

impl AnalysisOrchestrator {
    pub fn new(config: AnalysisConfig, ai_config: Option<AiConfig>, events: Arc<EventBus>) -> Self {
        Self {
            config,
            ai_config,
            client: Client::new(),
            events,
        }
    }

    /// Runs the full fallback chain for one item. An empty `text` is an
    /// error here (unlike the individual keyword/summary extractors, which
    /// happily return nothing for empty input).
    pub async fn analyze_content(&self, content_id: &str, text: &str) -> Result<AnalysisResult> {
        if text.trim().is_empty() {
            let message = "cannot analyze empty content".to_string();
            self.events.emit(
                Event::new(EventKind::AnalysisFailed, message.clone())
                    .with_item_id(content_id.to_string())
                    .with_error(message.clone()),
            );
            return Err(CoreError::Analysis(message));
        }

        self.events.emit(
            Event::new(EventKind::AnalysisStarted, "analysis started")
                .with_item_id(content_id.to_string()),
        );

        let language = language::detect_language(text);

        if let Some(ai) = self.ai_config.as_ref().filter(|ai| ai.is_usable()) {
            match self.try_ai(ai, text).await {
                Ok((keywords, summary)) => {
                    let result = AnalysisResult {
                        content_id: content_id.to_string(),
                        keywords,
                        summary: Some(summary),
                        language,
                        method: AnalysisMethod::Ai,
                        confidence: AI_CONFIDENCE,
                        ai_used: true,
                    };
                    self.emit_completed(content_id, &result);
                    return Ok(result);
                }
                Err(e) => {
                    tracing::warn!(content_id, error = %e, "AI analysis tier failed, falling back");
                }
            }
        }

        let keywords = textrank::extract_keywords(text, self.config.num_keywords);
        let keywords = if keywords.is_empty() {
            tfidf::extract_keywords(text, language, self.config.num_keywords)
        } else {
            keywords
        };

        let result = AnalysisResult {
            content_id: content_id.to_string(),
            keywords,
            summary: Some(extractive_summary(text, self.config.max_summary_length)),
            language,
            method: AnalysisMethod::Tfidf,
            confidence: FALLBACK_CONFIDENCE,
            ai_used: false,
        };
        self.emit_completed(content_id, &result);
        Ok(result)
    }

    async fn try_ai(
        &self,
        ai: &AiConfig,
        text: &str,
    ) -> std::result::Result<(Vec<String>, String), String> {
        let prompt = format!(
            "Extract up to {} keywords and a summary (max {} characters) from the \
             following text. Respond with a JSON object of the form \
             {{\"keywords\": [...], \"summary\": \"...\"}} and nothing else.\n\n{}",
            self.config.num_keywords, self.config.max_summary_length, text
        );
        let raw = providers::call_ai(ai, &self.client, &prompt, self.config.ai_timeout())
            .await
            .map_err(|e| e.to_string())?;
        let payload: AiPayload = serde_json::from_str(&raw).map_err(|e| e.to_string())?;
        Ok((payload.keywords, payload.summary))
    }

    fn emit_completed(&self, content_id: &str, result: &AnalysisResult) {
        self.events.emit(
            Event::new(EventKind::AnalysisCompleted, "analysis completed")
                .with_item_id(content_id.to_string())
                .with_data("method", format!("{:?}", result.method).to_lowercase())
                .with_data("confidence", result.confidence as f64),
        );
    }

    /// Runs `analyze_content` over every item concurrently. `None` entries
    /// map to `None` results at the same index and each contributes one
    /// error to the batch summary.
    pub async fn analyze_batch(&self, items: Vec<Option<(String, String)>>) -> BatchAnalysisResult {
        let futures = items.into_iter().map(|item| async move {
            match item {
                None => Err("nil item in batch".to_string()),
                Some((content_id, text)) => self
                    .analyze_content(&content_id, &text)
                    .await
                    .map_err(|e| e.to_string()),
            }
        });

        let outcomes = join_all(futures).await;
        let mut results = Vec::with_capacity(outcomes.len());
        let mut errors = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(result) => results.push(Some(result)),
                Err(e) => {
                    results.push(None);
                    errors.push(e);
                }
            }
        }

        let error = if errors.is_empty() {
            None
        } else {
            Some(errors.join("; "))
        };
        BatchAnalysisResult {
            results,
            error_count: errors.len(),
            error,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchAnalysisResult {
    pub results: Vec<Option<AnalysisResult>>,
    pub error_count: usize,
    pub error: Option<String>,
}

/// First ≤3 sentences, truncated to `max_len` chars with an ellipsis if the
/// selection had to be cut short.
fn extractive_summary(text: &str, max_len: usize) -> String {
    let sentences = split_sentences(text);
    let selected: String = sentences
        .into_iter()
        .take(3)
        .collect::<Vec<_>>()
        .join(" ");

    if selected.chars().count() <= max_len {
        return selected;
    }
    let truncated: String = selected.chars().take(max_len.saturating_sub(1)).collect();
    format!("{truncated}\u{2026}")
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            let trimmed = current.trim().to_string();
            if !trimmed.is_empty() {
                sentences.push(trimmed);
            }
            current.clear();
        }
    }
    let trimmed = current.trim().to_string();
    if !trimmed.is_empty() {
        sentences.push(trimmed);
    }
    sentences
}
