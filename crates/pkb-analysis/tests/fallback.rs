//! Analysis fallback-chain scenario (spec §8, scenario 7): an AI provider
//! that fails still yields a usable TF-IDF-tagged result.

use std::sync::Arc;

use pkb_analysis::AnalysisOrchestrator;
use pkb_core::config::{AiConfig, AiProvider, AnalysisConfig};
use pkb_core::event::EventBus;
use pkb_core::types::AnalysisMethod;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn ai_failure_falls_through_to_textrank_or_tfidf() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let ai = AiConfig {
        provider: AiProvider::Openai,
        api_endpoint: server.uri(),
        api_key: "sk-test".to_string(),
        model_name: "gpt-4".to_string(),
        max_tokens: 256,
    };
    let orchestrator =
        AnalysisOrchestrator::new(AnalysisConfig::default(), Some(ai), Arc::new(EventBus::new()));

    let text = "Machine learning is a subset of artificial intelligence. \
                Neural networks learn patterns.";
    let result = orchestrator.analyze_content("id1", text).await.unwrap();

    assert_eq!(result.method, AnalysisMethod::Tfidf);
    assert!(!result.ai_used);
    assert!(!result.keywords.is_empty());
    assert!(result.summary.is_some_and(|s| !s.is_empty()));
}
