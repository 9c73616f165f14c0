//! Content analysis: AI -> TextRank -> TF-IDF fallback chain (spec §4.8).
//!
//! Split out of `pkb-core` so the HTTP/tokenisation dependency set (reqwest,
//! unicode-segmentation, futures) doesn't leak into the sync engine, which
//! never calls this crate directly — a surrounding application wires the two
//! together via the shared `EventBus`.

mod language;
mod orchestrator;
mod providers;
mod textrank;
mod tfidf;

pub use orchestrator::{AnalysisOrchestrator, BatchAnalysisResult};
pub use providers::ProviderError;
