//! Structure-preserving translation: markup handling and orchestration.

pub mod markup;

#[cfg(feature = "tokio-runtime")]
pub mod orchestrator;

#[cfg(feature = "http-backend")]
pub mod http;

pub use markup::{has_markup, structure_preserved, translate_markup_aware};

#[cfg(feature = "tokio-runtime")]
pub use orchestrator::{OrchestratorStats, TranslationOrchestrator, TranslationOutcome};
