//! LLM provider layer: direct HTTP clients for every supported backend,
//! a runtime fallback chain across them, and voice transcription.
//!
//! # Architecture
//!
//! - [`traits::LlmProvider`] — trait that all providers implement
//! - [`registry`] — static specs for the 7 supported providers + matching logic
//! - [`http_provider::HttpProvider`] — generic OpenAI-compatible HTTP client
//! - [`http_provider::create_provider`] — convenience builder from model name + config
//! - [`fallback::FallbackChain`] — tries the configured model, then the
//!   fallback list, then the offline model, tracking which one answered
//! - [`transcription`] — Whisper-compatible speech-to-text

pub mod fallback;
pub mod http_provider;
pub mod registry;
pub mod traits;
pub mod transcription;

// Re-export main types for convenience
pub use fallback::{FallbackChain, FallbackOutcome};
pub use http_provider::{create_provider, HttpProvider};
pub use registry::{ProviderConfig, ProviderSpec, PROVIDERS};
pub use traits::{LlmProvider, LlmRequestConfig};
pub use transcription::{GroqTranscriber, TranscriptionProvider};
