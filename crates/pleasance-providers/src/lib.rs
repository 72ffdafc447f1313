//! LLM provider layer for Pleasance.
//!
//! Every completion goes through one HTTP proxy that fronts several model
//! families (Claude, Gemini, …). Models fail in different ways and answer in
//! different shapes, so this crate hides all of that behind one rule: a call
//! either yields text or it doesn't, and the next model in the chain is tried.
//!
//! # Architecture
//!
//! - [`traits::CompletionBackend`] — one call to one model; the seam stubs plug into
//! - [`proxy::ProxyClient`] — the HTTP implementation against `/v1/messages`
//! - [`normalize`] — pulls text out of the heterogeneous response shapes
//! - [`chains`] — named fallback chains (`standard`, `fast`, `deep`, `image`)
//! - [`fallback::FallbackExecutor`] — walks a chain until a model answers

pub mod chains;
pub mod fallback;
pub mod normalize;
pub mod proxy;
pub mod traits;

// Re-export main types for convenience
pub use chains::{ChainError, ChainRegistry, FallbackChain, DEFAULT_CHAIN, KNOWN_MODELS};
pub use fallback::{FallbackExecutor, JsonCompletion, JsonCompletionError};
pub use proxy::ProxyClient;
pub use traits::{CompletionBackend, CompletionParams};
