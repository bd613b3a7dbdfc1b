//! Context size estimation and compaction
//!
//! Histories that grow past a fraction of the model's context window are
//! replaced by a generated summary. Compaction only ever happens between
//! turns, so a tool call and its result are never split.

mod compactor;
mod config;
mod estimator;

pub use compactor::{summary_seed, CompactionResult, Compactor, SUMMARY_ACK, SUMMARY_PREFIX};
pub use config::ContextConfig;
pub use estimator::{
    estimate_text_tokens, estimate_tokens, is_over_threshold, TokenEstimate, CHARS_PER_TOKEN,
    DEFAULT_THRESHOLD,
};
