//! Agent tool-calling loop
//!
//! A run is a small state machine:
//!
//! - `AwaitingModel`: send the conversation to the provider. A response that
//!   finishes with a tool-calls intent moves to `ProcessingTools`; anything
//!   else ends the run.
//! - `ProcessingTools`: take the proposed calls in model order, ask the
//!   approval gate about each, execute the approved ones and append their
//!   results. A rejection ends the turn (or is reported back to the model,
//!   depending on [`RejectionPolicy`]). When the batch is done the loop goes
//!   back to `AwaitingModel`.
//! - `Done`: terminal, with a [`StopReason`].
//!
//! The number of `AwaitingModel` entries is capped by
//! [`AgentConfig::max_iterations`].

mod config;
mod conversation;
mod observer;
mod runner;
mod state;

pub use config::{AgentConfig, RejectionPolicy, DEFAULT_MAX_ITERATIONS};
pub use conversation::Conversation;
pub use observer::{
    event_channel, AgentEvent, AgentObserver, ChannelObserver, EventReceiver, EventSender,
    NoopObserver,
};
pub use runner::{Agent, AgentBuilder};
pub use state::{
    AgentOutcome, LoopState, StopReason, FALLBACK_MESSAGE, MISSING_PROVIDER_RESULT,
    REJECTED_RESULT, SKIPPED_RESULT, TRUNCATION_NOTICE,
};
