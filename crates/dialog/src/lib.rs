//! Conversational engine for Vietnamese apartment-hunting chats.
//!
//! Each user message runs through three stages:
//!
//! 1. [`understanding::Understanding`] asks the LLM for intent, confidence
//!    and slot values, normalizes them and merges them into the session.
//! 2. [`decision::Decision`] maps the merged state to the next action, a
//!    pure function with no I/O.
//! 3. [`response::Response`] executes the action against the listing search
//!    and renders the reply.
//!
//! [`engine::DialogEngine`] wires the stages over a [`session::SessionStore`].
//! The LLM, the listing search and the store are all trait objects, so
//! callers and tests inject their own.

pub mod decision;
pub mod engine;
pub mod errors;
pub mod llm;
pub mod response;
pub mod search;
pub mod session;
pub mod understanding;

pub use decision::{Action, AskTarget, Decision};
pub use engine::{DialogEngine, EngineOptions, TurnReply};
pub use errors::EngineError;
pub use llm::LlmClient;
pub use response::{Response, TurnOutcome};
pub use search::ListingSearch;
pub use session::{MemorySessionStore, SessionStore};
pub use understanding::{Intent, NluResult, Understanding};
