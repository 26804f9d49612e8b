//! Domain core for the canho real-estate chat assistant.
//!
//! Leaf building blocks with no collaborator dependencies: the slot model
//! (tagged union values with an explicit retraction sentinel), per-session
//! conversation state, the listing filter/hit model shared with the search
//! collaborator, text normalization tables, slot validation bounds, and
//! configuration loading.

pub mod config;
pub mod domain;
pub mod normalize;
pub mod validate;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use domain::listing::{Condition, FieldCondition, ListingFilter, ListingHit};
pub use domain::slots::{SlotKey, SlotMap, SlotValue, UnknownSlotKey};
pub use domain::state::{ConversationState, DialogState, StatePatch};
pub use normalize::Normalizer;
pub use validate::validate_slots;
