use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::slots::{SlotKey, SlotMap};

/// Coarse phase of the conversation. Advisory context, not a strict state
/// machine: the Decision stage derives the next action from the current
/// slots fresh every turn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DialogState {
    #[default]
    Idle,
    Collecting,
    Presenting,
    Detail,
    Booked,
    Answered,
}

/// Short-term memory for one chat session. Loaded at the start of a turn,
/// merged into by Understanding, patched by Response, and persisted by the
/// orchestrator. Created empty on first contact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub dialog_state: DialogState,
    pub slots: SlotMap,
    /// Advisory only; the Decision stage recomputes required fields each turn.
    pub missing_slots: Vec<SlotKey>,
    pub last_action: Option<String>,
    pub last_intent: Option<String>,
    pub last_intent_confidence: f64,
    /// Short digest of the most recent result set, for continuity across turns.
    pub episodic_summary: Option<String>,
    /// Unit code of the listing most recently shown in detail.
    pub last_viewed_apartment: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self {
            dialog_state: DialogState::Idle,
            slots: SlotMap::new(),
            missing_slots: Vec::new(),
            last_action: None,
            last_intent: None,
            last_intent_confidence: 1.0,
            episodic_summary: None,
            last_viewed_apartment: None,
            updated_at: Utc::now(),
        }
    }
}

impl ConversationState {
    pub fn apply_patch(&mut self, patch: &StatePatch) {
        if let Some(dialog_state) = patch.dialog_state {
            self.dialog_state = dialog_state;
        }
        if let Some(summary) = &patch.episodic_summary {
            self.episodic_summary = Some(summary.clone());
        }
        if let Some(unit_code) = &patch.last_viewed_apartment {
            self.last_viewed_apartment = Some(unit_code.clone());
        }
    }
}

/// What the Response stage wants persisted after a turn. The Response stage
/// never writes state itself; the orchestrator applies the patch, which keeps
/// the read → decide → write separation intact.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatePatch {
    pub dialog_state: Option<DialogState>,
    pub episodic_summary: Option<String>,
    pub last_viewed_apartment: Option<String>,
}
