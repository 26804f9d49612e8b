//! Decision stage: a pure policy mapping (conversation state, NLU result) to
//! the next action. Transitions are recomputed fresh each turn from the
//! merged slots, which keeps the policy idempotent and replay-safe.

use canho_core::{validate_slots, ConversationState, SlotKey, SlotMap};

use crate::understanding::{Intent, NluResult};

/// What to ask for when a slot is missing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AskTarget {
    /// No search-relevant criterion at all yet; ask for any of them.
    Criteria,
    Slot(SlotKey),
}

/// The action plan for one turn: an action plus its payload. Ephemeral,
/// regenerated every turn, never persisted.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    AskRephrase,
    AskSlot { target: AskTarget },
    SearchListings { criteria: SlotMap },
    ShowDetails { unit_code: String },
    BookAppointment { unit_code: String, phone: String, visit_time: String },
    NoResult { message: String },
}

impl Action {
    pub fn action_key(&self) -> &'static str {
        match self {
            Self::AskRephrase => "dialog.ask_rephrase",
            Self::AskSlot { .. } => "dialog.ask_slot",
            Self::SearchListings { .. } => "dialog.search_listings",
            Self::ShowDetails { .. } => "dialog.show_details",
            Self::BookAppointment { .. } => "dialog.book_appointment",
            Self::NoResult { .. } => "dialog.no_result",
        }
    }
}

/// Booking cannot proceed without these, asked for in this order.
const BOOKING_REQUIRED: [SlotKey; 3] = [SlotKey::MaCanHo, SlotKey::Sdt, SlotKey::ThoiGian];

#[derive(Clone, Debug)]
pub struct Decision {
    confidence_threshold: f64,
}

impl Decision {
    pub fn new(confidence_threshold: f64) -> Self {
        Self { confidence_threshold }
    }

    /// Pure function of its two inputs: identical `(state, nlu)` always
    /// yields the identical plan.
    pub fn decide(&self, state: &ConversationState, nlu: &NluResult) -> Action {
        if nlu.confidence < self.confidence_threshold {
            return Action::AskRephrase;
        }

        let slots = &state.slots;
        match &nlu.intent {
            Intent::ShowDetails => {
                if let Some(unit_code) = slot_text(slots, SlotKey::MaCanHo) {
                    return Action::ShowDetails { unit_code };
                }
                // No unit code to look up; fall back to the search policy so
                // the turn still moves the conversation forward.
                self.search_policy(slots)
            }
            Intent::BookAppointment => self.booking_policy(slots),
            Intent::SearchApartment => self.search_policy(slots),
            Intent::GeneralChat | Intent::Other(_) => Action::AskRephrase,
        }
    }

    fn booking_policy(&self, slots: &SlotMap) -> Action {
        // A required slot only counts when it holds text; a bare number or
        // a range is re-asked instead of rendered as an empty string.
        for key in BOOKING_REQUIRED {
            if slot_text(slots, key).is_none() {
                return Action::AskSlot { target: AskTarget::Slot(key) };
            }
        }

        let unit_code = slot_text(slots, SlotKey::MaCanHo).unwrap_or_default();
        let phone = slot_text(slots, SlotKey::Sdt).unwrap_or_default();
        let visit_time = slot_text(slots, SlotKey::ThoiGian).unwrap_or_default();
        Action::BookAppointment { unit_code, phone, visit_time }
    }

    fn search_policy(&self, slots: &SlotMap) -> Action {
        let validation_errors = validate_slots(slots);
        if let Some(first_error) = validation_errors.into_iter().next() {
            return Action::NoResult { message: first_error };
        }

        if !slots.has_search_criteria() {
            return Action::AskSlot { target: AskTarget::Criteria };
        }

        let criteria = slots.iter().filter(|(key, _)| key.is_filterable()).map(
            |(key, value)| (key, value.clone()),
        );
        Action::SearchListings { criteria: criteria.collect() }
    }
}

fn slot_text(slots: &SlotMap, key: SlotKey) -> Option<String> {
    slots.get(key).and_then(|value| value.as_text()).map(str::to_string)
}
