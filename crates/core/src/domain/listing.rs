use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One per-field condition of the slot filter handed to the search
/// collaborator: either an exact match or an inclusive numeric range.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    Match { value: Value },
    Range { gte: Option<f64>, lte: Option<f64> },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldCondition {
    pub field: String,
    pub condition: Condition,
}

impl FieldCondition {
    pub fn matches(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self { field: field.into(), condition: Condition::Match { value: value.into() } }
    }

    pub fn range(field: impl Into<String>, gte: Option<f64>, lte: Option<f64>) -> Self {
        Self { field: field.into(), condition: Condition::Range { gte, lte } }
    }
}

/// The structured half of a search request. The free-text query string that
/// accompanies it is composed separately for semantic ranking.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingFilter {
    pub must: Vec<FieldCondition>,
}

impl ListingFilter {
    pub fn is_empty(&self) -> bool {
        self.must.is_empty()
    }

    pub fn condition_for(&self, field: &str) -> Option<&Condition> {
        self.must.iter().find(|entry| entry.field == field).map(|entry| &entry.condition)
    }
}

/// One search hit: the listing's payload attributes (arbitrary keys, owned by
/// the document store) plus the collaborator's relevance score.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ListingHit {
    pub score: f32,
    pub fields: Map<String, Value>,
}

impl ListingHit {
    pub fn text_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn number_field(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(Value::as_f64)
    }

    /// The listing's unit code, whichever of the two historical payload keys
    /// carries it.
    pub fn unit_code(&self) -> Option<&str> {
        self.text_field("ma_can_ho").or_else(|| self.text_field("ma_can"))
    }
}
