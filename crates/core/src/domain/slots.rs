use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The closed set of slot names the engine understands. Anything the NLU
/// extractor returns outside this set is dropped at parse time, which keeps
/// the invariant that `ConversationState.slots` only ever holds keys the
/// Normalizer and Validator recognize.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKey {
    DuAn,
    Toa,
    Tang,
    GiaBan,
    DienTich,
    SoPhongNgu,
    SoPhongWc,
    Huong,
    NoiThat,
    View,
    MaCanHo,
    Sdt,
    ThoiGian,
}

impl SlotKey {
    pub const ALL: [SlotKey; 13] = [
        Self::DuAn,
        Self::Toa,
        Self::Tang,
        Self::GiaBan,
        Self::DienTich,
        Self::SoPhongNgu,
        Self::SoPhongWc,
        Self::Huong,
        Self::NoiThat,
        Self::View,
        Self::MaCanHo,
        Self::Sdt,
        Self::ThoiGian,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DuAn => "du_an",
            Self::Toa => "toa",
            Self::Tang => "tang",
            Self::GiaBan => "gia_ban",
            Self::DienTich => "dien_tich",
            Self::SoPhongNgu => "so_phong_ngu",
            Self::SoPhongWc => "so_phong_wc",
            Self::Huong => "huong",
            Self::NoiThat => "noi_that",
            Self::View => "view",
            Self::MaCanHo => "ma_can_ho",
            Self::Sdt => "sdt",
            Self::ThoiGian => "thoi_gian",
        }
    }

    /// Slot keys that count as search criteria when deciding whether a
    /// search can run at all.
    pub fn is_search_criterion(&self) -> bool {
        matches!(self, Self::DuAn | Self::GiaBan | Self::DienTich | Self::SoPhongNgu)
    }

    /// Slot keys that participate in the listing filter.
    pub fn is_filterable(&self) -> bool {
        !matches!(self, Self::MaCanHo | Self::Sdt | Self::ThoiGian)
    }

    /// Human-readable Vietnamese label, used when asking for a missing slot.
    pub fn label_vi(&self) -> &'static str {
        match self {
            Self::DuAn => "dự án",
            Self::Toa => "tòa",
            Self::Tang => "tầng",
            Self::GiaBan => "giá bán",
            Self::DienTich => "diện tích",
            Self::SoPhongNgu => "số phòng ngủ",
            Self::SoPhongWc => "số phòng vệ sinh",
            Self::Huong => "hướng",
            Self::NoiThat => "nội thất",
            Self::View => "view",
            Self::MaCanHo => "mã căn hộ",
            Self::Sdt => "số điện thoại",
            Self::ThoiGian => "thời gian xem",
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotKey {
    type Err = UnknownSlotKey;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == value)
            .ok_or_else(|| UnknownSlotKey(value.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown slot key `{0}`")]
pub struct UnknownSlotKey(pub String);

/// One extracted slot value. Absence is modeled as a missing map key, so the
/// remaining cases form a tagged union: the explicit retraction sentinel, a
/// free-text scalar, a numeric scalar, or a half-open numeric range.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlotValue {
    Clear,
    Text(String),
    Number(f64),
    Range { min: Option<f64>, max: Option<f64> },
}

impl SlotValue {
    pub fn range(min: Option<f64>, max: Option<f64>) -> Self {
        Self::Range { min, max }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_clear(&self) -> bool {
        matches!(self, Self::Clear)
    }
}

/// Carried slot assignments for one conversation. `BTreeMap` keeps iteration
/// deterministic, which keeps filter construction and tests stable.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotMap(pub BTreeMap<SlotKey, SlotValue>);

impl SlotMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: SlotKey) -> Option<&SlotValue> {
        self.0.get(&key)
    }

    pub fn insert(&mut self, key: SlotKey, value: SlotValue) {
        self.0.insert(key, value);
    }

    pub fn contains(&self, key: SlotKey) -> bool {
        self.0.contains_key(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SlotKey, &SlotValue)> {
        self.0.iter().map(|(key, value)| (*key, value))
    }

    /// Newest-wins merge of one turn's extraction into the carried slots.
    ///
    /// The `Clear` sentinel removes the slot entirely; any other value
    /// overwrites whatever was carried. Keys the extraction did not mention
    /// are left untouched. Applying the same extraction twice is a no-op
    /// after the first application.
    pub fn merge(&mut self, extracted: &SlotMap) {
        for (key, value) in extracted.iter() {
            if value.is_clear() {
                self.0.remove(&key);
            } else {
                self.0.insert(key, value.clone());
            }
        }
    }

    /// True when at least one slot that counts as a search criterion is set.
    pub fn has_search_criteria(&self) -> bool {
        self.iter().any(|(key, _)| key.is_search_criterion())
    }
}

impl FromIterator<(SlotKey, SlotValue)> for SlotMap {
    fn from_iter<I: IntoIterator<Item = (SlotKey, SlotValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
