//! Canonicalization of loosely-specified user text: project nicknames,
//! compass shorthand, furnishing status, and free-form price/area strings.
//!
//! Every function returns a canonical value or `None`; a `None` means the
//! caller keeps the original text as a provisional value. Nothing here
//! errors.

use regex::Regex;

/// Alias → canonical project code. Matched by substring after lowercasing,
/// so "căn ở q7 riverside" still resolves.
const PROJECT_ALIASES: [(&str, &str); 10] = [
    ("q7 riverside", "Q7Riverside"),
    ("q7riverside", "Q7Riverside"),
    ("sky 89", "Sky89"),
    ("sky89", "Sky89"),
    ("river panorama", "RiverPanorama"),
    ("sunrise riverside", "SunriseRiverside"),
    ("sunrise city", "SunriseCity"),
    ("eco green", "EcoGreenSaigon"),
    ("vinhomes grand park", "VinhomesGrandPark"),
    ("the gio riverside", "TheGioRiverside"),
];

/// Lowercased shorthand → full compass direction. Exact lookup only.
const DIRECTION_SHORTCUTS: [(&str, &str); 12] = [
    ("đ", "Đông"),
    ("dong", "Đông"),
    ("t", "Tây"),
    ("tay", "Tây"),
    ("n", "Nam"),
    ("b", "Bắc"),
    ("bac", "Bắc"),
    ("đn", "Đông Nam"),
    ("đb", "Đông Bắc"),
    ("tn", "Tây Nam"),
    ("tb", "Tây Bắc"),
    ("dn", "Đông Nam"),
];

/// Substring → canonical furnishing status. Order matters: the more specific
/// entries come first so "không nội thất" does not match "nội thất".
const FURNITURE_ALIASES: [(&str, &str); 7] = [
    ("không nội thất", "Thô"),
    ("full nội thất", "Full"),
    ("đầy đủ nội thất", "Full"),
    ("full", "Full"),
    ("cơ bản", "Cơ bản"),
    ("bàn giao thô", "Thô"),
    ("thô", "Thô"),
];

/// Bare price numbers at or below this are read as tỷ (billions).
const BARE_PRICE_BILLION_CUTOFF: f64 = 100.0;
/// Bare price numbers below this (and above the tỷ cutoff) are read as triệu.
const BARE_PRICE_MILLION_CUTOFF: f64 = 1_000_000.0;

#[derive(Clone, Debug)]
pub struct Normalizer {
    price_re: Regex,
    area_re: Regex,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    pub fn new() -> Self {
        // Number with optional Vietnamese decimal comma, then an optional
        // unit word. Compiled once; neither pattern can fail.
        let price_re =
            Regex::new(r"(\d+(?:[.,]\d+)?)\s*(tỷ|ty|tỉ|triệu|trieu|tr|nghìn|nghin|k)?").expect("price pattern");
        let area_re =
            Regex::new(r"(\d+(?:[.,]\d+)?)\s*(m2|m²|m vuông|mét vuông)?").expect("area pattern");
        Self { price_re, area_re }
    }

    /// "q7 riverside" → "Q7Riverside". Substring match against the alias
    /// table; unmatched input returns `None`.
    pub fn project(&self, text: &str) -> Option<&'static str> {
        let lowered = normalize_text(text);
        if lowered.is_empty() {
            return None;
        }
        PROJECT_ALIASES
            .iter()
            .find(|(alias, _)| lowered.contains(alias))
            .map(|(_, canonical)| *canonical)
    }

    /// "đn" → "Đông Nam". Exact lookup after lowercasing.
    pub fn direction(&self, text: &str) -> Option<&'static str> {
        let lowered = normalize_text(text);
        DIRECTION_SHORTCUTS
            .iter()
            .find(|(alias, _)| *alias == lowered)
            .map(|(_, canonical)| *canonical)
    }

    /// "full nội thất" → "Full".
    pub fn furniture(&self, text: &str) -> Option<&'static str> {
        let lowered = normalize_text(text);
        if lowered.is_empty() {
            return None;
        }
        FURNITURE_ALIASES
            .iter()
            .find(|(alias, _)| lowered.contains(alias))
            .map(|(_, canonical)| *canonical)
    }

    /// Price string → VND amount. "3 tỷ" → 3_000_000_000, "800tr" →
    /// 800_000_000.
    ///
    /// When no unit word is present the amount is guessed from its size:
    /// small numbers read as tỷ ("tầm 3" → 3 tỷ), mid-size as triệu, and
    /// anything at or above a raw VND magnitude passes through unchanged.
    /// This is a known approximation carried from the source system.
    pub fn price(&self, text: &str) -> Option<i64> {
        let lowered = normalize_text(text);
        let captures = self.price_re.captures(&lowered)?;
        let amount = parse_decimal(captures.get(1)?.as_str())?;

        let vnd = match captures.get(2).map(|unit| unit.as_str()) {
            Some("tỷ") | Some("ty") | Some("tỉ") => amount * 1e9,
            Some("triệu") | Some("trieu") | Some("tr") => amount * 1e6,
            Some("nghìn") | Some("nghin") | Some("k") => amount * 1e3,
            _ => {
                if amount <= BARE_PRICE_BILLION_CUTOFF {
                    amount * 1e9
                } else if amount < BARE_PRICE_MILLION_CUTOFF {
                    amount * 1e6
                } else {
                    amount
                }
            }
        };

        if vnd.is_finite() {
            Some(vnd.round() as i64)
        } else {
            None
        }
    }

    /// Area string → square meters. "70m2" → 70.0, "70,5 m2" → 70.5.
    pub fn area(&self, text: &str) -> Option<f64> {
        let lowered = normalize_text(text);
        let captures = self.area_re.captures(&lowered)?;
        parse_decimal(captures.get(1)?.as_str())
    }
}

/// Lowercase and collapse whitespace.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn parse_decimal(raw: &str) -> Option<f64> {
    raw.replace(',', ".").parse::<f64>().ok()
}
