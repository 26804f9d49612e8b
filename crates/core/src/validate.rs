//! Domain-bound checks for extracted slots. Each validator is pure and
//! independent; `validate_slots` concatenates whichever field-level errors
//! apply. The Decision stage calls this before a search is allowed to run,
//! and the error strings are surfaced to the user verbatim.

use crate::domain::slots::{SlotKey, SlotMap, SlotValue};

pub const MIN_VALID_PRICE: f64 = 100_000_000.0;
pub const MAX_VALID_PRICE: f64 = 100_000_000_000.0;
pub const MIN_BEDROOMS: f64 = 1.0;
pub const MAX_BEDROOMS: f64 = 10.0;
pub const MIN_AREA: f64 = 20.0;
pub const MAX_AREA: f64 = 500.0;

/// Validate every bounded slot that is present. Empty result means valid.
/// Key order in the map does not affect which errors are produced.
pub fn validate_slots(slots: &SlotMap) -> Vec<String> {
    let mut errors = Vec::new();

    if let Some(price) = slots.get(SlotKey::GiaBan) {
        errors.extend(validate_price(price));
    }
    if let Some(bedrooms) = slots.get(SlotKey::SoPhongNgu) {
        errors.extend(validate_bedrooms(bedrooms));
    }
    if let Some(area) = slots.get(SlotKey::DienTich) {
        errors.extend(validate_area(area));
    }

    errors
}

pub fn validate_price(price: &SlotValue) -> Option<String> {
    match price {
        SlotValue::Number(value) => {
            if *value < 0.0 {
                return Some("Giá bán không thể là số âm.".to_string());
            }
            if *value < MIN_VALID_PRICE {
                return Some(format!(
                    "Giá bán có vẻ quá thấp (dưới {} triệu).",
                    (MIN_VALID_PRICE / 1e6) as i64
                ));
            }
            if *value > MAX_VALID_PRICE {
                return Some(format!(
                    "Giá bán có vẻ quá cao (trên {} tỷ).",
                    (MAX_VALID_PRICE / 1e9) as i64
                ));
            }
            None
        }
        SlotValue::Range { min, max } => {
            if min.unwrap_or(0.0) < 0.0 || max.unwrap_or(0.0) < 0.0 {
                return Some("Giá bán không thể là số âm.".to_string());
            }
            if let (Some(min), Some(max)) = (min, max) {
                if min > max {
                    return Some(
                        "Giá tối thiểu không thể lớn hơn giá tối đa.".to_string(),
                    );
                }
            }
            if let Some(max) = max {
                if *max < MIN_VALID_PRICE {
                    return Some(format!(
                        "Giá bán có vẻ quá thấp (dưới {} triệu).",
                        (MIN_VALID_PRICE / 1e6) as i64
                    ));
                }
            }
            if let Some(min) = min {
                if *min > MAX_VALID_PRICE {
                    return Some(format!(
                        "Giá bán có vẻ quá cao (trên {} tỷ).",
                        (MAX_VALID_PRICE / 1e9) as i64
                    ));
                }
            }
            None
        }
        SlotValue::Text(_) => Some("Giá bán không hợp lệ.".to_string()),
        SlotValue::Clear => None,
    }
}

pub fn validate_bedrooms(bedrooms: &SlotValue) -> Option<String> {
    match bedrooms {
        SlotValue::Number(value) => {
            if *value < 0.0 {
                return Some("Số phòng ngủ không thể âm.".to_string());
            }
            if value.fract() != 0.0 {
                return Some("Số phòng ngủ phải là số nguyên.".to_string());
            }
            if *value < MIN_BEDROOMS {
                return Some(format!("Số phòng ngủ tối thiểu là {}.", MIN_BEDROOMS as i64));
            }
            if *value > MAX_BEDROOMS {
                return Some(format!("Số phòng ngủ tối đa là {}.", MAX_BEDROOMS as i64));
            }
            None
        }
        SlotValue::Range { min, max } => {
            if min.unwrap_or(0.0) < 0.0 || max.unwrap_or(0.0) < 0.0 {
                return Some("Số phòng ngủ không thể âm.".to_string());
            }
            if let (Some(min), Some(max)) = (min, max) {
                if min > max {
                    return Some(
                        "Số phòng ngủ tối thiểu không thể lớn hơn tối đa.".to_string(),
                    );
                }
            }
            if let Some(max) = max {
                if *max > MAX_BEDROOMS {
                    return Some(format!("Số phòng ngủ tối đa là {}.", MAX_BEDROOMS as i64));
                }
            }
            None
        }
        SlotValue::Text(_) => Some("Số phòng ngủ phải là số.".to_string()),
        SlotValue::Clear => None,
    }
}

pub fn validate_area(area: &SlotValue) -> Option<String> {
    match area {
        SlotValue::Number(value) => {
            if *value < 0.0 {
                return Some("Diện tích không thể âm.".to_string());
            }
            if *value < MIN_AREA {
                return Some(format!("Diện tích có vẻ quá nhỏ (dưới {}m2).", MIN_AREA as i64));
            }
            if *value > MAX_AREA {
                return Some(format!("Diện tích có vẻ quá lớn (trên {}m2).", MAX_AREA as i64));
            }
            None
        }
        SlotValue::Range { min, max } => {
            if min.unwrap_or(0.0) < 0.0 || max.unwrap_or(0.0) < 0.0 {
                return Some("Diện tích không thể âm.".to_string());
            }
            if let (Some(min), Some(max)) = (min, max) {
                if min > max {
                    return Some(
                        "Diện tích tối thiểu không thể lớn hơn tối đa.".to_string(),
                    );
                }
            }
            if let Some(max) = max {
                if *max < MIN_AREA {
                    return Some(format!("Diện tích có vẻ quá nhỏ (dưới {}m2).", MIN_AREA as i64));
                }
            }
            if let Some(min) = min {
                if *min > MAX_AREA {
                    return Some(format!("Diện tích có vẻ quá lớn (trên {}m2).", MAX_AREA as i64));
                }
            }
            None
        }
        SlotValue::Text(_) => Some("Diện tích phải là số.".to_string()),
        SlotValue::Clear => None,
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::slots::{SlotKey, SlotMap, SlotValue};

    use super::{validate_area, validate_bedrooms, validate_price, validate_slots};

    #[test]
    fn negative_price_is_rejected() {
        let error = validate_price(&SlotValue::Number(-100.0));
        assert_eq!(error.as_deref(), Some("Giá bán không thể là số âm."));
    }

    #[test]
    fn price_outside_sane_bounds_is_rejected() {
        assert!(validate_price(&SlotValue::Number(50_000_000.0)).is_some());
        assert!(validate_price(&SlotValue::Number(200_000_000_000.0)).is_some());
        assert!(validate_price(&SlotValue::Number(2_500_000_000.0)).is_none());
    }

    #[test]
    fn price_range_ordering_is_enforced() {
        let inverted = SlotValue::range(Some(3e9), Some(2e9));
        assert_eq!(
            validate_price(&inverted).as_deref(),
            Some("Giá tối thiểu không thể lớn hơn giá tối đa.")
        );
        let open_ended = SlotValue::range(Some(2e9), None);
        assert!(validate_price(&open_ended).is_none());
    }

    #[test]
    fn bedroom_bounds_and_ordering() {
        assert!(validate_bedrooms(&SlotValue::Number(-1.0)).is_some());
        assert!(validate_bedrooms(&SlotValue::Number(2.5)).is_some());
        assert!(validate_bedrooms(&SlotValue::Number(11.0)).is_some());
        assert!(validate_bedrooms(&SlotValue::Number(2.0)).is_none());
        assert!(validate_bedrooms(&SlotValue::range(Some(3.0), Some(2.0))).is_some());
        assert!(validate_bedrooms(&SlotValue::range(Some(2.0), Some(3.0))).is_none());
        assert!(validate_bedrooms(&SlotValue::Text("nhiều".to_string())).is_some());
    }

    #[test]
    fn area_bounds_and_ordering() {
        assert!(validate_area(&SlotValue::Number(10.0)).is_some());
        assert!(validate_area(&SlotValue::Number(600.0)).is_some());
        assert!(validate_area(&SlotValue::Number(72.5)).is_none());
        assert!(validate_area(&SlotValue::range(Some(80.0), Some(70.0))).is_some());
        assert!(validate_area(&SlotValue::range(Some(70.0), Some(80.0))).is_none());
    }

    #[test]
    fn combined_validation_collects_each_field_error() {
        let slots = SlotMap::from_iter([
            (SlotKey::GiaBan, SlotValue::Number(-100.0)),
            (SlotKey::SoPhongNgu, SlotValue::Number(12.0)),
            (SlotKey::DienTich, SlotValue::Number(72.0)),
        ]);
        let errors = validate_slots(&slots);
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|message| message.contains("Giá bán")));
        assert!(errors.iter().any(|message| message.contains("phòng ngủ")));
    }

    #[test]
    fn validators_ignore_unrelated_slots() {
        let slots = SlotMap::from_iter([
            (SlotKey::DuAn, SlotValue::Text("Q7Riverside".to_string())),
            (SlotKey::Huong, SlotValue::Text("Đông Nam".to_string())),
        ]);
        assert!(validate_slots(&slots).is_empty());
    }
}
