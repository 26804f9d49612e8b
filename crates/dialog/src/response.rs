//! Response stage: executes the decided action against the listing search
//! collaborator and renders the Vietnamese reply for the turn. All state
//! mutation is expressed as a [`StatePatch`] for the engine to apply; the
//! stage itself never touches the session store.

use std::fmt::Write as _;
use std::sync::Arc;

use canho_core::{
    ConversationState, DialogState, FieldCondition, ListingFilter, ListingHit, SlotKey, SlotMap,
    SlotValue, StatePatch,
};
use tracing::{debug, warn};

use crate::decision::{Action, AskTarget};
use crate::search::ListingSearch;

const APOLOGY_SEARCH_FAILED: &str =
    "Xin lỗi, hệ thống gặp sự cố khi tìm kiếm. Anh/chị vui lòng thử lại sau ít phút ạ.";
const NO_MATCHING_LISTINGS: &str =
    "Tiếc quá, em không tìm thấy căn hộ nào phù hợp với yêu cầu của anh/chị. \
     Anh/chị có muốn nới rộng tiêu chí tìm kiếm không ạ?";
const ASK_ANY_CRITERIA: &str =
    "Anh/chị vui lòng cho em biết thêm yêu cầu về dự án, giá bán, hoặc số phòng ngủ \
     để em tìm căn hộ phù hợp ạ?";
const ASK_REPHRASE: &str =
    "Em chưa hiểu rõ ý anh/chị. Anh/chị có thể nói rõ hơn được không ạ?";

/// Everything one turn produced: the reply text, the listings it surfaced
/// (empty for non-search actions) and the state changes to persist.
#[derive(Clone, Debug, Default)]
pub struct TurnOutcome {
    pub reply: String,
    pub listings: Vec<ListingHit>,
    pub patch: StatePatch,
}

pub struct Response {
    search: Arc<dyn ListingSearch>,
    result_limit: usize,
}

impl Response {
    pub fn new(search: Arc<dyn ListingSearch>, result_limit: usize) -> Self {
        Self { search, result_limit }
    }

    pub async fn execute(&self, action: &Action, state: &ConversationState) -> TurnOutcome {
        match action {
            Action::AskRephrase => TurnOutcome {
                reply: ASK_REPHRASE.to_string(),
                ..TurnOutcome::default()
            },
            Action::AskSlot { target } => TurnOutcome {
                reply: ask_slot_reply(*target),
                patch: StatePatch {
                    dialog_state: Some(DialogState::Collecting),
                    ..StatePatch::default()
                },
                ..TurnOutcome::default()
            },
            Action::NoResult { message } => TurnOutcome {
                reply: format!("{message} Anh/chị vui lòng kiểm tra lại giúp em ạ."),
                ..TurnOutcome::default()
            },
            Action::SearchListings { criteria } => self.run_search(criteria).await,
            Action::ShowDetails { unit_code } => self.show_details(unit_code).await,
            Action::BookAppointment { unit_code, phone, visit_time } => {
                book_appointment(unit_code, phone, visit_time, state)
            }
        }
    }

    async fn run_search(&self, criteria: &SlotMap) -> TurnOutcome {
        let filter = build_filter(criteria);
        let query = build_query_text(criteria);
        debug!(query = %query, conditions = filter.must.len(), "searching listings");

        let hits = match self.search.search(&filter, &query, self.result_limit).await {
            Ok(hits) => hits,
            Err(error) => {
                warn!(error = %error, "listing search failed");
                return TurnOutcome {
                    reply: APOLOGY_SEARCH_FAILED.to_string(),
                    ..TurnOutcome::default()
                };
            }
        };

        if hits.is_empty() {
            return TurnOutcome {
                reply: NO_MATCHING_LISTINGS.to_string(),
                patch: StatePatch {
                    dialog_state: Some(DialogState::Presenting),
                    episodic_summary: Some(format!("Không tìm thấy căn hộ nào cho: {query}")),
                    ..StatePatch::default()
                },
                ..TurnOutcome::default()
            };
        }

        let mut reply = format!(
            "Em tìm được {} căn hộ phù hợp với yêu cầu của anh/chị:\n",
            hits.len()
        );
        for (index, hit) in hits.iter().enumerate() {
            let _ = writeln!(reply, "{}. {}", index + 1, listing_card(hit));
        }
        reply.push_str(
            "Anh/chị muốn xem chi tiết căn nào thì cho em biết mã căn hộ nhé ạ.",
        );

        TurnOutcome {
            reply,
            patch: StatePatch {
                dialog_state: Some(DialogState::Presenting),
                episodic_summary: Some(format!("Đã giới thiệu {} căn hộ cho: {query}", hits.len())),
                ..StatePatch::default()
            },
            listings: hits,
        }
    }

    async fn show_details(&self, unit_code: &str) -> TurnOutcome {
        let hit = match self.search.find_by_unit_code(unit_code).await {
            Ok(hit) => hit,
            Err(error) => {
                warn!(error = %error, unit_code, "unit code lookup failed");
                return TurnOutcome {
                    reply: APOLOGY_SEARCH_FAILED.to_string(),
                    ..TurnOutcome::default()
                };
            }
        };

        let Some(hit) = hit else {
            return TurnOutcome {
                reply: format!(
                    "Em không tìm thấy căn hộ mã {unit_code}. \
                     Anh/chị kiểm tra lại mã căn giúp em ạ."
                ),
                ..TurnOutcome::default()
            };
        };

        TurnOutcome {
            reply: listing_detail(&hit),
            patch: StatePatch {
                dialog_state: Some(DialogState::Detail),
                last_viewed_apartment: Some(unit_code.to_string()),
                ..StatePatch::default()
            },
            listings: vec![hit],
        }
    }
}

fn book_appointment(
    unit_code: &str,
    phone: &str,
    visit_time: &str,
    state: &ConversationState,
) -> TurnOutcome {
    debug!(unit_code, visit_time, "booking confirmed");
    let mut reply = format!(
        "Em đã ghi nhận lịch hẹn xem căn hộ {unit_code} vào {visit_time}. \
         Tư vấn viên sẽ gọi cho anh/chị qua số {phone} để xác nhận ạ."
    );
    if state.last_viewed_apartment.as_deref() == Some(unit_code) {
        reply.push_str(" Cảm ơn anh/chị đã quan tâm đến căn hộ này ạ.");
    }

    TurnOutcome {
        reply,
        patch: StatePatch {
            dialog_state: Some(DialogState::Booked),
            episodic_summary: Some(format!(
                "Đã đặt lịch xem căn {unit_code} vào {visit_time}, liên hệ {phone}"
            )),
            ..StatePatch::default()
        },
        ..TurnOutcome::default()
    }
}

fn ask_slot_reply(target: AskTarget) -> String {
    match target {
        AskTarget::Criteria => ASK_ANY_CRITERIA.to_string(),
        AskTarget::Slot(SlotKey::GiaBan) => {
            "Anh/chị dự kiến tài chính khoảng bao nhiêu ạ?".to_string()
        }
        AskTarget::Slot(SlotKey::MaCanHo) => {
            "Anh/chị muốn đặt lịch xem căn hộ mã nào ạ?".to_string()
        }
        AskTarget::Slot(SlotKey::Sdt) => {
            "Anh/chị cho em xin số điện thoại để tư vấn viên xác nhận lịch hẹn ạ?".to_string()
        }
        AskTarget::Slot(SlotKey::ThoiGian) => {
            "Anh/chị muốn đi xem căn hộ vào thời gian nào ạ?".to_string()
        }
        AskTarget::Slot(key) => {
            format!("Anh/chị vui lòng cho em biết {} mong muốn ạ?", key.label_vi())
        }
    }
}

/// Turns the filterable slots into per-field conditions. Scalar prices are
/// treated as an upper bound and scalar areas as a lower bound, since buyers
/// state a budget ceiling and a size floor; bedroom counts match exactly.
pub fn build_filter(criteria: &SlotMap) -> ListingFilter {
    let mut must = Vec::new();
    for (key, value) in criteria.iter() {
        let field = key.as_str();
        let condition = match (key, value) {
            (_, SlotValue::Clear) => continue,
            (SlotKey::GiaBan, SlotValue::Number(amount)) => {
                FieldCondition::range(field, None, Some(*amount))
            }
            (SlotKey::DienTich, SlotValue::Number(area)) => {
                FieldCondition::range(field, Some(*area), None)
            }
            (_, SlotValue::Number(number)) => FieldCondition::matches(field, *number),
            (_, SlotValue::Range { min, max }) => FieldCondition::range(field, *min, *max),
            (_, SlotValue::Text(text)) => FieldCondition::matches(field, text.clone()),
        };
        must.push(condition);
    }
    ListingFilter { must }
}

/// Composes the free-text half of the search request from the same slots,
/// for collaborators that rank semantically.
pub fn build_query_text(criteria: &SlotMap) -> String {
    let mut parts = Vec::new();
    if let Some(project) = criteria.get(SlotKey::DuAn).and_then(SlotValue::as_text) {
        parts.push(format!("căn hộ dự án {project}"));
    }
    if let Some(bedrooms) = criteria.get(SlotKey::SoPhongNgu).and_then(SlotValue::as_number) {
        parts.push(format!("{} phòng ngủ", bedrooms as i64));
    }
    match criteria.get(SlotKey::GiaBan) {
        Some(SlotValue::Number(amount)) => parts.push(format!("giá dưới {}", format_price(*amount))),
        Some(SlotValue::Range { min, max }) => {
            if let Some(min) = min {
                parts.push(format!("giá từ {}", format_price(*min)));
            }
            if let Some(max) = max {
                parts.push(format!("giá đến {}", format_price(*max)));
            }
        }
        _ => {}
    }
    if let Some(area) = criteria.get(SlotKey::DienTich).and_then(SlotValue::as_number) {
        parts.push(format!("diện tích từ {area} m2"));
    }
    if let Some(direction) = criteria.get(SlotKey::Huong).and_then(SlotValue::as_text) {
        parts.push(format!("hướng {direction}"));
    }

    if parts.is_empty() {
        "căn hộ".to_string()
    } else {
        parts.join(", ")
    }
}

fn listing_card(hit: &ListingHit) -> String {
    let mut parts = Vec::new();
    if let Some(code) = hit.unit_code() {
        parts.push(format!("Căn {code}"));
    }
    if let Some(project) = hit.text_field("du_an") {
        parts.push(format!("dự án {project}"));
    }
    if let Some(bedrooms) = hit.number_field("so_phong_ngu") {
        parts.push(format!("{} phòng ngủ", bedrooms as i64));
    }
    if let Some(area) = hit.number_field("dien_tich") {
        parts.push(format!("{area} m2"));
    }
    if let Some(direction) = hit.text_field("huong") {
        parts.push(format!("hướng {direction}"));
    }
    if let Some(price) = hit.number_field("gia_ban") {
        parts.push(format!("giá {} VNĐ", format_vnd(price)));
    }
    parts.join(", ")
}

fn listing_detail(hit: &ListingHit) -> String {
    let code = hit.unit_code().unwrap_or("đang cập nhật");
    let mut reply = format!("Thông tin chi tiết căn hộ {code}:\n");
    let rows: [(&str, &str); 8] = [
        ("du_an", "Dự án"),
        ("toa", "Tòa"),
        ("tang", "Tầng"),
        ("dien_tich", "Diện tích"),
        ("so_phong_ngu", "Số phòng ngủ"),
        ("so_phong_wc", "Số phòng WC"),
        ("huong", "Hướng"),
        ("noi_that", "Nội thất"),
    ];
    for (field, label) in rows {
        let rendered = match field {
            "dien_tich" => hit.number_field(field).map(|area| format!("{area} m2")),
            "so_phong_ngu" | "so_phong_wc" | "tang" => {
                hit.number_field(field).map(|count| format!("{}", count as i64))
            }
            _ => hit.text_field(field).map(str::to_string),
        };
        if let Some(rendered) = rendered {
            let _ = writeln!(reply, "- {label}: {rendered}");
        }
    }
    if let Some(price) = hit.number_field("gia_ban") {
        let _ = writeln!(reply, "- Giá bán: {} ({} VNĐ)", format_price(price), format_vnd(price));
    }
    reply.push_str("Anh/chị có muốn đặt lịch xem căn hộ này không ạ?");
    reply
}

/// Short Vietnamese money phrasing: billions as "tỷ", millions as "triệu",
/// anything smaller spelled out in đồng.
pub fn format_price(amount: f64) -> String {
    if amount >= 1e9 {
        format!("{} tỷ", trim_decimal(amount / 1e9))
    } else if amount >= 1e6 {
        format!("{} triệu", trim_decimal(amount / 1e6))
    } else {
        format!("{} đồng", format_vnd(amount))
    }
}

/// Groups digits with '.' the way Vietnamese price boards do.
pub fn format_vnd(amount: f64) -> String {
    let whole = amount.round() as i64;
    let digits = whole.abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }
    if whole < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

fn trim_decimal(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{rounded}")
    }
}
