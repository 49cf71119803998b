/// ケータリング依頼のドメインモデル
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::validation::{is_valid_date, is_valid_email, is_valid_phone};

/// ゲスト数の上限
pub const MAX_GUEST_COUNT: u64 = 10_000;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CateringError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{field} {reason}")]
    InvalidField { field: &'static str, reason: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CateringStatus {
    New,
    Quoted,
    Invoiced,
    Scheduled,
    Completed,
    Cancelled,
}

/// 依頼者の連絡先
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// ケータリング依頼
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CateringRequest {
    pub request_id: String,
    pub user_id: String,
    pub event_date: String,
    pub guest_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    pub contact: Contact,
    #[serde(default)]
    pub cuisine_preferences: Vec<String>,
    pub status: CateringStatus,
    pub created_at: String,
}

impl CateringRequest {
    /// リクエストボディから新規依頼を作成する
    pub fn from_json(
        body: &Map<String, Value>,
        request_id: String,
        user_id: &str,
        now: &str,
    ) -> Result<Self, CateringError> {
        let event_date = required_str(body, "eventDate")?;
        if !is_valid_date(event_date) {
            return Err(CateringError::InvalidField {
                field: "eventDate",
                reason: "must be YYYY-MM-DD",
            });
        }

        let guest_count = body
            .get("guestCount")
            .ok_or(CateringError::MissingField("guestCount"))?
            .as_u64()
            .filter(|n| (1..=MAX_GUEST_COUNT).contains(n))
            .ok_or(CateringError::InvalidField {
                field: "guestCount",
                reason: "must be a positive integer",
            })? as u32;

        let budget = match body.get("budget") {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.as_f64().filter(|b| *b >= 0.0).ok_or(
                CateringError::InvalidField {
                    field: "budget",
                    reason: "must be a non-negative number",
                },
            )?),
        };

        let contact_fields = body
            .get("contact")
            .and_then(Value::as_object)
            .ok_or(CateringError::MissingField("contact"))?;
        let contact = Contact {
            name: required_str(contact_fields, "name")?.to_string(),
            email: required_str(contact_fields, "email")?.to_string(),
            phone: required_str(contact_fields, "phone")?.to_string(),
        };
        if !is_valid_email(&contact.email) {
            return Err(CateringError::InvalidField {
                field: "contact.email",
                reason: "is not a valid email address",
            });
        }
        if !is_valid_phone(&contact.phone) {
            return Err(CateringError::InvalidField {
                field: "contact.phone",
                reason: "is not a valid phone number",
            });
        }

        let cuisine_preferences = match body.get("cuisinePreferences") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(values)) => values
                .iter()
                .map(|v| v.as_str().map(|s| s.trim().to_string()))
                .collect::<Option<Vec<_>>>()
                .ok_or(CateringError::InvalidField {
                    field: "cuisinePreferences",
                    reason: "must be an array of strings",
                })?,
            Some(_) => {
                return Err(CateringError::InvalidField {
                    field: "cuisinePreferences",
                    reason: "must be an array of strings",
                });
            }
        };

        Ok(Self {
            request_id,
            user_id: user_id.to_string(),
            event_date: event_date.to_string(),
            guest_count,
            budget,
            contact,
            cuisine_preferences,
            status: CateringStatus::New,
            created_at: now.to_string(),
        })
    }
}

fn required_str<'a>(
    fields: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, CateringError> {
    fields
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(CateringError::MissingField(field))
}
