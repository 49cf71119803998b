/// 修理・作業依頼のドメインルール
///
/// 依頼は自由形式のJSONオブジェクトとして保存する。必須項目の検証と
/// デフォルト値の補完、更新可能なフィールドの判定を行う。
use serde_json::{Map, Value};
use thiserror::Error;

/// 作成時に必須のフィールド
pub const REQUIRED_FIELDS: [&str; 5] = [
    "customerName",
    "customerPhone",
    "customerEmail",
    "serviceType",
    "description",
];

/// 更新で書き換えられないフィールド（キー属性）
pub const IMMUTABLE_FIELDS: [&str; 4] = ["PK", "SK", "serviceId", "requestedAt"];

pub const DEFAULT_STATUS: &str = "Scheduled";
pub const DEFAULT_TECHNICIAN: &str = "unassigned";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ServiceRequestError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("No fields to update")]
    NoFieldsToUpdate,

    #[error("Fields cannot be updated: {}", .0.join(", "))]
    ImmutableFields(Vec<String>),
}

/// 新規依頼を検証し、デフォルト値を補完する
///
/// serviceId・requestedAtが無ければ引数の値を使う。
pub fn prepare_new_request(
    mut body: Map<String, Value>,
    generated_id: String,
    now: &str,
) -> Result<Map<String, Value>, ServiceRequestError> {
    let missing: Vec<String> = REQUIRED_FIELDS
        .iter()
        .filter(|field| !is_present(body.get(**field)))
        .map(|field| field.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ServiceRequestError::MissingFields(missing));
    }

    body.remove("PK");
    body.remove("SK");
    if !is_present(body.get("serviceId")) {
        body.insert("serviceId".to_string(), Value::String(generated_id));
    }
    if !is_present(body.get("requestedAt")) {
        body.insert("requestedAt".to_string(), Value::String(now.to_string()));
    }
    if !is_present(body.get("status")) {
        body.insert("status".to_string(), Value::String(DEFAULT_STATUS.to_string()));
    }
    if !is_present(body.get("assignedTechnician")) {
        body.insert(
            "assignedTechnician".to_string(),
            Value::String(DEFAULT_TECHNICIAN.to_string()),
        );
    }
    Ok(body)
}

/// 更新内容を検証する
pub fn validate_update(fields: &Map<String, Value>) -> Result<(), ServiceRequestError> {
    if fields.is_empty() {
        return Err(ServiceRequestError::NoFieldsToUpdate);
    }
    let immutable: Vec<String> = fields
        .keys()
        .filter(|key| IMMUTABLE_FIELDS.contains(&key.as_str()))
        .cloned()
        .collect();
    if !immutable.is_empty() {
        return Err(ServiceRequestError::ImmutableFields(immutable));
    }
    Ok(())
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    fn valid() -> Value {
        json!({
            "customerName": "Pat",
            "customerPhone": "312-555-0199",
            "customerEmail": "pat@example.com",
            "serviceType": "HVAC",
            "description": "Furnace is loud",
            "address": "1 Main St"
        })
    }

    #[test]
    fn test_defaults_are_filled() {
        let prepared = prepare_new_request(body(valid()), "svc-1".to_string(), "2025-06-01T00:00:00Z").unwrap();

        assert_eq!(prepared["serviceId"], "svc-1");
        assert_eq!(prepared["requestedAt"], "2025-06-01T00:00:00Z");
        assert_eq!(prepared["status"], DEFAULT_STATUS);
        assert_eq!(prepared["assignedTechnician"], DEFAULT_TECHNICIAN);
        assert_eq!(prepared["address"], "1 Main St");
    }

    #[test]
    fn test_given_values_are_kept() {
        let mut value = valid();
        value["serviceId"] = json!("custom-id");
        value["status"] = json!("In Progress");
        let prepared = prepare_new_request(body(value), "svc-1".to_string(), "now").unwrap();

        assert_eq!(prepared["serviceId"], "custom-id");
        assert_eq!(prepared["status"], "In Progress");
    }

    #[test]
    fn test_missing_fields_are_listed() {
        let mut value = valid();
        value.as_object_mut().unwrap().remove("customerEmail");
        value["description"] = json!("  ");

        let err = prepare_new_request(body(value), "svc-1".to_string(), "now").unwrap_err();

        assert_eq!(
            err,
            ServiceRequestError::MissingFields(vec![
                "customerEmail".to_string(),
                "description".to_string()
            ])
        );
        assert_eq!(err.to_string(), "Missing required fields: customerEmail, description");
    }

    #[test]
    fn test_validate_update() {
        assert_eq!(
            validate_update(&Map::new()),
            Err(ServiceRequestError::NoFieldsToUpdate)
        );
        assert!(validate_update(&body(json!({"status": "Completed"}))).is_ok());
        assert!(matches!(
            validate_update(&body(json!({"SK": "x", "status": "Completed"}))),
            Err(ServiceRequestError::ImmutableFields(_))
        ));
    }
}
