/// 相談依頼メールの組み立て
use serde_json::{Map, Value};

/// 未入力項目の表示
pub const NOT_AVAILABLE: &str = "N/A";

/// 通知メールの件名
pub const EMAIL_SUBJECT: &str = "New Consultation Request";

/// 相談依頼
#[derive(Debug, Clone, PartialEq)]
pub struct ConsultationRequest {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub requested_service: String,
}

impl ConsultationRequest {
    /// リクエストボディから作成する（欠けている項目は"N/A"）
    pub fn from_json(body: &Map<String, Value>) -> Self {
        let field = |key: &str| match body.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => NOT_AVAILABLE.to_string(),
        };
        Self {
            name: field("name"),
            phone: field("phone"),
            email: field("email"),
            requested_service: field("requestedService"),
        }
    }

    /// 通知メールの本文（プレーンテキスト）
    pub fn email_body(&self) -> String {
        format!(
            "Name: {}\nPhone: {}\nEmail: {}\nRequested Service: {}\n",
            self.name, self.phone, self.email, self.requested_service
        )
    }
}
