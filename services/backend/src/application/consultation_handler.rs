//! 相談依頼フォームの受付と事業者への通知メール

use serde_json::{json, Value};
use tracing::info;

use super::api::{ApiError, ApiRequest, ApiResponse};
use crate::domain::consultation::EMAIL_SUBJECT;
use crate::domain::ConsultationRequest;
use crate::infrastructure::{Mailer, PlainEmail};

pub struct ConsultationHandler<M>
where
    M: Mailer,
{
    mailer: M,
    sender: String,
    recipient: String,
}

impl<M> ConsultationHandler<M>
where
    M: Mailer,
{
    pub fn new(mailer: M, sender: String, recipient: String) -> Self {
        Self {
            mailer,
            sender,
            recipient,
        }
    }

    pub async fn handle(&self, event: &Value) -> ApiResponse {
        ApiResponse::respond("consultation_request", self.process(event).await)
    }

    async fn process(&self, event: &Value) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest::from_event(event)?;
        let consultation = ConsultationRequest::from_json(&request.json_object()?);

        let email = PlainEmail {
            from: self.sender.clone(),
            to: self.recipient.clone(),
            subject: EMAIL_SUBJECT.to_string(),
            body: consultation.email_body(),
        };
        let message_id = self.mailer.send(&email).await?;

        info!(
            message_id = %message_id,
            requested_service = %consultation.requested_service,
            "相談依頼を通知"
        );
        Ok(ApiResponse::ok(&json!({
            "message": "Consultation request received."
        })))
    }
}
