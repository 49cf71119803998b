//! ケータリング依頼の受付

use serde_json::{json, Value};
use tracing::info;

use super::api::{ApiError, ApiRequest, ApiResponse};
use super::auth::require_customer;
use super::clock::{new_id, now_rfc3339};
use crate::domain::CateringRequest;
use crate::infrastructure::CateringRepository;

pub struct CateringHandler<C>
where
    C: CateringRepository,
{
    repo: C,
}

impl<C> CateringHandler<C>
where
    C: CateringRepository,
{
    pub fn new(repo: C) -> Self {
        Self { repo }
    }

    pub async fn create(&self, event: &Value) -> ApiResponse {
        ApiResponse::respond("catering_create", self.process_create(event).await)
    }

    async fn process_create(&self, event: &Value) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest::from_event(event)?;
        let customer = require_customer(&request)?;
        let body = request.json_object()?;

        let catering =
            CateringRequest::from_json(&body, new_id(), &customer.user_id, &now_rfc3339())?;
        self.repo.create(&catering).await?;

        info!(
            request_id = %catering.request_id,
            user_id = %catering.user_id,
            event_date = %catering.event_date,
            guest_count = catering.guest_count,
            "ケータリング依頼受付"
        );
        Ok(ApiResponse::created(&json!({
            "requestId": catering.request_id,
            "status": catering.status,
        })))
    }
}
