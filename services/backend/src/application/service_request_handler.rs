//! 修理・作業依頼の登録・一覧・更新

use serde_json::{json, Value};
use tracing::info;

use super::api::{ApiError, ApiRequest, ApiResponse};
use super::clock::{new_id, now_rfc3339};
use crate::domain::service_request::{prepare_new_request, validate_update};
use crate::infrastructure::ServiceRequestRepository;

pub struct ServiceRequestHandler<R>
where
    R: ServiceRequestRepository,
{
    repo: R,
}

impl<R> ServiceRequestHandler<R>
where
    R: ServiceRequestRepository,
{
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub async fn create(&self, event: &Value) -> ApiResponse {
        ApiResponse::respond("service_request_create", self.process_create(event).await)
    }

    pub async fn list(&self, event: &Value) -> ApiResponse {
        ApiResponse::respond("service_request_list", self.process_list(event).await)
    }

    pub async fn update(&self, event: &Value) -> ApiResponse {
        ApiResponse::respond("service_request_update", self.process_update(event).await)
    }

    async fn process_create(&self, event: &Value) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest::from_event(event)?;
        let record = prepare_new_request(request.json_object()?, new_id(), &now_rfc3339())?;
        self.repo.put(&record).await?;

        let service_id = record.get("serviceId").cloned().unwrap_or(Value::Null);
        info!(service_id = %service_id, "作業依頼を登録");
        Ok(ApiResponse::ok(&json!({
            "message": "Service request created successfully",
            "serviceId": service_id,
        })))
    }

    async fn process_list(&self, event: &Value) -> Result<ApiResponse, ApiError> {
        ApiRequest::from_event(event)?;
        let records = self.repo.list_all().await?;
        Ok(ApiResponse::ok(&json!({
            "message": "Service requests retrieved successfully",
            "data": records,
        })))
    }

    /// 依頼の最新行を部分更新する
    async fn process_update(&self, event: &Value) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest::from_event(event)?;
        let service_id = request
            .path_param("serviceId")
            .ok_or_else(|| ApiError::validation("serviceId is required"))?;
        let fields = request.json_object()?;
        validate_update(&fields)?;

        let sort_key = self
            .repo
            .latest_sort_key(service_id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Service request {} not found", service_id)))?;
        self.repo
            .update_fields(service_id, &sort_key, &fields)
            .await?;

        info!(service_id = %service_id, fields = fields.len(), "作業依頼を更新");
        Ok(ApiResponse::ok(&json!({
            "message": "Service request updated",
            "serviceId": service_id,
        })))
    }
}
