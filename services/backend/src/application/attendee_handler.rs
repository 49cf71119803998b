//! 同窓会の受付ダッシュボード・検索・チェックイン

use serde_json::{json, Value};
use tracing::{info, warn};

use super::api::{ApiError, ApiRequest, ApiResponse};
use super::clock::now_rfc3339;
use crate::domain::{AttendeeSearch, CheckInActions, Dashboard};
use crate::infrastructure::{AttendeeRepository, RepositoryError};

pub struct AttendeeHandler<R>
where
    R: AttendeeRepository,
{
    repo: R,
}

impl<R> AttendeeHandler<R>
where
    R: AttendeeRepository,
{
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub async fn dashboard(&self, event: &Value) -> ApiResponse {
        ApiResponse::respond("attendee_dashboard", self.process_dashboard(event).await)
    }

    pub async fn search(&self, event: &Value) -> ApiResponse {
        ApiResponse::respond("attendee_search", self.process_search(event).await)
    }

    pub async fn check_in(&self, event: &Value) -> ApiResponse {
        ApiResponse::respond("attendee_checkin", self.process_check_in(event).await)
    }

    async fn process_dashboard(&self, event: &Value) -> Result<ApiResponse, ApiError> {
        ApiRequest::from_event(event)?;
        let dashboard = Dashboard::from_attendees(self.repo.scan_all().await?);
        info!(
            total = dashboard.total_attendees,
            checked_in = dashboard.checked_in,
            shirts = dashboard.shirts_picked_up,
            "ダッシュボード集計"
        );
        Ok(ApiResponse::ok(&dashboard))
    }

    /// クエリ文字列、無ければJSON本文を検索条件にする
    async fn process_search(&self, event: &Value) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest::from_event(event)?;

        let search = if request.query_params().next().is_some() {
            AttendeeSearch::from_params(request.query_params())
        } else {
            let has_body = request
                .body_text()?
                .is_some_and(|text| !text.trim().is_empty());
            if has_body {
                let body = request.json_object()?;
                let params: Vec<(&str, &str)> = body
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.as_str(), v)))
                    .collect();
                AttendeeSearch::from_params(params)
            } else {
                AttendeeSearch::default()
            }
        };

        let matches = search.apply(self.repo.scan_all().await?);
        info!(matches = matches.len(), "参加者検索");
        Ok(ApiResponse::ok(&matches))
    }

    async fn process_check_in(&self, event: &Value) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest::from_event(event)?;
        let attendee_id = request
            .path_param("id")
            .ok_or_else(|| ApiError::validation("Attendee id is required"))?;
        let actions = CheckInActions::from_json(&request.json_object()?);
        if actions.is_empty() {
            return Err(ApiError::validation("No action specified"));
        }

        let attendee = match self.repo.check_in(attendee_id, actions, &now_rfc3339()).await {
            Ok(attendee) => attendee,
            Err(RepositoryError::ConditionFailed(_)) => {
                warn!(attendee_id = %attendee_id, "存在しない参加者");
                return Err(ApiError::not_found(format!(
                    "Attendee {} not found",
                    attendee_id
                )));
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            attendee_id = %attendee_id,
            check_in = actions.check_in,
            shirt_pickup = actions.shirt_pickup,
            "受付を記録"
        );
        Ok(ApiResponse::ok(&json!({
            "message": "Attendee updated",
            "attendee": attendee,
        })))
    }
}
