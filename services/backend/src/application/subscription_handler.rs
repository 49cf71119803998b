//! 顧客の定期購読

use chrono::Utc;
use serde_json::Value;
use tracing::info;

use super::api::{ApiError, ApiRequest, ApiResponse};
use super::auth::require_customer;
use super::clock::{new_id, now_rfc3339};
use crate::domain::SubscriptionChange;
use crate::infrastructure::SubscriptionRepository;

pub struct SubscriptionHandler<S>
where
    S: SubscriptionRepository,
{
    repo: S,
}

impl<S> SubscriptionHandler<S>
where
    S: SubscriptionRepository,
{
    pub fn new(repo: S) -> Self {
        Self { repo }
    }

    pub async fn get(&self, event: &Value) -> ApiResponse {
        ApiResponse::respond("subscription_get", self.process_get(event).await)
    }

    pub async fn upsert(&self, event: &Value) -> ApiResponse {
        ApiResponse::respond("subscription_upsert", self.process_upsert(event).await)
    }

    async fn process_get(&self, event: &Value) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest::from_event(event)?;
        let customer = require_customer(&request)?;

        let subscription = self
            .repo
            .get(&customer.user_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Subscription not found"))?;
        Ok(ApiResponse::ok(&subscription))
    }

    /// 無ければ作成（201）、あれば指定項目のみ更新（200）
    async fn process_upsert(&self, event: &Value) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest::from_event(event)?;
        let customer = require_customer(&request)?;
        let change = SubscriptionChange::from_json(&request.json_object()?)?;
        let now = now_rfc3339();

        match self.repo.get(&customer.user_id).await? {
            Some(current) => {
                if change.is_empty() {
                    return Err(ApiError::validation("No fields to update"));
                }
                let updated = change.apply(current, &now);
                self.repo.put(&updated).await?;
                info!(user_id = %customer.user_id, status = ?updated.status, "購読更新");
                Ok(ApiResponse::ok(&updated))
            }
            None => {
                let today = Utc::now().date_naive();
                let created = change.create(new_id(), &customer.user_id, today, &now)?;
                self.repo.put(&created).await?;
                info!(
                    user_id = %customer.user_id,
                    subscription_id = %created.subscription_id,
                    next_delivery = %created.next_delivery,
                    "購読作成"
                );
                Ok(ApiResponse::created(&created))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::api::tests::customer_event;
    use crate::infrastructure::subscription_repository::tests::MockSubscriptionRepository;
    use chrono::Days;
    use serde_json::json;

    fn plan() -> Value {
        json!({"planId": "weekly-5", "mealsPerWeek": 5, "portion": "family"})
    }

    #[tokio::test]
    async fn test_get_missing_is_404() {
        let handler = SubscriptionHandler::new(MockSubscriptionRepository::new());
        assert_eq!(handler.get(&customer_event("u1", None)).await.status_code, 404);
    }

    #[tokio::test]
    async fn test_create_then_update() {
        let repo = MockSubscriptionRepository::new();
        let handler = SubscriptionHandler::new(repo.clone());

        let response = handler
            .upsert(&customer_event("u1", Some(json!({"plan": plan()}))))
            .await;
        assert_eq!(response.status_code, 201);
        let created = repo.subscription("u1").unwrap();
        let expected = Utc::now()
            .date_naive()
            .checked_add_days(Days::new(7))
            .unwrap()
            .format("%Y-%m-%d")
            .to_string();
        assert_eq!(created.next_delivery, expected);
        assert_eq!(response.body_json()["status"], "ACTIVE");

        let response = handler
            .upsert(&customer_event(
                "u1",
                Some(json!({"status": "PAUSED", "skipDates": [expected.clone(), expected.clone()]})),
            ))
            .await;
        assert_eq!(response.status_code, 200);
        let updated = repo.subscription("u1").unwrap();
        assert_eq!(updated.skip_dates, vec![expected.clone()]);
        assert_ne!(updated.next_delivery, expected);
        assert_eq!(updated.subscription_id, created.subscription_id);

        let fetched = handler.get(&customer_event("u1", None)).await.body_json();
        assert_eq!(fetched["status"], "PAUSED");
    }

    #[tokio::test]
    async fn test_create_requires_valid_plan() {
        let handler = SubscriptionHandler::new(MockSubscriptionRepository::new());

        let response = handler
            .upsert(&customer_event("u1", Some(json!({"status": "ACTIVE"}))))
            .await;
        assert_eq!(response.status_code, 400);

        let mut too_many = plan();
        too_many["mealsPerWeek"] = json!(22);
        let response = handler
            .upsert(&customer_event("u1", Some(json!({"plan": too_many}))))
            .await;
        assert_eq!(response.status_code, 400);

        let mut bad_portion = plan();
        bad_portion["portion"] = json!("huge");
        let response = handler
            .upsert(&customer_event("u1", Some(json!({"plan": bad_portion}))))
            .await;
        assert_eq!(response.status_code, 400);
    }

    #[tokio::test]
    async fn test_invalid_skip_date_is_400() {
        let handler = SubscriptionHandler::new(MockSubscriptionRepository::new());
        let body = json!({"plan": plan(), "skipDates": ["next week"]});
        assert_eq!(handler.upsert(&customer_event("u1", Some(body))).await.status_code, 400);
    }
}
