//! 管理画面の集計API

use chrono::Utc;
use serde_json::Value;
use tracing::info;

use super::api::{ApiError, ApiRequest, ApiResponse};
use super::auth::require_admin;
use crate::domain::compute_analytics;
use crate::domain::validation::is_valid_date;
use crate::infrastructure::{CateringRepository, OrderRepository, SubscriptionRepository};

pub struct AnalyticsHandler<O, S, C>
where
    O: OrderRepository,
    S: SubscriptionRepository,
    C: CateringRepository,
{
    orders: O,
    subscriptions: S,
    catering: C,
}

impl<O, S, C> AnalyticsHandler<O, S, C>
where
    O: OrderRepository,
    S: SubscriptionRepository,
    C: CateringRepository,
{
    pub fn new(orders: O, subscriptions: S, catering: C) -> Self {
        Self {
            orders,
            subscriptions,
            catering,
        }
    }

    pub async fn handle(&self, event: &Value) -> ApiResponse {
        ApiResponse::respond("admin_analytics", self.process(event).await)
    }

    async fn process(&self, event: &Value) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest::from_event(event)?;
        require_admin(&request)?;

        let date = match request.query_param("date") {
            Some(date) if is_valid_date(date) => date.to_string(),
            Some(_) => return Err(ApiError::validation("date must be YYYY-MM-DD")),
            None => Utc::now().date_naive().format("%Y-%m-%d").to_string(),
        };

        let orders = self.orders.list_all().await?;
        let subscriptions = self.subscriptions.list_all().await?;
        let catering = self.catering.list_all().await?;

        let analytics = compute_analytics(&date, &orders, &subscriptions, &catering);
        info!(
            date = %date,
            daily_orders = analytics.daily_orders,
            total_orders = analytics.total_orders,
            "集計完了"
        );
        Ok(ApiResponse::ok(&analytics))
    }
}
