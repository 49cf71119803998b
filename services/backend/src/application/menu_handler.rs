//! 顧客向けのメニュー参照
//!
//! 非公開（isActive=false）のメニューは存在しないものとして扱う。

use chrono::Utc;
use serde_json::Value;
use tracing::info;

use super::api::{ApiError, ApiRequest, ApiResponse};
use super::auth::require_customer;
use crate::domain::validation::is_valid_date;
use crate::domain::Menu;
use crate::infrastructure::MenuRepository;

pub struct MenuViewHandler<R>
where
    R: MenuRepository,
{
    repo: R,
}

impl<R> MenuViewHandler<R>
where
    R: MenuRepository,
{
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// 本日（UTC）のメニュー
    pub async fn today(&self, event: &Value) -> ApiResponse {
        let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();
        ApiResponse::respond("menu_today", self.process_by_date(event, Some(&today)).await)
    }

    /// `pathParameters.date`のメニュー
    pub async fn by_date(&self, event: &Value) -> ApiResponse {
        ApiResponse::respond("menu_by_date", self.process_by_date(event, None).await)
    }

    /// `pathParameters.menuId`のメニュー
    pub async fn by_id(&self, event: &Value) -> ApiResponse {
        ApiResponse::respond("menu_by_id", self.process_by_id(event).await)
    }

    async fn process_by_date(
        &self,
        event: &Value,
        fixed_date: Option<&str>,
    ) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest::from_event(event)?;
        let customer = require_customer(&request)?;

        let date = match fixed_date {
            Some(date) => date,
            None => request
                .path_param("date")
                .ok_or_else(|| ApiError::validation("date is required"))?,
        };
        if !is_valid_date(date) {
            return Err(ApiError::validation("date must be YYYY-MM-DD"));
        }

        let menu = self.repo.find_by_date(date).await?;
        let menu = visible(menu, || format!("No menu found for {}", date))?;
        info!(user_id = %customer.user_id, menu_id = %menu.header.menu_id, date = %date, "メニュー参照");
        Ok(ApiResponse::ok(&menu.to_json()))
    }

    async fn process_by_id(&self, event: &Value) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest::from_event(event)?;
        require_customer(&request)?;

        let menu_id = request
            .path_param("menuId")
            .ok_or_else(|| ApiError::validation("menuId is required"))?;
        let menu = self.repo.find_by_id(menu_id).await?;
        let menu = visible(menu, || format!("Menu {} not found", menu_id))?;
        Ok(ApiResponse::ok(&menu.to_json()))
    }
}

fn visible(menu: Option<Menu>, message: impl FnOnce() -> String) -> Result<Menu, ApiError> {
    menu.filter(|m| m.header.is_active)
        .ok_or_else(|| ApiError::not_found(message()))
}
