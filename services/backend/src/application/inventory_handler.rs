//! 管理者による在庫数の加減算

use serde_json::{json, Value};
use tracing::{info, warn};

use super::api::{required_field, ApiError, ApiRequest, ApiResponse};
use super::auth::require_admin;
use crate::infrastructure::{MenuRepository, RepositoryError};

pub struct InventoryHandler<R>
where
    R: MenuRepository,
{
    repo: R,
}

impl<R> InventoryHandler<R>
where
    R: MenuRepository,
{
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub async fn adjust(&self, event: &Value) -> ApiResponse {
        ApiResponse::respond("admin_inventory_adjust", self.process(event).await)
    }

    async fn process(&self, event: &Value) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest::from_event(event)?;
        require_admin(&request)?;
        let body = request.json_object()?;

        let menu_id = required_field(&body, "menuId")?;
        let item_id = required_field(&body, "itemId")?;
        let adjustment = body
            .get("adjustment")
            .ok_or_else(|| ApiError::validation("adjustment is required"))?
            .as_i64()
            .filter(|n| *n != 0)
            .ok_or_else(|| ApiError::validation("adjustment must be a non-zero integer"))?;

        if self.repo.find_item(menu_id, item_id).await?.is_none() {
            return Err(ApiError::not_found(format!(
                "Item {} not found in menu {}",
                item_id, menu_id
            )));
        }

        let new_stock_qty = match self.repo.adjust_stock(menu_id, item_id, adjustment).await {
            Ok(qty) => qty,
            Err(RepositoryError::ConditionFailed(_)) => {
                warn!(menu_id = %menu_id, item_id = %item_id, adjustment, "在庫不足のため減算できない");
                return Err(ApiError::OutOfStock {
                    item_id: item_id.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        info!(menu_id = %menu_id, item_id = %item_id, adjustment, new_stock_qty, "在庫調整");
        Ok(ApiResponse::ok(&json!({
            "menuId": menu_id,
            "itemId": item_id,
            "adjustment": adjustment,
            "newStockQty": new_stock_qty,
        })))
    }
}
