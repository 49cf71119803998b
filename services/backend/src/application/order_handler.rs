//! 顧客の注文
//!
//! 価格は常に店舗側の商品データから取り、在庫の減算と注文の登録は
//! 1つのトランザクションで行う。

use serde_json::{json, Value};
use tracing::{info, warn};

use super::api::{ApiError, ApiRequest, ApiResponse};
use super::auth::require_customer;
use super::clock::{new_id, now_rfc3339};
use crate::domain::{order_total, Order, OrderLine, OrderRequest, OrderStatus};
use crate::infrastructure::{MenuRepository, OrderRepository, PlaceOrderError};

pub struct OrderHandler<O, M>
where
    O: OrderRepository,
    M: MenuRepository,
{
    orders: O,
    menus: M,
}

impl<O, M> OrderHandler<O, M>
where
    O: OrderRepository,
    M: MenuRepository,
{
    pub fn new(orders: O, menus: M) -> Self {
        Self { orders, menus }
    }

    pub async fn create(&self, event: &Value) -> ApiResponse {
        ApiResponse::respond("order_create", self.process_create(event).await)
    }

    pub async fn list(&self, event: &Value) -> ApiResponse {
        ApiResponse::respond("order_list", self.process_list(event).await)
    }

    async fn process_create(&self, event: &Value) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest::from_event(event)?;
        let customer = require_customer(&request)?;
        let order_request = OrderRequest::from_json(&request.json_object()?)?;

        let menu = self
            .menus
            .find_by_id(&order_request.menu_id)
            .await?
            .filter(|menu| menu.header.is_active)
            .ok_or_else(|| {
                ApiError::not_found(format!("Menu {} not found", order_request.menu_id))
            })?;

        let mut lines = Vec::with_capacity(order_request.lines.len());
        for requested in &order_request.lines {
            let item = menu.find_item(&requested.item_id).ok_or_else(|| {
                ApiError::validation(format!("Item {} not found", requested.item_id))
            })?;
            if !item.available || item.stock_qty < requested.qty as i64 {
                warn!(
                    item_id = %item.item_id,
                    requested = requested.qty,
                    available = item.stock_qty,
                    "在庫不足"
                );
                return Err(ApiError::OutOfStock {
                    item_id: item.item_id.clone(),
                });
            }
            lines.push(OrderLine {
                item_id: item.item_id.clone(),
                name: item.name.clone(),
                price: item.price,
                qty: requested.qty,
            });
        }

        let order = Order {
            order_id: new_id(),
            user_id: customer.user_id.clone(),
            menu_id: order_request.menu_id,
            total: order_total(&lines),
            items: lines,
            status: OrderStatus::New,
            pickup_slot: order_request.pickup_slot,
            placed_at: now_rfc3339(),
            notes: order_request.notes,
        };

        self.orders.place(&order).await.map_err(|e| match e {
            PlaceOrderError::OutOfStock { item_id } => ApiError::OutOfStock { item_id },
            PlaceOrderError::Repository(e) => e.into(),
        })?;

        info!(
            order_id = %order.order_id,
            user_id = %order.user_id,
            total = order.total,
            lines = order.items.len(),
            "注文作成"
        );
        Ok(ApiResponse::created(&order))
    }

    async fn process_list(&self, event: &Value) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest::from_event(event)?;
        let customer = require_customer(&request)?;

        let orders = self.orders.list_for_user(&customer.user_id).await?;
        Ok(ApiResponse::ok(&json!({
            "count": orders.len(),
            "orders": orders,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::api::tests::{customer_event, event};
    use crate::infrastructure::menu_repository::tests::{sample_menu, MockMenuRepository};
    use crate::infrastructure::order_repository::tests::{sample_order, MockOrderRepository};
    use crate::infrastructure::logging::init_test_logging;
    use crate::infrastructure::RepositoryError;

    fn setup() -> (
        OrderHandler<MockOrderRepository, MockMenuRepository>,
        MockOrderRepository,
        MockMenuRepository,
    ) {
        let menus = MockMenuRepository::new();
        menus.insert_menu(sample_menu("m1", "2025-03-01"));
        let orders = MockOrderRepository::new(menus.clone());
        (
            OrderHandler::new(orders.clone(), menus.clone()),
            orders,
            menus,
        )
    }

    fn order_body(items: Value) -> Option<Value> {
        Some(json!({
            "menuId": "m1",
            "items": items,
            "pickupSlot": "2025-03-01T18:00:00Z"
        }))
    }

    #[tokio::test]
    async fn test_total_uses_store_prices() {
        let (handler, orders, menus) = setup();
        let body = order_body(json!([
            {"itemId": "itm-jerk", "qty": 1, "price": 0.01},
            {"itemId": "itm-plantain", "quantity": 2}
        ]));

        let response = handler.create(&customer_event("user-1", body)).await;

        assert_eq!(response.status_code, 201);
        let order = response.body_json();
        assert_eq!(order["total"], 32.99);
        assert_eq!(order["status"], "NEW");
        assert_eq!(order["userId"], "user-1");
        assert_eq!(order["items"][0]["price"], 15.99);
        assert_eq!(orders.order_count(), 1);
        assert_eq!(menus.stock_of("m1", "itm-jerk"), Some(9));
        assert_eq!(menus.stock_of("m1", "itm-plantain"), Some(3));
    }

    #[tokio::test]
    async fn test_duplicate_lines_are_merged() {
        let (handler, _, menus) = setup();
        let body = order_body(json!([
            {"itemId": "itm-plantain", "qty": 2},
            {"itemId": "itm-plantain", "qty": 3}
        ]));

        let response = handler.create(&customer_event("user-1", body)).await;

        assert_eq!(response.status_code, 201);
        assert_eq!(response.body_json()["items"][0]["qty"], 5);
        assert_eq!(menus.stock_of("m1", "itm-plantain"), Some(0));
    }

    #[tokio::test]
    async fn test_insufficient_stock_is_409_without_mutation() {
        let (handler, orders, menus) = setup();
        let body = order_body(json!([
            {"itemId": "itm-jerk", "qty": 2},
            {"itemId": "itm-plantain", "qty": 6}
        ]));

        let response = handler.create(&customer_event("user-1", body)).await;

        assert_eq!(response.status_code, 409);
        let error = &response.body_json()["error"];
        assert_eq!(error["code"], "OUT_OF_STOCK");
        assert_eq!(error["details"]["itemId"], "itm-plantain");
        assert_eq!(orders.order_count(), 0);
        assert_eq!(menus.stock_of("m1", "itm-jerk"), Some(10));
        assert_eq!(menus.stock_of("m1", "itm-plantain"), Some(5));
    }

    #[tokio::test]
    async fn test_lost_race_in_transaction_is_409() {
        init_test_logging();
        // 参照時点では在庫があり、確定時点では他の注文に取られている
        let stale = MockMenuRepository::new();
        stale.insert_menu(sample_menu("m1", "2025-03-01"));
        let current = MockMenuRepository::new();
        let mut menu = sample_menu("m1", "2025-03-01");
        for item in &mut menu.items {
            item.stock_qty = 1;
        }
        current.insert_menu(menu);
        let orders = MockOrderRepository::new(current.clone());
        let handler = OrderHandler::new(orders.clone(), stale);
        let body = order_body(json!([
            {"itemId": "itm-jerk", "qty": 1},
            {"itemId": "itm-plantain", "qty": 4}
        ]));

        let response = handler.create(&customer_event("user-1", body)).await;

        assert_eq!(response.status_code, 409);
        assert_eq!(response.body_json()["error"]["details"]["itemId"], "itm-plantain");
        assert_eq!(orders.order_count(), 0);
        assert_eq!(current.stock_of("m1", "itm-jerk"), Some(1));
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let (handler, _, _) = setup();

        let response = handler.create(&customer_event("u1", order_body(json!([])))).await;
        assert_eq!(response.status_code, 400);
        assert_eq!(response.body_json()["error"]["message"], "items is required");

        let mut bad_slot = order_body(json!([{"itemId": "itm-jerk", "qty": 1}])).unwrap();
        bad_slot["pickupSlot"] = json!("tomorrow evening");
        let response = handler.create(&customer_event("u1", Some(bad_slot))).await;
        assert_eq!(response.status_code, 400);
        assert!(response.body_json()["error"]["message"]
            .as_str()
            .unwrap()
            .contains("ISO8601"));

        let response = handler
            .create(&customer_event("u1", order_body(json!([{"itemId": "itm-jerk", "qty": 100}]))))
            .await;
        assert_eq!(response.status_code, 400);

        let response = handler
            .create(&customer_event("u1", order_body(json!([{"itemId": "ghost", "qty": 1}]))))
            .await;
        assert_eq!(response.status_code, 400);
        assert_eq!(response.body_json()["error"]["message"], "Item ghost not found");
    }

    #[tokio::test]
    async fn test_requires_customer() {
        let (handler, _, _) = setup();
        let response = handler
            .create(&event(order_body(json!([{"itemId": "itm-jerk", "qty": 1}]))))
            .await;
        assert_eq!(response.status_code, 401);
    }

    #[tokio::test]
    async fn test_list_mine_newest_first() {
        let (handler, orders, _) = setup();
        orders.insert_order(sample_order("o1", "user-1", "2025-03-01T10:00:00Z"));
        orders.insert_order(sample_order("o2", "user-1", "2025-03-02T10:00:00Z"));
        orders.insert_order(sample_order("o3", "user-2", "2025-03-03T10:00:00Z"));

        let body = handler.list(&customer_event("user-1", None)).await.body_json();

        assert_eq!(body["count"], 2);
        assert_eq!(body["orders"][0]["orderId"], "o2");
        assert_eq!(body["orders"][1]["orderId"], "o1");
    }

    #[tokio::test]
    async fn test_throttled_list_is_429() {
        let (handler, orders, _) = setup();
        orders.set_next_error(RepositoryError::Throttled("busy".to_string()));
        assert_eq!(handler.list(&customer_event("user-1", None)).await.status_code, 429);
    }
}
