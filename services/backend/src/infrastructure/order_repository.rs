//! 注文リポジトリ
//!
//! 注文は`USER#<userId>` / `ORDER#<orderId>`に保存する。注文確定時は
//! 各商品の在庫減算と注文の登録を1つのトランザクションで行い、
//! どれか1つでも条件を満たさなければ何も変更されない。

use async_trait::async_trait;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::types::{AttributeValue, TransactWriteItem, Update};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use thiserror::Error;
use tracing::{info, warn};

use super::dynamo_support::{
    from_item, key, n, query_partition, scan_all, to_keyed_item, transact_put, write_error,
    RepositoryError, ScanFilter,
};
use super::menu_repository::{item_sk, menu_pk};
use crate::domain::Order;

pub const ORDER_ENTITY: &str = "ORDER";
const ORDER_SK_PREFIX: &str = "ORDER#";

pub fn user_pk(user_id: &str) -> String {
    format!("USER#{}", user_id)
}

/// 注文確定のエラー型
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlaceOrderError {
    /// 在庫不足または販売停止中の商品があった
    #[error("Out of stock: {item_id}")]
    OutOfStock { item_id: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// 在庫を減算して注文を登録する（全体で原子的）
    async fn place(&self, order: &Order) -> Result<(), PlaceOrderError>;

    /// ユーザーの注文一覧（新しい順）
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Order>, RepositoryError>;

    /// 全ユーザーの注文（集計用、順序は不定）
    async fn list_all(&self) -> Result<Vec<Order>, RepositoryError>;
}

#[derive(Debug, Clone)]
pub struct DynamoOrderRepository {
    client: DynamoDbClient,
    table_name: String,
}

impl DynamoOrderRepository {
    pub fn new(client: DynamoDbClient, table_name: String) -> Self {
        Self { client, table_name }
    }

    /// 在庫減算と注文登録のトランザクション要素
    ///
    /// 先頭から注文明細と同じ順に在庫減算を並べ、最後に注文のPutを置く。
    fn transaction_items(&self, order: &Order) -> Result<Vec<TransactWriteItem>, RepositoryError> {
        let mut writes = Vec::with_capacity(order.items.len() + 1);

        for line in &order.items {
            let update = Update::builder()
                .table_name(&self.table_name)
                .set_key(Some(key(menu_pk(&order.menu_id), item_sk(&line.item_id))))
                .update_expression("SET stockQty = stockQty - :qty")
                .condition_expression("stockQty >= :qty AND available = :true")
                .expression_attribute_values(":qty", n(line.qty))
                .expression_attribute_values(":true", AttributeValue::Bool(true))
                .build()
                .map_err(|e| RepositoryError::WriteError(e.to_string()))?;
            writes.push(TransactWriteItem::builder().update(update).build());
        }

        let item = to_keyed_item(
            order,
            user_pk(&order.user_id),
            format!("{}{}", ORDER_SK_PREFIX, order.order_id),
            ORDER_ENTITY,
        )?;
        writes.push(transact_put(
            &self.table_name,
            item,
            Some("attribute_not_exists(PK)"),
        )?);

        Ok(writes)
    }
}

#[async_trait]
impl OrderRepository for DynamoOrderRepository {
    async fn place(&self, order: &Order) -> Result<(), PlaceOrderError> {
        let writes = self.transaction_items(order)?;

        let result = self
            .client
            .transact_write_items()
            .set_transact_items(Some(writes))
            .send()
            .await;

        match result {
            Ok(_) => {
                info!(
                    order_id = %order.order_id,
                    user_id = %order.user_id,
                    lines = order.items.len(),
                    total = order.total,
                    "注文登録完了"
                );
                Ok(())
            }
            Err(err) => {
                if let Some(TransactWriteItemsError::TransactionCanceledException(canceled)) =
                    err.as_service_error()
                {
                    let failed_line = canceled
                        .cancellation_reasons()
                        .iter()
                        .position(|reason| reason.code() == Some("ConditionalCheckFailed"))
                        .and_then(|index| order.items.get(index));

                    if let Some(line) = failed_line {
                        warn!(
                            order_id = %order.order_id,
                            item_id = %line.item_id,
                            qty = line.qty,
                            "在庫不足のため注文トランザクションが取り消された"
                        );
                        return Err(PlaceOrderError::OutOfStock {
                            item_id: line.item_id.clone(),
                        });
                    }
                }
                Err(PlaceOrderError::Repository(write_error(err)))
            }
        }
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Order>, RepositoryError> {
        let rows = query_partition(
            &self.client,
            &self.table_name,
            &user_pk(user_id),
            Some(ORDER_SK_PREFIX),
        )
        .await?;

        let mut orders = rows
            .into_iter()
            .map(from_item)
            .collect::<Result<Vec<Order>, _>>()?;
        orders.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
        Ok(orders)
    }

    async fn list_all(&self) -> Result<Vec<Order>, RepositoryError> {
        scan_all(&self.client, &self.table_name, ScanFilter::entity_type(ORDER_ENTITY))
            .await?
            .into_iter()
            .map(from_item)
            .collect()
    }
}
