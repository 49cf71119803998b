//! 定期購読リポジトリ（`USER#<userId>` / `SUBSCRIPTION`、1ユーザー1件）
use async_trait::async_trait;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use tracing::info;

use super::dynamo_support::{
    from_item, key, read_error, scan_all, to_keyed_item, write_error, RepositoryError,
    ScanFilter,
};
use super::order_repository::user_pk;
use crate::domain::Subscription;

pub const SUBSCRIPTION_ENTITY: &str = "SUBSCRIPTION";
const SUBSCRIPTION_SK: &str = "SUBSCRIPTION";

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<Subscription>, RepositoryError>;

    /// 購読を保存（既存は上書き）
    async fn put(&self, subscription: &Subscription) -> Result<(), RepositoryError>;

    async fn list_all(&self) -> Result<Vec<Subscription>, RepositoryError>;
}

#[derive(Debug, Clone)]
pub struct DynamoSubscriptionRepository {
    client: DynamoDbClient,
    table_name: String,
}

impl DynamoSubscriptionRepository {
    pub fn new(client: DynamoDbClient, table_name: String) -> Self {
        Self { client, table_name }
    }
}

#[async_trait]
impl SubscriptionRepository for DynamoSubscriptionRepository {
    async fn get(&self, user_id: &str) -> Result<Option<Subscription>, RepositoryError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(key(user_pk(user_id), SUBSCRIPTION_SK)))
            .send()
            .await
            .map_err(read_error)?;

        output.item.map(from_item).transpose()
    }

    async fn put(&self, subscription: &Subscription) -> Result<(), RepositoryError> {
        let item = to_keyed_item(
            subscription,
            user_pk(&subscription.user_id),
            SUBSCRIPTION_SK,
            SUBSCRIPTION_ENTITY,
        )?;

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(write_error)?;

        info!(
            user_id = %subscription.user_id,
            subscription_id = %subscription.subscription_id,
            "購読保存完了"
        );
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Subscription>, RepositoryError> {
        scan_all(&self.client, &self.table_name, ScanFilter::entity_type(SUBSCRIPTION_ENTITY))
            .await?
            .into_iter()
            .map(from_item)
            .collect()
    }
}
