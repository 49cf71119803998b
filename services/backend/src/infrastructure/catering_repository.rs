//! ケータリング依頼リポジトリ（`USER#<userId>` / `CATERING#<requestId>`）
use async_trait::async_trait;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use tracing::info;

use super::dynamo_support::{
    from_item, scan_all, to_keyed_item, write_error, RepositoryError, ScanFilter,
};
use super::order_repository::user_pk;
use crate::domain::CateringRequest;

pub const CATERING_ENTITY: &str = "CATERING";

#[async_trait]
pub trait CateringRepository: Send + Sync {
    async fn create(&self, request: &CateringRequest) -> Result<(), RepositoryError>;

    async fn list_all(&self) -> Result<Vec<CateringRequest>, RepositoryError>;
}

#[derive(Debug, Clone)]
pub struct DynamoCateringRepository {
    client: DynamoDbClient,
    table_name: String,
}

impl DynamoCateringRepository {
    pub fn new(client: DynamoDbClient, table_name: String) -> Self {
        Self { client, table_name }
    }
}

#[async_trait]
impl CateringRepository for DynamoCateringRepository {
    async fn create(&self, request: &CateringRequest) -> Result<(), RepositoryError> {
        let item = to_keyed_item(
            request,
            user_pk(&request.user_id),
            format!("CATERING#{}", request.request_id),
            CATERING_ENTITY,
        )?;

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(PK)")
            .send()
            .await
            .map_err(write_error)?;

        info!(
            request_id = %request.request_id,
            user_id = %request.user_id,
            event_date = %request.event_date,
            guest_count = request.guest_count,
            "ケータリング依頼登録完了"
        );
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<CateringRequest>, RepositoryError> {
        scan_all(&self.client, &self.table_name, ScanFilter::entity_type(CATERING_ENTITY))
            .await?
            .into_iter()
            .map(from_item)
            .collect()
    }
}
