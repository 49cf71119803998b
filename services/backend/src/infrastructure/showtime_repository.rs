//! 上映情報リポジトリ
//!
//! スクレイピング結果を`(movieId, showDate)`をキーとするテーブルに保存する。

use async_trait::async_trait;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use tracing::{debug, info};

use super::dynamo_support::{from_item, read_error, to_item, write_error, RepositoryError};
use crate::domain::ShowtimeOptions;

/// 上映情報リポジトリトレイト
#[async_trait]
pub trait ShowtimeRepository: Send + Sync {
    /// 上映情報を保存する（同じキーの既存レコードは上書き）
    async fn put(&self, options: &ShowtimeOptions) -> Result<(), RepositoryError>;

    /// テーブルを最大`limit`件スキャンする
    ///
    /// スキャン順はテーブル実装に依存し、ソートされていない。
    async fn scan(&self, limit: i32) -> Result<Vec<ShowtimeOptions>, RepositoryError>;
}

/// DynamoDB実装
#[derive(Debug, Clone)]
pub struct DynamoShowtimeRepository {
    client: DynamoDbClient,
    table_name: String,
}

impl DynamoShowtimeRepository {
    pub fn new(client: DynamoDbClient, table_name: String) -> Self {
        Self { client, table_name }
    }
}

#[async_trait]
impl ShowtimeRepository for DynamoShowtimeRepository {
    async fn put(&self, options: &ShowtimeOptions) -> Result<(), RepositoryError> {
        let item = to_item(options)?;

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(write_error)?;

        info!(
            movie_id = %options.movie_id,
            show_date = %options.show_date,
            theaters = options.theaters.len(),
            "上映情報保存完了"
        );
        Ok(())
    }

    async fn scan(&self, limit: i32) -> Result<Vec<ShowtimeOptions>, RepositoryError> {
        let output = self
            .client
            .scan()
            .table_name(&self.table_name)
            .limit(limit)
            .send()
            .await
            .map_err(read_error)?;

        let records = output
            .items
            .unwrap_or_default()
            .into_iter()
            .map(from_item)
            .collect::<Result<Vec<ShowtimeOptions>, _>>()?;

        debug!(limit, count = records.len(), "上映情報スキャン完了");
        Ok(records)
    }
}
