//! 上映情報スクレイピング依頼のキュー投入
use async_trait::async_trait;
use aws_sdk_sqs::Client as SqsClient;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::ScrapeRequest;

/// キュー操作のエラー型
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueueError {
    #[error("SQS送信エラー: {0}")]
    SendFailed(String),

    #[error("JSONシリアライズエラー: {0}")]
    SerializeError(String),
}

/// スクレイピング依頼キュー（テスト用の抽象化）
#[async_trait]
pub trait ShowtimeQueue: Send + Sync {
    /// 1日分のスクレイピング依頼を送信し、メッセージIDを返す
    async fn enqueue(&self, request: &ScrapeRequest) -> Result<String, QueueError>;
}

/// SQS実装
#[derive(Debug, Clone)]
pub struct SqsShowtimeQueue {
    client: SqsClient,
    queue_url: String,
}

impl SqsShowtimeQueue {
    pub fn new(client: SqsClient, queue_url: String) -> Self {
        Self { client, queue_url }
    }
}

#[async_trait]
impl ShowtimeQueue for SqsShowtimeQueue {
    async fn enqueue(&self, request: &ScrapeRequest) -> Result<String, QueueError> {
        let body = serde_json::to_string(request)
            .map_err(|e| QueueError::SerializeError(e.to_string()))?;

        let output = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| {
                warn!(
                    movie_id = %request.movie_id,
                    show_date = %request.show_date,
                    error = %e,
                    "SQS SendMessageエラー"
                );
                QueueError::SendFailed(e.to_string())
            })?;

        let message_id = output.message_id().unwrap_or("unknown").to_string();
        debug!(
            movie_id = %request.movie_id,
            show_date = %request.show_date,
            message_id = %message_id,
            "スクレイピング依頼送信"
        );
        Ok(message_id)
    }
}
