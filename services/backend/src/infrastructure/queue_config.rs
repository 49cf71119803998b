/// 上映情報スクレイピングキューの設定
use aws_sdk_sqs::Client as SqsClient;
use tracing::info;

use super::config::{load_aws_config, required_env, ConfigError};

/// キューURLを読み込む環境変数
pub const ENV_QUEUE_URL: &str = "SHOWTIME_QUEUE_URL";

#[derive(Debug, Clone)]
pub struct QueueConfig {
    client: SqsClient,
    queue_url: String,
}

impl QueueConfig {
    /// 環境変数からキュー設定を読み込む
    ///
    /// # 戻り値
    /// * `Ok(QueueConfig)` - 設定
    /// * `Err(ConfigError::MissingEnvVar)` - `SHOWTIME_QUEUE_URL`が未設定
    pub async fn from_env() -> Result<Self, ConfigError> {
        let queue_url = queue_url_from_env()?;
        let aws_config = load_aws_config().await;

        info!(queue_url = %queue_url, "QueueConfig loaded");

        Ok(Self {
            client: SqsClient::new(&aws_config),
            queue_url,
        })
    }

    /// 明示的な値で設定を作成（テスト用）
    pub fn new(client: SqsClient, queue_url: String) -> Self {
        Self { client, queue_url }
    }

    pub fn client(&self) -> &SqsClient {
        &self.client
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

fn queue_url_from_env() -> Result<String, ConfigError> {
    required_env(ENV_QUEUE_URL)
}
