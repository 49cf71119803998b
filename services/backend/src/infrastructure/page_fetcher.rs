//! 上映スケジュールページの取得
//!
//! 失敗時の再試行は行わない。呼び出し側で記録して読み飛ばす。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::ScraperConfig;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FetchError {
    /// 2xx以外のレスポンス
    #[error("HTTPエラー: status={status}, url={url}")]
    Status { status: u16, url: String },

    #[error("ネットワークエラー: {0}")]
    Network(String),

    #[error("HTTPクライアント構築エラー: {0}")]
    Client(String),
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// URLのHTML本文を取得する
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// reqwestによる実装
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    /// 設定のUser-Agentとタイムアウトでクライアントを作成
    pub fn new(config: &ScraperConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "ページ取得失敗");
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        debug!(url = %url, bytes = body.len(), "ページ取得完了");
        Ok(body)
    }
}
