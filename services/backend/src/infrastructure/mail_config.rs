/// 相談依頼メール送信の設定
use aws_sdk_sesv2::Client as SesClient;
use tracing::info;

use super::config::{load_aws_config, optional_env, required_env, ConfigError};

/// 送信元アドレスを読み込む環境変数
pub const ENV_BUSINESS_EMAIL: &str = "BUSINESS_EMAIL";
/// 宛先アドレスを読み込む環境変数
pub const ENV_OWNER_EMAIL: &str = "OWNER_EMAIL";
/// 宛先アドレスのデフォルト値
pub const DEFAULT_OWNER_EMAIL: &str = "owner@example.com";

#[derive(Debug, Clone)]
pub struct MailConfig {
    client: SesClient,
    sender: String,
    recipient: String,
}

impl MailConfig {
    /// 環境変数からメール設定を読み込む
    pub async fn from_env() -> Result<Self, ConfigError> {
        let (sender, recipient) = Self::addresses_from_env()?;
        let aws_config = load_aws_config().await;

        info!(sender = %sender, recipient = %recipient, "MailConfig loaded");

        Ok(Self {
            client: SesClient::new(&aws_config),
            sender,
            recipient,
        })
    }

    fn addresses_from_env() -> Result<(String, String), ConfigError> {
        let sender = required_env(ENV_BUSINESS_EMAIL)?;
        let recipient =
            optional_env(ENV_OWNER_EMAIL).unwrap_or_else(|| DEFAULT_OWNER_EMAIL.to_string());
        Ok((sender, recipient))
    }

    /// 明示的な値で設定を作成（テスト用）
    pub fn new(client: SesClient, sender: String, recipient: String) -> Self {
        Self {
            client,
            sender,
            recipient,
        }
    }

    pub fn client(&self) -> &SesClient {
        &self.client
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }
}
