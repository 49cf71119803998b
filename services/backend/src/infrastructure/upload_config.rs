/// メニュー画像アップロードの設定
use std::time::Duration;

use aws_sdk_s3::Client as S3Client;
use tracing::info;

use super::config::{load_aws_config, optional_env, required_env, ConfigError};

pub const ENV_BUCKET_NAME: &str = "BUCKET_NAME";
pub const ENV_CDN_BASE_URL: &str = "CDN_BASE_URL";
pub const ENV_EXPIRES_SECS: &str = "UPLOAD_URL_EXPIRES_SECS";
/// 署名付きURLの有効期間のデフォルト値（秒）
pub const DEFAULT_EXPIRES_SECS: u64 = 3600;

/// クライアントを除いた設定値
#[derive(Debug, Clone, PartialEq)]
pub struct UploadSettings {
    pub bucket_name: String,
    pub cdn_base_url: Option<String>,
    pub expires_in: Duration,
}

impl UploadSettings {
    /// 環境変数から設定値を読み込む
    pub fn from_env() -> Result<Self, ConfigError> {
        let bucket_name = required_env(ENV_BUCKET_NAME)?;
        let cdn_base_url = optional_env(ENV_CDN_BASE_URL);
        let expires_secs = match optional_env(ENV_EXPIRES_SECS) {
            None => DEFAULT_EXPIRES_SECS,
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::InvalidValue {
                    var: ENV_EXPIRES_SECS.to_string(),
                    value: raw,
                })?,
        };

        Ok(Self {
            bucket_name,
            cdn_base_url,
            expires_in: Duration::from_secs(expires_secs),
        })
    }
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    client: S3Client,
    settings: UploadSettings,
}

impl UploadConfig {
    pub async fn from_env() -> Result<Self, ConfigError> {
        let settings = UploadSettings::from_env()?;
        let aws_config = load_aws_config().await;

        info!(
            bucket = %settings.bucket_name,
            cdn = settings.cdn_base_url.is_some(),
            expires_secs = settings.expires_in.as_secs(),
            "UploadConfig loaded"
        );

        Ok(Self {
            client: S3Client::new(&aws_config),
            settings,
        })
    }

    /// 明示的な値で設定を作成（テスト用）
    pub fn new(client: S3Client, settings: UploadSettings) -> Self {
        Self { client, settings }
    }

    pub fn client(&self) -> &S3Client {
        &self.client
    }

    pub fn settings(&self) -> &UploadSettings {
        &self.settings
    }
}
