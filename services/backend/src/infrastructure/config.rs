/// DynamoDB接続設定
///
/// サブシステムごとのテーブル名を環境変数から読み込み、クライアントと組にして保持する。
use aws_sdk_dynamodb::Client as DynamoDbClient;
use thiserror::Error;

/// 設定読み込みのエラー型
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for environment variable {var}: {value}")]
    InvalidValue { var: String, value: String },
}

/// 必須の環境変数を読み込む（空文字は未設定扱い）
pub(crate) fn required_env(var: &str) -> Result<String, ConfigError> {
    optional_env(var).ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
}

/// 任意の環境変数を読み込む（空文字は未設定扱い）
pub(crate) fn optional_env(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// 環境から共通のAWS設定を読み込む（認証情報・リージョン）
pub async fn load_aws_config() -> aws_config::SdkConfig {
    aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await
}

/// テーブルの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// 食事注文（メニュー・テンプレート・注文・購読・ケータリング）の単一テーブル
    Meals,
    /// 上映情報のスクレイピング結果
    Showtimes,
    /// 修理・作業依頼
    ServiceRequests,
    /// 同窓会参加者
    Attendees,
}

impl TableKind {
    /// テーブル名を読み込む環境変数
    pub fn env_var(&self) -> &'static str {
        match self {
            TableKind::Meals => "TABLE_NAME",
            TableKind::Showtimes => "MOVIE_SHOWTIME_OPTIONS_TABLE",
            TableKind::ServiceRequests => "DYNAMODB_TABLE",
            TableKind::Attendees => "ATTENDEES_TABLE",
        }
    }

    /// 環境変数が未設定の場合のテーブル名（Noneは必須）
    pub fn default_name(&self) -> Option<&'static str> {
        match self {
            TableKind::Meals => None,
            TableKind::Showtimes => Some("movie_showtime_options"),
            TableKind::ServiceRequests => Some("ServiceRequests"),
            TableKind::Attendees => Some("Reunion_Attendees"),
        }
    }

    /// 環境変数からテーブル名を解決する
    pub fn resolve_table_name(&self) -> Result<String, ConfigError> {
        match (optional_env(self.env_var()), self.default_name()) {
            (Some(name), _) => Ok(name),
            (None, Some(default)) => Ok(default.to_string()),
            (None, None) => Err(ConfigError::MissingEnvVar(self.env_var().to_string())),
        }
    }
}

/// テーブル名とクライアントを持つDynamoDB設定
#[derive(Debug, Clone)]
pub struct TableConfig {
    client: DynamoDbClient,
    table_name: String,
}

impl TableConfig {
    /// 環境からAWS設定を読み込み、テーブル名を解決して設定を作成
    pub async fn from_env(kind: TableKind) -> Result<Self, ConfigError> {
        let table_name = kind.resolve_table_name()?;
        let aws_config = load_aws_config().await;
        Ok(Self {
            client: DynamoDbClient::new(&aws_config),
            table_name,
        })
    }

    /// 明示的な値で設定を作成（テスト用）
    pub fn new(client: DynamoDbClient, table_name: String) -> Self {
        Self { client, table_name }
    }

    pub fn client(&self) -> &DynamoDbClient {
        &self.client
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}
