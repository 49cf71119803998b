/// POST /consultation
///
/// 相談依頼フォームの内容を事業者にメールで通知する。
///
/// # 環境変数
/// - BUSINESS_EMAIL: 送信元アドレス（SESで検証済みであること、必須）
/// - OWNER_EMAIL: 宛先アドレス（デフォルト: owner@example.com）
use backend::application::{ApiError, ApiResponse, ConsultationHandler};
use backend::infrastructure::{init_logging, ConfigError, MailConfig, SesMailer};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::error;

type Handler = ConsultationHandler<SesMailer>;

/// warm start時に再利用するハンドラー
static HANDLER: OnceCell<Handler> = OnceCell::const_new();

async fn get_handler() -> Result<&'static Handler, ConfigError> {
    HANDLER
        .get_or_try_init(|| async {
            let config = MailConfig::from_env().await?;
            Ok(ConsultationHandler::new(
                SesMailer::new(config.client().clone()),
                config.sender().to_string(),
                config.recipient().to_string(),
            ))
        })
        .await
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // 構造化ログを初期化
    init_logging();

    let func = service_fn(handler);
    lambda_runtime::run(func).await?;
    Ok(())
}

async fn handler(event: LambdaEvent<Value>) -> Result<ApiResponse, Error> {
    let handler = match get_handler().await {
        Ok(handler) => handler,
        Err(err) => {
            error!(error = %err, "メール設定読み込み失敗");
            return Ok(ApiError::from(err).to_response());
        }
    };
    Ok(handler.handle(&event.payload).await)
}
