/// POST /admin/images/upload-url
///
/// メニュー画像をS3に直接アップロードするための署名付きPUT URLを発行する。
///
/// # 環境変数
/// - BUCKET_NAME: アップロード先バケット（必須）
/// - CDN_BASE_URL: 公開URLのベース（未設定ならバケットのURL）
/// - UPLOAD_URL_EXPIRES_SECS: 署名付きURLの有効期間（デフォルト: 3600）
use backend::application::{ApiError, ApiResponse, UploadUrlHandler};
use backend::infrastructure::{init_logging, ConfigError, S3UploadSigner, UploadConfig};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::error;

type Handler = UploadUrlHandler<S3UploadSigner>;

/// warm start時に再利用するハンドラー
static HANDLER: OnceCell<Handler> = OnceCell::const_new();

async fn get_handler() -> Result<&'static Handler, ConfigError> {
    HANDLER
        .get_or_try_init(|| async {
            let config = UploadConfig::from_env().await?;
            let settings = config.settings().clone();
            let signer =
                S3UploadSigner::new(config.client().clone(), settings.bucket_name.clone());
            Ok(UploadUrlHandler::new(signer, settings))
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
            error!(error = %err, "アップロード設定読み込み失敗");
            return Ok(ApiError::from(err).to_response());
        }
    };
    Ok(handler.handle(&event.payload).await)
}
