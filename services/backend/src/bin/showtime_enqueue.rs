/// POST /showtimes/selection
///
/// 選択された映画について、上映日から`SHOWTIME_WINDOW_DAYS`日分のスクレイピング依頼をキューに投入する。
///
/// # 環境変数
/// - SHOWTIME_QUEUE_URL: 投入先SQSキューのURL（必須）
/// - SHOWTIME_WINDOW_DAYS: 投入する日数（デフォルト: 14）
use backend::application::{ApiError, ApiResponse, ShowtimeEnqueueHandler};
use backend::domain::ScraperConfig;
use backend::infrastructure::{init_logging, ConfigError, QueueConfig, SqsShowtimeQueue};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::error;

type Handler = ShowtimeEnqueueHandler<SqsShowtimeQueue>;

/// warm start時に再利用するハンドラー
static HANDLER: OnceCell<Handler> = OnceCell::const_new();

async fn get_handler() -> Result<&'static Handler, ConfigError> {
    HANDLER
        .get_or_try_init(|| async {
            let config = QueueConfig::from_env().await?;
            let window_days = ScraperConfig::from_env().window_days;
            let queue = SqsShowtimeQueue::new(
                config.client().clone(),
                config.queue_url().to_string(),
            );
            Ok(ShowtimeEnqueueHandler::new(queue, window_days))
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
            error!(error = %err, "キュー設定読み込み失敗");
            return Ok(ApiError::from(err).to_response());
        }
    };
    Ok(handler.handle(&event.payload).await)
}
