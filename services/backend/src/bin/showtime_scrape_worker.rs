/// 上映情報スクレイピングのSQSコンシューマー
///
/// キューの依頼1件ごとに対象劇場の上映スケジュールページを取得し、
/// 結果を上映情報テーブルに保存する。不正な依頼と保存失敗は記録して読み飛ばす。
///
/// # 環境変数
/// - MOVIE_SHOWTIME_OPTIONS_TABLE: 保存先テーブル名（デフォルト: movie_showtime_options）
/// - SHOWTIME_BASE_URL / SHOWTIME_THEATERS / SHOWTIME_USER_AGENT / SHOWTIME_TIMEOUT_SECS: 巡回設定
use aws_lambda_events::event::sqs::SqsEvent;
use backend::application::{ScrapeSummary, ScrapeWorkerHandler, ShowtimeScraper};
use backend::domain::ScraperConfig;
use backend::infrastructure::{
    init_logging, DynamoShowtimeRepository, HttpPageFetcher, TableConfig, TableKind,
};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use tokio::sync::OnceCell;
use tracing::{error, info};

type Handler = ScrapeWorkerHandler<HttpPageFetcher, DynamoShowtimeRepository>;

/// warm start時に再利用するハンドラー（HTTPクライアントの接続も再利用する）
static HANDLER: OnceCell<Handler> = OnceCell::const_new();

async fn get_handler() -> Result<&'static Handler, Error> {
    HANDLER
        .get_or_try_init(|| async {
            let scraper_config = ScraperConfig::from_env();
            let fetcher = HttpPageFetcher::new(&scraper_config)?;
            let table = TableConfig::from_env(TableKind::Showtimes).await?;
            let repo = DynamoShowtimeRepository::new(
                table.client().clone(),
                table.table_name().to_string(),
            );
            Ok::<_, Error>(ScrapeWorkerHandler::new(
                ShowtimeScraper::new(fetcher, scraper_config),
                repo,
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

async fn handler(event: LambdaEvent<SqsEvent>) -> Result<ScrapeSummary, Error> {
    info!(record_count = event.payload.records.len(), "SQSイベントを受信");

    let handler = match get_handler().await {
        Ok(handler) => handler,
        Err(err) => {
            // 設定不備はLambdaの再試行に任せる
            error!(error = %err, "ワーカー初期化失敗");
            return Err(err);
        }
    };
    Ok(handler.handle(&event.payload).await)
}
