/// POST /orders
///
/// 在庫を引き当てて注文を作成する。
use backend::application::{ApiError, ApiResponse, OrderHandler};
use backend::infrastructure::{
    init_logging, ConfigError, DynamoMenuRepository, DynamoOrderRepository, TableConfig, TableKind,
};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::error;

type Handler = OrderHandler<DynamoOrderRepository, DynamoMenuRepository>;

/// warm start時に再利用するハンドラー
static HANDLER: OnceCell<Handler> = OnceCell::const_new();

async fn get_handler() -> Result<&'static Handler, ConfigError> {
    HANDLER
        .get_or_try_init(|| async {
            let config = TableConfig::from_env(TableKind::Meals).await?;
            Ok(OrderHandler::new(
                DynamoOrderRepository::new(
                    config.client().clone(),
                    config.table_name().to_string(),
                ),
                DynamoMenuRepository::new(config.client().clone(), config.table_name().to_string()),
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
            error!(error = %err, "設定読み込み失敗");
            return Ok(ApiError::from(err).to_response());
        }
    };
    Ok(handler.create(&event.payload).await)
}
