/// ログ基盤
///
/// Lambda関数はCloudWatch向けにJSON形式の構造化ログを出力する。
/// ローカル実行のCLIは人間が読みやすい形式で標準エラーに出力する。
use std::sync::Once;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// `RUST_LOG`があればそれを、無ければ指定レベルをフィルターに使う
fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Lambda環境向けのログサブスクライバーを初期化する
///
/// 複数回呼び出しても最初の1回のみ初期化する。
///
/// # 使用例
/// ```ignore
/// use backend::infrastructure::init_logging;
///
/// init_logging();
/// tracing::info!(menu_id = "menu-1", "メニュー取得");
/// ```
pub fn init_logging() {
    INIT.call_once(|| {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .flatten_event(true)
            .with_current_span(false);

        tracing_subscriber::registry()
            .with(env_filter("info"))
            .with(json_layer)
            .init();
    });
}

/// ローカル実行CLI向けのログサブスクライバーを初期化する
///
/// 標準出力は結果のJSON専用にするため、ログは標準エラーに出す。
pub fn init_cli_logging() {
    INIT.call_once(|| {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact();

        tracing_subscriber::registry()
            .with(env_filter("warn"))
            .with(fmt_layer)
            .init();
    });
}

/// テスト用のログサブスクライバーを初期化する
#[cfg(test)]
pub fn init_test_logging() {
    static TEST_INIT: Once = Once::new();

    TEST_INIT.call_once(|| {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_test_writer()
            .with_target(true)
            .compact();

        let _ = tracing_subscriber::registry()
            .with(env_filter("debug"))
            .with(fmt_layer)
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_test_logging_idempotent() {
        init_test_logging();
        init_test_logging();
    }

    #[test]
    fn test_env_filter_default_level() {
        let filter = env_filter("info");
        assert!(!filter.to_string().is_empty());
    }

    #[test]
    fn test_structured_fields() {
        init_test_logging();

        let span = tracing::info_span!("request", handler = "order_create", user_id = "user-1");
        let _guard = span.enter();

        tracing::info!(order_id = "ord-1", total = 32.99, "注文作成");
        tracing::warn!(item_id = "itm-1", requested = 3, available = 1, "在庫不足");
    }
}
