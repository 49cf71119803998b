/// 上映情報スクレイピングの設定
///
/// 環境変数から設定値を読み込み、未設定または不正な値の場合はデフォルト値を使用する。
use tracing::{info, warn};

/// 上映スケジュールページのベースURL
pub const DEFAULT_BASE_URL: &str = "https://www.amctheatres.com/movie-theatres/chicago";
/// 対象劇場のスラッグ
pub const DEFAULT_THEATER_SLUGS: [&str; 3] = [
    "amc-roosevelt-collection-16",
    "amc-dine-in-block-37",
    "amc-river-east-21",
];
/// リクエスト時のUser-Agent
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0";
/// キュー投入する日数
pub const DEFAULT_WINDOW_DAYS: u32 = 14;
/// ページ取得のタイムアウト（秒）
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

pub const ENV_BASE_URL: &str = "SHOWTIME_BASE_URL";
pub const ENV_THEATERS: &str = "SHOWTIME_THEATERS";
pub const ENV_USER_AGENT: &str = "SHOWTIME_USER_AGENT";
pub const ENV_WINDOW_DAYS: &str = "SHOWTIME_WINDOW_DAYS";
pub const ENV_TIMEOUT_SECS: &str = "SHOWTIME_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq)]
pub struct ScraperConfig {
    pub base_url: String,
    pub theater_slugs: Vec<String>,
    pub user_agent: String,
    pub window_days: u32,
    pub timeout_secs: u64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            theater_slugs: DEFAULT_THEATER_SLUGS.iter().map(|s| s.to_string()).collect(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            window_days: DEFAULT_WINDOW_DAYS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ScraperConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let base_url = read_string(ENV_BASE_URL).unwrap_or(defaults.base_url);
        let theater_slugs = read_string(ENV_THEATERS)
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|slugs| !slugs.is_empty())
            .unwrap_or(defaults.theater_slugs);
        let user_agent = read_string(ENV_USER_AGENT).unwrap_or(defaults.user_agent);
        let window_days = read_positive(ENV_WINDOW_DAYS, defaults.window_days as u64) as u32;
        let timeout_secs = read_positive(ENV_TIMEOUT_SECS, defaults.timeout_secs);

        info!(
            base_url = %base_url,
            theaters = theater_slugs.len(),
            window_days,
            timeout_secs,
            "ScraperConfig loaded"
        );

        Self {
            base_url,
            theater_slugs,
            user_agent,
            window_days,
            timeout_secs,
        }
    }
}

fn read_string(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn read_positive(var: &str, default: u64) -> u64 {
    match read_string(var) {
        None => default,
        Some(raw) => match raw.parse::<u64>() {
            Ok(value) if value > 0 && value <= u32::MAX as u64 => value,
            _ => {
                warn!(var = var, value = %raw, default = default, "不正な設定値のためデフォルト値を使用");
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    unsafe fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn clear_all() {
        for var in [ENV_BASE_URL, ENV_THEATERS, ENV_USER_AGENT, ENV_WINDOW_DAYS, ENV_TIMEOUT_SECS] {
            unsafe { remove_env(var) };
        }
    }

    #[test]
    #[serial(scraper_env)]
    fn test_defaults_when_unset() {
        clear_all();
        let config = ScraperConfig::from_env();
        assert_eq!(config, ScraperConfig::default());
        assert_eq!(config.theater_slugs.len(), 3);
        assert_eq!(config.window_days, 14);
    }

    #[test]
    #[serial(scraper_env)]
    fn test_reads_overrides() {
        clear_all();
        unsafe {
            set_env(ENV_THEATERS, "amc-one, amc-two ,");
            set_env(ENV_WINDOW_DAYS, "7");
            set_env(ENV_USER_AGENT, "TestAgent/1.0");
        }

        let config = ScraperConfig::from_env();

        assert_eq!(config.theater_slugs, vec!["amc-one", "amc-two"]);
        assert_eq!(config.window_days, 7);
        assert_eq!(config.user_agent, "TestAgent/1.0");
        clear_all();
    }

    #[test]
    #[serial(scraper_env)]
    fn test_invalid_numbers_fall_back() {
        clear_all();
        unsafe {
            set_env(ENV_WINDOW_DAYS, "fortnight");
            set_env(ENV_TIMEOUT_SECS, "0");
        }

        let config = ScraperConfig::from_env();

        assert_eq!(config.window_days, DEFAULT_WINDOW_DAYS);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        clear_all();
    }
}
