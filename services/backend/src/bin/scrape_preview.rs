/// 上映スケジュールページのスクレイピング結果をローカルで確認するCLI
///
/// 実サイトに対して`scrape_range`を実行し、日付ごとの結果をJSONで標準出力に書き出す。
/// テーブルやキューには書き込まない。
///
/// # ローカル実行
/// ```bash
/// cargo run --bin scrape_preview -- --title "Dune: Part Two" --date 2024-03-15
///
/// # 3日分・劇場を指定
/// SHOWTIME_THEATERS=amc-river-east-21 cargo run --bin scrape_preview -- \
///     --title "Dune: Part Two" --date 2024-03-15 --days 3
/// ```
use backend::application::ShowtimeScraper;
use backend::domain::ScraperConfig;
use backend::infrastructure::{init_cli_logging, HttpPageFetcher};
use chrono::NaiveDate;
use clap::Parser;
use tracing::info;

/// コマンドライン引数
#[derive(Parser, Debug)]
#[command(name = "scrape_preview")]
#[command(about = "上映スケジュールページを巡回して結果をJSONで表示")]
struct CliArgs {
    /// 映画タイトル（ページ上の見出しと大文字小文字を無視して照合）
    #[arg(long, short = 't')]
    title: String,

    /// 開始日（YYYY-MM-DD）
    #[arg(long, short = 'd', value_parser = parse_date)]
    date: NaiveDate,

    /// 巡回する日数
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=31))]
    days: u32,
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| format!("{}: {}", raw, e))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_cli_logging();
    let args = CliArgs::parse();

    let config = ScraperConfig::from_env();
    let fetcher = HttpPageFetcher::new(&config)?;
    let scraper = ShowtimeScraper::new(fetcher, config);

    let results = scraper.scrape_range(&args.title, args.date, args.days).await;
    info!(
        days = results.len(),
        groups = results.iter().map(|day| day.theaters.len()).sum::<usize>(),
        "巡回完了"
    );

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
