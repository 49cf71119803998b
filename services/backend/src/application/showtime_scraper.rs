//! 劇場ごとの上映スケジュールページを巡回して上映情報を集める
//!
//! 1劇場1日につき1ページを取得する。取得・解析に失敗した劇場は記録して読み飛ばし、
//! 再試行はしない。

use chrono::{Days, NaiveDate};
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::showtime::theater_display_name;
use crate::domain::{extract_showtimes, ScraperConfig, TheaterShowtimes};
use crate::infrastructure::PageFetcher;

/// 1日分の巡回結果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyShowtimes {
    pub date: String,
    pub theaters: Vec<TheaterShowtimes>,
}

pub struct ShowtimeScraper<F>
where
    F: PageFetcher,
{
    fetcher: F,
    config: ScraperConfig,
}

impl<F> ShowtimeScraper<F>
where
    F: PageFetcher,
{
    pub fn new(fetcher: F, config: ScraperConfig) -> Self {
        Self { fetcher, config }
    }

    /// `{base}/{slug}/showtimes?date=YYYY-MM-DD`
    pub fn schedule_url(&self, slug: &str, date: &str) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&format!(
            "{}/{}/showtimes",
            self.config.base_url.trim_end_matches('/'),
            slug
        ))?;
        url.query_pairs_mut().append_pair("date", date);
        Ok(url)
    }

    /// 全劇場の1日分の上映情報を集める
    ///
    /// 上映が見つからなかった劇場は結果に含めない。
    pub async fn scrape_day(&self, movie_title: &str, date: NaiveDate) -> Vec<TheaterShowtimes> {
        let date = date.format("%Y-%m-%d").to_string();
        let mut theaters = Vec::new();

        for slug in &self.config.theater_slugs {
            let url = match self.schedule_url(slug, &date) {
                Ok(url) => url,
                Err(e) => {
                    warn!(theater = %slug, error = %e, "スケジュールURLの組み立てに失敗");
                    continue;
                }
            };

            let html = match self.fetcher.fetch(url.as_str()).await {
                Ok(html) => html,
                Err(e) => {
                    warn!(theater = %slug, date = %date, error = %e, "スケジュールページ取得失敗");
                    continue;
                }
            };

            let formats = extract_showtimes(&html, movie_title, &date);
            debug!(theater = %slug, date = %date, formats = formats.len(), "上映形式を抽出");
            if !formats.is_empty() {
                theaters.push(TheaterShowtimes {
                    name: theater_display_name(slug),
                    formats,
                });
            }
        }

        info!(
            movie_title = %movie_title,
            date = %date,
            theaters = theaters.len(),
            "1日分の巡回完了"
        );
        theaters
    }

    /// 開始日から`days`日分を巡回する
    pub async fn scrape_range(
        &self,
        movie_title: &str,
        start: NaiveDate,
        days: u32,
    ) -> Vec<DailyShowtimes> {
        let mut results = Vec::with_capacity(days as usize);
        for offset in 0..days {
            let Some(date) = start.checked_add_days(Days::new(offset as u64)) else {
                break;
            };
            let theaters = self.scrape_day(movie_title, date).await;
            results.push(DailyShowtimes {
                date: date.format("%Y-%m-%d").to_string(),
                theaters,
            });
        }
        results
    }
}
