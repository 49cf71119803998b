//! スクレイピング依頼キューのワーカー
//!
//! SQSレコード1件につき1日分の上映情報を巡回し、`(movieId, showDate)`単位で保存する。

use aws_lambda_events::event::sqs::{SqsEvent, SqsMessage};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{error, info, warn};

use super::clock::now_rfc3339;
use super::showtime_scraper::ShowtimeScraper;
use crate::domain::validation::parse_date;
use crate::domain::{ScrapeRequest, ShowtimeOptions};
use crate::infrastructure::{PageFetcher, ShowtimeRepository};

/// 1回の起動での処理結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScrapeSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct ScrapeWorkerHandler<F, R>
where
    F: PageFetcher,
    R: ShowtimeRepository,
{
    scraper: ShowtimeScraper<F>,
    repo: R,
}

impl<F, R> ScrapeWorkerHandler<F, R>
where
    F: PageFetcher,
    R: ShowtimeRepository,
{
    pub fn new(scraper: ShowtimeScraper<F>, repo: R) -> Self {
        Self { scraper, repo }
    }

    pub async fn handle(&self, event: &SqsEvent) -> ScrapeSummary {
        let mut summary = ScrapeSummary::default();

        for record in &event.records {
            let Some((request, date)) = parse_record(record) else {
                summary.skipped += 1;
                continue;
            };

            let theaters = self.scraper.scrape_day(&request.movie_title, date).await;
            let options = ShowtimeOptions {
                movie_id: request.movie_id,
                show_date: request.show_date,
                movie_title: request.movie_title,
                created_at: now_rfc3339(),
                theaters,
            };

            match self.repo.put(&options).await {
                Ok(()) => {
                    summary.processed += 1;
                    info!(
                        movie_id = %options.movie_id,
                        show_date = %options.show_date,
                        theaters = options.theaters.len(),
                        "上映情報を保存"
                    );
                }
                Err(e) => {
                    summary.failed += 1;
                    error!(
                        movie_id = %options.movie_id,
                        show_date = %options.show_date,
                        error = %e,
                        "上映情報の保存に失敗"
                    );
                }
            }
        }

        info!(
            processed = summary.processed,
            skipped = summary.skipped,
            failed = summary.failed,
            "スクレイピング依頼の処理完了"
        );
        summary
    }
}

/// レコード本文を依頼と上映日に変換する（不正なものはNone）
fn parse_record(record: &SqsMessage) -> Option<(ScrapeRequest, NaiveDate)> {
    let message_id = record.message_id.as_deref().unwrap_or("unknown");
    let Some(body) = record.body.as_deref() else {
        warn!(message_id = %message_id, "本文のないレコードを読み飛ばし");
        return None;
    };

    let request: ScrapeRequest = match serde_json::from_str(body) {
        Ok(request) => request,
        Err(e) => {
            warn!(message_id = %message_id, error = %e, "不正なレコードを読み飛ばし");
            return None;
        }
    };

    let blank = [&request.movie_id, &request.movie_title, &request.show_date]
        .iter()
        .any(|v| v.trim().is_empty());
    match parse_date(&request.show_date) {
        Some(date) if !blank => Some((request, date)),
        _ => {
            warn!(message_id = %message_id, show_date = %request.show_date, "不正な依頼内容を読み飛ばし");
            None
        }
    }
}
