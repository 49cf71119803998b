//! 上映情報のAPIハンドラー
//!
//! - スクレイピング依頼のキュー投入（14日分）
//! - 保存済み上映情報の取得（1件 / 一覧）

use chrono::Days;
use serde_json::{json, Value};
use tracing::info;

use super::api::{required_field, ApiError, ApiRequest, ApiResponse};
use crate::domain::validation::{is_valid_date, parse_date};
use crate::domain::{filter_options, ScrapeRequest, ShowtimeOptions};
use crate::infrastructure::{ShowtimeQueue, ShowtimeRepository};

/// 1件取得でスキャンする件数
pub const SELECTION_SCAN_LIMIT: i32 = 1;
/// 一覧取得でスキャンする件数
pub const OPTIONS_SCAN_LIMIT: i32 = 14;

const NO_SHOWTIMES: &str = "No showtimes found in table";

/// スクレイピング依頼をキューに投入するハンドラー
pub struct ShowtimeEnqueueHandler<Q>
where
    Q: ShowtimeQueue,
{
    queue: Q,
    window_days: u32,
}

impl<Q> ShowtimeEnqueueHandler<Q>
where
    Q: ShowtimeQueue,
{
    pub fn new(queue: Q, window_days: u32) -> Self {
        Self { queue, window_days }
    }

    pub async fn handle(&self, event: &Value) -> ApiResponse {
        ApiResponse::respond("showtime_enqueue", self.process(event).await)
    }

    async fn process(&self, event: &Value) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest::from_event(event)?;
        let body = request.json_object()?;

        let movie_id = required_field(&body, "movieId")?;
        let movie_title = required_field(&body, "movieTitle")?;
        let show_date = required_field(&body, "showDate")?;
        let start = parse_date(show_date)
            .ok_or_else(|| ApiError::validation("showDate must be YYYY-MM-DD"))?;

        let mut dates = Vec::with_capacity(self.window_days as usize);
        for offset in 0..self.window_days {
            let Some(day) = start.checked_add_days(Days::new(offset as u64)) else {
                break;
            };
            let message = ScrapeRequest {
                movie_id: movie_id.to_string(),
                movie_title: movie_title.to_string(),
                show_date: day.format("%Y-%m-%d").to_string(),
            };
            self.queue.enqueue(&message).await?;
            dates.push(message.show_date);
        }

        info!(
            movie_id = %movie_id,
            movie_title = %movie_title,
            queued = dates.len(),
            "スクレイピング依頼を投入"
        );

        Ok(ApiResponse::accepted(&json!({
            "message": "Showtime scraping queued",
            "movieId": movie_id,
            "movieTitle": movie_title,
            "queued": dates.len(),
            "dates": dates,
        })))
    }
}

/// 保存済み上映情報の取得ハンドラー
pub struct ShowtimeQueryHandler<R>
where
    R: ShowtimeRepository,
{
    repo: R,
}

impl<R> ShowtimeQueryHandler<R>
where
    R: ShowtimeRepository,
{
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// 1件を取得し、`theater`・`date`クエリで絞り込んで返す
    pub async fn selection(&self, event: &Value) -> ApiResponse {
        ApiResponse::respond("showtime_selection", self.process_selection(event).await)
    }

    /// 最大14件を取得し、絞り込んで上映日順に返す
    pub async fn options(&self, event: &Value) -> ApiResponse {
        ApiResponse::respond("showtime_options", self.process_options(event).await)
    }

    async fn process_selection(&self, event: &Value) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest::from_event(event)?;
        let (theater, date) = filters(&request)?;

        let record = self
            .repo
            .scan(SELECTION_SCAN_LIMIT)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::not_found(NO_SHOWTIMES))?;

        Ok(ApiResponse::ok(&filter_options(&record, theater, date)))
    }

    async fn process_options(&self, event: &Value) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest::from_event(event)?;
        let (theater, date) = filters(&request)?;

        let records = self.repo.scan(OPTIONS_SCAN_LIMIT).await?;
        if records.is_empty() {
            return Err(ApiError::not_found(NO_SHOWTIMES));
        }

        let mut options: Vec<ShowtimeOptions> = records
            .iter()
            .map(|record| filter_options(record, theater, date))
            .filter(|record| !record.theaters.is_empty())
            .collect();
        options.sort_by(|a, b| a.show_date.cmp(&b.show_date));

        Ok(ApiResponse::ok(&json!({
            "count": options.len(),
            "options": options,
        })))
    }
}

/// `theater`・`date`クエリ（dateはYYYY-MM-DD）
fn filters(request: &ApiRequest) -> Result<(Option<&str>, Option<&str>), ApiError> {
    let date = request.query_param("date");
    if let Some(date) = date {
        if !is_valid_date(date) {
            return Err(ApiError::validation("date must be YYYY-MM-DD"));
        }
    }
    Ok((request.query_param("theater"), date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::api::tests::{event, with_query};
    use crate::infrastructure::showtime_queue::tests::MockShowtimeQueue;
    use crate::infrastructure::showtime_repository::tests::{
        sample_options, MockShowtimeRepository,
    };
    use crate::infrastructure::RepositoryError;

    fn enqueue_body() -> Value {
        json!({"movieId": "m1", "movieTitle": "Dune: Part Two", "showDate": "2025-03-30"})
    }

    #[tokio::test]
    async fn test_enqueue_sends_one_message_per_day() {
        let queue = MockShowtimeQueue::new();
        let handler = ShowtimeEnqueueHandler::new(queue.clone(), 14);

        let response = handler.handle(&event(Some(enqueue_body()))).await;

        assert_eq!(response.status_code, 202);
        let sent = queue.sent();
        assert_eq!(sent.len(), 14);
        assert_eq!(sent[0].show_date, "2025-03-30");
        assert_eq!(sent[2].show_date, "2025-04-01");
        assert_eq!(sent[13].show_date, "2025-04-12");
        assert!(sent.iter().all(|m| m.movie_id == "m1"));

        let body = response.body_json();
        assert_eq!(body["queued"], 14);
        assert_eq!(body["dates"].as_array().unwrap().len(), 14);
    }

    #[tokio::test]
    async fn test_enqueue_requires_all_fields() {
        let handler = ShowtimeEnqueueHandler::new(MockShowtimeQueue::new(), 14);
        for field in ["movieId", "movieTitle", "showDate"] {
            let mut body = enqueue_body();
            body.as_object_mut().unwrap().remove(field);

            let response = handler.handle(&event(Some(body))).await;

            assert_eq!(response.status_code, 400);
            assert_eq!(
                response.body_json()["error"]["message"],
                format!("{} is required", field)
            );
        }
    }

    #[tokio::test]
    async fn test_enqueue_rejects_bad_date_and_bad_json() {
        let handler = ShowtimeEnqueueHandler::new(MockShowtimeQueue::new(), 14);

        let mut body = enqueue_body();
        body["showDate"] = json!("03/30/2025");
        assert_eq!(handler.handle(&event(Some(body))).await.status_code, 400);

        let mut malformed = event(None);
        malformed["body"] = json!("{");
        assert_eq!(handler.handle(&malformed).await.status_code, 400);
    }

    #[tokio::test]
    async fn test_enqueue_queue_failure_is_internal() {
        let queue = MockShowtimeQueue::new();
        queue.fail_at(3);
        let handler = ShowtimeEnqueueHandler::new(queue, 14);

        let response = handler.handle(&event(Some(enqueue_body()))).await;

        assert_eq!(response.status_code, 500);
        assert_eq!(response.body_json()["error"]["code"], "INTERNAL");
    }

    #[tokio::test]
    async fn test_selection_empty_table_is_404() {
        let handler = ShowtimeQueryHandler::new(MockShowtimeRepository::new());

        let response = handler.selection(&event(None)).await;

        assert_eq!(response.status_code, 404);
        assert_eq!(response.body_json()["error"]["message"], NO_SHOWTIMES);
    }

    #[tokio::test]
    async fn test_selection_applies_filters() {
        let repo = MockShowtimeRepository::new();
        repo.put(&sample_options("m1", "2025-03-01")).await.unwrap();
        let handler = ShowtimeQueryHandler::new(repo);

        let response = handler
            .selection(&with_query(event(None), "theater", "river"))
            .await;
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body_json()["theaters"].as_array().unwrap().len(), 1);

        let response = handler
            .selection(&with_query(event(None), "theater", "block 37"))
            .await;
        assert!(response.body_json()["theaters"].as_array().unwrap().is_empty());

        let response = handler
            .selection(&with_query(event(None), "date", "tomorrow"))
            .await;
        assert_eq!(response.status_code, 400);
    }

    #[tokio::test]
    async fn test_options_returns_every_match_sorted() {
        let repo = MockShowtimeRepository::new();
        for date in ["2025-03-02", "2025-03-01", "2025-03-03"] {
            repo.put(&sample_options("m1", date)).await.unwrap();
        }
        let mut empty = sample_options("m1", "2025-03-04");
        empty.theaters.clear();
        repo.put(&empty).await.unwrap();
        let handler = ShowtimeQueryHandler::new(repo);

        let response = handler.options(&event(None)).await;

        let body = response.body_json();
        assert_eq!(body["count"], 3);
        let dates: Vec<&str> = body["options"]
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o["showDate"].as_str().unwrap())
            .collect();
        assert_eq!(dates, vec!["2025-03-01", "2025-03-02", "2025-03-03"]);
    }

    #[tokio::test]
    async fn test_options_date_filter_keeps_matching_day() {
        let repo = MockShowtimeRepository::new();
        for date in ["2025-03-01", "2025-03-02"] {
            repo.put(&sample_options("m1", date)).await.unwrap();
        }
        let handler = ShowtimeQueryHandler::new(repo);

        let response = handler
            .options(&with_query(event(None), "date", "2025-03-02"))
            .await;

        let body = response.body_json();
        assert_eq!(body["count"], 1);
        assert_eq!(body["options"][0]["showDate"], "2025-03-02");
    }

    #[tokio::test]
    async fn test_options_throttled_is_429() {
        let repo = MockShowtimeRepository::new();
        repo.set_next_error(RepositoryError::Throttled("slow down".to_string()));
        let handler = ShowtimeQueryHandler::new(repo);

        assert_eq!(handler.options(&event(None)).await.status_code, 429);
    }
}
