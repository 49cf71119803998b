/// 定期購読のドメインモデル
///
/// 新規作成・部分更新の解析と、次回配達日の計算を行う。
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::validation::parse_date;

/// 配達間隔（日）
pub const DELIVERY_INTERVAL_DAYS: i64 = 7;

/// 週あたり食数の範囲
pub const MIN_MEALS_PER_WEEK: u32 = 1;
pub const MAX_MEALS_PER_WEEK: u32 = 21;

/// 次回配達日を探す上限回数（全日程スキップ時の無限ループ防止）
const MAX_DELIVERY_LOOKAHEAD: usize = 52;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SubscriptionError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{field} {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl SubscriptionError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        SubscriptionError::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubscriptionStatus {
    Active,
    Paused,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "ACTIVE" => Some(SubscriptionStatus::Active),
            "PAUSED" => Some(SubscriptionStatus::Paused),
            "CANCELLED" => Some(SubscriptionStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Portion {
    Regular,
    Large,
    Family,
}

/// 購読プラン
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub plan_id: String,
    pub meals_per_week: u32,
    pub portion: Portion,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Plan {
    fn from_json(value: &Value) -> Result<Self, SubscriptionError> {
        let plan: Plan = serde_json::from_value(value.clone()).map_err(|e| {
            SubscriptionError::invalid("plan", format!("is malformed: {}", e))
        })?;
        if plan.plan_id.trim().is_empty() {
            return Err(SubscriptionError::MissingField("plan.planId"));
        }
        if !(MIN_MEALS_PER_WEEK..=MAX_MEALS_PER_WEEK).contains(&plan.meals_per_week) {
            return Err(SubscriptionError::invalid(
                "plan.mealsPerWeek",
                format!(
                    "must be between {} and {}",
                    MIN_MEALS_PER_WEEK, MAX_MEALS_PER_WEEK
                ),
            ));
        }
        Ok(plan)
    }
}

/// 定期購読
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub subscription_id: String,
    pub user_id: String,
    pub plan: Plan,
    pub next_delivery: String,
    pub status: SubscriptionStatus,
    #[serde(default)]
    pub skip_dates: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// 購読の作成・更新リクエスト
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubscriptionChange {
    pub plan: Option<Plan>,
    pub skip_dates: Option<Vec<String>>,
    pub status: Option<SubscriptionStatus>,
}

impl SubscriptionChange {
    pub fn from_json(body: &Map<String, Value>) -> Result<Self, SubscriptionError> {
        let plan = match body.get("plan") {
            None | Some(Value::Null) => None,
            Some(value) => Some(Plan::from_json(value)?),
        };

        let skip_dates = match body.get("skipDates") {
            None | Some(Value::Null) => None,
            Some(Value::Array(values)) => {
                let mut dates = Vec::with_capacity(values.len());
                for value in values {
                    let date = value
                        .as_str()
                        .filter(|s| parse_date(s).is_some())
                        .ok_or_else(|| {
                            SubscriptionError::invalid("skipDates", "must contain YYYY-MM-DD dates")
                        })?;
                    dates.push(date.to_string());
                }
                dates.sort();
                dates.dedup();
                Some(dates)
            }
            Some(_) => return Err(SubscriptionError::invalid("skipDates", "must be an array")),
        };

        let status = match body.get("status") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(SubscriptionStatus::parse(s).ok_or_else(|| {
                SubscriptionError::invalid("status", "must be ACTIVE, PAUSED or CANCELLED")
            })?),
            Some(_) => return Err(SubscriptionError::invalid("status", "must be a string")),
        };

        Ok(Self {
            plan,
            skip_dates,
            status,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.plan.is_none() && self.skip_dates.is_none() && self.status.is_none()
    }

    /// 新しい購読を作成する（planは必須）
    pub fn create(
        self,
        subscription_id: String,
        user_id: &str,
        today: NaiveDate,
        now: &str,
    ) -> Result<Subscription, SubscriptionError> {
        let plan = self.plan.ok_or(SubscriptionError::MissingField("plan"))?;
        let skip_dates = self.skip_dates.unwrap_or_default();
        let first = today + Duration::days(DELIVERY_INTERVAL_DAYS);

        Ok(Subscription {
            subscription_id,
            user_id: user_id.to_string(),
            plan,
            next_delivery: next_delivery_on_or_after(first, &skip_dates),
            status: self.status.unwrap_or(SubscriptionStatus::Active),
            skip_dates,
            created_at: now.to_string(),
            updated_at: now.to_string(),
        })
    }

    /// 既存の購読に変更を適用する
    pub fn apply(self, mut current: Subscription, now: &str) -> Subscription {
        if let Some(plan) = self.plan {
            current.plan = plan;
        }
        if let Some(status) = self.status {
            current.status = status;
        }
        if let Some(skip_dates) = self.skip_dates {
            current.skip_dates = skip_dates;
        }
        if let Some(next) = parse_date(&current.next_delivery) {
            current.next_delivery = next_delivery_on_or_after(next, &current.skip_dates);
        }
        current.updated_at = now.to_string();
        current
    }
}

/// スキップ日を避けて、指定日から7日刻みで次回配達日を決める
pub fn next_delivery_on_or_after(start: NaiveDate, skip_dates: &[String]) -> String {
    let mut candidate = start;
    for _ in 0..MAX_DELIVERY_LOOKAHEAD {
        let formatted = candidate.format("%Y-%m-%d").to_string();
        if !skip_dates.contains(&formatted) {
            return formatted;
        }
        candidate += Duration::days(DELIVERY_INTERVAL_DAYS);
    }
    candidate.format("%Y-%m-%d").to_string()
}
