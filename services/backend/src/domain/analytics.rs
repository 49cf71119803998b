/// 管理画面向けの売上・購読・ケータリング集計
use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use super::catering::{CateringRequest, CateringStatus};
use super::order::{Order, OrderStatus};
use super::subscription::{Subscription, SubscriptionStatus};
use super::validation::round_money;

/// 人気商品として返す件数
pub const TOP_ITEMS_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopItem {
    pub item_id: String,
    pub name: String,
    pub quantity: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminAnalytics {
    pub date: String,
    pub daily_gross_sales: f64,
    pub daily_orders: usize,
    pub total_orders: usize,
    pub average_order_value: f64,
    pub top_items: Vec<TopItem>,
    pub subscription_churn: f64,
    pub active_subscriptions: usize,
    pub catering_pipeline: BTreeMap<CateringStatus, usize>,
}

/// 指定日の集計を計算する
///
/// キャンセル済みの注文は売上・平均単価・人気商品から除外する。
pub fn compute_analytics(
    date: &str,
    orders: &[Order],
    subscriptions: &[Subscription],
    catering: &[CateringRequest],
) -> AdminAnalytics {
    let billable: Vec<&Order> = orders
        .iter()
        .filter(|o| o.status != OrderStatus::Cancelled)
        .collect();

    let daily: Vec<&&Order> = billable.iter().filter(|o| o.placed_on() == date).collect();
    let daily_gross_sales = round_money(daily.iter().map(|o| o.total).sum());

    let average_order_value = if billable.is_empty() {
        0.0
    } else {
        round_money(billable.iter().map(|o| o.total).sum::<f64>() / billable.len() as f64)
    };

    let mut quantities: HashMap<&str, (&str, u64)> = HashMap::new();
    for line in billable.iter().flat_map(|o| o.items.iter()) {
        let entry = quantities
            .entry(line.item_id.as_str())
            .or_insert((line.name.as_str(), 0));
        entry.1 += line.qty as u64;
    }
    let mut top_items: Vec<TopItem> = quantities
        .into_iter()
        .map(|(item_id, (name, quantity))| TopItem {
            item_id: item_id.to_string(),
            name: name.to_string(),
            quantity,
        })
        .collect();
    top_items.sort_by(|a, b| b.quantity.cmp(&a.quantity).then_with(|| a.name.cmp(&b.name)));
    top_items.truncate(TOP_ITEMS_LIMIT);

    let cancelled = subscriptions
        .iter()
        .filter(|s| s.status == SubscriptionStatus::Cancelled)
        .count();
    let subscription_churn = if subscriptions.is_empty() {
        0.0
    } else {
        round_money(cancelled as f64 / subscriptions.len() as f64 * 100.0)
    };
    let active_subscriptions = subscriptions
        .iter()
        .filter(|s| s.status == SubscriptionStatus::Active)
        .count();

    let mut catering_pipeline = BTreeMap::new();
    for request in catering {
        *catering_pipeline.entry(request.status).or_insert(0) += 1;
    }

    AdminAnalytics {
        date: date.to_string(),
        daily_gross_sales,
        daily_orders: daily.len(),
        total_orders: orders.len(),
        average_order_value,
        top_items,
        subscription_churn,
        active_subscriptions,
        catering_pipeline,
    }
}
