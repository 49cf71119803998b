/// 注文のドメインモデル
///
/// 注文リクエストの解析（同一商品の行の統合を含む）と合計金額の計算を行う。
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::validation::{is_valid_iso8601, round_money};

/// 1注文あたりの商品種類数の上限（1トランザクションに収める）
pub const MAX_ORDER_LINES: usize = 25;

/// 1行あたりの数量の上限
pub const MAX_LINE_QTY: u32 = 99;

/// 注文リクエストの検証エラー
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OrderError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{field} {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl OrderError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        OrderError::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

/// 注文ステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    Paid,
    Ready,
    PickedUp,
    Cancelled,
}

/// 注文明細（価格は注文時点の店舗側の価格）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub item_id: String,
    pub name: String,
    pub price: f64,
    pub qty: u32,
}

/// 注文
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: String,
    pub user_id: String,
    pub menu_id: String,
    pub items: Vec<OrderLine>,
    pub total: f64,
    pub status: OrderStatus,
    pub pickup_slot: String,
    pub placed_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Order {
    /// 注文日（placedAtの先頭10文字）
    pub fn placed_on(&self) -> &str {
        self.placed_at.get(..10).unwrap_or(&self.placed_at)
    }
}

/// 注文リクエストの1行
#[derive(Debug, Clone, PartialEq)]
pub struct RequestedLine {
    pub item_id: String,
    pub qty: u32,
}

/// 検証済みの注文リクエスト
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub menu_id: String,
    pub lines: Vec<RequestedLine>,
    pub pickup_slot: String,
    pub notes: Option<String>,
}

impl OrderRequest {
    /// リクエストボディを解析・検証する
    ///
    /// 同じitemIdの行は数量を合算して1行にまとめる（出現順を保持）。
    pub fn from_json(body: &Map<String, Value>) -> Result<Self, OrderError> {
        let menu_id = required_string(body, "menuId")?;

        let raw_items = match body.get("items") {
            Some(Value::Array(items)) if !items.is_empty() => items,
            Some(Value::Array(_)) | Some(Value::Null) | None => {
                return Err(OrderError::MissingField("items"));
            }
            Some(_) => return Err(OrderError::invalid("items", "must be an array")),
        };

        let mut lines: Vec<RequestedLine> = Vec::new();
        for raw in raw_items {
            let line = parse_line(raw)?;
            match lines.iter_mut().find(|l| l.item_id == line.item_id) {
                Some(existing) => existing.qty = existing.qty.saturating_add(line.qty),
                None => lines.push(line),
            }
        }

        if lines.len() > MAX_ORDER_LINES {
            return Err(OrderError::invalid(
                "items",
                format!("must contain at most {} distinct items", MAX_ORDER_LINES),
            ));
        }
        if let Some(line) = lines.iter().find(|l| l.qty > MAX_LINE_QTY) {
            return Err(OrderError::invalid(
                "qty",
                format!("for {} must be at most {}", line.item_id, MAX_LINE_QTY),
            ));
        }

        let pickup_slot = required_string(body, "pickupSlot")?;
        if !is_valid_iso8601(&pickup_slot) {
            return Err(OrderError::invalid("pickupSlot", "must be ISO8601 format"));
        }

        let notes = match body.get("notes") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(Value::String(s)) => Some(s.trim().to_string()),
            Some(_) => return Err(OrderError::invalid("notes", "must be a string")),
        };

        Ok(Self {
            menu_id,
            lines,
            pickup_slot,
            notes,
        })
    }
}

fn parse_line(raw: &Value) -> Result<RequestedLine, OrderError> {
    let fields = raw
        .as_object()
        .ok_or_else(|| OrderError::invalid("items", "must contain objects"))?;
    let item_id = required_string(fields, "itemId")?;
    let qty_value = fields
        .get("qty")
        .or_else(|| fields.get("quantity"))
        .ok_or(OrderError::MissingField("qty"))?;
    let qty = qty_value
        .as_u64()
        .filter(|q| *q >= 1)
        .ok_or_else(|| OrderError::invalid("qty", "must be a positive integer"))?;
    let qty = u32::try_from(qty)
        .ok()
        .filter(|q| *q <= MAX_LINE_QTY)
        .ok_or_else(|| {
            OrderError::invalid("qty", format!("for {} must be at most {}", item_id, MAX_LINE_QTY))
        })?;
    Ok(RequestedLine { item_id, qty })
}

fn required_string(fields: &Map<String, Value>, field: &'static str) -> Result<String, OrderError> {
    match fields.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::String(_)) | Some(Value::Null) | None => Err(OrderError::MissingField(field)),
        Some(_) => Err(OrderError::invalid(field, "must be a string")),
    }
}

/// 明細の合計金額（小数点以下2桁に丸める）
pub fn order_total(lines: &[OrderLine]) -> f64 {
    round_money(lines.iter().map(|l| l.price * l.qty as f64).sum())
}
