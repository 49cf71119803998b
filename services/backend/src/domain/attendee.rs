/// 同窓会参加者の検索・集計ルール
///
/// 参加者レコードは自由形式のJSONオブジェクト。
use serde::Serialize;
use serde_json::{Map, Value};

/// 参加者レコード
pub type Attendee = Map<String, Value>;

/// キーワード検索の対象フィールド
pub const QUERY_FIELDS: [&str; 4] = ["firstName", "lastName", "familyGroup", "registrationCode"];

/// キーワード検索のパラメータ名
pub const QUERY_PARAM: &str = "q";

/// 参加者検索条件
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttendeeSearch {
    /// 主要4フィールドのいずれかに含まれる文字列
    pub query: Option<String>,
    /// フィールドごとの部分一致条件（AND）
    pub filters: Vec<(String, String)>,
}

impl AttendeeSearch {
    /// パラメータから検索条件を組み立てる（空の値は無視）
    pub fn from_params<'a>(params: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut search = AttendeeSearch::default();
        for (key, value) in params {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            if key == QUERY_PARAM {
                search.query = Some(value.to_lowercase());
            } else {
                search.filters.push((key.to_string(), value.to_lowercase()));
            }
        }
        search.filters.sort();
        search
    }

    pub fn matches(&self, attendee: &Attendee) -> bool {
        if let Some(query) = &self.query {
            let hit = QUERY_FIELDS
                .iter()
                .any(|field| field_contains(attendee, field, query));
            if !hit {
                return false;
            }
        }
        self.filters
            .iter()
            .all(|(field, needle)| field_contains(attendee, field, needle))
    }

    pub fn apply(&self, attendees: Vec<Attendee>) -> Vec<Attendee> {
        attendees.into_iter().filter(|a| self.matches(a)).collect()
    }
}

/// 属性値を文字列化して部分一致（大文字小文字を区別しない）
fn field_contains(attendee: &Attendee, field: &str, needle: &str) -> bool {
    match attendee.get(field) {
        Some(Value::String(s)) => s.to_lowercase().contains(needle),
        Some(Value::Number(n)) => n.to_string().contains(needle),
        Some(Value::Bool(b)) => b.to_string() == needle,
        Some(Value::Array(values)) => values.iter().any(|v| match v {
            Value::String(s) => s.to_lowercase().contains(needle),
            other => other.to_string().contains(needle),
        }),
        _ => false,
    }
}

/// ダッシュボード集計
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub total_attendees: usize,
    pub checked_in: usize,
    pub shirts_picked_up: usize,
    pub attendees: Vec<Attendee>,
}

impl Dashboard {
    /// 参加者一覧から集計する（真偽値のtrueのみ数える）
    pub fn from_attendees(attendees: Vec<Attendee>) -> Self {
        let flag = |a: &Attendee, key: &str| a.get(key).and_then(Value::as_bool) == Some(true);
        Self {
            total_attendees: attendees.len(),
            checked_in: attendees.iter().filter(|a| flag(a, "checkedIn")).count(),
            shirts_picked_up: attendees.iter().filter(|a| flag(a, "shirtsPickedUp")).count(),
            attendees,
        }
    }
}

/// チェックイン操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CheckInActions {
    pub check_in: bool,
    pub shirt_pickup: bool,
}

impl CheckInActions {
    pub fn from_json(body: &Map<String, Value>) -> Self {
        let flag = |key: &str| body.get(key).and_then(Value::as_bool).unwrap_or(false);
        Self {
            check_in: flag("checkin"),
            shirt_pickup: flag("shirtPickup"),
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.check_in && !self.shirt_pickup
    }
}
