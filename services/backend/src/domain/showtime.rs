/// 上映情報のドメインモデル
///
/// スクレイピング結果の保存形式と、上映形式の分類・絞り込みルールを定義する。
use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// 既知の上映形式（小文字キーワード → 表示名）
const KNOWN_FORMATS: &[(&str, &str)] = &[
    ("dolby cinema", "Dolby Cinema"),
    ("reald 3d", "RealD 3D"),
    ("dine-in delivery to seat", "Dine-In Delivery To Seat"),
    ("laser at amc", "Laser At AMC"),
];

/// どのキーワードにも一致しない形式の表示名
pub const OTHER_FORMAT: &str = "Other";

/// 形式ラベルが見つからないブロックのラベル
pub const DEFAULT_FORMAT_LABEL: &str = "Standard";

/// 1回分の上映枠
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowtimeSlot {
    pub time: String,
    pub date: String,
}

impl ShowtimeSlot {
    pub fn new(time: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            time: time.into(),
            date: date.into(),
        }
    }

    /// 時刻を0時からの分に変換（解釈できなければNone）
    pub fn minutes_of_day(&self) -> Option<u32> {
        parse_clock_time(&self.time)
    }
}

impl PartialEq for ShowtimeSlot {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.date == other.date
    }
}

impl Eq for ShowtimeSlot {}

impl Ord for ShowtimeSlot {
    fn cmp(&self, other: &Self) -> Ordering {
        self.date
            .cmp(&other.date)
            .then_with(|| match (self.minutes_of_day(), other.minutes_of_day()) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| self.time.cmp(&other.time))
    }
}

impl PartialOrd for ShowtimeSlot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// 上映形式ごとの上映枠
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowtimeFormat {
    #[serde(rename = "type")]
    pub format_type: String,
    pub slots: Vec<ShowtimeSlot>,
}

/// 劇場ごとの上映情報
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TheaterShowtimes {
    pub name: String,
    pub formats: Vec<ShowtimeFormat>,
}

/// 映画・日付ごとのスクレイピング結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowtimeOptions {
    pub movie_id: String,
    pub show_date: String,
    pub movie_title: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub theaters: Vec<TheaterShowtimes>,
}

/// スクレイピング依頼のキューメッセージ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeRequest {
    pub movie_id: String,
    pub movie_title: String,
    pub show_date: String,
}

/// `7:30pm` / `10:00 AM` / `7p` / `19:30` 形式の時刻を0時からの分に変換
pub fn parse_clock_time(raw: &str) -> Option<u32> {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    let (clock, meridiem) = if let Some(rest) = compact.strip_suffix("am") {
        (rest, Some(false))
    } else if let Some(rest) = compact.strip_suffix("pm") {
        (rest, Some(true))
    } else if let Some(rest) = compact.strip_suffix('a') {
        (rest, Some(false))
    } else if let Some(rest) = compact.strip_suffix('p') {
        (rest, Some(true))
    } else {
        (compact.as_str(), None)
    };

    let (hour, minute) = match clock.split_once(':') {
        Some((h, m)) => (h.parse::<u32>().ok()?, m.parse::<u32>().ok()?),
        None => (clock.parse::<u32>().ok()?, 0),
    };

    if minute >= 60 {
        return None;
    }

    let hour = match meridiem {
        Some(pm) => {
            if hour == 0 || hour > 12 {
                return None;
            }
            match (hour, pm) {
                (12, false) => 0,
                (12, true) => 12,
                (h, true) => h + 12,
                (h, false) => h,
            }
        }
        None if hour < 24 => hour,
        None => return None,
    };

    Some(hour * 60 + minute)
}

/// 形式ラベルを既知の上映形式に分類
pub fn classify_format(label: &str) -> &'static str {
    let clean = label.trim().to_lowercase();
    KNOWN_FORMATS
        .iter()
        .find(|(keyword, _)| clean.contains(keyword))
        .map(|(_, name)| *name)
        .unwrap_or(OTHER_FORMAT)
}

/// 割引告知などの上映形式ではないラベルか
pub fn is_noise_label(label: &str) -> bool {
    let clean = label.trim().to_lowercase();
    clean.contains("up to") || clean.contains("off") || clean == "standard"
}

/// 映画タイトルを比較用に正規化（小文字化・空白の圧縮）
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// 劇場スラッグを表示名に変換（`amc-river-east-21` → `Amc River East 21`）
pub fn theater_display_name(slug: &str) -> String {
    let mut name = String::with_capacity(slug.len());
    let mut previous_is_alpha = false;
    for c in slug.replace('-', " ").chars() {
        if c.is_alphabetic() {
            if previous_is_alpha {
                name.extend(c.to_lowercase());
            } else {
                name.extend(c.to_uppercase());
            }
            previous_is_alpha = true;
        } else {
            name.push(c);
            previous_is_alpha = false;
        }
    }
    name
}

/// 劇場名と日付で上映情報を絞り込む
///
/// 劇場名は大文字小文字を区別しない部分一致。日付指定時は該当日の枠のみ残し、
/// 空になった形式と劇場は取り除く。
pub fn filter_options(
    options: &ShowtimeOptions,
    theater: Option<&str>,
    date: Option<&str>,
) -> ShowtimeOptions {
    let theater_filter = theater.map(str::to_lowercase);

    let theaters = options
        .theaters
        .iter()
        .filter(|t| match &theater_filter {
            Some(filter) => t.name.to_lowercase().contains(filter.as_str()),
            None => true,
        })
        .filter_map(|t| {
            let Some(date) = date else {
                return Some(t.clone());
            };
            let formats: Vec<ShowtimeFormat> = t
                .formats
                .iter()
                .filter_map(|f| {
                    let slots: Vec<ShowtimeSlot> =
                        f.slots.iter().filter(|s| s.date == date).cloned().collect();
                    (!slots.is_empty()).then(|| ShowtimeFormat {
                        format_type: f.format_type.clone(),
                        slots,
                    })
                })
                .collect();
            (!formats.is_empty()).then(|| TheaterShowtimes {
                name: t.name.clone(),
                formats,
            })
        })
        .collect();

    ShowtimeOptions {
        theaters,
        ..options.clone()
    }
}
