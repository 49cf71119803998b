//! 上映スケジュールページのHTML解析
//!
//! 劇場の1日分のスケジュールページから、指定映画の上映形式と上映時刻を抽出する。

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::showtime::{
    classify_format, is_noise_label, normalize_title, ShowtimeFormat, ShowtimeSlot,
    DEFAULT_FORMAT_LABEL,
};

static SECTION_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("section[aria-label]").expect("valid section selector"));

static BLOCK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li, div").expect("valid block selector"));

static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid anchor selector"));

static LABEL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span, p").expect("valid label selector"));

/// 上映時刻リンクを識別するhrefの部分文字列
const SHOWTIME_HREF_MARKER: &str = "/showtimes/";

/// ページから指定映画の上映形式ごとの上映枠を抽出する
///
/// # 引数
/// * `html` - スケジュールページのHTML
/// * `movie_title` - 映画タイトル（比較前に正規化する）
/// * `date` - 上映枠に付与する日付（YYYY-MM-DD）
///
/// # 戻り値
/// 形式名順に並んだ上映形式のリスト。各形式の上映枠は(時刻, 日付)で重複排除し、昇順に並べる。
/// 一致するセクションがなければ空のリスト。
pub fn extract_showtimes(html: &str, movie_title: &str, date: &str) -> Vec<ShowtimeFormat> {
    let document = Html::parse_document(html);
    let needle = format!("showtimes for {}", normalize_title(movie_title));

    let Some(section) = document.select(&SECTION_SELECTOR).find(|section| {
        section
            .value()
            .attr("aria-label")
            .map(|label| normalize_title(label).contains(&needle))
            .unwrap_or(false)
    }) else {
        return Vec::new();
    };

    let mut by_format: BTreeMap<&'static str, BTreeSet<ShowtimeSlot>> = BTreeMap::new();

    for block in section.select(&BLOCK_SELECTOR) {
        let times = showtime_texts(block);
        if times.is_empty() {
            continue;
        }

        let label = block
            .select(&LABEL_SELECTOR)
            .next()
            .map(stripped_text)
            .unwrap_or_else(|| DEFAULT_FORMAT_LABEL.to_string());

        if is_noise_label(&label) {
            continue;
        }

        let slots = by_format.entry(classify_format(&label)).or_default();
        for time in times {
            slots.insert(ShowtimeSlot::new(time, date));
        }
    }

    by_format
        .into_iter()
        .filter(|(_, slots)| !slots.is_empty())
        .map(|(format_type, slots)| ShowtimeFormat {
            format_type: format_type.to_string(),
            slots: slots.into_iter().collect(),
        })
        .collect()
}

/// ブロック内の上映時刻リンクのテキストを集める
fn showtime_texts(block: ElementRef<'_>) -> Vec<String> {
    block
        .select(&ANCHOR_SELECTOR)
        .filter(|a| {
            a.value()
                .attr("href")
                .is_some_and(|href| href.contains(SHOWTIME_HREF_MARKER))
        })
        .map(stripped_text)
        .filter(|text| !text.is_empty())
        .collect()
}

/// 要素内の各テキストノードをトリムして連結する
fn stripped_text(element: ElementRef<'_>) -> String {
    element.text().map(str::trim).collect::<String>()
}
