/// 入力値バリデーション
///
/// 日付・日時・メールアドレス・電話番号・価格・在庫数の形式チェックと
/// 金額の丸め処理を提供する。すべて副作用のない純粋関数。
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// 価格の上限（ドル）
pub const MAX_PRICE: f64 = 99_999.99;

/// 在庫数の上限
pub const MAX_STOCK_QTY: i64 = 9_999;

/// 電話番号の桁数範囲
const PHONE_DIGITS_MIN: usize = 7;
const PHONE_DIGITS_MAX: usize = 15;

/// `YYYY-MM-DD`形式の日付を解析
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    if value.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// `YYYY-MM-DD`形式の日付かどうか
pub fn is_valid_date(value: &str) -> bool {
    parse_date(value).is_some()
}

/// ISO8601形式の日時かどうか
///
/// RFC 3339（オフセット付き）と、オフセットなしの
/// `YYYY-MM-DDTHH:MM[:SS]`を受け付ける。
pub fn is_valid_iso8601(value: &str) -> bool {
    if DateTime::parse_from_rfc3339(value).is_ok() {
        return true;
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .any(|fmt| NaiveDateTime::parse_from_str(value, fmt).is_ok())
}

/// `local@domain.tld`形式のメールアドレスかどうか
pub fn is_valid_email(value: &str) -> bool {
    let value = value.trim();
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && tld.len() >= 2,
        None => false,
    }
}

/// 電話番号かどうか（区切り文字を除いて7〜15桁）
pub fn is_valid_phone(value: &str) -> bool {
    let mut digits = 0;
    for c in value.chars() {
        match c {
            '0'..='9' => digits += 1,
            '+' | '-' | '(' | ')' | '.' | ' ' => {}
            _ => return false,
        }
    }
    (PHONE_DIGITS_MIN..=PHONE_DIGITS_MAX).contains(&digits)
}

/// 価格として妥当か（0〜99999.99、小数点以下2桁まで）
pub fn is_valid_price(value: f64) -> bool {
    if !value.is_finite() || !(0.0..=MAX_PRICE).contains(&value) {
        return false;
    }
    let cents = value * 100.0;
    (cents - cents.round()).abs() < 1e-6
}

/// 在庫数として妥当か（0〜9999）
pub fn is_valid_stock_qty(value: i64) -> bool {
    (0..=MAX_STOCK_QTY).contains(&value)
}

/// 金額を小数点以下2桁に丸める
pub fn round_money(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        assert!(parse_date("2025-03-14").is_some());
        assert!(parse_date("2025-02-30").is_none());
        assert!(parse_date("2025-3-14").is_none());
        assert!(parse_date("14/03/2025").is_none());
        assert!(parse_date("").is_none());
    }

    #[test]
    fn test_is_valid_iso8601() {
        assert!(is_valid_iso8601("2025-03-14T17:30:00Z"));
        assert!(is_valid_iso8601("2025-03-14T17:30:00-05:00"));
        assert!(is_valid_iso8601("2025-03-14T17:30:00"));
        assert!(is_valid_iso8601("2025-03-14T17:30"));
        assert!(!is_valid_iso8601("2025-03-14"));
        assert!(!is_valid_iso8601("tomorrow at noon"));
    }

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("jane@example.com"));
        assert!(is_valid_email("first.last+tag@mail.example.co"));
        assert!(!is_valid_email("jane@example"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("jane example@example.com"));
        assert!(!is_valid_email("jane@@example.com"));
    }

    #[test]
    fn test_is_valid_phone() {
        assert!(is_valid_phone("312-555-0147"));
        assert!(is_valid_phone("+1 (312) 555.0147"));
        assert!(!is_valid_phone("555-01"));
        assert!(!is_valid_phone("call me maybe"));
        assert!(!is_valid_phone("1234567890123456"));
    }

    #[test]
    fn test_is_valid_price() {
        assert!(is_valid_price(0.0));
        assert!(is_valid_price(15.99));
        assert!(is_valid_price(MAX_PRICE));
        assert!(!is_valid_price(-0.01));
        assert!(!is_valid_price(100_000.0));
        assert!(!is_valid_price(1.999));
        assert!(!is_valid_price(f64::NAN));
    }

    #[test]
    fn test_is_valid_stock_qty() {
        assert!(is_valid_stock_qty(0));
        assert!(is_valid_stock_qty(9_999));
        assert!(!is_valid_stock_qty(-1));
        assert!(!is_valid_stock_qty(10_000));
    }

    #[test]
    fn test_round_money() {
        assert_eq!(round_money(15.99 + 8.50 * 2.0), 32.99);
        assert_eq!(round_money(0.1 + 0.2), 0.3);
        assert_eq!(round_money(10.005_1), 10.01);
    }
}
