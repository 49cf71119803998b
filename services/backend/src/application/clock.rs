//! 識別子と現在時刻の生成

use chrono::{SecondsFormat, Utc};
use uuid::Uuid;

/// 新しい識別子（UUID v4）
pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// 現在時刻（秒精度・UTCの`Z`表記）
pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn test_new_id_is_unique_uuid() {
        let a = new_id();
        let b = new_id();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn test_now_is_second_precision_utc() {
        let now = now_rfc3339();
        assert!(now.ends_with('Z'), "{}", now);
        assert!(!now.contains('.'), "{}", now);
        assert!(DateTime::parse_from_rfc3339(&now).is_ok());
    }
}
