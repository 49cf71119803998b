/// ページネーション
///
/// テーブル全体をスキャンした結果をメモリ上で切り出す。
/// サーバー側のカーソルはリクエストをまたいで保持しない。
use serde::Serialize;
use thiserror::Error;

/// ページ番号のデフォルト値
pub const DEFAULT_PAGE: usize = 1;

/// 1ページあたりの件数のデフォルト値
pub const DEFAULT_LIMIT: usize = 50;

/// 1ページあたりの件数の上限
pub const MAX_LIMIT: usize = 200;

/// ページ指定の解析エラー
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PaginationError {
    #[error("{0} must be a positive integer")]
    NotANumber(&'static str),
}

/// ページ指定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub limit: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    /// クエリパラメータ文字列からページ指定を解析
    ///
    /// pageは1未満なら1に、limitは1〜200の範囲に丸める。
    /// 数値として解釈できない値はエラー。
    pub fn parse(page: Option<&str>, limit: Option<&str>) -> Result<Self, PaginationError> {
        let page = match page {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map_err(|_| PaginationError::NotANumber("page"))?
                .max(1) as usize,
            None => DEFAULT_PAGE,
        };

        let limit = match limit {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map_err(|_| PaginationError::NotANumber("limit"))?
                .clamp(1, MAX_LIMIT as i64) as usize,
            None => DEFAULT_LIMIT,
        };

        Ok(Self { page, limit })
    }

    /// 先頭からのオフセット
    pub fn offset(&self) -> usize {
        (self.page - 1) * self.limit
    }

    /// 全件からこのページ分を切り出す
    pub fn slice<T>(&self, items: Vec<T>) -> Page<T> {
        let total = items.len();
        let data = items
            .into_iter()
            .skip(self.offset())
            .take(self.limit)
            .collect();

        Page {
            page: self.page,
            limit: self.limit,
            total,
            data,
        }
    }
}

/// ページングされた結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub data: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let request = PageRequest::parse(None, None).unwrap();
        assert_eq!(request, PageRequest::default());
        assert_eq!(request.offset(), 0);
    }

    #[test]
    fn test_clamps_out_of_range_values() {
        let request = PageRequest::parse(Some("0"), Some("500")).unwrap();
        assert_eq!(request.page, 1);
        assert_eq!(request.limit, MAX_LIMIT);

        let request = PageRequest::parse(Some("-3"), Some("0")).unwrap();
        assert_eq!(request.page, 1);
        assert_eq!(request.limit, 1);
    }

    #[test]
    fn test_rejects_non_numeric() {
        assert_eq!(
            PageRequest::parse(Some("two"), None),
            Err(PaginationError::NotANumber("page"))
        );
        assert_eq!(
            PageRequest::parse(None, Some("lots")),
            Err(PaginationError::NotANumber("limit"))
        );
    }

    #[test]
    fn test_slice_middle_page() {
        let request = PageRequest::parse(Some("2"), Some("3")).unwrap();
        let page = request.slice((1..=8).collect::<Vec<_>>());

        assert_eq!(page.total, 8);
        assert_eq!(page.data, vec![4, 5, 6]);
    }

    #[test]
    fn test_slice_past_end_is_empty() {
        let request = PageRequest::parse(Some("5"), Some("10")).unwrap();
        let page = request.slice(vec!["a", "b"]);

        assert_eq!(page.total, 2);
        assert!(page.data.is_empty());
    }
}
