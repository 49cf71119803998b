//! API Gatewayプロキシ統合の入出力
//!
//! - `ApiRequest`: プロキシイベントから必要な部分だけを取り出したリクエスト
//! - `ApiResponse`: `{statusCode, headers, body}`形式のレスポンス
//! - `ApiError`: エラー種別と`{"error": {code, message, details?}}`形式の本文

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{error, warn};

use crate::domain::{
    CateringError, ItemError, OrderError, PaginationError, ServiceRequestError, SubscriptionError,
    UploadError,
};
use crate::infrastructure::{
    ConfigError, FetchError, MailError, QueueError, RepositoryError, SignError,
};

/// CORSを含む共通レスポンスヘッダー
pub const RESPONSE_HEADERS: [(&str, &str); 4] = [
    ("Content-Type", "application/json"),
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Headers", "Content-Type,Authorization,X-API-Key"),
    ("Access-Control-Allow-Methods", "GET,POST,PUT,PATCH,DELETE,OPTIONS"),
];

/// APIエラー
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Item {item_id} is out of stock")]
    OutOfStock { item_id: String },

    #[error("{0}")]
    RateLimited(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Validation(_) => 400,
            ApiError::Unauthenticated(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::OutOfStock { .. } => 409,
            ApiError::RateLimited(_) => 429,
            ApiError::Internal(_) => 500,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Unauthenticated(_) => "UNAUTHENTICATED",
            ApiError::Forbidden(_) => "UNAUTHORIZED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::OutOfStock { .. } => "OUT_OF_STOCK",
            ApiError::RateLimited(_) => "RATE_LIMITED",
            ApiError::Internal(_) => "INTERNAL",
        }
    }

    pub fn details(&self) -> Option<Value> {
        match self {
            ApiError::OutOfStock { item_id } => Some(json!({ "itemId": item_id })),
            _ => None,
        }
    }

    /// `{"error": {code, message, details?}}`
    pub fn body(&self) -> Value {
        let mut error = Map::new();
        error.insert("code".to_string(), json!(self.code()));
        error.insert("message".to_string(), json!(self.to_string()));
        if let Some(details) = self.details() {
            error.insert("details".to_string(), details);
        }
        json!({ "error": error })
    }

    pub fn to_response(&self) -> ApiResponse {
        ApiResponse::json(self.status_code(), &self.body())
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Throttled(_) => ApiError::RateLimited(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// 内部エラーとして扱う変換
macro_rules! internal_from {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for ApiError {
                fn from(err: $source) -> Self {
                    ApiError::Internal(err.to_string())
                }
            }
        )*
    };
}

/// 入力検証エラーとして扱う変換
macro_rules! validation_from {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for ApiError {
                fn from(err: $source) -> Self {
                    ApiError::Validation(err.to_string())
                }
            }
        )*
    };
}

internal_from!(ConfigError, QueueError, MailError, SignError, FetchError);
validation_from!(
    ItemError,
    OrderError,
    SubscriptionError,
    CateringError,
    ServiceRequestError,
    UploadError,
    PaginationError,
);

/// 本文の必須文字列フィールド（空白のみは欠落扱い）
pub fn required_field<'a>(body: &'a Map<String, Value>, field: &str) -> Result<&'a str, ApiError> {
    body.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::validation(format!("{} is required", field)))
}

/// API Gatewayプロキシ統合のレスポンス
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl ApiResponse {
    /// 値をJSON文字列にして本文にする
    pub fn json<T: Serialize + ?Sized>(status_code: u16, value: &T) -> Self {
        let headers = RESPONSE_HEADERS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        match serde_json::to_string(value) {
            Ok(body) => Self {
                status_code,
                headers,
                body,
            },
            Err(e) => Self {
                status_code: 500,
                headers,
                body: ApiError::Internal(e.to_string()).body().to_string(),
            },
        }
    }

    pub fn ok<T: Serialize + ?Sized>(value: &T) -> Self {
        Self::json(200, value)
    }

    pub fn created<T: Serialize + ?Sized>(value: &T) -> Self {
        Self::json(201, value)
    }

    pub fn accepted<T: Serialize + ?Sized>(value: &T) -> Self {
        Self::json(202, value)
    }

    /// ハンドラーの結果をレスポンスに変換する
    pub fn from_result(result: Result<ApiResponse, ApiError>) -> Self {
        result.unwrap_or_else(|err| err.to_response())
    }

    /// ハンドラーの結果をレスポンスに変換し、エラーを記録する
    ///
    /// 5xxはerror、4xxはwarnで記録する。
    pub fn respond(operation: &str, result: Result<ApiResponse, ApiError>) -> Self {
        if let Err(err) = &result {
            if err.status_code() >= 500 {
                error!(operation, code = err.code(), error = %err, "リクエスト処理失敗");
            } else {
                warn!(operation, code = err.code(), error = %err, "リクエストを拒否");
            }
        }
        Self::from_result(result)
    }

    /// 本文をJSONとして読む（テスト・ログ用）
    pub fn body_json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

/// API Gatewayプロキシイベントから取り出したリクエスト
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiRequest {
    /// 小文字化したヘッダー名 -> 値
    headers: BTreeMap<String, String>,
    path_parameters: BTreeMap<String, String>,
    query_parameters: BTreeMap<String, String>,
    body: Option<String>,
    is_base64_encoded: bool,
    request_context: Value,
}

/// `{"k": "v"}`形式のオブジェクトを文字列マップにする（文字列以外の値は無視）
fn string_map(value: Option<&Value>, lowercase_keys: bool) -> BTreeMap<String, String> {
    value
        .and_then(Value::as_object)
        .map(|object| {
            object
                .iter()
                .filter_map(|(k, v)| {
                    let key = if lowercase_keys {
                        k.to_lowercase()
                    } else {
                        k.clone()
                    };
                    v.as_str().map(|v| (key, v.to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}

impl ApiRequest {
    /// プロキシイベントからリクエストを作る
    ///
    /// 各フィールドは欠落・nullを許容する。イベントがオブジェクトでなければ400。
    pub fn from_event(event: &Value) -> Result<Self, ApiError> {
        let object = event
            .as_object()
            .ok_or_else(|| ApiError::validation("Event must be a JSON object"))?;

        let body = match object.get("body") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            // 直接呼び出しではボディがオブジェクトのまま渡されることがある
            Some(other) => Some(other.to_string()),
        };

        Ok(Self {
            headers: string_map(object.get("headers"), true),
            path_parameters: string_map(object.get("pathParameters"), false),
            query_parameters: string_map(object.get("queryStringParameters"), false),
            body,
            is_base64_encoded: object
                .get("isBase64Encoded")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            request_context: object.get("requestContext").cloned().unwrap_or(Value::Null),
        })
    }

    /// ヘッダーを大文字小文字を区別せずに取得（空文字はNone）
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_lowercase())
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_parameters
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_parameters
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn query_params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.query_parameters
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// 本文（base64指定時はデコード済み）。本文が無ければNone
    pub fn body_text(&self) -> Result<Option<String>, ApiError> {
        let Some(body) = &self.body else {
            return Ok(None);
        };
        if !self.is_base64_encoded {
            return Ok(Some(body.clone()));
        }

        let bytes = BASE64
            .decode(body.trim())
            .map_err(|e| ApiError::validation(format!("Invalid base64 body: {}", e)))?;
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| ApiError::validation(format!("Invalid UTF-8 body: {}", e)))
    }

    /// 本文をJSONとして型に読み込む
    pub fn json_body<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        let text = self
            .body_text()?
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| ApiError::validation("Request body is required"))?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::validation(format!("Invalid JSON body: {}", e)))
    }

    /// 本文をJSONオブジェクトとして読み込む
    pub fn json_object(&self) -> Result<Map<String, Value>, ApiError> {
        match self.json_body::<Value>()? {
            Value::Object(object) => Ok(object),
            _ => Err(ApiError::validation("Request body must be a JSON object")),
        }
    }

    /// オーソライザーが付与したクレーム（REST APIとHTTP API JWTの両形式）
    pub fn claims(&self) -> Option<&Map<String, Value>> {
        let authorizer = self.request_context.get("authorizer")?;
        authorizer
            .get("claims")
            .and_then(Value::as_object)
            .or_else(|| {
                authorizer
                    .get("jwt")
                    .and_then(|jwt| jwt.get("claims"))
                    .and_then(Value::as_object)
            })
    }

    /// クレームの文字列値
    pub fn claim(&self, name: &str) -> Option<&str> {
        self.claims()
            .and_then(|claims| claims.get(name))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// テスト用のプロキシイベント
    pub fn event(body: Option<Value>) -> Value {
        json!({
            "headers": {"Content-Type": "application/json"},
            "pathParameters": null,
            "queryStringParameters": null,
            "body": body.map(|b| b.to_string()),
            "isBase64Encoded": false,
            "requestContext": {}
        })
    }

    /// 顧客の認証情報付きイベント
    pub fn customer_event(user_id: &str, body: Option<Value>) -> Value {
        let mut event = event(body);
        event["headers"] = json!({
            "X-API-Key": "test-key",
            "Authorization": "Bearer token-123"
        });
        event["requestContext"] = json!({"authorizer": {"claims": {"sub": user_id}}});
        event
    }

    /// 管理者の認証情報付きイベント
    pub fn admin_event(body: Option<Value>) -> Value {
        let mut event = event(body);
        event["headers"] = json!({"x-api-key": "admin-key"});
        event
    }

    pub fn with_path(mut event: Value, name: &str, value: &str) -> Value {
        if !event["pathParameters"].is_object() {
            event["pathParameters"] = json!({});
        }
        event["pathParameters"][name] = json!(value);
        event
    }

    pub fn with_query(mut event: Value, name: &str, value: &str) -> Value {
        if !event["queryStringParameters"].is_object() {
            event["queryStringParameters"] = json!({});
        }
        event["queryStringParameters"][name] = json!(value);
        event
    }

    #[test]
    fn test_error_envelope() {
        let error = ApiError::validation("name is required");
        let response = error.to_response();

        assert_eq!(response.status_code, 400);
        assert_eq!(
            response.body_json(),
            json!({"error": {"code": "VALIDATION_ERROR", "message": "name is required"}})
        );
    }

    #[test]
    fn test_out_of_stock_details() {
        let error = ApiError::OutOfStock {
            item_id: "itm-1".to_string(),
        };
        let body = error.to_response().body_json();

        assert_eq!(error.status_code(), 409);
        assert_eq!(body["error"]["code"], "OUT_OF_STOCK");
        assert_eq!(body["error"]["details"]["itemId"], "itm-1");
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (ApiError::Unauthenticated("x".into()), 401, "UNAUTHENTICATED"),
            (ApiError::Forbidden("x".into()), 403, "UNAUTHORIZED"),
            (ApiError::not_found("x"), 404, "NOT_FOUND"),
            (ApiError::RateLimited("x".into()), 429, "RATE_LIMITED"),
            (ApiError::Internal("x".into()), 500, "INTERNAL"),
        ];
        for (error, status, code) in cases {
            assert_eq!(error.status_code(), status);
            assert_eq!(error.code(), code);
        }
    }

    #[test]
    fn test_repository_error_mapping() {
        let throttled: ApiError = RepositoryError::Throttled("slow".into()).into();
        assert_eq!(throttled.status_code(), 429);

        let write: ApiError = RepositoryError::WriteError("boom".into()).into();
        assert_eq!(write, ApiError::Internal("Write error: boom".to_string()));
    }

    #[test]
    fn test_response_headers_always_include_cors() {
        for response in [
            ApiResponse::ok(&json!({})),
            ApiError::Internal("x".into()).to_response(),
        ] {
            assert_eq!(
                response.headers.get("Access-Control-Allow-Origin").map(String::as_str),
                Some("*")
            );
            assert_eq!(
                response.headers.get("Content-Type").map(String::as_str),
                Some("application/json")
            );
        }
    }

    #[test]
    fn test_response_serializes_as_proxy_result() {
        let value = serde_json::to_value(ApiResponse::created(&json!({"id": 1}))).unwrap();
        assert_eq!(value["statusCode"], 201);
        assert_eq!(value["body"], "{\"id\":1}");
    }

    #[test]
    fn test_from_event_rejects_non_object() {
        assert!(matches!(
            ApiRequest::from_event(&json!("nope")),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let request = ApiRequest::from_event(&json!({"headers": {"X-Api-Key": "k"}})).unwrap();
        assert_eq!(request.header("x-api-key"), Some("k"));
        assert_eq!(request.header("X-API-KEY"), Some("k"));
    }

    #[test]
    fn test_empty_params_are_ignored() {
        let request = ApiRequest::from_event(&json!({
            "pathParameters": {"menuId": ""},
            "queryStringParameters": {"date": "2025-03-01"}
        }))
        .unwrap();
        assert_eq!(request.path_param("menuId"), None);
        assert_eq!(request.query_param("date"), Some("2025-03-01"));
    }

    #[test]
    fn test_json_body_errors() {
        let missing = ApiRequest::from_event(&event(None)).unwrap();
        assert_eq!(
            missing.json_object(),
            Err(ApiError::validation("Request body is required"))
        );

        let mut malformed = event(None);
        malformed["body"] = json!("{not json");
        let error = ApiRequest::from_event(&malformed)
            .unwrap()
            .json_object()
            .unwrap_err();
        assert_eq!(error.status_code(), 400);
        assert!(error.to_string().contains("JSON"));

        let array = ApiRequest::from_event(&event(Some(json!([1, 2])))).unwrap();
        assert!(array.json_object().is_err());
    }

    #[test]
    fn test_base64_body() {
        let request = ApiRequest::from_event(&json!({
            "body": BASE64.encode("{\"a\":1}"),
            "isBase64Encoded": true
        }))
        .unwrap();
        assert_eq!(request.json_object().unwrap()["a"], 1);

        let invalid = ApiRequest::from_event(&json!({"body": "***", "isBase64Encoded": true}))
            .unwrap();
        assert!(matches!(invalid.body_text(), Err(ApiError::Validation(_))));
    }

    #[test]
    fn test_object_body_is_accepted() {
        let request = ApiRequest::from_event(&json!({"body": {"name": "x"}})).unwrap();
        assert_eq!(request.json_object().unwrap()["name"], "x");
    }

    #[test]
    fn test_claims_from_rest_and_http_api() {
        let rest = ApiRequest::from_event(&json!({
            "requestContext": {"authorizer": {"claims": {"sub": "u1"}}}
        }))
        .unwrap();
        assert_eq!(rest.claim("sub"), Some("u1"));

        let http = ApiRequest::from_event(&json!({
            "requestContext": {"authorizer": {"jwt": {"claims": {"sub": "u2"}}}}
        }))
        .unwrap();
        assert_eq!(http.claim("sub"), Some("u2"));

        let none = ApiRequest::from_event(&json!({})).unwrap();
        assert!(none.claims().is_none());
    }
}
