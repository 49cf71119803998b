//! DynamoDBリポジトリ共通の部品
//!
//! - リポジトリ操作のエラー型とSDKエラーの分類
//! - serde型とDynamoDBアイテムの相互変換
//! - ページングを辿るスキャン・クエリ
//! - 上限件数ごとに分割したトランザクション書き込み

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt::Debug;

use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::types::{AttributeValue, Delete, Put, TransactWriteItem, Update};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// DynamoDBのアイテム
pub type Item = HashMap<String, AttributeValue>;

/// パーティションキー属性名
pub const PK: &str = "PK";
/// ソートキー属性名
pub const SK: &str = "SK";
/// エンティティ種別属性名
pub const ENTITY_TYPE: &str = "entityType";

/// 1回のTransactWriteItemsに含める件数
pub const TRANSACTION_CHUNK_SIZE: usize = 25;

/// スロットリングを表すエラーコード
const THROTTLING_CODES: [&str; 4] = [
    "ProvisionedThroughputExceededException",
    "ThrottlingException",
    "RequestLimitExceeded",
    "TooManyRequestsException",
];

/// リポジトリ操作のエラー型
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RepositoryError {
    /// DynamoDBへの書き込みに失敗
    #[error("Write error: {0}")]
    WriteError(String),

    /// DynamoDBからの読み取りに失敗
    #[error("Read error: {0}")]
    ReadError(String),

    /// データのシリアライズ/デシリアライズに失敗
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// 条件付き書き込みの条件を満たさなかった
    #[error("Condition check failed: {0}")]
    ConditionFailed(String),

    /// スループット超過によるスロットリング
    #[error("Throttled: {0}")]
    Throttled(String),
}

/// SDKエラーをリポジトリエラーに分類する
///
/// 条件チェック失敗とスロットリングはエラーコードで判定し、
/// それ以外は`fallback`で包む。
pub fn classify_sdk_error<E, R>(
    err: SdkError<E, R>,
    fallback: fn(String) -> RepositoryError,
) -> RepositoryError
where
    E: ProvideErrorMetadata + StdError + 'static,
    R: Debug,
{
    let code = err.code().map(str::to_string);
    let detail = DisplayErrorContext(&err).to_string();
    match code.as_deref() {
        Some("ConditionalCheckFailedException") => RepositoryError::ConditionFailed(detail),
        Some(code) if THROTTLING_CODES.contains(&code) => RepositoryError::Throttled(detail),
        _ => fallback(detail),
    }
}

/// 読み取り系SDKエラーの分類
pub fn read_error<E, R>(err: SdkError<E, R>) -> RepositoryError
where
    E: ProvideErrorMetadata + StdError + 'static,
    R: Debug,
{
    classify_sdk_error(err, RepositoryError::ReadError)
}

/// 書き込み系SDKエラーの分類
pub fn write_error<E, R>(err: SdkError<E, R>) -> RepositoryError
where
    E: ProvideErrorMetadata + StdError + 'static,
    R: Debug,
{
    classify_sdk_error(err, RepositoryError::WriteError)
}

/// 文字列属性値
pub fn s(value: impl Into<String>) -> AttributeValue {
    AttributeValue::S(value.into())
}

/// 数値属性値
pub fn n(value: impl ToString) -> AttributeValue {
    AttributeValue::N(value.to_string())
}

/// PK/SKのキー
pub fn key(pk: impl Into<String>, sk: impl Into<String>) -> Item {
    HashMap::from([(PK.to_string(), s(pk)), (SK.to_string(), s(sk))])
}

/// serde型をDynamoDBアイテムに変換する
pub fn to_item<T: Serialize>(value: &T) -> Result<Item, RepositoryError> {
    serde_dynamo::to_item(value).map_err(|e| RepositoryError::SerializationError(e.to_string()))
}

/// serde型を、キーとエンティティ種別付きのDynamoDBアイテムに変換する
pub fn to_keyed_item<T: Serialize>(
    value: &T,
    pk: impl Into<String>,
    sk: impl Into<String>,
    entity_type: &str,
) -> Result<Item, RepositoryError> {
    let mut item = to_item(value)?;
    item.extend(key(pk, sk));
    item.insert(ENTITY_TYPE.to_string(), s(entity_type));
    Ok(item)
}

/// DynamoDBアイテムをserde型に変換する（キー属性等の余分な属性は無視）
pub fn from_item<T: DeserializeOwned>(item: Item) -> Result<T, RepositoryError> {
    serde_dynamo::from_item(item).map_err(|e| RepositoryError::SerializationError(e.to_string()))
}

/// 任意のJSON値を属性値に変換する
pub fn to_attribute_value<T: Serialize>(value: &T) -> Result<AttributeValue, RepositoryError> {
    serde_dynamo::to_attribute_value(value)
        .map_err(|e| RepositoryError::SerializationError(e.to_string()))
}

/// アイテムの文字列属性を取得
pub fn string_attr<'a>(item: &'a Item, name: &str) -> Option<&'a str> {
    item.get(name).and_then(|v| v.as_s().ok()).map(String::as_str)
}

/// アイテムのソートキーを取得
pub fn sort_key(item: &Item) -> Option<&str> {
    string_attr(item, SK)
}

/// スキャン条件
#[derive(Debug, Clone, Default)]
pub struct ScanFilter {
    pub expression: Option<String>,
    pub names: HashMap<String, String>,
    pub values: HashMap<String, AttributeValue>,
}

impl ScanFilter {
    /// エンティティ種別で絞り込む条件
    pub fn entity_type(entity_type: &str) -> Self {
        Self {
            expression: Some("#entityType = :entityType".to_string()),
            names: HashMap::from([("#entityType".to_string(), ENTITY_TYPE.to_string())]),
            values: HashMap::from([(":entityType".to_string(), s(entity_type))]),
        }
    }
}

/// ページングを辿ってテーブル全体をスキャンする
pub async fn scan_all(
    client: &DynamoDbClient,
    table_name: &str,
    filter: ScanFilter,
) -> Result<Vec<Item>, RepositoryError> {
    let mut items = Vec::new();
    let mut exclusive_start_key: Option<Item> = None;

    loop {
        let mut request = client
            .scan()
            .table_name(table_name)
            .set_exclusive_start_key(exclusive_start_key.take());
        if let Some(expression) = &filter.expression {
            request = request
                .filter_expression(expression)
                .set_expression_attribute_names(
                    (!filter.names.is_empty()).then(|| filter.names.clone()),
                )
                .set_expression_attribute_values(
                    (!filter.values.is_empty()).then(|| filter.values.clone()),
                );
        }

        let output = request.send().await.map_err(read_error)?;
        items.extend(output.items.unwrap_or_default());

        match output.last_evaluated_key {
            Some(key) if !key.is_empty() => exclusive_start_key = Some(key),
            _ => break,
        }
    }

    Ok(items)
}

/// パーティション内のアイテムを（ソートキー接頭辞で絞り込んで）すべて取得する
pub async fn query_partition(
    client: &DynamoDbClient,
    table_name: &str,
    pk: &str,
    sk_prefix: Option<&str>,
) -> Result<Vec<Item>, RepositoryError> {
    let mut items = Vec::new();
    let mut exclusive_start_key: Option<Item> = None;

    loop {
        let mut request = client
            .query()
            .table_name(table_name)
            .expression_attribute_values(":pk", s(pk))
            .set_exclusive_start_key(exclusive_start_key.take());
        request = match sk_prefix {
            Some(prefix) => request
                .key_condition_expression("PK = :pk AND begins_with(SK, :sk)")
                .expression_attribute_values(":sk", s(prefix)),
            None => request.key_condition_expression("PK = :pk"),
        };

        let output = request.send().await.map_err(read_error)?;
        items.extend(output.items.unwrap_or_default());

        match output.last_evaluated_key {
            Some(key) if !key.is_empty() => exclusive_start_key = Some(key),
            _ => break,
        }
    }

    Ok(items)
}

/// Put操作のトランザクション要素
pub fn transact_put(
    table_name: &str,
    item: Item,
    condition: Option<&str>,
) -> Result<TransactWriteItem, RepositoryError> {
    let put = Put::builder()
        .table_name(table_name)
        .set_item(Some(item))
        .set_condition_expression(condition.map(str::to_string))
        .build()
        .map_err(|e| RepositoryError::WriteError(e.to_string()))?;
    Ok(TransactWriteItem::builder().put(put).build())
}

/// 属性の部分更新式（`SET`と`REMOVE`）と属性名・値のプレースホルダー
///
/// 属性名の順に`#a0`/`:a0`、`#r0`を割り当てる。
pub fn partial_update_expression(
    attributes: Item,
    remove: &[&str],
) -> (String, HashMap<String, String>, HashMap<String, AttributeValue>) {
    let mut attributes: Vec<(String, AttributeValue)> = attributes.into_iter().collect();
    attributes.sort_by(|a, b| a.0.cmp(&b.0));

    let mut names = HashMap::new();
    let mut values = HashMap::new();
    let mut sets = Vec::with_capacity(attributes.len());
    for (i, (name, value)) in attributes.into_iter().enumerate() {
        sets.push(format!("#a{i} = :a{i}"));
        names.insert(format!("#a{i}"), name);
        values.insert(format!(":a{i}"), value);
    }
    let mut removes = Vec::with_capacity(remove.len());
    for (i, name) in remove.iter().enumerate() {
        removes.push(format!("#r{i}"));
        names.insert(format!("#r{i}"), name.to_string());
    }

    let mut expression = Vec::new();
    if !sets.is_empty() {
        expression.push(format!("SET {}", sets.join(", ")));
    }
    if !removes.is_empty() {
        expression.push(format!("REMOVE {}", removes.join(", ")));
    }
    (expression.join(" "), names, values)
}

/// 指定属性のみを書き換えるUpdate操作のトランザクション要素
///
/// `attributes`にキー属性を含めないこと。
pub fn transact_update(
    table_name: &str,
    key: Item,
    attributes: Item,
    remove: &[&str],
    condition: Option<&str>,
) -> Result<TransactWriteItem, RepositoryError> {
    let (expression, names, values) = partial_update_expression(attributes, remove);
    let update = Update::builder()
        .table_name(table_name)
        .set_key(Some(key))
        .update_expression(expression)
        .set_expression_attribute_names((!names.is_empty()).then_some(names))
        .set_expression_attribute_values((!values.is_empty()).then_some(values))
        .set_condition_expression(condition.map(str::to_string))
        .build()
        .map_err(|e| RepositoryError::WriteError(e.to_string()))?;
    Ok(TransactWriteItem::builder().update(update).build())
}

/// Delete操作のトランザクション要素
pub fn transact_delete(table_name: &str, key: Item) -> Result<TransactWriteItem, RepositoryError> {
    let delete = Delete::builder()
        .table_name(table_name)
        .set_key(Some(key))
        .build()
        .map_err(|e| RepositoryError::WriteError(e.to_string()))?;
    Ok(TransactWriteItem::builder().delete(delete).build())
}

/// 条件付きDelete操作のトランザクション要素
pub fn transact_delete_if(
    table_name: &str,
    key: Item,
    condition: &str,
    values: Item,
) -> Result<TransactWriteItem, RepositoryError> {
    let delete = Delete::builder()
        .table_name(table_name)
        .set_key(Some(key))
        .condition_expression(condition)
        .set_expression_attribute_values((!values.is_empty()).then_some(values))
        .build()
        .map_err(|e| RepositoryError::WriteError(e.to_string()))?;
    Ok(TransactWriteItem::builder().delete(delete).build())
}

/// トランザクション書き込みを上限件数ごとに分割して実行する
///
/// チャンク間の原子性は保証されない。単一チャンクに収まる書き込みは原子的。
pub async fn write_in_chunks(
    client: &DynamoDbClient,
    items: Vec<TransactWriteItem>,
) -> Result<(), RepositoryError> {
    write_in_chunks_tracked(client, items)
        .await
        .map_err(|failure| failure.error)
}

/// 分割書き込みの失敗（失敗前に書き込み済みのチャンク数を含む）
#[derive(Debug)]
pub struct ChunkedWriteFailure {
    pub written_chunks: usize,
    pub error: RepositoryError,
}

/// `write_in_chunks`と同じだが、失敗時に書き込み済みのチャンク数を返す
pub async fn write_in_chunks_tracked(
    client: &DynamoDbClient,
    items: Vec<TransactWriteItem>,
) -> Result<(), ChunkedWriteFailure> {
    for (written_chunks, chunk) in items.chunks(TRANSACTION_CHUNK_SIZE).enumerate() {
        client
            .transact_write_items()
            .set_transact_items(Some(chunk.to_vec()))
            .send()
            .await
            .map_err(|e| ChunkedWriteFailure {
                written_chunks,
                error: write_error(e),
            })?;
    }
    Ok(())
}
