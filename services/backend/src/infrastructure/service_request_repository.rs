//! 修理・作業依頼リポジトリ
//!
//! 依頼は自由形式のJSONオブジェクトとして、
//! `PK=SERVICE#<serviceId>` / `SK=REQUESTED_AT#<requestedAt>`に保存する。

use async_trait::async_trait;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::dynamo_support::{
    from_item, key, read_error, s, scan_all, sort_key, to_attribute_value, to_item, write_error,
    RepositoryError, ScanFilter, PK, SK,
};

/// 自由形式の依頼レコード
pub type ServiceRecord = Map<String, Value>;

pub fn service_pk(service_id: &str) -> String {
    format!("SERVICE#{}", service_id)
}

pub fn requested_at_sk(requested_at: &str) -> String {
    format!("REQUESTED_AT#{}", requested_at)
}

/// キーに使う値の文字列表現
fn key_part(record: &ServiceRecord, field: &str) -> Result<String, RepositoryError> {
    match record.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) | None => Err(RepositoryError::SerializationError(format!(
            "{} is missing",
            field
        ))),
        Some(other) => Ok(other.to_string()),
    }
}

#[async_trait]
pub trait ServiceRequestRepository: Send + Sync {
    /// 依頼を保存する（serviceId・requestedAtからキーを組み立てる）
    async fn put(&self, record: &ServiceRecord) -> Result<(), RepositoryError>;

    /// 全件取得（キー属性は除去済み）
    async fn list_all(&self) -> Result<Vec<ServiceRecord>, RepositoryError>;

    /// 依頼の最新行のソートキー
    async fn latest_sort_key(&self, service_id: &str) -> Result<Option<String>, RepositoryError>;

    /// 指定行のフィールドを上書きする
    async fn update_fields(
        &self,
        service_id: &str,
        sort_key: &str,
        fields: &ServiceRecord,
    ) -> Result<(), RepositoryError>;
}

#[derive(Debug, Clone)]
pub struct DynamoServiceRequestRepository {
    client: DynamoDbClient,
    table_name: String,
}

impl DynamoServiceRequestRepository {
    pub fn new(client: DynamoDbClient, table_name: String) -> Self {
        Self { client, table_name }
    }
}

/// `SET #f0 = :v0, #f1 = :v1`形式の更新式
///
/// 属性名は予約語や記号を含みうるため、すべてプレースホルダーにする。
pub fn build_set_expression(fields: &ServiceRecord) -> String {
    let assignments: Vec<String> = (0..fields.len())
        .map(|i| format!("#f{} = :v{}", i, i))
        .collect();
    format!("SET {}", assignments.join(", "))
}

#[async_trait]
impl ServiceRequestRepository for DynamoServiceRequestRepository {
    async fn put(&self, record: &ServiceRecord) -> Result<(), RepositoryError> {
        let service_id = key_part(record, "serviceId")?;
        let requested_at = key_part(record, "requestedAt")?;

        let mut item = to_item(record)?;
        item.extend(key(service_pk(&service_id), requested_at_sk(&requested_at)));

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(write_error)?;

        info!(service_id = %service_id, requested_at = %requested_at, "作業依頼保存完了");
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<ServiceRecord>, RepositoryError> {
        scan_all(&self.client, &self.table_name, ScanFilter::default())
            .await?
            .into_iter()
            .map(|mut item| {
                item.remove(PK);
                item.remove(SK);
                from_item(item)
            })
            .collect()
    }

    async fn latest_sort_key(&self, service_id: &str) -> Result<Option<String>, RepositoryError> {
        let output = self
            .client
            .query()
            .table_name(&self.table_name)
            .key_condition_expression("PK = :pk")
            .expression_attribute_values(":pk", s(service_pk(service_id)))
            .scan_index_forward(false)
            .limit(1)
            .send()
            .await
            .map_err(read_error)?;

        let latest = output
            .items
            .unwrap_or_default()
            .first()
            .and_then(sort_key)
            .map(str::to_string);
        debug!(service_id = %service_id, sort_key = ?latest, "最新の作業依頼行");
        Ok(latest)
    }

    async fn update_fields(
        &self,
        service_id: &str,
        sort_key: &str,
        fields: &ServiceRecord,
    ) -> Result<(), RepositoryError> {
        let mut request = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .set_key(Some(key(service_pk(service_id), sort_key)))
            .update_expression(build_set_expression(fields))
            .condition_expression("attribute_exists(PK)");

        for (i, (name, value)) in fields.iter().enumerate() {
            request = request
                .expression_attribute_names(format!("#f{}", i), name)
                .expression_attribute_values(format!(":v{}", i), to_attribute_value(value)?);
        }

        request.send().await.map_err(write_error)?;

        info!(service_id = %service_id, fields = fields.len(), "作業依頼更新完了");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    /// テスト用のモック作業依頼リポジトリ
    #[derive(Debug, Clone, Default)]
    pub struct MockServiceRequestRepository {
        /// (PK, SK) -> レコード
        records: Arc<Mutex<BTreeMap<(String, String), ServiceRecord>>>,
        next_error: Arc<Mutex<Option<RepositoryError>>>,
    }

    impl MockServiceRequestRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_next_error(&self, error: RepositoryError) {
            *self.next_error.lock().unwrap() = Some(error);
        }

        pub fn records(&self) -> Vec<ServiceRecord> {
            self.records.lock().unwrap().values().cloned().collect()
        }

        fn take_error(&self) -> Option<RepositoryError> {
            self.next_error.lock().unwrap().take()
        }
    }

    #[async_trait]
    impl ServiceRequestRepository for MockServiceRequestRepository {
        async fn put(&self, record: &ServiceRecord) -> Result<(), RepositoryError> {
            if let Some(error) = self.take_error() {
                return Err(error);
            }
            let pk = service_pk(&key_part(record, "serviceId")?);
            let sk = requested_at_sk(&key_part(record, "requestedAt")?);
            self.records.lock().unwrap().insert((pk, sk), record.clone());
            Ok(())
        }

        async fn list_all(&self) -> Result<Vec<ServiceRecord>, RepositoryError> {
            if let Some(error) = self.take_error() {
                return Err(error);
            }
            Ok(self.records())
        }

        async fn latest_sort_key(
            &self,
            service_id: &str,
        ) -> Result<Option<String>, RepositoryError> {
            if let Some(error) = self.take_error() {
                return Err(error);
            }
            let pk = service_pk(service_id);
            Ok(self
                .records
                .lock()
                .unwrap()
                .keys()
                .filter(|(record_pk, _)| *record_pk == pk)
                .map(|(_, sk)| sk.clone())
                .max())
        }

        async fn update_fields(
            &self,
            service_id: &str,
            sort_key: &str,
            fields: &ServiceRecord,
        ) -> Result<(), RepositoryError> {
            if let Some(error) = self.take_error() {
                return Err(error);
            }
            let mut records = self.records.lock().unwrap();
            let record = records
                .get_mut(&(service_pk(service_id), sort_key.to_string()))
                .ok_or_else(|| RepositoryError::ConditionFailed(service_id.to_string()))?;
            for (name, value) in fields {
                record.insert(name.clone(), value.clone());
            }
            Ok(())
        }
    }

    #[test]
    fn test_key_helpers() {
        assert_eq!(service_pk("abc"), "SERVICE#abc");
        assert_eq!(
            requested_at_sk("2025-03-01T10:00:00Z"),
            "REQUESTED_AT#2025-03-01T10:00:00Z"
        );
    }

    #[test]
    fn test_build_set_expression_uses_placeholders() {
        let fields = json!({"status": "Completed", "assignedTechnician": "Sam"});
        let expression = build_set_expression(fields.as_object().unwrap());
        assert_eq!(expression, "SET #f0 = :v0, #f1 = :v1");
    }

    #[test]
    fn test_key_part_requires_value() {
        let record = json!({"serviceId": "abc", "requestedAt": null});
        let record = record.as_object().unwrap();
        assert_eq!(key_part(record, "serviceId").unwrap(), "abc");
        assert!(key_part(record, "requestedAt").is_err());
    }

    #[tokio::test]
    async fn test_mock_latest_sort_key_picks_newest() {
        let repo = MockServiceRequestRepository::new();
        for at in ["2025-03-01T10:00:00Z", "2025-03-02T10:00:00Z"] {
            let record = json!({"serviceId": "abc", "requestedAt": at});
            repo.put(record.as_object().unwrap()).await.unwrap();
        }

        assert_eq!(
            repo.latest_sort_key("abc").await.unwrap().as_deref(),
            Some("REQUESTED_AT#2025-03-02T10:00:00Z")
        );
        assert_eq!(repo.latest_sort_key("missing").await.unwrap(), None);
    }
}
