//! メニューテンプレートリポジトリ
//!
//! ヘッダーを`TEMPLATE#<templateId>` / `META`、商品を
//! `TEMPLATE#<templateId>` / `ITEM#<itemId>`に保存する。

use async_trait::async_trait;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use tracing::info;

use super::dynamo_support::{
    from_item, key, query_partition, scan_all, sort_key, string_attr, to_keyed_item,
    transact_delete, transact_put, write_in_chunks, Item, RepositoryError, ScanFilter, PK,
};
use crate::domain::{ItemSpec, MenuTemplate, TemplateHeader};

pub const TEMPLATE_ENTITY: &str = "TEMPLATE";
pub const TEMPLATE_ITEM_ENTITY: &str = "TEMPLATE_ITEM";
const META_SK: &str = "META";
const ITEM_SK_PREFIX: &str = "ITEM#";

pub fn template_pk(template_id: &str) -> String {
    format!("TEMPLATE#{}", template_id)
}

#[async_trait]
pub trait TemplateRepository: Send + Sync {
    async fn create(&self, template: &MenuTemplate) -> Result<(), RepositoryError>;

    async fn get(&self, template_id: &str) -> Result<Option<MenuTemplate>, RepositoryError>;

    /// 全テンプレートのヘッダー（順序は不定）
    async fn list(&self) -> Result<Vec<TemplateHeader>, RepositoryError>;

    /// テンプレートを丸ごと書き換え、外れた商品を削除する
    async fn replace(
        &self,
        template: &MenuTemplate,
        removed_item_ids: &[String],
    ) -> Result<(), RepositoryError>;

    /// ヘッダーと全商品を削除する。存在しなければ`false`
    async fn delete(&self, template_id: &str) -> Result<bool, RepositoryError>;
}

#[derive(Debug, Clone)]
pub struct DynamoTemplateRepository {
    client: DynamoDbClient,
    table_name: String,
}

impl DynamoTemplateRepository {
    pub fn new(client: DynamoDbClient, table_name: String) -> Self {
        Self { client, table_name }
    }

    fn rows(template: &MenuTemplate) -> Result<Vec<Item>, RepositoryError> {
        let pk = template_pk(&template.template_id);
        let mut rows = vec![to_keyed_item(&template.header(), &pk, META_SK, TEMPLATE_ENTITY)?];
        for item in &template.items {
            rows.push(to_keyed_item(
                item,
                &pk,
                format!("{}{}", ITEM_SK_PREFIX, item.item_id),
                TEMPLATE_ITEM_ENTITY,
            )?);
        }
        Ok(rows)
    }

    fn assemble(rows: Vec<Item>) -> Result<Option<MenuTemplate>, RepositoryError> {
        let mut header: Option<TemplateHeader> = None;
        let mut items: Vec<ItemSpec> = Vec::new();

        for row in rows {
            match sort_key(&row) {
                Some(META_SK) => header = Some(from_item(row)?),
                Some(sk) if sk.starts_with(ITEM_SK_PREFIX) => items.push(from_item(row)?),
                _ => {}
            }
        }

        Ok(header.map(|header| {
            items.sort_by(|a, b| a.name.cmp(&b.name));
            MenuTemplate {
                template_id: header.template_id,
                name: header.name,
                items,
                tags: header.tags,
                created_at: header.created_at,
                updated_at: header.updated_at,
            }
        }))
    }

    async fn write_rows(
        &self,
        template: &MenuTemplate,
        header_condition: &str,
        removed_item_ids: &[String],
    ) -> Result<(), RepositoryError> {
        let mut rows = Self::rows(template)?.into_iter();
        let mut writes = Vec::new();
        if let Some(header) = rows.next() {
            writes.push(transact_put(&self.table_name, header, Some(header_condition))?);
        }
        for row in rows {
            writes.push(transact_put(&self.table_name, row, None)?);
        }
        for item_id in removed_item_ids {
            writes.push(transact_delete(
                &self.table_name,
                key(template_pk(&template.template_id), format!("{}{}", ITEM_SK_PREFIX, item_id)),
            )?);
        }
        write_in_chunks(&self.client, writes).await
    }
}

#[async_trait]
impl TemplateRepository for DynamoTemplateRepository {
    async fn create(&self, template: &MenuTemplate) -> Result<(), RepositoryError> {
        self.write_rows(template, "attribute_not_exists(PK)", &[]).await?;
        info!(
            template_id = %template.template_id,
            items = template.items.len(),
            "テンプレート作成完了"
        );
        Ok(())
    }

    async fn get(&self, template_id: &str) -> Result<Option<MenuTemplate>, RepositoryError> {
        let rows =
            query_partition(&self.client, &self.table_name, &template_pk(template_id), None).await?;
        Self::assemble(rows)
    }

    async fn list(&self) -> Result<Vec<TemplateHeader>, RepositoryError> {
        scan_all(&self.client, &self.table_name, ScanFilter::entity_type(TEMPLATE_ENTITY))
            .await?
            .into_iter()
            .map(from_item)
            .collect()
    }

    async fn replace(
        &self,
        template: &MenuTemplate,
        removed_item_ids: &[String],
    ) -> Result<(), RepositoryError> {
        self.write_rows(template, "attribute_exists(PK)", removed_item_ids)
            .await?;
        info!(
            template_id = %template.template_id,
            items = template.items.len(),
            removed = removed_item_ids.len(),
            "テンプレート更新完了"
        );
        Ok(())
    }

    async fn delete(&self, template_id: &str) -> Result<bool, RepositoryError> {
        let rows =
            query_partition(&self.client, &self.table_name, &template_pk(template_id), None).await?;
        if !rows.iter().any(|row| sort_key(row) == Some(META_SK)) {
            return Ok(false);
        }

        let mut writes = Vec::with_capacity(rows.len());
        for row in &rows {
            if let (Some(pk), Some(sk)) = (string_attr(row, PK), sort_key(row)) {
                writes.push(transact_delete(&self.table_name, key(pk, sk))?);
            }
        }
        write_in_chunks(&self.client, writes).await?;

        info!(template_id = %template_id, "テンプレート削除完了");
        Ok(true)
    }
}
