//! メニューリポジトリ
//!
//! 単一テーブル上で、メニューヘッダー（`MENU#<menuId>` / `META`）と
//! 商品（`MENU#<menuId>` / `ITEM#<itemId>`）を管理する。
//! 両方の行に`menuDate`を持たせ、GSI `DateIndex`で日付から引けるようにする。
//! 日付ごとに`MENUDATE#<date>` / `META`の予約行を置き、1日1メニューを保証する。

use async_trait::async_trait;
use aws_sdk_dynamodb::types::ReturnValue;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_dynamodb::types::TransactWriteItem;
use tracing::{debug, error, info, warn};

use super::dynamo_support::{
    from_item, key, n, query_partition, read_error, s, scan_all, sort_key, string_attr,
    to_keyed_item, transact_delete, transact_delete_if, transact_put, transact_update,
    write_error, write_in_chunks, write_in_chunks_tracked, Item, RepositoryError, ScanFilter,
    ENTITY_TYPE, PK, SK,
};
use crate::domain::{Menu, MenuHeader, MenuItem};

pub const MENU_ENTITY: &str = "MENU";
pub const MENU_ITEM_ENTITY: &str = "MENU_ITEM";
pub const DATE_INDEX: &str = "DateIndex";
pub const MENU_DATE_ATTR: &str = "menuDate";
pub const MENU_DATE_ENTITY: &str = "MENU_DATE";
const META_SK: &str = "META";
const ITEM_SK_PREFIX: &str = "ITEM#";
const MENU_ID_ATTR: &str = "menuId";
const STOCK_ATTR: &str = "stockQty";
/// 商品の任意属性（部分更新で値が無ければ削除する）
const OPTIONAL_ITEM_ATTRS: [&str; 4] = ["description", "imageUrl", "category", "spiceLevel"];

pub fn menu_pk(menu_id: &str) -> String {
    format!("MENU#{}", menu_id)
}

pub fn item_sk(item_id: &str) -> String {
    format!("{}{}", ITEM_SK_PREFIX, item_id)
}

/// 日付の予約行のパーティションキー
pub fn date_guard_pk(date: &str) -> String {
    format!("MENUDATE#{}", date)
}

/// メニュー更新時の商品の書き込み
#[derive(Debug, Clone, PartialEq)]
pub enum ItemWrite {
    /// 新規商品の保存
    Put(MenuItem),
    /// 既存商品の属性の書き換え
    ///
    /// 在庫数は`set_stock`の場合のみ書き込み、それ以外は保存済みの値を残す。
    /// 商品が既に無ければ`ConditionFailed`。
    Patch { item: MenuItem, set_stock: bool },
}

impl ItemWrite {
    pub fn item(&self) -> &MenuItem {
        match self {
            ItemWrite::Put(item) | ItemWrite::Patch { item, .. } => item,
        }
    }
}

/// メニューリポジトリトレイト
#[async_trait]
pub trait MenuRepository: Send + Sync {
    /// メニューIDでヘッダーと全商品を取得
    async fn find_by_id(&self, menu_id: &str) -> Result<Option<Menu>, RepositoryError>;

    /// 日付（YYYY-MM-DD）でメニューを取得
    async fn find_by_date(&self, date: &str) -> Result<Option<Menu>, RepositoryError>;

    /// 単一の商品を取得
    async fn find_item(
        &self,
        menu_id: &str,
        item_id: &str,
    ) -> Result<Option<MenuItem>, RepositoryError>;

    /// 全メニューのヘッダーを取得（順序は不定）
    async fn list_headers(&self) -> Result<Vec<MenuHeader>, RepositoryError>;

    /// ヘッダーと商品を新規作成する
    ///
    /// 同じメニューID、または同じ日付のメニューが既に存在する場合は`ConditionFailed`。
    async fn create(&self, menu: &Menu) -> Result<(), RepositoryError>;

    /// ヘッダーを保存し、商品の書き込みと削除をまとめて行う
    ///
    /// メニューが無い場合や、変更後の日付に別のメニューがある場合は`ConditionFailed`。
    async fn update(
        &self,
        header: &MenuHeader,
        writes: &[ItemWrite],
        deleted_item_ids: &[String],
    ) -> Result<(), RepositoryError>;

    /// 存在しない商品のみを追加し、実際に追加した商品IDを返す
    ///
    /// 同じ商品IDが既に存在する商品（並行書き込みで先に作られたものを含む）は飛ばす。
    async fn insert_items(
        &self,
        header: &MenuHeader,
        items: &[MenuItem],
    ) -> Result<Vec<String>, RepositoryError>;

    /// ヘッダーと全商品を削除する。メニューが存在しなければ`false`
    async fn delete(&self, menu_id: &str) -> Result<bool, RepositoryError>;

    /// 在庫数を加減算し、更新後の在庫数を返す
    ///
    /// 減算で在庫が負になる場合は`ConditionFailed`。
    async fn adjust_stock(
        &self,
        menu_id: &str,
        item_id: &str,
        adjustment: i64,
    ) -> Result<i64, RepositoryError>;
}

/// DynamoDB実装
#[derive(Debug, Clone)]
pub struct DynamoMenuRepository {
    client: DynamoDbClient,
    table_name: String,
}

impl DynamoMenuRepository {
    pub fn new(client: DynamoDbClient, table_name: String) -> Self {
        Self { client, table_name }
    }

    fn header_item(header: &MenuHeader) -> Result<Item, RepositoryError> {
        let mut item = to_keyed_item(header, menu_pk(&header.menu_id), META_SK, MENU_ENTITY)?;
        item.insert(MENU_DATE_ATTR.to_string(), s(&header.date));
        Ok(item)
    }

    fn menu_item(header: &MenuHeader, menu_item: &MenuItem) -> Result<Item, RepositoryError> {
        let mut item = to_keyed_item(
            menu_item,
            menu_pk(&header.menu_id),
            item_sk(&menu_item.item_id),
            MENU_ITEM_ENTITY,
        )?;
        item.insert(MENU_DATE_ATTR.to_string(), s(&header.date));
        Ok(item)
    }

    /// 日付の予約行（予約中のメニューIDを持つ）
    fn date_guard_item(header: &MenuHeader) -> Item {
        let mut item = key(date_guard_pk(&header.date), META_SK);
        item.insert(ENTITY_TYPE.to_string(), s(MENU_DATE_ENTITY));
        item.insert(MENU_ID_ATTR.to_string(), s(&header.menu_id));
        item
    }

    /// 日付の予約を取得する書き込み（既に予約済みなら失敗）
    fn reserve_date(&self, header: &MenuHeader) -> Result<TransactWriteItem, RepositoryError> {
        transact_put(
            &self.table_name,
            Self::date_guard_item(header),
            Some("attribute_not_exists(PK)"),
        )
    }

    /// 日付の予約を解放する書き込み（別のメニューの予約には触れない）
    fn release_date(&self, date: &str, menu_id: &str) -> Result<TransactWriteItem, RepositoryError> {
        transact_delete_if(
            &self.table_name,
            key(date_guard_pk(date), META_SK),
            "attribute_not_exists(PK) OR menuId = :menuId",
            Item::from([(":menuId".to_string(), s(menu_id))]),
        )
    }

    /// 新規作成の書き込み。ヘッダーと日付の予約は先頭のチャンクに入る
    fn create_writes(&self, menu: &Menu) -> Result<Vec<TransactWriteItem>, RepositoryError> {
        let mut writes = vec![
            transact_put(
                &self.table_name,
                Self::header_item(&menu.header)?,
                Some("attribute_not_exists(PK)"),
            )?,
            self.reserve_date(&menu.header)?,
        ];
        for item in &menu.items {
            writes.push(transact_put(
                &self.table_name,
                Self::menu_item(&menu.header, item)?,
                None,
            )?);
        }
        Ok(writes)
    }

    /// 既存商品の部分更新。在庫数は`set_stock`の場合のみ含める
    fn patch_item(
        &self,
        header: &MenuHeader,
        menu_item: &MenuItem,
        set_stock: bool,
    ) -> Result<TransactWriteItem, RepositoryError> {
        let mut attributes = Self::menu_item(header, menu_item)?;
        attributes.remove(PK);
        attributes.remove(SK);
        if !set_stock {
            attributes.remove(STOCK_ATTR);
        }
        let absent: Vec<&str> = OPTIONAL_ITEM_ATTRS
            .into_iter()
            .filter(|attr| !attributes.contains_key(*attr))
            .collect();

        transact_update(
            &self.table_name,
            key(menu_pk(&header.menu_id), item_sk(&menu_item.item_id)),
            attributes,
            &absent,
            Some("attribute_exists(PK)"),
        )
    }

    /// 保存済みのヘッダーの日付（メニューが無ければNone）
    async fn stored_date(&self, menu_id: &str) -> Result<Option<String>, RepositoryError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(key(menu_pk(menu_id), META_SK)))
            .consistent_read(true)
            .send()
            .await
            .map_err(read_error)?;

        Ok(output
            .item
            .as_ref()
            .and_then(|item| string_attr(item, MENU_DATE_ATTR))
            .map(str::to_string))
    }

    /// パーティションの行をメニューに組み立てる（ヘッダーが無ければNone）
    fn assemble(rows: Vec<Item>) -> Result<Option<Menu>, RepositoryError> {
        let mut header = None;
        let mut items = Vec::new();

        for row in rows {
            match sort_key(&row) {
                Some(META_SK) => header = Some(from_item::<MenuHeader>(row)?),
                Some(sk) if sk.starts_with(ITEM_SK_PREFIX) => items.push(from_item::<MenuItem>(row)?),
                _ => {}
            }
        }

        Ok(header.map(|header| Menu::new(header, items)))
    }
}

#[async_trait]
impl MenuRepository for DynamoMenuRepository {
    async fn find_by_id(&self, menu_id: &str) -> Result<Option<Menu>, RepositoryError> {
        let rows = query_partition(&self.client, &self.table_name, &menu_pk(menu_id), None).await?;
        Self::assemble(rows)
    }

    async fn find_by_date(&self, date: &str) -> Result<Option<Menu>, RepositoryError> {
        let mut exclusive_start_key: Option<Item> = None;
        let menu_id = loop {
            let output = self
                .client
                .query()
                .table_name(&self.table_name)
                .index_name(DATE_INDEX)
                .key_condition_expression("#menuDate = :date")
                .filter_expression("#entityType = :entityType")
                .expression_attribute_names("#menuDate", MENU_DATE_ATTR)
                .expression_attribute_names("#entityType", "entityType")
                .expression_attribute_values(":date", s(date))
                .expression_attribute_values(":entityType", s(MENU_ENTITY))
                .set_exclusive_start_key(exclusive_start_key.take())
                .send()
                .await
                .map_err(read_error)?;

            let found = output
                .items
                .unwrap_or_default()
                .iter()
                .find_map(|row| string_attr(row, "menuId").map(str::to_string));
            if found.is_some() {
                break found;
            }
            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => exclusive_start_key = Some(key),
                _ => break None,
            }
        };

        debug!(date = %date, menu_id = ?menu_id, "日付によるメニュー検索");
        match menu_id {
            // インデックスは結果整合なので本体はテーブルから読み直す
            Some(menu_id) => self.find_by_id(&menu_id).await,
            None => Ok(None),
        }
    }

    async fn find_item(
        &self,
        menu_id: &str,
        item_id: &str,
    ) -> Result<Option<MenuItem>, RepositoryError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(key(menu_pk(menu_id), item_sk(item_id))))
            .consistent_read(true)
            .send()
            .await
            .map_err(read_error)?;

        output.item.map(from_item).transpose()
    }

    async fn list_headers(&self) -> Result<Vec<MenuHeader>, RepositoryError> {
        scan_all(&self.client, &self.table_name, ScanFilter::entity_type(MENU_ENTITY))
            .await?
            .into_iter()
            .map(from_item)
            .collect()
    }

    async fn create(&self, menu: &Menu) -> Result<(), RepositoryError> {
        let writes = self.create_writes(menu)?;

        if let Err(failure) = write_in_chunks_tracked(&self.client, writes).await {
            // 先頭チャンク（ヘッダーと日付の予約）が書けていれば途中までの行を消す
            if failure.written_chunks > 0 {
                warn!(
                    menu_id = %menu.header.menu_id,
                    written_chunks = failure.written_chunks,
                    error = %failure.error,
                    "メニュー作成が途中で失敗したため書き込み済みの行を削除"
                );
                if let Err(cleanup) = self.delete(&menu.header.menu_id).await {
                    error!(menu_id = %menu.header.menu_id, error = %cleanup, "作成途中のメニューの削除に失敗");
                }
            }
            return Err(failure.error);
        }
        info!(
            menu_id = %menu.header.menu_id,
            date = %menu.header.date,
            items = menu.items.len(),
            "メニュー作成完了"
        );
        Ok(())
    }

    async fn update(
        &self,
        header: &MenuHeader,
        item_writes: &[ItemWrite],
        deleted_item_ids: &[String],
    ) -> Result<(), RepositoryError> {
        let stored_date = self
            .stored_date(&header.menu_id)
            .await?
            .ok_or_else(|| RepositoryError::ConditionFailed(header.menu_id.clone()))?;

        let mut writes = vec![transact_put(
            &self.table_name,
            Self::header_item(header)?,
            Some("attribute_exists(PK)"),
        )?];
        if stored_date != header.date {
            writes.push(self.reserve_date(header)?);
            writes.push(self.release_date(&stored_date, &header.menu_id)?);
        }
        for write in item_writes {
            writes.push(match write {
                ItemWrite::Put(item) => {
                    transact_put(&self.table_name, Self::menu_item(header, item)?, None)?
                }
                ItemWrite::Patch { item, set_stock } => self.patch_item(header, item, *set_stock)?,
            });
        }
        for item_id in deleted_item_ids {
            writes.push(transact_delete(
                &self.table_name,
                key(menu_pk(&header.menu_id), item_sk(item_id)),
            )?);
        }

        write_in_chunks(&self.client, writes).await?;
        info!(
            menu_id = %header.menu_id,
            written = item_writes.len(),
            deleted = deleted_item_ids.len(),
            "メニュー更新完了"
        );
        Ok(())
    }

    async fn insert_items(
        &self,
        header: &MenuHeader,
        items: &[MenuItem],
    ) -> Result<Vec<String>, RepositoryError> {
        let mut inserted = Vec::with_capacity(items.len());

        for item in items {
            let result = self
                .client
                .put_item()
                .table_name(&self.table_name)
                .set_item(Some(Self::menu_item(header, item)?))
                .condition_expression("attribute_not_exists(PK)")
                .send()
                .await
                .map_err(write_error);

            match result {
                Ok(_) => inserted.push(item.item_id.clone()),
                Err(RepositoryError::ConditionFailed(_)) => {
                    debug!(menu_id = %header.menu_id, item_id = %item.item_id, "既存の商品のため追加をスキップ");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(inserted)
    }

    async fn delete(&self, menu_id: &str) -> Result<bool, RepositoryError> {
        let rows = query_partition(&self.client, &self.table_name, &menu_pk(menu_id), None).await?;
        if !rows.iter().any(|row| sort_key(row) == Some(META_SK)) {
            return Ok(false);
        }

        let mut writes = Vec::with_capacity(rows.len() + 1);
        for row in &rows {
            if let (Some(pk), Some(sk)) = (string_attr(row, PK), sort_key(row)) {
                writes.push(transact_delete(&self.table_name, key(pk, sk))?);
            }
            if sort_key(row) == Some(META_SK) {
                if let Some(date) = string_attr(row, MENU_DATE_ATTR) {
                    writes.push(self.release_date(date, menu_id)?);
                }
            }
        }

        write_in_chunks(&self.client, writes).await?;
        info!(menu_id = %menu_id, rows = rows.len(), "メニュー削除完了");
        Ok(true)
    }

    async fn adjust_stock(
        &self,
        menu_id: &str,
        item_id: &str,
        adjustment: i64,
    ) -> Result<i64, RepositoryError> {
        let mut request = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .set_key(Some(key(menu_pk(menu_id), item_sk(item_id))))
            .update_expression("SET stockQty = stockQty + :adj")
            .expression_attribute_values(":adj", n(adjustment))
            .return_values(ReturnValue::UpdatedNew);

        request = if adjustment < 0 {
            request
                .condition_expression("attribute_exists(PK) AND stockQty >= :need")
                .expression_attribute_values(":need", n(-adjustment))
        } else {
            request.condition_expression("attribute_exists(PK)")
        };

        let output = request.send().await.map_err(write_error)?;

        let new_qty = output
            .attributes
            .as_ref()
            .and_then(|attrs| attrs.get("stockQty"))
            .and_then(|v| v.as_n().ok())
            .and_then(|raw| raw.parse::<i64>().ok())
            .ok_or_else(|| {
                RepositoryError::SerializationError("stockQty missing from update result".to_string())
            })?;

        info!(menu_id = %menu_id, item_id = %item_id, adjustment, new_qty, "在庫調整完了");
        Ok(new_qty)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::infrastructure::dynamo_support::tests::offline_client;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// テスト用のモックメニューリポジトリ
    ///
    /// 注文のモックと状態を共有し、在庫の減算を一括で検証できるようにする。
    #[derive(Debug, Clone, Default)]
    pub struct MockMenuRepository {
        menus: Arc<Mutex<HashMap<String, Menu>>>,
        next_error: Arc<Mutex<Option<RepositoryError>>>,
        /// 書き込み系操作の回数
        writes: Arc<Mutex<usize>>,
        /// 次の読み取りの直後に反映する他リクエストの書き込み
        interleaved: Arc<Mutex<Option<InterleavedWrite>>>,
    }

    /// 読み取りと書き込みの間に割り込む他リクエストの書き込み
    #[derive(Debug, Clone)]
    pub enum InterleavedWrite {
        /// 注文による在庫の減算
        Sale {
            menu_id: String,
            item_id: String,
            qty: i64,
        },
        /// 同じ日付へのメニュー作成
        Create(Menu),
    }

    impl MockMenuRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_next_error(&self, error: RepositoryError) {
            *self.next_error.lock().unwrap() = Some(error);
        }

        /// テストデータとしてメニューを直接登録する
        pub fn insert_menu(&self, menu: Menu) {
            self.menus
                .lock()
                .unwrap()
                .insert(menu.header.menu_id.clone(), menu);
        }

        pub fn menu(&self, menu_id: &str) -> Option<Menu> {
            self.menus.lock().unwrap().get(menu_id).cloned()
        }

        pub fn stock_of(&self, menu_id: &str, item_id: &str) -> Option<i64> {
            self.menu(menu_id)
                .and_then(|menu| menu.find_item(item_id).map(|item| item.stock_qty))
        }

        pub fn menu_count(&self) -> usize {
            self.menus.lock().unwrap().len()
        }

        pub fn write_count(&self) -> usize {
            *self.writes.lock().unwrap()
        }

        /// 全行の在庫を検証してから一括で減算する
        ///
        /// 条件を満たさない最初の商品IDを返し、その場合は何も変更しない。
        pub fn decrement_all(&self, menu_id: &str, lines: &[(String, u32)]) -> Result<(), String> {
            let mut menus = self.menus.lock().unwrap();
            let Some(menu) = menus.get_mut(menu_id) else {
                return Err(lines.first().map(|(id, _)| id.clone()).unwrap_or_default());
            };

            for (item_id, qty) in lines {
                let ok = menu
                    .find_item(item_id)
                    .is_some_and(|item| item.available && item.stock_qty >= *qty as i64);
                if !ok {
                    return Err(item_id.clone());
                }
            }
            for (item_id, qty) in lines {
                if let Some(item) = menu.items.iter_mut().find(|item| &item.item_id == item_id) {
                    item.stock_qty -= *qty as i64;
                }
            }
            Ok(())
        }

        /// 次の`find_by_id`/`find_by_date`が結果を返した直後に書き込みを反映する
        pub fn interleave_after_next_read(&self, write: InterleavedWrite) {
            *self.interleaved.lock().unwrap() = Some(write);
        }

        fn apply_interleaved(&self) {
            let Some(write) = self.interleaved.lock().unwrap().take() else {
                return;
            };
            let mut menus = self.menus.lock().unwrap();
            match write {
                InterleavedWrite::Sale {
                    menu_id,
                    item_id,
                    qty,
                } => {
                    if let Some(item) = menus
                        .get_mut(&menu_id)
                        .and_then(|menu| menu.items.iter_mut().find(|item| item.item_id == item_id))
                    {
                        item.stock_qty -= qty;
                    }
                }
                InterleavedWrite::Create(menu) => {
                    menus.insert(menu.header.menu_id.clone(), menu);
                }
            }
        }

        fn date_taken(menus: &HashMap<String, Menu>, header: &MenuHeader) -> bool {
            menus
                .values()
                .any(|menu| menu.header.date == header.date && menu.header.menu_id != header.menu_id)
        }

        fn take_error(&self) -> Option<RepositoryError> {
            self.next_error.lock().unwrap().take()
        }

        fn record_write(&self) {
            *self.writes.lock().unwrap() += 1;
        }
    }

    #[async_trait]
    impl MenuRepository for MockMenuRepository {
        async fn find_by_id(&self, menu_id: &str) -> Result<Option<Menu>, RepositoryError> {
            if let Some(error) = self.take_error() {
                return Err(error);
            }
            let found = self.menu(menu_id);
            self.apply_interleaved();
            Ok(found)
        }

        async fn find_by_date(&self, date: &str) -> Result<Option<Menu>, RepositoryError> {
            if let Some(error) = self.take_error() {
                return Err(error);
            }
            let found = self
                .menus
                .lock()
                .unwrap()
                .values()
                .find(|menu| menu.header.date == date)
                .cloned();
            self.apply_interleaved();
            Ok(found)
        }

        async fn find_item(
            &self,
            menu_id: &str,
            item_id: &str,
        ) -> Result<Option<MenuItem>, RepositoryError> {
            if let Some(error) = self.take_error() {
                return Err(error);
            }
            Ok(self
                .menu(menu_id)
                .and_then(|menu| menu.find_item(item_id).cloned()))
        }

        async fn list_headers(&self) -> Result<Vec<MenuHeader>, RepositoryError> {
            if let Some(error) = self.take_error() {
                return Err(error);
            }
            Ok(self
                .menus
                .lock()
                .unwrap()
                .values()
                .map(|menu| menu.header.clone())
                .collect())
        }

        async fn create(&self, menu: &Menu) -> Result<(), RepositoryError> {
            if let Some(error) = self.take_error() {
                return Err(error);
            }
            let mut menus = self.menus.lock().unwrap();
            if menus.contains_key(&menu.header.menu_id) || Self::date_taken(&menus, &menu.header) {
                return Err(RepositoryError::ConditionFailed(menu.header.menu_id.clone()));
            }
            menus.insert(menu.header.menu_id.clone(), menu.clone());
            drop(menus);
            self.record_write();
            Ok(())
        }

        async fn update(
            &self,
            header: &MenuHeader,
            writes: &[ItemWrite],
            deleted_item_ids: &[String],
        ) -> Result<(), RepositoryError> {
            if let Some(error) = self.take_error() {
                return Err(error);
            }
            let mut menus = self.menus.lock().unwrap();
            if Self::date_taken(&menus, header) {
                return Err(RepositoryError::ConditionFailed(header.date.clone()));
            }
            let Some(existing) = menus.get(&header.menu_id) else {
                return Err(RepositoryError::ConditionFailed(header.menu_id.clone()));
            };

            let mut items: Vec<MenuItem> = existing
                .items
                .iter()
                .filter(|item| {
                    !deleted_item_ids.contains(&item.item_id)
                        && !writes.iter().any(|w| w.item().item_id == item.item_id)
                })
                .cloned()
                .collect();
            for write in writes {
                match write {
                    ItemWrite::Put(item) => items.push(item.clone()),
                    ItemWrite::Patch { item, set_stock } => {
                        let stored = existing
                            .find_item(&item.item_id)
                            .ok_or_else(|| RepositoryError::ConditionFailed(item.item_id.clone()))?;
                        let mut patched = item.clone();
                        if !set_stock {
                            patched.stock_qty = stored.stock_qty;
                        }
                        items.push(patched);
                    }
                }
            }
            menus.insert(header.menu_id.clone(), Menu::new(header.clone(), items));
            drop(menus);
            self.record_write();
            Ok(())
        }

        async fn insert_items(
            &self,
            header: &MenuHeader,
            items: &[MenuItem],
        ) -> Result<Vec<String>, RepositoryError> {
            if let Some(error) = self.take_error() {
                return Err(error);
            }
            let mut menus = self.menus.lock().unwrap();
            let menu = menus
                .entry(header.menu_id.clone())
                .or_insert_with(|| Menu::new(header.clone(), Vec::new()));

            let mut inserted = Vec::new();
            for item in items {
                if menu.find_item(&item.item_id).is_none() {
                    menu.items.push(item.clone());
                    inserted.push(item.item_id.clone());
                }
            }
            let sorted = Menu::new(menu.header.clone(), std::mem::take(&mut menu.items));
            *menu = sorted;
            drop(menus);
            if !inserted.is_empty() {
                self.record_write();
            }
            Ok(inserted)
        }

        async fn delete(&self, menu_id: &str) -> Result<bool, RepositoryError> {
            if let Some(error) = self.take_error() {
                return Err(error);
            }
            let removed = self.menus.lock().unwrap().remove(menu_id).is_some();
            if removed {
                self.record_write();
            }
            Ok(removed)
        }

        async fn adjust_stock(
            &self,
            menu_id: &str,
            item_id: &str,
            adjustment: i64,
        ) -> Result<i64, RepositoryError> {
            if let Some(error) = self.take_error() {
                return Err(error);
            }
            let mut menus = self.menus.lock().unwrap();
            let item = menus
                .get_mut(menu_id)
                .and_then(|menu| menu.items.iter_mut().find(|item| item.item_id == item_id))
                .ok_or_else(|| RepositoryError::ConditionFailed(item_id.to_string()))?;

            if item.stock_qty + adjustment < 0 {
                return Err(RepositoryError::ConditionFailed(item_id.to_string()));
            }
            item.stock_qty += adjustment;
            let new_qty = item.stock_qty;
            drop(menus);
            self.record_write();
            Ok(new_qty)
        }
    }

    pub fn sample_header(menu_id: &str, date: &str) -> MenuHeader {
        MenuHeader {
            menu_id: menu_id.to_string(),
            date: date.to_string(),
            title: format!("Menu for {}", date),
            is_active: true,
            image_url: None,
            last_updated: None,
        }
    }

    pub fn sample_item(menu_id: &str, item_id: &str, name: &str, price: f64, stock_qty: i64) -> MenuItem {
        MenuItem {
            item_id: item_id.to_string(),
            menu_id: menu_id.to_string(),
            name: name.to_string(),
            price,
            stock_qty,
            is_special: false,
            available: true,
            description: None,
            image_url: None,
            category: None,
            spice_level: None,
        }
    }

    pub fn sample_menu(menu_id: &str, date: &str) -> Menu {
        Menu::new(
            sample_header(menu_id, date),
            vec![
                sample_item(menu_id, "itm-jerk", "Jerk Chicken", 15.99, 10),
                sample_item(menu_id, "itm-plantain", "Fried Plantain", 8.50, 5),
            ],
        )
    }

    #[test]
    fn test_key_helpers() {
        assert_eq!(menu_pk("m1"), "MENU#m1");
        assert_eq!(item_sk("i1"), "ITEM#i1");
    }

    #[test]
    fn test_rows_carry_menu_date_and_entity_type() {
        let header = sample_header("m1", "2025-03-01");
        let row = DynamoMenuRepository::header_item(&header).unwrap();
        assert_eq!(string_attr(&row, MENU_DATE_ATTR), Some("2025-03-01"));
        assert_eq!(string_attr(&row, "entityType"), Some(MENU_ENTITY));
        assert_eq!(sort_key(&row), Some("META"));

        let item = DynamoMenuRepository::menu_item(&header, &sample_item("m1", "i1", "Rice", 3.0, 1))
            .unwrap();
        assert_eq!(string_attr(&item, PK), Some("MENU#m1"));
        assert_eq!(sort_key(&item), Some("ITEM#i1"));
        assert_eq!(string_attr(&item, MENU_DATE_ATTR), Some("2025-03-01"));
    }

    #[test]
    fn test_assemble_partition() {
        let menu = sample_menu("m1", "2025-03-01");
        let mut rows = vec![DynamoMenuRepository::header_item(&menu.header).unwrap()];
        for item in &menu.items {
            rows.push(DynamoMenuRepository::menu_item(&menu.header, item).unwrap());
        }

        let assembled = DynamoMenuRepository::assemble(rows).unwrap().unwrap();
        assert_eq!(assembled, menu);
    }

    fn test_repository() -> DynamoMenuRepository {
        DynamoMenuRepository::new(offline_client(), "test-table".to_string())
    }

    #[test]
    fn test_create_reserves_date_in_first_chunk() {
        let repo = test_repository();
        let menu = sample_menu("m1", "2025-03-01");

        let writes = repo.create_writes(&menu).unwrap();

        assert_eq!(writes.len(), 2 + menu.items.len());
        let guard = writes[1].put().unwrap();
        assert_eq!(string_attr(guard.item(), PK), Some("MENUDATE#2025-03-01"));
        assert_eq!(string_attr(guard.item(), MENU_ID_ATTR), Some("m1"));
        assert_eq!(string_attr(guard.item(), ENTITY_TYPE), Some(MENU_DATE_ENTITY));
        assert!(guard.item().get(MENU_DATE_ATTR).is_none());
        assert_eq!(guard.condition_expression(), Some("attribute_not_exists(PK)"));
    }

    #[test]
    fn test_patch_item_leaves_stock_untouched() {
        let repo = test_repository();
        let header = sample_header("m1", "2025-03-01");
        let item = sample_item("m1", "itm-jerk", "Jerk Chicken", 16.5, 3);

        let write = repo.patch_item(&header, &item, false).unwrap();
        let update = write.update().unwrap();
        let names: Vec<&str> = update
            .expression_attribute_names()
            .map(|names| names.values().map(String::as_str).collect())
            .unwrap_or_default();

        assert!(names.contains(&"price"));
        assert!(names.contains(&"description"));
        assert!(!names.contains(&STOCK_ATTR));
        assert!(!names.contains(&PK));
        assert!(update.update_expression().contains("REMOVE"));
        assert_eq!(update.condition_expression(), Some("attribute_exists(PK)"));

        let write = repo.patch_item(&header, &item, true).unwrap();
        let names = write.update().unwrap().expression_attribute_names().cloned().unwrap_or_default();
        assert!(names.values().any(|name| name == STOCK_ATTR));
    }

    #[tokio::test]
    async fn test_mock_patch_keeps_stock_sold_after_read() {
        let repo = MockMenuRepository::new();
        repo.insert_menu(sample_menu("m1", "2025-03-01"));
        repo.interleave_after_next_read(InterleavedWrite::Sale {
            menu_id: "m1".to_string(),
            item_id: "itm-jerk".to_string(),
            qty: 4,
        });

        let menu = repo.find_by_id("m1").await.unwrap().unwrap();
        let mut item = menu.find_item("itm-jerk").unwrap().clone();
        item.price = 16.5;
        repo.update(
            &menu.header,
            &[ItemWrite::Patch { item, set_stock: false }],
            &[],
        )
        .await
        .unwrap();

        assert_eq!(repo.stock_of("m1", "itm-jerk"), Some(6));
        let stored = repo.menu("m1").unwrap();
        assert_eq!(stored.find_item("itm-jerk").unwrap().price, 16.5);
    }

    #[tokio::test]
    async fn test_mock_patch_of_missing_item_fails() {
        let repo = MockMenuRepository::new();
        repo.insert_menu(sample_menu("m1", "2025-03-01"));
        let ghost = sample_item("m1", "itm-ghost", "Ghost", 1.0, 1);

        let result = repo
            .update(
                &sample_header("m1", "2025-03-01"),
                &[ItemWrite::Patch { item: ghost, set_stock: true }],
                &[],
            )
            .await;

        assert!(matches!(result, Err(RepositoryError::ConditionFailed(_))));
        assert!(repo.menu("m1").unwrap().find_item("itm-ghost").is_none());
    }

    #[tokio::test]
    async fn test_mock_enforces_one_menu_per_date() {
        let repo = MockMenuRepository::new();
        repo.insert_menu(sample_menu("m1", "2025-03-01"));
        repo.insert_menu(sample_menu("m2", "2025-03-02"));

        let duplicate = Menu::new(sample_header("m3", "2025-03-01"), Vec::new());
        assert!(matches!(
            repo.create(&duplicate).await,
            Err(RepositoryError::ConditionFailed(_))
        ));
        assert!(matches!(
            repo.update(&sample_header("m2", "2025-03-01"), &[], &[]).await,
            Err(RepositoryError::ConditionFailed(_))
        ));
        assert_eq!(repo.menu("m2").unwrap().header.date, "2025-03-02");
    }

    #[test]
    fn test_assemble_without_header_is_none() {
        let header = sample_header("m1", "2025-03-01");
        let rows = vec![
            DynamoMenuRepository::menu_item(&header, &sample_item("m1", "i1", "Rice", 3.0, 1)).unwrap(),
        ];
        assert!(DynamoMenuRepository::assemble(rows).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mock_decrement_all_is_all_or_nothing() {
        let repo = MockMenuRepository::new();
        repo.insert_menu(sample_menu("m1", "2025-03-01"));

        let result = repo.decrement_all(
            "m1",
            &[("itm-jerk".to_string(), 2), ("itm-plantain".to_string(), 6)],
        );

        assert_eq!(result, Err("itm-plantain".to_string()));
        assert_eq!(repo.stock_of("m1", "itm-jerk"), Some(10));
        assert_eq!(repo.stock_of("m1", "itm-plantain"), Some(5));
    }

    #[tokio::test]
    async fn test_mock_adjust_stock_rejects_negative_result() {
        let repo = MockMenuRepository::new();
        repo.insert_menu(sample_menu("m1", "2025-03-01"));

        assert_eq!(repo.adjust_stock("m1", "itm-plantain", -5).await.unwrap(), 0);
        assert!(matches!(
            repo.adjust_stock("m1", "itm-plantain", -1).await,
            Err(RepositoryError::ConditionFailed(_))
        ));
        assert_eq!(repo.stock_of("m1", "itm-plantain"), Some(0));
    }

    #[tokio::test]
    async fn test_mock_insert_items_skips_existing_ids() {
        let repo = MockMenuRepository::new();
        repo.insert_menu(sample_menu("m1", "2025-03-01"));
        let header = sample_header("m1", "2025-03-01");

        let inserted = repo
            .insert_items(
                &header,
                &[
                    sample_item("m1", "itm-jerk", "Jerk Chicken", 15.99, 1),
                    sample_item("m1", "itm-rice", "Rice and Peas", 4.0, 1),
                ],
            )
            .await
            .unwrap();

        assert_eq!(inserted, vec!["itm-rice".to_string()]);
        assert_eq!(repo.menu("m1").unwrap().items.len(), 3);
    }
}
