//! 管理者向けのメニュー管理
//!
//! 一覧・取得・作成・更新・削除と、商品の一括取り込みを扱う。

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use super::api::{required_field, ApiError, ApiRequest, ApiResponse};
use super::auth::require_admin;
use super::clock::{new_id, now_rfc3339};
use crate::domain::validation::is_valid_date;
use crate::domain::{ItemSpec, Menu, MenuHeader, MenuItem, PageRequest};
use crate::infrastructure::{ItemWrite, MenuRepository, RepositoryError};

/// 更新時に商品の削除を指示する`_op`の値
const DELETE_OP: &str = "delete";

/// 一覧の1件
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuSummary {
    pub menu_id: String,
    pub date: String,
    pub title: String,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl From<MenuHeader> for MenuSummary {
    fn from(header: MenuHeader) -> Self {
        Self {
            menu_id: header.menu_id,
            date: header.date,
            title: header.title,
            is_active: header.is_active,
            image_url: header.image_url,
        }
    }
}

pub struct AdminMenuHandler<R>
where
    R: MenuRepository,
{
    repo: R,
}

impl<R> AdminMenuHandler<R>
where
    R: MenuRepository,
{
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub async fn list(&self, event: &Value) -> ApiResponse {
        ApiResponse::respond("admin_menu_list", self.process_list(event).await)
    }

    pub async fn get(&self, event: &Value) -> ApiResponse {
        ApiResponse::respond("admin_menu_get", self.process_get(event).await)
    }

    pub async fn create(&self, event: &Value) -> ApiResponse {
        ApiResponse::respond("admin_menu_create", self.process_create(event).await)
    }

    pub async fn update(&self, event: &Value) -> ApiResponse {
        ApiResponse::respond("admin_menu_update", self.process_update(event).await)
    }

    pub async fn delete(&self, event: &Value) -> ApiResponse {
        ApiResponse::respond("admin_menu_delete", self.process_delete(event).await)
    }

    pub async fn import(&self, event: &Value) -> ApiResponse {
        ApiResponse::respond("admin_menu_import", self.process_import(event).await)
    }

    async fn process_list(&self, event: &Value) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest::from_event(event)?;
        require_admin(&request)?;
        let page = PageRequest::parse(request.query_param("page"), request.query_param("limit"))?;

        let mut headers = self.repo.list_headers().await?;
        headers.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.menu_id.cmp(&b.menu_id)));
        let summaries: Vec<MenuSummary> = headers.into_iter().map(MenuSummary::from).collect();

        Ok(ApiResponse::ok(&page.slice(summaries)))
    }

    async fn process_get(&self, event: &Value) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest::from_event(event)?;
        require_admin(&request)?;
        let menu_id = menu_id_param(&request)?;

        let menu = self.load(menu_id).await?;
        Ok(ApiResponse::ok(&menu.to_json()))
    }

    async fn process_create(&self, event: &Value) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest::from_event(event)?;
        require_admin(&request)?;
        let body = request.json_object()?;

        let date = required_field(&body, "date")?;
        if !is_valid_date(date) {
            return Err(ApiError::validation("date must be YYYY-MM-DD"));
        }
        let title = required_field(&body, "title")?;
        let is_active = optional_bool(&body, "isActive")?.unwrap_or(true);
        let image_url = optional_text(&body, "imageUrl")?;

        let raw_items: &[Value] = match body.get("items") {
            None | Some(Value::Null) => &[],
            Some(Value::Array(items)) => items,
            Some(_) => return Err(ApiError::validation("items must be an array")),
        };

        let menu_id = new_id();
        let mut items = Vec::with_capacity(raw_items.len());
        for raw in raw_items {
            let spec = ItemSpec::from_json(raw, new_id)?;
            if items.iter().any(|i: &MenuItem| i.item_id == spec.item_id) {
                return Err(ApiError::validation(format!(
                    "Duplicate itemId {}",
                    spec.item_id
                )));
            }
            items.push(MenuItem::from_spec(&menu_id, spec));
        }

        if self.repo.find_by_date(date).await?.is_some() {
            return Err(ApiError::validation(format!(
                "A menu already exists for {}",
                date
            )));
        }

        let header = MenuHeader {
            menu_id: menu_id.clone(),
            date: date.to_string(),
            title: title.to_string(),
            is_active,
            image_url,
            last_updated: Some(now_rfc3339()),
        };
        let item_ids: Vec<String> = items.iter().map(|i| i.item_id.clone()).collect();
        let menu = Menu::new(header, items);

        self.repo.create(&menu).await.map_err(|e| match e {
            RepositoryError::ConditionFailed(_) => {
                ApiError::validation(format!("A menu already exists for {}", date))
            }
            other => other.into(),
        })?;

        info!(menu_id = %menu_id, date = %date, items = item_ids.len(), "メニュー作成");
        Ok(ApiResponse::created(&json!({
            "menuId": menu_id,
            "date": date,
            "status": "CREATED",
            "itemIds": item_ids,
        })))
    }

    async fn process_update(&self, event: &Value) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest::from_event(event)?;
        require_admin(&request)?;
        let menu_id = menu_id_param(&request)?.to_string();
        let body = request.json_object()?;

        let existing = self.load(&menu_id).await?;
        let header = self.merged_header(&existing.header, &body).await?;

        let raw_items: &[Value] = match body.get("items") {
            None | Some(Value::Null) => &[],
            Some(Value::Array(items)) => items,
            Some(_) => return Err(ApiError::validation("items must be an array")),
        };
        let replace_items = optional_bool(&body, "replaceItems")?.unwrap_or(false);

        let mut upserts: Vec<ItemWrite> = Vec::new();
        let mut deleted: Vec<String> = Vec::new();
        for raw in raw_items {
            let fields = raw
                .as_object()
                .ok_or_else(|| ApiError::validation("items must contain objects"))?;
            let item_id = fields.get("itemId").and_then(Value::as_str).map(str::trim);

            if fields.get("_op").and_then(Value::as_str) == Some(DELETE_OP) {
                let item_id = item_id
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| ApiError::validation("itemId is required for delete"))?;
                if existing.find_item(item_id).is_some() && !deleted.iter().any(|d| d == item_id)
                {
                    deleted.push(item_id.to_string());
                }
                continue;
            }

            let write = match item_id.and_then(|id| existing.find_item(id)) {
                Some(current) => item_patch(&menu_id, current, fields)?,
                None => ItemWrite::Put(MenuItem::from_spec(&menu_id, ItemSpec::from_json(raw, new_id)?)),
            };
            upserts.retain(|u| u.item().item_id != write.item().item_id);
            upserts.push(write);
        }

        if replace_items {
            for item in &existing.items {
                let mentioned = upserts.iter().any(|u| u.item().item_id == item.item_id)
                    || deleted.contains(&item.item_id);
                if !mentioned {
                    deleted.push(item.item_id.clone());
                }
            }
        }
        upserts.retain(|u| !deleted.contains(&u.item().item_id));

        let date_changed = header.date != existing.header.date;
        self.repo
            .update(&header, &upserts, &deleted)
            .await
            .map_err(|e| update_error(e, &menu_id, date_changed.then_some(&header.date)))?;

        let item_ids: Vec<String> = upserts.iter().map(|u| u.item().item_id.clone()).collect();
        info!(
            menu_id = %menu_id,
            upserted = item_ids.len(),
            deleted = deleted.len(),
            "メニュー更新"
        );
        Ok(ApiResponse::ok(&json!({
            "menuId": menu_id,
            "status": "UPDATED",
            "upsertedCount": item_ids.len(),
            "deletedCount": deleted.len(),
            "itemIds": item_ids,
            "deletedItemIds": deleted,
        })))
    }

    async fn process_delete(&self, event: &Value) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest::from_event(event)?;
        require_admin(&request)?;
        let menu_id = menu_id_param(&request)?;

        if !self.repo.delete(menu_id).await? {
            return Err(ApiError::not_found(format!("Menu {} not found", menu_id)));
        }
        info!(menu_id = %menu_id, "メニュー削除");
        Ok(ApiResponse::ok(&json!({"menuId": menu_id, "status": "DELETED"})))
    }

    async fn process_import(&self, event: &Value) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest::from_event(event)?;
        require_admin(&request)?;
        let menu_id = menu_id_param(&request)?.to_string();

        let rows = match request.json_body::<Value>()? {
            Value::Array(rows) => rows,
            Value::Object(mut object) => match object.remove("items") {
                Some(Value::Array(rows)) => rows,
                _ => return Err(ApiError::validation("items must be an array")),
            },
            _ => return Err(ApiError::validation("Body must be an array of items")),
        };

        let existing = self.load(&menu_id).await?;

        let mut items: Vec<ItemWrite> = Vec::new();
        let mut skipped = 0usize;
        for (index, row) in rows.iter().enumerate() {
            let current = row
                .get("itemId")
                .and_then(Value::as_str)
                .and_then(|id| existing.find_item(id));
            let write = match (current, row.as_object()) {
                (Some(current), Some(fields)) => item_patch(&menu_id, current, fields),
                _ => ItemSpec::from_json(row, new_id)
                    .map(|spec| ItemWrite::Put(MenuItem::from_spec(&menu_id, spec)))
                    .map_err(ApiError::from),
            };
            match write {
                Ok(write) => {
                    items.retain(|i| i.item().item_id != write.item().item_id);
                    items.push(write);
                }
                Err(e) => {
                    warn!(menu_id = %menu_id, row = index, error = %e, "取り込めない行をスキップ");
                    skipped += 1;
                }
            }
        }

        if items.is_empty() {
            return Err(ApiError::validation("No valid items to import"));
        }

        let mut header = existing.header.clone();
        header.last_updated = Some(now_rfc3339());
        self.repo
            .update(&header, &items, &[])
            .await
            .map_err(|e| update_error(e, &menu_id, None))?;

        let item_ids: Vec<String> = items.iter().map(|i| i.item().item_id.clone()).collect();
        info!(menu_id = %menu_id, imported = item_ids.len(), skipped, "商品取り込み");
        Ok(ApiResponse::ok(&json!({
            "menuId": menu_id,
            "status": "IMPORTED",
            "importedCount": item_ids.len(),
            "skippedCount": skipped,
            "itemIds": item_ids,
        })))
    }

    async fn load(&self, menu_id: &str) -> Result<Menu, ApiError> {
        self.repo
            .find_by_id(menu_id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Menu {} not found", menu_id)))
    }

    /// ヘッダー項目を上書きし、lastUpdatedを現在時刻にする
    async fn merged_header(
        &self,
        current: &MenuHeader,
        body: &Map<String, Value>,
    ) -> Result<MenuHeader, ApiError> {
        let mut header = current.clone();

        if let Some(date) = optional_text(body, "date")? {
            if !is_valid_date(&date) {
                return Err(ApiError::validation("date must be YYYY-MM-DD"));
            }
            if date != current.date {
                if let Some(other) = self.repo.find_by_date(&date).await? {
                    if other.header.menu_id != current.menu_id {
                        return Err(ApiError::validation(format!(
                            "A menu already exists for {}",
                            date
                        )));
                    }
                }
            }
            header.date = date;
        }
        if let Some(title) = optional_text(body, "title")? {
            header.title = title;
        }
        if let Some(is_active) = optional_bool(body, "isActive")? {
            header.is_active = is_active;
        }
        if body.contains_key("imageUrl") {
            header.image_url = optional_text(body, "imageUrl")?;
        }
        header.last_updated = Some(now_rfc3339());
        Ok(header)
    }
}

/// 更新時の条件違反。日付を変えた場合は日付の重複、それ以外はメニューの消失
fn update_error(error: RepositoryError, menu_id: &str, new_date: Option<&String>) -> ApiError {
    match (error, new_date) {
        (RepositoryError::ConditionFailed(_), Some(date)) => {
            ApiError::validation(format!("A menu already exists for {}", date))
        }
        (RepositoryError::ConditionFailed(_), None) => {
            ApiError::not_found(format!("Menu {} not found", menu_id))
        }
        (other, _) => other.into(),
    }
}

/// 既存商品への部分更新。在庫数はリクエストに`stockQty`がある場合のみ書き込む
fn item_patch(menu_id: &str, current: &MenuItem, fields: &Map<String, Value>) -> Result<ItemWrite, ApiError> {
    let spec = current.to_spec().patched(fields)?;
    Ok(ItemWrite::Patch {
        item: MenuItem::from_spec(menu_id, spec),
        set_stock: fields.contains_key("stockQty"),
    })
}

fn menu_id_param(request: &ApiRequest) -> Result<&str, ApiError> {
    request
        .path_param("menuId")
        .ok_or_else(|| ApiError::validation("menuId is required"))
}

fn optional_text(body: &Map<String, Value>, field: &str) -> Result<Option<String>, ApiError> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(_) => Err(ApiError::validation(format!("{} must be a string", field))),
    }
}

fn optional_bool(body: &Map<String, Value>, field: &str) -> Result<Option<bool>, ApiError> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(ApiError::validation(format!("{} must be a boolean", field))),
    }
}
