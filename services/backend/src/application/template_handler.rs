//! メニューテンプレートの管理と、テンプレートからメニューへの適用

use serde_json::{json, Map, Value};
use tracing::info;

use super::api::{required_field, ApiError, ApiRequest, ApiResponse};
use super::auth::require_admin;
use super::clock::{new_id, now_rfc3339};
use crate::domain::validation::is_valid_date;
use crate::domain::{merge_template_items, ItemSpec, Menu, MenuHeader, MenuTemplate};
use crate::infrastructure::{MenuRepository, RepositoryError, TemplateRepository};

pub struct TemplateHandler<T, M>
where
    T: TemplateRepository,
    M: MenuRepository,
{
    templates: T,
    menus: M,
}

impl<T, M> TemplateHandler<T, M>
where
    T: TemplateRepository,
    M: MenuRepository,
{
    pub fn new(templates: T, menus: M) -> Self {
        Self { templates, menus }
    }

    pub async fn create(&self, event: &Value) -> ApiResponse {
        ApiResponse::respond("template_create", self.process_create(event).await)
    }

    pub async fn get(&self, event: &Value) -> ApiResponse {
        ApiResponse::respond("template_get", self.process_get(event).await)
    }

    pub async fn list(&self, event: &Value) -> ApiResponse {
        ApiResponse::respond("template_list", self.process_list(event).await)
    }

    pub async fn update(&self, event: &Value) -> ApiResponse {
        ApiResponse::respond("template_update", self.process_update(event).await)
    }

    pub async fn delete(&self, event: &Value) -> ApiResponse {
        ApiResponse::respond("template_delete", self.process_delete(event).await)
    }

    pub async fn apply(&self, event: &Value) -> ApiResponse {
        ApiResponse::respond("template_apply", self.process_apply(event).await)
    }

    async fn process_create(&self, event: &Value) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest::from_event(event)?;
        require_admin(&request)?;
        let body = request.json_object()?;

        let name = required_field(&body, "name")?;
        let items = parse_items(&body)?.ok_or_else(|| ApiError::validation("items is required"))?;
        let tags = parse_tags(&body)?.unwrap_or_default();

        let template = MenuTemplate {
            template_id: new_id(),
            name: name.to_string(),
            items,
            tags,
            created_at: now_rfc3339(),
            updated_at: None,
        };
        self.templates.create(&template).await?;

        info!(template_id = %template.template_id, items = template.items.len(), "テンプレート作成");
        Ok(ApiResponse::created(&json!({
            "templateId": template.template_id,
            "status": "CREATED",
        })))
    }

    async fn process_get(&self, event: &Value) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest::from_event(event)?;
        require_admin(&request)?;
        let template_id = template_id_param(&request)?;

        let template = self.load(template_id).await?;
        Ok(ApiResponse::ok(&template))
    }

    async fn process_list(&self, event: &Value) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest::from_event(event)?;
        require_admin(&request)?;

        let mut headers = self.templates.list().await?;
        headers.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.template_id.cmp(&b.template_id))
        });
        Ok(ApiResponse::ok(&headers))
    }

    async fn process_update(&self, event: &Value) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest::from_event(event)?;
        require_admin(&request)?;
        let template_id = template_id_param(&request)?.to_string();
        let body = request.json_object()?;

        let name = match body.get("name") {
            None | Some(Value::Null) => None,
            Some(_) => Some(required_field(&body, "name")?.to_string()),
        };
        let items = parse_items(&body)?;
        let tags = parse_tags(&body)?;
        if name.is_none() && items.is_none() && tags.is_none() {
            return Err(ApiError::validation("No fields to update"));
        }

        let mut template = self.load(&template_id).await?;
        let mut removed = Vec::new();
        if let Some(name) = name {
            template.name = name;
        }
        if let Some(tags) = tags {
            template.tags = tags;
        }
        if let Some(items) = items {
            removed = template
                .items
                .iter()
                .filter(|old| !items.iter().any(|new| new.item_id == old.item_id))
                .map(|old| old.item_id.clone())
                .collect();
            template.items = items;
        }
        template.updated_at = Some(now_rfc3339());

        self.templates
            .replace(&template, &removed)
            .await
            .map_err(|e| match e {
                RepositoryError::ConditionFailed(_) => {
                    ApiError::not_found(format!("Template {} not found", template_id))
                }
                other => other.into(),
            })?;

        info!(template_id = %template_id, removed = removed.len(), "テンプレート更新");
        Ok(ApiResponse::ok(&json!({
            "templateId": template_id,
            "status": "UPDATED",
        })))
    }

    async fn process_delete(&self, event: &Value) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest::from_event(event)?;
        require_admin(&request)?;
        let template_id = template_id_param(&request)?;

        if !self.templates.delete(template_id).await? {
            return Err(ApiError::not_found(format!(
                "Template {} not found",
                template_id
            )));
        }
        info!(template_id = %template_id, "テンプレート削除");
        Ok(ApiResponse::ok(&json!({
            "templateId": template_id,
            "status": "DELETED",
        })))
    }

    /// 既存メニュー（無ければ新規作成）にテンプレートの商品を追加する
    ///
    /// 同じテンプレートを再適用しても追加は0件になり、何も書き込まない。
    async fn process_apply(&self, event: &Value) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest::from_event(event)?;
        require_admin(&request)?;
        let body = request.json_object()?;

        let template_id = required_field(&body, "templateId")?;
        let date = required_field(&body, "date")?;
        if !is_valid_date(date) {
            return Err(ApiError::validation("date must be YYYY-MM-DD"));
        }

        let template = self.load(template_id).await?;
        let menu = match self.menus.find_by_date(date).await? {
            Some(menu) => menu,
            None => self.create_or_find_menu(date).await?,
        };

        let plan = merge_template_items(&menu.header.menu_id, &menu.items, &template.items);
        let added = if plan.to_add.is_empty() {
            Vec::new()
        } else {
            self.menus.insert_items(&menu.header, &plan.to_add).await?
        };
        let items_skipped = template.items.len() - added.len();

        info!(
            template_id = %template_id,
            menu_id = %menu.header.menu_id,
            date = %date,
            added = added.len(),
            skipped = items_skipped,
            "テンプレート適用"
        );
        Ok(ApiResponse::ok(&json!({
            "menuId": menu.header.menu_id,
            "date": date,
            "status": "APPLIED",
            "itemsAdded": added.len(),
            "itemsSkipped": items_skipped,
            "addedItemIds": added,
        })))
    }

    /// 空のメニューを作成する。同じ日付のメニューを先に作られていればそれを使う
    async fn create_or_find_menu(&self, date: &str) -> Result<Menu, ApiError> {
        match self.create_empty_menu(date).await {
            Err(RepositoryError::ConditionFailed(_)) => {
                info!(date = %date, "同じ日付のメニューが先に作成されたため既存のメニューに適用");
                self.menus.find_by_date(date).await?.ok_or_else(|| {
                    ApiError::Internal(format!("Menu for {} is reserved but not readable", date))
                })
            }
            result => Ok(result?),
        }
    }

    async fn create_empty_menu(&self, date: &str) -> Result<Menu, RepositoryError> {
        let header = MenuHeader {
            menu_id: new_id(),
            date: date.to_string(),
            title: format!("Menu for {}", date),
            is_active: true,
            image_url: None,
            last_updated: Some(now_rfc3339()),
        };
        let menu = Menu::new(header, Vec::new());
        self.menus.create(&menu).await?;
        info!(menu_id = %menu.header.menu_id, date = %date, "適用先のメニューを作成");
        Ok(menu)
    }

    async fn load(&self, template_id: &str) -> Result<MenuTemplate, ApiError> {
        self.templates
            .get(template_id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Template {} not found", template_id)))
    }
}

fn template_id_param(request: &ApiRequest) -> Result<&str, ApiError> {
    request
        .path_param("templateId")
        .ok_or_else(|| ApiError::validation("templateId is required"))
}

/// `items`（指定時は空でない配列で、全商品が有効であること）
fn parse_items(body: &Map<String, Value>) -> Result<Option<Vec<ItemSpec>>, ApiError> {
    let raw_items = match body.get("items") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(items)) if !items.is_empty() => items,
        Some(_) => return Err(ApiError::validation("items must be a non-empty array")),
    };

    let mut items: Vec<ItemSpec> = Vec::with_capacity(raw_items.len());
    for raw in raw_items {
        let spec = ItemSpec::from_json(raw, new_id)?;
        if items.iter().any(|i| i.item_id == spec.item_id) {
            return Err(ApiError::validation(format!("Duplicate itemId {}", spec.item_id)));
        }
        items.push(spec);
    }
    Ok(Some(items))
}

fn parse_tags(body: &Map<String, Value>) -> Result<Option<Vec<String>>, ApiError> {
    let values = match body.get("tags") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(values)) => values,
        Some(_) => return Err(ApiError::validation("tags must be an array of strings")),
    };

    let mut tags: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        let tag = value
            .as_str()
            .map(str::trim)
            .ok_or_else(|| ApiError::validation("tags must be an array of strings"))?;
        if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    Ok(Some(tags))
}
