/// メニューのドメインモデル
///
/// 日付単位のメニュー（ヘッダー + 商品）と、管理画面から送られる商品定義の
/// 解析・検証ルールを定義する。
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::validation::{is_valid_price, is_valid_stock_qty, MAX_STOCK_QTY};

/// 辛さレベルの上限
pub const MAX_SPICE_LEVEL: u8 = 5;

/// 商品定義の検証エラー
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ItemError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{field} is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl ItemError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ItemError::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    /// エラーが指すフィールド名
    pub fn field(&self) -> &'static str {
        match self {
            ItemError::MissingField(field) => field,
            ItemError::InvalidField { field, .. } => field,
        }
    }
}

/// 商品カテゴリ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemCategory {
    Main,
    Dessert,
    Appetizer,
    Beverage,
    Sides,
}

impl ItemCategory {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "main" => Some(ItemCategory::Main),
            "dessert" => Some(ItemCategory::Dessert),
            "appetizer" => Some(ItemCategory::Appetizer),
            "beverage" => Some(ItemCategory::Beverage),
            "sides" => Some(ItemCategory::Sides),
            _ => None,
        }
    }
}

fn default_available() -> bool {
    true
}

/// メニューに依存しない商品定義（テンプレートの商品にも使う）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSpec {
    pub item_id: String,
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub stock_qty: i64,
    #[serde(default)]
    pub is_special: bool,
    #[serde(default = "default_available")]
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<ItemCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spice_level: Option<u8>,
}

impl ItemSpec {
    /// JSONオブジェクトから新しい商品定義を作成
    ///
    /// itemIdが無ければ`generate_id`で採番する。
    pub fn from_json(
        value: &Value,
        generate_id: impl FnOnce() -> String,
    ) -> Result<Self, ItemError> {
        let fields = value
            .as_object()
            .ok_or_else(|| ItemError::invalid("item", "must be an object"))?;

        let item_id = optional_string(fields, "itemId")?.unwrap_or_else(generate_id);
        let base = ItemSpec {
            item_id,
            name: String::new(),
            price: f64::NAN,
            stock_qty: 0,
            is_special: false,
            available: true,
            description: None,
            image_url: None,
            category: None,
            spice_level: None,
        };
        base.patched(fields)
    }

    /// 既存の定義に、JSONで指定されたフィールドだけを上書きした定義を返す
    pub fn patched(&self, fields: &Map<String, Value>) -> Result<Self, ItemError> {
        let mut item = self.clone();

        if let Some(name) = optional_string(fields, "name")? {
            item.name = name;
        }
        if let Some(value) = fields.get("price") {
            item.price = value
                .as_f64()
                .ok_or_else(|| ItemError::invalid("price", "must be a number"))?;
        }
        if let Some(value) = fields.get("stockQty") {
            item.stock_qty = value
                .as_i64()
                .ok_or_else(|| ItemError::invalid("stockQty", "must be an integer"))?;
        }
        if let Some(value) = fields.get("isSpecial") {
            item.is_special = value
                .as_bool()
                .ok_or_else(|| ItemError::invalid("isSpecial", "must be a boolean"))?;
        }
        if let Some(value) = fields.get("available") {
            item.available = value
                .as_bool()
                .ok_or_else(|| ItemError::invalid("available", "must be a boolean"))?;
        }
        if fields.contains_key("description") {
            item.description = optional_string(fields, "description")?;
        }
        if fields.contains_key("imageUrl") {
            item.image_url = optional_string(fields, "imageUrl")?;
        }
        if fields.contains_key("category") {
            item.category = match optional_string(fields, "category")? {
                Some(raw) => Some(ItemCategory::parse(&raw).ok_or_else(|| {
                    ItemError::invalid(
                        "category",
                        "must be one of main, dessert, appetizer, beverage, sides",
                    )
                })?),
                None => None,
            };
        }
        if let Some(value) = fields.get("spiceLevel") {
            item.spice_level = match value {
                Value::Null => None,
                other => Some(
                    other
                        .as_u64()
                        .filter(|level| *level <= MAX_SPICE_LEVEL as u64)
                        .ok_or_else(|| {
                            ItemError::invalid("spiceLevel", "must be an integer from 0 to 5")
                        })? as u8,
                ),
            };
        }

        item.validate()?;
        Ok(item)
    }

    /// 定義全体を検証
    pub fn validate(&self) -> Result<(), ItemError> {
        if self.name.trim().is_empty() {
            return Err(ItemError::MissingField("name"));
        }
        if self.price.is_nan() {
            return Err(ItemError::MissingField("price"));
        }
        if !is_valid_price(self.price) {
            return Err(ItemError::invalid(
                "price",
                "must be between 0 and 99999.99 with at most 2 decimals",
            ));
        }
        if !is_valid_stock_qty(self.stock_qty) {
            return Err(ItemError::invalid(
                "stockQty",
                format!("must be between 0 and {}", MAX_STOCK_QTY),
            ));
        }
        Ok(())
    }

    /// 重複判定用の正規化した商品名
    pub fn name_key(&self) -> String {
        self.name.trim().to_lowercase()
    }
}

/// 文字列フィールドを取得（null・空文字はNone）
fn optional_string(
    fields: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, ItemError> {
    match fields.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(_) => Err(ItemError::invalid(field, "must be a string")),
    }
}

/// メニューに属する商品
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub item_id: String,
    pub menu_id: String,
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub stock_qty: i64,
    #[serde(default)]
    pub is_special: bool,
    #[serde(default = "default_available")]
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<ItemCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spice_level: Option<u8>,
}

impl MenuItem {
    /// 商品定義を指定メニューの商品にする
    pub fn from_spec(menu_id: &str, spec: ItemSpec) -> Self {
        Self {
            item_id: spec.item_id,
            menu_id: menu_id.to_string(),
            name: spec.name,
            price: spec.price,
            stock_qty: spec.stock_qty,
            is_special: spec.is_special,
            available: spec.available,
            description: spec.description,
            image_url: spec.image_url,
            category: spec.category,
            spice_level: spec.spice_level,
        }
    }

    /// メニューから切り離した商品定義
    pub fn to_spec(&self) -> ItemSpec {
        ItemSpec {
            item_id: self.item_id.clone(),
            name: self.name.clone(),
            price: self.price,
            stock_qty: self.stock_qty,
            is_special: self.is_special,
            available: self.available,
            description: self.description.clone(),
            image_url: self.image_url.clone(),
            category: self.category,
            spice_level: self.spice_level,
        }
    }
}

/// メニューのヘッダー情報
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuHeader {
    pub menu_id: String,
    pub date: String,
    pub title: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

/// 商品を含むメニュー
#[derive(Debug, Clone, PartialEq)]
pub struct Menu {
    pub header: MenuHeader,
    pub items: Vec<MenuItem>,
}

impl Menu {
    pub fn new(header: MenuHeader, mut items: Vec<MenuItem>) -> Self {
        items.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.item_id.cmp(&b.item_id)));
        Self { header, items }
    }

    pub fn find_item(&self, item_id: &str) -> Option<&MenuItem> {
        self.items.iter().find(|item| item.item_id == item_id)
    }

    /// レスポンス用のJSON表現（ヘッダー項目 + items）
    pub fn to_json(&self) -> Value {
        let mut value = serde_json::to_value(&self.header).unwrap_or_else(|_| Value::Object(Map::new()));
        if let Value::Object(map) = &mut value {
            map.insert(
                "items".to_string(),
                serde_json::to_value(&self.items).unwrap_or_else(|_| Value::Array(Vec::new())),
            );
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixed_id() -> String {
        "generated-id".to_string()
    }

    #[test]
    fn test_item_from_json_with_defaults() {
        let item = ItemSpec::from_json(&json!({"name": "Jerk Chicken", "price": 15.99}), fixed_id)
            .unwrap();

        assert_eq!(item.item_id, "generated-id");
        assert_eq!(item.name, "Jerk Chicken");
        assert_eq!(item.stock_qty, 0);
        assert!(item.available);
        assert!(!item.is_special);
        assert_eq!(item.category, None);
    }

    #[test]
    fn test_item_from_json_keeps_given_id_and_fields() {
        let item = ItemSpec::from_json(
            &json!({
                "itemId": "itm-1",
                "name": " Oxtail ",
                "price": 21.5,
                "stockQty": 12,
                "isSpecial": true,
                "category": "Main",
                "spiceLevel": 3,
                "description": "Slow braised"
            }),
            fixed_id,
        )
        .unwrap();

        assert_eq!(item.item_id, "itm-1");
        assert_eq!(item.name, "Oxtail");
        assert_eq!(item.category, Some(ItemCategory::Main));
        assert_eq!(item.spice_level, Some(3));
        assert_eq!(item.description.as_deref(), Some("Slow braised"));
    }

    #[test]
    fn test_item_requires_name_and_price() {
        assert_eq!(
            ItemSpec::from_json(&json!({"price": 5.0}), fixed_id).unwrap_err(),
            ItemError::MissingField("name")
        );
        assert_eq!(
            ItemSpec::from_json(&json!({"name": "Rice"}), fixed_id).unwrap_err(),
            ItemError::MissingField("price")
        );
    }

    #[test]
    fn test_item_rejects_invalid_values() {
        let cases = vec![
            json!({"name": "A", "price": -1.0}),
            json!({"name": "A", "price": 1.0, "stockQty": 10000}),
            json!({"name": "A", "price": 1.0, "category": "snack"}),
            json!({"name": "A", "price": 1.0, "spiceLevel": 9}),
            json!({"name": "A", "price": "cheap"}),
            json!(["not", "an", "object"]),
        ];
        for case in cases {
            assert!(
                matches!(
                    ItemSpec::from_json(&case, fixed_id),
                    Err(ItemError::InvalidField { .. })
                ),
                "expected invalid: {}",
                case
            );
        }
    }

    #[test]
    fn test_patched_preserves_unlisted_fields() {
        let original =
            ItemSpec::from_json(&json!({"name": "Plantains", "price": 4.0, "stockQty": 30}), fixed_id)
                .unwrap();
        let patch = json!({"price": 4.5});

        let updated = original.patched(patch.as_object().unwrap()).unwrap();

        assert_eq!(updated.price, 4.5);
        assert_eq!(updated.stock_qty, 30);
        assert_eq!(updated.name, "Plantains");
    }

    #[test]
    fn test_patched_can_clear_optional_fields() {
        let original = ItemSpec::from_json(
            &json!({"name": "Soup", "price": 6.0, "description": "Hot", "spiceLevel": 2}),
            fixed_id,
        )
        .unwrap();
        let patch = json!({"description": null, "spiceLevel": null});

        let updated = original.patched(patch.as_object().unwrap()).unwrap();

        assert_eq!(updated.description, None);
        assert_eq!(updated.spice_level, None);
    }

    #[test]
    fn test_name_key_is_case_and_space_insensitive() {
        let a = ItemSpec::from_json(&json!({"name": "Curry Goat", "price": 1.0}), fixed_id).unwrap();
        let b = ItemSpec::from_json(&json!({"name": "  curry goat ", "price": 1.0}), fixed_id).unwrap();
        assert_eq!(a.name_key(), b.name_key());
    }

    #[test]
    fn test_menu_sorts_items_and_serializes_flat() {
        let header = MenuHeader {
            menu_id: "menu-1".to_string(),
            date: "2025-06-01".to_string(),
            title: "Sunday".to_string(),
            is_active: true,
            image_url: None,
            last_updated: None,
        };
        let spec_b = ItemSpec::from_json(&json!({"itemId": "b", "name": "Rice", "price": 3.0}), fixed_id)
            .unwrap();
        let spec_a = ItemSpec::from_json(&json!({"itemId": "a", "name": "Curry", "price": 9.0}), fixed_id)
            .unwrap();
        let menu = Menu::new(
            header,
            vec![
                MenuItem::from_spec("menu-1", spec_b),
                MenuItem::from_spec("menu-1", spec_a),
            ],
        );

        let json = menu.to_json();
        assert_eq!(json["menuId"], "menu-1");
        assert_eq!(json["isActive"], true);
        assert_eq!(json["items"][0]["name"], "Curry");
        assert_eq!(json["items"][1]["menuId"], "menu-1");
        assert!(menu.find_item("b").is_some());
        assert!(menu.find_item("zzz").is_none());
    }

    #[test]
    fn test_menu_item_spec_roundtrip_keeps_fields() {
        let spec = ItemSpec::from_json(
            &json!({"itemId": "x", "name": "Patty", "price": 3.25, "category": "sides"}),
            fixed_id,
        )
        .unwrap();
        let item = MenuItem::from_spec("menu-9", spec.clone());
        assert_eq!(item.menu_id, "menu-9");
        assert_eq!(item.to_spec(), spec);
    }
}
