/// メニューテンプレートと、テンプレートからメニューへのマージ規則
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::menu::{ItemSpec, MenuItem};

/// 再利用可能なメニューテンプレート
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuTemplate {
    pub template_id: String,
    pub name: String,
    #[serde(default)]
    pub items: Vec<ItemSpec>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// テンプレートのヘッダー情報（商品を含まない）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateHeader {
    pub template_id: String,
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub item_count: usize,
}

impl MenuTemplate {
    pub fn header(&self) -> TemplateHeader {
        TemplateHeader {
            template_id: self.template_id.clone(),
            name: self.name.clone(),
            tags: self.tags.clone(),
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
            item_count: self.items.len(),
        }
    }
}

/// テンプレート適用時のマージ結果
#[derive(Debug, Clone, PartialEq)]
pub struct MergePlan {
    /// 追加する商品
    pub to_add: Vec<MenuItem>,
    /// 既存と重複したためスキップした商品ID（テンプレート側）
    pub skipped: Vec<String>,
}

/// テンプレートの商品を既存メニューにマージする計画を立てる
///
/// 名前（前後空白を除き大文字小文字を区別しない）またはIDが既存商品、
/// あるいは先に採用したテンプレート商品と一致するものはスキップする。
/// 追加する商品はテンプレートのIDを引き継ぐため、同じテンプレートを
/// 再適用しても何も追加されない。
pub fn merge_template_items(
    menu_id: &str,
    existing: &[MenuItem],
    template_items: &[ItemSpec],
) -> MergePlan {
    let mut taken_names: HashSet<String> = existing
        .iter()
        .map(|item| item.name.trim().to_lowercase())
        .collect();
    let mut taken_ids: HashSet<String> = existing.iter().map(|item| item.item_id.clone()).collect();

    let mut to_add = Vec::new();
    let mut skipped = Vec::new();

    for spec in template_items {
        let name_key = spec.name_key();
        if taken_names.contains(&name_key) || taken_ids.contains(&spec.item_id) {
            skipped.push(spec.item_id.clone());
            continue;
        }
        taken_names.insert(name_key);
        taken_ids.insert(spec.item_id.clone());
        to_add.push(MenuItem::from_spec(menu_id, spec.clone()));
    }

    MergePlan { to_add, skipped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(id: &str, name: &str, price: f64) -> ItemSpec {
        ItemSpec::from_json(&json!({"itemId": id, "name": name, "price": price}), String::new)
            .unwrap()
    }

    #[test]
    fn test_merge_into_empty_menu_adds_everything() {
        let plan = merge_template_items(
            "menu-1",
            &[],
            &[spec("t1", "Curry Goat", 18.0), spec("t2", "Rice", 3.0)],
        );

        assert_eq!(plan.to_add.len(), 2);
        assert!(plan.skipped.is_empty());
        assert!(plan.to_add.iter().all(|item| item.menu_id == "menu-1"));
        assert_eq!(plan.to_add[0].item_id, "t1");
    }

    #[test]
    fn test_merge_skips_existing_name_case_insensitive() {
        let existing = vec![MenuItem::from_spec("menu-1", spec("m1", "curry goat ", 20.0))];

        let plan = merge_template_items(
            "menu-1",
            &existing,
            &[spec("t1", "Curry Goat", 18.0), spec("t2", "Rice", 3.0)],
        );

        assert_eq!(plan.skipped, vec!["t1".to_string()]);
        assert_eq!(plan.to_add.len(), 1);
        assert_eq!(plan.to_add[0].name, "Rice");
    }

    #[test]
    fn test_merge_skips_existing_id() {
        let existing = vec![MenuItem::from_spec("menu-1", spec("t2", "Brown Rice", 4.0))];

        let plan = merge_template_items("menu-1", &existing, &[spec("t2", "Rice", 3.0)]);

        assert!(plan.to_add.is_empty());
        assert_eq!(plan.skipped, vec!["t2".to_string()]);
    }

    #[test]
    fn test_existing_items_are_left_unchanged() {
        let existing = vec![MenuItem::from_spec("menu-1", spec("m1", "Curry Goat", 20.0))];

        let plan = merge_template_items("menu-1", &existing, &[spec("t1", "Curry Goat", 18.0)]);

        assert!(plan.to_add.iter().all(|item| item.item_id != "m1"));
        assert_eq!(existing[0].price, 20.0);
    }

    #[test]
    fn test_reapplying_is_idempotent() {
        let template = vec![spec("t1", "Curry Goat", 18.0), spec("t2", "Rice", 3.0)];
        let first = merge_template_items("menu-1", &[], &template);

        let second = merge_template_items("menu-1", &first.to_add, &template);

        assert!(second.to_add.is_empty());
        assert_eq!(second.skipped.len(), 2);
    }

    #[test]
    fn test_duplicate_names_within_template_first_wins() {
        let plan = merge_template_items(
            "menu-1",
            &[],
            &[spec("t1", "Rice", 3.0), spec("t2", "RICE", 5.0)],
        );

        assert_eq!(plan.to_add.len(), 1);
        assert_eq!(plan.to_add[0].price, 3.0);
        assert_eq!(plan.skipped, vec!["t2".to_string()]);
    }

    #[test]
    fn test_template_header_counts_items() {
        let template = MenuTemplate {
            template_id: "tpl-1".to_string(),
            name: "Sunday Classics".to_string(),
            items: vec![spec("t1", "Rice", 3.0)],
            tags: vec!["weekend".to_string()],
            created_at: "2025-01-01T00:00:00Z".to_string(),
            updated_at: None,
        };
        let header = template.header();
        assert_eq!(header.item_count, 1);
        assert_eq!(header.name, "Sunday Classics");
    }
}
