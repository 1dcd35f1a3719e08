//! Combo validation and persistence.
//!
//! A combo may only bundle categories that are terminal from the buyer's
//! point of view: leaves, or parents whose children are all leaves. Any
//! intermediate node rejects the whole combo - membership is all-or-nothing,
//! never filtered per item.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::error::CatalogError;
use crate::models::{Combo, ComboItem, Hierarchy, NewComboFields};
use crate::store::{CategoryStore, ComboStore};

#[derive(Clone)]
pub struct ComboValidator {
    store: Arc<dyn CategoryStore>,
}

impl ComboValidator {
    pub fn new(store: Arc<dyn CategoryStore>) -> Self {
        Self { store }
    }

    /// True when `id` has at least one child and no grandchildren.
    pub async fn is_last_level_parent(
        &self,
        hierarchy: Hierarchy,
        id: Uuid,
    ) -> Result<bool, CatalogError> {
        let children = self.store.get_children(hierarchy, id).await?;
        if children.is_empty() {
            return Ok(false);
        }
        let child_ids: Vec<Uuid> = children.iter().map(|c| c.category_id).collect();
        let grandchildren = self.store.children_of_many(hierarchy, &child_ids).await?;
        Ok(grandchildren.values().all(Vec::is_empty))
    }

    /// Validate combo membership in two grouped queries, whatever the item
    /// count: one for the candidates' children, one for those children's
    /// children. Custom items are always valid.
    pub async fn validate_combo_items(
        &self,
        hierarchy: Hierarchy,
        items: &[ComboItem],
    ) -> Result<(), CatalogError> {
        let mut candidates: Vec<Uuid> = Vec::new();
        let mut seen: HashSet<Uuid> = HashSet::new();
        for item in items {
            if let Some(id) = item.category_id() {
                if seen.insert(id) {
                    candidates.push(id);
                }
            }
        }
        if candidates.is_empty() {
            return Ok(());
        }

        // Every category item must resolve.
        let resolved = self.store.get_nodes(hierarchy, &candidates).await?;
        let resolved_ids: HashSet<Uuid> =
            resolved.iter().map(|c| c.category_id).collect();
        if let Some(missing) = candidates.iter().find(|id| !resolved_ids.contains(id)) {
            return Err(CatalogError::UnknownComboItem(*missing));
        }

        // Query 1: direct children of all candidates.
        let children = self.store.children_of_many(hierarchy, &candidates).await?;
        let parents: Vec<(Uuid, Vec<Uuid>)> = candidates
            .iter()
            .filter_map(|id| {
                let kids = children.get(id)?;
                if kids.is_empty() {
                    return None;
                }
                Some((*id, kids.iter().map(|c| c.category_id).collect()))
            })
            .collect();
        if parents.is_empty() {
            // All candidates are leaves.
            return Ok(());
        }

        // Query 2: children of all those children, grouped.
        let all_child_ids: Vec<Uuid> =
            parents.iter().flat_map(|(_, kids)| kids.iter().copied()).collect();
        let grandchildren = self
            .store
            .children_of_many(hierarchy, &all_child_ids)
            .await?;

        for (candidate, kids) in &parents {
            let has_grandchildren = kids.iter().any(|kid| {
                grandchildren
                    .get(kid)
                    .map(|g| !g.is_empty())
                    .unwrap_or(false)
            });
            if has_grandchildren {
                debug!(category = %candidate, "combo item is an intermediate node");
                return Err(CatalogError::InvalidComboItem {
                    category_id: *candidate,
                });
            }
        }
        Ok(())
    }
}

/// Combo writes, re-validated against the live hierarchy on every call.
///
/// A combo is not retroactively invalidated when the tree changes after the
/// write; staleness is accepted until the next update attempt.
#[derive(Clone)]
pub struct ComboService {
    categories: Arc<dyn CategoryStore>,
    combos: Arc<dyn ComboStore>,
    validator: ComboValidator,
}

impl ComboService {
    pub fn new(categories: Arc<dyn CategoryStore>, combos: Arc<dyn ComboStore>) -> Self {
        let validator = ComboValidator::new(categories.clone());
        Self {
            categories,
            combos,
            validator,
        }
    }

    pub fn validator(&self) -> &ComboValidator {
        &self.validator
    }

    pub async fn create_combo(&self, fields: NewComboFields) -> Result<Combo, CatalogError> {
        self.check(&fields).await?;
        self.combos.create(fields).await
    }

    pub async fn update_combo(
        &self,
        combo_id: Uuid,
        fields: NewComboFields,
    ) -> Result<Combo, CatalogError> {
        if self.combos.get(combo_id).await?.is_none() {
            return Err(CatalogError::ComboNotFound(combo_id));
        }
        self.check(&fields).await?;
        self.combos.update(combo_id, fields).await
    }

    pub async fn get_combo(&self, combo_id: Uuid) -> Result<Option<Combo>, CatalogError> {
        self.combos.get(combo_id).await
    }

    pub async fn list_for_parent(
        &self,
        parent_category_id: Uuid,
    ) -> Result<Vec<Combo>, CatalogError> {
        self.combos.list_for_parent(parent_category_id).await
    }

    pub async fn delete_combo(&self, combo_id: Uuid) -> Result<bool, CatalogError> {
        self.combos.delete(combo_id).await
    }

    async fn check(&self, fields: &NewComboFields) -> Result<(), CatalogError> {
        if self
            .categories
            .get_node(Hierarchy::Live, fields.parent_category_id)
            .await?
            .is_none()
        {
            return Err(CatalogError::CategoryNotFound(fields.parent_category_id));
        }
        self.validator
            .validate_combo_items(Hierarchy::Live, &fields.items)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewCategoryFields;
    use crate::store::{InMemoryCategoryStore, InMemoryComboStore};

    fn fields(name: &str, parent: Option<Uuid>) -> NewCategoryFields {
        NewCategoryFields {
            name: name.to_string(),
            parent_id: parent,
            ..NewCategoryFields::default()
        }
    }

    /// A -> [B -> [C, D]] with C, D leaves.
    async fn seed(store: &InMemoryCategoryStore) -> (Uuid, Uuid, Uuid, Uuid) {
        let h = Hierarchy::Live;
        let a = store.create_node(h, fields("A", None)).await.unwrap();
        let b = store
            .create_node(h, fields("B", Some(a.category_id)))
            .await
            .unwrap();
        let c = store
            .create_node(h, fields("C", Some(b.category_id)))
            .await
            .unwrap();
        let d = store
            .create_node(h, fields("D", Some(b.category_id)))
            .await
            .unwrap();
        (a.category_id, b.category_id, c.category_id, d.category_id)
    }

    fn category_item(id: Uuid) -> ComboItem {
        ComboItem::Category { category_id: id }
    }

    #[tokio::test]
    async fn last_level_parent_definition() {
        let store = Arc::new(InMemoryCategoryStore::new());
        let (a, b, c, _) = seed(&store).await;
        let validator = ComboValidator::new(store);

        assert!(validator
            .is_last_level_parent(Hierarchy::Live, b)
            .await
            .unwrap());
        assert!(!validator
            .is_last_level_parent(Hierarchy::Live, a)
            .await
            .unwrap());
        // A leaf is not a last-level parent (it is valid via the leaf check).
        assert!(!validator
            .is_last_level_parent(Hierarchy::Live, c)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn combo_of_leaves_and_last_level_parents_is_valid() {
        let store = Arc::new(InMemoryCategoryStore::new());
        let (_, b, c, d) = seed(&store).await;
        let validator = ComboValidator::new(store);

        let items = vec![
            category_item(b),
            category_item(c),
            category_item(d),
            ComboItem::Custom {
                name: "Gift wrap".into(),
            },
        ];
        validator
            .validate_combo_items(Hierarchy::Live, &items)
            .await
            .expect("valid combo");
    }

    #[tokio::test]
    async fn intermediate_node_rejects_whole_combo() {
        let store = Arc::new(InMemoryCategoryStore::new());
        let (a, _, c, _) = seed(&store).await;
        let validator = ComboValidator::new(store);

        let items = vec![category_item(c), category_item(a)];
        let err = validator
            .validate_combo_items(Hierarchy::Live, &items)
            .await
            .expect_err("A has grandchildren");
        assert!(matches!(
            err,
            CatalogError::InvalidComboItem { category_id } if category_id == a
        ));
    }

    #[tokio::test]
    async fn unresolved_item_rejects_whole_combo() {
        let store = Arc::new(InMemoryCategoryStore::new());
        seed(&store).await;
        let validator = ComboValidator::new(store);

        let ghost = Uuid::new_v4();
        let err = validator
            .validate_combo_items(Hierarchy::Live, &[category_item(ghost)])
            .await
            .expect_err("ghost id");
        assert!(matches!(err, CatalogError::UnknownComboItem(id) if id == ghost));
    }

    #[tokio::test]
    async fn combo_writes_revalidate() {
        let categories = Arc::new(InMemoryCategoryStore::new());
        let (a, b, _, _) = seed(&categories).await;
        let service = ComboService::new(categories, Arc::new(InMemoryComboStore::new()));

        let combo = service
            .create_combo(NewComboFields {
                parent_category_id: a,
                name: "Starter pack".into(),
                items: vec![category_item(b)],
                sizes: Vec::new(),
            })
            .await
            .expect("valid combo");

        let err = service
            .update_combo(
                combo.combo_id,
                NewComboFields {
                    parent_category_id: a,
                    name: "Starter pack".into(),
                    items: vec![category_item(a)],
                    sizes: Vec::new(),
                },
            )
            .await
            .expect_err("A is intermediate");
        assert!(matches!(err, CatalogError::InvalidComboItem { .. }));
    }
}
