//! Attribute Schema Registry.
//!
//! Ground truth is the set of attribute names that currently hold data
//! ([`actual_fields()`]); configuration rows are descriptive metadata
//! about members of that set, never the other way around. Configurations
//! for attributes whose data has since disappeared are treated as inert:
//! they are skipped by [`get_configurations()`] and refreshed edits to
//! them are rejected.
//!
//! Nothing here is cached. Every call re-reads the store so searchability
//! changes take effect on the next query.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
    error::{CatalogError, CatalogResult},
    model::{AttributeConfiguration, ConfigurationEdit, FIXED_COLUMNS, TenantId},
    store::MemoryStore,
    suggest::label_for,
};

/// Narrows which configured fields a query considers, applied before
/// searchability gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldScope {
    #[default]
    All,
    Primary,
    Secondary,
}

impl FieldScope {
    fn admits(&self, config: &AttributeConfiguration) -> bool {
        match self {
            FieldScope::All => true,
            FieldScope::Primary => config.is_primary,
            FieldScope::Secondary => config.is_secondary,
        }
    }
}

/// Attribute names that currently have at least one non-null value in the
/// tenant's fixed columns or attribute-value rows.
pub fn actual_fields(store: &MemoryStore, tenant_id: TenantId) -> BTreeSet<String> {
    let mut fields = BTreeSet::new();
    for product in store.products(tenant_id) {
        for column in product.populated_fixed_columns() {
            fields.insert(column.to_string());
        }
    }
    fields.extend(store.attribute_names(tenant_id));
    fields
}

/// Actual fields in presentation order: fixed columns first (schema
/// order), then discovered attributes alphabetically.
fn ordered_actual_fields(store: &MemoryStore, tenant_id: TenantId) -> Vec<String> {
    let fields = actual_fields(store, tenant_id);
    let mut ordered: Vec<String> = FIXED_COLUMNS
        .iter()
        .filter(|c| fields.contains(**c))
        .map(|c| c.to_string())
        .collect();
    ordered.extend(
        fields
            .iter()
            .filter(|f| !FIXED_COLUMNS.contains(&f.as_str()))
            .cloned(),
    );
    ordered
}

/// Returns one configuration per actual field, synthesizing and persisting
/// a default for any field that lacks one. Existing rows come first,
/// ordered by display order then name; synthesized rows are appended in
/// discovery order.
pub fn get_configurations(
    store: &mut MemoryStore,
    tenant_id: TenantId,
) -> Vec<AttributeConfiguration> {
    let ordered = ordered_actual_fields(store, tenant_id);

    let mut existing: Vec<AttributeConfiguration> = Vec::new();
    let mut missing: Vec<String> = Vec::new();
    for field in &ordered {
        match store.configuration(tenant_id, field) {
            Some(config) => existing.push(config.clone()),
            None => missing.push(field.clone()),
        }
    }
    existing.sort_by(|a, b| {
        a.display_order
            .cmp(&b.display_order)
            .then_with(|| a.field_name.cmp(&b.field_name))
    });

    let mut next_order = store.max_display_order(tenant_id);
    let mut synthesized = Vec::new();
    for field in missing {
        next_order += 1;
        let label = store
            .mappings(tenant_id)
            .iter()
            .find(|m| m.normalized_name == field)
            .map(|m| m.field_label.clone())
            .unwrap_or_else(|| label_for(&field));
        let config = AttributeConfiguration::default_for(tenant_id, &field, &label, next_order);
        store.upsert_configuration(config.clone());
        synthesized.push(config);
    }

    existing.extend(synthesized);
    existing
}

/// Applies a batch of configuration edits all-or-nothing. Any edit naming
/// a field outside `actual_fields` rejects the whole batch, reporting
/// every offending name.
pub fn set_configurations(
    store: &mut MemoryStore,
    tenant_id: TenantId,
    edits: &[ConfigurationEdit],
) -> CatalogResult<Vec<AttributeConfiguration>> {
    let fields = actual_fields(store, tenant_id);
    let rejected: Vec<String> = edits
        .iter()
        .filter(|e| !fields.contains(&e.field_name))
        .map(|e| e.field_name.clone())
        .collect();
    if !rejected.is_empty() {
        return Err(CatalogError::conflict(
            "cannot configure fields with no data",
            rejected,
        ));
    }

    store.transaction(|store| {
        let mut updated = Vec::with_capacity(edits.len());
        for edit in edits {
            let mut config = match store.configuration(tenant_id, &edit.field_name) {
                Some(existing) => existing.clone(),
                None => {
                    let order = store.max_display_order(tenant_id) + 1;
                    AttributeConfiguration::default_for(
                        tenant_id,
                        &edit.field_name,
                        &label_for(&edit.field_name),
                        order,
                    )
                }
            };
            if let Some(label) = &edit.field_label {
                config.field_label = label.clone();
            }
            if let Some(ty) = edit.field_type {
                config.field_type = ty;
            }
            if let Some(flag) = edit.is_searchable {
                config.is_searchable = flag;
            }
            if let Some(flag) = edit.is_editable {
                config.is_editable = flag;
            }
            if let Some(flag) = edit.is_primary {
                config.is_primary = flag;
            }
            if let Some(flag) = edit.is_secondary {
                config.is_secondary = flag;
            }
            if let Some(order) = edit.display_order {
                config.display_order = order;
            }
            if let Some(description) = &edit.description {
                config.description = description.clone();
            }
            store.upsert_configuration(config.clone());
            updated.push(config);
        }
        Ok(updated)
    })
}

/// Names of fields currently searchable under the given scope. Only
/// fields that still hold data count; stale configurations are inert.
pub fn searchable_fields(
    store: &MemoryStore,
    tenant_id: TenantId,
    scope: FieldScope,
) -> BTreeSet<String> {
    let fields = actual_fields(store, tenant_id);
    store
        .configurations(tenant_id)
        .into_iter()
        .filter(|c| c.is_searchable && scope.admits(c) && fields.contains(&c.field_name))
        .map(|c| c.field_name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::AttributeValue, store::NewProduct, value::FieldType};

    fn seeded_store() -> MemoryStore {
        let mut store = MemoryStore::new();
        let id = store
            .insert_product(NewProduct {
                tenant_id: 1,
                sku_id: "A1".to_string(),
                price: Some(9.99),
                manufacturer: Some("Nike".to_string()),
                ..Default::default()
            })
            .unwrap();
        store.upsert_attribute_value(AttributeValue {
            product_id: id,
            field_name: "brand".to_string(),
            field_label: "Brand".to_string(),
            field_value: "Nike".to_string(),
            field_type: FieldType::String,
        });
        store
    }

    #[test]
    fn actual_fields_unions_fixed_and_dynamic() {
        let store = seeded_store();
        let fields = actual_fields(&store, 1);
        for expected in ["sku_id", "price", "manufacturer", "brand"] {
            assert!(fields.contains(expected), "missing {expected}");
        }
        assert!(!fields.contains("supplier"));
    }

    #[test]
    fn get_configurations_synthesizes_and_persists_defaults() {
        let mut store = seeded_store();
        let first = get_configurations(&mut store, 1);
        assert_eq!(first.len(), 4);
        assert!(first.iter().all(|c| !c.is_searchable && c.is_editable));

        // Second call returns the persisted rows, one per actual field.
        let second = get_configurations(&mut store, 1);
        assert_eq!(first, second);
    }

    #[test]
    fn set_configurations_rejects_unknown_fields_reporting_all() {
        let mut store = seeded_store();
        let edits = vec![
            ConfigurationEdit::new("manufacturer").searchable(true),
            ConfigurationEdit::new("ghost").searchable(true),
            ConfigurationEdit::new("phantom").searchable(true),
        ];
        let err = set_configurations(&mut store, 1, &edits).unwrap_err();
        match err {
            CatalogError::Conflict { items, .. } => {
                assert_eq!(items, vec!["ghost".to_string(), "phantom".to_string()]);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        // Nothing from the batch was applied.
        assert!(searchable_fields(&store, 1, FieldScope::All).is_empty());
    }

    #[test]
    fn field_scope_narrows_searchable_set() {
        let mut store = seeded_store();
        let mut primary = ConfigurationEdit::new("manufacturer").searchable(true);
        primary.is_primary = Some(true);
        let secondary = ConfigurationEdit::new("brand").searchable(true);
        set_configurations(&mut store, 1, &[primary, secondary]).unwrap();

        let all = searchable_fields(&store, 1, FieldScope::All);
        assert_eq!(all.len(), 2);
        let primary_only = searchable_fields(&store, 1, FieldScope::Primary);
        assert_eq!(primary_only.len(), 1);
        assert!(primary_only.contains("manufacturer"));
        assert!(searchable_fields(&store, 1, FieldScope::Secondary).is_empty());
    }
}
