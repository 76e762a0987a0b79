//! In-process relational-style store backing the catalog.
//!
//! The engine assumes a store with flat tables, a unique (tenant, SKU)
//! constraint, cascading deletes, and one transaction per logical step.
//! This implementation keeps the tables in memory and persists them as a
//! single JSON document, which is enough for the CLI and for tests; the
//! query builder only ever talks to it through the methods below, so a
//! SQL-backed store can replace it without touching the callers.
//!
//! Transactions use clone-and-restore: the callback runs against the live
//! tables and the pre-transaction snapshot is reinstated on error. Within
//! one process that gives the all-or-nothing behavior commits rely on.

use std::{
    collections::BTreeSet,
    fs::File,
    io::BufReader,
    path::Path,
};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    error::{CatalogError, CatalogResult},
    model::{
        AttributeConfiguration, AttributeMapping, AttributeValue, CategoryId, Product, ProductId,
        TenantId,
    },
};

/// Insert payload for a product; id and timestamps are assigned by the
/// store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProduct {
    pub tenant_id: TenantId,
    pub category_id: Option<CategoryId>,
    pub sku_id: String,
    pub price: Option<f64>,
    pub manufacturer: Option<String>,
    pub supplier: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    next_product_id: ProductId,
    products: Vec<Product>,
    attribute_values: Vec<AttributeValue>,
    attribute_mappings: Vec<AttributeMapping>,
    attribute_configurations: Vec<AttributeConfiguration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            next_product_id: 1,
            ..Default::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening store file {path:?}"))?;
        let reader = BufReader::new(file);
        let store = serde_json::from_reader(reader).context("Parsing store JSON")?;
        Ok(store)
    }

    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating store file {path:?}"))?;
        serde_json::to_writer_pretty(file, self).context("Writing store JSON")
    }

    /// Runs `f` with all-or-nothing semantics: on error every table is
    /// restored to its pre-transaction state.
    pub fn transaction<T>(
        &mut self,
        f: impl FnOnce(&mut MemoryStore) -> CatalogResult<T>,
    ) -> CatalogResult<T> {
        let snapshot = self.clone();
        match f(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                *self = snapshot;
                Err(err)
            }
        }
    }

    // -- products ---------------------------------------------------------

    /// Inserts a product, enforcing the unique (tenant, SKU) constraint.
    /// Uniqueness compares SKUs exactly; only search is case-insensitive.
    pub fn insert_product(&mut self, draft: NewProduct) -> CatalogResult<ProductId> {
        if self.product_by_sku(draft.tenant_id, &draft.sku_id).is_some() {
            return Err(CatalogError::conflict(
                "duplicate SKU",
                vec![draft.sku_id.clone()],
            ));
        }
        let id = self.next_product_id;
        self.next_product_id += 1;
        let now = Utc::now();
        self.products.push(Product {
            id,
            tenant_id: draft.tenant_id,
            category_id: draft.category_id,
            sku_id: draft.sku_id,
            price: draft.price,
            manufacturer: draft.manufacturer,
            supplier: draft.supplier,
            image_url: draft.image_url,
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    pub fn product(&self, tenant_id: TenantId, id: ProductId) -> Option<&Product> {
        self.products
            .iter()
            .find(|p| p.tenant_id == tenant_id && p.id == id)
    }

    pub fn product_by_sku(&self, tenant_id: TenantId, sku_id: &str) -> Option<&Product> {
        self.products
            .iter()
            .find(|p| p.tenant_id == tenant_id && p.sku_id == sku_id)
    }

    pub fn products(&self, tenant_id: TenantId) -> impl Iterator<Item = &Product> {
        self.products.iter().filter(move |p| p.tenant_id == tenant_id)
    }

    /// Replaces a product row in place, bumping `updated_at`. The caller
    /// is responsible for editability checks; SKU uniqueness is still
    /// enforced here.
    pub fn update_product(&mut self, updated: Product) -> CatalogResult<()> {
        if let Some(existing) = self
            .products
            .iter()
            .find(|p| p.tenant_id == updated.tenant_id && p.sku_id == updated.sku_id)
            && existing.id != updated.id
        {
            return Err(CatalogError::conflict(
                "duplicate SKU",
                vec![updated.sku_id.clone()],
            ));
        }
        let slot = self
            .products
            .iter_mut()
            .find(|p| p.tenant_id == updated.tenant_id && p.id == updated.id)
            .ok_or_else(|| CatalogError::not_found("product", updated.id))?;
        *slot = Product {
            updated_at: Utc::now(),
            ..updated
        };
        Ok(())
    }

    /// Deletes a product and cascades its attribute-value rows.
    pub fn delete_product(&mut self, tenant_id: TenantId, id: ProductId) -> CatalogResult<()> {
        let before = self.products.len();
        self.products
            .retain(|p| !(p.tenant_id == tenant_id && p.id == id));
        if self.products.len() == before {
            return Err(CatalogError::not_found("product", id));
        }
        self.attribute_values.retain(|av| av.product_id != id);
        Ok(())
    }

    /// Drops every row scoped to the tenant.
    pub fn delete_tenant(&mut self, tenant_id: TenantId) {
        let product_ids: BTreeSet<ProductId> = self
            .products(tenant_id)
            .map(|p| p.id)
            .collect();
        self.products.retain(|p| p.tenant_id != tenant_id);
        self.attribute_values
            .retain(|av| !product_ids.contains(&av.product_id));
        self.attribute_mappings
            .retain(|m| m.tenant_id != tenant_id);
        self.attribute_configurations
            .retain(|c| c.tenant_id != tenant_id);
    }

    // -- attribute values -------------------------------------------------

    /// Writes an attribute value, overwriting any existing row for the
    /// same (product, field name) pair.
    pub fn upsert_attribute_value(&mut self, value: AttributeValue) {
        if let Some(existing) = self
            .attribute_values
            .iter_mut()
            .find(|av| av.product_id == value.product_id && av.field_name == value.field_name)
        {
            *existing = value;
        } else {
            self.attribute_values.push(value);
        }
    }

    pub fn attribute_values(&self, product_id: ProductId) -> Vec<&AttributeValue> {
        self.attribute_values
            .iter()
            .filter(|av| av.product_id == product_id)
            .collect()
    }

    pub fn delete_attribute_value(&mut self, product_id: ProductId, field_name: &str) {
        self.attribute_values
            .retain(|av| !(av.product_id == product_id && av.field_name == field_name));
    }

    /// Distinct attribute names present on any of the tenant's products.
    pub fn attribute_names(&self, tenant_id: TenantId) -> BTreeSet<String> {
        let product_ids: BTreeSet<ProductId> =
            self.products(tenant_id).map(|p| p.id).collect();
        self.attribute_values
            .iter()
            .filter(|av| product_ids.contains(&av.product_id))
            .map(|av| av.field_name.clone())
            .collect()
    }

    // -- mappings ---------------------------------------------------------

    pub fn mapping_for(&self, tenant_id: TenantId, original_name: &str) -> Option<&AttributeMapping> {
        self.attribute_mappings
            .iter()
            .find(|m| m.tenant_id == tenant_id && m.original_name == original_name)
    }

    /// Records a normalization decision unless one already exists for the
    /// header. The table is append-only history; earlier decisions win.
    pub fn record_mapping(&mut self, mapping: AttributeMapping) {
        if self
            .mapping_for(mapping.tenant_id, &mapping.original_name)
            .is_none()
        {
            self.attribute_mappings.push(mapping);
        }
    }

    pub fn mappings(&self, tenant_id: TenantId) -> Vec<&AttributeMapping> {
        self.attribute_mappings
            .iter()
            .filter(|m| m.tenant_id == tenant_id)
            .collect()
    }

    // -- configurations ---------------------------------------------------

    pub fn configurations(&self, tenant_id: TenantId) -> Vec<&AttributeConfiguration> {
        self.attribute_configurations
            .iter()
            .filter(|c| c.tenant_id == tenant_id)
            .collect()
    }

    pub fn configuration(
        &self,
        tenant_id: TenantId,
        field_name: &str,
    ) -> Option<&AttributeConfiguration> {
        self.attribute_configurations
            .iter()
            .find(|c| c.tenant_id == tenant_id && c.field_name == field_name)
    }

    pub fn upsert_configuration(&mut self, config: AttributeConfiguration) {
        if let Some(existing) = self
            .attribute_configurations
            .iter_mut()
            .find(|c| c.tenant_id == config.tenant_id && c.field_name == config.field_name)
        {
            *existing = config;
        } else {
            self.attribute_configurations.push(config);
        }
    }

    pub fn max_display_order(&self, tenant_id: TenantId) -> u32 {
        self.configurations(tenant_id)
            .iter()
            .map(|c| c.display_order)
            .max()
            .unwrap_or(0)
    }
}
