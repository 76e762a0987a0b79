//! Caller-facing catalog service.
//!
//! Ties the store, registry, suggester, and pipeline together behind the
//! operation vocabulary the outer layers speak: analyze, save, upload,
//! search, field configuration, and direct product CRUD. Each method maps
//! to one logical step and therefore one store transaction.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    error::{CatalogError, CatalogResult},
    ingest::{self, CommitReport, StagedAttribute, StagedUpload},
    model::{AttributeConfiguration, AttributeValue, ConfigurationEdit, ProductId, TenantId},
    query::{FilterRequest, ProductHit, SearchResult},
    registry,
    store::{MemoryStore, NewProduct},
    suggest::{FieldMappingSuggester, HeuristicSuggester},
    value::FieldType,
};

/// One attribute edit inside a product update. A `None` value removes
/// the row; label and type default to the stored ones when omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttributeEdit {
    pub field_name: String,
    pub field_label: Option<String>,
    pub field_value: Option<String>,
    pub field_type: Option<FieldType>,
}

/// Partial product update; `Some` fields are applied, the rest keep
/// their stored values. Attribute edits ride in the same transaction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub sku_id: Option<String>,
    pub category_id: Option<i64>,
    pub price: Option<f64>,
    pub manufacturer: Option<String>,
    pub supplier: Option<String>,
    pub image_url: Option<String>,
    pub attributes: Vec<AttributeEdit>,
}

impl ProductUpdate {
    /// Field names this update writes, used for the editability check.
    fn touched_fields(&self) -> Vec<String> {
        let mut fields = Vec::new();
        if self.sku_id.is_some() {
            fields.push("sku_id".to_string());
        }
        if self.category_id.is_some() {
            fields.push("category_id".to_string());
        }
        if self.price.is_some() {
            fields.push("price".to_string());
        }
        if self.manufacturer.is_some() {
            fields.push("manufacturer".to_string());
        }
        if self.supplier.is_some() {
            fields.push("supplier".to_string());
        }
        if self.image_url.is_some() {
            fields.push("image_url".to_string());
        }
        fields.extend(self.attributes.iter().map(|a| a.field_name.clone()));
        fields
    }
}

pub struct Catalog {
    store: MemoryStore,
    suggester: Box<dyn FieldMappingSuggester>,
}

impl Catalog {
    pub fn new(store: MemoryStore) -> Self {
        Catalog {
            store,
            suggester: Box::new(HeuristicSuggester),
        }
    }

    pub fn with_suggester(store: MemoryStore, suggester: Box<dyn FieldMappingSuggester>) -> Self {
        Catalog { store, suggester }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn into_store(self) -> MemoryStore {
        self.store
    }

    // -- ingestion --------------------------------------------------------

    /// Parse, map, coerce, and validate an upload without committing
    /// anything. The result is safe to discard or hand to
    /// [`Catalog::save_staged`].
    pub fn analyze(&self, tenant_id: TenantId, path: &Path) -> CatalogResult<StagedUpload> {
        ingest::analyze(&self.store, tenant_id, path, self.suggester.as_ref())
    }

    /// Analyze then commit in all-or-nothing mode: any invalid or
    /// duplicate row rejects the entire file.
    pub fn upload(
        &mut self,
        tenant_id: TenantId,
        path: &Path,
    ) -> CatalogResult<(StagedUpload, CommitReport)> {
        let staged = self.analyze(tenant_id, path)?;
        let report = ingest::commit_all(&mut self.store, &staged)?;
        Ok((staged, report))
    }

    /// Commit previously staged rows in partial mode: offending rows are
    /// excluded and reported, the rest are written.
    pub fn save_staged(&mut self, staged: &StagedUpload) -> CatalogResult<CommitReport> {
        ingest::commit_valid(&mut self.store, staged)
    }

    // -- search -----------------------------------------------------------

    pub fn search(&self, tenant_id: TenantId, request: &FilterRequest) -> SearchResult {
        crate::query::search(&self.store, tenant_id, request)
    }

    // -- field configuration ----------------------------------------------

    pub fn field_configurations(&mut self, tenant_id: TenantId) -> Vec<AttributeConfiguration> {
        registry::get_configurations(&mut self.store, tenant_id)
    }

    pub fn configure_fields(
        &mut self,
        tenant_id: TenantId,
        edits: &[ConfigurationEdit],
    ) -> CatalogResult<Vec<AttributeConfiguration>> {
        registry::set_configurations(&mut self.store, tenant_id, edits)
    }

    // -- product CRUD -----------------------------------------------------

    pub fn create_product(
        &mut self,
        draft: NewProduct,
        attributes: Vec<StagedAttribute>,
    ) -> CatalogResult<ProductId> {
        self.store.transaction(|store| {
            let product_id = store.insert_product(draft)?;
            for attribute in attributes {
                store.upsert_attribute_value(AttributeValue {
                    product_id,
                    field_name: attribute.field_name,
                    field_label: attribute.field_label,
                    field_value: attribute.field_value,
                    field_type: attribute.field_type,
                });
            }
            Ok(product_id)
        })
    }

    pub fn product(&self, tenant_id: TenantId, id: ProductId) -> CatalogResult<ProductHit> {
        let product = self
            .store
            .product(tenant_id, id)
            .ok_or_else(|| CatalogError::not_found("product", id))?;
        Ok(ProductHit {
            product: product.clone(),
            attributes: self
                .store
                .attribute_values(id)
                .into_iter()
                .cloned()
                .collect(),
        })
    }

    /// Applies a partial update, rejecting it wholesale if any touched
    /// field is configured non-editable. All rejected field names are
    /// reported together.
    pub fn update_product(
        &mut self,
        tenant_id: TenantId,
        id: ProductId,
        update: &ProductUpdate,
    ) -> CatalogResult<ProductHit> {
        let locked: Vec<String> = update
            .touched_fields()
            .into_iter()
            .filter(|field| {
                self.store
                    .configuration(tenant_id, field)
                    .is_some_and(|c| !c.is_editable)
            })
            .collect();
        if !locked.is_empty() {
            return Err(CatalogError::conflict("field is not editable", locked));
        }

        self.store.transaction(|store| {
            let mut product = store
                .product(tenant_id, id)
                .ok_or_else(|| CatalogError::not_found("product", id))?
                .clone();
            if let Some(sku) = &update.sku_id {
                product.sku_id = sku.clone();
            }
            if let Some(category) = update.category_id {
                product.category_id = Some(category);
            }
            if let Some(price) = update.price {
                product.price = Some(price);
            }
            if let Some(manufacturer) = &update.manufacturer {
                product.manufacturer = Some(manufacturer.clone());
            }
            if let Some(supplier) = &update.supplier {
                product.supplier = Some(supplier.clone());
            }
            if let Some(image_url) = &update.image_url {
                product.image_url = Some(image_url.clone());
            }
            store.update_product(product)?;

            for edit in &update.attributes {
                match &edit.field_value {
                    Some(value) => {
                        let existing = store
                            .attribute_values(id)
                            .into_iter()
                            .find(|av| av.field_name == edit.field_name)
                            .cloned();
                        let label = edit
                            .field_label
                            .clone()
                            .or_else(|| existing.as_ref().map(|av| av.field_label.clone()))
                            .unwrap_or_else(|| crate::suggest::label_for(&edit.field_name));
                        let field_type = edit
                            .field_type
                            .or(existing.as_ref().map(|av| av.field_type))
                            .unwrap_or_default();
                        store.upsert_attribute_value(AttributeValue {
                            product_id: id,
                            field_name: edit.field_name.clone(),
                            field_label: label,
                            field_value: value.clone(),
                            field_type,
                        });
                    }
                    None => store.delete_attribute_value(id, &edit.field_name),
                }
            }

            let product = store
                .product(tenant_id, id)
                .ok_or_else(|| CatalogError::not_found("product", id))?
                .clone();
            Ok(ProductHit {
                attributes: store
                    .attribute_values(id)
                    .into_iter()
                    .cloned()
                    .collect(),
                product,
            })
        })
    }

    pub fn delete_product(&mut self, tenant_id: TenantId, id: ProductId) -> CatalogResult<()> {
        self.store.delete_product(tenant_id, id)
    }

    pub fn delete_tenant(&mut self, tenant_id: TenantId) {
        self.store.delete_tenant(tenant_id);
    }
}
