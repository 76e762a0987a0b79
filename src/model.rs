//! Catalog entities.
//!
//! A product is a small fixed-column struct; everything discovered at
//! upload time lives in generic attribute-value rows keyed by product id
//! and attribute name. Configuration rows describe attributes by name
//! only — a deliberate string-keyed join so an attribute can be validated
//! against its configuration while it exists only in a staged upload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value::FieldType;

pub type TenantId = i64;
pub type ProductId = i64;
pub type CategoryId = i64;

/// Fixed product columns addressable by filter requests, in the order the
/// general query scans them.
pub const FIXED_STRING_COLUMNS: &[&str] = &["sku_id", "manufacturer", "supplier", "image_url"];

/// All fixed columns a standard-flagged header may map onto.
pub const FIXED_COLUMNS: &[&str] = &[
    "sku_id",
    "category_id",
    "price",
    "manufacturer",
    "supplier",
    "image_url",
];

pub fn is_fixed_column(name: &str) -> bool {
    FIXED_COLUMNS.contains(&name)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: ProductId,
    pub tenant_id: TenantId,
    pub category_id: Option<CategoryId>,
    /// Unique within a tenant; uniqueness is exact, search is
    /// case-insensitive.
    pub sku_id: String,
    pub price: Option<f64>,
    pub manufacturer: Option<String>,
    pub supplier: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Textual view of a fixed string column, used by substring filters.
    pub fn fixed_text(&self, column: &str) -> Option<&str> {
        match column {
            "sku_id" => Some(self.sku_id.as_str()),
            "manufacturer" => self.manufacturer.as_deref(),
            "supplier" => self.supplier.as_deref(),
            "image_url" => self.image_url.as_deref(),
            _ => None,
        }
    }

    /// Fixed columns currently holding a value, for actual-field
    /// derivation.
    pub fn populated_fixed_columns(&self) -> Vec<&'static str> {
        let mut populated = vec!["sku_id"];
        if self.category_id.is_some() {
            populated.push("category_id");
        }
        if self.price.is_some() {
            populated.push("price");
        }
        if self.manufacturer.is_some() {
            populated.push("manufacturer");
        }
        if self.supplier.is_some() {
            populated.push("supplier");
        }
        if self.image_url.is_some() {
            populated.push("image_url");
        }
        populated
    }
}

/// One dynamically-discovered attribute on one product. At most one row
/// exists per (product, field_name); writes overwrite in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttributeValue {
    pub product_id: ProductId,
    pub field_name: String,
    pub field_label: String,
    pub field_value: String,
    pub field_type: FieldType,
}

/// Append-only record of one header normalization decision, kept so a
/// repeated upload maps the same header to the same attribute name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttributeMapping {
    pub tenant_id: TenantId,
    pub original_name: String,
    pub normalized_name: String,
    pub field_label: String,
    pub field_type: FieldType,
    pub is_standard: bool,
}

/// Authoritative per-attribute usage flags for one tenant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttributeConfiguration {
    pub tenant_id: TenantId,
    pub field_name: String,
    pub field_label: String,
    pub field_type: FieldType,
    pub is_searchable: bool,
    pub is_editable: bool,
    pub is_primary: bool,
    pub is_secondary: bool,
    pub display_order: u32,
    pub description: String,
}

impl AttributeConfiguration {
    /// Default synthesized the first time an attribute is observed without
    /// an explicit configuration.
    pub fn default_for(
        tenant_id: TenantId,
        field_name: &str,
        field_label: &str,
        display_order: u32,
    ) -> Self {
        AttributeConfiguration {
            tenant_id,
            field_name: field_name.to_string(),
            field_label: field_label.to_string(),
            field_type: FieldType::String,
            is_searchable: false,
            is_editable: true,
            is_primary: false,
            is_secondary: false,
            display_order,
            description: String::new(),
        }
    }
}

/// Caller-supplied edit applied through the registry. `None` leaves the
/// stored flag untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigurationEdit {
    pub field_name: String,
    pub field_label: Option<String>,
    pub field_type: Option<FieldType>,
    pub is_searchable: Option<bool>,
    pub is_editable: Option<bool>,
    pub is_primary: Option<bool>,
    pub is_secondary: Option<bool>,
    pub display_order: Option<u32>,
    pub description: Option<String>,
}

impl ConfigurationEdit {
    pub fn new(field_name: impl Into<String>) -> Self {
        ConfigurationEdit {
            field_name: field_name.into(),
            ..Default::default()
        }
    }

    pub fn searchable(mut self, flag: bool) -> Self {
        self.is_searchable = Some(flag);
        self
    }

    pub fn editable(mut self, flag: bool) -> Self {
        self.is_editable = Some(flag);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product() -> Product {
        Product {
            id: 1,
            tenant_id: 7,
            category_id: None,
            sku_id: "A1".to_string(),
            price: Some(9.99),
            manufacturer: Some("Nike".to_string()),
            supplier: None,
            image_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn populated_fixed_columns_tracks_non_null_values() {
        let p = product();
        let populated = p.populated_fixed_columns();
        assert!(populated.contains(&"sku_id"));
        assert!(populated.contains(&"price"));
        assert!(populated.contains(&"manufacturer"));
        assert!(!populated.contains(&"supplier"));
    }

    #[test]
    fn fixed_text_reads_string_columns_only() {
        let p = product();
        assert_eq!(p.fixed_text("sku_id"), Some("A1"));
        assert_eq!(p.fixed_text("supplier"), None);
        assert_eq!(p.fixed_text("price"), None);
    }
}
