//! Header-to-attribute mapping suggestions.
//!
//! The ingestion pipeline is suggester-agnostic: any implementation of
//! [`FieldMappingSuggester`] may propose mappings (an AI-backed one would
//! live behind the same trait), and [`HeuristicSuggester`] is the
//! deterministic fallback that is always available. Both produce the same
//! record shape, so downstream stages never branch on which one ran.

use anyhow::Result;
use heck::{ToSnakeCase, ToTitleCase};
use serde::{Deserialize, Serialize};

use crate::value::FieldType;

/// One proposed header mapping. This is the wire contract shared by every
/// suggester implementation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldMapping {
    pub original_name: String,
    pub normalized_name: String,
    pub field_label: String,
    pub field_type: FieldType,
    pub is_standard: bool,
    pub description: String,
}

pub trait FieldMappingSuggester {
    /// Proposes one mapping per header, in header order. `sample_rows`
    /// carries up to the first five data rows for implementations that
    /// inspect values; the heuristic fallback decides from headers alone.
    fn suggest(&self, headers: &[String], sample_rows: &[Vec<String>]) -> Result<Vec<FieldMapping>>;
}

/// Synonym sets routing a header onto a fixed product column. Matching is
/// per snake-case token group, not substring, so "Brand" stays a dynamic
/// attribute instead of being swallowed by a manufacturer synonym.
const STANDARD_SYNONYMS: &[(&str, &[&str])] = &[
    ("sku_id", &["sku", "sku_id", "product_id", "id"]),
    ("price", &["price", "cost", "amount", "value"]),
    ("manufacturer", &["manufacturer"]),
    ("supplier", &["supplier", "vendor", "distributor"]),
    ("image_url", &["image_url", "image", "photo", "picture"]),
    ("category_id", &["category_id", "category", "cat_id"]),
];

/// Deterministic fallback suggester: snake-cases headers, routes synonyms
/// of fixed columns onto them, and infers types from header keywords.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicSuggester;

impl FieldMappingSuggester for HeuristicSuggester {
    fn suggest(
        &self,
        headers: &[String],
        _sample_rows: &[Vec<String>],
    ) -> Result<Vec<FieldMapping>> {
        Ok(headers.iter().map(|h| map_header(h)).collect())
    }
}

pub fn map_header(header: &str) -> FieldMapping {
    let snake = normalize_header(header);
    let standard_target = standard_column_for(&snake);
    let normalized_name = standard_target
        .map(|t| t.to_string())
        .unwrap_or_else(|| snake.clone());
    let field_type = match standard_target {
        Some("price") | Some("category_id") => FieldType::Number,
        Some(_) => FieldType::String,
        None => detect_field_type(&snake),
    };
    FieldMapping {
        original_name: header.to_string(),
        field_label: label_for(header),
        field_type,
        is_standard: standard_target.is_some(),
        description: format!("Field: {header}"),
        normalized_name,
    }
}

/// Lowercased snake-case identity of a header. Guaranteed non-empty and
/// idempotent: normalizing the output returns it unchanged.
pub fn normalize_header(header: &str) -> String {
    let snake = header.trim().to_snake_case();
    if snake.is_empty() {
        "field".to_string()
    } else {
        snake
    }
}

/// Human label derived from the header text.
pub fn label_for(header: &str) -> String {
    let label = header.trim().to_title_case();
    if label.is_empty() {
        "Field".to_string()
    } else {
        label
    }
}

/// Fixed column a header maps onto, if the whole snake-cased name matches
/// a synonym.
pub fn standard_column_for(snake: &str) -> Option<&'static str> {
    STANDARD_SYNONYMS
        .iter()
        .find(|(_, synonyms)| synonyms.contains(&snake))
        .map(|(target, _)| *target)
}

/// Keyword heuristics over the snake-cased header.
pub fn detect_field_type(snake: &str) -> FieldType {
    let tokens: Vec<&str> = snake.split('_').collect();
    let has_token = |candidates: &[&str]| tokens.iter().any(|t| candidates.contains(t));

    if has_token(&["price", "cost", "amount", "value", "rate"]) {
        return FieldType::Number;
    }
    if has_token(&["date", "created", "updated", "expiry", "expiration"]) {
        return FieldType::Date;
    }
    if snake.starts_with("is_")
        || snake.starts_with("has_")
        || has_token(&["active", "enabled", "available"])
    {
        return FieldType::Boolean;
    }
    // Identifier-like headers stay strings even when values look numeric.
    if has_token(&["id", "sku", "code"]) {
        return FieldType::String;
    }
    FieldType::String
}
