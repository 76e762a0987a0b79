//! Filter request translation and execution.
//!
//! A filter request becomes a predicate tree before anything touches the
//! store: each field-specific filter contributes one OR-group (its
//! comma-separated values), and the groups combine with AND. Building the
//! tree first makes "no condition produced" a structural property — an
//! empty AND list — instead of a special flag, and keeps the boolean
//! semantics inspectable in tests.
//!
//! Searchability is resolved fresh from the registry on every call; a
//! field not configured searchable is silently ignored, never an error.

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    model::{AttributeValue, CategoryId, FIXED_STRING_COLUMNS, Product, TenantId},
    registry::{self, FieldScope},
    store::MemoryStore,
};

pub const MSG_NO_SEARCHABLE_FIELDS: &str = "No searchable fields configured";
pub const MSG_NO_MATCH: &str = "No products found matching the search criteria";

pub const DEFAULT_PAGE_SIZE: usize = 20;

/// A caller-facing filter request. `filters` maps field names to raw
/// values, comma-separated for multi-value OR matching; `price`,
/// `price_min` and `price_max` entries are interpreted numerically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRequest {
    pub query: Option<String>,
    pub filters: BTreeMap<String, String>,
    pub category_id: Option<CategoryId>,
    pub scope: FieldScope,
    pub page: usize,
    pub page_size: usize,
}

impl Default for FilterRequest {
    fn default() -> Self {
        FilterRequest {
            query: None,
            filters: BTreeMap::new(),
            category_id: None,
            scope: FieldScope::All,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl FilterRequest {
    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NumericOp {
    Eq,
    Ge,
    Le,
}

/// Predicate tree evaluated against one product and its attribute rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    /// Case-insensitive substring match on a fixed string column.
    FixedContains { column: String, needle: String },
    /// Numeric comparison on the price column.
    PriceCmp { op: NumericOp, value: f64 },
    CategoryEq(CategoryId),
    /// Case-insensitive substring match on an attribute-value row.
    AttributeContains { field: String, needle: String },
}

impl Predicate {
    pub fn matches(&self, product: &Product, attributes: &[&AttributeValue]) -> bool {
        match self {
            Predicate::And(terms) => terms.iter().all(|t| t.matches(product, attributes)),
            Predicate::Or(terms) => terms.iter().any(|t| t.matches(product, attributes)),
            Predicate::FixedContains { column, needle } => product
                .fixed_text(column)
                .is_some_and(|text| text.to_lowercase().contains(&needle.to_lowercase())),
            Predicate::PriceCmp { op, value } => product.price.is_some_and(|price| match op {
                NumericOp::Eq => (price - value).abs() < f64::EPSILON,
                NumericOp::Ge => price >= *value,
                NumericOp::Le => price <= *value,
            }),
            Predicate::CategoryEq(id) => product.category_id == Some(*id),
            Predicate::AttributeContains { field, needle } => attributes.iter().any(|av| {
                av.field_name == *field
                    && av.field_value.to_lowercase().contains(&needle.to_lowercase())
            }),
        }
    }
}

/// Outcome of predicate construction, before any row is touched.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryPlan {
    /// Tenant has no searchable fields under the requested scope.
    NoSearchableFields,
    /// Filters were supplied but none survived searchability gating.
    NoConditions,
    /// Every product passes (subject to the category term, if any).
    Unfiltered(Option<Predicate>),
    Filtered(Predicate),
}

/// Builds the predicate tree per the filter combination law: values
/// within one field OR together, fields AND together, category always
/// ANDs independently of searchability.
pub fn build_plan(store: &MemoryStore, tenant_id: TenantId, request: &FilterRequest) -> QueryPlan {
    let searchable = registry::searchable_fields(store, tenant_id, request.scope);
    let has_field_filters = !request.filters.is_empty();
    let has_query = request
        .query
        .as_deref()
        .is_some_and(|q| !q.trim().is_empty());

    let category_term = request.category_id.map(Predicate::CategoryEq);

    if searchable.is_empty() {
        return QueryPlan::NoSearchableFields;
    }

    let mut terms: Vec<Predicate> = Vec::new();
    if has_field_filters {
        for (field, raw) in &request.filters {
            let target = price_filter_target(field);
            let gate = target.unwrap_or(field.as_str());
            if !searchable.contains(gate) {
                debug!("Ignoring filter on non-searchable field '{field}'");
                continue;
            }
            if let Some(group) = build_field_group(field, raw) {
                terms.push(group);
            }
        }
        if terms.is_empty() {
            return QueryPlan::NoConditions;
        }
    } else if has_query {
        let group = build_general_group(
            request.query.as_deref().unwrap_or_default().trim(),
            &searchable,
        );
        match group {
            Some(group) => terms.push(group),
            None => return QueryPlan::NoConditions,
        }
    } else {
        return QueryPlan::Unfiltered(category_term);
    }

    if let Some(category) = category_term {
        terms.push(category);
    }
    QueryPlan::Filtered(Predicate::And(terms))
}

/// `price`, `price_min` and `price_max` all gate on the `price`
/// configuration even though they bypass substring matching.
fn price_filter_target(field: &str) -> Option<&'static str> {
    matches!(field, "price" | "price_min" | "price_max").then_some("price")
}

/// One filter's OR-group across its comma-separated values. Returns
/// `None` when no value yields a usable condition (unparsable numbers are
/// ignored, not errored).
fn build_field_group(field: &str, raw: &str) -> Option<Predicate> {
    let values: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect();
    if values.is_empty() {
        return None;
    }

    let mut conditions = Vec::new();
    match field {
        "price" | "price_min" | "price_max" => {
            let op = match field {
                "price_min" => NumericOp::Ge,
                "price_max" => NumericOp::Le,
                _ => NumericOp::Eq,
            };
            for value in values {
                if let Ok(parsed) = value.parse::<f64>() {
                    conditions.push(Predicate::PriceCmp { op, value: parsed });
                }
            }
        }
        "category_id" => {
            for value in values {
                if let Ok(parsed) = value.parse::<CategoryId>() {
                    conditions.push(Predicate::CategoryEq(parsed));
                }
            }
        }
        column if FIXED_STRING_COLUMNS.contains(&column) => {
            for value in values {
                conditions.push(Predicate::FixedContains {
                    column: column.to_string(),
                    needle: value.to_string(),
                });
            }
        }
        attribute => {
            for value in values {
                conditions.push(Predicate::AttributeContains {
                    field: attribute.to_string(),
                    needle: value.to_string(),
                });
            }
        }
    }

    if conditions.is_empty() {
        None
    } else {
        Some(Predicate::Or(conditions))
    }
}

/// General text query: one OR-group spanning every searchable fixed
/// column plus every searchable attribute, with numeric coercion for
/// price and category when the query parses as a number.
fn build_general_group(
    query: &str,
    searchable: &std::collections::BTreeSet<String>,
) -> Option<Predicate> {
    let mut conditions = Vec::new();
    for column in FIXED_STRING_COLUMNS {
        if searchable.contains(*column) {
            conditions.push(Predicate::FixedContains {
                column: column.to_string(),
                needle: query.to_string(),
            });
        }
    }
    if searchable.contains("price")
        && let Ok(parsed) = query.parse::<f64>()
    {
        conditions.push(Predicate::PriceCmp {
            op: NumericOp::Eq,
            value: parsed,
        });
    }
    if searchable.contains("category_id")
        && let Ok(parsed) = query.parse::<CategoryId>()
    {
        conditions.push(Predicate::CategoryEq(parsed));
    }
    for field in searchable {
        if !crate::model::is_fixed_column(field) {
            conditions.push(Predicate::AttributeContains {
                field: field.clone(),
                needle: query.to_string(),
            });
        }
    }
    if conditions.is_empty() {
        None
    } else {
        Some(Predicate::Or(conditions))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pagination {
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_previous: bool,
    pub next_page: Option<usize>,
    pub previous_page: Option<usize>,
}

impl Pagination {
    fn for_page(page: usize, page_size: usize, total_items: usize) -> Self {
        let page_size = page_size.max(1);
        let page = page.max(1);
        let total_pages = total_items.div_ceil(page_size);
        let has_next = page < total_pages;
        let has_previous = page > 1 && total_pages > 0;
        Pagination {
            page,
            page_size,
            total_items,
            total_pages,
            has_next,
            has_previous,
            next_page: has_next.then_some(page + 1),
            // An overshooting page still points back at a page that exists.
            previous_page: has_previous.then(|| (page - 1).min(total_pages)),
        }
    }
}

/// A matched product together with its attribute rows, ready for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductHit {
    pub product: Product,
    pub attributes: Vec<AttributeValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub items: Vec<ProductHit>,
    pub pagination: Pagination,
    pub message: Option<String>,
}

impl SearchResult {
    fn empty(request: &FilterRequest, message: &str) -> Self {
        SearchResult {
            items: Vec::new(),
            pagination: Pagination::for_page(request.page, request.page_size, 0),
            message: Some(message.to_string()),
        }
    }
}

/// Executes a filter request: builds the plan, evaluates it over the
/// tenant's products, counts before paging, and attaches pagination
/// metadata.
pub fn search(store: &MemoryStore, tenant_id: TenantId, request: &FilterRequest) -> SearchResult {
    let predicate = match build_plan(store, tenant_id, request) {
        QueryPlan::NoSearchableFields => {
            return SearchResult::empty(request, MSG_NO_SEARCHABLE_FIELDS);
        }
        QueryPlan::NoConditions => return SearchResult::empty(request, MSG_NO_MATCH),
        QueryPlan::Unfiltered(category) => category,
        QueryPlan::Filtered(predicate) => Some(predicate),
    };

    let mut matched: Vec<&Product> = Vec::new();
    for product in store.products(tenant_id) {
        let attributes = store.attribute_values(product.id);
        let keep = predicate
            .as_ref()
            .is_none_or(|p| p.matches(product, &attributes));
        if keep {
            matched.push(product);
        }
    }

    let total_items = matched.len();
    let pagination = Pagination::for_page(request.page, request.page_size, total_items);
    let offset = (pagination.page - 1) * pagination.page_size;
    let items: Vec<ProductHit> = matched
        .into_iter()
        .skip(offset)
        .take(pagination.page_size)
        .map(|product| ProductHit {
            attributes: store
                .attribute_values(product.id)
                .into_iter()
                .cloned()
                .collect(),
            product: product.clone(),
        })
        .collect();

    let message = (total_items == 0).then(|| MSG_NO_MATCH.to_string());
    debug!(
        "Search for tenant {tenant_id} matched {total_items} product(s), returning page {} of {}",
        pagination.page, pagination.total_pages
    );
    SearchResult {
        items,
        pagination,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_derives_from_ceiling_division() {
        let p = Pagination::for_page(2, 10, 25);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next);
        assert!(p.has_previous);
        assert_eq!(p.next_page, Some(3));
        assert_eq!(p.previous_page, Some(1));

        let empty = Pagination::for_page(1, 10, 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next);
        assert!(!empty.has_previous);
    }

    #[test]
    fn overshooting_page_points_back_at_the_last_real_page() {
        let p = Pagination::for_page(5, 10, 15);
        assert_eq!(p.total_pages, 2);
        assert!(!p.has_next);
        assert!(p.has_previous);
        assert_eq!(p.previous_page, Some(2));
    }

    #[test]
    fn field_group_ors_comma_values_and_ignores_unparsable_numbers() {
        let group = build_field_group("manufacturer", "Apple, Sony ,").unwrap();
        match group {
            Predicate::Or(conditions) => assert_eq!(conditions.len(), 2),
            other => panic!("expected OR group, got {other:?}"),
        }

        assert!(build_field_group("price", "cheap").is_none());
        let priced = build_field_group("price", "cheap,9.99").unwrap();
        match priced {
            Predicate::Or(conditions) => assert_eq!(conditions.len(), 1),
            other => panic!("expected OR group, got {other:?}"),
        }
    }

    #[test]
    fn price_aliases_gate_on_price_configuration() {
        assert_eq!(price_filter_target("price_min"), Some("price"));
        assert_eq!(price_filter_target("price_max"), Some("price"));
        assert_eq!(price_filter_target("manufacturer"), None);
    }
}
