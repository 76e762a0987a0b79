//! Upload ingestion pipeline.
//!
//! Stages per upload: parse → map → coerce → validate, producing a
//! [`StagedUpload`] that is either discarded (preview) or committed. No
//! store mutation happens before commit; the row ceiling is enforced
//! right after parsing so an oversized file never reaches the store.
//!
//! Two commit modes exist deliberately (the caller-facing "upload" and
//! "save" operations differ):
//!
//! - [`commit_all()`] validates then commits everything; any invalid or
//!   duplicate row rejects the whole batch.
//! - [`commit_valid()`] excludes offending rows and commits the rest,
//!   reporting each exclusion so the caller can fix and retry only those
//!   rows.

use std::{fs, path::Path};

use anyhow::Context;
use encoding_rs::UTF_8;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{CatalogError, CatalogResult},
    model::{AttributeMapping, AttributeValue, ProductId, TenantId},
    store::{MemoryStore, NewProduct},
    suggest::{FieldMapping, FieldMappingSuggester, HeuristicSuggester},
    value::{FieldType, Value, coerce_value},
};

/// Hard ceiling on rows per upload, enforced before any store write.
pub const MAX_UPLOAD_ROWS: usize = 500;

/// Sample rows handed to the suggester.
pub const SUGGESTER_SAMPLE_ROWS: usize = 5;

/// Fully-buffered content of an uploaded file. Mapping and coercion both
/// need complete column context, so the file is read once up front.
#[derive(Debug, Clone)]
pub struct TabularFile {
    pub file_name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Reads a CSV or TSV upload. Any other extension fails fast with a
/// format error; so does content that is not valid UTF-8.
pub fn read_tabular(path: &Path) -> CatalogResult<TabularFile> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    let delimiter = match extension.as_str() {
        "csv" => b',',
        "tsv" => b'\t',
        other => {
            return Err(CatalogError::Format(format!(
                "'.{other}' (expected .csv or .tsv)"
            )));
        }
    };

    let bytes = fs::read(path)?;
    let (decoded, _, had_errors) = UTF_8.decode(&bytes);
    if had_errors {
        return Err(CatalogError::Format(
            "file content is not valid UTF-8".to_string(),
        ));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(decoded.as_bytes());
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row: Vec<String> = record.iter().map(|cell| cell.to_string()).collect();
        row.resize(headers.len(), String::new());
        rows.push(row);
    }

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload")
        .to_string();
    debug!(
        "Parsed '{}': {} column(s), {} row(s)",
        file_name,
        headers.len(),
        rows.len()
    );
    Ok(TabularFile {
        file_name,
        headers,
        rows,
    })
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Valid,
    Warning,
    Error,
}

/// A coerced attribute awaiting commit; becomes an [`AttributeValue`] row
/// once its product exists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StagedAttribute {
    pub field_name: String,
    pub field_label: String,
    pub field_value: String,
    pub field_type: FieldType,
}

/// One upload row after coercion and splitting, with validation results
/// attached. Invalid rows are kept in the response so the caller can see
/// and fix them before commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedRow {
    pub index: usize,
    pub sku_id: Option<String>,
    pub category_id: Option<i64>,
    pub price: Option<f64>,
    pub manufacturer: Option<String>,
    pub supplier: Option<String>,
    pub image_url: Option<String>,
    pub attributes: Vec<StagedAttribute>,
    pub status: ValidationStatus,
    pub messages: Vec<String>,
}

impl StagedRow {
    fn flag_error(&mut self, message: impl Into<String>) {
        self.status = ValidationStatus::Error;
        self.messages.push(message.into());
    }

    fn flag_warning(&mut self, message: impl Into<String>) {
        if self.status == ValidationStatus::Valid {
            self.status = ValidationStatus::Warning;
        }
        self.messages.push(message.into());
    }
}

/// Result of the analyze stage: everything the caller needs to review an
/// upload before committing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedUpload {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub file_name: String,
    pub total_rows: usize,
    pub headers: Vec<String>,
    pub mappings: Vec<FieldMapping>,
    pub sample_rows: Vec<Vec<String>>,
    pub rows: Vec<StagedRow>,
    pub is_product_data: bool,
    pub confidence: f64,
    pub recommendations: Vec<String>,
}

impl StagedUpload {
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let file = fs::File::create(path)
            .with_context(|| format!("Creating staging file {path:?}"))?;
        serde_json::to_writer_pretty(file, self).context("Writing staging JSON")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file =
            fs::File::open(path).with_context(|| format!("Opening staging file {path:?}"))?;
        serde_json::from_reader(std::io::BufReader::new(file)).context("Parsing staging JSON")
    }
}

/// Runs parse → map → coerce → validate without touching the store
/// tables. Mappings previously persisted for the tenant win over fresh
/// suggestions so repeated uploads stay consistent; the suggester's
/// failure mode is never surfaced — the heuristic fallback covers it.
pub fn analyze(
    store: &MemoryStore,
    tenant_id: TenantId,
    path: &Path,
    suggester: &dyn FieldMappingSuggester,
) -> CatalogResult<StagedUpload> {
    let file = read_tabular(path)?;
    if file.rows.len() > MAX_UPLOAD_ROWS {
        return Err(CatalogError::LimitExceeded {
            count: file.rows.len(),
            limit: MAX_UPLOAD_ROWS,
        });
    }

    let sample_rows: Vec<Vec<String>> = file
        .rows
        .iter()
        .take(SUGGESTER_SAMPLE_ROWS)
        .cloned()
        .collect();
    let mappings = resolve_mappings(store, tenant_id, &file.headers, &sample_rows, suggester);

    let standard_count = mappings.iter().filter(|m| m.is_standard).count();
    let is_product_data = standard_count > 0;
    let confidence = if file.headers.is_empty() {
        0.0
    } else {
        (standard_count as f64 / file.headers.len() as f64).min(0.8)
    };

    let rows = file
        .rows
        .iter()
        .enumerate()
        .map(|(index, row)| stage_row(index, row, &mappings))
        .collect::<Vec<_>>();

    let error_count = rows
        .iter()
        .filter(|r| r.status == ValidationStatus::Error)
        .count();
    info!(
        "Analyzed '{}' for tenant {}: {} row(s), {} with errors",
        file.file_name,
        tenant_id,
        rows.len(),
        error_count
    );

    let mut recommendations = vec!["Review field mappings before committing".to_string()];
    if !is_product_data {
        recommendations.push("No standard product fields recognized in headers".to_string());
    }
    if error_count > 0 {
        recommendations.push(format!("{error_count} row(s) failed validation"));
    }

    Ok(StagedUpload {
        id: Uuid::new_v4(),
        tenant_id,
        file_name: file.file_name,
        total_rows: file.rows.len(),
        headers: file.headers,
        mappings,
        sample_rows,
        rows,
        is_product_data,
        confidence,
        recommendations,
    })
}

fn resolve_mappings(
    store: &MemoryStore,
    tenant_id: TenantId,
    headers: &[String],
    sample_rows: &[Vec<String>],
    suggester: &dyn FieldMappingSuggester,
) -> Vec<FieldMapping> {
    let suggested = match suggester.suggest(headers, sample_rows) {
        Ok(mappings) if mappings.len() == headers.len() => mappings,
        Ok(mappings) => {
            warn!(
                "Suggester returned {} mapping(s) for {} header(s), using heuristic fallback",
                mappings.len(),
                headers.len()
            );
            HeuristicSuggester
                .suggest(headers, sample_rows)
                .unwrap_or_default()
        }
        Err(err) => {
            warn!("Suggester failed ({err}), using heuristic fallback");
            HeuristicSuggester
                .suggest(headers, sample_rows)
                .unwrap_or_default()
        }
    };

    // Persisted mapping history overrides fresh suggestions: the same
    // header always lands on the same attribute name for a tenant.
    suggested
        .into_iter()
        .map(|mapping| match store.mapping_for(tenant_id, &mapping.original_name) {
            Some(known) => FieldMapping {
                original_name: known.original_name.clone(),
                normalized_name: known.normalized_name.clone(),
                field_label: known.field_label.clone(),
                field_type: known.field_type,
                is_standard: known.is_standard,
                description: mapping.description,
            },
            None => mapping,
        })
        .collect()
}

/// Coerces one raw row and splits it into fixed columns and attribute
/// candidates, attaching validation status.
fn stage_row(index: usize, raw: &[String], mappings: &[FieldMapping]) -> StagedRow {
    let mut row = StagedRow {
        index,
        sku_id: None,
        category_id: None,
        price: None,
        manufacturer: None,
        supplier: None,
        image_url: None,
        attributes: Vec::new(),
        status: ValidationStatus::Valid,
        messages: Vec::new(),
    };

    for (mapping, cell) in mappings.iter().zip(raw) {
        let trimmed = cell.trim();
        if trimmed.is_empty() {
            continue;
        }
        if mapping.is_standard {
            apply_fixed_column(&mut row, &mapping.normalized_name, trimmed);
        } else {
            let coerced = coerce_value(trimmed, mapping.field_type);
            if let Some(value) = coerced {
                row.attributes.push(StagedAttribute {
                    field_name: mapping.normalized_name.clone(),
                    field_label: mapping.field_label.clone(),
                    field_value: value.as_display(),
                    field_type: mapping.field_type,
                });
            }
        }
    }

    if row.sku_id.as_deref().unwrap_or("").is_empty() {
        row.flag_error("SKU ID is required");
    }
    if let Some(price) = row.price
        && price < 0.0
    {
        row.flag_warning(format!("negative price {price}"));
    }
    row
}

fn apply_fixed_column(row: &mut StagedRow, column: &str, cell: &str) {
    match column {
        "sku_id" => row.sku_id = Some(cell.to_string()),
        "price" => match coerce_value(cell, FieldType::Number) {
            Some(Value::Number(n)) => row.price = Some(n),
            _ => row.flag_warning(format!("price '{cell}' is not numeric, ignored")),
        },
        "category_id" => match cell.parse::<i64>() {
            Ok(id) => row.category_id = Some(id),
            Err(_) => row.flag_warning(format!("category_id '{cell}' is not an integer, ignored")),
        },
        "manufacturer" => row.manufacturer = Some(cell.to_string()),
        "supplier" => row.supplier = Some(cell.to_string()),
        "image_url" => row.image_url = Some(cell.to_string()),
        other => {
            // Standard-flagged mapping onto an unknown column; keep the
            // data as a dynamic attribute rather than dropping it.
            row.attributes.push(StagedAttribute {
                field_name: other.to_string(),
                field_label: other.to_string(),
                field_value: cell.to_string(),
                field_type: FieldType::String,
            });
        }
    }
}

/// Per-row outcome of a commit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase", tag = "outcome")]
pub enum RowOutcome {
    Created { index: usize, product_id: ProductId, sku_id: String },
    Duplicate { index: usize, sku_id: String },
    Invalid { index: usize, messages: Vec<String> },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommitReport {
    pub created: usize,
    pub duplicates: usize,
    pub invalid: usize,
    pub rows: Vec<RowOutcome>,
}

/// Validate-then-commit-all: if any row is invalid or collides with an
/// existing or in-batch SKU, nothing is written and every offending row
/// is reported.
pub fn commit_all(store: &mut MemoryStore, staged: &StagedUpload) -> CatalogResult<CommitReport> {
    let mut offenders = Vec::new();
    let mut seen_skus = Vec::new();
    for row in &staged.rows {
        if row.status == ValidationStatus::Error {
            offenders.push(format!("row {}: {}", row.index, row.messages.join(", ")));
            continue;
        }
        let sku = row.sku_id.as_deref().unwrap_or_default();
        if store.product_by_sku(staged.tenant_id, sku).is_some()
            || seen_skus.contains(&sku.to_string())
        {
            offenders.push(format!("row {}: duplicate SKU '{sku}'", row.index));
        }
        seen_skus.push(sku.to_string());
    }
    if !offenders.is_empty() {
        return Err(CatalogError::BatchRejected { rows: offenders });
    }

    store.transaction(|store| {
        let mut report = CommitReport::default();
        for row in &staged.rows {
            let product_id = insert_staged_row(store, staged.tenant_id, row)?;
            report.created += 1;
            report.rows.push(RowOutcome::Created {
                index: row.index,
                product_id,
                sku_id: row.sku_id.clone().unwrap_or_default(),
            });
        }
        persist_mappings(store, staged);
        info!(
            "Committed {} product(s) for tenant {} from '{}'",
            report.created, staged.tenant_id, staged.file_name
        );
        Ok(report)
    })
}

/// Preview-then-explicit-save: invalid and duplicate rows are excluded
/// and reported, everything else commits in one transaction.
pub fn commit_valid(store: &mut MemoryStore, staged: &StagedUpload) -> CatalogResult<CommitReport> {
    store.transaction(|store| {
        let mut report = CommitReport::default();
        for row in &staged.rows {
            if row.status == ValidationStatus::Error {
                report.invalid += 1;
                report.rows.push(RowOutcome::Invalid {
                    index: row.index,
                    messages: row.messages.clone(),
                });
                continue;
            }
            let sku = row.sku_id.clone().unwrap_or_default();
            if store.product_by_sku(staged.tenant_id, &sku).is_some() {
                report.duplicates += 1;
                report.rows.push(RowOutcome::Duplicate {
                    index: row.index,
                    sku_id: sku,
                });
                continue;
            }
            let product_id = insert_staged_row(store, staged.tenant_id, row)?;
            report.created += 1;
            report.rows.push(RowOutcome::Created {
                index: row.index,
                product_id,
                sku_id: sku,
            });
        }
        persist_mappings(store, staged);
        info!(
            "Saved {} product(s) for tenant {} ({} duplicate(s), {} invalid)",
            report.created, staged.tenant_id, report.duplicates, report.invalid
        );
        Ok(report)
    })
}

fn insert_staged_row(
    store: &mut MemoryStore,
    tenant_id: TenantId,
    row: &StagedRow,
) -> CatalogResult<ProductId> {
    let product_id = store.insert_product(NewProduct {
        tenant_id,
        category_id: row.category_id,
        sku_id: row.sku_id.clone().unwrap_or_default(),
        price: row.price,
        manufacturer: row.manufacturer.clone(),
        supplier: row.supplier.clone(),
        image_url: row.image_url.clone(),
    })?;
    for attribute in &row.attributes {
        store.upsert_attribute_value(AttributeValue {
            product_id,
            field_name: attribute.field_name.clone(),
            field_label: attribute.field_label.clone(),
            field_value: attribute.field_value.clone(),
            field_type: attribute.field_type,
        });
    }
    Ok(product_id)
}

fn persist_mappings(store: &mut MemoryStore, staged: &StagedUpload) {
    for mapping in &staged.mappings {
        store.record_mapping(AttributeMapping {
            tenant_id: staged.tenant_id,
            original_name: mapping.original_name.clone(),
            normalized_name: mapping.normalized_name.clone(),
            field_label: mapping.field_label.clone(),
            field_type: mapping.field_type,
            is_standard: mapping.is_standard,
        });
    }
}
