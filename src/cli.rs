use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::registry::FieldScope;

#[derive(Debug, Parser)]
#[command(author, version, about = "Multi-tenant product catalog with dynamic attributes", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Analyze an upload: map headers, coerce values, and report staged rows without committing
    Analyze(AnalyzeArgs),
    /// Analyze and commit an upload in one call (all-or-nothing)
    Upload(UploadArgs),
    /// Commit a previously staged upload, skipping invalid and duplicate rows
    Save(SaveArgs),
    /// Search the catalog using field filters, a general query, or both
    Search(SearchArgs),
    /// Inspect or edit per-attribute field configuration
    Fields(FieldsArgs),
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Input CSV or TSV file
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Tenant id the upload belongs to
    #[arg(short, long)]
    pub tenant: i64,
    /// Catalog store file
    #[arg(short, long, default_value = "catalog.json")]
    pub store: PathBuf,
    /// Write the staged upload to this file for a later `save`
    #[arg(long)]
    pub staging: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct UploadArgs {
    /// Input CSV or TSV file
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Tenant id the upload belongs to
    #[arg(short, long)]
    pub tenant: i64,
    /// Catalog store file
    #[arg(short, long, default_value = "catalog.json")]
    pub store: PathBuf,
}

#[derive(Debug, Args)]
pub struct SaveArgs {
    /// Staged upload file produced by `analyze --staging`
    #[arg(long)]
    pub staging: PathBuf,
    /// Catalog store file
    #[arg(short, long, default_value = "catalog.json")]
    pub store: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
#[value(rename_all = "kebab-case")]
pub enum FieldTypeFilter {
    #[default]
    All,
    Primary,
    Secondary,
}

impl From<FieldTypeFilter> for FieldScope {
    fn from(value: FieldTypeFilter) -> Self {
        match value {
            FieldTypeFilter::All => FieldScope::All,
            FieldTypeFilter::Primary => FieldScope::Primary,
            FieldTypeFilter::Secondary => FieldScope::Secondary,
        }
    }
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Tenant id to search within
    #[arg(short, long)]
    pub tenant: i64,
    /// Catalog store file
    #[arg(short, long, default_value = "catalog.json")]
    pub store: PathBuf,
    /// General text query across all searchable fields
    #[arg(short, long)]
    pub query: Option<String>,
    /// Field-specific filter `name=value[,value...]`, repeatable
    #[arg(short = 'f', long = "filter", action = clap::ArgAction::Append)]
    pub filters: Vec<String>,
    /// Restrict results to a category id
    #[arg(long)]
    pub category: Option<i64>,
    /// Which configured fields to consider (all, primary, secondary)
    #[arg(long = "field-type", value_enum, default_value = "all")]
    pub field_type: FieldTypeFilter,
    /// 1-based result page
    #[arg(long, default_value_t = 1)]
    pub page: usize,
    /// Rows per page
    #[arg(long = "page-size", default_value_t = 20)]
    pub page_size: usize,
}

#[derive(Debug, Args)]
pub struct FieldsArgs {
    #[command(subcommand)]
    pub command: FieldsCommand,
}

#[derive(Debug, Subcommand)]
pub enum FieldsCommand {
    /// List one configuration per field that currently holds data
    List {
        /// Tenant id
        #[arg(short, long)]
        tenant: i64,
        /// Catalog store file
        #[arg(short, long, default_value = "catalog.json")]
        store: PathBuf,
    },
    /// Edit the configuration of a single field
    Set(FieldsSetArgs),
}

#[derive(Debug, Args)]
pub struct FieldsSetArgs {
    /// Tenant id
    #[arg(short, long)]
    pub tenant: i64,
    /// Catalog store file
    #[arg(short, long, default_value = "catalog.json")]
    pub store: PathBuf,
    /// Field name to configure (must currently hold data)
    #[arg(long)]
    pub field: String,
    /// Allow the field in filter requests
    #[arg(long)]
    pub searchable: Option<bool>,
    /// Allow the field in product updates
    #[arg(long)]
    pub editable: Option<bool>,
    /// Mark as a primary field
    #[arg(long)]
    pub primary: Option<bool>,
    /// Mark as a secondary field
    #[arg(long)]
    pub secondary: Option<bool>,
    /// Display order position
    #[arg(long)]
    pub order: Option<u32>,
    /// Human-readable label
    #[arg(long)]
    pub label: Option<String>,
    /// Declared type (string, number, boolean, date)
    #[arg(long = "type")]
    pub field_type: Option<String>,
    /// Free-text description
    #[arg(long)]
    pub description: Option<String>,
}

/// Splits a `name=value` filter argument.
pub fn parse_filter_arg(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("Filter '{raw}' must have the form name=value")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_filter_arg_splits_on_first_equals() {
        let (name, value) = parse_filter_arg("manufacturer=Apple,Sony").unwrap();
        assert_eq!(name, "manufacturer");
        assert_eq!(value, "Apple,Sony");

        let (name, value) = parse_filter_arg("note=a=b").unwrap();
        assert_eq!(name, "note");
        assert_eq!(value, "a=b");

        assert!(parse_filter_arg("no-equals").is_err());
        assert!(parse_filter_arg("=value").is_err());
    }
}
