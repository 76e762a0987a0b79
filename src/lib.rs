pub mod catalog;
pub mod cli;
pub mod error;
pub mod ingest;
pub mod model;
pub mod query;
pub mod registry;
pub mod store;
pub mod suggest;
pub mod value;

use std::{env, path::Path, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use itertools::Itertools;
use log::{LevelFilter, info};

use crate::{
    catalog::Catalog,
    cli::{Cli, Commands, FieldsCommand},
    ingest::StagedUpload,
    model::ConfigurationEdit,
    query::FilterRequest,
    store::MemoryStore,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("attrcat", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Analyze(args) => handle_analyze(&args),
        Commands::Upload(args) => handle_upload(&args),
        Commands::Save(args) => handle_save(&args),
        Commands::Search(args) => handle_search(&args),
        Commands::Fields(args) => handle_fields(&args),
    }
}

fn open_catalog(store_path: &Path) -> Result<Catalog> {
    let store = MemoryStore::load_or_default(store_path)
        .with_context(|| format!("Loading store from {store_path:?}"))?;
    Ok(Catalog::new(store))
}

fn persist_catalog(catalog: Catalog, store_path: &Path) -> Result<()> {
    catalog
        .into_store()
        .save(store_path)
        .with_context(|| format!("Writing store to {store_path:?}"))
}

fn handle_analyze(args: &cli::AnalyzeArgs) -> Result<()> {
    let catalog = open_catalog(&args.store)?;
    let staged = catalog
        .analyze(args.tenant, &args.input)
        .with_context(|| format!("Analyzing {:?}", args.input))?;
    info!(
        "Staged {} row(s) from '{}' for tenant {}",
        staged.total_rows, staged.file_name, args.tenant
    );
    if let Some(path) = &args.staging {
        staged.save(path)?;
        info!("Staged upload written to {path:?}");
    }
    println!("{}", serde_json::to_string_pretty(&staged)?);
    Ok(())
}

fn handle_upload(args: &cli::UploadArgs) -> Result<()> {
    let mut catalog = open_catalog(&args.store)?;
    let (_, report) = catalog
        .upload(args.tenant, &args.input)
        .with_context(|| format!("Uploading {:?}", args.input))?;
    persist_catalog(catalog, &args.store)?;
    info!(
        "Created {} product(s) for tenant {}",
        report.created, args.tenant
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn handle_save(args: &cli::SaveArgs) -> Result<()> {
    let staged = StagedUpload::load(&args.staging)?;
    let mut catalog = open_catalog(&args.store)?;
    let report = catalog
        .save_staged(&staged)
        .with_context(|| format!("Saving staged upload {:?}", args.staging))?;
    persist_catalog(catalog, &args.store)?;
    info!(
        "Saved {} product(s) ({} duplicate(s), {} invalid) for tenant {}",
        report.created, report.duplicates, report.invalid, staged.tenant_id
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn handle_search(args: &cli::SearchArgs) -> Result<()> {
    let catalog = open_catalog(&args.store)?;
    let mut request = FilterRequest {
        query: args.query.clone(),
        category_id: args.category,
        scope: args.field_type.into(),
        page: args.page,
        page_size: args.page_size,
        ..Default::default()
    };
    for raw in &args.filters {
        let (name, value) = cli::parse_filter_arg(raw).map_err(|e| anyhow!(e))?;
        request.filters.insert(name, value);
    }
    let result = catalog.search(args.tenant, &request);
    info!(
        "Matched {} product(s) for tenant {}",
        result.pagination.total_items, args.tenant
    );
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn handle_fields(args: &cli::FieldsArgs) -> Result<()> {
    match &args.command {
        FieldsCommand::List { tenant, store } => {
            let mut catalog = open_catalog(store)?;
            let configurations = catalog.field_configurations(*tenant);
            // Listing persists synthesized defaults, so write the store back.
            persist_catalog(catalog, store)?;
            println!("{}", serde_json::to_string_pretty(&configurations)?);
        }
        FieldsCommand::Set(set) => {
            let mut catalog = open_catalog(&set.store)?;
            let edit = ConfigurationEdit {
                field_name: set.field.clone(),
                field_label: set.label.clone(),
                field_type: set.field_type.as_deref().map(str::parse).transpose()?,
                is_searchable: set.searchable,
                is_editable: set.editable,
                is_primary: set.primary,
                is_secondary: set.secondary,
                display_order: set.order,
                description: set.description.clone(),
            };
            let updated = catalog
                .configure_fields(set.tenant, &[edit])
                .with_context(|| format!("Configuring field '{}'", set.field))?;
            persist_catalog(catalog, &set.store)?;
            info!(
                "Updated configuration for {}",
                updated.iter().map(|c| c.field_name.as_str()).join(", ")
            );
            println!("{}", serde_json::to_string_pretty(&updated)?);
        }
    }
    Ok(())
}
