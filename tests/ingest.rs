use std::{fs::File, io::Write, path::PathBuf};

use attrcat::{
    catalog::Catalog,
    error::CatalogError,
    ingest::{self, MAX_UPLOAD_ROWS, ValidationStatus},
    registry,
    store::MemoryStore,
    suggest::HeuristicSuggester,
    value::FieldType,
};
use tempfile::TempDir;

fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = File::create(&path).expect("create temp file");
    file.write_all(contents.as_bytes()).expect("write contents");
    path
}

#[test]
fn analyze_splits_fixed_columns_from_attributes() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "products.csv",
        "sku_id,price,Brand\nA1,9.99,Nike\nA2,,Adidas\n,5,Puma\n",
    );
    let store = MemoryStore::new();
    let staged = ingest::analyze(&store, 1, &path, &HeuristicSuggester).unwrap();

    assert_eq!(staged.total_rows, 3);
    assert!(staged.is_product_data);

    let valid: Vec<_> = staged
        .rows
        .iter()
        .filter(|r| r.status != ValidationStatus::Error)
        .collect();
    assert_eq!(valid.len(), 2);
    assert_eq!(valid[0].sku_id.as_deref(), Some("A1"));
    assert_eq!(valid[0].price, Some(9.99));
    assert_eq!(valid[1].sku_id.as_deref(), Some("A2"));
    assert_eq!(valid[1].price, None);

    // Brand is not a fixed-column synonym, so it stages as an attribute.
    let brand = &valid[0].attributes[0];
    assert_eq!(brand.field_name, "brand");
    assert_eq!(brand.field_type, FieldType::String);
    assert_eq!(brand.field_value, "Nike");

    let error_row = staged
        .rows
        .iter()
        .find(|r| r.status == ValidationStatus::Error)
        .expect("row without SKU flagged");
    assert_eq!(error_row.index, 2);
    assert!(error_row.messages.iter().any(|m| m.contains("SKU")));
}

#[test]
fn analyze_rejects_unsupported_formats_before_parsing() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "products.xlsx", "not a spreadsheet");
    let store = MemoryStore::new();
    let err = ingest::analyze(&store, 1, &path, &HeuristicSuggester).unwrap_err();
    assert!(matches!(err, CatalogError::Format(_)));
}

#[test]
fn analyze_accepts_tab_separated_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "products.tsv", "sku_id\tprice\nA1\t4.50\n");
    let store = MemoryStore::new();
    let staged = ingest::analyze(&store, 1, &path, &HeuristicSuggester).unwrap();
    assert_eq!(staged.rows[0].price, Some(4.5));
}

#[test]
fn upload_over_row_ceiling_fails_with_count_and_commits_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut contents = String::from("sku_id,price\n");
    for i in 0..(MAX_UPLOAD_ROWS + 1) {
        contents.push_str(&format!("SKU{i},1.00\n"));
    }
    let path = write_file(&dir, "big.csv", &contents);

    let mut catalog = Catalog::new(MemoryStore::new());
    let err = catalog.upload(1, &path).unwrap_err();
    match err {
        CatalogError::LimitExceeded { count, limit } => {
            assert_eq!(count, MAX_UPLOAD_ROWS + 1);
            assert_eq!(limit, MAX_UPLOAD_ROWS);
        }
        other => panic!("expected limit error, got {other:?}"),
    }
    assert_eq!(catalog.store().products(1).count(), 0);
}

#[test]
fn upload_mode_rolls_back_whole_batch_on_any_bad_row() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "products.csv", "sku_id,price\nA1,1\n,2\nA3,3\n");
    let mut catalog = Catalog::new(MemoryStore::new());
    let err = catalog.upload(1, &path).unwrap_err();
    match err {
        CatalogError::BatchRejected { rows } => {
            assert_eq!(rows.len(), 1);
            assert!(rows[0].contains("row 1"));
        }
        other => panic!("expected batch rejection, got {other:?}"),
    }
    assert_eq!(catalog.store().products(1).count(), 0);
}

#[test]
fn save_mode_commits_valid_rows_and_reports_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_file(&dir, "first.csv", "sku_id,price\nA1,1\n");
    let second = write_file(&dir, "second.csv", "sku_id,price\nA1,9\nB1,2\n,3\n");

    let mut catalog = Catalog::new(MemoryStore::new());
    catalog.upload(1, &first).unwrap();

    let staged = catalog.analyze(1, &second).unwrap();
    let report = catalog.save_staged(&staged).unwrap();
    assert_eq!(report.created, 1);
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.invalid, 1);

    // The duplicate did not overwrite the original price.
    let existing = catalog.store().product_by_sku(1, "A1").unwrap();
    assert_eq!(existing.price, Some(1.0));
    assert!(catalog.store().product_by_sku(1, "B1").is_some());
}

#[test]
fn sequential_uploads_report_duplicates_without_overwriting() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_file(&dir, "first.csv", "sku_id,manufacturer\nA1,Nike\n");
    let second = write_file(&dir, "second.csv", "sku_id,manufacturer\nA1,Adidas\n");

    let mut catalog = Catalog::new(MemoryStore::new());
    catalog.upload(1, &first).unwrap();
    let err = catalog.upload(1, &second).unwrap_err();
    match err {
        CatalogError::BatchRejected { rows } => {
            assert!(rows[0].contains("A1"));
        }
        other => panic!("expected batch rejection, got {other:?}"),
    }
    let product = catalog.store().product_by_sku(1, "A1").unwrap();
    assert_eq!(product.manufacturer.as_deref(), Some("Nike"));
}

#[test]
fn committed_mappings_keep_repeat_uploads_consistent() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_file(&dir, "first.csv", "sku_id,Warranty (months)\nA1,12\n");
    let second = write_file(&dir, "second.csv", "sku_id,Warranty (months)\nB1,24\n");

    let mut catalog = Catalog::new(MemoryStore::new());
    let (staged_first, _) = catalog.upload(1, &first).unwrap();
    let staged_second = catalog.analyze(1, &second).unwrap();

    let name_first = &staged_first.mappings[1].normalized_name;
    let name_second = &staged_second.mappings[1].normalized_name;
    assert_eq!(name_first, "warranty_months");
    assert_eq!(name_first, name_second);
}

#[test]
fn actual_fields_cover_committed_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "products.csv",
        "sku_id,price,Brand,Color\nA1,9.99,Nike,red\n",
    );
    let mut catalog = Catalog::new(MemoryStore::new());
    catalog.upload(1, &path).unwrap();

    let fields = registry::actual_fields(catalog.store(), 1);
    for expected in ["sku_id", "price", "brand", "color"] {
        assert!(fields.contains(expected), "missing {expected}");
    }
}

#[test]
fn malformed_typed_cells_degrade_to_strings_not_failures() {
    let dir = tempfile::tempdir().unwrap();
    // The header suggests a number, the value is prose.
    let path = write_file(
        &dir,
        "products.csv",
        "sku_id,Shipping Rate\nA1,call for pricing\n",
    );
    let store = MemoryStore::new();
    let staged = ingest::analyze(&store, 1, &path, &HeuristicSuggester).unwrap();
    let row = &staged.rows[0];
    assert_eq!(row.status, ValidationStatus::Valid);
    assert_eq!(row.attributes[0].field_value, "call for pricing");
}

#[test]
fn negative_price_is_a_warning_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "products.csv", "sku_id,price\nA1,-5\n");
    let store = MemoryStore::new();
    let staged = ingest::analyze(&store, 1, &path, &HeuristicSuggester).unwrap();
    assert_eq!(staged.rows[0].status, ValidationStatus::Warning);

    // Warning rows still commit.
    let mut catalog = Catalog::new(MemoryStore::new());
    let (_, report) = catalog.upload(1, &path).unwrap();
    assert_eq!(report.created, 1);
}
