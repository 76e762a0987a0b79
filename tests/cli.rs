use std::{fs, io::Write};

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::tempdir;

fn write_products_csv(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("products.csv");
    let mut file = fs::File::create(&path).expect("create products csv");
    writeln!(file, "sku_id,price,Brand").unwrap();
    writeln!(file, "A1,9.99,Nike").unwrap();
    writeln!(file, "A2,19.99,Adidas").unwrap();
    path
}

fn bin() -> Command {
    Command::cargo_bin("attrcat").expect("binary exists")
}

#[test]
fn analyze_reports_staged_rows_without_writing_the_store() {
    let dir = tempdir().unwrap();
    let csv_path = write_products_csv(&dir);
    let store_path = dir.path().join("catalog.json");

    bin()
        .args([
            "analyze",
            "-i",
            csv_path.to_str().unwrap(),
            "--tenant",
            "1",
            "--store",
            store_path.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(contains("\"brand\""))
        .stdout(contains("\"total_rows\": 2"));

    assert!(!store_path.exists(), "analyze must not create the store");
}

#[test]
fn upload_then_search_round_trip() {
    let dir = tempdir().unwrap();
    let csv_path = write_products_csv(&dir);
    let store_path = dir.path().join("catalog.json");
    let store = store_path.to_str().unwrap();

    bin()
        .args([
            "upload",
            "-i",
            csv_path.to_str().unwrap(),
            "--tenant",
            "1",
            "--store",
            store,
        ])
        .assert()
        .success()
        .stdout(contains("\"created\": 2"));

    bin()
        .args([
            "fields",
            "set",
            "--tenant",
            "1",
            "--store",
            store,
            "--field",
            "brand",
            "--searchable",
            "true",
        ])
        .assert()
        .success();

    bin()
        .args([
            "search",
            "--tenant",
            "1",
            "--store",
            store,
            "--filter",
            "brand=Nike",
        ])
        .assert()
        .success()
        .stdout(contains("\"A1\""))
        .stdout(contains("\"total_items\": 1"));
}

#[test]
fn search_without_configuration_reports_diagnostic() {
    let dir = tempdir().unwrap();
    let csv_path = write_products_csv(&dir);
    let store_path = dir.path().join("catalog.json");
    let store = store_path.to_str().unwrap();

    bin()
        .args([
            "upload",
            "-i",
            csv_path.to_str().unwrap(),
            "--tenant",
            "1",
            "--store",
            store,
        ])
        .assert()
        .success();

    bin()
        .args(["search", "--tenant", "1", "--store", store])
        .assert()
        .success()
        .stdout(contains("No searchable fields configured"));
}

#[test]
fn unsupported_upload_format_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("products.xls");
    fs::write(&path, "binary blob").unwrap();

    bin()
        .args([
            "analyze",
            "-i",
            path.to_str().unwrap(),
            "--tenant",
            "1",
            "--store",
            dir.path().join("catalog.json").to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(contains("unsupported file format"));
}

#[test]
fn staged_save_skips_duplicates() {
    let dir = tempdir().unwrap();
    let csv_path = write_products_csv(&dir);
    let store_path = dir.path().join("catalog.json");
    let staging_path = dir.path().join("staged.json");
    let store = store_path.to_str().unwrap();

    bin()
        .args([
            "upload",
            "-i",
            csv_path.to_str().unwrap(),
            "--tenant",
            "1",
            "--store",
            store,
        ])
        .assert()
        .success();

    bin()
        .args([
            "analyze",
            "-i",
            csv_path.to_str().unwrap(),
            "--tenant",
            "1",
            "--store",
            store,
            "--staging",
            staging_path.to_str().unwrap(),
        ])
        .assert()
        .success();

    bin()
        .args([
            "save",
            "--staging",
            staging_path.to_str().unwrap(),
            "--store",
            store,
        ])
        .assert()
        .success()
        .stdout(contains("\"duplicates\": 2"))
        .stdout(contains("\"created\": 0"));
}
