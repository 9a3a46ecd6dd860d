//! Integration tests for the ptycho binary
//!
//! These run the built executable against fixture files in a temporary directory.

use ndarray::{Array2, Array3};
use ptycho_core::models::{AssembledPatterns, PositionSequence, Product, ProductMetadata, ScanPoint};
use ptycho_store::io;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn ptycho(dir: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_ptycho"));
    command
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .env_remove("PTYCHO_ALGORITHM")
        .env_remove("PTYCHO_STRATEGY")
        .env_remove("PTYCHO_DATA_DIRECTORY")
        .env_remove("PTYCHO_WATCHDOG_DELAY_S");
    command
}

fn json_stdout(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).expect("Output should be valid JSON")
}

/// Patterns for indexes `0..count` and a product scanning the same indexes
fn write_fixture(dir: &Path, count: i64) -> (PathBuf, PathBuf) {
    let patterns_path = dir.join("scan1.patterns.json");
    let patterns = AssembledPatterns::new(
        (0..count).collect(),
        Array3::zeros((count as usize, 3, 4)),
        Some(Array2::from_elem((3, 4), false)),
    )
    .unwrap();
    io::write_patterns(&patterns_path, &patterns).unwrap();

    let product_path = dir.join("scan1.product.json");
    let positions: PositionSequence = (0..count)
        .map(|i| ScanPoint::new(i, i as f64 * 1e-6, 0.0))
        .collect();
    let product = Product::new(ProductMetadata::named("scan1")).with_positions(positions);
    io::write_product(&product_path, &product).unwrap();

    (patterns_path, product_path)
}

#[test]
fn test_reconstruct_writes_output() {
    let dir = TempDir::new().unwrap();
    let (patterns, input) = write_fixture(dir.path(), 4);
    let output_path = dir.path().join("result.json");

    let output = ptycho(dir.path())
        .arg("reconstruct")
        .arg("--patterns")
        .arg(&patterns)
        .arg("--input")
        .arg(&input)
        .arg("--output")
        .arg(&output_path)
        .arg("--json")
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let parsed = json_stdout(&output);
    assert_eq!(parsed["status"], "success");
    assert_eq!(parsed["data"]["reconstructor"], "Passthrough");

    let saved = io::read_product(&output_path).unwrap();
    assert_eq!(saved.name(), "scan1_Passthrough");
    assert_eq!(saved.positions.len(), 4);
}

#[test]
fn test_reconstruct_split_writes_both_halves() {
    let dir = TempDir::new().unwrap();
    let (patterns, input) = write_fixture(dir.path(), 5);

    let output = ptycho(dir.path())
        .args(["reconstruct", "--split", "--output", "result.json"])
        .arg("--patterns")
        .arg(&patterns)
        .arg("--input")
        .arg(&input)
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let odd = io::read_product(&dir.path().join("result.odd.json")).unwrap();
    let even = io::read_product(&dir.path().join("result.even.json")).unwrap();
    assert_eq!(odd.name(), "scan1_Passthrough_odd");
    assert_eq!(odd.positions.indexes(), vec![1, 3]);
    assert_eq!(even.positions.indexes(), vec![0, 2, 4]);
}

#[test]
fn test_reconstruct_transformed_writes_every_preset() {
    let dir = TempDir::new().unwrap();
    let (patterns, input) = write_fixture(dir.path(), 3);

    let output = ptycho(dir.path())
        .args(["reconstruct", "--transformed", "--output", "result.json", "--json"])
        .arg("--patterns")
        .arg(&patterns)
        .arg("--input")
        .arg(&input)
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(json_stdout(&output)["data"]["outputs"].as_array().unwrap().len(), 8);

    let identity = io::read_product(&dir.path().join("result.preset0.json")).unwrap();
    assert_eq!(identity.positions.as_slice()[1].position_x_m, 1e-6);

    // preset 1 negates x
    let flipped = io::read_product(&dir.path().join("result.preset1.json")).unwrap();
    assert!(flipped.name().starts_with("scan1_Passthrough_(y, x)"));
    assert_eq!(flipped.positions.as_slice()[1].position_x_m, -1e-6);
}

#[test]
fn test_reconstruct_split_and_transformed_conflict() {
    let dir = TempDir::new().unwrap();
    let (patterns, input) = write_fixture(dir.path(), 2);

    let output = ptycho(dir.path())
        .args(["reconstruct", "--split", "--transformed", "--output", "out.json"])
        .arg("--patterns")
        .arg(&patterns)
        .arg("--input")
        .arg(&input)
        .output()
        .unwrap();

    assert!(!output.status.success());
}

#[test]
fn test_reconstruct_unknown_algorithm_fails() {
    let dir = TempDir::new().unwrap();
    let (patterns, input) = write_fixture(dir.path(), 2);

    let output = ptycho(dir.path())
        .args(["reconstruct", "--algorithm", "Gerchberg", "--output", "out.json"])
        .arg("--patterns")
        .arg(&patterns)
        .arg("--input")
        .arg(&input)
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("ptycho plugins"));
    assert!(!dir.path().join("out.json").exists());
}

#[test]
fn test_batch_unknown_action_exits_255() {
    let dir = TempDir::new().unwrap();

    let output = ptycho(dir.path())
        .args(["batch", "polish", "in.json", "out.json"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(255));
}

#[test]
fn test_batch_reconstruct() {
    let dir = TempDir::new().unwrap();
    let (patterns, input) = write_fixture(dir.path(), 3);

    let output = ptycho(dir.path())
        .arg("batch")
        .arg("reconstruct")
        .arg(&input)
        .arg("out.json")
        .arg("--patterns")
        .arg(&patterns)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    assert!(dir.path().join("out.json").exists());
}

#[test]
fn test_train_non_trainable_exits_with_result_code() {
    let dir = TempDir::new().unwrap();

    let output = ptycho(dir.path())
        .args(["train", "--input", "data", "--output", "model.bin", "--json"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(255));
    assert_eq!(json_stdout(&output)["data"]["result"], -1);
    assert!(!dir.path().join("model.bin").exists());
}

#[test]
fn test_match_filters_indexes() {
    let dir = TempDir::new().unwrap();
    let (patterns, input) = write_fixture(dir.path(), 6);

    let output = ptycho(dir.path())
        .args(["match", "--filter", "odd", "--json"])
        .arg("--patterns")
        .arg(&patterns)
        .arg("--input")
        .arg(&input)
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let parsed = json_stdout(&output);
    let indexes: Vec<i64> = parsed["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["index"].as_i64().unwrap())
        .collect();
    assert_eq!(indexes, vec![1, 3, 5]);
}

#[test]
fn test_plugins_lists_builtins() {
    let dir = TempDir::new().unwrap();

    let output = ptycho(dir.path()).args(["plugins", "--json"]).output().unwrap();

    assert!(output.status.success());
    let parsed = json_stdout(&output);
    let names: Vec<&str> = parsed["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["simple_name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"Passthrough"));
    assert!(names.contains(&"ProductFile"));
    assert!(names.contains(&"ScanCorrelation"));
}

#[test]
fn test_config_reports_sources() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("ptycho.toml"),
        "[automation]\nstrategy = \"ScanCorrelation\"\n",
    )
    .unwrap();

    let output = ptycho(dir.path())
        .args(["config", "--json"])
        .env("PTYCHO_WATCHDOG_DELAY_S", "5")
        .output()
        .unwrap();

    assert!(output.status.success());
    let parsed = json_stdout(&output);
    let rows = parsed["data"].as_array().unwrap();
    let find = |key: &str| {
        rows.iter()
            .find(|row| row["key"] == key)
            .cloned()
            .unwrap()
    };

    assert_eq!(find("automation.strategy")["source"], "File");
    assert_eq!(find("automation.watchdog_delay_s")["value"], "5");
    assert_eq!(find("automation.watchdog_delay_s")["source"], "Environment");
    assert_eq!(find("reconstructor.algorithm")["source"], "Default");
}

#[test]
fn test_missing_config_file_fails() {
    let dir = TempDir::new().unwrap();

    let output = ptycho(dir.path())
        .args(["config", "--config", "missing.toml"])
        .output()
        .unwrap();

    assert!(!output.status.success());
}

#[test]
fn test_watch_processes_existing_scan_files() {
    let dir = TempDir::new().unwrap();
    let positions = dir.path().join("positions");
    fs::create_dir_all(&positions).unwrap();

    let patterns = AssembledPatterns::new(
        vec![0, 1],
        Array3::zeros((2, 3, 4)),
        Some(Array2::from_elem((3, 4), false)),
    )
    .unwrap();
    io::write_patterns(&dir.path().join("patterns").join("scan3.patterns.json"), &patterns).unwrap();
    fs::write(
        positions.join("scan3.csv"),
        "index,position_x_m,position_y_m\n0,0.0,0.0\n1,1e-6,0.0\n",
    )
    .unwrap();

    let output = ptycho(dir.path())
        .args([
            "watch",
            "--strategy",
            "Scan Correlation",
            "--delay",
            "0",
            "--polling",
            "--existing",
            "--timeout",
            "4",
            "--json",
        ])
        .arg("--directory")
        .arg(&positions)
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let parsed = json_stdout(&output);
    assert_eq!(parsed["data"]["strategy"], "ScanCorrelation");
    assert_eq!(parsed["data"]["datasets"][0]["state"], "Complete");

    let saved = io::read_product(&dir.path().join("reconstructions").join("scan3.product.json")).unwrap();
    assert_eq!(saved.positions.len(), 2);
}
