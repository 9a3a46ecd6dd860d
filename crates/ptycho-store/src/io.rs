//! File adapters for products, patterns, scans, and arrays
//!
//! Products, assembled patterns, and probe/object arrays are stored as JSON.
//! Scan positions are read from CSV with an `index,position_x_m,position_y_m`
//! header.

use ndarray::Array3;
use ptycho_core::error::{PtychoError, Result};
use ptycho_core::models::{AssembledPatterns, PositionSequence, Product, ScanPoint};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| PtychoError::Format {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

/// Read a product file
pub fn read_product(path: &Path) -> Result<Product> {
    let mut product: Product = read_json(path)?;

    if product.metadata.name.is_empty() {
        product.metadata.name = default_name(path);
    }

    tracing::debug!(
        "Read product \"{}\" with {} positions from {}",
        product.metadata.name,
        product.positions.len(),
        path.display()
    );
    Ok(product)
}

/// Write a product file, creating parent directories
pub fn write_product(path: &Path, product: &Product) -> Result<()> {
    write_json(path, product)?;
    tracing::debug!("Wrote product \"{}\" to {}", product.metadata.name, path.display());
    Ok(())
}

/// Read an assembled pattern file
pub fn read_patterns(path: &Path) -> Result<AssembledPatterns> {
    let patterns: AssembledPatterns = read_json(path)?;
    patterns.validate()?;
    Ok(patterns)
}

/// Write an assembled pattern file, creating parent directories
pub fn write_patterns(path: &Path, patterns: &AssembledPatterns) -> Result<()> {
    write_json(path, patterns)
}

/// Read a probe or object array
pub fn read_array(path: &Path) -> Result<Array3<f32>> {
    read_json(path)
}

/// Write any serializable value as JSON, creating parent directories
pub fn write_value<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    write_json(path, value)
}

/// Read scan positions from CSV
pub fn read_scan(path: &Path) -> Result<PositionSequence> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| csv_error(path, e))?;

    let mut positions = PositionSequence::default();
    for record in reader.deserialize::<ScanPoint>() {
        positions.push(record.map_err(|e| csv_error(path, e))?);
    }

    tracing::debug!("Read {} scan points from {}", positions.len(), path.display());
    Ok(positions)
}

fn csv_error(path: &Path, err: csv::Error) -> PtychoError {
    PtychoError::Format {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

/// Product name derived from a file name, stripping every extension
pub fn default_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('.').next())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("product")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ptycho_core::models::ProductMetadata;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_product_file_keeps_arrays() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("sample.product.json");

        let mut product = Product::new(ProductMetadata::named("sample"))
            .with_positions(PositionSequence::new(vec![ScanPoint::new(4, 0.25, -0.5)]));
        product.probes = Array3::ones((1, 3, 3));
        product.losses = vec![1.0, 0.5];

        write_product(&path, &product).unwrap();
        let loaded = read_product(&path).unwrap();

        assert_eq!(loaded, product);
    }

    #[test]
    fn test_unnamed_product_takes_file_stem() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scan0042.product.json");
        write_product(&path, &Product::default()).unwrap();

        assert_eq!(read_product(&path).unwrap().name(), "scan0042");
    }

    #[test]
    fn test_read_scan_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scan7.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "index, position_x_m, position_y_m").unwrap();
        writeln!(file, "2, 0.5, 1.5").unwrap();
        writeln!(file, "1, -0.5, 2.5").unwrap();

        let positions = read_scan(&path).unwrap();
        assert_eq!(positions.indexes(), vec![2, 1]);
        assert_eq!(positions.as_slice()[1].position_y_m, 2.5);
    }

    #[test]
    fn test_malformed_scan_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.csv");
        fs::write(&path, "index,position_x_m,position_y_m\nfirst,0,0\n").unwrap();

        match read_scan(&path) {
            Err(PtychoError::Format { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected format error, got {:?}", other),
        }
    }

    #[test]
    fn test_patterns_are_validated_on_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.patterns.json");
        let valid = AssembledPatterns::new(vec![0, 1], Array3::zeros((2, 2, 2)), None).unwrap();
        write_patterns(&path, &valid).unwrap();
        assert_eq!(read_patterns(&path).unwrap().len(), 2);

        let mut raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        raw["indexes"] = serde_json::json!([0, 1, 2]);
        fs::write(&path, raw.to_string()).unwrap();

        assert!(matches!(
            read_patterns(&path),
            Err(PtychoError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_default_name() {
        assert_eq!(default_name(Path::new("/a/b/scan12.product.json")), "scan12");
        assert_eq!(default_name(Path::new("/a/b/.hidden")), "product");
    }
}
