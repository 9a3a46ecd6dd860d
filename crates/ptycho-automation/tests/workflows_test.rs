//! End-to-end runs of the built-in workflows against a real reconstructor context

use ndarray::{Array2, Array3};
use ptycho_automation::workflows::register_workflows;
use ptycho_automation::AutomationCore;
use ptycho_core::config::{AutomationSettings, FailurePolicy, ReconstructorSettings};
use ptycho_core::models::{AssembledPatterns, AutomationDatasetState, PositionSequence, Product, ProductMetadata, ScanPoint};
use ptycho_core::plugins::PluginRegistry;
use ptycho_core::ports::WorkflowApi;
use ptycho_reconstruct::builtin::register_builtins;
use ptycho_reconstruct::ReconstructorContext;
use ptycho_store::io;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn contexts(strategy: &str, directory: &Path) -> (ReconstructorContext, AutomationCore) {
    let mut registry = PluginRegistry::new();
    register_builtins(&mut registry);
    register_workflows(&mut registry);

    let context = ReconstructorContext::new(
        registry.reconstructors,
        registry.probe_builders,
        registry.object_builders,
        &ReconstructorSettings::default(),
    );
    context.start().unwrap();

    let settings = AutomationSettings {
        strategy: strategy.to_string(),
        data_directory: directory.to_path_buf(),
        processing_interval_s: 0,
        use_polling_observer: true,
        watchdog_delay_s: 0,
        failure_policy: FailurePolicy::Fail,
    };
    let api: Arc<dyn WorkflowApi> = Arc::new(context.workflow_api().clone());
    let core = AutomationCore::new(settings, registry.file_based_workflows, api);
    core.start().unwrap();

    (context, core)
}

fn write_patterns(path: &Path, count: i64) {
    let patterns = AssembledPatterns::new(
        (0..count).collect(),
        Array3::zeros((count as usize, 3, 4)),
        Some(Array2::from_elem((3, 4), false)),
    )
    .unwrap();
    io::write_patterns(path, &patterns).unwrap();
}

fn wait_for_state(core: &AutomationCore, path: &Path, state: AutomationDatasetState) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        core.execute_waiting_tasks();
        if core.repository().state_of(path) == Some(state) {
            return true;
        }
        thread::sleep(Duration::from_millis(50));
    }
    false
}

#[test]
fn test_product_file_workflow_reconstructs_existing_products() {
    let dir = TempDir::new().unwrap();
    let (context, core) = contexts("Product File", dir.path());
    assert_eq!(core.strategy().as_deref(), Some("ProductFile"));

    let patterns_path = dir.path().join("patterns.json");
    write_patterns(&patterns_path, 4);
    context.workflow_api().open_patterns(&patterns_path).unwrap();

    let product_path = dir.path().join("day1").join("scan9.product.json");
    let positions: PositionSequence = (0..4).map(|i| ScanPoint::new(i, 0.0, 0.0)).collect();
    io::write_product(
        &product_path,
        &Product::new(ProductMetadata::named("scan9")).with_positions(positions),
    )
    .unwrap();

    assert_eq!(core.load_existing_datasets().unwrap(), 1);
    assert!(wait_for_state(&core, &product_path, AutomationDatasetState::Complete));

    let output = io::read_product(&dir.path().join("day1").join("scan9.Passthrough.json")).unwrap();
    assert_eq!(output.name(), "scan9_Passthrough");
    assert_eq!(output.positions.len(), 4);

    core.stop();
    context.stop();
}

#[test]
fn test_product_file_workflow_fails_without_patterns() {
    let dir = TempDir::new().unwrap();
    let (context, core) = contexts("ProductFile", dir.path());

    let product_path = dir.path().join("scan2.product.json");
    io::write_product(&product_path, &Product::new(ProductMetadata::named("scan2"))).unwrap();

    core.load_existing_datasets().unwrap();
    assert!(wait_for_state(&core, &product_path, AutomationDatasetState::Failed));
    assert!(!dir.path().join("scan2.Passthrough.json").exists());

    core.stop();
    context.stop();
}

#[test]
fn test_scan_correlation_workflow_pairs_positions_with_patterns() {
    let dir = TempDir::new().unwrap();
    let positions_dir = dir.path().join("positions");
    fs::create_dir_all(&positions_dir).unwrap();
    let (context, core) = contexts("Scan Correlation", &positions_dir);

    write_patterns(&dir.path().join("patterns").join("scan7.patterns.json"), 3);
    let scan_path: PathBuf = positions_dir.join("scan7.csv");
    fs::write(
        &scan_path,
        "index,position_x_m,position_y_m\n0,0.0,0.0\n1,1e-6,0.0\n2,2e-6,0.0\n",
    )
    .unwrap();

    assert_eq!(core.load_existing_datasets().unwrap(), 1);
    assert!(wait_for_state(&core, &scan_path, AutomationDatasetState::Complete));

    let output = io::read_product(&dir.path().join("reconstructions").join("scan7.product.json")).unwrap();
    assert_eq!(output.name(), "scan7_Passthrough");
    assert_eq!(output.positions.len(), 3);

    core.stop();
    context.stop();
}
