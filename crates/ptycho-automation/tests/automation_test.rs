//! Tests for the automation pipeline: debounce, failure handling, and watching

use parking_lot::Mutex;
use ptycho_automation::{AutomationCore, AutomationDatasetBuffer, AutomationDatasetProcessor, AutomationDatasetRepository};
use ptycho_core::config::{AutomationSettings, FailurePolicy, ReconstructorSettings};
use ptycho_core::error::{PtychoError, Result};
use ptycho_core::models::AutomationDatasetState;
use ptycho_core::plugins::{PluginChooser, PluginRegistry};
use ptycho_core::ports::{FileBasedWorkflow, WorkflowApi};
use ptycho_reconstruct::builtin::register_builtins;
use ptycho_reconstruct::ReconstructorContext;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Records executions; fails the first `failures` of them
struct RecordingWorkflow {
    pattern: String,
    recursive: bool,
    failures: AtomicU32,
    panics: bool,
    executions: Mutex<Vec<(PathBuf, Instant)>>,
}

impl RecordingWorkflow {
    fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            recursive: false,
            failures: AtomicU32::new(0),
            panics: false,
            executions: Mutex::new(Vec::new()),
        }
    }

    fn failing(mut self, failures: u32) -> Self {
        self.failures = AtomicU32::new(failures);
        self
    }

    fn executions(&self) -> Vec<(PathBuf, Instant)> {
        self.executions.lock().clone()
    }
}

impl FileBasedWorkflow for RecordingWorkflow {
    fn is_watch_recursive(&self) -> bool {
        self.recursive
    }

    fn watch_file_pattern(&self) -> String {
        self.pattern.clone()
    }

    fn execute(&self, _api: &dyn WorkflowApi, file_path: &Path) -> Result<()> {
        self.executions
            .lock()
            .push((file_path.to_path_buf(), Instant::now()));

        if self.panics {
            panic!("workflow bug");
        }

        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(PtychoError::Reconstruction("cluster unavailable".to_string()));
        }
        Ok(())
    }
}

fn settings(directory: &Path, delay_s: u64, failure_policy: FailurePolicy) -> AutomationSettings {
    AutomationSettings {
        strategy: "Recording".to_string(),
        data_directory: directory.to_path_buf(),
        processing_interval_s: 0,
        use_polling_observer: true,
        watchdog_delay_s: delay_s,
        failure_policy,
    }
}

fn reconstructor_context() -> ReconstructorContext {
    let mut registry = PluginRegistry::new();
    register_builtins(&mut registry);
    ReconstructorContext::new(
        registry.reconstructors,
        registry.probe_builders,
        registry.object_builders,
        &ReconstructorSettings::default(),
    )
}

fn workflow_api(context: &ReconstructorContext) -> Arc<dyn WorkflowApi> {
    Arc::new(context.workflow_api().clone())
}

fn processor_with(
    workflow: Arc<RecordingWorkflow>,
    settings: AutomationSettings,
) -> (Arc<AutomationDatasetRepository>, AutomationDatasetProcessor) {
    let context = reconstructor_context();
    let repository = Arc::new(AutomationDatasetRepository::new());
    let processor = AutomationDatasetProcessor::new(
        Arc::new(parking_lot::RwLock::new(settings)),
        Arc::clone(&repository),
        workflow,
        workflow_api(&context),
    );
    (repository, processor)
}

fn queue_settled(repository: &AutomationDatasetRepository, processor: &AutomationDatasetProcessor, path: &Path) {
    repository.put(path, AutomationDatasetState::Exists);
    repository.put(path, AutomationDatasetState::Waiting);
    processor.put(path);
}

fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(50));
    }
    condition()
}

#[test]
fn test_burst_of_events_processed_once_after_quiet_period() {
    let workflow = Arc::new(RecordingWorkflow::new("*.h5"));
    let settings = Arc::new(parking_lot::RwLock::new(settings(
        Path::new("/data"),
        3,
        FailurePolicy::Fail,
    )));
    let context = reconstructor_context();
    let repository = Arc::new(AutomationDatasetRepository::new());
    let processor = Arc::new(AutomationDatasetProcessor::new(
        Arc::clone(&settings),
        Arc::clone(&repository),
        workflow.clone(),
        workflow_api(&context),
    ));
    let buffer = AutomationDatasetBuffer::new(settings, Arc::clone(&repository), Arc::clone(&processor));
    processor.start().unwrap();
    buffer.start().unwrap();

    let path = Path::new("/data/scan001.h5");
    buffer.put(path);
    thread::sleep(Duration::from_secs(1));
    buffer.put(path);
    thread::sleep(Duration::from_secs(1));
    let third_touch = Instant::now();
    buffer.put(path);
    assert_eq!(repository.state_of(path), Some(AutomationDatasetState::Exists));

    assert!(wait_until(Duration::from_secs(10), || !workflow.executions().is_empty()));
    thread::sleep(Duration::from_millis(1500));

    let executions = workflow.executions();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].0, path);
    assert!(executions[0].1 >= third_touch + Duration::from_secs(3));
    assert!(wait_until(Duration::from_secs(2), || {
        repository.state_of(path) == Some(AutomationDatasetState::Complete)
    }));
    assert!(buffer.is_empty());

    buffer.stop();
    processor.stop();
}

#[test]
fn test_fail_policy_marks_dataset_failed() {
    let workflow = Arc::new(RecordingWorkflow::new("*").failing(1));
    let (repository, processor) =
        processor_with(workflow.clone(), settings(Path::new("."), 0, FailurePolicy::Fail));
    let path = Path::new("scan1.csv");

    queue_settled(&repository, &processor, path);
    assert!(processor.run_once());

    assert_eq!(repository.state_of(path), Some(AutomationDatasetState::Failed));
    assert_eq!(processor.pending(), 0);
    assert!(!processor.run_once());
}

#[test]
fn test_retry_policy_gives_up_after_max_attempts() {
    let workflow = Arc::new(RecordingWorkflow::new("*").failing(10));
    let policy = FailurePolicy::Retry {
        max_attempts: 3,
        backoff: Duration::ZERO,
    };
    let (repository, processor) = processor_with(workflow.clone(), settings(Path::new("."), 0, policy));
    let path = Path::new("scan2.csv");

    queue_settled(&repository, &processor, path);

    assert!(processor.run_once());
    assert_eq!(repository.state_of(path), Some(AutomationDatasetState::Waiting));
    assert_eq!(processor.pending(), 1);

    assert!(processor.run_once());
    assert!(processor.run_once());
    assert_eq!(repository.state_of(path), Some(AutomationDatasetState::Failed));
    assert_eq!(workflow.executions().len(), 3);
    assert!(!processor.run_once());
}

#[test]
fn test_retry_policy_recovers_from_transient_failure() {
    let workflow = Arc::new(RecordingWorkflow::new("*").failing(1));
    let policy = FailurePolicy::Retry {
        max_attempts: 3,
        backoff: Duration::ZERO,
    };
    let (repository, processor) = processor_with(workflow.clone(), settings(Path::new("."), 0, policy));
    let path = Path::new("scan3.csv");

    queue_settled(&repository, &processor, path);
    assert!(processor.run_once());
    assert!(processor.run_once());

    assert_eq!(repository.state_of(path), Some(AutomationDatasetState::Complete));
    assert_eq!(workflow.executions().len(), 2);
}

#[test]
fn test_retry_waits_for_backoff() {
    let workflow = Arc::new(RecordingWorkflow::new("*").failing(1));
    let policy = FailurePolicy::Retry {
        max_attempts: 2,
        backoff: Duration::from_millis(300),
    };
    let (repository, processor) = processor_with(workflow.clone(), settings(Path::new("."), 0, policy));
    let path = Path::new("scan4.csv");

    queue_settled(&repository, &processor, path);
    assert!(processor.run_once());
    assert!(!processor.run_once());

    thread::sleep(Duration::from_millis(400));
    assert!(processor.run_once());
    assert_eq!(repository.state_of(path), Some(AutomationDatasetState::Complete));
}

#[test]
fn test_panicking_workflow_is_contained() {
    let mut workflow = RecordingWorkflow::new("*");
    workflow.panics = true;
    let workflow = Arc::new(workflow);
    let (repository, processor) =
        processor_with(workflow.clone(), settings(Path::new("."), 0, FailurePolicy::Fail));
    let path = Path::new("scan5.csv");

    queue_settled(&repository, &processor, path);
    assert!(processor.run_once());

    assert_eq!(repository.state_of(path), Some(AutomationDatasetState::Failed));
}

#[test]
fn test_processing_interval_separates_jobs() {
    let workflow = Arc::new(RecordingWorkflow::new("*"));
    let mut automation = settings(Path::new("."), 0, FailurePolicy::Fail);
    automation.processing_interval_s = 1;
    let (repository, processor) = processor_with(workflow.clone(), automation);

    queue_settled(&repository, &processor, Path::new("a.csv"));
    queue_settled(&repository, &processor, Path::new("b.csv"));

    assert!(processor.run_once());
    assert!(!processor.run_once());
    assert_eq!(processor.pending(), 1);

    thread::sleep(Duration::from_millis(1100));
    assert!(processor.run_once());

    let executions = workflow.executions();
    assert_eq!(executions.len(), 2);
    assert!(executions[1].1 - executions[0].1 >= Duration::from_secs(1));
}

#[test]
fn test_stop_interrupts_processing_interval() {
    let workflow = Arc::new(RecordingWorkflow::new("*"));
    let mut automation = settings(Path::new("."), 0, FailurePolicy::Fail);
    automation.processing_interval_s = 6;
    let (repository, processor) = processor_with(workflow.clone(), automation);

    queue_settled(&repository, &processor, Path::new("a.csv"));
    queue_settled(&repository, &processor, Path::new("b.csv"));
    processor.start().unwrap();

    assert!(wait_until(Duration::from_secs(5), || workflow.executions().len() == 1));
    thread::sleep(Duration::from_millis(1500));

    let tic = Instant::now();
    processor.stop();
    assert!(tic.elapsed() < Duration::from_millis(1500), "stop took {:?}", tic.elapsed());

    assert_eq!(workflow.executions().len(), 1);
    assert_eq!(processor.pending(), 1);
    assert_eq!(
        repository.state_of(Path::new("b.csv")),
        Some(AutomationDatasetState::Waiting)
    );
}

fn core_with(workflow: Arc<RecordingWorkflow>, settings: AutomationSettings) -> (ReconstructorContext, AutomationCore) {
    let context = reconstructor_context();
    let mut workflows: PluginChooser<dyn FileBasedWorkflow> = PluginChooser::new("file-based workflows");
    workflows.register_plugin(workflow, "Recording", None);
    let core = AutomationCore::new(settings, workflows, workflow_api(&context));
    (context, core)
}

#[test]
fn test_polling_watcher_forwards_matching_files() {
    let dir = TempDir::new().unwrap();
    let workflow = Arc::new(RecordingWorkflow::new("*.dat"));
    let (_context, core) = core_with(workflow.clone(), settings(dir.path(), 0, FailurePolicy::Fail));

    core.start().unwrap();
    core.set_processing_enabled(true).unwrap();
    core.set_watchdog_enabled(true).unwrap();
    assert!(core.is_watchdog_enabled());
    assert!(core.is_processing_enabled());

    fs::write(dir.path().join("frame.dat"), b"data").unwrap();
    fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

    let expected = dir.path().join("frame.dat");
    assert!(wait_until(Duration::from_secs(15), || {
        core.repository().state_of(&expected) == Some(AutomationDatasetState::Complete)
    }));
    assert!(core.refresh_dataset_repository());

    let labels: Vec<String> = core.datasets().into_iter().map(|(label, _)| label).collect();
    assert_eq!(labels, vec![expected.display().to_string()]);

    core.stop();
    assert!(!core.is_watchdog_enabled());
    assert!(!core.is_processing_enabled());
}

#[test]
fn test_watcher_requires_existing_directory() {
    let workflow = Arc::new(RecordingWorkflow::new("*.dat"));
    let (_context, core) = core_with(
        workflow,
        settings(Path::new("/nonexistent/ptycho/data"), 0, FailurePolicy::Fail),
    );

    assert!(matches!(
        core.set_watchdog_enabled(true),
        Err(PtychoError::Watcher(_))
    ));
    assert!(!core.is_watchdog_enabled());
}

#[test]
fn test_load_existing_datasets_honours_recursion() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("nested")).unwrap();
    fs::write(dir.path().join("b.dat"), b"").unwrap();
    fs::write(dir.path().join("a.dat"), b"").unwrap();
    fs::write(dir.path().join("nested").join("c.dat"), b"").unwrap();
    fs::write(dir.path().join("skip.txt"), b"").unwrap();

    let flat = Arc::new(RecordingWorkflow::new("*.dat"));
    let (_context, core) = core_with(flat, settings(dir.path(), 60, FailurePolicy::Fail));
    assert_eq!(core.load_existing_datasets().unwrap(), 2);
    assert_eq!(
        core.datasets(),
        vec![
            (dir.path().join("a.dat").display().to_string(), AutomationDatasetState::Exists),
            (dir.path().join("b.dat").display().to_string(), AutomationDatasetState::Exists),
        ]
    );

    let mut recursive = RecordingWorkflow::new("*.dat");
    recursive.recursive = true;
    let (_context, core) = core_with(Arc::new(recursive), settings(dir.path(), 60, FailurePolicy::Fail));
    assert_eq!(core.load_existing_datasets().unwrap(), 3);

    core.clear_dataset_repository();
    assert!(core.datasets().is_empty());
}

#[test]
fn test_settings_are_clamped() {
    let workflow = Arc::new(RecordingWorkflow::new("*"));
    let (_context, core) = core_with(workflow, settings(Path::new("."), 0, FailurePolicy::Fail));

    core.set_processing_interval_s(5000);
    core.set_watchdog_delay_s(42);

    assert_eq!(core.settings().processing_interval_s, 600);
    assert_eq!(core.settings().watchdog_delay_s, 42);
}

#[test]
fn test_unknown_strategy_is_rejected() {
    let workflow = Arc::new(RecordingWorkflow::new("*"));
    let (_context, core) = core_with(workflow, settings(Path::new("."), 0, FailurePolicy::Fail));

    assert!(matches!(
        core.set_strategy("Telepathy"),
        Err(PtychoError::PluginNotFound { .. })
    ));
    assert_eq!(core.strategy().as_deref(), Some("Recording"));
    assert_eq!(core.set_strategy("recording").unwrap(), "Recording");
}
