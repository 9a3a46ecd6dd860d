//! Wiring for the reconstruction side of the pipeline

use ptycho_core::config::ReconstructorSettings;
use ptycho_core::error::{PtychoError, Result};
use ptycho_core::plugins::PluginChooser;
use ptycho_core::ports::{ArrayBuilder, Reconstructor, WorkflowApi};
use ptycho_store::{MemoryPatternStore, ProductRepository};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::api::ReconstructorApi;
use crate::builtin::OutboxRemoteExecutor;
use crate::matcher::DiffractionPatternPositionMatcher;
use crate::queue::ReconstructionQueue;
use crate::workflow::ConcreteWorkflowApi;

/// Action accepted by [`ReconstructorContext::batch_mode_execute`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchAction {
    Reconstruct,
    Train,
}

impl fmt::Display for BatchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchAction::Reconstruct => write!(f, "reconstruct"),
            BatchAction::Train => write!(f, "train"),
        }
    }
}

impl FromStr for BatchAction {
    type Err = PtychoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "reconstruct" => Ok(BatchAction::Reconstruct),
            "train" => Ok(BatchAction::Train),
            _ => Err(PtychoError::ConfigInvalid {
                key: "action".to_string(),
                reason: format!("unknown batch action \"{}\" (expected reconstruct or train)", s),
            }),
        }
    }
}

/// Owns the pattern store, product repository, queue, and APIs
pub struct ReconstructorContext {
    patterns: MemoryPatternStore,
    products: Arc<ProductRepository>,
    queue: Arc<ReconstructionQueue>,
    reconstructor_api: Arc<ReconstructorApi>,
    workflow_api: ConcreteWorkflowApi,
}

impl ReconstructorContext {
    pub fn new(
        reconstructors: PluginChooser<dyn Reconstructor>,
        probe_builders: PluginChooser<dyn ArrayBuilder>,
        object_builders: PluginChooser<dyn ArrayBuilder>,
        settings: &ReconstructorSettings,
    ) -> Self {
        let patterns = MemoryPatternStore::new();
        let products = Arc::new(ProductRepository::new());
        let matcher = Arc::new(DiffractionPatternPositionMatcher::new(
            Arc::new(patterns.clone()),
            Arc::clone(&products),
        ));
        let queue = Arc::new(ReconstructionQueue::new(
            Arc::clone(&products),
            Arc::clone(&matcher),
        ));

        let reconstructors = reconstructors.into_shared();
        let reconstructor_api = Arc::new(ReconstructorApi::new(
            Arc::clone(&queue),
            matcher,
            Arc::clone(&products),
            Arc::clone(&reconstructors),
        ));
        reconstructors.write().synchronize_with(&settings.algorithm);

        let mut workflow_api = ConcreteWorkflowApi::new(
            patterns.clone(),
            Arc::clone(&products),
            Arc::clone(&reconstructor_api),
            probe_builders.into_shared(),
            object_builders.into_shared(),
        );

        if let Some(outbox) = &settings.remote_outbox {
            tracing::info!("Remote reconstructions go to {}", outbox.display());
            workflow_api =
                workflow_api.with_remote_executor(Arc::new(OutboxRemoteExecutor::new(outbox.clone())));
        }

        Self {
            patterns,
            products,
            queue,
            reconstructor_api,
            workflow_api,
        }
    }

    /// Start the reconstruction worker
    pub fn start(&self) -> Result<()> {
        self.queue.start()
    }

    /// Finish queued reconstructions and stop the worker
    pub fn stop(&self) {
        self.queue.stop();
    }

    pub fn patterns(&self) -> &MemoryPatternStore {
        &self.patterns
    }

    pub fn products(&self) -> &Arc<ProductRepository> {
        &self.products
    }

    pub fn reconstructor_api(&self) -> &Arc<ReconstructorApi> {
        &self.reconstructor_api
    }

    pub fn workflow_api(&self) -> &ConcreteWorkflowApi {
        &self.workflow_api
    }

    /// Run a single action without any interactive front end
    ///
    /// Returns the action's result code. An unrecognized action is logged and
    /// yields -1.
    pub fn batch_mode_execute(
        &self,
        action: &str,
        input_path: &Path,
        output_path: &Path,
        patterns_path: Option<&Path>,
    ) -> Result<i32> {
        let action = match action.parse::<BatchAction>() {
            Ok(action) => action,
            Err(err) => {
                tracing::error!("{}", err);
                return Ok(-1);
            }
        };

        tracing::info!("Batch {}: {} -> {}", action, input_path.display(), output_path.display());

        match action {
            BatchAction::Train => {
                let output = self
                    .workflow_api
                    .train_reconstructor(input_path, output_path)?;
                Ok(output.result)
            }
            BatchAction::Reconstruct => {
                self.start()?;

                if let Some(patterns_path) = patterns_path {
                    self.workflow_api.open_patterns(patterns_path)?;
                }

                let input = self.workflow_api.open_product(input_path)?;
                let output = input.reconstruct_local(true)?;
                output.save_product(output_path)?;
                Ok(0)
            }
        }
    }
}
