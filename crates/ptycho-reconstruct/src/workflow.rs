//! Workflow facade over the reconstruction pipeline
//!
//! Site workflows and batch mode only see [`WorkflowApi`] and
//! [`WorkflowProductApi`]. These implementations translate those calls into
//! pattern store, product repository, and reconstructor operations.

use ndarray::Array3;
use ptycho_core::error::{PtychoError, Result};
use ptycho_core::models::{
    PositionSequence, Product, ProductHandle, ProductMetadata, ReconstructInput, ScanIndexFilter,
    TrainOutput,
};
use ptycho_core::plugins::SharedChooser;
use ptycho_core::ports::{ArrayBuilder, PatternSource, RemoteExecutor, WorkflowApi, WorkflowProductApi};
use ptycho_store::{io, MemoryPatternStore, ProductRepository};
use std::path::Path;
use std::sync::Arc;

use crate::api::ReconstructorApi;

/// [`WorkflowApi`] backed by the in-process pipeline
#[derive(Clone)]
pub struct ConcreteWorkflowApi {
    patterns: MemoryPatternStore,
    products: Arc<ProductRepository>,
    reconstructor_api: Arc<ReconstructorApi>,
    probe_builders: SharedChooser<dyn ArrayBuilder>,
    object_builders: SharedChooser<dyn ArrayBuilder>,
    remote: Option<Arc<dyn RemoteExecutor>>,
}

impl ConcreteWorkflowApi {
    pub fn new(
        patterns: MemoryPatternStore,
        products: Arc<ProductRepository>,
        reconstructor_api: Arc<ReconstructorApi>,
        probe_builders: SharedChooser<dyn ArrayBuilder>,
        object_builders: SharedChooser<dyn ArrayBuilder>,
    ) -> Self {
        Self {
            patterns,
            products,
            reconstructor_api,
            probe_builders,
            object_builders,
            remote: None,
        }
    }

    /// Route `reconstruct_remote` calls to `remote`
    pub fn with_remote_executor(mut self, remote: Arc<dyn RemoteExecutor>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn has_remote_executor(&self) -> bool {
        self.remote.is_some()
    }

    /// Concrete product API, for callers that need more than the trait offers
    pub fn product(&self, handle: ProductHandle) -> Result<ConcreteWorkflowProductApi> {
        if !self.products.contains(handle) {
            return Err(PtychoError::StaleProductHandle {
                handle: handle.to_string(),
            });
        }

        Ok(ConcreteWorkflowProductApi {
            api: self.clone(),
            handle,
        })
    }

    fn load_patterns(&self, file_path: &Path) -> Result<()> {
        let patterns = io::read_patterns(file_path)?;
        self.patterns.load(patterns);
        Ok(())
    }

    fn build_array(
        &self,
        handle: ProductHandle,
        builders: &SharedChooser<dyn ArrayBuilder>,
        builder: Option<&str>,
    ) -> Result<Array3<f32>> {
        let builder = {
            let chooser = builders.read();
            let plugin = match builder {
                Some(name) => chooser.find(name).ok_or_else(|| PtychoError::PluginNotFound {
                    name: name.to_string(),
                    registry: chooser.registry_name().to_string(),
                    available: chooser.simple_names().join(", "),
                })?,
                None => chooser.require_current()?,
            };
            Arc::clone(&plugin.strategy)
        };

        let assembled = self.patterns.assembled().ok_or(PtychoError::PatternsNotLoaded)?;
        let product = self.products.get(handle)?;
        builder.build(&product, assembled.pattern_shape())
    }
}

impl WorkflowApi for ConcreteWorkflowApi {
    fn open_patterns(&self, file_path: &Path) -> Result<()> {
        tracing::info!("Opening patterns from {}", file_path.display());
        self.load_patterns(file_path)
    }

    fn import_assembled_patterns(&self, file_path: &Path) -> Result<()> {
        tracing::info!("Importing assembled patterns from {}", file_path.display());
        self.load_patterns(file_path)
    }

    fn export_assembled_patterns(&self, file_path: &Path) -> Result<()> {
        let assembled = self.patterns.assembled().ok_or(PtychoError::PatternsNotLoaded)?;
        io::write_patterns(file_path, &assembled)?;
        tracing::info!("Exported assembled patterns to {}", file_path.display());
        Ok(())
    }

    fn get_product(&self, handle: ProductHandle) -> Result<Box<dyn WorkflowProductApi>> {
        Ok(Box::new(self.product(handle)?))
    }

    fn open_product(&self, file_path: &Path) -> Result<Box<dyn WorkflowProductApi>> {
        let product = io::read_product(file_path)?;
        let handle = self.products.insert_product(product);
        self.get_product(handle)
    }

    fn create_product(&self, metadata: ProductMetadata) -> Result<Box<dyn WorkflowProductApi>> {
        let handle = self.products.insert_product(Product::new(metadata));
        self.get_product(handle)
    }

    fn set_reconstructor(&self, name: &str) -> Result<String> {
        self.reconstructor_api.set_reconstructor(name)
    }

    fn reconstructor_name(&self) -> Result<String> {
        self.reconstructor_api.reconstructor_name()
    }

    fn train_reconstructor(&self, input_path: &Path, output_path: &Path) -> Result<TrainOutput> {
        let output = self.reconstructor_api.train(input_path)?;

        if output.result == 0 {
            self.reconstructor_api.save_model(output_path)?;
        }

        Ok(output)
    }
}

/// [`WorkflowProductApi`] for one product in the repository
pub struct ConcreteWorkflowProductApi {
    api: ConcreteWorkflowApi,
    handle: ProductHandle,
}

impl ConcreteWorkflowProductApi {
    /// Current contents of the product
    pub fn snapshot(&self) -> Result<Product> {
        self.api.products.get(self.handle)
    }
}

impl WorkflowProductApi for ConcreteWorkflowProductApi {
    fn product_handle(&self) -> ProductHandle {
        self.handle
    }

    fn open_scan(&self, file_path: &Path) -> Result<()> {
        let positions = io::read_scan(file_path)?;
        self.api.products.set_positions(self.handle, positions)
    }

    fn build_scan(&self, positions: PositionSequence) -> Result<()> {
        self.api.products.set_positions(self.handle, positions)
    }

    fn open_probe(&self, file_path: &Path) -> Result<()> {
        let probes = io::read_array(file_path)?;
        self.api.products.set_probes(self.handle, probes)
    }

    fn build_probe(&self, builder: Option<&str>) -> Result<()> {
        let probes = self.api.build_array(self.handle, &self.api.probe_builders, builder)?;
        self.api.products.set_probes(self.handle, probes)
    }

    fn open_object(&self, file_path: &Path) -> Result<()> {
        let object = io::read_array(file_path)?;
        self.api.products.set_object(self.handle, object)
    }

    fn build_object(&self, builder: Option<&str>) -> Result<()> {
        let object = self.api.build_array(self.handle, &self.api.object_builders, builder)?;
        self.api.products.set_object(self.handle, object)
    }

    fn get_reconstruct_input(&self) -> Result<ReconstructInput> {
        self.api
            .reconstructor_api
            .get_reconstruct_input(self.handle, ScanIndexFilter::All)
    }

    fn reconstruct_local(&self, block: bool) -> Result<Box<dyn WorkflowProductApi>> {
        let output = self
            .api
            .reconstructor_api
            .reconstruct(self.handle, "", ScanIndexFilter::All)?;

        if block {
            self.api.reconstructor_api.process_all_results();
        }

        self.api.get_product(output)
    }

    fn reconstruct_remote(&self) -> Result<()> {
        let remote = self.api.remote.as_ref().ok_or_else(|| PtychoError::RemoteUnavailable {
            reason: "no remote executor is configured".to_string(),
        })?;

        let input = self.get_reconstruct_input()?;
        let label = self.api.products.name(self.handle)?;
        remote.submit(input, &label)?;
        tracing::info!("Submitted \"{}\" for remote reconstruction", label);
        Ok(())
    }

    fn save_product(&self, file_path: &Path) -> Result<()> {
        let product = self.snapshot()?;
        io::write_product(file_path, &product)
    }

    fn export_training_data(&self, file_path: &Path) -> Result<()> {
        self.api
            .reconstructor_api
            .export_training_data(file_path, self.handle)
    }
}
