//! Reconstructor API
//!
//! The call surface for batch mode, workflows, and interactive front ends. Callers
//! ask for a reconstruction and immediately get the handle of the output product;
//! the output is filled in later, when results are processed.

use ptycho_core::error::Result;
use ptycho_core::models::{
    ProductHandle, ReconstructInput, ScanIndexFilter, ScanTransformPreset, TrainOutput,
};
use ptycho_core::plugins::SharedChooser;
use ptycho_core::ports::{Reconstructor, TrainableReconstructor};
use ptycho_store::ProductRepository;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::matcher::DiffractionPatternPositionMatcher;
use crate::progress::ReconstructorProgressMonitor;
use crate::queue::ReconstructionQueue;

pub struct ReconstructorApi {
    queue: Arc<ReconstructionQueue>,
    matcher: Arc<DiffractionPatternPositionMatcher>,
    products: Arc<ProductRepository>,
    reconstructors: SharedChooser<dyn Reconstructor>,
}

impl ReconstructorApi {
    pub fn new(
        queue: Arc<ReconstructionQueue>,
        matcher: Arc<DiffractionPatternPositionMatcher>,
        products: Arc<ProductRepository>,
        reconstructors: SharedChooser<dyn Reconstructor>,
    ) -> Self {
        crate::builtin::ensure_reconstructor(&mut reconstructors.write());

        Self {
            queue,
            matcher,
            products,
            reconstructors,
        }
    }

    pub fn is_reconstructing(&self) -> bool {
        self.queue.is_reconstructing()
    }

    pub fn progress_monitor(&self) -> &Arc<ReconstructorProgressMonitor> {
        self.queue.progress()
    }

    /// Apply finished reconstructions and deliver pending progress notifications
    ///
    /// See [`ReconstructionQueue::process_results`].
    pub fn process_results(&self, block: bool) -> usize {
        let applied = self.queue.process_results(block);
        self.queue.progress().notify_observers_if_changed();
        applied
    }

    /// Wait for every queued reconstruction and apply all results
    ///
    /// Returns early if the worker is not running.
    pub fn process_all_results(&self) -> usize {
        let mut applied = self.process_results(true);
        while self.queue.is_reconstructing() && self.queue.is_running() {
            applied += self.process_results(true);
        }
        applied + self.process_results(false)
    }

    /// Matched input for a product, without reconstructing
    pub fn get_reconstruct_input(
        &self,
        product: ProductHandle,
        index_filter: ScanIndexFilter,
    ) -> Result<ReconstructInput> {
        self.matcher
            .match_diffraction_patterns_with_positions(product, index_filter)
    }

    /// Queue a reconstruction of `input`, returning the output product's handle
    ///
    /// The output starts as a copy of the input named
    /// `<input name>_<reconstructor simple name>`, followed by `_<suffix>` when
    /// `output_suffix` is not empty. Fatal input problems such as a missing bad
    /// pixel mask are reported here rather than on the worker.
    pub fn reconstruct(
        &self,
        input: ProductHandle,
        output_suffix: &str,
        index_filter: ScanIndexFilter,
    ) -> Result<ProductHandle> {
        self.submit(input, output_suffix, index_filter, None)
    }

    /// Reconstruct odd and even scan indexes independently
    pub fn reconstruct_split(&self, input: ProductHandle) -> Result<(ProductHandle, ProductHandle)> {
        let odd = self.reconstruct(input, "odd", ScanIndexFilter::Odd)?;
        let even = self.reconstruct(input, "even", ScanIndexFilter::Even)?;
        Ok((odd, even))
    }

    /// Reconstruct once per [`ScanTransformPreset`], in preset order
    ///
    /// Each output's positions are the input's with the preset applied, and its
    /// name ends with the preset's label.
    pub fn reconstruct_transformed(&self, input: ProductHandle) -> Result<Vec<ProductHandle>> {
        ScanTransformPreset::all()
            .map(|preset| {
                self.submit(input, &preset.to_string(), ScanIndexFilter::All, Some(preset))
            })
            .collect()
    }

    fn submit(
        &self,
        input: ProductHandle,
        output_suffix: &str,
        index_filter: ScanIndexFilter,
        transform: Option<ScanTransformPreset>,
    ) -> Result<ProductHandle> {
        let (reconstructor, simple_name) = self.current_reconstructor()?;
        self.matcher.check_ready()?;

        let input_name = self.products.name(input)?;
        let output = self.products.insert_like(input)?;

        let mut output_name = format!("{}_{}", input_name, simple_name);
        if !output_suffix.is_empty() {
            output_name.push('_');
            output_name.push_str(output_suffix);
        }
        self.products.set_name(output, &output_name)?;

        if let Some(preset) = transform {
            let positions = self
                .products
                .with_product(output, |product| product.positions.transformed(preset))?;
            self.products.set_positions(output, positions)?;
        }

        self.queue.put(reconstructor, output, index_filter);
        tracing::info!("Queued reconstruction \"{}\" ({} indexes)", output_name, index_filter);
        Ok(output)
    }

    /// Select the active reconstructor, returning its simple name
    pub fn set_reconstructor(&self, name: &str) -> Result<String> {
        let mut reconstructors = self.reconstructors.write();
        let plugin = reconstructors.set_current_plugin(name)?;
        Ok(plugin.simple_name.clone())
    }

    /// Simple name of the active reconstructor
    pub fn reconstructor_name(&self) -> Result<String> {
        self.current_reconstructor().map(|(_, name)| name)
    }

    pub fn reconstructor_names(&self) -> Vec<String> {
        self.reconstructors.read().simple_names()
    }

    fn current_reconstructor(&self) -> Result<(Arc<dyn Reconstructor>, String)> {
        let reconstructors = self.reconstructors.read();
        let plugin = reconstructors.require_current()?;
        Ok((Arc::clone(&plugin.strategy), plugin.simple_name.clone()))
    }

    /// Run `op` against the active reconstructor if it is trainable, logging its duration
    ///
    /// A reconstructor without the training capability is warned about and `op`
    /// is not run.
    fn with_trainable<R>(
        &self,
        activity: &str,
        label: &str,
        op: impl FnOnce(&dyn TrainableReconstructor) -> Result<R>,
    ) -> Result<Option<R>> {
        let (reconstructor, _) = self.current_reconstructor()?;

        let Some(trainable) = reconstructor.as_trainable() else {
            tracing::warn!("Reconstructor is not trainable!");
            return Ok(None);
        };

        tracing::info!("{}...", activity);
        let tic = Instant::now();
        let result = op(trainable)?;
        tracing::info!("{} time {:.4} seconds.", label, tic.elapsed().as_secs_f64());
        Ok(Some(result))
    }

    /// Match `product` and add it to the backend's training set
    pub fn ingest_training_data(&self, product: ProductHandle) -> Result<()> {
        self.with_trainable("Ingesting", "Ingest", |trainable| {
            let input = self.get_reconstruct_input(product, ScanIndexFilter::All)?;
            trainable.ingest_training_data(&input)
        })?;
        Ok(())
    }

    /// Train the active reconstructor
    ///
    /// Returns [`TrainOutput::not_trained`] when it is not trainable.
    pub fn train(&self, data_path: &Path) -> Result<TrainOutput> {
        let output = self.with_trainable("Training", "Training", |trainable| {
            trainable.train(data_path)
        })?;

        Ok(match output {
            Some(output) => {
                tracing::info!("Training finished (code={})", output.result);
                output
            }
            None => TrainOutput::not_trained(),
        })
    }

    pub fn open_model(&self, file_path: &Path) -> Result<()> {
        self.with_trainable("Opening model", "Open", |trainable| {
            trainable.open_model(file_path)
        })?;
        Ok(())
    }

    pub fn save_model(&self, file_path: &Path) -> Result<()> {
        self.with_trainable("Saving model", "Save", |trainable| {
            trainable.save_model(file_path)
        })?;
        Ok(())
    }

    pub fn open_training_data(&self, file_path: &Path) -> Result<()> {
        self.with_trainable("Opening training data", "Open", |trainable| {
            trainable.open_training_data(file_path)
        })?;
        Ok(())
    }

    pub fn save_training_data(&self, file_path: &Path) -> Result<()> {
        self.with_trainable("Saving training data", "Save", |trainable| {
            trainable.save_training_data(file_path)
        })?;
        Ok(())
    }

    pub fn clear_training_data(&self) -> Result<()> {
        self.with_trainable("Clearing training data", "Clear", |trainable| {
            trainable.clear_training_data()
        })?;
        Ok(())
    }

    /// Match `product` and write it in the backend's training format
    pub fn export_training_data(&self, file_path: &Path, product: ProductHandle) -> Result<()> {
        self.with_trainable("Exporting", "Export", |trainable| {
            let tic = Instant::now();
            let input = self.get_reconstruct_input(product, ScanIndexFilter::All)?;
            tracing::info!("Data preparation time {:.4} seconds.", tic.elapsed().as_secs_f64());
            trainable.export_training_data(file_path, &input)
        })?;
        Ok(())
    }
}
