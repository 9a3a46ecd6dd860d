//! Named plugin registries with a current selection
//!
//! A [`PluginChooser`] holds every registered strategy for one concern and tracks
//! which one is active. Selections are made by name, matching either the simple or
//! the display name case-insensitively, so a persisted settings string can drive
//! the choice.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::error::{PtychoError, Result};
use crate::ports::{ArrayBuilder, FileBasedWorkflow, Reconstructor};

/// A registered strategy and its names
pub struct Plugin<T: ?Sized> {
    pub strategy: Arc<T>,
    pub simple_name: String,
    pub display_name: String,
}

impl<T: ?Sized> Plugin<T> {
    pub fn new(strategy: Arc<T>, display_name: &str, simple_name: Option<&str>) -> Self {
        let simple_name = match simple_name {
            Some(name) => name.to_string(),
            None => simplify_name(display_name),
        };

        Self {
            strategy,
            simple_name,
            display_name: display_name.to_string(),
        }
    }

    fn matches(&self, name: &str) -> bool {
        let casefolded = name.to_lowercase();
        self.simple_name.to_lowercase() == casefolded
            || self.display_name.to_lowercase() == casefolded
    }
}

impl<T: ?Sized> Clone for Plugin<T> {
    fn clone(&self) -> Self {
        Self {
            strategy: Arc::clone(&self.strategy),
            simple_name: self.simple_name.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

impl<T: ?Sized> std::fmt::Debug for Plugin<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("simple_name", &self.simple_name)
            .field("display_name", &self.display_name)
            .finish()
    }
}

/// Strip everything but word characters from a display name
pub fn simplify_name(display_name: &str) -> String {
    display_name.chars().filter(|c| c.is_alphanumeric() || *c == '_').collect()
}

/// Registry of strategies for one concern, with a current selection
pub struct PluginChooser<T: ?Sized> {
    registry_name: String,
    plugins: Vec<Plugin<T>>,
    current: usize,
}

/// Chooser shared between the components that read and change the selection
pub type SharedChooser<T> = Arc<RwLock<PluginChooser<T>>>;

impl<T: ?Sized> PluginChooser<T> {
    pub fn new(registry_name: impl Into<String>) -> Self {
        Self {
            registry_name: registry_name.into(),
            plugins: Vec::new(),
            current: 0,
        }
    }

    /// Register a strategy, keeping plugins sorted by display name
    ///
    /// The current selection keeps pointing at the same plugin.
    pub fn register_plugin(
        &mut self,
        strategy: Arc<T>,
        display_name: &str,
        simple_name: Option<&str>,
    ) {
        let plugin = Plugin::new(strategy, display_name, simple_name);
        let current_name = self.current().map(|p| p.simple_name.clone());
        let position = self
            .plugins
            .partition_point(|existing| existing.display_name <= plugin.display_name);
        self.plugins.insert(position, plugin);

        if let Some(name) = current_name {
            if let Some(index) = self.plugins.iter().position(|p| p.simple_name == name) {
                self.current = index;
            }
        }
    }

    pub fn registry_name(&self) -> &str {
        &self.registry_name
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Plugin<T>> {
        self.plugins.iter()
    }

    pub fn simple_names(&self) -> Vec<String> {
        self.plugins.iter().map(|p| p.simple_name.clone()).collect()
    }

    pub fn display_names(&self) -> Vec<String> {
        self.plugins.iter().map(|p| p.display_name.clone()).collect()
    }

    /// Look up a plugin by simple or display name, ignoring case
    pub fn find(&self, name: &str) -> Option<&Plugin<T>> {
        self.plugins.iter().find(|p| p.matches(name))
    }

    /// Currently selected plugin, `None` only when nothing is registered
    pub fn current(&self) -> Option<&Plugin<T>> {
        self.plugins.get(self.current)
    }

    /// Currently selected plugin, or an error naming this registry
    pub fn require_current(&self) -> Result<&Plugin<T>> {
        self.current().ok_or_else(|| PtychoError::NoPluginRegistered {
            registry: self.registry_name.clone(),
        })
    }

    /// Select a plugin by name
    pub fn set_current_plugin(&mut self, name: &str) -> Result<&Plugin<T>> {
        match self.plugins.iter().position(|p| p.matches(name)) {
            Some(index) => {
                if index != self.current {
                    tracing::debug!(
                        "{}: selected \"{}\"",
                        self.registry_name,
                        self.plugins[index].simple_name
                    );
                }
                self.current = index;
                Ok(&self.plugins[index])
            }
            None => Err(PtychoError::PluginNotFound {
                name: name.to_string(),
                registry: self.registry_name.clone(),
                available: self.simple_names().join(", "),
            }),
        }
    }

    /// Adopt a persisted selection, keeping the current one if the name is unknown
    pub fn synchronize_with(&mut self, setting: &str) {
        if let Err(err) = self.set_current_plugin(setting) {
            tracing::warn!("{}", err);
        }
    }

    pub fn into_shared(self) -> SharedChooser<T> {
        Arc::new(RwLock::new(self))
    }
}

/// Every registry the pipeline consumes
pub struct PluginRegistry {
    pub reconstructors: PluginChooser<dyn Reconstructor>,
    pub file_based_workflows: PluginChooser<dyn FileBasedWorkflow>,
    pub probe_builders: PluginChooser<dyn ArrayBuilder>,
    pub object_builders: PluginChooser<dyn ArrayBuilder>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            reconstructors: PluginChooser::new("reconstructors"),
            file_based_workflows: PluginChooser::new("file-based workflows"),
            probe_builders: PluginChooser::new("probe builders"),
            object_builders: PluginChooser::new("object builders"),
        }
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}
