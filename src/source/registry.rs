//! Static source registry
//!
//! Maps source names to constructor functions. Built-in boards are
//! registered by [`SourceRegistry::builtin`]; declarative `[[source]]`
//! entries from the configuration are added with
//! [`SourceRegistry::with_configured`].

use super::{ConfiguredSource, EmploiTg, EmploitogoInfo, SourceDescriptor};
use crate::config::SourceConfig;
use crate::{ConfigError, ConfigResult};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Constructor for one source descriptor
pub type SourceFactory = Box<dyn Fn() -> Arc<dyn SourceDescriptor> + Send + Sync>;

/// Name -> constructor mapping, populated at startup
#[derive(Default)]
pub struct SourceRegistry {
    factories: BTreeMap<String, SourceFactory>,
}

impl SourceRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in job boards
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(EmploiTg::NAME, || -> Arc<dyn SourceDescriptor> {
            Arc::new(EmploiTg::new())
        });
        registry.register(EmploitogoInfo::NAME, || -> Arc<dyn SourceDescriptor> {
            Arc::new(EmploitogoInfo::new())
        });
        registry
    }

    /// Registers a constructor under `name`
    ///
    /// Returns `true` if an earlier registration was replaced.
    pub fn register<F>(&mut self, name: &str, factory: F) -> bool
    where
        F: Fn() -> Arc<dyn SourceDescriptor> + Send + Sync + 'static,
    {
        self.factories
            .insert(name.to_string(), Box::new(factory))
            .is_some()
    }

    /// Adds the declarative sources from the configuration
    ///
    /// # Errors
    ///
    /// Fails if a configured source is invalid or reuses a registered name.
    pub fn with_configured(mut self, sources: &[SourceConfig]) -> ConfigResult<Self> {
        for config in sources {
            if self.contains(&config.name) {
                return Err(ConfigError::Validation(format!(
                    "source '{}' is already registered",
                    config.name
                )));
            }
            let source: Arc<dyn SourceDescriptor> = Arc::new(ConfiguredSource::from_config(config)?);
            self.register(&config.name, move || Arc::clone(&source));
        }
        Ok(self)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Instantiates one source by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn SourceDescriptor>> {
        self.factories.get(name).map(|factory| factory())
    }

    /// Instantiates the named sources, or every source when `names` is empty
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownSource`] for the first unregistered name.
    pub fn select(&self, names: &[String]) -> ConfigResult<Vec<Arc<dyn SourceDescriptor>>> {
        if names.is_empty() {
            return Ok(self.factories.values().map(|factory| factory()).collect());
        }

        let mut selected = Vec::with_capacity(names.len());
        for name in names {
            if selected
                .iter()
                .any(|s: &Arc<dyn SourceDescriptor>| s.name() == name.as_str())
            {
                continue;
            }
            let source = self
                .get(name)
                .ok_or_else(|| ConfigError::UnknownSource(name.clone()))?;
            selected.push(source);
        }
        Ok(selected)
    }
}

impl fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("sources", &self.names())
            .finish()
    }
}
