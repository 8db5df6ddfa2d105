//! Name-keyed table of resource and data source handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::datasources::DomainDataSource;
use crate::error::{ReconcileError, Result};
use crate::framework::{Diagnostics, Planner};
use crate::resources::{
    DomainRecordResource, DomainResource, InstanceDiskResource, LkeClusterResource,
    ObjectStorageKeyResource, ObjectStorageObjectResource,
};

use super::resource::{DataSource, Resource};

/// Registry of handlers, built once at startup.
#[derive(Default, Clone)]
pub struct Registry {
    resources: BTreeMap<&'static str, Arc<dyn Resource>>,
    data_sources: BTreeMap<&'static str, Arc<dyn DataSource>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("resources", &self.resources.keys().collect::<Vec<_>>())
            .field("data_sources", &self.data_sources.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in handler.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_resource(Arc::new(DomainResource::new()));
        registry.register_resource(Arc::new(DomainRecordResource::new()));
        registry.register_resource(Arc::new(InstanceDiskResource::new()));
        registry.register_resource(Arc::new(LkeClusterResource::new()));
        registry.register_resource(Arc::new(ObjectStorageKeyResource::new()));
        registry.register_resource(Arc::new(ObjectStorageObjectResource::new()));
        registry.register_data_source(Arc::new(DomainDataSource::new()));
        registry
    }

    /// Adds or replaces a resource handler.
    pub fn register_resource(&mut self, resource: Arc<dyn Resource>) {
        self.resources.insert(resource.name(), resource);
    }

    /// Adds or replaces a data source handler.
    pub fn register_data_source(&mut self, data_source: Arc<dyn DataSource>) {
        self.data_sources.insert(data_source.name(), data_source);
    }

    /// Looks up a resource handler.
    ///
    /// # Errors
    ///
    /// Returns an error if no handler has that name.
    pub fn resource(&self, name: &str) -> Result<Arc<dyn Resource>> {
        self.resources.get(name).cloned().ok_or_else(|| {
            ReconcileError::UnknownResource {
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Looks up a data source handler.
    ///
    /// # Errors
    ///
    /// Returns an error if no handler has that name.
    pub fn data_source(&self, name: &str) -> Result<Arc<dyn DataSource>> {
        self.data_sources.get(name).cloned().ok_or_else(|| {
            ReconcileError::UnknownResource {
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Runs the schema validators and then the resource's own checks.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource type is unknown.
    pub fn validate(&self, type_name: &str, config: &serde_json::Value) -> Result<Diagnostics> {
        let resource = self.resource(type_name)?;
        let mut diags = Planner::new(resource.schema()).validate(config);
        if !diags.has_error() {
            resource.validate_config(config, &mut diags);
        }
        Ok(diags)
    }

    /// Registered resource names, sorted.
    pub fn resource_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.resources.keys().copied()
    }

    /// Registered data source names, sorted.
    pub fn data_source_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.data_sources.keys().copied()
    }
}
