//! Wiring of catalog, registry and discovery engine.

use std::sync::Arc;

use crate::catalog::{CatalogDocument, ToolCatalog};
use crate::discovery::DiscoveryEngine;
use crate::registry::{DynamicToolRegistry, HandlerFactories};
use crate::types::{BrokerConfig, Result};

/// A fully assembled broker. Cheap to clone; all parts are shared.
#[derive(Debug, Clone)]
pub struct Broker {
    pub config: BrokerConfig,
    pub catalog: Arc<ToolCatalog>,
    pub registry: Arc<DynamicToolRegistry>,
    pub engine: Arc<DiscoveryEngine>,
}

impl Broker {
    /// Validate the catalog and build every component. Any inconsistency is
    /// an [`Error::Config`](crate::Error::Config).
    pub fn from_document(document: &CatalogDocument, factories: &HandlerFactories) -> Result<Self> {
        let config = document.config.clone();
        let catalog = Arc::new(ToolCatalog::load(document, factories)?);
        let registry = Arc::new(DynamicToolRegistry::from_catalog(
            catalog.clone(),
            factories,
            config.registry.clone(),
        )?);
        let engine = Arc::new(
            DiscoveryEngine::new(registry.clone(), config.discovery.clone())
                .with_server_name(config.server.name.clone()),
        );

        Ok(Self {
            config,
            catalog,
            registry,
            engine,
        })
    }

    pub fn from_yaml_str(source: &str, factories: &HandlerFactories) -> Result<Self> {
        Self::from_document(&CatalogDocument::from_yaml_str(source)?, factories)
    }
}
