//! Core types for the broker.
//!
//! This module provides foundational types used throughout the system:
//! - **IDs**: Strongly-typed identifiers (CapabilityId, CallId)
//! - **Errors**: Application error taxonomy with thiserror derives
//! - **Config**: Configuration structures for server, registry, and discovery

mod config;
mod errors;
mod ids;

pub use config::{BrokerConfig, DiscoveryConfig, RegistryConfig, ServerConfig};
pub use errors::{Error, Result};
pub use ids::{CallId, CapabilityId};
