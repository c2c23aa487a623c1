//! # toolbroker - Progressive-Discovery Tool Broker
//!
//! Exposes a large set of external capabilities (code search, documentation
//! lookup, browser automation, memory, knowledge graphs) to a token-limited
//! LLM client through three steps:
//! - `search_tools`: cheap previews from static catalog metadata
//! - `describe_tools`: full schemas, fetched lazily and cached with a TTL
//! - `execute_tool`: validated, time-bounded execution in a result envelope
//!
//! ## Architecture
//!
//! ```text
//!   stdio JSON-RPC  →  ┌──────────────────────────────────┐
//!                      │        DiscoveryEngine           │
//!                      │   search │ describe │ execute    │
//!                      └────┬───────────┬─────────────────┘
//!                           │           │
//!                   ┌───────▼───┐  ┌────▼──────────────────┐
//!                   │ToolCatalog│  │ DynamicToolRegistry   │
//!                   │ (static)  │  │ lifecycle │ schemas   │
//!                   └───────────┘  └────┬──────────────────┘
//!                                       │ CapabilityHandler
//!                              ┌────────▼────────┐
//!                              │ subprocess│http │
//!                              └─────────────────┘
//! ```
//!
//! Capabilities start `Registered` and are initialized on first use, at most
//! once at a time per capability.

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

// Re-export public API
pub mod broker;
pub mod catalog;
pub mod discovery;
pub mod handlers;
pub mod registry;
pub mod transport;
pub mod types;

// Internal utilities
pub mod observability;
pub mod validation;

pub use broker::Broker;
pub use catalog::{CatalogDocument, ToolCatalog, ToolDescriptor};
pub use discovery::{DiscoveryEngine, ResultEnvelope, ToolPreview};
pub use registry::{
    CapabilityHandler, CapabilityState, DynamicToolRegistry, HandlerError, HandlerFactories,
    HandlerResult, ToolSchema,
};
pub use types::{BrokerConfig, Error, Result};
