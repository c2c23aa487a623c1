//! Newline-delimited JSON-RPC 2.0 transport over stdio.
//!
//! Speaks the tool subset of the Model Context Protocol: `initialize`,
//! `ping`, `tools/list` and `tools/call`. The discovery engine stays
//! transport-agnostic; this layer only decodes, routes and encodes.

pub mod codec;
pub mod router;
pub mod server;
pub mod tools;

pub use router::Router;
pub use server::StdioServer;
