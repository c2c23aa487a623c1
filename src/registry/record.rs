//! Per-capability lifecycle record.
//!
//! Registered → Initializing → {Ready | Failed}; Ready → Registered on
//! disable; Failed → Registered on enable.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::catalog::CapabilityMetadata;
use crate::registry::handler::{CapabilityHandler, HandlerFactory};
use crate::types::CapabilityId;

/// Lifecycle state of a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityState {
    Registered,
    Initializing,
    Ready,
    Failed,
}

impl CapabilityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityState::Registered => "registered",
            CapabilityState::Initializing => "initializing",
            CapabilityState::Ready => "ready",
            CapabilityState::Failed => "failed",
        }
    }
}

impl fmt::Display for CapabilityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a capability for status reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityInfo {
    pub id: CapabilityId,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub tools: Vec<String>,
    pub lazy: bool,
    pub state: CapabilityState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_since: Option<DateTime<Utc>>,
    /// Completed initializations since startup.
    pub initializations: u64,
}

/// Mutable part of a record. Only held for short, non-async sections.
pub(crate) struct RecordSlot {
    pub(crate) state: CapabilityState,
    pub(crate) factory: HandlerFactory,
    pub(crate) handler: Option<Arc<dyn CapabilityHandler>>,
    pub(crate) last_error: Option<String>,
    pub(crate) ready_since: Option<DateTime<Utc>>,
    pub(crate) initializations: u64,
}

/// Registry-owned record of one capability.
///
/// `init_gate` serializes initialization and disable. `slot` holds the state
/// and is never locked across an await on a handler, so status reads do not
/// wait on a slow initialization.
pub(crate) struct CapabilityRecord {
    pub(crate) metadata: Arc<CapabilityMetadata>,
    pub(crate) init_gate: Mutex<()>,
    pub(crate) slot: Mutex<RecordSlot>,
}

impl fmt::Debug for CapabilityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRecord")
            .field("id", &self.metadata.id)
            .field("kind", &self.metadata.kind)
            .finish()
    }
}

impl CapabilityRecord {
    pub(crate) fn new(metadata: CapabilityMetadata, factory: HandlerFactory) -> Self {
        Self {
            metadata: Arc::new(metadata),
            init_gate: Mutex::new(()),
            slot: Mutex::new(RecordSlot {
                state: CapabilityState::Registered,
                factory,
                handler: None,
                last_error: None,
                ready_since: None,
                initializations: 0,
            }),
        }
    }

    pub(crate) async fn state(&self) -> CapabilityState {
        self.slot.lock().await.state
    }

    pub(crate) async fn info(&self) -> CapabilityInfo {
        let slot = self.slot.lock().await;
        CapabilityInfo {
            id: self.metadata.id.clone(),
            kind: self.metadata.kind.clone(),
            description: self.metadata.description.clone(),
            tools: self.metadata.tools.clone(),
            lazy: self.metadata.lazy,
            state: slot.state,
            last_error: slot.last_error.clone(),
            ready_since: slot.ready_since,
            initializations: slot.initializations,
        }
    }
}
