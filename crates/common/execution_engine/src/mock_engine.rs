use std::path::Path;

use alloy_primitives::B256;
use anyhow::anyhow;
use ember_consensus::{execution_payload::ExecutionPayload, preset::Preset};
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::debug;

use crate::{ExecutionEngine, PayloadStatus};

/// An execution engine that answers every payload with a configured status.
///
/// Loadable from the `execution.yaml` files of consensus test vectors, where
/// `execution_valid: false` marks the payload invalid.
#[derive(Debug, Default)]
pub struct MockExecutionEngine {
    payload_status: PayloadStatus,
    /// When set, `notify_new_payload` fails with this message instead of returning a status.
    error: Option<String>,
    notified: Mutex<Vec<B256>>,
}

#[derive(Deserialize)]
struct ExecutionYaml {
    execution_valid: bool,
}

impl MockExecutionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(payload_status: PayloadStatus) -> Self {
        Self {
            payload_status,
            ..Self::default()
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn from_yaml_str(contents: &str) -> anyhow::Result<Self> {
        let ExecutionYaml { execution_valid } = serde_yaml::from_str(contents)?;
        Ok(Self::with_status(if execution_valid {
            PayloadStatus::Valid
        } else {
            PayloadStatus::Invalid
        }))
    }

    pub fn from_file(execution_yaml_path: &Path) -> anyhow::Result<Self> {
        Self::from_yaml_str(&std::fs::read_to_string(execution_yaml_path)?)
    }

    pub fn set_payload_status(&mut self, payload_status: PayloadStatus) {
        self.payload_status = payload_status;
    }

    /// Block hashes of every payload this engine was notified about, in order.
    pub fn notified_block_hashes(&self) -> Vec<B256> {
        self.notified.lock().clone()
    }
}

impl<P: Preset> ExecutionEngine<P> for MockExecutionEngine {
    fn notify_new_payload(
        &self,
        execution_payload: &ExecutionPayload<P>,
    ) -> anyhow::Result<PayloadStatus> {
        self.notified.lock().push(execution_payload.block_hash);
        debug!(
            block_hash = ?execution_payload.block_hash,
            status = ?self.payload_status,
            "Mock engine notified of new payload"
        );
        match &self.error {
            Some(message) => Err(anyhow!("{message}")),
            None => Ok(self.payload_status),
        }
    }
}
