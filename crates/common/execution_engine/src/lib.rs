pub mod mock_engine;

use ember_consensus::{execution_payload::ExecutionPayload, preset::Preset};
use serde::{Deserialize, Serialize};

pub use crate::mock_engine::MockExecutionEngine;

/// Verdict of the execution layer on a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayloadStatus {
    #[default]
    Valid,
    Invalid,
    /// The engine cannot judge the payload yet. The beacon chain imports it optimistically.
    Syncing,
}

/// The execution layer as seen by block processing.
pub trait ExecutionEngine<P: Preset> {
    /// Return ``PayloadStatus`` of ``execution_payload``.
    fn notify_new_payload(
        &self,
        execution_payload: &ExecutionPayload<P>,
    ) -> anyhow::Result<PayloadStatus>;
}

impl<P: Preset, E: ExecutionEngine<P> + ?Sized> ExecutionEngine<P> for &E {
    fn notify_new_payload(
        &self,
        execution_payload: &ExecutionPayload<P>,
    ) -> anyhow::Result<PayloadStatus> {
        (**self).notify_new_payload(execution_payload)
    }
}
