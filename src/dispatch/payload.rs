use serde::{Deserialize, Serialize};

use crate::error::{CronmeshError, Result};
use crate::scheduler::Execution;

/// Broadcast query name asking members to run an execution
pub const QUERY_RUN_JOB: &str = "run:job";
/// Inbound query name for runner-originated completion reports
pub const QUERY_EXECUTION_DONE: &str = "execution:done";

/// Wire payload of a `run:job` broadcast: the execution to run plus the
/// address the runner calls back on when it finishes.
///
/// The encoding is self-describing JSON; unknown fields are ignored on
/// decode so old receivers tolerate newer senders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunQueryParam {
    pub execution: Execution,
    pub rpc_addr: String,
}

impl RunQueryParam {
    pub fn new(execution: Execution, rpc_addr: impl Into<String>) -> Self {
        Self {
            execution,
            rpc_addr: rpc_addr.into(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| CronmeshError::BadPayload(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| CronmeshError::BadPayload(e.to_string()))
    }
}
