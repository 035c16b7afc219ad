//! Pipeline stages, events and results.

use std::fmt;

use photochain_protocol::{ChainAck, ChainSnapshot, MineAck, UploadReceipt};
use uuid::Uuid;

/// Stage of a pipeline run.
///
/// Runs move strictly forward:
/// `Idle → Validating → Uploading → Registering → Mining → Confirming`,
/// ending in `Succeeded` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Idle,
    Validating,
    Uploading,
    Registering,
    Mining,
    Confirming,
    Succeeded,
    Failed,
}

impl Stage {
    /// The remote stages, in execution order.
    pub const REMOTE: [Stage; 4] = [
        Stage::Uploading,
        Stage::Registering,
        Stage::Mining,
        Stage::Confirming,
    ];

    /// Next stage given whether the work of this stage succeeded.
    ///
    /// Terminal stages stay where they are.
    pub fn transition(self, succeeded: bool) -> Stage {
        if self.is_terminal() {
            return self;
        }
        if !succeeded {
            return Stage::Failed;
        }
        match self {
            Stage::Idle => Stage::Validating,
            Stage::Validating => Stage::Uploading,
            Stage::Uploading => Stage::Registering,
            Stage::Registering => Stage::Mining,
            Stage::Mining => Stage::Confirming,
            Stage::Confirming => Stage::Succeeded,
            Stage::Succeeded | Stage::Failed => self,
        }
    }

    /// Progress reached once this stage completes successfully.
    pub fn checkpoint(self) -> Option<u8> {
        match self {
            Stage::Uploading => Some(25),
            Stage::Registering => Some(50),
            Stage::Mining => Some(75),
            Stage::Confirming => Some(100),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Succeeded | Stage::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Validating => "validating",
            Stage::Uploading => "uploading",
            Stage::Registering => "registering",
            Stage::Mining => "mining",
            Stage::Confirming => "confirming",
            Stage::Succeeded => "succeeded",
            Stage::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event emitted while a run progresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// A run entered a new stage.
    StageEntered { run_id: Uuid, stage: Stage },
    /// A run reached `Succeeded` or `Failed`.
    Finished {
        run_id: Uuid,
        stage: Stage,
        message: String,
    },
}

/// Everything the backend returned during a successful run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub receipt: UploadReceipt,
    pub registration: ChainAck,
    pub mined: MineAck,
    /// Chain as fetched by the confirmation step.
    pub snapshot: ChainSnapshot,
}
