use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Credentials sent to both `/user/register` and `/user/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Failure modes a blockchain node can be asked to simulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The node process exits.
    NodeDown,
    /// The node stalls before answering.
    NetworkDelay,
    /// Pending transactions get their CRC overwritten.
    DataCorruption,
    /// Block hashes get tampered with.
    HashCorruption,
}

impl FailureKind {
    /// Every kind, in display order.
    pub const ALL: [FailureKind; 4] = [
        FailureKind::NodeDown,
        FailureKind::NetworkDelay,
        FailureKind::DataCorruption,
        FailureKind::HashCorruption,
    ];

    /// Wire name of this failure kind.
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::NodeDown => "node_down",
            FailureKind::NetworkDelay => "network_delay",
            FailureKind::DataCorruption => "data_corruption",
            FailureKind::HashCorruption => "hash_corruption",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a [`FailureKind`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown failure kind: {0}")]
pub struct ParseFailureKindError(pub String);

impl FromStr for FailureKind {
    type Err = ParseFailureKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FailureKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ParseFailureKindError(s.to_string()))
    }
}

/// Body of `POST /blockchain/simulate/failure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulateFailureRequest {
    #[serde(rename = "type")]
    pub kind: FailureKind,
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Response of `POST /user/upload-image`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<i64>,
}

/// Generic acknowledgement from the blockchain service
/// (`/image/process`, `/simulate/failure`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainAck {
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
}

/// Summary of a freshly mined block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinedBlock {
    pub index: u64,
    pub hash: String,
    #[serde(default)]
    pub transaction_count: usize,
}

/// Response of `GET /blockchain/mine`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MineAck {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<MinedBlock>,
    /// `"replaced"` or `"authoritative"` after consensus resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_status: Option<String>,
}

/// Response of `POST /user/register`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
}

/// Response of `POST /user/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Error body returned by both services on non-2xx statuses.
///
/// The user service sends `{message}`; the blockchain service adds an
/// `error` code and free-form `details`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorBody {
    /// Human-readable message: `message` if present, else the error code.
    pub fn summary(&self) -> Option<String> {
        if !self.message.is_empty() {
            Some(self.message.clone())
        } else {
            self.error.clone().filter(|e| !e.is_empty())
        }
    }
}
