//! Chain snapshot model as served by `GET /blockchain/chain`.

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transaction type tag used for image payloads.
pub const IMAGE_TRANSACTION: &str = "image";

/// A transaction stored in a block.
///
/// Image transactions carry their bytes base64-encoded in `data`; any other
/// type carries arbitrary JSON (the genesis block holds a plain string).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: serde_json::Value,
    #[serde(default)]
    pub timestamp: f64,
    /// CRC32 of the payload as 8 lower-case hex digits.
    #[serde(default)]
    pub crc: String,
    /// Nodes that confirmed this transaction (ports or addresses).
    #[serde(default)]
    pub confirmations: Vec<serde_json::Value>,
}

impl Transaction {
    pub fn is_image(&self) -> bool {
        self.kind == IMAGE_TRANSACTION
    }

    /// Decoded image bytes, for image transactions with valid base64.
    pub fn image_bytes(&self) -> Option<Vec<u8>> {
        if !self.is_image() {
            return None;
        }
        self.data.as_str().and_then(|s| STANDARD.decode(s).ok())
    }

    /// Recomputes the payload CRC and compares it with `crc`.
    ///
    /// Returns `None` when the payload is not something the checksum can be
    /// recomputed for on this side (structured generic data).
    pub fn verify_crc(&self) -> Option<bool> {
        if self.is_image() {
            return Some(
                self.image_bytes()
                    .is_some_and(|bytes| crc_hex(&bytes) == self.crc),
            );
        }
        let text = self.data.as_str()?;
        Some(crc_hex(text.as_bytes()) == self.crc)
    }
}

/// CRC32 of `data` formatted the way the backend stores it.
pub fn crc_hex(data: &[u8]) -> String {
    format!("{:08x}", crc32fast::hash(data))
}

/// A block of the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub previous_hash: String,
    /// Unix timestamp in (fractional) seconds.
    pub timestamp: f64,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    pub hash: String,
    #[serde(default)]
    pub confirmations: u32,
}

impl Block {
    /// Block creation time, if the timestamp is representable.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        if !self.timestamp.is_finite() {
            return None;
        }
        let secs = self.timestamp.floor();
        let nanos = ((self.timestamp - secs) * 1e9) as u32;
        DateTime::from_timestamp(secs as i64, nanos)
    }

    pub fn image_count(&self) -> usize {
        self.transactions.iter().filter(|t| t.is_image()).count()
    }
}

/// Location of a transaction inside a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionRef {
    pub block_index: u64,
    pub position: usize,
}

/// The backend's full chain at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainSnapshot {
    #[serde(default)]
    pub chain: Vec<Block>,
    #[serde(default)]
    pub length: usize,
}

impl ChainSnapshot {
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn latest(&self) -> Option<&Block> {
        self.chain.last()
    }

    /// Total number of image transactions across all blocks.
    pub fn image_count(&self) -> usize {
        self.chain.iter().map(Block::image_count).sum()
    }

    /// Transactions whose stored CRC does not match their payload.
    pub fn corrupted(&self) -> Vec<TransactionRef> {
        self.chain
            .iter()
            .flat_map(|block| {
                block
                    .transactions
                    .iter()
                    .enumerate()
                    .filter(|(_, tx)| tx.verify_crc() == Some(false))
                    .map(move |(position, _)| TransactionRef {
                        block_index: block.index,
                        position,
                    })
            })
            .collect()
    }

    /// Indexes of blocks whose `previous_hash` does not match the block before.
    pub fn broken_links(&self) -> Vec<u64> {
        self.chain
            .windows(2)
            .filter(|pair| pair[1].previous_hash != pair[0].hash)
            .map(|pair| pair[1].index)
            .collect()
    }
}
