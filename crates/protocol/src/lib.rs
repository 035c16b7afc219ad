//! Wire types for the PhotoChain backend.
//!
//! The backend is split into a user service (`/user/*`: accounts, image
//! storage) and a blockchain service (`/blockchain/*`: image transactions,
//! mining, chain queries, failure simulation). This crate only describes
//! the JSON shapes exchanged with them; it performs no I/O.

pub mod chain;
pub mod constants;
pub mod messages;

// Re-export primary types for convenience.
pub use chain::{Block, ChainSnapshot, Transaction, TransactionRef};
pub use messages::{
    ChainAck, ErrorBody, FailureKind, LoginRequest, LoginResponse, MineAck, MinedBlock,
    RegisterResponse, SimulateFailureRequest, UploadReceipt,
};
