//! HTTP client for the PhotoChain backend.
//!
//! Provides [`PhotoApiClient`], a typed async wrapper over the user and
//! blockchain endpoints, and [`SessionStore`], which persists the bearer
//! token obtained at login so later write calls can authorize themselves.

pub mod client;
pub mod error;
pub mod file;
pub mod session;

#[cfg(test)]
mod test_support;

pub use client::PhotoApiClient;
pub use error::ApiError;
pub use file::CandidateFile;
pub use session::{Session, SessionError, SessionStore};
