//! wstd-core: Core abstractions and configuration for the wstd broker
//!
//! This crate provides shared identifier types, error types, the outbound
//! frame sink trait and configuration structures used by the broker.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::WstdError;
pub use types::{ClientId, ClientInfo, ConnectionId};
