//! brokerlink - request/response over a publish/subscribe broker
//!
//! Turns a fire-and-forget pub/sub transport into call/return semantics:
//! every outbound request carries a correlation identifier, the caller is
//! parked until a matching inbound message arrives or its deadline
//! elapses, and paged result sets are fetched window by window and
//! returned as one result.

pub mod client;
pub mod command;
pub mod config;
pub mod correlation;
pub mod envelope;
pub mod error;
pub mod outcome;
pub mod query;
pub mod router;
pub mod topics;
pub mod transport;
pub mod utils;

pub use client::{BrokerClient, ClientOptions};
pub use error::{BrokerError, Result};
pub use outcome::Outcome;
