//! # parley-server
//!
//! The relay engine: accepts TCP connections, tracks them in a concurrent
//! registry, and fans length-prefixed frames out to one peer or to everyone
//! but the author.
//!
//! ```text
//!  TcpListener ──accept──▶ RelayServer ──insert──▶ ConnectionRegistry
//!                              │                        ▲      │
//!                          spawn per conn            lookup  snapshot
//!                              ▼                        │      ▼
//!                           Session ──submit──▶ [bounded queue] ──▶ MessageRouter ──write──▶ peers
//! ```
//!
//! - One task per connection ([`session::Session`]), one router task, one
//!   accept-loop task
//! - The bounded queue is the single serialization point for writes and the
//!   only backpressure point: a full queue blocks the submitting session
//! - Shutdown is cooperative with two escalation levels
//!   ([`shutdown::ShutdownCoordinator`])

#![deny(unsafe_code)]

pub mod config;
pub mod metrics;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;
pub mod shutdown;

#[cfg(test)]
mod testing;

pub use config::ServerConfig;
pub use registry::{Connection, ConnectionRegistry};
pub use router::{MessageRouter, OutboundMessage, RouterHandle};
pub use server::RelayServer;
pub use shutdown::{DrainOutcome, ShutdownCoordinator};
