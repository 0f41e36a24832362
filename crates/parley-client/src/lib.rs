//! # parley-client
//!
//! Terminal client for the parley relay. Lines typed on input are sent as
//! chat messages; frames from the relay are rendered one per output line.
//!
//! - [`ChatClient`]: connection lifecycle and the read/write loop
//! - [`Inbound`]: how a received payload is displayed
//! - [`Roster`]: peers currently known to be connected

#![deny(unsafe_code)]

pub mod client;
pub mod inbound;
pub mod roster;

pub use client::ChatClient;
pub use inbound::Inbound;
pub use roster::Roster;
