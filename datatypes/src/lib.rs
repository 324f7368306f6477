//! Passive, subscriber-facing data types for HTTP-over-TCP reassembly.
//!
//! This crate holds value types only — [`Packet`] (a single TCP segment)
//! and [`Message`] (a completed, correlated HTTP request or response).
//! The stateful logic that turns a stream of the former into the latter
//! lives in `wiretap-core`.

pub mod message;
pub mod packet;

pub use message::{Direction, Message};
pub use packet::{ConnId, Packet};
