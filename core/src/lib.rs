#![allow(clippy::needless_doctest_main)]

//! Stateful core for HTTP-over-TCP message reassembly.
//!
//! `wiretap-core` turns a stream of raw, possibly out-of-order and
//! retransmitted TCP segments into complete, correlated HTTP
//! request/response pairs with stable identities. It does not sniff
//! packets itself — that is an external collaborator's job — and it
//! does not speak HTTP/2 or terminate TLS; see [`assembler`] for the
//! framing rules it does implement.
//!
//! A typical pipeline:
//!
//! ```no_run
//! use wiretap_core::config::FlowTrackerConfig;
//! use wiretap_core::flow::FlowTracker;
//! use wiretap_datatypes::Packet;
//!
//! let cfg = FlowTrackerConfig::default();
//! let (mut tracker, messages) = FlowTracker::new(cfg);
//!
//! // fn next_packet() -> Option<Packet> { None }
//! # fn next_packet() -> Option<Packet> { None }
//! while let Some(packet) = next_packet() {
//!     tracker.ingest(packet);
//! }
//! for message in messages.try_iter() {
//!     println!("{:?}", message.uuid);
//! }
//! ```
//!
//! Passive value types ([`wiretap_datatypes::Packet`],
//! [`wiretap_datatypes::Message`]) live in the sibling `wiretap-datatypes`
//! crate; this crate holds the stateful logic that produces the latter
//! from the former, plus the rotating [`sink::FileSink`] that one
//! common consumer writes them to.

pub mod assembler;
pub mod config;
pub mod error;
pub mod flow;
pub mod headers;
pub mod sink;

pub use assembler::MessageAssembler;
pub use error::SinkError;
pub use flow::FlowTracker;
pub use sink::FileSink;
