//! Raw packet-level datatypes.
//!
//! A [`Packet`] is a single payload-bearing TCP segment as delivered by the
//! (out-of-scope) capture backend: already stripped of pure ACKs, with its
//! sequence/ack numbers and endpoint identity parsed out. It is an
//! immutable value — the [`crate::message::Message`] that eventually holds
//! one owns its bytes so that nothing outlives the packet.

use serde::Serialize;

use std::time::SystemTime;

/// Opaque connection identifier, stable across a packet's lifetime.
///
/// Assigned by the capture backend; this crate never inspects it beyond
/// equality and use as a map key.
pub type ConnId = u64;

/// A single payload-bearing TCP segment.
#[derive(Debug, Clone, Serialize)]
pub struct Packet {
    /// TCP sequence number of the first byte in `data`.
    pub seq: u32,
    /// TCP acknowledgement number carried on the segment.
    pub ack: u32,
    /// Payload bytes. Never empty — pure-ACK segments are filtered
    /// upstream by the capture backend.
    pub data: Vec<u8>,
    /// 16 bytes of endpoint identity, typically the remote IP zero-padded
    /// to a fixed width so v4 and v6 addresses share one representation.
    pub addr: [u8; 16],
    /// Source/destination port in wire order (src then dst), 2 bytes each.
    pub raw_ports: [u8; 4],
    /// Connection identifier this segment belongs to.
    pub id: ConnId,
    /// `true` if this segment travels client -> server (request
    /// direction); `false` for server -> client (response direction).
    pub is_incoming: bool,
    /// Capture timestamp. Monotonic per flow per the producer contract.
    pub timestamp: SystemTime,
}

impl Packet {
    /// Returns the sequence number one past the last byte of `data`.
    #[inline]
    pub fn end_seq(&self) -> u32 {
        self.seq.wrapping_add(self.data.len() as u32)
    }

    /// Source port, as carried in `raw_ports[0..2]`.
    #[inline]
    pub fn src_port(&self) -> [u8; 2] {
        [self.raw_ports[0], self.raw_ports[1]]
    }

    /// Destination port, as carried in `raw_ports[2..4]`.
    #[inline]
    pub fn dst_port(&self) -> [u8; 2] {
        [self.raw_ports[2], self.raw_ports[3]]
    }
}
