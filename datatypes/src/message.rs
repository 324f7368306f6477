//! The completed, passive record handed to a consumer.
//!
//! A [`Message`] is what a [`MessageAssembler`](../wiretap_core/struct.MessageAssembler.html)
//! becomes once its completeness rule is satisfied and `FlowTracker` drains
//! it. It owns its bytes outright; nothing about it can change afterwards.

use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;

use std::time::SystemTime;

use crate::packet::ConnId;

/// Which side of a flow a message travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    /// Client -> server: a request.
    Incoming,
    /// Server -> client: a response.
    Outgoing,
}

/// A completed HTTP message, ready for delivery.
#[derive(Debug, Clone)]
pub struct Message {
    /// Request or response.
    pub direction: Direction,
    /// 40 hex character identity, shared between a request and its
    /// paired response.
    pub uuid: String,
    /// Connection the message was observed on.
    pub id: ConnId,
    /// Concatenated payload bytes, in packet order.
    pub bytes: Vec<u8>,
    /// Timestamp of the first accepted packet.
    pub start: SystemTime,
    /// Timestamp of the last accepted packet (offset +1ms for outgoing
    /// messages, so a response never sorts before its request).
    pub end: SystemTime,
    /// For a request, echoes `uuid` (the shared identity) so a consumer
    /// can check request/response pairing without cross-referencing the
    /// rest of the stream. `None` for a response, since its own `uuid`
    /// already carries the same identity.
    pub in_response_to: Option<String>,
}

impl Message {
    /// `true` if this is a request.
    #[inline]
    pub fn is_request(&self) -> bool {
        self.direction == Direction::Incoming
    }

    /// `true` if this is a response.
    #[inline]
    pub fn is_response(&self) -> bool {
        self.direction == Direction::Outgoing
    }
}

impl Serialize for Message {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Message", 7)?;
        state.serialize_field("direction", &self.direction)?;
        state.serialize_field("uuid", &self.uuid)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("len", &self.bytes.len())?;
        state.serialize_field("start", &self.start)?;
        state.serialize_field("end", &self.end)?;
        state.serialize_field("in_response_to", &self.in_response_to)?;
        state.end()
    }
}
