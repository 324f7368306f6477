//! Per-message reassembly state.
//!
//! A [`MessageAssembler`] holds one HTTP request or response as it is
//! built up out of order and possibly retransmitted TCP segments. It
//! keeps a sorted, duplicate-free packet list plus cached
//! classifications that are eagerly recomputed after every accepted
//! packet, following the same eager-recompute shape as
//! `ConnInfo`/`TcpFlow` in this crate's connection tracking lineage —
//! see `flush_ooo_buffer`'s `wrapping_lt`-guarded sorted insert, which
//! `insert_sorted` below adapts to a whole-packet (rather than
//! byte-stream) reassembly model.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sha1::{Digest, Sha1};

use wiretap_datatypes::{ConnId, Direction, Message, Packet};

use crate::flow::RequestRef;
use crate::headers::{body_slice, header_value};

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
const CONTINUE_GAP_LEN: u32 = 22;

/// Cached method classification for a message's first packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Unset,
    WithBody,
    WithoutBody,
    NotFound,
}

/// Cached body-framing classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Unset,
    Empty,
    ContentLength,
    Chunked,
}

/// Cached `Expect: 100-continue` classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectKind {
    Unset,
    Empty,
    Continue100,
}

/// Per-message reassembly state: an ordered packet list plus the
/// classifications derived from it.
#[derive(Debug)]
pub struct MessageAssembler {
    direction: Direction,
    packets: Vec<Packet>,
    /// Flow-identifying ack, fixed at creation.
    ack: u32,
    /// Most recently observed non-zero ack carried on any packet.
    data_ack: u32,
    start: SystemTime,
    end: SystemTime,
    /// For outgoing messages: the request that triggered this response,
    /// once correlated. `None` until `FlowTracker` finds a match.
    assoc: Option<RequestRef>,
    response_ack: u32,
    response_id: [u8; 24],
    method_kind: MethodKind,
    body_kind: BodyKind,
    expect_kind: ExpectKind,
    header_pkt_idx: isize,
    content_length: usize,
    gap: bool,
    complete: bool,
}

impl MessageAssembler {
    /// Creates an empty assembler for a new message on `direction`,
    /// keyed by `ack`. The caller immediately follows this with
    /// [`add`](Self::add) for the packet that prompted its creation.
    pub fn new(direction: Direction, ack: u32, now: SystemTime) -> Self {
        MessageAssembler {
            direction,
            packets: Vec::new(),
            ack,
            data_ack: 0,
            start: now,
            end: now,
            assoc: None,
            response_ack: 0,
            response_id: [0u8; 24],
            method_kind: MethodKind::Unset,
            body_kind: BodyKind::Unset,
            expect_kind: ExpectKind::Unset,
            header_pkt_idx: -1,
            content_length: 0,
            gap: false,
            complete: false,
        }
    }

    /// Inserts `packet` at its sorted position and recomputes cached
    /// classifications. A duplicate `seq` is a silent no-op.
    pub fn add(&mut self, packet: Packet) {
        let timestamp = packet.timestamp;
        if !self.insert_sorted(packet) {
            return;
        }
        self.end = if self.direction == Direction::Outgoing {
            timestamp + Duration::from_millis(1)
        } else {
            timestamp
        };
        self.recompute();
    }

    fn insert_sorted(&mut self, packet: Packet) -> bool {
        if packet.ack != 0 {
            self.data_ack = packet.ack;
        }
        if self.packets.iter().any(|p| p.seq == packet.seq) {
            return false;
        }
        if self.packets.is_empty() {
            self.packets.push(packet);
            return true;
        }
        if wrapping_lt(packet.seq, self.packets[0].seq) {
            self.packets.insert(0, packet);
        } else if wrapping_lt(self.packets[self.packets.len() - 1].seq, packet.seq) {
            self.packets.push(packet);
        } else {
            let pos = self.packets.partition_point(|p| wrapping_lt(p.seq, packet.seq));
            self.packets.insert(pos, packet);
        }
        true
    }

    fn recompute(&mut self) {
        self.recompute_gap();
        self.recompute_header_pkt_idx();
        self.recompute_method_kind();
        self.recompute_body_kind();
        self.recompute_complete();
        self.recompute_expect_kind();
        self.recompute_response_key();
    }

    fn recompute_gap(&mut self) {
        let mut gap = false;
        for w in self.packets.windows(2) {
            let expected = w[0].end_seq();
            if w[1].seq != expected {
                let diff = w[1].seq.wrapping_sub(expected);
                if self.expect_kind == ExpectKind::Continue100 && diff == CONTINUE_GAP_LEN {
                    continue;
                }
                gap = true;
                break;
            }
        }
        self.gap = gap;
    }

    fn recompute_header_pkt_idx(&mut self) {
        if self.header_pkt_idx != -1 {
            return;
        }
        for (i, p) in self.packets.iter().enumerate() {
            if memchr::memmem::find(&p.data, HEADER_TERMINATOR).is_some() {
                self.header_pkt_idx = i as isize;
                return;
            }
        }
    }

    fn recompute_method_kind(&mut self) {
        if matches!(self.method_kind, MethodKind::WithBody | MethodKind::WithoutBody) {
            return;
        }
        let Some(first) = self.packets.first() else {
            return;
        };
        let data = &first.data;
        if data.len() < 16 {
            self.method_kind = MethodKind::NotFound;
            return;
        }
        self.method_kind = match self.direction {
            Direction::Incoming => {
                let space = data[..8].iter().position(|&b| b == b' ');
                match space.and_then(|sp| data.get(sp + 1).map(|&b| (sp, b))) {
                    Some((sp, target)) if matches!(target, b'/' | b'h' | b'*') => {
                        let method = &data[..sp];
                        if matches!(method, b"POST" | b"PUT" | b"PATCH" | b"CONNECT") {
                            MethodKind::WithBody
                        } else {
                            MethodKind::WithoutBody
                        }
                    }
                    _ => MethodKind::NotFound,
                }
            }
            Direction::Outgoing => {
                if &data[0..6] == b"HTTP/1" {
                    MethodKind::WithBody
                } else {
                    MethodKind::NotFound
                }
            }
        };
    }

    fn recompute_body_kind(&mut self) {
        match self.method_kind {
            MethodKind::Unset | MethodKind::NotFound => return,
            MethodKind::WithoutBody => {
                self.body_kind = BodyKind::Empty;
                return;
            }
            MethodKind::WithBody => {}
        }
        if matches!(self.body_kind, BodyKind::ContentLength | BodyKind::Chunked) {
            return;
        }
        if self.header_pkt_idx < 0 {
            return;
        }
        let header_buf = self.header_bytes();
        let content_length = header_value(&header_buf, "content-length");
        if !content_length.is_empty() {
            if let Ok(n) = std::str::from_utf8(content_length)
                .unwrap_or("")
                .trim()
                .parse::<usize>()
            {
                self.content_length = n;
                self.body_kind = BodyKind::ContentLength;
                return;
            }
        }
        if !header_value(&header_buf, "transfer-encoding").is_empty() {
            self.body_kind = BodyKind::Chunked;
            return;
        }
        self.body_kind = BodyKind::Empty;
    }

    fn recompute_complete(&mut self) {
        if self.complete {
            return;
        }
        if self.gap || self.header_pkt_idx < 0 {
            return;
        }
        if self.method_kind == MethodKind::NotFound {
            return;
        }
        if self.direction == Direction::Outgoing && self.assoc.is_none() {
            return;
        }
        self.complete = match self.body_kind {
            BodyKind::Unset => false,
            BodyKind::Empty => true,
            BodyKind::ContentLength => {
                self.content_length == 0 || self.content_length == self.body_size()
            }
            BodyKind::Chunked => self
                .packets
                .last()
                .is_some_and(|p| memchr::memmem::find(&p.data, b"0\r\n\r\n").is_some()),
        };
    }

    fn recompute_expect_kind(&mut self) {
        if self.expect_kind != ExpectKind::Unset {
            return;
        }
        if self.method_kind != MethodKind::WithBody || self.header_pkt_idx < 0 || self.gap {
            return;
        }
        let Some(first) = self.packets.first() else {
            return;
        };
        if first.data.len() < 25 {
            return;
        }
        let Some(last) = self.packets.last() else {
            return;
        };
        if !last.data.ends_with(HEADER_TERMINATOR) {
            return;
        }
        let header_buf = self.header_bytes();
        let expect = header_value(&header_buf, "expect");
        self.expect_kind = if expect.eq_ignore_ascii_case(b"100-continue") {
            ExpectKind::Continue100
        } else {
            ExpectKind::Empty
        };
    }

    fn recompute_response_key(&mut self) {
        if self.direction != Direction::Incoming {
            return;
        }
        let Some(last) = self.packets.last() else {
            return;
        };
        let response_ack = last.end_seq();
        self.response_ack = response_ack;
        self.response_id =
            build_response_key(&last.addr, last.dst_port(), last.src_port(), response_ack);
    }

    fn header_bytes(&self) -> Vec<u8> {
        let idx = self.header_pkt_idx.max(0) as usize;
        let mut buf = Vec::new();
        for p in &self.packets[..=idx] {
            buf.extend_from_slice(&p.data);
        }
        buf
    }

    /// Concatenation of payloads in packet order.
    pub fn bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for p in &self.packets {
            out.extend_from_slice(&p.data);
        }
        out
    }

    /// Length of the body: bytes after the header terminator in the
    /// header packet, plus every subsequent packet's full payload. `0`
    /// if there are no packets yet or the header hasn't been found.
    pub fn body_size(&self) -> usize {
        if self.packets.is_empty() || self.header_pkt_idx < 0 {
            return 0;
        }
        let idx = self.header_pkt_idx as usize;
        let head = body_slice(&self.packets[idx].data).len();
        let rest: usize = self.packets[idx + 1..].iter().map(|p| p.data.len()).sum();
        head + rest
    }

    /// 40 hex character identity, shared between a request and its
    /// paired response.
    pub fn uuid(&self) -> String {
        let (start_nanos, ack) = match (&self.assoc, self.direction) {
            (Some(req), Direction::Outgoing) => (req.start_nanos, req.ack),
            _ => (nanos_since_epoch(self.start), self.ack),
        };
        compute_uuid(start_nanos, ack)
    }

    /// Connection id this message belongs to.
    pub fn id(&self) -> ConnId {
        self.packets.first().map(|p| p.id).unwrap_or_default()
    }

    /// Sequence number of the first packet, after reordering.
    pub fn seq_start(&self) -> Option<u32> {
        self.packets.first().map(|p| p.seq)
    }

    /// Flow-identifying ack this message was created with.
    pub fn ack(&self) -> u32 {
        self.ack
    }

    /// Most recently observed non-zero ack of any packet in this
    /// message.
    pub fn data_ack(&self) -> u32 {
        self.data_ack
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn gap(&self) -> bool {
        self.gap
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn end(&self) -> SystemTime {
        self.end
    }

    pub fn start(&self) -> SystemTime {
        self.start
    }

    /// The key a matching response will carry, valid once at least one
    /// packet has been observed. Only meaningful for incoming messages.
    pub fn response_key(&self) -> [u8; 24] {
        self.response_id
    }

    /// Associates this (outgoing) message with the request that caused
    /// it and re-evaluates completeness.
    pub fn set_assoc(&mut self, request: RequestRef) {
        self.assoc = Some(request);
        self.recompute_complete();
    }

    pub fn has_assoc(&self) -> bool {
        self.assoc.is_some()
    }

    /// Builds the passive [`Message`] record for emission. Callers
    /// should only do this once `is_complete()` returns `true`.
    pub fn into_message(self) -> Message {
        let uuid = self.uuid();
        let in_response_to = match self.direction {
            Direction::Incoming => Some(uuid.clone()),
            Direction::Outgoing => None,
        };
        Message {
            direction: self.direction,
            uuid,
            id: self.id(),
            bytes: self.bytes(),
            start: self.start,
            end: self.end,
            in_response_to,
        }
    }
}

/// The 24-byte key an outgoing packet's own fields resolve to, used to
/// look up `FlowTracker`'s `pending_responses` table. Built the same
/// way as the request's own `response_key` so the two meet in the
/// middle: ports are naturally already swapped by direction, so no
/// manual swap is needed on this side.
pub fn response_lookup_key(packet: &Packet) -> [u8; 24] {
    build_response_key(&packet.addr, packet.src_port(), packet.dst_port(), packet.ack)
}

fn build_response_key(addr: &[u8; 16], port_a: [u8; 2], port_b: [u8; 2], ack: u32) -> [u8; 24] {
    let mut key = [0u8; 24];
    key[0..16].copy_from_slice(addr);
    key[16..18].copy_from_slice(&port_a);
    key[18..20].copy_from_slice(&port_b);
    key[20..24].copy_from_slice(&ack.to_be_bytes());
    key
}

fn nanos_since_epoch(t: SystemTime) -> u128 {
    t.duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos()
}

fn compute_uuid(start_nanos: u128, ack: u32) -> String {
    let mut hasher = Sha1::new();
    hasher.update(start_nanos.to_string().as_bytes());
    hasher.update(ack.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Wraparound-safe "less than" for 32-bit TCP sequence numbers (RFC 1323).
pub(crate) fn wrapping_lt(lhs: u32, rhs: u32) -> bool {
    lhs.wrapping_sub(rhs) > (1 << 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn packet(seq: u32, ack: u32, data: &[u8], incoming: bool) -> Packet {
        Packet {
            seq,
            ack,
            data: data.to_vec(),
            addr: [1u8; 16],
            raw_ports: [0, 80, 0, 8080],
            id: 1,
            is_incoming: incoming,
            timestamp: SystemTime::UNIX_EPOCH + Duration::from_secs(seq as u64),
        }
    }

    fn incoming() -> MessageAssembler {
        MessageAssembler::new(Direction::Incoming, 1000, SystemTime::UNIX_EPOCH)
    }

    fn outgoing() -> MessageAssembler {
        MessageAssembler::new(Direction::Outgoing, 1000, SystemTime::UNIX_EPOCH)
    }

    #[test]
    fn s1_get_no_body() {
        let mut m = incoming();
        m.add(packet(1, 1000, b"GET / HTTP/1.1\r\nHost: x\r\n\r\n", true));
        assert_eq!(m.method_kind, MethodKind::WithoutBody);
        assert_eq!(m.body_kind, BodyKind::Empty);
        assert!(m.is_complete());
    }

    #[test]
    fn s2_content_length_split() {
        let a = b"POST /u HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\nhe";
        let mut m = incoming();
        m.add(packet(1, 1000, a, true));
        assert!(!m.is_complete());
        m.add(packet(1 + a.len() as u32, 1000, b"llo", true));
        assert_eq!(m.body_kind, BodyKind::ContentLength);
        assert_eq!(m.content_length, 5);
        assert!(m.is_complete());
        let mut expected = a.to_vec();
        expected.extend_from_slice(b"llo");
        assert_eq!(m.bytes(), expected);
    }

    #[test]
    fn s3_reorder_then_gap_closes() {
        let a = b"POST /u HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\nhe";
        let mut m = incoming();
        m.add(packet(1 + a.len() as u32, 1000, b"llo", true));
        assert!(m.gap());
        assert!(!m.is_complete());
        m.add(packet(1, 1000, a, true));
        assert!(!m.gap());
        assert!(m.is_complete());
        let mut expected = a.to_vec();
        expected.extend_from_slice(b"llo");
        assert_eq!(m.bytes(), expected);
    }

    #[test]
    fn s4_chunked() {
        let data = b"POST /u HTTP/1.1\r\nHost: x\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n";
        let mut m = incoming();
        m.add(packet(1, 1000, data, true));
        assert_eq!(m.body_kind, BodyKind::Chunked);
        assert!(m.is_complete());
    }

    #[test]
    fn s5_100_continue_tolerates_22_byte_gap() {
        let header = b"POST /u HTTP/1.1\r\nHost: x\r\nExpect: 100-continue\r\nContent-Length: 5\r\n\r\n";
        let mut m = incoming();
        m.add(packet(1, 1000, header, true));
        assert_eq!(m.expect_kind, ExpectKind::Continue100);
        // the "100 Continue" interlude (22 bytes) is never observed on this flow
        m.add(packet(
            1 + header.len() as u32 + CONTINUE_GAP_LEN,
            1000,
            b"hello",
            true,
        ));
        assert!(!m.gap());
        assert!(m.is_complete());
    }

    #[test]
    fn s6_pairing_shares_uuid() {
        let mut req = incoming();
        req.add(packet(1, 1000, b"GET / HTTP/1.1\r\nHost: x\r\n\r\n", true));
        assert!(req.is_complete());
        let request_ref = RequestRef {
            start_nanos: nanos_since_epoch(req.start),
            ack: req.ack(),
            id: req.id(),
            last_seen: req.end(),
        };

        let mut resp = outgoing();
        resp.add(packet(
            1,
            1028,
            b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n",
            false,
        ));
        assert!(!resp.is_complete()); // no assoc yet
        resp.set_assoc(request_ref);
        assert!(resp.is_complete());
        assert_eq!(req.uuid(), resp.uuid());
    }

    #[test]
    fn not_found_never_completes() {
        let mut m = incoming();
        m.add(packet(1, 1000, b"not even close to a request line", true));
        assert_eq!(m.method_kind, MethodKind::NotFound);
        assert!(!m.is_complete());
        m.add(packet(34, 1000, b"more bytes but still junk\r\n\r\n", true));
        assert!(!m.is_complete());
    }

    #[test]
    fn duplicate_insertion_is_idempotent() {
        let mut m = incoming();
        let p = packet(1, 1000, b"GET / HTTP/1.1\r\nHost: x\r\n\r\n", true);
        m.add(p.clone());
        let bytes_before = m.bytes();
        m.add(p);
        assert_eq!(m.bytes(), bytes_before);
    }

    #[test]
    fn permutation_order_independent() {
        let a = b"POST /u HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\nhe";
        let b = b"llo";
        let mut forward = incoming();
        forward.add(packet(1, 1000, a, true));
        forward.add(packet(1 + a.len() as u32, 1000, b, true));

        let mut reversed = incoming();
        reversed.add(packet(1 + a.len() as u32, 1000, b, true));
        reversed.add(packet(1, 1000, a, true));

        assert_eq!(forward.bytes(), reversed.bytes());
        assert!(forward.is_complete() && reversed.is_complete());
    }
}
