//! Top-level registry: routes packets to assemblers, correlates
//! requests with responses, and ages out stale state.
//!
//! Shaped after [`crate::conntrack::ConnTracker`]: a `LinkedHashMap`
//! keyed table plus a tick-driven, non-blocking age-out check, polled
//! from the same single thread that calls `ingest` so the table is
//! never touched concurrently (see `conntrack::timerwheel::TimerWheel`
//! for the pattern this borrows). Unlike `TimerWheel`'s bucketed
//! expiry, age-out here is a plain linear scan — the quiescence window
//! is uniform across all messages, so there is no bucket structure to
//! gain from.

use std::time::{Duration, Instant, SystemTime};

use crossbeam::channel::{tick, unbounded, Receiver, Sender};
use hashlink::LinkedHashMap;

use wiretap_datatypes::{ConnId, Direction, Message, Packet};

use crate::assembler::{response_lookup_key, MessageAssembler};
use crate::config::FlowTrackerConfig;

/// Key identifying an open message within `FlowTracker::by_flow`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub id: ConnId,
    pub ack: u32,
    pub direction: Direction,
}

/// A non-owning correlation token left behind by a completed request
/// so a later response can adopt its identity. This is the systems-
/// language stand-in for a weak reference: an index into
/// `FlowTracker`'s own table rather than a pointer to the request's
/// (possibly already-drained) assembler.
#[derive(Debug, Clone, Copy)]
pub struct RequestRef {
    pub(crate) start_nanos: u128,
    pub(crate) ack: u32,
    pub(crate) id: ConnId,
    pub(crate) last_seen: SystemTime,
}

/// Routes packets to per-message assemblers, correlates responses with
/// requests, and emits completed messages on a channel.
pub struct FlowTracker {
    config: FlowTrackerConfig,
    by_flow: LinkedHashMap<FlowKey, MessageAssembler>,
    pending_responses: LinkedHashMap<[u8; 24], RequestRef>,
    emit_tx: Sender<Message>,
    age_out_ticker: Receiver<Instant>,
}

impl FlowTracker {
    /// Creates a tracker and returns it alongside the receiving half of
    /// its emit channel.
    pub fn new(config: FlowTrackerConfig) -> (Self, Receiver<Message>) {
        let (emit_tx, emit_rx) = unbounded();
        let age_out_ticker = tick(Duration::from_millis(config.check_interval_ms));
        let tracker = FlowTracker {
            config,
            by_flow: LinkedHashMap::new(),
            pending_responses: LinkedHashMap::new(),
            emit_tx,
            age_out_ticker,
        };
        (tracker, emit_rx)
    }

    /// Number of assemblers currently open.
    pub fn len(&self) -> usize {
        self.by_flow.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_flow.is_empty()
    }

    /// Routes `packet` to its assembler (creating one if needed),
    /// updates correlation state, and emits the message if it just
    /// became complete. Also polls the age-out ticker — call this from
    /// the single ingestion thread only.
    pub fn ingest(&mut self, packet: Packet) {
        self.check_inactive();

        let direction = if packet.is_incoming {
            Direction::Incoming
        } else {
            Direction::Outgoing
        };
        let key = FlowKey {
            id: packet.id,
            ack: packet.ack,
            direction,
        };
        // computed before `packet` moves into `add`; only meaningful
        // for the outgoing, not-yet-correlated case handled below.
        let lookup_key = response_lookup_key(&packet);

        let assembler = self
            .by_flow
            .entry(key)
            .or_insert_with(|| MessageAssembler::new(direction, packet.ack, packet.timestamp));
        // the response key a prior packet on this same message registered
        // under, if any; it changes on every accepted packet (derived from
        // the *last* packet), so the old entry must be evicted below.
        let prior_response_key = assembler.response_key();
        assembler.add(packet);

        if direction == Direction::Incoming {
            let request_ref = RequestRef {
                start_nanos: nanos_since_epoch(assembler.start()),
                ack: assembler.ack(),
                id: assembler.id(),
                last_seen: assembler.end(),
            };
            let response_key = assembler.response_key();
            if response_key != prior_response_key {
                self.pending_responses.remove(&prior_response_key);
            }
            self.pending_responses.insert(response_key, request_ref);
        } else if !assembler.has_assoc() {
            if let Some(request_ref) = self.pending_responses.get(&lookup_key).copied() {
                assembler.set_assoc(request_ref);
            }
        }

        if self.by_flow.get(&key).is_some_and(MessageAssembler::is_complete) {
            self.drain(key);
        }
    }

    fn drain(&mut self, key: FlowKey) {
        if let Some(assembler) = self.by_flow.remove(&key) {
            let _ = self.emit_tx.send(assembler.into_message());
        }
    }

    /// Polls the age-out ticker (non-blocking) and, if it has fired,
    /// removes assemblers that have been quiescent past the configured
    /// window: complete ones are emitted, incomplete ones are dropped.
    fn check_inactive(&mut self) {
        if self.age_out_ticker.try_recv().is_err() {
            return;
        }
        let quiescence = Duration::from_millis(self.config.quiescence_ms);
        let now = SystemTime::now();
        let stale: Vec<FlowKey> = self
            .by_flow
            .iter()
            .filter(|(_, a)| {
                now.duration_since(a.end())
                    .map(|age| age >= quiescence)
                    .unwrap_or(false)
            })
            .map(|(k, _)| *k)
            .collect();
        for key in stale {
            if let Some(assembler) = self.by_flow.remove(&key) {
                if assembler.is_complete() {
                    let _ = self.emit_tx.send(assembler.into_message());
                }
            }
        }
        let request_ttl = quiescence * 2;
        self.pending_responses
            .retain(|_, req| now.duration_since(req.last_seen).unwrap_or_default() < request_ttl);
    }
}

fn nanos_since_epoch(t: SystemTime) -> u128 {
    t.duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    fn packet(seq: u32, ack: u32, data: &[u8], incoming: bool, id: ConnId) -> Packet {
        Packet {
            seq,
            ack,
            data: data.to_vec(),
            addr: [7u8; 16],
            raw_ports: [0, 80, 0x1f, 0x90],
            id,
            is_incoming: incoming,
            timestamp: SystemTime::now(),
        }
    }

    #[test]
    fn request_emits_before_response() {
        let (mut tracker, rx) = FlowTracker::new(FlowTrackerConfig::default());
        let req = b"GET / HTTP/1.1\r\nHost: x\r\n\r\n";
        tracker.ingest(packet(1, 1000, req, true, 42));
        let first = rx.try_recv().expect("request should have been emitted");
        assert!(first.is_request());

        let response_ack = 1 + req.len() as u32;
        let mut resp_packet = packet(1, response_ack, b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n", false, 42);
        // response travels in the opposite direction: ports swap, addr stays the endpoint pair
        resp_packet.raw_ports = [0x1f, 0x90, 0, 80];
        tracker.ingest(resp_packet);
        let second = rx.try_recv().expect("response should have been emitted");
        assert!(second.is_response());
        assert_eq!(first.uuid, second.uuid);
    }

    #[test]
    fn age_out_drops_incomplete_orphans() {
        let mut cfg = FlowTrackerConfig::default();
        cfg.quiescence_ms = 1;
        cfg.check_interval_ms = 1;
        let (mut tracker, rx) = FlowTracker::new(cfg);
        tracker.ingest(packet(1, 1000, b"junk", true, 7));
        assert_eq!(tracker.len(), 1);
        std::thread::sleep(StdDuration::from_millis(20));
        // a later, unrelated ingest is what actually polls the ticker
        tracker.ingest(packet(200, 2000, b"another junk packet, unrelated flow", true, 9));
        assert!(tracker.by_flow.get(&FlowKey {
            id: 7,
            ack: 1000,
            direction: Direction::Incoming
        })
        .is_none());
        assert!(rx.try_iter().next().is_none());
    }
}
