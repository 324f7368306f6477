//! Minimal wiring of [`wiretap_core::FlowTracker`] into a
//! [`wiretap_core::FileSink`], in the spirit of the teacher's own
//! `examples/log_http`: a small standalone binary that exercises the
//! library rather than a full capture pipeline (no packet sniffing
//! backend lives in this workspace — see `wiretap_core`'s crate docs).
//!
//! Since there is no capture backend to source real traffic from, this
//! feeds a handful of synthetic packets through the tracker: a plain GET,
//! a `Content-Length`-framed POST split across two segments, and their
//! paired responses. Each emitted [`wiretap_datatypes::Message`] is
//! logged and appended to a rotating JSON-lines sink.

use std::time::{Duration, SystemTime};

use log::info;

use wiretap_core::config::{FileSinkConfig, FlowTrackerConfig};
use wiretap_core::{FileSink, FlowTracker};
use wiretap_datatypes::Packet;

fn main() {
    env_logger::init();

    let (mut tracker, messages) = FlowTracker::new(FlowTrackerConfig::default());
    let mut sink = FileSink::new(FileSinkConfig {
        template: "http_capture_%Y%m%d.jsonl".to_string(),
        ..FileSinkConfig::default()
    });

    for packet in synthetic_packets() {
        tracker.ingest(packet);
    }

    // the tracker's emit channel only ever fills during `ingest`, so
    // everything it will ever produce from the packets above is
    // already queued by the time we get here.
    for message in messages.try_iter() {
        info!(
            "emitted {:?} uuid={} conn={} bytes={}",
            message.direction,
            message.uuid,
            message.id,
            message.bytes.len()
        );
        let line = serde_json::to_vec(&message).expect("Message serialization is infallible");
        if let Err(err) = sink.write(&line) {
            log::error!("failed to write message to sink: {err}");
            std::process::exit(1);
        }
    }

    if let Err(err) = sink.close() {
        log::error!("failed to close sink: {err}");
        std::process::exit(1);
    }
}

/// Builds a GET/200 exchange followed by a two-segment POST/204
/// exchange on a single synthetic connection.
fn synthetic_packets() -> Vec<Packet> {
    let addr = [10u8; 16];
    let client_port = [0x1f, 0x90]; // 8080
    let server_port = [0x00, 0x50]; // 80
    let conn_id = 1;
    let now = SystemTime::now();

    let get_req = b"GET /status HTTP/1.1\r\nHost: example\r\n\r\n".to_vec();
    let get_req_len = get_req.len() as u32;
    let get_resp = b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n".to_vec();

    let post_header = b"POST /submit HTTP/1.1\r\nHost: example\r\nContent-Length: 5\r\n\r\nhe".to_vec();
    let post_header_len = post_header.len() as u32;
    let post_body = b"llo".to_vec();
    let post_req_total_len = post_header_len + post_body.len() as u32;
    let post_resp = b"HTTP/1.1 204 No Content\r\nContent-Length: 0\r\n\r\n".to_vec();

    let base_seq = 1u32;
    let post_seq = base_seq + get_req_len + 1000;

    vec![
        Packet {
            seq: base_seq,
            ack: 1000,
            data: get_req,
            addr,
            raw_ports: [client_port[0], client_port[1], server_port[0], server_port[1]],
            id: conn_id,
            is_incoming: true,
            timestamp: now,
        },
        Packet {
            seq: 1,
            ack: base_seq + get_req_len,
            data: get_resp,
            addr,
            raw_ports: [server_port[0], server_port[1], client_port[0], client_port[1]],
            id: conn_id,
            is_incoming: false,
            timestamp: now + Duration::from_millis(1),
        },
        Packet {
            seq: post_seq,
            ack: 2000,
            data: post_header,
            addr,
            raw_ports: [client_port[0], client_port[1], server_port[0], server_port[1]],
            id: conn_id,
            is_incoming: true,
            timestamp: now + Duration::from_millis(2),
        },
        Packet {
            seq: post_seq + post_header_len,
            ack: 2000,
            data: post_body,
            addr,
            raw_ports: [client_port[0], client_port[1], server_port[0], server_port[1]],
            id: conn_id,
            is_incoming: true,
            timestamp: now + Duration::from_millis(3),
        },
        Packet {
            seq: 1,
            ack: post_seq + post_req_total_len,
            data: post_resp,
            addr,
            raw_ports: [server_port[0], server_port[1], client_port[0], client_port[1]],
            id: conn_id,
            is_incoming: false,
            timestamp: now + Duration::from_millis(4),
        },
    ]
}
