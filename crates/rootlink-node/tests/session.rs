//! End-to-end handshake and session tests over in-memory pipes.

mod common;

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use rootlink_common::Charset;
use rootlink_core::crypto::Salt;
use rootlink_core::protocol::ProtocolVersion;
use rootlink_core::{CoreError, FramingFault, ProtocolSettings};
use rootlink_node::services::handshake::Handshake;
use rootlink_node::services::HandshakeState;
use rootlink_node::{Message, NodeError, Record, Role};
use rootlink_transport::memory::pipe;
use rootlink_transport::{Connection, Throttle, Throttled};

use common::{context, context_with, establish, pki, trust};

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Reading {
    sensor: String,
    value: i64,
}

impl Record for Reading {
    const KIND: &'static str = "reading";
}

#[test]
fn test_handshake_mirrors_keys() {
    let (guest_ctx, host_ctx) = (context(&pki().guest), context(&pki().host));
    let (a, b) = pipe("guest", "host");

    let (guest, host) = establish(&guest_ctx, a, &host_ctx, b, Charset::Utf8);
    let (guest, host) = (guest.unwrap(), host.unwrap());

    assert_eq!(guest.role(), Role::Guest);
    assert_eq!(host.role(), Role::Host);
    assert_eq!(guest.keys().outgoing, host.keys().incoming);
    assert_eq!(guest.keys().incoming, host.keys().outgoing);
    assert_eq!(guest.keys().outgoing_auth, host.keys().incoming_auth);
    assert_eq!(guest.keys().incoming_auth, host.keys().outgoing_auth);
    assert_ne!(guest.keys().outgoing, guest.keys().incoming);

    assert_eq!(guest.peer().certificate.alias(), pki().host.certificate.alias());
    assert_eq!(host.peer().certificate.alias(), pki().guest.certificate.alias());
    assert!(guest.is_connected());
    assert!(host.is_connected());
}

#[test]
fn test_records_flow_both_ways() {
    let (guest_ctx, host_ctx) = (context(&pki().guest), context(&pki().host));
    let (a, b) = pipe("guest", "host");
    let (guest, host) = establish(&guest_ctx, a, &host_ctx, b, Charset::Utf8);
    let (guest, host) = (guest.unwrap(), host.unwrap());

    thread::scope(|scope| {
        scope.spawn(|| {
            let first = host.read::<Message>().unwrap();
            let reading = host.read::<Reading>().unwrap();
            host.write(&[Message::new(format!("{} {}", first.text, reading.value))])
                .unwrap();
            host.flush().unwrap();
        });

        guest.write(&[Message::new("got")]).unwrap();
        guest
            .write(&[Reading {
                sensor: "t0".into(),
                value: 21,
            }])
            .unwrap();
        guest.flush().unwrap();
        assert_eq!(guest.read::<Message>().unwrap().text, "got 21");
    });
}

#[test]
fn test_large_record_spans_many_checkpoints() {
    let (guest_ctx, host_ctx) = (context(&pki().guest), context(&pki().host));
    let (a, b) = pipe("guest", "host");
    let (guest, host) = establish(&guest_ctx, a, &host_ctx, b, Charset::Utf8);
    let (guest, host) = (guest.unwrap(), host.unwrap());
    let text = "x".repeat(100_000);

    thread::scope(|scope| {
        scope.spawn(|| {
            guest.write(&[Message::new(text.clone())]).unwrap();
            guest.flush().unwrap();
        });
        assert_eq!(host.read::<Message>().unwrap().text, text);
    });
}

#[test]
fn test_host_adopts_guest_charset() {
    let (guest_ctx, host_ctx) = (context(&pki().guest), context(&pki().host));
    let (a, b) = pipe("guest", "host");
    let (guest, host) = establish(&guest_ctx, a, &host_ctx, b, Charset::Utf16Le);
    let (guest, host) = (guest.unwrap(), host.unwrap());

    assert_eq!(guest.charset(), Charset::Utf16Le);
    assert_eq!(host.charset(), Charset::Utf16Le);

    guest.write(&[Message::new("ünïcode")]).unwrap();
    guest.flush().unwrap();
    assert_eq!(host.read::<Message>().unwrap().text, "ünïcode");
}

#[test]
fn test_version_mismatch_is_refused() {
    let settings = ProtocolSettings {
        version: ProtocolVersion::new(2),
        ..ProtocolSettings::default()
    };
    let guest_ctx = context_with(&pki().guest, trust(), settings);
    let host_ctx = context(&pki().host);
    let (a, b) = pipe("guest", "host");

    let (guest, (host, b)) = thread::scope(|scope| {
        let host = scope.spawn(|| {
            let outcome = Handshake::new(&host_ctx, &b, Role::Host)
                .run(Charset::Utf8)
                .map(drop);
            (outcome, b)
        });
        let guest = Handshake::new(&guest_ctx, &a, Role::Guest)
            .run(Charset::Utf8)
            .map(drop);
        (guest, host.join().unwrap())
    });

    assert!(matches!(
        host.unwrap_err(),
        NodeError::Core(CoreError::UnsupportedVersion { got: 2, .. })
    ));
    assert!(matches!(
        guest.unwrap_err(),
        NodeError::Core(CoreError::Rejected {
            step: "version",
            reply: 0xFF
        })
    ));

    // Both ends hang up before any identity is sent.
    assert!(!a.is_open());
    assert!(!b.is_open());
    assert_eq!(a.bytes_sent(), 1);
    assert_eq!(b.bytes_sent(), 1);
}

#[test]
fn test_foreign_hierarchy_is_refused() {
    let guest_ctx = context(&pki().foreign);
    let host_ctx = context(&pki().host);
    let (a, b) = pipe("intruder", "host");

    let (guest, host) = establish(&guest_ctx, a, &host_ctx, b, Charset::Utf8);

    let host_err = host.unwrap_err();
    assert!(matches!(host_err, NodeError::Core(CoreError::InvalidChain { .. })));
    assert!(host_err.is_suspicious());
    assert!(matches!(
        guest.unwrap_err(),
        NodeError::Core(CoreError::Rejected {
            step: "certificate chain",
            ..
        })
    ));
    assert!(host_ctx
        .trust()
        .cadastre(pki().foreign.certificate.alias())
        .unwrap()
        .is_none());
}

#[test]
fn test_second_handshake_uses_cadastre() {
    let guest_ctx = context(&pki().guest);
    let host_ctx = context(&pki().host);

    let (a, b) = pipe("guest", "host");
    let (guest, host) = establish(&guest_ctx, a, &host_ctx, b, Charset::Utf8);
    let guest = guest.unwrap();
    let first_sent = guest.connection().bytes_sent();
    drop((guest, host.unwrap()));

    assert!(host_ctx
        .trust()
        .cadastre(pki().guest.certificate.alias())
        .unwrap()
        .is_some());

    let (a, b) = pipe("guest", "host");
    let (guest, host) = establish(&guest_ctx, a, &host_ctx, b, Charset::Utf8);
    let second_sent = guest.unwrap().connection().bytes_sent();
    let host = host.unwrap();

    // No chain on the fast path.
    assert!(second_sent < first_sent);
    assert_eq!(host.peer().cadastre.alias, *pki().guest.certificate.alias());
}

#[test]
fn test_cadastre_salts_key_the_handshake() {
    let (guest_trust, host_trust) = (trust(), trust());
    let guest_ctx = context_with(&pki().guest, guest_trust.clone(), ProtocolSettings::default());
    let host_ctx = context_with(&pki().host, host_trust.clone(), ProtocolSettings::default());
    let guest_alias = pki().guest.certificate.alias();
    let host_alias = pki().host.certificate.alias();

    let (a, b) = pipe("guest", "host");
    let (guest, host) = establish(&guest_ctx, a, &host_ctx, b, Charset::Utf8);
    drop((guest.unwrap(), host.unwrap()));

    // What the guest salts outgoing, the host unsalts incoming, and back.
    let to_host = Salt::from_bytes([0x5A; 48]);
    let to_guest = Salt::from_bytes([0xC3; 48]);
    guest_trust
        .update_salt(host_alias, to_guest.clone(), to_host.clone())
        .unwrap();
    host_trust
        .update_salt(guest_alias, to_host.clone(), to_guest.clone())
        .unwrap();

    let (a, b) = pipe("guest", "host");
    let (guest, host) = establish(&guest_ctx, a, &host_ctx, b, Charset::Utf8);
    let (guest, host) = (guest.unwrap(), host.unwrap());
    assert_eq!(guest.peer().cadastre.salt_out, to_host);
    assert_eq!(host.peer().cadastre.salt_in, to_host);
    assert_eq!(guest.keys().outgoing, host.keys().incoming);
    assert_eq!(guest.keys().incoming, host.keys().outgoing);
    assert_eq!(guest.keys().outgoing_auth, host.keys().incoming_auth);

    guest.write(&[Message::new("salted")]).unwrap();
    guest.flush().unwrap();
    assert_eq!(host.read::<Message>().unwrap().text, "salted");
    drop((guest, host));

    // The host no longer expects what the guest salts with.
    host_trust
        .update_salt(guest_alias, Salt::from_bytes([0x11; 48]), to_guest)
        .unwrap();
    let impatient = ProtocolSettings {
        initiation_timeout: Some(Duration::from_secs(2)),
        ..ProtocolSettings::default()
    };
    let host_ctx = context_with(&pki().host, host_trust, impatient);

    let (a, b) = pipe("guest", "host");
    let (_guest, host) = establish(&guest_ctx, a, &host_ctx, b, Charset::Utf8);
    assert!(host.is_err());
}

#[test]
fn test_tampered_stream_fails_session() {
    let (guest_ctx, host_ctx) = (context(&pki().guest), context(&pki().host));
    let (a, b) = pipe("guest", "host");
    let (guest, host) = establish(&guest_ctx, a, &host_ctx, b, Charset::Utf8);
    let (guest, host) = (guest.unwrap(), host.unwrap());

    // Lands inside the first data block after the charset checkpoint.
    let sent = guest.connection().bytes_sent();
    guest.connection().corrupt_outgoing(sent + 6, 0x01);
    guest.write(&[Message::new("pay 10")]).unwrap();
    guest.flush().unwrap();

    let err = host.read::<Message>().unwrap_err();
    assert!(matches!(
        err,
        NodeError::Core(CoreError::Framing(FramingFault::Tampered))
    ));
    assert!(err.is_suspicious());
    assert_eq!(host.state(), HandshakeState::Failed);
    assert!(!host.is_connected());
    assert!(matches!(
        host.read::<Message>(),
        Err(NodeError::SessionFailed)
    ));
}

#[test]
fn test_close_is_idempotent_and_seen_by_peer() {
    let (guest_ctx, host_ctx) = (context(&pki().guest), context(&pki().host));
    let (a, b) = pipe("guest", "host");
    let (guest, host) = establish(&guest_ctx, a, &host_ctx, b, Charset::Utf8);
    let (guest, host) = (guest.unwrap(), host.unwrap());

    guest.write(&[Message::new("last words")]).unwrap();
    guest.close().unwrap();
    guest.close().unwrap();

    assert!(guest.is_closed());
    assert!(!guest.is_connected());
    assert!(matches!(
        guest.write(&[Message::new("late")]),
        Err(NodeError::SessionClosed)
    ));

    // Close flushes pending records before the connection goes away.
    assert_eq!(host.read::<Message>().unwrap().text, "last words");
    assert!(matches!(host.read::<Message>(), Err(NodeError::PeerClosed)));
}

#[test]
fn test_unexpected_record_kind_fails_session() {
    let (guest_ctx, host_ctx) = (context(&pki().guest), context(&pki().host));
    let (a, b) = pipe("guest", "host");
    let (guest, host) = establish(&guest_ctx, a, &host_ctx, b, Charset::Utf8);
    let (guest, host) = (guest.unwrap(), host.unwrap());

    guest.write(&[Message::new("not a reading")]).unwrap();
    guest.flush().unwrap();

    assert!(matches!(
        host.read::<Reading>(),
        Err(NodeError::UnexpectedRecord {
            expected: "reading",
            ..
        })
    ));
    assert_eq!(host.state(), HandshakeState::Failed);
}

#[test]
fn test_write_and_read_toggle_stepped_flag() {
    let (guest_ctx, host_ctx) = (context(&pki().guest), context(&pki().host));
    let (a, b) = pipe("guest", "host");
    let a = Throttled::new(a, Throttle::new(1_000_000, 64 * 1024).unwrap());
    let b = Throttled::new(b, Throttle::unlimited());
    let (guest, host) = establish(&guest_ctx, a, &host_ctx, b, Charset::Utf8);
    let (guest, host) = (guest.unwrap(), host.unwrap());

    guest.write(&[Message::new("ping")]).unwrap();
    guest.flush().unwrap();
    assert!(guest.connection().is_stepped());
    assert!(guest.connection().throttle().is_stepped());

    host.write(&[Message::new("pong")]).unwrap();
    host.flush().unwrap();
    assert_eq!(host.read::<Message>().unwrap().text, "ping");
    assert_eq!(guest.read::<Message>().unwrap().text, "pong");
    assert!(!guest.connection().is_stepped());
}

#[test]
fn test_drop_closes_connection() {
    let (guest_ctx, host_ctx) = (context(&pki().guest), context(&pki().host));
    let (a, b) = pipe("guest", "host");
    let (guest, host) = establish(&guest_ctx, a, &host_ctx, b, Charset::Utf8);
    let host = host.unwrap();

    drop(guest.unwrap());

    assert!(matches!(host.read::<Message>(), Err(NodeError::PeerClosed)));
}
