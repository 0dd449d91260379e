//! Shared fixtures for the node integration tests.

#![allow(dead_code)]

use std::sync::{Arc, LazyLock};
use std::thread;

use rootlink_common::Charset;
use rootlink_core::protocol::DEFAULT_PATH_LENGTH;
use rootlink_core::trust::{Certificate, IssuedIdentity, MemoryStore, Rooter, TrustEngine};
use rootlink_core::ProtocolSettings;
use rootlink_node::{HandshakeContext, Result, Role, Session};
use rootlink_transport::Connection;

/// One hierarchy with two end-points, plus an end-point of another hierarchy.
pub struct Pki {
    pub anchor: Certificate,
    pub guest: IssuedIdentity,
    pub host: IssuedIdentity,
    pub foreign: IssuedIdentity,
}

static PKI: LazyLock<Pki> = LazyLock::new(|| {
    let rooter = Rooter::generate("test", 2048).unwrap();
    let other = Rooter::generate("other", 2048).unwrap();
    Pki {
        anchor: rooter.anchor().clone(),
        guest: rooter.issue_endpoint("guest").unwrap(),
        host: rooter.issue_endpoint("host").unwrap(),
        foreign: other.issue_endpoint("intruder").unwrap(),
    }
});

pub fn pki() -> &'static Pki {
    &PKI
}

/// A trust engine pinned to the test anchor with an empty cache.
pub fn trust() -> Arc<TrustEngine> {
    Arc::new(
        TrustEngine::new(
            pki().anchor.clone(),
            Arc::new(MemoryStore::new()),
            DEFAULT_PATH_LENGTH,
        )
        .unwrap(),
    )
}

pub fn context(identity: &IssuedIdentity) -> HandshakeContext {
    context_with(identity, trust(), ProtocolSettings::default())
}

pub fn context_with(
    identity: &IssuedIdentity,
    trust: Arc<TrustEngine>,
    settings: ProtocolSettings,
) -> HandshakeContext {
    HandshakeContext::new(identity.clone(), trust, settings).unwrap()
}

/// Runs the host on a second thread and the guest on this one.
pub fn establish<C>(
    guest_ctx: &HandshakeContext,
    guest_conn: C,
    host_ctx: &HandshakeContext,
    host_conn: C,
    charset: Charset,
) -> (Result<Session<C>>, Result<Session<C>>)
where
    C: Connection,
{
    thread::scope(|scope| {
        let host = scope.spawn(move || Session::accept(host_ctx, host_conn));
        let guest = Session::establish(guest_ctx, guest_conn, Role::Guest, charset);
        (guest, host.join().unwrap())
    })
}
