//! Guest and host sessions over a loopback TCP socket.

mod common;

use std::thread;

use rootlink_common::Charset;
use rootlink_node::{Message, NodeError, Session};
use rootlink_transport::{TcpServer, Throttle, Throttled};

use common::{context, pki};

#[test]
fn test_session_over_loopback() {
    let guest_ctx = context(&pki().guest);
    let host_ctx = context(&pki().host);
    let server = TcpServer::bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let addr = server.local_addr().to_string();

    thread::scope(|scope| {
        scope.spawn(|| {
            let connection = server.accept().unwrap();
            let session =
                Session::accept(&host_ctx, Throttled::new(connection, Throttle::unlimited()))
                    .unwrap();
            loop {
                match session.read::<Message>() {
                    Ok(message) => {
                        session
                            .write(&[Message::new(message.text.to_uppercase())])
                            .unwrap();
                        session.flush().unwrap();
                    }
                    Err(NodeError::PeerClosed) => break,
                    Err(e) => panic!("host read failed: {e}"),
                }
            }
            session.close().unwrap();
        });

        let session = Session::connect(
            &guest_ctx,
            &addr,
            Charset::Utf16Be,
            Throttle::new(1_000_000, 16 * 1024).unwrap(),
        )
        .unwrap();
        assert!(session.is_connected());

        for text in ["hello", "over", "tcp"] {
            session.write(&[Message::new(text)]).unwrap();
            session.flush().unwrap();
            assert_eq!(session.read::<Message>().unwrap().text, text.to_uppercase());
        }
        session.close().unwrap();
        assert!(session.is_closed());
    });
}

#[test]
fn test_connect_refused() {
    let guest_ctx = context(&pki().guest);
    let addr = {
        let server = TcpServer::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        server.local_addr().to_string()
    };

    let err = Session::connect(&guest_ctx, &addr, Charset::Utf8, Throttle::unlimited())
        .unwrap_err();
    assert!(matches!(err, NodeError::Transport(_)));
}
