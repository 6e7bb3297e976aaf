//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener on an OS-assigned port and drive it with a
//! `tokio-tungstenite` client, so the upgrade callback, the split halves and
//! the close codes are exercised over an actual socket.

#[cfg(feature = "websocket")]
mod websocket {
    use futures_util::{SinkExt, StreamExt};
    use std::time::Duration;

    use latchkey_transport::{
        Connection, HandshakeRequest, Incoming, Transport, TransportError, WebSocketConnection,
        WebSocketTransport,
    };
    use tokio::task::JoinHandle;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::tungstenite::http::StatusCode;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

    type ClientWs =
        tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

    /// Accepts only upgrades carrying `?token=letmein`; the identity is the
    /// token text itself.
    fn require_token(req: &HandshakeRequest) -> Result<String, &'static str> {
        match req.query_param("token").as_deref() {
            Some("letmein") => Ok("letmein".to_string()),
            _ => Err("missing or bad token"),
        }
    }

    async fn spawn_accept() -> (
        String,
        JoinHandle<Result<(WebSocketConnection, String), TransportError>>,
    ) {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("bound address").to_string();
        let handle =
            tokio::spawn(async move { transport.accept().await?.upgrade(require_token).await });
        (addr, handle)
    }

    async fn connect_authorized(addr: &str) -> ClientWs {
        let url = format!("ws://{addr}/?token=letmein");
        let (ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .expect("client should connect");
        ws
    }

    #[tokio::test]
    async fn test_accept_with_valid_token_yields_identity() {
        let (addr, server) = spawn_accept().await;
        let _client = connect_authorized(&addr).await;

        let (conn, identity) = server.await.unwrap().expect("should accept");
        assert_eq!(identity, "letmein");
        assert!(conn.id().into_inner() > 0);
    }

    #[tokio::test]
    async fn test_accept_without_token_refuses_with_401() {
        let (addr, server) = spawn_accept().await;

        let err = tokio_tungstenite::connect_async(format!("ws://{addr}/"))
            .await
            .expect_err("upgrade should be refused");
        match err {
            tokio_tungstenite::tungstenite::Error::Http(resp) => {
                assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
            }
            other => panic!("expected HTTP error, got {other:?}"),
        }

        let result = server.await.unwrap();
        assert!(matches!(result, Err(TransportError::HandshakeRejected(_))));
    }

    #[tokio::test]
    async fn test_accept_returns_before_silent_peer_sends_anything() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = transport.local_addr().unwrap().to_string();

        // Connects but never sends an upgrade request.
        let _silent = tokio::net::TcpStream::connect(&addr).await.unwrap();
        let stalled = tokio::time::timeout(Duration::from_secs(2), transport.accept())
            .await
            .expect("accept must not wait for the upgrade request")
            .unwrap();

        let client = tokio::spawn({
            let addr = addr.clone();
            async move { connect_authorized(&addr).await }
        });
        let pending = tokio::time::timeout(Duration::from_secs(2), transport.accept())
            .await
            .expect("next peer accepted while the first is silent")
            .unwrap();
        let (_conn, identity) = pending.upgrade(require_token).await.expect("should upgrade");
        assert_eq!(identity, "letmein");
        client.await.unwrap();

        // The silent peer's upgrade only finishes if someone bounds it.
        let silent_upgrade =
            tokio::time::timeout(Duration::from_millis(100), stalled.upgrade(require_token)).await;
        assert!(silent_upgrade.is_err(), "silent peer never completes an upgrade");
    }

    #[tokio::test]
    async fn test_send_text_and_recv_round_trip() {
        let (addr, server) = spawn_accept().await;
        let mut client = connect_authorized(&addr).await;
        let (conn, _) = server.await.unwrap().expect("should accept");

        conn.send_text("hello from server").await.expect("send");
        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg, Message::text("hello from server".to_string()));

        client
            .send(Message::text("hello from client".to_string()))
            .await
            .unwrap();
        let received = conn.recv().await.expect("recv").expect("some data");
        assert_eq!(received, b"hello from client");

        conn.send(b"raw bytes").await.expect("binary send");
        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"raw bytes");
    }

    #[tokio::test]
    async fn test_send_while_recv_pending_does_not_block() {
        let (addr, server) = spawn_accept().await;
        let mut client = connect_authorized(&addr).await;
        let (conn, _) = server.await.unwrap().expect("should accept");
        let conn = std::sync::Arc::new(conn);

        let reader = {
            let conn = conn.clone();
            tokio::spawn(async move { conn.recv().await })
        };
        tokio::task::yield_now().await;

        tokio::time::timeout(
            std::time::Duration::from_secs(2),
            conn.send_text("pushed while reading"),
        )
        .await
        .expect("send must not wait on the reader")
        .expect("send");

        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg, Message::text("pushed while reading".to_string()));

        client.send(Message::Close(None)).await.unwrap();
        let read = reader.await.unwrap().expect("recv");
        assert!(read.is_none());
    }

    #[tokio::test]
    async fn test_recv_returns_none_on_client_close() {
        let (addr, server) = spawn_accept().await;
        let mut client = connect_authorized(&addr).await;
        let (conn, _) = server.await.unwrap().expect("should accept");

        client.send(Message::Close(None)).await.unwrap();

        let result = conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_reject_closes_with_policy_code() {
        let (addr, server) = spawn_accept().await;
        let mut client = connect_authorized(&addr).await;
        let (conn, _) = server.await.unwrap().expect("should accept");

        conn.reject("Unauthorized").await.expect("reject");

        match client.next().await.unwrap().unwrap() {
            Message::Close(Some(frame)) => {
                assert_eq!(frame.code, CloseCode::Policy);
                assert_eq!(frame.reason.as_str(), "Unauthorized");
            }
            other => panic!("expected close frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_after_peer_gone_fails() {
        let (addr, server) = spawn_accept().await;
        let mut client = connect_authorized(&addr).await;
        let (conn, _) = server.await.unwrap().expect("should accept");

        client.close(None).await.unwrap();
        drop(client);
        // Drain the close so the server side observes it.
        let _ = conn.recv().await;

        let mut failed = false;
        for _ in 0..10 {
            if conn.send_text("anyone there?").await.is_err() {
                failed = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(failed, "sending on a closed channel should eventually fail");
    }
}
