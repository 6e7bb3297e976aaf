//! WebSocket transport implementation using `tokio-tungstenite`.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use crate::{Connection, ConnectionId, HandshakeRequest, Incoming, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = WebSocketStream<TcpStream>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Incoming = PendingUpgrade;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::trace!(%addr, "TCP connection accepted");
        Ok(PendingUpgrade { stream, addr })
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// A TCP peer that has not sent its upgrade request yet.
pub struct PendingUpgrade {
    stream: TcpStream,
    addr: SocketAddr,
}

impl PendingUpgrade {
    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Incoming for PendingUpgrade {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn upgrade<T, E, F>(self, authorize: F) -> Result<(Self::Connection, T), Self::Error>
    where
        F: FnOnce(&HandshakeRequest) -> Result<T, E> + Send,
        E: fmt::Display,
        T: Send,
    {
        let Self { stream, addr } = self;

        // The upgrade callback runs inside tungstenite; the verdict is
        // parked here and read back once the handshake finishes.
        let mut verdict: Option<Result<T, String>> = None;
        let authorize = Box::new(authorize);
        let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            match authorize(&request_view(req)) {
                Ok(identity) => {
                    verdict = Some(Ok(identity));
                    Ok(resp)
                }
                Err(e) => {
                    let reason = e.to_string();
                    verdict = Some(Err(reason.clone()));
                    Err(unauthorized(reason))
                }
            }
        };

        let upgraded = tokio_tungstenite::accept_hdr_async(stream, callback).await;

        let identity = match verdict {
            Some(Ok(identity)) => identity,
            Some(Err(reason)) => {
                tracing::warn!(%addr, %reason, "WebSocket handshake rejected");
                return Err(TransportError::HandshakeRejected(reason));
            }
            None => {
                // Upgrade failed before the request was even parsed.
                let reason = match upgraded {
                    Err(e) => e.to_string(),
                    Ok(_) => "no upgrade request".to_string(),
                };
                return Err(TransportError::AcceptFailed(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    reason,
                )));
            }
        };

        let ws = upgraded.map_err(|e| {
            TransportError::AcceptFailed(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                e,
            ))
        })?;

        let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%id, %addr, "accepted WebSocket connection");

        let (sink, stream) = ws.split();
        Ok((
            WebSocketConnection {
                id,
                sink: Mutex::new(sink),
                stream: Mutex::new(stream),
            },
            identity,
        ))
    }
}

/// A single WebSocket connection.
///
/// Reads and writes go through separate halves so a task parked in
/// [`recv`](Connection::recv) never blocks a concurrent send.
pub struct WebSocketConnection {
    id: ConnectionId,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl WebSocketConnection {
    async fn write(&self, msg: Message) -> Result<(), TransportError> {
        self.sink.lock().await.send(msg).await.map_err(broken_pipe)
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send_text(&self, text: &str) -> Result<(), Self::Error> {
        self.write(Message::text(text.to_string())).await
    }

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        self.write(Message::Binary(data.to_vec().into())).await
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        loop {
            let msg = self.stream.lock().await.next().await;
            match msg {
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // skip ping/pong/frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink.lock().await.close().await.map_err(broken_pipe)
    }

    async fn reject(&self, reason: &str) -> Result<(), Self::Error> {
        self.write(Message::Close(Some(CloseFrame {
            code: CloseCode::Policy,
            reason: reason.to_string().into(),
        })))
        .await
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

fn request_view(req: &Request) -> HandshakeRequest {
    let headers = req
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    HandshakeRequest::new(req.uri().query().map(str::to_string), headers)
}

fn unauthorized(reason: String) -> ErrorResponse {
    let mut resp = ErrorResponse::new(Some(reason));
    *resp.status_mut() = StatusCode::UNAUTHORIZED;
    resp
}

fn broken_pipe(e: tokio_tungstenite::tungstenite::Error) -> TransportError {
    TransportError::SendFailed(std::io::Error::new(std::io::ErrorKind::BrokenPipe, e))
}
