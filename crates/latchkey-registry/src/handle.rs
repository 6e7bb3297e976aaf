//! One registered channel, as the registry sees it.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use latchkey_token::UserId;
use latchkey_transport::ConnectionId;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, watch};

use crate::RegistryError;

/// What a connection task receives from the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Write this text to the socket.
    Text(String),
    /// Close the socket and exit.
    Close,
}

/// The registry's end of a channel: who owns it, whether it is still
/// open, and a bounded queue into the connection task.
///
/// Cheap to clone; clones share the open flag.
#[derive(Clone)]
pub struct ChannelHandle {
    inner: Arc<Inner>,
}

struct Inner {
    id: ConnectionId,
    user: UserId,
    open: AtomicBool,
    tx: mpsc::Sender<Outbound>,
    // Out of band so a full queue cannot swallow it.
    closed: watch::Sender<bool>,
}

/// The connection task's end of a channel.
///
/// Yields queued text in order. Once the handle is closed, the queue is
/// drained and then a single [`Outbound::Close`] is yielded.
#[derive(Debug)]
pub struct Outbox {
    rx: mpsc::Receiver<Outbound>,
    closed: watch::Receiver<bool>,
    done: bool,
}

impl Outbox {
    /// Waits for the next message. `None` once the close was delivered or
    /// every handle is gone.
    pub async fn recv(&mut self) -> Option<Outbound> {
        if self.done {
            return None;
        }
        let close_requested = tokio::select! {
            biased;
            msg = self.rx.recv() => match msg {
                Some(msg) => return Some(msg),
                None => false,
            },
            signal = self.closed.wait_for(|closed| *closed) => signal.is_ok(),
        };
        self.finish(close_requested)
    }

    /// Non-blocking [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Result<Outbound, TryRecvError> {
        if self.done {
            return Err(TryRecvError::Disconnected);
        }
        match self.rx.try_recv() {
            Ok(msg) => Ok(msg),
            Err(TryRecvError::Empty) if *self.closed.borrow() => {
                self.done = true;
                Ok(Outbound::Close)
            }
            Err(e) => Err(e),
        }
    }

    fn finish(&mut self, close_requested: bool) -> Option<Outbound> {
        // Text queued before the close still goes out first.
        if let Ok(msg) = self.rx.try_recv() {
            return Some(msg);
        }
        self.done = true;
        close_requested.then_some(Outbound::Close)
    }
}

impl ChannelHandle {
    /// Creates a handle and the outbox its connection task drains.
    ///
    /// A `capacity` of zero is raised to one.
    pub fn new(id: ConnectionId, user: UserId, capacity: usize) -> (Self, Outbox) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (closed_tx, closed_rx) = watch::channel(false);
        let handle = Self {
            inner: Arc::new(Inner {
                id,
                user,
                open: AtomicBool::new(true),
                tx,
                closed: closed_tx,
            }),
        };
        let outbox = Outbox {
            rx,
            closed: closed_rx,
            done: false,
        };
        (handle, outbox)
    }

    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    pub fn user(&self) -> &UserId {
        &self.inner.user
    }

    /// Open until [`close`](Self::close) is called, a send fails, or the
    /// connection task drops its outbox.
    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::Acquire) && !self.inner.tx.is_closed()
    }

    /// Marks the handle closed and tells the connection task to close the
    /// socket. Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        let was_open = self.inner.open.swap(false, Ordering::AcqRel);
        self.inner.closed.send_replace(true);
        was_open
    }

    /// Queues `text` without waiting.
    ///
    /// # Errors
    /// [`RegistryError::SendFailed`] if the handle is closed or its queue
    /// is full or gone. The handle is closed in that case and its task is
    /// told to shut the socket.
    pub fn send(&self, text: &str) -> Result<(), RegistryError> {
        let failed = || RegistryError::SendFailed {
            user: self.inner.user.clone(),
            conn: self.inner.id,
        };
        if !self.inner.open.load(Ordering::Acquire) {
            return Err(failed());
        }
        self.inner
            .tx
            .try_send(Outbound::Text(text.to_string()))
            .map_err(|_| {
                self.close();
                failed()
            })
    }
}

impl fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("id", &self.inner.id)
            .field("user", &self.inner.user)
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn handle(capacity: usize) -> (ChannelHandle, Outbox) {
        ChannelHandle::new(ConnectionId::new(1), UserId::new("u1"), capacity)
    }

    #[test]
    fn test_send_queues_text() {
        let (h, mut rx) = handle(4);
        h.send("hi").unwrap();
        assert_eq!(rx.try_recv().unwrap(), Outbound::Text("hi".into()));
    }

    #[test]
    fn test_send_full_queue_fails_and_closes() {
        let (h, _rx) = handle(1);
        h.send("one").unwrap();

        assert!(matches!(h.send("two"), Err(RegistryError::SendFailed { .. })));
        assert!(!h.is_open());
    }

    #[test]
    fn test_is_open_false_after_receiver_dropped() {
        let (h, rx) = handle(4);
        assert!(h.is_open());
        drop(rx);
        assert!(!h.is_open());
        assert!(h.send("x").is_err());
    }

    #[test]
    fn test_close_signals_task_once() {
        let (h, mut rx) = handle(4);
        let clone = h.clone();

        assert!(h.close());
        assert!(!clone.close(), "clones share the open flag");
        assert!(!clone.is_open());
        assert_eq!(rx.try_recv().unwrap(), Outbound::Close);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_send_full_queue_still_signals_close_after_drain() {
        let (h, mut rx) = handle(1);
        h.send("one").unwrap();
        assert!(h.send("two").is_err());

        assert_eq!(rx.try_recv().unwrap(), Outbound::Text("one".into()));
        assert_eq!(rx.try_recv().unwrap(), Outbound::Close);
    }

    #[tokio::test]
    async fn test_recv_full_queue_then_close_yields_close() {
        let (h, mut rx) = handle(1);
        h.send("one").unwrap();
        assert!(h.send("two").is_err());
        assert!(!h.close(), "failed send already closed it");

        let first = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert_eq!(first.unwrap(), Some(Outbound::Text("one".into())));
        let second = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert_eq!(second.unwrap(), Some(Outbound::Close));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_recv_wakes_on_close_while_waiting() {
        let (h, mut rx) = handle(4);
        let waiter = tokio::spawn(async move { rx.recv().await });
        tokio::task::yield_now().await;

        h.close();
        let got = tokio::time::timeout(Duration::from_millis(200), waiter).await;
        assert_eq!(got.unwrap().unwrap(), Some(Outbound::Close));
    }

    #[tokio::test]
    async fn test_recv_all_handles_dropped_returns_none() {
        let (h, mut rx) = handle(4);
        drop(h);
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn test_send_after_close_fails() {
        let (h, _rx) = handle(4);
        h.close();
        assert!(h.send("late").is_err());
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let (h, mut rx) = handle(0);
        h.send("fits").unwrap();
        assert_eq!(rx.try_recv().unwrap(), Outbound::Text("fits".into()));
    }
}
