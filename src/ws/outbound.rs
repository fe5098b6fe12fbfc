//! Outbound queue: the only path to the connection's write half.
//!
//! Producers (the keepalive timer, reply logic, retry timers) hold an
//! [`OutboundHandle`]; the session loop owns the receiving end and is the
//! single caller of [`super::transport::MessageSink::send`].

use tokio::sync::mpsc;

use super::messages::RtmMessage;
use crate::error::ClientError;

/// A queued message together with the number of failed sends so far.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    /// The message to write.
    pub message: RtmMessage,
    /// Failed send attempts before this enqueue.
    pub attempts: u32,
}

impl Outbound {
    /// Wraps a fresh message with no failed attempts.
    #[must_use]
    pub const fn new(message: RtmMessage) -> Self {
        Self {
            message,
            attempts: 0,
        }
    }
}

/// Creates a bounded outbound queue.
#[must_use]
pub fn channel(capacity: usize) -> (OutboundHandle, mpsc::Receiver<Outbound>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (OutboundHandle { tx }, rx)
}

/// Cloneable producer side of the outbound queue.
#[derive(Debug, Clone)]
pub struct OutboundHandle {
    tx: mpsc::Sender<Outbound>,
}

impl OutboundHandle {
    /// Enqueues a new message, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::SessionClosed`] once the session has closed.
    pub async fn enqueue(&self, message: RtmMessage) -> Result<(), ClientError> {
        self.requeue(Outbound::new(message)).await
    }

    /// Puts an already-attempted message back at the tail of the queue.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::SessionClosed`] once the session has closed.
    pub async fn requeue(&self, item: Outbound) -> Result<(), ClientError> {
        self.tx
            .send(item)
            .await
            .map_err(|_| ClientError::SessionClosed)
    }

    /// Returns `true` once the session loop has dropped the queue.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn messages_arrive_in_enqueue_order() {
        let (handle, mut rx) = channel(8);
        let Ok(()) = handle.enqueue(RtmMessage::Ping).await else {
            panic!("enqueue failed");
        };
        let Ok(()) = handle.enqueue(RtmMessage::Hello).await else {
            panic!("enqueue failed");
        };

        let Some(first) = rx.recv().await else {
            panic!("queue empty");
        };
        let Some(second) = rx.recv().await else {
            panic!("queue empty");
        };
        assert_eq!(first.message, RtmMessage::Ping);
        assert_eq!(second.message, RtmMessage::Hello);
        assert_eq!(first.attempts, 0);
    }

    #[tokio::test]
    async fn enqueue_after_close_is_refused() {
        let (handle, rx) = channel(1);
        drop(rx);
        assert!(handle.is_closed());
        assert!(matches!(
            handle.enqueue(RtmMessage::Ping).await,
            Err(ClientError::SessionClosed)
        ));
    }
}
