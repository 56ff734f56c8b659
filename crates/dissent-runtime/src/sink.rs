//! Where a session's messages go

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use dissent_core::{DebateError, DebateMessage};

/// Ordered delivery of debate messages to at most one consumer.
///
/// A session stops at the next stage boundary once the token is cancelled
/// or the receiving side hangs up.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Option<mpsc::Sender<DebateMessage>>,
    token: CancellationToken,
}

impl EventSink {
    /// Sink with no consumer; messages are only kept in the session log
    pub fn detached() -> Self {
        Self {
            tx: None,
            token: CancellationToken::new(),
        }
    }

    /// Bounded channel sink and its receiver
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<DebateMessage>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (
            Self {
                tx: Some(tx),
                token: CancellationToken::new(),
            },
            rx,
        )
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.tx.as_ref().is_some_and(|tx| tx.is_closed())
    }

    /// Resolves when the session should stop
    pub async fn cancelled(&self) {
        match &self.tx {
            Some(tx) => tokio::select! {
                _ = self.token.cancelled() => {}
                _ = tx.closed() => {}
            },
            None => self.token.cancelled().await,
        }
    }

    /// Deliver one message, waiting for capacity
    pub async fn send(&self, message: DebateMessage) -> Result<(), DebateError> {
        if self.token.is_cancelled() {
            return Err(DebateError::Cancelled);
        }
        match &self.tx {
            Some(tx) => tx.send(message).await.map_err(|_| DebateError::Cancelled),
            None => Ok(()),
        }
    }

    /// Deliver the terminal record even after cancellation, if anyone still listens
    pub async fn send_final(&self, message: DebateMessage) -> Result<(), DebateError> {
        match &self.tx {
            Some(tx) => tx.send(message).await.map_err(|_| DebateError::Cancelled),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dropped_receiver_cancels() {
        let (sink, rx) = EventSink::channel(4);
        sink.send(DebateMessage::Ready).await.unwrap();
        drop(rx);

        assert!(sink.is_cancelled());
        assert_eq!(sink.send(DebateMessage::Ready).await, Err(DebateError::Cancelled));
        sink.cancelled().await;
    }

    #[tokio::test]
    async fn test_token_cancels_detached_sink() {
        let sink = EventSink::detached();
        assert!(sink.send(DebateMessage::Ready).await.is_ok());
        sink.token().cancel();
        assert!(sink.is_cancelled());
        assert_eq!(sink.send(DebateMessage::Ready).await, Err(DebateError::Cancelled));
    }

    #[tokio::test]
    async fn test_final_record_survives_token_cancellation() {
        let (sink, mut rx) = EventSink::channel(4);
        sink.token().cancel();
        let record = DebateMessage::error(&DebateError::Cancelled);
        sink.send_final(record.clone()).await.unwrap();
        assert_eq!(rx.recv().await, Some(record));
    }
}
