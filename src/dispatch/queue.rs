//! Bounded FIFO hand-off between producer and consumer
//!
//! A thin wrapper over a bounded `tokio::sync::mpsc` channel. The single
//! producer awaits briefly when the queue is full (backpressure); the
//! consumer awaits the next message. No reordering, no re-delivery.

use crate::dispatch::message::DispatchMessage;
use crate::domain::{MeridianError, Result};
use tokio::sync::mpsc;

/// Producer side of the dispatch queue
#[derive(Clone)]
pub struct DispatchSender {
    tx: mpsc::Sender<DispatchMessage>,
}

/// Consumer side of the dispatch queue
pub struct DispatchReceiver {
    rx: mpsc::Receiver<DispatchMessage>,
}

/// Creates a bounded dispatch queue
pub fn channel(capacity: usize) -> (DispatchSender, DispatchReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (DispatchSender { tx }, DispatchReceiver { rx })
}

impl DispatchSender {
    /// Enqueues one message, awaiting while the queue is full.
    ///
    /// Fails only when the consumer side is gone, which is a
    /// pipeline-level fault.
    pub async fn enqueue(&self, message: DispatchMessage) -> Result<()> {
        self.tx.send(message).await.map_err(|_| {
            MeridianError::Dispatch("dispatch queue closed: consumer is gone".to_string())
        })
    }

    /// Enqueues the terminal end-of-stream marker. Used on every producer
    /// exit path, including errors, so the consumer never blocks forever.
    pub async fn enqueue_terminal(&self) -> Result<()> {
        self.enqueue(DispatchMessage::terminal()).await
    }
}

impl DispatchReceiver {
    /// Awaits the next message; `None` when the producer side is gone
    pub async fn recv(&mut self) -> Option<DispatchMessage> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_order_preserved() {
        let (tx, mut rx) = channel(8);
        tx.enqueue(DispatchMessage::data("1_1_1", "a")).await.unwrap();
        tx.enqueue(DispatchMessage::data("1_1_2", "b")).await.unwrap();
        tx.enqueue_terminal().await.unwrap();

        assert_eq!(rx.recv().await.unwrap().sequence_label, "1_1_1");
        assert_eq!(rx.recv().await.unwrap().sequence_label, "1_1_2");
        assert!(rx.recv().await.unwrap().terminal);
    }

    #[tokio::test]
    async fn test_enqueue_fails_when_consumer_dropped() {
        let (tx, rx) = channel(1);
        drop(rx);
        let result = tx.enqueue(DispatchMessage::data("1_1_1", "a")).await;
        assert!(matches!(result, Err(MeridianError::Dispatch(_))));
    }

    #[tokio::test]
    async fn test_zero_capacity_clamped() {
        // capacity is clamped to at least one slot
        let (tx, mut rx) = channel(0);
        tx.enqueue(DispatchMessage::data("1_1_1", "a")).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().payload, "a");
    }
}
