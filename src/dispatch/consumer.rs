//! Consumer loop draining the dispatch queue into the configured sinks
//!
//! The consumer runs concurrently with the producer and delivers each data
//! message to every configured sink. Delivery is fire-and-continue: one
//! sink failing neither blocks the other sinks for that message nor stops
//! consumption of subsequent messages. The loop halts on the terminal
//! marker, after completing delivery of all prior messages.

use crate::adapters::sink::Sink;
use crate::dispatch::queue::DispatchReceiver;
use std::sync::Arc;

/// Outcome counters of one consumer run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Data messages taken off the queue
    pub messages: usize,
    /// Successful sink deliveries (messages x sinks that accepted)
    pub delivered: usize,
    /// Failed sink deliveries
    pub failed: usize,
}

/// Drains the dispatch queue into a set of sinks
pub struct Consumer {
    sinks: Vec<Arc<dyn Sink>>,
}

impl Consumer {
    /// Creates a consumer fanning out to the given sinks
    pub fn new(sinks: Vec<Arc<dyn Sink>>) -> Self {
        Self { sinks }
    }

    /// Runs until the terminal marker arrives or the producer side is
    /// dropped, delivering every data message to every sink
    pub async fn run(&self, mut receiver: DispatchReceiver) -> DeliveryStats {
        let mut stats = DeliveryStats::default();

        while let Some(message) = receiver.recv().await {
            if message.terminal {
                tracing::info!(
                    messages = stats.messages,
                    delivered = stats.delivered,
                    failed = stats.failed,
                    "Terminal marker received, consumer halting"
                );
                break;
            }

            stats.messages += 1;
            for sink in &self.sinks {
                match sink.deliver(&message).await {
                    Ok(()) => {
                        stats.delivered += 1;
                        tracing::debug!(
                            sink = sink.name(),
                            sequence_label = %message.sequence_label,
                            "Delivered chunk"
                        );
                    }
                    Err(e) => {
                        stats.failed += 1;
                        tracing::warn!(
                            sink = sink.name(),
                            sequence_label = %message.sequence_label,
                            error = %e,
                            "Sink delivery failed, continuing"
                        );
                    }
                }
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::message::DispatchMessage;
    use crate::dispatch::queue::channel;
    use crate::domain::{MeridianError, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingSink {
        labels: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Sink for RecordingSink {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn deliver(&self, message: &DispatchMessage) -> Result<()> {
            self.labels
                .lock()
                .unwrap()
                .push(message.sequence_label.clone());
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl Sink for FailingSink {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn deliver(&self, _message: &DispatchMessage) -> Result<()> {
            Err(MeridianError::Dispatch("sink unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_consumer_halts_on_terminal_in_order() {
        let (tx, rx) = channel(8);
        let sink = Arc::new(RecordingSink {
            labels: Mutex::new(Vec::new()),
        });
        let consumer = Consumer::new(vec![sink.clone()]);

        for i in 1..=3 {
            tx.enqueue(DispatchMessage::data(format!("{i}_1_1"), "{}"))
                .await
                .unwrap();
        }
        tx.enqueue_terminal().await.unwrap();

        let stats = consumer.run(rx).await;
        assert_eq!(stats.messages, 3);
        assert_eq!(stats.delivered, 3);
        assert_eq!(stats.failed, 0);
        assert_eq!(
            *sink.labels.lock().unwrap(),
            vec!["1_1_1", "2_1_1", "3_1_1"]
        );
    }

    #[tokio::test]
    async fn test_one_sink_failure_does_not_block_others() {
        let (tx, rx) = channel(8);
        let recording = Arc::new(RecordingSink {
            labels: Mutex::new(Vec::new()),
        });
        let consumer = Consumer::new(vec![Arc::new(FailingSink), recording.clone()]);

        tx.enqueue(DispatchMessage::data("1_1_1", "{}")).await.unwrap();
        tx.enqueue(DispatchMessage::data("1_1_2", "{}")).await.unwrap();
        tx.enqueue_terminal().await.unwrap();

        let stats = consumer.run(rx).await;
        assert_eq!(stats.messages, 2);
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.failed, 2);
        assert_eq!(*recording.labels.lock().unwrap(), vec!["1_1_1", "1_1_2"]);
    }

    #[tokio::test]
    async fn test_consumer_halts_when_producer_dropped() {
        let (tx, rx) = channel(8);
        drop(tx);
        let consumer = Consumer::new(Vec::new());
        let stats = consumer.run(rx).await;
        assert_eq!(stats, DeliveryStats::default());
    }
}
