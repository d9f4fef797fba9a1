//! Asynchronous dispatch of sealed chunks
//!
//! The producer (pipeline) and the consumer communicate only through a
//! bounded FIFO queue of [`DispatchMessage`]s; no other mutable state
//! crosses the boundary. Ordering is preserved end-to-end: later chunks'
//! conditional creates assume earlier chunks' header entities already exist
//! at the sink. A terminal marker ends the stream and halts the consumer
//! after all prior messages are delivered.

pub mod consumer;
pub mod message;
pub mod queue;

pub use consumer::{Consumer, DeliveryStats};
pub use message::DispatchMessage;
pub use queue::{channel, DispatchReceiver, DispatchSender};
