//! Async message bus connecting channels to the agent engine.

pub mod queue;
pub mod types;

pub use queue::MessageBus;
pub use types::{InboundMessage, MessageKind, MessagePriority, OutboundMessage};
