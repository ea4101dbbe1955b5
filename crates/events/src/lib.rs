//! `stockledger-events`: event contracts and in-process fan-out.
//!
//! Events here are notifications about committed state. The inventory store is
//! the source of truth; the bus only distributes facts after the fact.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
