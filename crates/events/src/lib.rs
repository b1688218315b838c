//! Domain & integration events.
//!
//! Domain events evolve documents, batches and repackings; integration events
//! (`ProductionCompleted`) are the contract for modules outside the stock core.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
