//! Simulation events and the time-ordered queue that dispatches them.

pub mod event;
pub mod queue;

pub use event::{
    Event, FieldsCompletedEvent, GenesisData, NewBarEvent, OrderAckEvent, OrderEvent,
    OrderFillEvent,
};
pub use queue::EventQueue;
