pub mod envelope;
pub mod handler;
pub mod memory_bus;

pub use envelope::{subject_for, ServicePacket, Subject};
pub use handler::{HandlerTable, HandlerTableBuilder, RouteHandler, RouteResult};
pub use memory_bus::MemoryBus;
