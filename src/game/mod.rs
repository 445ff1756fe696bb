//! The Game Node role: engine core, room actor, the
//! single-consumer destroy-room worker, and the per-process room registry.

pub mod actor;
pub mod engine;
pub mod node;
pub mod room;
pub mod worker;
