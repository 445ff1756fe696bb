pub mod kv;
pub mod memory;
pub mod route_store;

pub use kv::{Expiry, KvStore, LeaseId, WatchEvent};
pub use memory::MemoryStore;
pub use route_store::RouteStore;
