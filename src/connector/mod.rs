//! The Connector/Gateway role: terminates client websocket
//! connections, authenticates them, and dispatches authenticated traffic
//! to the matchmaker or the right game node over the bus.

pub mod dispatch;
pub mod error;
pub mod logging;
pub mod push;
pub mod rate_limit;
pub mod registry;
pub mod route_cache;
pub mod routes;
pub mod session;
pub mod worker_pool;
pub mod ws;

pub use dispatch::Dispatcher;
pub use push::run_push_consumer;
pub use rate_limit::ConnectionAdmission;
pub use registry::{ClientHandle, ClientRegistry, SharedRegistry};
pub use route_cache::RouteCache;
pub use routes::ConnectorServer;
pub use session::{OutboundFrame, Session, SessionPhase};
pub use worker_pool::DispatchWorkerPool;
pub use ws::{ws_upgrade, ConnectorContext};
