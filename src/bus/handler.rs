//! Route-dispatch table for inbound bus packets: a node registers one
//! async closure per route prefix, and the bus hands each inbound
//! `ServicePacket` to whichever closure matches.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use super::envelope::ServicePacket;
use crate::errors::FabricError;

pub type RouteResult = Result<Value, FabricError>;
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait RouteHandler: Send + Sync {
    fn call(&self, packet: ServicePacket) -> BoxFuture<'static, RouteResult>;
}

impl<F, Fut> RouteHandler for F
where
    F: Fn(ServicePacket) -> Fut + Send + Sync,
    Fut: Future<Output = RouteResult> + Send + 'static,
{
    fn call(&self, packet: ServicePacket) -> BoxFuture<'static, RouteResult> {
        Box::pin((self)(packet))
    }
}

/// A node's table of `route -> handler`. Notify packets run the handler
/// and discard the result; Request packets have the result turned into a
/// Response packet by the caller.
#[derive(Default, Clone)]
pub struct HandlerTable {
    routes: Arc<HashMap<String, Arc<dyn RouteHandler>>>,
}

pub struct HandlerTableBuilder {
    routes: HashMap<String, Arc<dyn RouteHandler>>,
}

impl HandlerTableBuilder {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    pub fn route(mut self, route: impl Into<String>, handler: impl RouteHandler + 'static) -> Self {
        self.routes.insert(route.into(), Arc::new(handler));
        self
    }

    pub fn build(self) -> HandlerTable {
        HandlerTable {
            routes: Arc::new(self.routes),
        }
    }
}

impl HandlerTable {
    pub fn builder() -> HandlerTableBuilder {
        HandlerTableBuilder::new()
    }

    pub async fn dispatch(&self, packet: ServicePacket) -> RouteResult {
        match self.routes.get(&packet.route) {
            Some(handler) => handler.call(packet).await,
            None => Err(FabricError::routing(format!(
                "no handler registered for route {}",
                packet.route
            ))),
        }
    }
}
