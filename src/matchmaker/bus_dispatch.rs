//! Bus-facing front door for the matchmaker: translates `"joinQueue"`/
//! `"leaveQueue"` packets forwarded by a connector into
//! [`MatchmakerService`] calls.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::bus::{HandlerTable, MemoryBus, ServicePacket};

use super::service::MatchmakerService;

const LOG_TARGET: &str = "matchmaker::bus_dispatch";

#[derive(Debug, Deserialize)]
struct JoinQueueRequest {
    #[serde(rename = "poolId")]
    pool_id: String,
    #[serde(rename = "userId")]
    user_id: String,
    score: i64,
}

#[derive(Debug, Deserialize)]
struct LeaveQueueRequest {
    #[serde(rename = "userId")]
    user_id: String,
}

fn build_handler_table(service: Arc<MatchmakerService>) -> HandlerTable {
    let join_service = Arc::clone(&service);
    let leave_service = Arc::clone(&service);

    HandlerTable::builder()
        .route("joinQueue", move |packet: ServicePacket| {
            let service = Arc::clone(&join_service);
            async move {
                let req: JoinQueueRequest = serde_json::from_value(packet.data)
                    .map_err(|e| crate::errors::FabricError::ClientProtocol(format!("bad joinQueue body: {e}")))?;
                service
                    .join_queue(&req.pool_id, &req.user_id, req.score)
                    .await
                    .map_err(|e| crate::errors::FabricError::ClientProtocol(e.to_string()))?;
                Ok(json!({ "queued": true }))
            }
        })
        .route("leaveQueue", move |packet: ServicePacket| {
            let service = Arc::clone(&leave_service);
            async move {
                let req: LeaveQueueRequest = serde_json::from_value(packet.data)
                    .map_err(|e| crate::errors::FabricError::ClientProtocol(format!("bad leaveQueue body: {e}")))?;
                service.leave_queue(&req.user_id).await;
                Ok(json!({}))
            }
        })
        .build()
}

/// Subscribes to this node's own bus subject and answers every inbound
/// route through `table`. Requests get a reply packet; notifies run the
/// handler and discard the result.
pub async fn run_matchmaker_dispatch_loop(service: Arc<MatchmakerService>, bus: Arc<MemoryBus>, from_subject: String) {
    let table = build_handler_table(service);
    let mut inbox = bus.subscribe(from_subject);
    while let Some(packet) = inbox.recv().await {
        let is_request = matches!(packet.kind, crate::protocol::message::MessageType::Request);
        let inbox_subject = MemoryBus::inbox_subject(&packet.from, packet.call_id);
        let from = packet.from.clone();
        let to = packet.to.clone();
        let route = packet.route.clone();

        let result = table.dispatch(packet).await;

        if !is_request {
            if let Err(err) = result {
                warn!(target: LOG_TARGET, route, error = %err, "notify handler failed");
            }
            continue;
        }

        let response = match result {
            Ok(data) => ServicePacket {
                kind: crate::protocol::message::MessageType::Response,
                call_id: 0,
                from: to,
                to: from,
                route,
                data,
                error: None,
                push_user: Vec::new(),
                session_data: None,
            },
            Err(err) => ServicePacket {
                kind: crate::protocol::message::MessageType::Response,
                call_id: 0,
                from: to,
                to: from,
                route,
                data: serde_json::Value::Null,
                error: Some(err.to_string()),
                push_user: Vec::new(),
                session_data: None,
            },
        };
        if let Err(err) = bus.reply(&inbox_subject, response) {
            warn!(target: LOG_TARGET, error = %err, "failed to reply to matchmaker request");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{Resolver, Role, SelectionStrategy, Seeker};
    use crate::matchmaker::{default_pools, spawn_matchmaker};
    use crate::store::{memory::MemoryStore, RouteStore};
    use std::time::Duration;

    #[tokio::test]
    async fn join_queue_request_gets_a_reply() {
        let kv = MemoryStore::new();
        let bus = Arc::new(MemoryBus::new());
        let route_store = Arc::new(RouteStore::new(kv.clone(), Duration::from_secs(7200)));
        let resolver = Arc::new(Resolver::start(kv.clone(), Role::Game).await.unwrap());
        let seeker = Arc::new(Seeker::new(resolver, SelectionStrategy::LeastLoad));

        let service = Arc::new(spawn_matchmaker(default_pools(), seeker, route_store, Arc::clone(&bus), "march/m1".into()));
        tokio::spawn(run_matchmaker_dispatch_loop(Arc::clone(&service), Arc::clone(&bus), "march/m1".into()));

        let request = ServicePacket::request(
            "connector/c1".into(),
            "march/m1".into(),
            0,
            "joinQueue",
            json!({ "poolId": "classic:casual4", "userId": "u1", "score": 1500 }),
        );
        let response = bus.request(request, None).await.unwrap();
        assert!(response.error.is_none());
    }
}
