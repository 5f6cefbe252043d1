//! The transport boundary: a replica-reachable RPC surface.
//!
//! `ServerEndpoint` stands in for the network RPC layer — a call either
//! fails outright (`RpcFailure`) or completes with a definitive reply.
//! `Server` is the leader-side envelope: stamp the op with a timestamp,
//! submit to consensus, translate `NotLeader` into `ErrWrongLeader`.
//! `LocalEndpoint` wraps a `Server` in-process for tests and single-node
//! demos; a networked implementation is out of scope here.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::warn;

use crate::consensus::{Consensus, NotLeader};
use crate::coordinator::Coordinator;
use crate::error::RpcFailure;
use crate::op::{wrong_leader_reply, Op, Reply, TimestampedRequest};
use crate::session::{SessionId, Timestamp};
use crate::watch::{WatchEvent, WatchId};

/// What `WatchWait` returns once the call itself completes: either the
/// event fired, or a sign the server was shutting down — in which case
/// the endpoint returns without ever firing a callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchWaitOutcome {
    Fired(WatchEvent),
    ServerShuttingDown,
}

/// Everything a client session calls against one replica: submit an op,
/// or long-poll for a watch. Implementations may fail the call itself
/// (`RpcFailure`) without ever producing a definitive reply.
pub trait ServerEndpoint {
    fn call(&self, op: Op) -> Result<Reply, RpcFailure>;
    fn watch_wait(&self, session_id: SessionId, watch_id: WatchId) -> Result<WatchWaitOutcome, RpcFailure>;
}

/// One replica: a `Coordinator` fronted by a `Consensus` submission path.
pub struct Server<C> {
    coordinator: Arc<Coordinator>,
    consensus: C,
}

impl<C: Consensus> Server<C> {
    pub fn new(coordinator: Arc<Coordinator>, consensus: C) -> Server<C> {
        Server { coordinator, consensus }
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    fn now() -> Timestamp {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as i64)
            .unwrap_or(0);
        Timestamp(micros)
    }

    /// The leader-side envelope (spec.md §4.C, steps 1-3): stamp, submit,
    /// return the committed reply or `ErrWrongLeader`.
    pub fn submit(&self, op: Op) -> Reply {
        let request = TimestampedRequest { timestamp: Self::now(), op };
        match self.consensus.submit(request.clone()) {
            Ok(reply) => reply,
            Err(NotLeader) => {
                warn!("not leader, rejecting submission");
                wrong_leader_reply(&request.op)
            }
        }
    }

    /// Not submitted through consensus: reads state consensus has already
    /// produced on this replica (spec.md §4.C).
    pub fn watch_wait(&self, session_id: SessionId, watch_id: WatchId) -> WatchWaitOutcome {
        match self.coordinator.watch_wait(session_id, watch_id) {
            Some(event) => WatchWaitOutcome::Fired(event),
            None => WatchWaitOutcome::ServerShuttingDown,
        }
    }
}

/// In-process transport: calls straight into a `Server`, no network round
/// trip. Stands in for the out-of-scope network layer in tests and
/// single-process demos.
pub struct LocalEndpoint<C> {
    server: Arc<Server<C>>,
}

impl<C> LocalEndpoint<C> {
    pub fn new(server: Arc<Server<C>>) -> LocalEndpoint<C> {
        LocalEndpoint { server }
    }
}

impl<C: Consensus> ServerEndpoint for LocalEndpoint<C> {
    fn call(&self, op: Op) -> Result<Reply, RpcFailure> {
        Ok(self.server.submit(op))
    }

    fn watch_wait(&self, session_id: SessionId, watch_id: WatchId) -> Result<WatchWaitOutcome, RpcFailure> {
        Ok(self.server.watch_wait(session_id, watch_id))
    }
}
