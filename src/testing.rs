//! A minimal multi-replica harness, test-only: applies the same committed
//! op sequence to N independent `Coordinator`s in lock-step, without a
//! real consensus/log implementation. This is the in-crate analogue of
//! "crash and restart every replica" used to exercise the leader-crash
//! resilience scenario.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::coordinator::Coordinator;
use crate::op::{Reply, TimestampedRequest};

/// N coordinators fed the identical sequence of committed requests.
pub struct Cluster {
    config: ServerConfig,
    replicas: Vec<Arc<Coordinator>>,
    log: Vec<TimestampedRequest>,
    last_replies: Vec<Reply>,
}

impl Cluster {
    pub fn new(replica_count: usize, config: ServerConfig) -> Cluster {
        assert!(replica_count > 0, "a cluster needs at least one replica");
        Cluster {
            config,
            replicas: (0..replica_count).map(|_| Arc::new(Coordinator::new(config))).collect(),
            log: Vec::new(),
            last_replies: Vec::new(),
        }
    }

    pub fn replicas(&self) -> &[Arc<Coordinator>] {
        &self.replicas
    }

    /// Applies `request` to every replica, in order, recording it in the
    /// replayable log and stashing every replica's reply for
    /// `last_replies_agree`. Returns the first replica's reply, the one a
    /// client would see.
    pub fn apply(&mut self, request: TimestampedRequest) -> Reply {
        self.last_replies = self.replicas.iter().map(|r| r.apply(request.clone())).collect();
        self.log.push(request);
        self.last_replies.first().cloned().expect("a cluster always has at least one replica")
    }

    /// Checks that every replica produced the identical reply to the most
    /// recently applied request — the cross-replica convergence
    /// invariant every replica must preserve.
    pub fn last_replies_agree(&self) -> bool {
        self.last_replies.windows(2).all(|pair| pair[0] == pair[1])
    }

    /// "Crashes and restarts" one replica: replaces it with a fresh
    /// `Coordinator` and replays the whole log recorded so far, the
    /// closest in-crate analogue to a replica rejoining after a crash
    /// without an actual consensus/log implementation.
    pub fn restart_replica(&mut self, index: usize) {
        let fresh = Arc::new(Coordinator::new(self.config));
        for request in &self.log {
            fresh.apply(request.clone());
        }
        self.replicas[index] = fresh;
    }
}
