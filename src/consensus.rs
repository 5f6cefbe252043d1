//! The consensus seam (spec.md §6, §9): `Submit(op) -> (result | NotLeader)`
//! plus a deterministic per-replica apply hook. The real log-replication
//! layer is an external collaborator (spec.md §1); this module only
//! defines the boundary and ships a single-node, in-process
//! implementation used for tests and standalone operation.

use crate::op::{Reply, TimestampedRequest};

/// Returned by `Consensus::submit` when the contacted replica does not
/// believe it is the current leader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotLeader;

/// Anything that can take a timestamped op, replicate it, and hand back
/// the committed apply result — or report that it isn't the leader.
pub trait Consensus {
    fn submit(&self, request: TimestampedRequest) -> Result<Reply, NotLeader>;
}

/// A trivial single-node "consensus" that is always its own leader and
/// applies synchronously inline with `submit`. Stands in for a real
/// Raft/Paxos log in tests and single-process demos; it replicates
/// nothing and commits immediately.
pub struct LocalConsensus<A> {
    applier: A,
}

impl<A> LocalConsensus<A>
where
    A: Fn(TimestampedRequest) -> Reply,
{
    pub fn new(applier: A) -> LocalConsensus<A> {
        LocalConsensus { applier }
    }
}

impl<A> Consensus for LocalConsensus<A>
where
    A: Fn(TimestampedRequest) -> Reply,
{
    fn submit(&self, request: TimestampedRequest) -> Result<Reply, NotLeader> {
        Ok((self.applier)(request))
    }
}
