//! `zoolite`: a replicated hierarchical name service — sessions,
//! ephemeral nodes, sequential naming, versioned conditional writes, and
//! server-pushed watches, modelled on the client-facing guarantees of a
//! ZooKeeper-style coordination primitive.
//!
//! The consensus/log-replication layer, the network transport, and test
//! fault injection are external collaborators (see [`consensus`] and
//! [`endpoint`] for the boundaries this crate defines to them) — this
//! crate is the replicated state machine and the client-side session that
//! binds to it, not a production Raft/Paxos implementation.

pub mod client;
pub mod config;
pub mod consensus;
pub mod coordinator;
pub mod endpoint;
pub mod error;
pub mod flags;
pub mod op;
pub mod path;
pub mod session;
pub mod watch;
pub mod znode;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::{ClientSession, Endpoint, WatchHandle};
pub use config::{ClientConfig, ServerConfig};
pub use consensus::{Consensus, LocalConsensus, NotLeader};
pub use coordinator::Coordinator;
pub use endpoint::{LocalEndpoint, Server, ServerEndpoint, WatchWaitOutcome};
pub use error::{Error, RpcFailure};
pub use flags::CreateFlags;
pub use path::Path;
pub use session::{SessionId, Timestamp};
pub use watch::{EventKind, WatchEvent, WatchId};
