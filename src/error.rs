//! Wire-level tagged errors (spec.md §6-7).
//!
//! These are the errors carried in-band in RPC replies. The enum is closed
//! and small enough that a hand-rolled `Display`/`std::error::Error` impl
//! (the same shape the teacher crate already uses in its own
//! `serde::error::Error`) reads better than pulling in a derive macro for a
//! handful of unit variants.

use std::fmt;

use serde_derive::{Deserialize, Serialize};

/// A definitive or retryable error returned in an RPC reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Error {
    /// The referenced znode does not exist.
    NoFile,
    /// `Create` without the sequential flag targeted an existing znode
    /// (or `GetHighestSequence` was asked about the root). The original
    /// creator's session id, where relevant, travels in the reply's own
    /// `created_by` field rather than inside the error.
    OnCreate,
    /// A version-checked mutation was attempted against a stale version.
    Version,
    /// The calling session is unknown or has expired.
    SessionClosed,
    /// `Delete("/")` was attempted.
    DeleteRoot,
    /// Synthesized only by the client: a retried `SetData` came back with
    /// `Version`, and the client cannot prove its own earlier attempt did
    /// not already succeed.
    Maybe,
    /// The contacted replica believes it is not the leader; retryable
    /// against another replica.
    WrongLeader,
}

impl Error {
    /// The wire-level tag, matching the original's string constants exactly.
    pub fn tag(&self) -> &'static str {
        match self {
            Error::NoFile => "ErrNoFile",
            Error::OnCreate => "ErrOnCreate",
            Error::Version => "ErrVersion",
            Error::SessionClosed => "ErrSessionClosed",
            Error::DeleteRoot => "ErrDeleteRoot",
            Error::Maybe => "ErrMaybe",
            Error::WrongLeader => "ErrWrongLeader",
        }
    }

    /// Whether a client should retry this call against another replica
    /// rather than surface the error to its caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::WrongLeader)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl std::error::Error for Error {}

/// The call itself did not complete (dropped connection, timeout, no
/// reachable replica) — distinct from a definitive `Error` reply. Mirrors
/// the `ok bool` the original RPC layer returns alongside a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RpcFailure;

impl fmt::Display for RpcFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("rpc call did not complete")
    }
}

impl std::error::Error for RpcFailure {}
