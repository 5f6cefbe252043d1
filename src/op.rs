//! The request/reply envelope submitted to consensus (spec.md §6, §9).
//!
//! The original dispatches by a runtime type-switch on the inner request;
//! here that becomes a tagged `Op` enum matched by variant in
//! `Coordinator::apply`. `WatchWait` is deliberately absent from `Op` — per
//! spec.md §4.C it is not submitted through consensus.

use serde_derive::{Deserialize, Serialize};

use crate::error::Error;
use crate::flags::CreateFlags;
use crate::path::Path;
use crate::session::{SessionId, Timestamp};
use crate::watch::WatchId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartSessionArgs;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartSessionReply {
    pub session_id: Option<SessionId>,
    pub err: Option<Error>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndSessionArgs {
    pub session_id: SessionId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndSessionReply {
    pub err: Option<Error>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeepAliveArgs {
    pub session_id: SessionId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeepAliveReply {
    pub err: Option<Error>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateArgs {
    pub session_id: SessionId,
    pub path: Path,
    pub data: String,
    pub flags: CreateFlags,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateReply {
    pub znode_name: Option<Path>,
    pub created_by: Option<SessionId>,
    pub err: Option<Error>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watch {
    pub should_watch: bool,
}

impl Watch {
    pub const NONE: Watch = Watch { should_watch: false };
    pub const SET: Watch = Watch { should_watch: true };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistsArgs {
    pub session_id: SessionId,
    pub path: Path,
    pub watch: Watch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistsReply {
    pub result: bool,
    pub watch_id: Option<WatchId>,
    pub err: Option<Error>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetDataArgs {
    pub session_id: SessionId,
    pub path: Path,
    pub watch: Watch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetDataReply {
    pub data: Option<String>,
    pub version: Option<i64>,
    pub watch_id: Option<WatchId>,
    pub err: Option<Error>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetDataArgs {
    pub session_id: SessionId,
    pub path: Path,
    pub data: String,
    pub version: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetDataReply {
    pub err: Option<Error>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetChildrenArgs {
    pub session_id: SessionId,
    pub path: Path,
    pub watch: Watch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetChildrenReply {
    pub children: Option<Vec<String>>,
    pub watch_id: Option<WatchId>,
    pub err: Option<Error>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteArgs {
    pub session_id: SessionId,
    pub path: Path,
    pub version: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteReply {
    pub err: Option<Error>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetHighestSeqArgs {
    pub session_id: SessionId,
    pub path: Path,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetHighestSeqReply {
    pub seq_num: i64,
    pub err: Option<Error>,
}

/// Every operation that flows through consensus. `WatchWait` is handled
/// out-of-band (see `crate::coordinator::Coordinator::watch_wait`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    StartSession(StartSessionArgs),
    EndSession(EndSessionArgs),
    KeepAlive(KeepAliveArgs),
    Create(CreateArgs),
    Exists(ExistsArgs),
    GetData(GetDataArgs),
    SetData(SetDataArgs),
    GetChildren(GetChildrenArgs),
    Delete(DeleteArgs),
    GetHighestSequence(GetHighestSeqArgs),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reply {
    StartSession(StartSessionReply),
    EndSession(EndSessionReply),
    KeepAlive(KeepAliveReply),
    Create(CreateReply),
    Exists(ExistsReply),
    GetData(GetDataReply),
    SetData(SetDataReply),
    GetChildren(GetChildrenReply),
    Delete(DeleteReply),
    GetHighestSequence(GetHighestSeqReply),
}

/// The leader stamps every submitted op with its wall-clock microseconds
/// before handing it to consensus; every replica's apply uses this
/// timestamp, never local time, for deadline arithmetic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampedRequest {
    pub timestamp: Timestamp,
    pub op: Op,
}

impl Reply {
    /// The wire-level error carried by whichever reply variant this is,
    /// regardless of which op produced it. Lets the client's retry loop
    /// stay generic over the op being retried.
    pub fn err(&self) -> Option<Error> {
        match self {
            Reply::StartSession(r) => r.err,
            Reply::EndSession(r) => r.err,
            Reply::KeepAlive(r) => r.err,
            Reply::Create(r) => r.err,
            Reply::Exists(r) => r.err,
            Reply::GetData(r) => r.err,
            Reply::SetData(r) => r.err,
            Reply::GetChildren(r) => r.err,
            Reply::Delete(r) => r.err,
            Reply::GetHighestSequence(r) => r.err,
        }
    }
}

/// Builds the error reply matching `op`'s shape, used when a replica
/// declines a submission because it does not believe it is the leader.
pub fn wrong_leader_reply(op: &Op) -> Reply {
    let err = Some(Error::WrongLeader);
    match op {
        Op::StartSession(_) => Reply::StartSession(StartSessionReply { session_id: None, err }),
        Op::EndSession(_) => Reply::EndSession(EndSessionReply { err }),
        Op::KeepAlive(_) => Reply::KeepAlive(KeepAliveReply { err }),
        Op::Create(_) => Reply::Create(CreateReply { znode_name: None, created_by: None, err }),
        Op::Exists(_) => Reply::Exists(ExistsReply { result: false, watch_id: None, err }),
        Op::GetData(_) => Reply::GetData(GetDataReply { data: None, version: None, watch_id: None, err }),
        Op::SetData(_) => Reply::SetData(SetDataReply { err }),
        Op::GetChildren(_) => Reply::GetChildren(GetChildrenReply { children: None, watch_id: None, err }),
        Op::Delete(_) => Reply::Delete(DeleteReply { err }),
        Op::GetHighestSequence(_) => Reply::GetHighestSequence(GetHighestSeqReply { seq_num: -1, err }),
    }
}
