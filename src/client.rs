//! The client-side session: leader discovery/retry, keep-alive loop,
//! sequential-create idempotence, watch dispatch.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::endpoint::{ServerEndpoint, WatchWaitOutcome};
use crate::error::{Error, RpcFailure};
use crate::flags::CreateFlags;
use crate::op::*;
use crate::path::Path;
use crate::session::SessionId;
use crate::watch::{WatchEvent, WatchId};

/// One RPC-reachable replica, as the client sees it.
pub type Endpoint = Arc<dyn ServerEndpoint + Send + Sync>;

/// The receiving end of a one-shot watch notification: a channel that
/// receives at most one event and is then closed. Dropping the handle
/// abandons the background `WatchWait` poller.
pub struct WatchHandle {
    receiver: Receiver<WatchEvent>,
}

impl WatchHandle {
    /// Blocks until the watch fires or its background poller gives up
    /// (session gone, server shut down, channel dropped).
    pub fn wait(&self) -> Option<WatchEvent> {
        self.receiver.recv().ok()
    }

    pub fn try_wait(&self) -> Option<WatchEvent> {
        self.receiver.try_recv().ok()
    }
}

/// Advances the believed-leader index modulo the endpoint count, as every
/// retry loop does on `ErrWrongLeader` or a failed call.
fn advance_leader(leader: &Mutex<usize>, endpoint_count: usize) {
    let mut guard = leader.lock();
    *guard = (*guard + 1) % endpoint_count;
}

/// Calls `make_op` against the believed leader, retrying against the next
/// endpoint (with backoff) on RPC failure or `ErrWrongLeader`, until a
/// definitive reply arrives. Safe for any op whose retry is naturally
/// idempotent at the server (everything except a bare sequential
/// `Create`, which uses its own loop below).
fn call_with_retry(
    endpoints: &[Endpoint],
    leader: &Mutex<usize>,
    config: &ClientConfig,
    make_op: impl Fn() -> Op,
) -> Reply {
    loop {
        let idx = *leader.lock();
        let endpoint = &endpoints[idx % endpoints.len()];
        match endpoint.call(make_op()) {
            Ok(reply) => {
                if reply.err() == Some(Error::WrongLeader) {
                    advance_leader(leader, endpoints.len());
                    thread::sleep(config.retry_backoff);
                    continue;
                }
                return reply;
            }
            Err(RpcFailure) => {
                advance_leader(leader, endpoints.len());
                thread::sleep(config.retry_backoff);
                continue;
            }
        }
    }
}

/// A client's binding to one server-side session: the ordered list of
/// replicas, the believed-leader index, and the assigned session id.
pub struct ClientSession {
    endpoints: Vec<Endpoint>,
    leader: Arc<Mutex<usize>>,
    config: ClientConfig,
    session_id: SessionId,
}

impl ClientSession {
    /// Issues `StartSession` (retrying across replicas as needed) and
    /// starts the background keep-alive task.
    pub fn make_session(endpoints: Vec<Endpoint>, config: ClientConfig) -> Arc<ClientSession> {
        assert!(!endpoints.is_empty(), "a client session needs at least one replica endpoint");

        let leader = Arc::new(Mutex::new(0));
        let reply = call_with_retry(&endpoints, &leader, &config, || Op::StartSession(StartSessionArgs));
        let session_id = match reply {
            Reply::StartSession(r) => r.session_id.expect("a non-WrongLeader StartSession reply always carries a session id"),
            _ => unreachable!("StartSession always yields a StartSession reply"),
        };
        debug!(session = session_id.0, "session started");

        let session = Arc::new(ClientSession { endpoints, leader, config, session_id });

        let background = Arc::clone(&session);
        thread::spawn(move || background.keep_alive_loop());

        session
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    fn call_with_retry(&self, make_op: impl Fn() -> Op) -> Reply {
        call_with_retry(&self.endpoints, &self.leader, &self.config, make_op)
    }

    fn advance_leader(&self) {
        advance_leader(&self.leader, self.endpoints.len());
    }

    fn leader_endpoint(&self) -> &Endpoint {
        let idx = *self.leader.lock();
        &self.endpoints[idx % self.endpoints.len()]
    }

    /// Runs every `keep_alive_interval`, refreshing the session's
    /// server-side deadline. Exits the first time the server reports the
    /// session closed.
    fn keep_alive_loop(self: Arc<Self>) {
        loop {
            thread::sleep(self.config.keep_alive_interval);
            let reply = self.call_with_retry(|| Op::KeepAlive(KeepAliveArgs { session_id: self.session_id }));
            if reply.err() == Some(Error::SessionClosed) {
                warn!(session = self.session_id.0, "session closed, stopping keep-alive");
                return;
            }
        }
    }

    pub fn end_session(&self) {
        self.call_with_retry(|| Op::EndSession(EndSessionArgs { session_id: self.session_id }));
    }

    /// A same-process no-op: every read is already submitted through
    /// consensus, so `Sync` has nothing to add.
    pub fn sync(&self) {}

    pub fn create(&self, path: &Path, data: &str, flags: CreateFlags) -> Result<Path, Error> {
        if flags.sequential {
            return self.create_sequential(path, data, flags);
        }

        let reply = self.call_with_retry(|| Op::Create(CreateArgs {
            session_id: self.session_id,
            path: path.clone(),
            data: data.to_string(),
            flags,
        }));
        match reply {
            Reply::Create(r) => match r.err {
                None => Ok(r.znode_name.expect("a successful create always names the node")),
                Some(Error::OnCreate) if r.created_by == Some(self.session_id) => Ok(path.clone()),
                Some(e) => Err(e),
            },
            _ => unreachable!("Create always yields a Create reply"),
        }
    }

    /// Sequential-create idempotence: a blind retry of a sequential create
    /// would allocate a second suffix whenever the client can't tell if its
    /// first attempt already landed. Before the first attempt, remember the
    /// parent's current high-water mark; if the RPC itself fails (no
    /// reply), re-check the high-water mark rather than resubmitting — if
    /// it advanced, our own attempt already succeeded.
    fn create_sequential(&self, path: &Path, data: &str, flags: CreateFlags) -> Result<Path, Error> {
        let old = self.get_highest_sequence(path);

        loop {
            let endpoint = self.leader_endpoint().clone();
            let op = Op::Create(CreateArgs {
                session_id: self.session_id,
                path: path.clone(),
                data: data.to_string(),
                flags,
            });

            match endpoint.call(op) {
                Ok(Reply::Create(r)) => match r.err {
                    None => return Ok(r.znode_name.expect("a successful create always names the node")),
                    Some(Error::WrongLeader) => {
                        self.advance_leader();
                        thread::sleep(self.config.retry_backoff);
                        continue;
                    }
                    Some(Error::OnCreate) if r.created_by == Some(self.session_id) => {
                        let newest = self.get_highest_sequence(path);
                        return Ok(sequential_name(path, newest));
                    }
                    Some(e) => return Err(e),
                },
                Ok(_) => unreachable!("Create always yields a Create reply"),
                Err(RpcFailure) => {
                    let newest = self.get_highest_sequence(path);
                    if newest > old {
                        return Ok(sequential_name(path, newest));
                    }
                    self.advance_leader();
                    thread::sleep(self.config.retry_backoff);
                    continue;
                }
            }
        }
    }

    /// Versioned write; surfaces `ErrMaybe` instead of `ErrVersion` when a
    /// retry after a lost reply can't rule out its own earlier attempt
    /// having already incremented the version.
    pub fn set_data(&self, path: &Path, data: &str, version: i64) -> Result<(), Error> {
        let mut ambiguous = false;
        loop {
            let endpoint = self.leader_endpoint().clone();
            let op = Op::SetData(SetDataArgs {
                session_id: self.session_id,
                path: path.clone(),
                data: data.to_string(),
                version,
            });
            match endpoint.call(op) {
                Ok(Reply::SetData(r)) => match r.err {
                    None => return Ok(()),
                    Some(Error::WrongLeader) => {
                        self.advance_leader();
                        thread::sleep(self.config.retry_backoff);
                        continue;
                    }
                    Some(Error::Version) if ambiguous => return Err(Error::Maybe),
                    Some(e) => return Err(e),
                },
                Ok(_) => unreachable!("SetData always yields a SetData reply"),
                Err(RpcFailure) => {
                    ambiguous = true;
                    self.advance_leader();
                    thread::sleep(self.config.retry_backoff);
                    continue;
                }
            }
        }
    }

    pub fn delete(&self, path: &Path, version: i64) -> Result<(), Error> {
        let reply = self.call_with_retry(|| Op::Delete(DeleteArgs {
            session_id: self.session_id,
            path: path.clone(),
            version,
        }));
        match reply {
            Reply::Delete(r) => match r.err {
                None => Ok(()),
                Some(e) => Err(e),
            },
            _ => unreachable!("Delete always yields a Delete reply"),
        }
    }

    pub fn exists(&self, path: &Path, watch: bool) -> Result<(bool, Option<WatchHandle>), Error> {
        let reply = self.call_with_retry(|| Op::Exists(ExistsArgs {
            session_id: self.session_id,
            path: path.clone(),
            watch: if watch { Watch::SET } else { Watch::NONE },
        }));
        match reply {
            Reply::Exists(r) => match r.err {
                Some(e) => Err(e),
                None => Ok((r.result, r.watch_id.map(|id| self.spawn_watch(id)))),
            },
            _ => unreachable!("Exists always yields an Exists reply"),
        }
    }

    pub fn get_data(&self, path: &Path, watch: bool) -> Result<(String, i64, Option<WatchHandle>), Error> {
        let reply = self.call_with_retry(|| Op::GetData(GetDataArgs {
            session_id: self.session_id,
            path: path.clone(),
            watch: if watch { Watch::SET } else { Watch::NONE },
        }));
        match reply {
            Reply::GetData(r) => match r.err {
                Some(e) => Err(e),
                None => Ok((
                    r.data.expect("a successful GetData always returns data"),
                    r.version.expect("a successful GetData always returns a version"),
                    r.watch_id.map(|id| self.spawn_watch(id)),
                )),
            },
            _ => unreachable!("GetData always yields a GetData reply"),
        }
    }

    pub fn get_children(&self, path: &Path, watch: bool) -> Result<(Vec<String>, Option<WatchHandle>), Error> {
        let reply = self.call_with_retry(|| Op::GetChildren(GetChildrenArgs {
            session_id: self.session_id,
            path: path.clone(),
            watch: if watch { Watch::SET } else { Watch::NONE },
        }));
        match reply {
            Reply::GetChildren(r) => match r.err {
                Some(e) => Err(e),
                None => Ok((
                    r.children.expect("a successful GetChildren always returns a list"),
                    r.watch_id.map(|id| self.spawn_watch(id)),
                )),
            },
            _ => unreachable!("GetChildren always yields a GetChildren reply"),
        }
    }

    pub fn get_highest_sequence(&self, path: &Path) -> i64 {
        let reply = self.call_with_retry(|| Op::GetHighestSequence(GetHighestSeqArgs {
            session_id: self.session_id,
            path: path.clone(),
        }));
        match reply {
            Reply::GetHighestSequence(r) => r.seq_num,
            _ => unreachable!("GetHighestSequence always yields a GetHighestSequence reply"),
        }
    }

    /// Spawns the background task that long-polls `WatchWait` for one
    /// registration and feeds its single event into the returned handle's
    /// channel. A `ServerShuttingDown` outcome ends the task without ever
    /// sending an event.
    fn spawn_watch(&self, watch_id: WatchId) -> WatchHandle {
        let (sender, receiver) = bounded(1);
        let endpoints = self.endpoints.clone();
        let leader = Arc::clone(&self.leader);
        let config = self.config;
        let session_id = self.session_id;

        thread::spawn(move || loop {
            let idx = *leader.lock();
            let endpoint = endpoints[idx % endpoints.len()].clone();
            match endpoint.watch_wait(session_id, watch_id) {
                Ok(WatchWaitOutcome::Fired(event)) => {
                    let _ = sender.send(event);
                    return;
                }
                Ok(WatchWaitOutcome::ServerShuttingDown) => return,
                Err(RpcFailure) => {
                    advance_leader(&leader, endpoints.len());
                    thread::sleep(config.retry_backoff);
                }
            }
        });

        WatchHandle { receiver }
    }
}

fn sequential_name(path: &Path, n: i64) -> Path {
    let mut segments = path.segments().to_vec();
    let last = segments.last_mut().expect("path has at least one segment");
    *last = format!("{}{}", last, n);
    Path::from_segments(&segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_name_appends_suffix_to_prefix() {
        let p = Path::parse("/a/seq-");
        assert_eq!(sequential_name(&p, 3), Path::parse("/a/seq-3"));
    }
}
