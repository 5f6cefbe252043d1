//! The replicated coordinator (spec.md §4.C).
//!
//! Holds the namespace tree, the session table, the ephemeral-ownership
//! index, the watch registry and its fired-watch table, all behind a
//! single exclusive lock, plus the condition variable `WatchWait` sleeps
//! on. `apply` is the deterministic per-replica entry point a real
//! consensus layer would call in committed-log order (spec.md §9's
//! "dynamic-dispatch apply" note): every replica that applies the same
//! sequence of `TimestampedRequest`s ends up in byte-identical states.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::Error;
use crate::flags::CreateFlags;
use crate::op::*;
use crate::path::Path;
use crate::session::{SessionId, SessionTable, Timestamp};
use crate::watch::{EventKind, FiredWatchTable, Registration, WatchEvent, WatchId, WatchRegistry};
use crate::znode::{AddChildResult, ZNode};

struct CoordinatorState {
    root: ZNode,
    sessions: SessionTable,
    ephemeral_index: HashMap<SessionId, Vec<Path>>,
    watches: WatchRegistry,
    fired: FiredWatchTable,
}

impl CoordinatorState {
    fn new() -> CoordinatorState {
        CoordinatorState {
            root: ZNode::root(),
            sessions: SessionTable::new(),
            ephemeral_index: HashMap::new(),
            watches: WatchRegistry::new(),
            fired: FiredWatchTable::new(),
        }
    }
}

/// The single process-wide mutable structure described in spec.md §9,
/// guarded by one lock and one condvar rather than scattered statics.
pub struct Coordinator {
    state: Mutex<CoordinatorState>,
    fired_cond: Condvar,
    dead: AtomicBool,
    config: ServerConfig,
}

/// Removes every pending registration at `(kind, path)` and moves the
/// resulting events into the fired table. Returns whether anything fired.
fn fire(watches: &mut WatchRegistry, fired: &mut FiredWatchTable, kind: EventKind, path: &Path) -> bool {
    let events = watches.fire(kind, path);
    fired.insert_all(events)
}

/// Shared by the explicit `Delete` op (`check_version = true`) and
/// ephemeral cleanup during session reaping (`check_version = false`,
/// `version` ignored).
fn apply_delete(
    state: &mut CoordinatorState,
    path: &Path,
    version: i64,
    check_version: bool,
) -> (Result<(), Error>, bool) {
    if path.is_root() {
        return (Err(Error::DeleteRoot), false);
    }
    let parent_segments = path.parent_segments().expect("non-root path has a parent");
    let name = path.suffix();

    let parent = match state.root.lookup_mut(parent_segments) {
        Some(p) => p,
        None => return (Err(Error::NoFile), false),
    };
    if let Err(e) = parent.remove_child(name, version, check_version) {
        return (Err(e), false);
    }

    let parent_path = Path::from_segments(parent_segments);
    let mut fired_any = fire(&mut state.watches, &mut state.fired, EventKind::NodeDeleted, path);
    fired_any |= fire(&mut state.watches, &mut state.fired, EventKind::NodeChildrenChanged, &parent_path);
    (Ok(()), fired_any)
}

/// `Create`'s ancestor auto-materialization plus leaf creation (spec.md
/// §4.A/§4.B, with the exact fire-then-create-then-fire interleaving
/// recorded in SPEC_FULL.md's supplemental detail).
fn apply_create(
    state: &mut CoordinatorState,
    session_id: SessionId,
    path: &Path,
    data: &str,
    flags: CreateFlags,
) -> (CreateReply, bool) {
    let segments = path.segments();
    if segments.len() <= 1 {
        // The root always exists and is never created through this path.
        return (
            CreateReply {
                znode_name: None,
                created_by: Some(state.root.creator_session),
                err: Some(Error::OnCreate),
            },
            false,
        );
    }

    let mut fired_any = false;
    let mut built: Vec<String> = vec![segments[0].clone()];

    // Materialize any missing ancestors (every segment but the last).
    for seg in &segments[1..segments.len() - 1] {
        let has_child = state
            .root
            .lookup(&built)
            .expect("prefix materialized so far")
            .find_child(seg)
            .0
            .is_some();

        if !has_child {
            let parent_path = Path::from_segments(&built);
            fired_any |= fire(&mut state.watches, &mut state.fired, EventKind::NodeChildrenChanged, &parent_path);

            state
                .root
                .lookup_mut(&built)
                .expect("prefix materialized so far")
                .add_child(seg, "", false, session_id);

            built.push(seg.clone());
            let new_path = Path::from_segments(&built);
            fired_any |= fire(&mut state.watches, &mut state.fired, EventKind::NodeCreated, &new_path);
        } else {
            built.push(seg.clone());
        }
    }

    let last = segments.last().expect("path has at least one segment");
    let parent_path = Path::from_segments(&built);

    if flags.sequential {
        fired_any |= fire(&mut state.watches, &mut state.fired, EventKind::NodeChildrenChanged, &parent_path);

        let parent = state.root.lookup_mut(&built).expect("prefix materialized so far");
        let full_name = match parent.add_child(last, data, true, session_id) {
            AddChildResult::Created(node) => node.name.clone(),
            AddChildResult::AlreadyExists(_) => unreachable!("sequential create never collides"),
        };

        let mut leaf_segments = built;
        leaf_segments.push(full_name);
        let leaf_path = Path::from_segments(&leaf_segments);

        if flags.ephemeral {
            state.ephemeral_index.entry(session_id).or_default().push(leaf_path.clone());
        }
        fired_any |= fire(&mut state.watches, &mut state.fired, EventKind::NodeCreated, &leaf_path);

        (
            CreateReply { znode_name: Some(leaf_path), created_by: Some(session_id), err: None },
            fired_any,
        )
    } else {
        let existing = state
            .root
            .lookup(&built)
            .expect("prefix materialized so far")
            .find_child(last)
            .0
            .map(|c| c.creator_session);

        if let Some(creator) = existing {
            return (
                CreateReply { znode_name: None, created_by: Some(creator), err: Some(Error::OnCreate) },
                fired_any,
            );
        }

        fired_any |= fire(&mut state.watches, &mut state.fired, EventKind::NodeChildrenChanged, &parent_path);

        state
            .root
            .lookup_mut(&built)
            .expect("prefix materialized so far")
            .add_child(last, data, false, session_id);

        built.push(last.clone());
        let leaf_path = Path::from_segments(&built);

        if flags.ephemeral {
            state.ephemeral_index.entry(session_id).or_default().push(leaf_path.clone());
        }
        fired_any |= fire(&mut state.watches, &mut state.fired, EventKind::NodeCreated, &leaf_path);

        (
            CreateReply { znode_name: Some(leaf_path), created_by: Some(session_id), err: None },
            fired_any,
        )
    }
}

impl Coordinator {
    pub fn new(config: ServerConfig) -> Coordinator {
        Coordinator {
            state: Mutex::new(CoordinatorState::new()),
            fired_cond: Condvar::new(),
            dead: AtomicBool::new(false),
            config,
        }
    }

    /// The deterministic per-replica apply hook (spec.md §4.C, §9): every
    /// replica calls this, in identical order, for each committed op.
    pub fn apply(&self, request: TimestampedRequest) -> Reply {
        let ts = request.timestamp;
        let mut state = self.state.lock();

        let mut fired_any = self.reap_expired(&mut state, ts);

        let (reply, op_fired) = match request.op {
            Op::StartSession(_) => {
                let expiry = ts.plus_micros(self.config.session_timeout_micros());
                let id = state.sessions.start(expiry);
                debug!(session = id.0, "session started");
                (Reply::StartSession(StartSessionReply { session_id: Some(id), err: None }), false)
            }

            Op::EndSession(args) => {
                let fired = self.reap_session(&mut state, args.session_id);
                debug!(session = args.session_id.0, "session ended");
                (Reply::EndSession(EndSessionReply { err: None }), fired)
            }

            Op::KeepAlive(args) => {
                if !state.sessions.contains(args.session_id) {
                    (Reply::KeepAlive(KeepAliveReply { err: Some(Error::SessionClosed) }), false)
                } else {
                    let expiry = ts.plus_micros(self.config.session_timeout_micros());
                    state.sessions.refresh(args.session_id, expiry);
                    (Reply::KeepAlive(KeepAliveReply { err: None }), false)
                }
            }

            Op::Create(args) => {
                if !state.sessions.contains(args.session_id) {
                    (
                        Reply::Create(CreateReply { znode_name: None, created_by: None, err: Some(Error::SessionClosed) }),
                        false,
                    )
                } else {
                    let (reply, fired) = apply_create(&mut state, args.session_id, &args.path, &args.data, args.flags);
                    (Reply::Create(reply), fired)
                }
            }

            Op::Exists(args) => {
                if !state.sessions.contains(args.session_id) {
                    (Reply::Exists(ExistsReply { result: false, watch_id: None, err: Some(Error::SessionClosed) }), false)
                } else {
                    let found = state.root.lookup(args.path.segments()).is_some();
                    let watch_id = if args.watch.should_watch {
                        let kind = if found { EventKind::NodeDeleted } else { EventKind::NodeCreated };
                        let id = state.watches.next_id();
                        state.watches.append(kind, args.path.clone(), Registration { session_id: args.session_id, watch_id: id });
                        Some(id)
                    } else {
                        None
                    };
                    (Reply::Exists(ExistsReply { result: found, watch_id, err: None }), false)
                }
            }

            Op::GetData(args) => {
                if !state.sessions.contains(args.session_id) {
                    (
                        Reply::GetData(GetDataReply { data: None, version: None, watch_id: None, err: Some(Error::SessionClosed) }),
                        false,
                    )
                } else {
                    match state.root.lookup(args.path.segments()) {
                        None => (
                            Reply::GetData(GetDataReply { data: None, version: None, watch_id: None, err: Some(Error::NoFile) }),
                            false,
                        ),
                        Some(node) => {
                            let data = node.data.clone();
                            let version = node.version;
                            let watch_id = if args.watch.should_watch {
                                let id = state.watches.next_id();
                                state.watches.append(
                                    EventKind::NodeDataChanged,
                                    args.path.clone(),
                                    Registration { session_id: args.session_id, watch_id: id },
                                );
                                Some(id)
                            } else {
                                None
                            };
                            (
                                Reply::GetData(GetDataReply { data: Some(data), version: Some(version), watch_id, err: None }),
                                false,
                            )
                        }
                    }
                }
            }

            Op::SetData(args) => {
                if !state.sessions.contains(args.session_id) {
                    (Reply::SetData(SetDataReply { err: Some(Error::SessionClosed) }), false)
                } else {
                    match state.root.lookup_mut(args.path.segments()) {
                        None => (Reply::SetData(SetDataReply { err: Some(Error::NoFile) }), false),
                        Some(node) if node.version != args.version => {
                            (Reply::SetData(SetDataReply { err: Some(Error::Version) }), false)
                        }
                        Some(node) => {
                            node.data = args.data;
                            node.version += 1;
                            let fired = fire(&mut state.watches, &mut state.fired, EventKind::NodeDataChanged, &args.path);
                            (Reply::SetData(SetDataReply { err: None }), fired)
                        }
                    }
                }
            }

            Op::GetChildren(args) => {
                if !state.sessions.contains(args.session_id) {
                    (
                        Reply::GetChildren(GetChildrenReply { children: None, watch_id: None, err: Some(Error::SessionClosed) }),
                        false,
                    )
                } else {
                    match state.root.lookup(args.path.segments()) {
                        None => (
                            Reply::GetChildren(GetChildrenReply { children: None, watch_id: None, err: Some(Error::NoFile) }),
                            false,
                        ),
                        Some(node) => {
                            let children: Vec<String> = node.children().iter().map(|c| c.name.clone()).collect();
                            let watch_id = if args.watch.should_watch {
                                let id = state.watches.next_id();
                                state.watches.append(
                                    EventKind::NodeChildrenChanged,
                                    args.path.clone(),
                                    Registration { session_id: args.session_id, watch_id: id },
                                );
                                Some(id)
                            } else {
                                None
                            };
                            (
                                Reply::GetChildren(GetChildrenReply { children: Some(children), watch_id, err: None }),
                                false,
                            )
                        }
                    }
                }
            }

            Op::Delete(args) => {
                if !state.sessions.contains(args.session_id) {
                    (Reply::Delete(DeleteReply { err: Some(Error::SessionClosed) }), false)
                } else {
                    let (result, fired) = apply_delete(&mut state, &args.path, args.version, true);
                    (Reply::Delete(DeleteReply { err: result.err() }), fired)
                }
            }

            Op::GetHighestSequence(args) => {
                if !state.sessions.contains(args.session_id) {
                    (Reply::GetHighestSequence(GetHighestSeqReply { seq_num: -1, err: Some(Error::SessionClosed) }), false)
                } else {
                    let reply = match args.path.parent_segments() {
                        // Asked about the root itself, which has no parent to hold a
                        // per-session record; the original special-cases this as
                        // ErrOnCreate rather than ErrNoFile.
                        None => GetHighestSeqReply { seq_num: -1, err: Some(Error::OnCreate) },
                        Some(parent_segments) => match state.root.lookup(parent_segments) {
                            None => GetHighestSeqReply { seq_num: -1, err: Some(Error::NoFile) },
                            Some(parent) => match parent.highest_sequence(args.session_id, args.path.suffix()) {
                                Some(n) => GetHighestSeqReply { seq_num: n, err: None },
                                None => GetHighestSeqReply { seq_num: -1, err: Some(Error::NoFile) },
                            },
                        },
                    };
                    (Reply::GetHighestSequence(reply), false)
                }
            }
        };

        fired_any |= op_fired;
        drop(state);
        if fired_any {
            self.fired_cond.notify_all();
        }
        reply
    }

    /// Scans the whole session table and reaps anything expired as of
    /// `ts`. Deliberately O(|sessions|) per apply, per spec.md §9's open
    /// question — no deadline-ordered index is introduced.
    fn reap_expired(&self, state: &mut CoordinatorState, ts: Timestamp) -> bool {
        let expired = state.sessions.expired_as_of(ts);
        let mut fired_any = false;
        for session_id in expired {
            warn!(session = session_id.0, "session expired, reaping");
            fired_any |= self.reap_session(state, session_id);
        }
        fired_any
    }

    /// Removes a session's table entry, deletes every znode it owns
    /// ephemerally (firing the same events as an explicit delete), and
    /// discards its pending watch registrations.
    fn reap_session(&self, state: &mut CoordinatorState, session_id: SessionId) -> bool {
        let mut fired_any = false;
        if let Some(paths) = state.ephemeral_index.remove(&session_id) {
            for path in paths {
                let (_, fired) = apply_delete(state, &path, 0, false);
                fired_any |= fired;
            }
        }
        state.sessions.remove(session_id);
        state.watches.discard_session(session_id);
        state.fired.discard_session(session_id);
        fired_any
    }

    /// The long-poll endpoint (spec.md §4.C): blocks until `(session_id,
    /// watch_id)` fires or the server is shut down, in which case `None`
    /// is returned without ever invoking a callback.
    pub fn watch_wait(&self, session_id: SessionId, watch_id: WatchId) -> Option<WatchEvent> {
        let mut state = self.state.lock();
        loop {
            if let Some(event) = state.fired.take(session_id, watch_id) {
                return Some(event);
            }
            if self.dead.load(Ordering::Acquire) {
                return None;
            }
            self.wait_for_fire(&mut state);
        }
    }

    fn wait_for_fire<'a>(&self, state: &mut MutexGuard<'a, CoordinatorState>) {
        self.fired_cond.wait(state);
    }

    /// Marks the coordinator dead and wakes every `watch_wait` sleeper so
    /// they can observe it and return (spec.md §5's cancellation rule).
    pub fn shutdown(&self) {
        self.dead.store(true, Ordering::Release);
        self.fired_cond.notify_all();
        info!("coordinator shut down");
    }

    /// No-op placeholder, per spec.md §7: persistence and catch-up are
    /// consensus responsibilities, outside this crate's scope.
    pub fn snapshot(&self) -> Vec<u8> {
        Vec::new()
    }

    /// No-op placeholder counterpart of `snapshot`.
    pub fn restore(&self, _bytes: &[u8]) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ServerConfig {
        ServerConfig::default()
    }

    fn start_session(c: &Coordinator, ts: i64) -> SessionId {
        match c.apply(TimestampedRequest { timestamp: Timestamp(ts), op: Op::StartSession(StartSessionArgs) }) {
            Reply::StartSession(r) => r.session_id.unwrap(),
            _ => unreachable!(),
        }
    }

    fn create(c: &Coordinator, ts: i64, sid: SessionId, path: &str, data: &str, flags: CreateFlags) -> CreateReply {
        match c.apply(TimestampedRequest {
            timestamp: Timestamp(ts),
            op: Op::Create(CreateArgs { session_id: sid, path: Path::parse(path), data: data.to_string(), flags }),
        }) {
            Reply::Create(r) => r,
            _ => unreachable!(),
        }
    }

    fn get_data(c: &Coordinator, ts: i64, sid: SessionId, path: &str) -> GetDataReply {
        match c.apply(TimestampedRequest {
            timestamp: Timestamp(ts),
            op: Op::GetData(GetDataArgs { session_id: sid, path: Path::parse(path), watch: Watch::NONE }),
        }) {
            Reply::GetData(r) => r,
            _ => unreachable!(),
        }
    }

    #[test]
    fn basic_scenario_from_spec() {
        let c = Coordinator::new(config());
        let sid = start_session(&c, 0);

        create(&c, 1, sid, "/a", "", CreateFlags::NONE);
        create(&c, 2, sid, "/a/b", "hello", CreateFlags::NONE);

        let exists_b = match c.apply(TimestampedRequest {
            timestamp: Timestamp(3),
            op: Op::Exists(ExistsArgs { session_id: sid, path: Path::parse("/a/b"), watch: Watch::NONE }),
        }) {
            Reply::Exists(r) => r,
            _ => unreachable!(),
        };
        assert!(exists_b.result);

        let got = get_data(&c, 4, sid, "/a/b");
        assert_eq!(got.data.as_deref(), Some("hello"));
        assert_eq!(got.version, Some(1));

        let set = match c.apply(TimestampedRequest {
            timestamp: Timestamp(5),
            op: Op::SetData(SetDataArgs { session_id: sid, path: Path::parse("/a/b"), data: "bye".into(), version: 1 }),
        }) {
            Reply::SetData(r) => r,
            _ => unreachable!(),
        };
        assert_eq!(set.err, None);

        let got2 = get_data(&c, 6, sid, "/a/b");
        assert_eq!(got2.data.as_deref(), Some("bye"));
        assert_eq!(got2.version, Some(2));

        create(&c, 7, sid, "/a/c", "", CreateFlags::NONE);
        create(&c, 8, sid, "/a/d", "", CreateFlags::NONE);

        let children = match c.apply(TimestampedRequest {
            timestamp: Timestamp(9),
            op: Op::GetChildren(GetChildrenArgs { session_id: sid, path: Path::parse("/a"), watch: Watch::NONE }),
        }) {
            Reply::GetChildren(r) => r,
            _ => unreachable!(),
        };
        assert_eq!(children.children, Some(vec!["b".to_string(), "c".to_string(), "d".to_string()]));

        let del = match c.apply(TimestampedRequest {
            timestamp: Timestamp(10),
            op: Op::Delete(DeleteArgs { session_id: sid, path: Path::parse("/a/b"), version: 2 }),
        }) {
            Reply::Delete(r) => r,
            _ => unreachable!(),
        };
        assert_eq!(del.err, None);

        let exists_after = match c.apply(TimestampedRequest {
            timestamp: Timestamp(11),
            op: Op::Exists(ExistsArgs { session_id: sid, path: Path::parse("/a/b"), watch: Watch::NONE }),
        }) {
            Reply::Exists(r) => r,
            _ => unreachable!(),
        };
        assert!(!exists_after.result);
    }

    #[test]
    fn create_auto_materializes_missing_ancestors() {
        let c = Coordinator::new(config());
        let sid = start_session(&c, 0);
        let reply = create(&c, 1, sid, "/a/b/c", "leaf", CreateFlags::NONE);
        assert_eq!(reply.err, None);
        assert_eq!(reply.znode_name, Some(Path::parse("/a/b/c")));

        assert!(get_data(&c, 2, sid, "/a").err.is_none());
        assert!(get_data(&c, 3, sid, "/a/b").err.is_none());
    }

    #[test]
    fn create_without_sequential_on_existing_leaf_fails_with_creator() {
        let c = Coordinator::new(config());
        let sid1 = start_session(&c, 0);
        let sid2 = start_session(&c, 0);

        create(&c, 1, sid1, "/a", "first", CreateFlags::NONE);
        let reply = create(&c, 2, sid2, "/a", "second", CreateFlags::NONE);

        assert_eq!(reply.err, Some(Error::OnCreate));
        assert_eq!(reply.created_by, Some(sid1));
        // Untouched by the failed create.
        assert_eq!(get_data(&c, 3, sid1, "/a").data.as_deref(), Some("first"));
    }

    #[test]
    fn successful_create_always_reports_created_by() {
        let c = Coordinator::new(config());
        let sid = start_session(&c, 0);

        let plain = create(&c, 1, sid, "/a", "", CreateFlags::NONE);
        assert_eq!(plain.err, None);
        assert_eq!(plain.created_by, Some(sid));

        let seq = create(&c, 2, sid, "/a/seq-", "", CreateFlags::SEQUENTIAL);
        assert_eq!(seq.err, None);
        assert_eq!(seq.created_by, Some(sid));
    }

    #[test]
    fn sequential_create_allocates_monotonic_suffixes() {
        let c = Coordinator::new(config());
        let sid = start_session(&c, 0);

        let r0 = create(&c, 1, sid, "/a/seq-", "", CreateFlags::SEQUENTIAL);
        let r1 = create(&c, 2, sid, "/a/seq-", "", CreateFlags::SEQUENTIAL);
        assert_eq!(r0.znode_name, Some(Path::parse("/a/seq-0")));
        assert_eq!(r1.znode_name, Some(Path::parse("/a/seq-1")));
    }

    #[test]
    fn delete_root_is_refused() {
        let c = Coordinator::new(config());
        let sid = start_session(&c, 0);
        let reply = match c.apply(TimestampedRequest {
            timestamp: Timestamp(1),
            op: Op::Delete(DeleteArgs { session_id: sid, path: Path::parse("/"), version: 0 }),
        }) {
            Reply::Delete(r) => r,
            _ => unreachable!(),
        };
        assert_eq!(reply.err, Some(Error::DeleteRoot));
    }

    #[test]
    fn delete_wrong_version_fails_and_leaves_node_intact() {
        let c = Coordinator::new(config());
        let sid = start_session(&c, 0);
        create(&c, 1, sid, "/a", "", CreateFlags::NONE);

        let reply = match c.apply(TimestampedRequest {
            timestamp: Timestamp(2),
            op: Op::Delete(DeleteArgs { session_id: sid, path: Path::parse("/a"), version: 99 }),
        }) {
            Reply::Delete(r) => r,
            _ => unreachable!(),
        };
        assert_eq!(reply.err, Some(Error::Version));
        assert!(get_data(&c, 3, sid, "/a").err.is_none());
    }

    #[test]
    fn ops_from_unknown_session_are_rejected_without_mutation() {
        let c = Coordinator::new(config());
        let ghost = SessionId(9999);
        let reply = create(&c, 0, ghost, "/a", "", CreateFlags::NONE);
        assert_eq!(reply.err, Some(Error::SessionClosed));
        assert!(get_data(&c, 1, SessionId(0), "/a").err.is_some());
    }

    #[test]
    fn expired_session_is_reaped_lazily_on_next_apply() {
        let c = Coordinator::new(config());
        let sid = start_session(&c, 0); // expiry = 0 + timeout
        let timeout = config().session_timeout_micros();

        create(&c, 1, sid, "/a/ephemeral", "", CreateFlags::EPHEMERAL);

        // An apply from a different, fresh session well past the deadline
        // triggers the lazy reaper.
        let other = start_session(&c, timeout + 10);
        let reply = get_data(&c, timeout + 10, sid, "/a/ephemeral");
        assert_eq!(reply.err, Some(Error::SessionClosed));

        let check = get_data(&c, timeout + 11, other, "/a/ephemeral");
        assert_eq!(check.err, Some(Error::NoFile));
    }

    #[test]
    fn ephemeral_znode_is_deleted_on_session_expiry_and_fires_watch() {
        let c = Coordinator::new(config());
        let owner = start_session(&c, 0);
        let watcher = start_session(&c, 0);
        let timeout = config().session_timeout_micros();

        create(&c, 1, owner, "/a/x", "", CreateFlags::EPHEMERAL);

        let exists_watch = match c.apply(TimestampedRequest {
            timestamp: Timestamp(2),
            op: Op::Exists(ExistsArgs { session_id: watcher, path: Path::parse("/a/x"), watch: Watch::SET }),
        }) {
            Reply::Exists(r) => r,
            _ => unreachable!(),
        };
        assert!(exists_watch.result);
        let watch_id = exists_watch.watch_id.unwrap();

        // Any apply at or after the deadline reaps the expired owner.
        let _ = get_data(&c, timeout + 5, watcher, "/a/x");

        let fired = c.watch_wait(watcher, watch_id);
        assert_eq!(fired, Some(WatchEvent { kind: EventKind::NodeDeleted, path: Path::parse("/a/x") }));
    }

    #[test]
    fn watch_on_data_change_fires_once() {
        let c = Coordinator::new(config());
        let sid = start_session(&c, 0);
        create(&c, 1, sid, "/a/b", "init", CreateFlags::NONE);

        let watch_id = match c.apply(TimestampedRequest {
            timestamp: Timestamp(2),
            op: Op::GetData(GetDataArgs { session_id: sid, path: Path::parse("/a/b"), watch: Watch::SET }),
        }) {
            Reply::GetData(r) => r.watch_id.unwrap(),
            _ => unreachable!(),
        };

        c.apply(TimestampedRequest {
            timestamp: Timestamp(3),
            op: Op::SetData(SetDataArgs { session_id: sid, path: Path::parse("/a/b"), data: "r".into(), version: 1 }),
        });

        let event = c.watch_wait(sid, watch_id);
        assert_eq!(event, Some(WatchEvent { kind: EventKind::NodeDataChanged, path: Path::parse("/a/b") }));

        let got = get_data(&c, 4, sid, "/a/b");
        assert_eq!(got.data.as_deref(), Some("r"));
        assert_eq!(got.version, Some(2));
    }

    #[test]
    fn get_highest_sequence_on_root_returns_on_create() {
        let c = Coordinator::new(config());
        let sid = start_session(&c, 0);

        let reply = match c.apply(TimestampedRequest {
            timestamp: Timestamp(1),
            op: Op::GetHighestSequence(GetHighestSeqArgs { session_id: sid, path: Path::parse("/") }),
        }) {
            Reply::GetHighestSequence(r) => r,
            _ => unreachable!(),
        };
        assert_eq!(reply.seq_num, -1);
        assert_eq!(reply.err, Some(Error::OnCreate));
    }

    #[test]
    fn get_highest_sequence_returns_minus_one_when_parent_has_no_record() {
        let c = Coordinator::new(config());
        let sid = start_session(&c, 0);
        create(&c, 1, sid, "/a", "", CreateFlags::NONE);

        let reply = match c.apply(TimestampedRequest {
            timestamp: Timestamp(2),
            op: Op::GetHighestSequence(GetHighestSeqArgs { session_id: sid, path: Path::parse("/a/seq-") }),
        }) {
            Reply::GetHighestSequence(r) => r,
            _ => unreachable!(),
        };
        assert_eq!(reply.seq_num, -1);
        assert_eq!(reply.err, Some(Error::NoFile));
    }

    #[test]
    fn get_highest_sequence_tracks_per_session_high_water_mark() {
        let c = Coordinator::new(config());
        let sid = start_session(&c, 0);
        create(&c, 1, sid, "/a/seq-", "", CreateFlags::SEQUENTIAL);
        create(&c, 2, sid, "/a/seq-", "", CreateFlags::SEQUENTIAL);

        let reply = match c.apply(TimestampedRequest {
            timestamp: Timestamp(3),
            op: Op::GetHighestSequence(GetHighestSeqArgs { session_id: sid, path: Path::parse("/a/seq-") }),
        }) {
            Reply::GetHighestSequence(r) => r,
            _ => unreachable!(),
        };
        assert_eq!(reply.seq_num, 1);
        assert_eq!(reply.err, None);
    }

    #[test]
    fn two_replicas_applying_the_same_log_converge() {
        let a = Coordinator::new(config());
        let b = Coordinator::new(config());

        let requests = vec![
            TimestampedRequest { timestamp: Timestamp(0), op: Op::StartSession(StartSessionArgs) },
        ];
        let sid = match a.apply(requests[0].clone()) {
            Reply::StartSession(r) => r.session_id.unwrap(),
            _ => unreachable!(),
        };
        assert_eq!(b.apply(requests[0].clone()), Reply::StartSession(StartSessionReply { session_id: Some(sid), err: None }));

        let create_req = TimestampedRequest {
            timestamp: Timestamp(1),
            op: Op::Create(CreateArgs { session_id: sid, path: Path::parse("/a/b"), data: "x".into(), flags: CreateFlags::NONE }),
        };
        assert_eq!(a.apply(create_req.clone()), b.apply(create_req));
    }
}
