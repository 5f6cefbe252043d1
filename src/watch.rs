//! Watch registry and fired-watch table.
//!
//! Four lists, one per event kind, each a mapping from path to an ordered
//! collection of pending registrations. Firing a (kind, path) pair removes
//! every pending registration there and produces fired-watch records ready
//! for the coordinator's fired-watch table.

use std::collections::HashMap;

use serde_derive::{Deserialize, Serialize};

use crate::path::Path;
use crate::session::SessionId;

/// Monotonically increasing 64-bit id, allocated deterministically inside
/// apply so every replica assigns the same id to the same logical
/// registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WatchId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    NodeCreated,
    NodeDeleted,
    NodeDataChanged,
    NodeChildrenChanged,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::NodeCreated => "NodeCreated",
            EventKind::NodeDeleted => "NodeDeleted",
            EventKind::NodeDataChanged => "NodeDataChanged",
            EventKind::NodeChildrenChanged => "NodeChildrenChanged",
        }
    }
}

/// The payload delivered to a client when a watch fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchEvent {
    pub kind: EventKind,
    pub path: Path,
}

/// Identifies one pending or fired registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Registration {
    pub session_id: SessionId,
    pub watch_id: WatchId,
}

/// The pending registrations for a single event kind, keyed by path.
#[derive(Debug, Default)]
struct WatchList {
    by_path: HashMap<Path, Vec<Registration>>,
}

impl WatchList {
    fn append(&mut self, path: Path, reg: Registration) {
        self.by_path.entry(path).or_default().push(reg);
    }

    /// Removes and returns every registration pending at `path`.
    fn fire(&mut self, path: &Path) -> Vec<Registration> {
        self.by_path.remove(path).unwrap_or_default()
    }

    fn discard_session(&mut self, session_id: SessionId) {
        for regs in self.by_path.values_mut() {
            regs.retain(|r| r.session_id != session_id);
        }
        self.by_path.retain(|_, regs| !regs.is_empty());
    }
}

/// The four watch lists plus watch-id allocation, owned by the coordinator.
#[derive(Debug, Default)]
pub struct WatchRegistry {
    created: WatchList,
    deleted: WatchList,
    data_changed: WatchList,
    children_changed: WatchList,
    next_watch_id: i64,
}

impl WatchRegistry {
    pub fn new() -> WatchRegistry {
        WatchRegistry::default()
    }

    /// Allocates the next watch id. Must be called from inside `apply` so
    /// every replica allocates in lockstep.
    pub fn next_id(&mut self) -> WatchId {
        let id = WatchId(self.next_watch_id);
        self.next_watch_id += 1;
        id
    }

    fn list_mut(&mut self, kind: EventKind) -> &mut WatchList {
        match kind {
            EventKind::NodeCreated => &mut self.created,
            EventKind::NodeDeleted => &mut self.deleted,
            EventKind::NodeDataChanged => &mut self.data_changed,
            EventKind::NodeChildrenChanged => &mut self.children_changed,
        }
    }

    pub fn append(&mut self, kind: EventKind, path: Path, reg: Registration) {
        self.list_mut(kind).append(path, reg);
    }

    /// Removes all registrations pending on `(kind, path)` and returns the
    /// events ready for insertion into the fired-watch table.
    pub fn fire(&mut self, kind: EventKind, path: &Path) -> Vec<(Registration, WatchEvent)> {
        self.list_mut(kind)
            .fire(path)
            .into_iter()
            .map(|reg| {
                (
                    reg,
                    WatchEvent {
                        kind,
                        path: path.clone(),
                    },
                )
            })
            .collect()
    }

    /// Removes every registration owned by `session_id`, across all four
    /// lists, used when a session ends or is reaped.
    pub fn discard_session(&mut self, session_id: SessionId) {
        self.created.discard_session(session_id);
        self.deleted.discard_session(session_id);
        self.data_changed.discard_session(session_id);
        self.children_changed.discard_session(session_id);
    }
}

/// Transient mapping from a fired registration to its event, awaiting a
/// `WatchWait` pickup by the owning client.
#[derive(Debug, Default)]
pub struct FiredWatchTable {
    fired: HashMap<Registration, WatchEvent>,
}

impl FiredWatchTable {
    pub fn new() -> FiredWatchTable {
        FiredWatchTable::default()
    }

    pub fn insert_all(&mut self, events: Vec<(Registration, WatchEvent)>) -> bool {
        let any = !events.is_empty();
        for (reg, event) in events {
            self.fired.insert(reg, event);
        }
        any
    }

    /// Removes and returns the event fired for `(session_id, watch_id)`, if any.
    pub fn take(&mut self, session_id: SessionId, watch_id: WatchId) -> Option<WatchEvent> {
        self.fired.remove(&Registration {
            session_id,
            watch_id,
        })
    }

    pub fn discard_session(&mut self, session_id: SessionId) {
        self.fired.retain(|reg, _| reg.session_id != session_id);
    }
}
