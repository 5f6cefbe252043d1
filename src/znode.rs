//! The in-memory namespace tree.
//!
//! Accessed only from inside the coordinator's `apply`, under its single
//! exclusive lock — there is no internal locking here.

use std::collections::HashMap;

use crate::error::Error;
use crate::session::SessionId;

/// A node in the hierarchical namespace.
#[derive(Debug, Clone)]
pub struct ZNode {
    pub name: String,
    pub data: String,
    pub version: i64,
    /// Sorted lexicographically by `name`.
    children: Vec<ZNode>,
    pub creator_session: SessionId,
    /// child-name-prefix -> next sequence number to hand out.
    seq_counters: HashMap<String, i64>,
    /// (session, child-name-prefix) -> highest sequence number handed to
    /// that session under that prefix.
    seq_high_water: HashMap<(SessionId, String), i64>,
}

/// Outcome of `add_child`: either the new node was created, or a
/// non-sequential create collided with an existing child.
pub enum AddChildResult<'a> {
    Created(&'a ZNode),
    AlreadyExists(&'a ZNode),
}

impl ZNode {
    /// Builds a bare node with no children, version 1, owned by `creator`.
    pub fn new(name: impl Into<String>, data: impl Into<String>, creator: SessionId) -> ZNode {
        ZNode {
            name: name.into(),
            data: data.into(),
            version: 1,
            children: Vec::new(),
            creator_session: creator,
            seq_counters: HashMap::new(),
            seq_high_water: HashMap::new(),
        }
    }

    /// Builds the permanent root node. Never deleted, owned by no session.
    pub fn root() -> ZNode {
        ZNode::new("", "", SessionId(-1))
    }

    pub fn children(&self) -> &[ZNode] {
        &self.children
    }

    /// Binary search over sorted children by name.
    pub fn find_child(&self, name: &str) -> (Option<&ZNode>, usize) {
        match self.children.binary_search_by(|c| c.name.as_str().cmp(name)) {
            Ok(idx) => (Some(&self.children[idx]), idx),
            Err(idx) => (None, idx),
        }
    }

    fn find_child_mut(&mut self, name: &str) -> (Option<usize>, usize) {
        match self.children.binary_search_by(|c| c.name.as_str().cmp(name)) {
            Ok(idx) => (Some(idx), idx),
            Err(idx) => (None, idx),
        }
    }

    /// Traverses the tree rooted at `self`, returning the node at `path`
    /// if the full path resolves, `None` otherwise. `path[0]` must equal
    /// this node's name (the empty root segment).
    pub fn lookup(&self, path: &[String]) -> Option<&ZNode> {
        match self.lookup_prefix(path) {
            (node, None) => Some(node),
            (_, Some(_)) => None,
        }
    }

    /// Traverses as far as `path` resolves. Returns the deepest matching
    /// node and, if the match is partial, the index of the first segment
    /// that was not found. A `None` index means a full match.
    pub fn lookup_prefix(&self, path: &[String]) -> (&ZNode, Option<usize>) {
        if path.is_empty() || path[0] != self.name {
            return (self, Some(0));
        }

        let mut node = self;
        for i in 1..path.len() {
            match node.find_child(&path[i]) {
                (Some(child), _) => node = child,
                (None, _) => return (node, Some(i)),
            }
        }
        (node, None)
    }

    /// Mutable counterpart of `lookup`, for use by mutators that need to
    /// reach a parent node to modify its children.
    pub fn lookup_mut(&mut self, path: &[String]) -> Option<&mut ZNode> {
        if path.is_empty() || path[0] != self.name {
            return None;
        }
        let mut node = self;
        for segment in &path[1..] {
            let (idx, _) = node.find_child_mut(segment);
            node = &mut node.children[idx?];
        }
        Some(node)
    }

    /// Adds a child under `self`. If `sequential`, allocates and appends a
    /// monotonic suffix to `name` first, recording the high-water mark for
    /// `(creator, name)`. Returns the new or pre-existing child.
    ///
    /// Sequential creates never collide (the allocated suffix is unique);
    /// a non-sequential create against an existing name returns the
    /// existing node instead of creating a duplicate.
    pub fn add_child(
        &mut self,
        name: &str,
        data: &str,
        sequential: bool,
        creator: SessionId,
    ) -> AddChildResult<'_> {
        let child_name = if sequential {
            let seq = *self.seq_counters.get(name).unwrap_or(&0);
            self.seq_counters.insert(name.to_string(), seq + 1);
            self.seq_high_water
                .insert((creator, name.to_string()), seq);
            format!("{}{}", name, seq)
        } else {
            name.to_string()
        };

        let (existing, idx) = self.find_child_mut(&child_name);
        if let Some(idx) = existing {
            return AddChildResult::AlreadyExists(&self.children[idx]);
        }

        self.children
            .insert(idx, ZNode::new(child_name, data, creator));
        AddChildResult::Created(&self.children[idx])
    }

    /// Removes the named child if present. If `check_version`, fails with
    /// `Error::Version` unless the child's version matches `expected`;
    /// otherwise removes unconditionally (used for ephemeral cleanup).
    pub fn remove_child(
        &mut self,
        name: &str,
        expected_version: i64,
        check_version: bool,
    ) -> Result<(), Error> {
        let (idx, _) = self.find_child_mut(name);
        let idx = match idx {
            Some(idx) => idx,
            None => return Err(Error::NoFile),
        };

        if check_version && self.children[idx].version != expected_version {
            return Err(Error::Version);
        }

        self.children.remove(idx);
        Ok(())
    }

    /// The highest sequence number ever handed to `session` under `prefix`,
    /// or `None` if this parent never created one for that session.
    pub fn highest_sequence(&self, session: SessionId, prefix: &str) -> Option<i64> {
        self.seq_high_water
            .get(&(session, prefix.to_string()))
            .copied()
    }
}
