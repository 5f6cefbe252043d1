//! Unix-style slash-delimited paths over the znode namespace.
//!
//! `Path::parse("/a/b")` yields the segments `["", "a", "b"]` — the empty
//! leading segment denotes the root, matching `ParsePath` in the original
//! Go source (`panapi/rpc/rpc.go`).

use std::fmt;

use serde_derive::{Deserialize, Serialize};

/// A parsed, absolute znode path, exploded into its slash-separated segments.
///
/// The first segment is always the empty string, standing for the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    /// Parses an absolute path of the form `/a/b/c`. A lone trailing slash
    /// (including the root path `/` itself) collapses away rather than
    /// leaving a spurious empty final segment, so `parse("/")` yields the
    /// single-segment root `[""]` and `is_root` holds for it.
    pub fn parse(path: &str) -> Path {
        let mut segments: Vec<String> = path.split('/').map(|s| s.to_string()).collect();
        if segments.len() > 1 && segments.last().map_or(false, String::is_empty) {
            segments.pop();
        }
        Path { segments }
    }

    /// The root path `/`.
    pub fn root() -> Path {
        Path::parse("/")
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.len() <= 1
    }

    /// The final path segment (the znode's own name).
    pub fn suffix(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    /// The path segments of the parent, or `None` if this path is the root.
    pub fn parent_segments(&self) -> Option<&[String]> {
        if self.is_root() {
            None
        } else {
            Some(&self.segments[..self.segments.len() - 1])
        }
    }

    /// Builds a path by joining segments with `/`, mirroring `MakePpath`.
    pub fn from_segments(segments: &[String]) -> Path {
        Path {
            segments: segments.to_vec(),
        }
    }

    /// Appends a segment and returns the extended path, mirroring `Ppath.Add`.
    pub fn join(&self, segment: &str) -> Path {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Path { segments }
    }

    /// Returns the trailing run of decimal digits in the final segment as an
    /// integer, or `0` if the final segment has no numeric suffix.
    pub fn seq_number(&self) -> i64 {
        let suffix = self.suffix();
        let digit_start = suffix
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_ascii_digit())
            .last()
            .map(|(i, _)| i);

        match digit_start {
            Some(start) => suffix[start..].parse().unwrap_or(0),
            None => 0,
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Path {
        Path::parse(s)
    }
}

impl From<String> for Path {
    fn from(s: String) -> Path {
        Path::parse(&s)
    }
}
