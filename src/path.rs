//! A persistent, cheaply-cloneable response path.
//!
//! Every in-flight field execution carries one of these; children extend
//! their parent's path with `Arc` sharing rather than copying the whole
//! chain, as a persistent singly-linked list.

use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    Field { name: String, parent_type: String },
    Index(usize),
}

struct PathNode {
    parent: Path,
    segment: PathSegment,
}

#[derive(Debug, Clone, Default)]
pub struct Path(Option<Arc<PathNode>>);

/// One path element as reported to the client: a response key or a list index.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum PathValue {
    Key(String),
    Index(usize),
}

impl Path {
    pub fn new() -> Self {
        Path(None)
    }

    pub fn push_field(&self, name: impl Into<String>, parent_type: impl Into<String>) -> Path {
        Path(Some(Arc::new(PathNode {
            parent: self.clone(),
            segment: PathSegment::Field {
                name: name.into(),
                parent_type: parent_type.into(),
            },
        })))
    }

    pub fn push_index(&self, index: usize) -> Path {
        Path(Some(Arc::new(PathNode {
            parent: self.clone(),
            segment: PathSegment::Index(index),
        })))
    }

    /// The deepest field name on this path, if any (used for "Cannot return
    /// null for non-nullable field Parent.field" style messages).
    pub fn last_field(&self) -> Option<(&str, &str)> {
        let mut cur = self;
        loop {
            match &cur.0 {
                None => return None,
                Some(node) => match &node.segment {
                    PathSegment::Field { name, parent_type } => {
                        return Some((name.as_str(), parent_type.as_str()))
                    }
                    PathSegment::Index(_) => cur = &node.parent,
                },
            }
        }
    }

    pub fn to_vec(&self) -> Vec<PathValue> {
        let mut segments = Vec::new();
        let mut cur = self;
        while let Some(node) = &cur.0 {
            segments.push(match &node.segment {
                PathSegment::Field { name, .. } => PathValue::Key(name.clone()),
                PathSegment::Index(i) => PathValue::Index(*i),
            });
            cur = &node.parent;
        }
        segments.reverse();
        segments
    }

    pub fn is_root(&self) -> bool {
        self.0.is_none()
    }

    /// Whether the last-pushed segment is a list index — i.e. this path
    /// names an element of a list. Used to decide that an inner list
    /// (one nested inside another) never streams.
    pub fn is_list_item(&self) -> bool {
        matches!(
            self.0.as_deref().map(|node| &node.segment),
            Some(PathSegment::Index(_))
        )
    }
}
