//! SNode layout trees.
//!
//! An SNode tree describes how fields are laid out in memory. The root anchors
//! one independently allocatable region; `Dense` nodes add axes and `Place`
//! leaves are the actual scalar fields.
//!
//! ```ignore
//! let mut root = SNode::root();
//! let x = root.dense(&[16]).place("x", DType::Float32);
//! ```

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;
use tessel_dtype::DType;

static NEXT_SNODE_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique identity of an SNode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SNodeId(pub u64);

impl SNodeId {
    fn next() -> Self {
        Self(NEXT_SNODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for SNodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "S{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SNodeKind {
    Root,
    Dense { shape: SmallVec<[usize; 4]> },
    Place { dtype: DType },
}

#[derive(Debug, Clone)]
pub struct SNode {
    id: SNodeId,
    kind: SNodeKind,
    name: Option<String>,
    /// Accumulated shape of all dense ancestors (including self).
    shape: SmallVec<[usize; 4]>,
    children: Vec<SNode>,
}

impl SNode {
    pub fn root() -> Self {
        Self { id: SNodeId::next(), kind: SNodeKind::Root, name: None, shape: SmallVec::new(), children: Vec::new() }
    }

    /// Append a dense child adding `shape` as new axes.
    ///
    /// # Panics
    ///
    /// Panics when called on a `Place` leaf or with an empty/zero-sized shape.
    pub fn dense(&mut self, shape: &[usize]) -> &mut SNode {
        assert!(!self.is_place(), "cannot add children to place {}", self.id);
        assert!(!shape.is_empty() && shape.iter().all(|&n| n > 0), "dense shape must be non-empty: {shape:?}");

        let mut accumulated = self.shape.clone();
        accumulated.extend_from_slice(shape);
        self.children.push(Self {
            id: SNodeId::next(),
            kind: SNodeKind::Dense { shape: SmallVec::from_slice(shape) },
            name: None,
            shape: accumulated,
            children: Vec::new(),
        });
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// Place a scalar field under this node and return its id.
    ///
    /// # Panics
    ///
    /// Panics when called on a `Place` leaf or with a void dtype.
    pub fn place(&mut self, name: impl Into<String>, dtype: DType) -> SNodeId {
        assert!(!self.is_place(), "cannot add children to place {}", self.id);
        assert!(!dtype.is_void(), "cannot place a void field");

        let id = SNodeId::next();
        self.children.push(Self {
            id,
            kind: SNodeKind::Place { dtype },
            name: Some(name.into()),
            shape: self.shape.clone(),
            children: Vec::new(),
        });
        id
    }

    pub fn id(&self) -> SNodeId {
        self.id
    }

    pub fn kind(&self) -> &SNodeKind {
        &self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn children(&self) -> &[SNode] {
        &self.children
    }

    pub fn is_place(&self) -> bool {
        matches!(self.kind, SNodeKind::Place { .. })
    }

    /// Field dtype for `Place` leaves.
    pub fn dtype(&self) -> Option<DType> {
        match self.kind {
            SNodeKind::Place { dtype } => Some(dtype),
            _ => None,
        }
    }

    /// Number of indices needed to address one element.
    pub fn num_active_indices(&self) -> usize {
        self.shape.len()
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of elements addressed by this node's axes.
    pub fn num_elements(&self) -> usize {
        self.shape.iter().product()
    }

    /// Depth-first search for a node by id.
    pub fn find(&self, id: SNodeId) -> Option<&SNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// All `Place` leaves in depth-first order.
    pub fn places(&self) -> Vec<&SNode> {
        let mut out = Vec::new();
        self.collect_places(&mut out);
        out
    }

    fn collect_places<'a>(&'a self, out: &mut Vec<&'a SNode>) {
        if self.is_place() {
            out.push(self);
        }
        for child in &self.children {
            child.collect_places(out);
        }
    }

    /// Indented textual layout, one node per line.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_into(&mut out, 0);
        out
    }

    fn dump_into(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        let _ = match &self.kind {
            SNodeKind::Root => writeln!(out, "{indent}{} root", self.id),
            SNodeKind::Dense { shape } => writeln!(out, "{indent}{} dense {shape:?}", self.id),
            SNodeKind::Place { dtype } => {
                let name = self.name.as_deref().unwrap_or("_");
                writeln!(out, "{indent}{} place {name} {dtype} {:?}", self.id, self.shape)
            }
        };
        for child in &self.children {
            child.dump_into(out, depth + 1);
        }
    }
}
