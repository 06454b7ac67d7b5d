//! Registry of live SNode trees.
//!
//! Tree ids are small dense integers. Destroyed ids go onto a free stack and
//! are handed out again, most recently freed first, before the id space grows.

use tessel_ir::{SNode, SNodeId};

/// An SNode layout tree owned by a program.
#[derive(Debug)]
pub struct SNodeTree {
    id: usize,
    root: SNode,
    compile_only: bool,
}

impl SNodeTree {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn root(&self) -> &SNode {
        &self.root
    }

    /// Layout only; no backend memory backs this tree.
    pub fn is_compile_only(&self) -> bool {
        self.compile_only
    }

    pub fn contains(&self, snode: SNodeId) -> bool {
        self.root.find(snode).is_some()
    }
}

#[derive(Debug, Default)]
pub struct SNodeTreeRegistry {
    trees: Vec<Option<SNodeTree>>,
    free_ids: Vec<usize>,
}

impl SNodeTreeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve an id: the most recently freed one, else the next sequential id.
    pub fn allocate_id(&mut self) -> usize {
        if let Some(id) = self.free_ids.pop() {
            return id;
        }
        self.trees.push(None);
        self.trees.len() - 1
    }

    /// Register `root` under a freshly allocated id.
    pub fn add(&mut self, root: SNode, compile_only: bool) -> &SNodeTree {
        let id = self.allocate_id();
        self.trees[id].insert(SNodeTree { id, root, compile_only })
    }

    /// Remove the tree and make its id reusable.
    pub fn remove(&mut self, id: usize) -> Option<SNodeTree> {
        let tree = self.trees.get_mut(id)?.take()?;
        self.free_ids.push(id);
        Some(tree)
    }

    pub fn get(&self, id: usize) -> Option<&SNodeTree> {
        self.trees.get(id)?.as_ref()
    }

    /// Live tree containing `snode`.
    pub fn find_tree_of(&self, snode: SNodeId) -> Option<&SNodeTree> {
        self.iter().find(|tree| tree.contains(snode))
    }

    pub fn iter(&self) -> impl Iterator<Item = &SNodeTree> {
        self.trees.iter().flatten()
    }

    /// Size of the id space (live and freed slots).
    pub fn capacity(&self) -> usize {
        self.trees.len()
    }

    pub fn num_live(&self) -> usize {
        self.iter().count()
    }

    pub(crate) fn drain(&mut self) -> Vec<SNodeTree> {
        self.free_ids.clear();
        self.trees.drain(..).flatten().collect()
    }
}
