pub mod backend;
pub mod program;
pub mod snode_tree;
