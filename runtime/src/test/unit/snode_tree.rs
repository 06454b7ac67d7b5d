use tessel_dtype::DType;
use tessel_ir::SNode;

use crate::snode_tree::SNodeTreeRegistry;

fn tree() -> SNode {
    let mut root = SNode::root();
    root.dense(&[4]).place("x", DType::Int32);
    root
}

#[test]
fn test_ids_grow_sequentially() {
    let mut registry = SNodeTreeRegistry::new();
    let ids: Vec<_> = (0..3).map(|_| registry.add(tree(), false).id()).collect();
    assert_eq!(ids, [0, 1, 2]);
    assert_eq!(registry.capacity(), 3);
    assert_eq!(registry.num_live(), 3);
}

#[test]
fn test_freed_ids_reused_most_recent_first() {
    let mut registry = SNodeTreeRegistry::new();
    for _ in 0..3 {
        registry.add(tree(), false);
    }
    registry.remove(0).unwrap();
    registry.remove(2).unwrap();

    assert_eq!(registry.add(tree(), false).id(), 2);
    assert_eq!(registry.add(tree(), false).id(), 0);
    assert_eq!(registry.add(tree(), false).id(), 3);
    assert_eq!(registry.capacity(), 4);
}

#[test]
fn test_remove_twice() {
    let mut registry = SNodeTreeRegistry::new();
    registry.add(tree(), false);
    assert!(registry.remove(0).is_some());
    assert!(registry.remove(0).is_none());
    assert!(registry.remove(7).is_none());
    assert!(registry.get(0).is_none());
    assert_eq!(registry.capacity(), 1);
}

#[test]
fn test_find_tree_of_place() {
    let mut registry = SNodeTreeRegistry::new();
    registry.add(tree(), false);

    let mut root = SNode::root();
    let y = root.dense(&[2, 2]).place("y", DType::Float32);
    registry.add(root, true);

    let owner = registry.find_tree_of(y).unwrap();
    assert_eq!(owner.id(), 1);
    assert!(owner.is_compile_only());

    registry.remove(1);
    assert!(registry.find_tree_of(y).is_none());
}

#[test]
fn test_drain_resets_id_space() {
    let mut registry = SNodeTreeRegistry::new();
    registry.add(tree(), false);
    registry.add(tree(), false);
    registry.remove(0);

    assert_eq!(registry.drain().len(), 1);
    assert_eq!(registry.capacity(), 0);
    assert_eq!(registry.allocate_id(), 0);
}
