use tessel_dtype::DType;

use crate::snode::{SNode, SNodeKind};

#[test]
fn test_dense_accumulates_shape() {
    let mut root = SNode::root();
    let x = root.dense(&[4]).dense(&[8, 2]).place("x", DType::Float32);

    let node = root.find(x).unwrap();
    assert_eq!(node.shape(), &[4, 8, 2]);
    assert_eq!(node.num_active_indices(), 3);
    assert_eq!(node.num_elements(), 64);
    assert_eq!(node.dtype(), Some(DType::Float32));
    assert_eq!(node.name(), Some("x"));
}

#[test]
fn test_scalar_place_under_root() {
    let mut root = SNode::root();
    let s = root.place("s", DType::Int32);
    let node = root.find(s).unwrap();
    assert_eq!(node.num_active_indices(), 0);
    assert_eq!(node.num_elements(), 1);
}

#[test]
fn test_ids_are_unique() {
    let a = SNode::root();
    let b = SNode::root();
    assert_ne!(a.id(), b.id());
}

#[test]
fn test_places_depth_first() {
    let mut root = SNode::root();
    let dense = root.dense(&[2]);
    dense.place("a", DType::Int32);
    dense.place("b", DType::Float64);
    root.place("c", DType::Bool);

    let names: Vec<_> = root.places().iter().filter_map(|p| p.name()).collect();
    assert_eq!(names, ["a", "b", "c"]);
    assert!(matches!(root.children()[0].kind(), SNodeKind::Dense { .. }));
}

#[test]
fn test_dump_lists_every_node() {
    let mut root = SNode::root();
    root.dense(&[3]).place("x", DType::Int8);
    let dump = root.dump();
    assert_eq!(dump.lines().count(), 3);
    assert!(dump.contains("place x int8 [3]"));
}

#[test]
#[should_panic(expected = "cannot add children to place")]
fn test_place_is_a_leaf() {
    let mut root = SNode::root();
    root.place("x", DType::Int32);
    let mut leaf = root.children()[0].clone();
    leaf.dense(&[2]);
}

#[test]
#[should_panic(expected = "dense shape must be non-empty")]
fn test_zero_extent_rejected() {
    SNode::root().dense(&[0]);
}
