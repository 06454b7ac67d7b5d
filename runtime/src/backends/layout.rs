//! Struct-of-arrays storage layout for SNode trees.

use smallvec::SmallVec;
use tessel_dtype::DType;
use tessel_ir::{SNode, SNodeId};

#[derive(Debug, Clone, PartialEq)]
pub struct FieldLayout {
    pub snode: SNodeId,
    pub dtype: DType,
    pub shape: SmallVec<[usize; 4]>,
    /// Byte offset of the first element inside the tree's storage.
    pub offset: usize,
}

impl FieldLayout {
    /// Row-major byte offset of the element at `indices`, or `None` when out of bounds.
    pub fn element_offset(&self, indices: &[i64]) -> Option<usize> {
        if indices.len() != self.shape.len() {
            return None;
        }
        let mut linear = 0usize;
        for (&index, &extent) in indices.iter().zip(&self.shape) {
            let index = usize::try_from(index).ok().filter(|&i| i < extent)?;
            linear = linear * extent + index;
        }
        Some(self.offset + linear * self.dtype.bytes())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeLayout {
    pub fields: Vec<FieldLayout>,
    pub size: usize,
}

impl TreeLayout {
    /// Lay out every place of `root` back to back, each aligned to its element size.
    ///
    /// Returns `None` when the tree does not fit in the address space.
    pub fn compute(root: &SNode) -> Option<Self> {
        let mut offset = 0usize;
        let mut fields = Vec::new();
        for place in root.places() {
            let Some(dtype) = place.dtype() else { continue };
            offset = offset.checked_next_multiple_of(dtype.bytes().max(1))?;
            fields.push(FieldLayout { snode: place.id(), dtype, shape: SmallVec::from_slice(place.shape()), offset });
            offset = offset.checked_add(dtype.array_bytes(place.shape())?)?;
        }
        Some(Self { fields, size: offset })
    }

    pub fn field(&self, snode: SNodeId) -> Option<&FieldLayout> {
        self.fields.iter().find(|field| field.snode == snode)
    }
}
