//! Backend-resident arrays owned by a program.

use smallvec::SmallVec;
use tessel_device::DeviceAllocation;
use tessel_dtype::DType;

/// Opaque ndarray handle, unique within its program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NdarrayId(pub(crate) u64);

impl std::fmt::Display for NdarrayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Placement of element channels relative to the array axes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, strum::Display)]
pub enum NdarrayLayout {
    /// Channels innermost.
    #[default]
    Aos,
    /// Channels outermost.
    Soa,
}

#[derive(Debug)]
pub struct Ndarray {
    id: NdarrayId,
    dtype: DType,
    shape: SmallVec<[usize; 4]>,
    layout: NdarrayLayout,
    allocation: DeviceAllocation,
}

impl Ndarray {
    pub(crate) fn new(
        id: NdarrayId,
        dtype: DType,
        shape: &[usize],
        layout: NdarrayLayout,
        allocation: DeviceAllocation,
    ) -> Self {
        Self { id, dtype, shape: SmallVec::from_slice(shape), layout, allocation }
    }

    pub fn id(&self) -> NdarrayId {
        self.id
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn layout(&self) -> NdarrayLayout {
        self.layout
    }

    pub fn num_elements(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn size_in_bytes(&self) -> usize {
        self.num_elements() * self.dtype.bytes()
    }

    pub fn allocation(&self) -> &DeviceAllocation {
        &self.allocation
    }
}
