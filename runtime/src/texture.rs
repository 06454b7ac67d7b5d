//! Backend-resident images owned by a program.
//!
//! Textures live as long as their program; there is no individual delete.

use tessel_device::{DeviceAllocation, ImageParams};

/// Index of a texture in its program's texture list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub(crate) usize);

#[derive(Debug)]
pub struct Texture {
    id: TextureId,
    params: ImageParams,
    allocation: DeviceAllocation,
}

impl Texture {
    pub(crate) fn new(id: TextureId, params: ImageParams, allocation: DeviceAllocation) -> Self {
        Self { id, params, allocation }
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn params(&self) -> &ImageParams {
        &self.params
    }

    pub fn allocation(&self) -> &DeviceAllocation {
        &self.allocation
    }
}
