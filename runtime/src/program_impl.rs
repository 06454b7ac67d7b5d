//! Boundary between a program and its backend.
//!
//! A [`ProgramImpl`] is chosen once per program from the target arch and owns
//! every device-specific concern: runtime setup, code generation, field
//! storage and raw allocation. The program never touches hardware directly.

use std::sync::Arc;

use snafu::ResultExt;
use tessel_device::{Device, DeviceAllocation, DevicePtr, ImageParams, MemoryPool};
use tessel_dtype::Arch;
use tessel_ir::{Block, ConstValue, SNodeId};

use crate::aot::AotModuleBuilder;
use crate::config::CompileConfig;
use crate::error::{DeviceSnafu, Result};
use crate::kernel::{FunctionType, Kernel};
use crate::result_buffer::ResultBuffer;
use crate::snode_tree::SNodeTree;

/// Per-launch state handed to a compiled kernel.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeContext<'a> {
    pub args: &'a [ConstValue],
    pub result_buffer: &'a ResultBuffer,
}

pub trait ProgramImpl: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    /// Prepare the backend runtime; allocations go through `pool` from here on.
    fn materialize_runtime(&mut self, pool: Arc<MemoryPool>) -> Result<()>;

    /// Turn lowered kernel IR into an invokable function.
    fn compile(&self, config: &CompileConfig, kernel: &Kernel, ir: &Block) -> Result<FunctionType>;

    /// Allocate storage for every field of `tree`.
    fn materialize_snode_tree(&mut self, tree: &SNodeTree) -> Result<()>;

    fn destroy_snode_tree(&mut self, tree: &SNodeTree) -> Result<()>;

    /// Byte offset of field `snode` inside tree `tree_id`'s storage.
    fn get_field_in_tree_offset(&self, tree_id: usize, snode: SNodeId) -> Option<usize>;

    fn get_snode_tree_device_ptr(&self, tree_id: usize) -> Option<DevicePtr>;

    /// Cells allocated on demand under `snode`; dense layouts never allocate dynamically.
    fn get_snode_num_dynamically_allocated(&self, _snode: SNodeId) -> usize {
        0
    }

    fn compute_device(&self) -> Option<Arc<dyn Device>>;

    fn graphics_device(&self) -> Option<Arc<dyn Device>> {
        None
    }

    fn allocate_memory_ndarray(&self, size: usize, zero_fill: bool) -> Result<DeviceAllocation>;

    fn release_memory_ndarray(&self, allocation: DeviceAllocation) -> Result<()>;

    fn allocate_texture(&self, params: &ImageParams) -> Result<DeviceAllocation>;

    fn release_texture(&self, allocation: DeviceAllocation) -> Result<()> {
        match self.graphics_device().or_else(|| self.compute_device()) {
            Some(device) => device.deallocate(allocation).context(DeviceSnafu),
            None => Ok(()),
        }
    }

    fn synchronize(&self) -> Result<()>;

    /// Report and clear the first fault recorded since the last check.
    fn check_runtime_error(&self) -> Result<()>;

    fn make_aot_module_builder(&self, arch: Arch, caps: &[String]) -> Result<Box<dyn AotModuleBuilder>>;

    fn finalize(&mut self) -> Result<()>;
}
