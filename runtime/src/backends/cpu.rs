//! Host backend.
//!
//! Fields live in host memory, one struct-of-arrays allocation per SNode tree.
//! Kernels are executed by interpreting their lowered IR.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use snafu::{OptionExt, ResultExt};
use tessel_device::{AllocParams, CpuDevice, Device, DeviceAllocation, DevicePtr, ImageParams, MemoryPool};
use tessel_dtype::Arch;
use tessel_ir::{Block, SNodeId};

use crate::aot::{AotModuleBuilder, CpuAotModuleBuilder};
use crate::backends::interpreter::{FieldBinding, Frame};
use crate::backends::layout::TreeLayout;
use crate::config::CompileConfig;
use crate::error::*;
use crate::kernel::{FunctionType, Kernel};
use crate::program_impl::{ProgramImpl, RuntimeContext};
use crate::snode_tree::SNodeTree;

#[derive(Debug)]
struct MaterializedTree {
    allocation: DeviceAllocation,
    layout: TreeLayout,
}

/// Storage of every materialized tree, shared with compiled kernels.
#[derive(Debug, Default)]
struct FieldTable {
    trees: HashMap<usize, MaterializedTree>,
}

impl FieldTable {
    fn binding(&self, snode: SNodeId) -> Option<FieldBinding> {
        self.trees.values().find_map(|tree| {
            let layout = tree.layout.field(snode)?.clone();
            Some(FieldBinding { allocation: tree.allocation, layout })
        })
    }
}

#[derive(Debug)]
pub struct CpuProgramImpl {
    arch: Arch,
    device: Arc<CpuDevice>,
    pool: Option<Arc<MemoryPool>>,
    fields: Arc<RwLock<FieldTable>>,
    runtime_error: Arc<Mutex<Option<String>>>,
}

impl CpuProgramImpl {
    pub fn new(config: &CompileConfig) -> Self {
        let device = match config.device_memory_limit() {
            Some(limit) => CpuDevice::with_limit(limit),
            None => CpuDevice::new(),
        };
        Self {
            arch: config.arch,
            device: Arc::new(device),
            pool: None,
            fields: Arc::default(),
            runtime_error: Arc::default(),
        }
    }

    fn pool(&self) -> Result<&Arc<MemoryPool>> {
        self.pool.as_ref().context(RuntimeSnafu { message: "runtime is not materialized" })
    }
}

impl ProgramImpl for CpuProgramImpl {
    fn name(&self) -> &str {
        "cpu"
    }

    fn materialize_runtime(&mut self, pool: Arc<MemoryPool>) -> Result<()> {
        tracing::debug!(arch = %self.arch, "materializing cpu runtime");
        self.pool = Some(pool);
        Ok(())
    }

    fn compile(&self, config: &CompileConfig, kernel: &Kernel, ir: &Block) -> Result<FunctionType> {
        let name = kernel.name().to_string();
        let ir = Arc::new(ir.clone());
        let device = Arc::clone(&self.device);
        let fields = Arc::clone(&self.fields);
        let runtime_error = Arc::clone(&self.runtime_error);
        let check_bounds = config.debug || config.check_out_of_bound;

        let function: FunctionType = Arc::new(move |ctx: &RuntimeContext<'_>| {
            let table = fields.read();
            let lookup = |snode| table.binding(snode);
            let frame = Frame { kernel: &name, device: device.as_ref(), field: &lookup };
            match frame.run(&ir, ctx) {
                // Bounds-checked kernels report violations like a device fault.
                Err(e @ Error::OutOfBounds { .. }) if check_bounds => {
                    tracing::debug!(kernel.name = %name, error = %e, "recorded runtime error");
                    let mut slot = runtime_error.lock();
                    if slot.is_none() {
                        *slot = Some(e.to_string());
                    }
                    Ok(())
                }
                result => result,
            }
        });
        Ok(function)
    }

    fn materialize_snode_tree(&mut self, tree: &SNodeTree) -> Result<()> {
        let layout = TreeLayout::compute(tree.root())
            .with_context(|| SizeOverflowSnafu { what: format!("snode tree {}", tree.id()) })?;
        let params = AllocParams { size: layout.size, host_read: true, host_write: true, zero_init: true };
        let allocation = self.pool()?.allocate(&params).context(DeviceSnafu)?;
        tracing::debug!(
            tree.id = tree.id(),
            tree.size = layout.size,
            fields = layout.fields.len(),
            "materialized snode tree"
        );
        self.fields.write().trees.insert(tree.id(), MaterializedTree { allocation, layout });
        Ok(())
    }

    fn destroy_snode_tree(&mut self, tree: &SNodeTree) -> Result<()> {
        let Some(materialized) = self.fields.write().trees.remove(&tree.id()) else {
            return Ok(());
        };
        self.pool()?.release(materialized.allocation).context(DeviceSnafu)
    }

    fn get_field_in_tree_offset(&self, tree_id: usize, snode: SNodeId) -> Option<usize> {
        Some(self.fields.read().trees.get(&tree_id)?.layout.field(snode)?.offset)
    }

    fn get_snode_tree_device_ptr(&self, tree_id: usize) -> Option<DevicePtr> {
        Some(self.fields.read().trees.get(&tree_id)?.allocation.ptr(0))
    }

    fn compute_device(&self) -> Option<Arc<dyn Device>> {
        Some(self.device.clone() as Arc<dyn Device>)
    }

    fn allocate_memory_ndarray(&self, size: usize, zero_fill: bool) -> Result<DeviceAllocation> {
        let params = AllocParams { size, host_read: true, host_write: true, zero_init: zero_fill };
        self.pool()?.allocate(&params).context(DeviceSnafu)
    }

    fn release_memory_ndarray(&self, allocation: DeviceAllocation) -> Result<()> {
        self.pool()?.release(allocation).context(DeviceSnafu)
    }

    fn allocate_texture(&self, params: &ImageParams) -> Result<DeviceAllocation> {
        self.device.create_image(params).context(DeviceSnafu)
    }

    fn synchronize(&self) -> Result<()> {
        self.device.synchronize().context(DeviceSnafu)
    }

    fn check_runtime_error(&self) -> Result<()> {
        match self.runtime_error.lock().take() {
            Some(message) => RuntimeSnafu { message }.fail(),
            None => Ok(()),
        }
    }

    fn make_aot_module_builder(&self, arch: Arch, caps: &[String]) -> Result<Box<dyn AotModuleBuilder>> {
        snafu::ensure!(
            arch.is_cpu(),
            UnsupportedSnafu { backend: self.name(), operation: format!("AOT modules for {arch}") }
        );
        Ok(Box::new(CpuAotModuleBuilder::new(arch, caps)))
    }

    fn finalize(&mut self) -> Result<()> {
        let leftover: Vec<_> = self.fields.write().trees.drain().map(|(_, tree)| tree.allocation).collect();
        if let Ok(pool) = self.pool() {
            for allocation in leftover {
                pool.release(allocation).context(DeviceSnafu)?;
            }
        }
        self.pool = None;
        Ok(())
    }
}
