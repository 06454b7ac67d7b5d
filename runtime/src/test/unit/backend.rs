use std::sync::Arc;

use tessel_device::{Device, DeviceAllocation, DevicePtr, ImageParams, MemoryPool};
use tessel_dtype::{Arch, DType};
use tessel_ir::{Block, ConstValue, SNodeId};

use crate::aot::AotModuleBuilder;
use crate::backends::{BackendRegistry, CpuProgramImpl};
use crate::config::CompileConfig;
use crate::error::{CompilationSnafu, Error, Result};
use crate::kernel::{AutodiffMode, FunctionType, Kernel};
use crate::program::Program;
use crate::program_impl::ProgramImpl;
use crate::snode_tree::SNodeTree;

/// Host backend that refuses to compile anything.
#[derive(Debug)]
struct RejectingBackend(CpuProgramImpl);

impl ProgramImpl for RejectingBackend {
    fn name(&self) -> &str {
        "rejecting"
    }

    fn materialize_runtime(&mut self, pool: Arc<MemoryPool>) -> Result<()> {
        self.0.materialize_runtime(pool)
    }

    fn compile(&self, _config: &CompileConfig, kernel: &Kernel, _ir: &Block) -> Result<FunctionType> {
        CompilationSnafu { kernel: kernel.name(), reason: "rejected" }.fail()
    }

    fn materialize_snode_tree(&mut self, tree: &SNodeTree) -> Result<()> {
        self.0.materialize_snode_tree(tree)
    }

    fn destroy_snode_tree(&mut self, tree: &SNodeTree) -> Result<()> {
        self.0.destroy_snode_tree(tree)
    }

    fn get_field_in_tree_offset(&self, tree_id: usize, snode: SNodeId) -> Option<usize> {
        self.0.get_field_in_tree_offset(tree_id, snode)
    }

    fn get_snode_tree_device_ptr(&self, tree_id: usize) -> Option<DevicePtr> {
        self.0.get_snode_tree_device_ptr(tree_id)
    }

    fn compute_device(&self) -> Option<Arc<dyn Device>> {
        self.0.compute_device()
    }

    fn allocate_memory_ndarray(&self, size: usize, zero_fill: bool) -> Result<DeviceAllocation> {
        self.0.allocate_memory_ndarray(size, zero_fill)
    }

    fn release_memory_ndarray(&self, allocation: DeviceAllocation) -> Result<()> {
        self.0.release_memory_ndarray(allocation)
    }

    fn allocate_texture(&self, params: &ImageParams) -> Result<DeviceAllocation> {
        self.0.allocate_texture(params)
    }

    fn synchronize(&self) -> Result<()> {
        self.0.synchronize()
    }

    fn check_runtime_error(&self) -> Result<()> {
        self.0.check_runtime_error()
    }

    fn make_aot_module_builder(&self, arch: Arch, caps: &[String]) -> Result<Box<dyn AotModuleBuilder>> {
        self.0.make_aot_module_builder(arch, caps)
    }

    fn finalize(&mut self) -> Result<()> {
        self.0.finalize()
    }
}

fn rejecting_program() -> Program {
    let config = CompileConfig::default();
    let backend = RejectingBackend(CpuProgramImpl::new(&config));
    Program::with_backend(config, Box::new(backend)).unwrap()
}

#[test]
fn test_compile_failure_propagates() {
    let mut program = rejecting_program();
    let kernel = program.kernel(
        |b| {
            let c = b.const_(ConstValue::Int(1), DType::Int32);
            b.ret(c);
        },
        "k",
        AutodiffMode::None,
    );

    let err = program.launch_kernel(&kernel, &[]).unwrap_err();
    assert!(matches!(err, Error::Compilation { ref kernel, .. } if kernel == "k"), "{err}");
    assert!(!kernel.is_compiled());
}

#[test]
fn test_evaluator_compile_failure_is_not_cached() {
    let program = rejecting_program();
    let (one, two) = (ConstValue::Int(1), ConstValue::Int(2));
    let err = program
        .evaluate_binary(tessel_ir::BinaryOp::Add, one, DType::Int32, two, DType::Int32, DType::Int32)
        .unwrap_err();
    assert!(matches!(err, Error::Compilation { .. }), "{err}");
    assert!(program.evaluator_cache().is_empty());
}

#[test]
#[should_panic(expected = "is not an LLVM-backed arch")]
fn test_llvm_program_impl_on_graphics_arch() {
    let config = CompileConfig::builder().arch(Arch::Vulkan).build();
    let backend = CpuProgramImpl::new(&config);
    let program = Program::with_backend(config, Box::new(backend)).unwrap();
    program.llvm_program_impl();
}

#[test]
fn test_registry_falls_back_to_host() {
    let registry = BackendRegistry::new();
    assert!(registry.supports(Arch::host()));
    assert!(!registry.supports(Arch::Cuda));
    assert_eq!(registry.resolve_arch(Arch::Cuda), Arch::host());
    assert_eq!(registry.resolve_arch(Arch::X64), Arch::X64);
}

#[test]
fn test_registry_custom_factory() {
    fn host_backend(config: &CompileConfig) -> Result<Box<dyn ProgramImpl>> {
        Ok(Box::new(CpuProgramImpl::new(config)))
    }

    let registry = BackendRegistry::new();
    registry.register_factory(Arch::Cuda, Arc::new(host_backend));
    assert!(registry.supports(Arch::Cuda));

    let cuda = CompileConfig::builder().arch(Arch::Cuda).build();
    assert_eq!(registry.create(&cuda).unwrap().name(), "cpu");

    let metal = CompileConfig::builder().arch(Arch::Metal).build();
    let err = registry.create(&metal).unwrap_err();
    assert!(matches!(err, Error::UnsupportedArch { arch: Arch::Metal }), "{err}");
}
