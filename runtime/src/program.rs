//! The program execution context.
//!
//! A [`Program`] owns everything needed to compile and run kernels for one
//! target arch: the per-thread config overlay, SNode trees, kernels and
//! functions, the JIT evaluator cache, ndarrays and textures, the memory pool,
//! the kernel profiler and the backend.
//!
//! # Thread Safety
//!
//! Only the config overlay and the evaluator cache are locked; they, together
//! with compilation and launching, are reachable through `&self` and may be
//! used from many threads at once. Every other mutation takes `&mut self`, so
//! callers serialize it by construction.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use smallvec::SmallVec;
use snafu::{OptionExt, ResultExt, ensure};
use tessel_device::{Device, DeviceAllocation, DevicePtr, ImageParams, MemoryPool};
use tessel_dtype::{Arch, DType};
use tessel_ir::passes::{eliminate_dead_code, verify};
use tessel_ir::{BinaryOp, Block, ConstValue, SNode, SNodeId, ScalarOp, UnaryOp};

use crate::aot::AotModuleBuilder;
use crate::backends::BACKENDS;
use crate::config::{CompileConfig, ConfigOverlay};
use crate::error::*;
use crate::function::{Function, FunctionKey};
use crate::jit_evaluator::{JitEvaluatorCache, JitEvaluatorId};
use crate::kernel::{AutodiffMode, FunctionType, Kernel, KernelBuilder};
use crate::ndarray::{Ndarray, NdarrayId, NdarrayLayout};
use crate::profiler::{HostKernelProfiler, KernelProfileStats, KernelProfiler};
use crate::program_impl::{ProgramImpl, RuntimeContext};
use crate::result_buffer::{MAX_RESULT_SLOTS, ResultBuffer, ResultValue};
use crate::snode_tree::{SNodeTree, SNodeTreeRegistry};
use crate::texture::{Texture, TextureId};

static NUM_INSTANCES: AtomicUsize = AtomicUsize::new(0);

/// Cached single-element accessor kernels of one place.
#[derive(Debug, Default)]
struct SNodeAccessors {
    reader: Option<Arc<Kernel>>,
    writer: Option<Arc<Kernel>>,
}

pub struct Program {
    arch: Arch,
    configs: ConfigOverlay,
    program_impl: Box<dyn ProgramImpl>,
    memory_pool: Arc<MemoryPool>,
    profiler: Mutex<Box<dyn KernelProfiler>>,
    result_buffer: ResultBuffer,

    snode_trees: SNodeTreeRegistry,
    accessors: HashMap<SNodeId, SNodeAccessors>,
    kernels: Vec<Arc<Kernel>>,
    functions: HashMap<FunctionKey, Arc<Function>>,
    evaluators: JitEvaluatorCache,
    ndarrays: HashMap<NdarrayId, Ndarray>,
    next_ndarray_id: u64,
    textures: Vec<Texture>,

    kernel_id_counter: AtomicU64,
    global_id_counter: AtomicU64,
    total_compilation_time: Mutex<Duration>,
    finalized: bool,
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("arch", &self.arch)
            .field("backend", &self.program_impl.name())
            .field("snode_trees", &self.snode_trees.num_live())
            .field("kernels", &self.kernels.len())
            .field("ndarrays", &self.ndarrays.len())
            .field("textures", &self.textures.len())
            .field("finalized", &self.finalized)
            .finish()
    }
}

impl Program {
    /// Create a program for `arch` with the remaining settings taken from the environment.
    ///
    /// Falls back to the host arch when no backend serves `arch`.
    pub fn new(arch: Arch) -> Result<Self> {
        Self::with_config(CompileConfig { arch, ..CompileConfig::from_env() })
    }

    pub fn with_config(mut config: CompileConfig) -> Result<Self> {
        config.arch = BACKENDS.resolve_arch(config.arch);
        let backend = BACKENDS.create(&config)?;
        Self::with_backend(config, backend)
    }

    /// Create a program driving a caller-provided backend for `config.arch`.
    pub fn with_backend(config: CompileConfig, mut program_impl: Box<dyn ProgramImpl>) -> Result<Self> {
        let Some(device) = program_impl.compute_device() else {
            return UnsupportedSnafu { backend: program_impl.name(), operation: "compute devices" }.fail();
        };
        let memory_pool = Arc::new(MemoryPool::new(device));
        program_impl.materialize_runtime(Arc::clone(&memory_pool))?;

        NUM_INSTANCES.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(arch = %config.arch, backend = program_impl.name(), "program created");

        Ok(Self {
            arch: config.arch,
            configs: ConfigOverlay::new(config),
            program_impl,
            memory_pool,
            profiler: Mutex::new(Box::new(HostKernelProfiler::new())),
            result_buffer: ResultBuffer::new(),
            snode_trees: SNodeTreeRegistry::new(),
            accessors: HashMap::new(),
            kernels: Vec::new(),
            functions: HashMap::new(),
            evaluators: JitEvaluatorCache::new(),
            ndarrays: HashMap::new(),
            next_ndarray_id: 0,
            textures: Vec::new(),
            kernel_id_counter: AtomicU64::new(0),
            global_id_counter: AtomicU64::new(0),
            total_compilation_time: Mutex::new(Duration::ZERO),
            finalized: false,
        })
    }

    /// Number of programs alive in this process.
    pub fn num_instances() -> usize {
        NUM_INSTANCES.load(Ordering::SeqCst)
    }

    pub fn arch(&self) -> Arch {
        self.arch
    }

    // ------------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------------

    /// Snapshot of the calling thread's config, seeding it from the main config on first use.
    pub fn this_thread_config(&self) -> CompileConfig {
        self.configs.this_thread()
    }

    /// Change the calling thread's config. `f` must not call back into the program.
    pub fn update_this_thread_config<R>(&self, f: impl FnOnce(&mut CompileConfig) -> R) -> R {
        self.configs.update_this_thread(f)
    }

    /// The canonical config owned by the thread that created the program.
    pub fn config(&self) -> CompileConfig {
        self.configs.main_config()
    }

    pub fn config_of(&self, thread: ThreadId) -> Option<CompileConfig> {
        self.configs.config_of(thread)
    }

    pub fn default_block_dim(&self) -> usize {
        self.this_thread_config().default_block_dim()
    }

    // ------------------------------------------------------------------------
    // SNode trees
    // ------------------------------------------------------------------------

    /// Register `root` as a new tree and return its id.
    ///
    /// Unless `compile_only`, the backend allocates the tree's storage. Trees
    /// added with `compile_only` carry a layout only and must not be accessed
    /// at run time.
    pub fn add_snode_tree(&mut self, root: SNode, compile_only: bool) -> Result<usize> {
        let tree = self.snode_trees.add(root, compile_only);
        let id = tree.id();
        if !compile_only && let Err(e) = self.program_impl.materialize_snode_tree(tree) {
            self.snode_trees.remove(id);
            return Err(e);
        }
        tracing::debug!(tree.id = id, compile_only, "added snode tree");
        Ok(id)
    }

    /// Release the tree's storage and make its id reusable.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not name a live tree.
    pub fn destroy_snode_tree(&mut self, id: usize) -> Result<()> {
        let Some(tree) = self.snode_trees.remove(id) else {
            panic!("snode tree {id} is not live");
        };
        for place in tree.root().places() {
            self.accessors.remove(&place.id());
        }
        tracing::debug!(tree.id = id, "destroyed snode tree");
        if tree.is_compile_only() { Ok(()) } else { self.program_impl.destroy_snode_tree(&tree) }
    }

    /// # Panics
    ///
    /// Panics if `tree_id` does not name a live tree.
    pub fn get_snode_root(&self, tree_id: usize) -> &SNode {
        match self.try_get_snode_root(tree_id) {
            Some(root) => root,
            None => panic!("snode tree {tree_id} is not live"),
        }
    }

    pub fn try_get_snode_root(&self, tree_id: usize) -> Option<&SNode> {
        self.snode_trees.get(tree_id).map(SNodeTree::root)
    }

    pub fn snode_tree(&self, tree_id: usize) -> Option<&SNodeTree> {
        self.snode_trees.get(tree_id)
    }

    /// Size of the tree id space, destroyed ids included.
    pub fn get_snode_tree_size(&self) -> usize {
        self.snode_trees.capacity()
    }

    pub fn get_field_in_tree_offset(&self, tree_id: usize, snode: SNodeId) -> Option<usize> {
        self.program_impl.get_field_in_tree_offset(tree_id, snode)
    }

    pub fn get_snode_tree_device_ptr(&self, tree_id: usize) -> Option<DevicePtr> {
        self.program_impl.get_snode_tree_device_ptr(tree_id)
    }

    pub fn get_snode_num_dynamically_allocated(&self, snode: SNodeId) -> usize {
        self.program_impl.get_snode_num_dynamically_allocated(snode)
    }

    /// Write the layout of every live tree to `path`.
    pub fn visualize_layout(&self, path: &Path) -> Result<()> {
        let mut out = String::new();
        for tree in self.snode_trees.iter() {
            out.push_str(&format!("tree {}\n", tree.id()));
            out.push_str(&tree.root().dump());
        }
        std::fs::write(path, out).context(IoSnafu { path })
    }

    /// Kernel reading one element of place `snode`; indices are `i32` arguments.
    pub fn get_snode_reader(&mut self, snode: SNodeId) -> Result<Arc<Kernel>> {
        if let Some(reader) = self.accessors.get(&snode).and_then(|a| a.reader.clone()) {
            return Ok(reader);
        }

        let (dtype, num_indices) = self.place_info(snode)?;
        let reader = self.kernel(
            |b| {
                let indices: SmallVec<[_; 4]> = (0..num_indices).map(|_| b.arg(DType::Int32)).collect();
                let value = b.load(snode, &indices, dtype);
                b.ret(value);
            },
            format!("snode_reader_{}", snode.0),
            AutodiffMode::None,
        );
        self.accessors.entry(snode).or_default().reader = Some(Arc::clone(&reader));
        Ok(reader)
    }

    /// Kernel writing one element of place `snode`; indices are `i32` arguments
    /// followed by the value.
    pub fn get_snode_writer(&mut self, snode: SNodeId) -> Result<Arc<Kernel>> {
        if let Some(writer) = self.accessors.get(&snode).and_then(|a| a.writer.clone()) {
            return Ok(writer);
        }

        let (dtype, num_indices) = self.place_info(snode)?;
        let writer = self.kernel(
            |b| {
                let indices: SmallVec<[_; 4]> = (0..num_indices).map(|_| b.arg(DType::Int32)).collect();
                let value = b.arg(dtype);
                b.store(snode, &indices, value);
            },
            format!("snode_writer_{}", snode.0),
            AutodiffMode::None,
        );
        self.accessors.entry(snode).or_default().writer = Some(Arc::clone(&writer));
        Ok(writer)
    }

    /// Read one element through the cached reader kernel.
    pub fn read_snode(&mut self, snode: SNodeId, indices: &[i64]) -> Result<ConstValue> {
        let reader = self.get_snode_reader(snode)?;
        let args: Vec<_> = indices.iter().map(|&i| ConstValue::Int(i)).collect();
        self.launch_kernel(&reader, &args)?;
        let dtype = reader.rets()[0];
        let value = ConstValue::from_bits(self.fetch_result_uint64(0), &dtype);
        value.context(EvaluationSnafu { kernel: reader.name(), stmt: "result 0" })
    }

    /// Write one element through the cached writer kernel.
    pub fn write_snode(&mut self, snode: SNodeId, indices: &[i64], value: ConstValue) -> Result<()> {
        let writer = self.get_snode_writer(snode)?;
        let mut args: Vec<_> = indices.iter().map(|&i| ConstValue::Int(i)).collect();
        args.push(value);
        self.launch_kernel(&writer, &args)
    }

    fn place_info(&self, snode: SNodeId) -> Result<(DType, usize)> {
        let place = self.snode_trees.find_tree_of(snode).and_then(|tree| tree.root().find(snode));
        let place = place.context(SNodeNotFoundSnafu { snode })?;
        let dtype = place.dtype().context(SNodeNotFoundSnafu { snode })?;
        Ok((dtype, place.num_active_indices()))
    }

    // ------------------------------------------------------------------------
    // Kernels and functions
    // ------------------------------------------------------------------------

    /// Create a kernel whose body is populated by `body`.
    ///
    /// The program keeps the kernel until it is finalized.
    pub fn kernel(
        &mut self,
        body: impl FnOnce(&mut KernelBuilder),
        name: impl Into<String>,
        autodiff_mode: AutodiffMode,
    ) -> Arc<Kernel> {
        let kernel = Arc::new(Kernel::new(self.get_kernel_id(), name, body, autodiff_mode));
        self.kernels.push(Arc::clone(&kernel));
        kernel
    }

    pub fn kernels(&self) -> &[Arc<Kernel>] {
        &self.kernels
    }

    /// The function registered under `key`, created on first request.
    pub fn create_function(&mut self, key: FunctionKey) -> Arc<Function> {
        let function = self.functions.entry(key).or_insert_with_key(|key| Arc::new(Function::new(key.clone())));
        Arc::clone(function)
    }

    pub fn num_functions(&self) -> usize {
        self.functions.len()
    }

    /// Compile `kernel` with the calling thread's config, reusing a cached result.
    pub fn compile(&self, kernel: &Kernel) -> Result<FunctionType> {
        let config = self.this_thread_config();
        self.compile_with(kernel, &config)
    }

    fn compile_with(&self, kernel: &Kernel, config: &CompileConfig) -> Result<FunctionType> {
        if let Some(function) = kernel.compiled() {
            return Ok(Arc::clone(function));
        }

        let start = Instant::now();
        let ir = lower(kernel, config)?;
        let function = self.program_impl.compile(config, kernel, &ir)?;
        let elapsed = start.elapsed();
        *self.total_compilation_time.lock() += elapsed;
        tracing::debug!(kernel.name = %kernel.name(), elapsed = ?elapsed, "compiled kernel");

        Ok(kernel.set_compiled(function))
    }

    /// Compile if needed and run `kernel`, writing return values into the result buffer.
    pub fn launch_kernel(&self, kernel: &Kernel, args: &[ConstValue]) -> Result<()> {
        self.launch_with(kernel, args, &self.result_buffer)
    }

    fn launch_with(&self, kernel: &Kernel, args: &[ConstValue], result_buffer: &ResultBuffer) -> Result<()> {
        ensure!(
            args.len() == kernel.args().len(),
            ArgumentCountSnafu { kernel: kernel.name(), expected: kernel.args().len(), actual: args.len() }
        );

        let config = self.this_thread_config();
        let function = self.compile_with(kernel, &config)?;
        let ctx = RuntimeContext { args, result_buffer };

        if !config.kernel_profiler {
            return function(&ctx);
        }
        let mut profiler = self.profiler.lock();
        profiler.start(kernel.name());
        let result = function(&ctx);
        profiler.stop();
        result
    }

    /// Total time spent compiling kernels so far.
    pub fn total_compilation_time(&self) -> Duration {
        *self.total_compilation_time.lock()
    }

    pub fn get_kernel_id(&self) -> u64 {
        self.kernel_id_counter.fetch_add(1, Ordering::Relaxed)
    }

    pub fn get_next_global_id(&self) -> u64 {
        self.global_id_counter.fetch_add(1, Ordering::Relaxed)
    }

    // ------------------------------------------------------------------------
    // JIT evaluators
    // ------------------------------------------------------------------------

    /// Compiled kernel evaluating one scalar operator, cached per calling thread.
    ///
    /// The kernel takes the operand(s) as arguments and returns the result in
    /// slot 0. Unary operators ignore `rhs` apart from keying the cache.
    pub fn get_or_compile_evaluator(
        &self,
        op: impl Into<ScalarOp>,
        ret: DType,
        lhs: DType,
        rhs: DType,
        tb: &str,
    ) -> Result<Arc<Kernel>> {
        let id = JitEvaluatorId { thread_id: thread::current().id(), op: op.into(), ret, lhs, rhs, tb: tb.to_string() };
        self.evaluators.get_or_compile(id, |id, name| {
            let kernel = Kernel::new(self.get_kernel_id(), name, |b| evaluator_body(b, id), AutodiffMode::None);
            let kernel = kernel.evaluator();
            let mut config = self.this_thread_config();
            config.advanced_optimization = false;
            self.compile_with(&kernel, &config)?;
            Ok(kernel)
        })
    }

    pub fn evaluator_cache(&self) -> &JitEvaluatorCache {
        &self.evaluators
    }

    /// Evaluate `op` on a constant by running its evaluator kernel.
    pub fn evaluate_unary(
        &self,
        op: UnaryOp,
        operand: ConstValue,
        operand_type: DType,
        ret: DType,
    ) -> Result<ConstValue> {
        let kernel = self.get_or_compile_evaluator(op, ret, operand_type, operand_type, "")?;
        self.run_evaluator(&kernel, &[operand], ret)
    }

    /// Evaluate `op` on two constants by running its evaluator kernel.
    pub fn evaluate_binary(
        &self,
        op: BinaryOp,
        lhs: ConstValue,
        lhs_type: DType,
        rhs: ConstValue,
        rhs_type: DType,
        ret: DType,
    ) -> Result<ConstValue> {
        let kernel = self.get_or_compile_evaluator(op, ret, lhs_type, rhs_type, "")?;
        self.run_evaluator(&kernel, &[lhs, rhs], ret)
    }

    fn run_evaluator(&self, kernel: &Kernel, args: &[ConstValue], ret: DType) -> Result<ConstValue> {
        let buffer = ResultBuffer::new();
        self.launch_with(kernel, args, &buffer)?;
        ConstValue::from_bits(buffer.load(0), &ret).context(EvaluationSnafu { kernel: kernel.name(), stmt: "result 0" })
    }

    // ------------------------------------------------------------------------
    // Results
    // ------------------------------------------------------------------------

    pub fn fetch_result_uint64(&self, index: usize) -> u64 {
        self.result_buffer.load(index)
    }

    /// Decode result slot `index` as `T`.
    pub fn fetch_result<T: ResultValue>(&self, index: usize) -> T {
        self.result_buffer.fetch(index)
    }

    pub fn result_buffer(&self) -> &ResultBuffer {
        &self.result_buffer
    }

    // ------------------------------------------------------------------------
    // Ndarrays and textures
    // ------------------------------------------------------------------------

    pub fn create_ndarray(
        &mut self,
        dtype: DType,
        shape: &[usize],
        layout: NdarrayLayout,
        zero_fill: bool,
    ) -> Result<NdarrayId> {
        let size = dtype
            .array_bytes(shape)
            .with_context(|| SizeOverflowSnafu { what: format!("{dtype} ndarray {shape:?}") })?;
        let allocation = self.program_impl.allocate_memory_ndarray(size, zero_fill)?;
        let id = NdarrayId(self.next_ndarray_id);
        self.next_ndarray_id += 1;
        self.ndarrays.insert(id, Ndarray::new(id, dtype, shape, layout, allocation));
        tracing::debug!(ndarray.id = %id, dtype = %dtype, shape = ?shape, "created ndarray");
        Ok(id)
    }

    /// Release the ndarray's memory and forget its handle.
    pub fn delete_ndarray(&mut self, id: NdarrayId) -> Result<()> {
        let ndarray = self.ndarrays.remove(&id).context(NdarrayNotFoundSnafu { id })?;
        self.program_impl.release_memory_ndarray(*ndarray.allocation())
    }

    pub fn get_ndarray(&self, id: NdarrayId) -> Option<&Ndarray> {
        self.ndarrays.get(&id)
    }

    pub fn num_ndarrays(&self) -> usize {
        self.ndarrays.len()
    }

    pub fn ndarray_data_ptr(&self, id: NdarrayId) -> Result<DevicePtr> {
        Ok(self.ndarray(id)?.allocation().ptr(0))
    }

    /// Fill the ndarray's memory with a repeated 32-bit pattern.
    pub fn fill_ndarray_fast_u32(&self, id: NdarrayId, value: u32) -> Result<()> {
        let ndarray = self.ndarray(id)?;
        self.device().fill_u32(ndarray.allocation(), value).context(DeviceSnafu)
    }

    /// The ndarray's memory as little-endian 32-bit words.
    pub fn read_ndarray_u32(&self, id: NdarrayId) -> Result<Vec<u32>> {
        let ndarray = self.ndarray(id)?;
        let mut bytes = vec![0u8; ndarray.allocation().size];
        self.device().read(ndarray.allocation().ptr(0), &mut bytes).context(DeviceSnafu)?;
        Ok(bytes.chunks_exact(4).map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]])).collect())
    }

    fn ndarray(&self, id: NdarrayId) -> Result<&Ndarray> {
        self.ndarrays.get(&id).context(NdarrayNotFoundSnafu { id })
    }

    /// Create an image owned by the program until it is finalized.
    pub fn create_texture(&mut self, dtype: DType, num_channels: usize, shape: &[usize]) -> Result<TextureId> {
        let params = ImageParams { dtype, num_channels, shape: SmallVec::from_slice(shape) };
        let allocation = self.program_impl.allocate_texture(&params)?;
        let id = TextureId(self.textures.len());
        self.textures.push(Texture::new(id, params, allocation));
        tracing::debug!(texture = id.0, dtype = %dtype, num_channels, shape = ?shape, "created texture");
        Ok(id)
    }

    pub fn get_texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(id.0)
    }

    pub fn num_textures(&self) -> usize {
        self.textures.len()
    }

    /// Raw ndarray memory straight from the backend; the caller owns it.
    pub fn allocate_memory_ndarray(&self, size: usize, zero_fill: bool) -> Result<DeviceAllocation> {
        self.program_impl.allocate_memory_ndarray(size, zero_fill)
    }

    /// Raw image memory straight from the backend; the caller owns it.
    pub fn allocate_texture(&self, params: &ImageParams) -> Result<DeviceAllocation> {
        self.program_impl.allocate_texture(params)
    }

    pub fn memory_pool(&self) -> &Arc<MemoryPool> {
        &self.memory_pool
    }

    // ------------------------------------------------------------------------
    // Profiler
    // ------------------------------------------------------------------------

    pub fn profiler_start(&self, name: &str) {
        self.profiler.lock().start(name);
    }

    pub fn profiler_stop(&self) {
        self.profiler.lock().stop();
    }

    pub fn query_kernel_profile_info(&self, name: &str) -> KernelProfileStats {
        self.profiler.lock().query(name)
    }

    pub fn profiled_kernels(&self) -> Vec<String> {
        self.profiler.lock().kernels()
    }

    pub fn clear_kernel_profile(&self) {
        self.profiler.lock().clear();
    }

    // ------------------------------------------------------------------------
    // Backend
    // ------------------------------------------------------------------------

    pub fn program_impl(&self) -> &dyn ProgramImpl {
        self.program_impl.as_ref()
    }

    /// The backend of an LLVM-class arch.
    ///
    /// # Panics
    ///
    /// Panics if the program's arch does not compile through LLVM.
    pub fn llvm_program_impl(&self) -> &dyn ProgramImpl {
        assert!(self.arch.uses_llvm(), "{} is not an LLVM-backed arch", self.arch);
        self.program_impl.as_ref()
    }

    pub fn compute_device(&self) -> Option<Arc<dyn Device>> {
        self.program_impl.compute_device()
    }

    pub fn graphics_device(&self) -> Option<Arc<dyn Device>> {
        self.program_impl.graphics_device()
    }

    fn device(&self) -> &Arc<dyn Device> {
        self.memory_pool.device()
    }

    pub fn synchronize(&self) -> Result<()> {
        self.program_impl.synchronize()
    }

    /// Report the first device fault recorded since the last check.
    pub fn check_runtime_error(&self) -> Result<()> {
        self.program_impl.check_runtime_error()
    }

    pub fn make_aot_module_builder(&self, arch: Arch, caps: &[String]) -> Result<Box<dyn AotModuleBuilder>> {
        self.program_impl.make_aot_module_builder(arch, caps)
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Release every resource held by the program.
    ///
    /// All teardown steps run even if one fails; the first failure is returned.
    ///
    /// # Panics
    ///
    /// Panics if the program was already finalized.
    pub fn finalize(&mut self) -> Result<()> {
        assert!(!self.finalized, "program finalized twice");
        self.finalized = true;

        let mut first_error = None;
        let mut note = |result: Result<()>| {
            if let Err(e) = result {
                tracing::warn!(error = %e, "program teardown step failed");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        };

        note(self.program_impl.synchronize());
        for (_, ndarray) in self.ndarrays.drain() {
            note(self.program_impl.release_memory_ndarray(*ndarray.allocation()));
        }
        for texture in self.textures.drain(..) {
            note(self.program_impl.release_texture(*texture.allocation()));
        }
        for tree in self.snode_trees.drain() {
            if !tree.is_compile_only() {
                note(self.program_impl.destroy_snode_tree(&tree));
            }
        }
        self.accessors.clear();
        self.evaluators.clear();
        self.functions.clear();
        self.kernels.clear();
        note(self.program_impl.finalize());
        note(self.memory_pool.terminate().context(DeviceSnafu));

        NUM_INSTANCES.fetch_sub(1, Ordering::SeqCst);
        tracing::debug!(arch = %self.arch, "program finalized");
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for Program {
    fn drop(&mut self) {
        if !self.finalized
            && let Err(e) = self.finalize()
        {
            tracing::warn!(error = %e, "program finalize on drop failed");
        }
    }
}

/// Validate the kernel body and run the lowering passes enabled by `config`.
fn lower(kernel: &Kernel, config: &CompileConfig) -> Result<Block> {
    ensure!(
        kernel.rets().len() <= MAX_RESULT_SLOTS,
        CompilationSnafu {
            kernel: kernel.name(),
            reason: format!("{} return values exceed {MAX_RESULT_SLOTS} result slots", kernel.rets().len()),
        }
    );
    verify(kernel.ir(), kernel.args(), kernel.rets().len()).context(InvalidIrSnafu { kernel: kernel.name() })?;

    let ir = if config.advanced_optimization { eliminate_dead_code(kernel.ir()) } else { kernel.ir().clone() };
    if config.print_ir {
        tracing::info!(kernel.name = %kernel.name(), "lowered IR:\n{ir}");
    }
    Ok(ir)
}

fn evaluator_body(b: &mut KernelBuilder, id: &JitEvaluatorId) {
    let lhs = b.arg(id.lhs);
    let result = match id.op {
        ScalarOp::Unary(op) => b.unary(op, lhs, id.ret),
        ScalarOp::Binary(op) => {
            let rhs = b.arg(id.rhs);
            b.binary(op, lhs, rhs, id.ret)
        }
    };
    b.ret(result);
}
