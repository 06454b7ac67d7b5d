//! Compilation configuration and its per-thread overlay.
//!
//! [`CompileConfig`] is a plain value. A [`ConfigOverlay`] gives every thread
//! its own copy, seeded from the main thread's config on first access, so one
//! thread can tweak settings without the change leaking into the others.

use std::collections::HashMap;
use std::thread::{self, ThreadId};

use bon::bon;
use parking_lot::RwLock;
use tessel_dtype::Arch;

/// Compilation options for one program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileConfig {
    /// Target architecture.
    pub arch: Arch,
    /// Enable debug checks in generated kernels.
    pub debug: bool,
    /// Run optimizing passes while lowering.
    pub advanced_optimization: bool,
    /// Record per-kernel launch timings.
    pub kernel_profiler: bool,
    /// Log lowered IR of every compiled kernel.
    pub print_ir: bool,
    pub default_cpu_block_dim: usize,
    pub default_gpu_block_dim: usize,
    /// Bounds-check field accesses and report violations as runtime errors.
    pub check_out_of_bound: bool,
    /// Device memory limit in MiB (0 = unlimited).
    pub device_memory_mb: usize,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[bon]
impl CompileConfig {
    #[builder]
    pub fn new(
        #[builder(default = Arch::host())] arch: Arch,
        #[builder(default = false)] debug: bool,
        #[builder(default = true)] advanced_optimization: bool,
        #[builder(default = false)] kernel_profiler: bool,
        #[builder(default = false)] print_ir: bool,
        #[builder(default = 32)] default_cpu_block_dim: usize,
        #[builder(default = 128)] default_gpu_block_dim: usize,
        #[builder(default = false)] check_out_of_bound: bool,
        #[builder(default = 0)] device_memory_mb: usize,
    ) -> Self {
        Self {
            arch,
            debug,
            advanced_optimization,
            kernel_profiler,
            print_ir,
            default_cpu_block_dim,
            default_gpu_block_dim,
            check_out_of_bound,
            device_memory_mb,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `TESSEL_ARCH` - Target architecture name (default: host)
    /// * `TESSEL_DEBUG` - Enable debug mode, implies bounds checks
    /// * `TESSEL_NO_ADVANCED_OPT` - Disable optimizing passes
    /// * `TESSEL_KERNEL_PROFILER` - Enable the kernel profiler
    /// * `TESSEL_PRINT_IR` - Log lowered IR
    pub fn from_env() -> Self {
        let arch = std::env::var("TESSEL_ARCH").ok().and_then(|s| Arch::parse(&s)).unwrap_or_else(Arch::host);
        let debug = std::env::var("TESSEL_DEBUG").is_ok();

        Self::builder()
            .arch(arch)
            .debug(debug)
            .check_out_of_bound(debug)
            .advanced_optimization(std::env::var("TESSEL_NO_ADVANCED_OPT").is_err())
            .kernel_profiler(std::env::var("TESSEL_KERNEL_PROFILER").is_ok())
            .print_ir(std::env::var("TESSEL_PRINT_IR").is_ok())
            .build()
    }

    /// Block dimension used when a kernel does not pick one.
    pub fn default_block_dim(&self) -> usize {
        if self.arch.is_cpu() { self.default_cpu_block_dim } else { self.default_gpu_block_dim }
    }

    pub fn device_memory_limit(&self) -> Option<usize> {
        (self.device_memory_mb > 0).then(|| self.device_memory_mb << 20)
    }
}

/// Per-thread copies of a program's [`CompileConfig`].
///
/// Reads hand out snapshots and writes run inside [`update_this_thread`](Self::update_this_thread),
/// so no lock outlives a single call.
#[derive(Debug)]
pub struct ConfigOverlay {
    main_thread: ThreadId,
    configs: RwLock<HashMap<ThreadId, CompileConfig>>,
}

impl ConfigOverlay {
    /// The calling thread becomes the main thread.
    pub fn new(config: CompileConfig) -> Self {
        let main_thread = thread::current().id();
        let configs = HashMap::from([(main_thread, config)]);
        Self { main_thread, configs: RwLock::new(configs) }
    }

    pub fn main_thread(&self) -> ThreadId {
        self.main_thread
    }

    /// Snapshot of the calling thread's config, cloning it from the main config on first use.
    pub fn this_thread(&self) -> CompileConfig {
        let id = thread::current().id();
        if let Some(config) = self.configs.read().get(&id) {
            return config.clone();
        }
        let mut configs = self.configs.write();
        self.seeded(&mut configs, id).clone()
    }

    /// Mutate the calling thread's config in place.
    ///
    /// `f` runs under the overlay's write lock and must not call back into it.
    pub fn update_this_thread<R>(&self, f: impl FnOnce(&mut CompileConfig) -> R) -> R {
        let id = thread::current().id();
        let mut configs = self.configs.write();
        f(self.seeded(&mut configs, id))
    }

    fn seeded<'a>(&self, configs: &'a mut HashMap<ThreadId, CompileConfig>, id: ThreadId) -> &'a mut CompileConfig {
        let seed = (!configs.contains_key(&id)).then(|| configs.get(&self.main_thread).cloned().unwrap_or_default());
        configs.entry(id).or_insert_with(|| {
            tracing::trace!(thread = ?id, "seeded thread config from main config");
            seed.unwrap_or_default()
        })
    }

    /// Snapshot of the canonical config owned by the main thread.
    pub fn main_config(&self) -> CompileConfig {
        self.config_of(self.main_thread).unwrap_or_default()
    }

    /// Snapshot of `thread`'s config, if that thread has touched it.
    pub fn config_of(&self, thread: ThreadId) -> Option<CompileConfig> {
        self.configs.read().get(&thread).cloned()
    }

    /// Number of threads that own a config copy, the main thread included.
    pub fn num_threads(&self) -> usize {
        self.configs.read().len()
    }
}
