//! Backend factory registry.
//!
//! Maps each architecture to the factory building its [`ProgramImpl`].
//! Architectures without a registered factory fall back to the host.

pub mod cpu;
pub(crate) mod interpreter;
pub mod layout;

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use snafu::OptionExt;
use tessel_dtype::Arch;

use crate::config::CompileConfig;
use crate::error::{Result, UnsupportedArchSnafu};
use crate::program_impl::ProgramImpl;

pub use cpu::CpuProgramImpl;

/// Factory function that creates a backend for a program configuration.
pub type BackendFactory = Arc<dyn Fn(&CompileConfig) -> Result<Box<dyn ProgramImpl>> + Send + Sync>;

/// Registry of backend factories.
///
/// Uses `parking_lot::RwLock` so lookups from concurrent program
/// constructions do not serialize; registration takes the write lock.
pub struct BackendRegistry {
    factories: RwLock<HashMap<Arch, BackendFactory>>,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendRegistry {
    /// Create a registry with the built-in host backend registered.
    pub fn new() -> Self {
        let registry = Self { factories: RwLock::new(HashMap::new()) };
        for arch in [Arch::X64, Arch::Arm64] {
            registry.register_factory(arch, Arc::new(cpu_backend));
        }
        registry
    }

    /// Register (or replace) the factory for `arch`.
    pub fn register_factory(&self, arch: Arch, factory: BackendFactory) {
        self.factories.write().insert(arch, factory);
    }

    pub fn supports(&self, arch: Arch) -> bool {
        self.factories.read().contains_key(&arch)
    }

    /// `requested` if a backend exists for it, the host arch otherwise.
    pub fn resolve_arch(&self, requested: Arch) -> Arch {
        if self.supports(requested) {
            return requested;
        }
        let host = Arch::host();
        tracing::warn!(requested = %requested, fallback = %host, "no backend for requested arch; falling back to host");
        host
    }

    /// Build the backend for `config.arch`.
    pub fn create(&self, config: &CompileConfig) -> Result<Box<dyn ProgramImpl>> {
        let factory =
            self.factories.read().get(&config.arch).cloned().context(UnsupportedArchSnafu { arch: config.arch })?;
        factory(config)
    }
}

fn cpu_backend(config: &CompileConfig) -> Result<Box<dyn ProgramImpl>> {
    Ok(Box::new(CpuProgramImpl::new(config)))
}

/// Global backend registry instance.
pub static BACKENDS: Lazy<BackendRegistry> = Lazy::new(BackendRegistry::new);
