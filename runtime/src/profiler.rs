//! Kernel launch profiling.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Aggregated timings of one kernel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KernelProfileStats {
    pub count: usize,
    pub min: Duration,
    pub max: Duration,
    pub avg: Duration,
}

impl KernelProfileStats {
    fn from_runs(runs: &[Duration]) -> Self {
        if runs.is_empty() {
            return Self::default();
        }
        let total: Duration = runs.iter().sum();
        Self {
            count: runs.len(),
            min: runs.iter().copied().min().unwrap_or(Duration::ZERO),
            max: runs.iter().copied().max().unwrap_or(Duration::ZERO),
            avg: total / runs.len() as u32,
        }
    }
}

pub trait KernelProfiler: Send + std::fmt::Debug {
    /// Begin timing a launch of `name`.
    fn start(&mut self, name: &str);

    /// Finish the launch started last.
    fn stop(&mut self);

    fn query(&self, name: &str) -> KernelProfileStats;

    fn clear(&mut self);

    /// Names of every kernel with at least one recorded launch.
    fn kernels(&self) -> Vec<String>;
}

/// Wall-clock profiler running on the host.
#[derive(Debug, Default)]
pub struct HostKernelProfiler {
    current: Option<(String, Instant)>,
    records: HashMap<String, Vec<Duration>>,
}

impl HostKernelProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a launch measured elsewhere.
    pub fn record(&mut self, name: &str, elapsed: Duration) {
        self.records.entry(name.to_string()).or_default().push(elapsed);
    }
}

impl KernelProfiler for HostKernelProfiler {
    fn start(&mut self, name: &str) {
        if let Some((unfinished, _)) = self.current.replace((name.to_string(), Instant::now())) {
            tracing::warn!(kernel.name = %unfinished, "profiler start without stop; dropping measurement");
        }
    }

    fn stop(&mut self) {
        match self.current.take() {
            Some((name, start)) => self.record(&name, start.elapsed()),
            None => tracing::warn!("profiler stop without start"),
        }
    }

    fn query(&self, name: &str) -> KernelProfileStats {
        self.records.get(name).map(|runs| KernelProfileStats::from_runs(runs)).unwrap_or_default()
    }

    fn clear(&mut self) {
        self.current = None;
        self.records.clear();
    }

    fn kernels(&self) -> Vec<String> {
        let mut names: Vec<_> = self.records.keys().cloned().collect();
        names.sort();
        names
    }
}
