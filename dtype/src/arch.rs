//! Target architecture selection.
//!
//! A program is built for exactly one [`Arch`] for its whole lifetime.

/// Hardware/runtime target of a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::EnumIter, strum::EnumString, strum::Display, strum::IntoStaticStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Arch {
    X64,
    Arm64,
    Cuda,
    Amdgpu,
    Vulkan,
    Metal,
    OpenGl,
    Dx11,
}

impl Arch {
    /// Architecture of the machine running this process.
    pub const fn host() -> Self {
        if cfg!(target_arch = "aarch64") { Self::Arm64 } else { Self::X64 }
    }

    pub const fn is_cpu(&self) -> bool {
        matches!(self, Self::X64 | Self::Arm64)
    }

    /// Whether kernels for this arch go through the LLVM-class backend family.
    pub const fn uses_llvm(&self) -> bool {
        matches!(self, Self::X64 | Self::Arm64 | Self::Cuda | Self::Amdgpu)
    }

    /// Whether the arch exposes a graphics device in addition to a compute device.
    pub const fn has_graphics(&self) -> bool {
        matches!(self, Self::Vulkan | Self::Metal | Self::OpenGl | Self::Dx11)
    }

    /// Parse an architecture name such as `"x64"` or `"CUDA"`.
    pub fn parse(s: &str) -> Option<Self> {
        s.trim().parse().ok()
    }
}

impl Default for Arch {
    fn default() -> Self {
        Self::host()
    }
}
