//! Ahead-of-time module builders.
//!
//! A builder collects kernels and fields for a target arch and dumps them as a
//! module. The CPU builder writes a JSON metadata file describing kernel
//! signatures, their lowered IR and the storage layout of each field.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt};
use tessel_dtype::{Arch, DType};

use crate::backends::layout::TreeLayout;
use crate::error::{IoSnafu, Result, SerializeSnafu, SizeOverflowSnafu};
use crate::kernel::Kernel;
use crate::snode_tree::SNodeTree;

pub trait AotModuleBuilder: std::fmt::Debug {
    fn add_kernel(&mut self, kernel: &Kernel) -> Result<()>;

    /// Record every field of `tree` under `name`.
    fn add_field(&mut self, name: &str, tree: &SNodeTree) -> Result<()>;

    /// Write the module into `output_dir`, returning the written file.
    fn dump(&self, output_dir: &Path) -> Result<PathBuf>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AotKernel {
    pub name: String,
    pub args: Vec<DType>,
    pub rets: Vec<DType>,
    pub ir: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AotField {
    pub name: String,
    pub tree_id: usize,
    pub dtype: DType,
    pub shape: Vec<usize>,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AotModuleMetadata {
    pub arch: Arch,
    pub caps: Vec<String>,
    pub kernels: Vec<AotKernel>,
    pub fields: Vec<AotField>,
}

#[derive(Debug)]
pub struct CpuAotModuleBuilder {
    metadata: AotModuleMetadata,
}

impl CpuAotModuleBuilder {
    pub const METADATA_FILE: &'static str = "metadata.json";

    pub fn new(arch: Arch, caps: &[String]) -> Self {
        Self { metadata: AotModuleMetadata { arch, caps: caps.to_vec(), kernels: Vec::new(), fields: Vec::new() } }
    }

    pub fn metadata(&self) -> &AotModuleMetadata {
        &self.metadata
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.metadata).context(SerializeSnafu)
    }
}

impl AotModuleBuilder for CpuAotModuleBuilder {
    fn add_kernel(&mut self, kernel: &Kernel) -> Result<()> {
        self.metadata.kernels.push(AotKernel {
            name: kernel.name().to_string(),
            args: kernel.args().to_vec(),
            rets: kernel.rets().to_vec(),
            ir: kernel.ir().to_string(),
        });
        Ok(())
    }

    fn add_field(&mut self, name: &str, tree: &SNodeTree) -> Result<()> {
        let layout = TreeLayout::compute(tree.root())
            .with_context(|| SizeOverflowSnafu { what: format!("snode tree {}", tree.id()) })?;
        for field in layout.fields {
            let place = tree.root().find(field.snode).and_then(|node| node.name()).unwrap_or("_");
            self.metadata.fields.push(AotField {
                name: format!("{name}.{place}"),
                tree_id: tree.id(),
                dtype: field.dtype,
                shape: field.shape.to_vec(),
                offset: field.offset,
            });
        }
        Ok(())
    }

    fn dump(&self, output_dir: &Path) -> Result<PathBuf> {
        let path = output_dir.join(Self::METADATA_FILE);
        std::fs::write(&path, self.to_json()?).context(IoSnafu { path: path.clone() })?;
        Ok(path)
    }
}
