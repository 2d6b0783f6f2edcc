//! Core shaders and the per-stage declaration machinery.

pub mod fragment;
pub mod keys;
pub mod registry;
pub mod source;
pub mod var;
pub mod vertex;

use bitflags::bitflags;

use crate::dsl::{BodyBuilder, ShaderStage};
use crate::errors::Result;
use crate::material::handles::{LocationResolver, UniformWriter};

pub use fragment::FragmentShader;
pub use keys::ShaderVarKey;
pub use registry::{Declarations, FunctionDef, StageRegistry, SymbolTable};
pub use source::{ShaderSource, render_stage};
pub use var::ShaderVar;
pub use vertex::VertexShader;

bitflags! {
    /// Optional inputs of the core shaders. Fixed for the lifetime of a shader pair.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ShaderFeatures: u32 {
        /// Per-vertex colours replace the `uColor` uniform.
        const VERTEX_COLORS = 1 << 0;
        /// Pass object-space directions for cube map sampling.
        const CUBE_MAPS     = 1 << 1;
        /// Cube map is a sky box seen from inside (mirrors x).
        const SKY_TEXTURE   = 1 << 2;
        /// Declare the `uTime` uniform.
        const TIME          = 1 << 3;
    }
}

/// Fixed steps of a core shader's `main()`. Fragment buckets are spliced
/// between them, see [`crate::material::compose`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CorePhase {
    /// Copy stage inputs into the shared globals.
    Inputs,
    Transform,
    Lighting,
    /// Write the stage's mandatory outputs.
    Output,
}

/// The core vertex or fragment shader a material is built around.
pub trait CoreShader: std::fmt::Debug {
    fn stage(&self) -> ShaderStage;

    /// Owner name used in registry diagnostics.
    fn shader_id(&self) -> &'static str;

    /// Declares this shader's own variables.
    fn declare(&mut self, decl: &mut Declarations<'_>) -> Result<()>;

    fn emit(&self, phase: CorePhase, body: &mut BodyBuilder, symbols: &SymbolTable) -> Result<()>;

    /// Resolves locations after a successful link.
    fn set_locations(&mut self, resolver: &mut LocationResolver<'_>);

    /// Pushes the current CPU-side values.
    fn apply_params(&self, writer: &mut UniformWriter<'_>);
}
