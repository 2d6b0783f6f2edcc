pub mod alpha_mask;
pub mod fog;
pub mod shadow_map;
pub mod skeletal;
pub mod sprite_sheet;

pub use alpha_mask::AlphaMaskPlugin;
pub use fog::{FogParams, FogPlugin};
pub use shadow_map::ShadowMapPlugin;
pub use skeletal::SkeletalAnimationPlugin;
pub use sprite_sheet::SpriteSheetPlugin;

use std::any::Any;
use std::fmt;
use std::ops::Range;

use crate::backend::VertexStreams;
use crate::dsl::{BodyBuilder, ShaderStage};
use crate::errors::{Result, ShaderError};
use crate::material::handles::{AttributeBinder, LocationResolver, TextureBinder, UniformWriter};
use crate::shader::{Declarations, SymbolTable};

/// Where a fragment's statements are spliced into the core `main()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsertLocation {
    PreTransform,
    PreLighting,
    PostTransform,
    PostLighting,
    /// Declared and discoverable by id, never spliced.
    Ignore,
}

impl InsertLocation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            InsertLocation::PreTransform => "PRE_TRANSFORM",
            InsertLocation::PreLighting => "PRE_LIGHTING",
            InsertLocation::PostTransform => "POST_TRANSFORM",
            InsertLocation::PostLighting => "POST_LIGHTING",
            InsertLocation::Ignore => "IGNORE",
        }
    }
}

impl fmt::Display for InsertLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ShaderFragment: one stage's worth of plugin logic
// ============================================================================

/// Shader logic for one stage, woven into the core shader at
/// [`insert_location`](Self::insert_location).
pub trait ShaderFragment: fmt::Debug + Send {
    /// Stable identity. Other shaders test for it through
    /// [`SymbolTable::has_fragment`].
    fn shader_id(&self) -> &str;

    fn insert_location(&self) -> InsertLocation;

    /// Declares the fragment's variables. Shared globals and well-known
    /// uniforms may be claimed again with an identical definition.
    fn declare(&mut self, decl: &mut Declarations<'_>) -> Result<()>;

    /// Emits the fragment's statements. Never called for [`InsertLocation::Ignore`].
    fn main(&self, body: &mut BodyBuilder, symbols: &SymbolTable) -> Result<()>;

    fn set_locations(&mut self, _resolver: &mut LocationResolver<'_>) {}

    fn apply_params(&mut self, _writer: &mut UniformWriter<'_>) {}
}

/// Error for a fragment asked to emit before it declared its variables.
pub(crate) fn undeclared(body: &BodyBuilder) -> ShaderError {
    ShaderError::InvalidStatement {
        stage: body.stage(),
        owner: body.owner().to_string(),
        reason: "main() ran before the fragment declared its variables".to_string(),
    }
}

// ============================================================================
// MaterialPlugin: what a Material holds
// ============================================================================

/// A feature attached to a material: up to one fragment per stage plus the
/// textures and vertex streams it owns.
pub trait MaterialPlugin: Any + Send + fmt::Debug {
    /// Identity used to reject a second plugin of the same kind.
    fn plugin_id(&self) -> &str;

    fn fragment(&self, stage: ShaderStage) -> Option<&dyn ShaderFragment>;

    fn fragment_mut(&mut self, stage: ShaderStage) -> Option<&mut dyn ShaderFragment>;

    /// Number of texture units the plugin binds.
    fn texture_count(&self) -> u32 {
        0
    }

    /// Binds the plugin's textures to `units`, which has exactly
    /// [`texture_count`](Self::texture_count) entries.
    fn bind_textures(&self, _units: Range<u32>, _binder: &mut TextureBinder<'_>) {}

    fn unbind_textures(&self, _units: Range<u32>, _binder: &mut TextureBinder<'_>) {}

    fn bind_attributes(&self, _binder: &mut AttributeBinder<'_>, _streams: &VertexStreams) {}

    /// Downcasting support for typed access through the material.
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// What one fragment contributed to a composed stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contribution {
    /// Statements spliced at `location`.
    Spliced {
        shader_id: String,
        stage: ShaderStage,
        location: InsertLocation,
        statements: usize,
    },
    /// Declared and discoverable, no statements.
    MetadataOnly {
        shader_id: String,
        stage: ShaderStage,
    },
}

impl Contribution {
    #[must_use]
    pub fn shader_id(&self) -> &str {
        match self {
            Contribution::Spliced { shader_id, .. } | Contribution::MetadataOnly { shader_id, .. } => {
                shader_id
            }
        }
    }

    #[must_use]
    pub fn stage(&self) -> ShaderStage {
        match self {
            Contribution::Spliced { stage, .. } | Contribution::MetadataOnly { stage, .. } => *stage,
        }
    }

    /// Statements emitted into `main()`; zero for metadata-only fragments.
    #[must_use]
    pub fn statements(&self) -> usize {
        match self {
            Contribution::Spliced { statements, .. } => *statements,
            Contribution::MetadataOnly { .. } => 0,
        }
    }
}

/// Implements the downcasting accessors of [`MaterialPlugin`].
macro_rules! impl_plugin_any {
    () => {
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    };
}

pub(crate) use impl_plugin_any;

