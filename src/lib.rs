#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod backend;
pub mod dsl;
pub mod errors;
pub mod material;
pub mod plugin;
pub mod shader;

pub use backend::{GraphicsBackend, Location, ProgramHandle, TextureRef, TextureTarget, UniformValue};
pub use backend::headless::HeadlessBackend;
pub use dsl::{BodyBuilder, Condition, DataType, Expr, Precision, RelOp, ShaderStage, ShaderValue};
pub use errors::{CompileError, Result, ShaderError};
pub use material::{Activation, BuildState, Material, MaterialSettings, MaterialTexture};
pub use plugin::{
    AlphaMaskPlugin, FogParams, FogPlugin, InsertLocation, MaterialPlugin, ShaderFragment,
    ShadowMapPlugin, SkeletalAnimationPlugin, SpriteSheetPlugin,
};
pub use shader::{ShaderFeatures, ShaderVar, ShaderVarKey};
