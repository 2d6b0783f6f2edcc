//! Alpha Masking
//!
//! Discards pixels whose alpha falls below a threshold, after lighting. The
//! alpha comes from the surface colour, or from a dedicated mask texture when
//! one is attached at construction.

use std::ops::Range;

use crate::backend::{Location, TextureRef};
use crate::dsl::func::texture2d;
use crate::dsl::{BodyBuilder, Condition, DataType, RelOp, ShaderStage, ShaderValue};
use crate::errors::Result;
use crate::material::handles::{LocationResolver, TextureBinder, UniformWriter};
use crate::shader::{Declarations, ShaderVar, ShaderVarKey, SymbolTable};

use super::{InsertLocation, MaterialPlugin, ShaderFragment, impl_plugin_any, undeclared};

pub const ALPHA_MASK_FRAGMENT_SHADER_FRAGMENT: &str = "ALPHA_MASK_FRAGMENT_SHADER_FRAGMENT";

const U_ALPHA_MASKING_THRESHOLD: &str = "uAlphaMaskingThreshold";
const U_ALPHA_MASK_TEXTURE: &str = "uAlphaMaskTexture";

#[derive(Debug)]
struct AlphaMaskFragment {
    threshold: f32,
    masked: bool,
    vars: Option<(ShaderVar, Option<ShaderVar>)>,
    threshold_loc: Location,
    mask_loc: Location,
}

impl ShaderFragment for AlphaMaskFragment {
    fn shader_id(&self) -> &str {
        ALPHA_MASK_FRAGMENT_SHADER_FRAGMENT
    }

    fn insert_location(&self) -> InsertLocation {
        InsertLocation::PostLighting
    }

    fn declare(&mut self, decl: &mut Declarations<'_>) -> Result<()> {
        let threshold = decl.uniform(U_ALPHA_MASKING_THRESHOLD, DataType::Float)?;
        let mask = if self.masked {
            Some(decl.uniform(U_ALPHA_MASK_TEXTURE, DataType::Sampler2D)?)
        } else {
            None
        };
        self.vars = Some((threshold, mask));
        Ok(())
    }

    fn main(&self, body: &mut BodyBuilder, symbols: &SymbolTable) -> Result<()> {
        let Some((threshold, mask)) = &self.vars else {
            return Err(undeclared(body));
        };
        let alpha = match mask {
            Some(mask) => {
                let tex_coord = symbols.require(ShaderVarKey::GTextureCoord)?;
                texture2d(mask, &tex_coord).a()
            }
            None => symbols.require(ShaderVarKey::GColor)?.a(),
        };
        body.start_if(Condition::new(alpha, RelOp::Lt, threshold));
        body.discard();
        body.end_if();
        Ok(())
    }

    fn set_locations(&mut self, resolver: &mut LocationResolver<'_>) {
        self.threshold_loc = resolver.uniform_named(U_ALPHA_MASKING_THRESHOLD);
        if self.masked {
            self.mask_loc = resolver.uniform_named(U_ALPHA_MASK_TEXTURE);
        }
    }

    fn apply_params(&mut self, writer: &mut UniformWriter<'_>) {
        writer.set(self.threshold_loc, self.threshold);
    }
}

/// Discards fragments with alpha below the threshold (0..1).
#[derive(Debug)]
pub struct AlphaMaskPlugin {
    fragment: AlphaMaskFragment,
    mask: Option<TextureRef>,
}

impl AlphaMaskPlugin {
    pub const DEFAULT_THRESHOLD: f32 = 0.5;

    #[must_use]
    pub fn new(threshold: f32) -> Self {
        Self {
            fragment: AlphaMaskFragment {
                threshold,
                masked: false,
                vars: None,
                threshold_loc: Location::NOT_FOUND,
                mask_loc: Location::NOT_FOUND,
            },
            mask: None,
        }
    }

    /// Reads alpha from `texture` instead of the surface colour.
    #[must_use]
    pub fn with_mask_texture(mut self, texture: TextureRef) -> Self {
        self.fragment.masked = true;
        self.mask = Some(texture);
        self
    }

    #[must_use]
    pub fn threshold(&self) -> f32 {
        self.fragment.threshold
    }

    pub fn set_threshold(&mut self, threshold: f32) {
        self.fragment.threshold = threshold;
    }
}

impl Default for AlphaMaskPlugin {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}

impl MaterialPlugin for AlphaMaskPlugin {
    fn plugin_id(&self) -> &str {
        "alpha_mask"
    }

    fn fragment(&self, stage: ShaderStage) -> Option<&dyn ShaderFragment> {
        match stage {
            ShaderStage::Vertex => None,
            ShaderStage::Fragment => Some(&self.fragment),
        }
    }

    fn fragment_mut(&mut self, stage: ShaderStage) -> Option<&mut dyn ShaderFragment> {
        match stage {
            ShaderStage::Vertex => None,
            ShaderStage::Fragment => Some(&mut self.fragment),
        }
    }

    fn texture_count(&self) -> u32 {
        u32::from(self.mask.is_some())
    }

    fn bind_textures(&self, units: Range<u32>, binder: &mut TextureBinder<'_>) {
        if let Some(mask) = self.mask {
            binder.bind(units.start, mask, self.fragment.mask_loc);
        }
    }

    fn unbind_textures(&self, units: Range<u32>, binder: &mut TextureBinder<'_>) {
        if let Some(mask) = self.mask {
            binder.unbind(units.start, mask.target);
        }
    }

    impl_plugin_any!();
}
