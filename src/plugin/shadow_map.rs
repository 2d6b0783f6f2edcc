//! Shadow Mapping
//!
//! The vertex fragment projects the vertex into light space (biased into
//! texture space); the fragment fragment compares against the depth stored in
//! the shadow map and, for surfaces facing away from the light, darkens the
//! pixel and kills the specular term before lighting.

use std::ops::Range;

use glam::{Mat4, Vec3};

use crate::backend::{Location, TextureRef};
use crate::dsl::func::{dot, mat4_from_cols, texture2d};
use crate::dsl::{BodyBuilder, Condition, DataType, RelOp, ShaderStage, ShaderValue};
use crate::errors::Result;
use crate::material::handles::{LocationResolver, TextureBinder, UniformWriter};
use crate::shader::{Declarations, ShaderVar, ShaderVarKey as K, SymbolTable};

use super::{InsertLocation, MaterialPlugin, ShaderFragment, impl_plugin_any, undeclared};

pub const SHADOW_MAP_VERTEX_SHADER_FRAGMENT: &str = "SHADOW_MAP_VERTEX_SHADER_FRAGMENT";
pub const SHADOW_MAP_FRAGMENT_SHADER_FRAGMENT: &str = "SHADOW_MAP_FRAGMENT_SHADER_FRAGMENT";

const U_LIGHT_MVP_MATRIX: &str = "uLightMVPMatrix";
const U_SHADOW_MAP_TEX: &str = "uShadowMapTex";
const U_SHADOW_INFLUENCE: &str = "uShadowInfluence";
const U_SHADOW_LIGHT_DIR: &str = "uShadowLightDir";
const V_SHADOW_TEX_COORD: &str = "vShadowTexCoord";
const C_BIAS_MATRIX: &str = "cBiasMatrix";
const C_SHADOW_BIAS: &str = "cShadowBias";

/// Maps clip space `[-1, 1]` to texture space `[0, 1]`, column-major.
const BIAS_MATRIX: [f32; 16] = [
    0.5, 0.0, 0.0, 0.0, //
    0.0, 0.5, 0.0, 0.0, //
    0.0, 0.0, 0.5, 0.0, //
    0.5, 0.5, 0.5, 1.0,
];
const SHADOW_BIAS: f32 = 0.005;
/// Surfaces with `dot(normal, light_dir)` above this are treated as lit.
const LIGHT_ANGLE_CUTOFF: f32 = -0.15;

// ============================================================================
// Vertex
// ============================================================================

#[derive(Debug)]
struct ShadowVertexFragment {
    light_mvp: Mat4,
    vars: Option<(ShaderVar, ShaderVar, ShaderVar)>,
    light_mvp_loc: Location,
}

impl ShaderFragment for ShadowVertexFragment {
    fn shader_id(&self) -> &str {
        SHADOW_MAP_VERTEX_SHADER_FRAGMENT
    }

    fn insert_location(&self) -> InsertLocation {
        InsertLocation::PreTransform
    }

    fn declare(&mut self, decl: &mut Declarations<'_>) -> Result<()> {
        let bias = decl.constant(C_BIAS_MATRIX, DataType::Mat4, mat4_from_cols(&BIAS_MATRIX))?;
        let light_mvp = decl.uniform(U_LIGHT_MVP_MATRIX, DataType::Mat4)?;
        let tex_coord = decl.varying(V_SHADOW_TEX_COORD, DataType::Vec4)?;
        self.vars = Some((bias, light_mvp, tex_coord));
        Ok(())
    }

    fn main(&self, body: &mut BodyBuilder, symbols: &SymbolTable) -> Result<()> {
        let Some((bias, light_mvp, tex_coord)) = &self.vars else {
            return Err(undeclared(body));
        };
        let position = symbols.require(K::Position)?;
        let model = symbols.require(K::ModelMatrix)?;
        body.assign(tex_coord, light_mvp * (&model * &position));
        body.assign(tex_coord, bias * tex_coord);
        Ok(())
    }

    fn set_locations(&mut self, resolver: &mut LocationResolver<'_>) {
        self.light_mvp_loc = resolver.uniform_named(U_LIGHT_MVP_MATRIX);
    }

    fn apply_params(&mut self, writer: &mut UniformWriter<'_>) {
        writer.set(self.light_mvp_loc, self.light_mvp);
    }
}

// ============================================================================
// Fragment
// ============================================================================

#[derive(Debug)]
struct ShadowFragmentVars {
    tex_coord: ShaderVar,
    shadow_map: ShaderVar,
    influence: ShaderVar,
    light_dir: ShaderVar,
    bias: ShaderVar,
}

#[derive(Debug)]
struct ShadowFragmentFragment {
    influence: f32,
    light_dir: Vec3,
    vars: Option<ShadowFragmentVars>,
    shadow_map_loc: Location,
    influence_loc: Location,
    light_dir_loc: Location,
}

impl ShaderFragment for ShadowFragmentFragment {
    fn shader_id(&self) -> &str {
        SHADOW_MAP_FRAGMENT_SHADER_FRAGMENT
    }

    fn insert_location(&self) -> InsertLocation {
        InsertLocation::PreLighting
    }

    fn declare(&mut self, decl: &mut Declarations<'_>) -> Result<()> {
        self.vars = Some(ShadowFragmentVars {
            tex_coord: decl.varying(V_SHADOW_TEX_COORD, DataType::Vec4)?,
            shadow_map: decl.uniform(U_SHADOW_MAP_TEX, DataType::Sampler2D)?,
            influence: decl.uniform(U_SHADOW_INFLUENCE, DataType::Float)?,
            light_dir: decl.uniform(U_SHADOW_LIGHT_DIR, DataType::Vec3)?,
            bias: decl.constant(C_SHADOW_BIAS, DataType::Float, SHADOW_BIAS)?,
        });
        Ok(())
    }

    fn main(&self, body: &mut BodyBuilder, symbols: &SymbolTable) -> Result<()> {
        let Some(v) = &self.vars else {
            return Err(undeclared(body));
        };
        let shadow = symbols.require(K::GShadowValue)?;
        let specular = symbols.require(K::GSpecularValue)?;
        let normal = symbols.require(K::GNormal)?;

        let depth = body.local(
            DataType::Vec4,
            "lightDepthCol",
            texture2d(&v.shadow_map, v.tex_coord.xy()),
        );
        let angle = body.local(DataType::Float, "shadowLightAngle", dot(&normal, &v.light_dir));

        body.start_if(
            Condition::new(depth.z(), RelOp::Lt, v.tex_coord.z() - &v.bias).and(
                angle,
                RelOp::Le,
                LIGHT_ANGLE_CUTOFF,
            ),
        );
        body.assign(&shadow, &v.influence);
        body.assign(&specular, 0.0);
        body.end_if();
        Ok(())
    }

    fn set_locations(&mut self, resolver: &mut LocationResolver<'_>) {
        self.shadow_map_loc = resolver.uniform_named(U_SHADOW_MAP_TEX);
        self.influence_loc = resolver.uniform_named(U_SHADOW_INFLUENCE);
        self.light_dir_loc = resolver.uniform_named(U_SHADOW_LIGHT_DIR);
    }

    fn apply_params(&mut self, writer: &mut UniformWriter<'_>) {
        writer.set(self.influence_loc, self.influence);
        writer.set(self.light_dir_loc, self.light_dir);
    }
}

// ============================================================================
// Plugin
// ============================================================================

#[derive(Debug)]
pub struct ShadowMapPlugin {
    vertex: ShadowVertexFragment,
    fragment: ShadowFragmentFragment,
    shadow_map: Option<TextureRef>,
}

impl ShadowMapPlugin {
    pub const DEFAULT_INFLUENCE: f32 = 0.4;

    #[must_use]
    pub fn new(influence: f32) -> Self {
        Self {
            vertex: ShadowVertexFragment {
                light_mvp: Mat4::IDENTITY,
                vars: None,
                light_mvp_loc: Location::NOT_FOUND,
            },
            fragment: ShadowFragmentFragment {
                influence,
                light_dir: Vec3::NEG_Y,
                vars: None,
                shadow_map_loc: Location::NOT_FOUND,
                influence_loc: Location::NOT_FOUND,
                light_dir_loc: Location::NOT_FOUND,
            },
            shadow_map: None,
        }
    }

    pub fn set_shadow_map(&mut self, texture: TextureRef) {
        self.shadow_map = Some(texture);
    }

    pub fn set_light_mvp_matrix(&mut self, matrix: Mat4) {
        self.vertex.light_mvp = matrix;
    }

    pub fn set_light_direction(&mut self, direction: Vec3) {
        self.fragment.light_dir = direction;
    }

    pub fn set_influence(&mut self, influence: f32) {
        self.fragment.influence = influence;
    }

    #[must_use]
    pub fn influence(&self) -> f32 {
        self.fragment.influence
    }
}

impl Default for ShadowMapPlugin {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INFLUENCE)
    }
}

impl MaterialPlugin for ShadowMapPlugin {
    fn plugin_id(&self) -> &str {
        "shadow_map"
    }

    fn fragment(&self, stage: ShaderStage) -> Option<&dyn ShaderFragment> {
        match stage {
            ShaderStage::Vertex => Some(&self.vertex),
            ShaderStage::Fragment => Some(&self.fragment),
        }
    }

    fn fragment_mut(&mut self, stage: ShaderStage) -> Option<&mut dyn ShaderFragment> {
        match stage {
            ShaderStage::Vertex => Some(&mut self.vertex),
            ShaderStage::Fragment => Some(&mut self.fragment),
        }
    }

    fn texture_count(&self) -> u32 {
        1
    }

    fn bind_textures(&self, units: Range<u32>, binder: &mut TextureBinder<'_>) {
        if let Some(texture) = self.shadow_map {
            binder.bind(units.start, texture, self.fragment.shadow_map_loc);
        }
    }

    fn unbind_textures(&self, units: Range<u32>, binder: &mut TextureBinder<'_>) {
        if let Some(texture) = self.shadow_map {
            binder.unbind(units.start, texture.target);
        }
    }

    impl_plugin_any!();
}
