//! Linear Fog
//!
//! The vertex fragment computes a per-vertex fog density from the clip-space
//! depth after the core transform; the fragment fragment blends the surface
//! colour towards the fog colour before colour influence is applied.

use glam::Vec3;

use crate::backend::Location;
use crate::dsl::func::{clamp, mix};
use crate::dsl::{BodyBuilder, Condition, DataType, Expr, RelOp, ShaderStage, ShaderValue};
use crate::errors::Result;
use crate::material::handles::{LocationResolver, UniformWriter};
use crate::shader::{Declarations, ShaderVar, ShaderVarKey, SymbolTable};

use super::{InsertLocation, MaterialPlugin, ShaderFragment, impl_plugin_any, undeclared};

pub const FOG_VERTEX_SHADER_FRAGMENT: &str = "FOG_VERTEX_SHADER_FRAGMENT";
pub const FOG_FRAGMENT_SHADER_FRAGMENT: &str = "FOG_FRAGMENT_SHADER_FRAGMENT";

const U_FOG_NEAR: &str = "uFogNear";
const U_FOG_FAR: &str = "uFogFar";
const U_FOG_ENABLED: &str = "uFogEnabled";
const U_FOG_COLOR: &str = "uFogColor";
const V_FOG_DENSITY: &str = "vFogDensity";

/// Linear fog between `near` and `far` (clip-space depth).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FogParams {
    pub color: Vec3,
    pub near: f32,
    pub far: f32,
}

impl FogParams {
    #[must_use]
    pub fn linear(color: Vec3, near: f32, far: f32) -> Self {
        Self { color, near, far }
    }
}

impl Default for FogParams {
    fn default() -> Self {
        Self::linear(Vec3::splat(0.5), 1.0, 100.0)
    }
}

// ============================================================================
// Vertex
// ============================================================================

#[derive(Debug)]
struct FogVertexFragment {
    near: f32,
    far: f32,
    enabled: bool,
    vars: Option<(ShaderVar, ShaderVar, ShaderVar, ShaderVar)>,
    near_loc: Location,
    far_loc: Location,
    enabled_loc: Location,
}

impl ShaderFragment for FogVertexFragment {
    fn shader_id(&self) -> &str {
        FOG_VERTEX_SHADER_FRAGMENT
    }

    fn insert_location(&self) -> InsertLocation {
        InsertLocation::PostTransform
    }

    fn declare(&mut self, decl: &mut Declarations<'_>) -> Result<()> {
        let near = decl.uniform(U_FOG_NEAR, DataType::Float)?;
        let far = decl.uniform(U_FOG_FAR, DataType::Float)?;
        let enabled = decl.uniform(U_FOG_ENABLED, DataType::Bool)?;
        let density = decl.varying(V_FOG_DENSITY, DataType::Float)?;
        self.vars = Some((near, far, enabled, density));
        Ok(())
    }

    fn main(&self, body: &mut BodyBuilder, _symbols: &SymbolTable) -> Result<()> {
        let Some((near, far, enabled, density)) = &self.vars else {
            return Err(undeclared(body));
        };
        let depth = Expr::builtin_var("gl_Position", DataType::Vec4).z();

        body.assign(density, 0.0);
        body.start_if(Condition::new(enabled, RelOp::Eq, true));
        body.assign(density, (depth - near) / (far - near));
        body.assign(density, clamp(density, 0.0, 1.0));
        body.end_if();
        Ok(())
    }

    fn set_locations(&mut self, resolver: &mut LocationResolver<'_>) {
        self.near_loc = resolver.uniform_named(U_FOG_NEAR);
        self.far_loc = resolver.uniform_named(U_FOG_FAR);
        self.enabled_loc = resolver.uniform_named(U_FOG_ENABLED);
    }

    fn apply_params(&mut self, writer: &mut UniformWriter<'_>) {
        writer.set(self.near_loc, self.near);
        writer.set(self.far_loc, self.far);
        writer.set(self.enabled_loc, self.enabled);
    }
}

// ============================================================================
// Fragment
// ============================================================================

#[derive(Debug)]
struct FogFragmentFragment {
    color: Vec3,
    vars: Option<(ShaderVar, ShaderVar)>,
    color_loc: Location,
}

impl ShaderFragment for FogFragmentFragment {
    fn shader_id(&self) -> &str {
        FOG_FRAGMENT_SHADER_FRAGMENT
    }

    fn insert_location(&self) -> InsertLocation {
        InsertLocation::PreTransform
    }

    fn declare(&mut self, decl: &mut Declarations<'_>) -> Result<()> {
        let color = decl.uniform(U_FOG_COLOR, DataType::Vec3)?;
        let density = decl.varying(V_FOG_DENSITY, DataType::Float)?;
        self.vars = Some((color, density));
        Ok(())
    }

    fn main(&self, body: &mut BodyBuilder, symbols: &SymbolTable) -> Result<()> {
        let Some((fog_color, density)) = &self.vars else {
            return Err(undeclared(body));
        };
        let color = symbols.require(ShaderVarKey::GColor)?;
        body.assign(color.rgb(), mix(color.rgb(), fog_color, density));
        Ok(())
    }

    fn set_locations(&mut self, resolver: &mut LocationResolver<'_>) {
        self.color_loc = resolver.uniform_named(U_FOG_COLOR);
    }

    fn apply_params(&mut self, writer: &mut UniformWriter<'_>) {
        writer.set(self.color_loc, self.color);
    }
}

// ============================================================================
// Plugin
// ============================================================================

#[derive(Debug)]
pub struct FogPlugin {
    vertex: FogVertexFragment,
    fragment: FogFragmentFragment,
}

impl FogPlugin {
    #[must_use]
    pub fn new(params: FogParams) -> Self {
        Self {
            vertex: FogVertexFragment {
                near: params.near,
                far: params.far,
                enabled: true,
                vars: None,
                near_loc: Location::NOT_FOUND,
                far_loc: Location::NOT_FOUND,
                enabled_loc: Location::NOT_FOUND,
            },
            fragment: FogFragmentFragment {
                color: params.color,
                vars: None,
                color_loc: Location::NOT_FOUND,
            },
        }
    }

    #[must_use]
    pub fn params(&self) -> FogParams {
        FogParams::linear(self.fragment.color, self.vertex.near, self.vertex.far)
    }

    /// Takes effect at the next `apply_params`; no rebuild needed.
    pub fn set_params(&mut self, params: FogParams) {
        self.vertex.near = params.near;
        self.vertex.far = params.far;
        self.fragment.color = params.color;
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.vertex.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.vertex.enabled = enabled;
    }
}

impl Default for FogPlugin {
    fn default() -> Self {
        Self::new(FogParams::default())
    }
}

impl MaterialPlugin for FogPlugin {
    fn plugin_id(&self) -> &str {
        "fog"
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

    impl_plugin_any!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::render_block;
    use crate::errors::ShaderError;
    use crate::shader::StageRegistry;

    fn emit(fragment: &mut dyn ShaderFragment, stage: ShaderStage, core: &[ShaderVarKey]) -> String {
        let mut reg = StageRegistry::new(stage);
        {
            let mut decl = reg.begin("core").unwrap();
            for key in core {
                decl.key(*key).unwrap();
            }
        }
        let id = fragment.shader_id().to_string();
        fragment.declare(&mut reg.begin(&id).unwrap()).unwrap();
        let symbols = reg.symbols(std::iter::empty::<String>());
        let mut body = BodyBuilder::new(stage, true);
        fragment.main(&mut body, &symbols).unwrap();
        let mut out = String::new();
        render_block(&body.take_segment().unwrap(), 0, &mut out);
        out
    }

    #[test]
    fn vertex_density_is_guarded_by_the_enable_flag() {
        let mut plugin = FogPlugin::default();
        let out = emit(&mut plugin.vertex, ShaderStage::Vertex, &[]);
        assert_eq!(
            out,
            "vFogDensity = 0.0;\n\
             if (uFogEnabled == true) {\n    \
             vFogDensity = (gl_Position.z - uFogNear) / (uFogFar - uFogNear);\n    \
             vFogDensity = clamp(vFogDensity, 0.0, 1.0);\n\
             }\n"
        );
    }

    #[test]
    fn fragment_mixes_towards_fog_color() {
        let mut plugin = FogPlugin::default();
        let out = emit(&mut plugin.fragment, ShaderStage::Fragment, &[ShaderVarKey::GColor]);
        assert_eq!(out, "gColor.rgb = mix(gColor.rgb, uFogColor, vFogDensity);\n");
    }

    #[test]
    fn main_before_declare_is_rejected() {
        let plugin = FogPlugin::default();
        let symbols = StageRegistry::new(ShaderStage::Vertex).symbols(std::iter::empty::<String>());
        let mut body = BodyBuilder::new(ShaderStage::Vertex, false);
        body.set_owner(FOG_VERTEX_SHADER_FRAGMENT);
        let err = plugin.vertex.main(&mut body, &symbols).unwrap_err();
        assert!(
            matches!(err, ShaderError::InvalidStatement { ref owner, .. } if owner == FOG_VERTEX_SHADER_FRAGMENT),
            "{err}"
        );
    }

    #[test]
    fn params_round_trip_through_setters() {
        let mut plugin = FogPlugin::default();
        let params = FogParams::linear(Vec3::new(0.2, 0.3, 0.4), 5.0, 50.0);
        plugin.set_params(params);
        plugin.set_enabled(false);
        assert_eq!(plugin.params(), params);
        assert!(!plugin.is_enabled());
    }
}
