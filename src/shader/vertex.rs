//! Core Vertex Shader
//!
//! Copies the vertex attributes into the shared globals, transforms the
//! position (through the bone matrix when a skinning fragment is attached) and
//! writes the varyings the fragment stage reads.

use glam::{Mat3, Mat4, Vec4};

use crate::backend::{Location, VertexStreams};
use crate::dsl::func::{cast, normalize};
use crate::dsl::{BodyBuilder, DataType, Precision, ShaderStage, ShaderValue};
use crate::errors::Result;
use crate::material::handles::{AttributeBinder, LocationResolver, UniformWriter};
use crate::plugin::skeletal::SKELETAL_ANIMATION_VERTEX;

use super::keys::ShaderVarKey as K;
use super::registry::{Declarations, SymbolTable};
use super::{CorePhase, CoreShader, ShaderFeatures};

/// CPU-side values pushed every activation.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexParams {
    pub mvp_matrix: Mat4,
    pub normal_matrix: Mat3,
    pub model_matrix: Mat4,
    pub inverse_view_matrix: Mat4,
    pub model_view_matrix: Mat4,
    pub color: Vec4,
    pub time: f32,
}

impl Default for VertexParams {
    fn default() -> Self {
        Self {
            mvp_matrix: Mat4::IDENTITY,
            normal_matrix: Mat3::IDENTITY,
            model_matrix: Mat4::IDENTITY,
            inverse_view_matrix: Mat4::IDENTITY,
            model_view_matrix: Mat4::IDENTITY,
            color: Vec4::ONE,
            time: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct VertexLocations {
    mvp_matrix: Location,
    normal_matrix: Location,
    model_matrix: Location,
    inverse_view_matrix: Location,
    model_view_matrix: Location,
    color: Location,
    time: Location,
    position: Location,
    tex_coord: Location,
    normal: Location,
    vertex_color: Location,
}

#[derive(Debug, Clone)]
pub struct VertexShader {
    features: ShaderFeatures,
    precision: Precision,
    locations: VertexLocations,
    pub params: VertexParams,
}

impl VertexShader {
    #[must_use]
    pub fn new(features: ShaderFeatures, precision: Precision) -> Self {
        Self {
            features,
            precision,
            locations: VertexLocations::default(),
            params: VertexParams::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn features(&self) -> ShaderFeatures {
        self.features
    }

    /// Binds the geometry streams to the resolved attribute locations.
    pub fn bind_attributes(&self, binder: &mut AttributeBinder<'_>, streams: &VertexStreams) {
        let loc = &self.locations;
        binder.bind(loc.position, streams.positions);
        binder.bind(loc.normal, streams.normals);
        binder.bind(loc.tex_coord, streams.tex_coords);
        if self.features.contains(ShaderFeatures::VERTEX_COLORS) {
            binder.bind(loc.vertex_color, streams.colors);
        }
    }

    fn emit_inputs(&self, body: &mut BodyBuilder) {
        body.assign(&K::GPosition.var(), &K::Position.var());
        body.assign(&K::GNormal.var(), &K::Normal.var());
        body.assign(&K::GTextureCoord.var(), &K::TextureCoord.var());
        if self.features.contains(ShaderFeatures::VERTEX_COLORS) {
            body.assign(&K::GColor.var(), &K::VertexColor.var());
        } else {
            body.assign(&K::GColor.var(), &K::Color.var());
        }
    }

    fn emit_transform(body: &mut BodyBuilder, symbols: &SymbolTable) -> Result<()> {
        let gl_position = crate::dsl::Expr::builtin_var("gl_Position", DataType::Vec4);
        let mvp = K::MvpMatrix.var();
        let normal_matrix = K::NormalMatrix.var();
        let position = K::GPosition.var();
        let normal = K::GNormal.var();

        if symbols.has_fragment(SKELETAL_ANIMATION_VERTEX) {
            let bone = symbols.require(K::GBoneTransfMatrix)?;
            body.assign(gl_position, &mvp * &bone * &position);
            body.assign(
                &K::VNormal.var(),
                normalize(&normal_matrix * cast(DataType::Mat3, &bone) * &normal),
            );
        } else {
            body.assign(gl_position, &mvp * &position);
            body.assign(&K::VNormal.var(), normalize(&normal_matrix * &normal));
        }
        Ok(())
    }

    fn emit_output(&self, body: &mut BodyBuilder) {
        body.assign(&K::VTextureCoord.var(), &K::GTextureCoord.var());
        if self.features.contains(ShaderFeatures::CUBE_MAPS) {
            let cube = K::VCubeTextureCoord.var();
            body.assign(&cube, K::Position.var().xyz());
            if self.features.contains(ShaderFeatures::SKY_TEXTURE) {
                body.assign_mul(cube.x(), -1.0);
            }
        }
        body.assign(&K::VColor.var(), &K::GColor.var());
    }
}

impl CoreShader for VertexShader {
    fn stage(&self) -> ShaderStage {
        ShaderStage::Vertex
    }

    fn shader_id(&self) -> &'static str {
        "core_vertex"
    }

    fn declare(&mut self, decl: &mut Declarations<'_>) -> Result<()> {
        decl.precision(DataType::Float, self.precision);

        for key in [
            K::MvpMatrix,
            K::NormalMatrix,
            K::ModelMatrix,
            K::InverseViewMatrix,
            K::ModelViewMatrix,
            K::Color,
        ] {
            decl.key(key)?;
        }
        if self.features.contains(ShaderFeatures::TIME) {
            decl.key(K::Time)?;
        }

        decl.key(K::Position)?;
        decl.key(K::TextureCoord)?;
        decl.key(K::Normal)?;
        if self.features.contains(ShaderFeatures::VERTEX_COLORS) {
            decl.key(K::VertexColor)?;
        }

        decl.key(K::VTextureCoord)?;
        if self.features.contains(ShaderFeatures::CUBE_MAPS) {
            decl.key(K::VCubeTextureCoord)?;
        }
        decl.key(K::VNormal)?;
        decl.key(K::VColor)?;
        decl.key(K::VEyeDir)?;

        for key in [K::GPosition, K::GNormal, K::GColor, K::GTextureCoord] {
            decl.key(key)?;
        }
        Ok(())
    }

    fn emit(&self, phase: CorePhase, body: &mut BodyBuilder, symbols: &SymbolTable) -> Result<()> {
        match phase {
            CorePhase::Inputs => self.emit_inputs(body),
            CorePhase::Transform => Self::emit_transform(body, symbols)?,
            CorePhase::Lighting => {
                let eye = K::ModelViewMatrix.var() * &K::GPosition.var();
                body.assign(&K::VEyeDir.var(), cast(DataType::Vec3, eye));
            }
            CorePhase::Output => self.emit_output(body),
        }
        Ok(())
    }

    fn set_locations(&mut self, resolver: &mut LocationResolver<'_>) {
        self.locations = VertexLocations {
            mvp_matrix: resolver.uniform(&K::MvpMatrix.var()),
            normal_matrix: resolver.uniform(&K::NormalMatrix.var()),
            model_matrix: resolver.uniform(&K::ModelMatrix.var()),
            inverse_view_matrix: resolver.uniform(&K::InverseViewMatrix.var()),
            model_view_matrix: resolver.uniform(&K::ModelViewMatrix.var()),
            color: resolver.uniform(&K::Color.var()),
            time: if self.features.contains(ShaderFeatures::TIME) {
                resolver.uniform(&K::Time.var())
            } else {
                Location::NOT_FOUND
            },
            position: resolver.attribute(&K::Position.var()),
            tex_coord: resolver.attribute(&K::TextureCoord.var()),
            normal: resolver.attribute(&K::Normal.var()),
            vertex_color: if self.features.contains(ShaderFeatures::VERTEX_COLORS) {
                resolver.attribute(&K::VertexColor.var())
            } else {
                Location::NOT_FOUND
            },
        };
    }

    fn apply_params(&self, writer: &mut UniformWriter<'_>) {
        let loc = &self.locations;
        let p = &self.params;
        writer.set(loc.mvp_matrix, p.mvp_matrix);
        writer.set(loc.normal_matrix, p.normal_matrix);
        writer.set(loc.model_matrix, p.model_matrix);
        writer.set(loc.inverse_view_matrix, p.inverse_view_matrix);
        writer.set(loc.model_view_matrix, p.model_view_matrix);
        writer.set(loc.color, p.color);
        writer.set(loc.time, p.time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::render_block;
    use crate::shader::StageRegistry;

    fn emit_all(shader: &mut VertexShader, fragments: &[&str]) -> Result<String> {
        let mut reg = StageRegistry::new(ShaderStage::Vertex);
        shader.declare(&mut reg.begin("core_vertex").unwrap())?;
        let symbols = reg.symbols(fragments.iter().copied());
        let mut body = BodyBuilder::new(ShaderStage::Vertex, false);
        let mut out = String::new();
        for phase in [CorePhase::Inputs, CorePhase::Transform, CorePhase::Lighting, CorePhase::Output] {
            shader.emit(phase, &mut body, &symbols)?;
            render_block(&body.take_segment()?, 1, &mut out);
        }
        Ok(out)
    }

    #[test]
    fn plain_transform() {
        let mut shader = VertexShader::new(ShaderFeatures::empty(), Precision::Mediump);
        let out = emit_all(&mut shader, &[]).unwrap();
        assert!(out.contains("gl_Position = uMVPMatrix * gPosition;"), "{out}");
        assert!(out.contains("vNormal = normalize(uNormalMatrix * gNormal);"), "{out}");
        assert!(out.contains("gColor = uColor;"), "{out}");
        assert!(out.contains("vEyeDir = vec3(uModelViewMatrix * gPosition);"), "{out}");
        assert!(!out.contains("vCubeTextureCoord"), "{out}");
    }

    #[test]
    fn vertex_colors_and_sky_cube() {
        let features =
            ShaderFeatures::VERTEX_COLORS | ShaderFeatures::CUBE_MAPS | ShaderFeatures::SKY_TEXTURE;
        let mut shader = VertexShader::new(features, Precision::Mediump);
        let out = emit_all(&mut shader, &[]).unwrap();
        assert!(out.contains("gColor = aVertexColor;"), "{out}");
        assert!(out.contains("vCubeTextureCoord = aPosition.xyz;"), "{out}");
        assert!(out.contains("vCubeTextureCoord.x *= -1.0;"), "{out}");
    }

    #[test]
    fn skinning_fragment_without_bone_global_is_fatal() {
        let mut shader = VertexShader::new(ShaderFeatures::empty(), Precision::Mediump);
        let err = emit_all(&mut shader, &[SKELETAL_ANIMATION_VERTEX]).unwrap_err();
        assert!(matches!(err, crate::errors::ShaderError::MissingGlobal { .. }));
    }
}
