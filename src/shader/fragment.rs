//! Core Fragment Shader
//!
//! Reads the interpolated varyings into the shared globals, samples the
//! material's own textures, applies colour influence and shadowing and writes
//! `gl_FragColor`.

use crate::backend::{Location, TextureTarget};
use crate::dsl::func::{normalize, texture2d, texture_cube};
use crate::dsl::{BodyBuilder, DataType, Expr, Precision, ShaderStage, ShaderValue};
use crate::errors::Result;
use crate::material::handles::{LocationResolver, TextureBinder, UniformWriter};
use crate::material::textures::{MaterialTexture, TextureKind};

use super::keys::ShaderVarKey as K;
use super::registry::{Declarations, SymbolTable};
use super::var::ShaderVar;
use super::{CorePhase, CoreShader, ShaderFeatures};

const EXTERNAL_IMAGE_EXTENSION: &str = "#extension GL_OES_EGL_image_external : require";

/// CPU-side values pushed every activation.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentParams {
    pub color_influence: f32,
    pub time: f32,
}

impl Default for FragmentParams {
    fn default() -> Self {
        Self {
            color_influence: 1.0,
            time: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
struct CoreSampler {
    var: ShaderVar,
    kind: TextureKind,
    location: Location,
}

#[derive(Debug, Clone)]
pub struct FragmentShader {
    features: ShaderFeatures,
    precision: Precision,
    samplers: Vec<CoreSampler>,
    color_influence: Location,
    time: Location,
    pub params: FragmentParams,
}

impl FragmentShader {
    #[must_use]
    pub fn new(features: ShaderFeatures, precision: Precision, textures: &[MaterialTexture]) -> Self {
        let samplers = textures
            .iter()
            .map(|t| CoreSampler {
                var: ShaderVar::uniform(t.name.clone(), t.sampler_type()),
                kind: t.kind,
                location: Location::NOT_FOUND,
            })
            .collect();
        Self {
            features,
            precision,
            samplers,
            color_influence: Location::NOT_FOUND,
            time: Location::NOT_FOUND,
            params: FragmentParams::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn features(&self) -> ShaderFeatures {
        self.features
    }

    #[must_use]
    pub fn texture_count(&self) -> u32 {
        self.samplers.len() as u32
    }

    /// Binds the material textures to units `0..n`, in declaration order.
    pub fn bind_textures(&self, textures: &[MaterialTexture], binder: &mut TextureBinder<'_>) {
        for (unit, (sampler, texture)) in (0u32..).zip(self.samplers.iter().zip(textures)) {
            binder.bind(unit, texture.texture, sampler.location);
        }
    }

    pub fn unbind_textures(&self, textures: &[MaterialTexture], binder: &mut TextureBinder<'_>) {
        for (unit, texture) in (0u32..).zip(textures) {
            binder.unbind(unit, texture.texture.target);
        }
    }

    fn emit_inputs(&self, body: &mut BodyBuilder) {
        let color = K::GColor.var();
        let tex_coord = K::GTextureCoord.var();

        body.assign(&tex_coord, &K::VTextureCoord.var());
        body.assign(&color, &K::VColor.var());
        body.assign(&K::GShadowValue.var(), 0.0);
        body.assign(&K::GSpecularValue.var(), 1.0);

        for sampler in &self.samplers {
            match sampler.kind {
                TextureKind::Diffuse => {
                    body.assign_mul(&color, texture2d(&sampler.var, &tex_coord));
                }
                TextureKind::CubeMap => {
                    body.assign_mul(&color, texture_cube(&sampler.var, &K::VCubeTextureCoord.var()));
                }
                TextureKind::Sampler => {}
            }
        }
    }

    fn has_cube_samplers(&self) -> bool {
        self.samplers.iter().any(|s| s.kind == TextureKind::CubeMap)
    }
}

impl CoreShader for FragmentShader {
    fn stage(&self) -> ShaderStage {
        ShaderStage::Fragment
    }

    fn shader_id(&self) -> &'static str {
        "core_fragment"
    }

    fn declare(&mut self, decl: &mut Declarations<'_>) -> Result<()> {
        if self
            .samplers
            .iter()
            .any(|s| s.var.data_type() == DataType::SamplerExternalOes)
        {
            decl.directive(EXTERNAL_IMAGE_EXTENSION);
        }
        decl.precision(DataType::Float, self.precision);

        decl.key(K::ColorInfluence)?;
        if self.features.contains(ShaderFeatures::TIME) {
            decl.key(K::Time)?;
        }
        for sampler in &self.samplers {
            decl.declare(sampler.var.clone())?;
        }

        decl.key(K::VTextureCoord)?;
        if self.features.contains(ShaderFeatures::CUBE_MAPS) || self.has_cube_samplers() {
            decl.key(K::VCubeTextureCoord)?;
        }
        decl.key(K::VNormal)?;
        decl.key(K::VColor)?;

        for key in [
            K::GColor,
            K::GNormal,
            K::GTextureCoord,
            K::GShadowValue,
            K::GSpecularValue,
        ] {
            decl.key(key)?;
        }
        Ok(())
    }

    fn emit(&self, phase: CorePhase, body: &mut BodyBuilder, _symbols: &SymbolTable) -> Result<()> {
        let color = K::GColor.var();
        match phase {
            CorePhase::Inputs => self.emit_inputs(body),
            CorePhase::Transform => {
                body.assign(&K::GNormal.var(), normalize(&K::VNormal.var()));
                body.assign_mul(&color, &K::ColorInfluence.var());
            }
            CorePhase::Lighting => {
                body.assign_mul(color.rgb(), 1.0 - Expr::from(&K::GShadowValue.var()));
            }
            CorePhase::Output => {
                body.assign(Expr::builtin_var("gl_FragColor", DataType::Vec4), &color);
            }
        }
        Ok(())
    }

    fn set_locations(&mut self, resolver: &mut LocationResolver<'_>) {
        self.color_influence = resolver.uniform(&K::ColorInfluence.var());
        self.time = if self.features.contains(ShaderFeatures::TIME) {
            resolver.uniform(&K::Time.var())
        } else {
            Location::NOT_FOUND
        };
        for sampler in &mut self.samplers {
            sampler.location = resolver.uniform(&sampler.var);
        }
    }

    fn apply_params(&self, writer: &mut UniformWriter<'_>) {
        writer.set(self.color_influence, self.params.color_influence);
        writer.set(self.time, self.params.time);
    }
}

/// Texture target a sampler of `kind` expects.
#[must_use]
pub fn expected_target(kind: TextureKind) -> Option<TextureTarget> {
    match kind {
        TextureKind::Diffuse => Some(TextureTarget::Texture2D),
        TextureKind::CubeMap => Some(TextureTarget::CubeMap),
        TextureKind::Sampler => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TextureRef;
    use crate::dsl::render_block;
    use crate::shader::StageRegistry;

    fn emit_all(shader: &mut FragmentShader) -> (StageRegistry, String) {
        let mut reg = StageRegistry::new(ShaderStage::Fragment);
        shader.declare(&mut reg.begin("core_fragment").unwrap()).unwrap();
        let symbols = reg.symbols(std::iter::empty::<String>());
        let mut body = BodyBuilder::new(ShaderStage::Fragment, true);
        let mut out = String::new();
        for phase in [CorePhase::Inputs, CorePhase::Transform, CorePhase::Lighting, CorePhase::Output] {
            shader.emit(phase, &mut body, &symbols).unwrap();
            render_block(&body.take_segment().unwrap(), 1, &mut out);
        }
        (reg, out)
    }

    #[test]
    fn untextured_body() {
        let mut shader = FragmentShader::new(ShaderFeatures::empty(), Precision::Mediump, &[]);
        let (_, out) = emit_all(&mut shader);
        assert!(out.contains("gShadowValue = 0.0;"), "{out}");
        assert!(out.contains("gColor *= uColorInfluence;"), "{out}");
        assert!(out.contains("gColor.rgb *= 1.0 - gShadowValue;"), "{out}");
        assert!(out.trim_end().ends_with("gl_FragColor = gColor;"), "{out}");
    }

    #[test]
    fn material_textures_become_samplers() {
        let textures = [
            MaterialTexture::diffuse("uDiffuseTexture", TextureRef::texture_2d(1)),
            MaterialTexture::cube_map("uCubeTexture", TextureRef::cube_map(2)),
        ];
        let mut shader = FragmentShader::new(ShaderFeatures::CUBE_MAPS, Precision::Mediump, &textures);
        let (reg, out) = emit_all(&mut shader);
        assert_eq!(reg.get("uCubeTexture").unwrap().data_type(), DataType::SamplerCube);
        assert!(out.contains("gColor *= texture2D(uDiffuseTexture, gTextureCoord);"), "{out}");
        assert!(out.contains("gColor *= textureCube(uCubeTexture, vCubeTextureCoord);"), "{out}");
        assert_eq!(shader.texture_count(), 2);
    }

    #[test]
    fn external_textures_enable_the_extension() {
        let textures = [MaterialTexture::diffuse(
            "uVideo",
            TextureRef {
                handle: crate::backend::TextureHandle(9),
                target: TextureTarget::External,
            },
        )];
        let mut shader = FragmentShader::new(ShaderFeatures::empty(), Precision::Mediump, &textures);
        let (reg, _) = emit_all(&mut shader);
        assert_eq!(reg.directives(), &[EXTERNAL_IMAGE_EXTENSION.to_string()]);
    }
}
