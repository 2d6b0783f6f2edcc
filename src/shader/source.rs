//! Final source rendering.
//!
//! The declaration sections and the rendered `main()` body are laid out by a
//! minijinja template (`templates/stage.glsl`) embedded into the binary.
//! Order: directives, precision statements, uniforms, attributes, varyings,
//! consts, globals, helper functions, `main()`.

use std::borrow::Cow;
use std::sync::OnceLock;

use minijinja::{Environment, Error, ErrorKind, UndefinedBehavior, syntax::SyntaxConfig};
use rust_embed::RustEmbed;
use serde::Serialize;
use xxhash_rust::xxh3::xxh3_128;

use crate::dsl::{ShaderStage, StorageQualifier};
use crate::errors::Result;

use super::registry::StageRegistry;

static SHADER_ENV: OnceLock<Environment<'static>> = OnceLock::new();

const STAGE_TEMPLATE: &str = "stage.glsl";

#[derive(RustEmbed)]
#[folder = "src/shader/templates"]
struct ShaderTemplates;

fn build_env() -> std::result::Result<Environment<'static>, Error> {
    let mut env = Environment::new();

    let syntax = SyntaxConfig::builder()
        .block_delimiters("{$", "$}")
        .variable_delimiters("{{", "}}")
        .line_statement_prefix("$$")
        .build()?;

    env.set_syntax(syntax);
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.set_keep_trailing_newline(true);
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_loader(template_loader);

    Ok(env)
}

/// Shared template environment, built on first use.
pub fn get_env() -> Result<&'static Environment<'static>> {
    if let Some(env) = SHADER_ENV.get() {
        return Ok(env);
    }
    let env = build_env()?;
    Ok(SHADER_ENV.get_or_init(|| env))
}

fn template_loader(name: &str) -> std::result::Result<Option<String>, Error> {
    let filename = if name.ends_with(".glsl") {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("{name}.glsl"))
    };

    let Some(file) = ShaderTemplates::get(filename.as_ref()) else {
        return Ok(None);
    };
    match std::str::from_utf8(file.data.as_ref()) {
        Ok(source) => Ok(Some(source.to_string())),
        Err(e) => Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("template `{filename}` is not valid UTF-8: {e}"),
        )),
    }
}

#[derive(Serialize)]
struct Section {
    name: &'static str,
    lines: Vec<String>,
}

#[derive(Serialize)]
struct StageContext<'a> {
    stage: &'static str,
    directives: &'a [String],
    precisions: Vec<String>,
    sections: Vec<Section>,
    functions: Vec<&'a str>,
    body: &'a str,
}

/// Final source text of one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    pub stage: ShaderStage,
    pub text: String,
    /// xxh3-128 of `text`.
    pub hash: u128,
}

impl ShaderSource {
    #[must_use]
    pub fn new(stage: ShaderStage, text: String) -> Self {
        let hash = xxh3_128(text.as_bytes());
        Self { stage, text, hash }
    }
}

const SECTIONS: [(&str, StorageQualifier); 5] = [
    ("uniforms", StorageQualifier::Uniform),
    ("attributes", StorageQualifier::Attribute),
    ("varyings", StorageQualifier::Varying),
    ("consts", StorageQualifier::Const),
    ("globals", StorageQualifier::Global),
];

/// Renders the declarations of `registry` around an already rendered body.
pub fn render_stage(registry: &StageRegistry, body: &str) -> Result<ShaderSource> {
    let env = get_env()?;
    let template = env.get_template(STAGE_TEMPLATE)?;

    let ctx = StageContext {
        stage: registry.stage().as_str(),
        directives: registry.directives(),
        precisions: registry
            .precisions()
            .iter()
            .map(|(ty, p)| format!("precision {} {ty};", p.keyword()))
            .collect(),
        sections: SECTIONS
            .iter()
            .map(|&(name, qualifier)| Section {
                name,
                lines: registry
                    .with_qualifier(qualifier)
                    .map(super::var::ShaderVar::declaration)
                    .collect(),
            })
            .collect(),
        functions: registry.functions().iter().map(|f| f.source.as_str()).collect(),
        body,
    };

    let text = template.render(&ctx)?;
    Ok(ShaderSource::new(registry.stage(), text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::{DataType, Precision};
    use crate::shader::keys::ShaderVarKey;

    #[test]
    fn sections_follow_declaration_order() {
        let mut reg = StageRegistry::new(ShaderStage::Vertex);
        {
            let mut decl = reg.begin("core").unwrap();
            decl.directive("#define LOOM 1");
            decl.precision(DataType::Float, Precision::Mediump);
            decl.key(ShaderVarKey::GPosition).unwrap();
            decl.constant("cScale", DataType::Float, 2.0).unwrap();
            decl.key(ShaderVarKey::VTextureCoord).unwrap();
            decl.key(ShaderVarKey::Position).unwrap();
            decl.key(ShaderVarKey::MvpMatrix).unwrap();
            decl.function("float twice(float x)", "float twice(float x) {\n    return x * cScale;\n}")
                .unwrap();
        }
        let source = render_stage(&reg, "    gl_Position = gPosition;\n").unwrap();
        let text = &source.text;

        let pos = |needle: &str| text.find(needle).unwrap_or_else(|| panic!("missing {needle}\n{text}"));
        assert!(pos("#define LOOM 1") < pos("precision mediump float;"));
        assert!(pos("precision mediump float;") < pos("uniform mat4 uMVPMatrix;"));
        assert!(pos("uniform mat4 uMVPMatrix;") < pos("attribute vec4 aPosition;"));
        assert!(pos("attribute vec4 aPosition;") < pos("varying vec2 vTextureCoord;"));
        assert!(pos("varying vec2 vTextureCoord;") < pos("const float cScale = 2.0;"));
        assert!(pos("const float cScale = 2.0;") < pos("vec4 gPosition;"));
        assert!(pos("vec4 gPosition;") < pos("float twice(float x) {"));
        assert!(text.ends_with("void main() {\n    gl_Position = gPosition;\n}\n"), "{text}");
    }

    #[test]
    fn same_input_gives_same_hash() {
        let reg = StageRegistry::new(ShaderStage::Fragment);
        let a = render_stage(&reg, "").unwrap();
        let b = render_stage(&reg, "").unwrap();
        assert_eq!(a, b);
        assert!(a.text.contains("void main() {\n}"));
    }
}
