//! Headless Backend
//!
//! A recording stand-in for a native graphics binding, used by tests, tools and
//! benchmarks that need the full compose → link → apply cycle without a GPU.
//!
//! It behaves like a strict but simple GLSL driver:
//! - each stage must define `main()` and have balanced braces;
//! - every varying the fragment stage reads must be declared by the vertex stage
//!   with the same type;
//! - a uniform or attribute gets a location only if its name is referenced
//!   somewhere outside its own declaration, otherwise it is "optimised out";
//! - context loss drops every program and bumps the context generation.
//!
//! Every state-changing call is recorded in order for later inspection.

use rustc_hash::FxHashMap;

use crate::dsl::ShaderStage;
use crate::errors::CompileError;

use super::{
    GraphicsBackend, Location, ProgramHandle, TextureRef, TextureTarget, UniformValue,
    VertexBuffer,
};

/// A call that changed backend state.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    UseProgram(ProgramHandle),
    SetUniform {
        location: Location,
        value: UniformValue<'static>,
    },
    BindAttribute {
        location: Location,
        buffer: VertexBuffer,
    },
    BindTexture {
        unit: u32,
        texture: TextureRef,
    },
    UnbindTexture {
        unit: u32,
        target: TextureTarget,
    },
    DeleteProgram(ProgramHandle),
}

#[derive(Debug, Default)]
struct LinkedProgram {
    uniforms: FxHashMap<String, Location>,
    attributes: FxHashMap<String, Location>,
}

#[derive(Debug)]
pub struct HeadlessBackend {
    next_program: u32,
    programs: FxHashMap<ProgramHandle, LinkedProgram>,
    generation: u64,
    max_texture_units: u32,
    pending_failure: Option<(Option<ShaderStage>, String)>,
    compile_count: usize,
    calls: Vec<BackendCall>,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_program: 1,
            programs: FxHashMap::default(),
            generation: 0,
            max_texture_units: 8,
            pending_failure: None,
            compile_count: 0,
            calls: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_max_texture_units(mut self, units: u32) -> Self {
        self.max_texture_units = units;
        self
    }

    /// Makes the next `compile_and_link` fail with `log`.
    /// `stage == None` simulates a link failure.
    pub fn fail_next_compile(&mut self, stage: Option<ShaderStage>, log: impl Into<String>) {
        self.pending_failure = Some((stage, log.into()));
    }

    /// Destroys every program, as an app going to the background would.
    pub fn lose_context(&mut self) {
        self.programs.clear();
        self.generation += 1;
    }

    #[must_use]
    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Number of `compile_and_link` invocations, successful or not.
    #[must_use]
    pub fn compile_count(&self) -> usize {
        self.compile_count
    }

    #[must_use]
    pub fn is_alive(&self, program: ProgramHandle) -> bool {
        self.programs.contains_key(&program)
    }

    /// Most recent value written to the uniform `name` of `program`.
    #[must_use]
    pub fn last_uniform(&self, program: ProgramHandle, name: &str) -> Option<&UniformValue<'static>> {
        let location = self.uniform_location(program, name);
        if !location.is_valid() {
            return None;
        }
        self.calls.iter().rev().find_map(|call| match call {
            BackendCall::SetUniform { location: l, value } if *l == location => Some(value),
            _ => None,
        })
    }

    /// Texture units bound since the calls were last cleared, in call order.
    #[must_use]
    pub fn bound_units(&self) -> Vec<u32> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::BindTexture { unit, .. } => Some(*unit),
                _ => None,
            })
            .collect()
    }

    fn fail(stage: Option<ShaderStage>, source: &str, log: String) -> CompileError {
        CompileError {
            stage,
            shader_source: source.to_string(),
            log,
        }
    }
}

impl GraphicsBackend for HeadlessBackend {
    fn compile_and_link(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<ProgramHandle, CompileError> {
        self.compile_count += 1;

        if let Some((stage, log)) = self.pending_failure.take() {
            let shader_source = match stage {
                Some(ShaderStage::Vertex) => vertex_source.to_string(),
                Some(ShaderStage::Fragment) => fragment_source.to_string(),
                None => format!("{vertex_source}\n{fragment_source}"),
            };
            return Err(CompileError {
                stage,
                shader_source,
                log,
            });
        }

        for (stage, source) in [
            (ShaderStage::Vertex, vertex_source),
            (ShaderStage::Fragment, fragment_source),
        ] {
            check_stage(source).map_err(|log| Self::fail(Some(stage), source, log))?;
        }

        let vertex_varyings: FxHashMap<&str, &str> =
            declarations(vertex_source, "varying").collect();
        for (name, ty) in declarations(fragment_source, "varying") {
            match vertex_varyings.get(name) {
                Some(vty) if *vty == ty => {}
                Some(vty) => {
                    return Err(Self::fail(
                        None,
                        &format!("{vertex_source}\n{fragment_source}"),
                        format!("varying `{name}` is {vty} in the vertex stage but {ty} in the fragment stage"),
                    ));
                }
                None => {
                    return Err(Self::fail(
                        None,
                        &format!("{vertex_source}\n{fragment_source}"),
                        format!("varying `{name}` is not written by the vertex stage"),
                    ));
                }
            }
        }

        let sources = [vertex_source, fragment_source];
        let mut program = LinkedProgram::default();
        for source in sources {
            for (name, _) in declarations(source, "uniform") {
                if !program.uniforms.contains_key(name) && is_referenced(name, &sources) {
                    let location = Location::new(program.uniforms.len() as i32);
                    program.uniforms.insert(name.to_string(), location);
                }
            }
        }
        for (name, _) in declarations(vertex_source, "attribute") {
            if !program.attributes.contains_key(name) && is_referenced(name, &sources) {
                let location = Location::new(program.attributes.len() as i32);
                program.attributes.insert(name.to_string(), location);
            }
        }

        let handle = ProgramHandle::new(self.next_program);
        self.next_program += 1;
        self.programs.insert(handle, program);
        Ok(handle)
    }

    fn attribute_location(&self, program: ProgramHandle, name: &str) -> Location {
        self.programs
            .get(&program)
            .and_then(|p| p.attributes.get(name).copied())
            .unwrap_or(Location::NOT_FOUND)
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Location {
        self.programs
            .get(&program)
            .and_then(|p| p.uniforms.get(name).copied())
            .unwrap_or(Location::NOT_FOUND)
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.calls.push(BackendCall::UseProgram(program));
    }

    fn set_uniform(&mut self, location: Location, value: UniformValue<'_>) {
        self.calls.push(BackendCall::SetUniform {
            location,
            value: value.into_owned(),
        });
    }

    fn bind_vertex_attribute(&mut self, location: Location, buffer: VertexBuffer) {
        self.calls.push(BackendCall::BindAttribute { location, buffer });
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureRef) {
        self.calls.push(BackendCall::BindTexture { unit, texture });
    }

    fn unbind_texture(&mut self, unit: u32, target: TextureTarget) {
        self.calls.push(BackendCall::UnbindTexture { unit, target });
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program);
        self.calls.push(BackendCall::DeleteProgram(program));
    }

    fn max_texture_units(&self) -> u32 {
        self.max_texture_units
    }

    fn context_generation(&self) -> u64 {
        self.generation
    }
}

// ============================================================================
// Source inspection
// ============================================================================

const QUALIFIERS: [&str; 3] = ["uniform", "attribute", "varying"];
const PRECISIONS: [&str; 3] = ["lowp", "mediump", "highp"];

fn check_stage(source: &str) -> Result<(), String> {
    if !source.contains("void main()") {
        return Err("no definition of main() found".to_string());
    }
    let mut depth = 0i64;
    for (line_no, line) in source.lines().enumerate() {
        for c in line.chars() {
            match c {
                '{' => depth += 1,
                '}' => depth -= 1,
                _ => {}
            }
            if depth < 0 {
                return Err(format!("ERROR: 0:{}: unexpected '}}'", line_no + 1));
            }
        }
    }
    if depth != 0 {
        return Err("ERROR: unexpected end of source, missing '}'".to_string());
    }
    Ok(())
}

/// `(name, type)` of every declaration with `qualifier`.
fn declarations<'s>(source: &'s str, qualifier: &'s str) -> impl Iterator<Item = (&'s str, &'s str)> {
    source.lines().filter_map(move |line| {
        let rest = line.trim_start().strip_prefix(qualifier)?.strip_prefix(' ')?;
        let rest = rest.split([';', '[', '=']).next()?;
        let mut tokens = rest
            .split_whitespace()
            .filter(|t| !PRECISIONS.contains(t));
        let ty = tokens.next()?;
        let name = tokens.next()?;
        Some((name, ty))
    })
}

fn is_declaration(line: &str) -> bool {
    let line = line.trim_start();
    QUALIFIERS
        .iter()
        .any(|q| line.strip_prefix(q).is_some_and(|rest| rest.starts_with(' ')))
}

fn is_referenced(name: &str, sources: &[&str]) -> bool {
    sources.iter().any(|source| {
        source
            .lines()
            .filter(|line| !is_declaration(line))
            .flat_map(|line| line.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_')))
            .any(|token| token == name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VS: &str = "uniform mat4 uMVPMatrix;\nuniform float uUnused;\nattribute vec4 aPosition;\nattribute vec3 aNormal;\nvarying vec2 vUv;\nvoid main() {\n    gl_Position = uMVPMatrix * aPosition;\n    vUv = vec2(0.0);\n}";
    const FS: &str = "precision mediump float;\nvarying vec2 vUv;\nvoid main() {\n    gl_FragColor = vec4(vUv, 0.0, 1.0);\n}";

    #[test]
    fn unused_variables_have_no_location() {
        let mut backend = HeadlessBackend::new();
        let program = backend.compile_and_link(VS, FS).unwrap();
        assert!(backend.uniform_location(program, "uMVPMatrix").is_valid());
        assert!(!backend.uniform_location(program, "uUnused").is_valid());
        assert!(backend.attribute_location(program, "aPosition").is_valid());
        assert!(!backend.attribute_location(program, "aNormal").is_valid());
    }

    #[test]
    fn mismatched_varyings_fail_to_link() {
        let mut backend = HeadlessBackend::new();
        let fs = FS.replace("varying vec2 vUv;", "varying vec3 vUv;");
        let err = backend.compile_and_link(VS, &fs).unwrap_err();
        assert_eq!(err.stage, None);
        assert!(err.log.contains("vUv"));
    }

    #[test]
    fn unbalanced_braces_fail_the_stage() {
        let mut backend = HeadlessBackend::new();
        let err = backend
            .compile_and_link(VS, "void main() {\n    gl_FragColor = vec4(1.0);\n")
            .unwrap_err();
        assert_eq!(err.stage, Some(ShaderStage::Fragment));
    }

    #[test]
    fn injected_failure_is_reported_once() {
        let mut backend = HeadlessBackend::new();
        backend.fail_next_compile(Some(ShaderStage::Vertex), "0:1: syntax error");
        let err = backend.compile_and_link(VS, FS).unwrap_err();
        assert_eq!(err.shader_source, VS);
        assert_eq!(err.log, "0:1: syntax error");
        assert!(backend.compile_and_link(VS, FS).is_ok());
        assert_eq!(backend.compile_count(), 2);
    }

    #[test]
    fn context_loss_drops_programs() {
        let mut backend = HeadlessBackend::new();
        let program = backend.compile_and_link(VS, FS).unwrap();
        backend.lose_context();
        assert!(!backend.is_alive(program));
        assert_eq!(backend.context_generation(), 1);
        assert!(!backend.uniform_location(program, "uMVPMatrix").is_valid());
    }
}
