//! Handle table and the narrow views of the backend handed to shaders and
//! plugins after link: resolve locations, write uniforms, bind textures and
//! vertex streams.

use rustc_hash::FxHashMap;

use crate::backend::{
    GraphicsBackend, Location, ProgramHandle, TextureRef, TextureTarget, UniformValue,
    VertexBuffer,
};
use crate::shader::ShaderVar;

/// Name → location cache of one linked program.
#[derive(Debug, Default, Clone)]
pub struct HandleTable {
    uniforms: FxHashMap<String, Location>,
    attributes: FxHashMap<String, Location>,
}

impl HandleTable {
    #[must_use]
    pub fn uniform(&self, name: &str) -> Location {
        self.uniforms.get(name).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Location {
        self.attributes.get(name).copied().unwrap_or_default()
    }

    /// Number of names looked up, found or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.uniforms.len() + self.attributes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.uniforms.clear();
        self.attributes.clear();
    }

    /// Uniform names and their locations, sorted by name.
    #[must_use]
    pub fn uniforms(&self) -> Vec<(&str, Location)> {
        let mut out: Vec<_> = self.uniforms.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        out.sort_unstable_by_key(|(name, _)| *name);
        out
    }
}

/// Resolves and caches locations for one program.
pub struct LocationResolver<'a> {
    backend: &'a dyn GraphicsBackend,
    program: ProgramHandle,
    table: &'a mut HandleTable,
}

impl<'a> LocationResolver<'a> {
    pub fn new(backend: &'a dyn GraphicsBackend, program: ProgramHandle, table: &'a mut HandleTable) -> Self {
        Self {
            backend,
            program,
            table,
        }
    }

    #[must_use]
    pub fn program(&self) -> ProgramHandle {
        self.program
    }

    pub fn uniform(&mut self, var: &ShaderVar) -> Location {
        self.uniform_named(var.name())
    }

    pub fn uniform_named(&mut self, name: &str) -> Location {
        if let Some(&location) = self.table.uniforms.get(name) {
            return location;
        }
        let location = self.backend.uniform_location(self.program, name);
        if !location.is_valid() {
            log::debug!("uniform `{name}`: no location, writes will be skipped");
        }
        self.table.uniforms.insert(name.to_string(), location);
        location
    }

    pub fn attribute(&mut self, var: &ShaderVar) -> Location {
        let name = var.name();
        if let Some(&location) = self.table.attributes.get(name) {
            return location;
        }
        let location = self.backend.attribute_location(self.program, name);
        if !location.is_valid() {
            log::debug!("attribute `{name}`: no location, binds will be skipped");
        }
        self.table.attributes.insert(name.to_string(), location);
        location
    }
}

/// Per-frame uniform writes. Invalid locations are skipped silently.
pub struct UniformWriter<'a> {
    backend: &'a mut dyn GraphicsBackend,
    time: f32,
}

impl<'a> UniformWriter<'a> {
    pub fn new(backend: &'a mut dyn GraphicsBackend, time: f32) -> Self {
        Self { backend, time }
    }

    /// Material time in seconds.
    #[inline]
    #[must_use]
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn set<'v>(&mut self, location: Location, value: impl Into<UniformValue<'v>>) {
        if location.is_valid() {
            self.backend.set_uniform(location, value.into());
        }
    }
}

/// Texture binding for one activation. Units come from the material's fold.
pub struct TextureBinder<'a> {
    backend: &'a mut dyn GraphicsBackend,
}

impl<'a> TextureBinder<'a> {
    pub fn new(backend: &'a mut dyn GraphicsBackend) -> Self {
        Self { backend }
    }

    /// Binds `texture` to `unit` and points the sampler uniform at it.
    pub fn bind(&mut self, unit: u32, texture: TextureRef, sampler: Location) {
        self.backend.bind_texture(unit, texture);
        if sampler.is_valid() {
            self.backend.set_uniform(sampler, UniformValue::Sampler(unit));
        }
    }

    pub fn unbind(&mut self, unit: u32, target: TextureTarget) {
        self.backend.unbind_texture(unit, target);
    }
}

/// Vertex stream binding. Missing streams and invalid locations are skipped.
pub struct AttributeBinder<'a> {
    backend: &'a mut dyn GraphicsBackend,
}

impl<'a> AttributeBinder<'a> {
    pub fn new(backend: &'a mut dyn GraphicsBackend) -> Self {
        Self { backend }
    }

    pub fn bind(&mut self, location: Location, buffer: Option<VertexBuffer>) {
        if let Some(buffer) = buffer
            && location.is_valid()
        {
            self.backend.bind_vertex_attribute(location, buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, HeadlessBackend};

    #[test]
    fn writes_to_missing_locations_are_skipped() {
        let mut backend = HeadlessBackend::new();
        let mut writer = UniformWriter::new(&mut backend, 0.0);
        writer.set(Location::NOT_FOUND, 1.0);
        writer.set(Location::new(3), 2.0);
        assert_eq!(
            backend.calls(),
            &[BackendCall::SetUniform {
                location: Location::new(3),
                value: UniformValue::Float(2.0),
            }]
        );
    }

    #[test]
    fn resolver_caches_lookups() {
        let mut backend = HeadlessBackend::new();
        let program = backend
            .compile_and_link(
                "uniform float uA;\nvoid main() {\n    gl_Position = vec4(uA);\n}\n",
                "void main() {\n}\n",
            )
            .unwrap();
        let mut table = HandleTable::default();
        let mut resolver = LocationResolver::new(&backend, program, &mut table);
        let a = resolver.uniform_named("uA");
        let missing = resolver.uniform_named("uMissing");
        assert!(a.is_valid());
        assert!(!missing.is_valid());
        assert_eq!(table.len(), 2);
        assert_eq!(table.uniform("uA"), a);
        assert_eq!(table.uniform("never"), Location::NOT_FOUND);
    }
}
