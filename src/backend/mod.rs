//! Graphics Backend Boundary
//!
//! The composer never talks to a native API directly. Everything it needs from
//! the GPU side goes through [`GraphicsBackend`]: compile and link two sources,
//! look up locations by name, push uniform values, bind vertex streams and
//! textures.
//!
//! All calls are synchronous and must happen on the thread that owns the
//! graphics context.

pub mod headless;

use std::borrow::Cow;

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};

use crate::errors::CompileError;

pub use headless::{BackendCall, HeadlessBackend};

/// Linked program handle issued by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(u32);

impl ProgramHandle {
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Uniform or attribute location. `-1` means "not found", which is a normal
/// result for variables the native compiler optimised out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location(i32);

impl Location {
    pub const NOT_FOUND: Location = Location(-1);

    #[inline]
    #[must_use]
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> i32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::NOT_FOUND
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    Texture2D,
    CubeMap,
    External,
}

/// A texture already uploaded by the surrounding engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureRef {
    pub handle: TextureHandle,
    pub target: TextureTarget,
}

impl TextureRef {
    #[must_use]
    pub const fn texture_2d(raw: u32) -> Self {
        Self {
            handle: TextureHandle(raw),
            target: TextureTarget::Texture2D,
        }
    }

    #[must_use]
    pub const fn cube_map(raw: u32) -> Self {
        Self {
            handle: TextureHandle(raw),
            target: TextureTarget::CubeMap,
        }
    }
}

/// One interleaved or tightly packed vertex stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexBuffer {
    pub buffer: BufferHandle,
    pub components: u32,
    pub stride: u32,
    pub offset: u32,
}

impl VertexBuffer {
    /// Tightly packed stream of `components` floats per vertex.
    #[must_use]
    pub const fn packed(buffer: u32, components: u32) -> Self {
        Self {
            buffer: BufferHandle(buffer),
            components,
            stride: 0,
            offset: 0,
        }
    }
}

/// Vertex streams of one geometry, bound to whatever attributes the program uses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexStreams {
    pub positions: Option<VertexBuffer>,
    pub normals: Option<VertexBuffer>,
    pub tex_coords: Option<VertexBuffer>,
    pub colors: Option<VertexBuffer>,
    pub bone_indices: [Option<VertexBuffer>; 2],
    pub bone_weights: [Option<VertexBuffer>; 2],
}

/// A value written to a uniform location.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue<'a> {
    Float(f32),
    Int(i32),
    Bool(bool),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat3(Mat3),
    Mat4(Mat4),
    Mat4Array(Cow<'a, [Mat4]>),
    /// Texture unit index for a sampler uniform.
    Sampler(u32),
}

impl UniformValue<'_> {
    #[must_use]
    pub fn into_owned(self) -> UniformValue<'static> {
        match self {
            UniformValue::Float(v) => UniformValue::Float(v),
            UniformValue::Int(v) => UniformValue::Int(v),
            UniformValue::Bool(v) => UniformValue::Bool(v),
            UniformValue::Vec2(v) => UniformValue::Vec2(v),
            UniformValue::Vec3(v) => UniformValue::Vec3(v),
            UniformValue::Vec4(v) => UniformValue::Vec4(v),
            UniformValue::Mat3(v) => UniformValue::Mat3(v),
            UniformValue::Mat4(v) => UniformValue::Mat4(v),
            UniformValue::Mat4Array(v) => UniformValue::Mat4Array(Cow::Owned(v.into_owned())),
            UniformValue::Sampler(v) => UniformValue::Sampler(v),
        }
    }
}

macro_rules! impl_uniform_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {$(
        impl From<$ty> for UniformValue<'_> {
            fn from(value: $ty) -> Self {
                UniformValue::$variant(value)
            }
        }
    )*};
}

impl_uniform_from! {
    f32 => Float,
    i32 => Int,
    bool => Bool,
    Vec2 => Vec2,
    Vec3 => Vec3,
    Vec4 => Vec4,
    Mat3 => Mat3,
    Mat4 => Mat4,
}

impl<'a> From<&'a [Mat4]> for UniformValue<'a> {
    fn from(value: &'a [Mat4]) -> Self {
        UniformValue::Mat4Array(Cow::Borrowed(value))
    }
}

/// Services the composer consumes from a native graphics binding.
pub trait GraphicsBackend {
    /// Compiles both stages and links them into a program.
    fn compile_and_link(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<ProgramHandle, CompileError>;

    fn attribute_location(&self, program: ProgramHandle, name: &str) -> Location;

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Location;

    fn use_program(&mut self, program: ProgramHandle);

    fn set_uniform(&mut self, location: Location, value: UniformValue<'_>);

    fn bind_vertex_attribute(&mut self, location: Location, buffer: VertexBuffer);

    fn bind_texture(&mut self, unit: u32, texture: TextureRef);

    fn unbind_texture(&mut self, unit: u32, target: TextureTarget);

    fn delete_program(&mut self, program: ProgramHandle);

    /// Number of texture units a single draw can use.
    fn max_texture_units(&self) -> u32 {
        8
    }

    /// Increments whenever the native context is destroyed and recreated.
    /// Programs linked under an older generation are dead.
    fn context_generation(&self) -> u64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_validity() {
        assert!(!Location::NOT_FOUND.is_valid());
        assert!(!Location::default().is_valid());
        assert!(Location::new(0).is_valid());
    }

    #[test]
    fn uniform_values_from_glam_types() {
        assert_eq!(UniformValue::from(1.5), UniformValue::Float(1.5));
        assert_eq!(UniformValue::from(Vec3::ONE), UniformValue::Vec3(Vec3::ONE));
        let bones = [Mat4::IDENTITY; 2];
        let value = UniformValue::from(&bones[..]).into_owned();
        assert!(matches!(value, UniformValue::Mat4Array(ref m) if m.len() == 2));
    }
}
