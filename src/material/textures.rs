//! Material textures and texture-unit assignment.
//!
//! Units are handed out by a pure fold over the ordered owners: the core
//! shader's textures first, then each plugin in registration order. The result
//! is computed once per compose and reused verbatim for every activation.

use std::borrow::Cow;
use std::ops::Range;

use smallvec::SmallVec;

use crate::backend::{TextureRef, TextureTarget};
use crate::dsl::DataType;
use crate::errors::{Result, ShaderError};

/// How the core fragment shader uses a material texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    /// Multiplies the surface colour, sampled at the texture coordinate.
    Diffuse,
    /// Multiplies the surface colour, sampled with the cube coordinate.
    CubeMap,
    /// Declared and bound only; custom fragments sample it themselves.
    Sampler,
}

/// A texture owned by the material itself (not by a plugin).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialTexture {
    /// Sampler uniform name.
    pub name: Cow<'static, str>,
    pub kind: TextureKind,
    pub texture: TextureRef,
}

impl MaterialTexture {
    pub fn diffuse(name: impl Into<Cow<'static, str>>, texture: TextureRef) -> Self {
        Self {
            name: name.into(),
            kind: TextureKind::Diffuse,
            texture,
        }
    }

    pub fn cube_map(name: impl Into<Cow<'static, str>>, texture: TextureRef) -> Self {
        Self {
            name: name.into(),
            kind: TextureKind::CubeMap,
            texture,
        }
    }

    pub fn sampler(name: impl Into<Cow<'static, str>>, texture: TextureRef) -> Self {
        Self {
            name: name.into(),
            kind: TextureKind::Sampler,
            texture,
        }
    }

    /// Sampler type matching the texture target.
    #[must_use]
    pub fn sampler_type(&self) -> DataType {
        match self.texture.target {
            TextureTarget::Texture2D => DataType::Sampler2D,
            TextureTarget::CubeMap => DataType::SamplerCube,
            TextureTarget::External => DataType::SamplerExternalOes,
        }
    }
}

/// Texture units of every owner, fixed at compose time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextureUnits {
    core: Range<u32>,
    plugins: SmallVec<[Range<u32>; 4]>,
}

impl TextureUnits {
    /// Folds the texture counts into contiguous unit ranges.
    pub fn assign(core_count: u32, plugin_counts: impl IntoIterator<Item = u32>, max_units: u32) -> Result<Self> {
        let core = 0..core_count;
        let (plugins, total) = plugin_counts.into_iter().fold(
            (SmallVec::new(), core_count),
            |(mut ranges, next): (SmallVec<[Range<u32>; 4]>, u32), count| {
                ranges.push(next..next + count);
                (ranges, next + count)
            },
        );
        if total > max_units {
            return Err(ShaderError::TooManyTextures {
                requested: total,
                max: max_units,
            });
        }
        Ok(Self { core, plugins })
    }

    #[must_use]
    pub fn core(&self) -> Range<u32> {
        self.core.clone()
    }

    /// Units of the plugin at `index` in registration order.
    #[must_use]
    pub fn plugin(&self, index: usize) -> Range<u32> {
        self.plugins.get(index).cloned().unwrap_or(0..0)
    }

    /// Total number of units in use.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.plugins.last().map_or(self.core.end, |r| r.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_textures_come_first_then_plugins_in_order() {
        let units = TextureUnits::assign(2, [1, 0, 3], 8).unwrap();
        assert_eq!(units.core(), 0..2);
        assert_eq!(units.plugin(0), 2..3);
        assert_eq!(units.plugin(1), 3..3);
        assert_eq!(units.plugin(2), 3..6);
        assert_eq!(units.total(), 6);
    }

    #[test]
    fn no_textures_at_all() {
        let units = TextureUnits::assign(0, [], 8).unwrap();
        assert_eq!(units.total(), 0);
        assert_eq!(units.plugin(5), 0..0);
    }

    #[test]
    fn exceeding_the_budget_is_an_error() {
        let err = TextureUnits::assign(4, [3, 2], 8).unwrap_err();
        assert!(matches!(err, ShaderError::TooManyTextures { requested: 9, max: 8 }));
    }

    #[test]
    fn sampler_type_follows_target() {
        let cube = MaterialTexture::cube_map("uCube", TextureRef::cube_map(4));
        assert_eq!(cube.sampler_type(), DataType::SamplerCube);
    }
}
