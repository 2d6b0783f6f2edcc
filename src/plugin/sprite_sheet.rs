//! Sprite Sheet Animation
//!
//! Steps through the tiles of a sprite sheet at a fixed frame rate, driven by
//! the material time. By default the fragment is metadata-only: it keeps the
//! frame bookkeeping and pushes the tile uniforms, and a custom vertex fragment
//! consumes them. [`SpriteSheetPlugin::spliced`] makes it rewrite the texture
//! coordinate itself.

use glam::Vec2;

use crate::backend::Location;
use crate::dsl::{BodyBuilder, DataType, ShaderStage};
use crate::errors::Result;
use crate::material::handles::{LocationResolver, UniformWriter};
use crate::shader::{Declarations, ShaderVar, ShaderVarKey, SymbolTable};

use super::{InsertLocation, MaterialPlugin, ShaderFragment, impl_plugin_any, undeclared};

pub const SPRITE_SHEET_VERTEX_SHADER_FRAGMENT: &str = "SPRITE_SHEET_VERTEX_SHADER_FRAGMENT";

const U_TILE_SIZE: &str = "uTileSize";
const U_TILE_OFFSET: &str = "uTileOffset";

#[derive(Debug)]
struct SpriteSheetVertexFragment {
    location: InsertLocation,
    cols: u32,
    rows: u32,
    fps: f32,
    num_frames: u32,
    playing: bool,
    /// Material time at which the current play segment started.
    started_at: Option<f32>,
    /// Time played before the current segment.
    played: f32,
    last_time: Option<f32>,
    current_frame: u32,
    tile_offset: Vec2,
    vars: Option<(ShaderVar, ShaderVar)>,
    tile_size_loc: Location,
    tile_offset_loc: Location,
}

impl SpriteSheetVertexFragment {
    fn tile_size(&self) -> Vec2 {
        Vec2::new(1.0 / self.cols as f32, 1.0 / self.rows as f32)
    }

    /// Advances the frame counter to material time `now`.
    fn advance(&mut self, now: f32) {
        if !self.playing {
            return;
        }
        self.last_time = Some(now);
        let start = *self.started_at.get_or_insert(now);
        let elapsed = self.played + (now - start).max(0.0);
        self.current_frame = ((elapsed * self.fps).floor() as u32) % self.num_frames;

        let col = self.current_frame % self.cols;
        let row = self.current_frame / self.cols;
        self.tile_offset = Vec2::new(col as f32, row as f32) * self.tile_size();
    }
}

impl ShaderFragment for SpriteSheetVertexFragment {
    fn shader_id(&self) -> &str {
        SPRITE_SHEET_VERTEX_SHADER_FRAGMENT
    }

    fn insert_location(&self) -> InsertLocation {
        self.location
    }

    fn declare(&mut self, decl: &mut Declarations<'_>) -> Result<()> {
        let size = decl.uniform(U_TILE_SIZE, DataType::Vec2)?;
        let offset = decl.uniform(U_TILE_OFFSET, DataType::Vec2)?;
        self.vars = Some((size, offset));
        Ok(())
    }

    fn main(&self, body: &mut BodyBuilder, symbols: &SymbolTable) -> Result<()> {
        let Some((size, offset)) = &self.vars else {
            return Err(undeclared(body));
        };
        let tex_coord = symbols.require(ShaderVarKey::GTextureCoord)?;
        body.assign_mul(&tex_coord, size);
        body.assign_add(&tex_coord, offset);
        Ok(())
    }

    fn set_locations(&mut self, resolver: &mut LocationResolver<'_>) {
        self.tile_size_loc = resolver.uniform_named(U_TILE_SIZE);
        self.tile_offset_loc = resolver.uniform_named(U_TILE_OFFSET);
    }

    fn apply_params(&mut self, writer: &mut UniformWriter<'_>) {
        self.advance(writer.time());
        writer.set(self.tile_size_loc, self.tile_size());
        writer.set(self.tile_offset_loc, self.tile_offset);
    }
}

/// Animates texture coordinates over a `cols` × `rows` grid of tiles.
#[derive(Debug)]
pub struct SpriteSheetPlugin {
    vertex: SpriteSheetVertexFragment,
}

impl SpriteSheetPlugin {
    /// Zero tile counts are treated as one.
    #[must_use]
    pub fn new(cols: u32, rows: u32, fps: f32, num_frames: u32) -> Self {
        Self {
            vertex: SpriteSheetVertexFragment {
                location: InsertLocation::Ignore,
                cols: cols.max(1),
                rows: rows.max(1),
                fps,
                num_frames: num_frames.max(1),
                playing: false,
                started_at: None,
                played: 0.0,
                last_time: None,
                current_frame: 0,
                tile_offset: Vec2::ZERO,
                vars: None,
                tile_size_loc: Location::NOT_FOUND,
                tile_offset_loc: Location::NOT_FOUND,
            },
        }
    }

    /// Splices the texture coordinate rewrite at [`InsertLocation::PreTransform`].
    #[must_use]
    pub fn spliced(mut self) -> Self {
        self.vertex.location = InsertLocation::PreTransform;
        self
    }

    /// Starts the animation, or resumes it from the frame it was paused on,
    /// at the next activation.
    pub fn play(&mut self) {
        if !self.vertex.playing {
            self.vertex.playing = true;
            self.vertex.started_at = None;
        }
    }

    /// Holds the current frame. Time spent paused does not advance the animation.
    pub fn pause(&mut self) {
        let v = &mut self.vertex;
        if v.playing
            && let (Some(start), Some(last)) = (v.started_at, v.last_time)
        {
            v.played += (last - start).max(0.0);
        }
        v.playing = false;
        v.started_at = None;
    }

    /// Rewinds to the first frame; playback state is unchanged.
    pub fn rewind(&mut self) {
        let v = &mut self.vertex;
        v.played = 0.0;
        v.started_at = None;
        v.current_frame = 0;
        v.tile_offset = Vec2::ZERO;
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.vertex.playing
    }

    pub fn set_fps(&mut self, fps: f32) {
        self.vertex.fps = fps;
    }

    #[must_use]
    pub fn current_frame(&self) -> u32 {
        self.vertex.current_frame
    }

    #[must_use]
    pub fn tile_size(&self) -> Vec2 {
        self.vertex.tile_size()
    }

    #[must_use]
    pub fn tile_offset(&self) -> Vec2 {
        self.vertex.tile_offset
    }
}

impl MaterialPlugin for SpriteSheetPlugin {
    fn plugin_id(&self) -> &str {
        "sprite_sheet"
    }

    fn fragment(&self, stage: ShaderStage) -> Option<&dyn ShaderFragment> {
        match stage {
            ShaderStage::Vertex => Some(&self.vertex),
            ShaderStage::Fragment => None,
        }
    }

    fn fragment_mut(&mut self, stage: ShaderStage) -> Option<&mut dyn ShaderFragment> {
        match stage {
            ShaderStage::Vertex => Some(&mut self.vertex),
            ShaderStage::Fragment => None,
        }
    }

    impl_plugin_any!();
}
