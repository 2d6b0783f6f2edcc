//! Material
//!
//! A [`Material`] owns a core vertex/fragment shader pair, its own textures
//! and an ordered list of [`MaterialPlugin`]s. It drives the build pipeline
//!
//! ```text
//! Created → Declared → BodyBuilt → Linked → Bound → (apply)*
//!              ↑                                |
//!              └──────────── context lost ──────┘
//! ```
//!
//! and the per-frame activation (bind textures, apply uniforms).
//!
//! Every structural mutation (plugins, textures, source-affecting settings)
//! bumps a [`ChangeTracker`]. A program linked under an older version, or
//! under an older backend context generation, is stale: per-frame calls on it
//! fail with [`ShaderError::StaleHandleUse`] until the material is rebuilt,
//! and the condition is logged once per invalidation.

pub mod compose;
pub mod handles;
pub mod settings;
pub mod textures;
pub mod version;

pub use compose::{Composition, Segment, Slot, StageComposition};
pub use handles::{AttributeBinder, HandleTable, LocationResolver, TextureBinder, UniformWriter};
pub use settings::MaterialSettings;
pub use textures::{MaterialTexture, TextureKind, TextureUnits};
pub use version::{ChangeTracker, SettingsGuard};

use log::{debug, error, info, warn};

use crate::backend::{GraphicsBackend, ProgramHandle, VertexStreams};
use crate::dsl::ShaderStage;
use crate::errors::{Result, ShaderError};
use crate::plugin::MaterialPlugin;
use crate::shader::{
    CoreShader, FragmentShader, ShaderFeatures, VertexShader,
    fragment::FragmentParams, vertex::VertexParams,
};

use self::compose::{attached_ids, compose_stage};

/// Texture unit budget assumed before a backend is known.
pub const DEFAULT_MAX_TEXTURE_UNITS: u32 = 8;

/// Build progress of a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BuildState {
    Created,
    Declared,
    BodyBuilt,
    Linked,
    Bound,
}

/// Outcome of [`Material::activate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// Program in use, textures bound to `texture_units` units, uniforms written.
    Ready { texture_units: u32 },
    /// The program is stale; nothing was issued for this material.
    Skipped,
}

/// A program and the conditions it was linked under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkedProgram {
    pub handle: ProgramHandle,
    pub generation: u64,
    pub version: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProgramState {
    None,
    Live(LinkedProgram),
    /// Superseded by a mutation whose rebuild failed. Stale, but still owned
    /// and deleted by the next successful link.
    Retired(LinkedProgram),
    /// The context that owned the program is gone.
    Invalidated,
}

// ============================================================================
// Material
// ============================================================================

#[derive(Debug)]
pub struct Material {
    name: String,
    settings: MaterialSettings,
    vertex: VertexShader,
    fragment: FragmentShader,
    textures: Vec<MaterialTexture>,
    plugins: Vec<Box<dyn MaterialPlugin>>,
    tracker: ChangeTracker,
    state: BuildState,
    composition: Option<Composition>,
    composed_version: u64,
    program: ProgramState,
    handles: HandleTable,
    units: TextureUnits,
    time: f32,
    stale_reported: bool,
}

impl Material {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_settings(name, MaterialSettings::default())
    }

    #[must_use]
    pub fn with_settings(name: impl Into<String>, settings: MaterialSettings) -> Self {
        Self {
            name: name.into(),
            vertex: VertexShader::new(settings.features, settings.precision),
            fragment: FragmentShader::new(settings.features, settings.precision, &[]),
            settings,
            textures: Vec::new(),
            plugins: Vec::new(),
            tracker: ChangeTracker::new(),
            state: BuildState::Created,
            composition: None,
            composed_version: 0,
            program: ProgramState::None,
            handles: HandleTable::default(),
            units: TextureUnits::default(),
            time: 0.0,
            stale_reported: false,
        }
    }

    // === Accessors ===

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &MaterialSettings {
        &self.settings
    }

    /// Mutable settings. Changing a field that shapes the source invalidates
    /// the program when the guard drops.
    pub fn settings_mut(&mut self) -> SettingsGuard<'_> {
        SettingsGuard::new(&mut self.settings, &mut self.tracker)
    }

    pub fn set_features(&mut self, features: ShaderFeatures) {
        self.settings_mut().features = features;
    }

    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.tracker.version()
    }

    /// Current build state. A material whose settings changed since the last
    /// compose reports [`BuildState::Created`].
    #[must_use]
    pub fn state(&self) -> BuildState {
        if self.composed_version == self.tracker.version() {
            self.state
        } else {
            BuildState::Created
        }
    }

    /// Last composition, if it matches the current configuration.
    #[must_use]
    pub fn composition(&self) -> Option<&Composition> {
        self.composition
            .as_ref()
            .filter(|_| self.composed_version == self.tracker.version())
    }

    /// The live program, stale or not.
    #[must_use]
    pub fn program(&self) -> Option<LinkedProgram> {
        match self.program {
            ProgramState::Live(program) | ProgramState::Retired(program) => Some(program),
            ProgramState::None | ProgramState::Invalidated => None,
        }
    }

    #[must_use]
    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    #[must_use]
    pub fn texture_units(&self) -> &TextureUnits {
        &self.units
    }

    #[must_use]
    pub fn textures(&self) -> &[MaterialTexture] {
        &self.textures
    }

    pub fn vertex_params_mut(&mut self) -> &mut VertexParams {
        &mut self.vertex.params
    }

    pub fn fragment_params_mut(&mut self) -> &mut FragmentParams {
        &mut self.fragment.params
    }

    /// Material time in seconds, pushed to `uTime` and read by animated plugins.
    pub fn set_time(&mut self, time: f32) {
        self.time = time;
        self.vertex.params.time = time;
        self.fragment.params.time = time;
    }

    #[inline]
    #[must_use]
    pub fn time(&self) -> f32 {
        self.time
    }

    // === Plugins ===

    /// Appends `plugin`. A plugin whose id is already attached is ignored and
    /// `false` is returned.
    pub fn add_plugin<P: MaterialPlugin>(&mut self, plugin: P) -> bool {
        if self.plugins.iter().any(|p| p.plugin_id() == plugin.plugin_id()) {
            debug!("material `{}`: plugin `{}` already attached", self.name, plugin.plugin_id());
            return false;
        }
        self.plugins.push(Box::new(plugin));
        self.invalidate();
        true
    }

    pub fn remove_plugin(&mut self, plugin_id: &str) -> bool {
        let before = self.plugins.len();
        self.plugins.retain(|p| p.plugin_id() != plugin_id);
        let removed = self.plugins.len() != before;
        if removed {
            self.invalidate();
        }
        removed
    }

    pub fn clear_plugins(&mut self) {
        if !self.plugins.is_empty() {
            self.plugins.clear();
            self.invalidate();
        }
    }

    #[must_use]
    pub fn has_plugin(&self, plugin_id: &str) -> bool {
        self.plugins.iter().any(|p| p.plugin_id() == plugin_id)
    }

    /// Attached plugins in registration order.
    pub fn plugins(&self) -> impl Iterator<Item = &dyn MaterialPlugin> {
        self.plugins.iter().map(|p| &**p)
    }

    #[must_use]
    pub fn plugin<T: MaterialPlugin>(&self) -> Option<&T> {
        self.plugins.iter().find_map(|p| p.as_any().downcast_ref::<T>())
    }

    /// Typed access for per-frame parameters. Structural changes still need
    /// a remove/add cycle.
    pub fn plugin_mut<T: MaterialPlugin>(&mut self) -> Option<&mut T> {
        self.plugins
            .iter_mut()
            .find_map(|p| p.as_any_mut().downcast_mut::<T>())
    }

    // === Textures ===

    /// Adds a texture sampled by the core fragment shader. A texture with a
    /// name already in use is ignored and `Ok(false)` is returned.
    pub fn add_texture(&mut self, texture: MaterialTexture) -> Result<bool> {
        if self.textures.iter().any(|t| t.name == texture.name) {
            debug!("material `{}`: texture `{}` already added", self.name, texture.name);
            return Ok(false);
        }
        let max = self
            .settings
            .max_texture_units
            .unwrap_or(DEFAULT_MAX_TEXTURE_UNITS);
        let requested = self.textures.len() as u32 + 1 + self.plugin_texture_count();
        if requested > max {
            return Err(ShaderError::TooManyTextures { requested, max });
        }
        if texture.kind == TextureKind::CubeMap {
            self.settings.features.insert(ShaderFeatures::CUBE_MAPS);
        }
        self.textures.push(texture);
        self.invalidate();
        Ok(true)
    }

    /// Removes a texture. Removing the last cube map also drops
    /// [`ShaderFeatures::CUBE_MAPS`].
    pub fn remove_texture(&mut self, name: &str) -> bool {
        let Some(index) = self.textures.iter().position(|t| t.name == name) else {
            return false;
        };
        let removed = self.textures.remove(index);
        if removed.kind == TextureKind::CubeMap
            && !self.textures.iter().any(|t| t.kind == TextureKind::CubeMap)
        {
            self.settings.features.remove(ShaderFeatures::CUBE_MAPS);
        }
        self.invalidate();
        true
    }

    fn plugin_texture_count(&self) -> u32 {
        self.plugins.iter().map(|p| p.texture_count()).sum()
    }

    fn max_texture_units(&self, backend: &dyn GraphicsBackend) -> u32 {
        self.settings
            .max_texture_units
            .unwrap_or_else(|| backend.max_texture_units())
    }

    fn invalidate(&mut self) {
        self.tracker.changed();
        self.state = BuildState::Created;
        self.composition = None;
        self.handles.clear();
        self.units = TextureUnits::default();
        self.stale_reported = false;
    }

    // ========================================================================
    // Build pipeline
    // ========================================================================

    /// Composes both stages from scratch. Core shaders are recreated from the
    /// current settings and textures; their per-frame params carry over.
    /// Texture units are assigned in the same pass: core textures first, then
    /// each plugin in registration order.
    pub fn compose(&mut self) -> Result<&Composition> {
        let precision = self.settings.precision;
        let features = self.settings.features;
        let strict = self.settings.strict_types;

        let mut vertex = VertexShader::new(features, precision);
        vertex.params = self.vertex.params.clone();
        let mut fragment = FragmentShader::new(features, precision, &self.textures);
        fragment.params = self.fragment.params.clone();

        self.state = BuildState::Created;
        self.composition = None;

        let units = TextureUnits::assign(
            fragment.texture_count(),
            self.plugins.iter().map(|p| p.texture_count()),
            self.settings.max_texture_units.unwrap_or(u32::MAX),
        )?;

        let attached = attached_ids(&self.plugins);
        let vertex_out = compose_stage(&mut vertex, &mut self.plugins, &attached, strict)?;
        self.state = BuildState::Declared;
        let fragment_out = compose_stage(&mut fragment, &mut self.plugins, &attached, strict)?;

        if self.settings.debug_print_sources {
            debug!(
                "material `{}` vertex source [{:032x}]:\n{}",
                self.name, vertex_out.source.hash, vertex_out.source.text
            );
            debug!(
                "material `{}` fragment source [{:032x}]:\n{}",
                self.name, fragment_out.source.hash, fragment_out.source.text
            );
        }

        self.vertex = vertex;
        self.fragment = fragment;
        self.units = units;
        self.handles.clear();
        self.composed_version = self.tracker.version();
        self.state = BuildState::BodyBuilt;
        Ok(&*self.composition.insert(Composition {
            vertex: vertex_out,
            fragment: fragment_out,
        }))
    }

    /// Compiles and links the composed sources, composing first if needed.
    /// The previous program is deleted once the new one links; if the backend
    /// rejects the sources it stays retired and the material reads as stale.
    /// Backend failures are returned as is, never retried.
    pub fn compile(&mut self, backend: &mut dyn GraphicsBackend) -> Result<ProgramHandle> {
        if self.state() < BuildState::BodyBuilt || self.composition.is_none() {
            self.compose()?;
        }

        let max = self.max_texture_units(&*backend);
        let requested = self.units.total();
        if requested > max {
            return Err(ShaderError::TooManyTextures { requested, max });
        }

        let Some(composition) = &self.composition else {
            return Err(ShaderError::NotLinked {
                material: self.name.clone(),
            });
        };
        let handle = match backend.compile_and_link(composition.vertex_source(), composition.fragment_source()) {
            Ok(handle) => handle,
            Err(err) => {
                error!("material `{}`: {err}", self.name);
                if let ProgramState::Live(old) = self.program {
                    self.program = ProgramState::Retired(old);
                }
                return Err(err.into());
            }
        };

        let rebuilt = self.release_program(backend);
        let program = LinkedProgram {
            handle,
            generation: backend.context_generation(),
            version: self.tracker.version(),
        };
        if rebuilt {
            info!("material `{}`: rebuilt program {:?}", self.name, handle);
        } else {
            debug!("material `{}`: linked program {:?}", self.name, handle);
        }
        self.program = ProgramState::Live(program);
        self.state = BuildState::Linked;
        self.stale_reported = false;
        Ok(handle)
    }

    /// Resolves every location of the linked program: core vertex, vertex
    /// fragments, core fragment, fragment fragments, in registration order.
    pub fn link_locations(&mut self, backend: &dyn GraphicsBackend) -> Result<()> {
        let handle = self.live_program(backend, BuildState::Linked)?;

        self.handles.clear();
        let mut resolver = LocationResolver::new(backend, handle, &mut self.handles);
        self.vertex.set_locations(&mut resolver);
        for fragment in self
            .plugins
            .iter_mut()
            .filter_map(|p| p.fragment_mut(ShaderStage::Vertex))
        {
            fragment.set_locations(&mut resolver);
        }
        self.fragment.set_locations(&mut resolver);
        for fragment in self
            .plugins
            .iter_mut()
            .filter_map(|p| p.fragment_mut(ShaderStage::Fragment))
        {
            fragment.set_locations(&mut resolver);
        }

        self.state = BuildState::Bound;
        Ok(())
    }

    /// `compose` → `compile` → `link_locations`.
    pub fn build(&mut self, backend: &mut dyn GraphicsBackend) -> Result<ProgramHandle> {
        self.compose()?;
        let handle = self.compile(backend)?;
        self.link_locations(&*backend)?;
        Ok(handle)
    }

    /// Forgets the program after the backend context was destroyed. The next
    /// build recomposes.
    pub fn on_context_lost(&mut self) {
        if self.program != ProgramState::None {
            self.program = ProgramState::Invalidated;
        }
        self.handles.clear();
        self.state = self.state.min(BuildState::Declared);
        self.stale_reported = false;
    }

    /// Deletes the program and returns to [`BuildState::Created`].
    pub fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        self.release_program(backend);
        self.program = ProgramState::None;
        self.composition = None;
        self.handles.clear();
        self.state = BuildState::Created;
    }

    /// Deletes the live program if its context is still current.
    fn release_program(&mut self, backend: &mut dyn GraphicsBackend) -> bool {
        match std::mem::replace(&mut self.program, ProgramState::None) {
            ProgramState::Live(old) | ProgramState::Retired(old) => {
                if old.generation == backend.context_generation() {
                    backend.delete_program(old.handle);
                }
                true
            }
            ProgramState::Invalidated => true,
            ProgramState::None => false,
        }
    }

    /// The program, if usable at `required` state or beyond.
    fn live_program(&mut self, backend: &dyn GraphicsBackend, required: BuildState) -> Result<ProgramHandle> {
        let stale = match self.program {
            ProgramState::None => {
                return Err(ShaderError::NotLinked {
                    material: self.name.clone(),
                });
            }
            ProgramState::Invalidated | ProgramState::Retired(_) => true,
            ProgramState::Live(program) => {
                if program.generation != backend.context_generation() {
                    self.on_context_lost();
                    true
                } else {
                    program.version != self.tracker.version()
                }
            }
        };

        if stale {
            if !self.stale_reported {
                warn!(
                    "material `{}`: program is stale, skipping until rebuilt",
                    self.name
                );
                self.stale_reported = true;
            }
            return Err(ShaderError::StaleHandleUse {
                material: self.name.clone(),
            });
        }

        match self.program {
            ProgramState::Live(program) if self.state >= required => Ok(program.handle),
            _ => Err(ShaderError::NotLinked {
                material: self.name.clone(),
            }),
        }
    }

    // ========================================================================
    // Per-frame activation
    // ========================================================================

    pub fn use_program(&mut self, backend: &mut dyn GraphicsBackend) -> Result<()> {
        let handle = self.live_program(&*backend, BuildState::Bound)?;
        backend.use_program(handle);
        Ok(())
    }

    /// Writes every uniform in the order locations were resolved: core
    /// vertex, vertex fragments, core fragment, fragment fragments.
    pub fn apply_params(&mut self, backend: &mut dyn GraphicsBackend) -> Result<()> {
        self.live_program(&*backend, BuildState::Bound)?;

        let mut writer = UniformWriter::new(backend, self.time);
        self.vertex.apply_params(&mut writer);
        for fragment in self
            .plugins
            .iter_mut()
            .filter_map(|p| p.fragment_mut(ShaderStage::Vertex))
        {
            fragment.apply_params(&mut writer);
        }
        self.fragment.apply_params(&mut writer);
        for fragment in self
            .plugins
            .iter_mut()
            .filter_map(|p| p.fragment_mut(ShaderStage::Fragment))
        {
            fragment.apply_params(&mut writer);
        }
        Ok(())
    }

    /// Binds the material textures to units `0..n`, then each plugin's
    /// textures in registration order. Returns the number of units used.
    pub fn bind_textures(&mut self, backend: &mut dyn GraphicsBackend) -> Result<u32> {
        self.live_program(&*backend, BuildState::Bound)?;

        let max = backend.max_texture_units();
        let total = self.units.total();
        if total > max {
            error!(
                "material `{}`: {total} texture units needed, backend has {max}; extra textures left unbound",
                self.name
            );
        }

        let mut binder = TextureBinder::new(backend);
        let core = (self.units.core().end.min(max) as usize).min(self.textures.len());
        self.fragment.bind_textures(&self.textures[..core], &mut binder);
        for (index, plugin) in self.plugins.iter().enumerate() {
            let units = self.units.plugin(index);
            if units.is_empty() || units.end > max {
                continue;
            }
            plugin.bind_textures(units, &mut binder);
        }
        Ok(total.min(max))
    }

    pub fn unbind_textures(&mut self, backend: &mut dyn GraphicsBackend) -> Result<()> {
        self.live_program(&*backend, BuildState::Bound)?;

        let max = backend.max_texture_units();
        let mut binder = TextureBinder::new(backend);
        let core = (self.units.core().end.min(max) as usize).min(self.textures.len());
        self.fragment.unbind_textures(&self.textures[..core], &mut binder);
        for (index, plugin) in self.plugins.iter().enumerate() {
            let units = self.units.plugin(index);
            if units.is_empty() || units.end > max {
                continue;
            }
            plugin.unbind_textures(units, &mut binder);
        }
        Ok(())
    }

    /// Binds the core vertex streams, then plugin streams (bone data).
    pub fn bind_attributes(&mut self, backend: &mut dyn GraphicsBackend, streams: &VertexStreams) -> Result<()> {
        self.live_program(&*backend, BuildState::Bound)?;

        let mut binder = AttributeBinder::new(backend);
        self.vertex.bind_attributes(&mut binder, streams);
        for plugin in &self.plugins {
            plugin.bind_attributes(&mut binder, streams);
        }
        Ok(())
    }

    /// Use program, bind textures, apply params. A stale material is skipped
    /// instead of failing, so render loops can keep going.
    pub fn activate(&mut self, backend: &mut dyn GraphicsBackend) -> Result<Activation> {
        match self.use_program(backend) {
            Ok(()) => {}
            Err(err) if err.is_stale() => return Ok(Activation::Skipped),
            Err(err) => return Err(err),
        }
        let texture_units = self.bind_textures(backend)?;
        self.apply_params(backend)?;
        Ok(Activation::Ready { texture_units })
    }
}
