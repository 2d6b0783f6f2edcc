//! Composition
//!
//! Turns a core shader plus the ordered plugin list into the final source of
//! one stage. Every compose starts from an empty registry, so composing twice
//! with the same inputs yields byte-identical text.
//!
//! `main()` is assembled from a fixed slot order shared by both stages:
//!
//! ```text
//! core Inputs
//! PRE_TRANSFORM fragments
//! core Transform
//! PRE_LIGHTING fragments
//! core Lighting
//! POST_LIGHTING fragments
//! POST_TRANSFORM fragments
//! core Output
//! ```
//!
//! Within a bucket, fragments keep plugin registration order. `IGNORE`
//! fragments are declared (so their uniforms exist and their id is
//! discoverable) but never emit statements.

use std::fmt;

use crate::dsl::{BodyBuilder, ShaderStage, Stmt, render_block};
use crate::errors::{Result, ShaderError};
use crate::plugin::{Contribution, InsertLocation, MaterialPlugin};
use crate::shader::{CorePhase, CoreShader, ShaderSource, StageRegistry, render_stage};

/// One position in the `main()` layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Core(CorePhase),
    Bucket(InsertLocation),
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Core(phase) => write!(f, "core {phase:?}"),
            Slot::Bucket(location) => write!(f, "{location}"),
        }
    }
}

pub const SLOT_ORDER: [Slot; 8] = [
    Slot::Core(CorePhase::Inputs),
    Slot::Bucket(InsertLocation::PreTransform),
    Slot::Core(CorePhase::Transform),
    Slot::Bucket(InsertLocation::PreLighting),
    Slot::Core(CorePhase::Lighting),
    Slot::Bucket(InsertLocation::PostLighting),
    Slot::Bucket(InsertLocation::PostTransform),
    Slot::Core(CorePhase::Output),
];

/// Statements one owner emitted into one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub owner: String,
    pub slot: Slot,
    pub statements: usize,
}

/// Result of composing one stage.
#[derive(Debug, Clone)]
pub struct StageComposition {
    pub source: ShaderSource,
    pub segments: Vec<Segment>,
    pub contributions: Vec<Contribution>,
}

/// Both stages of a material, ready to hand to the backend.
#[derive(Debug, Clone)]
pub struct Composition {
    pub vertex: StageComposition,
    pub fragment: StageComposition,
}

impl Composition {
    #[must_use]
    pub fn stage(&self, stage: ShaderStage) -> &StageComposition {
        match stage {
            ShaderStage::Vertex => &self.vertex,
            ShaderStage::Fragment => &self.fragment,
        }
    }

    #[must_use]
    pub fn vertex_source(&self) -> &str {
        &self.vertex.source.text
    }

    #[must_use]
    pub fn fragment_source(&self) -> &str {
        &self.fragment.source.text
    }

    /// Every fragment contribution, vertex stage first.
    pub fn contributions(&self) -> impl Iterator<Item = &Contribution> {
        self.vertex.contributions.iter().chain(&self.fragment.contributions)
    }
}

/// Shader ids of every fragment attached through `plugins`, both stages.
#[must_use]
pub fn attached_ids(plugins: &[Box<dyn MaterialPlugin>]) -> Vec<String> {
    plugins
        .iter()
        .flat_map(|plugin| {
            ShaderStage::ALL
                .into_iter()
                .filter_map(|stage| plugin.fragment(stage).map(|f| f.shader_id().to_string()))
        })
        .collect()
}

/// Composes one stage: declare core, declare fragments, emit `main()` by slot,
/// render the source.
pub fn compose_stage(
    core: &mut dyn CoreShader,
    plugins: &mut [Box<dyn MaterialPlugin>],
    attached: &[String],
    strict: bool,
) -> Result<StageComposition> {
    let stage = core.stage();
    let mut registry = StageRegistry::new(stage);

    // Declare phase: core first, then plugins in registration order.
    if let Some(mut decl) = registry.begin(core.shader_id()) {
        core.declare(&mut decl)?;
    }
    for plugin in plugins.iter_mut() {
        let Some(fragment) = plugin.fragment_mut(stage) else {
            continue;
        };
        let id = fragment.shader_id().to_string();
        let Some(mut decl) = registry.begin(&id) else {
            return Err(ShaderError::DeclarationConflict {
                stage,
                name: id,
                reason: "shader id is already declared in this stage".to_string(),
            });
        };
        fragment.declare(&mut decl)?;
    }

    let symbols = registry.symbols(attached.iter().cloned());
    let mut body = BodyBuilder::new(stage, strict);
    let mut stmts: Vec<Stmt> = Vec::new();
    let mut segments = Vec::new();
    let mut contributions = Vec::new();

    for slot in SLOT_ORDER {
        match slot {
            Slot::Core(phase) => {
                body.set_owner(core.shader_id());
                core.emit(phase, &mut body, &symbols)?;
                let segment = body.take_segment()?;
                segments.push(Segment {
                    owner: core.shader_id().to_string(),
                    slot,
                    statements: segment.iter().map(Stmt::count).sum(),
                });
                stmts.extend(segment);
            }
            Slot::Bucket(location) => {
                for fragment in plugins.iter().filter_map(|p| p.fragment(stage)) {
                    if fragment.insert_location() != location {
                        continue;
                    }
                    let id = fragment.shader_id().to_string();
                    body.set_owner(id.clone());
                    fragment.main(&mut body, &symbols)?;
                    let segment = body.take_segment()?;
                    let statements = segment.iter().map(Stmt::count).sum();
                    segments.push(Segment {
                        owner: id.clone(),
                        slot,
                        statements,
                    });
                    contributions.push(Contribution::Spliced {
                        shader_id: id,
                        stage,
                        location,
                        statements,
                    });
                    stmts.extend(segment);
                }
            }
        }
    }

    for fragment in plugins.iter().filter_map(|p| p.fragment(stage)) {
        if fragment.insert_location() == InsertLocation::Ignore {
            contributions.push(Contribution::MetadataOnly {
                shader_id: fragment.shader_id().to_string(),
                stage,
            });
        }
    }

    let mut text = String::new();
    render_block(&stmts, 1, &mut text);
    let source = render_stage(&registry, &text)?;

    Ok(StageComposition {
        source,
        segments,
        contributions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::Precision;
    use crate::plugin::{FogPlugin, SpriteSheetPlugin};
    use crate::shader::{FragmentShader, ShaderFeatures, VertexShader};

    fn plugins() -> Vec<Box<dyn MaterialPlugin>> {
        vec![
            Box::new(FogPlugin::default()),
            Box::new(SpriteSheetPlugin::new(2, 2, 10.0, 4)),
        ]
    }

    #[test]
    fn slots_alternate_core_phases_and_buckets() {
        let mut plugins = plugins();
        let attached = attached_ids(&plugins);
        let mut vertex = VertexShader::new(ShaderFeatures::empty(), Precision::Mediump);
        let out = compose_stage(&mut vertex, &mut plugins, &attached, true).unwrap();

        let owners: Vec<_> = out
            .segments
            .iter()
            .map(|s| (s.owner.as_str(), s.slot))
            .collect();
        assert_eq!(
            owners,
            [
                ("core_vertex", Slot::Core(CorePhase::Inputs)),
                ("core_vertex", Slot::Core(CorePhase::Transform)),
                ("core_vertex", Slot::Core(CorePhase::Lighting)),
                (
                    "FOG_VERTEX_SHADER_FRAGMENT",
                    Slot::Bucket(InsertLocation::PostTransform)
                ),
                ("core_vertex", Slot::Core(CorePhase::Output)),
            ]
        );
    }

    #[test]
    fn ignored_fragments_are_metadata_only() {
        let mut plugins = plugins();
        let attached = attached_ids(&plugins);
        let mut vertex = VertexShader::new(ShaderFeatures::empty(), Precision::Mediump);
        let out = compose_stage(&mut vertex, &mut plugins, &attached, false).unwrap();

        assert!(out.contributions.contains(&Contribution::MetadataOnly {
            shader_id: "SPRITE_SHEET_VERTEX_SHADER_FRAGMENT".to_string(),
            stage: ShaderStage::Vertex,
        }));
        assert!(out.source.text.contains("uniform vec2 uTileSize;"));
        assert!(!out.source.text.contains("gTextureCoord *= uTileSize"));
    }

    #[test]
    fn fragment_stage_has_no_vertex_only_plugins() {
        let mut plugins = plugins();
        let attached = attached_ids(&plugins);
        let mut fragment = FragmentShader::new(ShaderFeatures::empty(), Precision::Mediump, &[]);
        let out = compose_stage(&mut fragment, &mut plugins, &attached, true).unwrap();
        assert!(!out.source.text.contains("uTileSize"));
        assert!(out.source.text.contains("gColor.rgb = mix(gColor.rgb, uFogColor, vFogDensity);"));
        assert!(out.source.text.ends_with("    gl_FragColor = gColor;\n}\n"));
    }
}
