//! Composition Tests
//!
//! Tests for:
//! - Idempotence: composing twice yields byte-identical sources
//! - Order stability: fragments in one bucket keep registration order
//! - IGNORE fragments: declared, discoverable by id, zero statements
//! - Conditional balance: one brace pair around exactly the guarded statements
//! - Fatal compose errors: declaration conflicts, colliding shader ids, missing globals, open ifs

use std::any::Any;

use loom::dsl::{BodyBuilder, Condition, DataType, RelOp, ShaderStage, ShaderValue};
use loom::errors::{Result, ShaderError};
use loom::material::{Material, MaterialSettings, Slot};
use loom::plugin::{Contribution, FogPlugin, InsertLocation, MaterialPlugin, ShaderFragment, SpriteSheetPlugin};
use loom::shader::{Declarations, ShaderVar, ShaderVarKey, SymbolTable};

// ============================================================================
// Test fragments
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Behavior {
    /// `gPosition.x += <uniform>;`
    Offset,
    /// `gPosition.y += 1.0;` only if `target` is attached.
    IfAttached(&'static str),
    /// Guards two statements with one `if`.
    Guarded,
    /// Leaves an `if` open.
    Unclosed,
    /// Redeclares `uColor` with another type.
    ConflictingColor,
    /// Reads the bone transform without declaring it.
    NeedsBones,
}

#[derive(Debug)]
struct Marker {
    id: &'static str,
    uniform: &'static str,
    location: InsertLocation,
    behavior: Behavior,
    var: Option<ShaderVar>,
}

impl Marker {
    fn plugin(id: &'static str, uniform: &'static str, location: InsertLocation, behavior: Behavior) -> MarkerPlugin {
        MarkerPlugin {
            vertex: Marker {
                id,
                uniform,
                location,
                behavior,
                var: None,
            },
        }
    }
}

impl ShaderFragment for Marker {
    fn shader_id(&self) -> &str {
        self.id
    }

    fn insert_location(&self) -> InsertLocation {
        self.location
    }

    fn declare(&mut self, decl: &mut Declarations<'_>) -> Result<()> {
        if let Behavior::ConflictingColor = self.behavior {
            decl.uniform("uColor", DataType::Vec3)?;
        }
        self.var = Some(decl.uniform(self.uniform, DataType::Float)?);
        Ok(())
    }

    fn main(&self, body: &mut BodyBuilder, symbols: &SymbolTable) -> Result<()> {
        let Some(var) = &self.var else {
            return Ok(());
        };
        let position = symbols.require(ShaderVarKey::GPosition)?;
        match self.behavior {
            Behavior::Offset | Behavior::ConflictingColor => body.assign_add(position.x(), var),
            Behavior::IfAttached(target) => {
                if symbols.has_fragment(target) {
                    body.assign_add(position.y(), 1.0);
                }
            }
            Behavior::Guarded => {
                body.assign(position.z(), 0.0);
                body.start_if(Condition::new(var, RelOp::Gt, 0.5));
                body.assign_add(position.x(), var);
                body.assign_add(position.y(), var);
                body.end_if();
                body.assign(position.w(), 1.0);
            }
            Behavior::Unclosed => {
                body.start_if(Condition::new(var, RelOp::Gt, 0.5));
                body.assign_add(position.x(), var);
            }
            Behavior::NeedsBones => {
                let bones = symbols.require(ShaderVarKey::GBoneTransfMatrix)?;
                body.assign(&position, &bones * &position);
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
struct MarkerPlugin {
    vertex: Marker,
}

impl MaterialPlugin for MarkerPlugin {
    fn plugin_id(&self) -> &str {
        self.vertex.id
    }

    fn fragment(&self, stage: ShaderStage) -> Option<&dyn ShaderFragment> {
        (stage == ShaderStage::Vertex).then_some(&self.vertex as &dyn ShaderFragment)
    }

    fn fragment_mut(&mut self, stage: ShaderStage) -> Option<&mut dyn ShaderFragment> {
        if stage == ShaderStage::Vertex {
            Some(&mut self.vertex)
        } else {
            None
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn quiet_material(name: &str) -> Material {
    init_logging();
    Material::with_settings(name, MaterialSettings::default().with_debug_print_sources(false))
}

fn vertex_source(material: &mut Material) -> String {
    material.compose().unwrap().vertex_source().to_string()
}

// ============================================================================
// Idempotence
// ============================================================================

#[test]
fn composing_twice_is_byte_identical() -> anyhow::Result<()> {
    let mut material = quiet_material("twice");
    material.add_plugin(FogPlugin::default());
    material.add_plugin(SpriteSheetPlugin::new(4, 4, 12.0, 16));
    material.add_plugin(Marker::plugin("A", "uA", InsertLocation::PreLighting, Behavior::Offset));

    let first = material.compose()?.clone();
    let second = material.compose()?.clone();

    assert_eq!(first.vertex_source(), second.vertex_source());
    assert_eq!(first.fragment_source(), second.fragment_source());
    assert_eq!(first.vertex.source.hash, second.vertex.source.hash);
    Ok(())
}

#[test]
fn each_variable_is_declared_once() {
    let mut material = quiet_material("unique");
    material.add_plugin(FogPlugin::default());
    let composition = material.compose().unwrap();
    for source in [composition.vertex_source(), composition.fragment_source()] {
        assert_eq!(source.matches("varying float vFogDensity;").count(), 1, "{source}");
        assert_eq!(source.matches("vec4 gColor;").count(), 1, "{source}");
    }
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn same_bucket_keeps_registration_order() {
    let mut material = quiet_material("order");
    material.add_plugin(Marker::plugin("A", "uA", InsertLocation::PreTransform, Behavior::Offset));
    material.add_plugin(Marker::plugin("B", "uB", InsertLocation::PreTransform, Behavior::Offset));

    let source = vertex_source(&mut material);
    let a = source.find("gPosition.x += uA;").unwrap();
    let b = source.find("gPosition.x += uB;").unwrap();
    let transform = source.find("gl_Position = uMVPMatrix * gPosition;").unwrap();
    assert!(a < b, "{source}");
    assert!(b < transform, "{source}");
}

#[test]
fn buckets_follow_the_slot_order() {
    let mut material = quiet_material("slots");
    material.add_plugin(Marker::plugin("POST_T", "uPostT", InsertLocation::PostTransform, Behavior::Offset));
    material.add_plugin(Marker::plugin("POST_L", "uPostL", InsertLocation::PostLighting, Behavior::Offset));
    material.add_plugin(Marker::plugin("PRE_L", "uPreL", InsertLocation::PreLighting, Behavior::Offset));
    material.add_plugin(Marker::plugin("PRE_T", "uPreT", InsertLocation::PreTransform, Behavior::Offset));

    let source = vertex_source(&mut material);
    let at = |needle: &str| source.find(needle).unwrap_or_else(|| panic!("missing {needle}\n{source}"));
    assert!(at("gPosition.x += uPreT;") < at("gl_Position = uMVPMatrix"));
    assert!(at("gl_Position = uMVPMatrix") < at("gPosition.x += uPreL;"));
    assert!(at("gPosition.x += uPreL;") < at("vEyeDir ="));
    assert!(at("vEyeDir =") < at("gPosition.x += uPostL;"));
    assert!(at("gPosition.x += uPostL;") < at("gPosition.x += uPostT;"));
    assert!(at("gPosition.x += uPostT;") < at("vTextureCoord = gTextureCoord;"));
}

#[test]
fn fog_vertex_statements_follow_the_core_transform() {
    let mut material = quiet_material("fog");
    material.add_plugin(FogPlugin::default());
    let composition = material.compose().unwrap();

    let source = composition.vertex_source();
    let transform = source.find("gl_Position = uMVPMatrix * gPosition;").unwrap();
    let fog = source
        .find("vFogDensity = (gl_Position.z - uFogNear) / (uFogFar - uFogNear);")
        .unwrap();
    assert!(transform < fog, "{source}");

    let fog_segment = composition
        .vertex
        .segments
        .iter()
        .find(|s| s.owner == "FOG_VERTEX_SHADER_FRAGMENT")
        .unwrap();
    assert_eq!(fog_segment.slot, Slot::Bucket(InsertLocation::PostTransform));
}

// ============================================================================
// IGNORE
// ============================================================================

#[test]
fn ignored_fragment_emits_nothing_but_is_discoverable() {
    let mut material = quiet_material("ignore");
    material.add_plugin(Marker::plugin("HIDDEN", "uHidden", InsertLocation::Ignore, Behavior::Offset));
    material.add_plugin(Marker::plugin("LOOKUP", "uLookup", InsertLocation::PreTransform, Behavior::IfAttached("HIDDEN")));

    let composition = material.compose().unwrap();
    let source = composition.vertex_source();
    assert!(source.contains("uniform float uHidden;"), "{source}");
    assert!(!source.contains("gPosition.x += uHidden;"), "{source}");
    assert!(source.contains("gPosition.y += 1.0;"), "{source}");

    let hidden = composition
        .contributions()
        .find(|c| c.shader_id() == "HIDDEN")
        .unwrap();
    assert_eq!(hidden.statements(), 0);
    assert!(matches!(hidden, Contribution::MetadataOnly { .. }));
    assert!(composition.vertex.segments.iter().all(|s| s.owner != "HIDDEN"));
}

#[test]
fn lookup_without_target_emits_nothing() {
    let mut material = quiet_material("lookup");
    material.add_plugin(Marker::plugin("LOOKUP", "uLookup", InsertLocation::PreTransform, Behavior::IfAttached("HIDDEN")));
    let source = vertex_source(&mut material);
    assert!(!source.contains("gPosition.y += 1.0;"), "{source}");
}

#[test]
fn sprite_sheet_leaves_fragment_stage_untouched() {
    let mut plain = quiet_material("plain");
    let mut sprite = quiet_material("sprite");
    sprite.add_plugin(SpriteSheetPlugin::new(2, 2, 8.0, 4));

    let plain_fragment = plain.compose().unwrap().fragment_source().to_string();
    let sprite_composition = sprite.compose().unwrap();
    assert_eq!(plain_fragment, sprite_composition.fragment_source());
    assert!(sprite_composition.vertex_source().contains("uniform vec2 uTileOffset;"));
}

// ============================================================================
// Conditionals
// ============================================================================

#[test]
fn conditional_wraps_exactly_the_guarded_statements() {
    let mut material = quiet_material("guard");
    material.add_plugin(Marker::plugin("GUARD", "uGuard", InsertLocation::PreTransform, Behavior::Guarded));

    let source = vertex_source(&mut material);
    let expected = "    gPosition.z = 0.0;\n\
                    \x20   if (uGuard > 0.5) {\n\
                    \x20       gPosition.x += uGuard;\n\
                    \x20       gPosition.y += uGuard;\n\
                    \x20   }\n\
                    \x20   gPosition.w = 1.0;\n";
    assert!(source.contains(expected), "{source}");
    assert_eq!(source.matches('{').count(), source.matches('}').count());
}

#[test]
fn unclosed_conditional_aborts_compose() {
    let mut material = quiet_material("unclosed");
    material.add_plugin(Marker::plugin("OPEN", "uOpen", InsertLocation::PreTransform, Behavior::Unclosed));

    let err = material.compose().unwrap_err();
    assert!(matches!(err, ShaderError::UnbalancedConditional { ref owner, .. } if owner == "OPEN"), "{err}");
    assert!(material.composition().is_none());
}

// ============================================================================
// Fatal declarations
// ============================================================================

#[test]
fn conflicting_redeclaration_aborts_compose() {
    let mut material = quiet_material("conflict");
    material.add_plugin(Marker::plugin("CLASH", "uClash", InsertLocation::PreTransform, Behavior::ConflictingColor));

    let err = material.compose().unwrap_err();
    assert!(matches!(err, ShaderError::DeclarationConflict { ref name, .. } if name == "uColor"), "{err}");
}

#[test]
fn missing_global_fails_at_compose_time() {
    let mut material = quiet_material("bones");
    material.add_plugin(Marker::plugin("SKIN", "uSkin", InsertLocation::PreTransform, Behavior::NeedsBones));

    let err = material.compose().unwrap_err();
    assert!(matches!(err, ShaderError::MissingGlobal { ref name, .. } if name == "gBoneTransfMatrix"), "{err}");
}

#[test]
fn colliding_fragment_id_aborts_compose() {
    let mut material = quiet_material("collision");
    material.add_plugin(FogPlugin::default());
    assert!(material.add_plugin(Marker::plugin(
        "FOG_VERTEX_SHADER_FRAGMENT",
        "uTint",
        InsertLocation::PreTransform,
        Behavior::Offset,
    )));

    let err = material.compose().unwrap_err();
    assert!(
        matches!(err, ShaderError::DeclarationConflict { ref name, .. } if name == "FOG_VERTEX_SHADER_FRAGMENT"),
        "{err}"
    );
    assert!(material.composition().is_none());
}

#[test]
fn fragment_reusing_the_core_id_aborts_compose() {
    let mut material = quiet_material("core_clash");
    material.add_plugin(Marker::plugin("core_vertex", "uTint", InsertLocation::PreLighting, Behavior::Offset));

    let err = material.compose().unwrap_err();
    assert!(matches!(err, ShaderError::DeclarationConflict { ref name, .. } if name == "core_vertex"), "{err}");
}
