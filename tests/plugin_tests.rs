//! Built-in Plugin Tests
//!
//! Tests for:
//! - SpriteSheetPlugin: spliced texture-coordinate rewrite, frame uniforms from material time
//! - ShadowMapPlugin: bias matrix, AND-joined shadow test before lighting
//! - AlphaMaskPlugin: discard after lighting, threshold upload
//! - FogPlugin: parameter updates without rebuilds
//! - Plugin combinations compile against the headless backend

use glam::{Mat4, Vec2, Vec3};

use loom::backend::headless::HeadlessBackend;
use loom::backend::{TextureRef, UniformValue};
use loom::material::{Material, MaterialSettings};
use loom::plugin::{AlphaMaskPlugin, FogParams, FogPlugin, ShadowMapPlugin, SkeletalAnimationPlugin, SpriteSheetPlugin};

fn material(name: &str) -> Material {
    let _ = env_logger::builder().is_test(true).try_init();
    Material::with_settings(name, MaterialSettings::default().with_debug_print_sources(false))
}

fn position(haystack: &str, needle: &str) -> usize {
    haystack
        .find(needle)
        .unwrap_or_else(|| panic!("missing `{needle}` in\n{haystack}"))
}

// ============================================================================
// Sprite sheet
// ============================================================================

#[test]
fn spliced_sprite_sheet_rewrites_texture_coordinates() {
    let mut backend = HeadlessBackend::new();
    let mut material = material("sprite");
    material.add_plugin(SpriteSheetPlugin::new(4, 2, 10.0, 8).spliced());
    let program = material.build(&mut backend).unwrap();

    let vertex = material.composition().unwrap().vertex_source().to_string();
    let size = position(&vertex, "gTextureCoord *= uTileSize;");
    let offset = position(&vertex, "gTextureCoord += uTileOffset;");
    let input = position(&vertex, "gTextureCoord = aTextureCoord;");
    let transform = position(&vertex, "gl_Position = uMVPMatrix * gPosition;");
    assert!(input < size && size < offset && offset < transform);

    material.plugin_mut::<SpriteSheetPlugin>().unwrap().play();
    material.set_time(1.0);
    material.apply_params(&mut backend).unwrap();
    material.set_time(1.55);
    material.apply_params(&mut backend).unwrap();

    // frame 5 of a 4x2 grid: column 1, row 1
    let sprite = material.plugin::<SpriteSheetPlugin>().unwrap();
    assert_eq!(sprite.current_frame(), 5);
    assert_eq!(
        backend.last_uniform(program, "uTileSize"),
        Some(&UniformValue::Vec2(Vec2::new(0.25, 0.5)))
    );
    assert_eq!(
        backend.last_uniform(program, "uTileOffset"),
        Some(&UniformValue::Vec2(Vec2::new(0.25, 0.5)))
    );
}

#[test]
fn metadata_only_sprite_sheet_still_tracks_frames() {
    let mut backend = HeadlessBackend::new();
    let mut material = material("sprite_meta");
    let mut sprite = SpriteSheetPlugin::new(2, 2, 4.0, 4);
    sprite.play();
    material.add_plugin(sprite);
    material.build(&mut backend).unwrap();

    material.set_time(0.0);
    material.apply_params(&mut backend).unwrap();
    material.set_time(0.5);
    material.apply_params(&mut backend).unwrap();

    let sprite = material.plugin::<SpriteSheetPlugin>().unwrap();
    assert_eq!(sprite.current_frame(), 2);
    assert_eq!(sprite.tile_offset(), Vec2::new(0.0, 0.5));
    // unreferenced in the source, so no location
    assert!(!material.handles().uniform("uTileOffset").is_valid());
}

// ============================================================================
// Shadow map
// ============================================================================

#[test]
fn shadow_map_tests_depth_before_lighting() {
    let mut backend = HeadlessBackend::new();
    let mut material = material("shadowed");
    let mut shadow = ShadowMapPlugin::default();
    shadow.set_shadow_map(TextureRef::texture_2d(9));
    shadow.set_light_mvp_matrix(Mat4::from_translation(Vec3::Z));
    material.add_plugin(shadow);
    let program = material.build(&mut backend).unwrap();

    let composition = material.composition().unwrap();
    let vertex = composition.vertex_source();
    assert!(vertex.contains("const mat4 cBiasMatrix = mat4("), "{vertex}");
    assert!(vertex.contains("vShadowTexCoord = uLightMVPMatrix * (uModelMatrix * aPosition);"), "{vertex}");

    let fragment = composition.fragment_source();
    let test = position(
        fragment,
        "if (lightDepthCol.z < vShadowTexCoord.z - cShadowBias && shadowLightAngle <= -0.15) {",
    );
    let lighting = position(fragment, "gColor.rgb *= 1.0 - gShadowValue;");
    assert!(test < lighting);

    let units = material.activate(&mut backend).unwrap();
    assert_eq!(units, loom::Activation::Ready { texture_units: 1 });
    assert_eq!(
        backend.last_uniform(program, "uShadowInfluence"),
        Some(&UniformValue::Float(ShadowMapPlugin::DEFAULT_INFLUENCE))
    );
    assert_eq!(
        backend.last_uniform(program, "uLightMVPMatrix"),
        Some(&UniformValue::Mat4(Mat4::from_translation(Vec3::Z)))
    );
}

// ============================================================================
// Alpha mask
// ============================================================================

#[test]
fn alpha_mask_discards_after_lighting() {
    let mut backend = HeadlessBackend::new();
    let mut material = material("masked");
    material.add_plugin(AlphaMaskPlugin::new(0.3));
    let program = material.build(&mut backend).unwrap();

    let fragment = material.composition().unwrap().fragment_source().to_string();
    let lighting = position(&fragment, "gColor.rgb *= 1.0 - gShadowValue;");
    let discard = position(&fragment, "if (gColor.a < uAlphaMaskingThreshold) {\n        discard;\n    }");
    let output = position(&fragment, "gl_FragColor = gColor;");
    assert!(lighting < discard && discard < output);

    material.plugin_mut::<AlphaMaskPlugin>().unwrap().set_threshold(0.6);
    material.apply_params(&mut backend).unwrap();
    assert_eq!(
        backend.last_uniform(program, "uAlphaMaskingThreshold"),
        Some(&UniformValue::Float(0.6))
    );
}

// ============================================================================
// Fog
// ============================================================================

#[test]
fn fog_parameters_update_without_rebuild() {
    let mut backend = HeadlessBackend::new();
    let mut material = material("foggy");
    material.add_plugin(FogPlugin::default());
    let program = material.build(&mut backend).unwrap();
    let version = material.version();

    let fog = material.plugin_mut::<FogPlugin>().unwrap();
    fog.set_params(FogParams::linear(Vec3::new(0.1, 0.2, 0.3), 5.0, 50.0));
    fog.set_enabled(false);
    material.apply_params(&mut backend).unwrap();

    assert_eq!(material.version(), version);
    assert_eq!(
        backend.last_uniform(program, "uFogColor"),
        Some(&UniformValue::Vec3(Vec3::new(0.1, 0.2, 0.3)))
    );
    assert_eq!(backend.last_uniform(program, "uFogNear"), Some(&UniformValue::Float(5.0)));
    assert_eq!(backend.last_uniform(program, "uFogEnabled"), Some(&UniformValue::Bool(false)));
}

// ============================================================================
// Combinations
// ============================================================================

#[test]
fn every_builtin_plugin_links_together() {
    let mut backend = HeadlessBackend::new();
    let mut material = material("everything");
    material.add_plugin(SkeletalAnimationPlugin::new(16, 4));
    material.add_plugin(FogPlugin::default());
    material.add_plugin(ShadowMapPlugin::default());
    material.add_plugin(SpriteSheetPlugin::new(2, 2, 1.0, 4).spliced());
    material.add_plugin(AlphaMaskPlugin::default());

    material.build(&mut backend).unwrap();
    let composition = material.composition().unwrap();

    let ids: Vec<_> = composition.contributions().map(|c| c.shader_id().to_string()).collect();
    assert_eq!(
        ids,
        [
            "SKELETAL_ANIMATION_VERTEX",
            "SHADOW_MAP_VERTEX_SHADER_FRAGMENT",
            "SPRITE_SHEET_VERTEX_SHADER_FRAGMENT",
            "FOG_VERTEX_SHADER_FRAGMENT",
            "FOG_FRAGMENT_SHADER_FRAGMENT",
            "SHADOW_MAP_FRAGMENT_SHADER_FRAGMENT",
            "ALPHA_MASK_FRAGMENT_SHADER_FRAGMENT",
        ]
    );
    assert!(composition.contributions().all(|c| c.statements() > 0));

    // same plugins, same text
    let first = composition.vertex.source.hash;
    let again = material.compose().unwrap().vertex.source.hash;
    assert_eq!(first, again);
}
