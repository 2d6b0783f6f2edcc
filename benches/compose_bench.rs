//! Composition Benchmarks
//!
//! Measures the compose path (declare, emit, render) and a full
//! compose → compile → link cycle against the headless backend.

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

use loom::backend::headless::HeadlessBackend;
use loom::material::{Material, MaterialSettings};
use loom::plugin::{AlphaMaskPlugin, FogPlugin, ShadowMapPlugin, SkeletalAnimationPlugin, SpriteSheetPlugin};

fn bare_material() -> Material {
    Material::with_settings("bench", MaterialSettings::default().with_debug_print_sources(false))
}

fn loaded_material() -> Material {
    let mut material = bare_material();
    material.add_plugin(SkeletalAnimationPlugin::new(64, 8));
    material.add_plugin(FogPlugin::default());
    material.add_plugin(ShadowMapPlugin::default());
    material.add_plugin(SpriteSheetPlugin::new(8, 8, 24.0, 64).spliced());
    material.add_plugin(AlphaMaskPlugin::default());
    material
}

fn bench_compose(c: &mut Criterion) {
    let mut group = c.benchmark_group("compose");

    let mut bare = bare_material();
    group.bench_function("core_only", |b| {
        b.iter(|| {
            let composition = bare.compose().unwrap();
            black_box(composition.vertex.source.hash);
        });
    });

    let mut loaded = loaded_material();
    group.bench_function("all_plugins", |b| {
        b.iter(|| {
            let composition = loaded.compose().unwrap();
            black_box(composition.fragment.source.hash);
        });
    });

    group.finish();
}

fn bench_build(c: &mut Criterion) {
    let mut backend = HeadlessBackend::new();
    let mut material = loaded_material();

    c.bench_function("build_and_activate", |b| {
        b.iter(|| {
            material.build(&mut backend).unwrap();
            black_box(material.activate(&mut backend).unwrap());
            backend.clear_calls();
        });
    });
}

criterion_group!(benches, bench_compose, bench_build);
criterion_main!(benches);
