#![allow(unused)]
extern crate sigweave;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use sigweave::{
    Constant, LoadEvent, MemberFlags, MethodSignature, ModuleBuilder, ModuleSignature,
    ReplaceBody, SubstConstants, TypeDesc,
};
use std::hint::black_box;

/// A synthetic module shaped like real obfuscated input: a handful of
/// members, string constants and cross-member calls.
fn subject_image(member_count: usize) -> Vec<u8> {
    let mut builder = ModuleBuilder::new("obf/aa")
        .public()
        .data_member("w", "I", MemberFlags::PRIVATE)
        .unwrap();

    builder = builder
        .method("t", |m| {
            m.returns(TypeDesc::Str).public().body(|asm| {
                asm.load_str("Lunar Client (1.8.9)")?.ret_value()?;
                Ok(())
            })
        })
        .unwrap();

    for index in 0..member_count {
        let name = format!("m{index}");
        builder = builder
            .method(&name, |m| {
                m.param(TypeDesc::Int32)
                    .returns(TypeDesc::Int32)
                    .public()
                    .body(move |asm| {
                        asm.load_str(&format!("filler constant {index}"))?
                            .pop()?
                            .load_arg(0)?
                            .ret_value()?;
                        Ok(())
                    })
            })
            .unwrap();
    }

    sigweave::write_module(&builder.build().unwrap()).unwrap()
}

fn signature() -> ModuleSignature {
    ModuleSignature::builder("window")
        .string_containing("Lunar Client (")
        .method(
            "title",
            MethodSignature::new().arity(0).returns(TypeDesc::Str),
        )
        .build()
        .unwrap()
}

fn bench_parse(c: &mut Criterion) {
    let image = subject_image(64);

    let mut group = c.benchmark_group("parse");
    group.throughput(Throughput::Bytes(image.len() as u64));
    group.bench_function("parse_module", |b| {
        b.iter(|| {
            let module = sigweave::parse_module(black_box(&image)).unwrap();
            black_box(module)
        });
    });
    group.finish();
}

fn bench_matching(c: &mut Criterion) {
    let image = subject_image(64);
    let module = sigweave::parse_module(&image).unwrap();
    let sig = signature();

    let mut group = c.benchmark_group("matching");
    group.bench_function("module_signature", |b| {
        b.iter(|| black_box(sig.matches(black_box(&module)).unwrap()));
    });
    group.finish();
}

fn bench_registry(c: &mut Criterion) {
    let image = subject_image(64);

    let mut group = c.benchmark_group("registry");
    group.throughput(Throughput::Bytes(image.len() as u64));
    group.bench_function("transform_with_rewrite", |b| {
        // A fresh registry per iteration keeps the resolve path in the
        // measurement, matching the cold-load case.
        b.iter(|| {
            let registry = sigweave::FinderRegistry::new();
            registry
                .register(
                    ModuleSignature::builder("window")
                        .string_containing("Lunar Client (")
                        .method(
                            "title",
                            MethodSignature::new().arity(0).returns(TypeDesc::Str),
                        )
                        .member_transform(
                            "title",
                            ReplaceBody::fixed_return(Constant::str("patched")),
                        )
                        .build()
                        .unwrap(),
                )
                .unwrap();
            black_box(registry.transform(&LoadEvent::new("obf/aa", black_box(&image))))
        });
    });
    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let image = subject_image(64);
    let mut pipeline = sigweave::TransformPipeline::new();
    pipeline.push(std::sync::Arc::new(
        SubstConstants::new().map(
            Constant::str("Lunar Client (1.8.9)"),
            Constant::str("Lunar Client (1.21)"),
        ),
    ));

    let mut group = c.benchmark_group("pipeline");
    group.throughput(Throughput::Bytes(image.len() as u64));
    group.bench_function("substitute_constants", |b| {
        b.iter(|| black_box(pipeline.apply(black_box(&image)).unwrap()));
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_parse,
    bench_matching,
    bench_registry,
    bench_pipeline
);
criterion_main!(benches);
