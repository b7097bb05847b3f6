use criterion::{black_box, criterion_group, criterion_main, Criterion};
use once_cell::sync::Lazy;

use malbolge::{
    definitions::generator::BOOTSTRAP,
    generator::{Generator, GeneratorConfig},
    interpreter::Interpreter,
    ternary,
};

/// preloading this as it get's called multiple times per unit
static BASE_PROGRAM: Lazy<String> = Lazy::new(|| {
    let config = GeneratorConfig {
        random_seed: Some(42),
        ..Default::default()
    };
    Generator::new()
        .generate_for_string(b"Hi", &config)
        .expect("A panic happend during the base program generation.")
        .opcodes
});

pub fn ternary_bench(c: &mut Criterion) {
    c.bench_function("crz_full_word", |b| {
        b.iter(|| ternary::crz(black_box(29524), black_box(42_000)));
    });
    c.bench_function("rotate_right", |b| {
        b.iter(|| ternary::rotate_right(black_box(29524)));
    });
}

pub fn interpreter_bench(c: &mut Criterion) {
    let program = BASE_PROGRAM.clone();
    let interpreter = Interpreter::default();
    c.bench_function("interpreter_full_run", |b| {
        b.iter(|| interpreter.execute(black_box(&program), false));
    });
}

pub fn print_bench(c: &mut Criterion) {
    let result = Interpreter::default()
        .execute(&BOOTSTRAP, true)
        .expect("The bootstrap prefix loads.");
    let snapshot = result.machine.expect("capture was requested");
    c.bench_function("print_bench", |b| {
        b.iter(|| {
            let _ = format!("{}", snapshot);
        });
    });
}

pub fn generator_bench(c: &mut Criterion) {
    let config = GeneratorConfig {
        random_seed: Some(7),
        ..Default::default()
    };
    c.bench_function("generate_single_byte", |b| {
        b.iter(|| Generator::new().generate_for_string(black_box(b"!"), &config));
    });
}

criterion_group!(
    benches,
    ternary_bench,
    interpreter_bench,
    print_bench,
    generator_bench
);
criterion_main!(benches);
