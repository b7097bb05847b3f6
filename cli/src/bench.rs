//! The wall clock timing harness behind `malbolge bench`.

use std::{process::ExitCode, time::Instant};

use clap::ValueEnum;
use serde_json::json;

use malbolge::{
    generator::{Generator, GeneratorConfig},
    interpreter::Interpreter,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Module {
    Interpreter,
    Generator,
    All,
}

pub fn run(module: Module) -> ExitCode {
    let interpreter_selected = matches!(module, Module::Interpreter | Module::All);
    let generator_selected = matches!(module, Module::Generator | Module::All);

    if interpreter_selected && bench_interpreter().is_err() {
        return ExitCode::FAILURE;
    }
    if generator_selected && bench_generator().is_err() {
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

/// Generates a fixed program once and times repeated executions of it.
fn bench_interpreter() -> Result<(), ()> {
    const ROUNDS: u32 = 200;

    let config = GeneratorConfig {
        random_seed: Some(42),
        ..Default::default()
    };
    let program = match Generator::new().generate_for_string(b"Hi", &config) {
        Ok(result) => result.opcodes,
        Err(err) => {
            eprintln!("benchmark setup failed: {}", err);
            return Err(());
        }
    };

    let interpreter = Interpreter::default();
    let started = Instant::now();
    for _ in 0..ROUNDS {
        if interpreter.execute(&program, false).is_err() {
            eprintln!("benchmark run failed to load its own program");
            return Err(());
        }
    }
    let total = started.elapsed();

    println!(
        "{}",
        json!({
            "module": "interpreter",
            "rounds": ROUNDS,
            "program_len": program.len(),
            "total_ns": total.as_nanos() as u64,
            "per_round_ns": (total.as_nanos() / ROUNDS as u128) as u64,
        })
    );
    Ok(())
}

/// Times seeded single byte generations, cache cold each round.
fn bench_generator() -> Result<(), ()> {
    const ROUNDS: u32 = 20;

    let config = GeneratorConfig {
        random_seed: Some(7),
        ..Default::default()
    };

    let started = Instant::now();
    let mut evaluations = 0;
    for _ in 0..ROUNDS {
        match Generator::new().generate_for_string(b"!", &config) {
            Ok(result) => evaluations += result.stats.evaluations,
            Err(err) => {
                eprintln!("benchmark generation failed: {}", err);
                return Err(());
            }
        }
    }
    let total = started.elapsed();

    println!(
        "{}",
        json!({
            "module": "generator",
            "rounds": ROUNDS,
            "evaluations": evaluations,
            "total_ns": total.as_nanos() as u64,
            "per_round_ns": (total.as_nanos() / ROUNDS as u128) as u64,
        })
    );
    Ok(())
}
