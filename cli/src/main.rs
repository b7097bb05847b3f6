//! Command line frontend for the malbolge toolkit.

mod bench;

use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

use clap::{Parser, Subcommand};
use log::debug;
use serde_json::json;

use malbolge::{
    generator::{Generator, GeneratorConfig},
    interpreter::{ExecutionResult, Interpreter, InterpreterConfig},
};

#[derive(Parser)]
#[command(name = "malbolge", version, about = "Generate and run Malbolge programs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Synthesize a program that prints the given text.
    Generate {
        /// The text the generated program has to print.
        #[arg(long)]
        text: String,
        /// Seed for the randomized extension; fixes the whole run.
        #[arg(long)]
        seed: Option<u64>,
        /// Depth of the exhaustive search layer.
        #[arg(long, value_name = "D")]
        max_depth: Option<usize>,
        /// Construction opcodes to build candidates from.
        #[arg(long)]
        opcodes: Option<String>,
        /// Randomized draws allowed per character.
        #[arg(long)]
        draw_limit: Option<usize>,
        /// Dump per candidate trace events as JSON lines.
        #[arg(long)]
        trace: bool,
    },
    /// Run a program and print its output.
    Run {
        /// Program given as opcode symbols.
        #[arg(long)]
        opcodes: Option<String>,
        /// Program given as ASCII source text.
        #[arg(long)]
        ascii: Option<String>,
        /// Read opcode symbols from a file.
        #[arg(long, value_name = "PATH")]
        opcodes_file: Option<PathBuf>,
        /// Read ASCII source from a file.
        #[arg(long, value_name = "PATH")]
        ascii_file: Option<PathBuf>,
        /// Step budget before the run is cut off.
        #[arg(long)]
        max_steps: Option<u64>,
        /// Fingerprint capacity for cycle detection.
        #[arg(long)]
        cycle_limit: Option<usize>,
        /// Turn cycle detection off entirely.
        #[arg(long)]
        no_cycle_detection: bool,
    },
    /// Time the core components and print a JSON report.
    Bench {
        /// Which component to time.
        #[arg(long, value_enum, default_value = "all")]
        module: bench::Module,
    },
}

fn main() -> ExitCode {
    env_logger::init();

    match Cli::parse().command {
        Command::Generate {
            text,
            seed,
            max_depth,
            opcodes,
            draw_limit,
            trace,
        } => generate(text, seed, max_depth, opcodes, draw_limit, trace),
        Command::Run {
            opcodes,
            ascii,
            opcodes_file,
            ascii_file,
            max_steps,
            cycle_limit,
            no_cycle_detection,
        } => run(
            opcodes,
            ascii,
            opcodes_file,
            ascii_file,
            max_steps,
            cycle_limit,
            no_cycle_detection,
        ),
        Command::Bench { module } => bench::run(module),
    }
}

fn generate(
    text: String,
    seed: Option<u64>,
    max_depth: Option<usize>,
    opcodes: Option<String>,
    draw_limit: Option<usize>,
    trace: bool,
) -> ExitCode {
    let mut config = GeneratorConfig {
        random_seed: seed,
        capture_trace: trace,
        ..Default::default()
    };
    if let Some(depth) = max_depth {
        config.max_search_depth = depth;
    }
    if let Some(choices) = opcodes {
        config.opcode_choices = choices;
    }
    if let Some(limit) = draw_limit {
        config.random_draw_limit = limit;
    }

    let result = match Generator::new().generate_for_string(text.as_bytes(), &config) {
        Ok(result) => result,
        Err(err) => {
            eprintln!("generation failed: {}", err);
            return ExitCode::FAILURE;
        }
    };

    println!("{}", result.ascii_source);

    let stats = &result.stats;
    let report = json!({
        "opcodes": result.opcodes,
        "target_len": result.target.len(),
        "stats": {
            "evaluations": stats.evaluations,
            "accepted": stats.accepted,
            "pruned": stats.pruned,
            "repeated_state_pruned": stats.repeated_state_pruned,
            "cache_hits": stats.cache_hits,
            "random_draws": stats.random_draws,
            "duration_ns": stats.duration_ns as u64,
            "trace_length": stats.trace_length,
            "pruned_ratio": stats.pruned_ratio,
            "repeated_state_ratio": stats.repeated_state_ratio,
        },
    });
    eprintln!("{}", report);

    if let Some(events) = &result.trace {
        for event in events {
            println!(
                "{}",
                json!({
                    "depth": event.depth,
                    "symbol": event.symbol.to_string(),
                    "reason": format!("{:?}", event.reason),
                    "output_length": event.output_length,
                })
            );
        }
    }

    ExitCode::SUCCESS
}

fn run(
    opcodes: Option<String>,
    ascii: Option<String>,
    opcodes_file: Option<PathBuf>,
    ascii_file: Option<PathBuf>,
    max_steps: Option<u64>,
    cycle_limit: Option<usize>,
    no_cycle_detection: bool,
) -> ExitCode {
    let mut config = InterpreterConfig::default();
    if let Some(max) = max_steps {
        config.max_steps = max;
    }
    if no_cycle_detection {
        config.cycle_detection_limit = 0;
    } else if let Some(limit) = cycle_limit {
        config.cycle_detection_limit = limit;
    }

    // exactly one program source is accepted
    let given = [
        opcodes.is_some(),
        ascii.is_some(),
        opcodes_file.is_some(),
        ascii_file.is_some(),
    ]
    .iter()
    .filter(|&&set| set)
    .count();
    if given != 1 {
        eprintln!("exactly one of --opcodes, --ascii, --opcodes-file or --ascii-file is required");
        return ExitCode::FAILURE;
    }

    let interpreter = Interpreter::new(config);
    let executed = if let Some(program) = opcodes {
        interpreter.execute(&program, false)
    } else if let Some(source) = ascii {
        interpreter.execute_ascii(&source, false)
    } else if let Some(path) = opcodes_file {
        match fs::read_to_string(&path) {
            Ok(program) => interpreter.execute(program.trim_end(), false),
            Err(err) => {
                eprintln!("cannot read {}: {}", path.display(), err);
                return ExitCode::FAILURE;
            }
        }
    } else {
        // the counting above guarantees the ascii file is present
        let path = ascii_file.expect("one source is set");
        match fs::read_to_string(&path) {
            Ok(source) => interpreter.execute_ascii(&source, false),
            Err(err) => {
                eprintln!("cannot read {}: {}", path.display(), err);
                return ExitCode::FAILURE;
            }
        }
    };

    match executed {
        Ok(result) => {
            debug!("run finished after {} steps", result.steps);
            report_run(&result)
        }
        Err(err) => {
            eprintln!("load failed: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn report_run(result: &ExecutionResult) -> ExitCode {
    let mut stdout = io::stdout();
    if stdout.write_all(&result.output).is_err() {
        return ExitCode::FAILURE;
    }
    let _ = stdout.flush();

    let last = result
        .halt_metadata
        .last_instruction
        .map(|instruction| instruction.to_string())
        .unwrap_or_else(|| "-".to_string());
    eprintln!(
        "halted: {} after {} step(s), last instruction '{}'",
        result.halt_reason, result.steps, last
    );
    if result.halt_metadata.cycle_detected {
        eprintln!(
            "cycle detected, repeat length {:?}",
            result.halt_metadata.cycle_repeat_length
        );
    }

    if result.halt_reason.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
