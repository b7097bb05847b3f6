//! The main interface out of the crate.
//!
//! Bundles the interpreter and generator entry points behind plain
//! functions for callers that do not need to hold onto the instances.
use crate::{
    error::{GenerateError, LoadError},
    generator::{GenerationResult, Generator, GeneratorConfig},
    interpreter::{ExecutionResult, Interpreter, InterpreterConfig},
};

/// Runs an opcode program with the given configuration.
pub fn execute_opcodes(
    opcodes: &str,
    config: InterpreterConfig,
) -> Result<ExecutionResult, LoadError> {
    Interpreter::new(config).execute(opcodes, false)
}

/// Runs ASCII source text with the given configuration.
pub fn execute_source(source: &str, config: InterpreterConfig) -> Result<ExecutionResult, LoadError> {
    Interpreter::new(config).execute_ascii(source, false)
}

/// Builds a program printing `target` and returns the full result record.
pub fn generate_for_string(
    target: &[u8],
    config: GeneratorConfig,
) -> Result<GenerationResult, GenerateError> {
    Generator::new().generate_for_string(target, &config)
}
