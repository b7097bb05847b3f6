//! The full virtual machine implementation, from the stateful core to the
//! public execution surface.
mod exec;
mod machine;
mod print;

/// reexport the state and configuration types for simpler usage
pub use exec::StepObserver;
pub use machine::{Fingerprint, HaltReason, InterpreterConfig, Snapshot};

/// split up tests into an other file for simpler implementation
#[cfg(test)]
mod tests;

use std::sync::{atomic::AtomicBool, Arc};

use parking_lot::ReentrantMutex;

use crate::{encoding::Instruction, error::LoadError, ternary::Word};

use machine::Machine;

/// Diagnostic detail captured at the end of a run. Every field is
/// populated on every terminal path, errors included.
#[derive(Debug, Clone, Default)]
pub struct HaltMetadata {
    /// The last instruction that was decoded for execution.
    pub last_instruction: Option<Instruction>,
    /// Where the last jump went, if one ran.
    pub last_jump_target: Option<Word>,
    /// Whether a sampled state fingerprint repeated.
    pub cycle_detected: bool,
    /// The step distance between the two identical samples.
    pub cycle_repeat_length: Option<u64>,
    /// Whether the tracker ran out of capacity and stopped sampling.
    pub cycle_tracking_limited: bool,
}

/// Everything the caller learns from one execution. Terminal conditions
/// are reported here, never raised.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub output: Vec<u8>,
    pub halted: bool,
    pub steps: u64,
    pub halt_reason: HaltReason,
    pub halt_metadata: HaltMetadata,
    pub memory_expansions: u64,
    pub peak_memory_cells: usize,
    /// The final machine, when its capture was requested.
    pub machine: Option<Snapshot>,
}

impl ExecutionResult {
    fn collect(machine: Machine, capture_machine: bool) -> Self {
        let halt_metadata = HaltMetadata {
            last_instruction: machine.last_instruction,
            last_jump_target: machine.last_jump_target,
            cycle_detected: machine.cycle.detected,
            cycle_repeat_length: machine.cycle.repeat_length,
            cycle_tracking_limited: machine.cycle.limited,
        };

        Self {
            output: machine.output.clone(),
            halted: machine.halt_reason.is_terminal(),
            steps: machine.steps,
            halt_reason: machine.halt_reason,
            halt_metadata,
            memory_expansions: machine.memory_expansions,
            peak_memory_cells: machine.peak_cells,
            machine: if capture_machine {
                Some(Snapshot { machine })
            } else {
                None
            },
        }
    }
}

/// A Malbolge executor.
///
/// A single instance serializes its entry points under a re-entrant lock,
/// so sharing one across threads is safe but not parallel. Independent
/// instances and snapshots run freely in parallel, as the only process
/// wide state are the constant translation tables.
pub struct Interpreter {
    config: InterpreterConfig,
    cancel: Option<Arc<AtomicBool>>,
    entry: ReentrantMutex<()>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(InterpreterConfig::default())
    }
}

impl Interpreter {
    /// Creates a new executor with the given tuning.
    pub fn new(config: InterpreterConfig) -> Self {
        Self {
            config,
            cancel: None,
            entry: ReentrantMutex::new(()),
        }
    }

    /// Installs a cancellation flag checked once per step.
    pub fn with_cancellation(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Get a reference to the interpreter's configuration.
    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// Runs an opcode program on a fresh machine.
    pub fn execute(
        &self,
        opcodes: &str,
        capture_machine: bool,
    ) -> Result<ExecutionResult, LoadError> {
        let machine = Machine::from_opcodes(opcodes, self.config.memory_limit)?;
        Ok(self.run(machine, capture_machine, None))
    }

    /// Runs ASCII source text on a fresh machine.
    pub fn execute_ascii(
        &self,
        source: &str,
        capture_machine: bool,
    ) -> Result<ExecutionResult, LoadError> {
        let machine = Machine::from_source(source, self.config.memory_limit)?;
        Ok(self.run(machine, capture_machine, None))
    }

    /// Resumes a captured machine with extra opcode text appended past the
    /// program it was running. The snapshot itself stays untouched and can
    /// seed any number of further continuations.
    pub fn execute_from_snapshot(
        &self,
        snapshot: &Snapshot,
        suffix: &str,
        capture_machine: bool,
    ) -> Result<ExecutionResult, LoadError> {
        let mut machine = snapshot.machine.clone();
        machine.append_opcodes(suffix, self.config.memory_limit)?;
        Ok(self.run(machine, capture_machine, None))
    }

    /// Runs an opcode program while reporting every finished step to the
    /// observer.
    pub fn execute_observed(
        &self,
        opcodes: &str,
        observer: &mut dyn StepObserver,
    ) -> Result<ExecutionResult, LoadError> {
        let machine = Machine::from_opcodes(opcodes, self.config.memory_limit)?;
        Ok(self.run(machine, false, Some(observer)))
    }

    fn run(
        &self,
        mut machine: Machine,
        capture_machine: bool,
        observer: Option<&mut dyn StepObserver>,
    ) -> ExecutionResult {
        let _entry = self.entry.lock();
        exec::run(&mut machine, &self.config, self.cancel.as_deref(), observer);
        ExecutionResult::collect(machine, capture_machine)
    }
}
