//! The machine state backing the interpreter: tape growth, snapshots,
//! fingerprints and cycle bookkeeping.

use hashbrown::HashMap;
use sha2::{Digest, Sha256};

use crate::{
    definitions::{interpreter as defaults, memory},
    encoding::{self, Instruction},
    error::LoadError,
    ternary::{crz, Word},
};

/// Why a machine stopped, or that it has not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    Running,
    HaltOpcode,
    EndOfProgram,
    InvalidOpcode,
    InputUnderflow,
    StepLimitExceeded,
    MemoryLimitExceeded,
    Cancelled,
}

impl HaltReason {
    /// A machine with a terminal reason will not step again.
    pub fn is_terminal(self) -> bool {
        self != HaltReason::Running
    }

    /// The two reasons a healthy program ends with.
    pub fn is_success(self) -> bool {
        matches!(self, HaltReason::HaltOpcode | HaltReason::EndOfProgram)
    }
}

impl std::fmt::Display for HaltReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            HaltReason::Running => "running",
            HaltReason::HaltOpcode => "halt_opcode",
            HaltReason::EndOfProgram => "end_of_program",
            HaltReason::InvalidOpcode => "invalid_opcode",
            HaltReason::InputUnderflow => "input_underflow",
            HaltReason::StepLimitExceeded => "step_limit_exceeded",
            HaltReason::MemoryLimitExceeded => "memory_limit_exceeded",
            HaltReason::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

/// Executor tuning. All fields have working defaults.
#[derive(Debug, Clone)]
pub struct InterpreterConfig {
    /// Whether the tape may grow past its loaded size.
    pub allow_memory_expansion: bool,
    /// The largest number of cells the tape may reach.
    pub memory_limit: usize,
    /// The step budget for a single execution.
    pub max_steps: u64,
    /// How many sampled fingerprints the cycle tracker may hold; zero
    /// disables cycle detection.
    pub cycle_detection_limit: usize,
    /// The distance in steps between two fingerprint samples.
    pub cycle_sampling_period: u64,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            allow_memory_expansion: true,
            memory_limit: memory::SIZE,
            max_steps: defaults::MAX_STEPS,
            cycle_detection_limit: defaults::CYCLE_DETECTION_LIMIT,
            cycle_sampling_period: defaults::CYCLE_SAMPLING_PERIOD,
        }
    }
}

/// Identifies a machine state for caching and repetition checks. The tape
/// digest is the truncated SHA-256 of all materialized cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint {
    a: Word,
    c: Word,
    d: Word,
    tape_digest: [u8; 16],
    output_len: usize,
}

/// Sampled fingerprint bookkeeping for cycle detection.
#[derive(Debug, Clone, Default)]
pub(crate) struct CycleTracker {
    seen: HashMap<Fingerprint, u64>,
    pub(crate) detected: bool,
    pub(crate) repeat_length: Option<u64>,
    pub(crate) limited: bool,
}

impl CycleTracker {
    /// Records one sampled fingerprint, honoring the capacity bound. A
    /// repeated sample marks the cycle; running out of capacity only sets
    /// the limited flag, so execution continues either way.
    pub(crate) fn record(&mut self, fingerprint: Fingerprint, step: u64, capacity: usize) {
        if let Some(&first) = self.seen.get(&fingerprint) {
            if !self.detected {
                self.detected = true;
                self.repeat_length = Some(step - first);
            }
            return;
        }
        if self.seen.len() >= capacity {
            self.limited = true;
            return;
        }
        self.seen.insert(fingerprint, step);
    }
}

/// The state of one Malbolge machine.
///
/// The tape only materializes cells that execution has touched; an
/// untouched cell follows from the ternary fill rule on first access. A
/// clone therefore costs the touched prefix, not the whole address space,
/// which keeps candidate snapshots affordable during generation.
#[derive(Debug, Clone)]
pub(crate) struct Machine {
    pub(crate) a: Word,
    pub(crate) c: Word,
    pub(crate) d: Word,
    pub(crate) tape: Vec<Word>,
    /// Cells occupied by program text; the code pointer walking past this
    /// boundary ends the run.
    pub(crate) program_len: usize,
    pub(crate) output: Vec<u8>,
    pub(crate) steps: u64,
    pub(crate) memory_expansions: u64,
    pub(crate) peak_cells: usize,
    pub(crate) halt_reason: HaltReason,
    pub(crate) last_instruction: Option<Instruction>,
    pub(crate) last_jump_target: Option<Word>,
    pub(crate) cycle: CycleTracker,
}

impl Machine {
    /// Builds a machine from preencoded cell values.
    pub(crate) fn from_cells(cells: Vec<Word>, limit: usize) -> Result<Self, LoadError> {
        if cells.is_empty() {
            return Err(LoadError::EmptyProgram);
        }
        let limit = limit.min(memory::SIZE);
        if cells.len() > limit {
            return Err(LoadError::ProgramTooLong {
                len: cells.len(),
                limit,
            });
        }

        let mut tape = cells;
        let program_len = tape.len();
        if tape.len() < 2 {
            // the fill rule needs two predecessors
            let seed = crz(tape[0], 0);
            tape.push(seed);
        }
        let peak_cells = tape.len();

        Ok(Self {
            a: 0,
            c: 0,
            d: 0,
            tape,
            program_len,
            output: Vec::new(),
            steps: 0,
            memory_expansions: 0,
            peak_cells,
            halt_reason: HaltReason::Running,
            last_instruction: None,
            last_jump_target: None,
            cycle: CycleTracker::default(),
        })
    }

    /// Builds a machine from an opcode program.
    pub(crate) fn from_opcodes(opcodes: &str, limit: usize) -> Result<Self, LoadError> {
        Self::from_cells(encoding::encode_program(opcodes)?, limit)
    }

    /// Builds a machine from ASCII source text.
    pub(crate) fn from_source(source: &str, limit: usize) -> Result<Self, LoadError> {
        Self::from_cells(encoding::parse_source(source)?, limit)
    }

    /// Records the terminal reason, keeping the first one that occurs.
    pub(crate) fn halt(&mut self, reason: HaltReason) {
        if self.halt_reason == HaltReason::Running {
            self.halt_reason = reason;
        }
    }

    /// Materializes the cell at `address`, filling the gap with the
    /// ternary rule. Returns false after halting the machine when the
    /// address lies past its memory bounds.
    pub(crate) fn ensure_cell(&mut self, address: usize, config: &InterpreterConfig) -> bool {
        if address < self.tape.len() {
            return true;
        }
        let needed = address + 1;
        if !config.allow_memory_expansion
            || needed > config.memory_limit
            || needed > memory::SIZE
        {
            self.halt(HaltReason::MemoryLimitExceeded);
            return false;
        }
        while self.tape.len() < needed {
            let len = self.tape.len();
            let cell = crz(self.tape[len - 1], self.tape[len - 2]);
            self.tape.push(cell);
        }
        self.memory_expansions += 1;
        self.peak_cells = self.peak_cells.max(self.tape.len());
        true
    }

    /// Appends opcode text at the first uninitialized cell past everything
    /// materialized so far and widens the program boundary over it. An
    /// end-of-program halt is cleared, since the program no longer ends
    /// there.
    pub(crate) fn append_opcodes(&mut self, opcodes: &str, limit: usize) -> Result<(), LoadError> {
        let limit = limit.min(memory::SIZE);
        let base = self.tape.len();
        let needed = base + opcodes.chars().count();
        if needed > limit {
            return Err(LoadError::ProgramTooLong { len: needed, limit });
        }
        for (offset, symbol) in opcodes.chars().enumerate() {
            let position = base + offset;
            let instruction = Instruction::from_symbol(symbol)
                .ok_or(LoadError::InvalidOpcodeSymbol { symbol, position })?;
            self.tape
                .push(encoding::encode_instruction(instruction, position) as Word);
        }
        self.program_len = self.tape.len();
        self.peak_cells = self.peak_cells.max(self.tape.len());
        if self.halt_reason == HaltReason::EndOfProgram {
            self.halt_reason = HaltReason::Running;
        }
        Ok(())
    }

    /// The canonical fingerprint of the current state.
    pub(crate) fn fingerprint(&self) -> Fingerprint {
        let mut hasher = Sha256::new();
        for cell in self.tape.iter() {
            hasher.update(cell.to_le_bytes());
        }
        let digest = hasher.finalize();
        let mut tape_digest = [0; 16];
        tape_digest.copy_from_slice(&digest[..16]);

        Fingerprint {
            a: self.a,
            c: self.c,
            d: self.d,
            tape_digest,
            output_len: self.output.len(),
        }
    }
}

/// An immutable deep copy of a machine, usable as a resumption point.
/// Resuming always clones again, so a snapshot can seed any number of
/// divergent continuations without them affecting each other.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub(crate) machine: Machine,
}

impl Snapshot {
    /// The output the machine had produced when it was captured.
    pub fn output(&self) -> &[u8] {
        &self.machine.output
    }

    /// The step counter at capture time.
    pub fn steps(&self) -> u64 {
        self.machine.steps
    }

    /// The registers `(a, c, d)` at capture time.
    pub fn registers(&self) -> (Word, Word, Word) {
        (self.machine.a, self.machine.c, self.machine.d)
    }

    /// The number of materialized tape cells at capture time.
    pub fn cells(&self) -> usize {
        self.machine.tape.len()
    }

    /// The halt reason at capture time.
    pub fn halt_reason(&self) -> HaltReason {
        self.machine.halt_reason
    }

    /// The canonical fingerprint of the captured state.
    pub fn fingerprint(&self) -> Fingerprint {
        self.machine.fingerprint()
    }
}
