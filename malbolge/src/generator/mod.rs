//! The program generator: drives the interpreter to discover an opcode
//! sequence whose output equals a chosen target string.
mod search;


use std::sync::{atomic::AtomicBool, Arc};

use crate::{
    definitions::{generator as defaults, memory},
    error::GenerateError,
    interpreter::Fingerprint,
};

/// Tuning for one generation run. All fields have working defaults.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Seeds the randomized extension; a fixed seed makes the whole run
    /// reproducible.
    pub random_seed: Option<u64>,
    /// Depth of the exhaustive expansion layer per target byte.
    pub max_search_depth: usize,
    /// The construction opcodes candidates are built from; a non-empty
    /// subset of `"op*"`.
    pub opcode_choices: String,
    /// Upper bound on the opcode count of the finished program.
    pub max_program_length: usize,
    /// Whether per candidate trace events are collected.
    pub capture_trace: bool,
    /// Randomized draws allowed per target byte before giving up.
    pub random_draw_limit: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            random_seed: None,
            max_search_depth: defaults::MAX_SEARCH_DEPTH,
            opcode_choices: defaults::OPCODE_CHOICES.to_string(),
            max_program_length: memory::SIZE,
            capture_trace: false,
            random_draw_limit: defaults::RANDOM_DRAW_LIMIT,
        }
    }
}

/// Why a candidate evaluation ended the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceReason {
    /// The candidate stayed live or was committed.
    Accepted,
    /// The candidate's output stopped being a target prefix.
    PrefixMismatch,
    /// The candidate's state had already been explored for this byte.
    RepeatedState,
    /// The candidate's snapshot came out of the cache.
    CacheHit,
}

/// One candidate evaluation, recorded when tracing is on. Tracing roughly
/// doubles the memory a run takes.
#[derive(Debug, Clone)]
pub struct TraceEvent {
    /// The expansion level the candidate sits on; randomized extension
    /// draws record zero.
    pub depth: usize,
    pub parent_fingerprint: Fingerprint,
    pub symbol: char,
    pub reason: TraceReason,
    pub output_length: usize,
    pub fingerprint: Option<Fingerprint>,
}

/// Search counters for one generation run.
///
/// Every materialized candidate, probes included, lands in `evaluations`
/// and in exactly one of `pruned` and `accepted`, so
/// `evaluations == pruned + accepted` holds at all times.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationStats {
    /// Candidate states materialized, probes included.
    pub evaluations: u64,
    /// Candidates that stayed live or were committed.
    pub accepted: u64,
    /// Candidates rejected by the prefix or repeated-state rules.
    pub pruned: u64,
    /// The subset of `pruned` due to the repeated-state rule.
    pub repeated_state_pruned: u64,
    /// Snapshot cache hits.
    pub cache_hits: u64,
    /// Randomized extension draws across all target bytes.
    pub random_draws: u64,
    /// Wall clock of the whole run, verification included.
    pub duration_ns: u128,
    /// Number of captured trace events.
    pub trace_length: usize,
    /// `pruned / max(1, evaluations)`.
    pub pruned_ratio: f64,
    /// `repeated_state_pruned / max(1, pruned)`.
    pub repeated_state_ratio: f64,
}

/// The finished product of a generation run.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    /// The opcode string, always terminated by the halt opcode.
    pub opcodes: String,
    /// The program rendered as ASCII source text.
    pub ascii_source: String,
    /// The bytes the caller asked for.
    pub target: Vec<u8>,
    /// What the finished program printed on its verification run.
    pub machine_output: Vec<u8>,
    pub stats: GenerationStats,
    pub trace: Option<Vec<TraceEvent>>,
}

/// Builds Malbolge programs that print a chosen byte string.
///
/// Instances share nothing but the constant translation tables, so
/// independent targets generate freely in parallel.
#[derive(Default)]
pub struct Generator {
    cancel: Option<Arc<AtomicBool>>,
}

impl Generator {
    /// Creates a new generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a cancellation flag checked once per candidate.
    pub fn with_cancellation(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Searches for a program printing `target` under the given tuning.
    ///
    /// The finished program is re-executed once on a fresh machine; its
    /// output not matching the target is reported as an error rather than
    /// silently adjusted, since it can only mean a search bug.
    pub fn generate_for_string(
        &self,
        target: &[u8],
        config: &GeneratorConfig,
    ) -> Result<GenerationResult, GenerateError> {
        search::generate(target, config, self.cancel.clone())
    }
}
