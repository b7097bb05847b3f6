//! The layered candidate search behind the generator.
//!
//! Every target byte is found the same way: a depth bounded exhaustive
//! expansion over the construction opcodes, each candidate probed with a
//! single output opcode, and a seeded random walk extending the frontier
//! whenever the bounded tree comes up empty.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Instant,
};

use hashbrown::{HashMap, HashSet};
use log::{debug, trace};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use tinyvec::ArrayVec;

use crate::{
    definitions::{generator as defaults, memory},
    encoding,
    error::{ExhaustedBudget, GenerateError},
    interpreter::{Fingerprint, HaltReason, Interpreter, InterpreterConfig, Snapshot},
};

use super::{GenerationResult, GenerationStats, GeneratorConfig, TraceEvent, TraceReason};

/// The probe opcode appended to test a candidate for the next target byte.
const OUTPUT_SYMBOL: char = '<';

/// The deepest expansion the in-search suffix buffer can hold; the
/// configured depth is clamped to it.
const SUFFIX_CAP: usize = 32;

/// The bounded suffix a tree node has accumulated.
type Suffix = ArrayVec<[u8; SUFFIX_CAP]>;

/// One live node of the expansion tree.
struct Node {
    suffix: Suffix,
    snapshot: Snapshot,
    fingerprint: Fingerprint,
}

/// A materialized child together with how it was obtained.
struct Child {
    snapshot: Snapshot,
    fingerprint: Fingerprint,
    cached: bool,
}

/// A candidate whose probe printed the wanted byte.
struct Winner {
    suffix: Suffix,
    snapshot: Snapshot,
}

struct Search<'a> {
    target: &'a [u8],
    config: &'a GeneratorConfig,
    interpreter: Interpreter,
    cancel: Option<Arc<AtomicBool>>,
    choices: Vec<char>,
    rng: SmallRng,
    cache: HashMap<(Fingerprint, char), Snapshot>,
    stats: GenerationStats,
    trace: Option<Vec<TraceEvent>>,
}

pub(super) fn generate(
    target: &[u8],
    config: &GeneratorConfig,
    cancel: Option<Arc<AtomicBool>>,
) -> Result<GenerationResult, GenerateError> {
    validate_choices(&config.opcode_choices)?;
    let started = Instant::now();

    let mut interpreter = Interpreter::new(InterpreterConfig {
        // candidate programs are straight line code; cycle tracking would
        // only slow the search down
        cycle_detection_limit: 0,
        ..InterpreterConfig::default()
    });
    if let Some(cancel) = cancel.as_ref() {
        interpreter = interpreter.with_cancellation(Arc::clone(cancel));
    }

    let rng = match config.random_seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_entropy(),
    };

    let mut search = Search {
        target,
        config,
        interpreter,
        cancel,
        choices: config.opcode_choices.chars().collect(),
        rng,
        cache: HashMap::new(),
        stats: GenerationStats::default(),
        trace: config.capture_trace.then(Vec::new),
    };

    let mut program = defaults::BOOTSTRAP.clone();
    let mut frontier = search.execute_root(&program)?;

    for (index, &byte) in target.iter().enumerate() {
        let (suffix, snapshot) = search.emit_byte(&frontier, index, byte, program.len())?;
        debug!(
            "byte {} ({:#04X}) committed after {} opcodes, program at {}",
            index,
            byte,
            suffix.len(),
            program.len() + suffix.len()
        );
        program.push_str(&suffix);
        frontier = snapshot;
    }

    program.push('v');
    search.finish(program, started)
}

impl Search<'_> {
    /// Runs the bootstrap prefix once; its terminal snapshot roots every
    /// later expansion.
    fn execute_root(&mut self, bootstrap: &str) -> Result<Snapshot, GenerateError> {
        let result = self.interpreter.execute(bootstrap, true)?;
        if result.halt_reason == HaltReason::Cancelled {
            return Err(GenerateError::Cancelled);
        }
        // capture was requested, so the machine is present
        Ok(result.machine.expect("captured machine"))
    }

    /// Finds and commits the opcode suffix that prints the target byte at
    /// `index`, returning it together with the new frontier.
    fn emit_byte(
        &mut self,
        frontier: &Snapshot,
        index: usize,
        byte: u8,
        program_len: usize,
    ) -> Result<(String, Snapshot), GenerateError> {
        let depth = self.config.max_search_depth.min(SUFFIX_CAP);
        let limit = self.config.max_program_length.min(memory::SIZE);
        let mut seen: HashSet<Fingerprint> = HashSet::new();
        let mut frontier = frontier.clone();
        let mut drawn = String::new();
        let mut draws = 0;

        loop {
            if let Some(winner) = self.expand(&frontier, index, depth, &mut seen)? {
                let mut suffix = drawn;
                for &symbol in winner.suffix.iter() {
                    suffix.push(symbol as char);
                }
                suffix.push(OUTPUT_SYMBOL);
                // room for the terminating halt opcode has to remain
                if program_len + suffix.len() + 1 > limit {
                    return Err(GenerateError::Exhausted {
                        index,
                        byte,
                        limit,
                        budget: ExhaustedBudget::ProgramLength,
                    });
                }
                return Ok((suffix, winner.snapshot));
            }

            // the bounded tree came up empty: extend the frontier by one
            // random construction opcode and search again from there
            if draws >= self.config.random_draw_limit {
                return Err(GenerateError::Exhausted {
                    index,
                    byte,
                    limit: self.config.random_draw_limit,
                    budget: ExhaustedBudget::RandomDraws,
                });
            }
            if program_len + drawn.len() + 2 > limit {
                return Err(GenerateError::Exhausted {
                    index,
                    byte,
                    limit,
                    budget: ExhaustedBudget::ProgramLength,
                });
            }
            draws += 1;
            self.stats.random_draws += 1;

            let pick = self.rng.gen_range(0..self.choices.len());
            let symbol = self.choices[pick];
            let parent = frontier.fingerprint();
            let child = self.child(&frontier, parent, symbol)?;
            self.stats.evaluations += 1;
            self.stats.accepted += 1;
            self.push_trace(
                0,
                parent,
                symbol,
                TraceReason::Accepted,
                child.snapshot.output().len(),
                Some(child.fingerprint),
            );
            trace!(
                "byte {}: draw {} extends the frontier with '{}'",
                index,
                draws,
                symbol
            );
            drawn.push(symbol);
            frontier = child.snapshot;
        }
    }

    /// Runs one depth bounded exhaustive expansion from `frontier`.
    /// Returns the first winner in search order, which is also the
    /// shortest and choice-wise smallest one.
    fn expand(
        &mut self,
        frontier: &Snapshot,
        index: usize,
        depth: usize,
        seen: &mut HashSet<Fingerprint>,
    ) -> Result<Option<Winner>, GenerateError> {
        // copy the target reference out so the slice does not pin `self`
        let target = self.target;
        let wanted = &target[..index + 1];
        let choices = self.choices.clone();

        let mut level = vec![Node {
            suffix: Suffix::new(),
            snapshot: frontier.clone(),
            fingerprint: frontier.fingerprint(),
        }];

        for current_depth in 1..=depth {
            let mut next = Vec::with_capacity(level.len() * choices.len());

            for node in level.iter() {
                for &symbol in choices.iter() {
                    self.check_cancelled()?;

                    let child = self.child(&node.snapshot, node.fingerprint, symbol)?;
                    self.stats.evaluations += 1;

                    if seen.contains(&child.fingerprint) {
                        self.stats.pruned += 1;
                        self.stats.repeated_state_pruned += 1;
                        self.push_trace(
                            current_depth,
                            node.fingerprint,
                            symbol,
                            TraceReason::RepeatedState,
                            child.snapshot.output().len(),
                            Some(child.fingerprint),
                        );
                        continue;
                    }
                    seen.insert(child.fingerprint);

                    // a construction opcode produces no output and the
                    // child ran a single straight line step, so anything
                    // else disqualifies the branch
                    let healthy = child.snapshot.halt_reason() == HaltReason::EndOfProgram
                        && wanted.starts_with(child.snapshot.output());
                    if !healthy {
                        self.stats.pruned += 1;
                        self.push_trace(
                            current_depth,
                            node.fingerprint,
                            symbol,
                            TraceReason::PrefixMismatch,
                            child.snapshot.output().len(),
                            Some(child.fingerprint),
                        );
                        continue;
                    }
                    self.stats.accepted += 1;
                    self.push_trace(
                        current_depth,
                        node.fingerprint,
                        symbol,
                        if child.cached {
                            TraceReason::CacheHit
                        } else {
                            TraceReason::Accepted
                        },
                        child.snapshot.output().len(),
                        Some(child.fingerprint),
                    );

                    // probe: does one output opcode print the wanted byte?
                    let probe = self.child(&child.snapshot, child.fingerprint, OUTPUT_SYMBOL)?;
                    self.stats.evaluations += 1;
                    if probe.snapshot.output() == wanted {
                        self.stats.accepted += 1;
                        self.push_trace(
                            current_depth,
                            child.fingerprint,
                            OUTPUT_SYMBOL,
                            TraceReason::Accepted,
                            probe.snapshot.output().len(),
                            Some(probe.fingerprint),
                        );
                        let mut suffix = node.suffix;
                        suffix.push(symbol as u8);
                        return Ok(Some(Winner {
                            suffix,
                            snapshot: probe.snapshot,
                        }));
                    }
                    self.stats.pruned += 1;
                    self.push_trace(
                        current_depth,
                        child.fingerprint,
                        OUTPUT_SYMBOL,
                        TraceReason::PrefixMismatch,
                        probe.snapshot.output().len(),
                        Some(probe.fingerprint),
                    );

                    // the probe byte is discarded; the construction child
                    // itself is still a valid expansion parent
                    if current_depth < depth {
                        let mut suffix = node.suffix;
                        suffix.push(symbol as u8);
                        next.push(Node {
                            suffix,
                            snapshot: child.snapshot,
                            fingerprint: child.fingerprint,
                        });
                    }
                }
            }

            if next.is_empty() && current_depth < depth {
                break;
            }
            level = next;
        }

        Ok(None)
    }

    /// Materializes `parent` extended by a single opcode, going through
    /// the snapshot cache.
    fn child(
        &mut self,
        parent: &Snapshot,
        parent_fingerprint: Fingerprint,
        symbol: char,
    ) -> Result<Child, GenerateError> {
        let key = (parent_fingerprint, symbol);
        if let Some(snapshot) = self.cache.get(&key) {
            self.stats.cache_hits += 1;
            let snapshot = snapshot.clone();
            let fingerprint = snapshot.fingerprint();
            return Ok(Child {
                snapshot,
                fingerprint,
                cached: true,
            });
        }

        let mut buffer = [0u8; 4];
        let suffix = symbol.encode_utf8(&mut buffer);
        let result = self.interpreter.execute_from_snapshot(parent, suffix, true)?;
        if result.halt_reason == HaltReason::Cancelled {
            return Err(GenerateError::Cancelled);
        }
        // capture was requested, so the machine is present
        let snapshot = result.machine.expect("captured machine");
        let fingerprint = snapshot.fingerprint();
        self.cache.insert(key, snapshot.clone());

        Ok(Child {
            snapshot,
            fingerprint,
            cached: false,
        })
    }

    fn check_cancelled(&self) -> Result<(), GenerateError> {
        match self.cancel.as_ref() {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(GenerateError::Cancelled),
            _ => Ok(()),
        }
    }

    fn push_trace(
        &mut self,
        depth: usize,
        parent_fingerprint: Fingerprint,
        symbol: char,
        reason: TraceReason,
        output_length: usize,
        fingerprint: Option<Fingerprint>,
    ) {
        if let Some(trace) = self.trace.as_mut() {
            trace.push(TraceEvent {
                depth,
                parent_fingerprint,
                symbol,
                reason,
                output_length,
                fingerprint,
            });
        }
    }

    /// Verifies the finished program on a fresh machine and assembles the
    /// result record.
    fn finish(
        mut self,
        program: String,
        started: Instant,
    ) -> Result<GenerationResult, GenerateError> {
        let verifier = Interpreter::default();
        let result = verifier.execute(&program, false)?;
        if result.output.as_slice() != self.target {
            return Err(GenerateError::VerificationFailed {
                expected: self.target.to_vec(),
                actual: result.output,
            });
        }

        let ascii_source = encoding::render_source(&program)?;

        self.stats.duration_ns = started.elapsed().as_nanos();
        self.stats.trace_length = self.trace.as_ref().map_or(0, Vec::len);
        self.stats.pruned_ratio =
            self.stats.pruned as f64 / self.stats.evaluations.max(1) as f64;
        self.stats.repeated_state_ratio =
            self.stats.repeated_state_pruned as f64 / self.stats.pruned.max(1) as f64;

        debug!(
            "generated {} opcodes for {} target byte(s): {} evaluations, {} pruned, {} cache hits, {} draws",
            program.len(),
            self.target.len(),
            self.stats.evaluations,
            self.stats.pruned,
            self.stats.cache_hits,
            self.stats.random_draws
        );

        Ok(GenerationResult {
            opcodes: program,
            ascii_source,
            target: self.target.to_vec(),
            machine_output: result.output,
            stats: self.stats,
            trace: self.trace,
        })
    }
}

/// The construction alphabet has to be a non-empty subset of the opcodes
/// that neither output nor jump.
fn validate_choices(choices: &str) -> Result<(), GenerateError> {
    let valid = !choices.is_empty()
        && choices
            .chars()
            .all(|symbol| defaults::OPCODE_CHOICES.contains(symbol));
    if valid {
        Ok(())
    } else {
        Err(GenerateError::InvalidChoices {
            choices: choices.to_string(),
        })
    }
}
