use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use super::{machine::CycleTracker, machine::Machine, *};
use crate::{
    definitions::{generator::BOOTSTRAP, memory},
    encoding::Instruction,
    error::LoadError,
};

/// will setup the default configured interpreter
fn get_default_interpreter() -> Interpreter {
    Interpreter::default()
}

fn get_interpreter(config: InterpreterConfig) -> Interpreter {
    Interpreter::new(config)
}

#[test]
/// the halt opcode stops the machine on its very first step
fn test_halt_opcode() {
    let result = get_default_interpreter().execute("v", false).unwrap();

    assert!(result.halted);
    assert_eq!(HaltReason::HaltOpcode, result.halt_reason);
    assert_eq!(1, result.steps);
    assert!(result.output.is_empty());
    assert_eq!(
        Some(Instruction::End),
        result.halt_metadata.last_instruction
    );
}

#[test]
/// a program without a halt opcode ends when the code pointer walks off it
fn test_nop_runs_off_the_program() {
    let result = get_default_interpreter().execute("o", false).unwrap();

    assert_eq!(HaltReason::EndOfProgram, result.halt_reason);
    assert_eq!(1, result.steps);
    assert!(result.output.is_empty());
}

#[test]
/// the input opcode can never be satisfied on an output-only machine
fn test_input_opcode_underflows() {
    let result = get_default_interpreter().execute("/", false).unwrap();

    assert_eq!(HaltReason::InputUnderflow, result.halt_reason);
    assert_eq!(1, result.steps);
    assert_eq!(
        Some(Instruction::Input),
        result.halt_metadata.last_instruction
    );
}

#[test]
/// the opening jump of the bootstrap lands on cell 98, so only two steps
/// run before the code pointer walks off the prefix
fn test_bootstrap_jump_lands_on_the_runway() {
    let result = get_default_interpreter().execute(&BOOTSTRAP, true).unwrap();

    assert_eq!(HaltReason::EndOfProgram, result.halt_reason);
    assert_eq!(2, result.steps);
    assert_eq!(Some(98), result.halt_metadata.last_jump_target);
    assert_eq!(100, result.peak_memory_cells);

    let snapshot = result.machine.unwrap();
    let (a, c, d) = snapshot.registers();
    assert_eq!((0, 100, 2), (a, c, d));
}

#[test]
/// rotating a runway cell loads a known accumulator value for output
fn test_output_emits_accumulator_low_byte() {
    let program = format!("{}*<v", &*BOOTSTRAP);
    let result = get_default_interpreter().execute(&program, false).unwrap();

    assert_eq!(HaltReason::HaltOpcode, result.halt_reason);
    assert_eq!(vec![22], result.output);
    assert_eq!(5, result.steps);
}

#[test]
/// the crazy opcode rewrites the addressed cell and the accumulator
fn test_crazy_updates_cell_and_accumulator() {
    let program = format!("{}p<v", &*BOOTSTRAP);
    let result = get_default_interpreter().execute(&program, false).unwrap();

    assert_eq!(HaltReason::HaltOpcode, result.halt_reason);
    assert_eq!(vec![111], result.output);
    assert_eq!(5, result.steps);
}

#[test]
/// a rotate on its own cell leaves a value the re-encryption cannot take
fn test_rotating_own_cell_out_of_range_is_invalid() {
    let result = get_default_interpreter().execute("*<", false).unwrap();

    assert_eq!(HaltReason::InvalidOpcode, result.halt_reason);
    assert_eq!(1, result.steps);
}

#[test]
/// the step budget cuts a run off without touching produced output
fn test_step_limit() {
    let interpreter = get_interpreter(InterpreterConfig {
        max_steps: 5,
        ..Default::default()
    });
    let result = interpreter.execute("oooooooooo", false).unwrap();

    assert_eq!(HaltReason::StepLimitExceeded, result.halt_reason);
    assert_eq!(5, result.steps);
    assert!(result.output.is_empty());
}

#[test]
/// growth past the configured cell bound halts at the offending access
fn test_memory_limit_on_growth() {
    let interpreter = get_interpreter(InterpreterConfig {
        memory_limit: 32,
        ..Default::default()
    });
    // the opening data load points d at cell 40, past the configured limit
    let result = interpreter.execute("j*", false).unwrap();

    assert_eq!(HaltReason::MemoryLimitExceeded, result.halt_reason);
    assert_eq!(2, result.steps);
    assert_eq!(0, result.memory_expansions);
}

#[test]
/// disabling expansion halts on the first access past the loaded tape
fn test_memory_expansion_disabled() {
    let interpreter = get_interpreter(InterpreterConfig {
        allow_memory_expansion: false,
        ..Default::default()
    });
    let result = interpreter.execute("j*", false).unwrap();

    assert_eq!(HaltReason::MemoryLimitExceeded, result.halt_reason);
    assert_eq!(2, result.steps);
    assert_eq!(0, result.memory_expansions);
}

#[test]
/// growth backfills up to the accessed cell and tracks the high-water mark
fn test_memory_growth_is_tracked() {
    let result = get_default_interpreter().execute("j*", true).unwrap();

    assert_eq!(HaltReason::EndOfProgram, result.halt_reason);
    assert_eq!(2, result.steps);
    assert_eq!(1, result.memory_expansions);
    assert_eq!(42, result.peak_memory_cells);

    // registers and tape stay inside the address space
    let snapshot = result.machine.unwrap();
    let (a, c, d) = snapshot.registers();
    for value in [a, c, d].iter() {
        assert!((*value as usize) < memory::SIZE);
    }
}

#[test]
/// a fresh sampling run on a straight line program never detects a cycle,
/// but a tracker smaller than the sample count reports its limit
fn test_cycle_tracker_capacity_limits() {
    let interpreter = get_interpreter(InterpreterConfig {
        cycle_detection_limit: 2,
        cycle_sampling_period: 1,
        ..Default::default()
    });
    let result = interpreter.execute("oooooooooo", false).unwrap();

    assert!(result.halt_metadata.cycle_tracking_limited);
    assert!(!result.halt_metadata.cycle_detected);
    assert_eq!(None, result.halt_metadata.cycle_repeat_length);
}

#[test]
/// a repeated sample marks the cycle and its repeat distance
fn test_cycle_tracker_detects_repeats() {
    let machine = Machine::from_opcodes("o", memory::SIZE).unwrap();
    let fingerprint = machine.fingerprint();

    let mut tracker = CycleTracker::default();
    tracker.record(fingerprint, 10, 8);
    assert!(!tracker.detected);

    tracker.record(fingerprint, 25, 8);
    assert!(tracker.detected);
    assert_eq!(Some(15), tracker.repeat_length);
    assert!(!tracker.limited);
}

#[test]
/// the tracker stops inserting at capacity instead of evicting
fn test_cycle_tracker_capacity_bound() {
    let mut tracker = CycleTracker::default();
    for opcodes in ["o", "v", "j"].iter() {
        let machine = Machine::from_opcodes(opcodes, memory::SIZE).unwrap();
        tracker.record(machine.fingerprint(), 1, 2);
    }

    assert!(tracker.limited);
    assert!(!tracker.detected);
}

#[test]
/// resuming a snapshot leaves the original untouched
fn test_snapshot_resume_is_isolated() {
    let interpreter = get_default_interpreter();
    let base = interpreter.execute("oo", true).unwrap();
    let snapshot = base.machine.unwrap();

    let resumed = interpreter
        .execute_from_snapshot(&snapshot, "v", false)
        .unwrap();
    assert_eq!(HaltReason::HaltOpcode, resumed.halt_reason);
    assert_eq!(3, resumed.steps);

    // the source snapshot has not moved
    assert_eq!(2, snapshot.steps());
    assert_eq!(HaltReason::EndOfProgram, snapshot.halt_reason());

    // and can seed a second, longer continuation
    let resumed_again = interpreter
        .execute_from_snapshot(&snapshot, "ov", false)
        .unwrap();
    assert_eq!(HaltReason::HaltOpcode, resumed_again.halt_reason);
    assert_eq!(4, resumed_again.steps);
}

#[test]
/// two identical states produce identical fingerprints, divergent ones do
/// not
fn test_fingerprints_identify_states() {
    let interpreter = get_default_interpreter();
    let first = interpreter.execute("oo", true).unwrap().machine.unwrap();
    let second = interpreter.execute("oo", true).unwrap().machine.unwrap();
    assert_eq!(first.fingerprint(), second.fingerprint());

    let diverged = interpreter
        .execute_from_snapshot(&first, "o", true)
        .unwrap()
        .machine
        .unwrap();
    assert_ne!(first.fingerprint(), diverged.fingerprint());
}

#[test]
/// ASCII source loading accepts whitespace and rejects anything that does
/// not decode onto the opcode alphabet
fn test_ascii_source_loading() {
    let interpreter = get_default_interpreter();

    // 'Q' executes as the halt opcode at address zero
    let result = interpreter.execute_ascii(" Q\n", false).unwrap();
    assert_eq!(HaltReason::HaltOpcode, result.halt_reason);

    assert_eq!(
        Err(LoadError::NotAnInstruction {
            character: '!',
            position: 0
        }),
        interpreter.execute_ascii("!", false).map(|_| ())
    );
}

#[test]
/// load errors for empty and malformed opcode programs
fn test_load_errors() {
    let interpreter = get_default_interpreter();

    assert_eq!(
        Err(LoadError::EmptyProgram),
        interpreter.execute("", false).map(|_| ())
    );
    assert_eq!(
        Err(LoadError::InvalidOpcodeSymbol {
            symbol: 'x',
            position: 1
        }),
        interpreter.execute("ox", false).map(|_| ())
    );

    let interpreter = get_interpreter(InterpreterConfig {
        memory_limit: 4,
        ..Default::default()
    });
    assert_eq!(
        Err(LoadError::ProgramTooLong { len: 5, limit: 4 }),
        interpreter.execute("ooooo", false).map(|_| ())
    );
}

#[test]
/// a raised cancellation flag stops the machine before the next step
fn test_cancellation_halts_the_run() {
    let cancel = Arc::new(AtomicBool::new(false));
    cancel.store(true, Ordering::Relaxed);

    let interpreter = Interpreter::default().with_cancellation(Arc::clone(&cancel));
    let result = interpreter.execute("oooo", false).unwrap();

    assert_eq!(HaltReason::Cancelled, result.halt_reason);
    assert_eq!(0, result.steps);
}

mod observer {
    use super::*;
    use crate::ternary::Word;
    use mockall::predicate::*;

    #[mockall::automock]
    trait InternalObserver {
        fn stepped(&mut self);
    }

    struct ObserverAdapter<M>
    where
        M: InternalObserver,
    {
        inner: M,
    }

    impl<M: InternalObserver> StepObserver for ObserverAdapter<M> {
        fn on_step(&mut self, _steps: u64, _code_pointer: Word, _instruction: Instruction) {
            self.inner.stepped();
        }
    }

    #[test]
    fn test_observer_sees_every_step() {
        let mut mock = MockInternalObserver::new();
        mock.expect_stepped().times(2).return_const(());

        let mut adapter = ObserverAdapter { inner: mock };
        let result = get_default_interpreter()
            .execute_observed("ov", &mut adapter)
            .unwrap();

        assert_eq!(2, result.steps);
        assert_eq!(HaltReason::HaltOpcode, result.halt_reason);
    }
}
