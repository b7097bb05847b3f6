//! The step loop and the opcode semantics.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::{
    definitions::memory,
    encoding::{self, Instruction},
    ternary::{crz, rotate_right, Word},
};

use super::machine::{HaltReason, InterpreterConfig, Machine};

/// Receives one notification per executed step. Implementations must not
/// block; they run inside the interpreter loop.
pub trait StepObserver {
    /// Called after the machine finished the given step.
    fn on_step(&mut self, steps: u64, code_pointer: Word, instruction: Instruction);
}

/// Steps the machine until a terminal condition is reached.
pub(crate) fn run(
    machine: &mut Machine,
    config: &InterpreterConfig,
    cancel: Option<&AtomicBool>,
    mut observer: Option<&mut dyn StepObserver>,
) {
    while machine.halt_reason == HaltReason::Running {
        if let Some(flag) = cancel {
            if flag.load(Ordering::Relaxed) {
                machine.halt(HaltReason::Cancelled);
                break;
            }
        }
        if let Some(executed) = step(machine, config) {
            if let Some(observer) = observer.as_deref_mut() {
                observer.on_step(machine.steps, machine.c, executed);
            }
        }
    }
}

/// Executes a single instruction. Returns the instruction when one
/// completed; every attempt advances the step counter exactly once.
fn step(machine: &mut Machine, config: &InterpreterConfig) -> Option<Instruction> {
    let code = machine.c as usize;
    let cell = machine.tape[code];
    if !encoding::is_printable(cell) {
        machine.steps += 1;
        machine.halt(HaltReason::InvalidOpcode);
        return None;
    }

    // cells that decode off the operation alphabet execute as no-ops
    let instruction = encoding::decode_cell(cell, code)
        .and_then(Instruction::from_symbol)
        .unwrap_or(Instruction::Nop);
    machine.last_instruction = Some(instruction);

    match instruction {
        Instruction::MoveData
        | Instruction::Jump
        | Instruction::Rotate
        | Instruction::Crazy => {
            let data = machine.d as usize;
            if !machine.ensure_cell(data, config) {
                machine.steps += 1;
                return None;
            }
            match instruction {
                Instruction::MoveData => machine.d = machine.tape[data],
                Instruction::Jump => {
                    let target = machine.tape[data];
                    machine.last_jump_target = Some(target);
                    machine.c = target;
                }
                Instruction::Rotate => {
                    let rotated = rotate_right(machine.tape[data]);
                    machine.tape[data] = rotated;
                    machine.a = rotated;
                }
                Instruction::Crazy => {
                    let crazy = crz(machine.tape[data], machine.a);
                    machine.tape[data] = crazy;
                    machine.a = crazy;
                }
                _ => unreachable!(),
            }
        }
        Instruction::Output => {
            machine.output.push((machine.a % 256) as u8);
        }
        Instruction::Input => {
            // output-only machine: there is never input to consume
            machine.steps += 1;
            machine.halt(HaltReason::InputUnderflow);
            return Some(Instruction::Input);
        }
        Instruction::Nop => {}
        Instruction::End => {
            machine.steps += 1;
            machine.halt(HaltReason::HaltOpcode);
            return Some(Instruction::End);
        }
    }

    // the executed cell re-encrypts in place; a jump has moved the pointer
    // already, so the target cell is the one that changes
    let executed = machine.c as usize;
    if !machine.ensure_cell(executed, config) {
        machine.steps += 1;
        return None;
    }
    let value = machine.tape[executed];
    if !encoding::is_printable(value) {
        machine.steps += 1;
        machine.halt(HaltReason::InvalidOpcode);
        return None;
    }
    machine.tape[executed] = encoding::encrypt_cell(value);

    machine.c = (machine.c + 1) % memory::SIZE as Word;
    machine.d = (machine.d + 1) % memory::SIZE as Word;
    machine.steps += 1;

    if machine.steps >= config.max_steps {
        machine.halt(HaltReason::StepLimitExceeded);
        return Some(instruction);
    }

    let period = config.cycle_sampling_period.max(1);
    if config.cycle_detection_limit > 0 && machine.steps % period == 0 {
        let fingerprint = machine.fingerprint();
        let step = machine.steps;
        machine
            .cycle
            .record(fingerprint, step, config.cycle_detection_limit);
    }

    if machine.c as usize >= machine.program_len {
        machine.halt(HaltReason::EndOfProgram);
    }

    Some(instruction)
}
