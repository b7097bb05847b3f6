//! The pretty print implementation for captured machine state.
//! This implementation was split up into this file for smaller file sizes
//! and higher cohesion.

use std::fmt::{self, Write};

use super::{machine::Machine, Snapshot};

/// How many cells a single dump row holds.
const CELLS_PER_ROW: usize = 8;

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.machine)
    }
}

/// Formats one row of tape cells, elided when it repeats the previous one.
fn tape_printer(tape: &[u16]) -> Result<String, fmt::Error> {
    // a row takes eight cells at seven characters each plus the pointer
    let mut result = String::with_capacity((tape.len() / CELLS_PER_ROW + 1) * 80);
    for (row, cells) in tape.chunks(CELLS_PER_ROW).enumerate() {
        write!(result, "\t\t{:#06X} :", row * CELLS_PER_ROW)?;
        for cell in cells {
            write!(result, " {:#06X}", cell)?;
        }
        result.push('\n');
    }
    // remove the unneeded trailing newline
    if let Some(index) = result.rfind('\n') {
        result.truncate(index);
    }
    Ok(result)
}

impl fmt::Display for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Machine {{")?;
        writeln!(
            f,
            "\tRegisters :\n\t\ta: {:#06X} c: {:#06X} d: {:#06X}",
            self.a, self.c, self.d
        )?;
        writeln!(f, "\tSteps : {}", self.steps)?;
        writeln!(f, "\tHalt : {}", self.halt_reason)?;
        writeln!(f, "\tOutput : {} byte(s)", self.output.len())?;
        writeln!(f, "\tTape ({} cells) :", self.tape.len())?;
        writeln!(f, "{}", tape_printer(&self.tape)?)?;
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use crate::interpreter::Interpreter;

    #[test]
    /// tests if the pretty print output holds the expected header lines
    fn test_snapshot_print() {
        let result = Interpreter::default()
            .execute("v", true)
            .expect("the halt program loads");
        let snapshot = result.machine.expect("capture was requested");

        let printed = format!("{}", snapshot);
        assert!(printed.starts_with("Machine {"));
        assert!(printed.contains("Steps : 1"));
        assert!(printed.contains("Halt : halt_opcode"));
        assert!(printed.contains("Tape (2 cells) :"));
        assert!(printed.ends_with('}'));
    }
}
