use thiserror::Error;

/// What ran out when generation gave up on a target byte.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ExhaustedBudget {
    /// The per character randomized extension draws.
    RandomDraws,
    /// The cell ceiling of the program being built.
    ProgramLength,
}

impl std::fmt::Display for ExhaustedBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExhaustedBudget::RandomDraws => "randomized draw",
            ExhaustedBudget::ProgramLength => "program length",
        };
        write!(f, "{}", name)
    }
}

/// Everything that can go wrong before a program starts running.
#[derive(Error, Debug, PartialEq, Clone)]
pub enum LoadError {
    #[error("The program is empty.")]
    EmptyProgram,
    #[error("The program needs {len} cells, but only {limit} are available.")]
    ProgramTooLong { len: usize, limit: usize },
    #[error("'{symbol}' at position {position} is not an operation symbol.")]
    InvalidOpcodeSymbol { symbol: char, position: usize },
    #[error("The character {character:?} at position {position} is outside the printable range.")]
    UnprintableCharacter { character: char, position: usize },
    #[error("The character '{character}' at position {position} does not execute as an operation.")]
    NotAnInstruction { character: char, position: usize },
}

/// Everything that can go wrong while synthesizing a program.
#[derive(Error, Debug, PartialEq, Clone)]
pub enum GenerateError {
    #[error("Invalid program state '{0}'.")]
    Load(#[from] LoadError),
    #[error("The opcode choices {choices:?} are not a non-empty subset of \"op*\".")]
    InvalidChoices { choices: String },
    #[error(
        "The {budget} budget of {limit} ran out on target byte {index} ({byte:#04X})."
    )]
    Exhausted {
        index: usize,
        byte: u8,
        limit: usize,
        budget: ExhaustedBudget,
    },
    #[error("The finished program printed {actual:?} instead of {expected:?}.")]
    VerificationFailed { expected: Vec<u8>, actual: Vec<u8> },
    #[error("Generation was cancelled.")]
    Cancelled,
}
