/// The definitions

pub mod memory {
    /// The number of trits in a machine word.
    pub const TRITS: usize = 10;

    /// The size of the ternary address space (3^10).
    pub const SIZE: usize = 59049;

    /// The weight of the most significant trit (3^9).
    pub const TOP_TRIT: u16 = 19683;
}

/// The definitions for the translation tables.
pub mod encoding {
    /// The number of printable characters the tables cover.
    pub const TABLE_SIZE: usize = 94;

    /// The first printable character value.
    pub const PRINTABLE_MIN: u16 = 33;

    /// The first value past the printable range.
    pub const PRINTABLE_END: u16 = 127;
}

/// The interpreter defaults.
pub mod interpreter {
    /// The default step budget for a single execution.
    pub const MAX_STEPS: u64 = 4_000_000;

    /// The default number of fingerprints the cycle tracker may hold.
    pub const CYCLE_DETECTION_LIMIT: usize = 4096;

    /// The default distance in steps between two cycle fingerprint samples.
    pub const CYCLE_SAMPLING_PERIOD: u64 = 64;
}

/// The generator defaults.
pub mod generator {
    use once_cell::sync::Lazy;

    /// The depth of the exhaustive expansion layer per target byte.
    pub const MAX_SEARCH_DEPTH: usize = 5;

    /// The construction opcodes candidates are built from by default.
    pub const OPCODE_CHOICES: &str = "op*";

    /// The per character budget of randomized extension draws.
    pub const RANDOM_DRAW_LIMIT: usize = 8192;

    /// The number of no-ops behind the opening jump of the bootstrap.
    pub const BOOTSTRAP_NOPS: usize = 99;

    /// The fixed opcode prefix executed before any search starts. The
    /// opening jump lands the code pointer near the end of the no-op
    /// runway and leaves the data pointer at its start, so the runway
    /// cells double as untouched data for the construction opcodes.
    pub static BOOTSTRAP: Lazy<String> = Lazy::new(|| {
        let mut prefix = String::with_capacity(1 + BOOTSTRAP_NOPS);
        prefix.push('i');
        for _ in 0..BOOTSTRAP_NOPS {
            prefix.push('o');
        }
        prefix
    });
}
