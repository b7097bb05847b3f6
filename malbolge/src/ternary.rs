//! Trit word arithmetic: the ternary rotation and the crazy operation.

use once_cell::sync::Lazy;

use crate::definitions::memory;

/// A ten trit machine word, valid in `[0, 59049)`.
pub type Word = u16;

/// The crazy operation digit table, indexed `[x][y]`.
const CRZ_DIGITS: [[Word; 3]; 3] = [[1, 0, 0], [1, 0, 2], [2, 2, 1]];

/// Powers of nine, splitting a word into five two-trit groups.
const P9: [Word; 5] = [1, 9, 81, 729, 6561];

/// The crazy operation precomputed over all two-trit pairs, so that a full
/// word takes five lookups instead of ten digit loops.
static CRZ_PAIRS: Lazy<[[Word; 9]; 9]> = Lazy::new(|| {
    let mut table = [[0; 9]; 9];
    for (x, row) in table.iter_mut().enumerate() {
        for (y, cell) in row.iter_mut().enumerate() {
            let lo = CRZ_DIGITS[x % 3][y % 3];
            let hi = CRZ_DIGITS[x / 3][y / 3];
            *cell = hi * 3 + lo;
        }
    }
    table
});

/// Rotates the word right by one trit, the lowest digit becoming the
/// highest.
pub fn rotate_right(x: Word) -> Word {
    debug_assert!((x as usize) < memory::SIZE);
    x / 3 + x % 3 * memory::TOP_TRIT
}

/// The crazy operation, applied digit wise over all ten trits.
pub fn crz(x: Word, y: Word) -> Word {
    debug_assert!((x as usize) < memory::SIZE);
    debug_assert!((y as usize) < memory::SIZE);

    let pairs = &*CRZ_PAIRS;
    let mut result = 0;
    for p in P9.iter() {
        result += pairs[(x / p % 9) as usize][(y / p % 9) as usize] * p;
    }
    result
}
