//! crates/attendance_core/src/code.rs
//!
//! One-time session codes: the short token a teacher reads out and students type in.

use rand::Rng;

/// Characters a code may contain.
pub const CODE_ALPHABET: &[u8; 16] = b"0123456789ABCDEF";

/// Length of a freshly drawn code.
pub const CODE_LEN: usize = 6;

/// Length used once the short code space keeps colliding.
pub const FALLBACK_CODE_LEN: usize = 8;

/// Anything that can hand out candidate codes.
///
/// The ledger owns uniqueness; a source only has to produce well-formed
/// candidates of the requested length.
pub trait CodeSource: Send + Sync {
    fn draw(&self, len: usize) -> String;
}

/// Draws codes uniformly from [`CODE_ALPHABET`] using the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodeSource;

impl CodeSource for RandomCodeSource {
    fn draw(&self, len: usize) -> String {
        let mut rng = rand::rng();
        (0..len)
            .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
            .collect()
    }
}

/// Trims and uppercases user input so `ab12cd ` resolves to `AB12CD`.
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// True when `code` has a length the ledger issues and only alphabet characters.
pub fn is_well_formed(code: &str) -> bool {
    (code.len() == CODE_LEN || code.len() == FALLBACK_CODE_LEN)
        && code.bytes().all(|b| CODE_ALPHABET.contains(&b))
}
