//! Opaque button tokens.
//!
//! A token is the wire-level callback payload of a button: eight characters
//! drawn from `A-Z0-9`. Tokens decouple routing from the button's display
//! text and must be unique across every button of a graph.
//!
//! Generation is split into three layers:
//!
//! - [`generate_token`] draws one token from any RNG.
//! - [`generate_unique_token`] retries until the token is absent from a set.
//! - [`TokenGenerator`] owns both the RNG and the set for one graph build, so
//!   the check-then-insert happens under a single `&mut` borrow.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Number of characters in a token.
pub const TOKEN_LEN: usize = 8;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Draws a fresh token from `rng`.
pub fn generate_token<R: Rng>(rng: &mut R) -> String {
    (0..TOKEN_LEN)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Draws tokens from `rng` until one is not contained in `existing`.
pub fn generate_unique_token<R: Rng>(existing: &HashSet<String>, rng: &mut R) -> String {
    loop {
        let token = generate_token(rng);
        if !existing.contains(&token) {
            return token;
        }
    }
}

/// Returns `true` when `token` has the shape of a generated token.
pub fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_LEN && token.bytes().all(|b| ALPHABET.contains(&b))
}

/// Stateful token source for building one graph.
///
/// Every token handed out or [reserved](Self::reserve) is remembered, so a
/// generator never returns the same token twice.
pub struct TokenGenerator {
    rng: StdRng,
    issued: HashSet<String>,
}

impl TokenGenerator {
    /// Creates a generator seeded from the operating system.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Creates a deterministic generator.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rng,
            issued: HashSet::new(),
        }
    }

    /// Marks an explicitly supplied token as taken.
    ///
    /// Returns `false` if it was already taken; the caller keeps the
    /// duplicate so the integrity check can report it.
    pub fn reserve(&mut self, token: &str) -> bool {
        self.issued.insert(token.to_string())
    }

    /// Produces a token distinct from everything issued or reserved so far.
    pub fn next_token(&mut self) -> String {
        let token = generate_unique_token(&self.issued, &mut self.rng);
        self.issued.insert(token.clone());
        token
    }

    /// Number of tokens issued or reserved.
    pub fn len(&self) -> usize {
        self.issued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issued.is_empty()
    }
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_token_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..64 {
            let token = generate_token(&mut rng);
            assert!(is_well_formed(&token), "bad token {token}");
        }
    }

    #[test]
    fn test_generator_yields_distinct_tokens() {
        let mut generator = TokenGenerator::seeded(42);
        let tokens: HashSet<String> = (0..500).map(|_| generator.next_token()).collect();
        assert_eq!(tokens.len(), 500);
        assert!(tokens.iter().all(|t| is_well_formed(t)));
    }

    #[test]
    fn test_same_seed_same_tokens() {
        let mut a = TokenGenerator::seeded(7);
        let mut b = TokenGenerator::seeded(7);
        assert_eq!(a.next_token(), b.next_token());
    }

    #[test]
    fn test_unique_token_skips_existing() {
        let mut same_seed = StdRng::seed_from_u64(9);
        let first = generate_token(&mut same_seed);

        let existing: HashSet<String> = [first.clone()].into_iter().collect();
        let mut rng = StdRng::seed_from_u64(9);
        let token = generate_unique_token(&existing, &mut rng);
        assert_ne!(token, first);
    }

    #[test]
    fn test_reserve_reports_duplicates() {
        let mut generator = TokenGenerator::seeded(0);
        assert!(generator.reserve("ABCDEFGH"));
        assert!(!generator.reserve("ABCDEFGH"));
        assert_eq!(generator.len(), 1);
    }

    #[test]
    fn test_is_well_formed() {
        assert!(is_well_formed("AB12CD34"));
        assert!(!is_well_formed("ab12cd34"));
        assert!(!is_well_formed("AB12CD3"));
    }
}
