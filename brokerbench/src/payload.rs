use rand::{Rng as _, SeedableRng as _, rngs::SmallRng};

/// Symbols payload bytes are drawn from.
pub const ALPHABET: &[u8; 84] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ1234567890!@#$%^&*(){}[]:;<>.,?-";

/// Generates fixed-length pseudorandom payloads.
///
/// Owned by a single send lane, never shared.
/// The buffer is reused: each call overwrites it completely.
pub struct PayloadGenerator {
    rng: SmallRng,
    buf: Vec<u8>,
}

impl PayloadGenerator {
    pub fn new(size: usize) -> Self {
        Self::new_with_rng(size, SmallRng::from_os_rng())
    }

    #[cfg(test)]
    pub(crate) fn new_seeded(size: usize, seed: u64) -> Self {
        Self::new_with_rng(size, SmallRng::seed_from_u64(seed))
    }

    fn new_with_rng(size: usize, rng: SmallRng) -> Self {
        Self {
            rng,
            buf: vec![0; size],
        }
    }

    #[cfg(test)]
    fn size(&self) -> usize {
        self.buf.len()
    }

    /// Fill the buffer with fresh random symbols and return it.
    pub fn next_payload(&mut self) -> &[u8] {
        for b in self.buf.iter_mut() {
            *b = ALPHABET[self.rng.random_range(0..ALPHABET.len())];
        }
        &self.buf
    }
}
