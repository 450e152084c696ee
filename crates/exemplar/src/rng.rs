//! Counter-based random numbers (Philox4x32-10).
//!
//! A counter-based generator is a pure function from `(counter, key)` to a
//! block of random words. The same draw index always produces the same
//! value, and draws can be made in any order or from any thread without
//! sharing generator state.
//!
//! [`Philox4x32::stream`] adapts the generator to [`rand::RngCore`] by
//! incrementing the counter, for callers that want a conventional stream.

use rand::RngCore;

const M0: u32 = 0xD251_1F53;
const M1: u32 = 0xCD9E_8D57;
const W0: u32 = 0x9E37_79B9;
const W1: u32 = 0xBB67_AE85;
const ROUNDS: usize = 10;

/// Philox4x32 with 10 rounds and a fixed 64-bit key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Philox4x32 {
    key: [u32; 2],
}

impl Philox4x32 {
    /// Generator keyed by two explicit words.
    pub const fn new(key: [u32; 2]) -> Self {
        Self { key }
    }

    /// Generator keyed by a 64-bit seed (low word first).
    pub const fn from_seed(seed: u64) -> Self {
        Self::new([seed as u32, (seed >> 32) as u32])
    }

    #[inline]
    pub fn key(&self) -> [u32; 2] {
        self.key
    }

    /// Four random words for `counter`.
    #[inline]
    pub fn generate(&self, counter: [u32; 4]) -> [u32; 4] {
        let mut ctr = counter;
        let mut key = self.key;
        for round in 0..ROUNDS {
            if round > 0 {
                key[0] = key[0].wrapping_add(W0);
                key[1] = key[1].wrapping_add(W1);
            }
            ctr = philox_round(ctr, key);
        }
        ctr
    }

    /// Uniform value in `[0, 1)` for `counter`.
    #[inline]
    pub fn uniform(&self, counter: [u32; 4]) -> f32 {
        uniform_f32(self.generate(counter)[0])
    }

    /// Uniform value in `[0, 1)` with 53 bits of resolution.
    #[inline]
    pub fn uniform_f64(&self, counter: [u32; 4]) -> f64 {
        let words = self.generate(counter);
        uniform_f64(words[0], words[1])
    }

    /// A sequential stream starting at `counter`.
    pub fn stream(&self, counter: [u32; 4]) -> PhiloxStream {
        PhiloxStream {
            philox: *self,
            counter,
            block: [0; 4],
            used: 4,
        }
    }
}

#[inline(always)]
fn mulhilo(a: u32, b: u32) -> (u32, u32) {
    let product = u64::from(a) * u64::from(b);
    ((product >> 32) as u32, product as u32)
}

#[inline(always)]
fn philox_round(ctr: [u32; 4], key: [u32; 2]) -> [u32; 4] {
    let (hi0, lo0) = mulhilo(M0, ctr[0]);
    let (hi1, lo1) = mulhilo(M1, ctr[2]);
    [hi1 ^ ctr[1] ^ key[0], lo1, hi0 ^ ctr[3] ^ key[1], lo0]
}

/// Map a random word to `[0, 1)`.
///
/// Uses the top 24 bits so every result is an exact `f32` below one.
#[inline]
pub fn uniform_f32(word: u32) -> f32 {
    (word >> 8) as f32 * (1.0 / 16_777_216.0)
}

/// Map two random words to `[0, 1)` using 53 bits.
#[inline]
pub fn uniform_f64(high: u32, low: u32) -> f64 {
    let bits = (u64::from(high) << 21) ^ (u64::from(low) >> 11);
    bits as f64 * (1.0 / 9_007_199_254_740_992.0)
}

// =============================================================================
// Stream adapter
// =============================================================================

/// Sequential [`RngCore`] over consecutive Philox counters.
#[derive(Debug, Clone)]
pub struct PhiloxStream {
    philox: Philox4x32,
    counter: [u32; 4],
    block: [u32; 4],
    used: usize,
}

impl PhiloxStream {
    /// Counter of the next block to be generated.
    pub fn counter(&self) -> [u32; 4] {
        self.counter
    }

    fn refill(&mut self) {
        self.block = self.philox.generate(self.counter);
        self.used = 0;
        for word in self.counter.iter_mut() {
            let (next, carry) = word.overflowing_add(1);
            *word = next;
            if !carry {
                break;
            }
        }
    }
}

impl RngCore for PhiloxStream {
    fn next_u32(&mut self) -> u32 {
        if self.used == 4 {
            self.refill();
        }
        let word = self.block[self.used];
        self.used += 1;
        word
    }

    fn next_u64(&mut self) -> u64 {
        let low = u64::from(self.next_u32());
        let high = u64::from(self.next_u32());
        (high << 32) | low
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}
