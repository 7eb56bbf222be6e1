//! Quantization dither
//!
//! A fixed-seed xorshift32 sequence so that captures are byte-reproducible
//! between runs. Each harness owns its own generator.

/// Seed used at startup
pub const DEFAULT_DITHER_SEED: u32 = 12345;

/// Deterministic dither source, uniform in [-0.5, 0.5)
#[derive(Debug, Clone)]
pub struct Dither {
    state: u32,
}

impl Dither {
    /// Create a generator with the given seed
    ///
    /// Zero is the xorshift fixpoint and is replaced by the default seed.
    pub fn new(seed: u32) -> Self {
        Self {
            state: Self::sanitize(seed),
        }
    }

    /// Restart the sequence from `seed`
    pub fn reseed(&mut self, seed: u32) {
        self.state = Self::sanitize(seed);
    }

    fn sanitize(seed: u32) -> u32 {
        if seed == 0 {
            DEFAULT_DITHER_SEED
        } else {
            seed
        }
    }

    #[inline]
    fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Next dither value in code units
    #[inline]
    pub fn next_offset(&mut self) -> f64 {
        (self.next_u32() & 0xFFFF) as f64 / 65536.0 - 0.5
    }
}

impl Default for Dither {
    fn default() -> Self {
        Self::new(DEFAULT_DITHER_SEED)
    }
}
