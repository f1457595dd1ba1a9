//! Injectable randomness
//!
//! Every engine draws from a `RandomSource` handed to it by its owner, never
//! from an ambient global. Same seed, same puzzles, same spawns.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

/// Uniform `[0, 1)` generator used by generation, shuffling and spawning
pub trait RandomSource {
    /// Next value in `[0, 1)`
    fn next_unit(&mut self) -> f64;

    /// Uniform index in `0..len` (returns 0 for an empty range)
    fn index(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        ((self.next_unit() * len as f64) as usize).min(len - 1)
    }

    /// True with probability `p`
    fn chance(&mut self, p: f64) -> bool {
        self.next_unit() < p
    }
}

impl<R: RandomSource + ?Sized> RandomSource for &mut R {
    fn next_unit(&mut self) -> f64 {
        (**self).next_unit()
    }
}

/// Seeded PCG stream
#[derive(Debug, Clone)]
pub struct SeededRandom {
    seed: u64,
    rng: Pcg32,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    /// Seed this stream was created with
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl RandomSource for SeededRandom {
    fn next_unit(&mut self) -> f64 {
        self.rng.random::<f64>()
    }
}

/// Replays a fixed list of values, wrapping around at the end
#[derive(Debug, Clone)]
pub struct ScriptedRandom {
    values: Vec<f64>,
    cursor: usize,
}

impl ScriptedRandom {
    pub fn new(values: impl Into<Vec<f64>>) -> Self {
        Self {
            values: values.into(),
            cursor: 0,
        }
    }

    /// A source that always yields `value`
    pub fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }

    /// How many values have been drawn so far
    pub fn drawn(&self) -> usize {
        self.cursor
    }
}

impl RandomSource for ScriptedRandom {
    fn next_unit(&mut self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let v = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        v.clamp(0.0, 0.999_999_999)
    }
}
