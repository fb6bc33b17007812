use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Uniform};

/// SpeedSource provides the multiplicative speed jitter applied to every horse on every tick.
pub trait SpeedSource: Send {
    /// jitter returns a value in [lo, hi).
    fn jitter(&mut self, lo: f64, hi: f64) -> f64;
}

/// RandomSpeedSource draws the jitter uniformly.
#[derive(Debug, Clone)]
pub struct RandomSpeedSource {
    rng: StdRng,
}

impl RandomSpeedSource {
    pub fn new() -> RandomSpeedSource {
        RandomSpeedSource {
            rng: StdRng::from_entropy(),
        }
    }

    /// from_seed creates a reproducible source, e.g. for repeated headless runs.
    pub fn from_seed(seed: u64) -> RandomSpeedSource {
        RandomSpeedSource {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomSpeedSource {
    fn default() -> Self {
        RandomSpeedSource::new()
    }
}

impl SpeedSource for RandomSpeedSource {
    fn jitter(&mut self, lo: f64, hi: f64) -> f64 {
        if hi <= lo {
            return lo;
        }
        Uniform::new(lo, hi).sample(&mut self.rng)
    }
}

/// FixedSpeedSource always returns the same jitter, independent of the requested range.
#[derive(Debug, Clone, Copy)]
pub struct FixedSpeedSource(pub f64);

impl SpeedSource for FixedSpeedSource {
    fn jitter(&mut self, _lo: f64, _hi: f64) -> f64 {
        self.0
    }
}

/// SequenceSpeedSource replays a list of jitter values and starts over when it is exhausted.
#[derive(Debug, Clone)]
pub struct SequenceSpeedSource {
    values: Vec<f64>,
    idx: usize,
}

impl SequenceSpeedSource {
    pub fn new(values: Vec<f64>) -> SequenceSpeedSource {
        SequenceSpeedSource { values, idx: 0 }
    }
}

impl SpeedSource for SequenceSpeedSource {
    fn jitter(&mut self, lo: f64, _hi: f64) -> f64 {
        if self.values.is_empty() {
            return lo;
        }
        let val = self.values[self.idx % self.values.len()];
        self.idx += 1;
        val
    }
}
