use crate::models::NormalSource;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Box-Muller transform over a uniform RNG.
///
/// z = sqrt(-2 ln u) * cos(2 pi v)
///
/// with u, v independent uniforms in [0, 1) and u = 0 rejected to keep
/// ln(u) finite. The transform yields a pair of independent normals; the
/// sin branch is discarded each call.
pub struct BoxMuller<R: Rng> {
    rng: R,
}

impl BoxMuller<SmallRng> {
    /// Non-deterministic source for production use.
    pub fn from_entropy() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
        }
    }

    /// Deterministic source. Two instances with the same seed produce
    /// identical draw sequences.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl<R: Rng> BoxMuller<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> NormalSource for BoxMuller<R> {
    #[inline]
    fn next(&mut self) -> f64 {
        let mut u: f64 = self.rng.gen();
        while u == 0.0 {
            u = self.rng.gen();
        }
        let v: f64 = self.rng.gen();
        (-2.0 * u.ln()).sqrt() * (2.0 * std::f64::consts::PI * v).cos()
    }
}
