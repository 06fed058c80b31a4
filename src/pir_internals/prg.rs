use crate::pir_internals::{branch_opt_util, params::SEED_BYTE_LEN};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use turboshake::TurboShake128;

/// Compact seed from which a whole pseudorandom stream can be regenerated.
/// Both protocol parties derive bit-identical shared state from equal seeds.
pub type PrgSeed = [u8; SEED_BYTE_LEN];

/// Deterministic pseudorandom generator handle.
///
/// Every function in this crate that needs randomness takes a `&mut Prg`
/// explicitly; there is no process-wide generator. A handle built with
/// [`Prg::from_seed`] replays the exact same stream for the same seed, which
/// is what lets a compressed setup ship a seed instead of a full matrix.
pub struct Prg {
    rng: ChaCha8Rng,
}

impl Prg {
    /// Creates a generator seeded from the operating system's entropy source.
    pub fn from_os_rng() -> Prg {
        Prg {
            rng: ChaCha8Rng::from_os_rng(),
        }
    }

    /// Creates a generator replaying the stream determined by `seed`.
    ///
    /// The SEED_BYTE_LEN -byte seed is expanded to the generator's native
    /// seed width with TurboSHAKE128 xof.
    pub fn from_seed(seed: &PrgSeed) -> Prg {
        let mut hasher = TurboShake128::default();
        hasher.absorb(seed);
        hasher.finalize::<{ TurboShake128::DEFAULT_DOMAIN_SEPARATOR }>();

        let mut expanded_seed = [0u8; 32];
        hasher.squeeze(&mut expanded_seed);

        Prg {
            rng: ChaCha8Rng::from_seed(expanded_seed),
        }
    }

    /// Draws a fresh seed, suitable for handing to [`Prg::from_seed`].
    pub fn random_seed(&mut self) -> PrgSeed {
        let mut seed = [0u8; SEED_BYTE_LEN];
        self.rng.fill_bytes(&mut seed);
        seed
    }

    #[inline(always)]
    pub fn next_u64(&mut self) -> u64 {
        self.rng.random::<u64>()
    }

    /// Uniform draw in `[0, modulus)`, free of modulo bias. A `modulus` of
    /// zero stands for the full 64-bit range.
    pub fn uniform(&mut self, modulus: u64) -> u64 {
        if branch_opt_util::unlikely(modulus == 0) {
            return self.next_u64();
        }

        let zone = u64::MAX - u64::MAX % modulus;

        loop {
            let val = self.next_u64();
            if branch_opt_util::likely(val < zone) {
                return val % modulus;
            }
        }
    }

    /// Draws from the discrete Gaussian distribution over the integers with
    /// standard deviation `sigma`, by rejection sampling: a uniform candidate
    /// in `[-ceil(6*sigma), ceil(6*sigma)]` is accepted with probability
    /// `exp(-x^2 / (2*sigma^2))`.
    pub fn gaussian(&mut self, sigma: f64) -> i64 {
        let tailcut = (sigma * 6.0).ceil() as i64;
        let sigma_sq_2 = 2.0 * sigma * sigma;

        loop {
            let x = self.rng.random_range(-tailcut..=tailcut);
            let prob = (-((x * x) as f64) / sigma_sq_2).exp();

            let u = self.rng.random::<f64>();
            if u < prob {
                return x;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn equal_seeds_produce_identical_streams() {
        let mut prg = Prg::from_os_rng();
        let seed = prg.random_seed();

        let mut lhs = Prg::from_seed(&seed);
        let mut rhs = Prg::from_seed(&seed);

        for _ in 0..1024 {
            assert_eq!(lhs.next_u64(), rhs.next_u64());
        }
    }

    #[test]
    fn uniform_draws_respect_the_bound() {
        const NUM_DRAWS: usize = 100_000;

        let mut prg = Prg::from_os_rng();

        for modulus in [2u64, 3, 991, 1 << 10, (1 << 32) - 5] {
            for _ in 0..NUM_DRAWS {
                assert!(prg.uniform(modulus) < modulus);
            }
        }
    }

    #[test]
    fn gaussian_draws_stay_within_the_tailcut() {
        const SIGMA: f64 = 6.4;
        const NUM_DRAWS: usize = 100_000;

        let tailcut = (SIGMA * 6.0).ceil() as i64;
        let mut prg = Prg::from_os_rng();

        for _ in 0..NUM_DRAWS {
            let sample = prg.gaussian(SIGMA);
            assert!(sample.abs() <= tailcut);
        }
    }

    #[test]
    fn gaussian_draws_have_plausible_moments() {
        const SIGMA: f64 = 6.4;
        const NUM_DRAWS: usize = 200_000;

        let mut prg = Prg::from_os_rng();
        let samples = (0..NUM_DRAWS).map(|_| prg.gaussian(SIGMA) as f64).collect::<Vec<f64>>();

        let mean = samples.iter().sum::<f64>() / NUM_DRAWS as f64;
        let variance = samples.iter().map(|s| (s - mean) * (s - mean)).sum::<f64>() / NUM_DRAWS as f64;

        assert!(mean.abs() < 0.1);
        assert!((variance - SIGMA * SIGMA).abs() / (SIGMA * SIGMA) < 0.05);
    }
}
