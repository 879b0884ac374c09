//! Deterministic random streams
//!
//! Every consumer (world generation, rendering, bots) draws from its own named
//! stream derived from the scenario seed, so adding a consumer never shifts the
//! values another one sees.

use std::collections::HashMap;

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub struct RngManager {
    master: ChaCha8Rng,
    streams: HashMap<String, ChaCha8Rng>,
}

impl RngManager {
    pub fn new(seed: u64) -> Self {
        Self {
            master: ChaCha8Rng::seed_from_u64(seed),
            streams: HashMap::new(),
        }
    }

    pub fn stream(&mut self, name: &str) -> StreamRng<'_> {
        let master = &mut self.master;
        let entry = self
            .streams
            .entry(name.to_string())
            .or_insert_with(|| derive(master));
        StreamRng { inner: entry }
    }
}

fn derive(master: &mut ChaCha8Rng) -> ChaCha8Rng {
    let mut seed_bytes = [0u8; 32];
    master.fill_bytes(&mut seed_bytes);
    let mut seed_u64 = [0u8; 8];
    seed_u64.copy_from_slice(&seed_bytes[..8]);
    ChaCha8Rng::seed_from_u64(u64::from_le_bytes(seed_u64))
}

pub struct StreamRng<'a> {
    inner: &'a mut ChaCha8Rng,
}

impl<'a> RngCore for StreamRng<'a> {
    fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.inner.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.inner.try_fill_bytes(dest)
    }
}

pub trait RngExt {
    /// One draw from N(0, 1) via the Box-Muller transform.
    fn standard_normal(&mut self) -> f64;
    /// A point from an isotropic bivariate normal with the given variance.
    fn bivariate_normal(&mut self, mean: (f64, f64), variance: f64) -> (f64, f64);
}

impl<R: Rng + ?Sized> RngExt for R {
    fn standard_normal(&mut self) -> f64 {
        let u1: f64 = self.gen::<f64>().max(f64::EPSILON);
        let u2: f64 = self.gen::<f64>();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    fn bivariate_normal(&mut self, mean: (f64, f64), variance: f64) -> (f64, f64) {
        let sigma = variance.sqrt();
        let x = mean.0 + sigma * self.standard_normal();
        let y = mean.1 + sigma * self.standard_normal();
        (x, y)
    }
}
