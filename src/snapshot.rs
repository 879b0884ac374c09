//! Seed persistence: one JSON file per emitted generation seed.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chain::GenerationSeed;
use crate::error::Result;
use crate::wealth::Payouts;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedRecord {
    pub chain: String,
    pub recorded_at: DateTime<Utc>,
    /// Payouts of the generation whose closing produced this seed.
    pub payouts: Option<Payouts>,
    pub seed: GenerationSeed,
}

#[derive(Serialize)]
struct SeedRecordRef<'a> {
    chain: &'a str,
    recorded_at: DateTime<Utc>,
    payouts: Option<&'a Payouts>,
    seed: &'a GenerationSeed,
}

pub struct SeedWriter {
    dir: PathBuf,
}

impl SeedWriter {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, chain: &str, generation: u32) -> PathBuf {
        self.dir
            .join(chain)
            .join(format!("generation_{generation:04}.json"))
    }

    pub fn write(
        &self,
        chain: &str,
        seed: &GenerationSeed,
        payouts: Option<&Payouts>,
    ) -> Result<PathBuf> {
        let path = self.path_for(chain, seed.generation);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let record = SeedRecordRef {
            chain,
            recorded_at: Utc::now(),
            payouts,
            seed,
        };
        fs::write(&path, serde_json::to_string_pretty(&record)?)?;
        Ok(path)
    }

    pub fn load(&self, chain: &str, generation: u32) -> Result<SeedRecord> {
        let data = fs::read_to_string(self.path_for(chain, generation))?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Generations stored for `chain`, ascending.
    pub fn list(&self, chain: &str) -> Result<Vec<u32>> {
        let dir = self.dir.join(chain);
        let mut generations = Vec::new();
        if !dir.exists() {
            return Ok(generations);
        }
        for entry in fs::read_dir(&dir)? {
            let name = entry?.file_name();
            let parsed = name
                .to_str()
                .and_then(|n| n.strip_prefix("generation_"))
                .and_then(|n| n.strip_suffix(".json"))
                .and_then(|n| n.parse::<u32>().ok());
            if let Some(generation) = parsed {
                generations.push(generation);
            }
        }
        generations.sort_unstable();
        Ok(generations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::{RoleOutcome, SliderProposal};
    use crate::sliders::SliderState;
    use crate::wealth::WealthTracker;
    use crate::world::{Distribution, World, WorldParams};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::sync::Arc;

    fn seed() -> GenerationSeed {
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        let world = World::generate(
            WorldParams {
                num_coins: 15,
                num_centroids: 3,
                distribution: Distribution::Linear,
                dispersion: 1.5,
                width: 30,
                height: 30,
            },
            &mut rng,
        )
        .unwrap();
        let mut wealth = WealthTracker::new(2);
        wealth.initialize();
        GenerationSeed::root(Arc::new(world), SliderState::new(0.2, 0.4, 0.6), wealth)
    }

    #[test]
    fn written_seed_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SeedWriter::new(dir.path());
        let seed = seed();

        let path = writer.write("linear", &seed, None).unwrap();
        assert_eq!(path, dir.path().join("linear").join("generation_0000.json"));

        let record = writer.load("linear", 0).unwrap();
        assert_eq!(record.chain, "linear");
        assert!(record.payouts.is_none());
        assert_eq!(record.seed, seed);
        assert_eq!(record.seed.world.positions(), seed.world.positions());
    }

    #[test]
    fn inexact_wealth_survives_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SeedWriter::new(dir.path());
        let mut seed = seed();
        seed.wealth = WealthTracker::with_endowment(2, 0.1 + 0.2);
        let outcomes = vec![
            RoleOutcome::coordinator(0.3, Vec::new(), SliderProposal::default()),
            RoleOutcome::forager(0, 7, SliderProposal::default()),
            RoleOutcome::forager(1, 3, SliderProposal::default()),
        ];
        let payouts = seed
            .wealth
            .update_from_trials(&outcomes, &SliderState::new(0.3, 0.7, 0.1))
            .unwrap();
        assert_ne!(payouts.coordinator, 0.3);

        writer.write("linear", &seed, Some(&payouts)).unwrap();
        let record = writer.load("linear", 0).unwrap();
        assert_eq!(record.seed, seed);
        assert_eq!(record.payouts, Some(payouts));
        assert_eq!(
            record.seed.wealth.accumulated_total().to_bits(),
            seed.wealth.accumulated_total().to_bits()
        );
    }

    #[test]
    fn lists_generations_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SeedWriter::new(dir.path());
        assert!(writer.list("linear").unwrap().is_empty());

        let mut seed = seed();
        for generation in [2, 0, 1] {
            seed.generation = generation;
            writer.write("linear", &seed, None).unwrap();
        }
        assert_eq!(writer.list("linear").unwrap(), vec![0, 1, 2]);
    }
}
