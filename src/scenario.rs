use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    chain::{ChainConfig, GenerationSeed},
    sliders::{SliderState, DEFAULT_SLIDER_VALUE},
    wealth::WealthTracker,
    world::{Distribution, World, WorldParams, DEFAULT_HEIGHT, DEFAULT_WIDTH},
};

fn default_num_foragers() -> usize {
    3
}

fn default_num_coins() -> u32 {
    100
}

fn default_num_centroids() -> u32 {
    3
}

fn default_distributions() -> Vec<Distribution> {
    vec![Distribution::Linear]
}

fn default_dispersion() -> f64 {
    10.0
}

fn default_width() -> u32 {
    DEFAULT_WIDTH
}

fn default_height() -> u32 {
    DEFAULT_HEIGHT
}

fn default_max_generations() -> u32 {
    2
}

fn default_slider() -> f64 {
    DEFAULT_SLIDER_VALUE
}

fn default_harvest_radius() -> u32 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    pub seed: u64,
    #[serde(default = "default_num_foragers")]
    pub num_foragers: usize,
    #[serde(default)]
    pub world: WorldSection,
    #[serde(default = "default_max_generations")]
    pub max_generations: u32,
    #[serde(default)]
    pub starting_sliders: StartingSliders,
    #[serde(default)]
    pub initial_wealth: f64,
    /// Half-width of the square a forager harvests around its placement.
    #[serde(default = "default_harvest_radius")]
    pub harvest_radius: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSection {
    #[serde(default = "default_num_coins")]
    pub num_coins: u32,
    #[serde(default = "default_num_centroids")]
    pub num_centroids: u32,
    /// One chain is started per entry.
    #[serde(default = "default_distributions")]
    pub distributions: Vec<Distribution>,
    #[serde(default = "default_dispersion")]
    pub dispersion: f64,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

impl Default for WorldSection {
    fn default() -> Self {
        Self {
            num_coins: default_num_coins(),
            num_centroids: default_num_centroids(),
            distributions: default_distributions(),
            dispersion: default_dispersion(),
            width: default_width(),
            height: default_height(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartingSliders {
    #[serde(default = "default_slider")]
    pub overhead: f64,
    #[serde(default = "default_slider")]
    pub wages_commission: f64,
    #[serde(default = "default_slider")]
    pub coordinator_prerogative: f64,
}

impl Default for StartingSliders {
    fn default() -> Self {
        Self {
            overhead: default_slider(),
            wages_commission: default_slider(),
            coordinator_prerogative: default_slider(),
        }
    }
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let scenario = Scenario::from_yaml(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(scenario)
    }
}

impl Scenario {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let scenario: Scenario = serde_yaml::from_str(text)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("scenario must define a name");
        }
        if self.num_foragers == 0 {
            bail!("num_foragers must be at least 1");
        }
        if self.max_generations == 0 {
            bail!("max_generations must be at least 1");
        }
        if self.world.distributions.is_empty() {
            bail!("world.distributions must list at least one distribution");
        }
        if !self.initial_wealth.is_finite() || self.initial_wealth < 0.0 {
            bail!("initial_wealth must be a non-negative number");
        }
        let sliders = &self.starting_sliders;
        for (label, value) in [
            ("overhead", sliders.overhead),
            ("wages_commission", sliders.wages_commission),
            ("coordinator_prerogative", sliders.coordinator_prerogative),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("starting slider {label} must lie in [0, 1] (got {value})");
            }
        }
        for distribution in &self.world.distributions {
            self.world_params(*distribution)
                .validate()
                .with_context(|| format!("invalid world for distribution {distribution}"))?;
        }
        Ok(())
    }

    pub fn world_params(&self, distribution: Distribution) -> WorldParams {
        WorldParams {
            num_coins: self.world.num_coins,
            num_centroids: self.world.num_centroids,
            distribution,
            dispersion: self.world.dispersion,
            width: self.world.width,
            height: self.world.height,
        }
    }

    pub fn chain_config(&self) -> ChainConfig {
        ChainConfig {
            num_foragers: self.num_foragers,
            max_generations: self.max_generations,
        }
    }

    pub fn starting_sliders(&self) -> SliderState {
        SliderState::new(
            self.starting_sliders.overhead,
            self.starting_sliders.wages_commission,
            self.starting_sliders.coordinator_prerogative,
        )
    }

    /// Generation 0 of the chain for `distribution`. The world is generated
    /// here and nowhere else.
    pub fn root_seed<R: Rng + ?Sized>(
        &self,
        distribution: Distribution,
        rng: &mut R,
    ) -> Result<GenerationSeed> {
        let world = World::generate(self.world_params(distribution), rng)?;
        let wealth = WealthTracker::with_endowment(self.num_foragers, self.initial_wealth);
        Ok(GenerationSeed::root(
            Arc::new(world),
            self.starting_sliders(),
            wealth,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn minimal_scenario_uses_defaults() {
        let scenario = Scenario::from_yaml("name: tiny\nseed: 7\n").unwrap();
        assert_eq!(scenario.num_foragers, 3);
        assert_eq!(scenario.world.num_coins, 100);
        assert_eq!(scenario.world.distributions, vec![Distribution::Linear]);
        assert_eq!(scenario.max_generations, 2);
        assert_eq!(scenario.starting_sliders(), SliderState::default());
        assert_eq!(scenario.harvest_radius, 5);
    }

    #[test]
    fn parses_world_section() {
        let yaml = r#"
name: rings
seed: 3
num_foragers: 4
world:
  num_coins: 40
  num_centroids: 4
  distributions: [circular, linear]
  dispersion: 2.5
starting_sliders:
  overhead: 0.1
"#;
        let scenario = Scenario::from_yaml(yaml).unwrap();
        assert_eq!(scenario.world.distributions.len(), 2);
        assert_eq!(scenario.world.dispersion, 2.5);
        assert_eq!(scenario.starting_sliders.overhead, 0.1);
        assert_eq!(scenario.starting_sliders.wages_commission, 0.5);
    }

    #[test]
    fn rejects_oval_and_overfull_worlds() {
        let oval = "name: x\nseed: 1\nworld:\n  distributions: [oval]\n";
        assert!(Scenario::from_yaml(oval).is_err());

        let crowded = "name: x\nseed: 1\nworld:\n  num_coins: 5000\n";
        assert!(Scenario::from_yaml(crowded).is_err());

        let sliders = "name: x\nseed: 1\nstarting_sliders:\n  overhead: 1.5\n";
        assert!(Scenario::from_yaml(sliders).is_err());

        let unknown = "name: x\nseed: 1\nworld:\n  distributions: [spiral]\n";
        assert!(Scenario::from_yaml(unknown).is_err());
    }

    #[test]
    fn root_seed_starts_at_generation_zero() {
        let scenario = Scenario::from_yaml("name: tiny\nseed: 7\ninitial_wealth: 2.0\n").unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(scenario.seed);
        let seed = scenario.root_seed(Distribution::Linear, &mut rng).unwrap();
        assert_eq!(seed.generation, 0);
        assert_eq!(seed.overhead, 0.5);
        assert!(seed.world.count_coins() <= 100);
        assert_eq!(seed.wealth.accumulated_coordinator(), 2.0);
        assert_eq!(seed.wealth.get_coordinator_wealth().unwrap(), 0.0);
    }
}
