//! Generation chain
//!
//! A chain starts from a root seed and moves forward one closing transition at
//! a time. Each transition reads only the current seed and the outcomes of the
//! generation played under it, and emits a fresh seed that shares the root's
//! world.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{GameError, Result};
use crate::outcome::{apply_proposals, OutcomesByRole, Role, RoleOutcome};
use crate::sliders::SliderState;
use crate::wealth::{Payouts, WealthTracker};
use crate::world::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub num_foragers: usize,
    /// Generations played before the chain halts.
    pub max_generations: u32,
}

/// Everything a generation's sessions need, frozen once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSeed {
    pub generation: u32,
    pub world: Arc<World>,
    pub overhead: f64,
    pub prerogative: f64,
    pub wages: f64,
    pub wealth: WealthTracker,
}

impl GenerationSeed {
    pub fn root(world: Arc<World>, sliders: SliderState, wealth: WealthTracker) -> Self {
        Self {
            generation: 0,
            world,
            overhead: sliders.get_overhead(),
            prerogative: sliders.get_coordinator_prerogative(),
            wages: sliders.get_wages_commission(),
            wealth,
        }
    }

    pub fn sliders(&self) -> SliderState {
        SliderState::new(self.overhead, self.wages, self.prerogative)
    }

    pub fn shares_world_with(&self, other: &GenerationSeed) -> bool {
        Arc::ptr_eq(&self.world, &other.world)
    }
}

/// The closing transition as a pure step: seed N and the outcomes of
/// generation N give seed N+1. Payouts use the sliders generation N was
/// played under; the proposals only shape the next seed.
pub fn advance(
    seed: &GenerationSeed,
    outcomes: &[RoleOutcome],
    num_foragers: usize,
) -> Result<(GenerationSeed, Payouts)> {
    let split = OutcomesByRole::validated(outcomes, num_foragers)?;
    let played_under = seed.sliders();

    let mut sliders = played_under;
    apply_proposals(&mut sliders, &split);

    let mut wealth = seed.wealth.clone();
    let payouts = wealth.update_from_trials(outcomes, &played_under)?;

    let next = GenerationSeed {
        generation: seed.generation + 1,
        world: Arc::clone(&seed.world),
        overhead: sliders.get_overhead(),
        prerogative: sliders.get_coordinator_prerogative(),
        wages: sliders.get_wages_commission(),
        wealth,
    };
    Ok((next, payouts))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainState {
    Seeded(u32),
    Closing(u32),
    Terminal,
}

/// Collects the role outcomes of one generation.
///
/// A role whose session is abandoned is vacated and waits for a replacement
/// player; the barrier only opens once every role holds an outcome.
#[derive(Debug, Clone)]
pub struct GenerationBarrier {
    generation: u32,
    num_foragers: usize,
    slots: BTreeMap<Role, RoleOutcome>,
    reassignments: u32,
}

impl GenerationBarrier {
    pub fn new(generation: u32, num_foragers: usize) -> Self {
        Self {
            generation,
            num_foragers,
            slots: BTreeMap::new(),
            reassignments: 0,
        }
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn record(&mut self, outcome: RoleOutcome) -> Result<()> {
        if let Role::Forager(index) = outcome.role {
            if index >= self.num_foragers {
                return Err(GameError::UnknownForager {
                    index,
                    num_foragers: self.num_foragers,
                });
            }
        }
        if self.slots.contains_key(&outcome.role) {
            return Err(GameError::RoleAlreadyRecorded(outcome.role, self.generation));
        }
        debug!(generation = self.generation, role = %outcome.role, "outcome recorded");
        self.slots.insert(outcome.role, outcome);
        Ok(())
    }

    /// Vacates `role`, dropping whatever it recorded. Returns true when the
    /// role held an outcome.
    pub fn abandon(&mut self, role: Role) -> bool {
        self.reassignments += 1;
        warn!(generation = self.generation, role = %role, "role abandoned, waiting for a replacement");
        self.slots.remove(&role).is_some()
    }

    pub fn roles(&self) -> impl Iterator<Item = Role> {
        std::iter::once(Role::Coordinator).chain((0..self.num_foragers).map(Role::Forager))
    }

    pub fn missing(&self) -> Vec<Role> {
        self.roles()
            .filter(|role| !self.slots.contains_key(role))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    pub fn reassignments(&self) -> u32 {
        self.reassignments
    }

    /// Recorded outcomes, coordinator first then foragers by index.
    pub fn outcomes(&self) -> Vec<RoleOutcome> {
        self.slots.values().cloned().collect()
    }
}

pub struct ChainPropagator {
    config: ChainConfig,
    seeds: Vec<Arc<GenerationSeed>>,
    payouts: Vec<Payouts>,
    barrier: GenerationBarrier,
    closed: BTreeSet<u32>,
    state: ChainState,
}

impl ChainPropagator {
    pub fn new(config: ChainConfig, root: GenerationSeed) -> Result<Self> {
        if config.max_generations == 0 {
            return Err(GameError::Configuration(
                "max_generations must be at least 1".into(),
            ));
        }
        if root.wealth.num_foragers() != config.num_foragers {
            return Err(GameError::Configuration(format!(
                "root wealth tracks {} foragers but the chain expects {}",
                root.wealth.num_foragers(),
                config.num_foragers
            )));
        }
        let generation = root.generation;
        // A chain resumed from a persisted seed may already be at its end.
        let state = if generation >= config.max_generations {
            ChainState::Terminal
        } else {
            ChainState::Seeded(generation)
        };
        Ok(Self {
            barrier: GenerationBarrier::new(generation, config.num_foragers),
            seeds: vec![Arc::new(root)],
            payouts: Vec::new(),
            closed: BTreeSet::new(),
            state,
            config,
        })
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn state(&self) -> ChainState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state == ChainState::Terminal
    }

    /// Generation whose sessions are currently being played.
    pub fn generation(&self) -> u32 {
        self.barrier.generation()
    }

    pub fn current_seed(&self) -> Arc<GenerationSeed> {
        // The vector starts with the root and only grows.
        Arc::clone(&self.seeds[self.seeds.len() - 1])
    }

    pub fn history(&self) -> &[Arc<GenerationSeed>] {
        &self.seeds
    }

    /// Payouts of each closed generation, in order.
    pub fn payouts(&self) -> &[Payouts] {
        &self.payouts
    }

    pub fn barrier(&self) -> &GenerationBarrier {
        &self.barrier
    }

    pub fn record(&mut self, generation: u32, outcome: RoleOutcome) -> Result<()> {
        self.ensure_open(generation)?;
        self.barrier.record(outcome)
    }

    pub fn abandon(&mut self, generation: u32, role: Role) -> Result<bool> {
        self.ensure_open(generation)?;
        Ok(self.barrier.abandon(role))
    }

    /// Runs the closing transition of `generation` and returns the next seed.
    pub fn close(&mut self, generation: u32) -> Result<Arc<GenerationSeed>> {
        if self.closed.contains(&generation) {
            return Err(GameError::DoubleClosure(generation));
        }
        self.ensure_open(generation)?;

        let outcomes = self.barrier.outcomes();
        let current = self.current_seed();
        self.state = ChainState::Closing(generation);
        let (next, payouts) = match advance(&current, &outcomes, self.config.num_foragers) {
            Ok(step) => step,
            Err(err) => {
                self.state = ChainState::Seeded(generation);
                return Err(err);
            }
        };

        info!(
            generation,
            n_coins = payouts.n_coins,
            overhead = next.overhead,
            wages = next.wages,
            prerogative = next.prerogative,
            "generation closed"
        );

        let next = Arc::new(next);
        self.closed.insert(generation);
        self.payouts.push(payouts);
        self.seeds.push(Arc::clone(&next));
        self.barrier = GenerationBarrier::new(next.generation, self.config.num_foragers);
        self.state = if next.generation >= self.config.max_generations {
            info!(generation = next.generation, "chain reached its final generation");
            ChainState::Terminal
        } else {
            ChainState::Seeded(next.generation)
        };
        Ok(next)
    }

    fn ensure_open(&self, generation: u32) -> Result<()> {
        if self.is_terminal() {
            return Err(GameError::ChainTerminated(self.config.max_generations));
        }
        let open = self.barrier.generation();
        if generation != open {
            return Err(GameError::GenerationNotOpen {
                requested: generation,
                open,
            });
        }
        Ok(())
    }
}

/// Chain handle shared by concurrent role sessions. Sessions read seeds and
/// record outcomes; the closing transition runs under the write lock, so a
/// reader sees either the old seed or the complete new one.
#[derive(Clone)]
pub struct SharedChain {
    inner: Arc<RwLock<ChainPropagator>>,
}

impl SharedChain {
    pub fn new(propagator: ChainPropagator) -> Self {
        Self {
            inner: Arc::new(RwLock::new(propagator)),
        }
    }

    pub fn current_seed(&self) -> Arc<GenerationSeed> {
        self.read(|chain| chain.current_seed())
    }

    pub fn state(&self) -> ChainState {
        self.read(|chain| chain.state())
    }

    pub fn history(&self) -> Vec<Arc<GenerationSeed>> {
        self.read(|chain| chain.history().to_vec())
    }

    /// Records an outcome and reports whether the generation is now complete.
    pub fn record(&self, generation: u32, outcome: RoleOutcome) -> Result<bool> {
        self.write(|chain| {
            chain.record(generation, outcome)?;
            Ok(chain.barrier().is_complete())
        })
    }

    pub fn abandon(&self, generation: u32, role: Role) -> Result<bool> {
        self.write(|chain| chain.abandon(generation, role))
    }

    pub fn close(&self, generation: u32) -> Result<Arc<GenerationSeed>> {
        self.write(|chain| chain.close(generation))
    }

    /// Closes `generation` once its barrier is complete. Returns `None` when
    /// outcomes are still missing or another session already closed it.
    pub fn close_if_ready(&self, generation: u32) -> Result<Option<Arc<GenerationSeed>>> {
        self.write(|chain| {
            if chain.closed.contains(&generation)
                || chain.generation() != generation
                || !chain.barrier().is_complete()
            {
                return Ok(None);
            }
            chain.close(generation).map(Some)
        })
    }

    pub fn into_inner(self) -> Option<ChainPropagator> {
        Arc::try_unwrap(self.inner)
            .ok()
            .map(|lock| lock.into_inner().unwrap_or_else(PoisonError::into_inner))
    }

    fn read<T>(&self, f: impl FnOnce(&ChainPropagator) -> T) -> T {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write<T>(&self, f: impl FnOnce(&mut ChainPropagator) -> T) -> T {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::SliderProposal;
    use crate::sliders::Dimension;
    use crate::world::{Distribution, WorldParams};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn root(num_foragers: usize) -> GenerationSeed {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let world = World::generate(
            WorldParams {
                num_coins: 20,
                num_centroids: 2,
                distribution: Distribution::Linear,
                dispersion: 2.0,
                width: 40,
                height: 40,
            },
            &mut rng,
        )
        .unwrap();
        let mut wealth = WealthTracker::new(num_foragers);
        wealth.initialize();
        GenerationSeed::root(Arc::new(world), SliderState::default(), wealth)
    }

    fn chain(num_foragers: usize, max_generations: u32) -> ChainPropagator {
        ChainPropagator::new(
            ChainConfig {
                num_foragers,
                max_generations,
            },
            root(num_foragers),
        )
        .unwrap()
    }

    fn play(chain: &mut ChainPropagator, overhead: f64, harvest: &[u32]) {
        let generation = chain.generation();
        chain
            .record(
                generation,
                RoleOutcome::coordinator(
                    0.5,
                    Vec::new(),
                    SliderProposal::default().with(Dimension::Overhead, overhead),
                ),
            )
            .unwrap();
        for (index, coins) in harvest.iter().enumerate() {
            chain
                .record(
                    generation,
                    RoleOutcome::forager(index, *coins, SliderProposal::default()),
                )
                .unwrap();
        }
    }

    #[test]
    fn closing_emits_next_seed_with_same_world() {
        let mut chain = chain(2, 3);
        play(&mut chain, 0.2, &[3, 5]);
        let next = chain.close(0).unwrap();

        assert_eq!(next.generation, 1);
        assert!(next.shares_world_with(&chain.history()[0]));
        assert_eq!(next.overhead, 0.2);
        assert_eq!(next.wealth.n_coins(), 8);
        assert_eq!(chain.state(), ChainState::Seeded(1));
    }

    #[test]
    fn payouts_use_pre_transition_sliders() {
        let mut chain = chain(2, 2);
        play(&mut chain, 1.0, &[10, 10]);
        let next = chain.close(0).unwrap();
        // Played under overhead 0.5 and prerogative 0.5.
        assert!((next.wealth.get_coordinator_wealth().unwrap() - 5.0).abs() < 1e-9);
        assert_eq!(next.overhead, 1.0);
    }

    #[test]
    fn resumed_chain_keeps_its_length() {
        let config = ChainConfig {
            num_foragers: 1,
            max_generations: 2,
        };
        let mut finished = root(1);
        finished.generation = 2;
        let mut resumed = ChainPropagator::new(config, finished).unwrap();
        assert_eq!(resumed.state(), ChainState::Terminal);
        assert!(matches!(resumed.close(2), Err(GameError::ChainTerminated(2))));

        let mut midway = root(1);
        midway.generation = 1;
        let mut resumed = ChainPropagator::new(config, midway).unwrap();
        assert_eq!(resumed.state(), ChainState::Seeded(1));
        play(&mut resumed, 0.5, &[4]);
        let last = resumed.close(1).unwrap();
        assert_eq!(last.generation, 2);
        assert!(resumed.is_terminal());
    }

    #[test]
    fn second_close_is_rejected() {
        let mut chain = chain(1, 3);
        play(&mut chain, 0.5, &[1]);
        chain.close(0).unwrap();
        assert!(matches!(chain.close(0), Err(GameError::DoubleClosure(0))));
        assert_eq!(chain.history().len(), 2);
    }

    #[test]
    fn close_with_missing_forager_fails_and_keeps_state() {
        let mut chain = chain(3, 3);
        play(&mut chain, 0.5, &[1, 2]);
        let err = chain.close(0).unwrap_err();
        assert!(matches!(
            err,
            GameError::OutcomeCountMismatch {
                expected_foragers: 3,
                coordinators: 1,
                foragers: 2
            }
        ));
        assert_eq!(chain.state(), ChainState::Seeded(0));
        assert_eq!(chain.barrier().missing(), vec![Role::Forager(2)]);

        chain
            .record(0, RoleOutcome::forager(2, 0, SliderProposal::default()))
            .unwrap();
        assert!(chain.close(0).is_ok());
    }

    #[test]
    fn duplicate_role_is_rejected() {
        let mut chain = chain(2, 2);
        chain
            .record(0, RoleOutcome::forager(0, 1, SliderProposal::default()))
            .unwrap();
        assert!(matches!(
            chain.record(0, RoleOutcome::forager(0, 2, SliderProposal::default())),
            Err(GameError::RoleAlreadyRecorded(Role::Forager(0), 0))
        ));
        assert!(matches!(
            chain.record(0, RoleOutcome::forager(5, 2, SliderProposal::default())),
            Err(GameError::UnknownForager { index: 5, .. })
        ));
    }

    #[test]
    fn abandoned_role_waits_for_replacement() {
        let mut chain = chain(2, 2);
        play(&mut chain, 0.5, &[4, 4]);
        assert!(chain.abandon(0, Role::Forager(1)).unwrap());
        assert!(!chain.barrier().is_complete());
        assert_eq!(chain.barrier().reassignments(), 1);
        assert!(chain.close(0).is_err());

        chain
            .record(0, RoleOutcome::forager(1, 6, SliderProposal::default()))
            .unwrap();
        let next = chain.close(0).unwrap();
        assert_eq!(next.wealth.n_coins(), 10);
    }

    #[test]
    fn stale_generation_is_rejected() {
        let mut chain = chain(1, 3);
        play(&mut chain, 0.5, &[1]);
        chain.close(0).unwrap();
        assert!(matches!(
            chain.record(0, RoleOutcome::forager(0, 1, SliderProposal::default())),
            Err(GameError::GenerationNotOpen { requested: 0, open: 1 })
        ));
        assert!(matches!(
            chain.close(2),
            Err(GameError::GenerationNotOpen { requested: 2, open: 1 })
        ));
    }

    #[test]
    fn chain_terminates_after_max_generations() {
        let mut chain = chain(1, 2);
        play(&mut chain, 0.5, &[1]);
        chain.close(0).unwrap();
        play(&mut chain, 0.5, &[1]);
        chain.close(1).unwrap();

        assert!(chain.is_terminal());
        assert_eq!(chain.history().len(), 3);
        assert_eq!(chain.payouts().len(), 2);
        assert!(matches!(
            chain.record(2, RoleOutcome::forager(0, 1, SliderProposal::default())),
            Err(GameError::ChainTerminated(2))
        ));
    }

    #[test]
    fn advance_is_pure() {
        let seed = root(1);
        let outcomes = vec![
            RoleOutcome::coordinator(0.1, Vec::new(), SliderProposal::default()),
            RoleOutcome::forager(0, 7, SliderProposal::default()),
        ];
        let (a, pa) = advance(&seed, &outcomes, 1).unwrap();
        let (b, pb) = advance(&seed, &outcomes, 1).unwrap();
        assert_eq!(a, b);
        assert_eq!(pa, pb);
        assert_eq!(seed.generation, 0);
        assert_eq!(seed.wealth.n_coins(), 0);
    }

    #[test]
    fn rejects_mismatched_root() {
        let result = ChainPropagator::new(
            ChainConfig {
                num_foragers: 3,
                max_generations: 2,
            },
            root(2),
        );
        assert!(matches!(result, Err(GameError::Configuration(_))));
    }
}
