//! Wealth ledger of one chain.
//!
//! Payouts for a generation are recomputed from scratch from its outcomes;
//! the accumulated totals are the only state that carries over.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GameError, Result};
use crate::outcome::{OutcomesByRole, Role, RoleOutcome};
use crate::sliders::SliderState;

/// Split of one generation's pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payouts {
    pub n_coins: u32,
    pub coordinator: f64,
    pub foragers: Vec<f64>,
}

impl Payouts {
    pub fn total(&self) -> f64 {
        self.coordinator + self.foragers.iter().sum::<f64>()
    }

    /// Payout of `role`, `None` for a forager slot this generation did not have.
    pub fn share_of(&self, role: Role) -> Option<f64> {
        match role {
            Role::Coordinator => Some(self.coordinator),
            Role::Forager(index) => self.foragers.get(index).copied(),
        }
    }

    /// Feedback shown to a role's next player about the generation these
    /// payouts settled.
    pub fn summary_for(&self, role: Role) -> Option<String> {
        let share = self.share_of(role)?;
        Some(format!(
            "{role}: the previous generation collected {} coins in total; under the contract you received {share:.2} coins. \
             How you play this turn shapes the rewards of later generations, your own included.",
            self.n_coins
        ))
    }
}

/// Divides the coins the foragers collected.
///
/// * `overhead` of the pool is deducted first; the coordinator keeps the
///   `coordinator_prerogative` share of that deduction and the rest flows
///   back to the foragers.
/// * Of the forager pool, `1 - wages_commission` is paid as an equal wage
///   and `wages_commission` as commission proportional to each forager's own
///   harvest. With an empty harvest the commission is split equally too.
///
/// Slider values are clamped into [0, 1] here only, and a NaN slider counts
/// as 0. The payouts always sum to the pool.
pub fn settle_payouts(collected: &[u32], sliders: &SliderState) -> Payouts {
    let n_coins: u32 = collected.iter().sum();
    let pool = n_coins as f64;
    let overhead = unit(sliders.get_overhead());
    let prerogative = unit(sliders.get_coordinator_prerogative());
    let commission = unit(sliders.get_wages_commission());

    let coordinator = pool * overhead * prerogative;
    let forager_pool = pool - coordinator;

    let headcount = collected.len() as f64;
    let foragers = collected
        .iter()
        .map(|own| {
            let wage_share = 1.0 / headcount;
            let commission_share = if n_coins > 0 {
                *own as f64 / pool
            } else {
                wage_share
            };
            forager_pool * ((1.0 - commission) * wage_share + commission * commission_share)
        })
        .collect();

    Payouts {
        n_coins,
        coordinator,
        foragers,
    }
}

fn unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WealthTracker {
    num_foragers: usize,
    n_coins: u32,
    coordinator_wealth: Option<f64>,
    foragers_wealth: Option<Vec<f64>>,
    accumulated_coordinator: f64,
    accumulated_foragers: Vec<f64>,
}

impl WealthTracker {
    pub fn new(num_foragers: usize) -> Self {
        Self {
            num_foragers,
            n_coins: 0,
            coordinator_wealth: None,
            foragers_wealth: None,
            accumulated_coordinator: 0.0,
            accumulated_foragers: vec![0.0; num_foragers],
        }
    }

    /// Starts every role's accumulated balance at `endowment`.
    pub fn with_endowment(num_foragers: usize, endowment: f64) -> Self {
        let mut tracker = Self::new(num_foragers);
        tracker.initialize();
        tracker.accumulated_coordinator = endowment;
        tracker.accumulated_foragers = vec![endowment; num_foragers];
        tracker
    }

    /// Zeroes every balance; getters succeed afterwards.
    pub fn initialize(&mut self) {
        self.n_coins = 0;
        self.coordinator_wealth = Some(0.0);
        self.foragers_wealth = Some(vec![0.0; self.num_foragers]);
        self.accumulated_coordinator = 0.0;
        self.accumulated_foragers = vec![0.0; self.num_foragers];
    }

    /// Recomputes the pool and its split for the generation that just ended.
    /// `sliders` must be the values the generation was played under.
    pub fn update_from_trials(
        &mut self,
        outcomes: &[RoleOutcome],
        sliders: &SliderState,
    ) -> Result<Payouts> {
        let split = OutcomesByRole::validated(outcomes, self.num_foragers)?;
        let collected: Vec<u32> = split
            .foragers
            .iter()
            .map(|(_, outcome)| outcome.coins_collected)
            .collect();
        let payouts = settle_payouts(&collected, sliders);
        debug!(
            n_coins = payouts.n_coins,
            coordinator = payouts.coordinator,
            "settled generation payouts"
        );

        self.n_coins = payouts.n_coins;
        self.accumulated_coordinator += payouts.coordinator;
        for (total, paid) in self.accumulated_foragers.iter_mut().zip(&payouts.foragers) {
            *total += paid;
        }
        self.coordinator_wealth = Some(payouts.coordinator);
        self.foragers_wealth = Some(payouts.foragers.clone());
        Ok(payouts)
    }

    pub fn n_coins(&self) -> u32 {
        self.n_coins
    }

    pub fn num_foragers(&self) -> usize {
        self.num_foragers
    }

    pub fn get_coordinator_wealth(&self) -> Result<f64> {
        self.coordinator_wealth
            .ok_or(GameError::UninitializedState("coordinator wealth is not set yet"))
    }

    pub fn get_forager_wealth(&self, forager_id: usize) -> Result<f64> {
        let foragers = self
            .foragers_wealth
            .as_ref()
            .ok_or(GameError::UninitializedState("forager wealth is not set yet"))?;
        foragers
            .get(forager_id)
            .copied()
            .ok_or(GameError::UnknownForager {
                index: forager_id,
                num_foragers: self.num_foragers,
            })
    }

    /// Coins paid out in the last closed generation.
    pub fn total(&self) -> f64 {
        self.coordinator_wealth.unwrap_or(0.0)
            + self
                .foragers_wealth
                .as_ref()
                .map(|f| f.iter().sum::<f64>())
                .unwrap_or(0.0)
    }

    pub fn accumulated_coordinator(&self) -> f64 {
        self.accumulated_coordinator
    }

    pub fn accumulated_forager(&self, forager_id: usize) -> Option<f64> {
        self.accumulated_foragers.get(forager_id).copied()
    }

    pub fn accumulated_total(&self) -> f64 {
        self.accumulated_coordinator + self.accumulated_foragers.iter().sum::<f64>()
    }
}
