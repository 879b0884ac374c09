use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::sliders::{Dimension, SliderState};
use crate::world::Cell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Coordinator,
    Forager(usize),
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Coordinator => f.write_str("coordinator"),
            Role::Forager(index) => write!(f, "forager-{}", index + 1),
        }
    }
}

/// New slider positions chosen by a player. `None` leaves a dimension alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SliderProposal {
    pub overhead: Option<f64>,
    pub wages_commission: Option<f64>,
    pub coordinator_prerogative: Option<f64>,
}

impl SliderProposal {
    pub fn get(&self, dimension: Dimension) -> Option<f64> {
        match dimension {
            Dimension::Overhead => self.overhead,
            Dimension::WagesCommission => self.wages_commission,
            Dimension::Prerogative => self.coordinator_prerogative,
        }
    }

    pub fn with(mut self, dimension: Dimension, value: f64) -> Self {
        match dimension {
            Dimension::Overhead => self.overhead = Some(value),
            Dimension::WagesCommission => self.wages_commission = Some(value),
            Dimension::Prerogative => self.coordinator_prerogative = Some(value),
        }
        self
    }
}

/// What one finished role session hands to the closing transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleOutcome {
    pub role: Role,
    /// Fraction of the coordinator's endowment spent on map visibility.
    #[serde(default)]
    pub investment: f64,
    /// Where the coordinator sent each forager, indexed by forager.
    #[serde(default)]
    pub placements: Vec<Cell>,
    /// Coins the coordinator saw when placing foragers. The map artifact of
    /// the generation shows exactly these.
    #[serde(default)]
    pub shown: Option<Vec<Cell>>,
    #[serde(default)]
    pub coins_collected: u32,
    #[serde(default)]
    pub proposal: SliderProposal,
}

impl RoleOutcome {
    pub fn coordinator(investment: f64, placements: Vec<Cell>, proposal: SliderProposal) -> Self {
        Self {
            role: Role::Coordinator,
            investment,
            placements,
            shown: None,
            coins_collected: 0,
            proposal,
        }
    }

    pub fn with_shown(mut self, shown: Vec<Cell>) -> Self {
        self.shown = Some(shown);
        self
    }

    pub fn forager(index: usize, coins_collected: u32, proposal: SliderProposal) -> Self {
        Self {
            role: Role::Forager(index),
            investment: 0.0,
            placements: Vec::new(),
            shown: None,
            coins_collected,
            proposal,
        }
    }
}

/// Outcomes of one generation split by role tag.
pub struct OutcomesByRole<'a> {
    pub coordinators: Vec<&'a RoleOutcome>,
    pub foragers: Vec<(usize, &'a RoleOutcome)>,
}

impl<'a> OutcomesByRole<'a> {
    pub fn split(outcomes: &'a [RoleOutcome]) -> Self {
        let mut coordinators = Vec::new();
        let mut foragers = Vec::new();
        for outcome in outcomes {
            match outcome.role {
                Role::Coordinator => coordinators.push(outcome),
                Role::Forager(index) => foragers.push((index, outcome)),
            }
        }
        foragers.sort_by_key(|(index, _)| *index);
        Self {
            coordinators,
            foragers,
        }
    }

    /// Splits and checks for exactly one coordinator and one outcome for each
    /// of the `num_foragers` forager slots.
    pub fn validated(outcomes: &'a [RoleOutcome], num_foragers: usize) -> Result<Self> {
        let split = Self::split(outcomes);
        let mismatch = || GameError::OutcomeCountMismatch {
            expected_foragers: num_foragers,
            coordinators: split.coordinators.len(),
            foragers: split.foragers.len(),
        };
        if split.coordinators.len() != 1 || split.foragers.len() != num_foragers {
            return Err(mismatch());
        }
        // Sorted, so a full set of distinct slots reads 0..num_foragers.
        for (expected, (index, _)) in split.foragers.iter().enumerate() {
            if *index >= num_foragers {
                return Err(GameError::UnknownForager {
                    index: *index,
                    num_foragers,
                });
            }
            if *index != expected {
                return Err(mismatch());
            }
        }
        Ok(split)
    }

    pub fn coordinator(&self) -> Option<&'a RoleOutcome> {
        self.coordinators.first().copied()
    }
}

/// Applies the proposals of one generation to `sliders`, writing every
/// dimension exactly once. The coordinator sets overhead and prerogative; the
/// wage slider moves to the mean of the foragers' proposals, falling back to
/// the coordinator's own proposal when no forager made one. Non-finite
/// proposals count as no proposal.
pub fn apply_proposals(sliders: &mut SliderState, outcomes: &OutcomesByRole<'_>) {
    let coordinator = outcomes.coordinator().map(|outcome| outcome.proposal);

    let overhead = coordinator
        .and_then(|p| finite(p.overhead))
        .unwrap_or(sliders.get_overhead());
    let prerogative = coordinator
        .and_then(|p| finite(p.coordinator_prerogative))
        .unwrap_or(sliders.get_coordinator_prerogative());

    let wage_votes: Vec<f64> = outcomes
        .foragers
        .iter()
        .filter_map(|(_, outcome)| finite(outcome.proposal.wages_commission))
        .collect();
    let wages = if wage_votes.is_empty() {
        coordinator
            .and_then(|p| finite(p.wages_commission))
            .unwrap_or(sliders.get_wages_commission())
    } else {
        wage_votes.iter().sum::<f64>() / wage_votes.len() as f64
    };

    sliders.update_overhead(overhead);
    sliders.update_wages_commission(wages);
    sliders.update_coordinator_prerogative(prerogative);
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}
