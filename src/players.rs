//! Scripted players used by the runner and in tests.

use anyhow::Result;
use rand::Rng;

use crate::{
    chain::GenerationSeed,
    engine::{Session, SessionContext},
    outcome::{Role, RoleOutcome, SliderProposal},
    render::visible_coins,
    rng::StreamRng,
    sliders::Dimension,
    world::{Cell, World},
};

/// Buys a fixed share of map visibility and sends foragers to the densest
/// coins it can see. Nudges overhead by `overhead_step` every generation.
pub struct CoordinatorBot {
    investment: f64,
    overhead_step: f64,
}

impl CoordinatorBot {
    pub fn new(investment: f64, overhead_step: f64) -> Self {
        Self {
            investment: investment.clamp(0.0, 1.0),
            overhead_step,
        }
    }
}

impl Session for CoordinatorBot {
    fn role(&self) -> Role {
        Role::Coordinator
    }

    fn play(
        &mut self,
        ctx: &SessionContext,
        seed: &GenerationSeed,
        rng: &mut StreamRng<'_>,
    ) -> Result<RoleOutcome> {
        let visible = visible_coins(&seed.world, self.investment, rng);
        let placements = place_foragers(
            &seed.world,
            &visible,
            seed.wealth.num_foragers(),
            ctx.harvest_radius,
        );
        let overhead = (seed.overhead + self.overhead_step).clamp(0.0, 1.0);
        Ok(RoleOutcome::coordinator(
            self.investment,
            placements,
            SliderProposal::default().with(Dimension::Overhead, overhead),
        )
        .with_shown(visible))
    }
}

/// Greedy placement over the coins the coordinator can see: each forager goes
/// to the visible coin with the most visible neighbours not already claimed by
/// an earlier forager. Foragers left over stand on the grid center.
pub fn place_foragers(world: &World, visible: &[Cell], num_foragers: usize, radius: u32) -> Vec<Cell> {
    let near = |a: Cell, b: Cell| a.x.abs_diff(b.x) <= radius && a.y.abs_diff(b.y) <= radius;
    let mut remaining: Vec<Cell> = visible.to_vec();
    let mut placements = Vec::with_capacity(num_foragers);
    for _ in 0..num_foragers {
        let best = remaining
            .iter()
            .copied()
            .max_by_key(|candidate| {
                let count = remaining.iter().filter(|other| near(*candidate, **other)).count();
                // Ties go to the earliest cell in row-major order.
                (count, std::cmp::Reverse((candidate.y, candidate.x)))
            });
        match best {
            Some(cell) => {
                remaining.retain(|other| !near(cell, *other));
                placements.push(cell);
            }
            None => placements.push(world.center()),
        }
    }
    placements
}

/// Harvests around its placement and proposes a wage inside the band the
/// contract allows, drifting at random by up to `wage_jitter`.
pub struct ForagerBot {
    index: usize,
    wage_jitter: f64,
}

impl ForagerBot {
    pub fn new(index: usize, wage_jitter: f64) -> Self {
        Self {
            index,
            wage_jitter: wage_jitter.abs(),
        }
    }
}

impl Session for ForagerBot {
    fn role(&self) -> Role {
        Role::Forager(self.index)
    }

    fn play(
        &mut self,
        ctx: &SessionContext,
        seed: &GenerationSeed,
        rng: &mut StreamRng<'_>,
    ) -> Result<RoleOutcome> {
        let location = ctx
            .placements
            .get(self.index)
            .copied()
            .unwrap_or_else(|| seed.world.center());
        let coins = seed.world.coins_within(location, ctx.harvest_radius);

        let sliders = seed.sliders();
        let (low, high) = sliders.wage_proposal_bounds();
        let wage = if self.wage_jitter > 0.0 {
            sliders.get_wages_commission() + rng.gen_range(-self.wage_jitter..=self.wage_jitter)
        } else {
            sliders.get_wages_commission()
        };
        Ok(RoleOutcome::forager(
            self.index,
            coins,
            SliderProposal::default().with(Dimension::WagesCommission, wage.clamp(low, high)),
        ))
    }
}
