use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use crate::{
    chain::{ChainPropagator, GenerationSeed},
    outcome::{Role, RoleOutcome},
    render::{render_coins_png, render_png, RenderOptions},
    rng::{RngManager, StreamRng},
    snapshot::SeedWriter,
    wealth::Payouts,
    world::Cell,
};

pub struct EngineSettings {
    pub chain_name: String,
    pub seed: u64,
    pub harvest_radius: u32,
    /// Attempts a role gets (first player plus replacements) per generation.
    pub max_attempts: u32,
    pub seed_dir: Option<PathBuf>,
    pub map_dir: Option<PathBuf>,
}

pub struct SessionContext<'a> {
    pub chain_name: &'a str,
    pub generation: u32,
    pub harvest_radius: u32,
    /// Forager placements chosen by this generation's coordinator. Empty while
    /// the coordinator itself is playing.
    pub placements: &'a [Cell],
}

/// One role's player. Implementations stand in for the presentation layer and
/// must hand back already validated numbers.
pub trait Session {
    fn role(&self) -> Role;
    fn play(
        &mut self,
        ctx: &SessionContext,
        seed: &GenerationSeed,
        rng: &mut StreamRng<'_>,
    ) -> Result<RoleOutcome>;
}

pub struct EngineBuilder {
    settings: EngineSettings,
    sessions: Vec<Box<dyn Session>>,
}

impl EngineBuilder {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            sessions: Vec::new(),
        }
    }

    pub fn with_session(mut self, session: impl Session + 'static) -> Self {
        self.sessions.push(Box::new(session));
        self
    }

    pub fn push_session(&mut self, session: Box<dyn Session>) {
        self.sessions.push(session);
    }

    /// Sorts sessions into role slots by their tag. Needs exactly one
    /// coordinator and foragers numbered `0..n` without gaps.
    pub fn build(self) -> Result<Engine> {
        let mut coordinator = None;
        let mut foragers: Vec<(usize, Box<dyn Session>)> = Vec::new();
        for session in self.sessions {
            match session.role() {
                Role::Coordinator => {
                    if coordinator.replace(session).is_some() {
                        bail!("more than one coordinator session registered");
                    }
                }
                Role::Forager(index) => foragers.push((index, session)),
            }
        }
        let Some(coordinator) = coordinator else {
            bail!("no coordinator session registered");
        };
        foragers.sort_by_key(|(index, _)| *index);
        for (expected, (index, _)) in foragers.iter().enumerate() {
            if *index != expected {
                bail!("forager sessions must be numbered 0..{}", foragers.len());
            }
        }

        Ok(Engine {
            rng: RngManager::new(self.settings.seed),
            coordinator,
            foragers: foragers.into_iter().map(|(_, session)| session).collect(),
            seed_writer: self.settings.seed_dir.as_ref().map(SeedWriter::new),
            settings: self.settings,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ChainReport {
    pub chain_name: String,
    pub generations_played: u32,
    pub final_seed: Arc<GenerationSeed>,
    pub payouts: Vec<Payouts>,
    pub seed_files: Vec<PathBuf>,
    pub map_files: Vec<PathBuf>,
}

pub struct Engine {
    rng: RngManager,
    coordinator: Box<dyn Session>,
    foragers: Vec<Box<dyn Session>>,
    seed_writer: Option<SeedWriter>,
    settings: EngineSettings,
}

impl Engine {
    pub fn num_foragers(&self) -> usize {
        self.foragers.len()
    }

    pub fn run(&mut self, chain: &mut ChainPropagator) -> Result<ChainReport> {
        self.run_with_hook(chain, |_| {})
    }

    /// Plays generations until the chain is terminal, calling `hook` with
    /// every seed the chain emits.
    pub fn run_with_hook<F>(&mut self, chain: &mut ChainPropagator, mut hook: F) -> Result<ChainReport>
    where
        F: FnMut(&GenerationSeed),
    {
        if chain.config().num_foragers != self.foragers.len() {
            bail!(
                "chain expects {} foragers but {} sessions are registered",
                chain.config().num_foragers,
                self.foragers.len()
            );
        }

        let mut seed_files = Vec::new();
        let mut map_files = Vec::new();
        if let Some(writer) = &self.seed_writer {
            seed_files.push(writer.write(&self.settings.chain_name, &chain.current_seed(), None)?);
        }

        let mut played = 0;
        while !chain.is_terminal() {
            let generation = chain.generation();
            let seed = chain.current_seed();
            let coordinator = self.play_generation(chain, &seed)?;

            if let Some(dir) = &self.settings.map_dir {
                let path = dir
                    .join(&self.settings.chain_name)
                    .join(format!("generation_{generation:04}.png"));
                let options = RenderOptions {
                    visibility: coordinator.investment,
                    ..RenderOptions::default()
                };
                // Show the coordinator's own view when the session reports it.
                match &coordinator.shown {
                    Some(shown) => {
                        render_coins_png(&seed.world, shown, options.cell_size, &path)?;
                    }
                    None => {
                        render_png(&seed.world, options, &path, &mut self.rng.stream("render"))?;
                    }
                }
                map_files.push(path);
            }

            let next = chain
                .close(generation)
                .with_context(|| format!("closing generation {generation}"))?;
            played += 1;
            if let Some(writer) = &self.seed_writer {
                seed_files.push(writer.write(
                    &self.settings.chain_name,
                    &next,
                    chain.payouts().last(),
                )?);
            }
            hook(&next);
        }

        let final_seed = chain.current_seed();
        info!(
            chain = %self.settings.chain_name,
            generations = played,
            accumulated = final_seed.wealth.accumulated_total(),
            "chain finished"
        );
        Ok(ChainReport {
            chain_name: self.settings.chain_name.clone(),
            generations_played: played,
            final_seed,
            payouts: chain.payouts().to_vec(),
            seed_files,
            map_files,
        })
    }

    /// Records every role's outcome for the open generation and returns the
    /// coordinator's.
    fn play_generation(
        &mut self,
        chain: &mut ChainPropagator,
        seed: &GenerationSeed,
    ) -> Result<RoleOutcome> {
        let generation = chain.generation();
        let chain_name = self.settings.chain_name.as_str();
        let harvest_radius = self.settings.harvest_radius;
        let max_attempts = self.settings.max_attempts.max(1);

        let coordinator_ctx = SessionContext {
            chain_name,
            generation,
            harvest_radius,
            placements: &[],
        };
        let coordinator = play_role(
            self.coordinator.as_mut(),
            &coordinator_ctx,
            seed,
            &mut self.rng,
            chain,
            max_attempts,
        )?;

        let ctx = SessionContext {
            chain_name,
            generation,
            harvest_radius,
            placements: &coordinator.placements,
        };
        for forager in self.foragers.iter_mut() {
            play_role(forager.as_mut(), &ctx, seed, &mut self.rng, chain, max_attempts)?;
        }
        Ok(coordinator)
    }
}

/// Plays one role, handing the slot to a replacement attempt when a session
/// fails. The recorded outcome is returned.
fn play_role(
    session: &mut dyn Session,
    ctx: &SessionContext,
    seed: &GenerationSeed,
    rng: &mut RngManager,
    chain: &mut ChainPropagator,
    max_attempts: u32,
) -> Result<RoleOutcome> {
    let role = session.role();
    let mut attempt = 0;
    loop {
        attempt += 1;
        let played = session.play(ctx, seed, &mut rng.stream(&role.to_string()));
        match played {
            Ok(outcome) if outcome.role == role => {
                chain.record(ctx.generation, outcome.clone())?;
                return Ok(outcome);
            }
            Ok(outcome) => bail!(
                "session for {role} returned an outcome tagged {}",
                outcome.role
            ),
            Err(err) if attempt < max_attempts => {
                warn!(role = %role, attempt, error = %err, "session failed, reassigning role");
                chain.abandon(ctx.generation, role)?;
            }
            Err(err) => {
                return Err(err.context(format!(
                    "{role} failed {attempt} times in generation {}",
                    ctx.generation
                )))
            }
        }
    }
}
