use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use forage_chain::{
    chain::ChainPropagator,
    engine::{EngineBuilder, EngineSettings},
    players::{CoordinatorBot, ForagerBot},
    rng::RngManager,
    outcome::Role,
    scenario::ScenarioLoader,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Runs coordinator/forager chains with scripted players")]
struct Cli {
    /// Path to the scenario YAML file
    #[arg(long, default_value = "scenarios/default.yaml")]
    scenario: PathBuf,

    /// Override the number of generations per chain
    #[arg(long)]
    generations: Option<u32>,

    /// Directory for generation seed records
    #[arg(long)]
    seed_dir: Option<PathBuf>,

    /// Directory for rendered map images
    #[arg(long)]
    map_dir: Option<PathBuf>,

    /// Share of the map the coordinator bot pays to see
    #[arg(long, default_value_t = 0.6)]
    investment: f64,

    /// Change the coordinator bot applies to overhead each generation
    #[arg(long, default_value_t = 0.05)]
    overhead_step: f64,

    /// Largest random move forager bots make on the wage slider
    #[arg(long, default_value_t = 0.1)]
    wage_jitter: f64,

    /// Print the ASCII map of each chain's world
    #[arg(long)]
    show_map: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("forage_chain=info")),
        )
        .init();

    let cli = Cli::parse();
    let loader = ScenarioLoader::new(".");
    let mut scenario = loader.load(&cli.scenario)?;
    if let Some(generations) = cli.generations {
        scenario.max_generations = generations;
        scenario.validate()?;
    }

    let mut rng = RngManager::new(scenario.seed);
    for distribution in scenario.world.distributions.clone() {
        let chain_name = format!("{}-{}", scenario.name, distribution);
        let root = scenario.root_seed(distribution, &mut rng.stream(&format!("world:{distribution}")))?;
        if cli.show_map {
            println!("{chain_name}\n{}\n", root.world);
        }
        let mut chain = ChainPropagator::new(scenario.chain_config(), root)?;

        let settings = EngineSettings {
            chain_name: chain_name.clone(),
            seed: scenario.seed,
            harvest_radius: scenario.harvest_radius,
            max_attempts: 3,
            seed_dir: cli.seed_dir.clone(),
            map_dir: cli.map_dir.clone(),
        };
        let mut builder = EngineBuilder::new(settings)
            .with_session(CoordinatorBot::new(cli.investment, cli.overhead_step));
        for index in 0..scenario.num_foragers {
            builder = builder.with_session(ForagerBot::new(index, cli.wage_jitter));
        }
        let mut engine = builder.build()?;

        let report = engine.run(&mut chain)?;
        let last = &report.final_seed;
        println!(
            "Chain '{}' closed {} generations on {} coins. Final contract: overhead {:.2}, wages {:.2}, prerogative {:.2}. Coordinator holds {:.2}, foragers hold {:.2}.",
            report.chain_name,
            report.generations_played,
            last.world.count_coins(),
            last.overhead,
            last.wages,
            last.prerogative,
            last.wealth.accumulated_coordinator(),
            last.wealth.accumulated_total() - last.wealth.accumulated_coordinator(),
        );
        if let Some(payouts) = report.payouts.last() {
            let roles = std::iter::once(Role::Coordinator)
                .chain((0..scenario.num_foragers).map(Role::Forager));
            for summary in roles.filter_map(|role| payouts.summary_for(role)) {
                println!("  {summary}");
            }
        }
    }
    Ok(())
}
