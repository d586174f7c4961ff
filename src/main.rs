use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use live_state::demo::{Tick, WordCount, DEMO_MODULE};
use live_state::live_state::{scan, CapabilityShape, LiveState, LocalLiveState, UpdaterModule};
use live_state::logging::{init_logging, LoggingConfig};
use live_state::{AppError, LiveStateConfig, ServiceContainer};

const SENTENCES: &[&str] = &[
    "the quick brown fox",
    "jumps over",
    "the lazy dog while the scanner registers updaters",
];

/// Live state updater discovery and registration demo
#[derive(Parser, Debug)]
#[clap(version, about = "Discover live state updaters and drive their updates", long_about = None, name = "live-state")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Print the binding descriptors found in a linked module
    List {
        /// Module path to scan
        #[clap(long, value_name = "PATH", default_value = DEMO_MODULE)]
        module: String,
    },
    /// Register the demo module and drive a number of updates
    Run {
        /// Number of update rounds
        #[clap(short = 'n', long, default_value_t = 3)]
        ticks: u32,
        /// TOML configuration file
        #[clap(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    match cli.command {
        Command::List { module } => {
            init_logging(&LoggingConfig::production())?;
            list(&module);
        }
        Command::Run { ticks, config } => {
            let config = match config {
                Some(path) => LiveStateConfig::load(&path)?,
                None => LiveStateConfig::default(),
            };
            init_logging(&config.logging_config(LoggingConfig::default()))?;
            run(&config, ticks).await?;
        }
    }

    Ok(())
}

fn list(module: &str) {
    let module = UpdaterModule::linked(module);
    let mut found = 0usize;
    for descriptor in scan(&module) {
        found += 1;
        match descriptor.shape() {
            CapabilityShape::Single => {
                println!("{:<8} {} => {}", "single", descriptor.updater.name(), descriptor.state.name());
            }
            CapabilityShape::Dual => {
                let local = descriptor.local.map(|t| t.name()).unwrap_or("-");
                println!(
                    "{:<8} {} => {}, {}",
                    "dual",
                    descriptor.updater.name(),
                    local,
                    descriptor.state.name()
                );
            }
        }
    }
    if found == 0 {
        println!("No live state updaters found in '{}'", module.path());
    }
}

async fn run(config: &LiveStateConfig, rounds: u32) -> Result<(), AppError> {
    let container = ServiceContainer::new();
    container.auto_add_live_state(&UpdaterModule::linked(DEMO_MODULE), Some(config.options_hook()))?;

    let ticks = container.resolve::<Arc<dyn LiveState<Tick>>>()?;
    let words = container.resolve::<Arc<dyn LocalLiveState<String, WordCount>>>()?;

    for round in 0..rounds {
        let cancel = CancellationToken::new();
        let sentence = SENTENCES[round as usize % SENTENCES.len()];
        words.set_local(sentence.to_string());

        match ticks.update(cancel.clone()).await {
            Ok(Tick(n)) => println!("tick   #{n}"),
            Err(e) => tracing::warn!(error = %e, "Tick update failed"),
        }
        match words.update(cancel).await {
            Ok(WordCount(n)) => println!("words  {n:>3}  \"{sentence}\""),
            Err(e) => tracing::warn!(error = %e, "Word count update failed"),
        }
    }

    let stats = container.get_stats();
    tracing::info!(
        resolutions = stats.total_resolutions,
        services = stats.registered_services,
        updates = ticks.update_count() + words.update_count(),
        "Demo finished"
    );
    Ok(())
}
