// crates/basis-keeper/src/main.rs
//
// Binary entrypoint for the Basis Protocol keeper.
//
// Parses CLI arguments, loads configuration, initializes tracing, deploys
// the protocol with a simulated market, and runs the keeper loop, printing
// one JSON report per epoch to stdout.

mod config;
mod market;
mod report;
mod scheduler;

use clap::Parser;
use config::KeeperConfig;
use scheduler::KeeperScheduler;

/// Basis Protocol keeper: drives epochs over a simulated market.
#[derive(Parser, Debug)]
#[command(name = "basis-keeper", version = "0.1.0", about = "Basis Protocol keeper and market simulator")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "keeper.toml")]
    config: String,

    /// Number of epochs to run. Overrides the config file.
    #[arg(long)]
    epochs: Option<u64>,

    /// Market RNG seed. Overrides the config file.
    #[arg(long)]
    seed: Option<u64>,

    /// Write the final protocol state as JSON to this path.
    #[arg(long)]
    dump_state: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration from TOML file, falling back to defaults if the file
    // is not found.
    let loaded = KeeperConfig::load(&args.config);
    let mut keeper_config = match &loaded {
        Ok(cfg) => cfg.clone(),
        Err(_) => KeeperConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&keeper_config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match loaded {
        Ok(_) => tracing::info!("Loaded configuration from {}", args.config),
        Err(e) => tracing::warn!(
            "Could not load config from {}: {}. Using defaults.",
            args.config,
            e
        ),
    }

    // CLI flags override the config file values.
    if let Some(epochs) = args.epochs {
        keeper_config.epochs = epochs;
    }
    if let Some(seed) = args.seed {
        keeper_config.seed = seed;
    }
    if args.dump_state.is_some() {
        keeper_config.dump_state = args.dump_state;
    }

    tracing::info!("Basis Protocol Keeper v0.1.0");
    tracing::info!("Epochs to run: {}", keeper_config.epochs);
    tracing::info!("Market seed: {}", keeper_config.seed);
    tracing::info!(
        "Epoch period: {}s, block time: {}s",
        keeper_config.treasury.period,
        keeper_config.block_time
    );

    let mut scheduler = KeeperScheduler::new(&keeper_config)?;
    scheduler.run().await?;
    tracing::info!("{} epoch reports written", scheduler.reports().len());

    if let Some(path) = &keeper_config.dump_state {
        std::fs::write(path, scheduler.protocol().dump_json()?)?;
        tracing::info!("Protocol state written to {}", path);
    }

    Ok(())
}
