//! DocMigrate - one-shot MongoDB document migration
//!
//! CLI entry point.

use clap::Parser;
use eyre::{Context, Result};
use tracing::info;

use docmigrate::cli::{Cli, Command};
use docmigrate::config::Config;
use docmigrate::{Migration, MongoStore};

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .try_init()
        .map_err(|e| eyre::eyre!("{}", e))?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    cli.apply_overrides(&mut config);
    config.validate().context("Invalid configuration")?;

    let command = cli.command();
    if command == Command::Config {
        print!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    info!(
        "docmigrate loaded config: database={}, collections={}, seed files={}",
        config.database.name,
        config.remap.collections.len(),
        config.load.files.len()
    );

    let store = MongoStore::connect(&config.database.uri, &config.database.name)
        .await
        .context("Failed to connect to MongoDB")?;
    let migration = Migration::new(&store, config.remap_plan()?, config.load_plan());
    migration.run(&command.phases()).await?;

    Ok(())
}
