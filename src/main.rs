//! regressor-selection - Main Entry Point

use clap::Parser;
use regressor_selection::cli::{cmd_catalog, cmd_predict, cmd_train, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "regressor_selection=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train { train, test, artifacts, cv_folds, format, config } => {
            cmd_train(
                &train,
                &test,
                artifacts.as_deref(),
                cv_folds,
                format.as_deref(),
                config.as_deref(),
            )?;
        }
        Commands::Predict { model, data, has_target, output } => {
            cmd_predict(&model, &data, has_target, output.as_deref())?;
        }
        Commands::Catalog => {
            cmd_catalog()?;
        }
    }

    Ok(())
}
