//! carmatch: identify a car's brand and type from a photo.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use carmatch::Strategy;
use carmatch_cli::{
    load_engine_config, resolve_catalog_path, resolve_config_path, CommandOutput, MatchOptions,
};

#[derive(Parser)]
#[command(
    name = "carmatch",
    about = "Identify a car's brand and type by its most similar catalog image",
    version
)]
struct Cli {
    /// Path to the catalog JSON file.
    #[arg(short, long, global = true)]
    catalog: Option<String>,

    /// Path to the engine config JSON file.
    #[arg(long, global = true)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find the catalog entry most similar to a query image.
    Match {
        /// Query image file.
        query: PathBuf,

        /// Matching strategy (keypoint, histogram, template).
        #[arg(short, long, default_value = "histogram")]
        strategy: Strategy,

        /// Scan the catalog in parallel.
        #[arg(long)]
        parallel: bool,

        /// Also list the N best candidates.
        #[arg(long, default_value_t = 0)]
        top: usize,

        /// Report results scoring below this as not found.
        #[arg(long)]
        min_score: Option<f32>,
    },

    /// Score the similarity of two images.
    Compare {
        a: PathBuf,
        b: PathBuf,

        /// Matching strategy (keypoint, histogram, template).
        #[arg(short, long, default_value = "histogram")]
        strategy: Strategy,
    },

    /// Check that every catalog entry can be decoded and described.
    Validate {
        /// Matching strategy (keypoint, histogram, template).
        #[arg(short, long, default_value = "histogram")]
        strategy: Strategy,
    },

    /// Print version, strategies and effective configuration as JSON.
    Info,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   carmatch completions bash > ~/.local/share/bash-completion/completions/carmatch
    ///   carmatch completions zsh > ~/.zfunc/_carmatch
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let output = match cli.command {
        Commands::Match {
            query,
            strategy,
            parallel,
            top,
            min_score,
        } => {
            let mut config = load_engine_config(cli.config.as_deref())?;
            config.parallel |= parallel;
            let catalog_path = resolve_catalog_path(cli.catalog.as_deref());
            tracing::info!("Catalog: {catalog_path}");
            let options = MatchOptions {
                strategy,
                top,
                min_score,
            };
            carmatch_cli::run_match(&query, &catalog_path, config, &options)?
        }

        Commands::Compare { a, b, strategy } => {
            let config = load_engine_config(cli.config.as_deref())?;
            carmatch_cli::run_compare(&a, &b, config, strategy)?
        }

        Commands::Validate { strategy } => {
            let config = load_engine_config(cli.config.as_deref())?;
            let catalog_path = resolve_catalog_path(cli.catalog.as_deref());
            carmatch_cli::run_validate(&catalog_path, config, strategy)?
        }

        Commands::Info => {
            let config_path = resolve_config_path(cli.config.as_deref());
            let config = load_engine_config(config_path.as_deref())?;
            let catalog_path = resolve_catalog_path(cli.catalog.as_deref());
            CommandOutput::ok(carmatch_cli::info(
                &catalog_path,
                config_path.as_deref(),
                &config,
            ))
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "carmatch", &mut std::io::stdout());
            return Ok(());
        }
    };

    println!("{}", serde_json::to_string_pretty(&output.body)?);
    if !output.is_success() {
        std::process::exit(output.exit_code);
    }
    Ok(())
}
