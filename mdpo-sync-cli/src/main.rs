mod build;
mod stats;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{build::run_build_command, stats::run_stats_command};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log debug output (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    commands: Commands,
}

/// Supported subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Reconcile catalogs with the Markdown sources and write translated copies.
    Build {
        /// Directory holding the Markdown sources
        #[arg(short, long, default_value = "docs")]
        docs_dir: PathBuf,

        /// TOML configuration file
        #[arg(short, long, default_value = "mdpo-sync.toml")]
        config: PathBuf,

        /// Where translated documents are written, one directory per language
        #[arg(short, long, default_value = "site")]
        output: PathBuf,

        /// Print the build report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show translation progress of every catalog.
    Stats {
        /// Directory holding the Markdown sources
        #[arg(short, long, default_value = "docs")]
        docs_dir: PathBuf,

        /// TOML configuration file
        #[arg(short, long, default_value = "mdpo-sync.toml")]
        config: PathBuf,

        /// Optional language code to filter by
        #[arg(short, long)]
        lang: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let result = match args.commands {
        Commands::Build {
            docs_dir,
            config,
            output,
            json,
        } => run_build_command(&docs_dir, &config, &output, json),
        Commands::Stats {
            docs_dir,
            config,
            lang,
            json,
        } => run_stats_command(&docs_dir, &config, lang.as_deref(), json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
