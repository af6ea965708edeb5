mod commands;
mod config;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{cmd_import, cmd_list, cmd_search};
use crate::config::Config;
use recipedex_core::db::Database;
use recipedex_core::filter::SearchParams;
use recipedex_core::models::{DEFAULT_LIMIT, DEFAULT_PAGE};

#[derive(Parser)]
#[command(
    name = "recipedex",
    version,
    about = "Browse and search a recipe dataset",
    long_about = "Import a recipe dataset once, then list it by rating or search it by \
                  title, cuisine, rating, total time and calories, from the terminal or \
                  over a small JSON API."
)]
struct Cli {
    /// Path to the recipe database (default: platform data directory)
    #[arg(long, global = true, env = "RECIPEDEX_DB", value_name = "PATH")]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace the store contents with recipes from a JSON file
    Import {
        /// JSON object of recipes keyed by id
        file: PathBuf,
        /// Parse and clean the file without touching the store
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "PORT", default_value = "5000")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
    },
    /// List recipes, best rated first
    List {
        /// Page number, starting at 1
        #[arg(long, default_value_t = DEFAULT_PAGE, value_parser = clap::value_parser!(u64).range(1..))]
        page: u64,
        /// Recipes per page
        #[arg(short, long, default_value_t = DEFAULT_LIMIT, value_parser = clap::value_parser!(u64).range(1..))]
        limit: u64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search recipes; all filters combine
    Search {
        /// Text contained in the title (case-insensitive)
        #[arg(long)]
        title: Option<String>,
        /// Exact cuisine name
        #[arg(long)]
        cuisine: Option<String>,
        /// Rating filter, e.g. ">=4.5", "<3", "5"
        #[arg(long, allow_hyphen_values = true)]
        rating: Option<String>,
        /// Total time in minutes, e.g. "<=30"
        #[arg(long, allow_hyphen_values = true)]
        total_time: Option<String>,
        /// Calories, e.g. ">300"
        #[arg(long, allow_hyphen_values = true)]
        calories: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.db)?;
    let db = Database::open(&config.db_path)?;

    match cli.command {
        Commands::Import {
            file,
            dry_run,
            json,
        } => cmd_import(&db, &file, dry_run, json),
        Commands::Serve { port, bind } => server::start_server(db, port, &bind).await,
        Commands::List { page, limit, json } => cmd_list(&db, page, limit, json),
        Commands::Search {
            title,
            cuisine,
            rating,
            total_time,
            calories,
            json,
        } => {
            let params = SearchParams {
                title,
                cuisine,
                rating,
                total_time,
                calories,
            };
            cmd_search(&db, &params, json)
        }
    }
}
