mod client;
mod commands;
mod config;
mod server;

use anyhow::Result;
use clap::builder::PossibleValuesParser;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use crate::client::ApiClient;
use crate::commands::{
    LogArgs, ProfileUpdate, cmd_entries, cmd_log, cmd_profile_set, cmd_profile_show, cmd_today,
};
use crate::config::Config;
use nutrisnap_core::db::SqliteStorage;
use nutrisnap_core::models::{GENDERS, UNITS};
use nutrisnap_core::storage::MemStorage;

#[derive(Parser)]
#[command(
    name = "nutrisnap",
    version,
    about = "Snap your meals, track calories and protein against daily targets"
)]
struct Cli {
    /// Server base URL (default: $NUTRISNAP_SERVER or http://127.0.0.1:8080)
    #[arg(long, global = true)]
    server: Option<String>,
    /// Profile id to work with (default: $NUTRISNAP_USER_ID or 1)
    #[arg(long, global = true)]
    user: Option<i64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum StoreKind {
    /// Keep everything in memory; lost on restart
    Memory,
    /// Persist to a SQLite file in the data directory
    Sqlite,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Storage backend
        #[arg(long, value_enum, default_value = "memory")]
        store: StoreKind,
        /// Directory for uploaded images (default: data directory)
        #[arg(long)]
        upload_dir: Option<PathBuf>,
    },
    /// Show or edit your profile and daily targets
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Log a food entry with a photo
    Log {
        /// Photo of the food
        image: PathBuf,
        /// Food name
        #[arg(short, long)]
        food: String,
        /// Quantity in the chosen unit
        #[arg(short, long)]
        quantity: u32,
        /// Unit of the quantity
        #[arg(
            short,
            long,
            default_value = "grams",
            value_parser = PossibleValuesParser::new(UNITS.iter().copied())
        )]
        unit: String,
        /// Calories (estimated from quantity when omitted)
        #[arg(long)]
        calories: Option<u32>,
        /// Protein in grams (estimated from quantity when omitted)
        #[arg(long)]
        protein: Option<f64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show progress towards today's targets
    Today {
        /// Day to show (YYYY-MM-DD, today or yesterday; UTC)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List logged food entries
    Entries {
        /// Only entries logged on or after this day (YYYY-MM-DD, today or yesterday; UTC)
        #[arg(long)]
        since: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Show the current profile
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create the profile or update some of its fields
    Set {
        /// Age in years
        #[arg(long)]
        age: Option<u32>,
        /// Gender
        #[arg(long, value_parser = PossibleValuesParser::new(GENDERS.iter().copied()))]
        gender: Option<String>,
        /// Daily calorie target (kcal)
        #[arg(long)]
        calories: Option<u32>,
        /// Daily protein target (g)
        #[arg(long)]
        protein: Option<u32>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("nutrisnap=info,tower_http=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let server_url = cli.server.unwrap_or(config.server_url);
    let user_id = cli.user.unwrap_or(config.user_id);
    let client = || ApiClient::new(&server_url);

    match cli.command {
        Commands::Serve {
            port,
            bind,
            store,
            upload_dir,
        } => {
            let upload_dir = upload_dir.unwrap_or(config.upload_dir);
            match store {
                StoreKind::Memory => {
                    server::start_server(MemStorage::new(), port, &bind, upload_dir).await
                }
                StoreKind::Sqlite => {
                    let storage = SqliteStorage::open(&config.db_path)?;
                    server::start_server(storage, port, &bind, upload_dir).await
                }
            }
        }
        Commands::Profile { command } => match command {
            ProfileCommands::Show { json } => cmd_profile_show(&mut client()?, user_id, json).await,
            ProfileCommands::Set {
                age,
                gender,
                calories,
                protein,
                json,
            } => {
                let update = ProfileUpdate {
                    age,
                    gender,
                    calories,
                    protein,
                };
                cmd_profile_set(&mut client()?, user_id, update, json).await
            }
        },
        Commands::Log {
            image,
            food,
            quantity,
            unit,
            calories,
            protein,
            json,
        } => {
            let args = LogArgs {
                image,
                food,
                quantity,
                unit,
                calories,
                protein,
            };
            cmd_log(&mut client()?, user_id, args, json).await
        }
        Commands::Today { date, json } => cmd_today(&mut client()?, user_id, date, json).await,
        Commands::Entries { since, json } => {
            cmd_entries(&mut client()?, user_id, since, json).await
        }
    }
}
