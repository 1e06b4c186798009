//! # Showroom CLI (`showroom`)
//!
//! The `showroom` binary initializes the database, runs the HTTP API and
//! exposes the retrieval pipeline and CRUD operations for local use.
//!
//! ## Usage
//!
//! ```bash
//! showroom --config ./config/showroom.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `showroom init` | Create the SQLite database and run schema migrations |
//! | `showroom serve` | Start the HTTP API |
//! | `showroom parse "<msg>"` | Print the entities parsed from a message |
//! | `showroom search "<msg>" --dealership <id>` | Retrieve matching vehicles |
//! | `showroom respond "<msg>" --dealership <id>` | Generate a customer reply |
//! | `showroom lead add/list` | Manage leads |
//! | `showroom inventory add/list` | Manage inventory |
//! | `showroom embed pending/rebuild` | Embed missing, stale or all vehicles |
//! | `showroom classify` | Reclassify leads by engagement |
//! | `showroom stats` | Database overview |
//!
//! ## Examples
//!
//! ```bash
//! showroom init
//! showroom inventory add --dealership d1 --make Volkswagen --model Tiguan --year 2021 --price '$29,500'
//! showroom embed pending
//! showroom respond "white tiguan under 32k?" --dealership d1 --name Ana
//! showroom serve
//! ```

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use showroom::models::{NewLead, NewVehicle, VehicleStatus};
use showroom::{commands, config, migrate, server, stats};

/// Showroom: dealership lead management with AI-assisted replies.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/showroom.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "showroom",
    about = "Dealership lead management with hybrid vehicle retrieval",
    version,
    long_about = "Showroom stores leads, conversations and vehicle inventory per dealership, \
    and answers customer messages by retrieving matching vehicles (metadata filters plus \
    vector similarity) and prompting a language model."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/showroom.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables. This
    /// command is idempotent; running it multiple times is safe.
    Init,

    /// Start the HTTP API on `[server].bind`.
    Serve,

    /// Print the entities parsed from a customer message as JSON.
    Parse {
        message: String,
    },

    /// Retrieve the vehicles matching a customer message.
    Search {
        message: String,

        #[arg(long)]
        dealership: String,

        /// Number of vehicles to return (defaults to `[retrieval].top_k`).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Generate a reply to a customer message.
    Respond {
        message: String,

        #[arg(long)]
        dealership: String,

        /// Customer name used to personalize the reply.
        #[arg(long)]
        name: Option<String>,
    },

    /// Manage leads.
    Lead {
        #[command(subcommand)]
        action: LeadAction,
    },

    /// Manage vehicle inventory.
    Inventory {
        #[command(subcommand)]
        action: InventoryAction,
    },

    /// Manage vehicle embeddings.
    ///
    /// Requires an embedding provider to be configured.
    Embed {
        #[command(subcommand)]
        action: EmbedAction,
    },

    /// Reclassify leads from their conversation timing.
    Classify {
        /// Limit to one dealership (default: all).
        #[arg(long)]
        dealership: Option<String>,
    },

    /// Show database statistics.
    Stats,
}

#[derive(Subcommand)]
enum LeadAction {
    /// Create a lead, storing `--message` as its first conversation entry.
    Add {
        #[arg(long)]
        dealership: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        /// Vehicle of interest.
        #[arg(long)]
        car: Option<String>,
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        message: Option<String>,
    },
    /// List a dealership's leads, newest first.
    List {
        #[arg(long)]
        dealership: String,
    },
}

#[derive(Subcommand)]
enum InventoryAction {
    /// Add a vehicle.
    Add {
        #[arg(long)]
        dealership: String,
        #[arg(long)]
        make: String,
        #[arg(long)]
        model: String,
        #[arg(long)]
        year: i64,
        /// Price as displayed, e.g. `$29,500`.
        #[arg(long)]
        price: String,
        #[arg(long)]
        mileage: Option<i64>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        features: Option<String>,
        #[arg(long)]
        condition: Option<String>,
    },
    /// List a dealership's vehicles.
    List {
        #[arg(long)]
        dealership: String,
        /// Only vehicles with this status (`active`, `sold`, `pending`).
        #[arg(long)]
        status: Option<String>,
    },
}

#[derive(Subcommand)]
enum EmbedAction {
    /// Embed vehicles that are missing or have stale embeddings.
    Pending {
        #[arg(long)]
        dealership: Option<String>,
        /// Override the batch size from config (number of texts per API call).
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Re-embed every active vehicle.
    Rebuild {
        #[arg(long)]
        dealership: Option<String>,
        #[arg(long)]
        batch_size: Option<usize>,
    },
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_env("SHOWROOM_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Load the config file and start logging at its level.
fn load(path: &Path) -> anyhow::Result<config::Config> {
    let cfg = config::load_config(path)?;
    init_tracing(&cfg.logging.level);
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Parsing needs no config
        Commands::Parse { message } => {
            init_tracing("warn");
            commands::run_parse(&message)?;
        }
        Commands::Init => {
            let cfg = load(&cli.config)?;
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            let cfg = load(&cli.config)?;
            server::run_server(&cfg).await?;
        }
        Commands::Search {
            message,
            dealership,
            top_k,
        } => {
            let cfg = load(&cli.config)?;
            commands::run_search(&cfg, &dealership, &message, top_k).await?;
        }
        Commands::Respond {
            message,
            dealership,
            name,
        } => {
            let cfg = load(&cli.config)?;
            commands::run_respond(&cfg, &dealership, &message, name).await?;
        }
        Commands::Lead { action } => {
            let cfg = load(&cli.config)?;
            match action {
                LeadAction::Add {
                    dealership,
                    name,
                    email,
                    phone,
                    car,
                    source,
                    message,
                } => {
                    let new = NewLead {
                        name,
                        email,
                        phone,
                        car,
                        source,
                        message,
                    };
                    commands::run_lead_add(&cfg, &dealership, new).await?;
                }
                LeadAction::List { dealership } => {
                    commands::run_lead_list(&cfg, &dealership).await?;
                }
            }
        }
        Commands::Inventory { action } => {
            let cfg = load(&cli.config)?;
            match action {
                InventoryAction::Add {
                    dealership,
                    make,
                    model,
                    year,
                    price,
                    mileage,
                    description,
                    features,
                    condition,
                } => {
                    let new = NewVehicle {
                        make,
                        model,
                        year,
                        price,
                        mileage,
                        description,
                        features,
                        condition,
                        status: VehicleStatus::Active,
                    };
                    commands::run_inventory_add(&cfg, &dealership, new).await?;
                }
                InventoryAction::List { dealership, status } => {
                    let status = status.map(|s| s.parse::<VehicleStatus>()).transpose()?;
                    commands::run_inventory_list(&cfg, &dealership, status).await?;
                }
            }
        }
        Commands::Embed { action } => {
            let cfg = load(&cli.config)?;
            match action {
                EmbedAction::Pending {
                    dealership,
                    batch_size,
                } => {
                    commands::run_embed(&cfg, dealership.as_deref(), false, batch_size).await?;
                }
                EmbedAction::Rebuild {
                    dealership,
                    batch_size,
                } => {
                    commands::run_embed(&cfg, dealership.as_deref(), true, batch_size).await?;
                }
            }
        }
        Commands::Classify { dealership } => {
            let cfg = load(&cli.config)?;
            commands::run_classify(&cfg, dealership.as_deref()).await?;
        }
        Commands::Stats => {
            let cfg = load(&cli.config)?;
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
