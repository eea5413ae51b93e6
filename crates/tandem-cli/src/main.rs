mod booking_cmds;
mod config;
mod edit_cmds;
mod invite_cmds;
mod plan_cmds;
mod serve_cmd;
mod watch;

#[cfg(test)]
mod test_util;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use tandem_core::ops::BookingKind;
use tandem_store::{PgStore, pool};

use config::TandemConfig;

#[derive(Parser)]
#[command(name = "tandem", about = "Shared two-person travel plan with realtime sync")]
struct Cli {
    /// Database URL (overrides TANDEM_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Identity to act as (overrides TANDEM_IDENTITY env var)
    #[arg(long, global = true)]
    identity: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a tandem config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/tandem")]
        db_url: String,
        /// Identity to store (generated when omitted)
        #[arg(long)]
        identity: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Initialize the tandem database (requires config file or env vars)
    DbInit,
    /// Plan management
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Mint an invite code for your plan
    Invite,
    /// Join a plan with an invite code
    Join {
        /// The 6-character invite code
        code: String,
    },
    /// Set the trip's date range
    Dates {
        /// Start date (YYYY-MM-DD)
        start: String,
        /// End date (YYYY-MM-DD)
        end: String,
        /// Skip the confirmation prompt when resizing a populated plan
        #[arg(long)]
        yes: bool,
    },
    /// Day toggles
    Day {
        #[command(subcommand)]
        command: DayCommands,
    },
    /// Locations on a day's schedule
    Spot {
        #[command(subcommand)]
        command: SpotCommands,
    },
    /// Flight proposals
    Flight {
        #[command(subcommand)]
        command: BookingCommands,
    },
    /// Stay proposals
    Stay {
        #[command(subcommand)]
        command: BookingCommands,
    },
    /// Live dashboard of the plan (updates as your partner edits)
    Watch,
    /// Read-only JSON status API
    Serve {
        /// Bind address
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Port
        #[arg(long, default_value_t = 8750)]
        port: u16,
    },
}

#[derive(Subcommand)]
enum PlanCommands {
    /// Create a plan owned by your identity
    Create,
    /// Show your current plan
    Show,
}

#[derive(Subcommand)]
enum DayCommands {
    /// Toggle a day's completed flag
    Complete {
        /// Day label, e.g. "Day 3"
        label: String,
    },
    /// Toggle a day in or out of the skipped set
    Skip {
        /// Day label, e.g. "Day 3"
        label: String,
    },
}

#[derive(Subcommand)]
enum SpotCommands {
    /// Add a location to a day
    Add {
        /// Day label, e.g. "Day 2"
        day: String,
        /// Location name
        name: String,
        /// Optional note
        #[arg(long)]
        note: Option<String>,
    },
    /// Remove a location from a day by id
    Remove {
        /// Day label, e.g. "Day 2"
        day: String,
        /// Location id
        id: String,
    },
}

#[derive(Subcommand)]
enum BookingCommands {
    /// Propose a booking; details are free-form JSON
    Add {
        /// JSON object, e.g. '{"airline": "VY", "number": "VY8461"}'
        details: String,
    },
    /// Withdraw a booking by id
    Remove {
        /// Booking id
        id: String,
    },
    /// Toggle your vote on a booking
    Vote {
        /// Booking id
        id: String,
    },
    /// Comment on a booking
    Comment {
        /// Booking id
        id: String,
        /// Comment text
        text: String,
    },
    /// Remove a comment from a booking
    Uncomment {
        /// Booking id
        id: String,
        /// Comment id
        comment_id: String,
    },
}

/// Execute the `tandem init` command: write the config file.
fn cmd_init(db_url: &str, identity: Option<&str>, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let identity = identity
        .map(str::to_owned)
        .unwrap_or_else(config::generate_identity);

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        user: config::UserSection {
            identity: identity.clone(),
        },
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    println!("  user.identity = {identity}");
    println!();
    println!("Next: run `tandem db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `tandem db-init` command: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>, cli_identity: Option<&str>) -> anyhow::Result<()> {
    let resolved = TandemConfig::resolve(cli_db_url, cli_identity)?;

    println!("Initializing tandem database...");

    // 1. Create the database if it does not exist.
    pool::ensure_database_exists(&resolved.db_config).await?;

    // 2. Connect to the target database.
    let db_pool = pool::create_pool(&resolved.db_config).await?;

    // 3. Run migrations.
    pool::run_migrations(&db_pool).await?;

    // 4. Print success with table counts.
    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }

    // 5. Clean shutdown.
    db_pool.close().await;

    println!("tandem db-init complete.");
    Ok(())
}

/// Resolve config and open a store for a normal command.
async fn open_store(cli: &Cli) -> anyhow::Result<(TandemConfig, PgStore)> {
    let resolved = TandemConfig::resolve(cli.database_url.as_deref(), cli.identity.as_deref())?;
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    Ok((resolved, PgStore::new(db_pool)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Init {
            db_url,
            identity,
            force,
        } => {
            cmd_init(db_url, identity.as_deref(), *force)?;
            return Ok(());
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref(), cli.identity.as_deref()).await?;
            return Ok(());
        }
        _ => {}
    }

    let (resolved, store) = open_store(&cli).await?;
    let identity = resolved.identity.clone();

    let result = match cli.command {
        Commands::Init { .. } | Commands::DbInit => unreachable!("handled above"),
        Commands::Plan { command } => match command {
            PlanCommands::Create => plan_cmds::run_plan_create(&store, &identity).await,
            PlanCommands::Show => plan_cmds::run_plan_show(&store, &identity).await,
        },
        Commands::Invite => invite_cmds::run_invite(&store, &identity).await,
        Commands::Join { code } => invite_cmds::run_join(&store, &identity, &code).await,
        Commands::Dates { start, end, yes } => {
            edit_cmds::run_dates(&store, &identity, &start, &end, yes).await
        }
        Commands::Day { command } => match command {
            DayCommands::Complete { label } => {
                edit_cmds::run_day_complete(&store, &identity, &label).await
            }
            DayCommands::Skip { label } => edit_cmds::run_day_skip(&store, &identity, &label).await,
        },
        Commands::Spot { command } => match command {
            SpotCommands::Add { day, name, note } => {
                edit_cmds::run_spot_add(&store, &identity, &day, &name, note).await
            }
            SpotCommands::Remove { day, id } => {
                edit_cmds::run_spot_remove(&store, &identity, &day, &id).await
            }
        },
        Commands::Flight { command } => {
            run_booking_command(&store, &identity, BookingKind::Flight, command).await
        }
        Commands::Stay { command } => {
            run_booking_command(&store, &identity, BookingKind::Stay, command).await
        }
        Commands::Watch => {
            let plan_id = plan_cmds::resolve_plan_id(&store, &identity).await?;
            let store: Arc<dyn tandem_store::PlanStore> = Arc::new(store.clone());
            watch::run_watch(store, &plan_id, &identity).await
        }
        Commands::Serve { bind, port } => {
            serve_cmd::run_serve(store.pool().clone(), &bind, port).await
        }
    };

    store.pool().close().await;
    result
}

async fn run_booking_command(
    store: &PgStore,
    identity: &str,
    kind: BookingKind,
    command: BookingCommands,
) -> anyhow::Result<()> {
    match command {
        BookingCommands::Add { details } => {
            booking_cmds::run_add(store, identity, kind, &details).await
        }
        BookingCommands::Remove { id } => booking_cmds::run_remove(store, identity, kind, &id).await,
        BookingCommands::Vote { id } => booking_cmds::run_vote(store, identity, kind, &id).await,
        BookingCommands::Comment { id, text } => {
            booking_cmds::run_comment(store, identity, kind, &id, &text).await
        }
        BookingCommands::Uncomment { id, comment_id } => {
            booking_cmds::run_uncomment(store, identity, kind, &id, &comment_id).await
        }
    }
}
