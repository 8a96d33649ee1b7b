//! Exile Tracker main entry point
//!
//! This is the command-line interface for the Exile Tracker build snapshot service.

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use exile_tracker::config::{load_config_with_hash, Config};
use exile_tracker::poe::PoeClient;
use exile_tracker::publish::BuildSite;
use exile_tracker::storage::{open_storage, CharacterRecord, SqliteStorage, Storage};
use exile_tracker::FetchScheduler;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Exile Tracker: periodic build snapshots for Path of Exile characters
///
/// Exile Tracker polls the character-window API for tracked characters,
/// renders their builds through headless Path of Building, keeps every
/// distinct build and publishes new ones to a build-sharing site.
#[derive(Parser, Debug)]
#[command(name = "exile-tracker")]
#[command(version)]
#[command(about = "Periodic Path of Building snapshots", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the fetch scheduler until interrupted (default)
    Run,

    /// Run a single fetch cycle and exit
    Once,

    /// Validate the configuration and print it
    Check,

    /// Register a character for periodic fetching
    Track {
        account: String,
        character: String,
        /// League the character plays in
        #[arg(long)]
        league: Option<String>,
        /// Display name of the player owning the account
        #[arg(long)]
        player: Option<String>,
    },

    /// Resume fetching a character that was skipped
    ResetSkip { account: String, character: String },

    /// Mark a character as dead so it is no longer fetched
    MarkDead { account: String, character: String },

    /// List the stored snapshots of a character
    Snapshots { account: String, character: String },

    /// List the characters of an account as reported by the API
    Characters { account: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => handle_run(config).await,
        Command::Once => handle_once(config).await,
        Command::Check => handle_check(&config, &config_hash),
        Command::Track {
            account,
            character,
            league,
            player,
        } => handle_track(&config, &account, &character, league, player),
        Command::ResetSkip { account, character } => {
            handle_reset_skip(&config, &account, &character)
        }
        Command::MarkDead { account, character } => {
            handle_mark_dead(&config, &account, &character)
        }
        Command::Snapshots { account, character } => {
            handle_snapshots(&config, &account, &character)
        }
        Command::Characters { account } => handle_characters(&config, &account).await,
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("exile_tracker=info,warn"),
            1 => EnvFilter::new("exile_tracker=debug,info"),
            2 => EnvFilter::new("exile_tracker=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn open_database(config: &Config) -> anyhow::Result<SqliteStorage> {
    let path = Path::new(&config.storage.database_path);
    open_storage(path).with_context(|| format!("Failed to open database {}", path.display()))
}

/// Runs the periodic scheduler until Ctrl-C
async fn handle_run(config: Config) -> anyhow::Result<()> {
    let scheduler = FetchScheduler::from_config(&config)?;
    let cancel = CancellationToken::new();
    let handle = scheduler.start(cancel.clone());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("Interrupt received, finishing current character");

    cancel.cancel();
    handle.join().await?;
    Ok(())
}

/// Runs one fetch cycle and prints its counters
async fn handle_once(config: Config) -> anyhow::Result<()> {
    let scheduler = FetchScheduler::from_config(&config)?;
    let report = scheduler.run_once().await;

    println!("=== Fetch Cycle ===\n");
    println!("  Processed: {}", report.processed);
    println!("  Persisted: {}", report.persisted);
    println!("  Unchanged: {}", report.unchanged);
    println!("  Skipped:   {}", report.skipped);
    println!("  Failed:    {}", report.failed);

    Ok(())
}

/// Handles `check`: prints the validated configuration
fn handle_check(config: &Config, config_hash: &str) -> anyhow::Result<()> {
    println!("=== Exile Tracker Configuration ===\n");

    println!("Fetcher:");
    println!("  Interval: {} minutes", config.fetcher.interval_minutes);
    println!("  Pacing: {}ms", config.fetcher.pacing_ms);
    println!("  Realm: {}", config.fetcher.realm);

    println!("\nAPI:");
    println!("  Base URL: {}", config.api.base_url);
    println!("  Timeout: {}s", config.api.timeout_secs);
    println!("  User agent: {}", config.user_agent.header_value());

    println!("\nRenderer:");
    println!("  Engine root: {}", config.renderer.engine_root.display());
    println!("  Interpreter: {}", config.renderer.interpreter.display());
    println!("  Script: {}", config.renderer.script);
    println!("  Scratch dir: {}", config.renderer.scratch_dir.display());
    println!("  Timeout: {}s", config.renderer.timeout_secs);

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);

    println!("\nPublisher:");
    if config.publisher.enabled {
        println!("  Site: {}", config.publisher.site);
    } else {
        println!("  Disabled");
    }

    println!("\n✓ Configuration is valid (hash: {})", config_hash);
    Ok(())
}

/// Finds a stored character by account and character name
fn find_character(
    storage: &SqliteStorage,
    account: &str,
    character: &str,
) -> anyhow::Result<CharacterRecord> {
    let account_record = storage
        .find_account_by_name(account)?
        .ok_or_else(|| anyhow!("Unknown account: {}", account))?;
    storage
        .find_character(account_record.id, character)?
        .ok_or_else(|| anyhow!("Unknown character {} on account {}", character, account))
}

/// Handles `track`: creates the account and character as needed and tracks it
fn handle_track(
    config: &Config,
    account: &str,
    character: &str,
    league: Option<String>,
    player: Option<String>,
) -> anyhow::Result<()> {
    let mut storage = open_database(config)?;

    let account_id = match storage.find_account_by_name(account)? {
        Some(existing) => existing.id,
        None => storage.create_account(account, player.as_deref())?,
    };
    let character_id = match storage.find_character(account_id, character)? {
        Some(existing) => existing.id,
        None => storage.create_character(account_id, character, league.as_deref())?,
    };
    let tracked_id = storage.track_character(character_id)?;

    println!(
        "✓ Tracking {} on account {} (tracking id {})",
        character, account, tracked_id
    );
    Ok(())
}

/// Handles `reset-skip`: clears the skip flag of a tracked character
fn handle_reset_skip(config: &Config, account: &str, character: &str) -> anyhow::Result<()> {
    let mut storage = open_database(config)?;
    let record = find_character(&storage, account, character)?;

    if record.died {
        storage.update_died_status(record.id, false)?;
    }
    let tracked_id = storage.track_character(record.id)?;
    storage.mark_should_skip(tracked_id, false)?;

    println!("✓ {} will be fetched again", character);
    Ok(())
}

/// Handles `mark-dead`: flags a character as dead
fn handle_mark_dead(config: &Config, account: &str, character: &str) -> anyhow::Result<()> {
    let mut storage = open_database(config)?;
    let record = find_character(&storage, account, character)?;

    storage.update_died_status(record.id, true)?;

    println!("✓ {} marked dead", character);
    Ok(())
}

/// Handles `snapshots`: lists the snapshot history of a character
fn handle_snapshots(config: &Config, account: &str, character: &str) -> anyhow::Result<()> {
    let storage = open_database(config)?;
    let record = find_character(&storage, account, character)?;
    let snapshots = storage.list_snapshots(record.id)?;

    println!("=== Snapshots of {} ({}) ===\n", character, snapshots.len());
    for snapshot in &snapshots {
        println!(
            "  #{} {} ({} bytes)",
            snapshot.id,
            snapshot.created_at,
            snapshot.export_string.len()
        );
        for link in storage.list_snapshot_links(snapshot.id)? {
            let shown = match BuildSite::by_label(&link.site) {
                Some(site) => site.display_link(&link.url),
                None => link.url.as_str(),
            };
            println!("    {}: {}", link.site, shown);
        }
    }

    Ok(())
}

/// Handles `characters`: lists an account's characters from the API
async fn handle_characters(config: &Config, account: &str) -> anyhow::Result<()> {
    let client = PoeClient::new(&config.api, &config.user_agent)?;
    let characters = client.get_characters(account, &config.fetcher.realm).await?;

    println!("=== Characters of {} ({}) ===\n", account, characters.len());
    for character in &characters {
        println!(
            "  {} - level {} {} ({})",
            character.name, character.level, character.class, character.league
        );
    }

    Ok(())
}
