use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use birthday_bot::commands::{Dispatcher, Sender};
use birthday_bot::logging;
use birthday_bot::storage::{
    BirthdayStore, Config, ConfigStorage, GeneralConfig, TomlConfigStorage, ensure_directories,
};
use birthday_bot::telegram::{Poller, TelegramClient};

#[derive(Parser)]
#[command(name = "birthday-bot")]
#[command(about = "Telegram bot that remembers birthdays", long_about = None)]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/birthday-bot/birthday-bot.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Registry file, overrides general.data_file
    #[arg(long, global = true)]
    data_file: Option<PathBuf>,

    /// Mirror debug logs to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Telegram bot (default)
    Run,

    /// Create the config file and an empty registry
    Init,

    /// Show stored birthdays
    List,

    /// Run one chat line through the bot locally and print the reply
    Send {
        /// Message text, e.g. `/add Alice 1990-05-12`
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        text: Vec<String>,
    },
}

/// Resolved configuration and paths for one invocation
struct Setup {
    config: Config,
    config_path: PathBuf,
    data_file: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Chatty console only for the long-running bot
    let quiet = !matches!(cli.command, None | Some(Commands::Run));
    let setup = setup(&cli, quiet)?;

    match cli.command {
        None | Some(Commands::Run) => cmd_run(&setup),
        Some(Commands::Init) => cmd_init(&setup),
        Some(Commands::List) => cmd_list(&setup),
        Some(Commands::Send { text }) => cmd_send(&setup, &text.join(" ")),
    }
}

/// Load config, resolve the registry path, and install logging
fn setup(cli: &Cli, quiet: bool) -> Result<Setup> {
    let (data_dir, config_dir) = ensure_directories()?;

    // Logging goes up before the config is read so first-run messages land;
    // configured levels are applied once it's loaded
    let console_override = if cli.verbose {
        Some("debug")
    } else if quiet {
        Some("warn")
    } else {
        None
    };
    let defaults = GeneralConfig::default();
    let log_path = data_dir.join("logs").join("birthday-bot.log");
    let log_handle = match logging::init_logger(
        log_path,
        &defaults.log_level,
        console_override.unwrap_or(&defaults.console_level),
    ) {
        Ok(handle) => Some(handle),
        Err(e) => {
            env_logger::Builder::new()
                .parse_filters(console_override.unwrap_or(&defaults.console_level))
                .init();
            log::warn!("File logging unavailable, using stderr only: {:#}", e);
            None
        }
    };

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("birthday-bot.toml"));
    let mut config = TomlConfigStorage::new(config_path.clone()).load()?;
    config.apply_env_overrides();

    if let Some(handle) = &log_handle {
        handle.set_levels(
            &config.general.log_level,
            console_override.unwrap_or(&config.general.console_level),
        );
    }

    let data_file = cli
        .data_file
        .clone()
        .unwrap_or_else(|| config.data_file(&data_dir));

    Ok(Setup {
        config,
        config_path,
        data_file,
    })
}

fn open_store(setup: &Setup) -> Result<Arc<BirthdayStore>> {
    let store = BirthdayStore::open(setup.data_file.clone());
    store
        .initialize_if_absent()
        .with_context(|| format!("Failed to initialize data file {:?}", store.path()))?;
    Ok(Arc::new(store))
}

/// Start the bot and poll until interrupted
fn cmd_run(setup: &Setup) -> Result<()> {
    let telegram = &setup.config.telegram;
    if telegram.token.trim().is_empty() {
        bail!(
            "No bot token configured. Set telegram.token in {:?} or the {} environment variable",
            setup.config_path,
            birthday_bot::storage::config::TOKEN_ENV
        );
    }

    let store = open_store(setup)?;
    let dispatcher = Dispatcher::new(store);

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;

    log::info!("Bot starting...");

    let result = runtime.block_on(async {
        let client = TelegramClient::new(
            &telegram.api_url,
            &telegram.token,
            Duration::from_secs(telegram.poll_timeout_secs),
        )?;

        let me = client.get_me().await?;
        log::info!("Authorized as @{}", me.username.as_deref().unwrap_or(&me.first_name));

        let bot_username = telegram
            .bot_username()
            .map(str::to_string)
            .or(me.username);

        client.delete_webhook(telegram.drop_pending_updates).await?;

        Poller::new(client, dispatcher, telegram, bot_username).run().await
    });

    log::info!("Bot stopped.");

    result.context("Bot terminated")
}

/// Create config and registry files without starting the bot
fn cmd_init(setup: &Setup) -> Result<()> {
    let store = open_store(setup)?;

    println!("Config: {}", setup.config_path.display());
    println!("Data file: {}", store.path().display());

    Ok(())
}

/// Print stored birthdays
fn cmd_list(setup: &Setup) -> Result<()> {
    let store = open_store(setup)?;
    let registry = store.load();

    println!("Birthdays ({}):", registry.len());
    println!("{}", "=".repeat(40));

    for record in registry.records() {
        println!("{}", record);
    }

    if registry.is_empty() {
        println!("(empty - no birthdays saved yet)");
    }

    Ok(())
}

/// Dispatch one chat line locally
fn cmd_send(setup: &Setup, text: &str) -> Result<()> {
    let dispatcher = Dispatcher::new(open_store(setup)?);

    let sender = std::env::var("USER").map(Sender::named).unwrap_or_default();
    if let Some(reply) = dispatcher.handle_text(text, &sender, setup.config.telegram.bot_username()) {
        println!("{}", reply.text);
    }

    Ok(())
}
