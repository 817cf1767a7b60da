//! keyferry - move keys between RESP store instances with MIGRATE
//!
//! This is the entry point for the `keyferry` command-line tool.
#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;
use tracing::debug;

use keyferry::config::{Config, LogFormat};
use keyferry::{Endpoint, KeyferryError, MigrateOutcome, MigrateParams, MigrateRequest, Migrator};

/// keyferry - move keys between RESP store instances
#[derive(Parser, Debug)]
#[command(name = "keyferry")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to configuration file (TOML)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Source host (overrides config file)
    #[arg(
        short = 'H',
        long = "host",
        value_name = "HOST",
        env = "KEYFERRY_HOST",
        global = true
    )]
    host: Option<String>,

    /// Source port (overrides config file)
    #[arg(
        short = 'p',
        long = "port",
        value_name = "PORT",
        env = "KEYFERRY_PORT",
        global = true
    )]
    port: Option<u16>,

    /// Source ACL user name (overrides config file)
    #[arg(
        short = 'u',
        long = "user",
        value_name = "USER",
        env = "KEYFERRY_USER",
        global = true
    )]
    user: Option<String>,

    /// Source password (overrides config file)
    #[arg(
        short = 'a',
        long = "password",
        value_name = "PASSWORD",
        env = "KEYFERRY_PASSWORD",
        global = true
    )]
    password: Option<String>,

    /// Source database (overrides config file)
    #[arg(short = 'n', long = "source-db", value_name = "DB", global = true)]
    source_db: Option<u32>,

    /// Log level: trace, debug, info, warn, error (overrides config file)
    #[arg(
        short = 'l',
        long = "log-level",
        value_name = "LEVEL",
        env = "KEYFERRY_LOG_LEVEL",
        global = true
    )]
    loglevel: Option<String>,

    /// Dump effective configuration to stdout and exit
    #[arg(long = "dump-config", action = ArgAction::SetTrue, global = true)]
    dump_config: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Move keys from the source to a destination instance
    Migrate(MigrateArgs),
}

#[derive(Args, Debug)]
struct MigrateArgs {
    /// Destination host
    #[arg(long = "to-host", value_name = "HOST")]
    to_host: String,

    /// Destination port
    #[arg(long = "to-port", value_name = "PORT")]
    to_port: u16,

    /// Destination database
    #[arg(long = "db", value_name = "DB", default_value_t = 0)]
    db: u32,

    /// MIGRATE timeout in milliseconds (overrides config file)
    #[arg(long = "timeout", value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Keep the keys on the source
    #[arg(long = "copy", action = ArgAction::SetTrue)]
    copy: bool,

    /// Overwrite existing keys on the destination
    #[arg(long = "replace", action = ArgAction::SetTrue)]
    replace: bool,

    /// Destination password
    #[arg(long = "auth", value_name = "PASSWORD", conflicts_with = "auth2")]
    auth: Option<String>,

    /// Destination ACL user and password
    #[arg(long = "auth2", value_names = ["USER", "PASSWORD"], num_args = 2)]
    auth2: Option<Vec<String>>,

    /// Keys to migrate
    #[arg(value_name = "KEY", required = true)]
    keys: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            return ExitCode::from(2);
        }
    };

    if cli.dump_config {
        return match config.to_toml() {
            Ok(toml) => {
                print!("{toml}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{} {}", "error:".red().bold(), e);
                ExitCode::FAILURE
            }
        };
    }

    init_logging(&config);

    match cli.command {
        Some(Commands::Migrate(args)) => match run_migrate(&config, args).await {
            Ok(outcome) => {
                let status = match outcome {
                    MigrateOutcome::Ok => outcome.as_str().green().bold(),
                    MigrateOutcome::NoKey => outcome.as_str().yellow().bold(),
                };
                println!("{status}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                report_failure(&e);
                ExitCode::FAILURE
            }
        },
        None => {
            eprintln!("no command given; try `keyferry migrate --help`");
            ExitCode::from(2)
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(host) = &cli.host {
        config.source.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.source.port = port;
    }
    if let Some(user) = &cli.user {
        config.source.username = Some(user.clone());
    }
    if let Some(password) = &cli.password {
        config.source.password = Some(password.clone());
    }
    if let Some(db) = cli.source_db {
        config.source.db = db;
    }
    if let Some(level) = &cli.loglevel {
        config.logging.level = level.clone();
    }
    if let Some(Commands::Migrate(args)) = &cli.command {
        if let Some(timeout_ms) = args.timeout_ms {
            config.migrate.timeout_ms = timeout_ms;
        }
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn init_logging(config: &Config) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    // Logs go to stderr so stdout only carries the MIGRATE status.
    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn build_params(config: &Config, args: &MigrateArgs) -> MigrateParams {
    let mut params = MigrateParams::new();
    if args.copy || config.migrate.copy {
        params = params.copy();
    }
    if args.replace || config.migrate.replace {
        params = params.replace();
    }
    if let Some(password) = &args.auth {
        params = params.auth(password.clone());
    }
    if let Some([user, password]) = args.auth2.as_deref() {
        params = params.auth2(user.clone(), password.clone());
    }
    params
}

async fn run_migrate(config: &Config, args: MigrateArgs) -> keyferry::Result<MigrateOutcome> {
    let timeout = Duration::from_millis(config.migrate.timeout_ms);
    let destination = Endpoint::new(args.to_host.clone(), args.to_port).with_timeout(timeout);

    let request = MigrateRequest::builder(destination)
        .db(args.db)
        .timeout(timeout)
        .params(build_params(config, &args))
        .keys(args.keys)
        .build()?;

    let mut source = config.source.connect().await?;
    debug!(source = %source.endpoint(), db = source.database(), "connected to source");

    Migrator::from_config(&config.migrate)
        .migrate(&mut source, &request)
        .await
}

fn report_failure(err: &KeyferryError) {
    let label = match err {
        KeyferryError::Conflict(_) => "conflict:",
        KeyferryError::Authentication(_) => "auth failed:",
        e if e.is_transport() => "transport error:",
        _ => "error:",
    };
    eprintln!("{} {}", label.red().bold(), err);

    if matches!(err, KeyferryError::Conflict(_)) {
        eprintln!("keys without a conflict were still migrated");
    } else if err.is_transport() {
        eprintln!("the migration may or may not have happened; check the keys before retrying");
    }
}
