//! gitsync CLI - keep a working copy and its remote on the same commit

mod commands;

use clap::{Parser, Subcommand};
use gitsync_core::{CliOverrides, Config, Secrets};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{ChangesArgs, StatusArgs, SyncArgs};

/// gitsync: commit, fetch, reconcile and push in one step
#[derive(Parser, Debug)]
#[command(name = "gitsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to git executable (overrides config and env)
    #[arg(long, global = true, env = "GITSYNC_GIT_PATH")]
    git_path: Option<String>,

    /// Committer name for sync commits
    #[arg(long, global = true, env = "GITSYNC_AUTHOR_NAME")]
    author_name: Option<String>,

    /// Committer email for sync commits
    #[arg(long, global = true, env = "GITSYNC_AUTHOR_EMAIL")]
    author_email: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Commit local changes and reconcile with the remote
    #[command(visible_alias = "s")]
    Sync(SyncArgs),

    /// Show repository condition and divergence from the remote
    Status(StatusArgs),

    /// List uncommitted changes
    Changes(ChangesArgs),

    /// Show current configuration
    Config,

    /// Create a secrets file template
    SecretsInit,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = Config::load_with_overrides(CliOverrides {
        git_path: cli.git_path.clone(),
        author_name: cli.author_name.clone(),
        author_email: cli.author_email.clone(),
        ..Default::default()
    })?;

    tracing::debug!(
        git_path = %config.git.path,
        remote = %config.sync.remote,
        branch = ?config.sync.branch,
        "Configuration loaded"
    );

    match cli.command {
        Some(Commands::Version) => {
            println!("gitsync {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Sync(args)) => {
            args.execute(&config).await?;
        }
        Some(Commands::Status(args)) => {
            args.execute(&config).await?;
        }
        Some(Commands::Changes(args)) => {
            args.execute(&config).await?;
        }
        Some(Commands::Config) => {
            print_config(&config)?;
        }
        Some(Commands::SecretsInit) => {
            let path = Secrets::create_template()?;
            println!("Created {}", path.display());
            println!("Add your access token, or set GITSYNC_TOKEN instead.");
        }
        None => {
            println!("gitsync - keep a working copy and its remote on the same commit");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(())
}

fn print_config(config: &Config) -> anyhow::Result<()> {
    let secrets = Secrets::load()?;

    println!("gitsync Configuration");
    println!("=====================");
    println!();
    println!("Git:");
    println!("  path: {}", config.git.path);
    match config.git.timeout {
        Some(timeout) => println!("  timeout: {:?}", timeout),
        None => println!("  timeout: (none)"),
    }
    println!();
    println!("Sync:");
    println!("  remote: {}", config.sync.remote);
    println!(
        "  branch: {}",
        config.sync.branch.as_deref().unwrap_or("(current branch)")
    );
    println!("  message: {}", config.sync.commit_message());
    println!("  ignore: {}", config.sync.ignore.join(", "));
    println!("  resolution_ceiling: {}", config.sync.resolution_ceiling);
    println!();
    println!("Identity:");
    println!("  name: {}", config.identity.name.as_deref().unwrap_or("(not set)"));
    println!("  email: {}", config.identity.email.as_deref().unwrap_or("(not set)"));
    println!();
    println!(
        "Token: {}",
        if secrets.token().is_some() { "***" } else { "(not set)" }
    );
    println!();

    if let Some(path) = Config::default_config_path() {
        println!("Config file: {}", path.display());
        if path.exists() {
            println!("  (exists)");
        } else {
            println!("  (not found - using defaults)");
        }
    }
    if let Some(path) = Secrets::default_secrets_path() {
        println!("Secrets file: {}", path.display());
    }

    Ok(())
}
