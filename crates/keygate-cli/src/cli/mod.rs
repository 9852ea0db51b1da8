//! CLI entry and dispatch.

use anyhow::{Context, Result};
use clap::Parser;
use keygate_core::config;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "keygate")]
#[command(version = "1.0")]
#[command(about = "CLI client for a hosted identity provider")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Log in with email and password
    Login {
        /// Email address (prompted for if omitted)
        #[arg(value_name = "EMAIL")]
        email: Option<String>,

        /// Use the hosted UI browser flow instead of a password prompt
        #[arg(long)]
        hosted: bool,
    },

    /// Complete a hosted UI redirect by pasting the callback URL
    Callback {
        /// The full URL the browser was redirected to
        #[arg(value_name = "URL")]
        url: String,
    },

    /// Register a new account
    Signup {
        /// Email address to register
        #[arg(value_name = "EMAIL")]
        email: String,

        /// Display name (prompted for if omitted)
        #[arg(long, value_name = "NAME")]
        name: Option<String>,
    },

    /// Confirm a new account with the emailed verification code
    Confirm {
        /// Email address being confirmed
        #[arg(value_name = "EMAIL")]
        email: String,
        /// Six-digit verification code
        #[arg(value_name = "CODE")]
        code: String,
    },

    /// Log out and clear the stored session
    Logout,

    /// Show the current session
    Status,

    /// Call the protected backend API
    Api {
        #[command(subcommand)]
        command: ApiCommands,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ApiCommands {
    /// GET a path and print the JSON response
    Get {
        /// Path relative to the configured base URL
        #[arg(value_name = "PATH")]
        path: String,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("KEYGATE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    init_tracing();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config = config::Config::load().context("load config")?;
    tracing::debug!("config loaded from {}", config::paths::config_path().display());

    match cli.command {
        Commands::Login { email, hosted } => {
            if hosted {
                commands::auth::login_hosted(&config).await
            } else {
                commands::auth::login(&config, email.as_deref()).await
            }
        }
        Commands::Callback { url } => commands::auth::callback(&config, &url).await,
        Commands::Signup { email, name } => {
            commands::auth::signup(&config, &email, name.as_deref()).await
        }
        Commands::Confirm { email, code } => commands::auth::confirm(&config, &email, &code).await,
        Commands::Logout => commands::auth::logout(&config),
        Commands::Status => commands::auth::status(&config),

        Commands::Api { command } => match command {
            ApiCommands::Get { path } => commands::api::get(&config, &path).await,
        },

        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
        },
    }
}
