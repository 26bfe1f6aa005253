// FarmFit CLI
//
// Design Decision: Use clap derive for ergonomic argument parsing.
// Design Decision: Support text/json/yaml output formats for scripting.
// Design Decision: Data commands go through the same sync hooks an app screen
// would use. One-shot listings use fetch-only hooks; `watch` commands subscribe.

mod commands;
mod output;

use anyhow::Context;
use clap::{Parser, Subcommand};
use farmfit_client::{ClientConfig, FarmFitClient};
use output::OutputFormat;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "farmfit")]
#[command(about = "FarmFit CLI - Manage pets, posts, journals and your profile")]
#[command(version)]
pub struct Cli {
    /// Datastore base URL
    #[arg(
        long,
        env = "FARMFIT_API_URL",
        default_value = "http://localhost:54321"
    )]
    pub api_url: String,

    /// Output format
    #[arg(long, short, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in, sign out, show the signed-in user
    Auth {
        #[command(subcommand)]
        command: commands::auth::AuthCommand,
    },

    /// Manage pets
    Pets {
        #[command(subcommand)]
        command: commands::pets::PetsCommand,
    },

    /// Browse and publish posts
    Posts {
        #[command(subcommand)]
        command: commands::posts::PostsCommand,
    },

    /// Manage journal entries
    Journals {
        #[command(subcommand)]
        command: commands::journals::JournalsCommand,
    },

    /// Inspect the user profile and role access
    Profile {
        #[command(subcommand)]
        command: commands::profile::ProfileCommand,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "farmfit_cli=warn,farmfit_core=warn,farmfit_client=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let output = cli.output;

    let mut config = ClientConfig::from_env();
    config.api_url = cli.api_url;
    config.validate().context("Invalid client configuration")?;
    let client = FarmFitClient::new(config)?;

    tracing::debug!(api_url = %client.config().api_url, "farmfit starting");

    match cli.command {
        Commands::Auth { command } => {
            commands::auth::run(command, &client, output, cli.quiet).await
        }
        Commands::Pets { command } => {
            commands::pets::run(command, &client, output, cli.quiet).await
        }
        Commands::Posts { command } => {
            commands::posts::run(command, &client, output, cli.quiet).await
        }
        Commands::Journals { command } => {
            commands::journals::run(command, &client, output, cli.quiet).await
        }
        Commands::Profile { command } => {
            commands::profile::run(command, &client, output, cli.quiet).await
        }
    }
}
