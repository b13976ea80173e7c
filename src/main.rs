use clap::{Parser, Subcommand};
use conference_tracker::admin::{self, AdminCommands};
use conference_tracker::config::{Config, HostEnvironment};
use conference_tracker::error::AppResult;
use conference_tracker::server;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// ConferenceTracker - conference presentations and speakers
#[derive(Parser, Debug)]
#[command(name = "conference-tracker")]
#[command(version = "1.0.0")]
#[command(about = "Conference presentations and speakers site", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the web server
    Server {
        /// Host to bind to (overrides SERVER_HOST env var)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides SERVER_PORT env var)
        #[arg(long)]
        port: Option<u16>,

        /// Hosting environment (overrides APP_ENVIRONMENT env var)
        #[arg(long)]
        environment: Option<String>,
    },

    /// Administrative commands
    Admin {
        #[command(subcommand)]
        admin_command: AdminCommands,
    },
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string())),
        )
        .init();

    // Load configuration
    let mut config = Config::from_env()?;

    match cli.command {
        Commands::Server {
            host,
            port,
            environment,
        } => {
            // Override config with CLI args if provided
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(environment) = environment {
                config.environment = HostEnvironment::new(environment);
            }
            config.validate()?;

            server::run_server(config).await
        }
        Commands::Admin { admin_command } => admin::run(config, admin_command),
    }
}
