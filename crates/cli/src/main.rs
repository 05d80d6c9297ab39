//! ERU command line client
//!
//! A terminal frontend over the `eru-client` library: resource
//! listings, container lifecycle, scaling and log tailing.

mod commands;
mod config;
mod output;

use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use eru_client::{EruClient, DEFAULT_CEILING, DEFAULT_FLOOR};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{apps, containers, logs, pods, scale};

/// ERU orchestration CLI
#[derive(Parser)]
#[command(name = "eru")]
#[command(author, version, about = "CLI for the ERU container orchestration API", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via ERU_URL env var)
    #[arg(long, env = "ERU_URL")]
    pub url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 5)]
    pub timeout: u64,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect applications
    #[command(subcommand)]
    App(AppCommands),

    /// Inspect pods
    #[command(subcommand)]
    Pod(PodCommands),

    /// Manage single containers
    #[command(subcommand)]
    Container(ContainerCommands),

    /// Scale applications out or in
    #[command(subcommand)]
    Scale(ScaleCommands),

    /// Tail logs over websockets
    #[command(subcommand)]
    Logs(LogsCommands),
}

#[derive(Subcommand)]
pub enum AppCommands {
    /// List registered applications
    List {
        #[arg(long, default_value_t = 0)]
        start: u64,
        #[arg(long, default_value_t = 20)]
        limit: u64,
    },

    /// Show one application
    Get {
        /// Application name
        name: String,
    },

    /// List an application's containers
    Containers {
        /// Application name
        name: String,
        #[arg(long, default_value_t = 0)]
        start: u64,
        #[arg(long, default_value_t = 20)]
        limit: u64,
    },

    /// List environment names defined for an application
    Envs {
        /// Application name
        name: String,
    },

    /// Show the key-value pairs of one environment
    Env {
        /// Application name
        name: String,
        /// Environment name, like `prod` or `test`
        env: String,
    },
}

#[derive(Subcommand)]
pub enum PodCommands {
    /// List pods
    List {
        #[arg(long, default_value_t = 0)]
        start: u64,
        #[arg(long, default_value_t = 20)]
        limit: u64,
    },

    /// Show one pod
    Get {
        /// Pod name or id
        name: String,
    },

    /// List hosts under a pod
    Hosts {
        /// Pod name or id
        name: String,

        /// Include hosts marked down
        #[arg(long)]
        all: bool,
    },
}

#[derive(Subcommand)]
pub enum ContainerCommands {
    /// Show one container
    Get {
        /// Container id or sha256
        id: String,
    },

    /// Start a container
    Start { id: String },

    /// Stop a container
    Stop { id: String },

    /// Mark a container dead
    Kill { id: String },

    /// Poll container liveness
    Poll { id: String },

    /// Remove containers
    Remove {
        /// Container ids
        ids: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum ScaleCommands {
    /// Add containers to each cohort of an application
    Out {
        /// Application name
        app: String,

        /// Cores per new container (defaults to what the cohort uses)
        #[arg(long)]
        ncore: Option<f64>,

        /// Containers to add per cohort (defaults to doubling)
        #[arg(long)]
        ncontainer: Option<u64>,

        /// Target pod (defaults to the pod with the most containers)
        #[arg(long)]
        pod: Option<String>,

        /// Max cohort size after scaling
        #[arg(long, default_value_t = DEFAULT_CEILING)]
        ceiling: u64,

        /// Only scale cohorts with these entrypoints
        #[arg(long = "entrypoint")]
        entrypoints: Vec<String>,
    },

    /// Retire the oldest containers of each cohort of an application
    In {
        /// Application name
        app: String,

        /// Containers to remove per cohort
        #[arg(long)]
        ncontainer: u64,

        /// Only consider containers on these pods
        #[arg(long = "pod")]
        pods: Vec<String>,

        /// Only shrink cohorts with these entrypoints
        #[arg(long = "entrypoint")]
        entrypoints: Vec<String>,

        /// Never shrink a cohort at or below this size
        #[arg(long, default_value_t = DEFAULT_FLOOR)]
        floor: u64,
    },
}

#[derive(Subcommand)]
pub enum LogsCommands {
    /// Tail a container's log
    Container {
        /// Container id
        id: String,

        /// Include stdout
        #[arg(long)]
        stdout: bool,

        /// Include stderr
        #[arg(long)]
        stderr: bool,

        /// Show the last N lines first, like tail -n
        #[arg(long, default_value_t = 0)]
        tail: u64,
    },

    /// Tail the build log of a task
    Build {
        /// Task id
        task_id: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with env filter; --verbose turns on debug
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    // Resolve endpoint: flag/env, then config file, then default
    let file_config = config::Config::load().unwrap_or_default();
    let url = cli
        .url
        .or(file_config.api_url)
        .unwrap_or_else(|| "http://localhost:5000".to_string());

    let client = EruClient::builder()
        .base_url(url)
        .timeout(Duration::from_secs(cli.timeout))
        .build()?;

    match cli.command {
        Commands::App(app_cmd) => match app_cmd {
            AppCommands::List { start, limit } => {
                apps::list(&client, start, limit, cli.format).await?;
            }
            AppCommands::Get { name } => {
                apps::get(&client, &name, cli.format).await?;
            }
            AppCommands::Containers { name, start, limit } => {
                apps::containers(&client, &name, start, limit, cli.format).await?;
            }
            AppCommands::Envs { name } => {
                apps::env_names(&client, &name, cli.format).await?;
            }
            AppCommands::Env { name, env } => {
                apps::env_content(&client, &name, &env, cli.format).await?;
            }
        },
        Commands::Pod(pod_cmd) => match pod_cmd {
            PodCommands::List { start, limit } => {
                pods::list(&client, start, limit, cli.format).await?;
            }
            PodCommands::Get { name } => {
                pods::get(&client, &name, cli.format).await?;
            }
            PodCommands::Hosts { name, all } => {
                pods::hosts(&client, &name, all, cli.format).await?;
            }
        },
        Commands::Container(container_cmd) => {
            containers::run(&client, container_cmd, cli.format).await?;
        }
        Commands::Scale(scale_cmd) => match scale_cmd {
            ScaleCommands::Out {
                app,
                ncore,
                ncontainer,
                pod,
                ceiling,
                entrypoints,
            } => {
                scale::out(
                    &client,
                    &app,
                    eru_client::ScaleOutOptions {
                        ncore,
                        ncontainer,
                        pod_name: pod,
                        ceiling,
                        entrypoints,
                    },
                    cli.format,
                )
                .await?;
            }
            ScaleCommands::In {
                app,
                ncontainer,
                pods,
                entrypoints,
                floor,
            } => {
                scale::in_(
                    &client,
                    &app,
                    ncontainer,
                    eru_client::ScaleInOptions {
                        pod_names: pods,
                        entrypoints,
                        floor,
                    },
                    cli.format,
                )
                .await?;
            }
        },
        Commands::Logs(logs_cmd) => match logs_cmd {
            LogsCommands::Container {
                id,
                stdout,
                stderr,
                tail,
            } => {
                logs::container(&client, &id, stdout, stderr, tail).await?;
            }
            LogsCommands::Build { task_id } => {
                logs::build(&client, task_id).await?;
            }
        },
    }

    Ok(())
}
