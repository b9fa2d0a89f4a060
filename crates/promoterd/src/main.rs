//! promoterd: approval-driven rollout daemon.
//!
//! # Usage
//!
//! ```text
//! promoterd run --config /etc/promoter/promoter.toml
//! promoterd build --config promoter.toml --job svcA-deploy --branch main --change-type release
//! promoterd dedup --config promoter.toml status <decision-id>
//! ```
//!
//! `dedup` commands open the store file directly and need the daemon stopped.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use promoter_core::PromoterConfig;

mod commands;

#[derive(Parser)]
#[command(name = "promoterd", about = "Approval-driven rollout daemon", version)]
struct Cli {
    /// Path to promoter.toml.
    #[arg(short, long, global = true, default_value = "promoter.toml", env = "PROMOTER_CONFIG")]
    config: PathBuf,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Poll approvals and roll out approved versions until stopped.
    Run {
        /// Approval API bearer token, overriding the config file.
        #[arg(long, env = "PROMOTER_APPROVAL_TOKEN", hide_env_values = true)]
        approval_token: Option<String>,

        /// Port for /ping and /status, overriding the config file.
        #[arg(long, env = "PORT")]
        port: Option<u16>,
    },
    /// Queue a parameterized CI build.
    Build {
        #[arg(long)]
        job: String,
        #[arg(long)]
        branch: String,
        #[arg(long)]
        change_type: String,
    },
    /// Inspect or clear processed-decision records (daemon must be stopped).
    Dedup {
        #[command(subcommand)]
        action: DedupAction,
    },
}

#[derive(Subcommand)]
enum DedupAction {
    /// Show whether a decision was processed.
    Status { id: String },
    /// Forget a decision so the daemon processes it again on its next run.
    Forget { id: String },
    /// List every processed decision.
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    let mut config = PromoterConfig::from_file(&cli.config)?;

    match cli.command {
        Command::Run {
            approval_token,
            port,
        } => {
            if approval_token.is_some() {
                config.approval.access_token = approval_token;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            commands::run::run(config).await
        }
        Command::Build {
            job,
            branch,
            change_type,
        } => commands::build::build(&config, &job, &branch, &change_type).await,
        Command::Dedup { action } => match action {
            DedupAction::Status { id } => commands::dedup::status(&config, &id),
            DedupAction::Forget { id } => commands::dedup::forget(&config, &id),
            DedupAction::List => commands::dedup::list(&config),
        },
    }
}

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info,promoter=debug,promoterd=debug"))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}
