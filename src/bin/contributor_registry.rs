//! Contributor Registry CLI
//!
//! Thin shim over the library for CI workflows. Every invocation runs one
//! action and prints one JSON report.
//!
//! # Usage
//!
//! ```bash
//! contributor-registry --config config.toml check-exists --username alice
//!
//! contributor-registry --config config.toml create \
//!     --username alice --discord-id 123456789012345678 \
//!     --wallet 0x1234567890abcdef1234567890abcdef12345678 \
//!     --pr-number 12 --repo-name org/repo --labels '["bug"]'
//!
//! contributor-registry --config config.toml check-response \
//!     --repo-name org/repo --pr-number 12 --pr-author alice
//! ```
//!
//! Logs go to stderr (`RUST_LOG` to adjust); stdout carries only the report.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use contributor_registry::github::GITHUB_API_BASE;
use contributor_registry::{
    Action, ActionReport, CheckoutMode, ContributorRegistry, Credential, GitHubCommentSource,
    GitRegistryStore, PullRequestEntry, RegistryConfig, RegistryError, ResponseScanner,
};

#[derive(Parser)]
#[command(name = "contributor-registry")]
#[command(version)]
#[command(about = "Contributor onboarding registry backed by a git repository")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Registry configuration file (TOML)
    #[arg(long, short, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Also write the JSON report to this file
    #[arg(long, global = true)]
    output_file: Option<PathBuf>,

    /// Token with write access to the registry repository
    #[arg(long, env = "REGISTRY_TOKEN", global = true, hide_env_values = true)]
    registry_token: Option<String>,

    /// Token with read access to PR comments
    #[arg(long, env = "GITHUB_TOKEN", global = true, hide_env_values = true)]
    github_token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Whether a contributor record exists
    CheckExists {
        #[arg(long)]
        username: String,
    },

    /// Onboard a contributor with their first PR
    Create {
        #[arg(long)]
        username: String,

        #[arg(long)]
        discord_id: String,

        #[arg(long)]
        wallet: String,

        #[command(flatten)]
        pr: PrArgs,
    },

    /// Record another PR for an existing contributor
    AddPr {
        #[arg(long)]
        username: String,

        #[command(flatten)]
        pr: PrArgs,
    },

    /// Evaluate Apprentice -> Sentinel eligibility
    CheckPromotion {
        #[arg(long)]
        username: String,
    },

    /// Look for the PR author's identity claim in the PR comments
    CheckResponse {
        /// Repository in owner/name form
        #[arg(long)]
        repo_name: String,

        #[arg(long)]
        pr_number: u64,

        #[arg(long)]
        pr_author: String,

        /// API root, for GitHub Enterprise
        #[arg(long, default_value = GITHUB_API_BASE)]
        api_base: String,
    },
}

#[derive(Args)]
struct PrArgs {
    #[arg(long)]
    pr_number: u64,

    /// Repository the PR belongs to
    #[arg(long)]
    repo_name: String,

    #[arg(long, default_value = "")]
    pr_title: String,

    /// Lines changed; computed from additions + deletions when omitted
    #[arg(long, conflicts_with_all = ["additions", "deletions"])]
    lines_changed: Option<u64>,

    #[arg(long)]
    additions: Option<u64>,

    #[arg(long)]
    deletions: Option<u64>,

    /// Labels as a JSON array string, e.g. '["bug","docs"]'
    #[arg(long)]
    labels: Option<String>,
}

impl PrArgs {
    fn into_entry(self) -> Result<PullRequestEntry, RegistryError> {
        let labels: Vec<String> = match self.labels.as_deref().map(str::trim) {
            None | Some("") => Vec::new(),
            Some(raw) => serde_json::from_str(raw).map_err(|e| {
                RegistryError::Configuration(format!("--labels must be a JSON array of strings: {e}"))
            })?,
        };

        let entry = PullRequestEntry::new(self.pr_number, self.repo_name)
            .with_title(self.pr_title)
            .with_labels(labels);
        Ok(match self.lines_changed {
            Some(lines) => entry.with_lines_changed(lines),
            None => entry.with_diff_stats(
                self.additions.unwrap_or(0),
                self.deletions.unwrap_or(0),
            ),
        })
    }
}

impl Commands {
    fn action(&self) -> Action {
        match self {
            Commands::CheckExists { .. } => Action::CheckExists,
            Commands::Create { .. } => Action::Create,
            Commands::AddPr { .. } => Action::AddPr,
            Commands::CheckPromotion { .. } => Action::CheckPromotion,
            Commands::CheckResponse { .. } => Action::CheckResponse,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let action = cli.command.action();
    let output_file = cli.output_file.clone();

    let report = match run(cli).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("{} failed: {}", action, e);
            ActionReport::failed(action, &e)
        }
    };

    if let Err(e) = emit(&report, output_file.as_deref()) {
        tracing::error!("{:#}", e);
        return ExitCode::FAILURE;
    }
    if report.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn emit(report: &ActionReport, output_file: Option<&Path>) -> anyhow::Result<()> {
    let json = report.to_json();
    println!("{json}");
    if let Some(path) = output_file {
        std::fs::write(path, format!("{json}\n"))
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }
    Ok(())
}

fn credential(token: Option<String>, flag: &str) -> Result<Credential, RegistryError> {
    let token = token.ok_or_else(|| RegistryError::Configuration(format!("{flag} is required")))?;
    Credential::new(token)
        .map_err(|_| RegistryError::Configuration(format!("{flag} must not be empty")))
}

fn open_registry(
    config: RegistryConfig,
    token: Option<String>,
    mode: CheckoutMode,
) -> Result<ContributorRegistry, RegistryError> {
    let token = credential(token, "--registry-token")?;
    let store = GitRegistryStore::new(&config.registry, token, mode);
    Ok(ContributorRegistry::new(config, Arc::new(store)))
}

async fn run(cli: Cli) -> Result<ActionReport, RegistryError> {
    let config = RegistryConfig::load_from_file(&cli.config)?;
    let action = cli.command.action();
    let session = CheckoutMode::Durable(config.registry.session_dir());

    let report = match cli.command {
        Commands::CheckExists { username } => {
            let registry = open_registry(config, cli.registry_token, CheckoutMode::Ephemeral)?;
            let outcome = registry.check_exists(&username).await?;
            let message = format!("Contributor {username} exists: {}", outcome.exists);
            ActionReport::completed(action, message, &outcome)
        }
        Commands::Create {
            username,
            discord_id,
            wallet,
            pr,
        } => {
            let entry = pr.into_entry()?;
            let registry = open_registry(config, cli.registry_token, session)?;
            let outcome = registry
                .create(&username, &discord_id, &wallet, entry)
                .await?;
            if outcome.created {
                ActionReport::completed(action, format!("Created contributor: {username}"), &outcome)
            } else {
                ActionReport::rejected(
                    action,
                    format!("Invalid identity for {username}, nothing created"),
                    &outcome,
                )
            }
        }
        Commands::AddPr { username, pr } => {
            let entry = pr.into_entry()?;
            let registry = open_registry(config, cli.registry_token, session)?;
            let outcome = registry.add_pr(&username, entry).await?;
            let message = if outcome.updated {
                format!("Added PR #{} to contributor: {username}", outcome.pr_number)
            } else {
                format!("PR #{} already recorded for {username}", outcome.pr_number)
            };
            ActionReport::completed(action, message, &outcome)
        }
        Commands::CheckPromotion { username } => {
            let registry = open_registry(config, cli.registry_token, CheckoutMode::Ephemeral)?;
            let outcome = registry.check_promotion(&username).await?;
            let message = format!(
                "Contributor {username} eligible for promotion: {}",
                outcome.check.is_eligible()
            );
            ActionReport::completed(action, message, &outcome)
        }
        Commands::CheckResponse {
            repo_name,
            pr_number,
            pr_author,
            api_base,
        } => {
            let token = credential(cli.github_token, "--github-token")?;
            let source = GitHubCommentSource::with_base_url(&api_base, token)?;
            let scanner = ResponseScanner::new(Arc::new(source), &config.onboarding)?;
            let scan = scanner.scan(&repo_name, pr_number, &pr_author).await?;
            let message = if scan.has_response() {
                format!("Found response from {pr_author} on {repo_name}#{pr_number}")
            } else {
                format!("No response from {pr_author} on {repo_name}#{pr_number} yet")
            };
            ActionReport::completed(action, message, &scan)
        }
    };
    Ok(report)
}
