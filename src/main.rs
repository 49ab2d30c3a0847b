mod categorize;
mod config;
mod crypto;
mod describe;
mod github;
mod llm;
mod report;
mod settings;

use chrono::{DateTime, Duration, Utc};
use clap::{Args, Parser, Subcommand};
use secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;
use tracing::{debug, info, info_span};
use tracing_subscriber::EnvFilter;

use config::Config;
use crypto::CredentialCipher;
use describe::DescribeOptions;
use github::{Comparison, GitHubClient, GitHubError, NewPullRequest, RepoSlug};
use llm::{DescriptionFormat, DescriptionMode, GeminiClient, TextGenerator};
use settings::{SettingsService, SettingsUpdate, SqliteSettingsStore, UserSettings};

const MAX_EXPIRY_DAYS: i64 = 36_500;

/// PR Scribe: drafts a pull request description from the difference between
/// two branches and opens the pull request on GitHub.
#[derive(Parser, Debug)]
#[command(name = "pr-scribe", version, about)]
struct Cli {
    /// Identity stored credentials belong to (overrides config and PR_SCRIBE_USER)
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage the encrypted Gemini key and GitHub token for a user
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// List repositories visible to the resolved GitHub token
    Repos,
    /// List the branches of a repository
    Branches {
        /// Repository as owner/repo or a GitHub URL
        repo: String,
    },
    /// Draft a PR description without opening a PR
    Describe(DescribeArgs),
    /// Draft a description (unless one is given) and open the PR
    Create(CreateArgs),
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    /// Create an empty settings entry for the user if none exists
    Init,
    /// Show which credentials are stored (values are masked)
    Show,
    /// Store credentials; pass an empty string to remove one
    Set {
        #[arg(long)]
        gemini_key: Option<String>,
        #[arg(long)]
        github_token: Option<String>,
        /// Expiry for the credentials being set (default: six months)
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..=MAX_EXPIRY_DAYS))]
        expires_in_days: Option<i64>,
    },
    /// Delete all stored settings for the user
    Clear,
}

#[derive(Args, Debug)]
struct GenerationArgs {
    /// Data the description is built from
    #[arg(long, value_enum, default_value_t)]
    mode: DescriptionMode,

    /// Shape of the generated description
    #[arg(long, value_enum, default_value_t)]
    format: DescriptionFormat,
}

#[derive(Args, Debug)]
struct DescribeArgs {
    /// Repository as owner/repo or a GitHub URL
    ///
    /// Not required when --patch or --mock is used.
    repo: Option<String>,

    /// Branch the changes merge into
    #[arg(long, default_value = "main")]
    base: String,

    /// Branch holding the changes
    #[arg(long)]
    head: Option<String>,

    /// Describe a local unified diff instead of a GitHub comparison
    #[arg(long, conflicts_with = "mock")]
    patch: Option<PathBuf>,

    /// Use a built-in sample diff for demo purposes (no tokens needed)
    #[arg(long)]
    r#mock: bool,

    #[command(flatten)]
    generation: GenerationArgs,

    /// Optional output file path for the markdown description
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct CreateArgs {
    /// Repository as owner/repo or a GitHub URL
    repo: String,

    #[arg(long, default_value = "main")]
    base: String,

    #[arg(long)]
    head: String,

    #[arg(long)]
    title: String,

    /// Use this file as the PR body instead of generating one
    #[arg(long)]
    body_file: Option<PathBuf>,

    #[command(flatten)]
    generation: GenerationArgs,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!("loading configuration");
    let mut config = Config::load()?;
    if let Some(user) = cli.user {
        config.user.email = Some(user);
    }

    match cli.command {
        Command::Settings { action } => run_settings(&config, action),
        Command::Repos => run_repos(&config).await,
        Command::Branches { repo } => run_branches(&config, &repo).await,
        Command::Describe(args) => run_describe(&config, args).await,
        Command::Create(args) => run_create(&config, args).await,
    }
}

fn open_settings(config: &Config) -> Result<SettingsService<SqliteSettingsStore>, Box<dyn std::error::Error>> {
    let master = Config::encryption_key().ok_or("ENCRYPTION_KEY environment variable is required for stored settings")?;
    let cipher = CredentialCipher::new(master)?;
    let store = SqliteSettingsStore::open(&config.database_path())?;
    Ok(SettingsService::new(store, cipher))
}

fn require_user(config: &Config) -> Result<&str, Box<dyn std::error::Error>> {
    Ok(config
        .user_email()
        .ok_or("a user is required: pass --user, set PR_SCRIBE_USER, or set [user] email in .pr-scribe.toml")?)
}

/// Stored settings for the configured user, or empty settings when either
/// the user or the master key is missing.
fn stored_settings(config: &Config) -> UserSettings {
    let Some(user) = config.user_email() else {
        debug!("no user configured, skipping stored settings");
        return UserSettings::default();
    };
    match open_settings(config) {
        Ok(service) => service.load(user),
        Err(e) => {
            debug!(error = %e, "stored settings unavailable");
            UserSettings::default()
        }
    }
}

fn run_settings(config: &Config, action: SettingsAction) -> Result<(), Box<dyn std::error::Error>> {
    let user = require_user(config)?;
    let service = open_settings(config)?;

    match action {
        SettingsAction::Init => {
            if service.create_empty(user)? {
                println!("Created settings for {}", user);
            } else {
                println!("Settings already exist for {}", user);
            }
        }
        SettingsAction::Show => {
            let settings = service.load(user);
            println!("Settings for {}", user);
            print_credential("Gemini API key", settings.gemini_api_key.as_ref(), settings.gemini_key_expires_at);
            print_credential("GitHub token", settings.github_pat_token.as_ref(), settings.github_token_expires_at);
        }
        SettingsAction::Set {
            gemini_key,
            github_token,
            expires_in_days,
        } => {
            if gemini_key.is_none() && github_token.is_none() {
                return Err("nothing to set: pass --gemini-key and/or --github-token".into());
            }
            let expires_at = expires_in_days.map(|days| expiry_after(Utc::now(), days)).transpose()?;
            service.save(
                user,
                SettingsUpdate {
                    gemini_key_expires_at: gemini_key.as_ref().and(expires_at),
                    github_token_expires_at: github_token.as_ref().and(expires_at),
                    gemini_api_key: gemini_key,
                    github_pat_token: github_token,
                },
            )?;
            info!("settings saved");
            println!("Settings saved for {}", user);
        }
        SettingsAction::Clear => {
            if service.clear(user)? {
                println!("Settings cleared for {}", user);
            } else {
                println!("No settings stored for {}", user);
            }
        }
    }
    Ok(())
}

fn expiry_after(now: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>, String> {
    Duration::try_days(days)
        .filter(|_| days > 0)
        .and_then(|span| now.checked_add_signed(span))
        .ok_or_else(|| format!("invalid expiry: {} days", days))
}

fn print_credential(label: &str, value: Option<&SecretString>, expires_at: Option<chrono::DateTime<Utc>>) {
    match value {
        Some(secret) => {
            let exposed = secret.expose_secret();
            let tail: String = exposed.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
            let expiry = expires_at
                .map(|t| format!(" (expires {})", t.format("%Y-%m-%d")))
                .unwrap_or_default();
            println!("  {}: ****{}{}", label, tail, expiry);
        }
        None => println!("  {}: not set", label),
    }
}

/// Stored PAT first, then the configured/environment token.
fn github_client(config: &Config, settings: &UserSettings) -> Result<GitHubClient, GitHubError> {
    let token = settings
        .github_pat_token
        .clone()
        .or_else(|| config.github_token())
        .ok_or(GitHubError::MissingToken)?;
    Ok(GitHubClient::new(token, config.github_api_url()))
}

/// Stored key first, then the configured/environment key. `None` means the
/// description will be rule-based.
fn text_generator(config: &Config, settings: &UserSettings) -> Option<GeminiClient> {
    let key = settings.gemini_api_key.clone().or_else(|| config.gemini_api_key())?;
    Some(GeminiClient::new(key, config.llm_api_url()))
}

async fn run_repos(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let settings = stored_settings(config);
    let client = github_client(config, &settings)?;
    let repos = client.list_repositories().await?;
    for repo in repos {
        let visibility = if repo.private { "private" } else { "public" };
        let default_branch = repo.default_branch.as_deref().unwrap_or("-");
        println!("{}\t{}\t{}", repo.full_name, visibility, default_branch);
    }
    Ok(())
}

async fn run_branches(config: &Config, repo: &str) -> Result<(), Box<dyn std::error::Error>> {
    let slug = github::parse_repo_slug(repo)?;
    let settings = stored_settings(config);
    let client = github_client(config, &settings)?;
    for branch in client.list_branches(&slug).await? {
        let marker = if branch.protected { " (protected)" } else { "" };
        println!("{}\t{}{}", branch.name, &branch.sha[..branch.sha.len().min(7)], marker);
    }
    Ok(())
}

fn describe_options(config: &Config, generation: &GenerationArgs) -> DescribeOptions {
    DescribeOptions {
        mode: generation.mode,
        format: generation.format,
        models: config.models(),
        generation: config.generation_options(),
    }
}

async fn run_describe(config: &Config, args: DescribeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let settings = stored_settings(config);

    let (header, comparison) = if args.r#mock {
        info!("using mock diff for demo");
        (
            report::ReportHeader {
                target: "mock".to_string(),
                base: args.base.clone(),
                head: args.head.clone().unwrap_or_else(|| "feature".to_string()),
            },
            comparison_from_patch(include_str!("../tests/fixtures/sample_diff.patch"))?,
        )
    } else if let Some(path) = &args.patch {
        info!(path = %path.display(), "reading local patch");
        let raw = std::fs::read_to_string(path)?;
        (
            report::ReportHeader {
                target: path.display().to_string(),
                base: args.base.clone(),
                head: args.head.clone().unwrap_or_else(|| "HEAD".to_string()),
            },
            comparison_from_patch(&raw)?,
        )
    } else {
        let repo = args
            .repo
            .as_deref()
            .ok_or("a repository is required unless --patch or --mock is used")?;
        let head = args.head.clone().ok_or("--head is required when describing a repository")?;
        let slug = github::parse_repo_slug(repo)?;
        let _span = info_span!("describe", repo = %slug, base = %args.base, head = %head).entered();
        let comparison = fetch_comparison(config, &settings, &slug, &args.base, &head).await?;
        (
            report::ReportHeader {
                target: slug.to_string(),
                base: args.base.clone(),
                head,
            },
            comparison,
        )
    };

    let generator = if args.r#mock { None } else { text_generator(config, &settings) };
    let description = describe::describe(
        &comparison,
        &describe_options(config, &args.generation),
        generator.as_ref().map(|g| g as &dyn TextGenerator),
    )
    .await;
    info!(source = %description.source, "description ready");

    let built = report::Report::new(header, description);
    report::output(&built, args.output.as_deref())?;
    Ok(())
}

async fn run_create(config: &Config, args: CreateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let slug = github::parse_repo_slug(&args.repo)?;
    let _span = info_span!("create", repo = %slug, base = %args.base, head = %args.head).entered();
    let settings = stored_settings(config);
    let client = github_client(config, &settings)?;

    let body = match &args.body_file {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let comparison = client.compare(&slug, &args.base, &args.head).await?;
            let generator = text_generator(config, &settings);
            let description = describe::describe(
                &comparison,
                &describe_options(config, &args.generation),
                generator.as_ref().map(|g| g as &dyn TextGenerator),
            )
            .await;
            info!(source = %description.source, "description ready");
            description.body
        }
    };

    let created = client
        .create_pull_request(
            &slug,
            &NewPullRequest {
                title: args.title,
                body,
                head: args.head,
                base: args.base,
            },
        )
        .await?;
    info!(number = created.number, "pull request opened");
    println!("Opened #{}: {}", created.number, created.html_url);
    Ok(())
}

async fn fetch_comparison(
    config: &Config,
    settings: &UserSettings,
    slug: &RepoSlug,
    base: &str,
    head: &str,
) -> Result<Comparison, GitHubError> {
    let client = github_client(config, settings)?;
    info!("fetching comparison from GitHub");
    let comparison = client.compare(slug, base, head).await?;
    info!(files = comparison.files.len(), commits = comparison.commits.len(), "fetched comparison");
    Ok(comparison)
}

/// Build a comparison from unified diff text. Offline input has no commits.
fn comparison_from_patch(raw: &str) -> Result<Comparison, GitHubError> {
    Ok(Comparison {
        files: github::diff::parse_diff(raw)?,
        commits: Vec::new(),
    })
}
