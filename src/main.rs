//! Yotrace CLI - parse transcripts, extract artifacts and query them

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use yotrace::config::expand_path;
use yotrace::models::{ArtifactKind, Outcome, Role};
use yotrace::{
    ArtifactFilter, ArtifactSearch, Config, ConversationFilter, Core, EntryFilter, Page,
};

#[derive(Parser, Debug)]
#[command(name = "yotrace")]
#[command(author = "Yolog Team")]
#[command(version)]
#[command(about = "Yotrace - incremental transcript parsing and artifact extraction", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "~/.yotrace/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize a new config file with defaults
    Init,
    /// Parse new content of a transcript file
    Parse {
        path: PathBuf,
        /// Project to attach to the conversation if it has none
        #[arg(short, long)]
        project: Option<String>,
        /// Extract artifacts right after parsing
        #[arg(long)]
        extract: bool,
    },
    /// Extract artifacts from a parsed conversation
    Extract { conversation_id: String },
    /// Show one conversation
    Show { conversation_id: String },
    /// List conversations, most recent first
    List {
        #[arg(short, long)]
        project: Option<String>,
        /// Only conversations started after this RFC 3339 time
        #[arg(long, value_parser = parse_time)]
        since: Option<DateTime<Utc>>,
        /// Only conversations with at least one failed tool call
        #[arg(long)]
        errors: bool,
        #[command(flatten)]
        page: PageArgs,
    },
    /// List entries of a conversation
    Entries {
        conversation_id: String,
        #[arg(long, value_parser = parse_role)]
        role: Option<Role>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// List artifacts of a conversation
    Artifacts {
        conversation_id: String,
        #[arg(long = "type", value_parser = parse_kind)]
        kind: Option<ArtifactKind>,
        #[arg(long)]
        tool: Option<String>,
        #[arg(long, value_parser = parse_outcome)]
        outcome: Option<Outcome>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Search artifact content across all conversations
    Search {
        text: String,
        #[arg(short, long)]
        project: Option<String>,
        #[arg(long = "type", value_parser = parse_kind)]
        kind: Option<ArtifactKind>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Artifact counts by type and error category
    Stats {
        #[arg(long)]
        conversation: Option<String>,
    },
}

#[derive(ClapArgs, Debug, Clone, Copy)]
struct PageArgs {
    #[arg(long, default_value_t = 50)]
    limit: usize,
    #[arg(long, default_value_t = 0)]
    offset: usize,
}

impl From<PageArgs> for Page {
    fn from(args: PageArgs) -> Self {
        Page::new(args.offset, args.limit)
    }
}

fn parse_time(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC 3339 time: {}", e))
}

fn parse_role(s: &str) -> Result<Role, String> {
    Role::parse(s).ok_or_else(|| format!("unknown role: {}", s))
}

fn parse_kind(s: &str) -> Result<ArtifactKind, String> {
    ArtifactKind::parse(s).ok_or_else(|| format!("unknown artifact type: {}", s))
}

fn parse_outcome(s: &str) -> Result<Outcome, String> {
    Outcome::parse(s).ok_or_else(|| format!("unknown outcome: {}", s))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr, stdout carries JSON results
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("yotrace={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config_path = expand_path(&args.config);

    if let Command::Init = args.command {
        if config_path.exists() {
            tracing::warn!("Config file already exists: {}", config_path.display());
            return Ok(());
        }
        Config::create_default(&config_path)?;
        tracing::info!("Created default config at: {}", config_path.display());
        return Ok(());
    }

    let mut config = if config_path.exists() {
        Config::from_file(&config_path)?
    } else {
        tracing::debug!(
            "Config file not found at {}, using defaults",
            config_path.display()
        );
        Config::default()
    };
    config.apply_env_overrides();

    let core = Core::new(config).context("failed to open database")?;

    match args.command {
        Command::Init => {}
        Command::Parse {
            path,
            project,
            extract,
        } => {
            let parsed = core.parse_file(&path, project.as_deref())?;
            match (extract, parsed.conversation_id.as_deref()) {
                (true, Some(id)) => {
                    let extracted = core.extract_artifacts(id)?;
                    print_json(&serde_json::json!({ "parse": parsed, "extract": extracted }))?;
                }
                _ => print_json(&parsed)?,
            }
        }
        Command::Extract { conversation_id } => {
            print_json(&core.extract_artifacts(&conversation_id)?)?;
        }
        Command::Show { conversation_id } => {
            print_json(&core.get_conversation(&conversation_id)?)?;
        }
        Command::List {
            project,
            since,
            errors,
            page,
        } => {
            let filter = ConversationFilter {
                project,
                started_after: since,
                has_errors: errors,
                page: page.into(),
            };
            print_json(&core.list_conversations(&filter)?)?;
        }
        Command::Entries {
            conversation_id,
            role,
            page,
        } => {
            let filter = EntryFilter {
                role,
                page: page.into(),
            };
            print_json(&core.get_conversation_entries(&conversation_id, &filter)?)?;
        }
        Command::Artifacts {
            conversation_id,
            kind,
            tool,
            outcome,
            page,
        } => {
            let filter = ArtifactFilter {
                kind,
                tool_name: tool,
                outcome,
                page: page.into(),
            };
            print_json(&core.get_conversation_artifacts(&conversation_id, &filter)?)?;
        }
        Command::Search {
            text,
            project,
            kind,
            page,
        } => {
            let search = ArtifactSearch {
                text,
                project,
                kind,
                page: page.into(),
            };
            print_json(&core.search_artifacts(&search)?)?;
        }
        Command::Stats { conversation } => {
            print_json(&core.get_artifact_stats(conversation.as_deref())?)?;
        }
    }

    Ok(())
}
