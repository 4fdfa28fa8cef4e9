use anyhow::{Result, anyhow};
use clap::{Args, Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use rs_mail_cleanup::auth::{TokenManager, token_store};
use rs_mail_cleanup::cleanup::decision::{DecisionSource, Prompt, Scripted};
use rs_mail_cleanup::cleanup::opener::{BrowserOpener, LinkOpener, PrintOpener};
use rs_mail_cleanup::cleanup::pipeline::CleanupPipeline;
use rs_mail_cleanup::config::{Config, load_config, load_config_from};
use rs_mail_cleanup::mail::imap_client::ImapClient;
use rs_mail_cleanup::mail::provider::{DryRun, MailProvider};
use rs_mail_cleanup::report::{write_report, write_report_json, write_summary};

#[derive(Parser)]
#[command(name = "rs_mail_cleanup")]
#[command(about = "Find marketing senders in Gmail, then delete or unsubscribe", long_about = None)]
struct Cli {
    /// Config file (defaults to the per-user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Args)]
struct SearchArgs {
    /// Maximum number of messages to inspect
    #[arg(long)]
    limit: Option<usize>,

    /// Gmail search query (overrides the configured patterns)
    #[arg(long)]
    query: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Rank senders of matching mail without changing anything
    Analyze {
        #[command(flatten)]
        search: SearchArgs,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rank senders, then decide per sender what to delete/unsubscribe
    Clean {
        #[command(flatten)]
        search: SearchArgs,

        /// Log deletions instead of performing them
        #[arg(long)]
        dry_run: bool,

        /// TOML table of per-sender decisions; prompts interactively if absent
        #[arg(long)]
        decisions: Option<PathBuf>,
    },

    /// Store the OAuth client secret in keyring
    SetClientSecret {
        #[arg(long)]
        client_id: String,
    },
}

fn load(cli_config: Option<&PathBuf>) -> Result<Config> {
    let cfg = match cli_config {
        Some(p) => load_config_from(p),
        None => load_config(),
    };
    cfg.map_err(|e| anyhow!("Configuration error: {e}"))
}

fn connect(cfg: &Config) -> Result<ImapClient> {
    let mut tokens = TokenManager::from_config(cfg)?;
    tokens.init()?;
    Ok(ImapClient::new(cfg, tokens))
}

fn query_and_limit(cfg: &Config, search: SearchArgs) -> (String, usize) {
    (
        search.query.unwrap_or_else(|| cfg.cleanup.search_query()),
        search.limit.unwrap_or(cfg.cleanup.result_limit),
    )
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::SetClientSecret { client_id } => {
            eprintln!("Paste client secret (end with Ctrl-D):");
            let mut secret = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut secret)?;
            token_store::save_client_secret(&client_id, secret.trim())?;
            println!("Saved client secret for client_id {}", client_id);
            Ok(())
        }

        Command::Analyze { search, json } => {
            let cfg = load(cli.config.as_ref())?;
            let (query, limit) = query_and_limit(&cfg, search);
            let imap = connect(&cfg)?;

            println!("Analyzing marketing emails...");
            let mut pipeline =
                CleanupPipeline::new(imap, cfg.cleanup.link_extractor()?, Box::new(PrintOpener));
            let report = pipeline.analyze(&query, limit)?;

            let mut out = std::io::stdout().lock();
            if json {
                write_report_json(&mut out, &report)?;
            } else if report.is_empty() {
                println!("No marketing emails found!");
            } else {
                write_report(&mut out, &report)?;
            }
            Ok(())
        }

        Command::Clean {
            search,
            dry_run,
            decisions,
        } => {
            let cfg = load(cli.config.as_ref())?;
            let (query, limit) = query_and_limit(&cfg, search);
            let imap = connect(&cfg)?;

            let provider: Box<dyn MailProvider> = if dry_run || cfg.cleanup.dry_run {
                info!("dry run: deletions will only be logged");
                Box::new(DryRun::new(imap))
            } else {
                Box::new(imap)
            };
            let opener: Box<dyn LinkOpener> = if cfg.cleanup.auto_open_links {
                Box::new(BrowserOpener)
            } else {
                Box::new(PrintOpener)
            };
            let mut source: Box<dyn DecisionSource> = match decisions {
                Some(path) => Box::new(Scripted::load(&path)?),
                None => Box::new(Prompt::stdio()),
            };

            println!("Analyzing marketing emails...");
            let mut pipeline = CleanupPipeline::new(provider, cfg.cleanup.link_extractor()?, opener);
            let report = pipeline.analyze(&query, limit)?;
            if report.is_empty() {
                println!("No marketing emails found!");
                return Ok(());
            }
            println!(
                "Found {} emails from {} senders",
                pipeline.fetched(),
                report.len()
            );

            let summary = pipeline.execute(&report, source.as_mut())?;
            write_summary(&mut std::io::stdout().lock(), &summary)?;
            println!("\nCleanup completed!");
            Ok(())
        }
    }
}
