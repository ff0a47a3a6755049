///
/// This module implements the CLI interface for syndicate: command parsing,
/// wiring configuration to concrete clients, and persisting job state.
///
/// All decision logic (which posts need drafts, how ids are merged and
/// committed) lives in [`syndicate-core`]. This module is the job
/// orchestrator: it owns the accumulator of ids for the job and hands it to
/// the core exactly once per run.
///
/// ## Commands
/// - `run`: syndicate the posts of the triggering commit and commit their ids.
/// - `fetch`: list a silo's posts, or look one up by id.
///
/// [`syndicate-core`]: ../../syndicate-core/
use crate::github::GithubRepository;
use crate::load_config::{load_config, load_silos, Overrides};
use crate::workflow::JobFiles;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use syndicate_core::commit::{CommitCursor, CommitOutcome};
use syndicate_core::contract::{Fetched, Silo};
use syndicate_core::reconcile::{synchronise, SynchroniseReport};
use syndicate_core::silo;
use syndicate_core::syndication::{PendingUpdate, SyndicationId};

/// CLI for syndicate: cross-post new posts as drafts and record their ids.
#[derive(Parser)]
#[clap(
    name = "syndicate",
    version,
    about = "Syndicate new blog posts as drafts to publishing silos and record their ids in frontmatter"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Draft the posts of the triggering commit on every silo and commit the new ids
    Run {
        /// Path to an optional YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
        /// Silo to syndicate to (repeatable)
        #[clap(long = "silo")]
        silos: Vec<String>,
        /// Directory holding the posts
        #[clap(long)]
        posts_dir: Option<String>,
    },
    /// List a silo's posts, or look one up by id
    Fetch {
        /// Silo to query
        #[clap(long)]
        silo: String,
        /// Remote id to look up
        #[clap(long)]
        id: Option<String>,
        /// Path to an optional YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
    },
}

/// Hand the accumulated ids to the job's later steps.
fn persist_pending(job: &JobFiles, pending: &PendingUpdate) -> Result<()> {
    let posts = pending.to_json()?;
    job.export_env("SYNDICATE_POSTS", &posts)?;
    job.set_output("syndicated_posts", &posts)?;
    Ok(())
}

/// Hand this run's results to the job's later steps.
fn persist_job_state(job: &JobFiles, report: &SynchroniseReport) -> Result<()> {
    persist_pending(job, &report.pending)?;
    if let CommitOutcome::Committed { sha } = &report.commit {
        job.export_env("SYNDICATE_SHA", sha)?;
    }
    Ok(())
}

async fn run_syndication(overrides: Overrides) -> Result<()> {
    let settings = load_config(&overrides)?;
    settings.run.trace_loaded();

    let repo = GithubRepository::new(&settings.github, settings.run.repository.clone())?;
    let silos = settings
        .run
        .silos
        .iter()
        .map(silo::build)
        .collect::<Result<Vec<Box<dyn Silo>>, _>>()?;
    let mut cursor = CommitCursor::new(settings.run.parent_sha.clone());

    tracing::info!(command = "run", "Starting syndication");
    match synchronise(&repo, &silos, &settings.run, &mut cursor, settings.prior).await {
        Ok(report) => {
            persist_job_state(&JobFiles::from_env(), &report)?;
            tracing::info!(command = "run", cursor = %cursor.sha(), ?report, "Syndication complete");
            Ok(())
        }
        Err(e) => {
            tracing::error!(command = "run", error = %e, "Syndication failed");
            if let Some(pending) = e.pending() {
                // Drafts already exist on the silos; the next step must see their ids.
                persist_pending(&JobFiles::from_env(), pending)?;
            }
            Err(e.into())
        }
    }
}

async fn run_fetch(name: String, id: Option<String>, config: Option<PathBuf>) -> Result<()> {
    let overrides = Overrides {
        config,
        silos: vec![name],
        ..Overrides::default()
    };
    let silo_config = load_silos(&overrides)?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("no silo given"))?;
    let silo = silo::build(&silo_config)?;
    let id = id.map(|raw| raw.parse::<SyndicationId>()).transpose()?;

    match silo.fetch(id.clone()).await? {
        Fetched::All(posts) => println!("{}", serde_json::to_string_pretty(&posts)?),
        Fetched::One(post) => println!("{}", serde_json::to_string_pretty(&post)?),
        Fetched::NotFound => {
            let id = id.map(|id| id.to_string()).unwrap_or_default();
            tracing::warn!(silo = %silo.name(), id = %id, "Post not found");
            println!("not found: {id}");
        }
    }
    Ok(())
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Run {
            config,
            silos,
            posts_dir,
        } => {
            run_syndication(Overrides {
                config,
                posts_dir,
                silos,
            })
            .await
        }
        Commands::Fetch { silo, id, config } => run_fetch(silo, id, config).await,
    }
}
