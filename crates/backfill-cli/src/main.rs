use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tokio::time::{Duration, sleep};

use backfill_core::app::{
    InstallationLimiter, InstallationProgress, SyncOrchestrator, TaskCatalog, WorkerPool,
    status_report,
};
use backfill_core::domain::{
    DefaultDecider, DeliveryOptions, DestinationError, DestinationHost, Installation,
    InstallationId, Repository, RepositoryId, TaskKind,
};
use backfill_core::impls::{InMemoryJobQueue, InMemorySource, JsonFileSubscriptionStore};
use backfill_core::ports::{Destination, JobQueue, SubscriptionStore, SystemClock};
use backfill_core::{SyncConfig, telemetry};

/// Backfill repository data for an installation, one page per job.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Command,
}

/// Flags win over `BACKFILL_*` environment variables.
#[derive(Args, Debug)]
struct Overrides {
    /// Items requested per page
    #[arg(long, global = true)]
    page_size: Option<u32>,

    /// Workers per task-kind queue
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Log filter directive used when RUST_LOG is unset
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// json, pretty or compact
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sync the installation described by a seed file until it is complete.
    Run {
        /// Directory holding one JSON document per installation
        #[arg(long, env = "BACKFILL_STATE_DIR", default_value = ".backfill")]
        state_dir: PathBuf,

        /// Seed file: installation, repositories and their source items
        #[arg(long)]
        seed: PathBuf,
    },
    /// Print the stored progress of an installation.
    Status {
        #[arg(long, env = "BACKFILL_STATE_DIR", default_value = ".backfill")]
        state_dir: PathBuf,

        #[arg(long)]
        installation_id: u64,

        #[arg(long)]
        destination_host: String,
    },
}

/// Demo source data: what the source system would return per repository.
#[derive(Debug, Deserialize)]
struct Seed {
    installation_id: u64,
    destination_host: String,
    #[serde(default)]
    delivery: DeliveryOptions,
    repositories: Vec<SeedRepository>,
}

#[derive(Debug, Deserialize)]
struct SeedRepository {
    id: u64,
    owner: String,
    name: String,
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    pull_requests: Vec<serde_json::Value>,
    #[serde(default)]
    branches: Vec<serde_json::Value>,
    #[serde(default)]
    commits: Vec<serde_json::Value>,
}

impl SeedRepository {
    fn repository(&self) -> Repository {
        let repository = Repository::new(RepositoryId::new(self.id), &self.owner, &self.name);
        match &self.html_url {
            Some(url) => repository.with_html_url(url),
            None => repository,
        }
    }

    fn items(&self, kind: TaskKind) -> &[serde_json::Value] {
        match kind {
            TaskKind::PullRequest => &self.pull_requests,
            TaskKind::Branch => &self.branches,
            TaskKind::Commit => &self.commits,
        }
    }
}

/// Completion record written to stdout, one JSON line per installation.
#[derive(Debug, Serialize)]
struct CompletionRecord<'a> {
    event: &'static str,
    installation_id: InstallationId,
    destination_host: &'a DestinationHost,
}

struct StdoutDestination;

#[async_trait]
impl Destination for StdoutDestination {
    async fn migration_complete(&self, installation: &Installation) -> Result<(), DestinationError> {
        let record = CompletionRecord {
            event: "migration_complete",
            installation_id: installation.installation_id,
            destination_host: &installation.destination_host,
        };
        let line = serde_json::to_string(&record).map_err(|e| DestinationError::new(e.to_string()))?;
        println!("{line}");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.overrides)?;
    telemetry::init_tracing(&config).context("initializing logging")?;
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Command::Run { state_dir, seed } => run(&config, &state_dir, &seed).await,
        Command::Status {
            state_dir,
            installation_id,
            destination_host,
        } => status(&state_dir, installation_id, destination_host).await,
    }
}

fn load_config(overrides: &Overrides) -> Result<SyncConfig> {
    let mut config = SyncConfig::from_env().context("reading BACKFILL_* environment")?;
    if let Some(page_size) = overrides.page_size {
        config.page_size = page_size;
    }
    if let Some(concurrency) = overrides.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(log_level) = &overrides.log_level {
        config.log_level = log_level.clone();
    }
    if let Some(log_format) = &overrides.log_format {
        config.log_format = log_format.clone();
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn run(config: &SyncConfig, state_dir: &Path, seed_path: &Path) -> Result<()> {
    let raw = tokio::fs::read(seed_path)
        .await
        .with_context(|| format!("reading seed file {}", seed_path.display()))?;
    let seed: Seed = serde_json::from_slice(&raw)
        .with_context(|| format!("parsing seed file {}", seed_path.display()))?;

    let installation = Installation::new(
        InstallationId::new(seed.installation_id),
        DestinationHost::new(seed.destination_host.clone()),
    );
    let repositories: Vec<Repository> = seed.repositories.iter().map(SeedRepository::repository).collect();

    // 種類ごとに別の source（本番なら PR / branch / commit の API クライアント）
    let mut catalog = TaskCatalog::builder();
    for kind in TaskKind::ALL {
        let source = seed.repositories.iter().fold(InMemorySource::new(), |source, repo| {
            source.with_items(RepositoryId::new(repo.id), repo.items(kind).iter().cloned())
        });
        catalog = catalog.register(kind, Arc::new(source))?;
    }
    let catalog = catalog.build()?;

    let store = JsonFileSubscriptionStore::open(state_dir)
        .await
        .with_context(|| format!("opening state dir {}", state_dir.display()))?;
    tracing::info!(state_dir = %store.dir().display(), "subscription store opened");
    let store: Arc<dyn SubscriptionStore> = Arc::new(store);
    let queue = Arc::new(InMemoryJobQueue::new(
        Arc::new(DefaultDecider::new(config.retry.clone())),
        Arc::new(SystemClock),
    ));
    let orchestrator = Arc::new(
        SyncOrchestrator::new(
            Arc::clone(&store),
            catalog,
            queue.clone(),
            Arc::new(StdoutDestination),
        )
        .with_page_size(config.page_size),
    );
    let pool = WorkerPool::spawn(
        config.concurrency,
        queue.clone(),
        Arc::clone(&orchestrator),
        InstallationLimiter::new(),
    );

    let outcome = drive(&orchestrator, &queue, &installation, repositories, seed.delivery).await;

    queue.close().await;
    pool.shutdown_and_join().await;

    let report = status_report(
        store.as_ref(),
        queue.as_ref(),
        &installation.destination_host,
        installation.installation_id,
    )
    .await?;
    tracing::info!(report = %serde_json::to_string(&report)?, "final status");
    outcome
}

/// Keep triggering the installation until nothing is pending. A chain of
/// jobs stops when one (repository, task) walk finishes, so the next walk
/// needs a new trigger. Gives up as soon as any job is dead-lettered, whether
/// or not the queue kept its record.
async fn drive(
    orchestrator: &SyncOrchestrator,
    queue: &InMemoryJobQueue,
    installation: &Installation,
    repositories: Vec<Repository>,
    delivery: DeliveryOptions,
) -> Result<()> {
    let mut kicked = orchestrator
        .start_sync(installation, repositories, delivery)
        .await?;

    while kicked.is_some() {
        let dead_before = queue.counts().await.dead_lettered;
        loop {
            let counts = queue.counts().await;
            if counts.outstanding() == 0 {
                if counts.dead_lettered > dead_before {
                    bail!("a sync job was dead-lettered; see the log for the error");
                }
                break;
            }
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::warn!("interrupted, shutting down");
                    return Ok(());
                }
                _ = sleep(Duration::from_millis(50)) => {}
            }
        }
        let cleaned = queue.clean(Duration::from_secs(60)).await;
        if cleaned > 0 {
            tracing::debug!(cleaned, "old job records dropped");
        }
        kicked = orchestrator
            .start_sync(installation, Vec::new(), delivery)
            .await?;
    }
    Ok(())
}

/// Stored progress only: the queue lives inside a `run` process, so there
/// is nothing to report about it here.
async fn status(state_dir: &Path, installation_id: u64, destination_host: String) -> Result<()> {
    let store = JsonFileSubscriptionStore::open(state_dir)
        .await
        .with_context(|| format!("opening state dir {}", state_dir.display()))?;
    let host = DestinationHost::new(destination_host);
    let Some(subscription) = store.load(&host, InstallationId::new(installation_id)).await? else {
        bail!("no subscription for installation {installation_id} on {host}");
    };
    let progress = InstallationProgress::of(&subscription);
    println!("{}", serde_json::to_string_pretty(&progress)?);
    Ok(())
}
