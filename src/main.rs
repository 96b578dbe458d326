mod cache;
mod config;
mod db;
mod event;
mod logging;
mod net;
mod queue;
mod worker;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use cache::{AssetCache, SqliteStorage};
use db::Database;
use event::{EventHandler, EventOutcome, WorkerEvent};
use net::{HttpClient, Request};
use queue::OfflineQueue;
use worker::{classify, ServiceWorker};

type Worker = ServiceWorker<SqliteStorage, HttpClient>;

#[derive(Parser, Debug)]
#[command(name = "quiz-sw")]
#[command(about = "Offline worker for the quiz app: asset cache, request queue and background sync")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/quiz-sw/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
  /// Fetch and cache the install-time assets
  Install,
  /// Evict stale cache generations (installing first if needed)
  Activate,
  /// Send a request through the worker
  Fetch {
    /// Absolute URL or path relative to the origin
    url: String,
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,
    /// Request header as 'Name: value'; repeatable
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,
    /// Request body
    #[arg(short, long)]
    data: Option<String>,
  },
  /// Replay queued requests
  Sync {
    #[arg(long)]
    tag: Option<String>,
  },
  /// List queued requests
  Queue,
  /// Watch connectivity and sync whenever it returns
  Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let config = config::Config::load(args.config.as_deref())?;
  let _log_guard = logging::init(config.log_file.as_deref())?;

  let db = Arc::new(Database::open(&config.database_path()?)?);
  let network = Arc::new(HttpClient::new(&config)?);
  let cache = AssetCache::new(SqliteStorage::new(Arc::clone(&db)), &config)?;
  let queue = OfflineQueue::new(Arc::clone(&db));
  let worker = ServiceWorker::new(&config, cache, queue.clone(), Arc::clone(&network));

  match args.command {
    Commands::Install => {
      worker.dispatch(WorkerEvent::Install).await?;
      println!("installed {}", config.cache_name);
    }
    Commands::Activate => {
      if let EventOutcome::Activated { evicted } = worker.start().await? {
        for name in &evicted {
          println!("evicted {}", name);
        }
      }
      println!("active cache: {}", config.cache_name);
    }
    Commands::Fetch {
      url,
      method,
      headers,
      data,
    } => {
      let mut request = Request {
        url: config.resolve(&url)?,
        method: method.to_uppercase(),
        headers: Vec::new(),
        body: data,
      };
      for header in &headers {
        let (name, value) = parse_header(header)?;
        request = request.with_header(name, value);
      }
      fetch(&worker, &config, request).await?;
    }
    Commands::Sync { tag } => {
      worker.start().await?;
      let tag = tag.unwrap_or_else(|| config.sync_tag.clone());
      match worker.dispatch(WorkerEvent::Sync { tag: tag.clone() }).await? {
        EventOutcome::Synced(report) => println!(
          "replayed {}, still queued {}",
          report.replayed.len(),
          report.failed.len()
        ),
        _ => println!("no sync registered for tag '{}'", tag),
      }
    }
    Commands::Queue => {
      for queued in queue.get_all()? {
        println!(
          "{}\t{}\t{} {}\t{} bytes",
          queued.id,
          queued.queued_at.to_rfc3339(),
          queued.method,
          queued.url,
          queued.body.len()
        );
      }
    }
    Commands::Watch => watch(&worker, &config, network).await?,
  }

  Ok(())
}

async fn fetch(worker: &Worker, config: &config::Config, request: Request) -> Result<()> {
  worker.start().await?;
  let kind = classify(&request, &config.mutating_markers);
  info!(url = %request.url, ?kind, "fetching");

  let served = match worker.dispatch(WorkerEvent::Fetch(request)).await? {
    EventOutcome::Response(served) => served,
    other => return Err(eyre!("Unexpected fetch outcome: {:?}", other)),
  };
  worker.settle().await?;

  let response = &served.response;
  eprintln!("{} ({:?})", response.status, served.source);
  for (name, value) in &response.headers {
    eprintln!("{}: {}", name, value);
  }
  println!("{}", response.text());
  Ok(())
}

async fn watch(worker: &Worker, config: &config::Config, network: Arc<HttpClient>) -> Result<()> {
  worker.start().await?;

  let probe = Request::get(config.probe_url()?);
  let interval = Duration::from_secs(config.watch.interval_secs.max(1));
  let mut events = EventHandler::new(network, probe, interval, config.sync_tag.clone());
  info!(interval_secs = interval.as_secs(), "watching connectivity");

  while let Some(event) = events.next().await {
    let kind = event.kind();
    if let Err(e) = worker.dispatch(event).await {
      warn!(event = kind, error = %e, "event failed");
    }
  }
  Ok(())
}

fn parse_header(raw: &str) -> Result<(String, String)> {
  let (name, value) = raw
    .split_once(':')
    .ok_or_else(|| eyre!("Invalid header '{}', expected 'Name: value'", raw))?;
  let name = name.trim();
  if name.is_empty() {
    return Err(eyre!("Invalid header '{}', empty name", raw));
  }
  Ok((name.to_string(), value.trim().to_string()))
}
