mod cache;
mod config;
mod net;
mod worker;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use reqwest::Method;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use url::Url;

use crate::cache::{CacheStorage, MemoryStorage, SqliteStorage};
use crate::config::Config;
use crate::net::{HttpNetwork, Network, Request};
use crate::worker::{
  classify, ClientWindow, Event, Interception, Outcome, RequestClass, SyncKind, Worker,
};

#[derive(Parser, Debug)]
#[command(name = "offline-proxy")]
#[command(about = "Offline-first request interception and cache lifecycle engine")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/offline-proxy/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Write logs to this file instead of stderr
  #[arg(long)]
  log_file: Option<PathBuf>,

  /// Use a throwaway in-memory cache instead of the database
  #[arg(long)]
  in_memory: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Install the current generation, then activate it immediately
  Install,
  /// Delete every generation except the current one
  Activate,
  /// Send a request through the worker and print the response
  Fetch {
    url: Url,
    /// Treat the request as a page navigation
    #[arg(long)]
    navigate: bool,
    #[arg(short = 'X', long, default_value = "GET")]
    method: Method,
    /// Print headers and provenance only
    #[arg(long)]
    head: bool,
  },
  /// List cache generations
  Generations,
  /// List entries of a generation (default: current)
  Entries { generation: Option<String> },
  /// Build the notification for a push payload and print it as JSON
  Push { payload: Option<String> },
  /// Resolve a notification click against open windows (`id=url`)
  Click {
    #[arg(long)]
    action: Option<String>,
    #[arg(long)]
    url: Option<String>,
    #[arg(long = "client", value_parser = parse_client)]
    clients: Vec<ClientWindow>,
  },
  /// Deliver a background sync event
  Sync {
    tag: String,
    #[arg(long)]
    periodic: bool,
  },
}

fn parse_client(s: &str) -> Result<ClientWindow, String> {
  let (id, url) = s
    .split_once('=')
    .ok_or_else(|| format!("expected id=url, got '{}'", s))?;
  Ok(ClientWindow {
    id: id.to_string(),
    url: url.to_string(),
  })
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = init_tracing(args.log_file.as_deref())?;

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;
  let network = Arc::new(HttpNetwork::new(&config)?);

  if args.in_memory {
    run(&config, Arc::new(MemoryStorage::new()), network, args.command).await
  } else {
    let storage = SqliteStorage::open(&config.storage_path()?)?;
    run(&config, Arc::new(storage), network, args.command).await
  }
}

fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
  let filter =
    EnvFilter::try_from_env("OFFLINE_PROXY_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

  match log_file {
    Some(path) => {
      let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
      let name = path
        .file_name()
        .ok_or_else(|| eyre!("Invalid log file path: {}", path.display()))?;

      let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
      Ok(Some(guard))
    }
    None => {
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
      Ok(None)
    }
  }
}

async fn run<S, N>(config: &Config, storage: Arc<S>, network: Arc<N>, command: Command) -> Result<()>
where
  S: CacheStorage + 'static,
  N: Network,
{
  let (tx, mut refreshes) = mpsc::unbounded_channel();
  let worker = Worker::new(config, Arc::clone(&storage), Arc::clone(&network))?
    .with_refresh_observer(tx);

  match command {
    Command::Install => {
      if let Outcome::Installed(report) = worker.dispatch(Event::Install).await? {
        println!(
          "installed {}: {} precached, {} skipped",
          report.generation,
          report.precached.len(),
          report.skipped.len()
        );
        for (url, reason) in &report.skipped {
          println!("  skipped {} ({})", url, reason);
        }
        if report.skip_waiting {
          print_activation(worker.dispatch(Event::Activate).await?);
        }
        println!("worker {}", worker.state());
      }
    }
    Command::Activate => print_activation(worker.dispatch(Event::Activate).await?),
    Command::Fetch {
      url,
      navigate,
      method,
      head,
    } => {
      let request = if navigate {
        Request::navigate(url)
      } else {
        Request::get(url)
      }
      .with_method(method);

      let (response, source) = if worker.intercepts(&request) {
        match worker.dispatch(Event::Fetch(request.clone())).await? {
          Outcome::Fetched(Interception::Respond(served)) => {
            (served.response, served.source.to_string())
          }
          other => return Err(eyre!("Unexpected outcome for fetch: {:?}", other)),
        }
      } else {
        (network.fetch(&request).await?, "passthrough".to_string())
      };

      println!("{} {} ({})", response.status, response.status_text, source);
      if let Some(content_type) = response.header("Content-Type") {
        println!("content-type: {}", content_type);
      }
      if !head {
        println!();
        std::io::stdout()
          .write_all(&response.body)
          .map_err(|e| eyre!("Failed to write body: {}", e))?;
        println!();
      }

      // Let the background refresh land before the process exits
      if classify(&request) == RequestClass::Static {
        let wait = Duration::from_secs(config.network.timeout_secs);
        if let Ok(Some(event)) = tokio::time::timeout(wait, refreshes.recv()).await {
          info!(?event, "Background refresh finished");
        }
      }
    }
    Command::Generations => {
      for name in storage.generations()? {
        let marker = if name == config.generation { "*" } else { " " };
        println!("{} {}", marker, name);
      }
    }
    Command::Entries { generation } => {
      let generation = generation.unwrap_or_else(|| config.generation.clone());
      for entry in storage.entries(&generation)? {
        println!(
          "{} {:>3} {:>8} {} {}",
          entry.cached_at.format("%Y-%m-%d %H:%M:%S"),
          entry.status,
          entry.size,
          entry.key.method,
          entry.key.url
        );
      }
    }
    Command::Push { payload } => {
      if let Outcome::Notify(notification) = worker
        .dispatch(Event::Push(payload.map(String::into_bytes)))
        .await?
      {
        let json = serde_json::to_string_pretty(&notification)
          .map_err(|e| eyre!("Failed to serialize notification: {}", e))?;
        println!("{}", json);
      }
    }
    Command::Click {
      action,
      url,
      clients,
    } => {
      if let Outcome::Click(outcome) = worker
        .dispatch(Event::NotificationClick {
          action,
          url,
          clients,
        })
        .await?
      {
        println!("{:?}", outcome);
      }
    }
    Command::Sync { tag, periodic } => {
      let kind = if periodic {
        SyncKind::Periodic
      } else {
        SyncKind::OneOff
      };
      if let Outcome::Synced(outcome) = worker.dispatch(Event::Sync { kind, tag }).await? {
        println!("{:?}", outcome);
      }
    }
  }

  Ok(())
}

fn print_activation(outcome: Outcome) {
  if let Outcome::Activated(report) = outcome {
    for name in &report.deleted {
      println!("deleted {}", name);
    }
    for (name, reason) in &report.failed {
      println!("failed to delete {} ({})", name, reason);
    }
  }
}
