use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nowplaying_rpc::discord::DiscordChannel;
use nowplaying_rpc::mpv::{HostEvent, MpvHost};
use nowplaying_rpc::player::MetadataAccessor;
use nowplaying_rpc::presence::{Dispatcher, HostContext};
use nowplaying_rpc::settings::{apply_command, presence_defaults, SettingsStore, SECTION};
use nowplaying_rpc::AppConfig;

const MPV_CONNECT_RETRIES: u32 = 10;
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Show what mpv is playing as Discord Rich Presence.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
  /// Config file (default: <config dir>/nowplaying-rpc/config.json)
  #[arg(long)]
  config: Option<PathBuf>,

  /// mpv IPC socket or pipe, as passed to --input-ipc-server
  #[arg(long)]
  mpv_socket: Option<String>,

  /// Discord application id
  #[arg(long)]
  application_id: Option<String>,

  /// Log filter when RUST_LOG is unset (e.g. "debug")
  #[arg(long)]
  log_level: Option<String>,
}

fn load_config(args: &Args) -> Result<AppConfig> {
  let path = args.config.clone().or_else(AppConfig::default_path);
  let mut config = match &path {
    Some(path) => AppConfig::load(path).with_context(|| format!("Failed to load {}", path.display()))?,
    None => AppConfig::default(),
  };

  if let Some(socket) = &args.mpv_socket {
    config.mpv_socket = socket.clone();
  }
  if let Some(id) = &args.application_id {
    config.application_id = id.clone();
  }
  if let Some(level) = &args.log_level {
    config.log_level = level.clone();
  }
  config.validate()?;
  Ok(config)
}

fn init_logging(level: &str) {
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into()),
    )
    .with(tracing_subscriber::fmt::layer())
    .init();
}

fn open_settings(config: &AppConfig) -> Result<SettingsStore> {
  let path = config.settings_path.clone().or_else(SettingsStore::default_path);
  let store = match path {
    Some(path) => SettingsStore::open(&path)
      .with_context(|| format!("Failed to open settings {}", path.display()))?,
    None => {
      log::warn!("No config directory, settings will not be saved");
      SettingsStore::in_memory()
    }
  };
  store.set_defaults(SECTION, &presence_defaults());
  Ok(store)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
  let args = Args::parse();
  let config = load_config(&args)?;
  init_logging(&config.log_level);

  log::info!("Starting nowplaying-rpc {}", env!("CARGO_PKG_VERSION"));

  let settings = Rc::new(open_settings(&config)?);
  let host = Rc::new(
    MpvHost::connect(&config.mpv_socket, MPV_CONNECT_RETRIES)
      .await
      .with_context(|| format!("Failed to connect to mpv at {}", config.mpv_socket))?,
  );

  let channel = DiscordChannel::new(config.handshake_timeout());
  let dispatcher = Dispatcher::start(
    &channel,
    &config.application_id,
    HostContext {
      player: host.clone(),
      settings: settings.clone(),
      events: host.bus(),
    },
  );
  if host.is_ready() {
    dispatcher.refresh();
  }

  let ctrl_c = tokio::signal::ctrl_c();
  tokio::pin!(ctrl_c);

  loop {
    tokio::select! {
      event = host.pump() => match event {
        Some(HostEvent::Message(args)) => match apply_command(&settings, &args) {
          Ok(true) => log::debug!("Applied {:?}", args),
          Ok(false) => {}
          Err(e) => log::warn!("Ignoring {:?}: {}", args, e),
        },
        Some(HostEvent::Player(_)) => {}
        None => {
          log::info!("mpv closed the connection");
          break;
        }
      },
      _ = &mut ctrl_c => {
        log::info!("Interrupted, shutting down");
        break;
      }
    }
  }

  dispatcher.stop();
  host.close();
  channel.wait_closed(SHUTDOWN_GRACE).await;
  Ok(())
}
