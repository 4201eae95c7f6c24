use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use adbot::auth::AuthManager;
use adbot::bot::Bot;
use adbot::broadcast::BroadcastManager;
use adbot::channels::{ChannelManager, CliChannel, TelegramChannel};
use adbot::config::BotConfig;
use adbot::dispatch::Dispatcher;
use adbot::store::{JsonFileBackend, SessionStore};
use adbot::transport::{HttpTransport, Transport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = BotConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export BOT_TOKEN=... API_ID=... API_HASH=...");
        std::process::exit(1);
    });

    // Keep the guard alive so buffered file logs are flushed on exit.
    let _log_guard = init_tracing(&config);

    eprintln!("📣 AdBot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Data file: {}", config.data_file.display());
    eprintln!("   Sessions: {}", config.sessions_dir.display());
    eprintln!("   Gateway: {}", config.transport_url);

    let backend = Arc::new(JsonFileBackend::new(&config.data_file));
    let store = Arc::new(SessionStore::open(backend).await?);
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(config.transport_config())?);

    let auth = Arc::new(AuthManager::new(Arc::clone(&store), Arc::clone(&transport)));
    let broadcast = Arc::new(BroadcastManager::new(
        Arc::clone(&store),
        Arc::clone(&transport),
        config.broadcast_config(),
    ));
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&store),
        auth,
        Arc::clone(&broadcast),
    ));

    let mut channels = ChannelManager::new();
    channels.add(Box::new(TelegramChannel::new(config.bot_token.clone())));
    if config.cli_enabled {
        channels.add(Box::new(CliChannel::default()));
    }
    eprintln!("   Channels: {}\n", channels.names().join(", "));

    let resumed = broadcast.resume_all().await?;
    if resumed > 0 {
        eprintln!("   Resumed {resumed} broadcast loop(s)");
    }

    Bot::new(dispatcher, broadcast, channels).run().await?;
    Ok(())
}

/// Console logging filtered by `RUST_LOG` (default `info`), plus a daily
/// file when `ADBOT_LOG_DIR` is set.
fn init_tracing(config: &BotConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = fmt::layer().with_target(false);

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "adbot.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .init();
            None
        }
    }
}
