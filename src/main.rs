use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;

use livesession::activity::{PlayerActivity, SharedActivity};
use livesession::config::Config;
use livesession::session::{self, events, ChannelSink, RenderSignal, SessionEvent};
use livesession::transport::HttpKeepalive;

/// Live room session controller. Reads JSON transport frames from stdin, one
/// per line, and keeps the upstream heartbeat going while connected.
#[derive(Debug, Parser)]
#[command(name = "livesession", version)]
struct Cli {
    /// Room to keep alive (overrides LIVE_ROOM_ID)
    #[arg(long)]
    room: Option<String>,
    /// Upstream base URL (overrides LIVE_KEEPALIVE_URL)
    #[arg(long)]
    keepalive_url: Option<String>,
    /// Seconds between heartbeats (overrides LIVE_HEARTBEAT_INTERVAL)
    #[arg(long)]
    heartbeat_interval: Option<u64>,
    /// Player state reported to the heartbeat
    #[arg(long, value_enum, default_value_t = PlayerArg::Active)]
    player: PlayerArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PlayerArg {
    NotLoaded,
    Active,
    Ended,
}

impl From<PlayerArg> for PlayerActivity {
    fn from(arg: PlayerArg) -> Self {
        match arg {
            PlayerArg::NotLoaded => PlayerActivity::NotLoaded,
            PlayerArg::Active => PlayerActivity::Active,
            PlayerArg::Ended => PlayerActivity::Ended,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "livesession=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(room) = cli.room {
        config.room_id = room;
    }
    if let Some(url) = cli.keepalive_url {
        config.keepalive_url = url;
    }
    if let Some(secs) = cli.heartbeat_interval.filter(|s| *s > 0) {
        config.session.heartbeat_interval = Duration::from_secs(secs);
    }
    print_banner(&config);

    let mut transport = HttpKeepalive::new(&config.keepalive_url, &config.room_id);
    if let Some(token) = config.auth_token.clone() {
        transport = transport.with_auth_token(token);
    }
    let activity = SharedActivity::new(cli.player.into());
    let (sink, mut render_rx) = ChannelSink::new();

    let (handle, worker) = session::spawn(
        &config.room_id,
        &config.session,
        Arc::new(transport),
        Arc::new(activity),
        Box::new(sink),
    );

    let printer = tokio::spawn(async move {
        while let Some(signal) = render_rx.recv().await {
            match signal {
                RenderSignal::MessageInserted(m) => {
                    println!("[{}] {}: {}", m.seq, m.payload.author, m.payload.content);
                }
                RenderSignal::MessagesEvicted(evicted) => {
                    tracing::debug!("{} message(s) left the buffer", evicted.len());
                }
                RenderSignal::EmptyChanged(is_empty) => {
                    tracing::debug!(is_empty, "buffer empty flag changed");
                }
                RenderSignal::ScrollToBottomRequested => {}
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(text)) => {
                    let Some(event) = events::decode(&text) else {
                        continue;
                    };
                    if handle.dispatch(event).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("failed to read transport frame: {e}");
                    break;
                }
            },
            _ = &mut shutdown => break,
        }
    }

    let _ = handle.dispatch(SessionEvent::Disconnect);
    drop(handle);
    if let Err(e) = worker.await {
        tracing::error!("session worker failed: {e}");
    }
    let _ = printer.await;
}

fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");
    let git_sha = env!("GIT_SHA");
    let capacity = config.session.capacity;

    eprintln!();
    eprintln!("  \x1b[1;36mlivesession\x1b[0m \x1b[2mv{version} ({git_sha})\x1b[0m");
    eprintln!();
    eprintln!("  \x1b[2mroom\x1b[0m         {}", config.room_id);
    eprintln!("  \x1b[2mupstream\x1b[0m     {}", config.keepalive_url);
    eprintln!(
        "  \x1b[2mheartbeat\x1b[0m    every {}s",
        config.session.heartbeat_interval.as_secs()
    );
    eprintln!(
        "  \x1b[2mbuffer\x1b[0m       {} (trim {} -> {})",
        capacity.high_water_mark(),
        capacity.trim_count(),
        capacity.low_water_mark()
    );
    if !config.session.auto_scroll {
        eprintln!("  \x1b[33m! auto scroll disabled\x1b[0m");
    }
    eprintln!();
}

/// Resolves on Ctrl+C, or SIGTERM on unix. A source whose handler cannot be
/// installed is logged and never fires.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::SignalKind;
        match signal::unix::signal(SignalKind::terminate()) {
            Ok(mut sigterm) => tokio::select! {
                _ = ctrl_c() => {}
                _ = sigterm.recv() => tracing::info!("received SIGTERM"),
            },
            Err(e) => {
                tracing::warn!("SIGTERM handler unavailable: {e}");
                ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c().await;
}

async fn ctrl_c() {
    match signal::ctrl_c().await {
        Ok(()) => tracing::info!("received Ctrl+C"),
        Err(e) => {
            tracing::warn!("Ctrl+C handler unavailable: {e}");
            std::future::pending::<()>().await;
        }
    }
}
