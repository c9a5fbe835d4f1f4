mod config;

use ambmon_collector::plugin::{AmbariPlugin, PluginOptions};
use ambmon_collector::sink::{JsonLinesSink, LogSink};
use ambmon_collector::Sink;
use anyhow::{Context, Result};
use config::{AgentConfig, SinkKind};
use std::sync::Arc;
use tokio::signal;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Log subscriber writing to `make_writer`. The agent passes stderr so the
/// `json` sink owns stdout.
fn log_subscriber<W>(make_writer: W) -> Result<impl tracing::Subscriber + Send + Sync + 'static>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    Ok(tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("ambmon=info".parse()?))
        .with_writer(make_writer)
        .finish())
}

#[tokio::main]
async fn main() -> Result<()> {
    log_subscriber(std::io::stderr)?.init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/agent.toml".to_string());

    let config = AgentConfig::load(&config_path)
        .with_context(|| format!("Failed to load config from {config_path}"))?;

    let sink: Arc<dyn Sink> = match config.sink {
        SinkKind::Log => Arc::new(LogSink),
        SinkKind::Json => Arc::new(JsonLinesSink::stdout()),
    };
    tracing::info!(sink = sink.name(), "ambmon-agent starting");

    let mut plugin = AmbariPlugin::new(
        sink,
        PluginOptions {
            request_timeout: config.request_timeout(),
        },
    );
    plugin
        .configure(&config.plugin_tree())
        .context("Failed to configure plugin")?;

    let mut tick = interval(Duration::from_secs(config.collection_interval_secs));
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        interval_secs = config.collection_interval_secs,
        timeout_secs = config.request_timeout_secs,
        "Starting collection loop"
    );

    loop {
        tokio::select! {
            _ = tick.tick() => {
                if let Err(e) = plugin.read().await {
                    tracing::error!(error = %e, "Poll cycle did not run");
                }
            }
            _ = signal::ctrl_c() => {
                tracing::info!("Shutting down gracefully");
                break;
            }
        }
    }

    plugin.shutdown();
    Ok(())
}
