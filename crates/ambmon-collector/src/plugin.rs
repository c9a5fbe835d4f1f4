use crate::config::{load, ConfigError, ConfigItem};
use crate::cycle::{CycleReport, PollCycle};
use crate::Sink;
use ambmon_common::types::SlidingWindow;
use ambmon_timeline::error::FetchError;
use ambmon_timeline::fetch::{Fetcher, HttpFetcher};
use std::sync::Arc;
use std::time::Duration;

/// Name the plugin registers under with its host.
pub const PLUGIN_NAME: &str = "Ambari";

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("Configuration failed: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to initialize HTTP client: {0}")]
    Client(#[from] FetchError),

    #[error("Plugin is not configured")]
    NotConfigured,
}

#[derive(Debug, Clone, Default)]
pub struct PluginOptions {
    /// Per-request timeout for timeline queries. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
}

struct PluginState {
    cycle: PollCycle,
    window: SlidingWindow,
}

/// Adapter between a host scheduler's configure / read / shutdown calls and
/// the [`PollCycle`].
///
/// The sliding window lives here between reads and is threaded through each
/// cycle by value.
pub struct AmbariPlugin {
    sink: Arc<dyn Sink>,
    options: PluginOptions,
    state: Option<PluginState>,
}

impl AmbariPlugin {
    pub fn new(sink: Arc<dyn Sink>, options: PluginOptions) -> Self {
        Self {
            sink,
            options,
            state: None,
        }
    }

    pub fn name(&self) -> &str {
        PLUGIN_NAME
    }

    /// Load `root` and prepare the HTTP client. Replaces any earlier
    /// configuration; on failure the plugin is left unconfigured.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Config`] if the tree is invalid and
    /// [`PluginError::Client`] if the HTTP client cannot be built.
    pub fn configure(&mut self, root: &ConfigItem) -> Result<(), PluginError> {
        self.state = None;
        let fetcher = HttpFetcher::new(self.options.request_timeout)?;
        self.configure_with_fetcher(root, Arc::new(fetcher))?;
        Ok(())
    }

    /// Like [`configure`](Self::configure) with a caller-supplied fetcher.
    pub fn configure_with_fetcher(
        &mut self,
        root: &ConfigItem,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<(), ConfigError> {
        self.state = None;
        let config = match load(root) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(plugin = PLUGIN_NAME, error = %e, "Initialization failed");
                return Err(e);
            }
        };

        tracing::info!(
            plugin = PLUGIN_NAME,
            upstream = %format!("{}:{}", config.upstream.hostname, config.upstream.port),
            apps = config.groups.len(),
            "Plugin configured"
        );

        self.state = Some(PluginState {
            cycle: PollCycle::new(config, fetcher),
            window: SlidingWindow::now(),
        });
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.state.is_some()
    }

    /// Run one poll cycle and keep the advanced window for the next read.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::NotConfigured`] if no configuration has been
    /// loaded. Per-group failures are reported in the [`CycleReport`].
    pub async fn read(&mut self) -> Result<CycleReport, PluginError> {
        let state = self.state.as_mut().ok_or(PluginError::NotConfigured)?;
        let report = state.cycle.run(state.window, self.sink.as_ref()).await;
        state.window = report.next_window;
        Ok(report)
    }

    /// Drop the HTTP client and window state.
    pub fn shutdown(&mut self) {
        if self.state.take().is_some() {
            tracing::info!(plugin = PLUGIN_NAME, "Plugin shut down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigItem;
    use crate::cycle::GroupOutcome;
    use crate::sink::MemorySink;
    use ambmon_common::types::WINDOW_BACKOFF_MILLIS;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    struct StaticFetcher {
        body: &'static str,
        urls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> ambmon_timeline::error::Result<String> {
            self.urls.lock().unwrap().push(url.to_string());
            Ok(self.body.to_string())
        }
    }

    fn fetcher() -> Arc<StaticFetcher> {
        Arc::new(StaticFetcher {
            body: r#"{"metrics": [{"hostname": "h1", "metricname": "cpu", "metrics": {"1000": 0.5}}]}"#,
            urls: Mutex::new(Vec::new()),
        })
    }

    fn tree() -> ConfigItem {
        ConfigItem::new(PLUGIN_NAME)
            .with_value("Hostname", "ams")
            .with_child(
                ConfigItem::new("App")
                    .with_value("AppId", "HOST")
                    .with_values("Hostnames", ["h1"])
                    .with_values("MetricNames", ["cpu"]),
            )
    }

    fn start_time(url: &str) -> i64 {
        url.split("startTime=")
            .nth(1)
            .and_then(|rest| rest.split('&').next())
            .and_then(|s| s.parse().ok())
            .expect("url should carry startTime")
    }

    #[tokio::test]
    async fn should_refuse_to_read_before_configure() {
        let mut plugin = AmbariPlugin::new(Arc::new(MemorySink::new()), PluginOptions::default());
        assert!(matches!(plugin.read().await, Err(PluginError::NotConfigured)));
    }

    #[tokio::test]
    async fn should_never_run_a_cycle_when_hostname_is_missing() {
        let sink = Arc::new(MemorySink::new());
        let fetcher = fetcher();
        let mut plugin = AmbariPlugin::new(sink.clone(), PluginOptions::default());

        let root = ConfigItem::new(PLUGIN_NAME).with_child(
            ConfigItem::new("App")
                .with_value("AppId", "HOST")
                .with_values("Hostnames", ["h1"])
                .with_values("MetricNames", ["cpu"]),
        );
        let err = plugin
            .configure_with_fetcher(&root, fetcher.clone())
            .unwrap_err();

        assert!(matches!(err, ConfigError::MissingHostname));
        assert!(!plugin.is_configured());
        assert!(matches!(plugin.read().await, Err(PluginError::NotConfigured)));
        assert!(fetcher.urls.lock().unwrap().is_empty());
        assert!(sink.records().is_empty());
    }

    #[tokio::test]
    async fn should_initialize_window_one_backoff_before_configure_time() {
        let fetcher = fetcher();
        let mut plugin = AmbariPlugin::new(Arc::new(MemorySink::new()), PluginOptions::default());

        let before = Utc::now().timestamp_millis();
        plugin.configure_with_fetcher(&tree(), fetcher.clone()).unwrap();
        let after = Utc::now().timestamp_millis();

        let report = plugin.read().await.unwrap();
        assert!(report.window.start_millis >= before - WINDOW_BACKOFF_MILLIS);
        assert!(report.window.start_millis <= after - WINDOW_BACKOFF_MILLIS);
    }

    #[tokio::test]
    async fn should_carry_advanced_window_into_next_read() {
        let sink = Arc::new(MemorySink::new());
        let fetcher = fetcher();
        let mut plugin = AmbariPlugin::new(sink.clone(), PluginOptions::default());
        plugin.configure_with_fetcher(&tree(), fetcher.clone()).unwrap();

        let first = plugin.read().await.unwrap();
        let second = plugin.read().await.unwrap();

        assert_eq!(second.window.start_millis, first.next_window.start_millis());
        let urls = fetcher.urls.lock().unwrap().clone();
        assert_eq!(start_time(&urls[1]), first.next_window.start_millis());
        assert!(matches!(
            second.outcomes[0],
            GroupOutcome::Dispatched { samples: 1, .. }
        ));
        assert_eq!(sink.records().len(), 2);
    }

    #[tokio::test]
    async fn should_stop_reading_after_shutdown() {
        let mut plugin = AmbariPlugin::new(Arc::new(MemorySink::new()), PluginOptions::default());
        plugin.configure_with_fetcher(&tree(), fetcher()).unwrap();
        assert!(plugin.is_configured());

        plugin.shutdown();

        assert!(!plugin.is_configured());
        assert!(matches!(plugin.read().await, Err(PluginError::NotConfigured)));
    }

    #[test]
    fn should_build_http_client_when_configuring() {
        let mut plugin = AmbariPlugin::new(
            Arc::new(MemorySink::new()),
            PluginOptions {
                request_timeout: Some(Duration::from_secs(5)),
            },
        );

        plugin.configure(&tree()).expect("configure should succeed");
        assert!(plugin.is_configured());
        assert_eq!(plugin.name(), "Ambari");
    }

    #[test]
    fn should_drop_previous_state_when_reconfigure_fails() {
        let mut plugin = AmbariPlugin::new(Arc::new(MemorySink::new()), PluginOptions::default());
        plugin.configure_with_fetcher(&tree(), fetcher()).unwrap();

        let result = plugin.configure(&ConfigItem::new(PLUGIN_NAME));

        assert!(matches!(
            result,
            Err(PluginError::Config(ConfigError::MissingHostname))
        ));
        assert!(!plugin.is_configured());
    }
}
