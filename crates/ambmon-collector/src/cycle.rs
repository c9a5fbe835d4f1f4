use crate::config::CollectorConfig;
use crate::Sink;
use ambmon_common::types::{SlidingWindow, TimeWindow, ValueList};
use ambmon_timeline::decode::decode;
use ambmon_timeline::error::{DecodeError, FetchError};
use ambmon_timeline::fetch::Fetcher;
use ambmon_timeline::query::build_query;
use ambmon_timeline::{ApplicationGroup, UpstreamInstance};
use chrono::Utc;
use std::sync::Arc;

/// Why a group contributed nothing this cycle.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
}

/// What happened to one application group during a cycle.
#[derive(Debug)]
pub enum GroupOutcome {
    /// No hosts or no metric names configured; nothing was fetched.
    Skipped { app_id: String },
    /// Samples were decoded and handed to the sink. `sink_failures` counts
    /// records the sink rejected.
    Dispatched {
        app_id: String,
        samples: usize,
        sink_failures: usize,
    },
    Failed { app_id: String, error: CollectError },
}

impl GroupOutcome {
    pub fn app_id(&self) -> &str {
        match self {
            GroupOutcome::Skipped { app_id }
            | GroupOutcome::Dispatched { app_id, .. }
            | GroupOutcome::Failed { app_id, .. } => app_id,
        }
    }
}

/// Result of one pass over every application group.
#[derive(Debug)]
pub struct CycleReport {
    /// Interval queried for every group this cycle.
    pub window: TimeWindow,
    /// One entry per configured group, in configured order.
    pub outcomes: Vec<GroupOutcome>,
    /// Window to pass into the next cycle.
    pub next_window: SlidingWindow,
}

impl CycleReport {
    pub fn dispatched(&self) -> usize {
        self.outcomes
            .iter()
            .map(|outcome| match outcome {
                GroupOutcome::Dispatched { samples, .. } => *samples,
                _ => 0,
            })
            .sum()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome, GroupOutcome::Skipped { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome, GroupOutcome::Failed { .. }))
            .count()
    }
}

/// Polls every configured application group once per call to [`run`].
///
/// Groups are processed strictly in configured order. A failing group never
/// affects the others, and the window always advances after the last group.
///
/// [`run`]: PollCycle::run
pub struct PollCycle {
    upstream: UpstreamInstance,
    groups: Vec<ApplicationGroup>,
    fetcher: Arc<dyn Fetcher>,
}

impl PollCycle {
    pub fn new(config: CollectorConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            upstream: config.upstream,
            groups: config.groups,
            fetcher,
        }
    }

    pub fn upstream(&self) -> &UpstreamInstance {
        &self.upstream
    }

    pub fn groups(&self) -> &[ApplicationGroup] {
        &self.groups
    }

    /// Run one cycle against `window` and return the window for the next one.
    pub async fn run(&self, window: SlidingWindow, sink: &dyn Sink) -> CycleReport {
        let time_window = window.snapshot(Utc::now().timestamp_millis());
        let mut outcomes = Vec::with_capacity(self.groups.len());

        for group in &self.groups {
            let app_id = group.app_id.clone();

            if group.is_inert() {
                tracing::debug!(app_id = %app_id, "Skipping app without hostnames or metric names");
                outcomes.push(GroupOutcome::Skipped { app_id });
                continue;
            }

            match self.poll_group(group, &time_window, sink).await {
                Ok((samples, sink_failures)) => {
                    tracing::debug!(app_id = %app_id, samples, sink_failures, "App polled");
                    outcomes.push(GroupOutcome::Dispatched {
                        app_id,
                        samples,
                        sink_failures,
                    });
                }
                Err(error) => {
                    tracing::warn!(app_id = %app_id, error = %error, "Failed to poll app");
                    outcomes.push(GroupOutcome::Failed { app_id, error });
                }
            }
        }

        let next_window = window.advance(Utc::now().timestamp_millis());
        let report = CycleReport {
            window: time_window,
            outcomes,
            next_window,
        };

        tracing::info!(
            groups = report.outcomes.len(),
            skipped = report.skipped(),
            failed = report.failed(),
            samples = report.dispatched(),
            start_ms = time_window.start_millis,
            end_ms = time_window.end_millis,
            "Poll cycle complete"
        );

        report
    }

    /// Fetch, decode and dispatch one group. Returns the number of samples
    /// decoded and how many of them the sink rejected.
    async fn poll_group(
        &self,
        group: &ApplicationGroup,
        window: &TimeWindow,
        sink: &dyn Sink,
    ) -> Result<(usize, usize), CollectError> {
        let url = build_query(&self.upstream, group, window);
        tracing::debug!(app_id = %group.app_id, url = %url, "Querying timeline");

        let body = self.fetcher.fetch(&url).await?;
        let samples = decode(&body, &group.app_id)?;

        let total = samples.len();
        let mut sink_failures = 0;
        for sample in samples {
            if let Err(e) = sink.dispatch(ValueList::from(sample)) {
                sink_failures += 1;
                tracing::warn!(
                    app_id = %group.app_id,
                    sink = sink.name(),
                    error = %e,
                    "Failed to dispatch sample"
                );
            }
        }

        Ok((total, sink_failures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use ambmon_common::types::WINDOW_BACKOFF_MILLIS;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers by app id; `None` simulates a transport failure.
    struct MockFetcher {
        responses: Vec<(&'static str, Option<&'static str>)>,
        urls: Mutex<Vec<String>>,
    }

    impl MockFetcher {
        fn new(responses: Vec<(&'static str, Option<&'static str>)>) -> Arc<Self> {
            Arc::new(Self {
                responses,
                urls: Mutex::new(Vec::new()),
            })
        }

        fn urls(&self) -> Vec<String> {
            self.urls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetcher for MockFetcher {
        async fn fetch(&self, url: &str) -> ambmon_timeline::error::Result<String> {
            self.urls.lock().unwrap().push(url.to_string());
            let (_, body) = self
                .responses
                .iter()
                .find(|(app_id, _)| url.contains(&format!("appId={app_id}&")))
                .expect("unexpected query");
            body.map(str::to_string).ok_or_else(|| {
                FetchError::Client("connection refused".to_string())
            })
        }
    }

    struct RejectingSink;

    impl Sink for RejectingSink {
        fn name(&self) -> &str {
            "rejecting"
        }

        fn dispatch(&self, _values: ValueList) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("sink full"))
        }
    }

    fn group(app_id: &str, hosts: &[&str], metrics: &[&str]) -> ApplicationGroup {
        let mut group = ApplicationGroup::new(app_id);
        for host in hosts {
            group.add_hostname(*host);
        }
        for metric in metrics {
            group.add_metric_name(*metric);
        }
        group
    }

    fn cycle(groups: Vec<ApplicationGroup>, fetcher: Arc<MockFetcher>) -> PollCycle {
        PollCycle::new(
            CollectorConfig {
                upstream: UpstreamInstance::new("ams", 6188),
                groups,
            },
            fetcher,
        )
    }

    const HOST_PAYLOAD: &str = r#"{"metrics": [
        {"hostname": "h1", "metricname": "cpu", "metrics": {"1000": 0.5, "2000": 0.7}}
    ]}"#;
    const DATANODE_PAYLOAD: &str = r#"{"metrics": [
        {"hostname": "dn1", "metricname": "bytes", "metrics": {"3000": 10}},
        {"hostname": "dn2", "metricname": "bytes", "metrics": {"3000": 20}}
    ]}"#;

    #[tokio::test]
    async fn should_fetch_once_per_active_group_and_skip_inert_ones() {
        let fetcher = MockFetcher::new(vec![
            ("HOST", Some(HOST_PAYLOAD)),
            ("datanode", Some(DATANODE_PAYLOAD)),
        ]);
        let poll = cycle(
            vec![
                group("HOST", &["h1"], &["cpu"]),
                group("no-hosts", &[], &["cpu"]),
                group("no-metrics", &["h1"], &[]),
                group("datanode", &["dn1", "dn2"], &["bytes"]),
            ],
            fetcher.clone(),
        );
        let sink = MemorySink::new();

        let report = poll.run(SlidingWindow::now(), &sink).await;

        assert_eq!(fetcher.urls().len(), 2);
        assert_eq!(report.skipped(), 2);
        assert_eq!(report.failed(), 0);
        assert_eq!(report.dispatched(), 4);
        let order: Vec<&str> = report.outcomes.iter().map(GroupOutcome::app_id).collect();
        assert_eq!(order, vec!["HOST", "no-hosts", "no-metrics", "datanode"]);
    }

    #[tokio::test]
    async fn should_dispatch_records_in_decode_order() {
        let fetcher = MockFetcher::new(vec![("datanode", Some(DATANODE_PAYLOAD))]);
        let poll = cycle(vec![group("datanode", &["dn1", "dn2"], &["bytes"])], fetcher);
        let sink = MemorySink::new();

        poll.run(SlidingWindow::now(), &sink).await;

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].host, "dn1");
        assert_eq!(records[1].host, "dn2");
        assert!(records.iter().all(|r| r.plugin == "datanode"));
        assert!(records.iter().all(|r| r.type_name == "records"));
        assert!(records.iter().all(|r| r.type_instance == "bytes"));
        assert_eq!(records[1].values, vec![20.0]);
    }

    #[tokio::test]
    async fn should_continue_with_next_group_when_fetch_fails() {
        let fetcher = MockFetcher::new(vec![("broken", None), ("HOST", Some(HOST_PAYLOAD))]);
        let poll = cycle(
            vec![
                group("broken", &["b1"], &["cpu"]),
                group("HOST", &["h1"], &["cpu"]),
            ],
            fetcher.clone(),
        );
        let sink = MemorySink::new();

        let report = poll.run(SlidingWindow::now(), &sink).await;

        assert_eq!(fetcher.urls().len(), 2);
        assert!(matches!(
            report.outcomes[0],
            GroupOutcome::Failed {
                error: CollectError::Fetch(_),
                ..
            }
        ));
        assert!(matches!(
            report.outcomes[1],
            GroupOutcome::Dispatched { samples: 2, .. }
        ));
        assert_eq!(sink.records().len(), 2);
    }

    #[tokio::test]
    async fn should_continue_with_next_group_when_decode_fails() {
        let fetcher = MockFetcher::new(vec![
            ("garbled", Some("<html>gateway timeout</html>")),
            ("HOST", Some(HOST_PAYLOAD)),
        ]);
        let poll = cycle(
            vec![
                group("garbled", &["g1"], &["cpu"]),
                group("HOST", &["h1"], &["cpu"]),
            ],
            fetcher,
        );
        let sink = MemorySink::new();

        let report = poll.run(SlidingWindow::now(), &sink).await;

        assert!(matches!(
            report.outcomes[0],
            GroupOutcome::Failed {
                error: CollectError::Decode(_),
                ..
            }
        ));
        assert_eq!(report.dispatched(), 2);
        assert!(sink.records().iter().all(|r| r.plugin == "HOST"));
    }

    #[tokio::test]
    async fn should_query_each_group_with_its_own_values() {
        let fetcher = MockFetcher::new(vec![
            ("HOST", Some(HOST_PAYLOAD)),
            ("datanode", Some(DATANODE_PAYLOAD)),
        ]);
        let poll = cycle(
            vec![
                group("HOST", &["h1"], &["cpu"]),
                group("datanode", &["dn1", "dn2"], &["bytes"]),
            ],
            fetcher.clone(),
        );

        poll.run(SlidingWindow::now(), &MemorySink::new()).await;

        let urls = fetcher.urls();
        assert!(urls[0].contains("metricNames=cpu&hostname=h1&appId=HOST&"));
        assert!(urls[1].contains("metricNames=bytes&hostname=dn1,dn2&appId=datanode&"));
    }

    #[tokio::test]
    async fn should_query_window_from_given_start_to_now() {
        let fetcher = MockFetcher::new(vec![("HOST", Some(HOST_PAYLOAD))]);
        let poll = cycle(vec![group("HOST", &["h1"], &["cpu"])], fetcher.clone());
        let window = SlidingWindow::starting_before(1_000_000);

        let before = Utc::now().timestamp_millis();
        let report = poll.run(window, &MemorySink::new()).await;

        assert_eq!(report.window.start_millis, 1_000_000 - WINDOW_BACKOFF_MILLIS);
        assert!(report.window.end_millis >= before);
        assert!(fetcher.urls()[0].contains("&startTime=940000&"));
        assert!(fetcher.urls()[0].ends_with(&format!("&endTime={}", report.window.end_millis)));
    }

    #[tokio::test]
    async fn should_advance_window_to_backoff_before_cycle_end_regardless_of_failures() {
        let fetcher = MockFetcher::new(vec![("broken", None)]);
        let poll = cycle(vec![group("broken", &["b1"], &["cpu"])], fetcher);

        let report = poll
            .run(SlidingWindow::starting_before(0), &MemorySink::new())
            .await;
        let after = Utc::now().timestamp_millis();

        let next_start = report.next_window.start_millis();
        assert_eq!(report.failed(), 1);
        assert!(next_start >= report.window.end_millis - WINDOW_BACKOFF_MILLIS);
        assert!(next_start <= after - WINDOW_BACKOFF_MILLIS);
    }

    #[tokio::test]
    async fn should_advance_window_when_no_groups_configured() {
        let poll = cycle(Vec::new(), MockFetcher::new(Vec::new()));
        let before = Utc::now().timestamp_millis();

        let report = poll
            .run(SlidingWindow::starting_before(0), &MemorySink::new())
            .await;

        assert!(report.outcomes.is_empty());
        assert!(report.next_window.start_millis() >= before - WINDOW_BACKOFF_MILLIS);
    }

    #[tokio::test]
    async fn should_count_sink_failures_without_failing_group() {
        let fetcher = MockFetcher::new(vec![("HOST", Some(HOST_PAYLOAD))]);
        let poll = cycle(vec![group("HOST", &["h1"], &["cpu"])], fetcher);

        let report = poll.run(SlidingWindow::now(), &RejectingSink).await;

        assert!(matches!(
            report.outcomes[0],
            GroupOutcome::Dispatched {
                samples: 2,
                sink_failures: 2,
                ..
            }
        ));
    }
}
