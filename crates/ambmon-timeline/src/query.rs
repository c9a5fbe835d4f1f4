use crate::{ApplicationGroup, UpstreamInstance};
use ambmon_common::types::TimeWindow;

const TIMELINE_PATH: &str = "/ws/v1/timeline/metrics";

/// Build the timeline query URL for one application group.
///
/// Every call starts from the fixed template, so no substitution made for one
/// group can leak into the URL of another. Host and metric names are joined
/// with `,` in configured order and passed through unencoded. `startTime` and
/// `endTime` are epoch milliseconds even though `precision=seconds` is
/// requested; the upstream accepts this pairing.
///
/// # Examples
///
/// ```
/// use ambmon_common::types::TimeWindow;
/// use ambmon_timeline::{query::build_query, ApplicationGroup, UpstreamInstance};
///
/// let upstream = UpstreamInstance::new("ams.local", 6188);
/// let mut group = ApplicationGroup::new("HOST");
/// group.add_hostname("h1");
/// group.add_metric_name("cpu_user");
/// let window = TimeWindow { start_millis: 1000, end_millis: 2000 };
///
/// assert_eq!(
///     build_query(&upstream, &group, &window),
///     "http://ams.local:6188/ws/v1/timeline/metrics?metricNames=cpu_user&hostname=h1\
///      &appId=HOST&precision=seconds&startTime=1000&endTime=2000"
/// );
/// ```
pub fn build_query(
    upstream: &UpstreamInstance,
    group: &ApplicationGroup,
    window: &TimeWindow,
) -> String {
    format!(
        "http://{host}:{port}{path}?metricNames={metrics}&hostname={hosts}&appId={app_id}\
         &precision=seconds&startTime={start}&endTime={end}",
        host = upstream.hostname,
        port = upstream.port,
        path = TIMELINE_PATH,
        metrics = group.metric_names().join(","),
        hosts = group.hostnames().join(","),
        app_id = group.app_id,
        start = window.start_millis,
        end = window.end_millis,
    )
}
