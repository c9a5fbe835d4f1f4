use ambmon_timeline::{ApplicationGroup, UpstreamInstance, DEFAULT_PORT};

/// A single value attached to a configuration key.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Number(f64),
    Boolean(bool),
}

impl ConfigValue {
    fn kind(&self) -> &'static str {
        match self {
            ConfigValue::String(_) => "string",
            ConfigValue::Number(_) => "number",
            ConfigValue::Boolean(_) => "boolean",
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Number(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Number(value as f64)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Boolean(value)
    }
}

/// Node of the hierarchical key/value configuration tree.
///
/// A node carries zero or more values and zero or more child blocks; keys may
/// repeat among siblings.
///
/// # Examples
///
/// ```
/// use ambmon_collector::config::{load, ConfigItem};
///
/// let root = ConfigItem::new("Plugin")
///     .with_value("Hostname", "ams.local")
///     .with_child(
///         ConfigItem::new("App")
///             .with_value("AppId", "HOST")
///             .with_values("Hostnames", ["h1", "h2"])
///             .with_values("MetricNames", ["cpu_user"]),
///     );
///
/// let config = load(&root).unwrap();
/// assert_eq!(config.upstream.hostname, "ams.local");
/// assert_eq!(config.upstream.port, 6188);
/// assert_eq!(config.groups[0].hostnames(), ["h1", "h2"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigItem {
    pub key: String,
    pub values: Vec<ConfigValue>,
    pub children: Vec<ConfigItem>,
}

impl ConfigItem {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    /// Append a child leaf `key` holding one value.
    pub fn with_value(self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.with_values(key, [value])
    }

    /// Append a child leaf `key` holding several values.
    pub fn with_values<V: Into<ConfigValue>>(
        mut self,
        key: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.children.push(ConfigItem {
            key: key.into(),
            values: values.into_iter().map(Into::into).collect(),
            children: Vec::new(),
        });
        self
    }

    pub fn with_child(mut self, child: ConfigItem) -> Self {
        self.children.push(child);
        self
    }

    fn is(&self, key: &str) -> bool {
        self.key.eq_ignore_ascii_case(key)
    }

    fn first_value(&self) -> Result<&ConfigValue, ConfigError> {
        self.values.first().ok_or_else(|| ConfigError::MissingValue {
            key: self.key.clone(),
        })
    }

    fn first_string(&self) -> Result<&str, ConfigError> {
        match self.first_value()? {
            ConfigValue::String(s) => Ok(s.as_str()),
            other => Err(self.wrong_type("string", other)),
        }
    }

    /// All values as strings. A key with no values yields an empty list.
    fn strings(&self) -> Result<Vec<&str>, ConfigError> {
        self.values
            .iter()
            .map(|value| match value {
                ConfigValue::String(s) => Ok(s.as_str()),
                other => Err(self.wrong_type("string", other)),
            })
            .collect()
    }

    fn port(&self) -> Result<u16, ConfigError> {
        let number = match self.first_value()? {
            ConfigValue::Number(n) => *n,
            other => return Err(self.wrong_type("number", other)),
        };
        if number.fract() != 0.0 || !(1.0..=f64::from(u16::MAX)).contains(&number) {
            return Err(ConfigError::InvalidPort(number));
        }
        Ok(number as u16)
    }

    fn wrong_type(&self, expected: &'static str, found: &ConfigValue) -> ConfigError {
        ConfigError::WrongType {
            key: self.key.clone(),
            expected,
            found: found.kind(),
        }
    }
}

/// Configuration failures. Any of these keeps the poll cycle from starting.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration key {key} has no value")]
    MissingValue { key: String },

    #[error("Configuration key {key} expects a {expected}, found a {found}")]
    WrongType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Invalid port {0}: expected an integer between 1 and 65535")]
    InvalidPort(f64),

    #[error("App block is missing AppId")]
    MissingAppId,

    #[error("Upstream hostname is not configured")]
    MissingHostname,
}

/// Upstream endpoint plus the application groups to poll on it.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorConfig {
    pub upstream: UpstreamInstance,
    pub groups: Vec<ApplicationGroup>,
}

/// Read the upstream instance and its application groups from `root`'s
/// children.
///
/// Keys are matched case-insensitively and unknown keys are ignored. The
/// upstream `Hostname` must be present and non-empty; `Port` defaults to 6188.
///
/// # Errors
///
/// Returns [`ConfigError`] if `Hostname`, `Port` or `AppId` carries no value,
/// a recognized key holds a value of the wrong type, an `App` block has no
/// `AppId`, or no hostname is set. `Hostnames` or `MetricNames` without
/// values leave the group inert.
pub fn load(root: &ConfigItem) -> Result<CollectorConfig, ConfigError> {
    let mut hostname: Option<String> = None;
    let mut port = DEFAULT_PORT;
    let mut groups = Vec::new();

    for item in &root.children {
        if item.is("hostname") {
            hostname = Some(item.first_string()?.to_string());
        } else if item.is("port") {
            port = item.port()?;
        } else if item.is("app") {
            groups.push(load_group(item)?);
        } else {
            tracing::debug!(key = %item.key, "Ignoring unknown configuration key");
        }
    }

    let hostname = hostname
        .filter(|h| !h.trim().is_empty())
        .ok_or(ConfigError::MissingHostname)?;

    Ok(CollectorConfig {
        upstream: UpstreamInstance::new(hostname, port),
        groups,
    })
}

fn load_group(block: &ConfigItem) -> Result<ApplicationGroup, ConfigError> {
    let mut app_id: Option<String> = None;
    let mut hostnames = Vec::new();
    let mut metric_names = Vec::new();

    for item in &block.children {
        if item.is("appid") {
            app_id = Some(item.first_string()?.to_string());
        } else if item.is("hostnames") {
            hostnames.extend(item.strings()?);
        } else if item.is("metricnames") {
            metric_names.extend(item.strings()?);
        } else {
            tracing::debug!(key = %item.key, "Ignoring unknown app configuration key");
        }
    }

    let mut group = ApplicationGroup::new(app_id.ok_or(ConfigError::MissingAppId)?);
    for hostname in hostnames {
        group.add_hostname(hostname);
    }
    for metric_name in metric_names {
        group.add_metric_name(metric_name);
    }
    Ok(group)
}
