use ambmon_collector::config::{ConfigItem, ConfigValue};
use ambmon_collector::plugin::PLUGIN_NAME;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Log,
    Json,
}

#[derive(Debug, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_collection_interval")]
    pub collection_interval_secs: u64,
    /// Timeout for each timeline request; 0 disables it
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub sink: SinkKind,
    /// Plugin block handed to the collector as a key/value tree
    #[serde(default)]
    pub ambari: toml::Table,
}

fn default_collection_interval() -> u64 {
    60
}

fn default_request_timeout() -> u64 {
    30
}

impl AgentConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        anyhow::ensure!(
            config.collection_interval_secs > 0,
            "collection_interval_secs must be greater than zero"
        );
        Ok(config)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    /// Convert the `[ambari]` table into the plugin configuration tree.
    ///
    /// Scalars become single values, arrays of scalars become value lists,
    /// tables become child blocks and every table of an array becomes its own
    /// repeated block. Empty arrays are dropped.
    pub fn plugin_tree(&self) -> ConfigItem {
        table_item(PLUGIN_NAME, &self.ambari)
    }
}

fn table_item(key: &str, table: &toml::Table) -> ConfigItem {
    let mut item = ConfigItem::new(key);
    for (child_key, value) in table {
        append(&mut item, child_key, value);
    }
    item
}

fn append(parent: &mut ConfigItem, key: &str, value: &toml::Value) {
    match value {
        toml::Value::Table(table) => parent.children.push(table_item(key, table)),
        toml::Value::Array(items) => {
            let mut leaf = ConfigItem::new(key);
            for item in items {
                match item {
                    toml::Value::Table(table) => parent.children.push(table_item(key, table)),
                    other => collect_scalars(other, &mut leaf.values),
                }
            }
            if !leaf.values.is_empty() {
                parent.children.push(leaf);
            }
        }
        scalar => {
            let mut leaf = ConfigItem::new(key);
            collect_scalars(scalar, &mut leaf.values);
            parent.children.push(leaf);
        }
    }
}

fn collect_scalars(value: &toml::Value, out: &mut Vec<ConfigValue>) {
    match value {
        toml::Value::String(s) => out.push(ConfigValue::String(s.clone())),
        toml::Value::Integer(i) => out.push(ConfigValue::from(*i)),
        toml::Value::Float(f) => out.push(ConfigValue::Number(*f)),
        toml::Value::Boolean(b) => out.push(ConfigValue::Boolean(*b)),
        toml::Value::Datetime(dt) => out.push(ConfigValue::String(dt.to_string())),
        toml::Value::Array(items) => items.iter().for_each(|item| collect_scalars(item, out)),
        // Tables nested inside arrays of scalars carry no values.
        toml::Value::Table(_) => {}
    }
}
