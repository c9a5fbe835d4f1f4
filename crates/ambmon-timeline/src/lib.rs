//! Client for the Ambari Metrics timeline API.
//!
//! Builds time-windowed queries for an [`ApplicationGroup`], fetches them
//! from an [`UpstreamInstance`] and decodes the per-host, per-metric series
//! into [`Sample`](ambmon_common::types::Sample)s.

pub mod decode;
pub mod error;
pub mod fetch;
pub mod query;

use serde::{Deserialize, Serialize};

pub const DEFAULT_HOSTNAME: &str = "localhost";
pub const DEFAULT_PORT: u16 = 6188;

/// One timeline API endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamInstance {
    pub hostname: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl UpstreamInstance {
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
        }
    }
}

impl Default for UpstreamInstance {
    fn default() -> Self {
        Self::new(DEFAULT_HOSTNAME, DEFAULT_PORT)
    }
}

/// Hosts and metric names polled together under one application id.
///
/// Both lists behave as insertion-ordered sets: a name added twice is kept
/// once, at its first position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationGroup {
    pub app_id: String,
    #[serde(default)]
    hostnames: Vec<String>,
    #[serde(default)]
    metric_names: Vec<String>,
}

impl ApplicationGroup {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            ..Default::default()
        }
    }

    pub fn add_hostname(&mut self, hostname: impl Into<String>) {
        push_unique(&mut self.hostnames, hostname.into());
    }

    pub fn add_metric_name(&mut self, metric_name: impl Into<String>) {
        push_unique(&mut self.metric_names, metric_name.into());
    }

    pub fn hostnames(&self) -> &[String] {
        &self.hostnames
    }

    pub fn metric_names(&self) -> &[String] {
        &self.metric_names
    }

    /// A group missing hosts or metric names produces no query.
    pub fn is_inert(&self) -> bool {
        self.hostnames.is_empty() || self.metric_names.is_empty()
    }
}

fn push_unique(items: &mut Vec<String>, item: String) {
    if !items.contains(&item) {
        items.push(item);
    }
}
