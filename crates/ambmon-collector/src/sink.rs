use crate::Sink;
use ambmon_common::types::ValueList;
use anyhow::{anyhow, Context, Result};
use std::io::Write;
use std::sync::Mutex;

/// Emits every record as a structured `tracing` event.
pub struct LogSink;

impl Sink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn dispatch(&self, values: ValueList) -> Result<()> {
        tracing::info!(
            plugin = %values.plugin,
            host = %values.host,
            record_type = %values.type_name,
            type_instance = %values.type_instance,
            time_ms = values.time_millis,
            values = ?values.values,
            "sample"
        );
        Ok(())
    }
}

/// Writes one JSON object per line to the wrapped writer.
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl JsonLinesSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|_| anyhow!("json sink writer lock poisoned"))
    }
}

impl<W: Write + Send> Sink for JsonLinesSink<W> {
    fn name(&self) -> &str {
        "json"
    }

    fn dispatch(&self, values: ValueList) -> Result<()> {
        let line = serde_json::to_string(&values).context("Failed to serialize value list")?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow!("json sink writer lock poisoned"))?;
        writeln!(writer, "{line}").context("Failed to write value list")?;
        writer.flush().context("Failed to flush value list")?;
        Ok(())
    }
}

/// Keeps every dispatched record in memory.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<ValueList>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the records dispatched so far, in arrival order.
    pub fn records(&self) -> Vec<ValueList> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl Sink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn dispatch(&self, values: ValueList) -> Result<()> {
        self.records
            .lock()
            .map_err(|_| anyhow!("memory sink lock poisoned"))?
            .push(values);
        Ok(())
    }
}
