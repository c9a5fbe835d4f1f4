//! Collection logic for the ambmon agent.
//!
//! The [`cycle::PollCycle`] walks every configured application group,
//! queries the timeline API and forwards each decoded sample to a [`Sink`].
//! [`plugin::AmbariPlugin`] wraps the cycle in the configure / read /
//! shutdown hooks a host scheduler drives.

pub mod config;
pub mod cycle;
pub mod plugin;
pub mod sink;

use ambmon_common::types::ValueList;
use anyhow::Result;

/// Destination for dispatched records.
///
/// A sink receives one [`ValueList`] per decoded sample, in decode order.
/// Dispatch is fire-and-forget: a failed record is logged by the caller and
/// the next one is still delivered.
pub trait Sink: Send + Sync {
    /// Returns the sink name (e.g., `"log"`, `"json"`), used for logging.
    fn name(&self) -> &str;

    /// Records a single value list.
    ///
    /// # Errors
    ///
    /// Returns an error if the record could not be written.
    fn dispatch(&self, values: ValueList) -> Result<()>;
}
