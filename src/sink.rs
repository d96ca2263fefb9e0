//! Seam between the record adapter and the senders.

use crate::{event::EventTime, value::Record};

/// Destination for structured events.
///
/// The log adapter that turns platform records into [`Record`]s talks to the
/// sender through this trait. Implementations must be callable from many
/// threads and must absorb transport failures rather than report them.
pub trait EventSink: Send + Sync {
    /// Forward one event tagged with the sink's prefix plus `tag_suffix`.
    fn emit(&self, tag_suffix: &str, time: EventTime, record: &Record);

    /// Flush what can be flushed and release the connection.
    fn close(&self);
}
