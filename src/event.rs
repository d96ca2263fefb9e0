//! Event timestamps and tag composition.

use std::time::SystemTime;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Serialize, Serializer};

/// MessagePack extension type Fluentd uses for nanosecond timestamps.
pub const EVENT_TIME_EXT_TYPE: i8 = 0;

/// Timestamp attached to an event.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EventTime {
    /// Whole unix seconds, encoded as a MessagePack integer.
    Seconds(i64),
    /// Fractional unix seconds, encoded as a MessagePack float.
    Fractional(f64),
    /// Fluentd `EventTime` extension: seconds plus nanoseconds.
    Precise { seconds: u32, nanos: u32 },
}

impl EventTime {
    /// Current time in whole seconds.
    pub fn now() -> Self {
        Self::Seconds(Utc::now().timestamp())
    }

    /// Current time with nanosecond precision.
    pub fn precise_now() -> Self {
        Self::precise(Utc::now())
    }

    /// Nanosecond-precision time for `at`, clamped to the `u32` second range
    /// the extension format can express.
    pub fn precise<Tz: TimeZone>(at: DateTime<Tz>) -> Self {
        let seconds = at.timestamp().clamp(0, i64::from(u32::MAX)) as u32;
        Self::Precise {
            seconds,
            nanos: at.timestamp_subsec_nanos(),
        }
    }

    /// Whole seconds represented by this time, truncating any fraction.
    pub fn as_seconds(&self) -> i64 {
        match *self {
            Self::Seconds(seconds) => seconds,
            Self::Fractional(seconds) => seconds as i64,
            Self::Precise { seconds, .. } => i64::from(seconds),
        }
    }
}

impl From<i64> for EventTime {
    fn from(seconds: i64) -> Self {
        Self::Seconds(seconds)
    }
}

impl From<i32> for EventTime {
    fn from(seconds: i32) -> Self {
        Self::Seconds(i64::from(seconds))
    }
}

impl From<u32> for EventTime {
    fn from(seconds: u32) -> Self {
        Self::Seconds(i64::from(seconds))
    }
}

impl From<f64> for EventTime {
    fn from(seconds: f64) -> Self {
        Self::Fractional(seconds)
    }
}

impl From<SystemTime> for EventTime {
    fn from(time: SystemTime) -> Self {
        Self::Seconds(DateTime::<Utc>::from(time).timestamp())
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for EventTime {
    fn from(time: DateTime<Tz>) -> Self {
        Self::Seconds(time.timestamp())
    }
}

/// Binary payload serialised as MessagePack `bin` rather than an array.
struct Bin<'a>(&'a [u8]);

impl Serialize for Bin<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(self.0)
    }
}

impl Serialize for EventTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Self::Seconds(seconds) => serializer.serialize_i64(seconds),
            Self::Fractional(seconds) => serializer.serialize_f64(seconds),
            Self::Precise { seconds, nanos } => {
                let mut payload = [0u8; 8];
                payload[..4].copy_from_slice(&seconds.to_be_bytes());
                payload[4..].copy_from_slice(&nanos.to_be_bytes());
                serializer.serialize_newtype_struct(
                    rmp_serde::MSGPACK_EXT_STRUCT_NAME,
                    &(EVENT_TIME_EXT_TYPE, Bin(&payload)),
                )
            }
        }
    }
}

/// Join the sender's prefix and a per-call suffix with a dot.
///
/// An empty suffix yields the bare prefix.
pub(crate) fn compose_tag(prefix: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        return prefix.to_owned();
    }
    let mut tag = String::with_capacity(prefix.len() + suffix.len() + 1);
    tag.push_str(prefix);
    tag.push('.');
    tag.push_str(suffix);
    tag
}

/// Check that a tag prefix is a non-empty run of dot-separated segments
/// without whitespace or control characters.
pub(crate) fn validate_tag_prefix(prefix: &str) -> Result<(), String> {
    if prefix.is_empty() {
        return Err("tag prefix must not be empty".into());
    }
    if prefix.split('.').any(str::is_empty) {
        return Err(format!("tag prefix '{prefix}' contains an empty segment"));
    }
    if prefix
        .chars()
        .any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(format!(
            "tag prefix '{prefix}' contains whitespace or control characters"
        ));
    }
    Ok(())
}
