//! MessagePack framing for forwarded events.
//!
//! A frame is the `[tag, time, record]` array of the forward protocol's
//! message mode. Frames are written back-to-back on the stream; the collector
//! recovers boundaries with its incremental decoder, so no length prefix is
//! added.

use std::any::type_name;

use log::warn;

use crate::{event::EventTime, value::Record};

/// Serialised bytes of one event. Immutable once produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame(Box<[u8]>);

impl Frame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Frame {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes.into_boxed_slice())
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

fn write_frame(tag: &str, time: EventTime, record: &Record) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    let mut buf = Vec::with_capacity(64 + tag.len());
    rmp_serde::encode::write(&mut buf, &(tag, time, record))?;
    Ok(buf)
}

/// Encode one event as a MessagePack frame.
///
/// Never fails: if the record cannot be encoded it is replaced by a
/// `{"message": <record type name>}` record and a warning is logged.
pub fn encode(tag: &str, time: EventTime, record: &Record) -> Frame {
    match write_frame(tag, time, record) {
        Ok(buf) => Frame::from(buf),
        Err(err) => {
            warn!("FluentSender could not encode record for tag '{tag}': {err}");
            let fallback = crate::record! { "message" => type_name::<Record>() };
            write_frame(tag, time, &fallback)
                .map(Frame::from)
                .unwrap_or_else(|_| Frame::from(Vec::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::{record, value::Value};

    type Decoded = (String, Value, Record);

    fn decode(frame: &Frame) -> Decoded {
        rmp_serde::from_slice(frame.as_bytes()).expect("decode frame")
    }

    #[test]
    fn encodes_three_element_array() {
        let frame = encode("test.foo", EventTime::Seconds(1), &record! { "bar" => "baz" });
        assert_eq!(frame.as_bytes()[0], 0x93, "fixarray of three expected");
        let (tag, time, body) = decode(&frame);
        assert_eq!(tag, "test.foo");
        assert_eq!(time, Value::Int(1));
        assert_eq!(body, record! { "bar" => "baz" });
    }

    #[rstest]
    #[case(EventTime::Seconds(1_700_000_000), Value::Int(1_700_000_000))]
    #[case(EventTime::Fractional(12.5), Value::Float(12.5))]
    fn encodes_time_variants(#[case] time: EventTime, #[case] expected: Value) {
        let (_, decoded, _) = decode(&encode("t", time, &Record::new()));
        assert_eq!(decoded, expected);
    }

    #[test]
    fn encoding_is_deterministic() {
        let record = record! { "z" => 1, "a" => vec![Value::from("x"), Value::Nil] };
        let first = encode("t", EventTime::Seconds(5), &record);
        let second = encode("t", EventTime::Seconds(5), &record.clone());
        assert_eq!(first, second);
    }

    #[test]
    fn bytes_stay_binary() {
        let record = record! { "raw" => vec![0xffu8, 0xfe] };
        let (_, _, body) = decode(&encode("t", EventTime::Seconds(0), &record));
        assert_eq!(body["raw"], Value::Bytes(vec![0xff, 0xfe]));
    }
}
