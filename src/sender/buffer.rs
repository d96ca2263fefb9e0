//! Bounded queue of frames awaiting transmission.

use std::collections::VecDeque;

use super::{config::OverflowPolicy, serialise::Frame};

/// FIFO of unsent frames capped by total byte size.
///
/// Total buffered bytes never exceed `limit` after any mutation.
#[derive(Debug)]
pub(crate) struct PendingBuffer {
    frames: VecDeque<Frame>,
    bytes: usize,
    limit: usize,
    policy: OverflowPolicy,
}

impl PendingBuffer {
    pub fn new(limit: usize, policy: OverflowPolicy) -> Self {
        Self {
            frames: VecDeque::new(),
            bytes: 0,
            limit,
            policy,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Append `frame`, applying the overflow policy.
    ///
    /// Returns the number of frames discarded to honour the byte cap, which
    /// may include `frame` itself.
    pub fn push(&mut self, frame: Frame) -> u64 {
        if frame.len() > self.limit {
            return 1;
        }
        let mut dropped = 0;
        while self.bytes + frame.len() > self.limit {
            match self.policy {
                OverflowPolicy::DropNewest => return 1,
                OverflowPolicy::DropOldest => {
                    let Some(oldest) = self.frames.pop_front() else {
                        break;
                    };
                    self.bytes -= oldest.len();
                    dropped += 1;
                }
            }
        }
        self.bytes += frame.len();
        self.frames.push_back(frame);
        dropped
    }

    /// Hand frames to `send` oldest-first, removing each one it accepts.
    ///
    /// Stops at the first frame `send` rejects, leaving it at the head.
    /// Returns `true` when the buffer has been emptied.
    pub fn drain(&mut self, mut send: impl FnMut(&[u8]) -> bool) -> bool {
        while let Some(front) = self.frames.front() {
            if !send(front.as_bytes()) {
                return false;
            }
            if let Some(sent) = self.frames.pop_front() {
                self.bytes -= sent.len();
            }
        }
        true
    }

    /// Discard every buffered frame, returning how many were removed.
    pub fn clear(&mut self) -> u64 {
        let discarded = self.frames.len() as u64;
        self.frames.clear();
        self.bytes = 0;
        discarded
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn frame(fill: u8, len: usize) -> Frame {
        Frame::from(vec![fill; len])
    }

    fn contents(buffer: &mut PendingBuffer) -> Vec<u8> {
        let mut heads = Vec::new();
        buffer.drain(|bytes| {
            heads.push(bytes[0]);
            true
        });
        heads
    }

    #[test]
    fn drop_oldest_evicts_from_the_front() {
        let mut buffer = PendingBuffer::new(10, OverflowPolicy::DropOldest);
        assert_eq!(buffer.push(frame(1, 4)), 0);
        assert_eq!(buffer.push(frame(2, 4)), 0);
        assert_eq!(buffer.push(frame(3, 4)), 1);
        assert_eq!(buffer.bytes(), 8);
        assert_eq!(contents(&mut buffer), [2, 3]);
    }

    #[test]
    fn drop_oldest_evicts_several_for_a_large_frame() {
        let mut buffer = PendingBuffer::new(10, OverflowPolicy::DropOldest);
        for fill in 1..=5 {
            buffer.push(frame(fill, 2));
        }
        assert_eq!(buffer.push(frame(9, 7)), 4);
        assert_eq!(contents(&mut buffer), [5, 9]);
    }

    #[test]
    fn drop_newest_keeps_existing_frames() {
        let mut buffer = PendingBuffer::new(8, OverflowPolicy::DropNewest);
        buffer.push(frame(1, 4));
        buffer.push(frame(2, 4));
        assert_eq!(buffer.push(frame(3, 1)), 1);
        assert_eq!(contents(&mut buffer), [1, 2]);
    }

    #[rstest]
    #[case(OverflowPolicy::DropOldest)]
    #[case(OverflowPolicy::DropNewest)]
    fn oversized_frame_is_rejected_without_evicting(#[case] policy: OverflowPolicy) {
        let mut buffer = PendingBuffer::new(4, policy);
        buffer.push(frame(1, 3));
        assert_eq!(buffer.push(frame(2, 5)), 1);
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.bytes(), 3);
    }

    #[test]
    fn drain_stops_at_first_failure_and_keeps_order() {
        let mut buffer = PendingBuffer::new(100, OverflowPolicy::DropOldest);
        for fill in 1..=4 {
            buffer.push(frame(fill, 1));
        }
        let mut sent = Vec::new();
        let emptied = buffer.drain(|bytes| {
            if bytes[0] == 3 {
                return false;
            }
            sent.push(bytes[0]);
            true
        });
        assert!(!emptied);
        assert_eq!(sent, [1, 2]);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.bytes(), 2);
        assert_eq!(contents(&mut buffer), [3, 4]);
    }

    #[test]
    fn bytes_never_exceed_limit_under_sustained_overflow() {
        let mut buffer = PendingBuffer::new(50, OverflowPolicy::DropOldest);
        let mut dropped = 0;
        for n in 0..200u8 {
            dropped += buffer.push(frame(n, usize::from(n % 7) + 1));
            assert!(buffer.bytes() <= 50);
        }
        assert!(dropped > 0);
        assert_eq!(contents(&mut buffer).last(), Some(&199));
    }

    #[test]
    fn clear_reports_discarded_frames() {
        let mut buffer = PendingBuffer::new(100, OverflowPolicy::DropOldest);
        buffer.push(frame(1, 10));
        buffer.push(frame(2, 10));
        assert_eq!(buffer.clear(), 2);
        assert!(buffer.is_empty());
        assert_eq!(buffer.bytes(), 0);
    }
}
