//! Worker thread driving a [`FluentSender`] off the caller's thread.

use std::{
    io,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use log::warn;
use once_cell::sync::OnceCell;

use crate::rate_limited_warner::RateLimitedWarner;

use super::{handler::FluentSender, serialise::Frame};

/// Commands processed by the worker thread.
#[derive(Debug)]
pub(crate) enum SenderCommand {
    Frame(Frame),
    Flush(Sender<bool>),
    Shutdown(Sender<()>),
}

/// Instant after which the worker stops writing queued frames.
///
/// Set once when the owner starts closing.
pub(crate) type StopDeadline = Arc<OnceCell<Instant>>;

pub(crate) fn spawn_worker(
    sender: FluentSender,
    capacity: usize,
    stop_at: StopDeadline,
) -> io::Result<(Sender<SenderCommand>, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded(capacity);
    let handle = thread::Builder::new()
        .name(format!("fluent-sender-{}", sender.tag_prefix()))
        .spawn(move || worker_loop(rx, sender, stop_at))?;
    Ok((tx, handle))
}

fn worker_loop(rx: Receiver<SenderCommand>, sender: FluentSender, stop_at: StopDeadline) {
    let past_deadline = || stop_at.get().is_some_and(|at| Instant::now() >= *at);
    let mut discarded = 0u64;
    while let Ok(cmd) = rx.recv() {
        match cmd {
            SenderCommand::Frame(_) if past_deadline() => discarded += 1,
            SenderCommand::Frame(frame) => sender.send_frame(frame),
            SenderCommand::Flush(ack) => {
                let _ = ack.send(!past_deadline() && sender.flush());
            }
            SenderCommand::Shutdown(ack) => {
                report_discarded(discarded);
                sender.close();
                let _ = ack.send(());
                return;
            }
        }
    }
    // Every handle went away without a shutdown command.
    report_discarded(discarded);
    sender.close();
}

fn report_discarded(count: u64) {
    if count > 0 {
        warn!("AsyncSender discarded {count} queued records after the close deadline");
    }
}

/// Queue `frame` without blocking; a full or closed queue drops it.
pub(crate) fn enqueue_frame(
    tx: &Sender<SenderCommand>,
    frame: Frame,
    warner: &RateLimitedWarner,
) -> bool {
    match tx.try_send(SenderCommand::Frame(frame)) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warner.record_drop();
            warner.warn_if_due(|count| {
                warn!("AsyncSender queue full; dropped {count} records");
            });
            false
        }
        Err(TrySendError::Disconnected(_)) => {
            warner.record_drop();
            warner.warn_if_due(|count| {
                warn!("AsyncSender worker gone; dropped {count} records");
            });
            false
        }
    }
}

/// Ask the worker to drain its sender's buffer and wait for the outcome.
pub(crate) fn flush_queue(tx: &Sender<SenderCommand>, timeout: Duration) -> bool {
    let (ack_tx, ack_rx) = bounded(1);
    if tx
        .send_timeout(SenderCommand::Flush(ack_tx), timeout)
        .is_err()
    {
        return false;
    }
    ack_rx.recv_timeout(timeout).unwrap_or(false)
}

/// Ask the worker to close its sender and wait for acknowledgement until
/// `deadline`.
pub(crate) fn shutdown_queue(tx: &Sender<SenderCommand>, deadline: Instant) -> bool {
    let (ack_tx, ack_rx) = bounded(1);
    if tx
        .send_deadline(SenderCommand::Shutdown(ack_tx), deadline)
        .is_err()
    {
        return false;
    }
    ack_rx.recv_deadline(deadline).is_ok()
}
