//! Progress events from a derivation run to its driver.
//!
//! One producer (the engine's worker) pushes events; one consumer (the
//! driver's foreground loop) pops them. The cancellation flag travels the
//! other way and is independent of the queue.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::derive::Cancellation;
use crate::engine::Stage;
use crate::error::GrError;
use crate::tensor::Tensor;

/// One completed stage: its tensor, rendered markup and overall progress.
#[derive(Clone, Debug)]
pub struct StageReport {
    pub stage: Stage,
    pub tensor: Tensor,
    pub markup: String,
    /// Stages completed so far, including this one
    pub completed: usize,
    pub total: usize,
}

impl StageReport {
    /// Progress in `0.0..=1.0`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.completed as f64 / self.total as f64
    }
}

/// Events delivered to the consumer, in stage order.
///
/// Exactly one of `Done`, `Cancelled` or `Failed` ends a run.
#[derive(Clone, Debug)]
pub enum Event {
    Progress(StageReport),
    Cancelled,
    Failed(GrError),
    Done,
}

impl Event {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Event::Progress(_))
    }
}

/// FIFO of [`Event`]s plus a cancellation flag.
#[derive(Debug, Default)]
pub struct ProgressChannel {
    queue: Mutex<VecDeque<Event>>,
    ready: Condvar,
    cancel: AtomicBool,
}

impl ProgressChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the producer to stop at its next checkpoint. Idempotent.
    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    /// Enqueue an event (producer side).
    pub fn send(&self, event: Event) {
        let mut queue = self.queue.lock();
        queue.push_back(event);
        self.ready.notify_one();
    }

    /// Pop the oldest event without blocking.
    pub fn poll(&self) -> Option<Event> {
        self.queue.lock().pop_front()
    }

    /// Pop the oldest event, waiting up to `timeout` for one to arrive.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Event> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.queue.lock();
        while queue.is_empty() {
            if self.ready.wait_until(&mut queue, deadline).timed_out() {
                break;
            }
        }
        queue.pop_front()
    }

    /// Take every queued event.
    pub fn drain(&self) -> Vec<Event> {
        self.queue.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

impl Cancellation for ProgressChannel {
    fn is_cancelled(&self) -> bool {
        self.is_cancel_requested()
    }
}

/// Routes an interactive stop request (Ctrl-C) to the run in progress.
///
/// A driver arms the switch with a run's channel for as long as it follows
/// that run. With nothing armed, [`StopSwitch::trigger`] reports `false` and
/// the caller falls back to its normal interrupt behaviour.
#[derive(Debug)]
pub struct StopSwitch {
    active: Mutex<Option<Arc<ProgressChannel>>>,
}

impl Default for StopSwitch {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSwitch {
    pub const fn new() -> Self {
        Self {
            active: parking_lot::const_mutex(None),
        }
    }

    /// Follow `channel` until the returned guard drops.
    pub fn arm(&self, channel: Arc<ProgressChannel>) -> ArmedStop<'_> {
        *self.active.lock() = Some(channel);
        ArmedStop(self)
    }

    pub fn is_armed(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Request cancellation of the armed run. Returns whether one was armed.
    pub fn trigger(&self) -> bool {
        match self.active.lock().as_ref() {
            Some(channel) => {
                channel.request_cancel();
                true
            }
            None => false,
        }
    }
}

/// Disarms its [`StopSwitch`] on drop.
#[derive(Debug)]
pub struct ArmedStop<'a>(&'a StopSwitch);

impl Drop for ArmedStop<'_> {
    fn drop(&mut self) {
        *self.0.active.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let ch = ProgressChannel::new();
        ch.send(Event::Cancelled);
        ch.send(Event::Done);
        assert!(matches!(ch.poll(), Some(Event::Cancelled)));
        assert!(matches!(ch.poll(), Some(Event::Done)));
        assert!(ch.poll().is_none());
    }

    #[test]
    fn test_cancel_flag_is_idempotent() {
        let ch = ProgressChannel::new();
        assert!(!ch.is_cancel_requested());
        ch.request_cancel();
        ch.request_cancel();
        assert!(ch.is_cancel_requested());
        // the flag does not produce events
        assert!(ch.is_empty());
    }

    #[test]
    fn test_recv_timeout_wakes_on_send() {
        let ch = Arc::new(ProgressChannel::new());
        let producer = Arc::clone(&ch);
        let handle = thread::spawn(move || producer.send(Event::Done));
        let event = ch.recv_timeout(Duration::from_secs(5));
        handle.join().unwrap();
        assert!(matches!(event, Some(Event::Done)));
    }

    #[test]
    fn test_recv_timeout_expires() {
        let ch = ProgressChannel::new();
        assert!(ch.recv_timeout(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn test_stop_switch_follows_armed_channel() {
        let switch = StopSwitch::new();
        assert!(!switch.trigger());

        let ch = Arc::new(ProgressChannel::new());
        {
            let _armed = switch.arm(Arc::clone(&ch));
            assert!(switch.is_armed());
            assert!(switch.trigger());
        }
        assert!(ch.is_cancel_requested());
        assert!(!switch.is_armed());
        assert!(!switch.trigger());
    }
}
