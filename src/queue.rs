//! The pending-call FIFO shared between producer threads and the owner thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::queue::SegQueue;
use parking_lot::{Condvar, Mutex};

use crate::call::Call;
use crate::util::likely::*;

/// Wakeup signal for a parked owner loop.
///
/// A pending flag under the mutex avoids lost wakeups when a producer
/// notifies between the owner's emptiness check and its wait.
pub(crate) struct Notifier {
    pending: Mutex<bool>,
    cond: Condvar,
}

impl Notifier {
    fn new() -> Self {
        Self {
            pending: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// Wake any thread blocked in [`Notifier::wait`].
    pub(crate) fn notify(&self) {
        let mut pending = self.pending.lock();
        *pending = true;
        self.cond.notify_all();
    }

    /// Block until notified or until `timeout` elapses.
    pub(crate) fn wait(&self, timeout: Duration) {
        let mut pending = self.pending.lock();
        if !*pending {
            let _ = self.cond.wait_for(&mut pending, timeout);
        }
        *pending = false;
    }
}

/// Multi-producer FIFO of [`Call`]s, owned by exactly one session.
///
/// Any thread may push; only the owner thread pops. Once closed, pushes are
/// rejected and the rejected call is dropped on the spot, releasing whatever
/// resources its payload owns.
pub(crate) struct CallQueue {
    inner: SegQueue<Call>,
    closed: AtomicBool,
    notify: Arc<Notifier>,
}

impl CallQueue {
    pub(crate) fn new() -> Self {
        Self {
            inner: SegQueue::new(),
            closed: AtomicBool::new(false),
            notify: Arc::new(Notifier::new()),
        }
    }

    /// Append a call and wake the owner loop.
    ///
    /// Returns `false` if the queue is closed; the call has then already been
    /// discarded, synchronously, with its payload resources released.
    pub(crate) fn push(&self, call: Call) -> bool {
        if unlikely(self.closed.load(Ordering::Acquire)) {
            log::trace!("discarding {} pushed to a closed queue", call.opcode());
            drop(call);
            return false;
        }
        self.inner.push(call);
        self.notify.notify();
        true
    }

    /// Pop the call at the head, if any. Owner thread only.
    #[inline]
    pub(crate) fn pop(&self) -> Option<Call> {
        self.inner.pop()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.inner.len()
    }

    /// Mark the queue void. Calls still queued are drained (and dropped) by
    /// the owner loop as usual; new pushes are discarded at the push site.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify();
    }

    /// The wakeup signal shared with this queue's owner loop.
    pub(crate) fn notifier(&self) -> Arc<Notifier> {
        self.notify.clone()
    }
}
