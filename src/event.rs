//! The raw input-event channel and its pending-event table.
//!
//! Events flow one way (producer to session) and acknowledgments flow back.
//! Every event that enters the channel is acknowledged exactly once: either
//! by the target resolving its [`EventAck`], or forcibly as unhandled when
//! the channel is disposed. An upstream producer therefore never stalls
//! waiting for a completion that will not come.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use ahash::RandomState;
use crossbeam::queue::SegQueue;
use parking_lot::Mutex;
use thiserror::Error;

use crate::queue::Notifier;
use crate::type_alias::*;
use crate::util::likely::*;

/// A raw key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: u32,
    pub down: bool,
}

/// A raw pointer or trackball motion event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionEvent {
    pub action: u32,
    pub x: f32,
    pub y: f32,
}

/// A raw input event, dispatched to the target by subtype.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Key(KeyEvent),
    Motion(MotionEvent),
    Trackball(MotionEvent),
}

impl InputEvent {
    /// Static name of this event's subtype, for logs and dumps.
    pub fn kind(&self) -> &'static str {
        match self {
            InputEvent::Key(_) => "key",
            InputEvent::Motion(_) => "motion",
            InputEvent::Trackball(_) => "trackball",
        }
    }
}

/// Completion notice delivered back to the producing side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventFeedback {
    pub seq: EventSeq,
    pub handled: bool,
}

/// Error returned when sending on a disposed channel.
///
/// Carries the event back to the caller, like a channel send error.
#[derive(Debug, Error)]
pub enum EventSendError {
    #[error("event channel disposed")]
    Disposed(InputEvent),
}

struct RawEvent {
    seq: EventSeq,
    event: InputEvent,
}

/// State shared by both halves of an event channel.
struct ChannelShared {
    /// Events awaiting pickup by the owner loop.
    events: SegQueue<RawEvent>,

    /// Completion notices awaiting pickup by the producer.
    feedback: SegQueue<EventFeedback>,

    /// In-flight events: delivered to the target, not yet acknowledged.
    ///
    /// This mutex also serializes `send` against `dispose`, so an event can
    /// never slip into `events` after the disposal sweep has drained it.
    pending: Mutex<HashMap<EventSeq, InputEvent, RandomState>>,

    /// Set once by [`EventReceiver::dispose`]; terminal.
    disposed: AtomicBool,

    /// Next sequence number handed out by the sender.
    next_seq: AtomicU32,

    /// Owner-loop wakeup, bound when the receiver is attached to a session.
    notify: Mutex<Option<Arc<Notifier>>>,
}

impl ChannelShared {
    fn push_feedback(&self, seq: EventSeq, handled: bool) {
        self.feedback.push(EventFeedback { seq, handled });
    }
}

/// Producer half: delivers raw input events, collects completion notices.
pub struct EventSender(Arc<ChannelShared>);

impl EventSender {
    /// Deliver an event into the channel and wake the consuming session.
    ///
    /// Returns the sequence number under which the event will be
    /// acknowledged, or gives the event back if the channel is disposed.
    pub fn send(&self, event: InputEvent) -> Result<EventSeq, EventSendError> {
        let seq = {
            // Check-then-push must be atomic with respect to disposal, or a
            // racing teardown sweep could miss the pushed event and leave it
            // stranded without an acknowledgment.
            let _pending = self.0.pending.lock();
            if unlikely(self.0.disposed.load(Ordering::Acquire)) {
                return Err(EventSendError::Disposed(event));
            }
            let seq = self.0.next_seq.fetch_add(1, Ordering::Relaxed);
            self.0.events.push(RawEvent { seq, event });
            seq
        };
        if let Some(notify) = self.0.notify.lock().as_ref() {
            notify.notify();
        }
        Ok(seq)
    }

    /// Collect the next completion notice, if any.
    pub fn poll_feedback(&self) -> Option<EventFeedback> {
        self.0.feedback.pop()
    }

    /// Returns `true` if the consuming side has disposed the channel.
    pub fn is_disposed(&self) -> bool {
        self.0.disposed.load(Ordering::Acquire)
    }
}

/// Consumer half, exclusively owned by one session.
pub struct EventReceiver(Arc<ChannelShared>);

impl EventReceiver {
    /// Pop the next undelivered event and record it as in-flight.
    pub(crate) fn recv(&self) -> Option<(EventSeq, InputEvent)> {
        let raw = self.0.events.pop()?;
        self.0
            .pending
            .lock()
            .insert(raw.seq, raw.event.clone());
        Some((raw.seq, raw.event))
    }

    pub(crate) fn has_events(&self) -> bool {
        !self.0.events.is_empty()
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.0.pending.lock().len()
    }

    /// Make an acknowledgment handle for an in-flight event.
    pub(crate) fn make_ack(&self, seq: EventSeq) -> EventAck {
        EventAck {
            shared: self.0.clone(),
            seq,
            done: false,
        }
    }

    /// Bind the owner loop's wakeup signal so sends rouse a parked loop.
    pub(crate) fn bind_notifier(&self, notify: Arc<Notifier>) {
        *self.0.notify.lock() = Some(notify);
    }

    /// Tear the channel down. Idempotent.
    ///
    /// Every event still undelivered and every in-flight entry is forcibly
    /// acknowledged as unhandled. Returns the number of forced
    /// acknowledgments.
    pub(crate) fn dispose(&self) -> usize {
        // Hold the table mutex across flag-and-sweep: once the flag is
        // observed by a sender, no new event can enter `events`, and any
        // event already in is drained here.
        let mut pending = self.0.pending.lock();
        if self.0.disposed.swap(true, Ordering::AcqRel) {
            return 0;
        }

        let mut forced = 0;
        while let Some(raw) = self.0.events.pop() {
            self.0.push_feedback(raw.seq, false);
            forced += 1;
        }
        for (seq, _) in pending.drain() {
            self.0.push_feedback(seq, false);
            forced += 1;
        }
        forced
    }
}

/// Acknowledgment handle for one delivered input event.
///
/// Resolves exactly once: explicitly via [`EventAck::finish`], or as
/// unhandled on drop. A handle that outlives channel disposal resolves to
/// nothing, so a teardown race never produces a duplicate acknowledgment.
pub struct EventAck {
    shared: Arc<ChannelShared>,
    seq: EventSeq,
    done: bool,
}

impl EventAck {
    /// The sequence number of the acknowledged event.
    pub fn seq(&self) -> EventSeq {
        self.seq
    }

    /// Acknowledge the event.
    pub fn finish(mut self, handled: bool) {
        self.finish_inner(handled);
    }

    fn finish_inner(&mut self, handled: bool) {
        if self.done {
            return;
        }
        self.done = true;

        // The table entry is the exactly-once gate: if teardown already
        // force-acknowledged this sequence number, stay silent.
        if likely(self.shared.pending.lock().remove(&self.seq).is_some()) {
            self.shared.push_feedback(self.seq, handled);
        } else {
            log::debug!("ignoring late acknowledgment for event {}", self.seq);
        }
    }
}

impl Drop for EventAck {
    fn drop(&mut self) {
        self.finish_inner(false);
    }
}

impl std::fmt::Debug for EventAck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventAck")
            .field("seq", &self.seq)
            .field("done", &self.done)
            .finish()
    }
}

/// Create a connected pair of event channel halves.
pub fn event_channel() -> (EventSender, EventReceiver) {
    let shared = Arc::new(ChannelShared {
        events: SegQueue::new(),
        feedback: SegQueue::new(),
        pending: Mutex::new(HashMap::default()),
        disposed: AtomicBool::new(false),
        next_seq: AtomicU32::new(1),
        notify: Mutex::new(None),
    });
    (EventSender(shared.clone()), EventReceiver(shared))
}
