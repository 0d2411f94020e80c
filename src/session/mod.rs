//! Session state and the owner-thread half of the dispatcher.
//!
//! A session binds a [`CallQueue`] to one [`CallTarget`] and to the single
//! thread allowed to execute against it. Remote-originated calls arrive on
//! arbitrary threads through a [`SessionProxy`]; the owner thread drains them
//! in arrival order via [`SessionWrapper::progress`], either driven by the
//! caller's own loop or by a spawned [`DispatchLoop`].

mod proxy;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use std::time::Duration;

use parking_lot::Mutex;
use quanta::Clock;

pub use self::proxy::SessionProxy;
use crate::call::{Call, DumpReply};
use crate::event::{EventReceiver, InputEvent};
use crate::host::HostShared;
use crate::queue::{CallQueue, Notifier};
use crate::target::CallTarget;
use crate::type_alias::*;
use crate::util::{likely::*, thread_check::*};

const STATE_ACTIVE: u8 = 0;
const STATE_FINISHED: u8 = 1;

/// State shared between a session's owner thread and its producer-side
/// proxies.
pub(crate) struct SessionShared {
    /// Session ID, unique within the creating host.
    sess_id: SessId,

    /// ACTIVE or FINISHED. Monotonic; FINISHED is terminal.
    state: AtomicU8,

    /// Pending remote-originated calls.
    queue: CallQueue,

    /// The interface implementation. Mutated only by the owner thread;
    /// taken (and dropped) when the session finishes.
    target: Mutex<Option<Box<dyn CallTarget>>>,

    /// Input-event channel, present only for input sessions.
    events: Option<EventReceiver>,

    /// The thread that drives this session. Claimed by the first call to
    /// `progress()`; enforced afterwards.
    owner: Mutex<Option<ThreadId>>,

    /// The host that created this session. A back reference for
    /// unregistration only, never ownership: a dead host is a no-op.
    host: Weak<HostShared>,

    /// Monotonic clock for the uptime line in dumps.
    clock: Clock,
    created: quanta::Instant,

    /// Number of calls executed against the target.
    executed: AtomicU64,
}

impl SessionShared {
    #[inline]
    pub(crate) fn sess_id(&self) -> SessId {
        self.sess_id
    }

    #[inline]
    pub(crate) fn is_finished(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_FINISHED
    }

    /// Claim the current thread as owner, or verify an existing claim.
    /// Returns `false` if another thread already owns this session.
    pub(crate) fn claim_owner(&self) -> bool {
        let mut owner = self.owner.lock();
        match *owner {
            Some(id) => id == thread::current().id(),
            None => {
                *owner = Some(thread::current().id());
                true
            }
        }
    }

    /// Returns `true` if the current thread has claimed ownership.
    pub(crate) fn is_owner(&self) -> bool {
        *self.owner.lock() == Some(thread::current().id())
    }

    pub(crate) fn queue_notifier(&self) -> Arc<Notifier> {
        self.queue.notifier()
    }

    /// Push a call onto the queue, waking the owner loop.
    ///
    /// Returns `false` if the queue is already closed; the call has then been
    /// discarded with its resources released.
    pub(crate) fn enqueue(&self, call: Call) -> bool {
        self.queue.push(call)
    }

    /// Execute the call immediately if invoked on the owner thread, else
    /// enqueue it for the owner loop.
    pub(crate) fn submit(&self, call: Call) {
        if self.is_owner() {
            if let Some(mut target) = self.target.try_lock() {
                // Preserve arrival order: run whatever is queued ahead first.
                while let Some(queued) = self.queue.pop() {
                    self.execute(&mut target, queued);
                }
                self.execute(&mut target, call);
                return;
            }
            // Re-entrant submission from inside a handler; queue it and let
            // the outer drain pick it up.
        }
        self.queue.push(call);
    }

    /// One iteration of the owner loop: drain input events, then calls.
    pub(crate) fn progress(&self) {
        do_thread_check(self);

        // Abort if progressing recursively.
        let Some(mut target) = self.target.try_lock() else {
            return;
        };
        self.process_events(&mut target);
        self.process_calls(&mut target);
    }

    pub(crate) fn wait(&self, timeout: Duration) {
        self.queue.notifier().wait(timeout);
    }

    /// Returns `true` if there is nothing for the owner loop to do.
    pub(crate) fn idle(&self) -> bool {
        self.queue.is_empty() && !self.events.as_ref().is_some_and(|rx| rx.has_events())
    }

    fn process_events(&self, target: &mut Option<Box<dyn CallTarget>>) {
        let Some(rx) = &self.events else {
            return;
        };
        while let Some((seq, event)) = rx.recv() {
            let ack = rx.make_ack(seq);
            let Some(t) = target.as_mut() else {
                // No target to dispatch to; resolve right away so the
                // producer is not starved.
                ack.finish(false);
                continue;
            };

            let kind = event.kind();
            let outcome = catch_unwind(AssertUnwindSafe(|| match event {
                InputEvent::Key(e) => t.key_event(e, ack),
                InputEvent::Motion(e) => t.motion_event(e, ack),
                InputEvent::Trackball(e) => t.trackball_event(e, ack),
            }));
            // The ack was dropped during unwinding, so the event is already
            // resolved as unhandled.
            if unlikely(outcome.is_err()) {
                log::error!(
                    "session {}: {} event handler panicked (seq {})",
                    self.sess_id,
                    kind,
                    seq
                );
            }
        }
    }

    fn process_calls(&self, target: &mut Option<Box<dyn CallTarget>>) {
        while let Some(call) = self.queue.pop() {
            self.execute(target, call);
        }
    }

    /// Execute one drained call. Owner thread only.
    fn execute(&self, target: &mut Option<Box<dyn CallTarget>>, call: Call) {
        // Calls drained against a finished session are inert; dropping them
        // releases their payload resources. Dumps are exempt so diagnostics
        // still report the terminal state.
        if unlikely(self.is_finished()) && !matches!(call, Call::Dump { .. }) {
            log::trace!(
                "session {}: dropping {} for finished session",
                self.sess_id,
                call.opcode()
            );
            return;
        }

        match call {
            Call::FinishSession => self.finish_now(target),
            Call::Dump { args, reply } => self.serve_dump(target, &args, reply),
            call => {
                let Some(t) = target.as_mut() else {
                    log::trace!(
                        "session {}: dropping {} with no target attached",
                        self.sess_id,
                        call.opcode()
                    );
                    return;
                };
                let opcode = call.opcode();
                if unlikely(catch_unwind(AssertUnwindSafe(|| deliver(t.as_mut(), call))).is_err()) {
                    log::error!("session {}: {} handler panicked", self.sess_id, opcode);
                } else {
                    self.executed.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    /// Tear the session down. Idempotent; runs on the owner thread when a
    /// `FinishSession` call is drained.
    fn finish_now(&self, target: &mut Option<Box<dyn CallTarget>>) {
        if self.state.swap(STATE_FINISHED, Ordering::AcqRel) == STATE_FINISHED {
            log::debug!("session {}: already finished", self.sess_id);
            return;
        }

        self.queue.close();
        if let Some(rx) = &self.events {
            let forced = rx.dispose();
            if forced > 0 {
                log::debug!(
                    "session {}: forced {} unhandled event acknowledgments at teardown",
                    self.sess_id,
                    forced
                );
            }
        }
        drop(target.take());

        if let Some(host) = self.host.upgrade() {
            host.unregister(self.sess_id);
        }
        log::debug!("session {}: finished", self.sess_id);
    }

    fn serve_dump(&self, target: &mut Option<Box<dyn CallTarget>>, args: &[String], reply: DumpReply) {
        let mut text = String::new();
        self.write_summary(&mut text);
        match target.as_mut() {
            Some(t) => match catch_unwind(AssertUnwindSafe(|| t.dump(&mut text, args))) {
                Ok(Ok(())) => {}
                Ok(Err(_)) => text.push_str("  (target dump failed)\n"),
                Err(_) => {
                    log::error!("session {}: dump handler panicked", self.sess_id);
                    text.push_str("  (target dump panicked)\n");
                }
            },
            None => text.push_str("  no target attached\n"),
        }
        reply.send(text);
    }

    fn write_summary(&self, text: &mut String) {
        use std::fmt::Write;

        let state = if self.is_finished() { "finished" } else { "active" };
        let uptime = self.clock.now().duration_since(self.created);
        let _ = writeln!(
            text,
            "session {}: state={}, uptime={:.1?}",
            self.sess_id, state, uptime
        );
        let _ = writeln!(
            text,
            "  calls: executed={}, queued={}",
            self.executed.load(Ordering::Relaxed),
            self.queue.len()
        );
        if let Some(rx) = &self.events {
            let _ = writeln!(text, "  events: in-flight={}", rx.pending_len());
        }
    }
}

/// Invoke the target method matching a drained call.
fn deliver(t: &mut dyn CallTarget, call: Call) {
    match call {
        Call::AttachToken { token } => t.attach_token(token),
        Call::BindInput { binding } => t.bind_input(binding),
        Call::UnbindInput => t.unbind_input(),
        Call::StartInput { info, restarting } => t.start_input(info, restarting),
        Call::ShowSoftInput { flags, result } => t.show_soft_input(flags, result),
        Call::HideSoftInput { flags, result } => t.hide_soft_input(flags, result),
        Call::UpdateSelection { update } => t.update_selection(update),
        Call::ToggleSoftInput { flags } => t.toggle_soft_input(flags),
        Call::DisplayCompletions { completions } => t.display_completions(completions),
        Call::ChangeSubtype { subtype } => t.change_subtype(subtype),
        Call::RevokeSession => t.revoke_session(),
        // Handled by the drain loop before dispatch.
        Call::FinishSession | Call::Dump { .. } => unreachable!(),
    }
}

/// Owner-side handle to a session.
///
/// Created by [`ServiceHost::create_session`](crate::ServiceHost); the thread
/// that first calls [`progress`](Self::progress) becomes the session's owner
/// thread and must drive it from then on.
pub struct SessionWrapper {
    shared: Arc<SessionShared>,
}

impl SessionWrapper {
    pub(crate) fn new(
        sess_id: SessId,
        target: Box<dyn CallTarget>,
        events: Option<EventReceiver>,
        host: Weak<HostShared>,
    ) -> Self {
        let queue = CallQueue::new();
        if let Some(rx) = &events {
            rx.bind_notifier(queue.notifier());
        }
        let clock = Clock::new();
        let created = clock.now();
        Self {
            shared: Arc::new(SessionShared {
                sess_id,
                state: AtomicU8::new(STATE_ACTIVE),
                queue,
                target: Mutex::new(Some(target)),
                events,
                owner: Mutex::new(None),
                host,
                clock,
                created,
                executed: AtomicU64::new(0),
            }),
        }
    }

    /// Return the session ID.
    #[inline(always)]
    pub fn sess_id(&self) -> SessId {
        self.shared.sess_id()
    }

    /// Return `true` once the session has finished.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.shared.is_finished()
    }

    /// Make a producer-side proxy. Proxies are cheap to clone and may be
    /// handed to any number of threads.
    pub fn proxy(&self) -> SessionProxy {
        SessionProxy::new(self.shared.clone())
    }

    /// Run one iteration of the owner loop: drain pending input events, then
    /// drain pending calls in arrival order.
    ///
    /// # Panics
    ///
    /// Panics if called from a thread other than the one that first called
    /// it (unless the `no_thread_checks` feature is enabled).
    #[inline]
    pub fn progress(&self) {
        self.shared.progress();
    }

    /// Block until new work is signaled or `timeout` elapses. For callers
    /// driving the session with their own loop.
    pub fn wait(&self, timeout: Duration) {
        self.shared.wait(timeout);
    }
}

impl std::fmt::Debug for SessionWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionWrapper")
            .field("sess_id", &self.shared.sess_id())
            .field("finished", &self.shared.is_finished())
            .finish()
    }
}

/// A dedicated owner thread driving one session.
///
/// Spawns a thread that claims ownership of the wrapped session and drains
/// it until the loop is dropped. The session must not have been driven on
/// another thread before being handed over.
pub struct DispatchLoop {
    sess_id: SessId,
    stop: Arc<AtomicBool>,
    notify: Arc<Notifier>,
    thread: Option<thread::JoinHandle<()>>,
}

impl DispatchLoop {
    /// Re-check bound for the idle wait, so a stop request is observed even
    /// without a wakeup.
    const IDLE_RECHECK: Duration = Duration::from_millis(100);

    /// Spawn the owner thread for `wrapper`.
    pub fn spawn(wrapper: SessionWrapper) -> Self {
        let sess_id = wrapper.sess_id();
        let stop = Arc::new(AtomicBool::new(false));
        let notify = wrapper.shared.queue_notifier();

        let thread = thread::Builder::new()
            .name(format!("dispatch-{}", sess_id))
            .spawn({
                let stop = stop.clone();
                move || {
                    while !stop.load(Ordering::Acquire) {
                        wrapper.progress();
                        if wrapper.shared.idle() {
                            wrapper.wait(Self::IDLE_RECHECK);
                        }
                    }
                    // Flush anything that arrived before the stop flag was
                    // observed.
                    wrapper.progress();
                }
            })
            .expect("failed to spawn dispatch loop thread");

        Self {
            sess_id,
            stop,
            notify,
            thread: Some(thread),
        }
    }

    /// Return the ID of the session this loop drives.
    #[inline(always)]
    pub fn sess_id(&self) -> SessId {
        self.sess_id
    }
}

impl Drop for DispatchLoop {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        self.notify.notify();
        self.thread.take().unwrap().join().unwrap();
    }
}
