//! Producer-side handle to a session.

use std::fmt;
use std::fmt::Write as _;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use super::SessionShared;
use crate::call::*;
use crate::type_alias::*;

/// Bound on the synchronous dump wait.
pub(crate) const DUMP_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle through which remote-originated calls enter a session.
///
/// Cloneable and usable from any thread. Every method except [`dump`] is
/// fire-and-forget: it returns as soon as the call is queued (or executed
/// immediately, when invoked on the owner thread itself). Calls against a
/// finished session are accepted and silently dropped, with their payload
/// resources released.
///
/// [`dump`]: SessionProxy::dump
#[derive(Clone)]
pub struct SessionProxy {
    shared: Arc<SessionShared>,
}

impl SessionProxy {
    pub(crate) fn new(shared: Arc<SessionShared>) -> Self {
        Self { shared }
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

    /// Submit a raw call. The named methods below are shorthands for this.
    #[inline]
    pub fn submit(&self, call: Call) {
        self.shared.submit(call);
    }

    pub fn attach_token(&self, token: BindToken) {
        self.submit(Call::AttachToken { token });
    }

    pub fn bind_input(&self, binding: InputBinding) {
        self.submit(Call::BindInput { binding });
    }

    pub fn unbind_input(&self) {
        self.submit(Call::UnbindInput);
    }

    pub fn start_input(&self, info: EditorInfo, restarting: bool) {
        self.submit(Call::StartInput { info, restarting });
    }

    pub fn show_soft_input(&self, flags: u32, result: Option<ResultSink>) {
        self.submit(Call::ShowSoftInput { flags, result });
    }

    pub fn hide_soft_input(&self, flags: u32, result: Option<ResultSink>) {
        self.submit(Call::HideSoftInput { flags, result });
    }

    pub fn update_selection(&self, update: SelectionUpdate) {
        self.submit(Call::UpdateSelection { update });
    }

    pub fn toggle_soft_input(&self, flags: u32) {
        self.submit(Call::ToggleSoftInput { flags });
    }

    pub fn display_completions(&self, completions: Vec<Completion>) {
        self.submit(Call::DisplayCompletions { completions });
    }

    pub fn change_subtype(&self, subtype: SubtypeId) {
        self.submit(Call::ChangeSubtype { subtype });
    }

    pub fn revoke_session(&self) {
        self.submit(Call::RevokeSession);
    }

    /// Request session teardown. Takes effect when the call is drained by
    /// the owner thread; all calls drained after it are inert.
    pub fn finish_session(&self) {
        self.submit(Call::FinishSession);
    }

    /// Retrieve human-readable session state, synchronously.
    ///
    /// Callable from any thread. Blocks the caller until the owner thread
    /// services the request, bounded by 5 seconds; on timeout a single
    /// diagnostic line is written to `sink` instead. The owner thread itself
    /// is never blocked by this call.
    pub fn dump(&self, sink: &mut dyn fmt::Write, args: &[String]) -> fmt::Result {
        self.dump_with_timeout(sink, args, DUMP_TIMEOUT)
    }

    pub(crate) fn dump_with_timeout(
        &self,
        sink: &mut dyn fmt::Write,
        args: &[String],
        timeout: Duration,
    ) -> fmt::Result {
        let sess_id = self.sess_id();
        if self.shared.is_finished() {
            // The target is gone; report the terminal state without
            // bothering the owner thread.
            return writeln!(sink, "session {}: finished, no target attached", sess_id);
        }

        let (tx, rx) = mpsc::sync_channel(1);
        let call = Call::Dump {
            args: args.to_vec(),
            reply: DumpReply::new(tx),
        };

        if self.shared.is_owner() {
            // Serviced inline; blocking here would deadlock the only thread
            // able to produce the result.
            self.shared.submit(call);
            return match rx.try_recv() {
                Ok(text) => sink.write_str(&text),
                // Re-entrant dump from inside a handler: it is queued behind
                // the handler that requested it.
                Err(_) => writeln!(sink, "session {}: dump deferred (re-entrant)", sess_id),
            };
        }

        if !self.shared.enqueue(call) {
            // The queue closed under us.
            return writeln!(sink, "session {}: finished, no target attached", sess_id);
        }
        match rx.recv_timeout(timeout) {
            Ok(text) => sink.write_str(&text),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                log::warn!("session {}: dump timed out after {:?}", sess_id, timeout);
                writeln!(sink, "session {}: dump timed out after {:?}", sess_id, timeout)
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                // The session finished before the dump was serviced.
                writeln!(sink, "session {}: finished, no target attached", sess_id)
            }
        }
    }
}

impl fmt::Debug for SessionProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionProxy")
            .field("sess_id", &self.sess_id())
            .field("finished", &self.is_finished())
            .finish()
    }
}
