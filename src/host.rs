//! Registry of live sessions for one hosting service.

use std::fmt;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use ahash::RandomState;
use dashmap::DashMap;
use thiserror::Error;

use crate::event::EventReceiver;
use crate::session::{SessionProxy, SessionWrapper};
use crate::target::CallTarget;
use crate::type_alias::*;

/// Errors surfaced by [`ServiceHost`] entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("service host already destroyed")]
    Destroyed,
}

pub(crate) struct HostShared {
    /// Live sessions. Finished sessions unregister themselves when their
    /// teardown is drained.
    sessions: DashMap<SessId, SessionProxy, RandomState>,

    /// Next session ID to hand out.
    next_sess_id: AtomicU32,

    /// Set once by [`ServiceHost::destroy`]; terminal.
    destroyed: AtomicBool,
}

impl HostShared {
    pub(crate) fn unregister(&self, sess_id: SessId) {
        self.sessions.remove(&sess_id);
    }
}

/// A hosting service: creates sessions, tracks the live ones, and tears them
/// all down when the service itself goes away.
///
/// Sessions hold only a weak back reference to their host, so a host may be
/// dropped while its sessions are still draining; unregistration then
/// becomes a no-op.
pub struct ServiceHost {
    inner: Arc<HostShared>,
}

impl ServiceHost {
    /// Create a new host with no sessions.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HostShared {
                sessions: DashMap::with_capacity_and_hasher(16, RandomState::new()),
                next_sess_id: AtomicU32::new(0),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    /// Bind a new session around `target`.
    ///
    /// The returned wrapper is the owner-side handle; hand out
    /// [`SessionWrapper::proxy`] clones to producer threads.
    pub fn create_session(&self, target: Box<dyn CallTarget>) -> Result<SessionWrapper, HostError> {
        self.create(target, None)
    }

    /// Bind a new input session around `target`, consuming events from
    /// `channel`.
    pub fn create_input_session(
        &self,
        target: Box<dyn CallTarget>,
        channel: EventReceiver,
    ) -> Result<SessionWrapper, HostError> {
        self.create(target, Some(channel))
    }

    fn create(
        &self,
        target: Box<dyn CallTarget>,
        events: Option<EventReceiver>,
    ) -> Result<SessionWrapper, HostError> {
        if self.inner.destroyed.load(Ordering::Acquire) {
            return Err(HostError::Destroyed);
        }
        let sess_id = self.inner.next_sess_id.fetch_add(1, Ordering::Relaxed);
        let wrapper = SessionWrapper::new(sess_id, target, events, Arc::downgrade(&self.inner));
        self.inner.sessions.insert(sess_id, wrapper.proxy());
        log::debug!("host: created session {}", sess_id);
        Ok(wrapper)
    }

    /// Look up a live session by ID.
    pub fn session(&self, sess_id: SessId) -> Option<SessionProxy> {
        self.inner.sessions.get(&sess_id).map(|p| p.value().clone())
    }

    /// Number of sessions that have not yet finished.
    pub fn session_count(&self) -> usize {
        self.inner.sessions.len()
    }

    /// Returns `true` once the host has been destroyed.
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }

    /// Tear the service down. Idempotent, callable from any thread.
    ///
    /// Requests teardown of every live session; each takes effect when its
    /// owner loop drains the finish call. No new sessions can be created
    /// afterwards.
    pub fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        log::debug!(
            "host: destroying, finishing {} live sessions",
            self.inner.sessions.len()
        );
        for entry in self.inner.sessions.iter() {
            entry.value().finish_session();
        }
    }

    /// Dump every live session into `sink`, with the bounded per-session
    /// wait of [`SessionProxy::dump`].
    pub fn dump(&self, sink: &mut dyn fmt::Write, args: &[String]) -> fmt::Result {
        writeln!(sink, "service host: {} live sessions", self.session_count())?;
        // Clone the proxies out first: a session finishing mid-dump removes
        // itself from this map, and a shard guard must not be held across
        // the bounded wait.
        let proxies: Vec<SessionProxy> = self
            .inner
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for proxy in proxies {
            proxy.dump(sink, args)?;
        }
        Ok(())
    }
}

impl Default for ServiceHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ServiceHost {
    fn drop(&mut self) {
        self.destroy();
    }
}
