//! The remote-call sum type and its payload data.
//!
//! Each variant of [`Call`] corresponds to one remote method of the interface
//! stub that feeds the dispatcher. The variant set is closed: it is the
//! contract with the surrounding system, not an extension point.

use std::fmt;
use std::sync::mpsc;

use crate::type_alias::*;

/// Identity of the process/user that bound a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputBinding {
    pub uid: i32,
    pub pid: i32,
    /// Binding sequence number, bumped by the remote side on each rebind.
    pub sequence: u32,
}

/// Description of the editor field a session is about to serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorInfo {
    pub input_type: u32,
    pub initial_sel_start: i32,
    pub initial_sel_end: i32,
    pub hint: Option<String>,
}

/// A cursor/selection change reported by the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionUpdate {
    pub old_sel_start: i32,
    pub old_sel_end: i32,
    pub sel_start: i32,
    pub sel_end: i32,
    pub candidates_start: i32,
    pub candidates_end: i32,
}

/// One completion candidate shown by the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub id: u64,
    pub position: u32,
    pub text: String,
}

/// One-shot result callback carried by show/hide requests.
///
/// Completes exactly once. If the carrying call is discarded without ever
/// being executed (finished session, closed queue), the sink completes with
/// `false` on drop, so the remote waiter is never starved.
pub struct ResultSink {
    complete: Option<Box<dyn FnOnce(bool) + Send>>,
}

impl ResultSink {
    /// Wrap a completion callback.
    pub fn new(f: impl FnOnce(bool) + Send + 'static) -> Self {
        Self {
            complete: Some(Box::new(f)),
        }
    }

    /// Report the result to the remote waiter.
    pub fn complete(mut self, shown: bool) {
        if let Some(f) = self.complete.take() {
            f(shown);
        }
    }
}

impl Drop for ResultSink {
    fn drop(&mut self) {
        if let Some(f) = self.complete.take() {
            f(false);
        }
    }
}

impl fmt::Debug for ResultSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSink")
            .field("completed", &self.complete.is_none())
            .finish()
    }
}

/// Reply slot of a synchronous dump request.
///
/// The owner thread fills it once; the requesting thread blocks on the other
/// end with a bounded wait. Dropping an unserviced slot unblocks the waiter.
#[derive(Debug)]
pub struct DumpReply(mpsc::SyncSender<String>);

impl DumpReply {
    pub(crate) fn new(tx: mpsc::SyncSender<String>) -> Self {
        Self(tx)
    }

    /// Deliver the dump text. The waiter may already have timed out, in
    /// which case the text is silently discarded.
    pub(crate) fn send(self, text: String) {
        let _ = self.0.send(text);
    }
}

/// A deferred remote invocation: opcode plus argument payload.
///
/// A `Call` is consumed exactly once. Either it is executed on the owner
/// thread, or it is discarded; discarding releases any owned resources
/// ([`ResultSink`], [`DumpReply`]) through `Drop`.
#[derive(Debug)]
pub enum Call {
    AttachToken { token: BindToken },
    BindInput { binding: InputBinding },
    UnbindInput,
    StartInput { info: EditorInfo, restarting: bool },
    ShowSoftInput { flags: u32, result: Option<ResultSink> },
    HideSoftInput { flags: u32, result: Option<ResultSink> },
    UpdateSelection { update: SelectionUpdate },
    ToggleSoftInput { flags: u32 },
    DisplayCompletions { completions: Vec<Completion> },
    ChangeSubtype { subtype: SubtypeId },
    RevokeSession,
    FinishSession,
    Dump { args: Vec<String>, reply: DumpReply },
}

impl Call {
    /// Static name of this call's opcode, for logs and dumps.
    pub fn opcode(&self) -> &'static str {
        match self {
            Call::AttachToken { .. } => "attach_token",
            Call::BindInput { .. } => "bind_input",
            Call::UnbindInput => "unbind_input",
            Call::StartInput { .. } => "start_input",
            Call::ShowSoftInput { .. } => "show_soft_input",
            Call::HideSoftInput { .. } => "hide_soft_input",
            Call::UpdateSelection { .. } => "update_selection",
            Call::ToggleSoftInput { .. } => "toggle_soft_input",
            Call::DisplayCompletions { .. } => "display_completions",
            Call::ChangeSubtype { .. } => "change_subtype",
            Call::RevokeSession => "revoke_session",
            Call::FinishSession => "finish_session",
            Call::Dump { .. } => "dump",
        }
    }
}
