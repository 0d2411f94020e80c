//! The outbound interface invoked by the dispatcher.

use std::fmt;

use crate::call::{Completion, EditorInfo, InputBinding, ResultSink, SelectionUpdate};
use crate::event::{EventAck, KeyEvent, MotionEvent};
use crate::type_alias::*;

/// The interface implementation behind a session.
///
/// All methods are invoked synchronously on the session's owner thread, with
/// the deserialized call arguments, in queue arrival order. Implementations
/// never need their own locking: the dispatcher serializes every invocation.
///
/// Every method has a no-op default, so a target only overrides the calls it
/// serves. The event methods and the show/hide defaults report `handled =
/// false` (respectively `shown = false`) so that no upstream waiter is ever
/// starved by an unimplemented method.
pub trait CallTarget: Send {
    fn attach_token(&mut self, token: BindToken) {
        let _ = token;
    }

    fn bind_input(&mut self, binding: InputBinding) {
        let _ = binding;
    }

    fn unbind_input(&mut self) {}

    fn start_input(&mut self, info: EditorInfo, restarting: bool) {
        let _ = (info, restarting);
    }

    fn show_soft_input(&mut self, flags: u32, result: Option<ResultSink>) {
        let _ = flags;
        if let Some(result) = result {
            result.complete(false);
        }
    }

    fn hide_soft_input(&mut self, flags: u32, result: Option<ResultSink>) {
        let _ = flags;
        if let Some(result) = result {
            result.complete(false);
        }
    }

    fn update_selection(&mut self, update: SelectionUpdate) {
        let _ = update;
    }

    fn toggle_soft_input(&mut self, flags: u32) {
        let _ = flags;
    }

    fn display_completions(&mut self, completions: Vec<Completion>) {
        let _ = completions;
    }

    fn change_subtype(&mut self, subtype: SubtypeId) {
        let _ = subtype;
    }

    /// The remote side revoked the session grant. The session itself is torn
    /// down by the separate finish call that follows.
    fn revoke_session(&mut self) {}

    /// A key event arrived on the session's input channel.
    ///
    /// The target must eventually resolve `ack` exactly once; dropping it
    /// unresolved acknowledges the event as unhandled.
    fn key_event(&mut self, event: KeyEvent, ack: EventAck) {
        let _ = event;
        ack.finish(false);
    }

    /// A pointer motion event arrived on the session's input channel.
    fn motion_event(&mut self, event: MotionEvent, ack: EventAck) {
        let _ = event;
        ack.finish(false);
    }

    /// A trackball event arrived on the session's input channel.
    fn trackball_event(&mut self, event: MotionEvent, ack: EventAck) {
        let _ = event;
        ack.finish(false);
    }

    /// Append human-readable internal state to a dump requested through
    /// [`SessionProxy::dump`](crate::SessionProxy::dump).
    fn dump(&mut self, w: &mut dyn fmt::Write, args: &[String]) -> fmt::Result {
        let _ = (w, args);
        Ok(())
    }
}
