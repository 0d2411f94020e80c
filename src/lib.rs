//! A single-threaded remote-call dispatcher with session lifecycle management.
//!
//! Remote-originated calls arrive on arbitrary threads and must execute, in
//! arrival order, against an interface implementation that is not thread
//! safe. This crate bridges the two: a [`SessionProxy`] accepts calls from
//! any thread and a single owner thread drains them against the
//! [`CallTarget`], so the target only ever sees serialized, single-threaded
//! mutation. Sessions are torn down exactly once, input events are always
//! acknowledged, and diagnostic dumps cross threads with a bounded wait.

mod call;
mod event;
mod host;
mod queue;
mod session;
mod target;
pub mod type_alias;
mod util;

#[cfg(test)]
mod tests;

pub use self::call::{
    Call, Completion, DumpReply, EditorInfo, InputBinding, ResultSink, SelectionUpdate,
};
pub use self::event::{
    event_channel, EventAck, EventFeedback, EventReceiver, EventSendError, EventSender,
    InputEvent, KeyEvent, MotionEvent,
};
pub use self::host::{HostError, ServiceHost};
pub use self::session::{DispatchLoop, SessionProxy, SessionWrapper};
pub use self::target::CallTarget;
