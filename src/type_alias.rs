//! Type aliases used in this library.

/// [`u32`]: Session identifier.
/// Distinguishes bound sessions within one [`ServiceHost`](crate::ServiceHost).
pub type SessId = u32;

/// [`u32`]: Input-event sequence number, assigned by the producing
/// [`EventSender`](crate::EventSender) and unique within one channel.
pub type EventSeq = u32;

/// [`u64`]: Opaque binding token attached to a session by the remote side.
pub type BindToken = u64;

/// [`u32`]: Input-method subtype identifier.
pub type SubtypeId = u32;
