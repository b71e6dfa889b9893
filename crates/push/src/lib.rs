//! Best-effort push of delegation lifecycle events to connected clients.
//!
//! The [`Dispatcher`] is a process-scoped registry keyed by employee code.
//! Consumers register a per-session [`Subscription`] explicitly and
//! unregister it at logout; there is no ambient global state. Delivery is
//! at-least-once to whatever connections the affected delegatee currently
//! has open, and silently dropped when none are. There is no offline queue,
//! because access decisions re-check expiry independently and the event is
//! only a hint to re-fetch authoritative state.

mod dispatcher;
mod event;

pub use dispatcher::{ConnectionId, Dispatcher, Subscription};
pub use event::PushEvent;
