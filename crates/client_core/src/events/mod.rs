//! In-process publish/subscribe bus with two delivery contracts:
//! [`SystemEventDispatcher::post`] (deferred fan-out) and
//! [`SystemEventDispatcher::send`] (sequential, settles or rejects).

mod dispatcher;
mod handler;
mod registry;

pub use dispatcher::{DeliveryHandle, PostReceipt, SendError, SendOutcome, SystemEventDispatcher};
pub use handler::{handler_fn, FnHandler, HandlerRef, SystemEvent, SystemEventHandler};
pub use registry::{HandlerRecord, RegistrationError, SystemEventHandlerRegistry};
