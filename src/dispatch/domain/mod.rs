//! Handler identifiers and queue payload envelopes.

mod envelope;
mod error;
mod handler;

pub use envelope::{FunctionCall, HandlerArgs, SideEffectEnvelope, decode_args};
pub use error::{HandlerError, HandlerResult, ParseHandlerIdError};
pub use handler::HandlerId;
