//! Handler dispatch for queued function calls and provider side effects.
//!
//! Workers never resolve business logic by free-form name. Every callable
//! function is a [`domain::HandlerId`], and the [`services::HandlerRegistry`]
//! maps each identifier to a typed [`ports::FunctionHandler`] at startup.

pub mod domain;
pub mod ports;
pub mod services;
