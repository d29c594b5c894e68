//! Startup-resolved handler registry.

mod registry;

pub use registry::{HandlerRegistry, HandlerRegistryBuilder, RegistryError};
