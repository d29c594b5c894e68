//! Step definitions shared by the workflow behaviour scenarios.

#[path = "../in_memory/helpers.rs"]
#[expect(dead_code, reason = "scenarios use a subset of the integration harness")]
pub mod helpers;

pub mod given;
pub mod then;
pub mod when;
pub mod world;
