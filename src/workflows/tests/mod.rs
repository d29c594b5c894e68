//! Unit tests for the concrete workflows.
