//! Unit tests for the supervisor domain and engine.
