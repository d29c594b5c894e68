//! Unit tests for the task store and lease-based dequeue.
