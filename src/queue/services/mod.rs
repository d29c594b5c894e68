//! Application services for enqueueing, claiming, and settling tasks.

mod dequeue;

pub use dequeue::{
    DEFAULT_LEASE_SECS, QueueError, QueueResult, QueueService, SharedQueueService,
};
