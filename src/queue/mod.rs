//! # Request Queue
//!
//! FIFO admission of analysis work under a fixed parallelism ceiling.
//!
//! Dispatch is event driven: enqueueing, starting and completing a task each
//! run one dispatch pass, which admits the front task when a slot is free and
//! no other admitted task is still waiting for its first poll. No polling
//! loop is involved. If the runtime shuts down under a running task, the queue
//! closes and drops what is still pending.
//!
//! ```rust
//! use analysis_orchestrator::queue::{QueueConfig, RequestQueue};
//!
//! # async fn demo() -> analysis_orchestrator::Result<()> {
//! let queue = RequestQueue::new(QueueConfig::new().with_max_concurrency(2));
//! let value = queue.enqueue(async { Ok(40 + 2) }).await?;
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```

mod request_queue;

pub use request_queue::{QueueConfig, QueueStats, RequestQueue};
