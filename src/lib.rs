//! Memoize an async producer behind a single shared result
//!
//! A [`MemoizedTask`] holds at most one pending or resolved outcome of its
//! producer. Concurrent callers share the in-flight future, later callers get
//! the cached value until it expires or is cleared, and every call to
//! [`MemoizedTask::finish`] applies a transform to the shared value.
//!
//! ```
//! use std::time::Duration;
//! use bisect_rs::{MemoizedTask, TaskError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), TaskError> {
//!     let task = MemoizedTask::new(
//!         |user_id: &u32| {
//!             let user_id = *user_id;
//!             Box::pin(async move { Ok(format!("user-{user_id}")) })
//!         },
//!         |name: String, _: &u32| Ok(name.to_uppercase()),
//!     )
//!     .with_expiry(Duration::from_secs(30));
//!
//!     assert_eq!(task.finish(7).await?, "USER-7");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod expiring;
pub mod task;

pub use error::{BoxError, TaskError};
pub use expiring::Expiring;
pub use task::{BoxFut, Bound, MemoizedTask, Pending, TaskConfig};
