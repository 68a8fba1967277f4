//! # Refresh Engine
//!
//! Small concurrency primitives the `IndicatorStore` is assembled from. None
//! of them know anything about indicators.
//!
//! - **`registry`**: per-key in-flight fetch registry. A second request for a
//!   key that is already loading joins the running fetch instead of starting
//!   another one.
//! - **`dispatcher`**: synchronous subscriber fan-out with explicit
//!   unsubscribe handles.
//! - **`scheduler`**: cancellable fixed-interval tasks, one per key, grouped
//!   under a root `CancellationToken`.

/// Subscriber fan-out.
pub mod dispatcher;
/// In-flight fetch coalescing.
pub mod registry;
/// Cancellable recurring tasks.
pub mod scheduler;

pub use dispatcher::{Subscribers, Subscription};
pub use registry::{Inflight, InflightGuard, InflightRegistry};
pub use scheduler::Schedules;
