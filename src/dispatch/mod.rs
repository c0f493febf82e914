//! Cluster-aware execution dispatch.
//!
//! When a job fires on the leader, the dispatcher resolves the job's
//! tag expression into a set of live members, broadcasts a `run:job`
//! query to exactly that set, and collects per-member acks. Members
//! that never ack stay in a residual set that is re-broadcast to, up
//! to a fixed retry bound; delivery is at-least-once and idempotency
//! belongs to the execution layer.

pub mod dispatcher;
pub mod payload;
pub mod targets;

pub use dispatcher::Dispatcher;
pub use payload::{RunQueryParam, QUERY_EXECUTION_DONE, QUERY_RUN_JOB};
pub use targets::{select_targets, ResolvedTargets};
