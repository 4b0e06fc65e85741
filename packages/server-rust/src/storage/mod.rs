//! Storage for the `schedule-hub` server.
//!
//! Two independent stores back the service:
//!
//! - **Resources** ([`ResourceStore`](crate::traits::ResourceStore)): the
//!   relational rows for schedules, appointments, courses, and memberships.
//!   [`engines::MemoryResourceStore`] is the in-process implementation.
//! - **Operations** ([`OperationStore`]): a time-bounded ledger of async
//!   mutations, read by the status endpoint and written only by the coordinator.

pub mod engines;
pub mod operation_store;

pub use engines::MemoryResourceStore;
pub use operation_store::{
    InMemoryOperationStore, OperationStore, DEFAULT_OPERATION_TTL, MAX_OPERATION_TTL,
};
