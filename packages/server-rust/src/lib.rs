//! `schedule-hub` server: scheduling CRUD over HTTP with tracked async
//! mutations and best-effort change notifications.

pub mod network;
pub mod publish;
pub mod service;
pub mod storage;
pub mod traits;

pub use network::{NetworkConfig, NetworkModule};
pub use publish::{HttpPublisher, InMemoryPublisher, LogPublisher};
pub use service::{ServiceConfig, Services};
pub use traits::{ListFilter, Publisher, ResourceStore, StoreError, SubscriptionProtocol};
