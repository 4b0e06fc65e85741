//! [`Publisher`](crate::traits::Publisher) implementations.
//!
//! - [`HttpPublisher`]: posts to a message-broker gateway over HTTP.
//! - [`LogPublisher`]: logs and discards; the default without a broker.
//! - [`InMemoryPublisher`]: records deliveries in process, for tests.

pub mod http;
pub mod log;
pub mod memory;

pub use http::HttpPublisher;
pub use log::LogPublisher;
pub use memory::{Delivery, InMemoryPublisher};
