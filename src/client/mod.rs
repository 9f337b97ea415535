//! Publish client.
//!
//! [`PublishOnceClient`] turns a sequence of bus calls into one typed,
//! fallible operation. It depends only on the domain-level bus traits;
//! concrete connectors come from [`crate::bus`].

mod publish_once;

pub use publish_once::PublishOnceClient;
