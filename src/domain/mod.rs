//! Domain layer public interface.
//!
//! This module defines the message and bus abstractions that are independent
//! of any concrete bus, wire protocol, or host engine.
//!
//! All domain consumers must import symbols via this module, not by
//! referencing individual files directly.

mod bus;
mod message;

// --- Bus domain re-exports ---

pub use bus::{
    //
    ClientId,
    Connector,
    ConnectorPtr,
    DeliveredMessage,
    Publisher,
    PublisherPtr,
    Realm,
    RealmPtr,
    SubscriptionHandle,
    DEFAULT_ENDPOINT_NAME,
};

// --- Message domain re-exports ---

pub use message::{
    //
    validate_field,
    FieldValue,
    Fields,
    Message,
    MAX_FIELD_NAME_LEN,
    MAX_OPAQUE_LEN,
};
