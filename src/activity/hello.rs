// src/activity/hello.rs

//! Activity greeting someone by name.
//!
//! Inputs: `name`, `salutation`. The result text uses both, but the
//! published envelope is always [`HELLO_PAYLOAD`]: the inputs never reach
//! the bus. This has been the activity's observable behavior from the start
//! and is kept as is until its owners decide otherwise.

use super::{string_input, ActivityContext, EnvelopeMapping, PublishActivity, Relay};
use crate::{Fields, PublishOnceClient, Result};

/// Message text published by every [`HelloActivity`] evaluation.
pub const HELLO_PAYLOAD: &str = "hello world earth";

/// Realm endpoint used when none is configured.
pub const DEFAULT_HELLO_ENDPOINT: &str = "http://localhost:8080";

/// Mapping for [`HelloActivity`].
#[derive(Debug, Clone)]
pub struct HelloMapping {
    endpoint: String,
}

impl HelloMapping {
    /// Publish to `endpoint` instead of [`DEFAULT_HELLO_ENDPOINT`].
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Default for HelloMapping {
    fn default() -> Self {
        Self::with_endpoint(DEFAULT_HELLO_ENDPOINT)
    }
}

impl EnvelopeMapping for HelloMapping {
    fn name(&self) -> &str {
        "hello"
    }

    fn relay(&self, ctx: &dyn ActivityContext) -> Result<Relay> {
        // ---
        let name = string_input(ctx, "name")?;
        let salutation = string_input(ctx, "salutation")?;

        Ok(Relay {
            endpoint: self.endpoint.clone(),
            fields: Fields::new()
                .with("type", "hello")
                .with("message", HELLO_PAYLOAD),
            result: format!("The Flogo engine says {salutation} to {name}"),
        })
    }
}

pub type HelloActivity = PublishActivity<HelloMapping>;

impl HelloActivity {
    /// Hello activity publishing to [`DEFAULT_HELLO_ENDPOINT`] with a default client.
    pub fn with_defaults() -> Self {
        PublishActivity::new(HelloMapping::default(), PublishOnceClient::default())
    }
}
