// src/activity/publish.rs

use serde_json::Value;

use super::{Activity, ActivityContext};
use crate::{Fields, PublishOnceClient, Result};

/// Output written by publish activities.
pub const RESULT_OUTPUT: &str = "result";

/// What one evaluation relays to the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct Relay {
    /// Realm server endpoint.
    pub endpoint: String,
    /// Envelope to publish.
    pub fields: Fields,
    /// Text written to the `result` output after a successful publish.
    pub result: String,
}

/// Maps activity inputs to a [`Relay`].
pub trait EnvelopeMapping: Send + Sync {
    /// Activity name.
    fn name(&self) -> &str;

    /// Read inputs and decide what to publish.
    fn relay(&self, ctx: &dyn ActivityContext) -> Result<Relay>;
}

/// Activity that publishes one message per evaluation.
///
/// On success the mapping's result text is written to [`RESULT_OUTPUT`] and
/// the activity reports done. On failure nothing is written and the error is
/// returned to the host, which decides whether to retry, skip or abort.
pub struct PublishActivity<M> {
    mapping: M,
    client: PublishOnceClient,
}

impl<M: EnvelopeMapping> PublishActivity<M> {
    pub fn new(mapping: M, client: PublishOnceClient) -> Self {
        Self { mapping, client }
    }

    pub fn mapping(&self) -> &M {
        &self.mapping
    }

    pub fn client(&self) -> &PublishOnceClient {
        &self.client
    }
}

#[async_trait::async_trait]
impl<M: EnvelopeMapping> Activity for PublishActivity<M> {
    // ---
    fn name(&self) -> &str {
        self.mapping.name()
    }

    async fn eval(&self, ctx: &mut dyn ActivityContext) -> Result<bool> {
        // ---
        let relay = self.mapping.relay(&*ctx)?;
        self.client.publish(&relay.endpoint, &relay.fields).await?;

        ctx.set_output(RESULT_OUTPUT, Value::String(relay.result));
        Ok(true)
    }
}
