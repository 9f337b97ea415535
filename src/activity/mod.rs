// src/activity/mod.rs

//! Flow engine activities.
//!
//! A host flow engine drives an activity by handing it a context: named
//! inputs come in, named outputs go out, and `eval` reports whether the
//! activity is done. This module defines that seam ([`ActivityContext`],
//! [`Activity`]) and the activities built on the publish client.
//!
//! Both shipped activities are the same [`PublishActivity`] with a different
//! [`EnvelopeMapping`]; the mapping decides endpoint, envelope and result
//! text, the activity owns the publish and the output write.

mod hello;
mod publish;
mod send_message;

use std::collections::HashMap;

use serde_json::Value;

use crate::{PublishError, Result};

pub use hello::{HelloActivity, HelloMapping, DEFAULT_HELLO_ENDPOINT, HELLO_PAYLOAD};
pub use publish::{EnvelopeMapping, PublishActivity, Relay, RESULT_OUTPUT};
pub use send_message::{SendMessageActivity, SendMessageMapping};

/// Input and output access provided by the host engine.
pub trait ActivityContext: Send {
    /// Value of the named input, if the engine supplied one.
    fn input(&self, name: &str) -> Option<&Value>;

    /// Record a named output.
    fn set_output(&mut self, name: &str, value: Value);
}

/// Read a string input.
///
/// # Errors
///
/// [`PublishError::MissingOrWrongTypeInput`] if the input is absent or not a
/// JSON string.
pub fn string_input(ctx: &dyn ActivityContext, name: &str) -> Result<String> {
    // ---
    match ctx.input(name) {
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(PublishError::MissingOrWrongTypeInput(name.to_owned())),
    }
}

/// A unit of work the host engine can evaluate.
#[async_trait::async_trait]
pub trait Activity: Send + Sync {
    /// Identifier used in logs and by the host registry.
    fn name(&self) -> &str;

    /// Run the activity once. `Ok(true)` signals completion.
    async fn eval(&self, ctx: &mut dyn ActivityContext) -> Result<bool>;
}

/// Evaluate an activity from synchronous host code.
///
/// Builds a current-thread runtime for the duration of the call.
///
/// # Errors
///
/// [`PublishError::BlockingInRuntime`] when called from within an async
/// runtime; async hosts call [`Activity::eval`] directly.
pub fn eval_blocking(activity: &dyn Activity, ctx: &mut dyn ActivityContext) -> Result<bool> {
    // ---
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(PublishError::BlockingInRuntime);
    }
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(activity.eval(ctx))
}

/// In-memory [`ActivityContext`], for hosts that keep values in maps and
/// for tests.
///
/// # Example
///
/// ```
/// use realm_publisher::activity::{string_input, MapContext};
///
/// let ctx = MapContext::new().with_input("name", "Ada");
/// assert_eq!(string_input(&ctx, "name").unwrap(), "Ada");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MapContext {
    inputs: HashMap<String, Value>,
    outputs: HashMap<String, Value>,
}

impl MapContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an input (builder style).
    pub fn with_input(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.insert(name.into(), value.into());
        self
    }

    pub fn output(&self, name: &str) -> Option<&Value> {
        self.outputs.get(name)
    }

    pub fn outputs(&self) -> &HashMap<String, Value> {
        &self.outputs
    }
}

impl ActivityContext for MapContext {
    fn input(&self, name: &str) -> Option<&Value> {
        self.inputs.get(name)
    }

    fn set_output(&mut self, name: &str, value: Value) {
        self.outputs.insert(name.to_owned(), value);
    }
}
