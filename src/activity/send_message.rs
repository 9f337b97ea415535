// src/activity/send_message.rs

//! Activity relaying a caller-supplied message to a caller-supplied realm.
//!
//! Inputs: `url` (realm server endpoint), `message` (text to relay).
//! Envelope: `{type: "hello", message: <message>}`.

use super::{string_input, ActivityContext, EnvelopeMapping, PublishActivity, Relay};
use crate::{Fields, PublishOnceClient, Result};

/// Mapping for [`SendMessageActivity`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SendMessageMapping;

impl EnvelopeMapping for SendMessageMapping {
    fn name(&self) -> &str {
        "send-message"
    }

    fn relay(&self, ctx: &dyn ActivityContext) -> Result<Relay> {
        // ---
        let url = string_input(ctx, "url")?;
        let message = string_input(ctx, "message")?;

        // The missing space before the url is part of the published output text.
        let result = format!("The Flogo engine sent the message {message} to the url{url}");
        let fields = Fields::new().with("type", "hello").with("message", message);

        Ok(Relay {
            endpoint: url,
            fields,
            result,
        })
    }
}

pub type SendMessageActivity = PublishActivity<SendMessageMapping>;

impl SendMessageActivity {
    /// Send-message activity with a default client.
    pub fn with_defaults() -> Self {
        PublishActivity::new(SendMessageMapping, PublishOnceClient::default())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::activity::MapContext;

    #[test]
    fn test_relay_builds_envelope_and_result() {
        // ---
        let ctx = MapContext::new()
            .with_input("url", "http://localhost:8080")
            .with_input("message", "ping");

        let relay = SendMessageMapping.relay(&ctx).unwrap();

        assert_eq!(relay.endpoint, "http://localhost:8080");
        assert_eq!(
            relay.fields,
            Fields::new().with("type", "hello").with("message", "ping")
        );
        assert_eq!(
            relay.result,
            "The Flogo engine sent the message ping to the urlhttp://localhost:8080"
        );
    }

    #[test]
    fn test_missing_message_is_input_error() {
        // ---
        let ctx = MapContext::new().with_input("url", "http://localhost:8080");
        let err = SendMessageMapping.relay(&ctx).unwrap_err();
        assert!(err.is_input_error());
    }
}
