// tests/common/mod.rs

use std::sync::Once;
use std::time::Duration;

use realm_publisher::{DeliveredMessage, SubscriptionHandle};

static INIT: Once = Once::new();

/// Install a test subscriber once per test binary. Honors `RUST_LOG`.
pub fn init_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Wait for the next delivery, failing the test after a short timeout.
#[allow(dead_code)]
pub async fn next_delivery(sub: &mut SubscriptionHandle) -> DeliveredMessage {
    tokio::time::timeout(Duration::from_secs(2), sub.inbox.recv())
        .await
        .expect("timed out waiting for delivery")
        .expect("subscription closed unexpectedly")
}

/// Field names and string values of a delivered message, in wire order.
#[allow(dead_code)]
pub fn string_fields(delivered: &DeliveredMessage) -> Vec<(String, String)> {
    delivered
        .message
        .iter()
        .map(|(name, value)| {
            let text = value.as_str().expect("string field").to_owned();
            (name.to_owned(), text)
        })
        .collect()
}
