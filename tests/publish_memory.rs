// tests/publish_memory.rs

mod common;

use std::time::Duration;

use realm_publisher::{
    // ---
    ErrorCode,
    Fields,
    Library,
    MemoryRealmServer,
    PublishConfig,
    PublishError,
    PublishOnceClient,
    RetryConfig,
    Step,
};

use common::{init_logging, next_delivery, string_fields};

fn ping() -> Fields {
    Fields::new().with("type", "hello").with("message", "ping")
}

#[tokio::test]
async fn test_publish_delivers_envelope_in_order() -> realm_publisher::Result<()> {
    // ---
    init_logging();

    let server = MemoryRealmServer::start("publish-in-order")?;
    let mut sub = server.subscribe("default").await;

    PublishOnceClient::default()
        .publish(&server.endpoint(), &ping())
        .await?;

    let delivered = next_delivery(&mut sub).await;
    assert_eq!(
        string_fields(&delivered),
        vec![
            ("type".to_owned(), "hello".to_owned()),
            ("message".to_owned(), "ping".to_owned()),
        ]
    );
    assert_eq!(delivered.endpoint_name, "default");
    assert_eq!(delivered.app_name, "default");

    // exactly one message, nothing else on the endpoint
    assert!(sub.inbox.try_recv().is_err());

    let ledger = server.ledger();
    assert!(ledger.is_balanced(), "{ledger:?}");
    assert_eq!(ledger.connects, 1);
    assert_eq!(ledger.sends, 1);
    assert_eq!(
        server.release_order(),
        vec![Step::DestroyMessage, Step::ClosePublisher, Step::CloseRealm]
    );
    Ok(())
}

#[tokio::test]
async fn test_publish_with_app_name_and_publisher_endpoint() -> realm_publisher::Result<()> {
    // ---
    init_logging();

    let server = MemoryRealmServer::start("publish-named-endpoint")?;
    let mut named = server.subscribe("alerts").await;
    let mut default = server.subscribe("default").await;

    let config = PublishConfig::default()
        .with_app_name("relay")
        .with_publisher_endpoint("alerts");
    PublishOnceClient::new(config)
        .publish(&server.endpoint(), &ping())
        .await?;

    let delivered = next_delivery(&mut named).await;
    assert_eq!(delivered.endpoint_name, "alerts");
    assert_eq!(delivered.app_name, "relay");
    assert!(default.inbox.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn test_unreachable_realm_fails_at_connect() {
    // ---
    init_logging();

    let err = PublishOnceClient::default()
        .publish("memory://nobody-listens-here", &ping())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PublishError::Bus {
            step: Step::Connect,
            code: ErrorCode::ResourceUnavailable,
            ..
        }
    ));
    assert!(err.is_bus_error());
}

#[tokio::test]
async fn test_every_failing_step_still_releases_everything() {
    // ---
    init_logging();

    let steps = [
        Step::Connect,
        Step::CreatePublisher,
        Step::CreateMessage,
        Step::Send,
        Step::DestroyMessage,
        Step::ClosePublisher,
        Step::CloseRealm,
    ];

    for step in steps {
        let server = MemoryRealmServer::start(format!("fault-{step:?}")).unwrap();
        let mut sub = server.subscribe("default").await;
        server.fail_next(step, ErrorCode::OsError);

        let err = PublishOnceClient::default()
            .publish(&server.endpoint(), &ping())
            .await
            .unwrap_err();

        assert_eq!(err.step(), Some(step), "{err}");
        let ledger = server.ledger();
        assert!(ledger.is_balanced(), "{step}: {ledger:?}");

        // whatever was acquired is released innermost first
        let expected_releases = match step {
            Step::Connect => vec![],
            Step::CreatePublisher => vec![Step::CloseRealm],
            Step::CreateMessage => vec![Step::ClosePublisher, Step::CloseRealm],
            _ => vec![Step::DestroyMessage, Step::ClosePublisher, Step::CloseRealm],
        };
        assert_eq!(server.release_order(), expected_releases, "{step}");

        // a failure before send means nothing was delivered
        let expect_delivery = matches!(
            step,
            Step::DestroyMessage | Step::ClosePublisher | Step::CloseRealm
        );
        assert_eq!(sub.inbox.try_recv().is_ok(), expect_delivery, "{step}");
    }
}

#[tokio::test]
async fn test_send_error_wins_over_later_release_error() {
    // ---
    init_logging();

    let server = MemoryRealmServer::start("fault-send-then-close").unwrap();
    server.fail_next(Step::Send, ErrorCode::OsError);
    server.fail_next(Step::CloseRealm, ErrorCode::OsError);

    let err = PublishOnceClient::default()
        .publish(&server.endpoint(), &ping())
        .await
        .unwrap_err();

    assert_eq!(err.step(), Some(Step::Send));
    assert!(server.ledger().is_balanced());
}

#[tokio::test]
async fn test_repeated_publishes_keep_the_library_usable() -> realm_publisher::Result<()> {
    // ---
    init_logging();

    let server = MemoryRealmServer::start("publish-repeated")?;
    let mut sub = server.subscribe("default").await;
    let client = PublishOnceClient::default();

    for i in 0..10_i64 {
        let fields = Fields::new().with("type", "hello").with("seq", i);
        client.publish(&server.endpoint(), &fields).await?;
    }

    for i in 0..10_i64 {
        let delivered = next_delivery(&mut sub).await;
        assert_eq!(
            delivered.message.get("seq"),
            Some(&realm_publisher::FieldValue::Long(i))
        );
    }

    let ledger = server.ledger();
    assert_eq!(ledger.connects, 10);
    assert!(ledger.is_balanced());
    assert!(Library::open().is_ok());
    Ok(())
}

#[tokio::test]
async fn test_concurrent_publishes_use_independent_connections() -> realm_publisher::Result<()> {
    // ---
    init_logging();

    let server = MemoryRealmServer::start("publish-concurrent")?;
    let mut sub = server.subscribe("default").await;
    let client = PublishOnceClient::default();

    let mut handles = Vec::new();
    for i in 0..8_i64 {
        let client = client.clone();
        let endpoint = server.endpoint();
        handles.push(tokio::spawn(async move {
            let fields = Fields::new().with("seq", i);
            client.publish(&endpoint, &fields).await
        }));
    }
    for h in handles {
        h.await.expect("publish task panicked")?;
    }

    for _ in 0..8 {
        next_delivery(&mut sub).await;
    }
    let ledger = server.ledger();
    assert_eq!(ledger.connects, 8);
    assert!(ledger.is_balanced());
    Ok(())
}

#[tokio::test]
async fn test_credentials_are_presented_on_connect() {
    // ---
    init_logging();

    let server = MemoryRealmServer::start("publish-credentials").unwrap();
    server.require_credentials("ada", "lovelace");

    let err = PublishOnceClient::default()
        .publish(&server.endpoint(), &ping())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PublishError::Bus {
            step: Step::Connect,
            code: ErrorCode::NotPermitted,
            ..
        }
    ));

    let config = PublishConfig::default().with_credentials("ada", "lovelace");
    PublishOnceClient::new(config)
        .publish(&server.endpoint(), &ping())
        .await
        .unwrap();
    assert_eq!(server.ledger().sends, 1);
}

#[tokio::test]
async fn test_falls_back_to_secondary_server() -> realm_publisher::Result<()> {
    // ---
    init_logging();

    let secondary = MemoryRealmServer::start("publish-secondary")?;
    let mut sub = secondary.subscribe("default").await;

    let config = PublishConfig::default().with_secondary_server(secondary.endpoint());
    PublishOnceClient::new(config)
        .publish("memory://publish-primary-is-down", &ping())
        .await?;

    next_delivery(&mut sub).await;
    assert!(secondary.ledger().is_balanced());
    Ok(())
}

#[tokio::test]
async fn test_permission_errors_do_not_fall_back() {
    // ---
    init_logging();

    let primary = MemoryRealmServer::start("publish-primary-locked").unwrap();
    primary.require_credentials("ada", "lovelace");
    let secondary = MemoryRealmServer::start("publish-secondary-unused").unwrap();

    let config = PublishConfig::default().with_secondary_server(secondary.endpoint());
    let err = PublishOnceClient::new(config)
        .publish(&primary.endpoint(), &ping())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PublishError::Bus {
            code: ErrorCode::NotPermitted,
            ..
        }
    ));
    assert_eq!(secondary.ledger().connects, 0);
}

#[tokio::test]
async fn test_transient_connect_failure_is_retried() -> realm_publisher::Result<()> {
    // ---
    init_logging();

    let server = MemoryRealmServer::start("publish-retry")?;
    server.fail_next(Step::Connect, ErrorCode::ResourceUnavailable);

    let retry = RetryConfig {
        max_attempts: 2,
        initial_delay: Duration::from_millis(5),
        ..Default::default()
    };
    PublishOnceClient::new(PublishConfig::default().with_retry(retry))
        .publish(&server.endpoint(), &ping())
        .await?;

    let ledger = server.ledger();
    assert_eq!(ledger.connects, 1);
    assert_eq!(ledger.sends, 1);
    Ok(())
}

#[tokio::test]
async fn test_without_retry_a_transient_failure_is_returned() {
    // ---
    init_logging();

    let server = MemoryRealmServer::start("publish-no-retry").unwrap();
    server.fail_next(Step::Connect, ErrorCode::ResourceUnavailable);

    let err = PublishOnceClient::default()
        .publish(&server.endpoint(), &ping())
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(server.ledger().connects, 0);
}

#[tokio::test]
async fn test_stopped_server_is_unreachable() {
    // ---
    init_logging();

    let server = MemoryRealmServer::start("publish-stopped").unwrap();
    let endpoint = server.endpoint();
    server.shutdown().await;

    let err = PublishOnceClient::default()
        .publish(&endpoint, &ping())
        .await
        .unwrap_err();
    assert_eq!(err.step(), Some(Step::Connect));
}

#[tokio::test]
async fn test_oversized_opaque_is_rejected_before_connecting() {
    // ---
    init_logging();

    let server = MemoryRealmServer::start("publish-oversized").unwrap();
    let blob = bytes::Bytes::from(vec![0u8; realm_publisher::MAX_OPAQUE_LEN + 1]);
    let fields = Fields::new().with("blob", blob);

    let err = PublishOnceClient::default()
        .publish(&server.endpoint(), &fields)
        .await
        .unwrap_err();

    assert!(matches!(err, PublishError::InvalidField { .. }));
    assert_eq!(server.ledger().connects, 0);
}

#[tokio::test]
async fn test_stalled_subscriber_does_not_hold_up_publishers() -> realm_publisher::Result<()> {
    // ---
    init_logging();

    let server = MemoryRealmServer::start("publish-stalled-subscriber")?;
    let _stalled = server.subscribe("default").await;

    let client = PublishOnceClient::new(
        PublishConfig::default().with_send_timeout(Duration::from_millis(200)),
    );
    for i in 0..70_i64 {
        let fields = Fields::new().with("type", "hello").with("seq", i);
        client.publish(&server.endpoint(), &fields).await?;
    }

    let ledger = server.ledger();
    assert_eq!(ledger.sends, 70);
    assert!(ledger.is_balanced());
    Ok(())
}
