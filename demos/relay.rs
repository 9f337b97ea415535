//! Run both activities against a local TCP realm server.
//!
//! ```text
//! RUST_LOG=realm_publisher=debug cargo run --example relay -- "status ok"
//! ```

use realm_publisher::activity::{
    Activity, HelloMapping, MapContext, PublishActivity, SendMessageActivity, RESULT_OUTPUT,
};
use realm_publisher::{PublishOnceClient, Result, TcpRealmServer};

#[tokio::main]
async fn main() {
    // ---
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // A failed publish is fatal for this host.
    if let Err(e) = run().await {
        tracing::error!("relay failed: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // ---
    let message = std::env::args().nth(1).unwrap_or_else(|| "ping".to_owned());

    let server = TcpRealmServer::bind("127.0.0.1:0").await?;
    let mut sub = server.subscribe("default").await;
    let url = format!("http://{}", server.local_addr());

    let send = SendMessageActivity::with_defaults();
    let mut ctx = MapContext::new()
        .with_input("url", url.as_str())
        .with_input("message", message);
    send.eval(&mut ctx).await?;
    println!("{}: {}", send.name(), result_text(&ctx));

    let hello = PublishActivity::new(
        HelloMapping::with_endpoint(url),
        PublishOnceClient::default(),
    );
    let mut ctx = MapContext::new()
        .with_input("name", "Ada")
        .with_input("salutation", "hello");
    hello.eval(&mut ctx).await?;
    println!("{}: {}", hello.name(), result_text(&ctx));

    for _ in 0..2 {
        if let Some(delivered) = sub.inbox.recv().await {
            println!(
                "server received from {} on {}: {}",
                delivered.client_id, delivered.endpoint_name, delivered.message
            );
        }
    }

    server.shutdown().await;
    Ok(())
}

fn result_text(ctx: &MapContext) -> &str {
    ctx.output(RESULT_OUTPUT)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
}
