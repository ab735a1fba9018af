//! Demo client: subscribes to a topic, publishes one message to it and
//! prints everything the hub sends back for ten seconds.
//!
//! ```text
//! cargo run --example wsclient -- [ws://localhost:9999/ws] [topic] [message]
//! ```

use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let mut args = std::env::args().skip(1);
    let url = args
        .next()
        .unwrap_or_else(|| "ws://localhost:9999/ws".to_string());
    let topic = args.next().unwrap_or_else(|| "chat".to_string());
    let text = args
        .next()
        .unwrap_or_else(|| "This is a test message".to_string());

    tracing::info!(%url, "connecting");
    let (ws, _) = connect_async(url.as_str())
        .await
        .with_context(|| format!("connecting to {url}"))?;
    let (mut tx, mut rx) = ws.split();

    let subscribe = json!({"action": "subscribe", "topic": topic});
    tx.send(Message::text(subscribe.to_string())).await?;
    let publish = json!({"action": "publish", "topic": topic, "msg": text});
    tx.send(Message::text(publish.to_string())).await?;

    let receive = async {
        while let Some(message) = rx.next().await {
            match message {
                Ok(Message::Text(text)) => tracing::info!(recv = %text.as_str(), "message"),
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "read failed");
                    break;
                }
            }
        }
    };
    let _ = tokio::time::timeout(Duration::from_secs(10), receive).await;

    tx.send(Message::Close(None)).await.ok();
    Ok(())
}
