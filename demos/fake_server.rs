//! Example demonstrating the in-memory fake server.
//!
//! Run with: cargo run --example fake_server
//!
//! No server is needed. The same generic function runs against the fake
//! connector; swap it for `TcpConnector` to talk to a real server.

use tracing_subscriber::EnvFilter;
use valet::{CfInsertOptions, Client, Connector, Error, FakeClient, FakeConnector, Result};

async fn track_visitors<C: Connector>(client: &Client<C>, visitors: &[&str]) -> Result<Vec<i64>> {
    client
        .cf()
        .insertnx("visitors", visitors, &CfInsertOptions::default().capacity(10_000))
        .await
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("valet=debug")),
        )
        .init();

    let client = Client::<FakeConnector>::connect("localhost", 6000).await?;

    println!("first batch: {:?}", track_visitors(&client, &["ann", "bob"]).await?);
    println!("second batch: {:?}", track_visitors(&client, &["bob", "cy"]).await?);

    let info = client.cf().info("visitors").await?;
    println!("items inserted: {:?}", info.get("insertedNum"));

    // A second client sees the same keyspace when given the same state.
    let other = FakeClient::with_fake_state(client.fake_state().clone()).await?;
    println!("seen by other client: {}", other.cf().exists("visitors", "cy").await?);

    match client.cf().scandump("visitors", 0).await {
        Err(Error::NotImplemented { command }) => println!("{command} is not emulated"),
        other => println!("unexpected: {:?}", other),
    }

    client.fake_state().lock().reset();
    println!("keys after reset: {}", client.fake_state().lock().len());
    Ok(())
}
