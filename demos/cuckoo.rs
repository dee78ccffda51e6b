//! Example demonstrating cuckoo filter commands.
//!
//! Run with: cargo run --example cuckoo
//!
//! Note: This requires a Valkey server with the bloom module loaded on
//! 127.0.0.1:6379. Set `VALET_ADDRESS` to point elsewhere, and `RUST_LOG`
//! (e.g. `RUST_LOG=valet=debug`) to see client logs.

use std::time::Duration;

use tracing_subscriber::EnvFilter;
use valet::{CfInsertOptions, ClientBuilder, Result};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let address =
        std::env::var("VALET_ADDRESS").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    let client = ClientBuilder::new()
        .address(address)
        .max_connections(4)
        .read_timeout(Some(Duration::from_secs(2)))
        .build()
        .await?;

    let cf = client.cf();
    client.del("cuckoo").await?;

    cf.create("cuckoo", 1000).await?;
    println!("add filter: {}", cf.add("cuckoo", "filter").await?);
    println!("addnx filter: {}", cf.addnx("cuckoo", "filter").await?);
    println!("addnx newItem: {}", cf.addnx("cuckoo", "newItem").await?);

    let inserted = cf
        .insert("cuckoo", &["a", "b", "c"], &CfInsertOptions::default())
        .await?;
    println!("insert a b c: {:?}", inserted);

    println!(
        "mexists filter notexist: {:?}",
        cf.mexists("cuckoo", &["filter", "notexist"]).await?
    );
    println!("count filter: {}", cf.count("cuckoo", "filter").await?);
    println!("delete filter: {}", cf.delete("cuckoo", "filter").await?);

    let info = cf.info("cuckoo").await?;
    println!("info: {:#?}", info);

    client.del("cuckoo").await?;
    Ok(())
}
