//! # Check Command
//!
//! 对配置的后端做一次完整的读写检查。

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::info;

use super::{open, Output, Target};

pub const CHECK_KEY: &str = "test";

pub fn check_document() -> Value {
    json!({"dis": "is", "just": "a-test"})
}

pub async fn run(target: Target, output: &Output) -> Result<()> {
    println!("🔍 Checking '{}' backend", target.kind);
    if let Some(address) = &target.settings.storage_address {
        println!("  Address: {}", address);
    }

    let store = open(target).await?;
    println!("  ✅ init");

    let durable = store
        .set(CHECK_KEY, check_document())
        .await
        .context("buffering the test document")?;
    durable.await.context("persisting the test document")?;
    println!("  ✅ set");

    let value = store.get(CHECK_KEY).await.context("reading the test document")?;
    println!("  ✅ get");
    output.value(&value)?;

    if value != check_document() {
        anyhow::bail!("read back {} instead of the written document", value);
    }

    store.shutdown().await.context("draining the write buffer")?;
    store.close().await.context("closing the backend")?;
    println!("  ✅ close");
    info!("Backend check passed");
    println!("done");
    Ok(())
}
