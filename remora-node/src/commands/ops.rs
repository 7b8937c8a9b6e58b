//! 单次读写命令

use anyhow::{Context, Result};
use remora_core::{NodeConfig, ValuePath};

use super::{finish, open, parse_value, Output, Target};

pub async fn get(config: &NodeConfig, output: &Output, key: &str) -> Result<()> {
    let store = open(Target::from_config(config)).await?;
    let value = store.get(key).await.with_context(|| format!("get {}", key))?;
    output.value(&value)?;
    finish(&store).await
}

pub async fn set(config: &NodeConfig, key: &str, raw: &str) -> Result<()> {
    let value = parse_value(raw)?;
    let store = open(Target::from_config(config)).await?;
    let durable = store.set(key, value).await.with_context(|| format!("set {}", key))?;
    durable.await.with_context(|| format!("persist {}", key))?;
    println!("✅ {} written", key);
    finish(&store).await
}

pub async fn remove(config: &NodeConfig, key: &str) -> Result<()> {
    let store = open(Target::from_config(config)).await?;
    let durable = store.remove(key).await.with_context(|| format!("remove {}", key))?;
    durable.await.with_context(|| format!("persist removal of {}", key))?;
    println!("✅ {} removed", key);
    finish(&store).await
}

pub async fn get_sub(config: &NodeConfig, output: &Output, key: &str, path: &str) -> Result<()> {
    let path: ValuePath = path.parse()?;
    let store = open(Target::from_config(config)).await?;
    let value = store
        .get_sub(key, path.clone())
        .await
        .with_context(|| format!("get {}{}", key, path))?;
    output.value(&value)?;
    finish(&store).await
}

pub async fn set_sub(config: &NodeConfig, key: &str, path: &str, raw: &str) -> Result<()> {
    let path: ValuePath = path.parse()?;
    let value = parse_value(raw)?;
    let store = open(Target::from_config(config)).await?;
    let durable = store
        .set_sub(key, path.clone(), value)
        .await
        .with_context(|| format!("set {}{}", key, path))?;
    durable.await.with_context(|| format!("persist {}", key))?;
    println!("✅ {}{} written", key, path);
    finish(&store).await
}
