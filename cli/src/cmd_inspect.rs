//! Store inspection and operator commands: `status`, `backfill`, `verify`,
//! `query`, `networks`.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;

use l2index_core::{ChainDescriptor, CheckpointRecord, CheckpointStore, Network};
use l2index_monitor::{backfill as rewind_store, MonitorBuilder};

use crate::config::AppConfig;

#[derive(Debug, Serialize)]
struct StatusRow {
    network: Network,
    cursor: u64,
    records: u64,
    latest_l2_block: Option<u64>,
    latest_l1_block: Option<u64>,
}

async fn open_store(config: &AppConfig) -> Result<Arc<dyn CheckpointStore>> {
    let url = config.shared_store_url()?;
    l2index_storage::connect(url)
        .await
        .with_context(|| format!("connect to store {}", l2index_storage::redact(url)))
}

/// The configured descriptor for `network`, else the built-in one.
fn descriptor_for(config: &AppConfig, network: Network) -> Result<ChainDescriptor> {
    match config.monitor(network) {
        Some(monitor) => Ok(monitor.descriptor()?),
        None => ChainDescriptor::builtin(network)
            .ok_or_else(|| anyhow!("{network} has no built-in contract; configure it in the monitors list")),
    }
}

fn print_record(record: &CheckpointRecord, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(record)?);
        return Ok(());
    }
    println!("Network:      {}", record.network);
    println!("L2 block:     {}", record.l2_block_number);
    if let Some(index) = record.l2_output_index {
        println!("Output index: {index}");
    }
    if let Some(hash) = record.l2_block_hash {
        println!("L2 hash:      {hash}");
    }
    println!("Output root:  {}", record.output_root);
    println!("L1 block:     {} ({})", record.l1_block_number, record.l1_block_hash);
    println!("L1 tx:        {} (log {})", record.l1_tx_hash, record.log_index);
    if let Some(ts) = record.l1_timestamp {
        println!("L1 timestamp: {ts}");
    }
    println!("Observed at:  {}", record.observed_at);
    Ok(())
}

pub async fn status(config: &AppConfig, json: bool) -> Result<()> {
    let store = open_store(config).await?;
    let mut rows = Vec::new();
    for cursor in store.list_cursors().await? {
        let latest = store.latest_checkpoint(cursor.network).await?;
        rows.push(StatusRow {
            network: cursor.network,
            cursor: cursor.block_number,
            records: store.count(cursor.network).await?,
            latest_l2_block: latest.as_ref().map(|r| r.l2_block_number),
            latest_l1_block: latest.as_ref().map(|r| r.l1_block_number),
        });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("No cursors stored yet.");
        return Ok(());
    }
    println!(
        "{:<20} {:>12} {:>10} {:>14} {:>12}",
        "NETWORK", "CURSOR", "RECORDS", "LATEST L2", "AT L1"
    );
    for row in rows {
        let dash = || "-".to_string();
        println!(
            "{:<20} {:>12} {:>10} {:>14} {:>12}",
            row.network.to_string(),
            row.cursor,
            row.records,
            row.latest_l2_block.map_or_else(dash, |b| b.to_string()),
            row.latest_l1_block.map_or_else(dash, |b| b.to_string()),
        );
    }
    Ok(())
}

pub async fn backfill(config: &AppConfig, network: Network, to_block: u64) -> Result<()> {
    let descriptor = descriptor_for(config, network)?;
    let store = open_store(config).await?;
    let event = rewind_store(store.as_ref(), &descriptor, to_block).await?;
    println!(
        "{network}: cursor set to {}, {} record(s) deleted, {} block(s) will be rescanned",
        event.rewind_to, event.deleted, event.depth
    );
    Ok(())
}

pub async fn verify(config: &AppConfig, network: Network, apply: bool) -> Result<()> {
    let monitor_config = config
        .monitor(network)
        .cloned()
        .ok_or_else(|| anyhow!("{network} is not configured; verify needs its RPC endpoints"))?;
    let mut monitor = MonitorBuilder::from_config(monitor_config)
        .build()
        .await
        .with_context(|| format!("build monitor for {network}"))?;
    let cursor = monitor.current_cursor().await?;

    if apply {
        match monitor.check_reorgs(&cursor).await? {
            Some(event) => println!(
                "{network}: {} at L1 block {}, rewound to {} ({} record(s) deleted)",
                event.kind, event.first_invalid, event.rewind_to, event.deleted
            ),
            None => match monitor.status().last_error {
                Some(e) => println!("{network}: mismatch found but not applied: {e}"),
                None => println!("{network}: stored anchors match the canonical chain"),
            },
        }
        return Ok(());
    }

    match monitor.detect_reorg(&cursor).await? {
        Some(anchor) => println!(
            "{network}: stored L1 block {} ({}) is no longer canonical; rerun with --apply to rewind",
            anchor.block_number, anchor.block_hash
        ),
        None => println!(
            "{network}: stored anchors up to L1 block {} match the canonical chain",
            cursor.block_number
        ),
    }
    Ok(())
}

pub async fn query(config: &AppConfig, network: Network, l2_block: u64, json: bool) -> Result<()> {
    let store = open_store(config).await?;
    match store.find_checkpoint(network, l2_block).await? {
        Some(record) => print_record(&record, json),
        None if json => {
            println!("null");
            Ok(())
        }
        None => {
            println!("{network}: no checkpoint at or after L2 block {l2_block} yet");
            Ok(())
        }
    }
}

pub fn networks(json: bool) -> Result<()> {
    let descriptors = ChainDescriptor::builtins();
    if json {
        println!("{}", serde_json::to_string_pretty(&descriptors)?);
        return Ok(());
    }
    println!(
        "{:<20} {:<9} {:<44} {:>12} {:>6}",
        "NETWORK", "FAMILY", "CONTRACT", "DEPLOYED AT", "DEPTH"
    );
    for d in descriptors {
        println!(
            "{:<20} {:<9} {:<44} {:>12} {:>6}",
            d.network.to_string(),
            d.family.as_str(),
            d.contract.to_string(),
            d.deployment_block,
            d.confirmation_depth
        );
    }
    Ok(())
}
