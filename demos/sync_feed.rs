//! Example: a partner system following the biobank order feed
//!
//! This example demonstrates:
//! - Appending clinical resources with automatic partitioning
//! - Paging through a channel with an opaque token
//! - Resuming from a saved token after new writes
//! - The full resync that follows a shard-count change

use serde_json::json;
use synclog::{Channel, SyncLog, SyncLogOptions};
use tracing_subscriber::EnvFilter;

fn main() -> synclog::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("synclog=info")))
    .init();

  println!("=== synclog Example ===\n");

  let root = std::env::temp_dir().join("synclog_example");
  let _ = std::fs::remove_dir_all(&root);

  // 1. Open a log with 4 partitions per channel
  let mut opts = SyncLogOptions::new(&root);
  opts.shard_count = 4;
  let log = SyncLog::open(opts.clone())?;
  println!("✓ Opened log with 4 partitions at {}", root.display());

  // 2. Record some biobank orders
  println!("\n--- Writing Orders ---");
  for i in 0..25 {
    let participant = format!("P{}", 1000 + i);
    let receipt = log.append(Channel::BiobankOrders, &participant, json!({"order": i, "participant": participant}))?;
    if i < 3 {
      println!("  {} -> partition {}, position {}", participant, receipt.partition, receipt.position);
    }
  }
  println!("  ... (wrote 25 orders total)");

  // 3. Page through the feed
  println!("\n--- Paging ---");
  let mut token: Option<String> = None;
  let mut pages = 0;
  loop {
    let page = log.sync(Channel::BiobankOrders, token.as_deref(), 8)?;
    pages += 1;
    println!(
      "  page {}: {} resources, token {:?}, more: {}",
      pages,
      page.resources.len(),
      page.token,
      page.more_available
    );
    token = Some(page.token);
    if !page.more_available {
      break;
    }
  }

  // 4. Resume from the saved token
  println!("\n--- Resuming ---");
  log.append(Channel::BiobankOrders, "P2000", json!({"order": 25}))?;
  let page = log.sync(Channel::BiobankOrders, token.as_deref(), 8)?;
  println!("  resumed with {} new resource(s): {:?}", page.resources.len(), page.resources);
  let saved = page.token;

  // 5. A shard-count change forces a full resync
  println!("\n--- Changing Shard Count ---");
  drop(log);
  opts.shard_count = 2;
  let log = SyncLog::open(opts)?;
  let page = log.sync(Channel::BiobankOrders, Some(&saved), 100)?;
  println!(
    "  old token {:?} restarted from zero: {} resources redelivered, new token {:?}",
    saved,
    page.resources.len(),
    page.token
  );

  std::fs::remove_dir_all(&root)?;
  println!("\n✓ Cleaned up");

  Ok(())
}
