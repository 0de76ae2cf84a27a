//! # synclog
//!
//! `synclog` is a sharded synchronization log. It lets external consumers page
//! through every write to a resource type ("channel") in order, resuming
//! safely across calls, while writers keep appending concurrently.
//!
//! ## Key Features
//!
//! * **Stable Routing**: Participants map to partitions with CRC32.
//! * **Dense Positions**: Each partition numbers its entries 1, 2, 3, ... via
//!   a compare-and-swap commit on the partition counter.
//! * **Stateless Cursors**: Pagination tokens carry one position per
//!   partition; a token from another shard count triggers a full resync.
//! * **Durable Storage**: CRC32-framed entry logs with torn-tail recovery.
//!
//! ## Example
//!
//! ```no_run
//! use synclog::{Channel, SyncLog, SyncLogOptions};
//! use serde_json::json;
//!
//! # fn main() -> synclog::Result<()> {
//! let log = SyncLog::open(SyncLogOptions::default())?;
//!
//! log.append(Channel::BiobankOrders, "P123", json!({"order": "A-1"}))?;
//!
//! let page = log.sync(Channel::BiobankOrders, None, 100)?;
//! let next = log.sync(Channel::BiobankOrders, Some(&page.token), 100)?;
//! # Ok(())
//! # }
//! ```

mod channel;
mod config;
mod entry;
mod error;
mod frame;
mod reader;
mod state;
mod sync_log;
mod util;
mod writer;

pub mod router;
pub mod store;
pub mod token;

// Re-exports for the flat public API
pub use channel::Channel;
pub use config::{CachedShardCount, CorruptionPolicy, FixedShardCount, ShardCountSource, SyncLogOptions, SyncMode};
pub use entry::LogEntry;
pub use error::{Error, Result};
pub use reader::{Reader, SyncPage};
pub use sync_log::SyncLog;
pub use writer::{AppendReceipt, Writer};
