use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One committed write in a partition.
///
/// `position` is 1-based and dense within its partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
  pub position: u64,
  pub participant_id: String,
  pub resource: Value,
}

impl LogEntry {
  pub fn new(position: u64, participant_id: impl Into<String>, resource: Value) -> Self {
    Self {
      position,
      participant_id: participant_id.into(),
      resource,
    }
  }
}
