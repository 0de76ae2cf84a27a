use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A logical change stream for one tracked resource type.
///
/// The registry is closed: ids and names are part of the storage layout and
/// must never be reassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Channel {
  PhysicalMeasurements = 1,
  BiobankOrders = 2,
}

impl Channel {
  pub const ALL: [Channel; 2] = [Channel::PhysicalMeasurements, Channel::BiobankOrders];

  pub fn id(self) -> u8 {
    self as u8
  }

  pub fn name(self) -> &'static str {
    match self {
      Channel::PhysicalMeasurements => "physical_measurements",
      Channel::BiobankOrders => "biobank_orders",
    }
  }
}

impl TryFrom<u8> for Channel {
  type Error = Error;

  fn try_from(id: u8) -> Result<Self> {
    Channel::ALL
      .into_iter()
      .find(|c| c.id() == id)
      .ok_or_else(|| Error::UnknownChannel(id.to_string()))
  }
}

impl FromStr for Channel {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    Channel::ALL
      .into_iter()
      .find(|c| c.name() == s)
      .ok_or_else(|| Error::UnknownChannel(s.to_string()))
  }
}

impl fmt::Display for Channel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}
