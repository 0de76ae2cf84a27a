use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
  #[error("Configuration Error: {0}")]
  Configuration(String),

  #[error("Write conflict on {channel} partition {partition}: gave up after {attempts} attempts")]
  WriteConflict {
    channel: String,
    partition: u32,
    attempts: u32,
  },

  #[error("Malformed pagination token: {0}")]
  MalformedToken(String),

  #[error("Invalid argument: {0}")]
  InvalidArgument(String),

  #[error("Unknown channel: {0}")]
  UnknownChannel(String),

  #[error("I/O Error: {0}")]
  Io(#[from] io::Error),

  #[error("Data Corruption: {0}")]
  Corruption(String),

  #[error("CRC32 Checksum Mismatch: expected {expected:#x}, got {actual:#x} at offset {offset}")]
  CrcMismatch { expected: u32, actual: u32, offset: u64 },

  #[error("Serialization Error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// True when the whole operation may be retried unchanged.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::WriteConflict { .. } | Self::Io(_))
  }

  /// True for failures caused by the caller's input (4xx class). Everything
  /// else is a server-side failure.
  pub fn is_client_error(&self) -> bool {
    matches!(
      self,
      Self::InvalidArgument(_) | Self::MalformedToken(_) | Self::UnknownChannel(_)
    )
  }

  /// Static label for log fields.
  pub fn kind_label(&self) -> &'static str {
    match self {
      Self::Configuration(_) => "configuration",
      Self::WriteConflict { .. } => "write_conflict",
      Self::MalformedToken(_) => "malformed_token",
      Self::InvalidArgument(_) => "invalid_argument",
      Self::UnknownChannel(_) => "unknown_channel",
      Self::Io(_) => "io",
      Self::Corruption(_) => "corruption",
      Self::CrcMismatch { .. } => "crc_mismatch",
      Self::Serialization(_) => "serialization",
    }
  }
}
