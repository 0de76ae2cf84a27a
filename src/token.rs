//! Pagination token codec.
//!
//! A token is the list of last-consumed positions, one per partition, joined
//! with `'|'`. Its arity implicitly records the shard count it was issued
//! under: a token of the wrong arity is a stale token and restarts every
//! partition from zero instead of failing.

use crate::error::{Error, Result};

const SEPARATOR: char = '|';

/// Encodes per-partition positions. `[12, 0, 7]` becomes `"12|0|7"`.
pub fn encode(positions: &[u64]) -> String {
  let mut out = String::with_capacity(positions.len() * 4);
  for (i, position) in positions.iter().enumerate() {
    if i > 0 {
      out.push(SEPARATOR);
    }
    out.push_str(&position.to_string());
  }
  out
}

/// Decodes a token into exactly `shard_count` positions.
///
/// - `None` or `""` yields all zeros.
/// - A token issued under a different shard count yields all zeros.
/// - A component that is not a non-negative decimal fails with
///   `Error::MalformedToken`.
pub fn decode(token: Option<&str>, shard_count: u32) -> Result<Vec<u64>> {
  let fresh = vec![0u64; shard_count as usize];

  let token = match token {
    Some(t) if !t.is_empty() => t,
    _ => return Ok(fresh),
  };

  let parts: Vec<&str> = token.split(SEPARATOR).collect();
  if parts.len() != shard_count as usize {
    tracing::debug!(
      target: "synclog",
      "Token arity {} does not match shard count {}, restarting from zero",
      parts.len(),
      shard_count
    );
    return Ok(fresh);
  }

  parts
    .into_iter()
    .map(|part| {
      // `u64::from_str` accepts a leading '+', which a token we issued never has.
      if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::MalformedToken(token.to_string()));
      }
      part
        .parse::<u64>()
        .map_err(|_| Error::MalformedToken(token.to_string()))
    })
    .collect()
}
