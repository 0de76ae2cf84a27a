use crate::entry::LogEntry;
use crate::error::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher;
use std::io::{self, Read, Write};

pub const FRAME_MAGIC: u32 = 0x474F_4C53; // "SLOG"

/// The exact binary layout of an entry frame header on disk (22 bytes).
///
/// [Magic: 4]
/// [CRC32: 4]
/// [Position: 8]
/// [Participant Len: 2]
/// [Resource Len: 4]
///
/// The header is followed by the participant id (UTF-8) and the resource
/// (JSON).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
  pub crc: u32,
  pub position: u64,
  pub participant_len: u16,
  pub resource_len: u32,
}

impl FrameHeader {
  pub const SIZE: usize = 4 + 4 + 8 + 2 + 4;

  pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
    writer.write_u32::<LittleEndian>(FRAME_MAGIC)?;
    writer.write_u32::<LittleEndian>(self.crc)?;
    writer.write_u64::<LittleEndian>(self.position)?;
    writer.write_u16::<LittleEndian>(self.participant_len)?;
    writer.write_u32::<LittleEndian>(self.resource_len)?;
    Ok(())
  }

  pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
    let magic = reader.read_u32::<LittleEndian>()?;
    if magic != FRAME_MAGIC {
      return Err(Error::Corruption(format!("Invalid Frame Magic: {:#x}", magic)));
    }

    Ok(Self {
      crc: reader.read_u32::<LittleEndian>()?,
      position: reader.read_u64::<LittleEndian>()?,
      participant_len: reader.read_u16::<LittleEndian>()?,
      resource_len: reader.read_u32::<LittleEndian>()?,
    })
  }

  /// Total on-disk size of the frame, header included.
  pub fn frame_len(&self) -> u64 {
    Self::SIZE as u64 + self.participant_len as u64 + self.resource_len as u64
  }
}

/// Serializes an entry into a complete frame.
pub fn encode(entry: &LogEntry) -> Result<Vec<u8>> {
  let participant = entry.participant_id.as_bytes();
  if participant.len() > u16::MAX as usize {
    return Err(Error::InvalidArgument(format!(
      "participant_id too long: {} bytes (max: {})",
      participant.len(),
      u16::MAX
    )));
  }

  let resource = serde_json::to_vec(&entry.resource)?;
  if resource.len() > u32::MAX as usize {
    return Err(Error::InvalidArgument(format!("resource too large: {} bytes", resource.len())));
  }

  let header = FrameHeader {
    crc: calculate_checksum(entry.position, participant, &resource),
    position: entry.position,
    participant_len: participant.len() as u16,
    resource_len: resource.len() as u32,
  };

  let mut buffer = Vec::with_capacity(header.frame_len() as usize);
  header.write(&mut buffer)?;
  buffer.write_all(participant)?;
  buffer.write_all(&resource)?;
  Ok(buffer)
}

/// Reads and verifies one frame. `offset` is only used for error reporting.
pub fn decode<R: Read>(reader: &mut R, offset: u64) -> Result<(LogEntry, u64)> {
  let header = FrameHeader::read(reader)?;

  let mut participant = vec![0u8; header.participant_len as usize];
  reader.read_exact(&mut participant)?;
  let mut resource = vec![0u8; header.resource_len as usize];
  reader.read_exact(&mut resource)?;

  let actual = calculate_checksum(header.position, &participant, &resource);
  if actual != header.crc {
    return Err(Error::CrcMismatch {
      expected: header.crc,
      actual,
      offset,
    });
  }

  let participant_id = String::from_utf8(participant)
    .map_err(|e| Error::Corruption(format!("Invalid UTF-8 participant id at offset {}: {}", offset, e)))?;
  let resource = serde_json::from_slice(&resource)?;

  Ok((
    LogEntry {
      position: header.position,
      participant_id,
      resource,
    },
    header.frame_len(),
  ))
}

/// CRC32 over everything after the CRC field.
pub fn calculate_checksum(position: u64, participant: &[u8], resource: &[u8]) -> u32 {
  let mut hasher = Hasher::new();
  hasher.update(&position.to_le_bytes());
  hasher.update(&(participant.len() as u16).to_le_bytes());
  hasher.update(&(resource.len() as u32).to_le_bytes());
  hasher.update(participant);
  hasher.update(resource);
  hasher.finalize()
}
