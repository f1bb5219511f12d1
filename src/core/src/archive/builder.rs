//! Serialization of named blobs into a single-disk, stored-mode ZIP.
//!
//! Layout, in order:
//! 1. per entry: 30-byte local file header, file name, raw bytes
//! 2. per entry: 46-byte central directory record, file name
//! 3. 22-byte end-of-central-directory record
//!
//! Timestamps, flags, attributes and extra fields are all zero, so the output
//! depends only on the entries and their order.

use log::debug;

use super::writer::LeWriter;
use crate::checksum::crc32;
use crate::error_handling::types::ArchiveError;

const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x0403_4b50;
const CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0201_4b50;
const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0605_4b50;

const LOCAL_FILE_HEADER_LEN: usize = 30;
const CENTRAL_DIRECTORY_LEN: usize = 46;
const END_OF_CENTRAL_DIRECTORY_LEN: usize = 22;

const VERSION: u16 = 20;
const METHOD_STORED: u16 = 0;

/// One named blob destined for the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: String,
    pub bytes: Vec<u8>,
}

impl ArchiveEntry {
    pub fn new(path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            bytes: bytes.into(),
        }
    }
}

struct CentralRecord<'a> {
    name: &'a [u8],
    crc: u32,
    size: u32,
    offset: u32,
}

/// Builds the archive. Fails only when a ZIP32 field would overflow.
pub fn build(entries: &[ArchiveEntry]) -> Result<Vec<u8>, ArchiveError> {
    let count = u16::try_from(entries.len())
        .map_err(|_| ArchiveError::TooManyEntries(entries.len()))?;

    let capacity = entries
        .iter()
        .map(|e| LOCAL_FILE_HEADER_LEN + CENTRAL_DIRECTORY_LEN + 2 * e.path.len() + e.bytes.len())
        .sum::<usize>()
        + END_OF_CENTRAL_DIRECTORY_LEN;
    let mut out = LeWriter::with_capacity(capacity);
    let mut records = Vec::with_capacity(entries.len());

    for entry in entries {
        let name = entry.path.as_bytes();
        let name_len = u16::try_from(name.len()).map_err(|_| ArchiveError::NameTooLong {
            path: entry.path.clone(),
        })?;
        let size = u32::try_from(entry.bytes.len()).map_err(|_| ArchiveError::EntryTooLarge {
            path: entry.path.clone(),
            len: entry.bytes.len(),
        })?;
        let record = CentralRecord {
            name,
            crc: crc32(&entry.bytes),
            size,
            offset: out.offset()?,
        };

        out.u32(LOCAL_FILE_HEADER_SIGNATURE)
            .u16(VERSION)
            .u16(0) // flags
            .u16(METHOD_STORED)
            .u16(0) // mod time
            .u16(0) // mod date
            .u32(record.crc)
            .u32(record.size) // compressed
            .u32(record.size) // uncompressed
            .u16(name_len)
            .u16(0) // extra length
            .bytes(name)
            .bytes(&entry.bytes);
        records.push(record);
    }

    let central_start = out.offset()?;
    for record in &records {
        // name length was validated above
        let name_len = record.name.len() as u16;
        out.u32(CENTRAL_DIRECTORY_SIGNATURE)
            .u16(VERSION) // made by
            .u16(VERSION) // needed
            .u16(0) // flags
            .u16(METHOD_STORED)
            .u16(0) // mod time
            .u16(0) // mod date
            .u32(record.crc)
            .u32(record.size)
            .u32(record.size)
            .u16(name_len)
            .u16(0) // extra length
            .u16(0) // comment length
            .u16(0) // disk number start
            .u16(0) // internal attributes
            .u32(0) // external attributes
            .u32(record.offset)
            .bytes(record.name);
    }
    let central_size = out
        .offset()?
        .checked_sub(central_start)
        .ok_or(ArchiveError::ArchiveTooLarge)?;

    out.u32(END_OF_CENTRAL_DIRECTORY_SIGNATURE)
        .u16(0) // this disk
        .u16(0) // central directory disk
        .u16(count)
        .u16(count)
        .u32(central_size)
        .u32(central_start)
        .u16(0); // comment length

    debug!(
        "Built archive: {} entries, {} bytes, central directory {} bytes at {}",
        count,
        out.len(),
        central_size,
        central_start
    );
    Ok(out.into_inner())
}
