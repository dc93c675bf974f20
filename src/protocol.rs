//! FastDFS Protocol Encoding and Decoding
//!
//! This module handles all protocol-level encoding and decoding operations
//! for communication with FastDFS servers: the frame header, the metadata
//! wire format, fixed-width string fields, and the human-readable renderings
//! of size and timestamp fields.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use chrono::{DateTime, SecondsFormat};

use crate::errors::{map_status_to_error, FastDFSError, Result};
use crate::types::*;

/// Encodes a FastDFS protocol header into a 10-byte buffer
///
/// The header format is:
///   - Bytes 0-7: Body length (8 bytes, big-endian uint64)
///   - Byte 8: Command code
///   - Byte 9: Status code (0 for request, error code for response)
pub fn encode_header(length: u64, cmd: u8, status: u8) -> Bytes {
    let mut buf = BytesMut::with_capacity(FDFS_PROTO_HEADER_LEN);
    buf.put_u64(length);
    buf.put_u8(cmd);
    buf.put_u8(status);
    buf.freeze()
}

/// Decodes a FastDFS protocol header from a buffer
///
/// Only the first 10 bytes are read; anything shorter is a framing error.
pub fn decode_header(data: &[u8]) -> Result<TrackerHeader> {
    if data.len() < FDFS_PROTO_HEADER_LEN {
        return Err(FastDFSError::InvalidHeader(format!(
            "Header too short: {} bytes",
            data.len()
        )));
    }

    let mut buf = &data[..FDFS_PROTO_HEADER_LEN];
    let length = buf.get_u64();
    let cmd = buf.get_u8();
    let status = buf.get_u8();

    Ok(TrackerHeader { length, cmd, status })
}

impl TrackerHeader {
    /// Fails with the mapped remote error when the status is non-zero
    ///
    /// Must run before any part of the body is interpreted.
    pub fn verify(&self) -> Result<()> {
        match map_status_to_error(self.status) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Encodes this header into its 10-byte wire form
    pub fn encode(&self) -> Bytes {
        encode_header(self.length, self.cmd, self.status)
    }
}

/// Splits a FastDFS file ID into its components
///
/// A file ID has the format: "groupName/path/to/file"
/// For example: "group1/M00/00/00/wKgBcFxyz.jpg"
pub fn split_file_id(file_id: &str) -> Result<(String, String)> {
    let (group_name, remote_filename) = file_id
        .split_once('/')
        .ok_or_else(|| FastDFSError::InvalidFileId(file_id.to_string()))?;

    if group_name.is_empty() || group_name.len() > FDFS_GROUP_NAME_MAX_LEN {
        return Err(FastDFSError::InvalidFileId(file_id.to_string()));
    }

    if remote_filename.is_empty() {
        return Err(FastDFSError::InvalidFileId(file_id.to_string()));
    }

    Ok((group_name.to_string(), remote_filename.to_string()))
}

/// Constructs a complete file ID from its components
///
/// This is the inverse operation of split_file_id.
pub fn join_file_id(group_name: &str, remote_filename: &str) -> String {
    format!("{}/{}", group_name, remote_filename)
}

/// Encodes metadata key-value pairs into FastDFS wire format
///
/// The format uses special separators:
///   - Field separator (0x02) between key and value
///   - Record separator (0x01) between different key-value pairs
///
/// Format: key1<0x02>value1<0x01>key2<0x02>value2
///
/// There is no escaping, so keys and values containing either separator
/// are rejected. No trailing record separator is written.
pub fn encode_metadata(metadata: &Metadata) -> Result<Bytes> {
    let mut buf = BytesMut::new();

    for (key, value) in metadata {
        if contains_separator(key) || contains_separator(value) {
            return Err(FastDFSError::InvalidMetadata(format!(
                "separator byte in entry {:?}",
                key
            )));
        }

        if !buf.is_empty() {
            buf.put_u8(FDFS_RECORD_SEPARATOR);
        }
        buf.put_slice(key.as_bytes());
        buf.put_u8(FDFS_FIELD_SEPARATOR);
        buf.put_slice(value.as_bytes());
    }

    Ok(buf.freeze())
}

fn contains_separator(s: &str) -> bool {
    s.bytes()
        .any(|b| b == FDFS_FIELD_SEPARATOR || b == FDFS_RECORD_SEPARATOR)
}

/// Decodes FastDFS wire format metadata into a HashMap
///
/// This is the inverse operation of encode_metadata. Every record must hold
/// exactly one field separator; anything else is rejected as malformed.
pub fn decode_metadata(data: &[u8]) -> Result<Metadata> {
    let mut metadata = Metadata::new();
    if data.is_empty() {
        return Ok(metadata);
    }

    for record in data.split(|&b| b == FDFS_RECORD_SEPARATOR) {
        let mut fields = record.split(|&b| b == FDFS_FIELD_SEPARATOR);
        let (key, value) = match (fields.next(), fields.next(), fields.next()) {
            (Some(key), Some(value), None) => (key, value),
            _ => {
                return Err(FastDFSError::InvalidMetadata(format!(
                    "malformed record: {:?}",
                    String::from_utf8_lossy(record)
                )))
            }
        };

        metadata.insert(
            String::from_utf8_lossy(key).into_owned(),
            String::from_utf8_lossy(value).into_owned(),
        );
    }

    Ok(metadata)
}

/// Pads a string to a fixed length with null bytes (0x00)
///
/// This is used to create fixed-width fields in the FastDFS protocol.
/// If the string is longer than length, it will be truncated.
pub fn pad_string(s: &str, length: usize) -> Bytes {
    let mut buf = BytesMut::with_capacity(length);
    let bytes = s.as_bytes();
    let copy_len = bytes.len().min(length);
    buf.put_slice(&bytes[..copy_len]);
    buf.resize(length, 0);
    buf.freeze()
}

/// Removes trailing null bytes from a byte slice
///
/// This is the inverse of pad_string, used to extract strings from
/// fixed-width protocol fields.
pub fn unpad_string(data: &[u8]) -> String {
    let end = data.iter().rposition(|&b| b != 0).map(|i| i + 1).unwrap_or(0);
    String::from_utf8_lossy(&data[..end]).to_string()
}

/// Decodes an 8-byte big-endian representation to a 64-bit integer
///
/// FastDFS protocol uses big-endian byte order for all numeric fields.
/// Returns 0 when fewer than 8 bytes are given.
pub fn decode_int64(data: &[u8]) -> u64 {
    if data.len() < 8 {
        return 0;
    }
    let mut buf = &data[..8];
    buf.get_u64()
}

/// Renders a raw quantity as a human-readable size
///
/// `base_index` selects the unit of `raw` in [`SIZE_SUFFIXES`] (2 for the
/// megabyte fields reported by the tracker). Values below 1024 keep their
/// unit and print as integers; larger values are scaled by 1024 until they
/// fit and print with two decimals.
///
/// Examples:
///   - (512, 2) -> "512MB"
///   - (1024, 2) -> "1.00GB"
///   - (1536, 0) -> "1.50KB"
pub fn format_size(raw: u64, base_index: usize) -> Result<String> {
    let suffixes = SIZE_SUFFIXES.get(base_index..).unwrap_or(&[]);
    let Some(base_suffix) = suffixes.first() else {
        return Err(FastDFSError::DataRange(format!(
            "size unit index {} is outside the unit table",
            base_index
        )));
    };

    if raw < 1024 {
        return Ok(format!("{}{}", raw, base_suffix));
    }

    let mut value = raw as f64;
    for suffix in suffixes {
        if value < 1024.0 {
            return Ok(format!("{:.2}{}", value, suffix));
        }
        value /= 1024.0;
    }

    Err(FastDFSError::DataRange(format!(
        "{}{} cannot be represented",
        raw, base_suffix
    )))
}

/// Renders epoch seconds as an ISO-8601 UTC timestamp
///
/// Seconds beyond the representable calendar range are rendered as the raw number.
pub fn format_timestamp(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::from_timestamp(s, 0))
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| secs.to_string())
}
