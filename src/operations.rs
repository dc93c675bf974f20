//! FastDFS Operations
//!
//! Every tracker and storage exchange is described here as a plain value:
//! the command byte, the request payload, the expected response shape, and
//! how to decode the response body. The transports in [`crate::connection`]
//! (tokio) and [`crate::blocking`] (std) run the same state machine over
//! these values, so both produce identical bytes on the wire:
//!
//! encode → send → receive header → verify status → receive body → decode

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::errors::{FastDFSError, Result};
use crate::protocol::*;
use crate::records::{decode_records, GroupInfo, Record, StorageInfo};
use crate::types::*;

/// A single request/response exchange with a FastDFS server
pub trait Operation {
    /// Decoded response
    type Output;

    /// Command code sent in the request header
    fn command(&self) -> u8;

    /// Request body; empty for header-only requests
    fn payload(&self) -> Bytes {
        Bytes::new()
    }

    /// Constraint on the response body length
    fn response_shape(&self) -> ResponseShape {
        ResponseShape::Any
    }

    /// Decodes a response body already checked against [`Operation::response_shape`]
    fn decode(&self, body: Bytes) -> Result<Self::Output>;
}

/// Builds the request frame: a header whose length is the payload length, then the payload
pub fn encode_request<O: Operation + ?Sized>(op: &O) -> Bytes {
    let payload = op.payload();
    let mut buf = BytesMut::with_capacity(FDFS_PROTO_HEADER_LEN + payload.len());
    buf.put(encode_header(payload.len() as u64, op.command(), 0));
    buf.put(payload);
    buf.freeze()
}

/// Checks an announced body length against the operation's shape
///
/// Runs before any body byte is read, so a header announcing a body the
/// operation can never accept is rejected without allocating for it.
pub fn check_body_len<O: Operation + ?Sized>(op: &O, length: u64) -> Result<usize> {
    let body_len = usize::try_from(length).map_err(|_| {
        FastDFSError::InvalidHeader(format!("body length {} exceeds address space", length))
    })?;
    let shape = op.response_shape();
    if !shape.accepts(body_len) {
        return Err(FastDFSError::ResponseSize {
            expected: shape,
            actual: body_len,
        });
    }
    Ok(body_len)
}

/// Checks a received body against the operation's shape, then decodes it
pub fn decode_response<O: Operation + ?Sized>(op: &O, body: Bytes) -> Result<O::Output> {
    let shape = op.response_shape();
    if !shape.accepts(body.len()) {
        return Err(FastDFSError::ResponseSize {
            expected: shape,
            actual: body.len(),
        });
    }
    op.decode(body)
}

/// Lists storage servers of a group, optionally filtered by one IP address
#[derive(Debug, Clone)]
pub struct ListServers {
    /// Group to list
    pub group_name: String,
    /// Restricts the listing to the server with this IP address
    pub storage_ip: Option<String>,
}

impl Operation for ListServers {
    type Output = Vec<StorageInfo>;

    fn command(&self) -> u8 {
        TrackerCommand::ServerListStorage.into()
    }

    fn payload(&self) -> Bytes {
        let ip = self.storage_ip.as_deref().unwrap_or("").as_bytes();
        let ip = &ip[..ip.len().min(IP_ADDRESS_SIZE - 1)];

        let mut buf = BytesMut::with_capacity(FDFS_GROUP_NAME_MAX_LEN + ip.len());
        buf.put(pad_string(&self.group_name, FDFS_GROUP_NAME_MAX_LEN));
        buf.put_slice(ip);
        buf.freeze()
    }

    fn response_shape(&self) -> ResponseShape {
        ResponseShape::MultipleOf(StorageInfo::SIZE)
    }

    fn decode(&self, body: Bytes) -> Result<Self::Output> {
        decode_records(&body)
    }
}

/// Fetches the summary of one group
#[derive(Debug, Clone)]
pub struct ListOneGroup {
    /// Group to describe
    pub group_name: String,
}

impl Operation for ListOneGroup {
    type Output = GroupInfo;

    fn command(&self) -> u8 {
        TrackerCommand::ServerListOneGroup.into()
    }

    fn payload(&self) -> Bytes {
        pad_string(&self.group_name, FDFS_GROUP_NAME_MAX_LEN)
    }

    fn response_shape(&self) -> ResponseShape {
        ResponseShape::Exact(GroupInfo::SIZE)
    }

    fn decode(&self, body: Bytes) -> Result<Self::Output> {
        GroupInfo::decode(&body)
    }
}

/// Fetches the summaries of every group known to the tracker
#[derive(Debug, Clone, Default)]
pub struct ListAllGroups;

impl Operation for ListAllGroups {
    type Output = Vec<GroupInfo>;

    fn command(&self) -> u8 {
        TrackerCommand::ServerListAllGroups.into()
    }

    fn response_shape(&self) -> ResponseShape {
        ResponseShape::MultipleOf(GroupInfo::SIZE)
    }

    fn decode(&self, body: Bytes) -> Result<Self::Output> {
        decode_records(&body)
    }
}

/// Asks the tracker which storage server should receive a new upload
#[derive(Debug, Clone, Default)]
pub struct QueryStore {
    /// Restrict the choice to this group; `None` lets the tracker pick
    pub group_name: Option<String>,
}

impl Operation for QueryStore {
    type Output = StorageServer;

    fn command(&self) -> u8 {
        match self.group_name {
            Some(_) => TrackerCommand::ServiceQueryStoreWithGroupOne.into(),
            None => TrackerCommand::ServiceQueryStoreWithoutGroupOne.into(),
        }
    }

    fn payload(&self) -> Bytes {
        match &self.group_name {
            Some(group_name) => pad_string(group_name, FDFS_GROUP_NAME_MAX_LEN),
            None => Bytes::new(),
        }
    }

    fn response_shape(&self) -> ResponseShape {
        ResponseShape::Exact(TRACKER_QUERY_STORAGE_STORE_BODY_LEN)
    }

    fn decode(&self, body: Bytes) -> Result<Self::Output> {
        decode_storage_server(body, true)
    }
}

/// Asks the tracker which storage server holds an existing file
#[derive(Debug, Clone)]
pub struct QueryStorage {
    command: TrackerCommand,
    /// Group holding the file
    pub group_name: String,
    /// File path within the group
    pub remote_filename: String,
}

impl QueryStorage {
    /// Query for a server that can update (delete, set metadata) the file
    pub fn update(group_name: &str, remote_filename: &str) -> Self {
        Self {
            command: TrackerCommand::ServiceQueryUpdate,
            group_name: group_name.to_string(),
            remote_filename: remote_filename.to_string(),
        }
    }

    /// Query for a server that can serve (download) the file
    pub fn fetch(group_name: &str, remote_filename: &str) -> Self {
        Self {
            command: TrackerCommand::ServiceQueryFetchOne,
            group_name: group_name.to_string(),
            remote_filename: remote_filename.to_string(),
        }
    }
}

impl Operation for QueryStorage {
    type Output = StorageServer;

    fn command(&self) -> u8 {
        self.command.into()
    }

    fn payload(&self) -> Bytes {
        group_and_filename(&self.group_name, &self.remote_filename)
    }

    fn response_shape(&self) -> ResponseShape {
        ResponseShape::Exact(TRACKER_QUERY_STORAGE_FETCH_BODY_LEN)
    }

    fn decode(&self, body: Bytes) -> Result<Self::Output> {
        decode_storage_server(body, false)
    }
}

/// Header-only liveness check, answered with an empty body
#[derive(Debug, Clone, Copy, Default)]
pub struct ActiveTest;

impl Operation for ActiveTest {
    type Output = ();

    fn command(&self) -> u8 {
        TrackerCommand::ActiveTest.into()
    }

    fn response_shape(&self) -> ResponseShape {
        ResponseShape::Exact(0)
    }

    fn decode(&self, _body: Bytes) -> Result<Self::Output> {
        Ok(())
    }
}

/// Replaces or merges the metadata of a stored file
#[derive(Debug, Clone)]
pub struct SetMetadata {
    group_name: String,
    remote_filename: String,
    metadata: Bytes,
    flag: MetadataFlag,
}

impl SetMetadata {
    /// Encodes the metadata up front, failing if it cannot be represented on the wire
    pub fn new(
        group_name: &str,
        remote_filename: &str,
        metadata: &Metadata,
        flag: MetadataFlag,
    ) -> Result<Self> {
        Ok(Self {
            group_name: group_name.to_string(),
            remote_filename: remote_filename.to_string(),
            metadata: encode_metadata(metadata)?,
            flag,
        })
    }
}

impl Operation for SetMetadata {
    type Output = ();

    fn command(&self) -> u8 {
        StorageCommand::SetMetadata.into()
    }

    // filename_len(8) | meta_len(8) | flag(1) | group_name(16) | filename | metadata
    fn payload(&self) -> Bytes {
        let filename = self.remote_filename.as_bytes();

        let mut body = BytesMut::with_capacity(
            2 * 8 + 1 + FDFS_GROUP_NAME_MAX_LEN + filename.len() + self.metadata.len(),
        );
        body.put_u64(filename.len() as u64);
        body.put_u64(self.metadata.len() as u64);
        body.put_u8(self.flag.into());
        body.put(pad_string(&self.group_name, FDFS_GROUP_NAME_MAX_LEN));
        body.put_slice(filename);
        body.put_slice(&self.metadata);
        body.freeze()
    }

    fn response_shape(&self) -> ResponseShape {
        ResponseShape::Exact(0)
    }

    fn decode(&self, _body: Bytes) -> Result<Self::Output> {
        Ok(())
    }
}

/// Reads the metadata of a stored file
#[derive(Debug, Clone)]
pub struct GetMetadata {
    /// Group holding the file
    pub group_name: String,
    /// File path within the group
    pub remote_filename: String,
}

impl Operation for GetMetadata {
    type Output = Metadata;

    fn command(&self) -> u8 {
        StorageCommand::GetMetadata.into()
    }

    fn payload(&self) -> Bytes {
        group_and_filename(&self.group_name, &self.remote_filename)
    }

    fn decode(&self, body: Bytes) -> Result<Self::Output> {
        decode_metadata(&body)
    }
}

/// Deletes a stored file
#[derive(Debug, Clone)]
pub struct DeleteFile {
    /// Group holding the file
    pub group_name: String,
    /// Path of the file to delete
    pub remote_filename: String,
}

impl Operation for DeleteFile {
    type Output = ();

    fn command(&self) -> u8 {
        StorageCommand::DeleteFile.into()
    }

    fn payload(&self) -> Bytes {
        group_and_filename(&self.group_name, &self.remote_filename)
    }

    fn response_shape(&self) -> ResponseShape {
        ResponseShape::Exact(0)
    }

    fn decode(&self, _body: Bytes) -> Result<Self::Output> {
        Ok(())
    }
}

/// group_name(16) followed by the raw filename bytes
fn group_and_filename(group_name: &str, remote_filename: &str) -> Bytes {
    let filename = remote_filename.as_bytes();
    let mut buf = BytesMut::with_capacity(FDFS_GROUP_NAME_MAX_LEN + filename.len());
    buf.put(pad_string(group_name, FDFS_GROUP_NAME_MAX_LEN));
    buf.put_slice(filename);
    buf.freeze()
}

/// Decodes `group_name(16) | ip_addr(45) | port(8) [| store_path_index(1)]`
pub(crate) fn decode_storage_server(mut body: Bytes, with_path_index: bool) -> Result<StorageServer> {
    let expected = if with_path_index {
        TRACKER_QUERY_STORAGE_STORE_BODY_LEN
    } else {
        TRACKER_QUERY_STORAGE_FETCH_BODY_LEN
    };
    if body.len() != expected {
        return Err(FastDFSError::ResponseSize {
            expected: ResponseShape::Exact(expected),
            actual: body.len(),
        });
    }

    let group_name = unpad_string(&body.split_to(FDFS_GROUP_NAME_MAX_LEN));
    let ip_addr = unpad_string(&body.split_to(IP_ADDRESS_SIZE - 1));
    let port = body.get_u64();
    let store_path_index = if with_path_index { body.get_u8() } else { 0 };

    Ok(StorageServer {
        group_name,
        ip_addr,
        port,
        store_path_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_body(group: &str, ip: &str, port: u64, path_index: u8) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put(pad_string(group, FDFS_GROUP_NAME_MAX_LEN));
        buf.put(pad_string(ip, IP_ADDRESS_SIZE - 1));
        buf.put_u64(port);
        buf.put_u8(path_index);
        buf.freeze()
    }

    #[test]
    fn test_body_lengths() {
        assert_eq!(TRACKER_QUERY_STORAGE_STORE_BODY_LEN, 70);
        assert_eq!(TRACKER_QUERY_STORAGE_FETCH_BODY_LEN, 69);
    }

    #[test]
    fn test_query_store_without_group_is_header_only() {
        let frame = encode_request(&QueryStore::default());
        assert_eq!(&frame[..], &[0, 0, 0, 0, 0, 0, 0, 0, 101, 0]);
    }

    #[test]
    fn test_query_store_with_group_payload() {
        let op = QueryStore {
            group_name: Some("group1".to_string()),
        };
        let frame = encode_request(&op);
        let header = decode_header(&frame).unwrap();
        assert_eq!(header.length, 16);
        assert_eq!(header.cmd, 104);
        assert_eq!(&frame[10..16], b"group1");
        assert!(frame[16..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_list_servers_truncates_ip_filter() {
        let op = ListServers {
            group_name: "group1".to_string(),
            storage_ip: Some("1".repeat(60)),
        };
        assert_eq!(op.payload().len(), 16 + 45);

        let op = ListServers {
            group_name: "group1".to_string(),
            storage_ip: None,
        };
        assert_eq!(op.payload().len(), 16);
    }

    #[test]
    fn test_query_storage_payload() {
        let op = QueryStorage::fetch("group1", "M00/00/00/a.jpg");
        let frame = encode_request(&op);
        let header = decode_header(&frame).unwrap();
        assert_eq!(header.cmd, 102);
        assert_eq!(header.length as usize, 16 + "M00/00/00/a.jpg".len());
        assert_eq!(&frame[26..], b"M00/00/00/a.jpg");
        assert_eq!(QueryStorage::update("g", "f").command(), 103);
    }

    #[test]
    fn test_decode_store_response() {
        let body = store_body("group1", "10.0.0.5", 23000, 3);
        let server = decode_response(&QueryStore::default(), body).unwrap();
        assert_eq!(
            server,
            StorageServer {
                group_name: "group1".to_string(),
                ip_addr: "10.0.0.5".to_string(),
                port: 23000,
                store_path_index: 3,
            }
        );
    }

    #[test]
    fn test_decode_store_response_one_byte_short() {
        let body = store_body("group1", "10.0.0.5", 23000, 0).slice(..69);
        let result = decode_response(&QueryStore::default(), body);
        assert!(matches!(
            result,
            Err(FastDFSError::ResponseSize {
                expected: ResponseShape::Exact(70),
                actual: 69,
            })
        ));
    }

    #[test]
    fn test_decode_fetch_response_has_no_path_index() {
        let body = store_body("group1", "10.0.0.6", 23001, 9).slice(..69);
        let server = decode_response(&QueryStorage::fetch("group1", "f"), body).unwrap();
        assert_eq!(server.ip_addr, "10.0.0.6");
        assert_eq!(server.port, 23001);
        assert_eq!(server.store_path_index, 0);
    }

    #[test]
    fn test_decode_port_keeps_full_width() {
        let body = store_body("group1", "10.0.0.5", 70000, 0);
        let server = decode_response(&QueryStore::default(), body).unwrap();
        assert_eq!(server.port, 70000);
        assert_eq!(server.addr(), "10.0.0.5:70000");
    }

    #[test]
    fn test_check_body_len_rejects_before_reading() {
        assert!(matches!(
            check_body_len(&QueryStore::default(), u64::MAX),
            Err(FastDFSError::ResponseSize { expected: ResponseShape::Exact(70), .. })
                | Err(FastDFSError::InvalidHeader(_))
        ));
        assert!(matches!(
            check_body_len(&ListAllGroups, 106),
            Err(FastDFSError::ResponseSize { expected: ResponseShape::MultipleOf(105), actual: 106 })
        ));
        assert_eq!(check_body_len(&ActiveTest, 0).unwrap(), 0);
        assert_eq!(check_body_len(&ListAllGroups, 210).unwrap(), 210);
    }

    #[test]
    fn test_set_metadata_body() {
        let mut metadata = Metadata::new();
        metadata.insert("width".to_string(), "1024".to_string());
        let op = SetMetadata::new("group1", "M00/a.jpg", &metadata, MetadataFlag::Merge).unwrap();

        let body = op.payload();
        assert_eq!(decode_int64(&body[0..8]), 9);
        assert_eq!(decode_int64(&body[8..16]), 10);
        assert_eq!(body[16], b'M');
        assert_eq!(&body[33..42], b"M00/a.jpg");
        assert_eq!(&body[42..], b"width\x021024");
    }
}
