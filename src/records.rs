//! Tracker statistics records
//!
//! The tracker's list commands answer with arrays of fixed-layout binary
//! records. Each record type here knows its exact wire size and decodes only
//! from a buffer of exactly that size.

use std::fmt;

use bytes::Buf;

use crate::errors::{FastDFSError, Result};
use crate::protocol::{format_size, format_timestamp, unpad_string};
use crate::types::*;

/// Width of the ip_addr field inside a storage record
const STORAGE_INFO_IP_LEN: usize = 16;

/// A fixed-size binary record returned by the tracker
pub trait Record: Sized {
    /// Record name used in error messages
    const NAME: &'static str;
    /// Exact encoded size in bytes
    const SIZE: usize;

    /// Decodes one record from exactly [`Record::SIZE`] bytes
    fn decode(data: &[u8]) -> Result<Self>;
}

/// Decodes a list response made of back-to-back records, preserving wire order
///
/// The body must hold a whole number of records; an empty body is an empty list.
pub fn decode_records<R: Record>(body: &[u8]) -> Result<Vec<R>> {
    let shape = ResponseShape::MultipleOf(R::SIZE);
    if !shape.accepts(body.len()) {
        return Err(FastDFSError::ResponseSize {
            expected: shape,
            actual: body.len(),
        });
    }

    body.chunks_exact(R::SIZE).map(R::decode).collect()
}

fn check_size<R: Record>(data: &[u8]) -> Result<()> {
    if data.len() != R::SIZE {
        return Err(FastDFSError::SizeMismatch {
            record: R::NAME,
            expected: R::SIZE,
            actual: data.len(),
        });
    }
    Ok(())
}

/// Sequential reader over a buffer whose length was already checked
struct FieldReader<'a> {
    buf: &'a [u8],
}

impl<'a> FieldReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn string(&mut self, width: usize) -> String {
        let s = unpad_string(&self.buf[..width]);
        self.buf.advance(width);
        s
    }

    fn u8(&mut self) -> u8 {
        self.buf.get_u8()
    }

    fn u32(&mut self) -> u32 {
        self.buf.get_u32()
    }

    fn u64(&mut self) -> u64 {
        self.buf.get_u64()
    }

    fn size(&mut self) -> Result<String> {
        format_size(self.u64(), FDFS_SPACE_SIZE_BASE_INDEX)
    }

    fn timestamp(&mut self) -> String {
        format_timestamp(self.u64())
    }

    fn flag(&mut self) -> bool {
        self.u8() != 0
    }
}

/// Statistics for one storage server, as reported by the tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageInfo {
    /// Status code; see [`StorageInfo::storage_status`]
    pub status: u8,
    /// Storage server ID
    pub id: String,
    /// IP address the server registered with
    pub ip_addr: String,
    /// Domain name, empty if unset
    pub domain_name: String,
    /// ID of the server this one syncs its initial data from
    pub src_id: String,
    /// Storage server software version
    pub version: String,
    /// When the server joined the cluster
    pub join_time: String,
    /// When the server last started
    pub up_time: String,
    /// Total storage space
    pub total_mb: String,
    /// Free storage space
    pub free_mb: String,
    /// Upload priority; lower is preferred
    pub upload_priority: u64,
    /// Number of store paths
    pub store_path_count: u64,
    /// Subdirectories per store path level
    pub subdir_count_per_path: u64,
    /// Index of the store path currently written to
    pub current_write_path: u64,
    /// Storage service port
    pub storage_port: u64,
    /// HTTP port
    pub storage_http_port: u64,
    /// Connections allocated
    pub alloc_count: u32,
    /// Connections in use
    pub current_count: u32,
    /// Peak connections in use
    pub max_count: u32,
    /// Total uploads
    pub total_upload_count: u64,
    /// Successful uploads
    pub success_upload_count: u64,
    /// Total appends
    pub total_append_count: u64,
    /// Successful appends
    pub success_append_count: u64,
    /// Total modifies
    pub total_modify_count: u64,
    /// Successful modifies
    pub success_modify_count: u64,
    /// Total truncates
    pub total_truncate_count: u64,
    /// Successful truncates
    pub success_truncate_count: u64,
    /// Total set-metadata calls
    pub total_set_meta_count: u64,
    /// Successful set-metadata calls
    pub success_set_meta_count: u64,
    /// Total deletes
    pub total_delete_count: u64,
    /// Successful deletes
    pub success_delete_count: u64,
    /// Total downloads
    pub total_download_count: u64,
    /// Successful downloads
    pub success_download_count: u64,
    /// Total get-metadata calls
    pub total_get_meta_count: u64,
    /// Successful get-metadata calls
    pub success_get_meta_count: u64,
    /// Total link creations
    pub total_create_link_count: u64,
    /// Successful link creations
    pub success_create_link_count: u64,
    /// Total link deletions
    pub total_delete_link_count: u64,
    /// Successful link deletions
    pub success_delete_link_count: u64,
    /// Bytes uploaded
    pub total_upload_bytes: u64,
    /// Bytes uploaded by successful operations
    pub success_upload_bytes: u64,
    /// Bytes appended
    pub total_append_bytes: u64,
    /// Bytes appended by successful operations
    pub success_append_bytes: u64,
    /// Bytes written by modifies
    pub total_modify_bytes: u64,
    /// Bytes written by modifies by successful operations
    pub success_modify_bytes: u64,
    /// Bytes downloaded
    pub total_download_bytes: u64,
    /// Bytes downloaded by successful operations
    pub success_download_bytes: u64,
    /// Bytes received through sync
    pub total_sync_in_bytes: u64,
    /// Bytes received through sync by successful operations
    pub success_sync_in_bytes: u64,
    /// Bytes sent through sync
    pub total_sync_out_bytes: u64,
    /// Bytes sent through sync by successful operations
    pub success_sync_out_bytes: u64,
    /// Total file opens
    pub total_file_open_count: u64,
    /// Successful file opens
    pub success_file_open_count: u64,
    /// Total file reads
    pub total_file_read_count: u64,
    /// Successful file reads
    pub success_file_read_count: u64,
    /// Total file writes
    pub total_file_write_count: u64,
    /// Successful file writes
    pub success_file_write_count: u64,
    /// Last update received from a client
    pub last_source_update: String,
    /// Last update received through sync
    pub last_sync_update: String,
    /// Timestamp synced up to
    pub last_synced_time: String,
    /// Last heartbeat seen by the tracker
    pub last_heartbeat_time: String,
    /// Whether this server is the group's trunk server
    pub if_trunk_server: bool,
}

impl StorageInfo {
    /// Known status of this server, if the code is recognised
    pub fn storage_status(&self) -> Option<StorageStatus> {
        StorageStatus::from_code(self.status)
    }

    fn status_name(&self) -> &'static str {
        self.storage_status().map_or("UNKNOWN", StorageStatus::name)
    }
}

impl Record for StorageInfo {
    const NAME: &'static str = "StorageInfo";
    // status | id | ip_addr | domain_name | src_id | version
    // | 10 x u64 | 3 x u32 | 42 x u64 | if_trunk_server
    const SIZE: usize = 1
        + FDFS_STORAGE_ID_MAX_SIZE
        + STORAGE_INFO_IP_LEN
        + FDFS_DOMAIN_NAME_MAX_LEN
        + FDFS_STORAGE_ID_MAX_SIZE
        + FDFS_VERSION_SIZE
        + 10 * 8
        + 3 * 4
        + 42 * 8
        + 1;

    fn decode(data: &[u8]) -> Result<Self> {
        check_size::<Self>(data)?;
        let mut r = FieldReader::new(data);

        Ok(Self {
            status: r.u8(),
            id: r.string(FDFS_STORAGE_ID_MAX_SIZE),
            ip_addr: r.string(STORAGE_INFO_IP_LEN),
            domain_name: r.string(FDFS_DOMAIN_NAME_MAX_LEN),
            src_id: r.string(FDFS_STORAGE_ID_MAX_SIZE),
            version: r.string(FDFS_VERSION_SIZE),
            join_time: r.timestamp(),
            up_time: r.timestamp(),
            total_mb: r.size()?,
            free_mb: r.size()?,
            upload_priority: r.u64(),
            store_path_count: r.u64(),
            subdir_count_per_path: r.u64(),
            current_write_path: r.u64(),
            storage_port: r.u64(),
            storage_http_port: r.u64(),
            alloc_count: r.u32(),
            current_count: r.u32(),
            max_count: r.u32(),
            total_upload_count: r.u64(),
            success_upload_count: r.u64(),
            total_append_count: r.u64(),
            success_append_count: r.u64(),
            total_modify_count: r.u64(),
            success_modify_count: r.u64(),
            total_truncate_count: r.u64(),
            success_truncate_count: r.u64(),
            total_set_meta_count: r.u64(),
            success_set_meta_count: r.u64(),
            total_delete_count: r.u64(),
            success_delete_count: r.u64(),
            total_download_count: r.u64(),
            success_download_count: r.u64(),
            total_get_meta_count: r.u64(),
            success_get_meta_count: r.u64(),
            total_create_link_count: r.u64(),
            success_create_link_count: r.u64(),
            total_delete_link_count: r.u64(),
            success_delete_link_count: r.u64(),
            total_upload_bytes: r.u64(),
            success_upload_bytes: r.u64(),
            total_append_bytes: r.u64(),
            success_append_bytes: r.u64(),
            total_modify_bytes: r.u64(),
            success_modify_bytes: r.u64(),
            total_download_bytes: r.u64(),
            success_download_bytes: r.u64(),
            total_sync_in_bytes: r.u64(),
            success_sync_in_bytes: r.u64(),
            total_sync_out_bytes: r.u64(),
            success_sync_out_bytes: r.u64(),
            total_file_open_count: r.u64(),
            success_file_open_count: r.u64(),
            total_file_read_count: r.u64(),
            success_file_read_count: r.u64(),
            total_file_write_count: r.u64(),
            success_file_write_count: r.u64(),
            last_source_update: r.timestamp(),
            last_sync_update: r.timestamp(),
            last_synced_time: r.timestamp(),
            last_heartbeat_time: r.timestamp(),
            if_trunk_server: r.flag(),
        })
    }
}

impl fmt::Display for StorageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Storage information:")?;
        writeln!(f, "\tid = {}", self.id)?;
        writeln!(f, "\tip_addr = {} ({})", self.ip_addr, self.status_name())?;
        writeln!(f, "\thttp domain = {}", self.domain_name)?;
        writeln!(f, "\tsource id = {}", self.src_id)?;
        writeln!(f, "\tversion = {}", self.version)?;
        writeln!(f, "\tjoin time = {}", self.join_time)?;
        writeln!(f, "\tup time = {}", self.up_time)?;
        writeln!(f, "\ttotal storage = {}", self.total_mb)?;
        writeln!(f, "\tfree storage = {}", self.free_mb)?;
        writeln!(f, "\tupload priority = {}", self.upload_priority)?;
        writeln!(f, "\tstore path count = {}", self.store_path_count)?;
        writeln!(f, "\tsubdir count per path = {}", self.subdir_count_per_path)?;
        writeln!(f, "\tstorage port = {}", self.storage_port)?;
        writeln!(f, "\tstorage HTTP port = {}", self.storage_http_port)?;
        writeln!(f, "\tcurrent write path = {}", self.current_write_path)?;
        writeln!(f, "\tif_trunk_server = {}", self.if_trunk_server)?;

        let counters: [(&str, u64, u64); 19] = [
            ("upload count", self.total_upload_count, self.success_upload_count),
            ("download count", self.total_download_count, self.success_download_count),
            ("append count", self.total_append_count, self.success_append_count),
            ("modify count", self.total_modify_count, self.success_modify_count),
            ("truncate count", self.total_truncate_count, self.success_truncate_count),
            ("delete count", self.total_delete_count, self.success_delete_count),
            ("set_meta count", self.total_set_meta_count, self.success_set_meta_count),
            ("get_meta count", self.total_get_meta_count, self.success_get_meta_count),
            ("create link count", self.total_create_link_count, self.success_create_link_count),
            ("delete link count", self.total_delete_link_count, self.success_delete_link_count),
            ("upload bytes", self.total_upload_bytes, self.success_upload_bytes),
            ("download bytes", self.total_download_bytes, self.success_download_bytes),
            ("append bytes", self.total_append_bytes, self.success_append_bytes),
            ("modify bytes", self.total_modify_bytes, self.success_modify_bytes),
            ("sync_in bytes", self.total_sync_in_bytes, self.success_sync_in_bytes),
            ("sync_out bytes", self.total_sync_out_bytes, self.success_sync_out_bytes),
            ("file open count", self.total_file_open_count, self.success_file_open_count),
            ("file read count", self.total_file_read_count, self.success_file_read_count),
            ("file write count", self.total_file_write_count, self.success_file_write_count),
        ];
        for (label, total, success) in counters {
            writeln!(f, "\ttotal {} = {}", label, total)?;
            writeln!(f, "\tsuccess {} = {}", label, success)?;
        }

        writeln!(f, "\tlast heartbeat time = {}", self.last_heartbeat_time)?;
        writeln!(f, "\tlast source update = {}", self.last_source_update)?;
        writeln!(f, "\tlast sync update = {}", self.last_sync_update)?;
        write!(f, "\tlast synced time = {}", self.last_synced_time)
    }
}

/// Summary of one storage group, as reported by the tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInfo {
    /// Group name
    pub group_name: String,
    /// Total storage space of the group
    pub total_mb: String,
    /// Free storage space of the group
    pub free_mb: String,
    /// Free space in trunk files
    pub trunk_free_mb: String,
    /// Number of storage servers
    pub server_count: u64,
    /// Storage service port
    pub storage_port: u64,
    /// HTTP port
    pub storage_http_port: u64,
    /// Number of active storage servers
    pub active_count: u64,
    /// Index of the server currently written to
    pub current_write_server: u64,
    /// Number of store paths per server
    pub store_path_count: u64,
    /// Subdirectories per store path level
    pub subdir_count_per_path: u64,
    /// Current trunk file ID
    pub current_trunk_file_id: u64,
}

impl Record for GroupInfo {
    const NAME: &'static str = "GroupInfo";
    // group_name is sent with its terminating null
    const SIZE: usize = FDFS_GROUP_NAME_MAX_LEN + 1 + 11 * 8;

    fn decode(data: &[u8]) -> Result<Self> {
        check_size::<Self>(data)?;
        let mut r = FieldReader::new(data);

        Ok(Self {
            group_name: r.string(FDFS_GROUP_NAME_MAX_LEN + 1),
            total_mb: r.size()?,
            free_mb: r.size()?,
            trunk_free_mb: r.size()?,
            server_count: r.u64(),
            storage_port: r.u64(),
            storage_http_port: r.u64(),
            active_count: r.u64(),
            current_write_server: r.u64(),
            store_path_count: r.u64(),
            subdir_count_per_path: r.u64(),
            current_trunk_file_id: r.u64(),
        })
    }
}

impl fmt::Display for GroupInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Group information:")?;
        writeln!(f, "\tgroup name = {}", self.group_name)?;
        writeln!(f, "\ttotal disk space = {}", self.total_mb)?;
        writeln!(f, "\tdisk free space = {}", self.free_mb)?;
        writeln!(f, "\ttrunk free space = {}", self.trunk_free_mb)?;
        writeln!(f, "\tstorage server count = {}", self.server_count)?;
        writeln!(f, "\tstorage port = {}", self.storage_port)?;
        writeln!(f, "\tstorage HTTP port = {}", self.storage_http_port)?;
        writeln!(f, "\tactive server count = {}", self.active_count)?;
        writeln!(f, "\tcurrent write server index = {}", self.current_write_server)?;
        writeln!(f, "\tstore path count = {}", self.store_path_count)?;
        writeln!(f, "\tsubdir count per path = {}", self.subdir_count_per_path)?;
        write!(f, "\tcurrent trunk file id = {}", self.current_trunk_file_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::pad_string;
    use bytes::{BufMut, BytesMut};

    fn group_record(name: &str, total_mb: u64, server_count: u64) -> BytesMut {
        let mut buf = BytesMut::with_capacity(GroupInfo::SIZE);
        buf.put(pad_string(name, FDFS_GROUP_NAME_MAX_LEN + 1));
        buf.put_u64(total_mb);
        buf.put_u64(512);
        buf.put_u64(0);
        buf.put_u64(server_count);
        for n in [23000u64, 8888, 1, 0, 2, 256, 7] {
            buf.put_u64(n);
        }
        buf
    }

    #[test]
    fn test_record_sizes() {
        assert_eq!(StorageInfo::SIZE, 612);
        assert_eq!(GroupInfo::SIZE, 105);
    }

    #[test]
    fn test_decode_group_info() {
        let info = GroupInfo::decode(&group_record("group1", 1024, 3)).unwrap();

        assert_eq!(info.group_name, "group1");
        assert_eq!(info.total_mb, "1.00GB");
        assert_eq!(info.free_mb, "512MB");
        assert_eq!(info.trunk_free_mb, "0MB");
        assert_eq!(info.server_count, 3);
        assert_eq!(info.storage_port, 23000);
        assert_eq!(info.storage_http_port, 8888);
        assert_eq!(info.subdir_count_per_path, 256);
        assert_eq!(info.current_trunk_file_id, 7);
    }

    #[test]
    fn test_decode_group_info_wrong_size() {
        let mut record = group_record("group1", 0, 0);
        record.put_u8(0);
        match GroupInfo::decode(&record) {
            Err(FastDFSError::SizeMismatch { record, expected, actual }) => {
                assert_eq!(record, "GroupInfo");
                assert_eq!(expected, 105);
                assert_eq!(actual, 106);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_decode_records_keeps_wire_order() {
        let mut body = group_record("group2", 0, 1);
        body.extend_from_slice(&group_record("group1", 0, 2));

        let groups: Vec<GroupInfo> = decode_records(&body).unwrap();
        let names: Vec<&str> = groups.iter().map(|g| g.group_name.as_str()).collect();
        assert_eq!(names, ["group2", "group1"]);
    }

    #[test]
    fn test_decode_records_empty_body() {
        let groups: Vec<GroupInfo> = decode_records(&[]).unwrap();
        assert!(groups.is_empty());
    }

    #[test]
    fn test_decode_records_partial_record() {
        let mut body = group_record("group1", 0, 1);
        body.extend_from_slice(&group_record("group2", 0, 1)[..50]);

        let result: Result<Vec<GroupInfo>> = decode_records(&body);
        assert!(matches!(
            result,
            Err(FastDFSError::ResponseSize {
                expected: ResponseShape::MultipleOf(105),
                actual: 155,
            })
        ));
    }

    #[test]
    fn test_group_info_display() {
        let info = GroupInfo::decode(&group_record("group1", 2048, 3)).unwrap();
        let text = info.to_string();
        assert!(text.starts_with("Group information:"));
        assert!(text.contains("\tgroup name = group1"));
        assert!(text.contains("\ttotal disk space = 2.00GB"));
    }
}
