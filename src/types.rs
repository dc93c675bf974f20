//! FastDFS Protocol Types and Constants
//!
//! This module defines all protocol-level constants, command codes, and data structures
//! used in communication with FastDFS tracker and storage servers. The values here are
//! compiled-in protocol data; nothing in this module is mutated at runtime.

use std::fmt;
use std::time::Duration;

use crate::errors::{FastDFSError, Result};

/// Default network ports for FastDFS servers
pub const TRACKER_DEFAULT_PORT: u16 = 22122;
pub const STORAGE_DEFAULT_PORT: u16 = 23000;

/// Protocol header size: pkg_len(8) + cmd(1) + status(1)
pub const FDFS_PROTO_HEADER_LEN: usize = 10;
pub const FDFS_PROTO_PKG_LEN_SIZE: usize = 8;

/// Upper bound on the buffer reserved up front for a response body;
/// larger bodies grow the buffer as bytes arrive
pub const MAX_BODY_PREALLOC: usize = 64 * 1024;

/// Field size limits
pub const FDFS_GROUP_NAME_MAX_LEN: usize = 16;
pub const FDFS_FILE_EXT_NAME_MAX_LEN: usize = 6;
pub const FDFS_MAX_META_NAME_LEN: usize = 64;
pub const FDFS_MAX_META_VALUE_LEN: usize = 256;
pub const FDFS_FILE_PREFIX_MAX_LEN: usize = 16;
pub const FDFS_STORAGE_ID_MAX_SIZE: usize = 16;
pub const FDFS_DOMAIN_NAME_MAX_LEN: usize = 128;
pub const FDFS_VERSION_SIZE: usize = 6;
pub const IP_ADDRESS_SIZE: usize = 46;

/// Storage space fields reported by the tracker are in megabytes
/// (index 2 of [`SIZE_SUFFIXES`]).
pub const FDFS_SPACE_SIZE_BASE_INDEX: usize = 2;

/// Unit suffixes indexed by power of 1024.
pub const SIZE_SUFFIXES: [&str; 9] = ["B", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Protocol separators
pub const FDFS_RECORD_SEPARATOR: u8 = 0x01;
pub const FDFS_FIELD_SEPARATOR: u8 = 0x02;

/// Body length of a query-store response:
/// group_name(16) + ip_addr(45) + port(8) + store_path_index(1)
pub const TRACKER_QUERY_STORAGE_STORE_BODY_LEN: usize =
    FDFS_GROUP_NAME_MAX_LEN + IP_ADDRESS_SIZE - 1 + FDFS_PROTO_PKG_LEN_SIZE + 1;

/// Body length of a query-fetch / query-update response:
/// group_name(16) + ip_addr(45) + port(8)
pub const TRACKER_QUERY_STORAGE_FETCH_BODY_LEN: usize =
    FDFS_GROUP_NAME_MAX_LEN + IP_ADDRESS_SIZE - 1 + FDFS_PROTO_PKG_LEN_SIZE;

/// Tracker protocol commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TrackerCommand {
    TrackerGetSysFilesStart = 61,
    TrackerGetSysFilesEnd = 62,
    TrackerGetOneSysFile = 63,
    TrackerGetStatus = 64,
    TrackerPingLeader = 65,
    TrackerNotifyNextLeader = 66,
    TrackerCommitNextLeader = 67,
    StorageFetchTrunkFid = 72,
    StorageReportTrunkFid = 73,
    StorageReportTrunkFree = 74,
    StorageParameterReq = 75,
    StorageReportStatus = 76,
    StorageChangelogReq = 77,
    StorageReportIpChanged = 78,
    StorageSyncDestQuery = 79,
    StorageJoin = 81,
    Quit = 82,
    StorageBeat = 83,
    StorageReportDiskUsage = 84,
    StorageReplicaChange = 85,
    StorageSyncSrcReq = 86,
    StorageSyncDestReq = 87,
    StorageSyncNotify = 88,
    StorageSyncReport = 89,
    ServerListOneGroup = 90,
    ServerListAllGroups = 91,
    ServerListStorage = 92,
    ServerDeleteStorage = 93,
    Resp = 100,
    ServiceQueryStoreWithoutGroupOne = 101,
    ServiceQueryFetchOne = 102,
    ServiceQueryUpdate = 103,
    ServiceQueryStoreWithGroupOne = 104,
    ServiceQueryFetchAll = 105,
    ServiceQueryStoreWithoutGroupAll = 106,
    ServiceQueryStoreWithGroupAll = 107,
    /// Supported by both tracker and storage since V1.28
    ActiveTest = 111,
}

impl From<TrackerCommand> for u8 {
    fn from(cmd: TrackerCommand) -> u8 {
        cmd as u8
    }
}

/// Storage protocol commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StorageCommand {
    ReportClientIp = 9,
    UploadFile = 11,
    DeleteFile = 12,
    SetMetadata = 13,
    DownloadFile = 14,
    GetMetadata = 15,
    SyncCreateFile = 16,
    SyncDeleteFile = 17,
    SyncUpdateFile = 18,
    SyncCreateLink = 19,
    CreateLink = 20,
    UploadSlaveFile = 21,
    QueryFileInfo = 22,
    UploadAppenderFile = 23,
    AppendFile = 24,
    SyncAppendFile = 25,
    FetchOnePathBinlog = 26,
    TrunkAllocSpace = 27,
    TrunkAllocConfirm = 28,
    TrunkFreeSpace = 29,
    TrunkSyncBinlog = 30,
    TrunkGetBinlogSize = 31,
    TrunkDeleteBinlogMarks = 32,
    TrunkTruncateBinlogFile = 33,
    ModifyFile = 34,
    SyncModifyFile = 35,
    TruncateFile = 36,
    SyncTruncateFile = 37,
}

impl From<StorageCommand> for u8 {
    fn from(cmd: StorageCommand) -> u8 {
        cmd as u8
    }
}

/// Storage server status codes
///
/// The numeric order is meaningful to the tracker; do not reorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StorageStatus {
    Init = 0,
    WaitSync = 1,
    Syncing = 2,
    IpChanged = 3,
    Deleted = 4,
    Offline = 5,
    Online = 6,
    Active = 7,
    Recovery = 9,
    None = 99,
}

impl StorageStatus {
    /// Maps a raw status byte to a known status, if any
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Init,
            1 => Self::WaitSync,
            2 => Self::Syncing,
            3 => Self::IpChanged,
            4 => Self::Deleted,
            5 => Self::Offline,
            6 => Self::Online,
            7 => Self::Active,
            9 => Self::Recovery,
            99 => Self::None,
            _ => return Option::None,
        })
    }

    /// Display name used in storage reports
    pub fn name(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::WaitSync => "WAIT_SYNC",
            Self::Syncing => "SYNCING",
            Self::IpChanged => "IP_CHANGED",
            Self::Deleted => "DELETED",
            Self::Offline => "OFFLINE",
            Self::Online => "ONLINE",
            Self::Active => "ACTIVE",
            Self::Recovery => "RECOVERY",
            Self::None => "NONE",
        }
    }
}

/// Metadata operation flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MetadataFlag {
    /// Replace all existing metadata with new values
    Overwrite = b'O',
    /// Merge new metadata with existing metadata
    Merge = b'M',
}

impl From<MetadataFlag> for u8 {
    fn from(flag: MetadataFlag) -> u8 {
        flag as u8
    }
}

/// Represents a storage server in the FastDFS cluster
///
/// Produced by tracker queries and consumed by whoever opens the next
/// connection to the storage node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageServer {
    /// Group the storage server belongs to
    pub group_name: String,
    /// IP address of the storage server
    pub ip_addr: String,
    /// Port number of the storage server, as the tracker reported it
    pub port: u64,
    /// Index of the storage path to use (0-based)
    pub store_path_index: u8,
}

impl StorageServer {
    /// Returns the "ip:port" address of this storage server
    pub fn addr(&self) -> String {
        format!("{}:{}", self.ip_addr, self.port)
    }
}

/// FastDFS protocol header (10 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerHeader {
    /// Length of the message body (not including header)
    pub length: u64,
    /// Command code (request type or response type)
    pub cmd: u8,
    /// Status code (0 for success, error code otherwise)
    pub status: u8,
}

/// Expected shape of a response body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// No constraint on the body length
    Any,
    /// Body must be exactly this many bytes
    Exact(usize),
    /// Body must be a whole number of fixed-size records
    MultipleOf(usize),
}

impl ResponseShape {
    /// Returns true if a body of `len` bytes satisfies this shape
    pub fn accepts(&self, len: usize) -> bool {
        match *self {
            ResponseShape::Any => true,
            ResponseShape::Exact(n) => len == n,
            ResponseShape::MultipleOf(n) => n != 0 && len % n == 0,
        }
    }
}

impl fmt::Display for ResponseShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseShape::Any => write!(f, "any length"),
            ResponseShape::Exact(n) => write!(f, "exactly {} bytes", n),
            ResponseShape::MultipleOf(n) => write!(f, "a multiple of {} bytes", n),
        }
    }
}

/// Client configuration options
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// List of tracker server addresses in format "host:port"
    pub tracker_addrs: Vec<String>,
    /// Maximum number of idle connections kept per server
    pub max_conns: usize,
    /// Timeout for establishing connections in milliseconds
    pub connect_timeout: u64,
    /// Timeout for one request/response exchange in milliseconds
    pub network_timeout: u64,
    /// Timeout for idle connections in the pool in milliseconds
    pub idle_timeout: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            tracker_addrs: Vec::new(),
            max_conns: 10,
            connect_timeout: 5000,
            network_timeout: 30000,
            idle_timeout: 60000,
        }
    }
}

impl ClientConfig {
    /// Creates a new client configuration with tracker addresses
    pub fn new(tracker_addrs: Vec<String>) -> Self {
        Self {
            tracker_addrs,
            ..Default::default()
        }
    }

    /// Sets the maximum number of connections per server
    pub fn with_max_conns(mut self, max_conns: usize) -> Self {
        self.max_conns = max_conns;
        self
    }

    /// Sets the connection timeout in milliseconds
    pub fn with_connect_timeout(mut self, timeout: u64) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the network timeout in milliseconds
    pub fn with_network_timeout(mut self, timeout: u64) -> Self {
        self.network_timeout = timeout;
        self
    }

    /// Sets the idle timeout in milliseconds
    pub fn with_idle_timeout(mut self, timeout: u64) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.tracker_addrs.is_empty() {
            return Err(FastDFSError::Config(
                "Tracker addresses are required".to_string(),
            ));
        }

        for addr in &self.tracker_addrs {
            if addr.is_empty() || !addr.contains(':') {
                return Err(FastDFSError::Config(format!(
                    "Invalid tracker address: {}",
                    addr
                )));
            }
        }

        if self.max_conns == 0 {
            return Err(FastDFSError::Config(
                "max_conns must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Connect timeout as a Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout)
    }

    /// Network timeout as a Duration
    pub fn network_timeout(&self) -> Duration {
        Duration::from_millis(self.network_timeout)
    }

    /// Idle timeout as a Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout)
    }
}

/// Metadata dictionary type
pub type Metadata = std::collections::HashMap<String, String>;
