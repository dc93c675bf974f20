//! Storage server resolution over an ad-hoc tracker connection
//!
//! Used by code that has a tracker address but no pooled session. The
//! connection is opened for one exchange and closed afterwards on every path.

use bytes::Bytes;
use std::time::Duration;
use tracing::debug;

use crate::blocking::BlockingConnection;
use crate::connection::Connection;
use crate::errors::Result;
use crate::operations::{Operation, QueryStore, QueryStorage};
use crate::types::{ClientConfig, ResponseShape, StorageServer};

/// Query-store when no filename is given, query-update otherwise
#[derive(Debug, Clone)]
pub enum ResolveStorage {
    /// New upload: the tracker picks group and server, reply carries a store path index
    Store(QueryStore),
    /// Existing file: reply has no store path index, reported as 0
    Update(QueryStorage),
}

impl ResolveStorage {
    /// An empty `filename` asks for an upload target and ignores `group_name`
    pub fn new(group_name: &str, filename: &str) -> Self {
        if filename.is_empty() {
            ResolveStorage::Store(QueryStore::default())
        } else {
            ResolveStorage::Update(QueryStorage::update(group_name, filename))
        }
    }
}

impl Operation for ResolveStorage {
    type Output = StorageServer;

    fn command(&self) -> u8 {
        match self {
            ResolveStorage::Store(op) => op.command(),
            ResolveStorage::Update(op) => op.command(),
        }
    }

    fn payload(&self) -> Bytes {
        match self {
            ResolveStorage::Store(op) => op.payload(),
            ResolveStorage::Update(op) => op.payload(),
        }
    }

    fn response_shape(&self) -> ResponseShape {
        match self {
            ResolveStorage::Store(op) => op.response_shape(),
            ResolveStorage::Update(op) => op.response_shape(),
        }
    }

    fn decode(&self, body: Bytes) -> Result<Self::Output> {
        match self {
            ResolveStorage::Store(op) => op.decode(body),
            ResolveStorage::Update(op) => op.decode(body),
        }
    }
}

/// Resolves storage servers through one-shot tracker connections
#[derive(Debug, Clone, Copy)]
pub struct Resolver {
    connect_timeout: Duration,
    network_timeout: Duration,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

impl From<&ClientConfig> for Resolver {
    fn from(config: &ClientConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            network_timeout: config.network_timeout(),
        }
    }
}

impl Resolver {
    /// Asks the tracker at `tracker_addr` for a storage server
    pub async fn resolve(&self, tracker_addr: &str, group_name: &str, filename: &str) -> Result<StorageServer> {
        let op = ResolveStorage::new(group_name, filename);
        let mut conn = Connection::connect(tracker_addr, self.connect_timeout).await?;
        let server = conn.execute(&op, self.network_timeout).await?;
        debug!(tracker = tracker_addr, storage = %server.addr(), "resolved storage server");
        Ok(server)
    }

    /// Blocking counterpart of [`Resolver::resolve`]
    pub fn resolve_blocking(&self, tracker_addr: &str, group_name: &str, filename: &str) -> Result<StorageServer> {
        let op = ResolveStorage::new(group_name, filename);
        let mut conn = BlockingConnection::connect(tracker_addr, self.connect_timeout, self.network_timeout)?;
        let server = conn.execute(&op)?;
        debug!(tracker = tracker_addr, storage = %server.addr(), "resolved storage server");
        Ok(server)
    }
}

/// Asks the tracker at `tracker_addr` for a storage server, with default timeouts
///
/// An empty `filename` yields an upload target; otherwise the server that can
/// update `group_name/filename`.
pub async fn get_storage_server(tracker_addr: &str, group_name: &str, filename: &str) -> Result<StorageServer> {
    Resolver::default()
        .resolve(tracker_addr, group_name, filename)
        .await
}
