//! Tracker clients
//!
//! One method per tracker command, over pooled connections. [`TrackerClient`]
//! blocks the calling thread; [`AsyncTrackerClient`] runs on tokio. Both send
//! the same frames and decode the same structures.

use std::sync::Arc;
use std::time::Duration;

use crate::blocking::BlockingPool;
use crate::connection::ConnectionPool;
use crate::errors::Result;
use crate::operations::*;
use crate::records::{GroupInfo, StorageInfo};
use crate::types::{ClientConfig, StorageServer};

/// Blocking tracker client
///
/// # Example
///
/// ```no_run
/// use fastdfs::{ClientConfig, TrackerClient};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = ClientConfig::new(vec!["192.168.1.100:22122".to_string()]);
///     let tracker = TrackerClient::new(&config)?;
///
///     for group in tracker.list_all_groups()? {
///         println!("{}", group);
///     }
///     Ok(())
/// }
/// ```
pub struct TrackerClient {
    pool: Arc<BlockingPool>,
}

impl TrackerClient {
    /// Creates a client with its own connection pool
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let pool = BlockingPool::new(
            config.tracker_addrs.clone(),
            config.max_conns,
            config.connect_timeout(),
            config.network_timeout(),
            config.idle_timeout(),
        );
        Ok(Self::with_pool(Arc::new(pool)))
    }

    /// Creates a client over an existing pool
    pub fn with_pool(pool: Arc<BlockingPool>) -> Self {
        Self { pool }
    }

    /// The pool this client draws connections from
    pub fn pool(&self) -> &Arc<BlockingPool> {
        &self.pool
    }

    fn run<O: Operation>(&self, op: &O) -> Result<O::Output> {
        // Released when `conn` drops, on success and failure alike.
        let mut conn = self.pool.acquire(None)?;
        conn.execute(op)
    }

    /// Lists the storage servers of a group, optionally only the one at `storage_ip`
    pub fn list_servers(&self, group_name: &str, storage_ip: Option<&str>) -> Result<Vec<StorageInfo>> {
        self.run(&ListServers {
            group_name: group_name.to_string(),
            storage_ip: storage_ip.map(str::to_string),
        })
    }

    /// Fetches the summary of one group
    pub fn list_one_group(&self, group_name: &str) -> Result<GroupInfo> {
        self.run(&ListOneGroup {
            group_name: group_name.to_string(),
        })
    }

    /// Fetches the summaries of all groups, in tracker order
    pub fn list_all_groups(&self) -> Result<Vec<GroupInfo>> {
        self.run(&ListAllGroups)
    }

    /// Picks a storage server for a new upload; `None` lets the tracker choose the group
    pub fn query_storage_store(&self, group_name: Option<&str>) -> Result<StorageServer> {
        self.run(&QueryStore {
            group_name: group_name.map(str::to_string),
        })
    }

    /// Finds a storage server able to update (delete, set metadata) a file
    pub fn query_storage_update(&self, group_name: &str, remote_filename: &str) -> Result<StorageServer> {
        self.run(&QueryStorage::update(group_name, remote_filename))
    }

    /// Finds a storage server able to serve a file
    pub fn query_storage_fetch(&self, group_name: &str, remote_filename: &str) -> Result<StorageServer> {
        self.run(&QueryStorage::fetch(group_name, remote_filename))
    }

    /// Checks that the tracker answers
    pub fn active_test(&self) -> Result<()> {
        self.run(&ActiveTest)
    }

    /// Closes the underlying pool
    pub fn close(&self) {
        self.pool.close();
    }
}

/// Async tracker client
///
/// A connection is returned to the pool only after a completed exchange; on
/// error or cancellation it is dropped.
pub struct AsyncTrackerClient {
    pool: Arc<ConnectionPool>,
    network_timeout: Duration,
}

impl AsyncTrackerClient {
    /// Creates a client with its own connection pool
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let pool = ConnectionPool::new(
            config.tracker_addrs.clone(),
            config.max_conns,
            config.connect_timeout(),
            config.idle_timeout(),
        );
        Ok(Self::with_pool(Arc::new(pool), config.network_timeout()))
    }

    /// Creates a client over an existing pool
    pub fn with_pool(pool: Arc<ConnectionPool>, network_timeout: Duration) -> Self {
        Self {
            pool,
            network_timeout,
        }
    }

    /// The pool this client draws connections from
    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    async fn run<O: Operation>(&self, op: &O) -> Result<O::Output> {
        let mut conn = self.pool.acquire(None).await?;
        let result = conn.execute(op, self.network_timeout).await;
        match result {
            Ok(output) => {
                conn.release().await;
                Ok(output)
            }
            Err(e) => {
                conn.invalidate();
                Err(e)
            }
        }
    }

    /// Lists the storage servers of a group, optionally only the one at `storage_ip`
    pub async fn list_servers(&self, group_name: &str, storage_ip: Option<&str>) -> Result<Vec<StorageInfo>> {
        self.run(&ListServers {
            group_name: group_name.to_string(),
            storage_ip: storage_ip.map(str::to_string),
        })
        .await
    }

    /// Fetches the summary of one group
    pub async fn list_one_group(&self, group_name: &str) -> Result<GroupInfo> {
        self.run(&ListOneGroup {
            group_name: group_name.to_string(),
        })
        .await
    }

    /// Fetches the summaries of all groups, in tracker order
    pub async fn list_all_groups(&self) -> Result<Vec<GroupInfo>> {
        self.run(&ListAllGroups).await
    }

    /// Picks a storage server for a new upload; `None` lets the tracker choose the group
    pub async fn query_storage_store(&self, group_name: Option<&str>) -> Result<StorageServer> {
        self.run(&QueryStore {
            group_name: group_name.map(str::to_string),
        })
        .await
    }

    /// Finds a storage server able to update (delete, set metadata) a file
    pub async fn query_storage_update(&self, group_name: &str, remote_filename: &str) -> Result<StorageServer> {
        self.run(&QueryStorage::update(group_name, remote_filename)).await
    }

    /// Finds a storage server able to serve a file
    pub async fn query_storage_fetch(&self, group_name: &str, remote_filename: &str) -> Result<StorageServer> {
        self.run(&QueryStorage::fetch(group_name, remote_filename)).await
    }

    /// Checks that the tracker answers
    pub async fn active_test(&self) -> Result<()> {
        self.run(&ActiveTest).await
    }

    /// Closes the underlying pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
