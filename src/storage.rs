//! Storage-side metadata and delete operations
//!
//! Each call asks the tracker which storage server owns the file, then runs
//! one exchange against that server through the storage connection pool.

use std::sync::Arc;
use std::time::Duration;

use crate::connection::ConnectionPool;
use crate::errors::Result;
use crate::operations::{DeleteFile, GetMetadata, Operation, SetMetadata};
use crate::protocol::split_file_id;
use crate::tracker::AsyncTrackerClient;
use crate::types::{ClientConfig, Metadata, MetadataFlag, StorageServer};

/// Async client for file metadata and deletion
///
/// # Example
///
/// ```no_run
/// use fastdfs::{ClientConfig, Metadata, MetadataFlag, StorageClient};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = ClientConfig::new(vec!["192.168.1.100:22122".to_string()]);
///     let client = StorageClient::new(&config)?;
///
///     let mut metadata = Metadata::new();
///     metadata.insert("author".to_string(), "John Doe".to_string());
///     client
///         .set_metadata("group1/M00/00/00/test.jpg", &metadata, MetadataFlag::Merge)
///         .await?;
///
///     client.close().await;
///     Ok(())
/// }
/// ```
pub struct StorageClient {
    tracker: AsyncTrackerClient,
    storage_pool: Arc<ConnectionPool>,
    network_timeout: Duration,
}

impl StorageClient {
    /// Creates a client with its own tracker and storage pools
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let tracker = AsyncTrackerClient::new(config)?;

        // Storage servers are discovered through the tracker.
        let storage_pool = Arc::new(ConnectionPool::new(
            Vec::new(),
            config.max_conns,
            config.connect_timeout(),
            config.idle_timeout(),
        ));

        Ok(Self {
            tracker,
            storage_pool,
            network_timeout: config.network_timeout(),
        })
    }

    /// The tracker client used to locate storage servers
    pub fn tracker(&self) -> &AsyncTrackerClient {
        &self.tracker
    }

    async fn run_on<O: Operation>(&self, server: &StorageServer, op: &O) -> Result<O::Output> {
        let mut conn = self.storage_pool.acquire(Some(&server.addr())).await?;
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

    /// Sets metadata for a file
    pub async fn set_metadata(&self, file_id: &str, metadata: &Metadata, flag: MetadataFlag) -> Result<()> {
        let (group_name, remote_filename) = split_file_id(file_id)?;
        let op = SetMetadata::new(&group_name, &remote_filename, metadata, flag)?;

        let server = self
            .tracker
            .query_storage_update(&group_name, &remote_filename)
            .await?;
        self.run_on(&server, &op).await
    }

    /// Retrieves metadata for a file
    pub async fn get_metadata(&self, file_id: &str) -> Result<Metadata> {
        let (group_name, remote_filename) = split_file_id(file_id)?;

        let server = self
            .tracker
            .query_storage_fetch(&group_name, &remote_filename)
            .await?;
        self.run_on(
            &server,
            &GetMetadata {
                group_name,
                remote_filename,
            },
        )
        .await
    }

    /// Deletes a file from FastDFS
    pub async fn delete_file(&self, file_id: &str) -> Result<()> {
        let (group_name, remote_filename) = split_file_id(file_id)?;

        let server = self
            .tracker
            .query_storage_update(&group_name, &remote_filename)
            .await?;
        self.run_on(
            &server,
            &DeleteFile {
                group_name,
                remote_filename,
            },
        )
        .await
    }

    /// Closes the tracker and storage pools
    pub async fn close(&self) {
        self.tracker.close().await;
        self.storage_pool.close().await;
    }
}
