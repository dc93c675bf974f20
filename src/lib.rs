//! FastDFS Tracker Protocol Client
//!
//! Rust client for the FastDFS tracker protocol: the 10-byte frame header,
//! the metadata wire format, the fixed-layout storage and group statistics
//! records, and the tracker queries that locate storage servers.
//!
//! # Features
//!
//! - Group and storage server listings with full statistics
//! - Storage server lookup for upload, download, and update
//! - File metadata get/set and file deletion
//! - Blocking and async (Tokio) transports sending identical frames
//! - Connection pooling with guaranteed release
//! - Typed errors separating transport failures from remote status codes
//!
//! # Example
//!
//! ```no_run
//! use fastdfs::{AsyncTrackerClient, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new(vec!["192.168.1.100:22122".to_string()]);
//!     let tracker = AsyncTrackerClient::new(&config)?;
//!
//!     let server = tracker.query_storage_store(None).await?;
//!     println!("upload to {} (path {})", server.addr(), server.store_path_index);
//!
//!     for group in tracker.list_all_groups().await? {
//!         println!("{}", group);
//!     }
//!
//!     tracker.close().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod blocking;
pub mod connection;
mod errors;
pub mod operations;
pub mod protocol;
pub mod records;
mod resolver;
mod storage;
mod tracker;
pub mod types;

// Re-export public API
pub use errors::{map_status_to_error, FastDFSError, Result};
pub use records::{GroupInfo, Record, StorageInfo};
pub use resolver::{get_storage_server, ResolveStorage, Resolver};
pub use storage::StorageClient;
pub use tracker::{AsyncTrackerClient, TrackerClient};
pub use types::{
    ClientConfig, Metadata, MetadataFlag, ResponseShape, StorageCommand, StorageServer,
    StorageStatus, TrackerCommand, TrackerHeader,
};
