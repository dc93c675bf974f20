//! Storage Lookup Example
//!
//! This example asks the tracker where to upload a new file and, given a
//! file ID, which servers can serve or update it. It also shows the
//! one-shot resolver for callers without a pooled client.
//!
//! Run this example with:
//! ```bash
//! FASTDFS_TRACKER_ADDR=192.168.1.100:22122 cargo run --example query_storage -- group1/M00/00/00/example.jpg
//! ```

use fastdfs::protocol::split_file_id;
use fastdfs::types::TRACKER_DEFAULT_PORT;
use fastdfs::{get_storage_server, AsyncTrackerClient, ClientConfig, FastDFSError};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let tracker_addr = std::env::var("FASTDFS_TRACKER_ADDR")
        .unwrap_or_else(|_| format!("127.0.0.1:{}", TRACKER_DEFAULT_PORT));
    let file_id = std::env::args().nth(1);

    let config = ClientConfig::new(vec![tracker_addr.clone()])
        .with_connect_timeout(3000)
        .with_network_timeout(10000);
    let tracker = AsyncTrackerClient::new(&config)?;

    // Example 1: Liveness check
    tracker.active_test().await?;
    println!("tracker {} is alive", tracker_addr);

    // Example 2: Upload target chosen by the tracker
    let server = tracker.query_storage_store(None).await?;
    println!(
        "upload to {} in {} (store path {})",
        server.addr(),
        server.group_name,
        server.store_path_index
    );

    // Example 3: Same lookup over a one-shot connection
    let server = get_storage_server(&tracker_addr, "", "").await?;
    println!("one-shot resolver picked {}", server.addr());

    // Example 4: Servers for an existing file
    if let Some(file_id) = file_id {
        let (group_name, remote_filename) = split_file_id(&file_id)?;

        match tracker.query_storage_fetch(&group_name, &remote_filename).await {
            Ok(server) => println!("download {} from {}", file_id, server.addr()),
            Err(e) if e.is_not_found() => println!("{} is not known to the tracker", file_id),
            Err(e) => return Err(e.into()),
        }

        match tracker.query_storage_update(&group_name, &remote_filename).await {
            Ok(server) => println!("update {} on {}", file_id, server.addr()),
            Err(FastDFSError::Remote { code, message }) => {
                println!("tracker refused update lookup: {} ({})", message, code)
            }
            Err(e) => return Err(e.into()),
        }
    }

    tracker.close().await;
    Ok(())
}
