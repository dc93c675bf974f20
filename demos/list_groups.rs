//! Cluster Overview Example
//!
//! This example prints every group known to a tracker, then the detailed
//! statistics of each storage server in every group. Server listings for
//! all groups are requested concurrently over the shared connection pool.
//!
//! Run this example with:
//! ```bash
//! FASTDFS_TRACKER_ADDR=192.168.1.100:22122 cargo run --example list_groups
//! ```
//!
//! Set `RUST_LOG=fastdfs=debug` to see each frame sent and received.

use fastdfs::types::TRACKER_DEFAULT_PORT;
use fastdfs::{AsyncTrackerClient, ClientConfig};
use futures::future::join_all;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let tracker_addr = std::env::var("FASTDFS_TRACKER_ADDR")
        .unwrap_or_else(|_| format!("127.0.0.1:{}", TRACKER_DEFAULT_PORT));

    println!("FastDFS Tracker - Cluster Overview");
    println!("{}", "=".repeat(50));

    let config = ClientConfig::new(vec![tracker_addr]).with_max_conns(4);
    let tracker = AsyncTrackerClient::new(&config)?;

    let groups = tracker.list_all_groups().await?;
    println!("group count: {}", groups.len());

    let listings = join_all(
        groups
            .iter()
            .map(|group| tracker.list_servers(&group.group_name, None)),
    )
    .await;

    for (group, servers) in groups.iter().zip(listings) {
        println!("\n{}", group);
        match servers {
            Ok(servers) => {
                for server in servers {
                    println!("\n{}", server);
                }
            }
            // One unreachable group should not hide the others
            Err(e) => eprintln!("\tfailed to list servers: {}", e),
        }
    }

    tracker.close().await;
    Ok(())
}
