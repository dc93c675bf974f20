//! FastDFS Connection Management
//!
//! This module handles async TCP connections to FastDFS servers: the shared
//! request/response state machine, a connection wrapper with timeouts, and a
//! connection pool whose guards never hand a half-used stream to the next caller.

use bytes::Bytes;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::errors::{FastDFSError, Result};
use crate::operations::{check_body_len, decode_response, encode_request, Operation};
use crate::protocol::decode_header;
use crate::types::{FDFS_PROTO_HEADER_LEN, MAX_BODY_PREALLOC};

/// Runs one exchange over any async byte stream
///
/// The request is written in full before the response header is read, the
/// status is verified before the body is read, and exactly `length` body
/// bytes are consumed. A length the operation cannot accept is rejected
/// before reading; the body buffer grows only as bytes arrive. A short read
/// surfaces as an I/O error.
///
/// Any error leaves the stream at an unknown position in the frame, so the
/// connection must not be reused.
pub async fn exchange<S, O>(stream: &mut S, op: &O) -> Result<O::Output>
where
    S: AsyncRead + AsyncWrite + Unpin,
    O: Operation + ?Sized,
{
    let request = encode_request(op);
    debug!(cmd = op.command(), body_len = request.len() - FDFS_PROTO_HEADER_LEN, "sending request");
    stream.write_all(&request).await?;
    stream.flush().await?;

    let mut header_buf = [0u8; FDFS_PROTO_HEADER_LEN];
    stream.read_exact(&mut header_buf).await?;
    let header = decode_header(&header_buf)?;
    debug!(cmd = header.cmd, status = header.status, body_len = header.length, "received header");
    header.verify()?;

    let body_len = check_body_len(op, header.length)?;
    let mut body = Vec::with_capacity(body_len.min(MAX_BODY_PREALLOC));
    (&mut *stream).take(header.length).read_to_end(&mut body).await?;
    if body.len() < body_len {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
    }

    decode_response(op, Bytes::from(body))
}

/// Represents a TCP connection to a FastDFS server (tracker or storage)
///
/// It wraps a TcpStream with additional metadata and async operations.
/// Each connection tracks its last usage time for idle timeout management.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    addr: String,
    last_used: Instant,
}

impl Connection {
    /// Creates a new connection with an established TCP stream
    pub fn new(stream: TcpStream, addr: String) -> Self {
        Self {
            stream,
            addr,
            last_used: Instant::now(),
        }
    }

    /// Opens a new connection, bounded by `connect_timeout`
    pub async fn connect(addr: &str, connect_timeout: Duration) -> Result<Self> {
        let result = timeout(connect_timeout, TcpStream::connect(addr)).await;

        match result {
            Ok(Ok(stream)) => {
                stream.set_nodelay(true)?;
                debug!(addr, "connected");
                Ok(Connection::new(stream, addr.to_string()))
            }
            Ok(Err(e)) => Err(FastDFSError::Network {
                operation: "connect".to_string(),
                addr: addr.to_string(),
                source: e,
            }),
            Err(_) => Err(FastDFSError::ConnectionTimeout(addr.to_string())),
        }
    }

    /// Runs one operation, bounding the whole exchange by `network_timeout`
    ///
    /// This method updates the last_used timestamp on success.
    pub async fn execute<O>(&mut self, op: &O, network_timeout: Duration) -> Result<O::Output>
    where
        O: Operation + ?Sized,
    {
        let result = timeout(network_timeout, exchange(&mut self.stream, op)).await;

        match result {
            Ok(Ok(output)) => {
                self.last_used = Instant::now();
                Ok(output)
            }
            Ok(Err(FastDFSError::Io(e))) => Err(FastDFSError::Network {
                operation: "exchange".to_string(),
                addr: self.addr.clone(),
                source: e,
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(FastDFSError::NetworkTimeout(format!("exchange with {}", self.addr))),
        }
    }

    /// Returns the timestamp of the last completed exchange
    pub fn last_used(&self) -> Instant {
        self.last_used
    }

    /// Returns the server address this connection is connected to
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

/// A connection checked out of a [`ConnectionPool`]
///
/// Call [`PooledConnection::release`] once an exchange has completed. A guard
/// dropped without release (an error or a cancelled future) discards its
/// connection, since the stream may hold a partially written request or an
/// unread response.
pub struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    conn: Option<Connection>,
}

impl<'a> PooledConnection<'a> {
    /// Runs one operation on the checked-out connection
    pub async fn execute<O>(&mut self, op: &O, network_timeout: Duration) -> Result<O::Output>
    where
        O: Operation + ?Sized,
    {
        match self.conn.as_mut() {
            Some(conn) => conn.execute(op, network_timeout).await,
            None => Err(FastDFSError::ClientClosed),
        }
    }

    /// Returns the connection to the pool
    pub async fn release(mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.put(conn).await;
        }
    }

    /// Drops the connection without returning it
    pub fn invalidate(mut self) {
        if let Some(conn) = self.conn.take() {
            debug!(addr = conn.addr(), "invalidating connection");
        }
    }

    /// Address of the checked-out connection
    pub fn addr(&self) -> Option<&str> {
        self.conn.as_ref().map(Connection::addr)
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            warn!(addr = conn.addr(), "discarding connection after interrupted exchange");
        }
    }
}

/// Manages a pool of reusable connections to multiple servers
///
/// It maintains separate pools for each server address and handles:
///   - Connection reuse to minimize overhead
///   - Idle connection cleanup
///   - Thread-safe concurrent access
pub struct ConnectionPool {
    addrs: Vec<String>,
    max_conns: usize,
    connect_timeout: Duration,
    idle_timeout: Duration,
    pools: Arc<Mutex<HashMap<String, Vec<Connection>>>>,
    closed: Arc<Mutex<bool>>,
}

impl ConnectionPool {
    /// Creates a new connection pool for the specified servers
    ///
    /// The pool starts empty; connections are created on-demand when acquire is called.
    pub fn new(
        addrs: Vec<String>,
        max_conns: usize,
        connect_timeout: Duration,
        idle_timeout: Duration,
    ) -> Self {
        let pools = addrs
            .iter()
            .map(|addr| (addr.clone(), Vec::new()))
            .collect();

        Self {
            addrs,
            max_conns,
            connect_timeout,
            idle_timeout,
            pools: Arc::new(Mutex::new(pools)),
            closed: Arc::new(Mutex::new(false)),
        }
    }

    /// Checks out a connection, reusing an idle one when possible
    ///
    /// With `addr` unset the first configured address is used.
    pub async fn acquire(&self, addr: Option<&str>) -> Result<PooledConnection<'_>> {
        let conn = self.get(addr).await?;
        Ok(PooledConnection {
            pool: self,
            conn: Some(conn),
        })
    }

    /// Retrieves a connection from the pool or creates a new one
    ///
    /// It prefers reusing existing idle connections but will create new ones if needed.
    /// Stale connections are automatically discarded.
    async fn get(&self, addr: Option<&str>) -> Result<Connection> {
        if *self.closed.lock().await {
            return Err(FastDFSError::ClientClosed);
        }

        let addr = match addr {
            Some(a) => a.to_string(),
            None => self
                .addrs
                .first()
                .cloned()
                .ok_or_else(|| FastDFSError::InvalidArgument("No addresses available".to_string()))?,
        };

        {
            let mut pools = self.pools.lock().await;
            let pool = pools.entry(addr.clone()).or_default();

            // LIFO reuse
            while let Some(conn) = pool.pop() {
                if conn.last_used().elapsed() < self.idle_timeout {
                    trace!(addr = %addr, "reusing pooled connection");
                    return Ok(conn);
                }
            }
        }

        Connection::connect(&addr, self.connect_timeout).await
    }

    /// Returns a connection to the pool for reuse
    ///
    /// The connection is only kept if:
    ///   - The pool is not closed
    ///   - The pool is not full
    ///   - The connection hasn't been idle too long
    ///
    /// Otherwise, the connection is dropped.
    async fn put(&self, conn: Connection) {
        if *self.closed.lock().await {
            return;
        }

        let mut pools = self.pools.lock().await;
        let pool = pools.entry(conn.addr().to_string()).or_default();

        let now = Instant::now();
        pool.retain(|c| now.duration_since(c.last_used()) <= self.idle_timeout);

        if pool.len() >= self.max_conns || conn.last_used().elapsed() > self.idle_timeout {
            return;
        }

        pool.push(conn);
    }

    /// Number of idle connections held for `addr`
    pub async fn idle_count(&self, addr: &str) -> usize {
        self.pools.lock().await.get(addr).map_or(0, Vec::len)
    }

    /// Shuts down the connection pool and closes all connections
    ///
    /// After close is called, acquire will return ClientClosed error.
    /// It's safe to call close multiple times.
    pub async fn close(&self) {
        let mut closed = self.closed.lock().await;
        if *closed {
            return;
        }
        *closed = true;
        drop(closed);

        self.pools.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::{ActiveTest, GetMetadata, QueryStore};
    use crate::protocol::encode_header;
    use crate::types::ResponseShape;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_exchange_writes_exact_frame() {
        let mut mock = Builder::new()
            .write(&[0, 0, 0, 0, 0, 0, 0, 0, 111, 0])
            .read(&[0, 0, 0, 0, 0, 0, 0, 0, 100, 0])
            .build();

        exchange(&mut mock, &ActiveTest).await.unwrap();
    }

    #[tokio::test]
    async fn test_exchange_stops_at_bad_status() {
        // No body follows; reading one would fail the mock.
        let mut mock = Builder::new()
            .write(&[0, 0, 0, 0, 0, 0, 0, 0, 101, 0])
            .read(&[0, 0, 0, 0, 0, 0, 0, 70, 100, 2])
            .build();

        let err = exchange(&mut mock, &QueryStore::default()).await.unwrap_err();
        assert_eq!(err.status_code(), Some(2));
    }

    #[tokio::test]
    async fn test_exchange_short_body_is_io_error() {
        let mut mock = Builder::new()
            .write(&[0, 0, 0, 0, 0, 0, 0, 0, 101, 0])
            .read(&[0, 0, 0, 0, 0, 0, 0, 70, 100, 0])
            .read(&[0u8; 20])
            .build();

        let err = exchange(&mut mock, &QueryStore::default()).await.unwrap_err();
        assert!(matches!(err, FastDFSError::Io(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_exchange_rejects_impossible_length_unread() {
        // The length can never be a store reply; no body is read.
        let mut mock = Builder::new()
            .write(&[0, 0, 0, 0, 0, 0, 0, 0, 101, 0])
            .read(&encode_header(u64::MAX, 100, 0))
            .build();

        let err = exchange(&mut mock, &QueryStore::default()).await.unwrap_err();
        assert!(
            matches!(
                err,
                FastDFSError::ResponseSize { expected: ResponseShape::Exact(70), .. }
                    | FastDFSError::InvalidHeader(_)
            ),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn test_exchange_huge_length_reads_only_what_arrives() {
        let op = GetMetadata {
            group_name: "group1".to_string(),
            remote_filename: "M00/00/00/a.jpg".to_string(),
        };
        let mut mock = Builder::new()
            .write(&encode_request(&op))
            .read(&encode_header(1 << 40, 100, 0))
            .read(b"a\x02b")
            .build();

        let err = exchange(&mut mock, &op).await.unwrap_err();
        assert!(
            matches!(&err, FastDFSError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn test_acquire_after_close() {
        let pool = ConnectionPool::new(
            vec!["127.0.0.1:1".to_string()],
            2,
            Duration::from_millis(100),
            Duration::from_secs(60),
        );
        pool.close().await;
        assert!(matches!(
            pool.acquire(None).await,
            Err(FastDFSError::ClientClosed)
        ));
    }
}
