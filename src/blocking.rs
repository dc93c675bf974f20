//! Blocking transport
//!
//! Thread-per-call counterpart of [`crate::connection`]: the same exchange
//! state machine over `std::io::{Read, Write}`, a std `TcpStream` connection,
//! and a pool whose guards return connections on every exit path.

use bytes::Bytes;
use std::collections::HashMap;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use crate::errors::{FastDFSError, Result};
use crate::operations::{check_body_len, decode_response, encode_request, Operation};
use crate::protocol::decode_header;
use crate::types::{FDFS_PROTO_HEADER_LEN, MAX_BODY_PREALLOC};

/// Runs one exchange over any blocking byte stream
///
/// Byte-for-byte the same conversation as [`crate::connection::exchange`].
pub fn exchange<S, O>(stream: &mut S, op: &O) -> Result<O::Output>
where
    S: Read + Write,
    O: Operation + ?Sized,
{
    let request = encode_request(op);
    debug!(cmd = op.command(), body_len = request.len() - FDFS_PROTO_HEADER_LEN, "sending request");
    stream.write_all(&request)?;
    stream.flush()?;

    let mut header_buf = [0u8; FDFS_PROTO_HEADER_LEN];
    stream.read_exact(&mut header_buf)?;
    let header = decode_header(&header_buf)?;
    debug!(cmd = header.cmd, status = header.status, body_len = header.length, "received header");
    header.verify()?;

    let body_len = check_body_len(op, header.length)?;
    let mut body = Vec::with_capacity(body_len.min(MAX_BODY_PREALLOC));
    (&mut *stream).take(header.length).read_to_end(&mut body)?;
    if body.len() < body_len {
        return Err(io::Error::from(ErrorKind::UnexpectedEof).into());
    }

    decode_response(op, Bytes::from(body))
}

/// A blocking TCP connection to a FastDFS server
#[derive(Debug)]
pub struct BlockingConnection {
    stream: TcpStream,
    addr: String,
    last_used: Instant,
    broken: bool,
}

impl BlockingConnection {
    /// Opens a connection with the given connect and I/O timeouts
    pub fn connect(addr: &str, connect_timeout: Duration, network_timeout: Duration) -> Result<Self> {
        let network_err = |source| FastDFSError::Network {
            operation: "connect".to_string(),
            addr: addr.to_string(),
            source,
        };

        let socket_addr = addr
            .to_socket_addrs()
            .map_err(network_err)?
            .next()
            .ok_or_else(|| FastDFSError::InvalidArgument(format!("cannot resolve {}", addr)))?;

        let stream = TcpStream::connect_timeout(&socket_addr, connect_timeout).map_err(|e| {
            if e.kind() == ErrorKind::TimedOut {
                FastDFSError::ConnectionTimeout(addr.to_string())
            } else {
                network_err(e)
            }
        })?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(network_timeout))?;
        stream.set_write_timeout(Some(network_timeout))?;
        debug!(addr, "connected");

        Ok(Self {
            stream,
            addr: addr.to_string(),
            last_used: Instant::now(),
            broken: false,
        })
    }

    /// Runs one operation
    ///
    /// Any failure marks the connection broken so the pool drops it on release:
    /// an error status or a rejected length leaves unread body bytes behind.
    pub fn execute<O>(&mut self, op: &O) -> Result<O::Output>
    where
        O: Operation + ?Sized,
    {
        match exchange(&mut self.stream, op) {
            Ok(output) => {
                self.last_used = Instant::now();
                Ok(output)
            }
            Err(FastDFSError::Io(e)) => {
                self.broken = true;
                if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) {
                    Err(FastDFSError::NetworkTimeout(format!("exchange with {}", self.addr)))
                } else {
                    Err(FastDFSError::Network {
                        operation: "exchange".to_string(),
                        addr: self.addr.clone(),
                        source: e,
                    })
                }
            }
            Err(e) => {
                self.broken = true;
                Err(e)
            }
        }
    }

    /// Whether a transport failure left this connection unusable
    pub fn is_broken(&self) -> bool {
        self.broken
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

/// A connection checked out of a [`BlockingPool`], returned to it on drop
pub struct BlockingPooledConnection<'a> {
    pool: &'a BlockingPool,
    conn: Option<BlockingConnection>,
}

impl BlockingPooledConnection<'_> {
    /// Runs one operation on the checked-out connection
    pub fn execute<O>(&mut self, op: &O) -> Result<O::Output>
    where
        O: Operation + ?Sized,
    {
        match self.conn.as_mut() {
            Some(conn) => conn.execute(op),
            None => Err(FastDFSError::ClientClosed),
        }
    }

    /// Returns the connection to the pool now rather than at end of scope
    pub fn release(mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }

    /// Address of the checked-out connection
    pub fn addr(&self) -> Option<&str> {
        self.conn.as_ref().map(BlockingConnection::addr)
    }
}

impl Drop for BlockingPooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

struct PoolState {
    idle: HashMap<String, Vec<BlockingConnection>>,
    closed: bool,
}

/// Blocking pool of reusable connections, keyed by server address
pub struct BlockingPool {
    addrs: Vec<String>,
    max_conns: usize,
    connect_timeout: Duration,
    network_timeout: Duration,
    idle_timeout: Duration,
    state: Mutex<PoolState>,
}

impl BlockingPool {
    /// Creates an empty pool; connections are opened on demand
    pub fn new(
        addrs: Vec<String>,
        max_conns: usize,
        connect_timeout: Duration,
        network_timeout: Duration,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            addrs,
            max_conns,
            connect_timeout,
            network_timeout,
            idle_timeout,
            state: Mutex::new(PoolState {
                idle: HashMap::new(),
                closed: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        // The state holds no invariants a panicking holder could break.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Checks out a connection to `addr`, or to the first configured address
    pub fn acquire(&self, addr: Option<&str>) -> Result<BlockingPooledConnection<'_>> {
        let addr = match addr {
            Some(a) => a.to_string(),
            None => self
                .addrs
                .first()
                .cloned()
                .ok_or_else(|| FastDFSError::InvalidArgument("No addresses available".to_string()))?,
        };

        {
            let mut state = self.lock();
            if state.closed {
                return Err(FastDFSError::ClientClosed);
            }
            let pool = state.idle.entry(addr.clone()).or_default();
            while let Some(conn) = pool.pop() {
                if conn.last_used().elapsed() < self.idle_timeout {
                    trace!(addr = %addr, "reusing pooled connection");
                    return Ok(BlockingPooledConnection {
                        pool: self,
                        conn: Some(conn),
                    });
                }
            }
        }

        let conn = BlockingConnection::connect(&addr, self.connect_timeout, self.network_timeout)?;
        Ok(BlockingPooledConnection {
            pool: self,
            conn: Some(conn),
        })
    }

    /// Takes a connection back; broken, stale, or surplus connections are dropped
    ///
    /// Safe to call with a connection whose last exchange failed.
    pub fn release(&self, conn: BlockingConnection) {
        if conn.is_broken() {
            warn!(addr = conn.addr(), "dropping broken connection");
            return;
        }

        let mut state = self.lock();
        if state.closed {
            return;
        }

        let pool = state.idle.entry(conn.addr().to_string()).or_default();
        if pool.len() >= self.max_conns || conn.last_used().elapsed() > self.idle_timeout {
            return;
        }
        pool.push(conn);
    }

    /// Number of idle connections held for `addr`
    pub fn idle_count(&self, addr: &str) -> usize {
        self.lock().idle.get(addr).map_or(0, Vec::len)
    }

    /// Closes all idle connections; later acquires fail with ClientClosed
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.idle.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::{ActiveTest, GetMetadata, ListAllGroups};
    use crate::protocol::encode_header;
    use crate::types::ResponseShape;
    use std::io::Cursor;

    /// Records writes and serves reads from a canned response
    struct ScriptedStream {
        written: Vec<u8>,
        response: Cursor<Vec<u8>>,
    }

    impl Read for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.response.read(buf)
        }
    }

    impl Write for ScriptedStream {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_exchange_empty_group_list() {
        let mut stream = ScriptedStream {
            written: Vec::new(),
            response: Cursor::new(vec![0, 0, 0, 0, 0, 0, 0, 0, 100, 0]),
        };

        let groups = exchange(&mut stream, &ListAllGroups).unwrap();
        assert!(groups.is_empty());
        assert_eq!(stream.written, [0, 0, 0, 0, 0, 0, 0, 0, 91, 0]);
    }

    #[test]
    fn test_exchange_truncated_header() {
        let mut stream = ScriptedStream {
            written: Vec::new(),
            response: Cursor::new(vec![0, 0, 0, 0]),
        };

        let err = exchange(&mut stream, &ListAllGroups).unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_exchange_rejects_length_before_reading() {
        // Header announces 10 bytes for a header-only reply; they stay unread.
        let mut response = encode_header(10, 100, 0).to_vec();
        response.extend_from_slice(&encode_header(0, 100, 0));
        let mut stream = ScriptedStream {
            written: Vec::new(),
            response: Cursor::new(response),
        };

        let err = exchange(&mut stream, &ActiveTest).unwrap_err();
        assert!(matches!(
            err,
            FastDFSError::ResponseSize {
                expected: ResponseShape::Exact(0),
                actual: 10
            }
        ));
        assert_eq!(stream.response.position(), 10);
    }

    #[test]
    fn test_exchange_huge_length_reads_only_what_arrives() {
        let mut response = encode_header(1 << 40, 100, 0).to_vec();
        response.extend_from_slice(b"a\x02b");
        let mut stream = ScriptedStream {
            written: Vec::new(),
            response: Cursor::new(response),
        };
        let op = GetMetadata {
            group_name: "group1".to_string(),
            remote_filename: "M00/00/00/a.jpg".to_string(),
        };

        let err = exchange(&mut stream, &op).unwrap_err();
        assert!(
            matches!(&err, FastDFSError::Io(e) if e.kind() == ErrorKind::UnexpectedEof),
            "got {err:?}"
        );
    }

    #[test]
    fn test_acquire_after_close() {
        let pool = BlockingPool::new(
            vec!["127.0.0.1:1".to_string()],
            1,
            Duration::from_millis(100),
            Duration::from_millis(100),
            Duration::from_secs(60),
        );
        pool.close();
        assert!(matches!(pool.acquire(None), Err(FastDFSError::ClientClosed)));
    }
}
