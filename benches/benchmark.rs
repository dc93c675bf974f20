//! Performance benchmarks for the FastDFS tracker client
//!
//! This benchmark suite measures the codec paths every tracker exchange goes
//! through: frame headers, metadata, the fixed-layout statistics records, and
//! a complete request/response exchange over an in-memory stream.
//!
//! Run benchmarks with:
//! ```bash
//! cargo bench
//! ```

use std::io::{self, Cursor, Read, Write};

use bytes::{BufMut, BytesMut};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fastdfs::operations::ListAllGroups;
use fastdfs::protocol::*;
use fastdfs::records::decode_records;
use fastdfs::types::*;
use fastdfs::{GroupInfo, Record, StorageInfo};

fn group_records(count: usize) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(count * GroupInfo::SIZE);
    for i in 0..count {
        buf.put(pad_string(&format!("group{}", i), FDFS_GROUP_NAME_MAX_LEN + 1));
        for n in [1_048_576u64, 524_288, 0, 2, 23000, 8888, 2, 0, 1, 256, 0] {
            buf.put_u64(n);
        }
    }
    buf.to_vec()
}

fn storage_records(count: usize) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(count * StorageInfo::SIZE);
    for i in 0..count {
        buf.put_u8(7);
        buf.put(pad_string(&format!("storage{}", i), FDFS_STORAGE_ID_MAX_SIZE));
        buf.put(pad_string(&format!("10.0.0.{}", i % 250), 16));
        buf.put(pad_string("", FDFS_DOMAIN_NAME_MAX_LEN));
        buf.put(pad_string("", FDFS_STORAGE_ID_MAX_SIZE));
        buf.put(pad_string("6.12", FDFS_VERSION_SIZE));
        buf.put_u64(1_700_000_000);
        buf.put_u64(1_700_000_000);
        buf.put_u64(2_097_152);
        buf.put_u64(1024);
        for _ in 0..6 {
            buf.put_u64(1);
        }
        for _ in 0..3 {
            buf.put_u32(0);
        }
        for n in 0..42u64 {
            buf.put_u64(n);
        }
        buf.put_u8(0);
    }
    buf.to_vec()
}

/// Canned response stream that discards writes
struct CannedStream(Cursor<Vec<u8>>);

impl Read for CannedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Write for CannedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Benchmark for header encoding and decoding
fn bench_header(c: &mut Criterion) {
    c.bench_function("encode_header", |b| {
        b.iter(|| encode_header(black_box(1024), black_box(91), 0));
    });

    let header = encode_header(1024, 100, 0);
    c.bench_function("decode_header", |b| {
        b.iter(|| decode_header(black_box(&header)).unwrap());
    });
}

/// Benchmark for metadata encoding and decoding
///
/// Measures maps of increasing size, from a handful of tags to the hundreds
/// of entries some applications attach to media files.
fn bench_metadata(c: &mut Criterion) {
    let mut group = c.benchmark_group("metadata");

    for entries in [4usize, 32, 256] {
        let metadata: Metadata = (0..entries)
            .map(|i| (format!("key{}", i), format!("value-{}", i)))
            .collect();
        let encoded = encode_metadata(&metadata).unwrap();

        group.bench_with_input(BenchmarkId::new("encode", entries), &metadata, |b, m| {
            b.iter(|| encode_metadata(black_box(m)).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("decode", entries), &encoded, |b, data| {
            b.iter(|| decode_metadata(black_box(data)).unwrap());
        });
    }

    group.finish();
}

/// Benchmark for statistics record decoding
fn bench_records(c: &mut Criterion) {
    let mut group = c.benchmark_group("records");

    for count in [1usize, 16, 128] {
        let groups = group_records(count);
        group.throughput(Throughput::Bytes(groups.len() as u64));
        group.bench_with_input(BenchmarkId::new("group_info", count), &groups, |b, body| {
            b.iter(|| decode_records::<GroupInfo>(black_box(body)).unwrap());
        });

        let servers = storage_records(count);
        group.throughput(Throughput::Bytes(servers.len() as u64));
        group.bench_with_input(BenchmarkId::new("storage_info", count), &servers, |b, body| {
            b.iter(|| decode_records::<StorageInfo>(black_box(body)).unwrap());
        });
    }

    group.finish();
}

/// Benchmark for a complete list-all-groups exchange
///
/// Runs the blocking state machine against an in-memory stream, so the
/// figure excludes network latency.
fn bench_exchange(c: &mut Criterion) {
    let body = group_records(64);
    let mut response = encode_header(body.len() as u64, TrackerCommand::Resp.into(), 0).to_vec();
    response.extend_from_slice(&body);

    c.bench_function("exchange_list_all_groups_64", |b| {
        b.iter(|| {
            let mut stream = CannedStream(Cursor::new(response.clone()));
            fastdfs::blocking::exchange(&mut stream, black_box(&ListAllGroups)).unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_header,
    bench_metadata,
    bench_records,
    bench_exchange
);
criterion_main!(benches);
