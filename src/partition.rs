//! Disk partition layer used by [`DSKEngine`](crate::engine::dsk::DSKEngine).
//!
//! K-mers are routed to one of `I * P` partition files by a single hash of
//! the packed k-mer (no double hashing here — partition assignment only
//! needs one well-distributed function, unlike the membership filter's
//! multi-probe test; see the design note on single-hash partition
//! assignment). Partitions are grouped into `I` iterations so that at most
//! `P` partitions are ever counted in memory at once: iteration
//! `partition_id % I` is processed as one bounded-memory unit.
//!
//! Each partition file is an append-only sequence of fixed-width records —
//! `ceil(2*k/8)` bytes each, little-endian, no header, no padding between
//! records. There is no fsync: partial writes from a crash are an accepted
//! risk for scratch data that is regenerated by rerunning the tool (see
//! spec.md §4.4).

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::KmerustError;
use crate::hash::hash_kmer;

/// Number of bytes needed to hold a packed k-mer of length `k` without
/// padding beyond the byte boundary.
#[must_use]
pub const fn record_width(k: usize) -> usize {
    (2 * k + 7) / 8
}

/// Seed used for the single hash that assigns a k-mer to a partition.
/// Distinct from the membership filter's seeds so the two hash roles never
/// accidentally correlate.
const PARTITION_SEED: u32 = 0x1B87_3593;

/// Assigns a packed k-mer to one of `total_partitions` partitions.
#[must_use]
pub fn partition_of(packed: u64, total_partitions: u64) -> u64 {
    if total_partitions == 0 {
        return 0;
    }
    let h = hash_kmer(packed, PARTITION_SEED).h1;
    crate::hash::fast_range(h, total_partitions)
}

/// The iteration a partition belongs to: `partition_id % iterations`.
#[must_use]
pub const fn iteration_of(partition_id: u64, iterations: u64) -> u64 {
    if iterations == 0 {
        0
    } else {
        partition_id % iterations
    }
}

/// Naming convention for partition files on disk: one file per partition,
/// grouped under a directory per iteration.
#[must_use]
pub fn partition_path(scratch_dir: &Path, iteration: u64, partition_id: u64) -> PathBuf {
    scratch_dir
        .join(format!("iter_{iteration:04}"))
        .join(format!("part_{partition_id:06}.bin"))
}

/// Append-only writer for one partition file.
pub struct PartitionWriter {
    writer: BufWriter<File>,
    record_bytes: usize,
    bytes_written: u64,
    path: PathBuf,
}

impl PartitionWriter {
    /// Opens (creating parent directories as needed) a partition file for
    /// appending fixed-width records of `record_bytes` bytes each.
    pub fn create(path: &Path, record_bytes: usize) -> Result<Self, KmerustError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| KmerustError::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| KmerustError::io(path, e))?;
        let bytes_written = file
            .metadata()
            .map_err(|e| KmerustError::io(path, e))?
            .len();
        Ok(Self {
            writer: BufWriter::new(file),
            record_bytes,
            bytes_written,
            path: path.to_path_buf(),
        })
    }

    /// Appends one packed k-mer as a fixed-width little-endian record.
    ///
    /// Returns `PartitionOverflow` if `max_bytes` (if given) would be
    /// exceeded by this write, matching spec.md §4.5's per-partition
    /// overflow failure mode.
    pub fn append(&mut self, packed: u64, max_bytes: Option<u64>) -> Result<(), KmerustError> {
        let next_len = self.bytes_written + self.record_bytes as u64;
        if let Some(max) = max_bytes {
            if next_len > max {
                return Err(KmerustError::PartitionOverflow {
                    partition: 0,
                    bytes: next_len,
                });
            }
        }
        let full = packed.to_le_bytes();
        self.writer
            .write_all(&full[..self.record_bytes])
            .map_err(|e| KmerustError::io(&self.path, e))?;
        self.bytes_written = next_len;
        Ok(())
    }

    /// Flushes buffered writes. No fsync is performed — see module docs.
    pub fn flush(&mut self) -> Result<(), KmerustError> {
        self.writer
            .flush()
            .map_err(|e| KmerustError::io(&self.path, e))
    }

    #[must_use]
    pub const fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

/// Sequential reader for one partition file.
pub struct PartitionReader {
    reader: BufReader<File>,
    record_bytes: usize,
    path: PathBuf,
}

impl PartitionReader {
    pub fn open(path: &Path, record_bytes: usize) -> Result<Self, KmerustError> {
        let file = File::open(path).map_err(|e| KmerustError::io(path, e))?;
        Ok(Self {
            reader: BufReader::new(file),
            record_bytes,
            path: path.to_path_buf(),
        })
    }

    /// Reads the next packed k-mer, or `Ok(None)` at end of file.
    pub fn read_next(&mut self) -> Result<Option<u64>, KmerustError> {
        let mut buf = [0u8; 8];
        let slot = &mut buf[..self.record_bytes];
        match self.reader.read_exact(slot) {
            Ok(()) => Ok(Some(u64::from_le_bytes(buf))),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(KmerustError::io(&self.path, e)),
        }
    }

    /// Reads every record in the file into memory, in file order.
    pub fn read_all(&mut self) -> Result<Vec<u64>, KmerustError> {
        let mut out = Vec::new();
        while let Some(packed) = self.read_next()? {
            out.push(packed);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_width_matches_bit_budget() {
        assert_eq!(record_width(4), 1); // 8 bits
        assert_eq!(record_width(5), 2); // 10 bits -> 2 bytes
        assert_eq!(record_width(32), 8); // 64 bits
    }

    #[test]
    fn partition_of_is_bounded_and_deterministic() {
        for p in [1u64, 42, 999_999] {
            let a = partition_of(p, 17);
            let b = partition_of(p, 17);
            assert_eq!(a, b);
            assert!(a < 17);
        }
    }

    #[test]
    fn iteration_of_wraps() {
        assert_eq!(iteration_of(5, 3), 2);
        assert_eq!(iteration_of(0, 3), 0);
    }

    #[test]
    fn write_then_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = partition_path(dir.path(), 0, 3);
        let width = record_width(10);

        let values = [1u64, 12345, 0, u64::from(u32::MAX)];
        {
            let mut writer = PartitionWriter::create(&path, width).unwrap();
            for &v in &values {
                writer.append(v, None).unwrap();
            }
            writer.flush().unwrap();
        }

        let mut reader = PartitionReader::open(&path, width).unwrap();
        let read_back = reader.read_all().unwrap();
        assert_eq!(read_back, values);
    }

    #[test]
    fn append_respects_max_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.bin");
        let width = record_width(8);
        let mut writer = PartitionWriter::create(&path, width).unwrap();
        writer.append(1, Some(width as u64)).unwrap();
        let err = writer.append(2, Some(width as u64)).unwrap_err();
        assert!(matches!(err, KmerustError::PartitionOverflow { .. }));
    }

    #[test]
    fn writer_appends_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.bin");
        let width = record_width(8);
        {
            let mut w = PartitionWriter::create(&path, width).unwrap();
            w.append(1, None).unwrap();
            w.flush().unwrap();
        }
        {
            let mut w = PartitionWriter::create(&path, width).unwrap();
            w.append(2, None).unwrap();
            w.flush().unwrap();
        }
        let mut r = PartitionReader::open(&path, width).unwrap();
        assert_eq!(r.read_all().unwrap(), vec![1, 2]);
    }
}
