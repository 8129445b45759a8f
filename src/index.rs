//! K-mer index serialization and deserialization.
//!
//! This module provides functionality to save k-mer counts to disk and load them
//! back without re-counting. This is useful for large genomes where counting is
//! expensive.
//!
//! # Binary Format (Version 1)
//!
//! The index file uses a simple binary format:
//!
//! ```text
//! +--------+--------+------+--------+------------------+--------+
//! | MAGIC  | VERSION|  K   | COUNT  |      DATA        | CRC32  |
//! | 4 bytes| 1 byte |1 byte| 8 bytes| 16 bytes x COUNT | 4 bytes|
//! +--------+--------+------+--------+------------------+--------+
//!
//! MAGIC:   "KMIX" (0x4B 0x4D 0x49 0x58)
//! VERSION: Format version (currently 1)
//! K:       K-mer length (1-32)
//! COUNT:   Number of distinct k-mers (little-endian u64)
//! DATA:    Array of (packed_bits: u64, count: u64) pairs (little-endian)
//! CRC32:   CRC32 checksum of all preceding bytes (little-endian)
//! ```
//!
//! # Compression
//!
//! Index files with `.gz` extension are automatically compressed/decompressed
//! using gzip (requires `gzip` feature).
//!
//! This is an explicit, named output artifact the caller asked for via
//! `--save` — it is not a cache the counting process itself reads back.
//!
//! # Example
//!
//! ```rust,no_run
//! use kmerust::index::{KmerIndex, save_index, load_index};
//! use kmerust::kmer::KmerLength;
//! use std::collections::HashMap;
//!
//! // Create an index from counts
//! let mut counts = HashMap::new();
//! counts.insert(0b00_01_10_11u64, 42u64); // ACGT -> 42
//! let index = KmerIndex::new(KmerLength::new(4).unwrap(), counts);
//!
//! // Save to disk
//! save_index(&index, "kmers.kmix").unwrap();
//!
//! // Load back
//! let loaded = load_index("kmers.kmix").unwrap();
//! assert_eq!(loaded.k(), index.k());
//! ```

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::KmerustError;
use crate::kmer::{unpack_to_string, KmerLength};

/// Magic bytes identifying a kmerust index file.
const MAGIC: &[u8; 4] = b"KMIX";

/// Current format version.
const VERSION: u8 = 1;

/// A k-mer index containing packed k-mer counts.
///
/// The index stores k-mers in their packed form (64-bit integers) along
/// with their counts. This is more compact than storing k-mer strings.
#[derive(Debug, Clone)]
pub struct KmerIndex {
    k: KmerLength,
    counts: HashMap<u64, u64>,
}

impl KmerIndex {
    /// Creates a new k-mer index.
    #[must_use]
    pub fn new(k: KmerLength, counts: HashMap<u64, u64>) -> Self {
        Self { k, counts }
    }

    #[must_use]
    pub fn k(&self) -> KmerLength {
        self.k
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    #[must_use]
    pub fn counts(&self) -> &HashMap<u64, u64> {
        &self.counts
    }

    #[must_use]
    pub fn into_counts(self) -> HashMap<u64, u64> {
        self.counts
    }

    #[must_use]
    pub fn get(&self, packed_bits: u64) -> Option<u64> {
        self.counts.get(&packed_bits).copied()
    }

    /// Unpacks every k-mer back to its ASCII string form.
    #[must_use]
    pub fn to_string_counts(&self) -> HashMap<String, u64> {
        self.counts
            .iter()
            .map(|(&packed, &count)| (unpack_to_string(packed, self.k), count))
            .collect()
    }
}

/// Saves a k-mer index to a file.
///
/// The file format is detected from the extension:
/// - `.kmix` - uncompressed binary format
/// - `.kmix.gz` - gzip-compressed binary format (requires `gzip` feature)
///
/// # Errors
///
/// Returns `KmerustError::Io` if the file cannot be created or written.
pub fn save_index<P: AsRef<Path>>(index: &KmerIndex, path: P) -> Result<(), KmerustError> {
    let path = path.as_ref();

    #[cfg(feature = "gzip")]
    if is_gzip_path(path) {
        let file = File::create(path).map_err(|e| KmerustError::io(path, e))?;
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let writer = BufWriter::new(encoder);
        return write_index(index, writer, path);
    }

    let file = File::create(path).map_err(|e| KmerustError::io(path, e))?;
    let writer = BufWriter::new(file);
    write_index(index, writer, path)
}

/// Loads a k-mer index from a file.
///
/// The file format is detected from the extension:
/// - `.kmix` - uncompressed binary format
/// - `.kmix.gz` - gzip-compressed binary format (requires `gzip` feature)
///
/// # Errors
///
/// Returns `KmerustError::Io` if the file cannot be opened, or
/// `KmerustError::Usage` if the file is not a valid index (bad magic,
/// version, size, or checksum).
pub fn load_index<P: AsRef<Path>>(path: P) -> Result<KmerIndex, KmerustError> {
    let path = path.as_ref();

    #[cfg(feature = "gzip")]
    if is_gzip_path(path) {
        let file = File::open(path).map_err(|e| KmerustError::io(path, e))?;
        let decoder = flate2::read::GzDecoder::new(file);
        let reader = BufReader::new(decoder);
        return read_index(reader, path);
    }

    let file = File::open(path).map_err(|e| KmerustError::io(path, e))?;
    let reader = BufReader::new(file);
    read_index(reader, path)
}

/// Writes the index to a writer, computing CRC32 as we go.
fn write_index<W: Write, P: AsRef<Path>>(
    index: &KmerIndex,
    mut writer: W,
    path: P,
) -> Result<(), KmerustError> {
    let path = path.as_ref();
    let mut crc = Crc32Writer::new(&mut writer);

    crc.write_all(MAGIC).map_err(|e| KmerustError::io(path, e))?;
    crc.write_all(&[VERSION])
        .map_err(|e| KmerustError::io(path, e))?;
    crc.write_all(&[index.k.as_u8()])
        .map_err(|e| KmerustError::io(path, e))?;
    crc.write_all(&(index.counts.len() as u64).to_le_bytes())
        .map_err(|e| KmerustError::io(path, e))?;

    for (&packed, &count) in &index.counts {
        crc.write_all(&packed.to_le_bytes())
            .map_err(|e| KmerustError::io(path, e))?;
        crc.write_all(&count.to_le_bytes())
            .map_err(|e| KmerustError::io(path, e))?;
    }

    let checksum = crc.finalize();
    writer
        .write_all(&checksum.to_le_bytes())
        .map_err(|e| KmerustError::io(path, e))?;
    writer.flush().map_err(|e| KmerustError::io(path, e))?;

    Ok(())
}

/// Reads and validates an index from a reader.
fn read_index<R: Read, P: AsRef<Path>>(reader: R, path: P) -> Result<KmerIndex, KmerustError> {
    let path = path.as_ref();
    let usage = |details: String| KmerustError::Usage(format!("{}: {details}", path.display()));

    let mut data = Vec::new();
    let mut reader = BufReader::new(reader);
    reader
        .read_to_end(&mut data)
        .map_err(|e| KmerustError::io(path, e))?;

    // Need at least header (14 bytes) + CRC32 (4 bytes)
    if data.len() < 18 {
        return Err(usage("file too small".into()));
    }

    // Check magic first (before CRC) to give better error for non-index files
    if &data[..4] != MAGIC {
        return Err(usage("invalid magic bytes (not a kmerust index file)".into()));
    }

    let (content, checksum_bytes) = data.split_at(data.len() - 4);
    let stored_checksum = u32::from_le_bytes(checksum_bytes.try_into().unwrap());

    let computed_checksum = crc32(content);
    if computed_checksum != stored_checksum {
        return Err(usage(format!(
            "checksum mismatch (expected {stored_checksum:#x}, got {computed_checksum:#x})"
        )));
    }

    let mut cursor = &content[4..];

    if cursor.is_empty() || cursor[0] != VERSION {
        return Err(usage(format!(
            "unsupported version {}",
            cursor.first().unwrap_or(&0)
        )));
    }
    cursor = &cursor[1..];

    if cursor.is_empty() {
        return Err(usage("missing k-mer length".into()));
    }
    let k_val = cursor[0];
    let k = KmerLength::new(k_val as usize).map_err(|e| usage(format!("invalid k-mer length: {e}")))?;
    cursor = &cursor[1..];

    if cursor.len() < 8 {
        return Err(usage("missing k-mer count".into()));
    }
    let count = u64::from_le_bytes(cursor[..8].try_into().unwrap());
    cursor = &cursor[8..];

    let expected_data_size = count as usize * 16; // 8 bytes packed + 8 bytes count
    if cursor.len() != expected_data_size {
        return Err(usage(format!(
            "data size mismatch (expected {expected_data_size} bytes, got {} bytes)",
            cursor.len()
        )));
    }

    let mut counts = HashMap::with_capacity(count as usize);
    for _ in 0..count {
        let packed = u64::from_le_bytes(cursor[..8].try_into().unwrap());
        let kmer_count = u64::from_le_bytes(cursor[8..16].try_into().unwrap());
        counts.insert(packed, kmer_count);
        cursor = &cursor[16..];
    }

    Ok(KmerIndex { k, counts })
}

/// CRC32 (IEEE polynomial) computation.
fn crc32(data: &[u8]) -> u32 {
    const POLYNOMIAL: u32 = 0xEDB8_8320;

    let table: [u32; 256] = {
        let mut table = [0u32; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            let mut crc = i as u32;
            for _ in 0..8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ POLYNOMIAL;
                } else {
                    crc >>= 1;
                }
            }
            *entry = crc;
        }
        table
    };

    let mut crc = !0u32;
    for &byte in data {
        crc = table[((crc ^ u32::from(byte)) & 0xFF) as usize] ^ (crc >> 8);
    }
    !crc
}

/// A writer that computes CRC32 as data is written.
struct Crc32Writer<W> {
    inner: W,
    data: Vec<u8>,
}

impl<W: Write> Crc32Writer<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            data: Vec::new(),
        }
    }

    fn finalize(self) -> u32 {
        crc32(&self.data)
    }
}

impl<W: Write> Write for Crc32Writer<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.data.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Checks if a path has a `.gz` extension.
#[cfg(feature = "gzip")]
fn is_gzip_path(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}
