//! Append-only block-oriented index file: header, block allocator, and
//! entry-point tracking (spec §4.4).
//!
//! I/O goes through a narrow [`BlockDevice`] trait rather than directly
//! against `std::fs::File`, so the host's own VFS can be substituted (spec
//! §1: "the host VFS (block I/O, file open/create, size probe)" is an
//! external collaborator reached through this interface) and so tests can
//! inject I/O failures to exercise the `PartialBacklink` path (spec §4.6).

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::block::{self, IndexHeader};
use crate::error::Error;
use crate::vector::ElementType;

/// Default block size in bytes (spec §3, §6).
pub const DEFAULT_BLOCK_SIZE: u32 = 4096;

/// Narrow interface to the host's block storage (spec §1, §4.4).
///
/// Every method blocks the caller until the underlying device returns
/// (spec §5: no suspension points beyond the VFS call itself).
pub trait BlockDevice: Send + Sync {
    /// Current size of the file in bytes.
    fn len(&self) -> std::io::Result<u64>;

    /// Reads exactly `buf.len()` bytes starting at `offset`.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> std::io::Result<()>;

    /// Writes `buf` starting at `offset`, extending the file if needed.
    fn write_at(&self, offset: u64, buf: &[u8]) -> std::io::Result<()>;

    /// Flushes any buffered writes to stable storage.
    fn sync(&self) -> std::io::Result<()>;
}

/// A [`BlockDevice`] backed by a plain `std::fs::File`.
pub struct FileBlockDevice {
    file: Mutex<File>,
}

impl FileBlockDevice {
    /// Opens (creating if necessary) the file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl BlockDevice for FileBlockDevice {
    fn len(&self) -> std::io::Result<u64> {
        let file = self.file.lock().expect("file mutex poisoned");
        Ok(file.metadata()?.len())
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> std::io::Result<()> {
        let mut file = self.file.lock().expect("file mutex poisoned");
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> std::io::Result<()> {
        let mut file = self.file.lock().expect("file mutex poisoned");
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buf)
    }

    fn sync(&self) -> std::io::Result<()> {
        let file = self.file.lock().expect("file mutex poisoned");
        file.sync_all()
    }
}

/// An open index file: header plus append-only block allocator (spec §4.4).
pub struct IndexFile<V: BlockDevice> {
    device: V,
    header: RwLock<IndexHeader>,
    block_size: u32,
}

impl<V: BlockDevice> IndexFile<V> {
    /// Opens an existing index file, or creates one if `device` reports a
    /// zero-length file.
    ///
    /// On creation, `dimension` and `element_type` are fixed for the
    /// lifetime of the index (spec §9 supplemental item 3: no hard-coded
    /// dimension). On open, the stored header is validated against
    /// `dimension`/`element_type` and a recovery scan runs if
    /// `entry_offset == 0` but the file holds more than one block (spec §9
    /// open question 2).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corrupt`] if an existing header fails validation,
    /// or [`Error::IOError`] if the device fails.
    pub fn open(device: V, dimension: u16, element_type: ElementType) -> Result<Self, Error> {
        let block_size = DEFAULT_BLOCK_SIZE;
        let file_size = device.len()?;

        let header = if file_size == 0 {
            let header = IndexHeader {
                block_size_units: u16::try_from(block_size / 512)
                    .expect("block size fits in u16 sector units"),
                vector_type: element_type,
                dimension,
                similarity: 0,
                entry_offset: 0,
                first_free_offset: 0,
            };
            let bytes = block::encode_header(&header, block_size as usize);
            device.write_at(0, &bytes)?;
            info!(dimension, block_size, "created new index file");
            header
        } else {
            let mut buf = vec![0u8; block_size as usize];
            device.read_at(0, &mut buf)?;
            let header = block::decode_header(&buf)?;
            if header.dimension != dimension {
                return Err(Error::DimensionMismatch {
                    expected: dimension as usize,
                    actual: header.dimension as usize,
                });
            }
            if header.vector_type != element_type {
                return Err(Error::Corrupt("vector type tag mismatch".to_string()));
            }
            header
        };

        let index = Self {
            device,
            header: RwLock::new(header),
            block_size,
        };

        if file_size > u64::from(block_size) && index.header.read().entry_offset == 0 {
            index.recover()?;
        }

        Ok(index)
    }

    /// Recovery scan for the crash-consistency case described in spec §5
    /// and §9 open question 2: the file holds node blocks but the header's
    /// `entry_offset` never made it to disk. Scans blocks from the lowest
    /// offset upward, adopts the first one that decodes as a valid node,
    /// and rewrites the header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corrupt`] if no block in the file decodes as a
    /// valid node.
    pub fn recover(&self) -> Result<(), Error> {
        warn!("entry_offset is zero on a non-empty file; scanning for a valid entry block");
        let file_size = self.device.len()?;
        let mut offset = u64::from(self.block_size);
        let header_snapshot = *self.header.read();

        while offset < file_size {
            let mut buf = vec![0u8; self.block_size as usize];
            if self.device.read_at(offset, &mut buf).is_ok()
                && block::decode_node(&header_snapshot, &buf, u64::from(self.block_size), file_size).is_ok()
            {
                let mut header = self.header.write();
                header.entry_offset = offset;
                self.persist_header(&header)?;
                info!(offset, "recovered entry offset by scanning blocks");
                return Ok(());
            }
            offset += u64::from(self.block_size);
        }

        Err(Error::Corrupt(
            "no valid node block found during recovery scan".to_string(),
        ))
    }

    /// Current header snapshot.
    #[must_use]
    pub fn header(&self) -> IndexHeader {
        *self.header.read()
    }

    /// Real block size in bytes.
    #[must_use]
    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Appends `bytes` (exactly one block) to the file and returns the
    /// offset it was written at.
    ///
    /// Appends before any header update that references the new block
    /// (spec §7: "append-then-update-header ordering"), so a crash between
    /// the two leaves the new block unreferenced but never corrupts
    /// previously committed reachability.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corrupt`] if `bytes.len()` does not equal the
    /// block size, or [`Error::IOError`] if the device fails.
    pub fn append_block(&self, bytes: &[u8]) -> Result<u64, Error> {
        if bytes.len() != self.block_size as usize {
            return Err(Error::Corrupt(format!(
                "block must be exactly {} bytes, got {}",
                self.block_size,
                bytes.len()
            )));
        }
        let offset = self.device.len()?;
        self.device.write_at(offset, bytes)?;
        Ok(offset)
    }

    /// Reads the block at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IOError`] if the device fails.
    pub fn read_block(&self, offset: u64) -> Result<Vec<u8>, Error> {
        let mut buf = vec![0u8; self.block_size as usize];
        self.device.read_at(offset, &mut buf)?;
        Ok(buf)
    }

    /// Overwrites the block at `offset` in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IOError`] if the device fails.
    pub fn write_block(&self, offset: u64, bytes: &[u8]) -> Result<(), Error> {
        if bytes.len() != self.block_size as usize {
            return Err(Error::Corrupt(format!(
                "block must be exactly {} bytes, got {}",
                self.block_size,
                bytes.len()
            )));
        }
        self.device.write_at(offset, bytes)?;
        Ok(())
    }

    /// Current size of the file in bytes; always a multiple of the block
    /// size (spec §3 invariant).
    ///
    /// # Errors
    ///
    /// Returns [`Error::IOError`] if the device fails.
    pub fn file_size(&self) -> Result<u64, Error> {
        Ok(self.device.len()?)
    }

    /// Rewrites the header block with `header`'s current contents and
    /// updates the in-memory snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IOError`] if the device fails.
    pub fn update_header(&self, new_header: IndexHeader) -> Result<(), Error> {
        let mut header = self.header.write();
        *header = new_header;
        self.persist_header(&header)
    }

    fn persist_header(&self, header: &IndexHeader) -> Result<(), Error> {
        let bytes = block::encode_header(header, self.block_size as usize);
        self.device.write_at(0, &bytes)?;
        Ok(())
    }

    /// Flushes the device and releases the file handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IOError`] if the device fails to flush.
    pub fn close(self) -> Result<(), Error> {
        self.device.sync()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_fresh(dim: u16) -> (tempfile::TempDir, IndexFile<FileBlockDevice>) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("idx");
        let device = FileBlockDevice::open(path).unwrap();
        let idx = IndexFile::open(device, dim, ElementType::F32).unwrap();
        (dir, idx)
    }

    #[test]
    fn create_on_empty_file_writes_header() {
        let (_dir, idx) = open_fresh(3);
        let header = idx.header();
        assert_eq!(header.dimension, 3);
        assert_eq!(header.entry_offset, 0);
        assert_eq!(idx.file_size().unwrap(), u64::from(DEFAULT_BLOCK_SIZE));
    }

    #[test]
    fn append_grows_file_by_one_block() {
        let (_dir, idx) = open_fresh(3);
        let block = vec![0u8; idx.block_size() as usize];
        let offset = idx.append_block(&block).unwrap();
        assert_eq!(offset, u64::from(DEFAULT_BLOCK_SIZE));
        assert_eq!(idx.file_size().unwrap(), u64::from(DEFAULT_BLOCK_SIZE) * 2);
    }

    #[test]
    fn reopen_yields_bit_equal_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("idx");
        {
            let device = FileBlockDevice::open(&path).unwrap();
            let idx = IndexFile::open(device, 3, ElementType::F32).unwrap();
            let mut h = idx.header();
            h.entry_offset = 4096;
            idx.update_header(h).unwrap();
            idx.close().unwrap();
        }
        let device = FileBlockDevice::open(&path).unwrap();
        let idx = IndexFile::open(device, 3, ElementType::F32).unwrap();
        assert_eq!(idx.header().entry_offset, 4096);
    }

    #[test]
    fn mismatched_dimension_on_reopen_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("idx");
        {
            let device = FileBlockDevice::open(&path).unwrap();
            let _idx = IndexFile::open(device, 3, ElementType::F32).unwrap();
        }
        let device = FileBlockDevice::open(&path).unwrap();
        let result = IndexFile::open(device, 5, ElementType::F32);
        assert!(matches!(result, Err(Error::DimensionMismatch { .. })));
    }

    #[test]
    fn file_size_is_always_a_multiple_of_block_size() {
        let (_dir, idx) = open_fresh(3);
        for _ in 0..5 {
            let block = vec![0u8; idx.block_size() as usize];
            idx.append_block(&block).unwrap();
        }
        assert_eq!(idx.file_size().unwrap() % u64::from(idx.block_size()), 0);
    }
}
