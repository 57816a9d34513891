//! Index cursor: the glue the host database talks to (spec §4.7).

use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::codec;
use crate::config::IndexParams;
use crate::error::Error;
use crate::file::{BlockDevice, FileBlockDevice, IndexFile};
use crate::insert::{self, InsertOutcome};
use crate::search::{self, SearchResult};
use crate::vector::{self, ElementType};

/// Derives the on-disk index file path for `index_name` under `db_path`
/// (spec §4.7: `"{db_path}-vectoridx-{index_name}"`).
#[must_use]
pub fn index_file_path(db_path: &Path, index_name: &str) -> PathBuf {
    let mut path = db_path.as_os_str().to_os_string();
    path.push("-vectoridx-");
    path.push(index_name);
    PathBuf::from(path)
}

/// Describes an index at `create` time; carries no on-disk effect of its
/// own (spec §4.7) beyond being referenced by a later [`IndexCursor::open`].
#[derive(Debug, Clone)]
pub struct IndexDescriptor {
    /// Name distinguishing this index within its database.
    pub index_name: String,
    /// Vector dimension every row in this index must match.
    pub dimension: u16,
    /// Construction and search parameters.
    pub params: IndexParams,
}

/// Records that `descriptor` names a valid index; has no on-disk effect
/// until [`IndexCursor::open`] is called (spec §4.7).
///
/// # Errors
///
/// Returns [`Error::Config`] if `descriptor.params` fails validation for
/// `descriptor.dimension`.
pub fn create(descriptor: &IndexDescriptor) -> Result<(), Error> {
    descriptor.params.validate()?;
    descriptor.params.validate_dimension(descriptor.dimension)?;
    Ok(())
}

/// A cursor over one open index file (spec §4.7).
///
/// Once an operation returns [`Error::Corrupt`], the cursor marks itself
/// unusable: every subsequent call returns `Corrupt` immediately without
/// touching the file (spec §7 propagation policy).
pub struct IndexCursor<V: BlockDevice = FileBlockDevice> {
    file: IndexFile<V>,
    params: IndexParams,
    poisoned: bool,
}

impl IndexCursor<FileBlockDevice> {
    /// Opens the index file for `index_name` under `db_path`, creating it
    /// if it does not yet exist (spec §4.7, §4.4).
    ///
    /// # Errors
    ///
    /// Returns [`Error::IOError`] if the underlying file cannot be opened,
    /// or [`Error::Corrupt`]/[`Error::DimensionMismatch`] if an existing
    /// file's header does not match `descriptor`.
    pub fn open(db_path: &Path, descriptor: &IndexDescriptor) -> Result<Self, Error> {
        let path = index_file_path(db_path, &descriptor.index_name);
        let device = FileBlockDevice::open(path)?;
        Self::open_with_device(device, descriptor)
    }
}

impl<V: BlockDevice> IndexCursor<V> {
    /// Opens a cursor over an already-constructed [`BlockDevice`] (used by
    /// tests and by hosts with their own VFS implementation).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corrupt`]/[`Error::DimensionMismatch`] if an
    /// existing file's header does not match `descriptor`.
    pub fn open_with_device(device: V, descriptor: &IndexDescriptor) -> Result<Self, Error> {
        descriptor.params.validate()?;
        descriptor.params.validate_dimension(descriptor.dimension)?;
        let file = IndexFile::open(device, descriptor.dimension, ElementType::F32)?;
        Ok(Self {
            file,
            params: descriptor.params,
            poisoned: false,
        })
    }

    fn check_usable(&self) -> Result<(), Error> {
        if self.poisoned {
            return Err(Error::Corrupt(
                "cursor is unusable after a prior Corrupt error".to_string(),
            ));
        }
        Ok(())
    }

    fn poison_on_corrupt<T>(&mut self, result: Result<T, Error>) -> Result<T, Error> {
        if let Err(Error::Corrupt(ref msg)) = result {
            error!(msg, "cursor poisoned after Corrupt");
            self.poisoned = true;
        }
        result
    }

    /// Decodes `payload` as `(vector_blob, rowid)` and inserts it (spec
    /// §4.7, §4.2, §4.6).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBlob`] if the blob is malformed,
    /// [`Error::DimensionMismatch`] if its dimension disagrees with this
    /// index, or [`Error::Corrupt`]/[`Error::IOError`] from the underlying
    /// engine. Individual failed backlinks are reported in
    /// [`InsertOutcome::partial_backlinks`] without failing the call.
    pub fn insert(&mut self, payload: &InsertPayload) -> Result<InsertOutcome, Error> {
        self.check_usable()?;
        let vector = vector::parse_blob(&payload.vector_blob)?;
        let result = insert::insert(
            &self.file,
            payload.rowid,
            vector,
            self.params.degree_cap,
            self.params.search_list_size,
            self.params.alpha,
        );
        self.poison_on_corrupt(result)
    }

    /// Runs a nearest-neighbor search and returns up to `k` `(rowid,
    /// distance)` pairs in rank order (spec §4.7, thin wrapper over §4.5).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corrupt`]/[`Error::IOError`] from the underlying
    /// engine.
    pub fn search(&mut self, query: &vector::Vector, k: usize) -> Result<Vec<SearchResult>, Error> {
        self.check_usable()?;
        let result = search::search(&self.file, query, self.params.search_list_size, k);
        self.poison_on_corrupt(result)
    }

    /// Closes the cursor, flushing and releasing the underlying file
    /// handle (spec §4.7).
    ///
    /// # Errors
    ///
    /// Returns [`Error::IOError`] if the device fails to flush.
    pub fn close(self) -> Result<(), Error> {
        self.file.close()
    }
}

/// Decoded `(vector_blob, rowid)` insert payload (spec §4.7).
#[derive(Debug, Clone)]
pub struct InsertPayload {
    /// Raw vector blob, decoded per §4.2.
    pub vector_blob: Vec<u8>,
    /// Host-assigned row id.
    pub rowid: u64,
}

impl InsertPayload {
    /// Decodes a two-field `(vector_blob, rowid)` record: a `u32` blob
    /// length prefix, the blob itself, then a little-endian `u64` rowid.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBlob`] if `record` is shorter than the
    /// declared blob length plus the trailing rowid.
    pub fn decode(record: &[u8]) -> Result<Self, Error> {
        let blob_len = codec::read_u32(record, 0)
            .ok_or_else(|| Error::InvalidBlob("truncated payload length prefix".to_string()))?
            as usize;
        let blob_end = 4 + blob_len;
        let vector_blob = record
            .get(4..blob_end)
            .ok_or_else(|| Error::InvalidBlob("payload shorter than declared blob length".to_string()))?
            .to_vec();
        let rowid = codec::read_u64(record, blob_end)
            .ok_or_else(|| Error::InvalidBlob("payload missing trailing rowid".to_string()))?;
        info!(rowid, "decoded insert payload");
        Ok(Self { vector_blob, rowid })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::Vector;
    use tempfile::tempdir;

    fn descriptor(dimension: u16) -> IndexDescriptor {
        IndexDescriptor {
            index_name: "idx".to_string(),
            dimension,
            params: IndexParams {
                degree_cap: 4,
                search_list_size: 8,
                alpha: 1.2,
                block_size: 4096,
            },
        }
    }

    #[test]
    fn path_derivation_matches_spec_convention() {
        let path = index_file_path(Path::new("/data/mydb"), "embeddings");
        assert_eq!(path, PathBuf::from("/data/mydb-vectoridx-embeddings"));
    }

    #[test]
    fn insert_and_search_round_trip() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("mydb");
        let desc = descriptor(3);
        let mut cursor = IndexCursor::open(&db_path, &desc).unwrap();

        for (id, v) in [(1u64, [1.0, 0.0, 0.0]), (2, [0.0, 1.0, 0.0])] {
            let blob = Vector::new(v.to_vec()).serialize();
            let mut record = (blob.len() as u32).to_le_bytes().to_vec();
            record.extend_from_slice(&blob);
            record.extend_from_slice(&id.to_le_bytes());
            let payload = InsertPayload::decode(&record).unwrap();
            cursor.insert(&payload).unwrap();
        }

        let query = Vector::new(vec![1.0, 0.0, 0.0]);
        let results = cursor.search(&query, 1).unwrap();
        assert_eq!(results[0].id, 1);
        cursor.close().unwrap();
    }

    #[test]
    fn cursor_poisons_after_corrupt() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("mydb");
        let desc = descriptor(3);
        let mut cursor = IndexCursor::open(&db_path, &desc).unwrap();

        // Force a Corrupt by poisoning the in-memory cursor state directly;
        // a real Corrupt would come from a malformed on-disk block.
        cursor.poisoned = true;
        let query = Vector::new(vec![1.0, 0.0, 0.0]);
        assert!(matches!(cursor.search(&query, 1), Err(Error::Corrupt(_))));
    }
}
