//! Fixed-size block format: index header and graph node (de)serialization
//! (spec §3, §4.3).

use crate::codec;
use crate::error::Error;
use crate::vector::{ElementType, Vector};

/// Magic value identifying an index file, `"DiskANN"` read little-endian
/// with a trailing zero byte (spec §3, §6).
pub const MAGIC: u64 = 0x004E_4E41_6B73_6944;

/// Similarity-function id for cosine distance, the only one this crate
/// implements (spec §3).
const SIMILARITY_COSINE: u16 = 0;

/// Byte size of the neighbor metadata record `(id: u64, offset: u64)`.
const NEIGHBOR_META_LEN: usize = 16;

/// One graph node's owner id, out-neighbors (each with its own vector and
/// block offset), occupying exactly one block (spec §3).
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Host-assigned rowid.
    pub id: u64,
    /// This node's own vector.
    pub vector: Vector,
    /// Out-neighbors: `(id, block offset, vector)` triples, `len() <= R`.
    pub neighbors: Vec<Neighbor>,
}

/// One out-neighbor edge, carrying the neighbor's full vector inline so
/// the search frontier can expand without an extra block read
/// (LM-DiskANN, spec GLOSSARY).
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    /// Neighbor's id.
    pub id: u64,
    /// Neighbor's block offset.
    pub offset: u64,
    /// Neighbor's vector, duplicated inline.
    pub vector: Vector,
}

/// The index file header, stored at offset 0, one block wide (spec §3, §6).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexHeader {
    /// Real block size in 512-byte units (`block_size() / 512`).
    pub block_size_units: u16,
    /// Element type of every vector in this index.
    pub vector_type: ElementType,
    /// Dimension shared by every vector in this index.
    pub dimension: u16,
    /// Similarity function id; `0` is the only one implemented (cosine).
    pub similarity: u16,
    /// Offset of the entry node, or `0` if the graph is empty.
    pub entry_offset: u64,
    /// Reserved for future block reclamation; always `0` today.
    pub first_free_offset: u64,
}

impl IndexHeader {
    /// Real block size in bytes, reconstructed from the stored sector
    /// count (spec §9 supplemental item 2: `block_size_units * 512`).
    #[must_use]
    pub fn block_size(&self) -> u32 {
        u32::from(self.block_size_units) * 512
    }

    /// `R_max`: the maximum number of neighbor slots a block of this
    /// header's dimension and block size can hold.
    ///
    /// The spec's literal formula `(B - ownerBlob - 8) / (neighborBlob + 16)`
    /// does not subtract the 2-byte neighbor-count field, which would let
    /// the computed layout overrun `B` by up to 2 bytes. This implementation
    /// subtracts 10 (8-byte owner id + 2-byte neighbor count) instead of 8,
    /// so the full encoded block never exceeds `B` (see DESIGN.md).
    #[must_use]
    pub fn r_max(&self) -> usize {
        let owner_blob = crate::vector::blob_len(self.dimension as usize);
        let neighbor_blob = owner_blob;
        let b = self.block_size() as usize;
        let available = b.saturating_sub(owner_blob).saturating_sub(10);
        available / (neighbor_blob + NEIGHBOR_META_LEN)
    }
}

/// Header byte offsets (spec §6).
mod header_layout {
    pub const MAGIC: usize = 0;
    pub const BLOCK_SIZE_UNITS: usize = 8;
    pub const VECTOR_TYPE: usize = 10;
    pub const DIMENSION: usize = 12;
    pub const SIMILARITY: usize = 14;
    pub const ENTRY_OFFSET: usize = 16;
    pub const FIRST_FREE_OFFSET: usize = 24;
    pub const FIXED_LEN: usize = 32;
}

/// Encodes `header` into a `block_size` buffer, zero-padded.
///
/// # Panics
///
/// Panics if `block_size < header_layout::FIXED_LEN`; callers never pass a
/// block size smaller than 512 bytes, which always leaves ample room.
#[must_use]
pub fn encode_header(header: &IndexHeader, block_size: usize) -> Vec<u8> {
    let mut buf = vec![0u8; block_size];
    codec::write_u64(&mut buf, header_layout::MAGIC, MAGIC);
    codec::write_u16(&mut buf, header_layout::BLOCK_SIZE_UNITS, header.block_size_units);
    codec::write_u16(&mut buf, header_layout::VECTOR_TYPE, header.vector_type.as_u16());
    codec::write_u16(&mut buf, header_layout::DIMENSION, header.dimension);
    codec::write_u16(&mut buf, header_layout::SIMILARITY, header.similarity);
    codec::write_u64(&mut buf, header_layout::ENTRY_OFFSET, header.entry_offset);
    codec::write_u64(&mut buf, header_layout::FIRST_FREE_OFFSET, header.first_free_offset);
    buf
}

/// Decodes and validates a header block (spec §4.3): magic, vector type,
/// dimension range.
pub fn decode_header(buf: &[u8]) -> Result<IndexHeader, Error> {
    if buf.len() < header_layout::FIXED_LEN {
        return Err(Error::Corrupt("header block too short".to_string()));
    }

    let magic = codec::read_u64(buf, header_layout::MAGIC)
        .ok_or_else(|| Error::Corrupt("truncated header".to_string()))?;
    if magic != MAGIC {
        return Err(Error::Corrupt(format!("bad magic: {magic:#x}")));
    }

    let block_size_units = codec::read_u16(buf, header_layout::BLOCK_SIZE_UNITS)
        .ok_or_else(|| Error::Corrupt("truncated header".to_string()))?;

    let vector_type_tag = codec::read_u16(buf, header_layout::VECTOR_TYPE)
        .ok_or_else(|| Error::Corrupt("truncated header".to_string()))?;
    let vector_type = ElementType::from_u16(vector_type_tag)
        .ok_or_else(|| Error::Corrupt(format!("unknown vector type tag {vector_type_tag}")))?;

    let dimension = codec::read_u16(buf, header_layout::DIMENSION)
        .ok_or_else(|| Error::Corrupt("truncated header".to_string()))?;
    if dimension == 0 || dimension as usize > crate::vector::MAX_DIMENSION {
        return Err(Error::Corrupt(format!("dimension {dimension} out of range")));
    }

    let similarity = codec::read_u16(buf, header_layout::SIMILARITY)
        .ok_or_else(|| Error::Corrupt("truncated header".to_string()))?;
    if similarity != SIMILARITY_COSINE {
        return Err(Error::Corrupt(format!("unsupported similarity id {similarity}")));
    }

    let entry_offset = codec::read_u64(buf, header_layout::ENTRY_OFFSET)
        .ok_or_else(|| Error::Corrupt("truncated header".to_string()))?;
    let first_free_offset = codec::read_u64(buf, header_layout::FIRST_FREE_OFFSET)
        .ok_or_else(|| Error::Corrupt("truncated header".to_string()))?;

    Ok(IndexHeader {
        block_size_units,
        vector_type,
        dimension,
        similarity,
        entry_offset,
        first_free_offset,
    })
}

/// Byte layout of a node block, computed once per header (dimension and
/// block size are fixed per index).
struct NodeLayout {
    owner_blob_len: usize,
    owner_id_offset: usize,
    count_offset: usize,
    neighbor_vecs_offset: usize,
    neighbor_blob_len: usize,
    neighbor_meta_offset: usize,
    r_max: usize,
}

impl NodeLayout {
    fn new(header: &IndexHeader) -> Self {
        let owner_blob_len = crate::vector::blob_len(header.dimension as usize);
        let neighbor_blob_len = owner_blob_len;
        let owner_id_offset = owner_blob_len;
        let count_offset = owner_id_offset + 8;
        let neighbor_vecs_offset = count_offset + 2;
        let r_max = header.r_max();
        let neighbor_meta_offset = neighbor_vecs_offset + r_max * neighbor_blob_len;
        Self {
            owner_blob_len,
            owner_id_offset,
            count_offset,
            neighbor_vecs_offset,
            neighbor_blob_len,
            neighbor_meta_offset,
            r_max,
        }
    }

    fn neighbor_vec_offset(&self, i: usize) -> usize {
        self.neighbor_vecs_offset + i * self.neighbor_blob_len
    }

    fn neighbor_meta_offset(&self, i: usize) -> usize {
        self.neighbor_meta_offset + i * NEIGHBOR_META_LEN
    }

    fn total_len(&self) -> usize {
        self.neighbor_meta_offset + self.r_max * NEIGHBOR_META_LEN
    }
}

/// Encodes `node` into a `block_size`-byte buffer per `header`'s layout
/// (spec §3, §4.3). Unused neighbor slots are zero-filled.
///
/// # Errors
///
/// Returns [`Error::Corrupt`] if `node.neighbors.len()` exceeds `R_max`.
pub fn encode_node(header: &IndexHeader, node: &Node, block_size: usize) -> Result<Vec<u8>, Error> {
    let layout = NodeLayout::new(header);
    if node.neighbors.len() > layout.r_max {
        return Err(Error::Corrupt(format!(
            "neighbor count {} exceeds R_max {}",
            node.neighbors.len(),
            layout.r_max
        )));
    }
    if layout.total_len() > block_size {
        return Err(Error::Corrupt(
            "computed node layout exceeds block size".to_string(),
        ));
    }

    let mut buf = vec![0u8; block_size];

    let owner_blob = node.vector.serialize();
    buf[0..layout.owner_blob_len].copy_from_slice(&owner_blob);
    codec::write_u64(&mut buf, layout.owner_id_offset, node.id);
    #[allow(clippy::cast_possible_truncation)]
    let n = node.neighbors.len() as u16;
    codec::write_u16(&mut buf, layout.count_offset, n);

    for (i, neighbor) in node.neighbors.iter().enumerate() {
        let vec_off = layout.neighbor_vec_offset(i);
        let blob = neighbor.vector.serialize();
        buf[vec_off..vec_off + layout.neighbor_blob_len].copy_from_slice(&blob);

        let meta_off = layout.neighbor_meta_offset(i);
        codec::write_u64(&mut buf, meta_off, neighbor.id);
        codec::write_u64(&mut buf, meta_off + 8, neighbor.offset);
    }

    Ok(buf)
}

/// Decodes and validates a node block (spec §4.3): `n <= R_max`, every
/// neighbor offset in `[block_size, file_size)` and a multiple of
/// `block_size`, every neighbor id nonzero.
pub fn decode_node(
    header: &IndexHeader,
    buf: &[u8],
    block_size: u64,
    file_size: u64,
) -> Result<Node, Error> {
    let layout = NodeLayout::new(header);
    if buf.len() < layout.total_len() {
        return Err(Error::Corrupt("node block truncated".to_string()));
    }

    let owner_blob = &buf[0..layout.owner_blob_len];
    let vector = crate::vector::parse_blob(owner_blob)
        .map_err(|e| Error::Corrupt(format!("owner vector: {e}")))?;
    if vector.dimension() != header.dimension as usize {
        return Err(Error::Corrupt(format!(
            "owner vector dimension {} does not match header dimension {}",
            vector.dimension(),
            header.dimension
        )));
    }

    let id = codec::read_u64(buf, layout.owner_id_offset)
        .ok_or_else(|| Error::Corrupt("truncated owner id".to_string()))?;

    let n = codec::read_u16(buf, layout.count_offset)
        .ok_or_else(|| Error::Corrupt("truncated neighbor count".to_string()))? as usize;
    if n > layout.r_max {
        return Err(Error::Corrupt(format!(
            "neighbor count {n} exceeds R_max {}",
            layout.r_max
        )));
    }

    let mut neighbors = Vec::with_capacity(n);
    for i in 0..n {
        let vec_off = layout.neighbor_vec_offset(i);
        let blob = &buf[vec_off..vec_off + layout.neighbor_blob_len];
        let nvec = crate::vector::parse_blob(blob)
            .map_err(|e| Error::Corrupt(format!("neighbor vector: {e}")))?;

        let meta_off = layout.neighbor_meta_offset(i);
        let nid = codec::read_u64(buf, meta_off)
            .ok_or_else(|| Error::Corrupt("truncated neighbor id".to_string()))?;
        let noffset = codec::read_u64(buf, meta_off + 8)
            .ok_or_else(|| Error::Corrupt("truncated neighbor offset".to_string()))?;

        if nid == 0 {
            return Err(Error::Corrupt("neighbor id must be nonzero".to_string()));
        }
        if noffset < block_size || noffset >= file_size || noffset % block_size != 0 {
            return Err(Error::Corrupt(format!(
                "neighbor offset {noffset} out of range [{block_size}, {file_size})"
            )));
        }

        neighbors.push(Neighbor {
            id: nid,
            offset: noffset,
            vector: nvec,
        });
    }

    Ok(Node {
        id,
        vector,
        neighbors,
    })
}
