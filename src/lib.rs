//! # vamana-diskann
//!
//! A disk-resident approximate nearest-neighbor vector index, embeddable
//! inside a relational engine as a virtual index module: an LM-DiskANN /
//! Vamana graph laid out so that a single block read returns both a
//! node's own vector and its out-neighbors' ids, offsets, and vectors,
//! letting greedy best-first search expand the frontier with no extra
//! I/O per hop.
//!
//! ## Modules
//!
//! - [`vector`]: the vector value type, dense `f32` arrays, cosine
//!   distance, textual and blob (de)serialization.
//! - [`block`]: fixed-size block format, index header and graph node
//!   encode/decode.
//! - [`file`]: append-only block file, the [`file::BlockDevice`]
//!   abstraction over the host VFS, and [`file::IndexFile`]'s header and
//!   allocator.
//! - [`search`]: the greedy best-first search engine.
//! - [`insert`]: the search-then-prune-then-link insertion engine.
//! - [`cursor`]: [`cursor::IndexCursor`], the glue the host database
//!   talks to: `create`, `open`, `insert`, `search`, `close`.
//! - [`sql_functions`]: the three scalar functions (`vector`,
//!   `vector_extract`, `vector_distance_cos`) by which ordinary SQL
//!   manipulates vector values outside the index.
//! - [`config`]: [`config::IndexParams`], degree cap, search list size,
//!   pruning coefficient, block size.
//! - [`codec`]: little-endian primitive (de)serialization shared by
//!   [`vector`] and [`block`].
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use vamana_diskann::config::IndexParams;
//! use vamana_diskann::cursor::{IndexCursor, IndexDescriptor, InsertPayload};
//! use vamana_diskann::vector::Vector;
//! use std::path::Path;
//!
//! let descriptor = IndexDescriptor {
//!     index_name: "embeddings".to_string(),
//!     dimension: 768,
//!     params: IndexParams::default(),
//! };
//! let mut cursor = IndexCursor::open(Path::new("./mydb"), &descriptor)?;
//!
//! let blob = Vector::new(vec![0.1; 768]).serialize();
//! let mut record = (blob.len() as u32).to_le_bytes().to_vec();
//! record.extend_from_slice(&blob);
//! record.extend_from_slice(&1u64.to_le_bytes());
//! cursor.insert(&InsertPayload::decode(&record)?)?;
//!
//! let results = cursor.search(&Vector::new(vec![0.1; 768]), 10)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod block;
pub mod codec;
pub mod config;
pub mod cursor;
pub mod error;
pub mod file;
pub mod insert;
pub mod search;
pub mod sql_functions;
pub mod vector;

pub use config::IndexParams;
pub use cursor::{IndexCursor, IndexDescriptor, InsertPayload};
pub use error::{Error, Result};
pub use search::SearchResult;
pub use vector::Vector;
