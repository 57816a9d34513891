//! Search-then-prune-then-link insertion protocol (spec §4.6).

use tracing::{info, warn};

use crate::block::{self, Neighbor, Node};
use crate::error::Error;
use crate::file::{BlockDevice, IndexFile};
use crate::search::{self, Candidate};
use crate::vector::Vector;

/// Outcome of a successful insert: the new node's block offset, plus any
/// neighbors whose backlink failed (spec §4.6 step 5, non-fatal).
#[derive(Debug)]
pub struct InsertOutcome {
    /// Block offset the new node was written at.
    pub offset: u64,
    /// One [`Error::PartialBacklink`] per neighbor whose backlink write
    /// failed. Non-fatal: `insert` still returns `Ok`.
    pub partial_backlinks: Vec<Error>,
}

/// Inserts `(id, vector)` into the graph (spec §4.6).
///
/// `r` is the degree cap, `l` the search list cap used for the bootstrap
/// search, `alpha` the robust-prune coefficient (`alpha >= 1.0`).
///
/// # Errors
///
/// Returns [`Error::IOError`] if allocating or writing the new node's
/// block fails, or [`Error::Corrupt`] if the graph is found to be corrupt
/// while searching for candidate neighbors. Failed backlinks do not cause
/// this function to return `Err`; they are reported in
/// [`InsertOutcome::partial_backlinks`].
pub fn insert<V: BlockDevice>(
    index: &IndexFile<V>,
    id: u64,
    vector: Vector,
    r: usize,
    l: usize,
    alpha: f64,
) -> Result<InsertOutcome, Error> {
    let header = index.header();
    if vector.dimension() != header.dimension as usize {
        return Err(Error::DimensionMismatch {
            expected: header.dimension as usize,
            actual: vector.dimension(),
        });
    }

    if header.entry_offset == 0 {
        let node = Node {
            id,
            vector,
            neighbors: Vec::new(),
        };
        let bytes = block::encode_node(&header, &node, index.block_size() as usize)?;
        let offset = index.append_block(&bytes)?;
        let mut new_header = header;
        new_header.entry_offset = offset;
        index.update_header(new_header)?;
        info!(id, offset, "bootstrapped empty graph with first node");
        return Ok(InsertOutcome {
            offset,
            partial_backlinks: Vec::new(),
        });
    }

    let outcome = search::greedy_search(index, &vector, l)?;
    let candidates = outcome.all_candidates();

    let selected = robust_prune(candidates, r, alpha)?;

    let neighbors: Vec<Neighbor> = selected
        .iter()
        .map(|c| Neighbor {
            id: c.id,
            offset: c.offset,
            vector: c.vector.clone(),
        })
        .collect();

    let node = Node {
        id,
        vector: vector.clone(),
        neighbors,
    };
    let bytes = block::encode_node(&header, &node, index.block_size() as usize)?;
    let offset = index.append_block(&bytes)?;

    let mut partial_backlinks = Vec::new();
    for y in &selected {
        if let Err(e) = backlink(index, &header, y, id, offset, &vector, r, alpha) {
            match e {
                Error::IOError(source) => {
                    warn!(offset = y.offset, %source, "backlink failed, continuing");
                    partial_backlinks.push(Error::PartialBacklink {
                        offset: y.offset,
                        source,
                    });
                }
                other => return Err(other),
            }
        }
    }

    info!(id, offset, neighbors = selected.len(), "inserted node");
    Ok(InsertOutcome {
        offset,
        partial_backlinks,
    })
}

/// Robust prune (spec §4.6 step 3): greedily selects up to `r` neighbors
/// from `candidates` in ascending distance-to-`query` order, admitting `x`
/// only if every already-selected `y` satisfies
/// `alpha * cosine(x, y) > cosine(query, x)`.
fn robust_prune(
    mut candidates: Vec<Candidate>,
    r: usize,
    alpha: f64,
) -> Result<Vec<Candidate>, Error> {
    candidates.sort_by(|a, b| search::distance_cmp(a.distance, b.distance).then_with(|| a.id.cmp(&b.id)));

    let mut selected: Vec<Candidate> = Vec::with_capacity(r.min(candidates.len()));
    for x in candidates {
        if selected.len() == r {
            break;
        }
        let mut admit = true;
        for y in &selected {
            let cosine_xy = x.vector.cosine(&y.vector)?;
            if !(alpha * cosine_xy > x.distance) {
                admit = false;
                break;
            }
        }
        if admit {
            selected.push(x);
        }
    }
    Ok(selected)
}

/// Backlink step (spec §4.6 step 5): adds `(new_id, new_offset, new_vector)`
/// to `y`'s neighbor list, re-pruning if that would exceed `r`.
fn backlink<V: BlockDevice>(
    index: &IndexFile<V>,
    header: &crate::block::IndexHeader,
    y: &Candidate,
    new_id: u64,
    new_offset: u64,
    new_vector: &Vector,
    r: usize,
    alpha: f64,
) -> Result<(), Error> {
    let file_size = index.file_size()?;
    let buf = index.read_block(y.offset)?;
    let mut y_node = block::decode_node(header, &buf, u64::from(index.block_size()), file_size)?;

    y_node.neighbors.push(Neighbor {
        id: new_id,
        offset: new_offset,
        vector: new_vector.clone(),
    });

    if y_node.neighbors.len() > r {
        let as_candidates: Vec<Candidate> = y_node
            .neighbors
            .iter()
            .map(|n| {
                let distance = y_node.vector.cosine(&n.vector)?;
                Ok(Candidate {
                    id: n.id,
                    offset: n.offset,
                    vector: n.vector.clone(),
                    neighbors: Vec::new(),
                    distance,
                })
            })
            .collect::<Result<_, Error>>()?;
        let pruned = robust_prune(as_candidates, r, alpha)?;
        y_node.neighbors = pruned
            .into_iter()
            .map(|c| Neighbor {
                id: c.id,
                offset: c.offset,
                vector: c.vector,
            })
            .collect();
    }

    let bytes = block::encode_node(header, &y_node, index.block_size() as usize)?;
    index.write_block(y.offset, &bytes)?;
    Ok(())
}
