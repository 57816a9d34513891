//! Greedy best-first search over the on-disk Vamana graph (spec §4.5).

use std::cmp::Ordering;
use std::collections::HashSet;

use rustc_hash::FxHashMap;
use tracing::instrument;

use crate::block::{self, Neighbor, Node};
use crate::error::Error;
use crate::file::{BlockDevice, IndexFile};
use crate::vector::Vector;

/// One node pulled into the search frontier or visited set: its id, block
/// offset, vector, inline neighbor list (available without extra I/O once
/// the node's own block has been read), and distance to the query.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Node id.
    pub id: u64,
    /// Node's block offset.
    pub offset: u64,
    /// Node's vector.
    pub vector: Vector,
    /// Node's out-neighbors, read inline from the same block.
    pub neighbors: Vec<Neighbor>,
    /// Cosine distance to the query vector.
    pub distance: f64,
}

impl Candidate {
    fn from_node(offset: u64, node: Node, distance: f64) -> Self {
        Self {
            id: node.id,
            offset,
            vector: node.vector,
            neighbors: node.neighbors,
            distance,
        }
    }
}

/// Result of a greedy search: the visited set `V` and the residual
/// frontier `C` (spec §4.5). `frontier` is empty whenever the loop runs to
/// completion, since every member of `C` is unvisited by construction and
/// the loop only stops once `C` is exhausted; it is kept distinct from
/// `visited` for callers (insertion's robust-prune, spec §4.6) that want
/// `V ∪ C` without assuming it collapses to `V`.
pub struct SearchOutcome {
    /// All nodes visited during the search, in visit order.
    pub visited: Vec<Candidate>,
    /// Whatever remained in the bounded candidate list when the loop
    /// stopped (always empty for a search that runs to completion).
    pub frontier: Vec<Candidate>,
}

impl SearchOutcome {
    /// `V ∪ C`, the candidate set the insertion engine prunes (spec §4.6 step 2).
    #[must_use]
    pub fn all_candidates(self) -> Vec<Candidate> {
        let mut all = self.visited;
        all.extend(self.frontier);
        all
    }
}

/// A single ranked search result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchResult {
    /// The matching node's id.
    pub id: u64,
    /// Cosine distance to the query.
    pub distance: f64,
}

/// Orders two distances the way spec §4.6 requires: NaN (from a
/// zero-norm vector, spec §3) sorts after every finite value; two NaNs
/// compare equal.
#[must_use]
pub fn distance_cmp(a: f64, b: f64) -> Ordering {
    match a.partial_cmp(&b) {
        Some(ord) => ord,
        None => match (a.is_nan(), b.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => unreachable!("partial_cmp only returns None for NaN operands"),
        },
    }
}

/// Total order over candidates: ascending distance, ties broken by
/// ascending id (spec §4.5: "ties broken by lower id").
fn candidate_cmp(a: &Candidate, b: &Candidate) -> Ordering {
    distance_cmp(a.distance, b.distance).then_with(|| a.id.cmp(&b.id))
}

/// Runs the greedy best-first search described in spec §4.5.
///
/// Loads at most one block per distinct node id (the `loaded` set below
/// persists across eviction from the bounded candidate list `C`, so a
/// node evicted from `C` is never re-fetched, which is what makes the
/// "each node loaded at most once" guarantee hold even though the
/// algorithm's literal `m.id ∉ C ∪ V` membership test alone would permit
/// re-discovering an evicted node through a second path; see DESIGN.md).
///
/// # Errors
///
/// Returns [`Error::IOError`] if a block read fails, or [`Error::Corrupt`]
/// if a block fails validation.
#[instrument(skip(index, query), fields(entry_offset, l))]
pub fn greedy_search<V: BlockDevice>(
    index: &IndexFile<V>,
    query: &Vector,
    l: usize,
) -> Result<SearchOutcome, Error> {
    let header = index.header();
    let block_size = u64::from(index.block_size());
    let file_size = index.file_size()?;

    if header.entry_offset == 0 {
        return Ok(SearchOutcome {
            visited: Vec::new(),
            frontier: Vec::new(),
        });
    }

    let mut loaded: HashSet<u64> = HashSet::new();
    let mut candidates: Vec<Candidate> = Vec::new();
    let mut visited: Vec<Candidate> = Vec::new();

    let entry_node = load_node(index, header.entry_offset, block_size, file_size)?;
    let entry_distance = query.cosine(&entry_node.vector)?;
    let entry_id = entry_node.id;
    candidates.push(Candidate::from_node(header.entry_offset, entry_node, entry_distance));
    loaded.insert(entry_id);

    while !candidates.is_empty() {
        let closest_idx = candidates
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| candidate_cmp(a, b))
            .map(|(i, _)| i)
            .expect("candidates is non-empty");
        let current = candidates.remove(closest_idx);

        for neighbor in &current.neighbors {
            if loaded.contains(&neighbor.id) {
                continue;
            }
            loaded.insert(neighbor.id);

            let node = load_node(index, neighbor.offset, block_size, file_size)?;
            let distance = query.cosine(&node.vector)?;
            candidates.push(Candidate::from_node(neighbor.offset, node, distance));

            if candidates.len() > l {
                let farthest_idx = candidates
                    .iter()
                    .enumerate()
                    .max_by(|(_, a), (_, b)| candidate_cmp(a, b))
                    .map(|(i, _)| i)
                    .expect("candidates is non-empty");
                candidates.remove(farthest_idx);
            }
        }

        visited.push(current);
    }

    Ok(SearchOutcome {
        visited,
        frontier: candidates,
    })
}

fn load_node<V: BlockDevice>(
    index: &IndexFile<V>,
    offset: u64,
    block_size: u64,
    file_size: u64,
) -> Result<Node, Error> {
    let header = index.header();
    let buf = index.read_block(offset)?;
    block::decode_node(&header, &buf, block_size, file_size)
}

/// Top-level search entry point (spec §4.5): returns up to `k` results in
/// ascending distance order, ties broken by ascending id.
///
/// # Errors
///
/// Propagates I/O and corruption errors from [`greedy_search`].
#[instrument(skip(index, query))]
pub fn search<V: BlockDevice>(
    index: &IndexFile<V>,
    query: &Vector,
    l: usize,
    k: usize,
) -> Result<Vec<SearchResult>, Error> {
    let outcome = greedy_search(index, query, l)?;
    let mut all = outcome.all_candidates();
    all.sort_by(candidate_cmp);

    // Deduplicate by id: visited and frontier never overlap in practice
    // (see SearchOutcome docs), but a caller-extended union should not
    // double-count a node reachable by more than one path.
    let mut seen: FxHashMap<u64, ()> = FxHashMap::default();
    let mut results = Vec::with_capacity(k.min(all.len()));
    for candidate in all {
        if seen.insert(candidate.id, ()).is_some() {
            continue;
        }
        results.push(SearchResult {
            id: candidate.id,
            distance: candidate.distance,
        });
        if results.len() == k {
            break;
        }
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::FileBlockDevice;
    use crate::vector::ElementType;
    use tempfile::tempdir;

    fn fresh_index() -> (tempfile::TempDir, IndexFile<FileBlockDevice>) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("idx");
        let device = FileBlockDevice::open(path).unwrap();
        let idx = IndexFile::open(device, 3, ElementType::F32).unwrap();
        (dir, idx)
    }

    #[test]
    fn s6_empty_index_returns_no_results() {
        let (_dir, idx) = fresh_index();
        let query = Vector::new(vec![1.0, 2.0, 3.0]);
        let results = search(&idx, &query, 8, 5).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn distance_cmp_orders_nan_last() {
        assert_eq!(distance_cmp(0.5, f64::NAN), Ordering::Less);
        assert_eq!(distance_cmp(f64::NAN, 0.5), Ordering::Greater);
        assert_eq!(distance_cmp(f64::NAN, f64::NAN), Ordering::Equal);
        assert_eq!(distance_cmp(0.1, 0.2), Ordering::Less);
    }
}
