//! Hierarchical agglomerative clustering over the watch graph.
//!
//! Pairwise distances blend a structural term (shortest-path hops over the
//! relation graph) with an auxiliary term (channel affinity). Average linkage
//! is computed with the nearest-neighbour chain algorithm; the merges it finds
//! are then sorted by height and replayed through a union-find so the tree
//! is built bottom-up with non-decreasing merge heights.

use thiserror::Error;

use super::graph::GraphSnapshot;

/// Index of a node inside a [`ClusterTree`]
pub type NodeId = usize;

/// Errors raised while building a cluster tree
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClusterError {
    #[error("cannot cluster an empty set of videos")]
    Empty,
    #[error("distance matrix has {rows} rows but {expected} leaves were given")]
    ShapeMismatch { rows: usize, expected: usize },
    #[error("distance matrix row {row} has {len} columns, expected {expected}")]
    NotSquare {
        row: usize,
        len: usize,
        expected: usize,
    },
    #[error("distance between {left} and {right} is invalid: {value}")]
    InvalidDistance {
        left: usize,
        right: usize,
        value: f64,
    },
    #[error("distance matrix is not symmetric at ({left}, {right})")]
    NotSymmetric { left: usize, right: usize },
}

/// Condensed upper-triangular distance matrix
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    size: usize,
    data: Vec<f64>,
}

impl DistanceMatrix {
    /// Builds the matrix by evaluating `distance(i, j)` for every `i < j`
    pub fn from_fn(size: usize, mut distance: impl FnMut(usize, usize) -> f64) -> Self {
        let mut data = Vec::with_capacity(size * size.saturating_sub(1) / 2);
        for i in 0..size {
            for j in (i + 1)..size {
                data.push(distance(i, j));
            }
        }
        Self { size, data }
    }

    /// Builds the matrix from full square rows, checking shape and symmetry
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, ClusterError> {
        let size = rows.len();
        for (row, values) in rows.iter().enumerate() {
            if values.len() != size {
                return Err(ClusterError::NotSquare {
                    row,
                    len: values.len(),
                    expected: size,
                });
            }
        }
        for i in 0..size {
            for j in (i + 1)..size {
                if rows[i][j] != rows[j][i] {
                    return Err(ClusterError::NotSymmetric { left: i, right: j });
                }
            }
        }
        let matrix = Self::from_fn(size, |i, j| rows[i][j]);
        matrix.check_values()?;
        Ok(matrix)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        if i == j {
            return 0.0;
        }
        self.data[self.offset(i, j)]
    }

    fn set(&mut self, i: usize, j: usize, value: f64) {
        let offset = self.offset(i, j);
        self.data[offset] = value;
    }

    fn offset(&self, i: usize, j: usize) -> usize {
        let (low, high) = if i < j { (i, j) } else { (j, i) };
        low * self.size - low * (low + 1) / 2 + (high - low - 1)
    }

    fn check_values(&self) -> Result<(), ClusterError> {
        for i in 0..self.size {
            for j in (i + 1)..self.size {
                let value = self.get(i, j);
                if !value.is_finite() || value < 0.0 {
                    return Err(ClusterError::InvalidDistance {
                        left: i,
                        right: j,
                        value,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Node of the merge tree
#[derive(Debug, Clone, PartialEq)]
pub enum ClusterNode {
    /// Wraps one video, by its index in the graph snapshot
    Leaf { video: usize },
    /// Merge of two subtrees at the given linkage distance
    Merge {
        children: [NodeId; 2],
        height: f64,
        size: usize,
    },
}

impl ClusterNode {
    pub fn is_leaf(&self) -> bool {
        matches!(self, ClusterNode::Leaf { .. })
    }

    pub fn height(&self) -> f64 {
        match self {
            ClusterNode::Leaf { .. } => 0.0,
            ClusterNode::Merge { height, .. } => *height,
        }
    }

    pub fn children(&self) -> &[NodeId] {
        match self {
            ClusterNode::Leaf { .. } => &[],
            ClusterNode::Merge { children, .. } => children,
        }
    }
}

/// Binary dendrogram over the eligible videos
///
/// Leaves occupy ids `0..leaf_count` in the order the videos were handed to
/// the clusterer; merges follow in height order and the root is the last node.
#[derive(Debug, Clone)]
pub struct ClusterTree {
    nodes: Vec<ClusterNode>,
    leaf_count: usize,
}

impl ClusterTree {
    pub fn root(&self) -> NodeId {
        self.nodes.len() - 1
    }

    pub fn node(&self, id: NodeId) -> &ClusterNode {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.nodes[id].is_leaf()
    }

    /// Number of edges on the longest root-to-leaf path
    pub fn height(&self) -> usize {
        let mut depth = vec![0usize; self.nodes.len()];
        let mut deepest = 0;
        // parents always come after their children, so walk top-down
        for id in (0..self.nodes.len()).rev() {
            for &child in self.nodes[id].children() {
                depth[child] = depth[id] + 1;
                deepest = deepest.max(depth[child]);
            }
        }
        deepest
    }

    /// Snapshot indices of every video under `id`, left to right
    pub fn leaves(&self, id: NodeId) -> Vec<usize> {
        let mut videos = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            match &self.nodes[current] {
                ClusterNode::Leaf { video } => videos.push(*video),
                ClusterNode::Merge { children, .. } => {
                    stack.push(children[1]);
                    stack.push(children[0]);
                }
            }
        }
        videos
    }

    /// Splits the subtree under `id` into at most `groups` subtrees
    ///
    /// Repeatedly opens the highest merge on the frontier, which is the same
    /// as cutting the local dendrogram below its `groups - 1` highest merges.
    /// Groups keep the dendrogram's left-to-right order. Fewer groups come
    /// back when the subtree has fewer leaves.
    pub fn cut(&self, id: NodeId, groups: usize) -> Vec<NodeId> {
        let mut frontier = vec![id];
        while frontier.len() < groups {
            let highest = frontier
                .iter()
                .enumerate()
                .filter(|&(_, &node)| !self.is_leaf(node))
                .max_by(|&(_, &a), &(_, &b)| {
                    self.nodes[a]
                        .height()
                        .total_cmp(&self.nodes[b].height())
                        .then(a.cmp(&b))
                })
                .map(|(position, &node)| (position, node));

            let Some((position, node)) = highest else {
                break;
            };
            frontier.remove(position);
            for (offset, &child) in self.nodes[node].children().iter().enumerate() {
                frontier.insert(position + offset, child);
            }
        }
        frontier
    }
}

/// Builds cluster trees from a graph snapshot or a precomputed matrix
pub struct Clusterer {
    balance_a: f64,
    balance_b: f64,
}

impl Clusterer {
    pub fn new(balance_a: f64, balance_b: f64) -> Self {
        Self {
            balance_a,
            balance_b,
        }
    }

    /// Clusters the snapshot's eligible videos
    pub fn build(&self, snapshot: &GraphSnapshot) -> Result<ClusterTree, ClusterError> {
        let videos = snapshot.eligible().to_vec();
        let matrix = self.distance_matrix(snapshot, &videos);
        cluster(videos, &matrix)
    }

    /// Blended distances between `videos`, indexed by position in the slice
    ///
    /// `distance = a * structural + b * auxiliary`, both terms in `[0, 1]`.
    pub fn distance_matrix(&self, snapshot: &GraphSnapshot, videos: &[usize]) -> DistanceMatrix {
        let hops: Vec<Vec<Option<usize>>> = videos
            .iter()
            .map(|&video| {
                let all = snapshot.hop_distances(video);
                videos.iter().map(|&other| all[other]).collect()
            })
            .collect();

        let max_hops = hops
            .iter()
            .flatten()
            .filter_map(|h| *h)
            .max()
            .unwrap_or(0);
        let scale = (max_hops + 1) as f64;

        DistanceMatrix::from_fn(videos.len(), |i, j| {
            let structural = hops[i][j].map_or(1.0, |h| h as f64 / scale);
            let left = &snapshot.node(videos[i]).channel_id;
            let right = &snapshot.node(videos[j]).channel_id;
            let auxiliary = if !left.is_empty() && left == right {
                0.0
            } else {
                1.0
            };
            self.balance_a * structural + self.balance_b * auxiliary
        })
    }
}

/// Average-linkage clustering of `videos` under a precomputed matrix
///
/// `matrix` is indexed by position in `videos`. A single video yields a
/// one-leaf tree.
pub fn cluster(videos: Vec<usize>, matrix: &DistanceMatrix) -> Result<ClusterTree, ClusterError> {
    if videos.is_empty() {
        return Err(ClusterError::Empty);
    }
    if matrix.size() != videos.len() {
        return Err(ClusterError::ShapeMismatch {
            rows: matrix.size(),
            expected: videos.len(),
        });
    }
    matrix.check_values()?;

    let leaf_count = videos.len();
    let mut merges = nearest_neighbour_chain(matrix.clone());
    merges.sort_by(|a, b| a.height.total_cmp(&b.height));

    let mut nodes: Vec<ClusterNode> = Vec::with_capacity(2 * leaf_count - 1);
    nodes.extend(videos.into_iter().map(|video| ClusterNode::Leaf { video }));

    let mut components = DisjointSet::new(leaf_count);
    for merge in merges {
        let left_root = components.find(merge.left);
        let right_root = components.find(merge.right);
        let left_node = components.component_node[left_root];
        let right_node = components.component_node[right_root];
        let children = if left_node < right_node {
            [left_node, right_node]
        } else {
            [right_node, left_node]
        };
        let size = subtree_size(&nodes[left_node]) + subtree_size(&nodes[right_node]);

        let new_id = nodes.len();
        nodes.push(ClusterNode::Merge {
            children,
            height: merge.height,
            size,
        });
        let merged = components.union(left_root, right_root);
        components.component_node[merged] = new_id;
    }

    tracing::debug!(leaves = leaf_count, nodes = nodes.len(), "Cluster tree built");

    Ok(ClusterTree { nodes, leaf_count })
}

fn subtree_size(node: &ClusterNode) -> usize {
    match node {
        ClusterNode::Leaf { .. } => 1,
        ClusterNode::Merge { size, .. } => *size,
    }
}

#[derive(Debug, Clone, Copy)]
struct Merge {
    left: usize,
    right: usize,
    height: f64,
}

/// Nearest-neighbour chain for average linkage
///
/// Returns the `n - 1` merges in discovery order, keyed by the surviving
/// matrix slot of each cluster.
fn nearest_neighbour_chain(mut distances: DistanceMatrix) -> Vec<Merge> {
    let n = distances.size();
    let mut active = vec![true; n];
    let mut sizes = vec![1usize; n];
    let mut chain: Vec<usize> = Vec::with_capacity(n);
    let mut merges = Vec::with_capacity(n.saturating_sub(1));

    while merges.len() + 1 < n {
        if chain.is_empty() {
            if let Some(first) = active.iter().position(|&a| a) {
                chain.push(first);
            }
        }

        let (a, b, height) = loop {
            let current = chain[chain.len() - 1];
            let previous = chain.len().checked_sub(2).map(|i| chain[i]);

            // ties go to the previous chain element so the chain terminates
            let mut best = previous;
            let mut best_distance = previous.map_or(f64::INFINITY, |p| distances.get(current, p));
            for candidate in 0..n {
                if !active[candidate] || candidate == current {
                    continue;
                }
                let d = distances.get(current, candidate);
                if d < best_distance {
                    best = Some(candidate);
                    best_distance = d;
                }
            }

            let Some(next) = best else {
                return merges;
            };
            if Some(next) == previous {
                break (current, next, best_distance);
            }
            chain.push(next);
        };
        chain.truncate(chain.len() - 2);

        // b survives and takes the merged cluster
        let (a, b) = if a < b { (a, b) } else { (b, a) };
        let (size_a, size_b) = (sizes[a] as f64, sizes[b] as f64);
        for k in 0..n {
            if !active[k] || k == a || k == b {
                continue;
            }
            let updated =
                (size_a * distances.get(a, k) + size_b * distances.get(b, k)) / (size_a + size_b);
            distances.set(b, k, updated);
        }
        active[a] = false;
        sizes[b] += sizes[a];
        merges.push(Merge {
            left: a,
            right: b,
            height,
        });
    }

    merges
}

/// Union-find over leaf slots, tracking which tree node each component maps to
struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
    component_node: Vec<NodeId>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
            component_node: (0..n).collect(),
        }
    }

    fn find(&mut self, mut node: usize) -> usize {
        let mut root = node;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        while self.parent[node] != node {
            let parent = self.parent[node];
            self.parent[node] = root;
            node = parent;
        }
        root
    }

    fn union(&mut self, left: usize, right: usize) -> usize {
        let mut left = self.find(left);
        let mut right = self.find(right);
        if left == right {
            return left;
        }
        if self.rank[left] < self.rank[right] {
            std::mem::swap(&mut left, &mut right);
        }
        self.parent[right] = left;
        if self.rank[left] == self.rank[right] {
            self.rank[left] = self.rank[left].saturating_add(1);
        }
        left
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{Edge, EdgeKind, GraphData, VideoNode};

    /// Two tight groups of four: {0,1,2,3} and {4,5,6,7}
    pub(crate) fn two_group_rows() -> Vec<Vec<f64>> {
        let mut rows = vec![vec![10.0; 8]; 8];
        for (i, row) in rows.iter_mut().enumerate() {
            row[i] = 0.0;
        }
        let mut set = |i: usize, j: usize, d: f64| {
            rows[i][j] = d;
            rows[j][i] = d;
        };
        for i in 0..2 {
            for j in 2..4 {
                set(i, j, 4.0);
            }
        }
        for i in 4..6 {
            for j in 6..8 {
                set(i, j, 5.0);
            }
        }
        set(0, 1, 1.0);
        set(4, 5, 1.5);
        set(2, 3, 2.0);
        set(6, 7, 2.5);
        rows
    }

    fn two_group_tree() -> ClusterTree {
        let matrix = DistanceMatrix::from_rows(&two_group_rows()).unwrap();
        cluster((0..8).collect(), &matrix).unwrap()
    }

    #[test]
    fn test_matrix_from_rows_rejects_asymmetry() {
        let rows = vec![vec![0.0, 1.0], vec![2.0, 0.0]];
        assert_eq!(
            DistanceMatrix::from_rows(&rows),
            Err(ClusterError::NotSymmetric { left: 0, right: 1 })
        );
    }

    #[test]
    fn test_matrix_from_rows_rejects_ragged_rows() {
        let rows = vec![vec![0.0, 1.0], vec![1.0]];
        assert!(matches!(
            DistanceMatrix::from_rows(&rows),
            Err(ClusterError::NotSquare { row: 1, .. })
        ));
    }

    #[test]
    fn test_condensed_indexing() {
        let matrix = DistanceMatrix::from_fn(4, |i, j| (i * 10 + j) as f64);
        assert_eq!(matrix.get(0, 3), 3.0);
        assert_eq!(matrix.get(3, 1), 13.0);
        assert_eq!(matrix.get(2, 2), 0.0);
    }

    #[test]
    fn test_cluster_merge_order_and_heights() {
        let tree = two_group_tree();

        assert_eq!(tree.len(), 15);
        assert_eq!(tree.leaf_count(), 8);
        let heights: Vec<f64> = (8..15).map(|id| tree.node(id).height()).collect();
        assert_eq!(heights, vec![1.0, 1.5, 2.0, 2.5, 4.0, 5.0, 10.0]);

        assert_eq!(tree.node(8).children(), &[0, 1]);
        assert_eq!(tree.node(12).children(), &[8, 10]);
        assert_eq!(tree.node(tree.root()).children(), &[12, 13]);
    }

    #[test]
    fn test_every_leaf_appears_once() {
        let tree = two_group_tree();

        let mut leaves = tree.leaves(tree.root());
        leaves.sort_unstable();
        assert_eq!(leaves, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_heights_non_decreasing_towards_root() {
        let tree = two_group_tree();

        for id in 0..tree.len() {
            for &child in tree.node(id).children() {
                assert!(tree.node(child).height() <= tree.node(id).height());
            }
        }
    }

    #[test]
    fn test_cut_opens_highest_merges_first() {
        let tree = two_group_tree();

        assert_eq!(tree.cut(tree.root(), 2), vec![12, 13]);
        // the 5.0 merge on the right opens before the 4.0 merge on the left
        assert_eq!(tree.cut(tree.root(), 3), vec![12, 9, 11]);
        assert_eq!(tree.cut(tree.root(), 4), vec![8, 10, 9, 11]);
    }

    #[test]
    fn test_cut_of_small_subtree_returns_fewer_groups() {
        let tree = two_group_tree();

        assert_eq!(tree.cut(8, 5), vec![0, 1]);
        assert_eq!(tree.cut(3, 3), vec![3]);
    }

    #[test]
    fn test_single_video_is_single_leaf() {
        let matrix = DistanceMatrix::from_fn(1, |_, _| 0.0);
        let tree = cluster(vec![7], &matrix).unwrap();

        assert_eq!(tree.len(), 1);
        assert!(tree.is_leaf(tree.root()));
        assert_eq!(tree.leaves(tree.root()), vec![7]);
        assert_eq!(tree.height(), 0);
    }

    #[test]
    fn test_empty_input_rejected() {
        let matrix = DistanceMatrix::from_fn(0, |_, _| 0.0);
        assert_eq!(cluster(vec![], &matrix).unwrap_err(), ClusterError::Empty);
    }

    #[test]
    fn test_tree_height() {
        assert_eq!(two_group_tree().height(), 3);
    }

    #[test]
    fn test_distance_blends_structure_and_channel() {
        let mut nodes: Vec<VideoNode> = ["a", "b", "c", "d"]
            .iter()
            .map(|id| VideoNode::new(*id, *id))
            .collect();
        nodes[0].channel_id = "chan-1".to_string();
        nodes[1].channel_id = "chan-1".to_string();
        nodes[2].channel_id = "chan-2".to_string();
        let data = GraphData {
            nodes,
            edges: vec![
                Edge::new("a", "b", EdgeKind::RecommendedFrom),
                Edge::new("b", "c", EdgeKind::RecommendedFrom),
            ],
        };
        let snapshot = GraphSnapshot::from_data(data).unwrap();
        let clusterer = Clusterer::new(2.0, 1.0);

        let matrix = clusterer.distance_matrix(&snapshot, &[0, 1, 2, 3]);

        // longest finite path is 2 hops, so hops scale by 1/3
        assert!((matrix.get(0, 1) - 2.0 / 3.0).abs() < 1e-9);
        assert!((matrix.get(0, 2) - (4.0 / 3.0 + 1.0)).abs() < 1e-9);
        // d is unreachable and shares no channel
        assert!((matrix.get(0, 3) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_build_is_deterministic() {
        let data = GraphData {
            nodes: (0..6).map(|i| VideoNode::new(format!("v{}", i), "")).collect(),
            edges: vec![
                Edge::new("v0", "v1", EdgeKind::RecommendedFrom),
                Edge::new("v1", "v2", EdgeKind::RecommendedFrom),
                Edge::new("v3", "v4", EdgeKind::RecommendedFrom),
                Edge::new("v4", "v5", EdgeKind::SameChannel),
            ],
        };
        let snapshot = GraphSnapshot::from_data(data).unwrap();
        let clusterer = Clusterer::new(1.5, 1.0);

        let first = clusterer.build(&snapshot).unwrap();
        let second = clusterer.build(&snapshot).unwrap();

        assert_eq!(first.len(), second.len());
        for id in 0..first.len() {
            assert_eq!(first.node(id), second.node(id));
        }
        let mut groups: Vec<Vec<usize>> = first
            .cut(first.root(), 2)
            .into_iter()
            .map(|g| {
                let mut leaves = first.leaves(g);
                leaves.sort_unstable();
                leaves
            })
            .collect();
        groups.sort();
        assert_eq!(groups, vec![vec![0, 1, 2], vec![3, 4, 5]]);
    }
}
