use std::collections::{HashMap, HashSet, VecDeque};

use crate::{
    error::{AppError, AppResult},
    models::{Availability, Edge, GraphData, VideoNode},
};

/// Read-only view over the crawled watch graph
///
/// Nodes are addressed by their position in `nodes`; every other structure in
/// the engine (cluster leaves, distance matrices, rank order) uses the same
/// indices. Built once per engine instance and never mutated afterwards.
#[derive(Debug)]
pub struct GraphSnapshot {
    nodes: Vec<VideoNode>,
    index: HashMap<String, usize>,
    edges: Vec<Edge>,
    /// Undirected, deduplicated adjacency
    neighbours: Vec<Vec<usize>>,
    in_degree: Vec<usize>,
    /// Position of each node in the global rank order, 0 being the best
    rank: Vec<usize>,
    eligible: Vec<usize>,
}

impl GraphSnapshot {
    /// Indexes the provider's graph
    ///
    /// Duplicate ids are rejected. Edges pointing at unknown videos and
    /// self-loops are dropped.
    pub fn from_data(data: GraphData) -> AppResult<Self> {
        let GraphData { nodes, edges } = data;

        let mut index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if index.insert(node.id.clone(), i).is_some() {
                return Err(AppError::GraphLoad(format!(
                    "duplicate video id in graph: {}",
                    node.id
                )));
            }
        }

        let mut adjacency: Vec<HashSet<usize>> = vec![HashSet::new(); nodes.len()];
        let mut sources: Vec<HashSet<usize>> = vec![HashSet::new(); nodes.len()];
        let mut kept_edges = Vec::with_capacity(edges.len());
        let mut dropped = 0usize;

        for edge in edges {
            let (Some(&source), Some(&target)) = (index.get(&edge.source), index.get(&edge.target))
            else {
                dropped += 1;
                continue;
            };
            if source == target {
                dropped += 1;
                continue;
            }
            adjacency[source].insert(target);
            adjacency[target].insert(source);
            sources[target].insert(source);
            kept_edges.push(edge);
        }

        if dropped > 0 {
            tracing::debug!(dropped, "Dropped dangling or self-referencing edges");
        }

        let neighbours = adjacency
            .into_iter()
            .map(|set| {
                let mut list: Vec<usize> = set.into_iter().collect();
                list.sort_unstable();
                list
            })
            .collect();
        let in_degree: Vec<usize> = sources.iter().map(HashSet::len).collect();

        let mut order: Vec<usize> = (0..nodes.len()).collect();
        order.sort_by(|&a, &b| {
            in_degree[b]
                .cmp(&in_degree[a])
                .then_with(|| nodes[b].view_count.cmp(&nodes[a].view_count))
                .then_with(|| nodes[b].like_count.cmp(&nodes[a].like_count))
                .then_with(|| nodes[a].id.cmp(&nodes[b].id))
        });
        let mut rank = vec![0; nodes.len()];
        for (position, &node) in order.iter().enumerate() {
            rank[node] = position;
        }

        let eligible = (0..nodes.len())
            .filter(|&i| nodes[i].availability != Availability::Down)
            .collect();

        let snapshot = Self {
            nodes,
            index,
            edges: kept_edges,
            neighbours,
            in_degree,
            rank,
            eligible,
        };

        tracing::info!(
            videos = snapshot.nodes.len(),
            edges = snapshot.edges.len(),
            eligible = snapshot.eligible.len(),
            "Graph snapshot built"
        );

        Ok(snapshot)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: usize) -> &VideoNode {
        &self.nodes[index]
    }

    pub fn get(&self, id: &str) -> Option<&VideoNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn title(&self, id: &str) -> Option<&str> {
        self.get(id).map(|node| node.title.as_str())
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Videos taking part in clustering: everything not already recorded as down
    pub fn eligible(&self) -> &[usize] {
        &self.eligible
    }

    pub fn neighbours(&self, index: usize) -> &[usize] {
        &self.neighbours[index]
    }

    pub fn in_degree(&self, index: usize) -> usize {
        self.in_degree[index]
    }

    /// Rank position used to order candidates (lower is better)
    pub fn rank_of(&self, index: usize) -> usize {
        self.rank[index]
    }

    /// Undirected hop counts from `from` to every node, `None` when unreachable
    pub fn hop_distances(&self, from: usize) -> Vec<Option<usize>> {
        let mut hops = vec![None; self.nodes.len()];
        let mut queue = VecDeque::new();
        hops[from] = Some(0);
        queue.push_back(from);

        while let Some(current) = queue.pop_front() {
            let next_hop = hops[current].map_or(0, |h| h + 1);
            for &neighbour in &self.neighbours[current] {
                if hops[neighbour].is_none() {
                    hops[neighbour] = Some(next_hop);
                    queue.push_back(neighbour);
                }
            }
        }

        hops
    }
}
