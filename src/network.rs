//! Read-only weighted graph backing the partition and optimiser layers.
//!
//! The optimiser never mutates a [`Network`]; partitions hold it behind an
//! `Arc` so that every level of an aggregation hierarchy shares its level
//! graph without copying adjacency.
//!
//! ## Conventions
//!
//! - `total_weight` counts each edge once (self-loops once).
//! - Undirected strength counts a self-loop twice, so the strengths sum to
//!   `2 * total_weight`; directed out/in strengths each count it once and sum
//!   to `total_weight`.
//! - Node weights default to 1 and feed community sizes; aggregation sets
//!   them to the collapsed community sizes.

use crate::error::{Error, Result};
use petgraph::graph::UnGraph;
use petgraph::visit::EdgeRef;

/// Weighted graph with cached strengths and separate self-loop storage.
///
/// Adjacency lists never contain the vertex itself; self-loop weight is
/// queried through [`Network::self_loop`].
#[derive(Debug, Clone)]
pub struct Network {
    directed: bool,
    adj_out: Vec<Vec<(usize, f64)>>,
    /// Only populated for directed graphs; undirected reads go to `adj_out`.
    adj_in: Vec<Vec<(usize, f64)>>,
    self_loops: Vec<f64>,
    node_weights: Vec<f64>,
    total_node_weight: f64,
    strength_out: Vec<f64>,
    strength_in: Vec<f64>,
    total_weight: f64,
}

impl Network {
    /// Build an undirected network from a weighted edge list.
    ///
    /// Entries with `u == v` become self-loops. Parallel edges are allowed
    /// and simply accumulate weight along both endpoints' adjacency lists.
    pub fn from_edges(n: usize, edges: &[(usize, usize, f64)]) -> Result<Self> {
        Self::build(n, edges, false)
    }

    /// Build a directed network from a weighted edge list.
    pub fn from_edges_directed(n: usize, edges: &[(usize, usize, f64)]) -> Result<Self> {
        Self::build(n, edges, true)
    }

    /// Convert a petgraph graph, taking every edge with unit weight.
    pub fn from_graph<N, E>(graph: &UnGraph<N, E>) -> Result<Self> {
        let edges: Vec<(usize, usize, f64)> = graph
            .edge_references()
            .map(|e| (e.source().index(), e.target().index(), 1.0))
            .collect();
        Self::build(graph.node_count(), &edges, false)
    }

    /// Convert a petgraph graph whose edge weights are `f64`.
    pub fn from_graph_weighted<N>(graph: &UnGraph<N, f64>) -> Result<Self> {
        let edges: Vec<(usize, usize, f64)> = graph
            .edge_references()
            .map(|e| (e.source().index(), e.target().index(), *e.weight()))
            .collect();
        Self::build(graph.node_count(), &edges, false)
    }

    /// Replace the default unit node weights.
    pub fn with_node_weights(mut self, weights: Vec<f64>) -> Result<Self> {
        if weights.len() != self.vcount() {
            return Err(Error::LengthMismatch {
                expected: self.vcount(),
                found: weights.len(),
            });
        }
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::InvalidParameter {
                name: "node_weights",
                message: "node weights must be finite and non-negative",
            });
        }
        self.total_node_weight = weights.iter().sum();
        self.node_weights = weights;
        Ok(self)
    }

    fn build(n: usize, edges: &[(usize, usize, f64)], directed: bool) -> Result<Self> {
        let mut adj_out: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        let mut adj_in: Vec<Vec<(usize, f64)>> = if directed {
            vec![Vec::new(); n]
        } else {
            Vec::new()
        };
        let mut self_loops = vec![0.0; n];
        let mut total_weight = 0.0;

        for &(u, v, w) in edges {
            if u >= n {
                return Err(Error::VertexOutOfRange { vertex: u, n });
            }
            if v >= n {
                return Err(Error::VertexOutOfRange { vertex: v, n });
            }
            if !w.is_finite() || w < 0.0 {
                return Err(Error::InvalidParameter {
                    name: "edge_weight",
                    message: "edge weights must be finite and non-negative",
                });
            }
            total_weight += w;
            if u == v {
                self_loops[u] += w;
            } else if directed {
                adj_out[u].push((v, w));
                adj_in[v].push((u, w));
            } else {
                adj_out[u].push((v, w));
                adj_out[v].push((u, w));
            }
        }

        let mut strength_out = vec![0.0; n];
        let mut strength_in = vec![0.0; n];
        for v in 0..n {
            let out: f64 = adj_out[v].iter().map(|(_, w)| w).sum();
            if directed {
                let inw: f64 = adj_in[v].iter().map(|(_, w)| w).sum();
                strength_out[v] = out + self_loops[v];
                strength_in[v] = inw + self_loops[v];
            } else {
                // A self-loop contributes twice to an undirected degree.
                strength_out[v] = out + 2.0 * self_loops[v];
                strength_in[v] = strength_out[v];
            }
        }

        Ok(Self {
            directed,
            adj_out,
            adj_in,
            self_loops,
            node_weights: vec![1.0; n],
            total_node_weight: n as f64,
            strength_out,
            strength_in,
            total_weight,
        })
    }

    /// Number of vertices.
    pub fn vcount(&self) -> usize {
        self.adj_out.len()
    }

    /// Total edge weight, each edge counted once.
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Sum of out-strengths: `2M` undirected, `M` directed.
    pub fn total_strength(&self) -> f64 {
        (2.0 - self.direction_factor()) * self.total_weight
    }

    /// Whether edges are directed.
    pub fn is_directed(&self) -> bool {
        self.directed
    }

    /// 1.0 for directed graphs, 0.0 for undirected ones.
    pub fn direction_factor(&self) -> f64 {
        if self.directed {
            1.0
        } else {
            0.0
        }
    }

    /// Out-neighbours of `v` with edge weights (self-loops excluded).
    pub fn out_neighbours(&self, v: usize) -> &[(usize, f64)] {
        &self.adj_out[v]
    }

    /// In-neighbours of `v` with edge weights (self-loops excluded).
    pub fn in_neighbours(&self, v: usize) -> &[(usize, f64)] {
        if self.directed {
            &self.adj_in[v]
        } else {
            &self.adj_out[v]
        }
    }

    /// Weighted out-degree of `v`, self-loop included.
    pub fn strength_out(&self, v: usize) -> f64 {
        self.strength_out[v]
    }

    /// Weighted in-degree of `v`, self-loop included.
    pub fn strength_in(&self, v: usize) -> f64 {
        self.strength_in[v]
    }

    /// Self-loop weight of `v`.
    pub fn self_loop(&self, v: usize) -> f64 {
        self.self_loops[v]
    }

    /// Node weight of `v` (1 unless overridden or aggregated).
    pub fn node_weight(&self, v: usize) -> f64 {
        self.node_weights[v]
    }

    /// Sum of all node weights.
    pub fn total_node_weight(&self) -> f64 {
        self.total_node_weight
    }

    /// Weighted count of vertex pairs that could carry an edge:
    /// `S(S-1)/2` undirected, `S(S-1)` directed, with `S` the total node
    /// weight. Using node weight rather than vertex count keeps the value
    /// stable under aggregation, where super-vertices carry the sizes of the
    /// communities they replace.
    pub fn possible_pairs(&self) -> f64 {
        let s = self.total_node_weight;
        s * (s - 1.0) / (2.0 - self.direction_factor())
    }

    /// Edge density under the Erdős–Rényi null: total weight over possible
    /// pairs. Zero when there are no possible pairs.
    pub fn density(&self) -> f64 {
        let pairs = self.possible_pairs();
        if pairs <= 0.0 {
            return 0.0;
        }
        self.total_weight / pairs
    }
}
