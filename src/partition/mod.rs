//! Partitions of a graph into communities, with pluggable quality functions.
//!
//! A partition assigns every vertex to exactly one community and caches
//! per-community aggregates so that the effect of moving a single vertex can
//! be scored in O(deg) time. Each quality function is a thin type over the
//! shared [`CommunityState`]; the optimiser only ever talks to the
//! [`Partition`] trait.
//!
//! ## The move contract
//!
//! The one invariant everything else depends on:
//!
//! ```text
//! quality(after move_node(v, c)) - quality(before) == diff_move(v, c)
//! ```
//!
//! up to floating tolerance, for every vertex `v` and every target community
//! `c` including the "fresh community" index `n_communities()`. The
//! optimiser trusts `diff_move` blindly, so a variant whose closed form
//! drifts from its `quality` will silently optimise the wrong objective.
//!
//! ## Quality functions
//!
//! | Variant | Objective |
//! |---------|-----------|
//! | [`ModularityPartition`] | configuration-null modularity, γ fixed at 1 |
//! | [`RBConfigurationPartition`] | Reichardt–Bornholdt configuration null, free γ |
//! | [`CpmPartition`] | constant Potts model: internal weight − γ·size² |
//! | [`RberPartition`] | Potts model against an Erdős–Rényi null |
//! | [`SignificancePartition`] | KL-divergence of community densities from the graph density |
//! | [`SurprisePartition`] | KL-divergence of the internal-weight fraction from its expectation |
//!
//! Communities are dense-indexed. Slots may be left transiently empty by
//! moves; `n_communities()` counts slots, and moving a vertex to the slot
//! index `n_communities()` opens a fresh community. Callers compact with
//! [`Partition::renumber_communities`] (the multi-level drivers do this
//! between levels).
//!
//! ## References
//!
//! - Traag, Waltman, van Eck (2019). "From Louvain to Leiden: guaranteeing
//!   well-connected communities." Scientific Reports 9, 5233.
//! - Traag, Van Dooren, Nesterov (2011). "Narrow scope for resolution-limit-
//!   free community detection." Physical Review E 84, 016114.

use crate::error::{Error, Result};
use crate::network::Network;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

mod cpm;
mod modularity;
mod rb_configuration;
mod rber;
mod significance;
mod surprise;

pub use cpm::CpmPartition;
pub use modularity::ModularityPartition;
pub use rb_configuration::RBConfigurationPartition;
pub use rber::RberPartition;
pub use significance::SignificancePartition;
pub use surprise::SurprisePartition;

/// Binary Kullback–Leibler divergence between Bernoulli rates `q` and `p`.
///
/// Callers guarantee `q` in [0, 1] and `p` strictly inside (0, 1).
pub(crate) fn binary_kl(q: f64, p: f64) -> f64 {
    let mut kl = 0.0;
    if q > 0.0 {
        kl += q * (q / p).ln();
    }
    if q < 1.0 {
        kl += (1.0 - q) * ((1.0 - q) / (1.0 - p)).ln();
    }
    kl
}

/// Membership vector plus per-community aggregate caches.
///
/// All six quality variants share this state; the caches are independent of
/// the objective being optimised.
#[derive(Debug, Clone)]
pub struct CommunityState {
    network: Arc<Network>,
    membership: Vec<usize>,
    n_communities: usize,
    /// Internal weight per community, each edge counted once, member
    /// self-loops included.
    total_in: Vec<f64>,
    /// Sum of member out-strengths per community.
    total_from: Vec<f64>,
    /// Sum of member in-strengths per community.
    total_to: Vec<f64>,
    /// Sum of member node weights per community.
    csize: Vec<f64>,
    /// Member count per community.
    cnodes: Vec<usize>,
    /// Sum of `total_in` over all communities.
    total_internal: f64,
}

impl CommunityState {
    /// Build state over `network`; `None` membership means singletons.
    pub fn new(network: Arc<Network>, membership: Option<&[usize]>) -> Result<Self> {
        let n = network.vcount();
        let membership: Vec<usize> = match membership {
            Some(m) => {
                if m.len() != n {
                    return Err(Error::LengthMismatch {
                        expected: n,
                        found: m.len(),
                    });
                }
                if let Some(&c) = m.iter().find(|&&c| c >= n) {
                    return Err(Error::CommunityOutOfRange {
                        community: c,
                        limit: n,
                    });
                }
                m.to_vec()
            }
            None => (0..n).collect(),
        };

        let mut state = Self {
            network,
            membership,
            n_communities: 0,
            total_in: Vec::new(),
            total_from: Vec::new(),
            total_to: Vec::new(),
            csize: Vec::new(),
            cnodes: Vec::new(),
            total_internal: 0.0,
        };
        state.rebuild();
        Ok(state)
    }

    /// Recompute every aggregate from the membership vector.
    fn rebuild(&mut self) {
        let n = self.network.vcount();
        self.n_communities = self.membership.iter().map(|&c| c + 1).max().unwrap_or(0);
        let c = self.n_communities;
        self.total_in = vec![0.0; c];
        self.total_from = vec![0.0; c];
        self.total_to = vec![0.0; c];
        self.csize = vec![0.0; c];
        self.cnodes = vec![0; c];

        let directed = self.network.is_directed();
        for v in 0..n {
            let cv = self.membership[v];
            self.total_from[cv] += self.network.strength_out(v);
            self.total_to[cv] += self.network.strength_in(v);
            self.csize[cv] += self.network.node_weight(v);
            self.cnodes[cv] += 1;
            self.total_in[cv] += self.network.self_loop(v);
            for &(u, w) in self.network.out_neighbours(v) {
                if self.membership[u] == cv && (directed || u > v) {
                    self.total_in[cv] += w;
                }
            }
        }
        self.total_internal = self.total_in.iter().sum();
    }

    /// The graph this partition lives on.
    pub fn network(&self) -> &Arc<Network> {
        &self.network
    }

    /// Number of vertices.
    pub fn vcount(&self) -> usize {
        self.membership.len()
    }

    /// Community of vertex `v`.
    pub fn membership(&self, v: usize) -> usize {
        self.membership[v]
    }

    /// Full membership vector.
    pub fn membership_vec(&self) -> &[usize] {
        &self.membership
    }

    /// Number of community slots (transiently-empty slots included).
    pub fn n_communities(&self) -> usize {
        self.n_communities
    }

    /// Internal weight of community `c` (0 for out-of-range slots).
    pub fn weight_in(&self, c: usize) -> f64 {
        self.total_in.get(c).copied().unwrap_or(0.0)
    }

    /// Out-strength total of community `c`.
    pub fn weight_from(&self, c: usize) -> f64 {
        self.total_from.get(c).copied().unwrap_or(0.0)
    }

    /// In-strength total of community `c`.
    pub fn weight_to(&self, c: usize) -> f64 {
        self.total_to.get(c).copied().unwrap_or(0.0)
    }

    /// Node-weight total of community `c`.
    pub fn csize(&self, c: usize) -> f64 {
        self.csize.get(c).copied().unwrap_or(0.0)
    }

    /// Member count of community `c`.
    pub fn cnodes(&self, c: usize) -> usize {
        self.cnodes.get(c).copied().unwrap_or(0)
    }

    /// Total internal weight over all communities.
    pub fn total_internal(&self) -> f64 {
        self.total_internal
    }

    /// Weight on `v`'s out-edges into community `c` (self-loop excluded).
    pub fn weight_to_comm(&self, v: usize, c: usize) -> f64 {
        self.network
            .out_neighbours(v)
            .iter()
            .filter(|&&(u, _)| self.membership[u] == c)
            .map(|&(_, w)| w)
            .sum()
    }

    /// Weight on `v`'s in-edges from community `c` (self-loop excluded).
    pub fn weight_from_comm(&self, v: usize, c: usize) -> f64 {
        self.network
            .in_neighbours(v)
            .iter()
            .filter(|&&(u, _)| self.membership[u] == c)
            .map(|&(_, w)| w)
            .sum()
    }

    /// Total edge weight between `v` and each distinct community among its
    /// neighbours, in first-seen adjacency order.
    ///
    /// The order is deterministic; tie-breaking in the optimiser and the
    /// random-candidate draw both depend on that.
    pub fn neigh_comm_weights(&self, v: usize) -> Vec<(usize, f64)> {
        self.neigh_comm_weights_filtered(v, None)
    }

    /// As [`neigh_comm_weights`](Self::neigh_comm_weights), restricted to
    /// neighbours sharing `v`'s community in `constraint`.
    pub(crate) fn neigh_comm_weights_filtered(
        &self,
        v: usize,
        constraint: Option<&[usize]>,
    ) -> Vec<(usize, f64)> {
        let mut out: Vec<(usize, f64)> = Vec::new();
        let mut index: HashMap<usize, usize> = HashMap::new();
        let mut scan = |edges: &[(usize, f64)], out: &mut Vec<(usize, f64)>| {
            for &(u, w) in edges {
                if let Some(cons) = constraint {
                    if cons[u] != cons[v] {
                        continue;
                    }
                }
                let c = self.membership[u];
                match index.entry(c) {
                    Entry::Occupied(e) => out[*e.get()].1 += w,
                    Entry::Vacant(e) => {
                        e.insert(out.len());
                        out.push((c, w));
                    }
                }
            }
        };
        scan(self.network.out_neighbours(v), &mut out);
        if self.network.is_directed() {
            scan(self.network.in_neighbours(v), &mut out);
        }
        out
    }

    /// Move `v` into community `target`, updating aggregates in O(deg v).
    ///
    /// `target == n_communities()` opens a fresh community (only while the
    /// slot count is below the vertex count). On a range error the state is
    /// left untouched.
    pub fn move_node(&mut self, v: usize, target: usize) -> Result<()> {
        let n = self.network.vcount();
        if v >= n {
            return Err(Error::VertexOutOfRange { vertex: v, n });
        }
        if target > self.n_communities || (target == self.n_communities && target >= n) {
            return Err(Error::CommunityOutOfRange {
                community: target,
                limit: self.n_communities + 1,
            });
        }
        let from = self.membership[v];
        if from == target {
            return Ok(());
        }
        if target == self.n_communities {
            self.total_in.push(0.0);
            self.total_from.push(0.0);
            self.total_to.push(0.0);
            self.csize.push(0.0);
            self.cnodes.push(0);
            self.n_communities += 1;
        }

        let net = Arc::clone(&self.network);
        let directed = net.is_directed();
        let w_to_from = self.weight_to_comm(v, from);
        let w_to_target = self.weight_to_comm(v, target);
        let internal_from = if directed {
            w_to_from + self.weight_from_comm(v, from)
        } else {
            w_to_from
        } + net.self_loop(v);
        let internal_target = if directed {
            w_to_target + self.weight_from_comm(v, target)
        } else {
            w_to_target
        } + net.self_loop(v);

        self.total_in[from] -= internal_from;
        self.total_in[target] += internal_target;
        self.total_internal += internal_target - internal_from;
        self.total_from[from] -= net.strength_out(v);
        self.total_from[target] += net.strength_out(v);
        self.total_to[from] -= net.strength_in(v);
        self.total_to[target] += net.strength_in(v);
        let nw = net.node_weight(v);
        self.csize[from] -= nw;
        self.csize[target] += nw;
        self.cnodes[from] -= 1;
        self.cnodes[target] += 1;
        self.membership[v] = target;
        Ok(())
    }

    /// Replace the whole membership vector and rebuild aggregates.
    pub fn set_membership(&mut self, membership: &[usize]) -> Result<()> {
        let n = self.network.vcount();
        if membership.len() != n {
            return Err(Error::LengthMismatch {
                expected: n,
                found: membership.len(),
            });
        }
        if let Some(&c) = membership.iter().find(|&&c| c >= n) {
            return Err(Error::CommunityOutOfRange {
                community: c,
                limit: n,
            });
        }
        self.membership = membership.to_vec();
        self.rebuild();
        Ok(())
    }

    /// Compact community ids to `0..n_communities()` in first-seen vertex
    /// order, dropping empty slots.
    pub fn renumber_communities(&mut self) {
        let relabelled = self.dense_relabel(None, &[]);
        self.membership = relabelled;
        self.rebuild();
    }

    /// Compact community ids while giving every community that contains a
    /// fixed vertex the id that vertex held in `reference`.
    ///
    /// Fixed vertices never move, so two distinct final communities can
    /// never claim the same reference id.
    pub(crate) fn renumber_communities_fixed(&mut self, is_fixed: &[bool], reference: &[usize]) {
        let relabelled = self.dense_relabel(Some(is_fixed), reference);
        self.membership = relabelled;
        self.rebuild();
    }

    fn dense_relabel(&self, is_fixed: Option<&[bool]>, reference: &[usize]) -> Vec<usize> {
        let n = self.membership.len();
        let mut target: Vec<Option<usize>> = vec![None; self.n_communities];
        let mut used = vec![false; n + 1];

        if let Some(fixed) = is_fixed {
            for v in 0..n {
                if fixed[v] {
                    let slot = self.membership[v];
                    if target[slot].is_none() {
                        target[slot] = Some(reference[v]);
                        used[reference[v]] = true;
                    }
                }
            }
        }

        let mut next = 0;
        for v in 0..n {
            let slot = self.membership[v];
            if target[slot].is_none() {
                while used[next] {
                    next += 1;
                }
                target[slot] = Some(next);
                used[next] = true;
            }
        }

        self.membership
            .iter()
            .map(|&slot| target[slot].unwrap_or(0))
            .collect()
    }

    /// Quotient graph whose vertices are this partition's communities.
    ///
    /// Cross-community weight becomes edge weight, internal weight becomes
    /// the super-vertex self-loop, and community sizes become node weights.
    /// Callers compact first; empty slots would turn into isolated
    /// zero-weight vertices.
    pub fn quotient_network(&self) -> Result<Network> {
        let c = self.n_communities;
        let n = self.membership.len();
        let directed = self.network.is_directed();

        let mut cross: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for v in 0..n {
            let cv = self.membership[v];
            for &(u, w) in self.network.out_neighbours(v) {
                let cu = self.membership[u];
                if cu == cv {
                    continue;
                }
                if directed {
                    *cross.entry((cv, cu)).or_insert(0.0) += w;
                } else if v < u {
                    let key = if cv < cu { (cv, cu) } else { (cu, cv) };
                    *cross.entry(key).or_insert(0.0) += w;
                }
            }
        }

        #[cfg(debug_assertions)]
        {
            let cross_total: f64 = cross.values().sum();
            debug_assert!(
                (self.total_internal + cross_total - self.network.total_weight()).abs()
                    < 1e-6 * (1.0 + self.network.total_weight()),
                "aggregate caches out of sync with the graph"
            );
        }

        let mut edges: Vec<(usize, usize, f64)> = Vec::with_capacity(cross.len() + c);
        for slot in 0..c {
            // Clamp float dust from incremental updates.
            let w = self.total_in[slot].max(0.0);
            if w > 0.0 {
                edges.push((slot, slot, w));
            }
        }
        edges.extend(cross.into_iter().map(|((a, b), w)| (a, b, w)));

        let net = if directed {
            Network::from_edges_directed(c, &edges)?
        } else {
            Network::from_edges(c, &edges)?
        };
        net.with_node_weights(self.csize.iter().map(|s| s.max(0.0)).collect())
    }
}

/// A community assignment scored by one concrete quality function.
///
/// The required surface is small: the closed-form `quality`/`diff_move`
/// pair, access to the shared [`CommunityState`], and `like` to rebuild the
/// same variant (same resolution parameter) over another graph. Everything
/// else is provided.
pub trait Partition: Clone {
    /// Shared membership and aggregate state.
    fn state(&self) -> &CommunityState;

    /// Mutable access to the shared state.
    fn state_mut(&mut self) -> &mut CommunityState;

    /// Full recomputation of the quality under the current membership.
    fn quality(&self) -> f64;

    /// Signed change in quality if `v` moved to `target`.
    ///
    /// `target` may equal `n_communities()` to denote a fresh community.
    fn diff_move(&self, v: usize, target: usize) -> f64;

    /// Same variant and parameters over a new graph; `None` membership
    /// means singletons.
    fn like(&self, network: Arc<Network>, membership: Option<&[usize]>) -> Result<Self>;

    /// The graph this partition lives on.
    fn network(&self) -> &Arc<Network> {
        self.state().network()
    }

    /// Number of vertices.
    fn vcount(&self) -> usize {
        self.state().vcount()
    }

    /// Community of vertex `v`.
    fn membership(&self, v: usize) -> usize {
        self.state().membership(v)
    }

    /// Full membership vector.
    fn membership_vec(&self) -> &[usize] {
        self.state().membership_vec()
    }

    /// Number of community slots.
    fn n_communities(&self) -> usize {
        self.state().n_communities()
    }

    /// Node-weight total of community `c`.
    fn csize(&self, c: usize) -> f64 {
        self.state().csize(c)
    }

    /// Member count of community `c`.
    fn cnodes(&self, c: usize) -> usize {
        self.state().cnodes(c)
    }

    /// Move `v` into `target`; see [`CommunityState::move_node`].
    fn move_node(&mut self, v: usize, target: usize) -> Result<()> {
        self.state_mut().move_node(v, target)
    }

    /// Replace the membership vector wholesale.
    fn set_membership(&mut self, membership: &[usize]) -> Result<()> {
        self.state_mut().set_membership(membership)
    }

    /// Compact community ids, dropping empty slots.
    fn renumber_communities(&mut self) {
        self.state_mut().renumber_communities();
    }

    /// Neighbour communities of `v` with summed edge weights.
    fn neigh_comm_weights(&self, v: usize) -> Vec<(usize, f64)> {
        self.state().neigh_comm_weights(v)
    }

    /// Partition of the quotient graph whose vertices are this partition's
    /// communities.
    ///
    /// `seed` assigns each super-vertex an initial community; `None` means
    /// singletons. Seeding with the identity preserves quality exactly.
    fn aggregate(&self, seed: Option<&[usize]>) -> Result<Self> {
        let quotient = Arc::new(self.state().quotient_network()?);
        self.like(quotient, seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Arc<Network> {
        Arc::new(Network::from_edges(3, &[(0, 1, 1.0), (1, 2, 1.0), (0, 2, 1.0)]).unwrap())
    }

    #[test]
    fn test_singleton_state() {
        let state = CommunityState::new(triangle(), None).unwrap();
        assert_eq!(state.n_communities(), 3);
        for c in 0..3 {
            assert_eq!(state.cnodes(c), 1);
            assert!((state.csize(c) - 1.0).abs() < 1e-12);
            assert!(state.weight_in(c).abs() < 1e-12);
            assert!((state.weight_from(c) - 2.0).abs() < 1e-12);
        }
        assert!(state.total_internal().abs() < 1e-12);
    }

    #[test]
    fn test_move_updates_aggregates() {
        let mut state = CommunityState::new(triangle(), None).unwrap();
        state.move_node(1, 0).unwrap();
        assert_eq!(state.membership(1), 0);
        assert_eq!(state.cnodes(0), 2);
        assert_eq!(state.cnodes(1), 0);
        assert!((state.weight_in(0) - 1.0).abs() < 1e-12);
        assert!((state.weight_from(0) - 4.0).abs() < 1e-12);
        assert!((state.total_internal() - 1.0).abs() < 1e-12);

        // Against a from-scratch rebuild.
        let fresh = CommunityState::new(triangle(), Some(&[0, 0, 2])).unwrap();
        for c in 0..state.n_communities() {
            assert!((state.weight_in(c) - fresh.weight_in(c)).abs() < 1e-12);
            assert!((state.weight_from(c) - fresh.weight_from(c)).abs() < 1e-12);
            assert!((state.weight_to(c) - fresh.weight_to(c)).abs() < 1e-12);
            assert!((state.csize(c) - fresh.csize(c)).abs() < 1e-12);
            assert_eq!(state.cnodes(c), fresh.cnodes(c));
        }
    }

    #[test]
    fn test_move_to_fresh_community() {
        let mut state = CommunityState::new(triangle(), Some(&[0, 0, 0])).unwrap();
        assert_eq!(state.n_communities(), 1);
        state.move_node(2, 1).unwrap();
        assert_eq!(state.n_communities(), 2);
        assert_eq!(state.cnodes(1), 1);
        assert!((state.weight_in(0) - 1.0).abs() < 1e-12);

        // Fresh slot is capped at the vertex count.
        let mut singles = CommunityState::new(triangle(), None).unwrap();
        assert!(singles.move_node(0, 3).is_err());
    }

    #[test]
    fn test_membership_validation() {
        let state = CommunityState::new(triangle(), Some(&[0, 0, 5]));
        assert!(matches!(
            state,
            Err(Error::CommunityOutOfRange { community: 5, .. })
        ));
        let state = CommunityState::new(triangle(), Some(&[0, 0]));
        assert!(matches!(state, Err(Error::LengthMismatch { .. })));
    }

    #[test]
    fn test_neigh_comm_weights_order_and_sums() {
        // Star: 0 joined to 1, 2, 3; 2 and 3 share a community.
        let net = Arc::new(
            Network::from_edges(4, &[(0, 1, 1.0), (0, 2, 2.0), (0, 3, 3.0)]).unwrap(),
        );
        let state = CommunityState::new(net, Some(&[0, 1, 2, 2])).unwrap();
        let weights = state.neigh_comm_weights(0);
        assert_eq!(weights, vec![(1, 1.0), (2, 5.0)]);
    }

    #[test]
    fn test_renumber_drops_empty_slots() {
        let mut state = CommunityState::new(triangle(), None).unwrap();
        state.move_node(0, 2).unwrap();
        assert_eq!(state.n_communities(), 3);
        state.renumber_communities();
        assert_eq!(state.n_communities(), 2);
        // First-seen order: vertex 0's community becomes 0.
        assert_eq!(state.membership_vec(), &[0, 1, 0]);
    }

    #[test]
    fn test_renumber_fixed_keeps_reference_ids() {
        let mut state = CommunityState::new(triangle(), Some(&[2, 2, 0])).unwrap();
        let reference = vec![2, 2, 0];
        state.renumber_communities_fixed(&[false, true, false], &reference);
        assert_eq!(state.membership(1), 2);
        assert_eq!(state.membership(0), 2);
        assert_eq!(state.membership(2), 0);
    }

    #[test]
    fn test_quotient_network() {
        // Two communities over the triangle: {0,1} and {2}.
        let state = CommunityState::new(triangle(), Some(&[0, 0, 1])).unwrap();
        let quotient = state.quotient_network().unwrap();
        assert_eq!(quotient.vcount(), 2);
        assert!((quotient.self_loop(0) - 1.0).abs() < 1e-12);
        assert!((quotient.self_loop(1) - 0.0).abs() < 1e-12);
        assert!((quotient.total_weight() - 3.0).abs() < 1e-12);
        assert!((quotient.node_weight(0) - 2.0).abs() < 1e-12);
        // Strength of a super-vertex equals the strength sum of its members.
        assert!((quotient.strength_out(0) - state.weight_from(0)).abs() < 1e-12);
    }
}
