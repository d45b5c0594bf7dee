//! Significance: how unlikely are the observed community densities?
//!
//! Each community contributes its pair count times the KL divergence of its
//! internal density from the overall graph density:
//!
//! ```text
//! Q = Σ_c pairs(c) · KL(q_c ‖ p)
//! ```
//!
//! Dense-beyond-chance communities score high regardless of a resolution
//! parameter, which is why this variant takes none. Degenerate densities
//! (`p` outside (0, 1), communities without internal pairs) contribute 0.

use super::{binary_kl, CommunityState, Partition};
use crate::error::Result;
use crate::network::Network;
use std::sync::Arc;

/// One community's share of the significance score.
fn community_term(csize: f64, w_in: f64, p: f64, pair_factor: f64) -> f64 {
    let pairs = csize * (csize - 1.0) / pair_factor;
    if pairs <= 0.0 {
        return 0.0;
    }
    let q = (w_in / pairs).clamp(0.0, 1.0);
    pairs * binary_kl(q, p)
}

/// Partition scored by significance.
#[derive(Debug, Clone)]
pub struct SignificancePartition {
    state: CommunityState,
}

impl SignificancePartition {
    /// Singleton partition over `network`.
    pub fn new(network: Arc<Network>) -> Result<Self> {
        Ok(Self {
            state: CommunityState::new(network, None)?,
        })
    }

    /// Partition with an explicit initial membership.
    pub fn with_membership(network: Arc<Network>, membership: &[usize]) -> Result<Self> {
        Ok(Self {
            state: CommunityState::new(network, Some(membership))?,
        })
    }

    fn graph_density(&self) -> Option<f64> {
        let p = self.state.network().density();
        if p > 0.0 && p < 1.0 {
            Some(p)
        } else {
            None
        }
    }
}

impl Partition for SignificancePartition {
    fn state(&self) -> &CommunityState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommunityState {
        &mut self.state
    }

    fn quality(&self) -> f64 {
        let Some(p) = self.graph_density() else {
            return 0.0;
        };
        let pair_factor = 2.0 - self.state.network().direction_factor();
        let mut q = 0.0;
        for c in 0..self.state.n_communities() {
            q += community_term(self.state.csize(c), self.state.weight_in(c), p, pair_factor);
        }
        q
    }

    fn diff_move(&self, v: usize, target: usize) -> f64 {
        let Some(p) = self.graph_density() else {
            return 0.0;
        };
        let s = &self.state;
        let from = s.membership(v);
        if from == target {
            return 0.0;
        }
        let net = s.network();
        let directed = net.is_directed();
        let pair_factor = 2.0 - net.direction_factor();

        let w_to_old = s.weight_to_comm(v, from);
        let w_to_new = s.weight_to_comm(v, target);
        let internal_old = if directed {
            w_to_old + s.weight_from_comm(v, from)
        } else {
            w_to_old
        } + net.self_loop(v);
        let internal_new = if directed {
            w_to_new + s.weight_from_comm(v, target)
        } else {
            w_to_new
        } + net.self_loop(v);

        let nu = net.node_weight(v);
        let before = community_term(s.csize(from), s.weight_in(from), p, pair_factor)
            + community_term(s.csize(target), s.weight_in(target), p, pair_factor);
        let after = community_term(s.csize(from) - nu, s.weight_in(from) - internal_old, p, pair_factor)
            + community_term(
                s.csize(target) + nu,
                s.weight_in(target) + internal_new,
                p,
                pair_factor,
            );
        after - before
    }

    fn like(&self, network: Arc<Network>, membership: Option<&[usize]>) -> Result<Self> {
        Ok(Self {
            state: CommunityState::new(network, membership)?,
        })
    }
}
