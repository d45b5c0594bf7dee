//! Surprise: how unexpected is the total fraction of internal weight?
//!
//! A single global comparison rather than a per-community one:
//!
//! ```text
//! Q = M · KL(q ‖ ⟨q⟩)     q = Σ_c w_in(c) / M
//!                         ⟨q⟩ = Σ_c pairs(c) / pairs(graph)
//! ```
//!
//! where `⟨q⟩` is the fraction of vertex pairs that fall inside a
//! community. Partitions whose internal weight far exceeds that expectation
//! score high. Degenerate cases (no weight, expectation at 0 or 1) score 0.

use super::{binary_kl, CommunityState, Partition};
use crate::error::Result;
use crate::network::Network;
use std::sync::Arc;

fn surprise_value(m: f64, total_pairs: f64, internal: f64, internal_pairs: f64) -> f64 {
    if m <= 0.0 || total_pairs <= 0.0 {
        return 0.0;
    }
    let q = (internal / m).clamp(0.0, 1.0);
    let expected = (internal_pairs / total_pairs).clamp(0.0, 1.0);
    if expected <= 0.0 || expected >= 1.0 {
        return 0.0;
    }
    m * binary_kl(q, expected)
}

/// Partition scored by surprise.
#[derive(Debug, Clone)]
pub struct SurprisePartition {
    state: CommunityState,
}

impl SurprisePartition {
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

    fn internal_pairs(&self) -> f64 {
        let pair_factor = 2.0 - self.state.network().direction_factor();
        (0..self.state.n_communities())
            .map(|c| {
                let size = self.state.csize(c);
                size * (size - 1.0) / pair_factor
            })
            .sum()
    }
}

impl Partition for SurprisePartition {
    fn state(&self) -> &CommunityState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommunityState {
        &mut self.state
    }

    fn quality(&self) -> f64 {
        let net = self.state.network();
        surprise_value(
            net.total_weight(),
            net.possible_pairs(),
            self.state.total_internal(),
            self.internal_pairs(),
        )
    }

    fn diff_move(&self, v: usize, target: usize) -> f64 {
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
        let pairs = |size: f64| size * (size - 1.0) / pair_factor;
        let old_pairs = self.internal_pairs();
        let new_pairs = old_pairs - pairs(s.csize(from)) - pairs(s.csize(target))
            + pairs(s.csize(from) - nu)
            + pairs(s.csize(target) + nu);
        let new_internal = s.total_internal() - internal_old + internal_new;

        let m = net.total_weight();
        let total_pairs = net.possible_pairs();
        surprise_value(m, total_pairs, new_internal, new_pairs)
            - surprise_value(m, total_pairs, s.total_internal(), old_pairs)
    }

    fn like(&self, network: Arc<Network>, membership: Option<&[usize]>) -> Result<Self> {
        Ok(Self {
            state: CommunityState::new(network, membership)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_triangles_bridged() -> Arc<Network> {
        Arc::new(
            Network::from_edges(
                6,
                &[
                    (0, 1, 1.0),
                    (1, 2, 1.0),
                    (0, 2, 1.0),
                    (3, 4, 1.0),
                    (4, 5, 1.0),
                    (3, 5, 1.0),
                    (2, 3, 1.0),
                ],
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_natural_split_beats_lump() {
        let net = two_triangles_bridged();
        let split =
            SurprisePartition::with_membership(Arc::clone(&net), &[0, 0, 0, 1, 1, 1]).unwrap();
        let lump = SurprisePartition::with_membership(net, &[0, 0, 0, 0, 0, 0]).unwrap();
        assert!(split.quality() > lump.quality());
    }

    #[test]
    fn test_empty_graph_scores_zero() {
        let net = Arc::new(Network::from_edges(3, &[]).unwrap());
        let partition = SurprisePartition::new(net).unwrap();
        assert!(partition.quality().abs() < 1e-12);
    }

    #[test]
    fn test_diff_move_matches_recompute() {
        let partition =
            SurprisePartition::with_membership(two_triangles_bridged(), &[0, 0, 1, 1, 2, 2])
                .unwrap();
        let q0 = partition.quality();
        for v in 0..6 {
            for target in 0..=partition.n_communities() {
                let predicted = partition.diff_move(v, target);
                let mut moved = partition.clone();
                moved.move_node(v, target).unwrap();
                let actual = moved.quality() - q0;
                assert!(
                    (predicted - actual).abs() < 1e-9 * (1.0 + q0.abs()),
                    "v={v} target={target}: predicted {predicted}, actual {actual}"
                );
            }
        }
    }
}
