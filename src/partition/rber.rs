//! Reichardt–Bornholdt quality with an Erdős–Rényi null model.
//!
//! The Potts size penalty is scaled by the graph density `p`, so a
//! community is worth keeping when its internal density beats γ·p:
//!
//! ```text
//! Q = Σ_c [ w_in(c) - γ·p · csize(c)² ]      p = M / possible_pairs
//! ```
//!
//! Unlike the configuration null, every vertex pair is equally likely under
//! this null, which suits graphs whose strength heterogeneity is noise
//! rather than structure.

use super::cpm::{potts_diff, potts_quality};
use super::rb_configuration::check_resolution;
use super::{CommunityState, Partition};
use crate::error::Result;
use crate::network::Network;
use std::sync::Arc;

/// Partition scored against an Erdős–Rényi null.
#[derive(Debug, Clone)]
pub struct RberPartition {
    state: CommunityState,
    resolution: f64,
}

impl RberPartition {
    /// Singleton partition with resolution `gamma`.
    pub fn new(network: Arc<Network>, resolution: f64) -> Result<Self> {
        check_resolution(resolution)?;
        Ok(Self {
            state: CommunityState::new(network, None)?,
            resolution,
        })
    }

    /// Partition with an explicit initial membership.
    pub fn with_membership(
        network: Arc<Network>,
        membership: &[usize],
        resolution: f64,
    ) -> Result<Self> {
        check_resolution(resolution)?;
        Ok(Self {
            state: CommunityState::new(network, Some(membership))?,
            resolution,
        })
    }

    /// The resolution parameter γ.
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    fn effective_gamma(&self) -> f64 {
        self.resolution * self.state.network().density()
    }
}

impl Partition for RberPartition {
    fn state(&self) -> &CommunityState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommunityState {
        &mut self.state
    }

    fn quality(&self) -> f64 {
        potts_quality(&self.state, self.effective_gamma())
    }

    fn diff_move(&self, v: usize, target: usize) -> f64 {
        potts_diff(&self.state, v, target, self.effective_gamma())
    }

    fn like(&self, network: Arc<Network>, membership: Option<&[usize]>) -> Result<Self> {
        Ok(Self {
            state: CommunityState::new(network, membership)?,
            resolution: self.resolution,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge_graph() -> Arc<Network> {
        Arc::new(
            Network::from_edges(
                5,
                &[(0, 1, 1.0), (1, 2, 1.0), (0, 2, 1.0), (2, 3, 0.5), (3, 4, 1.0)],
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_quality_uses_density() {
        // p = 4.5 / 10; one community of all five vertices.
        let partition =
            RberPartition::with_membership(bridge_graph(), &[0, 0, 0, 0, 0], 1.0).unwrap();
        let expected = 4.5 - 0.45 * 25.0;
        assert!((partition.quality() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_diff_move_matches_recompute() {
        let partition =
            RberPartition::with_membership(bridge_graph(), &[0, 0, 0, 1, 1], 0.8).unwrap();
        let q0 = partition.quality();
        for v in 0..5 {
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
