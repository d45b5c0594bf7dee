//! Modularity: the configuration-null quality at resolution 1.
//!
//! Compares internal weight against the expectation of a random graph with
//! the same strength sequence. A triangle of unit edges collapsed into one
//! community scores 1/2; three isolated vertices score 0.

use super::rb_configuration::{configuration_diff, configuration_quality};
use super::{CommunityState, Partition};
use crate::error::Result;
use crate::network::Network;
use std::sync::Arc;

/// Partition scored by modularity.
#[derive(Debug, Clone)]
pub struct ModularityPartition {
    state: CommunityState,
}

impl ModularityPartition {
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
}

impl Partition for ModularityPartition {
    fn state(&self) -> &CommunityState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommunityState {
        &mut self.state
    }

    fn quality(&self) -> f64 {
        configuration_quality(&self.state, 1.0)
    }

    fn diff_move(&self, v: usize, target: usize) -> f64 {
        configuration_diff(&self.state, v, target, 1.0)
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

    fn triangle() -> Arc<Network> {
        Arc::new(Network::from_edges(3, &[(0, 1, 1.0), (1, 2, 1.0), (0, 2, 1.0)]).unwrap())
    }

    #[test]
    fn test_triangle_one_community() {
        let partition = ModularityPartition::with_membership(triangle(), &[0, 0, 0]).unwrap();
        assert!((partition.quality() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_triangle_singletons() {
        let partition = ModularityPartition::new(triangle()).unwrap();
        assert!((partition.quality() - (-1.0 / 6.0)).abs() < 1e-9);
    }

    #[test]
    fn test_no_edges_quality_zero() {
        let net = Arc::new(Network::from_edges(3, &[]).unwrap());
        let partition = ModularityPartition::new(net).unwrap();
        assert!(partition.quality().abs() < 1e-12);
        assert!(partition.diff_move(0, 1).abs() < 1e-12);
    }

    #[test]
    fn test_diff_move_matches_recompute() {
        // Two triangles joined by a bridge, checked over every move.
        let net = Arc::new(
            Network::from_edges(
                6,
                &[
                    (0, 1, 1.0),
                    (1, 2, 1.0),
                    (0, 2, 1.0),
                    (3, 4, 1.0),
                    (4, 5, 1.0),
                    (3, 5, 1.0),
                    (2, 3, 0.5),
                ],
            )
            .unwrap(),
        );
        let partition =
            ModularityPartition::with_membership(net, &[0, 0, 0, 1, 1, 2]).unwrap();
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

    #[test]
    fn test_diff_move_directed() {
        let net = Arc::new(
            Network::from_edges_directed(
                4,
                &[(0, 1, 1.0), (1, 0, 2.0), (1, 2, 1.0), (2, 3, 1.5), (3, 0, 1.0)],
            )
            .unwrap(),
        );
        let partition = ModularityPartition::with_membership(net, &[0, 0, 1, 1]).unwrap();
        let q0 = partition.quality();
        for v in 0..4 {
            for target in 0..=partition.n_communities() {
                let predicted = partition.diff_move(v, target);
                let mut moved = partition.clone();
                moved.move_node(v, target).unwrap();
                let actual = moved.quality() - q0;
                assert!((predicted - actual).abs() < 1e-9 * (1.0 + q0.abs()));
            }
        }
    }
}
