//! # cohort
//!
//! Community detection over weighted graphs with the Leiden family of
//! local-moving optimisers.
//!
//! Pick a quality function, wrap your graph in a partition, and hand it to
//! the optimiser:
//!
//! ```
//! use cohort::{CpmPartition, Network, Optimiser, Partition};
//! use std::sync::Arc;
//!
//! // Two triangles.
//! let net = Arc::new(Network::from_edges(6, &[
//!     (0, 1, 1.0), (1, 2, 1.0), (0, 2, 1.0),
//!     (3, 4, 1.0), (4, 5, 1.0), (3, 5, 1.0),
//! ]).unwrap());
//!
//! let mut partition = CpmPartition::new(net, 0.1).unwrap();
//! let mut optimiser = Optimiser::new().with_rng_seed(42);
//! let quality = optimiser.optimise_partition(&mut partition, -1, None).unwrap();
//!
//! assert_eq!(partition.n_communities(), 2);
//! assert!((quality - 4.2).abs() < 1e-9);
//! ```
//!
//! Six quality functions share one incremental-move contract
//! ([`Partition`]): modularity, RB configuration, CPM, RB Erdős–Rényi,
//! significance, and surprise. The optimiser also handles multiplex layers
//! over a shared vertex set ([`Optimiser::optimise_partition_multiplex`])
//! and can capture the whole coarsening hierarchy
//! ([`Optimiser::optimise_partition_hierarchical`]).

pub mod error;
pub mod network;
pub mod optimiser;
pub mod partition;


pub use error::{Error, Result};
pub use network::Network;
pub use optimiser::{ConsiderComms, OptimiseRoutine, Optimiser};
pub use partition::{
    CommunityState, CpmPartition, ModularityPartition, Partition, RBConfigurationPartition,
    RberPartition, SignificancePartition, SurprisePartition,
};
