//! Local-move optimisation and the multi-level Leiden driver.
//!
//! ## The optimisation loop
//!
//! The primitive is a **pass**: visit every vertex in a seeded random order,
//! score candidate communities with `diff_move`, and greedily apply the best
//! strictly-positive move. [`Optimiser::move_nodes`] repeats passes until one
//! completes without a move; [`Optimiser::merge_nodes`] is the same loop but
//! only vertices still alone in their community may move, which pins every
//! vertex after its first move and makes the routine suitable for building
//! merges out of singletons.
//!
//! The drivers wrap a routine in the multi-level scheme: optimise a level,
//! collapse communities into super-vertices, and recurse on the coarser
//! graph until a round stops improving. With
//! [`refine_partition`](Optimiser::with_refine_partition) enabled the level
//! is first re-partitioned into singletons and re-merged *within* the found
//! communities, and the quotient is taken over those refined parts — the
//! Leiden refinement that keeps badly connected communities from being
//! frozen into a super-vertex. Every vertex of the coarse graph starts in
//! the community of its parent, so aggregation never changes quality by
//! itself.
//!
//! One Leiden caveat carries over from the reference implementation: when
//! re-merging singletons during refinement, a vertex's connectivity to the
//! rest of its community is not checked, so subpartition density guarantees
//! do not hold. Results are still γ-separated and γ-connected.
//!
//! ## Determinism
//!
//! Runs are reproducible bit-for-bit: the only randomness is a [`StdRng`]
//! seeded from [`rng_seed`](Optimiser::with_rng_seed), consumed exclusively
//! by the per-pass shuffle and by random-candidate selection, and every
//! candidate enumeration is in deterministic first-seen order. The drivers
//! reseed on entry; the low-level routines draw from the running stream.
//!
//! ## References
//!
//! - Traag, Waltman, van Eck (2019). "From Louvain to Leiden: guaranteeing
//!   well-connected communities." Scientific Reports 9, 5233.
//! - Blondel et al. (2008). "Fast unfolding of communities in large
//!   networks." J. Stat. Mech., P10008.

use crate::error::{Error, Result};
use crate::partition::Partition;
use rand::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Which communities are scored as move targets for a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsiderComms {
    /// Every distinct community among the vertex's neighbours.
    AllNeighComms,
    /// Every non-empty community.
    AllComms,
    /// One uniformly chosen neighbour community.
    RandNeighComm,
    /// One uniformly chosen non-empty community.
    RandComm,
}

/// Which routine a driver runs on each level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimiseRoutine {
    /// Repeated passes of greedy single-vertex moves.
    MoveNodes,
    /// Greedy merges out of singleton communities.
    MergeNodes,
}

/// Leiden-family optimiser over any [`Partition`].
///
/// Configuration is builder-style; defaults match the reference Leiden
/// setup: all neighbour communities for moving, all communities for
/// refinement, `MoveNodes` optimisation with `MergeNodes` refinement,
/// refinement enabled, empty-community moves enabled, no size cap.
///
/// ```
/// use cohort::{ModularityPartition, Network, Optimiser, Partition};
/// use std::sync::Arc;
///
/// let net = Arc::new(Network::from_edges(3, &[(0, 1, 1.0), (1, 2, 1.0), (0, 2, 1.0)]).unwrap());
/// let mut partition = ModularityPartition::new(net).unwrap();
/// let mut optimiser = Optimiser::new().with_rng_seed(42);
/// let quality = optimiser.optimise_partition(&mut partition, -1, None).unwrap();
/// assert_eq!(partition.n_communities(), 1);
/// assert!((quality - 0.5).abs() < 1e-9);
/// ```
#[derive(Clone)]
pub struct Optimiser {
    consider_comms: ConsiderComms,
    refine_consider_comms: ConsiderComms,
    optimise_routine: OptimiseRoutine,
    refine_routine: OptimiseRoutine,
    refine_partition: bool,
    consider_empty_community: bool,
    max_comm_size: usize,
    rng_seed: u64,
    rng: StdRng,
    abort: Option<Arc<AtomicBool>>,
}

impl Optimiser {
    /// Create an optimiser with the reference Leiden defaults and seed 0.
    pub fn new() -> Self {
        Self {
            consider_comms: ConsiderComms::AllNeighComms,
            refine_consider_comms: ConsiderComms::AllComms,
            optimise_routine: OptimiseRoutine::MoveNodes,
            refine_routine: OptimiseRoutine::MergeNodes,
            refine_partition: true,
            consider_empty_community: true,
            max_comm_size: 0,
            rng_seed: 0,
            rng: StdRng::seed_from_u64(0),
            abort: None,
        }
    }

    /// Candidate selection for the optimisation routine.
    pub fn with_consider_comms(mut self, consider: ConsiderComms) -> Self {
        self.consider_comms = consider;
        self
    }

    /// Candidate selection for the refinement routine.
    pub fn with_refine_consider_comms(mut self, consider: ConsiderComms) -> Self {
        self.refine_consider_comms = consider;
        self
    }

    /// Routine the drivers run on each level.
    pub fn with_optimise_routine(mut self, routine: OptimiseRoutine) -> Self {
        self.optimise_routine = routine;
        self
    }

    /// Routine used for the refinement phase.
    pub fn with_refine_routine(mut self, routine: OptimiseRoutine) -> Self {
        self.refine_routine = routine;
        self
    }

    /// Whether levels are refined before aggregation.
    pub fn with_refine_partition(mut self, refine: bool) -> Self {
        self.refine_partition = refine;
        self
    }

    /// Whether a fresh empty community is scored as a move target.
    pub fn with_consider_empty_community(mut self, consider: bool) -> Self {
        self.consider_empty_community = consider;
        self
    }

    /// Cap on community node-weight size; 0 means unbounded.
    pub fn with_max_comm_size(mut self, max: usize) -> Self {
        self.max_comm_size = max;
        self
    }

    /// Seed for the PRNG; drivers reseed from this on every call.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = seed;
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Cooperative cancellation flag, checked between passes.
    pub fn with_abort_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.abort = Some(flag);
        self
    }

    /// Candidate selection for the optimisation routine.
    pub fn consider_comms(&self) -> ConsiderComms {
        self.consider_comms
    }

    /// Candidate selection for the refinement routine.
    pub fn refine_consider_comms(&self) -> ConsiderComms {
        self.refine_consider_comms
    }

    /// Routine the drivers run on each level.
    pub fn optimise_routine(&self) -> OptimiseRoutine {
        self.optimise_routine
    }

    /// Routine used for the refinement phase.
    pub fn refine_routine(&self) -> OptimiseRoutine {
        self.refine_routine
    }

    /// Whether levels are refined before aggregation.
    pub fn refine_partition(&self) -> bool {
        self.refine_partition
    }

    /// Whether a fresh empty community is scored as a move target.
    pub fn consider_empty_community(&self) -> bool {
        self.consider_empty_community
    }

    /// Cap on community node-weight size; 0 means unbounded.
    pub fn max_comm_size(&self) -> usize {
        self.max_comm_size
    }

    /// The configured PRNG seed.
    pub fn rng_seed(&self) -> u64 {
        self.rng_seed
    }

    fn is_aborted(&self) -> bool {
        self.abort
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// Greedy local moves until a pass makes none. Returns Δquality.
    ///
    /// Community slots emptied by moves are left in place; compact with
    /// [`Partition::renumber_communities`] when dense ids are needed.
    pub fn move_nodes<P: Partition>(
        &mut self,
        partition: &mut P,
        is_fixed: Option<&[bool]>,
    ) -> Result<f64> {
        let fixed = resolve_fixed(partition.vcount(), is_fixed)?;
        self.run_routine(
            std::slice::from_mut(partition),
            &[1.0],
            &fixed,
            self.consider_comms,
            OptimiseRoutine::MoveNodes,
            None,
        )
    }

    /// Greedy merges out of singleton communities. Returns Δquality.
    pub fn merge_nodes<P: Partition>(
        &mut self,
        partition: &mut P,
        is_fixed: Option<&[bool]>,
    ) -> Result<f64> {
        let fixed = resolve_fixed(partition.vcount(), is_fixed)?;
        self.run_routine(
            std::slice::from_mut(partition),
            &[1.0],
            &fixed,
            self.consider_comms,
            OptimiseRoutine::MergeNodes,
            None,
        )
    }

    /// Local moves restricted to communities inside the vertex's
    /// `constraint` community. Returns Δquality.
    pub fn move_nodes_constrained<P: Partition>(
        &mut self,
        partition: &mut P,
        constraint: &[usize],
    ) -> Result<f64> {
        let fixed = vec![false; partition.vcount()];
        self.run_routine(
            std::slice::from_mut(partition),
            &[1.0],
            &fixed,
            self.refine_consider_comms,
            OptimiseRoutine::MoveNodes,
            Some(constraint),
        )
    }

    /// Singleton merges restricted to communities inside the vertex's
    /// `constraint` community. Returns Δquality.
    pub fn merge_nodes_constrained<P: Partition>(
        &mut self,
        partition: &mut P,
        constraint: &[usize],
    ) -> Result<f64> {
        let fixed = vec![false; partition.vcount()];
        self.run_routine(
            std::slice::from_mut(partition),
            &[1.0],
            &fixed,
            self.refine_consider_comms,
            OptimiseRoutine::MergeNodes,
            Some(constraint),
        )
    }

    /// Optimise a partition with the full multi-level loop.
    ///
    /// One iteration is one optimise-then-aggregate round; a negative
    /// `n_iterations` runs until a round stops improving. Fixed vertices
    /// keep their initial community. Returns the final quality.
    pub fn optimise_partition<P: Partition>(
        &mut self,
        partition: &mut P,
        n_iterations: i32,
        is_fixed: Option<&[bool]>,
    ) -> Result<f64> {
        self.optimise_layers(
            std::slice::from_mut(partition),
            &[1.0],
            n_iterations,
            is_fixed,
            None,
        )
    }

    /// Optimise multiplex layers sharing one membership.
    ///
    /// Candidate moves are scored by the weighted sum of per-layer
    /// `diff_move` values; layer weights may be negative. All layers must
    /// have the same vertex count and start from the same membership.
    /// Returns the weighted final quality.
    pub fn optimise_partition_multiplex<P: Partition>(
        &mut self,
        partitions: &mut [P],
        layer_weights: &[f64],
        n_iterations: i32,
        is_fixed: Option<&[bool]>,
    ) -> Result<f64> {
        self.optimise_layers(partitions, layer_weights, n_iterations, is_fixed, None)
    }

    /// As [`optimise_partition_multiplex`](Self::optimise_partition_multiplex),
    /// capturing one partition snapshot per level into `hierarchy`.
    ///
    /// `hierarchy[0]` is the initial base-level partition; each following
    /// element is the seeded partition of one coarser level. Level vertex
    /// counts never grow and level qualities never decrease. Runs until a
    /// round stops improving; returns the weighted final quality.
    pub fn optimise_partition_hierarchical<P: Partition>(
        &mut self,
        partitions: &mut [P],
        layer_weights: &[f64],
        is_fixed: Option<&[bool]>,
        hierarchy: &mut Vec<P>,
    ) -> Result<f64> {
        self.optimise_layers(partitions, layer_weights, -1, is_fixed, Some(hierarchy))
    }

    fn optimise_layers<P: Partition>(
        &mut self,
        partitions: &mut [P],
        layer_weights: &[f64],
        n_iterations: i32,
        is_fixed: Option<&[bool]>,
        mut hierarchy: Option<&mut Vec<P>>,
    ) -> Result<f64> {
        if partitions.is_empty() {
            return Err(Error::EmptyInput);
        }
        if layer_weights.len() != partitions.len() {
            return Err(Error::LengthMismatch {
                expected: partitions.len(),
                found: layer_weights.len(),
            });
        }
        let n = partitions[0].vcount();
        for p in partitions.iter() {
            if p.vcount() != n {
                return Err(Error::LengthMismatch {
                    expected: n,
                    found: p.vcount(),
                });
            }
        }
        let initial_membership = partitions[0].membership_vec().to_vec();
        if partitions
            .iter()
            .skip(1)
            .any(|p| p.membership_vec() != initial_membership.as_slice())
        {
            return Err(Error::InvalidParameter {
                name: "partitions",
                message: "multiplex layers must start from the same membership",
            });
        }
        let fixed = resolve_fixed(n, is_fixed)?;

        self.rng = StdRng::seed_from_u64(self.rng_seed);

        if let Some(h) = hierarchy.as_deref_mut() {
            h.clear();
            h.push(partitions[0].clone());
        }

        let mut collapsed: Vec<P> = partitions.to_vec();
        let mut agg_map: Vec<usize> = (0..n).collect();
        let mut collapsed_fixed = fixed.clone();
        let mut iteration: i32 = 0;

        loop {
            let delta = self.run_routine(
                &mut collapsed,
                layer_weights,
                &collapsed_fixed,
                self.consider_comms,
                self.optimise_routine,
                None,
            )?;

            // Map the level membership back down to the base vertices.
            let level_membership = collapsed[0].membership_vec().to_vec();
            let base_membership: Vec<usize> =
                agg_map.iter().map(|&a| level_membership[a]).collect();
            for p in partitions.iter_mut() {
                p.set_membership(&base_membership)?;
            }

            iteration += 1;
            if delta <= 0.0 {
                break;
            }
            if n_iterations >= 0 && iteration >= n_iterations {
                break;
            }
            if self.is_aborted() {
                break;
            }

            // Compact level ids before aggregating.
            collapsed[0].renumber_communities();
            let compacted = collapsed[0].membership_vec().to_vec();
            for p in collapsed.iter_mut().skip(1) {
                p.set_membership(&compacted)?;
            }
            let level_n = collapsed[0].vcount();

            let (next_level, map_through) = if self.refine_partition {
                let mut refined: Vec<P> = Vec::with_capacity(collapsed.len());
                for p in collapsed.iter() {
                    refined.push(p.like(Arc::clone(p.network()), None)?);
                }
                let unpinned = vec![false; level_n];
                self.run_routine(
                    &mut refined,
                    layer_weights,
                    &unpinned,
                    self.refine_consider_comms,
                    self.refine_routine,
                    Some(&compacted),
                )?;
                refined[0].renumber_communities();
                let refined_membership = refined[0].membership_vec().to_vec();
                for p in refined.iter_mut().skip(1) {
                    p.set_membership(&refined_membership)?;
                }

                let n_refined = refined[0].n_communities();
                if n_refined == level_n {
                    break;
                }
                // Super-vertices are refined communities; each starts in the
                // community of its parent so quality carries over unchanged.
                let mut seed = vec![0usize; n_refined];
                for v in 0..level_n {
                    seed[refined_membership[v]] = compacted[v];
                }
                let mut next: Vec<P> = Vec::with_capacity(refined.len());
                for p in refined.iter() {
                    next.push(p.aggregate(Some(&seed))?);
                }
                (next, refined_membership)
            } else {
                if collapsed[0].n_communities() == level_n {
                    break;
                }
                let mut next: Vec<P> = Vec::with_capacity(collapsed.len());
                for p in collapsed.iter() {
                    next.push(p.aggregate(None)?);
                }
                (next, compacted)
            };

            if let Some(h) = hierarchy.as_deref_mut() {
                h.push(next_level[0].clone());
            }

            for slot in agg_map.iter_mut() {
                *slot = map_through[*slot];
            }
            collapsed_fixed = vec![false; next_level[0].vcount()];
            for v in 0..n {
                if fixed[v] {
                    collapsed_fixed[agg_map[v]] = true;
                }
            }
            collapsed = next_level;
        }

        // Compact the base ids; communities holding a fixed vertex keep the
        // id that vertex started with.
        if fixed.iter().any(|&f| f) {
            partitions[0]
                .state_mut()
                .renumber_communities_fixed(&fixed, &initial_membership);
        } else {
            partitions[0].renumber_communities();
        }
        let final_membership = partitions[0].membership_vec().to_vec();
        for p in partitions.iter_mut().skip(1) {
            p.set_membership(&final_membership)?;
        }

        weighted_quality(partitions, layer_weights)
    }

    fn run_routine<P: Partition>(
        &mut self,
        partitions: &mut [P],
        layer_weights: &[f64],
        is_fixed: &[bool],
        consider: ConsiderComms,
        routine: OptimiseRoutine,
        constraint: Option<&[usize]>,
    ) -> Result<f64> {
        if partitions.is_empty() {
            return Err(Error::EmptyInput);
        }
        if layer_weights.len() != partitions.len() {
            return Err(Error::LengthMismatch {
                expected: partitions.len(),
                found: layer_weights.len(),
            });
        }
        if layer_weights.iter().any(|w| !w.is_finite()) {
            return Err(Error::InvalidParameter {
                name: "layer_weights",
                message: "layer weights must be finite",
            });
        }
        let n = partitions[0].vcount();
        for p in partitions.iter() {
            if p.vcount() != n {
                return Err(Error::LengthMismatch {
                    expected: n,
                    found: p.vcount(),
                });
            }
        }
        if is_fixed.len() != n {
            return Err(Error::LengthMismatch {
                expected: n,
                found: is_fixed.len(),
            });
        }
        if let Some(cons) = constraint {
            if cons.len() != n {
                return Err(Error::LengthMismatch {
                    expected: n,
                    found: cons.len(),
                });
            }
        }

        let initial = weighted_quality(partitions, layer_weights)?;

        // Constraint community -> members, for constrained AllComms scans.
        let constraint_members: Option<Vec<Vec<usize>>> = constraint.map(|cons| {
            let slots = cons.iter().map(|&c| c + 1).max().unwrap_or(0);
            let mut members = vec![Vec::new(); slots];
            for (v, &c) in cons.iter().enumerate() {
                members[c].push(v);
            }
            members
        });

        let mut order: Vec<usize> = (0..n).collect();
        let mut candidates: Vec<usize> = Vec::new();
        let mut seen = vec![false; n + 1];

        loop {
            if self.is_aborted() {
                break;
            }
            let mut n_moves = 0usize;
            order.shuffle(&mut self.rng);

            for i in 0..n {
                let v = order[i];
                if is_fixed[v] {
                    continue;
                }
                let comm_from = partitions[0].membership(v);
                // Merging only moves vertices still alone in their
                // community; everything that has merged stays pinned.
                if routine == OptimiseRoutine::MergeNodes && partitions[0].cnodes(comm_from) > 1 {
                    continue;
                }

                self.collect_candidates(
                    v,
                    partitions,
                    consider,
                    constraint,
                    constraint_members.as_deref(),
                    &mut candidates,
                    &mut seen,
                );

                let n_comms = partitions[0].n_communities();
                if self.consider_empty_community && n_comms < n && !seen[n_comms] {
                    seen[n_comms] = true;
                    candidates.push(n_comms);
                }

                let mut best_comm = comm_from;
                let mut best_gain = 0.0;
                for &c in candidates.iter() {
                    if c == comm_from {
                        continue;
                    }
                    if self.max_comm_size > 0 {
                        let v_weight = partitions[0].network().node_weight(v);
                        if partitions[0].csize(c) + v_weight > self.max_comm_size as f64 {
                            continue;
                        }
                    }
                    let mut gain = 0.0;
                    for (p, w) in partitions.iter().zip(layer_weights.iter()) {
                        gain += w * p.diff_move(v, c);
                    }
                    // A non-finite gain is not a candidate.
                    if gain.is_finite() && gain > best_gain {
                        best_gain = gain;
                        best_comm = c;
                    }
                }

                for &c in candidates.iter() {
                    seen[c] = false;
                }
                candidates.clear();

                if best_comm != comm_from && best_gain > 0.0 {
                    for p in partitions.iter_mut() {
                        p.move_node(v, best_comm)?;
                    }
                    n_moves += 1;
                }
            }

            if n_moves == 0 {
                break;
            }
        }

        let final_quality = weighted_quality(partitions, layer_weights)?;
        Ok(final_quality - initial)
    }

    /// Fill `out` with candidate communities for `v` in deterministic
    /// first-seen order, using `seen` as a cleared-by-caller scratch mask.
    fn collect_candidates<P: Partition>(
        &mut self,
        v: usize,
        partitions: &[P],
        consider: ConsiderComms,
        constraint: Option<&[usize]>,
        constraint_members: Option<&[Vec<usize>]>,
        out: &mut Vec<usize>,
        seen: &mut [bool],
    ) {
        match consider {
            ConsiderComms::AllNeighComms => {
                for p in partitions {
                    for (c, _) in p.state().neigh_comm_weights_filtered(v, constraint) {
                        if !seen[c] {
                            seen[c] = true;
                            out.push(c);
                        }
                    }
                }
            }
            ConsiderComms::AllComms => match (constraint, constraint_members) {
                (Some(cons), Some(members)) => {
                    for &u in &members[cons[v]] {
                        let c = partitions[0].membership(u);
                        if !seen[c] {
                            seen[c] = true;
                            out.push(c);
                        }
                    }
                }
                _ => {
                    for c in 0..partitions[0].n_communities() {
                        if partitions[0].cnodes(c) > 0 && !seen[c] {
                            seen[c] = true;
                            out.push(c);
                        }
                    }
                }
            },
            ConsiderComms::RandNeighComm | ConsiderComms::RandComm => {
                let mut pool: Vec<usize> = Vec::new();
                if consider == ConsiderComms::RandNeighComm {
                    for p in partitions {
                        for (c, _) in p.state().neigh_comm_weights_filtered(v, constraint) {
                            if !seen[c] {
                                seen[c] = true;
                                pool.push(c);
                            }
                        }
                    }
                } else {
                    match (constraint, constraint_members) {
                        (Some(cons), Some(members)) => {
                            for &u in &members[cons[v]] {
                                let c = partitions[0].membership(u);
                                if !seen[c] {
                                    seen[c] = true;
                                    pool.push(c);
                                }
                            }
                        }
                        _ => {
                            for c in 0..partitions[0].n_communities() {
                                if partitions[0].cnodes(c) > 0 && !seen[c] {
                                    seen[c] = true;
                                    pool.push(c);
                                }
                            }
                        }
                    }
                }
                for &c in pool.iter() {
                    seen[c] = false;
                }
                if !pool.is_empty() {
                    let pick = pool[self.rng.random_range(0..pool.len())];
                    seen[pick] = true;
                    out.push(pick);
                }
            }
        }
    }
}

impl Default for Optimiser {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve_fixed(n: usize, is_fixed: Option<&[bool]>) -> Result<Vec<bool>> {
    match is_fixed {
        Some(fixed) => {
            if fixed.len() != n {
                return Err(Error::LengthMismatch {
                    expected: n,
                    found: fixed.len(),
                });
            }
            Ok(fixed.to_vec())
        }
        None => Ok(vec![false; n]),
    }
}

fn weighted_quality<P: Partition>(partitions: &[P], layer_weights: &[f64]) -> Result<f64> {
    let mut total = 0.0;
    for (p, w) in partitions.iter().zip(layer_weights.iter()) {
        let q = p.quality();
        if !q.is_finite() {
            return Err(Error::NonFiniteQuality);
        }
        total += w * q;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Network;
    use crate::partition::{CpmPartition, ModularityPartition};

    fn triangle() -> Arc<Network> {
        Arc::new(Network::from_edges(3, &[(0, 1, 1.0), (1, 2, 1.0), (0, 2, 1.0)]).unwrap())
    }

    fn two_triangles() -> Arc<Network> {
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
                ],
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_isolated_vertices_stay_apart() {
        let net = Arc::new(Network::from_edges(3, &[]).unwrap());
        let mut partition = ModularityPartition::new(net).unwrap();
        let mut optimiser = Optimiser::new().with_rng_seed(1);
        let quality = optimiser.optimise_partition(&mut partition, -1, None).unwrap();
        assert!(quality.abs() < 1e-12);
        assert_eq!(partition.n_communities(), 3);
        let mut seen = partition.membership_vec().to_vec();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_triangle_collapses_to_one_community() {
        let mut partition = ModularityPartition::new(triangle()).unwrap();
        let mut optimiser = Optimiser::new().with_rng_seed(42);
        let quality = optimiser.optimise_partition(&mut partition, -1, None).unwrap();
        assert_eq!(partition.n_communities(), 1);
        assert!((quality - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_cpm_finds_two_triangles() {
        let mut partition = CpmPartition::new(two_triangles(), 0.1).unwrap();
        let mut optimiser = Optimiser::new().with_rng_seed(7);
        let quality = optimiser.optimise_partition(&mut partition, -1, None).unwrap();
        assert_eq!(partition.n_communities(), 2);
        for c in 0..2 {
            assert_eq!(partition.cnodes(c), 3);
        }
        assert!((quality - 4.2).abs() < 1e-9);
    }

    #[test]
    fn test_fixed_vertices_never_move() {
        let mut partition =
            ModularityPartition::with_membership(triangle(), &[0, 1, 2]).unwrap();
        let mut optimiser = Optimiser::new().with_rng_seed(3);
        let quality = optimiser
            .optimise_partition(&mut partition, -1, Some(&[true, true, true]))
            .unwrap();
        assert_eq!(partition.membership_vec(), &[0, 1, 2]);
        assert!((quality - (-1.0 / 6.0)).abs() < 1e-12);
    }

    #[test]
    fn test_partially_fixed_vertex_keeps_community() {
        let mut partition =
            ModularityPartition::with_membership(two_triangles(), &[2, 2, 2, 5, 1, 0]).unwrap();
        let is_fixed = [false, false, true, false, false, false];
        let mut optimiser = Optimiser::new().with_rng_seed(11);
        let _ = optimiser
            .optimise_partition(&mut partition, -1, Some(&is_fixed))
            .unwrap();
        assert_eq!(partition.membership(2), 2);
    }

    #[test]
    fn test_max_comm_size_bound_respected() {
        let mut partition = ModularityPartition::new(two_triangles()).unwrap();
        let mut optimiser = Optimiser::new().with_rng_seed(5).with_max_comm_size(2);
        let _ = optimiser.optimise_partition(&mut partition, -1, None).unwrap();
        for c in 0..partition.n_communities() {
            assert!(partition.csize(c) <= 2.0 + 1e-12);
        }
    }

    #[test]
    fn test_moves_out_to_empty_community() {
        // Starting from one lump, CPM at this resolution can only improve
        // by peeling vertices into fresh communities.
        let mut partition =
            CpmPartition::with_membership(two_triangles(), &[0; 6], 0.4).unwrap();
        let before = partition.quality();
        let mut optimiser = Optimiser::new().with_rng_seed(13);
        let after = optimiser.optimise_partition(&mut partition, -1, None).unwrap();
        assert!(after > before);
        assert!(partition.n_communities() >= 2);
    }

    #[test]
    fn test_merge_nodes_only_merges_singletons() {
        let mut partition = ModularityPartition::new(triangle()).unwrap();
        let mut optimiser = Optimiser::new().with_rng_seed(2);
        let delta = optimiser.merge_nodes(&mut partition, None).unwrap();
        assert!(delta > 0.0);
        // All three vertices can end up merged; nothing is left split into
        // a worse state than the singletons.
        let mut comms = partition.membership_vec().to_vec();
        comms.sort_unstable();
        comms.dedup();
        assert!(comms.len() < 3);
    }

    #[test]
    fn test_constrained_moves_respect_constraint() {
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
                    (2, 3, 1.0),
                ],
            )
            .unwrap(),
        );
        let constraint = [0, 0, 0, 1, 1, 1];
        let mut partition = ModularityPartition::new(net).unwrap();
        let mut optimiser = Optimiser::new().with_rng_seed(9);
        let _ = optimiser
            .merge_nodes_constrained(&mut partition, &constraint)
            .unwrap();
        for u in 0..6 {
            for v in 0..6 {
                if partition.membership(u) == partition.membership(v) {
                    assert_eq!(constraint[u], constraint[v]);
                }
            }
        }
    }

    #[test]
    fn test_abort_flag_stops_early() {
        let flag = Arc::new(AtomicBool::new(true));
        let mut partition = ModularityPartition::new(triangle()).unwrap();
        let mut optimiser = Optimiser::new()
            .with_rng_seed(4)
            .with_abort_flag(Arc::clone(&flag));
        let quality = optimiser.optimise_partition(&mut partition, -1, None).unwrap();
        // Aborted before any pass: singletons survive.
        assert_eq!(partition.n_communities(), 3);
        assert!((quality - (-1.0 / 6.0)).abs() < 1e-12);
    }

    #[test]
    fn test_layer_weight_length_checked() {
        let mut partitions = vec![ModularityPartition::new(triangle()).unwrap()];
        let mut optimiser = Optimiser::new();
        let result =
            optimiser.optimise_partition_multiplex(&mut partitions, &[1.0, 2.0], -1, None);
        assert!(matches!(result, Err(Error::LengthMismatch { .. })));
    }

    #[test]
    fn test_multiplex_requires_shared_membership() {
        let net = triangle();
        let mut partitions = vec![
            ModularityPartition::with_membership(Arc::clone(&net), &[0, 0, 1]).unwrap(),
            ModularityPartition::with_membership(net, &[0, 1, 1]).unwrap(),
        ];
        let mut optimiser = Optimiser::new();
        let result =
            optimiser.optimise_partition_multiplex(&mut partitions, &[1.0, 1.0], -1, None);
        assert!(matches!(result, Err(Error::InvalidParameter { .. })));
    }

    #[test]
    fn test_empty_graph_optimises_to_zero() {
        let net = Arc::new(Network::from_edges(0, &[]).unwrap());
        let mut partition = ModularityPartition::new(net).unwrap();
        let mut optimiser = Optimiser::new();
        let quality = optimiser.optimise_partition(&mut partition, -1, None).unwrap();
        assert!(quality.abs() < 1e-12);
        assert!(partition.membership_vec().is_empty());
    }
}
