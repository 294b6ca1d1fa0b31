//! # Partitioner
//!
//! Splits the cluster range into `divisions` contiguous runs. Partition `i`
//! is both the `i`-th cascade slot and output batch `i`.
//!
//! With `per = ceil(clusters / divisions)`, partition `i` owns
//! `[min(i * per, clusters), min((i + 1) * per, clusters))`. Trailing
//! partitions may come out empty when the division is uneven.

use std::ops::Range;

use crate::error::{AutomataError, AutomataResult};
use crate::topology::GridTopology;
use crate::visual::{SlotHandle, SlotRole};
use crate::{CellId, PARAMS_PER_CELL};

/// Cluster ranges for each partition
pub fn partition_clusters(num_clusters: usize, divisions: usize) -> Vec<Range<usize>> {
    if divisions == 0 {
        return Vec::new();
    }
    let per = num_clusters.div_ceil(divisions);
    (0..divisions)
        .map(|i| {
            let start = (i * per).min(num_clusters);
            let end = ((i + 1) * per).min(num_clusters);
            start..end
        })
        .collect()
}

/// One cascade slot: its clusters, their cells, and its output batch
#[derive(Clone, Debug)]
pub struct Partition {
    index: usize,
    clusters: Range<usize>,
    cells: Vec<CellId>,
}

impl Partition {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn clusters(&self) -> Range<usize> {
        self.clusters.clone()
    }

    /// Cells in cluster order, each cluster row by row
    pub fn cells(&self) -> &[CellId] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Output slot for the cell at `position` in this partition
    #[inline]
    pub fn slot(&self, position: usize, role: SlotRole) -> SlotHandle {
        debug_assert!(position < self.cells.len());
        SlotHandle {
            buffer: self.index,
            offset: position * PARAMS_PER_CELL + role as usize,
        }
    }

    /// Floats needed to hold this partition's output batch
    pub fn buffer_len(&self) -> usize {
        self.cells.len() * PARAMS_PER_CELL
    }
}

/// All partitions of a grid, fixed for the automaton's lifetime
#[derive(Clone, Debug)]
pub struct PartitionSet {
    partitions: Vec<Partition>,
    clusters_per_partition: usize,
    /// `(partition, position)` of every cell, indexed by cell ID
    locations: Vec<(usize, usize)>,
}

impl PartitionSet {
    pub fn new(topology: &GridTopology, divisions: usize) -> AutomataResult<Self> {
        if divisions == 0 {
            return Err(AutomataError::config("divisions must be at least 1"));
        }

        let partitions: Vec<Partition> = partition_clusters(topology.num_clusters(), divisions)
            .into_iter()
            .enumerate()
            .map(|(index, clusters)| {
                let cells = clusters
                    .clone()
                    .flat_map(|cluster| topology.cells_of_cluster(cluster))
                    .collect();
                Partition {
                    index,
                    clusters,
                    cells,
                }
            })
            .collect();

        let mut locations = vec![(0, 0); topology.num_cells()];
        for p in &partitions {
            for (position, &cell) in p.cells.iter().enumerate() {
                locations[cell] = (p.index, position);
            }
        }

        Ok(Self {
            partitions,
            clusters_per_partition: topology.num_clusters().div_ceil(divisions),
            locations,
        })
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Partition> {
        self.partitions.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Partition> {
        self.partitions.iter()
    }

    /// Render instances per output batch (the largest partition's cluster count)
    pub fn clusters_per_partition(&self) -> usize {
        self.clusters_per_partition
    }

    /// Buffer sizes for every output batch, in partition order
    pub fn buffer_lens(&self) -> Vec<usize> {
        self.partitions.iter().map(Partition::buffer_len).collect()
    }

    /// Partition and position of a cell
    pub fn locate(&self, cell: CellId) -> Option<(usize, usize)> {
        self.locations.get(cell).copied()
    }
}

impl std::ops::Index<usize> for PartitionSet {
    type Output = Partition;

    fn index(&self, index: usize) -> &Partition {
        &self.partitions[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GridConfig;

    fn topology(xc: usize, zc: usize, size: usize) -> GridTopology {
        GridTopology::new(&GridConfig {
            x_clusters: xc,
            z_clusters: zc,
            x_cells_per_cluster: size,
            z_cells_per_cluster: size,
        })
        .unwrap()
    }

    #[test]
    fn test_partition_completeness() {
        for clusters in 1..40 {
            for divisions in 1..12 {
                let ranges = partition_clusters(clusters, divisions);
                assert_eq!(ranges.len(), divisions);
                let mut seen = vec![0u8; clusters];
                for r in &ranges {
                    for c in r.clone() {
                        seen[c] += 1;
                    }
                }
                assert!(
                    seen.iter().all(|&n| n == 1),
                    "clusters {} divisions {}",
                    clusters,
                    divisions
                );
            }
        }
    }

    #[test]
    fn test_even_split() {
        let ranges = partition_clusters(6, 3);
        assert_eq!(ranges, vec![0..2, 2..4, 4..6]);
    }

    #[test]
    fn test_empty_trailing_partitions() {
        let ranges = partition_clusters(4, 3);
        assert_eq!(ranges, vec![0..2, 2..4, 4..4]);

        let ranges = partition_clusters(2, 5);
        assert_eq!(ranges, vec![0..1, 1..2, 2..2, 2..2, 2..2]);
    }

    #[test]
    fn test_partition_cells_follow_clusters() {
        let topo = topology(3, 2, 2); // 6 clusters, 24 cells
        let set = PartitionSet::new(&topo, 3).unwrap();
        assert_eq!(set.len(), 3);
        for p in set.iter() {
            assert_eq!(p.clusters().len(), 2);
            assert_eq!(p.len(), 8);
        }
        // partition 0 holds clusters 0 and 1, tile by tile
        assert_eq!(set[0].cells(), &[0, 1, 6, 7, 2, 3, 8, 9]);

        let mut all: Vec<_> = set.iter().flat_map(|p| p.cells().to_vec()).collect();
        all.sort_unstable();
        assert_eq!(all, (0..24).collect::<Vec<_>>());
    }

    #[test]
    fn test_slot_layout() {
        let topo = topology(2, 2, 1);
        let set = PartitionSet::new(&topo, 2).unwrap();
        let p = &set[1];
        assert_eq!(p.slot(0, SlotRole::Current), SlotHandle { buffer: 1, offset: 0 });
        assert_eq!(p.slot(1, SlotRole::Next), SlotHandle { buffer: 1, offset: 4 });
        assert_eq!(
            p.slot(1, SlotRole::SwitchOffTime),
            SlotHandle { buffer: 1, offset: 5 }
        );
        assert_eq!(set.buffer_lens(), vec![6, 6]);
    }

    #[test]
    fn test_locate() {
        let topo = topology(2, 2, 1);
        let set = PartitionSet::new(&topo, 2).unwrap();
        assert_eq!(set.locate(3), Some((1, 1)));
        assert_eq!(set.locate(99), None);
    }

    #[test]
    fn test_zero_divisions_rejected() {
        let topo = topology(2, 2, 1);
        assert!(PartitionSet::new(&topo, 0).is_err());
    }
}
