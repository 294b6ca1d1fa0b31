//! # Grid Topology
//!
//! Maps linear cell IDs onto a toroidal `x_cells × z_cells` lattice and
//! precomputes every cell's Moore neighborhood once.
//!
//! Cells are numbered row-major: `x = id % x_cells`, `z = id / x_cells`.
//! Clusters are rectangular tiles of cells numbered the same way over the
//! cluster grid; they only batch cells for rendering.
//!
//! Neighborhoods live in a single arena of `num_cells` fixed-size arrays.
//! Topology never changes after construction, so nothing is shared or
//! reference counted.

use rayon::prelude::*;

use crate::config::GridConfig;
use crate::error::{AutomataError, AutomataResult};
use crate::{CellId, NEIGHBORHOOD_SIZE};

/// Fixed-size Moore neighborhood
pub type Neighborhood = [CellId; NEIGHBORHOOD_SIZE];

/// Immutable grid geometry and neighborhood arena
#[derive(Clone, Debug)]
pub struct GridTopology {
    x_clusters: usize,
    z_clusters: usize,
    x_cells_per_cluster: usize,
    z_cells_per_cluster: usize,
    x_cells: usize,
    z_cells: usize,
    neighborhoods: Vec<Neighborhood>,
}

impl GridTopology {
    /// Build the topology and its neighborhood arena
    pub fn new(grid: &GridConfig) -> AutomataResult<Self> {
        if grid.x_clusters == 0
            || grid.z_clusters == 0
            || grid.x_cells_per_cluster == 0
            || grid.z_cells_per_cluster == 0
        {
            return Err(AutomataError::config(
                "grid topology needs non-zero clusters and cluster sizes",
            ));
        }

        let x_cells = grid
            .x_clusters
            .checked_mul(grid.x_cells_per_cluster)
            .ok_or_else(|| AutomataError::config("x cell count overflows"))?;
        let z_cells = grid
            .z_clusters
            .checked_mul(grid.z_cells_per_cluster)
            .ok_or_else(|| AutomataError::config("z cell count overflows"))?;
        let num_cells = x_cells
            .checked_mul(z_cells)
            .ok_or_else(|| AutomataError::config("cell count overflows"))?;

        let neighborhoods = (0..num_cells)
            .into_par_iter()
            .map(|id| moore_neighborhood(id, x_cells, z_cells))
            .collect();

        Ok(Self {
            x_clusters: grid.x_clusters,
            z_clusters: grid.z_clusters,
            x_cells_per_cluster: grid.x_cells_per_cluster,
            z_cells_per_cluster: grid.z_cells_per_cluster,
            x_cells,
            z_cells,
            neighborhoods,
        })
    }

    pub fn x_cells(&self) -> usize {
        self.x_cells
    }

    pub fn z_cells(&self) -> usize {
        self.z_cells
    }

    pub fn num_cells(&self) -> usize {
        self.x_cells * self.z_cells
    }

    pub fn x_clusters(&self) -> usize {
        self.x_clusters
    }

    pub fn z_clusters(&self) -> usize {
        self.z_clusters
    }

    pub fn num_clusters(&self) -> usize {
        self.x_clusters * self.z_clusters
    }

    pub fn cells_per_cluster(&self) -> usize {
        self.x_cells_per_cluster * self.z_cells_per_cluster
    }

    /// Grid coordinates `(x, z)` of a cell
    #[inline]
    pub fn coords(&self, cell: CellId) -> (usize, usize) {
        debug_assert!(cell < self.num_cells());
        (cell % self.x_cells, cell / self.x_cells)
    }

    /// Cell at grid coordinates, wrapping toroidally
    #[inline]
    pub fn cell_at(&self, x: usize, z: usize) -> CellId {
        (z % self.z_cells) * self.x_cells + (x % self.x_cells)
    }

    /// The 8 wrapped neighbors of a cell
    ///
    /// Order: lower row (x-1, x, x+1), middle row (x-1, x+1),
    /// upper row (x-1, x, x+1).
    #[inline]
    pub fn neighbors_of(&self, cell: CellId) -> &Neighborhood {
        &self.neighborhoods[cell]
    }

    /// Cluster containing a cell
    pub fn cluster_of(&self, cell: CellId) -> usize {
        let (x, z) = self.coords(cell);
        (z / self.z_cells_per_cluster) * self.x_clusters + x / self.x_cells_per_cluster
    }

    /// Cluster grid coordinates `(x, z)` of a cluster
    pub fn cluster_position(&self, cluster: usize) -> (usize, usize) {
        debug_assert!(cluster < self.num_clusters());
        (cluster % self.x_clusters, cluster / self.x_clusters)
    }

    /// World translation of a cluster's render instance
    pub fn cluster_translation(&self, cluster: usize, offset: f32) -> [f32; 3] {
        let (cx, cz) = self.cluster_position(cluster);
        [cx as f32 * offset, 0.0, cz as f32 * offset]
    }

    /// Cells of a cluster, row by row within the tile
    ///
    /// The position in this sequence is the cell's quadrant inside the
    /// cluster's render instance.
    pub fn cells_of_cluster(&self, cluster: usize) -> impl Iterator<Item = CellId> + '_ {
        let (cx, cz) = self.cluster_position(cluster);
        let x0 = cx * self.x_cells_per_cluster;
        let z0 = cz * self.z_cells_per_cluster;
        (0..self.z_cells_per_cluster).flat_map(move |dz| {
            (0..self.x_cells_per_cluster).map(move |dx| (z0 + dz) * self.x_cells + x0 + dx)
        })
    }
}

fn moore_neighborhood(id: CellId, x_cells: usize, z_cells: usize) -> Neighborhood {
    let x = id % x_cells;
    let z = id / x_cells;

    let z_up = (z + 1) % z_cells;
    let z_down = (z + z_cells - 1) % z_cells;
    let x_up = (x + 1) % x_cells;
    let x_down = (x + x_cells - 1) % x_cells;

    [
        // lower row
        x_down + x_cells * z_down,
        x + x_cells * z_down,
        x_up + x_cells * z_down,
        // middle row
        x_down + x_cells * z,
        x_up + x_cells * z,
        // upper row
        x_down + x_cells * z_up,
        x + x_cells * z_up,
        x_up + x_cells * z_up,
    ]
}
