//! Instance frames
//!
//! What a renderer would upload for one published batch: one instance per
//! cluster, placed on the cluster grid, and each cell's shade at the
//! current fade phase.

use automata_compute::Automaton;
use automata_core::VisualParams;

/// One render instance (a cluster)
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub translation: [f32; 3],
    /// Cell colors, row by row within the tile
    pub cells: Vec<[f32; 4]>,
}

/// A published batch as the renderer sees it
#[derive(Debug, Clone, Default)]
pub struct BatchFrame {
    pub batch: usize,
    pub instances: Vec<Instance>,
    /// Cells still fully lit
    pub lit: usize,
    /// Cells partway through their fade
    pub fading: usize,
}

impl BatchFrame {
    /// Per instance: translation, then every cell color
    pub fn instance_data(&self) -> Vec<f32> {
        self.instances
            .iter()
            .flat_map(|i| {
                i.translation
                    .iter()
                    .chain(i.cells.iter().flatten())
                    .copied()
            })
            .collect()
    }
}

/// Build the frame for a batch of the built-in buffers at time `now`
pub fn batch_frame(automaton: &Automaton, batch: usize, now: f32) -> Option<BatchFrame> {
    let buffers = automaton.instance_buffers()?;
    let partition = automaton.engine().partitions().get(batch)?;
    let topology = automaton.engine().topology();
    let config = automaton.config();
    let fade_per_second = config.fade_per_second();

    let records: Vec<VisualParams> = buffers.records(batch);
    let mut frame = BatchFrame {
        batch,
        ..Default::default()
    };

    // partition cells are laid out cluster by cluster
    for (cluster, cells) in partition
        .clusters()
        .zip(records.chunks(topology.cells_per_cluster()))
    {
        let cells = cells
            .iter()
            .map(|record| {
                let phase = record.fade_phase(now, fade_per_second);
                if phase <= 0.0 {
                    frame.lit += 1;
                } else if phase < 1.0 {
                    frame.fading += 1;
                }
                config.visual.shade(phase)
            })
            .collect();

        frame.instances.push(Instance {
            translation: topology.cluster_translation(cluster, config.visual.offset),
            cells,
        });
    }

    Some(frame)
}
