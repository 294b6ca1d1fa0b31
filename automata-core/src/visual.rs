//! # Visual Output Layout
//!
//! Every cell owns a fixed 3-float record in its partition's output batch:
//!
//! | offset | role            | value                                   |
//! |--------|-----------------|-----------------------------------------|
//! | 0      | `Current`       | 1.0 if alive now, else 0.0              |
//! | 1      | `Next`          | 1.0 if alive next step, else 0.0        |
//! | 2      | `SwitchOffTime` | when the fade starts; `STAYS_ON` = never |
//!
//! A record sits at `position_in_partition * PARAMS_PER_CELL`, in batch
//! `partition index`.
//!
//! [`InstanceBuffers`] is the in-memory sink: a host copies published
//! batches out of it into whatever the renderer consumes.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use bytemuck::{Pod, Zeroable};

use crate::partition::PartitionSet;
use crate::traits::VisualSink;
use crate::PARAMS_PER_CELL;

/// Position of a value inside a cell's record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum SlotRole {
    Current = 0,
    Next = 1,
    SwitchOffTime = 2,
}

/// Stable address of one visual parameter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotHandle {
    /// Output batch (= partition index)
    pub buffer: usize,
    /// Float offset inside the batch
    pub offset: usize,
}

/// One cell's record, laid out for upload
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct VisualParams {
    pub current: f32,
    pub next: f32,
    pub switch_off_time: f32,
}

impl VisualParams {
    /// Fade progress at `now`: 0 = fully lit, 1 = fully faded
    pub fn fade_phase(&self, now: f32, fade_per_second: f32) -> f32 {
        if self.switch_off_time == crate::STAYS_ON {
            return 0.0;
        }
        ((now - self.switch_off_time) * fade_per_second).clamp(0.0, 1.0)
    }
}

/// Batched output buffers owned by the host
pub struct InstanceBuffers {
    batches: Vec<Vec<AtomicU32>>,
    publish_counts: Vec<AtomicU64>,
    dirty: Vec<AtomicBool>,
}

impl InstanceBuffers {
    /// Buffers of the given float lengths, zero filled
    pub fn new(lens: &[usize]) -> Self {
        Self {
            batches: lens
                .iter()
                .map(|&len| (0..len).map(|_| AtomicU32::new(0)).collect())
                .collect(),
            publish_counts: lens.iter().map(|_| AtomicU64::new(0)).collect(),
            dirty: lens.iter().map(|_| AtomicBool::new(false)).collect(),
        }
    }

    /// One buffer per partition, sized for its cells
    pub fn for_partitions(partitions: &PartitionSet) -> Self {
        Self::new(&partitions.buffer_lens())
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    /// Current value of a slot (0.0 for unknown handles)
    pub fn read(&self, slot: SlotHandle) -> f32 {
        self.batches
            .get(slot.buffer)
            .and_then(|b| b.get(slot.offset))
            .map(|v| f32::from_bits(v.load(Ordering::Relaxed)))
            .unwrap_or(0.0)
    }

    /// Record of the cell at `position` in `batch`
    pub fn record(&self, batch: usize, position: usize) -> Option<VisualParams> {
        let slots = self.batches.get(batch)?;
        let base = position * PARAMS_PER_CELL;
        if base + PARAMS_PER_CELL > slots.len() {
            return None;
        }
        let at = |i: usize| f32::from_bits(slots[base + i].load(Ordering::Relaxed));
        Some(VisualParams {
            current: at(0),
            next: at(1),
            switch_off_time: at(2),
        })
    }

    /// Copy of every record in a batch
    pub fn records(&self, batch: usize) -> Vec<VisualParams> {
        let Some(slots) = self.batches.get(batch) else {
            return Vec::new();
        };
        (0..slots.len() / PARAMS_PER_CELL)
            .filter_map(|pos| self.record(batch, pos))
            .collect()
    }

    /// Raw bytes of a batch, ready for a GPU upload
    pub fn batch_bytes(&self, batch: usize) -> Vec<u8> {
        bytemuck::cast_slice(&self.records(batch)).to_vec()
    }

    /// How many times a batch has been published
    pub fn publish_count(&self, batch: usize) -> u64 {
        self.publish_counts
            .get(batch)
            .map(|c| c.load(Ordering::Acquire))
            .unwrap_or(0)
    }

    /// Batches published since the last call, clearing their flags
    pub fn take_dirty(&self) -> Vec<usize> {
        self.dirty
            .iter()
            .enumerate()
            .filter(|(_, flag)| flag.swap(false, Ordering::AcqRel))
            .map(|(batch, _)| batch)
            .collect()
    }
}

impl VisualSink for InstanceBuffers {
    fn write(&self, slot: SlotHandle, value: f32) {
        let target = self
            .batches
            .get(slot.buffer)
            .and_then(|b| b.get(slot.offset));
        debug_assert!(target.is_some(), "slot {:?} outside buffers", slot);
        if let Some(target) = target {
            target.store(value.to_bits(), Ordering::Relaxed);
        }
    }

    fn publish(&self, batch: usize) {
        if let Some(count) = self.publish_counts.get(batch) {
            count.fetch_add(1, Ordering::AcqRel);
        }
        if let Some(flag) = self.dirty.get(batch) {
            flag.store(true, Ordering::Release);
        }
    }
}

impl std::fmt::Debug for InstanceBuffers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceBuffers")
            .field(
                "batch_lens",
                &self.batches.iter().map(Vec::len).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::STAYS_ON;

    #[test]
    fn test_write_and_read_record() {
        let buffers = InstanceBuffers::new(&[6, 3]);
        buffers.write(SlotHandle { buffer: 0, offset: 3 }, 1.0);
        buffers.write(SlotHandle { buffer: 0, offset: 4 }, 0.0);
        buffers.write(SlotHandle { buffer: 0, offset: 5 }, STAYS_ON);

        let record = buffers.record(0, 1).unwrap();
        assert_eq!(record.current, 1.0);
        assert_eq!(record.switch_off_time, STAYS_ON);
        assert!(buffers.record(1, 1).is_none());
        assert_eq!(buffers.records(0).len(), 2);
    }

    #[test]
    fn test_publish_marks_dirty_once() {
        let buffers = InstanceBuffers::new(&[3, 3, 3]);
        buffers.publish(2);
        buffers.publish(0);
        buffers.publish(2);
        assert_eq!(buffers.publish_count(2), 2);
        assert_eq!(buffers.take_dirty(), vec![0, 2]);
        assert!(buffers.take_dirty().is_empty());
    }

    #[test]
    fn test_batch_bytes_layout() {
        let buffers = InstanceBuffers::new(&[6]);
        buffers.write(SlotHandle { buffer: 0, offset: 2 }, 4.0);
        let bytes = buffers.batch_bytes(0);
        assert_eq!(bytes.len(), 2 * std::mem::size_of::<VisualParams>());
        assert_eq!(&bytes[8..12], &4.0f32.to_ne_bytes());
    }

    #[test]
    fn test_fade_phase() {
        let on = VisualParams {
            current: 1.0,
            next: 1.0,
            switch_off_time: STAYS_ON,
        };
        assert_eq!(on.fade_phase(100.0, 1.0), 0.0);

        let fading = VisualParams {
            switch_off_time: 2.0,
            ..on
        };
        assert_eq!(fading.fade_phase(1.0, 0.5), 0.0);
        assert_eq!(fading.fade_phase(3.0, 0.5), 0.5);
        assert_eq!(fading.fade_phase(10.0, 0.5), 1.0);
    }
}
