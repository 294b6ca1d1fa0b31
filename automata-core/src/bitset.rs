//! # Atomic Bitset
//!
//! Compact per-cell booleans that worker threads may set concurrently.
//!
//! Bit layout: cell `i` lives in word `i / 64`, bit `i % 64`.
//!
//! All atomic accesses are `Relaxed`. Cross-thread visibility comes from
//! the cascade join (a happens-before edge) rather than from the bits
//! themselves, and every concurrent write in a step is idempotent.

use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;

const WORD_BITS: usize = 64;

/// Fixed-length bitset with atomic words
#[derive(Debug)]
pub struct AtomicBitSet {
    words: Vec<AtomicU64>,
    len: usize,
}

impl AtomicBitSet {
    /// Create a bitset of `len` bits, all set to `value`
    pub fn new(len: usize, value: bool) -> Self {
        let fill = if value { u64::MAX } else { 0 };
        let word_count = len.div_ceil(WORD_BITS);
        let mut set = Self {
            words: (0..word_count).map(|_| AtomicU64::new(fill)).collect(),
            len,
        };
        set.clear_padding();
        set
    }

    /// Build from a slice of booleans
    pub fn from_bools(bits: &[bool]) -> Self {
        let set = Self::new(bits.len(), false);
        for (i, &bit) in bits.iter().enumerate() {
            if bit {
                set.set(i);
            }
        }
        set
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn get(&self, index: usize) -> bool {
        debug_assert!(index < self.len, "bit {} out of range {}", index, self.len);
        let word = self.words[index / WORD_BITS].load(Ordering::Relaxed);
        word & (1 << (index % WORD_BITS)) != 0
    }

    /// Set a bit to 1
    #[inline]
    pub fn set(&self, index: usize) {
        debug_assert!(index < self.len, "bit {} out of range {}", index, self.len);
        self.words[index / WORD_BITS].fetch_or(1 << (index % WORD_BITS), Ordering::Relaxed);
    }

    /// Set a bit to 0
    #[inline]
    pub fn reset(&self, index: usize) {
        debug_assert!(index < self.len, "bit {} out of range {}", index, self.len);
        self.words[index / WORD_BITS].fetch_and(!(1 << (index % WORD_BITS)), Ordering::Relaxed);
    }

    #[inline]
    pub fn assign(&self, index: usize, value: bool) {
        if value {
            self.set(index);
        } else {
            self.reset(index);
        }
    }

    /// Set every bit to `value`
    pub fn fill(&mut self, value: bool) {
        let fill = if value { u64::MAX } else { 0 };
        self.words.par_iter_mut().for_each(|w| *w.get_mut() = fill);
        self.clear_padding();
    }

    /// Overwrite this set with the contents of `other`
    pub fn copy_from(&mut self, other: &AtomicBitSet) {
        assert_eq!(self.len, other.len, "bitset length mismatch");
        self.words
            .par_iter_mut()
            .zip(other.words.par_iter())
            .for_each(|(dst, src)| *dst.get_mut() = src.load(Ordering::Relaxed));
    }

    /// Number of set bits
    pub fn count_ones(&self) -> usize {
        self.words
            .par_iter()
            .map(|w| w.load(Ordering::Relaxed).count_ones() as usize)
            .sum()
    }

    /// Iterate over the indices of set bits
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(w, word)| {
            let mut bits = word.load(Ordering::Relaxed);
            std::iter::from_fn(move || {
                if bits == 0 {
                    return None;
                }
                let tz = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                Some(w * WORD_BITS + tz)
            })
        })
    }

    pub fn to_bools(&self) -> Vec<bool> {
        (0..self.len).map(|i| self.get(i)).collect()
    }

    // Bits past `len` in the last word stay zero so word-level counts are exact
    fn clear_padding(&mut self) {
        let tail = self.len % WORD_BITS;
        if tail != 0 {
            if let Some(last) = self.words.last_mut() {
                *last.get_mut() &= (1u64 << tail) - 1;
            }
        }
    }
}

impl Clone for AtomicBitSet {
    fn clone(&self) -> Self {
        Self {
            words: self
                .words
                .iter()
                .map(|w| AtomicU64::new(w.load(Ordering::Relaxed)))
                .collect(),
            len: self.len,
        }
    }
}
