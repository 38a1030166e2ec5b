//! Binary wavelet tree over the byte alphabet.
//!
//! The tree is flattened into exactly eight bit planes, one per bit of the
//! byte code with level 0 holding the most significant bit. At each level
//! the sequence is stably partitioned on the preceding bit, so an interval
//! of the level-`ℓ` sequence maps onto the 0-child or 1-child interval of
//! the implicit node via two rank queries.
//!
//! `rank_sym(c, i)` costs 8 rank calls; `access(i)` costs 8 rank calls
//! plus 8 bit probes. The rank backend is pluggable through
//! [`BitRank`]; see [`crate::rank`].

use rayon::prelude::*;

use crate::broadword::{self, WORD_LEN};
use crate::config::BuildConfig;
use crate::error::{Error, Result};
use crate::rank::BitRank;

/// Number of bit planes: one per bit of a byte, MSB first.
pub const LEVELS: usize = 8;

/// Byte wavelet tree parameterized over its rank dictionary backend.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveletTree<R> {
    len: usize,
    levels: Vec<R>,
}

impl<R: BitRank> WaveletTree<R> {
    /// Builds the tree over a byte sequence.
    ///
    /// The partition passes are sequential; the per-level rank
    /// dictionaries are built in parallel once all planes are known.
    pub fn new(seq: &[u8], config: &BuildConfig) -> Result<Self> {
        let len = seq.len();
        let levels = bit_planes(seq)
            .into_par_iter()
            .map(|words| R::from_words(words, len, config))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { len, levels })
    }

    /// Assembles a tree from already-built level dictionaries, as the
    /// mmap loader does.
    pub fn from_levels(levels: Vec<R>, len: usize) -> Result<Self> {
        if levels.len() != LEVELS {
            return Err(Error::invalid_format(format!(
                "wavelet tree requires {LEVELS} levels, got {}",
                levels.len()
            )));
        }
        if let Some(bad) = levels.iter().find(|level| level.len() != len) {
            return Err(Error::invalid_format(format!(
                "wavelet level holds {} bits, expected {len}",
                bad.len()
            )));
        }
        Ok(Self { len, levels })
    }

    /// Returns the number of symbols stored.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Checks if the sequence is empty.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the per-level rank dictionaries, level 0 first.
    pub fn levels(&self) -> &[R] {
        &self.levels
    }

    /// Approximate heap footprint of all levels in bytes.
    pub fn size_in_bytes(&self) -> usize {
        self.levels.iter().map(|level| level.size_in_bytes()).sum()
    }

    /// Returns the number of occurrences of byte `c` in the prefix
    /// `[0, i)`; `i` past the end clamps to the sequence length.
    pub fn rank_sym(&self, c: u8, i: usize) -> usize {
        let mut start = 0usize;
        let mut end = i.min(self.len);
        if end == 0 {
            return 0;
        }
        for (level, bv) in self.levels.iter().enumerate() {
            if (c >> (LEVELS - 1 - level)) & 1 == 0 {
                start = bv.rank0(start);
                end = bv.rank0(end);
            } else {
                let zeros = bv.num_zeros();
                start = zeros + bv.rank1(start);
                end = zeros + bv.rank1(end);
            }
            if start >= end {
                return 0;
            }
        }
        end - start
    }

    /// Returns the symbol at position `i`, reconstructed bit by bit;
    /// positions past the end read as zero.
    pub fn access(&self, i: usize) -> u8 {
        if i >= self.len {
            return 0;
        }
        let mut pos = i;
        let mut sym = 0u8;
        for (level, bv) in self.levels.iter().enumerate() {
            if bv.get(pos) {
                sym |= 1 << (LEVELS - 1 - level);
                pos = bv.num_zeros() + bv.rank1(pos);
            } else {
                pos = bv.rank0(pos);
            }
        }
        sym
    }
}

/// Extracts the eight bit planes of `seq`, stably partitioning between
/// levels so plane `ℓ+1` reflects the reordering induced by plane `ℓ`.
fn bit_planes(seq: &[u8]) -> Vec<Vec<u64>> {
    let num_words = seq.len().div_ceil(WORD_LEN);
    let mut planes = Vec::with_capacity(LEVELS);
    let mut cur = seq.to_vec();
    let mut next = Vec::with_capacity(seq.len());
    for level in 0..LEVELS {
        let shift = LEVELS - 1 - level;
        let mut words = vec![0u64; num_words];
        for (i, &sym) in cur.iter().enumerate() {
            if (sym >> shift) & 1 == 1 {
                broadword::set_bit(&mut words, i);
            }
        }
        planes.push(words);
        if level + 1 < LEVELS {
            next.clear();
            next.extend(cur.iter().copied().filter(|&s| (s >> shift) & 1 == 0));
            next.extend(cur.iter().copied().filter(|&s| (s >> shift) & 1 == 1));
            std::mem::swap(&mut cur, &mut next);
        }
    }
    planes
}
