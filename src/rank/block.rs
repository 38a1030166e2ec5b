//! Classic two-level block rank dictionary.

use std::borrow::Cow;

use crate::broadword::{self, WORD_LEN};
use crate::config::BuildConfig;
use crate::error::{Error, Result};
use crate::rank::BitRank;

/// Two-level sampled rank dictionary over a packed bit sequence.
///
/// Layout per the counter geometry `(super_bits, sub_bits)`:
///
/// - `words`: the raw bits, LSB-first within each 64-bit word;
/// - `supers[j]`: absolute `rank1(j * super_bits)` as `u32`;
/// - `subs[k]`: `rank1` at `k * sub_bits` relative to the containing
///   super-block, as `u16`.
///
/// `rank1(i)` is then one `u32` read, one `u16` read, and a masked
/// popcount over at most `sub_bits / 64` words.
///
/// Storage is [`Cow`]-backed: a built dictionary owns its arrays, while a
/// dictionary reattached from a memory-mapped index borrows them without
/// copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRank<'a> {
    len: usize,
    ones: usize,
    super_bits: u32,
    sub_bits: u32,
    words: Cow<'a, [u64]>,
    supers: Cow<'a, [u32]>,
    subs: Cow<'a, [u16]>,
}

impl BlockRank<'static> {
    /// Builds a dictionary over `len` bits packed LSB-first in `words`,
    /// using the default counter geometry.
    pub fn from_bits<I: IntoIterator<Item = bool>>(bits: I) -> Result<Self> {
        let (words, len) = broadword::pack_bits(bits);
        let config = BuildConfig::default();
        Self::new(words, len, config.super_block_bits, config.sub_block_bits)
    }
}

impl<'a> BlockRank<'a> {
    /// Builds the counter levels over `len` bits packed in `words`.
    ///
    /// The geometry must satisfy the [`BuildConfig`] divisibility rules.
    /// Any stray bits past `len` in the final word are cleared. Build is
    /// infallible for any bit content; only an oversized `len` is
    /// rejected, since the 32-bit super counters cap sequences below
    /// 2^32 bits.
    pub fn new(mut words: Vec<u64>, len: usize, super_bits: u32, sub_bits: u32) -> Result<Self> {
        if len > u32::MAX as usize {
            return Err(Error::invalid_argument(format!(
                "bit sequence of {len} bits overflows the 32-bit rank counters"
            )));
        }
        words.resize(len.div_ceil(WORD_LEN), 0);
        broadword::mask_tail(&mut words, len);
        let (supers, subs, ones) = build_counters(&words, len, super_bits, sub_bits);
        Ok(Self {
            len,
            ones,
            super_bits,
            sub_bits,
            words: Cow::Owned(words),
            supers: Cow::Owned(supers),
            subs: Cow::Owned(subs),
        })
    }

    /// Reattaches a dictionary over previously serialized storage.
    ///
    /// The counter arrays are trusted as written; only their shapes are
    /// checked against the geometry.
    pub fn from_parts(
        words: Cow<'a, [u64]>,
        supers: Cow<'a, [u32]>,
        subs: Cow<'a, [u16]>,
        len: usize,
        super_bits: u32,
        sub_bits: u32,
    ) -> Result<Self> {
        if words.len() != len.div_ceil(WORD_LEN)
            || supers.len() != len.div_ceil(super_bits as usize)
            || subs.len() != len.div_ceil(sub_bits as usize)
        {
            return Err(Error::invalid_format(format!(
                "rank dictionary shape mismatch for {len} bits: {} words, {} super, {} sub counters",
                words.len(),
                supers.len(),
                subs.len()
            )));
        }
        let ones = broadword::popcount_range(&words, 0, len);
        Ok(Self {
            len,
            ones,
            super_bits,
            sub_bits,
            words,
            supers,
            subs,
        })
    }

    /// Returns the packed bit words.
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Returns the absolute super-block counters.
    pub fn supers(&self) -> &[u32] {
        &self.supers
    }

    /// Returns the relative sub-block counters.
    pub fn subs(&self) -> &[u16] {
        &self.subs
    }
}

fn build_counters(
    words: &[u64],
    len: usize,
    super_bits: u32,
    sub_bits: u32,
) -> (Vec<u32>, Vec<u16>, usize) {
    let super_bits = super_bits as usize;
    let sub_bits = sub_bits as usize;
    let mut supers = Vec::with_capacity(len.div_ceil(super_bits));
    let mut subs = Vec::with_capacity(len.div_ceil(sub_bits));

    let mut absolute = 0usize;
    let mut super_start = 0usize;
    while super_start < len {
        supers.push(absolute as u32);
        let super_end = (super_start + super_bits).min(len);
        let mut relative = 0usize;
        let mut sub_start = super_start;
        while sub_start < super_end {
            subs.push(relative as u16);
            let sub_end = (sub_start + sub_bits).min(super_end);
            let ones = broadword::popcount_range(words, sub_start, sub_end);
            relative += ones;
            absolute += ones;
            sub_start = sub_end;
        }
        super_start += super_bits;
    }
    (supers, subs, absolute)
}

impl BitRank for BlockRank<'_> {
    fn from_words(words: Vec<u64>, len: usize, config: &BuildConfig) -> Result<Self> {
        Self::new(words, len, config.super_block_bits, config.sub_block_bits)
    }

    #[inline(always)]
    fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    fn get(&self, i: usize) -> bool {
        i < self.len && broadword::get_bit(&self.words, i)
    }

    #[inline]
    fn rank1(&self, i: usize) -> usize {
        if i == 0 {
            return 0;
        }
        if i >= self.len {
            return self.ones;
        }
        let sup = i / self.super_bits as usize;
        let sub = i / self.sub_bits as usize;
        let rank = self.supers[sup] as usize + self.subs[sub] as usize;
        rank + broadword::popcount_range(&self.words, sub * self.sub_bits as usize, i)
    }

    #[inline(always)]
    fn num_ones(&self) -> usize {
        self.ones
    }

    fn size_in_bytes(&self) -> usize {
        self.words.len() * 8 + self.supers.len() * 4 + self.subs.len() * 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaChaRng;

    fn random_bits(len: usize, density: f64, seed: u64) -> Vec<bool> {
        let mut rng = ChaChaRng::seed_from_u64(seed);
        (0..len).map(|_| rng.gen_bool(density)).collect()
    }

    fn check_against_naive(bits: &[bool], dict: &BlockRank<'_>) {
        let mut expected = 0usize;
        for i in 0..=bits.len() {
            assert_eq!(dict.rank1(i), expected, "rank1({i})");
            assert_eq!(dict.rank0(i), i - expected, "rank0({i})");
            if i < bits.len() {
                assert_eq!(dict.get(i), bits[i], "get({i})");
                if bits[i] {
                    expected += 1;
                }
            }
        }
        assert_eq!(dict.num_ones(), expected);
        assert_eq!(dict.rank1(bits.len() + 123), expected);
    }

    #[test]
    fn empty_sequence() {
        let dict = BlockRank::from_bits(std::iter::empty()).unwrap();
        assert_eq!(dict.len(), 0);
        assert_eq!(dict.rank1(0), 0);
        assert_eq!(dict.rank1(10), 0);
        assert!(!dict.get(0));
    }

    #[test]
    fn matches_naive_rank() {
        for (len, density, seed) in [
            (1, 0.5, 1),
            (63, 0.5, 2),
            (64, 0.9, 3),
            (65, 0.1, 4),
            (256, 0.5, 5),
            (2048, 0.3, 6),
            (2048 * 3 + 17, 0.5, 7),
            (10_000, 0.01, 8),
        ] {
            let bits = random_bits(len, density, seed);
            let dict = BlockRank::from_bits(bits.iter().copied()).unwrap();
            check_against_naive(&bits, &dict);
        }
    }

    #[test]
    fn all_ones_and_all_zeros() {
        let ones = BlockRank::from_bits(std::iter::repeat(true).take(5000)).unwrap();
        assert_eq!(ones.rank1(5000), 5000);
        assert_eq!(ones.rank1(2049), 2049);
        let zeros = BlockRank::from_bits(std::iter::repeat(false).take(5000)).unwrap();
        assert_eq!(zeros.rank1(5000), 0);
        assert_eq!(zeros.rank0(4999), 4999);
    }

    #[test]
    fn custom_geometry() {
        let bits = random_bits(4000, 0.5, 42);
        let (words, len) = broadword::pack_bits(bits.iter().copied());
        let dict = BlockRank::new(words, len, 512, 64).unwrap();
        check_against_naive(&bits, &dict);
    }

    #[test]
    fn stray_tail_bits_are_ignored() {
        // A caller may hand over words with garbage past `len`.
        let words = vec![u64::MAX; 2];
        let dict = BlockRank::new(words, 70, 2048, 256).unwrap();
        assert_eq!(dict.num_ones(), 70);
        assert_eq!(dict.rank1(70), 70);
    }

    #[test]
    fn from_parts_roundtrip() {
        let bits = random_bits(3000, 0.5, 9);
        let built = BlockRank::from_bits(bits.iter().copied()).unwrap();
        let reattached = BlockRank::from_parts(
            Cow::Borrowed(built.words()),
            Cow::Borrowed(built.supers()),
            Cow::Borrowed(built.subs()),
            3000,
            DEFAULT_SUPER,
            DEFAULT_SUB,
        )
        .unwrap();
        for i in (0..=3000).step_by(7) {
            assert_eq!(reattached.rank1(i), built.rank1(i));
        }
    }

    #[test]
    fn from_parts_rejects_shape_mismatch() {
        let built = BlockRank::from_bits(std::iter::repeat(true).take(100)).unwrap();
        let err = BlockRank::from_parts(
            Cow::Borrowed(built.words()),
            Cow::Borrowed(&[]),
            Cow::Borrowed(built.subs()),
            100,
            DEFAULT_SUPER,
            DEFAULT_SUB,
        );
        assert!(matches!(err, Err(Error::InvalidFormat(_))));
    }

    const DEFAULT_SUPER: u32 = crate::config::DEFAULT_SUPER_BLOCK_BITS;
    const DEFAULT_SUB: u32 = crate::config::DEFAULT_SUB_BLOCK_BITS;
}
