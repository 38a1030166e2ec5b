//! FM-index search engine: backward search, LF mapping, locate, extract.

use std::borrow::Cow;
use std::ops::Range;

use crate::config::BuildConfig;
use crate::error::{Error, Result};
use crate::rank::{BitRank, BlockRank, LearnedRank};
use crate::ssa::SampledSuffixArray;
use crate::suffix;
use crate::wavelet::WaveletTree;

/// FM-index over the classic block-rank backend.
pub type BlockFmIndex<'a> = FmIndex<'a, BlockRank<'a>>;

/// FM-index over the learned rank backend.
pub type LearnedFmIndex<'a> = FmIndex<'a, LearnedRank<'a>>;

/// A self-index over a byte text.
///
/// Holds the cumulative count table `C`, a wavelet tree over the BWT, the
/// sampled suffix array, and the retained text and BWT bytes. All state is
/// immutable after construction, so queries are pure `&self` functions and
/// any number of threads may share one index without synchronization.
///
/// The BWT is well-defined only when the text ends in a unique
/// lexicographically smallest byte; the engine does not enforce this, but
/// `locate` detects the resulting inconsistency and reports it as
/// corruption rather than looping.
#[derive(Debug, Clone)]
pub struct FmIndex<'a, R> {
    n: usize,
    text: Cow<'a, [u8]>,
    bwt: Cow<'a, [u8]>,
    c: Cow<'a, [u32]>,
    wavelet: WaveletTree<R>,
    ssa: SampledSuffixArray<'a>,
}

impl<'a, R: BitRank> FmIndex<'a, R> {
    /// Builds an index over `text`.
    ///
    /// Append a unique smallest sentinel byte (conventionally `$`) to the
    /// text first; see the type-level note.
    pub fn build(text: &[u8], config: &BuildConfig) -> Result<Self> {
        config.validate()?;
        let n = text.len();
        let sa = suffix::suffix_array(text)?;
        let bwt = suffix::bwt_from_sa(text, &sa);
        let c = suffix::c_table(&bwt);
        let wavelet = WaveletTree::new(&bwt, config)?;
        let ssa = SampledSuffixArray::from_sa(&sa, config.ssa_stride)?;
        Ok(Self {
            n,
            text: Cow::Owned(text.to_vec()),
            bwt: Cow::Owned(bwt),
            c: Cow::Owned(c),
            wavelet,
            ssa,
        })
    }

    /// Assembles an index from already-built parts, as the mmap loader
    /// does. Shapes are cross-checked; contents are trusted.
    pub fn from_parts(
        text: Cow<'a, [u8]>,
        bwt: Cow<'a, [u8]>,
        c: Cow<'a, [u32]>,
        wavelet: WaveletTree<R>,
        ssa: SampledSuffixArray<'a>,
    ) -> Result<Self> {
        let n = text.len();
        if bwt.len() != n || wavelet.len() != n {
            return Err(Error::invalid_format(format!(
                "text ({n}), BWT ({}) and wavelet ({}) lengths disagree",
                bwt.len(),
                wavelet.len()
            )));
        }
        if c.len() != 257 || c[256] as usize != n {
            return Err(Error::invalid_format(
                "cumulative count table is not a 257-entry table summing to the text length",
            ));
        }
        let expected_samples = n.div_ceil(ssa.stride() as usize);
        if ssa.samples().len() != expected_samples {
            return Err(Error::invalid_format(format!(
                "{} suffix samples stored, expected {expected_samples}",
                ssa.samples().len()
            )));
        }
        Ok(Self {
            n,
            text,
            bwt,
            c,
            wavelet,
            ssa,
        })
    }

    /// Returns the indexed text length.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.n
    }

    /// Checks if the indexed text is empty.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Returns the retained text.
    pub fn text(&self) -> &[u8] {
        &self.text
    }

    /// Returns the BWT bytes.
    pub fn bwt(&self) -> &[u8] {
        &self.bwt
    }

    /// Returns the cumulative count table.
    pub fn c_table(&self) -> &[u32] {
        &self.c
    }

    /// Returns the wavelet tree over the BWT.
    pub fn wavelet(&self) -> &WaveletTree<R> {
        &self.wavelet
    }

    /// Returns the sampled suffix array.
    pub fn ssa(&self) -> &SampledSuffixArray<'a> {
        &self.ssa
    }

    /// Number of occurrences of byte `c` in `bwt[0 .. i)`.
    #[inline(always)]
    pub fn occ(&self, c: u8, i: usize) -> usize {
        self.wavelet.rank_sym(c, i)
    }

    /// Last-to-first mapping: `LF(i) = C[bwt[i]] + occ(bwt[i], i)`.
    ///
    /// Iterating LF walks the text backwards one byte at a time. Rows past
    /// the end map to 0, mirroring the clamped rank queries.
    #[inline]
    pub fn lf(&self, i: usize) -> usize {
        if i >= self.n {
            return 0;
        }
        let b = self.bwt[i];
        self.c[b as usize] as usize + self.occ(b, i)
    }

    /// Backward search: the half-open BWT row interval whose suffixes
    /// start with `pattern`. The empty pattern yields the full interval;
    /// a vanished interval is reported as `0..0`.
    pub fn search_range(&self, pattern: &[u8]) -> Range<usize> {
        let mut start = 0usize;
        let mut end = self.n;
        for &b in pattern.iter().rev() {
            let base = self.c[b as usize] as usize;
            start = base + self.occ(b, start);
            end = base + self.occ(b, end);
            if start >= end {
                return 0..0;
            }
        }
        start..end
    }

    /// Counts occurrences of `pattern` in the text.
    ///
    /// The empty pattern counts `n` occurrences, matching every row of the
    /// BWT matrix; this mirrors the behavior existing callers rely on.
    pub fn count(&self, pattern: &[u8]) -> usize {
        self.search_range(pattern).len()
    }

    /// Whether `pattern` occurs in the text.
    pub fn contains(&self, pattern: &[u8]) -> bool {
        !self.search_range(pattern).is_empty()
    }

    /// Text positions of up to `limit` occurrences of `pattern`.
    ///
    /// Positions are emitted in BWT row order, not text order; callers
    /// wanting sorted positions must sort. Each row walks LF backwards to
    /// a sampled row; a walk that runs for `n` steps without reaching one
    /// means the index is corrupted (or the text lacked a sentinel) and
    /// fails hard.
    pub fn locate(&self, pattern: &[u8], limit: usize) -> Result<Vec<usize>> {
        let mut positions = Vec::new();
        if pattern.is_empty() || self.n == 0 {
            return Ok(positions);
        }
        let range = self.search_range(pattern);
        positions.reserve(range.len().min(limit));
        for row in range {
            if positions.len() >= limit {
                break;
            }
            positions.push(self.resolve_row(row)?);
        }
        Ok(positions)
    }

    /// Extracts `text[pos .. min(pos + len, n))` from the retained text.
    pub fn extract(&self, pos: usize, len: usize) -> &[u8] {
        if pos >= self.n {
            return &[];
        }
        &self.text[pos..pos.saturating_add(len).min(self.n)]
    }

    /// Lazily enumerates the positions of `pattern`, resolving one BWT
    /// row per step. No result buffer is allocated; each item is the
    /// resolved position, or the corruption error a broken LF walk
    /// raises.
    pub fn locate_iter<'s>(&'s self, pattern: &[u8]) -> LocateIter<'s, 'a, R> {
        let range = if pattern.is_empty() {
            0..0
        } else {
            self.search_range(pattern)
        };
        LocateIter { index: self, range }
    }

    /// Approximate heap footprint of the index in bytes.
    pub fn size_in_bytes(&self) -> usize {
        self.text.len()
            + self.bwt.len()
            + self.c.len() * std::mem::size_of::<u32>()
            + self.wavelet.size_in_bytes()
            + self.ssa.size_in_bytes()
    }

    fn resolve_row(&self, row: usize) -> Result<usize> {
        let mut walked = row;
        let mut steps = 0usize;
        while !self.ssa.is_sampled(walked) {
            walked = self.lf(walked);
            steps += 1;
            if steps >= self.n {
                return Err(Error::corrupted(
                    "LF walk overran the text length; was the text indexed without a sentinel?",
                ));
            }
        }
        let sample = self.ssa.sample_at(walked)? as usize;
        Ok((sample + steps) % self.n)
    }
}

/// Lazy position iterator created by [`FmIndex::locate_iter`].
pub struct LocateIter<'s, 'a, R> {
    index: &'s FmIndex<'a, R>,
    range: Range<usize>,
}

impl<R: BitRank> Iterator for LocateIter<'_, '_, R> {
    type Item = Result<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.range.next()?;
        Some(self.index.resolve_row(row))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.range.len(), Some(self.range.len()))
    }
}

impl<R: BitRank> ExactSizeIterator for LocateIter<'_, '_, R> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(text: &[u8]) -> BlockFmIndex<'static> {
        FmIndex::build(text, &BuildConfig::default()).unwrap()
    }

    fn build_stride(text: &[u8], stride: u32) -> BlockFmIndex<'static> {
        let config = BuildConfig {
            ssa_stride: stride,
            ..BuildConfig::default()
        };
        FmIndex::build(text, &config).unwrap()
    }

    fn sorted_locate<R: BitRank>(idx: &FmIndex<'_, R>, pattern: &[u8]) -> Vec<usize> {
        let mut positions = idx.locate(pattern, usize::MAX).unwrap();
        positions.sort_unstable();
        positions
    }

    #[test]
    fn banana_scenarios() {
        let idx = build_stride(b"banana$", 2);
        assert_eq!(idx.count(b"ana"), 2);
        assert_eq!(sorted_locate(&idx, b"ana"), vec![1, 3]);
        assert_eq!(idx.count(b"a"), 3);
        assert_eq!(sorted_locate(&idx, b"a"), vec![1, 3, 5]);
        assert_eq!(idx.count(b"banana$"), 1);
        assert!(idx.contains(b"nan"));
        assert!(!idx.contains(b"nab"));
    }

    #[test]
    fn empty_pattern_counts_every_row() {
        let idx = build(b"hello$");
        assert_eq!(idx.count(b""), 6);
        assert_eq!(idx.locate(b"", 10).unwrap(), Vec::<usize>::new());
        let empty = build(b"");
        assert_eq!(empty.count(b""), 0);
    }

    #[test]
    fn pattern_longer_than_text() {
        let idx = build(b"ab$");
        assert_eq!(idx.count(b"abcabc"), 0);
        assert!(idx.locate(b"abcabc", 10).unwrap().is_empty());
    }

    #[test]
    fn absent_byte() {
        let idx = build(b"abcdefg$");
        assert_eq!(idx.count(b"xyz"), 0);
        assert_eq!(idx.count(b"\xff"), 0);
    }

    #[test]
    fn single_byte_text() {
        let idx = build(b"$");
        assert_eq!(idx.count(b"$"), 1);
        assert_eq!(sorted_locate(&idx, b"$"), vec![0]);
        assert_eq!(idx.count(b"a"), 0);
    }

    #[test]
    fn repeated_byte_text() {
        let idx = build_stride(b"aaaaaaa$", 3);
        assert_eq!(idx.count(b"aa"), 6);
        assert_eq!(sorted_locate(&idx, b"aa"), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(idx.count(b"aaaaaaa"), 1);
    }

    #[test]
    fn locate_iter_matches_locate() {
        let idx = build_stride(b"abababab$", 2);
        let eager = idx.locate(b"ab", usize::MAX).unwrap();
        let lazy: Vec<usize> = idx
            .locate_iter(b"ab")
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(lazy, eager);
        assert_eq!(idx.locate_iter(b"ab").len(), 4);
        assert_eq!(idx.locate_iter(b"").count(), 0);
        assert_eq!(idx.locate_iter(b"zz").count(), 0);
    }

    #[test]
    fn size_report_is_plausible() {
        let idx = build(b"the quick brown fox$");
        let bytes = idx.size_in_bytes();
        // Text + BWT + C table alone account for 2n + 1028 bytes.
        assert!(bytes > 2 * idx.len() + 1028);
    }

    #[test]
    fn locate_respects_limit() {
        let idx = build_stride(b"abababab$", 2);
        assert_eq!(idx.locate(b"ab", 2).unwrap().len(), 2);
        assert_eq!(idx.locate(b"ab", 100).unwrap().len(), 4);
    }

    #[test]
    fn learned_backend_agrees() {
        let config = BuildConfig {
            use_learned_occ: true,
            ssa_stride: 4,
            ..BuildConfig::default()
        };
        let block = build_stride(b"abracadabra$", 4);
        let learned: LearnedFmIndex = FmIndex::build(b"abracadabra$", &config).unwrap();
        for pattern in [&b"abra"[..], b"a", b"cad", b"zz", b""] {
            assert_eq!(block.count(pattern), learned.count(pattern));
        }
        assert_eq!(sorted_locate(&block, b"abra"), sorted_locate(&learned, b"abra"));
    }

    #[test]
    fn extract_substrings() {
        let idx = build(b"the quick brown fox$");
        assert_eq!(idx.extract(4, 5), b"quick");
        assert_eq!(idx.extract(16, 100), b"fox$");
        assert_eq!(idx.extract(999, 5), b"");
        assert_eq!(idx.extract(0, 0), b"");
        assert_eq!(idx.extract(18, usize::MAX), b"x$");
    }

    #[test]
    fn lf_walks_text_backwards() {
        let text = b"banana$";
        let idx = build(text);
        // Starting from the sentinel row, iterated LF visits the BWT
        // bytes in reverse text order.
        let mut row = 0usize;
        let mut collected = Vec::new();
        for _ in 0..text.len() {
            collected.push(idx.bwt()[row]);
            row = idx.lf(row);
        }
        let mut expected = text[..text.len() - 1].to_vec();
        expected.reverse();
        expected.push(b'$');
        assert_eq!(collected, expected);
    }

    #[test]
    fn missing_sentinel_is_reported_not_looped() {
        // "aaa" has no unique smallest suffix terminator; the LF cycle
        // collapses and the walk guard must fire instead of spinning.
        let idx = build_stride(b"aaa", 32);
        match idx.locate(b"a", 10) {
            Err(Error::Corrupted(_)) => {}
            other => panic!("expected corruption, got {other:?}"),
        }
    }
}
