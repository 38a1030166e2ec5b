//! Learned rank dictionary: linear model, residual grid, bounded tail.

use std::borrow::Cow;

use crate::broadword::{self, WORD_LEN};
use crate::config::BuildConfig;
use crate::error::{Error, Result};
use crate::rank::BitRank;

/// Least-squares line `y ≈ a·x + b` fit to coarse rank samples.
///
/// The same `predict` is used when residuals are computed at build time
/// and when a query evaluates the model, so floating-point rounding
/// cancels and answers stay bit-exact against the block backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearModel {
    /// Slope of the fitted line.
    pub a: f64,
    /// Intercept of the fitted line.
    pub b: f64,
}

impl LinearModel {
    /// Fits a single line to the sample points by least squares.
    ///
    /// A degenerate sample set (fewer than two points, or all at the same
    /// x) collapses to a constant at the mean of the y values.
    pub fn fit(xs: &[u64], ys: &[u64]) -> Self {
        debug_assert_eq!(xs.len(), ys.len());
        let n = xs.len();
        if n == 0 {
            return Self { a: 0.0, b: 0.0 };
        }
        let mut sum_x = 0.0f64;
        let mut sum_y = 0.0f64;
        let mut sum_xy = 0.0f64;
        let mut sum_x2 = 0.0f64;
        for (&x, &y) in xs.iter().zip(ys) {
            let (x, y) = (x as f64, y as f64);
            sum_x += x;
            sum_y += y;
            sum_xy += x * y;
            sum_x2 += x * x;
        }
        let n = n as f64;
        let denom = n * sum_x2 - sum_x * sum_x;
        if denom.abs() < 1e-10 {
            Self {
                a: 0.0,
                b: sum_y / n,
            }
        } else {
            let a = (n * sum_xy - sum_x * sum_y) / denom;
            Self {
                a,
                b: (sum_y - a * sum_x) / n,
            }
        }
    }

    /// Predicts the rank at bit position `x`, rounded to the nearest
    /// integer. The prediction may be negative or overshoot; residuals
    /// absorb the error.
    #[inline(always)]
    pub fn predict(&self, x: u64) -> i64 {
        (self.a * x as f64 + self.b).round() as i64
    }
}

/// Learned rank dictionary.
///
/// A query decomposes `rank1(i)` into three parts:
///
/// 1. the model prediction at the containing coarse boundary
///    `p = predict(⌊i/S⌋·S)`,
/// 2. the stored residual `δ = residual[⌊i/S⌋·cols + ⌊(i mod S)/s⌋]`
///    restoring the exact rank at the containing micro boundary, and
/// 3. a tail popcount `t` over `[micro boundary, i)` touching at most the
///    configured word budget.
///
/// `p + δ` is exactly the rank at the micro boundary, so the result is
/// bit-exact against [`BlockRank`](crate::rank::BlockRank) for every `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct LearnedRank<'a> {
    len: usize,
    ones: usize,
    coarse: u32,
    micro: u32,
    tail_words: u32,
    model: LinearModel,
    words: Cow<'a, [u64]>,
    residuals: Cow<'a, [i32]>,
}

impl<'a> LearnedRank<'a> {
    /// Builds the model and residual grid over `len` bits packed in
    /// `words`. Strides must satisfy the [`BuildConfig`] divisibility
    /// rules.
    pub fn new(mut words: Vec<u64>, len: usize, config: &BuildConfig) -> Result<Self> {
        if len > u32::MAX as usize {
            return Err(Error::invalid_argument(format!(
                "bit sequence of {len} bits overflows the 32-bit residual grid"
            )));
        }
        words.resize(len.div_ceil(WORD_LEN), 0);
        broadword::mask_tail(&mut words, len);

        let coarse = config.coarse_stride as usize;
        let micro = config.micro_stride as usize;

        // Coarse samples (j·S, rank1(j·S)) for j = 0 ..= ⌈len/S⌉; the rank
        // clamps at the end of the sequence.
        let num_coarse = len.div_ceil(coarse);
        let mut xs = Vec::with_capacity(num_coarse + 1);
        let mut ys = Vec::with_capacity(num_coarse + 1);
        let mut running = 0usize;
        for j in 0..=num_coarse {
            xs.push((j * coarse) as u64);
            ys.push(running as u64);
            let start = j * coarse;
            if start < len {
                let end = (start + coarse).min(len);
                running += broadword::popcount_range(&words, start, end);
            }
        }
        let ones = running;
        let model = LinearModel::fit(&xs, &ys);

        // Residuals restore the exact rank at every micro boundary.
        let cols = coarse / micro;
        let mut residuals = vec![0i32; num_coarse * cols];
        let mut running = 0i64;
        for j in 0..num_coarse {
            let pred = model.predict((j * coarse) as u64);
            for m in 0..cols {
                let pos = j * coarse + m * micro;
                if pos >= len {
                    break;
                }
                residuals[j * cols + m] = (running - pred) as i32;
                let end = (pos + micro).min(len);
                running += broadword::popcount_range(&words, pos, end) as i64;
            }
        }

        Ok(Self {
            len,
            ones,
            coarse: config.coarse_stride,
            micro: config.micro_stride,
            tail_words: config.tail_popcount_words,
            model,
            words: Cow::Owned(words),
            residuals: Cow::Owned(residuals),
        })
    }

    /// Reattaches a dictionary over previously serialized storage.
    pub fn from_parts(
        words: Cow<'a, [u64]>,
        residuals: Cow<'a, [i32]>,
        len: usize,
        model: LinearModel,
        coarse: u32,
        micro: u32,
        tail_words: u32,
    ) -> Result<Self> {
        let cols = (coarse / micro) as usize;
        if words.len() != len.div_ceil(WORD_LEN)
            || residuals.len() != len.div_ceil(coarse as usize) * cols
        {
            return Err(Error::invalid_format(format!(
                "learned dictionary shape mismatch for {len} bits: {} words, {} residuals",
                words.len(),
                residuals.len()
            )));
        }
        let ones = broadword::popcount_range(&words, 0, len);
        Ok(Self {
            len,
            ones,
            coarse,
            micro,
            tail_words,
            model,
            words,
            residuals,
        })
    }

    /// Returns the packed bit words.
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Returns the residual grid.
    pub fn residuals(&self) -> &[i32] {
        &self.residuals
    }

    /// Returns the fitted model.
    pub fn model(&self) -> LinearModel {
        self.model
    }

    /// Masked popcount of the tail `[start, end)`.
    ///
    /// Stays within the word-touch budget for any validated stride
    /// geometry; a micro block wider than the budget (pathological
    /// configuration) loses the bound but keeps the answer, via a plain
    /// scan over the whole tail.
    fn tail_popcount(&self, start: usize, end: usize) -> usize {
        let first = start / WORD_LEN;
        let last = (end - 1) / WORD_LEN;
        if last - first >= self.tail_words as usize {
            return broadword::popcount_range(&self.words, start, end);
        }
        let mut count = broadword::popcount(self.words[first] >> (start % WORD_LEN));
        for &w in &self.words[first + 1..=last] {
            count += broadword::popcount(w);
        }
        let spill = (last + 1) * WORD_LEN - end;
        if spill != 0 {
            count -= broadword::popcount(self.words[last] >> (WORD_LEN - spill));
        }
        count
    }
}

impl BitRank for LearnedRank<'_> {
    fn from_words(words: Vec<u64>, len: usize, config: &BuildConfig) -> Result<Self> {
        Self::new(words, len, config)
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
        let coarse = self.coarse as usize;
        let micro = self.micro as usize;
        let j = i / coarse;
        let m = (i % coarse) / micro;
        let pred = self.model.predict((j * coarse) as u64);
        let delta = self.residuals[j * (coarse / micro) + m] as i64;
        let micro_start = j * coarse + m * micro;
        let tail = if i > micro_start {
            self.tail_popcount(micro_start, i) as i64
        } else {
            0
        };
        (pred + delta + tail).max(0) as usize
    }

    #[inline(always)]
    fn num_ones(&self) -> usize {
        self.ones
    }

    fn size_in_bytes(&self) -> usize {
        self.words.len() * 8
            + self.residuals.len() * 4
            + std::mem::size_of::<LinearModel>()
    }
}
