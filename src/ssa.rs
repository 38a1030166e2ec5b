//! Sampled suffix array.
//!
//! Stores `SA[k·stride]` for every `k`; `locate` walks LF back to a
//! stride-aligned row before consulting a sample, then adds the number of
//! steps walked.

use std::borrow::Cow;

use crate::error::{Error, Result};

/// Suffix-array samples at stride-aligned rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampledSuffixArray<'a> {
    stride: u32,
    samples: Cow<'a, [u32]>,
}

impl<'a> SampledSuffixArray<'a> {
    /// Samples a full suffix array at every `stride`-th row.
    pub fn from_sa(sa: &[u32], stride: u32) -> Result<Self> {
        if stride == 0 {
            return Err(Error::invalid_argument("ssa_stride must be at least 1"));
        }
        let samples: Vec<u32> = sa.iter().step_by(stride as usize).copied().collect();
        Ok(Self {
            stride,
            samples: Cow::Owned(samples),
        })
    }

    /// Reattaches samples from previously serialized storage.
    pub fn from_parts(samples: Cow<'a, [u32]>, stride: u32) -> Result<Self> {
        if stride == 0 {
            return Err(Error::invalid_format("ssa stride of zero"));
        }
        Ok(Self { stride, samples })
    }

    /// Returns the sampling stride.
    #[inline(always)]
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Returns the stored samples.
    pub fn samples(&self) -> &[u32] {
        &self.samples
    }

    /// Approximate heap footprint of the samples in bytes.
    pub fn size_in_bytes(&self) -> usize {
        self.samples.len() * std::mem::size_of::<u32>()
    }

    /// Whether row `i` carries a sample.
    #[inline(always)]
    pub fn is_sampled(&self, i: usize) -> bool {
        i % self.stride as usize == 0
    }

    /// Returns `SA[i]` for a stride-aligned row `i`.
    ///
    /// Callers must walk to a sampled row first; a slot outside the stored
    /// range signals a corrupted index.
    pub fn sample_at(&self, i: usize) -> Result<u32> {
        debug_assert!(self.is_sampled(i));
        let slot = i / self.stride as usize;
        self.samples.get(slot).copied().ok_or_else(|| {
            Error::corrupted(format!(
                "suffix sample slot {slot} out of range ({} stored)",
                self.samples.len()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_every_stride() {
        let sa: Vec<u32> = vec![6, 5, 3, 1, 0, 4, 2];
        let ssa = SampledSuffixArray::from_sa(&sa, 2).unwrap();
        assert_eq!(ssa.samples(), &[6, 3, 0, 2]);
        assert_eq!(ssa.sample_at(0).unwrap(), 6);
        assert_eq!(ssa.sample_at(4).unwrap(), 0);
        assert!(ssa.is_sampled(6));
        assert!(!ssa.is_sampled(3));
    }

    #[test]
    fn stride_one_keeps_everything() {
        let sa: Vec<u32> = vec![2, 1, 0];
        let ssa = SampledSuffixArray::from_sa(&sa, 1).unwrap();
        assert_eq!(ssa.samples(), &[2, 1, 0]);
    }

    #[test]
    fn rejects_zero_stride() {
        assert!(SampledSuffixArray::from_sa(&[0], 0).is_err());
    }

    #[test]
    fn out_of_range_slot_is_corruption() {
        let ssa = SampledSuffixArray::from_parts(Cow::Borrowed(&[7u32]), 4).unwrap();
        assert_eq!(ssa.sample_at(0).unwrap(), 7);
        assert!(matches!(ssa.sample_at(4), Err(Error::Corrupted(_))));
    }
}
