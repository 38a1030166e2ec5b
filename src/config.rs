//! Build-time configuration for index construction.
//!
//! All parameters are fixed before a build starts and recorded, where the
//! on-disk format allows, in the index file. The block-counter geometry is
//! a format-level constant in version 1; [`BuildConfig::validate`] enforces
//! the divisibility rules the counter layouts rely on.

use crate::error::{Error, Result};

/// Default suffix-array sampling stride.
pub const DEFAULT_SSA_STRIDE: u32 = 32;

/// Default super-block period of the block rank dictionary, in bits.
pub const DEFAULT_SUPER_BLOCK_BITS: u32 = 2048;

/// Default sub-block period of the block rank dictionary, in bits.
pub const DEFAULT_SUB_BLOCK_BITS: u32 = 256;

/// Default coarse sample period of the learned rank dictionary, in bits.
pub const DEFAULT_COARSE_STRIDE: u32 = 512;

/// Default micro residual period of the learned rank dictionary, in bits.
pub const DEFAULT_MICRO_STRIDE: u32 = 64;

/// Default cap on words a learned tail popcount may touch.
pub const DEFAULT_TAIL_POPCOUNT_WORDS: u32 = 2;

/// Parameters controlling how an index is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    /// Suffix-array sampling period: every `ssa_stride`-th SA row is stored.
    pub ssa_stride: u32,
    /// Absolute rank counter period of the block dictionary, in bits.
    pub super_block_bits: u32,
    /// Relative rank counter period of the block dictionary, in bits.
    pub sub_block_bits: u32,
    /// Coarse sample period of the learned dictionary, in bits.
    pub coarse_stride: u32,
    /// Micro residual period of the learned dictionary, in bits.
    pub micro_stride: u32,
    /// Word-touch budget for the learned tail popcount.
    pub tail_popcount_words: u32,
    /// Selects the learned rank backend over the block backend.
    pub use_learned_occ: bool,
    /// Packs serialized wavelet levels in cache-oblivious vEB order.
    pub use_veb_layout: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            ssa_stride: DEFAULT_SSA_STRIDE,
            super_block_bits: DEFAULT_SUPER_BLOCK_BITS,
            sub_block_bits: DEFAULT_SUB_BLOCK_BITS,
            coarse_stride: DEFAULT_COARSE_STRIDE,
            micro_stride: DEFAULT_MICRO_STRIDE,
            tail_popcount_words: DEFAULT_TAIL_POPCOUNT_WORDS,
            use_learned_occ: false,
            use_veb_layout: true,
        }
    }
}

impl BuildConfig {
    /// Checks the divisibility and non-zero constraints the counter layouts
    /// depend on, returning [`Error::InvalidArgument`] on the first
    /// violation.
    pub fn validate(&self) -> Result<()> {
        if self.ssa_stride == 0 {
            return Err(Error::invalid_argument("ssa_stride must be at least 1"));
        }
        if self.sub_block_bits == 0 || self.sub_block_bits % 64 != 0 {
            return Err(Error::invalid_argument(format!(
                "sub_block_bits must be a positive multiple of 64, got {}",
                self.sub_block_bits
            )));
        }
        if self.super_block_bits == 0 || self.super_block_bits % self.sub_block_bits != 0 {
            return Err(Error::invalid_argument(format!(
                "super_block_bits ({}) must be a positive multiple of sub_block_bits ({})",
                self.super_block_bits, self.sub_block_bits
            )));
        }
        if self.super_block_bits > 1 << 16 {
            return Err(Error::invalid_argument(format!(
                "super_block_bits ({}) overflows the 16-bit sub counters",
                self.super_block_bits
            )));
        }
        if self.micro_stride == 0
            || self.coarse_stride == 0
            || self.coarse_stride % self.micro_stride != 0
        {
            return Err(Error::invalid_argument(format!(
                "coarse_stride ({}) must be a positive multiple of micro_stride ({})",
                self.coarse_stride, self.micro_stride
            )));
        }
        if self.tail_popcount_words == 0 {
            return Err(Error::invalid_argument(
                "tail_popcount_words must be at least 1",
            ));
        }
        Ok(())
    }

    /// Whether the block counter geometry matches the format-v1 defaults.
    pub fn has_default_geometry(&self) -> bool {
        self.super_block_bits == DEFAULT_SUPER_BLOCK_BITS
            && self.sub_block_bits == DEFAULT_SUB_BLOCK_BITS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(BuildConfig::default().validate().is_ok());
        assert!(BuildConfig::default().has_default_geometry());
    }

    #[test]
    fn rejects_zero_stride() {
        let cfg = BuildConfig {
            ssa_stride: 0,
            ..BuildConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn rejects_non_word_sub_block() {
        let cfg = BuildConfig {
            sub_block_bits: 100,
            ..BuildConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_indivisible_super_block() {
        let cfg = BuildConfig {
            super_block_bits: 1000,
            ..BuildConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_indivisible_strides() {
        let cfg = BuildConfig {
            coarse_stride: 500,
            micro_stride: 64,
            ..BuildConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn custom_geometry_is_flagged() {
        let cfg = BuildConfig {
            super_block_bits: 4096,
            ..BuildConfig::default()
        };
        assert!(cfg.validate().is_ok());
        assert!(!cfg.has_default_geometry());
    }
}
