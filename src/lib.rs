//! # csidx
//!
//! A self-index over byte strings. Given a text of length $`n`$ over the
//! 256-symbol alphabet, csidx builds an FM-index — a Burrows-Wheeler
//! permutation of the text augmented with rank-capable succinct
//! structures and a sparse suffix-array sampling — and answers, in time
//! independent of $`n`$:
//!
//! - **count**: how many times a pattern occurs as a substring,
//! - **locate**: the text positions of those occurrences,
//! - **extract**: arbitrary substrings of the indexed text.
//!
//! ## Design policy
//!
//! - **One contract, two rank backends:** the wavelet tree is generic
//!   over the [`rank::BitRank`] capability. The classic two-level block
//!   dictionary and the experimental learned dictionary (linear model +
//!   residuals + bounded tail popcounts) are drop-in replacements for
//!   each other and answer bit-identically.
//! - **Immutable after build:** every structure is built in one pass and
//!   never mutated, so queries are pure `&self` functions and an index
//!   can be shared across threads freely.
//! - **Zero-copy reload:** the on-disk format is laid out so a read-only
//!   memory mapping serves queries directly; reattachment borrows typed
//!   slices into the mapping instead of copying payloads.
//!
//! ## Components
//!
//! | Module | Role |
//! | --- | --- |
//! | [`rank`] | bit-rank dictionaries (block and learned backends) |
//! | [`wavelet`] | byte wavelet tree over the BWT |
//! | [`suffix`] | SA-IS suffix sort, BWT, cumulative counts |
//! | [`ssa`] | sampled suffix array |
//! | [`fm`] | backward search, LF mapping, count/locate/extract |
//! | [`format`] | binary layout, writer, mmap loader, vEB packing |
//! | [`config`] | build parameters and validation |
//!
//! ## Example
//!
//! ```
//! use csidx::{BlockFmIndex, BuildConfig, FmIndex};
//!
//! # fn main() -> csidx::Result<()> {
//! let index: BlockFmIndex = FmIndex::build(b"banana$", &BuildConfig::default())?;
//! assert_eq!(index.count(b"ana"), 2);
//! let mut positions = index.locate(b"ana", 100)?;
//! positions.sort_unstable();
//! assert_eq!(positions, vec![1, 3]);
//! assert_eq!(index.extract(1, 3), b"ana");
//! # Ok(())
//! # }
//! ```
//!
//! ## Limitation
//!
//! This library is designed for 64-bit little-endian machines; texts must
//! stay below 2^32 bytes so positions fit the 32-bit sample and counter
//! arrays.

#[cfg(not(target_pointer_width = "64"))]
compile_error!("`target_pointer_width` must be 64");

#[cfg(target_endian = "big")]
compile_error!("the index format is little-endian; big-endian targets are unsupported");

pub mod broadword;
pub mod config;
pub mod error;
pub mod fm;
pub mod format;
pub mod rank;
pub mod ssa;
pub mod suffix;
pub mod wavelet;

pub use config::BuildConfig;
pub use error::{Error, Result};
pub use fm::{BlockFmIndex, FmIndex, LearnedFmIndex};
pub use format::{AnyIndex, MappedIndex};
pub use rank::{BitRank, BlockRank, LearnedRank};
pub use wavelet::WaveletTree;
