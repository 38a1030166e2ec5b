//! Memory-mapped index loading.
//!
//! [`MappedIndex`] owns the read-only mapping and validates the layout
//! invariants once at open time: magic, exact version, monotonically
//! placed in-range section offsets, and the footer sentinel. Section
//! accessors hand out typed slices pointing straight into the mapping;
//! [`MappedIndex::index`] reassembles a queryable [`FmIndex`] that
//! borrows the mapping without copying any payload.
//!
//! The file handle and mapping are released when the value drops,
//! including on every error path.

use std::borrow::Cow;
use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::config::{
    DEFAULT_SUB_BLOCK_BITS, DEFAULT_SUPER_BLOCK_BITS, DEFAULT_TAIL_POPCOUNT_WORDS,
};
use crate::error::{Error, Result};
use crate::fm::{BlockFmIndex, FmIndex, LearnedFmIndex};
use crate::format::{
    section, veb, view_slice, Header, FLAG_LEARNED_OCC, FLAG_VEB_LAYOUT, FOOTER_SENTINEL,
    HEADER_LEN,
};
use crate::rank::learned::LinearModel;
use crate::rank::{BlockRank, LearnedRank};
use crate::ssa::SampledSuffixArray;
use crate::wavelet::{WaveletTree, LEVELS};

/// A read-only memory mapping of an index file.
pub struct MappedIndex {
    mmap: Mmap,
    header: Header,
}

impl MappedIndex {
    /// Maps `path` read-only and validates the file layout.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        let header = Header::decode(&mmap)?;

        let mut prev = HEADER_LEN as u64;
        for id in section::TEXT..=section::FOOTER {
            let offset = header.offsets[id];
            if offset == 0 {
                if id == section::VEB {
                    continue;
                }
                return Err(Error::invalid_format(format!(
                    "missing section {id} offset"
                )));
            }
            let in_range = offset
                .checked_add(8)
                .is_some_and(|end| end <= mmap.len() as u64);
            if offset < prev || !in_range {
                return Err(Error::invalid_format(format!(
                    "section {id} offset {offset} is out of range or not monotone"
                )));
            }
            prev = offset + 8;
        }

        let footer = header.offsets[section::FOOTER] as usize;
        let sentinel = u64::from_le_bytes(mmap[footer..footer + 8].try_into().unwrap());
        if sentinel != FOOTER_SENTINEL {
            return Err(Error::invalid_format("bad footer sentinel"));
        }

        Ok(Self { mmap, header })
    }

    /// Returns the parsed header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Whether the given feature flag bit is set.
    pub fn has_flag(&self, flag: u32) -> bool {
        self.header.flags & flag != 0
    }

    /// Length of the indexed text.
    pub fn text_len(&self) -> usize {
        self.header.text_len as usize
    }

    fn bytes_at(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let end = offset
            .checked_add(len)
            .filter(|&end| end <= self.mmap.len())
            .ok_or_else(|| {
                Error::invalid_format(format!(
                    "section payload [{offset}, +{len}) runs past the {}-byte file",
                    self.mmap.len()
                ))
            })?;
        Ok(&self.mmap[offset..end])
    }

    fn read_u64(&self, offset: usize) -> Result<u64> {
        let bytes = self.bytes_at(offset, 8)?;
        Ok(u64::from_le_bytes(bytes.try_into().unwrap()))
    }

    /// Reads a count-prefixed typed array, returning the slice and the
    /// offset just past its payload.
    fn array_at<T>(&self, offset: usize) -> Result<(&[T], usize)>
    where
        T: FromBytes + Immutable + KnownLayout,
    {
        let count = self.read_u64(offset)? as usize;
        let len = count
            .checked_mul(std::mem::size_of::<T>())
            .ok_or_else(|| Error::invalid_format("array count overflow"))?;
        let bytes = self.bytes_at(offset + 8, len)?;
        Ok((view_slice(bytes)?, offset + 8 + len))
    }

    /// The retained text section.
    pub fn text(&self) -> Result<&[u8]> {
        let (text, _) = self.array_at::<u8>(self.header.offsets[section::TEXT] as usize)?;
        Ok(text)
    }

    /// The BWT section.
    pub fn bwt(&self) -> Result<&[u8]> {
        let (bwt, _) = self.array_at::<u8>(self.header.offsets[section::BWT] as usize)?;
        Ok(bwt)
    }

    /// The cumulative count table section.
    pub fn c_array(&self) -> Result<&[u32]> {
        let (c, _) = self.array_at::<u32>(self.header.offsets[section::C_ARRAY] as usize)?;
        Ok(c)
    }

    /// The suffix-sample section: stride and samples.
    pub fn ssa(&self) -> Result<(u32, &[u32])> {
        let offset = self.header.offsets[section::SSA] as usize;
        let stride = u32::from_le_bytes(self.bytes_at(offset, 4)?.try_into().unwrap());
        let (samples, _) = self.array_at::<u32>(offset + 8)?;
        Ok((stride, samples))
    }

    /// Reattaches a block-backend index borrowing this mapping.
    ///
    /// When the vEB flag is set the wavelet levels are read from the
    /// macroblock-packed section; otherwise from the flat wavelet
    /// section.
    pub fn index(&self) -> Result<BlockFmIndex<'_>> {
        if self.has_flag(FLAG_LEARNED_OCC) {
            return Err(Error::invalid_format(
                "index uses the learned backend; reattach with learned_index()",
            ));
        }
        let n = self.text_len();
        let levels = if self.has_flag(FLAG_VEB_LAYOUT) {
            self.veb_levels(n)?
        } else {
            self.flat_levels(n)?
        };
        self.assemble(WaveletTree::from_levels(levels, n)?)
    }

    /// Reattaches a learned-backend index borrowing this mapping.
    pub fn learned_index(&self) -> Result<LearnedFmIndex<'_>> {
        if !self.has_flag(FLAG_LEARNED_OCC) {
            return Err(Error::invalid_format(
                "index uses the block backend; reattach with index()",
            ));
        }
        let n = self.text_len();
        let offset = self.header.offsets[section::WAVELET] as usize;
        let num_levels = self.read_u64(offset)? as usize;
        if num_levels != LEVELS {
            return Err(Error::invalid_format(format!(
                "wavelet section holds {num_levels} levels, expected {LEVELS}"
            )));
        }
        let coarse = u32::from_le_bytes(self.bytes_at(offset + 8, 4)?.try_into().unwrap());
        let micro = u32::from_le_bytes(self.bytes_at(offset + 12, 4)?.try_into().unwrap());
        if micro == 0 || coarse == 0 || coarse % micro != 0 {
            return Err(Error::invalid_format(format!(
                "learned strides {coarse}/{micro} are not divisible"
            )));
        }
        let (bits, next) = self.array_at::<u64>(offset + 16)?;
        let (models, next) = self.array_at::<f64>(next)?;
        let (residuals, _) = self.array_at::<i32>(next)?;

        let words_per_level = n.div_ceil(64);
        let residuals_per_level = n.div_ceil(coarse as usize) * (coarse / micro) as usize;
        if bits.len() != LEVELS * words_per_level
            || models.len() != LEVELS * 2
            || residuals.len() != LEVELS * residuals_per_level
        {
            return Err(Error::invalid_format(
                "learned wavelet arrays do not cover eight levels",
            ));
        }

        let mut levels = Vec::with_capacity(LEVELS);
        for level in 0..LEVELS {
            let model = LinearModel {
                a: models[level * 2],
                b: models[level * 2 + 1],
            };
            levels.push(LearnedRank::from_parts(
                Cow::Borrowed(&bits[level * words_per_level..(level + 1) * words_per_level]),
                Cow::Borrowed(
                    &residuals[level * residuals_per_level..(level + 1) * residuals_per_level],
                ),
                n,
                model,
                coarse,
                micro,
                DEFAULT_TAIL_POPCOUNT_WORDS,
            )?);
        }
        self.assemble(WaveletTree::from_levels(levels, n)?)
    }

    /// Reattaches whichever backend the feature flags select.
    pub fn any_index(&self) -> Result<AnyIndex<'_>> {
        if self.has_flag(FLAG_LEARNED_OCC) {
            Ok(AnyIndex::Learned(self.learned_index()?))
        } else {
            Ok(AnyIndex::Block(self.index()?))
        }
    }

    fn flat_levels(&self, n: usize) -> Result<Vec<BlockRank<'_>>> {
        let offset = self.header.offsets[section::WAVELET] as usize;
        let num_levels = self.read_u64(offset)? as usize;
        if num_levels != LEVELS {
            return Err(Error::invalid_format(format!(
                "wavelet section holds {num_levels} levels, expected {LEVELS}"
            )));
        }
        let (bits, next) = self.array_at::<u64>(offset + 8)?;
        let (supers, next) = self.array_at::<u32>(next)?;
        let (subs, _) = self.array_at::<u16>(next)?;

        let words_per_level = n.div_ceil(64);
        let supers_per_level = n.div_ceil(DEFAULT_SUPER_BLOCK_BITS as usize);
        let subs_per_level = n.div_ceil(DEFAULT_SUB_BLOCK_BITS as usize);
        if bits.len() != LEVELS * words_per_level
            || supers.len() != LEVELS * supers_per_level
            || subs.len() != LEVELS * subs_per_level
        {
            return Err(Error::invalid_format(
                "wavelet arrays do not cover eight levels",
            ));
        }

        (0..LEVELS)
            .map(|level| {
                BlockRank::from_parts(
                    Cow::Borrowed(&bits[level * words_per_level..(level + 1) * words_per_level]),
                    Cow::Borrowed(
                        &supers[level * supers_per_level..(level + 1) * supers_per_level],
                    ),
                    Cow::Borrowed(&subs[level * subs_per_level..(level + 1) * subs_per_level]),
                    n,
                    DEFAULT_SUPER_BLOCK_BITS,
                    DEFAULT_SUB_BLOCK_BITS,
                )
            })
            .collect()
    }

    fn veb_levels(&self, n: usize) -> Result<Vec<BlockRank<'_>>> {
        let offset = self.header.offsets[section::VEB] as usize;
        let size = self.read_u64(offset)? as usize;
        let payload = self.bytes_at(offset + 8, size)?;
        veb::unpack(
            payload,
            n,
            LEVELS,
            DEFAULT_SUPER_BLOCK_BITS,
            DEFAULT_SUB_BLOCK_BITS,
        )
    }

    fn assemble<R: crate::rank::BitRank>(
        &self,
        wavelet: WaveletTree<R>,
    ) -> Result<FmIndex<'_, R>> {
        let n = self.text_len();
        let text = self.text()?;
        let bwt = self.bwt()?;
        if text.len() != n || bwt.len() != n {
            return Err(Error::invalid_format(format!(
                "text ({}) or BWT ({}) section disagrees with header length {n}",
                text.len(),
                bwt.len()
            )));
        }
        let c = self.c_array()?;
        let (stride, samples) = self.ssa()?;
        let ssa = SampledSuffixArray::from_parts(Cow::Borrowed(samples), stride)?;
        FmIndex::from_parts(
            Cow::Borrowed(text),
            Cow::Borrowed(bwt),
            Cow::Borrowed(c),
            wavelet,
            ssa,
        )
    }
}

/// An index reattached from a mapping, whichever rank backend it uses.
///
/// Thin dispatch wrapper for callers, like the query CLI, that do not
/// care which backend a file was built with.
pub enum AnyIndex<'a> {
    /// Classic block-rank backend.
    Block(BlockFmIndex<'a>),
    /// Learned rank backend.
    Learned(LearnedFmIndex<'a>),
}

impl AnyIndex<'_> {
    /// Length of the indexed text.
    pub fn len(&self) -> usize {
        match self {
            AnyIndex::Block(idx) => idx.len(),
            AnyIndex::Learned(idx) => idx.len(),
        }
    }

    /// Checks if the indexed text is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counts occurrences of `pattern`.
    pub fn count(&self, pattern: &[u8]) -> usize {
        match self {
            AnyIndex::Block(idx) => idx.count(pattern),
            AnyIndex::Learned(idx) => idx.count(pattern),
        }
    }

    /// Whether `pattern` occurs in the text.
    pub fn contains(&self, pattern: &[u8]) -> bool {
        match self {
            AnyIndex::Block(idx) => idx.contains(pattern),
            AnyIndex::Learned(idx) => idx.contains(pattern),
        }
    }

    /// Text positions of up to `limit` occurrences of `pattern`.
    pub fn locate(&self, pattern: &[u8], limit: usize) -> Result<Vec<usize>> {
        match self {
            AnyIndex::Block(idx) => idx.locate(pattern, limit),
            AnyIndex::Learned(idx) => idx.locate(pattern, limit),
        }
    }

    /// Extracts `text[pos .. min(pos + len, n))`.
    pub fn extract(&self, pos: usize, len: usize) -> &[u8] {
        match self {
            AnyIndex::Block(idx) => idx.extract(pos, len),
            AnyIndex::Learned(idx) => idx.extract(pos, len),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use crate::format::writer::{write_index, write_learned_index};
    use std::io::{Read, Seek, SeekFrom, Write};

    fn build_and_write(config: &BuildConfig, dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("sample.idx");
        if config.use_learned_occ {
            let idx: LearnedFmIndex = FmIndex::build(b"abracadabra$", config).unwrap();
            write_learned_index(&path, &idx, config).unwrap();
        } else {
            let idx: BlockFmIndex = FmIndex::build(b"abracadabra$", config).unwrap();
            write_index(&path, &idx, config).unwrap();
        }
        path
    }

    #[test]
    fn open_rejects_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = build_and_write(&BuildConfig::default(), &dir);
        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .unwrap();
        file.write_all(b"NOTIDX\0\0").unwrap();
        drop(file);
        assert!(matches!(
            MappedIndex::open(&path),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn open_rejects_wrong_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = build_and_write(&BuildConfig::default(), &dir);
        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .unwrap();
        file.seek(SeekFrom::Start(8)).unwrap();
        file.write_all(&2u16.to_le_bytes()).unwrap();
        drop(file);
        assert!(MappedIndex::open(&path).is_err());
    }

    #[test]
    fn open_rejects_truncated_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = build_and_write(&BuildConfig::default(), &dir);
        let mut contents = Vec::new();
        std::fs::File::open(&path)
            .unwrap()
            .read_to_end(&mut contents)
            .unwrap();
        let cut = dir.path().join("cut.idx");
        std::fs::write(&cut, &contents[..contents.len() / 2]).unwrap();
        assert!(MappedIndex::open(&cut).is_err());
    }

    #[test]
    fn open_rejects_wild_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let path = build_and_write(&BuildConfig::default(), &dir);
        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .unwrap();
        // Point the BWT section past the end of the file.
        file.seek(SeekFrom::Start(24 + 2 * 8)).unwrap();
        file.write_all(&u64::MAX.to_le_bytes()).unwrap();
        drop(file);
        assert!(MappedIndex::open(&path).is_err());
    }

    #[test]
    fn backend_mismatch_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = build_and_write(&BuildConfig::default(), &dir);
        let mapped = MappedIndex::open(&path).unwrap();
        assert!(mapped.learned_index().is_err());
        assert!(mapped.index().is_ok());
    }
}
