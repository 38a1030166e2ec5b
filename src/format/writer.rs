//! Index serialization.
//!
//! The writer reserves space for the header, streams the sections in
//! order while recording each section's byte offset, then rewinds and
//! rewrites the completed header.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use zerocopy::{Immutable, IntoBytes};

use crate::config::BuildConfig;
use crate::error::{Error, Result};
use crate::fm::{BlockFmIndex, LearnedFmIndex};
use crate::format::{
    section, veb, Header, FLAG_LEARNED_OCC, FLAG_VEB_LAYOUT, FOOTER_SENTINEL, HEADER_LEN,
};
use crate::wavelet::LEVELS;

struct SectionWriter {
    file: BufWriter<File>,
    header: Header,
    offset: u64,
}

impl SectionWriter {
    fn create(path: &Path, flags: u32, text_len: usize) -> Result<Self> {
        let mut file = BufWriter::new(File::create(path)?);
        file.write_all(&[0u8; HEADER_LEN])?;
        Ok(Self {
            file,
            header: Header {
                flags,
                text_len: text_len as u64,
                offsets: [0; crate::format::NUM_SECTIONS],
            },
            offset: HEADER_LEN as u64,
        })
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.file.write_all(data)?;
        self.offset += data.len() as u64;
        Ok(())
    }

    fn align_to(&mut self, alignment: u64) -> Result<()> {
        let spill = self.offset % alignment;
        if spill != 0 {
            let padding = (alignment - spill) as usize;
            let zeros = [0u8; 64];
            let mut written = 0;
            while written < padding {
                let chunk = (padding - written).min(zeros.len());
                self.write_bytes(&zeros[..chunk])?;
                written += chunk;
            }
        }
        Ok(())
    }

    fn begin_section(&mut self, id: usize, alignment: u64) -> Result<()> {
        self.align_to(alignment)?;
        self.header.offsets[id] = self.offset;
        Ok(())
    }

    fn write_array<T: IntoBytes + Immutable>(&mut self, data: &[T]) -> Result<()> {
        self.write_bytes(&(data.len() as u64).to_le_bytes())?;
        self.write_bytes(data.as_bytes())
    }

    fn write_text(&mut self, text: &[u8]) -> Result<()> {
        self.begin_section(section::TEXT, 8)?;
        self.write_array(text)
    }

    fn write_bwt(&mut self, bwt: &[u8]) -> Result<()> {
        self.begin_section(section::BWT, 8)?;
        self.write_array(bwt)
    }

    fn write_c_array(&mut self, c: &[u32]) -> Result<()> {
        self.begin_section(section::C_ARRAY, 8)?;
        self.write_array(c)
    }

    fn write_ssa(&mut self, stride: u32, samples: &[u32]) -> Result<()> {
        self.begin_section(section::SSA, 8)?;
        self.write_bytes(&stride.to_le_bytes())?;
        self.write_bytes(&[0u8; 4])?;
        self.write_array(samples)
    }

    fn finish(mut self) -> Result<()> {
        self.begin_section(section::FOOTER, 8)?;
        self.write_bytes(&FOOTER_SENTINEL.to_le_bytes())?;
        self.file.flush()?;
        let header = self.header.encode();
        let mut file = self.file.into_inner().map_err(|e| Error::Io(e.into_error()))?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&header)?;
        file.sync_all()?;
        Ok(())
    }
}

/// Serializes a block-backend index to `path`.
///
/// Format v1 records counters only in the default block geometry; an
/// index built with a custom geometry is rejected rather than written
/// into a file the header cannot describe.
pub fn write_index(path: &Path, index: &BlockFmIndex<'_>, config: &BuildConfig) -> Result<()> {
    config.validate()?;
    if !config.has_default_geometry() {
        return Err(Error::invalid_argument(
            "format v1 serializes only the default super/sub block geometry",
        ));
    }
    let flags = if config.use_veb_layout {
        FLAG_VEB_LAYOUT
    } else {
        0
    };
    let n = index.len();
    let levels = index.wavelet().levels();
    for level in levels {
        if level.supers().len() != n.div_ceil(config.super_block_bits as usize)
            || level.subs().len() != n.div_ceil(config.sub_block_bits as usize)
        {
            return Err(Error::invalid_argument(
                "index counter geometry disagrees with the build configuration",
            ));
        }
    }

    let mut writer = SectionWriter::create(path, flags, index.len())?;
    write_common(&mut writer, index.text(), index.bwt(), index.c_table())?;
    writer.write_ssa(index.ssa().stride(), index.ssa().samples())?;

    // Wavelet section: level count, then the bits/super/sub arrays of all
    // levels concatenated. Per-level spans are recoverable because every
    // level covers exactly the text length.
    writer.begin_section(section::WAVELET, 8)?;
    writer.write_bytes(&(levels.len() as u64).to_le_bytes())?;
    write_concatenated(&mut writer, levels.iter().map(|l| l.words()))?;
    write_concatenated(&mut writer, levels.iter().map(|l| l.supers()))?;
    write_concatenated(&mut writer, levels.iter().map(|l| l.subs()))?;

    if config.use_veb_layout {
        writer.begin_section(section::VEB, veb::MACROBLOCK as u64)?;
        let payload = veb::pack(
            levels,
            index.len(),
            config.super_block_bits,
            config.sub_block_bits,
        );
        writer.write_bytes(&(payload.as_bytes().len() as u64).to_le_bytes())?;
        writer.write_bytes(payload.as_bytes())?;
    }
    writer.finish()
}

/// Serializes a learned-backend index to `path`.
///
/// The wavelet section stores the coarse/micro strides, the packed bits
/// of all levels, the eight fitted `(a, b)` line parameters, and the
/// concatenated residual grid. The vEB layout packs block-backend
/// counters and cannot be combined with the learned backend.
pub fn write_learned_index(
    path: &Path,
    index: &LearnedFmIndex<'_>,
    config: &BuildConfig,
) -> Result<()> {
    config.validate()?;
    if config.use_veb_layout {
        return Err(Error::invalid_argument(
            "the vEB layout applies to the block backend; disable use_veb_layout for learned indexes",
        ));
    }
    let mut writer = SectionWriter::create(path, FLAG_LEARNED_OCC, index.len())?;
    write_common(&mut writer, index.text(), index.bwt(), index.c_table())?;
    writer.write_ssa(index.ssa().stride(), index.ssa().samples())?;

    writer.begin_section(section::WAVELET, 8)?;
    let levels = index.wavelet().levels();
    writer.write_bytes(&(levels.len() as u64).to_le_bytes())?;
    writer.write_bytes(&config.coarse_stride.to_le_bytes())?;
    writer.write_bytes(&config.micro_stride.to_le_bytes())?;
    write_concatenated(&mut writer, levels.iter().map(|l| l.words()))?;
    let models: Vec<f64> = levels
        .iter()
        .flat_map(|l| [l.model().a, l.model().b])
        .collect();
    writer.write_array(&models)?;
    write_concatenated(&mut writer, levels.iter().map(|l| l.residuals()))?;
    writer.finish()
}

fn write_common(
    writer: &mut SectionWriter,
    text: &[u8],
    bwt: &[u8],
    c: &[u32],
) -> Result<()> {
    writer.write_text(text)?;
    writer.write_bwt(bwt)?;
    writer.write_c_array(c)
}

/// Writes one count prefix covering all `parts`, then their payloads
/// back to back.
fn write_concatenated<'p, T, I>(writer: &mut SectionWriter, parts: I) -> Result<()>
where
    T: IntoBytes + Immutable + 'p,
    I: Iterator<Item = &'p [T]> + Clone,
{
    debug_assert_eq!(parts.clone().count(), LEVELS);
    let total: usize = parts.clone().map(|p| p.len()).sum();
    writer.write_bytes(&(total as u64).to_le_bytes())?;
    for part in parts {
        writer.write_bytes(part.as_bytes())?;
    }
    Ok(())
}
