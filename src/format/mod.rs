//! On-disk index format: layout constants, header codec, writer, loader.
//!
//! One file holds the header followed by an aligned sequence of sections:
//!
//! ```text
//! [Header][Text][BWT][C-array][SSA][Wavelet][vEB layout?][Footer]
//! ```
//!
//! Every section begins at an 8-byte boundary; the optional vEB section
//! begins at a 4096-byte boundary. Per section, the first 8 bytes give a
//! count (bytes for the text and vEB payload, elements for arrays),
//! followed by the payload. All integers are little-endian; array
//! payloads are additionally laid out so a memory-mapped reader can hand
//! out typed slices without copying.
//!
//! The 88-byte header records the magic, format version, feature flags,
//! the text length, and the byte offset of every section.

pub mod reader;
pub mod veb;
pub mod writer;

pub use reader::{AnyIndex, MappedIndex};
pub use writer::{write_index, write_learned_index};

use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::error::{Error, Result};

/// File magic, padded to 8 bytes.
pub const MAGIC: [u8; 8] = *b"CSIDX\0\0\0";

/// Current format version; the loader accepts this version exactly.
pub const FORMAT_VERSION: u16 = 1;

/// Header size in bytes.
pub const HEADER_LEN: usize = 88;

/// Footer sentinel marking the end of the file.
pub const FOOTER_SENTINEL: u64 = u64::from_le_bytes(*b"CSEND\0\0\0");

/// Number of entries in the header offset table.
pub const NUM_SECTIONS: usize = 8;

/// Section identifiers indexing the header offset table.
pub mod section {
    /// The header itself; its offset slot stays zero.
    pub const HEADER: usize = 0;
    /// The retained text bytes.
    pub const TEXT: usize = 1;
    /// The BWT bytes.
    pub const BWT: usize = 2;
    /// The 257-entry cumulative count table.
    pub const C_ARRAY: usize = 3;
    /// The sampled suffix array (stride + samples).
    pub const SSA: usize = 4;
    /// The wavelet tree levels.
    pub const WAVELET: usize = 5;
    /// Cache-oblivious vEB packing of the wavelet levels, when enabled.
    pub const VEB: usize = 6;
    /// End-of-file sentinel.
    pub const FOOTER: usize = 7;
}

/// Feature flag: the wavelet levels use the learned rank backend.
pub const FLAG_LEARNED_OCC: u32 = 1 << 0;
/// Feature flag: the vEB layout section is present.
pub const FLAG_VEB_LAYOUT: u32 = 1 << 1;
/// Feature flag reserved for a Huffman-shaped wavelet tree.
pub const FLAG_HUFFMAN_WAVELET: u32 = 1 << 2;
/// Feature flag reserved for compressed suffix samples.
pub const FLAG_COMPRESSED_SSA: u32 = 1 << 3;

/// Parsed index file header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    /// Feature flag bitfield.
    pub flags: u32,
    /// Length of the indexed text in bytes.
    pub text_len: u64,
    /// Byte offset of each section, indexed by section id.
    pub offsets: [u64; NUM_SECTIONS],
}

impl Header {
    /// Encodes the header into its 88-byte on-disk form.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..8].copy_from_slice(&MAGIC);
        buf[8..10].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
        buf[12..16].copy_from_slice(&self.flags.to_le_bytes());
        buf[16..24].copy_from_slice(&self.text_len.to_le_bytes());
        for (i, off) in self.offsets.iter().enumerate() {
            buf[24 + i * 8..32 + i * 8].copy_from_slice(&off.to_le_bytes());
        }
        buf
    }

    /// Decodes and validates a header from the start of a file image.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::invalid_format(format!(
                "file of {} bytes is too small to hold a header",
                bytes.len()
            )));
        }
        if bytes[0..8] != MAGIC {
            return Err(Error::invalid_format("bad magic"));
        }
        let version = u16::from_le_bytes(bytes[8..10].try_into().unwrap());
        if version != FORMAT_VERSION {
            return Err(Error::invalid_format(format!(
                "unsupported format version {version}, expected {FORMAT_VERSION}"
            )));
        }
        let flags = u32::from_le_bytes(bytes[12..16].try_into().unwrap());
        let text_len = u64::from_le_bytes(bytes[16..24].try_into().unwrap());
        let mut offsets = [0u64; NUM_SECTIONS];
        for (i, off) in offsets.iter_mut().enumerate() {
            *off = u64::from_le_bytes(bytes[24 + i * 8..32 + i * 8].try_into().unwrap());
        }
        Ok(Self {
            flags,
            text_len,
            offsets,
        })
    }
}

/// Reinterprets `bytes` as a typed slice, rejecting misaligned or
/// odd-sized input as a format error.
pub(crate) fn view_slice<T>(bytes: &[u8]) -> Result<&[T]>
where
    T: FromBytes + Immutable + KnownLayout,
{
    <[T]>::ref_from_bytes(bytes)
        .map_err(|_| Error::invalid_format("misaligned or truncated array payload"))
}
