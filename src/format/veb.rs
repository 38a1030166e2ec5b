//! Cache-oblivious vEB packing of serialized wavelet levels.
//!
//! Each level's rank dictionary serializes as
//! `[nbits:u64][packed 64-bit words][super:u32[]][sub:u16[]]`, padded to
//! an 8-byte boundary so every typed array stays alignment-safe for
//! zero-copy views. The top levels are stored inline; each deeper level
//! starts at a 4096-byte macroblock boundary so a query's first page
//! faults land on whole macroblocks. The vEB recursion splits the level
//! chain into a top and bottom half; over a linear chain the recursion
//! degenerates to storage in level order, which is what the offset
//! computation below produces.

use std::borrow::Cow;

use zerocopy::IntoBytes;

use crate::error::{Error, Result};
use crate::format::view_slice;
use crate::rank::BlockRank;

/// Macroblock granularity for the bottom levels.
pub const MACROBLOCK: usize = 4096;

/// Number of levels stored inline ahead of the macroblocks.
pub const TOP_LEVELS: usize = 2;

/// Serialized size of one level dictionary before padding.
fn dict_bytes(len: usize, super_bits: u32, sub_bits: u32) -> usize {
    8 + 8 * len.div_ceil(64)
        + 4 * len.div_ceil(super_bits as usize)
        + 2 * len.div_ceil(sub_bits as usize)
}

fn padded_dict_bytes(len: usize, super_bits: u32, sub_bits: u32) -> usize {
    dict_bytes(len, super_bits, sub_bits).next_multiple_of(8)
}

/// Byte offset of every level inside the packed payload.
///
/// Shared by the writer and the loader so both sides derive the same
/// layout from the sequence length and counter geometry alone.
pub fn level_offsets(
    len: usize,
    num_levels: usize,
    super_bits: u32,
    sub_bits: u32,
) -> Vec<usize> {
    let blob = padded_dict_bytes(len, super_bits, sub_bits);
    let mut offsets = Vec::with_capacity(num_levels);
    let mut cursor = 0usize;
    for level in 0..num_levels {
        if level >= TOP_LEVELS {
            cursor = cursor.next_multiple_of(MACROBLOCK);
        }
        offsets.push(cursor);
        cursor += blob;
    }
    offsets
}

/// Total payload size, padded out to a whole macroblock.
pub fn packed_len(len: usize, num_levels: usize, super_bits: u32, sub_bits: u32) -> usize {
    let offsets = level_offsets(len, num_levels, super_bits, sub_bits);
    let end = match offsets.last() {
        Some(&last) => last + padded_dict_bytes(len, super_bits, sub_bits),
        None => 0,
    };
    end.next_multiple_of(MACROBLOCK)
}

/// Packs the level dictionaries into one payload buffer.
///
/// The buffer is backed by `u64` words so it stays 8-byte aligned when
/// reattached in memory; its byte view is what lands in the file.
pub fn pack(levels: &[BlockRank<'_>], len: usize, super_bits: u32, sub_bits: u32) -> Vec<u64> {
    let offsets = level_offsets(len, levels.len(), super_bits, sub_bits);
    let mut buf = vec![0u64; packed_len(len, levels.len(), super_bits, sub_bits) / 8];
    let bytes = buf.as_mut_bytes();
    for (level, &offset) in levels.iter().zip(&offsets) {
        let mut cursor = offset;
        bytes[cursor..cursor + 8].copy_from_slice(&(len as u64).to_le_bytes());
        cursor += 8;
        let words = level.words().as_bytes();
        bytes[cursor..cursor + words.len()].copy_from_slice(words);
        cursor += words.len();
        let supers = level.supers().as_bytes();
        bytes[cursor..cursor + supers.len()].copy_from_slice(supers);
        cursor += supers.len();
        let subs = level.subs().as_bytes();
        bytes[cursor..cursor + subs.len()].copy_from_slice(subs);
    }
    buf
}

/// Reattaches the level dictionaries from a packed payload without
/// copying.
pub fn unpack<'a>(
    payload: &'a [u8],
    len: usize,
    num_levels: usize,
    super_bits: u32,
    sub_bits: u32,
) -> Result<Vec<BlockRank<'a>>> {
    let offsets = level_offsets(len, num_levels, super_bits, sub_bits);
    let word_bytes = 8 * len.div_ceil(64);
    let super_bytes = 4 * len.div_ceil(super_bits as usize);
    let sub_bytes = 2 * len.div_ceil(sub_bits as usize);
    let mut levels = Vec::with_capacity(num_levels);
    for (level, &offset) in offsets.iter().enumerate() {
        let need = offset + dict_bytes(len, super_bits, sub_bits);
        if payload.len() < need {
            return Err(Error::invalid_format(format!(
                "vEB payload of {} bytes truncates level {level}",
                payload.len()
            )));
        }
        let nbits = u64::from_le_bytes(payload[offset..offset + 8].try_into().unwrap());
        if nbits as usize != len {
            return Err(Error::invalid_format(format!(
                "vEB level {level} holds {nbits} bits, expected {len}"
            )));
        }
        let mut cursor = offset + 8;
        let words = view_slice::<u64>(&payload[cursor..cursor + word_bytes])?;
        cursor += word_bytes;
        let supers = view_slice::<u32>(&payload[cursor..cursor + super_bytes])?;
        cursor += super_bytes;
        let subs = view_slice::<u16>(&payload[cursor..cursor + sub_bytes])?;
        levels.push(BlockRank::from_parts(
            Cow::Borrowed(words),
            Cow::Borrowed(supers),
            Cow::Borrowed(subs),
            len,
            super_bits,
            sub_bits,
        )?);
    }
    Ok(levels)
}
