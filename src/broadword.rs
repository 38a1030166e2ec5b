//! Broadword utilities for 64-bit packed bit sequences.
//!
//! Bits are stored LSB-first within each word: bit `i` of a sequence lives
//! at bit `i % 64` of word `i / 64`.

/// The number of bits in a machine word.
pub const WORD_LEN: usize = u64::BITS as usize;

/// Counts set bits in a word.
#[inline(always)]
pub const fn popcount(x: u64) -> usize {
    x.count_ones() as usize
}

/// Returns a mask covering the `len` lowest bits; `len >= 64` yields all ones.
#[inline(always)]
pub const fn mask_lo(len: usize) -> u64 {
    if len >= WORD_LEN {
        u64::MAX
    } else {
        (1u64 << len) - 1
    }
}

/// Returns the `i`-th bit of the packed sequence, or `false` past the end.
#[inline(always)]
pub fn get_bit(words: &[u64], i: usize) -> bool {
    let word = i / WORD_LEN;
    word < words.len() && (words[word] >> (i % WORD_LEN)) & 1 == 1
}

/// Sets the `i`-th bit of the packed sequence.
#[inline(always)]
pub fn set_bit(words: &mut [u64], i: usize) {
    words[i / WORD_LEN] |= 1u64 << (i % WORD_LEN);
}

/// Counts set bits in the half-open bit interval `[start, end)`.
///
/// The interval must lie within the packed capacity of `words`.
pub fn popcount_range(words: &[u64], start: usize, end: usize) -> usize {
    if start >= end {
        return 0;
    }
    let first = start / WORD_LEN;
    let last = (end - 1) / WORD_LEN;
    if first == last {
        return popcount((words[first] >> (start % WORD_LEN)) & mask_lo(end - start));
    }
    let mut total = popcount(words[first] >> (start % WORD_LEN));
    for &w in &words[first + 1..last] {
        total += popcount(w);
    }
    total + popcount(words[last] & mask_lo(end - last * WORD_LEN))
}

/// Packs an iterator of bits into LSB-first words.
pub fn pack_bits<I: IntoIterator<Item = bool>>(bits: I) -> (Vec<u64>, usize) {
    let mut words = Vec::new();
    let mut len = 0usize;
    for bit in bits {
        if len % WORD_LEN == 0 {
            words.push(0);
        }
        if bit {
            set_bit(&mut words, len);
        }
        len += 1;
    }
    (words, len)
}

/// Zeroes any bits at positions `>= len` in the final word.
pub fn mask_tail(words: &mut [u64], len: usize) {
    let spill = len % WORD_LEN;
    if spill != 0 {
        if let Some(last) = words.get_mut(len / WORD_LEN) {
            *last &= mask_lo(spill);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaChaRng;

    fn naive_range(bits: &[bool], start: usize, end: usize) -> usize {
        bits[start..end].iter().filter(|&&b| b).count()
    }

    #[test]
    fn mask_lo_edges() {
        assert_eq!(mask_lo(0), 0);
        assert_eq!(mask_lo(1), 1);
        assert_eq!(mask_lo(63), u64::MAX >> 1);
        assert_eq!(mask_lo(64), u64::MAX);
    }

    #[test]
    fn pack_and_get() {
        let bits = [true, false, false, true, true];
        let (words, len) = pack_bits(bits.iter().copied());
        assert_eq!(len, 5);
        for (i, &b) in bits.iter().enumerate() {
            assert_eq!(get_bit(&words, i), b);
        }
        assert!(!get_bit(&words, 5));
        assert!(!get_bit(&words, 1000));
    }

    #[test]
    fn popcount_range_matches_naive() {
        let mut rng = ChaChaRng::seed_from_u64(7);
        let bits: Vec<bool> = (0..517).map(|_| rng.gen_bool(0.4)).collect();
        let (words, len) = pack_bits(bits.iter().copied());
        for _ in 0..500 {
            let start = rng.gen_range(0..=len);
            let end = rng.gen_range(start..=len);
            assert_eq!(popcount_range(&words, start, end), naive_range(&bits, start, end));
        }
        assert_eq!(popcount_range(&words, 0, len), naive_range(&bits, 0, len));
        assert_eq!(popcount_range(&words, 3, 3), 0);
    }

    #[test]
    fn mask_tail_clears_spill() {
        let mut words = vec![u64::MAX, u64::MAX];
        mask_tail(&mut words, 70);
        assert_eq!(words[0], u64::MAX);
        assert_eq!(words[1], mask_lo(6));
        let mut full = vec![u64::MAX];
        mask_tail(&mut full, 64);
        assert_eq!(full[0], u64::MAX);
    }
}
