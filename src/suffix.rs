//! Suffix array and Burrows-Wheeler transform construction.
//!
//! The production sort is SA-IS (induced sorting over LMS substrings),
//! linear in the text length. Arbitrary byte texts are handled by shifting
//! the alphabet up by one and appending a virtual smallest sentinel before
//! sorting; the sentinel row is stripped from the result. The quadratic
//! comparator sort survives only as the oracle the randomized tests
//! compare against.

use crate::error::{Error, Result};

const EMPTY: u32 = u32::MAX;

/// Builds the suffix array of `text` with SA-IS.
///
/// Returns the permutation `sa` such that the suffix starting at `sa[i]`
/// is the `i`-th smallest. Texts must stay below 2^32 - 1 bytes so every
/// position fits the 32-bit entries.
pub fn suffix_array(text: &[u8]) -> Result<Vec<u32>> {
    let n = text.len();
    if n >= u32::MAX as usize {
        return Err(Error::invalid_argument(format!(
            "text of {n} bytes overflows 32-bit suffix positions"
        )));
    }
    if n == 0 {
        return Ok(Vec::new());
    }
    let mut s: Vec<u32> = Vec::with_capacity(n + 1);
    s.extend(text.iter().map(|&b| u32::from(b) + 1));
    s.push(0);
    let mut sa = vec![EMPTY; n + 1];
    sais(&s, 257, &mut sa);
    // Row 0 is the virtual sentinel.
    Ok(sa[1..].to_vec())
}

/// Reference comparator sort, O(n² log n). Test oracle only.
pub fn suffix_array_naive(text: &[u8]) -> Vec<u32> {
    let mut sa: Vec<u32> = (0..text.len() as u32).collect();
    sa.sort_unstable_by(|&a, &b| text[a as usize..].cmp(&text[b as usize..]));
    sa
}

/// Derives the BWT from the text and its suffix array:
/// `bwt[i] = text[sa[i] - 1]`, wrapping to the last byte for `sa[i] == 0`.
pub fn bwt_from_sa(text: &[u8], sa: &[u32]) -> Vec<u8> {
    let n = text.len();
    sa.iter()
        .map(|&p| {
            if p == 0 {
                text[n - 1]
            } else {
                text[p as usize - 1]
            }
        })
        .collect()
}

/// Builds the 257-entry cumulative count table: `c[b]` is the number of
/// bytes in `bytes` strictly smaller than `b`, with `c[256]` the total.
pub fn c_table(bytes: &[u8]) -> Vec<u32> {
    let mut freq = [0u32; 256];
    for &b in bytes {
        freq[b as usize] += 1;
    }
    let mut table = Vec::with_capacity(257);
    let mut cum = 0u32;
    for f in freq {
        table.push(cum);
        cum += f;
    }
    table.push(cum);
    table
}

/// SA-IS over a sequence whose last symbol is a unique smallest 0.
fn sais(s: &[u32], sigma: usize, sa: &mut [u32]) {
    let n = s.len();
    debug_assert!(n > 0 && s[n - 1] == 0);
    if n == 1 {
        sa[0] = 0;
        return;
    }

    // S/L types, right to left.
    let mut is_s = vec![false; n];
    is_s[n - 1] = true;
    for i in (0..n - 1).rev() {
        is_s[i] = s[i] < s[i + 1] || (s[i] == s[i + 1] && is_s[i + 1]);
    }

    let mut sizes = vec![0u32; sigma];
    for &c in s {
        sizes[c as usize] += 1;
    }

    // LMS positions in text order; the sentinel is always one of them.
    let lms_positions: Vec<u32> = (1..n)
        .filter(|&i| is_s[i] && !is_s[i - 1])
        .map(|i| i as u32)
        .collect();

    // First induction sorts the LMS substrings.
    induce(s, sa, &is_s, &sizes, &lms_positions);

    let mut lms_sorted = Vec::with_capacity(lms_positions.len());
    for &p in sa.iter() {
        if p == EMPTY {
            continue;
        }
        let p = p as usize;
        if p > 0 && is_s[p] && !is_s[p - 1] {
            lms_sorted.push(p as u32);
        }
    }

    // Name LMS substrings in sorted order; equal substrings share a name.
    let mut names = vec![EMPTY; n];
    let mut name = 0u32;
    names[lms_sorted[0] as usize] = 0;
    for w in lms_sorted.windows(2) {
        if !lms_substrings_equal(s, &is_s, w[0] as usize, w[1] as usize) {
            name += 1;
        }
        names[w[1] as usize] = name;
    }
    let num_names = name as usize + 1;

    let reduced: Vec<u32> = lms_positions.iter().map(|&p| names[p as usize]).collect();
    let mut reduced_sa = vec![EMPTY; reduced.len()];
    if num_names == reduced.len() {
        // All names distinct: the reduced array is already a permutation.
        for (i, &nm) in reduced.iter().enumerate() {
            reduced_sa[nm as usize] = i as u32;
        }
    } else {
        sais(&reduced, num_names, &mut reduced_sa);
    }

    let lms_final: Vec<u32> = reduced_sa
        .iter()
        .map(|&r| lms_positions[r as usize])
        .collect();
    induce(s, sa, &is_s, &sizes, &lms_final);
}

/// Places the given LMS suffixes at their bucket tails, then induces
/// L-type suffixes left to right and S-type suffixes right to left.
fn induce(s: &[u32], sa: &mut [u32], is_s: &[bool], sizes: &[u32], lms: &[u32]) {
    let n = s.len();
    sa.fill(EMPTY);

    let mut tails = bucket_tails(sizes);
    for &p in lms.iter().rev() {
        let c = s[p as usize] as usize;
        tails[c] -= 1;
        sa[tails[c] as usize] = p;
    }

    let mut heads = bucket_heads(sizes);
    for i in 0..n {
        let p = sa[i];
        if p == EMPTY || p == 0 {
            continue;
        }
        let k = (p - 1) as usize;
        if !is_s[k] {
            let c = s[k] as usize;
            sa[heads[c] as usize] = k as u32;
            heads[c] += 1;
        }
    }

    let mut tails = bucket_tails(sizes);
    for i in (0..n).rev() {
        let p = sa[i];
        if p == EMPTY || p == 0 {
            continue;
        }
        let k = (p - 1) as usize;
        if is_s[k] {
            let c = s[k] as usize;
            tails[c] -= 1;
            sa[tails[c] as usize] = k as u32;
        }
    }
}

fn bucket_heads(sizes: &[u32]) -> Vec<u32> {
    let mut heads = Vec::with_capacity(sizes.len());
    let mut sum = 0u32;
    for &size in sizes {
        heads.push(sum);
        sum += size;
    }
    heads
}

fn bucket_tails(sizes: &[u32]) -> Vec<u32> {
    let mut tails = Vec::with_capacity(sizes.len());
    let mut sum = 0u32;
    for &size in sizes {
        sum += size;
        tails.push(sum);
    }
    tails
}

/// Compares two LMS substrings for equality, symbol by symbol up to and
/// including the next LMS position. The unique sentinel guarantees a
/// symbol mismatch before either walk can run off the end.
fn lms_substrings_equal(s: &[u32], is_s: &[bool], a: usize, b: usize) -> bool {
    let is_lms = |i: usize| i > 0 && is_s[i] && !is_s[i - 1];
    let mut d = 0;
    loop {
        if s[a + d] != s[b + d] {
            return false;
        }
        let a_end = d > 0 && is_lms(a + d);
        let b_end = d > 0 && is_lms(b + d);
        if a_end || b_end {
            return a_end && b_end;
        }
        d += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaChaRng;

    #[test]
    fn banana_suffix_array() {
        let sa = suffix_array(b"banana$").unwrap();
        assert_eq!(sa, vec![6, 5, 3, 1, 0, 4, 2]);
        assert_eq!(sa, suffix_array_naive(b"banana$"));
    }

    #[test]
    fn banana_bwt() {
        let text = b"banana$";
        let sa = suffix_array(text).unwrap();
        assert_eq!(bwt_from_sa(text, &sa), b"annb$aa");
    }

    #[test]
    fn tiny_texts() {
        assert!(suffix_array(b"").unwrap().is_empty());
        assert_eq!(suffix_array(b"x").unwrap(), vec![0]);
        assert_eq!(suffix_array(b"ba").unwrap(), vec![1, 0]);
        assert_eq!(suffix_array(b"aaaa").unwrap(), vec![3, 2, 1, 0]);
    }

    #[test]
    fn matches_naive_on_random_texts() {
        let mut rng = ChaChaRng::seed_from_u64(60);
        for len in [2usize, 3, 5, 17, 100, 255, 513] {
            for sigma in [2u8, 4, 255] {
                let text: Vec<u8> = (0..len).map(|_| rng.gen_range(0..=sigma)).collect();
                assert_eq!(
                    suffix_array(&text).unwrap(),
                    suffix_array_naive(&text),
                    "len={len} sigma={sigma}"
                );
            }
        }
    }

    #[test]
    fn sa_is_a_bijection() {
        let mut rng = ChaChaRng::seed_from_u64(61);
        let text: Vec<u8> = (0..1000).map(|_| rng.gen_range(b'a'..=b'd')).collect();
        let sa = suffix_array(&text).unwrap();
        let mut seen = vec![false; text.len()];
        for &p in &sa {
            assert!(!seen[p as usize]);
            seen[p as usize] = true;
        }
        assert!(seen.iter().all(|&b| b));
    }

    #[test]
    fn bwt_multiset_matches_text() {
        let text = b"mississippi$";
        let sa = suffix_array(text).unwrap();
        let bwt = bwt_from_sa(text, &sa);
        let mut a = text.to_vec();
        let mut b = bwt.clone();
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, b);
    }

    #[test]
    fn bwt_row_relation() {
        // bwt[inverse_sa[i]] == text[(i + n - 1) % n] for every i.
        let text = b"abracadabra$";
        let n = text.len();
        let sa = suffix_array(text).unwrap();
        let bwt = bwt_from_sa(text, &sa);
        let mut inverse = vec![0usize; n];
        for (row, &p) in sa.iter().enumerate() {
            inverse[p as usize] = row;
        }
        for i in 0..n {
            assert_eq!(bwt[inverse[i]], text[(i + n - 1) % n]);
        }
    }

    #[test]
    fn c_table_is_cumulative() {
        let table = c_table(b"annb$aa");
        assert_eq!(table.len(), 257);
        assert_eq!(table[256], 7);
        assert_eq!(table[b'$' as usize + 1] - table[b'$' as usize], 1);
        assert_eq!(table[b'a' as usize + 1] - table[b'a' as usize], 3);
        assert_eq!(table[b'n' as usize + 1] - table[b'n' as usize], 2);
        for w in table.windows(2) {
            assert!(w[0] <= w[1]);
        }
    }
}
