//! Delta-II: second-order byte-wise differencing for tables of numeric
//! values. `delta1[i] = src[i] - src[i-1]`, `delta2[i] = delta1[i] -
//! delta1[i-1]`, both in wrapping u8 arithmetic so the transform is exactly
//! reversible regardless of byte distribution.

/// Applies second-order differencing. Declines (`None`) when the result
/// clearly isn't more regular than the input — a quick magnitude heuristic
/// standing in for the real `deltac_min_distance`/span heuristics of the
/// original tool, which operated on typed numeric arrays rather than raw
/// bytes.
pub fn compress(src: &[u8]) -> Option<Vec<u8>> {
    if src.len() < 3 {
        return None;
    }
    let mut delta1 = vec![0u8; src.len()];
    let mut prev = 0u8;
    for (i, &b) in src.iter().enumerate() {
        delta1[i] = b.wrapping_sub(prev);
        prev = b;
    }
    let mut delta2 = vec![0u8; src.len()];
    let mut prev_d1 = 0u8;
    for (i, &d) in delta1.iter().enumerate() {
        delta2[i] = d.wrapping_sub(prev_d1);
        prev_d1 = d;
    }

    let magnitude = |buf: &[u8]| -> u64 {
        buf.iter().map(|&b| (b as i16 - 128).unsigned_abs() as u64).sum()
    };
    if magnitude(&delta2) < magnitude(src) {
        Some(delta2)
    } else {
        None
    }
}

pub fn decompress(delta2: &[u8]) -> Vec<u8> {
    let mut delta1 = vec![0u8; delta2.len()];
    let mut prev_d1 = 0u8;
    for (i, &d2) in delta2.iter().enumerate() {
        let d1 = d2.wrapping_add(prev_d1);
        delta1[i] = d1;
        prev_d1 = d1;
    }
    let mut out = vec![0u8; delta2.len()];
    let mut prev = 0u8;
    for (i, &d1) in delta1.iter().enumerate() {
        let b = d1.wrapping_add(prev);
        out[i] = b;
        prev = b;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_monotonic_sequence() {
        let src: Vec<u8> = (0..=250u8).step_by(1).collect();
        if let Some(packed) = compress(&src) {
            assert_eq!(decompress(&packed), src);
        }
    }

    #[test]
    fn reverses_whatever_compress_emits() {
        let src = vec![1u8, 3, 5, 7, 9, 11, 13, 15, 17, 19];
        if let Some(packed) = compress(&src) {
            assert_eq!(decompress(&packed), src);
        }
    }
}
