//! Frame delta codec
//!
//! Frames are stored as the XOR of each frame against the one before it.
//! Static regions XOR to zero, which is what makes the deltas compress well.

use crate::console::BYTES_PER_PIXEL;

/// Delta codec errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeltaError {
    #[error("Buffer length mismatch: {left} vs {right} bytes")]
    LengthMismatch { left: usize, right: usize },
}

/// Byte-wise XOR of two equal-length buffers.
///
/// Self-inverse: `xor_delta(&xor_delta(a, b)?, b)? == a`.
pub fn xor_delta(a: &[u8], b: &[u8]) -> Result<Vec<u8>, DeltaError> {
    if a.len() != b.len() {
        return Err(DeltaError::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    Ok(a.iter().zip(b).map(|(x, y)| x ^ y).collect())
}

/// XOR `delta` into `dst` in place.
pub fn xor_in_place(dst: &mut [u8], delta: &[u8]) -> Result<(), DeltaError> {
    if dst.len() != delta.len() {
        return Err(DeltaError::LengthMismatch {
            left: dst.len(),
            right: delta.len(),
        });
    }
    for (d, x) in dst.iter_mut().zip(delta) {
        *d ^= x;
    }
    Ok(())
}

/// Count 4-byte pixels with at least one nonzero byte.
///
/// Trailing bytes that don't form a whole pixel are ignored.
pub fn count_changed_pixels(delta: &[u8]) -> usize {
    delta
        .chunks_exact(BYTES_PER_PIXEL)
        .filter(|px| px.iter().any(|&b| b != 0))
        .count()
}

/// Percentage (0-100, rounded) of whole pixels that changed.
pub fn change_percent(delta: &[u8]) -> u8 {
    let total = delta.len() / BYTES_PER_PIXEL;
    if total == 0 {
        return 0;
    }
    let changed = count_changed_pixels(delta);
    let pct = (changed * 100 + total / 2) / total;
    pct.min(100) as u8
}
