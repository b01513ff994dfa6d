//! Block checksum calculations
//!
//! A valid RDB block's big-endian 32-bit words sum to zero. The sum runs
//! over the whole block as transferred, not only the `summed_longs` prefix.

/// Longword index of the checksum field in every RDB block
pub const CHECKSUM_LONG: usize = 2;

/// Wrapping sum of the big-endian longs of `data`
///
/// Trailing bytes that do not form a whole long are ignored.
pub fn block_sum(data: &[u8]) -> u32 {
    data.chunks_exact(4)
        .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .fold(0u32, |sum, v| sum.wrapping_add(v))
}

/// Verify checksum is zero (validation check)
pub fn verify_block(data: &[u8]) -> bool {
    block_sum(data) == 0
}

/// Rewrite the checksum field so the whole block sums to zero
pub fn fix_checksum(data: &mut [u8]) {
    let off = CHECKSUM_LONG * 4;
    data[off..off + 4].copy_from_slice(&[0; 4]);
    let sum = block_sum(data);
    data[off..off + 4].copy_from_slice(&0u32.wrapping_sub(sum).to_be_bytes());
}
