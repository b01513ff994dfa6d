//! Load segment block (LSEG)
//!
//! The concatenated payloads of an LSEG chain form the hunk image of a
//! filesystem driver.

use crate::types::DISK_BLOCK_SIZE;

/// Longword index where the payload starts
pub const LOAD_DATA_LONG: usize = 5;

/// Payload longs of a 512-byte LSEG block
pub const LSEG_DATASIZE: usize = DISK_BLOCK_SIZE / 4 - LOAD_DATA_LONG;

/// Payload longs of an LSEG block of `block_size` bytes
pub fn data_longs(block_size: usize) -> usize {
    block_size / 4 - LOAD_DATA_LONG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_size() {
        assert_eq!(LSEG_DATASIZE, 123);
        assert_eq!(data_longs(2048), 507);
    }
}
