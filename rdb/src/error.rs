//! Error types for RDB block operations

use core::fmt;

/// Result type for RDB operations
pub type Result<T> = core::result::Result<T, RdbError>;

/// Errors that can occur while reading RDB structures
///
/// Every variant is a flavour of "block not found" for the layer above:
/// none of them is retried once it reaches the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RdbError {
    /// Unit stayed not ready for the whole retry budget
    NotReady,

    /// Terminal I/O error reported by the unit
    IoError(i32),

    /// Short transfer (fewer bytes than one block)
    ShortRead,

    /// Block id did not match the expected signature
    SignatureMismatch {
        /// Signature the caller asked for
        expected: u32,
        /// Signature found in the first long of the block
        found: u32,
    },

    /// Big-endian longword sum of the block was not zero
    ChecksumFailed(u32),

    /// No Rigid Disk Block within the scan limit
    NoRigidDisk,

    /// Chain reached the terminal sentinel before the data ended
    EndOfChain,

    /// Chain traversal exceeded its step budget (probable cycle)
    ChainBudgetExceeded,

    /// Block size is not one the loader supports
    UnsupportedBlockSize(usize),

    /// Scratch buffer could not be allocated
    OutOfMemory,

    /// Bulk read into a buffer that is not a whole number of longs
    UnalignedLength(usize),
}

impl fmt::Display for RdbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady => write!(f, "Unit not ready"),
            Self::IoError(code) => write!(f, "I/O error {}", code),
            Self::ShortRead => write!(f, "Short read"),
            Self::SignatureMismatch { expected, found } => write!(
                f,
                "Block id {:08X}, expected {:08X}",
                found, expected
            ),
            Self::ChecksumFailed(sum) => write!(f, "Checksum error {:08X}", sum),
            Self::NoRigidDisk => write!(f, "Rigid Disk Block not found"),
            Self::EndOfChain => write!(f, "Premature end of block chain"),
            Self::ChainBudgetExceeded => write!(f, "Block chain too long (loop?)"),
            Self::UnsupportedBlockSize(size) => write!(f, "Unsupported block size {}", size),
            Self::OutOfMemory => write!(f, "Out of memory"),
            Self::UnalignedLength(len) => write!(f, "Length {} is not a multiple of 4", len),
        }
    }
}
