//! Hunk format executables
//!
//! A filesystem driver is stored as a hunk image: a header announcing the
//! number of hunks and their sizes, followed by CODE/DATA/BSS contents and
//! relocation tables. Loaded hunks are linked into a segment list through
//! two longs preceding each hunk's data:
//!
//! ```text
//! addr+0  size in longs + 2
//! addr+4  BPTR to the previous hunk's link long (0 for the first hunk)
//! addr+8  hunk data ...
//! ```

use alloc::vec::Vec;
use core::fmt;

use crate::error::RdbError;
use memory::{HunkAllocator, HunkBuffer, MemFlags};

pub mod loader;
pub mod memory;

/// Image header
pub const HUNK_HEADER: u32 = 0x3F3;
/// Code hunk
pub const HUNK_CODE: u32 = 0x3E9;
/// Initialised data hunk
pub const HUNK_DATA: u32 = 0x3EA;
/// Zero-filled data hunk
pub const HUNK_BSS: u32 = 0x3EB;
/// 32-bit relocations with long entries
pub const HUNK_RELOC32: u32 = 0x3EC;
/// 32-bit relocations with word entries
pub const HUNK_RELOC32SHORT: u32 = 0x3FC;
/// End of the current hunk
pub const HUNK_END: u32 = 0x3F2;

/// Size flag: hunk needs chip memory
pub const HUNKF_CHIP: u32 = 1 << 30;
/// Size flag: hunk needs fast memory
pub const HUNKF_FAST: u32 = 1 << 31;

/// Longs in front of each hunk's data
pub const HUNK_LINK_LONGS: usize = 2;

/// Hunk loading errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HunkError {
    /// Image does not start with `HUNK_HEADER`
    BadHeader(u32),
    /// First/last hunk indices are negative or reversed
    InvalidHunkRange {
        /// First hunk index
        first: i32,
        /// Last hunk index
        last: i32,
    },
    /// Hunk memory could not be allocated
    OutOfMemory,
    /// More CODE/DATA/BSS hunks than the header declared
    TooManyHunks,
    /// A hunk carries more data than its declared size
    OversizeLoad {
        /// Hunk index
        hunk: usize,
        /// Longs in the image
        size: u32,
    },
    /// Relocation refers to a hunk outside the image
    RelocTargetOutOfRange(u32),
    /// Relocation offset leaves the hunk
    RelocOffsetOutOfRange(u32),
    /// Relocation table before any hunk
    RelocWithoutHunk,
    /// Unknown hunk type
    UnexpectedToken(u32),
    /// Segment stream failure
    Stream(RdbError),
}

impl fmt::Display for HunkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadHeader(v) => write!(f, "Not a hunk image (header {:08X})", v),
            Self::InvalidHunkRange { first, last } => {
                write!(f, "Invalid hunk range {}..{}", first, last)
            }
            Self::OutOfMemory => write!(f, "Out of hunk memory"),
            Self::TooManyHunks => write!(f, "More hunks than declared"),
            Self::OversizeLoad { hunk, size } => {
                write!(f, "Hunk {} overflows with {} longs", hunk, size)
            }
            Self::RelocTargetOutOfRange(t) => write!(f, "Relocation target hunk {} out of range", t),
            Self::RelocOffsetOutOfRange(o) => write!(f, "Relocation offset {} out of range", o),
            Self::RelocWithoutHunk => write!(f, "Relocation before any hunk"),
            Self::UnexpectedToken(t) => write!(f, "Unexpected hunk type {:08X}", t),
            Self::Stream(e) => write!(f, "Segment read failed: {}", e),
        }
    }
}

impl From<RdbError> for HunkError {
    fn from(e: RdbError) -> Self {
        HunkError::Stream(e)
    }
}

/// One hunk of an image
#[derive(Debug)]
pub struct LoadedHunk {
    pub(crate) buffer: HunkBuffer,
    pub(crate) size_longs: u32,
    pub(crate) flags: MemFlags,
}

impl LoadedHunk {
    /// Bus address of the allocation (the size long)
    pub fn addr(&self) -> u32 {
        self.buffer.addr
    }

    /// Address of the link long
    pub fn link_address(&self) -> u32 {
        self.buffer.addr + 4
    }

    /// Address of the hunk data; relocations add this value
    pub fn base(&self) -> u32 {
        self.buffer.addr + (HUNK_LINK_LONGS * 4) as u32
    }

    /// Declared size in longs
    pub fn size_longs(&self) -> u32 {
        self.size_longs
    }

    /// Memory attributes the hunk was allocated with
    pub fn flags(&self) -> MemFlags {
        self.flags
    }

    /// Hunk contents
    pub fn data(&self) -> &[u8] {
        &self.buffer.bytes[HUNK_LINK_LONGS * 4..]
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.buffer.bytes[HUNK_LINK_LONGS * 4..]
    }

    /// The two link longs in front of the data
    pub fn link_words(&self) -> (u32, u32) {
        let b = &self.buffer.bytes;
        (
            crate::types::be_u32(b, 0),
            crate::types::be_u32(b, 4),
        )
    }
}

/// A loaded, relocated and linked image
#[derive(Debug)]
pub struct LoadedImage {
    hunks: Vec<LoadedHunk>,
}

impl LoadedImage {
    /// Link the hunks into a segment list and expose them
    pub(crate) fn link(mut hunks: Vec<LoadedHunk>) -> Self {
        let mut prev = 0u32;
        for hunk in hunks.iter_mut() {
            let size = hunk.size_longs + HUNK_LINK_LONGS as u32;
            let link = hunk.link_address();
            let b = &mut hunk.buffer.bytes;
            b[0..4].copy_from_slice(&size.to_be_bytes());
            b[4..8].copy_from_slice(&prev.to_be_bytes());
            prev = link >> 2;
        }
        Self { hunks }
    }

    /// Address of the first hunk's link long
    pub fn entry_address(&self) -> u32 {
        self.hunks.first().map_or(0, LoadedHunk::link_address)
    }

    /// Entry address as a BPTR, the form stored in a segment list field
    pub fn seglist_bptr(&self) -> u32 {
        self.entry_address() >> 2
    }

    /// Hunks in image order
    pub fn hunks(&self) -> &[LoadedHunk] {
        &self.hunks
    }

    /// Return all hunk memory
    pub fn release<A: HunkAllocator>(self, alloc: &mut A) {
        for hunk in self.hunks {
            alloc.free(hunk.buffer);
        }
    }
}
