//! Filesystem header block (FSHD)
//!
//! Describes one filesystem driver stored on the disk: its dostype, version,
//! the handler fields it overrides and where its load segments start.

use super::chain::ChainBlock;
use crate::types::{long_at, BlockNum, DosType, IDNAME_FILESYSHEADER};

/// Longword index of the first patchable handler field
pub const HANDLER_LONG: usize = 11;

/// Number of handler fields selectable by patch flags
pub const HANDLER_FIELDS: usize = 9;

/// Handler fields shared by FSHD blocks, registry entries and device nodes
///
/// Bit `i` of a patch-flags mask selects field `i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HandlerFields(pub [u32; HANDLER_FIELDS]);

impl HandlerFields {
    /// Node type
    pub const TYPE: usize = 0;
    /// Handler process port
    pub const TASK: usize = 1;
    /// Lock, unused
    pub const LOCK: usize = 2;
    /// Handler file name
    pub const HANDLER: usize = 3;
    /// Stack size
    pub const STACK_SIZE: usize = 4;
    /// Process priority
    pub const PRIORITY: usize = 5;
    /// Startup message
    pub const STARTUP: usize = 6;
    /// Segment list; on disk the first LSEG block
    pub const SEG_LIST: usize = 7;
    /// Global vector
    pub const GLOBAL_VEC: usize = 8;

    /// Copy every field selected by `patch_flags` from `src`
    pub fn patch_from(&mut self, src: &HandlerFields, patch_flags: u32) {
        for (i, (dst, &val)) in self.0.iter_mut().zip(src.0.iter()).enumerate() {
            if patch_flags & (1 << i) != 0 {
                *dst = val;
            }
        }
    }

    /// Field by index
    pub fn get(&self, index: usize) -> u32 {
        self.0[index]
    }

    /// Set field by index
    pub fn set(&mut self, index: usize, value: u32) {
        self.0[index] = value;
    }
}

/// Decoded FSHD block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSysHeaderBlock {
    /// Next header or the sentinel
    pub next: BlockNum,
    /// Flags, unused
    pub flags: u32,
    /// Filesystem type this driver serves
    pub dos_type: DosType,
    /// `major << 16 | minor`
    pub version: u32,
    /// Which handler fields to override
    pub patch_flags: u32,
    /// Handler field values
    pub handler: HandlerFields,
}

impl FileSysHeaderBlock {
    /// First LSEG block of the driver image
    pub fn seglist_blocks(&self) -> BlockNum {
        self.handler.get(HandlerFields::SEG_LIST)
    }
}

impl ChainBlock for FileSysHeaderBlock {
    const ID: u32 = IDNAME_FILESYSHEADER;

    fn parse(buf: &[u8]) -> Self {
        let mut handler = HandlerFields::default();
        for (i, v) in handler.0.iter_mut().enumerate() {
            *v = long_at(buf, HANDLER_LONG + i);
        }
        Self {
            next: long_at(buf, 4),
            flags: long_at(buf, 5),
            dos_type: DosType(long_at(buf, 8)),
            version: long_at(buf, 9),
            patch_flags: long_at(buf, 10),
            handler,
        }
    }
}

/// Format a version long as `major.minor`
pub struct Version(pub u32);

impl core::fmt::Display for Version {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.0 >> 16, self.0 & 0xFFFF)
    }
}
