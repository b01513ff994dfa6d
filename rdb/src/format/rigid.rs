//! Rigid Disk Block (RDSK)
//!
//! The master descriptor of a disk. It is found by scanning the first
//! [`RDB_LOCATION_LIMIT`] blocks for its signature.

use crate::block::reader::BlockReader;
use crate::block::UnitIo;
use crate::error::{RdbError, Result};
use crate::types::{long_at, BlockNum, ANY_ID, IDNAME_RIGIDDISK, RDB_LOCATION_LIMIT};

/// No disks exist beyond this one
pub const RDBFF_LAST: u32 = 1 << 0;
/// No LUNs exist beyond this one
pub const RDBFF_LASTLUN: u32 = 1 << 1;
/// No target ids exist beyond this one
pub const RDBFF_LASTTID: u32 = 1 << 2;
/// Don't bother trying to reselect
pub const RDBFF_NORESELECT: u32 = 1 << 3;
/// Disk identification valid
pub const RDBFF_DISKID: u32 = 1 << 4;
/// Controller identification valid
pub const RDBFF_CTRLRID: u32 = 1 << 5;
/// Drive supports SCSI synchronous mode
pub const RDBFF_SYNCH: u32 = 1 << 6;

/// Decoded RDSK block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RigidDiskBlock {
    /// Block the RDB was found in
    pub location: BlockNum,
    /// SCSI id of the host adapter that wrote it
    pub host_id: u32,
    /// Block size the disk was partitioned with
    pub block_bytes: u32,
    /// `RDBFF_*` flags
    pub flags: u32,
    /// Head of the bad block list
    pub bad_block_list: BlockNum,
    /// Head of the partition list
    pub partition_list: BlockNum,
    /// Head of the filesystem header list
    pub filesys_header_list: BlockNum,
    /// Drive initialisation code
    pub drive_init: BlockNum,
}

impl RigidDiskBlock {
    /// Decode a validated block read from `location`
    pub fn parse(buf: &[u8], location: BlockNum) -> Self {
        Self {
            location,
            host_id: long_at(buf, 3),
            block_bytes: long_at(buf, 4),
            flags: long_at(buf, 5),
            bad_block_list: long_at(buf, 6),
            partition_list: long_at(buf, 7),
            filesys_header_list: long_at(buf, 8),
            drive_init: long_at(buf, 9),
        }
    }

    /// This is the last disk on the bus
    pub fn is_last_device(&self) -> bool {
        self.flags & RDBFF_LAST != 0
    }

    /// This is the last LUN of its target
    pub fn is_last_lun(&self) -> bool {
        self.flags & RDBFF_LASTLUN != 0
    }
}

/// Search the first blocks of a unit for the RDB
///
/// Blocks are read with the id wildcard so checksum-valid blocks of any kind
/// are looked at; unreadable blocks are skipped. First match wins.
pub fn find_rigid_disk<U: UnitIo>(
    reader: &mut BlockReader<U>,
    buf: &mut [u8],
) -> Result<RigidDiskBlock> {
    for block in 0..RDB_LOCATION_LIMIT {
        if reader.read(block, ANY_ID, buf).is_err() {
            continue;
        }
        if long_at(buf, 0) == IDNAME_RIGIDDISK {
            log::debug!("RDB found, block {}", block);
            return Ok(RigidDiskBlock::parse(buf, block));
        }
    }
    Err(RdbError::NoRigidDisk)
}
