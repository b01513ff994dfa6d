//! Partition block (PART) and the DOS environment vector it carries

use alloc::string::String;

use super::chain::ChainBlock;
use crate::types::{long_at, BlockNum, DosType, IDNAME_PARTITION};

/// Partition is bootable
pub const PBFF_BOOTABLE: u32 = 1 << 0;
/// Partition must not be mounted
pub const PBFF_NOMOUNT: u32 = 1 << 1;

/// Byte offset of the drive name BSTR
pub const DRIVE_NAME_OFFSET: usize = 36;
/// Size of the drive name field (length byte included)
pub const DRIVE_NAME_SIZE: usize = 32;
/// Longword index of the environment vector
pub const ENVIRONMENT_LONG: usize = 32;

/// Longs of the environment vector copied from the partition
pub const ENVEC_LONGS: usize = 17;

/// Boot priority that marks a node as not bootable
pub const NOT_BOOTABLE_PRI: i32 = -128;

/// DOS environment vector (geometry and buffering)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DosEnvec {
    /// Number of longs that follow
    pub table_size: u32,
    /// Block size in longs
    pub size_block: u32,
    /// Sector origin, unused
    pub sec_org: u32,
    /// Heads
    pub surfaces: u32,
    /// Sectors per block
    pub sectors_per_block: u32,
    /// Blocks per track
    pub blocks_per_track: u32,
    /// Reserved blocks at the start of the partition
    pub reserved: u32,
    /// Reserved blocks at the end of the partition
    pub pre_alloc: u32,
    /// Interleave
    pub interleave: u32,
    /// First cylinder
    pub low_cyl: u32,
    /// Last cylinder
    pub high_cyl: u32,
    /// Filesystem buffers
    pub num_buffers: u32,
    /// Memory type for buffers
    pub buf_mem_type: u32,
    /// Largest single transfer
    pub max_transfer: u32,
    /// DMA address mask
    pub mask: u32,
    /// Boot priority
    pub boot_pri: i32,
    /// Filesystem type
    pub dos_type: DosType,
}

impl DosEnvec {
    /// Decode from the 17 longs starting at `longs[0]`
    pub fn from_longs(l: &[u32; ENVEC_LONGS]) -> Self {
        Self {
            table_size: l[0],
            size_block: l[1],
            sec_org: l[2],
            surfaces: l[3],
            sectors_per_block: l[4],
            blocks_per_track: l[5],
            reserved: l[6],
            pre_alloc: l[7],
            interleave: l[8],
            low_cyl: l[9],
            high_cyl: l[10],
            num_buffers: l[11],
            buf_mem_type: l[12],
            max_transfer: l[13],
            mask: l[14],
            boot_pri: l[15] as i32,
            dos_type: DosType(l[16]),
        }
    }

    /// Encode back to the on-disk long order
    pub fn to_longs(&self) -> [u32; ENVEC_LONGS] {
        [
            self.table_size,
            self.size_block,
            self.sec_org,
            self.surfaces,
            self.sectors_per_block,
            self.blocks_per_track,
            self.reserved,
            self.pre_alloc,
            self.interleave,
            self.low_cyl,
            self.high_cyl,
            self.num_buffers,
            self.buf_mem_type,
            self.max_transfer,
            self.mask,
            self.boot_pri as u32,
            self.dos_type.0,
        ]
    }

    /// Blocks covered by the partition
    pub fn block_count(&self) -> u64 {
        let cyls = u64::from(self.high_cyl.saturating_sub(self.low_cyl)) + 1;
        cyls * u64::from(self.surfaces) * u64::from(self.blocks_per_track)
    }
}

/// Decoded PART block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionBlock {
    /// Next partition or the sentinel
    pub next: BlockNum,
    /// `PBFF_*` flags
    pub flags: u32,
    /// Flags for OpenDevice()
    pub dev_flags: u32,
    /// Drive name without length prefix or colon
    pub drive_name: String,
    /// Geometry and filesystem type
    pub environment: DosEnvec,
}

impl PartitionBlock {
    /// Partition may be booted from
    pub fn is_bootable(&self) -> bool {
        self.flags & PBFF_BOOTABLE != 0
    }

    /// Partition must be skipped by the mounter
    pub fn is_no_mount(&self) -> bool {
        self.flags & PBFF_NOMOUNT != 0
    }

    /// Boot priority to register the node with
    pub fn boot_priority(&self) -> i32 {
        if self.is_bootable() {
            self.environment.boot_pri
        } else {
            NOT_BOOTABLE_PRI
        }
    }
}

impl ChainBlock for PartitionBlock {
    const ID: u32 = IDNAME_PARTITION;

    fn parse(buf: &[u8]) -> Self {
        let mut env = [0u32; ENVEC_LONGS];
        for (i, v) in env.iter_mut().enumerate() {
            *v = long_at(buf, ENVIRONMENT_LONG + i);
        }
        let name = &buf[DRIVE_NAME_OFFSET..DRIVE_NAME_OFFSET + DRIVE_NAME_SIZE];
        Self {
            next: long_at(buf, 4),
            flags: long_at(buf, 5),
            dev_flags: long_at(buf, 8),
            drive_name: bstr_to_string(name),
            environment: DosEnvec::from_longs(&env),
        }
    }
}

/// Decode a BSTR field, clamping the length byte to the field size
pub fn bstr_to_string(field: &[u8]) -> String {
    let len = (field[0] as usize).min(field.len() - 1);
    field[1..=len]
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as char)
        .collect()
}
