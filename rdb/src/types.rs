//! Core types and constants for RDB structures

use core::fmt;

/// Block number as stored in RDB pointers
pub type BlockNum = u32;

/// Terminal sentinel for every on-disk `next` pointer
pub const END_OF_CHAIN: BlockNum = 0xFFFF_FFFF;

/// Block id wildcard: accept any signature
pub const ANY_ID: u32 = 0xFFFF_FFFF;

/// Byte offset unit of a block number (`block << 9`)
pub const SECTOR_SHIFT: u32 = 9;

/// Block size of direct-access (disk) units
pub const DISK_BLOCK_SIZE: usize = 512;

/// Block size of optical units
pub const OPTICAL_BLOCK_SIZE: usize = 2048;

/// Largest block size the loader handles
pub const MAX_BLOCK_SIZE: usize = OPTICAL_BLOCK_SIZE;

/// The RDB must live in one of the first 16 blocks
pub const RDB_LOCATION_LIMIT: BlockNum = 16;

/// "RDSK"
pub const IDNAME_RIGIDDISK: u32 = 0x5244_534B;
/// "PART"
pub const IDNAME_PARTITION: u32 = 0x5041_5254;
/// "FSHD"
pub const IDNAME_FILESYSHEADER: u32 = 0x4653_4844;
/// "LSEG"
pub const IDNAME_LOADSEG: u32 = 0x4C53_4547;

/// Four-byte filesystem type code
///
/// Compared by exact equality of all four bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DosType(pub u32);

impl DosType {
    /// `DOS\0` - original filesystem
    pub const OFS: DosType = DosType(0x444F_5300);
    /// `DOS\1` - fast filesystem
    pub const FFS: DosType = DosType(0x444F_5301);
    /// `CD01` - built-in optical filesystem
    pub const CDFS: DosType = DosType(0x4344_3031);

    /// Build from the four characters, most significant first
    pub const fn from_bytes(b: [u8; 4]) -> Self {
        DosType(u32::from_be_bytes(b))
    }

    /// Raw big-endian bytes
    pub const fn to_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for DosType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.to_bytes();
        for &c in &b[..3] {
            let c = if c.is_ascii_graphic() { c } else { b'?' };
            write!(f, "{}", c as char)?;
        }
        // DOS\1 prints as DOS1
        let last = if b[3] < 0x30 { b[3] + 0x30 } else { b[3] };
        let last = if last.is_ascii_graphic() { last } else { b'?' };
        write!(f, "{}", last as char)
    }
}

impl fmt::Debug for DosType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DosType({:08X} \"{}\")", self.0, self)
    }
}

/// Read big-endian long at byte offset
#[inline]
pub fn be_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

/// Write big-endian long at byte offset
#[inline]
pub fn put_be_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

/// Read the `index`-th big-endian long of a block
#[inline]
pub fn long_at(buf: &[u8], index: usize) -> u32 {
    be_u32(buf, index * 4)
}
