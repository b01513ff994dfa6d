//! Unit I/O contract
//!
//! The SCSI command layer underneath is interrupt driven, but this crate only
//! ever asks it for one synchronous transfer at a time. A unit is addressed
//! in 512-byte sectors; the session block size only decides how many bytes a
//! transfer moves.

pub mod checksum;
pub mod reader;

use alloc::vec::Vec;
use core::fmt;
use gpt_disk_io::BlockIo;
use gpt_disk_types::Lba;

use crate::types::{BlockNum, SECTOR_SHIFT};

/// exec I/O error codes
pub const IOERR_OPENFAIL: i32 = -1;
/// Command not supported by the unit
pub const IOERR_NOCMD: i32 = -3;
/// Transfer length not a multiple of the sector size
pub const IOERR_BADLENGTH: i32 = -4;
/// Offset not sector aligned or beyond the medium
pub const IOERR_BADADDRESS: i32 = -5;

/// Error returned by a unit transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitError {
    /// Drive is spinning up; the only condition worth retrying
    NotReady,
    /// Any other failure. The command layer already retried internally.
    Io(i32),
}

impl fmt::Display for UnitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady => write!(f, "unit not ready"),
            Self::Io(code) => write!(f, "I/O error {}", code),
        }
    }
}

/// Device commands that move no data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    /// Spin the motor up or down
    Motor {
        /// `true` to start
        on: bool,
    },
}

/// Synchronous single-request access to one SCSI unit
pub trait UnitIo {
    /// Read `buf.len()` bytes starting at 512-byte sector `sector`.
    /// Returns the number of bytes transferred.
    fn read_sectors(&mut self, sector: u64, buf: &mut [u8]) -> Result<usize, UnitError>;

    /// Write `buf.len()` bytes starting at 512-byte sector `sector`.
    fn write_sectors(&mut self, sector: u64, buf: &[u8]) -> Result<usize, UnitError>;

    /// Send a command without data phase
    fn send_command(&mut self, cmd: DeviceCommand) -> Result<(), UnitError>;

    /// Wait `micros` microseconds before the next attempt
    fn settle(&mut self, _micros: u32) {}
}

impl<U: UnitIo + ?Sized> UnitIo for &mut U {
    fn read_sectors(&mut self, sector: u64, buf: &mut [u8]) -> Result<usize, UnitError> {
        (**self).read_sectors(sector, buf)
    }

    fn write_sectors(&mut self, sector: u64, buf: &[u8]) -> Result<usize, UnitError> {
        (**self).write_sectors(sector, buf)
    }

    fn send_command(&mut self, cmd: DeviceCommand) -> Result<(), UnitError> {
        (**self).send_command(cmd)
    }

    fn settle(&mut self, micros: u32) {
        (**self).settle(micros)
    }
}

/// Byte offset as carried by the two request generations
///
/// Classic requests hold the offset in one long, 64-bit requests split it
/// across two. Both reduce to a sector number and go through [`transfer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOffset {
    /// 32-bit byte offset (`CMD_READ` / `CMD_WRITE`)
    Short(u32),
    /// 64-bit byte offset (`TD_READ64` / `TD_WRITE64`)
    Long {
        /// Upper 32 bits
        high: u32,
        /// Lower 32 bits
        low: u32,
    },
}

impl IoOffset {
    /// Offset of `block`, using the short form whenever it fits
    pub fn for_block(block: BlockNum) -> Self {
        let bytes = u64::from(block) << SECTOR_SHIFT;
        match u32::try_from(bytes) {
            Ok(short) => Self::Short(short),
            Err(_) => Self::Long {
                high: (bytes >> 32) as u32,
                low: bytes as u32,
            },
        }
    }

    /// Full byte offset
    pub fn bytes(self) -> u64 {
        match self {
            Self::Short(off) => u64::from(off),
            Self::Long { high, low } => (u64::from(high) << 32) | u64::from(low),
        }
    }

    /// Sector number; the offset must be sector aligned
    pub fn sector(self) -> Result<u64, UnitError> {
        let bytes = self.bytes();
        if bytes & ((1 << SECTOR_SHIFT) - 1) != 0 {
            return Err(UnitError::Io(IOERR_BADADDRESS));
        }
        Ok(bytes >> SECTOR_SHIFT)
    }
}

/// Data phase of a request
pub enum IoData<'a> {
    /// Device to memory
    In(&'a mut [u8]),
    /// Memory to device
    Out(&'a [u8]),
}

/// Execute one transfer for either request generation
pub fn transfer<U: UnitIo + ?Sized>(
    unit: &mut U,
    offset: IoOffset,
    data: IoData<'_>,
) -> Result<usize, UnitError> {
    let sector = offset.sector()?;
    match data {
        IoData::In(buf) => unit.read_sectors(sector, buf),
        IoData::Out(buf) => unit.write_sectors(sector, buf),
    }
}

/// Serve a unit from any [`BlockIo`] device
///
/// Sector addressing is converted to the device's own LBA size; transfers
/// that do not line up with device blocks go through a bounce buffer.
/// Device errors are terminal, they never report [`UnitError::NotReady`].
pub struct BlockIoUnit<B> {
    inner: B,
    bounce: Vec<u8>,
}

impl<B: BlockIo> BlockIoUnit<B> {
    /// Wrap a block device
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            bounce: Vec::new(),
        }
    }

    /// Access the wrapped device
    pub fn inner_mut(&mut self) -> &mut B {
        &mut self.inner
    }

    /// Unwrap the device
    pub fn into_inner(self) -> B {
        self.inner
    }

    /// (first lba, block count, offset into first block) covering the range
    fn span(&self, sector: u64, len: usize) -> (u64, usize, usize) {
        let bs = u64::from(self.inner.block_size().to_u32());
        let start = sector << SECTOR_SHIFT;
        let end = start + len as u64;
        let first = start / bs;
        let last = end.div_ceil(bs);
        (first, (last - first) as usize, (start - first * bs) as usize)
    }

    fn fill_bounce(&mut self, first: u64, count: usize) -> Result<(), UnitError> {
        let bs = self.inner.block_size().to_u32() as usize;
        self.bounce.clear();
        self.bounce.resize(count * bs, 0);
        self.inner
            .read_blocks(Lba(first), &mut self.bounce)
            .map_err(|e| {
                log::debug!("block device read at lba {} failed: {}", first, e);
                UnitError::Io(IOERR_BADADDRESS)
            })
    }
}

impl<B: BlockIo> UnitIo for BlockIoUnit<B> {
    fn read_sectors(&mut self, sector: u64, buf: &mut [u8]) -> Result<usize, UnitError> {
        if buf.is_empty() {
            return Ok(0);
        }
        let (first, count, skip) = self.span(sector, buf.len());
        self.fill_bounce(first, count)?;
        buf.copy_from_slice(&self.bounce[skip..skip + buf.len()]);
        Ok(buf.len())
    }

    fn write_sectors(&mut self, sector: u64, buf: &[u8]) -> Result<usize, UnitError> {
        if buf.is_empty() {
            return Ok(0);
        }
        let (first, count, skip) = self.span(sector, buf.len());
        // Read-modify-write keeps neighbouring bytes of partial blocks
        self.fill_bounce(first, count)?;
        self.bounce[skip..skip + buf.len()].copy_from_slice(buf);
        self.inner
            .write_blocks(Lba(first), &self.bounce)
            .map_err(|e| {
                log::debug!("block device write at lba {} failed: {}", first, e);
                UnitError::Io(IOERR_BADADDRESS)
            })?;
        Ok(buf.len())
    }

    fn send_command(&mut self, cmd: DeviceCommand) -> Result<(), UnitError> {
        match cmd {
            DeviceCommand::Motor { on: false } => self
                .inner
                .flush()
                .map_err(|_| UnitError::Io(IOERR_NOCMD)),
            DeviceCommand::Motor { on: true } => Ok(()),
        }
    }
}
