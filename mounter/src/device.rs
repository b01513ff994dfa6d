//! SCSI units as seen by the mounter
//!
//! A bus hands out units by exec unit number (`target + lun * 10`). Each
//! unit answers INQUIRY and moves sectors through [`UnitIo`].

use alloc::vec::Vec;

use gpt_disk_io::BlockIo;
use rdb::block::{DeviceCommand, UnitError, UnitIo, IOERR_OPENFAIL};
use rdb::BlockIoUnit;

use crate::error::{MountError, Result};

/// Peripheral device type bits of INQUIRY byte 0
pub const SID_TYPE: u8 = 0x1F;

/// Length of the standard INQUIRY response
pub const INQUIRY_LEN: usize = 36;

/// What kind of unit answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    /// Direct access (type 0)
    Disk,
    /// CD-ROM (type 5)
    Optical,
    /// Anything else, with its type code
    Other(u8),
}

impl DeviceClass {
    /// Classify from INQUIRY byte 0
    pub fn from_device_type(byte0: u8) -> Self {
        match byte0 & SID_TYPE {
            0 => Self::Disk,
            5 => Self::Optical,
            t => Self::Other(t),
        }
    }

    /// Peripheral device type code
    pub fn type_code(self) -> u8 {
        match self {
            Self::Disk => 0,
            Self::Optical => 5,
            Self::Other(t) => t,
        }
    }
}

/// Decoded standard INQUIRY data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InquiryData {
    /// Peripheral qualifier and device type
    pub device: u8,
    /// Vendor identification
    pub vendor: [u8; 8],
    /// Product identification
    pub product: [u8; 16],
    /// Product revision
    pub revision: [u8; 4],
}

impl InquiryData {
    /// Parse a standard INQUIRY response
    pub fn parse(buf: &[u8; INQUIRY_LEN]) -> Self {
        let mut vendor = [0u8; 8];
        let mut product = [0u8; 16];
        let mut revision = [0u8; 4];
        vendor.copy_from_slice(&buf[8..16]);
        product.copy_from_slice(&buf[16..32]);
        revision.copy_from_slice(&buf[32..36]);
        Self {
            device: buf[0],
            vendor,
            product,
            revision,
        }
    }

    /// Minimal response for a given class
    pub fn for_class(class: DeviceClass) -> Self {
        Self {
            device: class.type_code(),
            vendor: *b"        ",
            product: *b"                ",
            revision: *b"    ",
        }
    }

    /// Device class
    pub fn class(&self) -> DeviceClass {
        DeviceClass::from_device_type(self.device)
    }
}

/// An opened SCSI unit
pub trait ScsiUnit: UnitIo {
    /// Issue INQUIRY
    fn inquiry(&mut self) -> core::result::Result<InquiryData, UnitError>;
}

/// Source of units, the mounter's view of the host adapter driver
pub trait ScsiBus {
    /// Opened unit
    type Unit: ScsiUnit;

    /// Open `unit_number`
    fn open(&mut self, unit_number: u32) -> Result<Self::Unit>;

    /// Close a unit returned by [`ScsiBus::open`]
    fn close(&mut self, _unit: Self::Unit) {}
}

/// A unit backed by a block device image
pub struct ImageUnit<B> {
    unit_number: u32,
    class: DeviceClass,
    io: BlockIoUnit<B>,
}

impl<B: BlockIo> ImageUnit<B> {
    /// Exec unit number
    pub fn unit_number(&self) -> u32 {
        self.unit_number
    }

    /// Device class reported by INQUIRY
    pub fn class(&self) -> DeviceClass {
        self.class
    }
}

impl<B: BlockIo> UnitIo for ImageUnit<B> {
    fn read_sectors(&mut self, sector: u64, buf: &mut [u8]) -> core::result::Result<usize, UnitError> {
        self.io.read_sectors(sector, buf)
    }

    fn write_sectors(&mut self, sector: u64, buf: &[u8]) -> core::result::Result<usize, UnitError> {
        self.io.write_sectors(sector, buf)
    }

    fn send_command(&mut self, cmd: DeviceCommand) -> core::result::Result<(), UnitError> {
        self.io.send_command(cmd)
    }
}

impl<B: BlockIo> ScsiUnit for ImageUnit<B> {
    fn inquiry(&mut self) -> core::result::Result<InquiryData, UnitError> {
        Ok(InquiryData::for_class(self.class))
    }
}

struct Slot<B> {
    unit_number: u32,
    class: DeviceClass,
    device: Option<B>,
}

/// A bus of block device images attached at fixed unit numbers
///
/// Useful for emulators and for exercising the mounter against disk
/// images. Opening an empty unit number fails like a missing target.
pub struct ImageBus<B> {
    slots: Vec<Slot<B>>,
}

impl<B> Default for ImageBus<B> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<B: BlockIo> ImageBus<B> {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `device` at `unit_number`, replacing what was there
    pub fn attach(&mut self, unit_number: u32, class: DeviceClass, device: B) {
        self.slots.retain(|s| s.unit_number != unit_number);
        self.slots.push(Slot {
            unit_number,
            class,
            device: Some(device),
        });
    }

    /// Remove and return the device at `unit_number`
    pub fn detach(&mut self, unit_number: u32) -> Option<B> {
        let pos = self.slots.iter().position(|s| s.unit_number == unit_number)?;
        self.slots.remove(pos).device
    }
}

impl<B: BlockIo> ScsiBus for ImageBus<B> {
    type Unit = ImageUnit<B>;

    fn open(&mut self, unit_number: u32) -> Result<Self::Unit> {
        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.unit_number == unit_number)
            .ok_or(MountError::OpenFailed(IOERR_OPENFAIL))?;
        let device = slot
            .device
            .take()
            .ok_or(MountError::OpenFailed(IOERR_OPENFAIL))?;
        Ok(ImageUnit {
            unit_number,
            class: slot.class,
            io: BlockIoUnit::new(device),
        })
    }

    fn close(&mut self, unit: Self::Unit) {
        if let Some(slot) = self
            .slots
            .iter_mut()
            .find(|s| s.unit_number == unit.unit_number)
        {
            slot.device = Some(unit.io.into_inner());
        }
    }
}
