//! Common test utilities: in-memory disks, a recording host

#![allow(dead_code)]

pub mod builder;
pub use builder::{hunk_file, FsSpec, HunkSpec, PartitionSpec, RdbImageBuilder};

use gpt_disk_io::BlockIo;
use gpt_disk_types::{BlockSize, Lba};
use mounter::{
    DeviceClass, DeviceNode, FileSystemRegistry, HostCapabilities, HostEra, ImageBus,
    InquiryData, MountConfig, MountError, MountHost, Mounter, ScsiBus, ScsiUnit,
};
use rdb::block::{DeviceCommand, UnitError, UnitIo, IOERR_BADADDRESS, IOERR_NOCMD, IOERR_OPENFAIL};
use rdb::hunk::memory::{MemoryRegion, RegionAllocator};
use rdb::DosType;
use std::io;

/// In-memory block device for testing
#[derive(Debug, Clone)]
pub struct MemoryBlockDevice {
    pub data: Vec<u8>,
    pub block_size: usize,
}

impl MemoryBlockDevice {
    /// Create a new memory block device from raw data
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            block_size: 512,
        }
    }

    /// Create with 2048-byte blocks, like an optical drive
    pub fn optical(data: Vec<u8>) -> Self {
        Self {
            data,
            block_size: 2048,
        }
    }

    /// Blank device of `blocks` 512-byte blocks
    pub fn blank(blocks: usize) -> Self {
        Self::new(vec![0u8; blocks * 512])
    }

    /// Optical device holding only an ISO9660 primary volume descriptor
    pub fn minimal_iso() -> Self {
        let mut data = vec![0u8; 20 * 2048];
        let pvd = 16 * 2048;
        data[pvd] = 1;
        data[pvd + 1..pvd + 6].copy_from_slice(b"CD001");
        data[pvd + 6] = 1;
        let term = 17 * 2048;
        data[term] = 255;
        data[term + 1..term + 6].copy_from_slice(b"CD001");
        data[term + 6] = 1;
        Self::optical(data)
    }
}

impl BlockIo for MemoryBlockDevice {
    type Error = io::Error;

    fn block_size(&self) -> BlockSize {
        BlockSize::new(self.block_size as u32).expect("valid block size")
    }

    fn num_blocks(&mut self) -> Result<u64, Self::Error> {
        Ok((self.data.len() / self.block_size) as u64)
    }

    fn read_blocks(&mut self, start_lba: Lba, dst: &mut [u8]) -> Result<(), Self::Error> {
        let offset = start_lba.0 as usize * self.block_size;
        if offset + dst.len() > self.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read beyond end of device",
            ));
        }
        dst.copy_from_slice(&self.data[offset..offset + dst.len()]);
        Ok(())
    }

    fn write_blocks(&mut self, start_lba: Lba, src: &[u8]) -> Result<(), Self::Error> {
        let offset = start_lba.0 as usize * self.block_size;
        if offset + src.len() > self.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "write beyond end of device",
            ));
        }
        self.data[offset..offset + src.len()].copy_from_slice(src);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// How the host was asked to register a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Boot { start_proc: bool },
    Dos { start_proc: bool },
    Enqueued,
}

/// One node handed to the host
#[derive(Debug, Clone)]
pub struct Mounted {
    pub node: DeviceNode,
    pub boot_pri: i32,
    pub how: Registration,
}

/// Host that records every registration
#[derive(Debug)]
pub struct RecordingHost {
    pub caps: HostCapabilities,
    pub mounted: Vec<Mounted>,
    pub started: Vec<String>,
}

impl RecordingHost {
    /// Native host before DOS is up
    pub fn native() -> Self {
        Self::with_caps(HostEra::Native, false)
    }

    pub fn with_caps(era: HostEra, dos_running: bool) -> Self {
        Self {
            caps: HostCapabilities { era, dos_running },
            mounted: Vec::new(),
            started: Vec::new(),
        }
    }

    /// Names in registration order
    pub fn names(&self) -> Vec<String> {
        self.mounted.iter().map(|m| m.node.name.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Mounted> {
        self.mounted.iter().find(|m| m.node.name == name)
    }
}

impl MountHost for RecordingHost {
    fn capabilities(&self) -> HostCapabilities {
        self.caps
    }

    fn mounted_names(&self) -> Vec<String> {
        self.names()
    }

    fn add_boot_node(&mut self, boot_pri: i32, start_proc: bool, node: DeviceNode) {
        self.mounted.push(Mounted {
            node,
            boot_pri,
            how: Registration::Boot { start_proc },
        });
    }

    fn add_dos_node(&mut self, boot_pri: i32, start_proc: bool, node: DeviceNode) {
        self.mounted.push(Mounted {
            node,
            boot_pri,
            how: Registration::Dos { start_proc },
        });
    }

    fn enqueue_boot_node(&mut self, boot_pri: i32, node: DeviceNode) {
        self.mounted.push(Mounted {
            node,
            boot_pri,
            how: Registration::Enqueued,
        });
    }

    fn start_handler(&mut self, dos_name: &str) {
        self.started.push(dos_name.to_string());
    }
}

/// Allocator with separate chip and fast regions
pub fn allocator() -> RegionAllocator {
    RegionAllocator::new(
        MemoryRegion::new(0x0001_0000, 0x4_0000),
        MemoryRegion::new(0x0100_0000, 0x10_0000),
    )
}

/// Bus with one disk image at `unit`
pub fn disk_bus(unit: u32, image: Vec<u8>) -> ImageBus<MemoryBlockDevice> {
    let mut bus = ImageBus::new();
    bus.attach(unit, DeviceClass::Disk, MemoryBlockDevice::new(image));
    bus
}

/// Unit serving a byte image, with scripted not-ready answers
#[derive(Debug)]
pub struct ScriptedUnit {
    pub unit: u32,
    pub class: DeviceClass,
    pub data: Vec<u8>,
    /// Reads that answer not ready before the drive comes up
    pub not_ready: u32,
    pub settles: u32,
    pub commands: Vec<DeviceCommand>,
    pub inquiry_error: Option<UnitError>,
}

impl ScriptedUnit {
    pub fn new(unit: u32, class: DeviceClass, data: Vec<u8>) -> Self {
        Self {
            unit,
            class,
            data,
            not_ready: 0,
            settles: 0,
            commands: Vec::new(),
            inquiry_error: None,
        }
    }

    pub fn not_ready(mut self, reads: u32) -> Self {
        self.not_ready = reads;
        self
    }
}

impl UnitIo for ScriptedUnit {
    fn read_sectors(&mut self, sector: u64, buf: &mut [u8]) -> Result<usize, UnitError> {
        if self.not_ready > 0 {
            self.not_ready -= 1;
            return Err(UnitError::NotReady);
        }
        let off = sector as usize * 512;
        let src = self
            .data
            .get(off..off + buf.len())
            .ok_or(UnitError::Io(IOERR_BADADDRESS))?;
        buf.copy_from_slice(src);
        Ok(buf.len())
    }

    fn write_sectors(&mut self, _sector: u64, _buf: &[u8]) -> Result<usize, UnitError> {
        Err(UnitError::Io(IOERR_NOCMD))
    }

    fn send_command(&mut self, cmd: DeviceCommand) -> Result<(), UnitError> {
        self.commands.push(cmd);
        Ok(())
    }

    fn settle(&mut self, _micros: u32) {
        self.settles += 1;
    }
}

impl ScsiUnit for ScriptedUnit {
    fn inquiry(&mut self) -> Result<InquiryData, UnitError> {
        match self.inquiry_error {
            Some(e) => Err(e),
            None => Ok(InquiryData::for_class(self.class)),
        }
    }
}

/// Bus of scripted units; closed units are kept for inspection
#[derive(Debug, Default)]
pub struct ScriptedBus {
    pub units: Vec<ScriptedUnit>,
    pub closed: Vec<ScriptedUnit>,
    pub opened: Vec<u32>,
}

impl ScriptedBus {
    pub fn with(units: Vec<ScriptedUnit>) -> Self {
        Self {
            units,
            ..Default::default()
        }
    }

    pub fn closed_unit(&self, unit: u32) -> Option<&ScriptedUnit> {
        self.closed.iter().find(|u| u.unit == unit)
    }
}

impl ScsiBus for ScriptedBus {
    type Unit = ScriptedUnit;

    fn open(&mut self, unit_number: u32) -> mounter::Result<ScriptedUnit> {
        self.opened.push(unit_number);
        let pos = self
            .units
            .iter()
            .position(|u| u.unit == unit_number)
            .ok_or(MountError::OpenFailed(IOERR_OPENFAIL))?;
        Ok(self.units.remove(pos))
    }

    fn close(&mut self, unit: ScriptedUnit) {
        self.closed.push(unit);
    }
}

/// Publish a driver for `dos_type` in `registry` by mounting a scratch disk
pub fn seed_filesystem(registry: &FileSystemRegistry, dos_type: DosType, version: u32) {
    let image = RdbImageBuilder::new()
        .partition(PartitionSpec::new("SEED", dos_type))
        .filesystem(FsSpec::new(dos_type, version, hunk_file(&[HunkSpec::code(&[0x4E75_0000])])))
        .build();
    let mut mounter = Mounter::with_registry(MountConfig::default(), registry);
    let mut host = RecordingHost::native();
    mounter.mount_all(&mut disk_bus(0, image), &mut allocator(), &mut host);
    assert!(registry.find(dos_type).is_some(), "seed filesystem not loaded");
}
