//! Optical boot fallback
//!
//! An optical unit without an RDB can still be booted with the resident
//! CD filesystem (`CD01`). Such a node gets a fixed 2048-byte geometry and
//! boot priority 2, and is added straight to the boot list.

use alloc::format;

use rdb::format::partition::{DosEnvec, ENVEC_LONGS};
use rdb::types::SECTOR_SHIFT;
use rdb::{BlockNum, BlockReader, DosType, UnitIo};

use crate::config::MountConfig;
use crate::dosnode::{fix_device_name, DeviceNode};
use crate::error::{MountError, Result};
use crate::host::MountHost;
use crate::registry::FileSystemRegistry;
use crate::scanner::block_buffer;

/// Sector size of optical media
pub const ISO_SECTOR_SIZE: usize = 2048;

/// First volume descriptor sector
pub const VOLUME_DESCRIPTOR_START: u32 = 16;

/// Volume descriptor standard identifier
pub const ISO_STANDARD_ID: &[u8; 5] = b"CD001";

/// Primary volume descriptor type code
pub const PRIMARY_VOLUME_DESCRIPTOR: u8 = 1;

/// Boot priority of optical boot nodes
pub const OPTICAL_BOOT_PRI: i32 = 2;

/// Block number of the first volume descriptor in 512-byte units
pub fn volume_descriptor_block() -> BlockNum {
    VOLUME_DESCRIPTOR_START * (ISO_SECTOR_SIZE >> SECTOR_SHIFT) as u32
}

/// Fixed environment of an optical boot node
pub fn optical_envec() -> DosEnvec {
    DosEnvec {
        table_size: ENVEC_LONGS as u32,
        size_block: (ISO_SECTOR_SIZE / 4) as u32,
        sec_org: 0,
        surfaces: 1,
        sectors_per_block: 1,
        blocks_per_track: 1,
        reserved: 0,
        pre_alloc: 0,
        interleave: 0,
        low_cyl: 0,
        high_cyl: 0,
        num_buffers: 5,
        buf_mem_type: 1,
        max_transfer: 0x0010_0000,
        mask: 0x7FFF_FFFE,
        boot_pri: OPTICAL_BOOT_PRI,
        dos_type: DosType::CDFS,
    }
}

/// Whether the medium carries an ISO9660 primary volume descriptor
///
/// The reader must be set up for 2048-byte blocks.
pub fn has_iso_volume<U: UnitIo>(reader: &mut BlockReader<U>) -> Result<bool> {
    let mut buf = block_buffer(reader.block_size())?;
    if let Err(e) = reader.read_raw(volume_descriptor_block(), &mut buf) {
        log::debug!("Volume descriptor read failed: {}", e);
        return Ok(false);
    }
    Ok(buf[0] == PRIMARY_VOLUME_DESCRIPTOR && &buf[1..6] == ISO_STANDARD_ID)
}

/// Names optical boot nodes `CD0`, `CD1`, ...
#[derive(Debug, Default)]
pub struct OpticalBoot {
    mounted: u32,
}

impl OpticalBoot {
    /// Create with the counter at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Optical nodes added so far
    pub fn mounted(&self) -> u32 {
        self.mounted
    }

    /// Add a boot node for the unit using the resident CD filesystem
    pub fn mount<U, H>(
        &mut self,
        reader: &mut BlockReader<U>,
        registry: &FileSystemRegistry,
        config: &MountConfig,
        host: &mut H,
        unit_number: u32,
    ) -> Result<()>
    where
        U: UnitIo,
        H: MountHost + ?Sized,
    {
        let Some(fs) = registry.find(DosType::CDFS) else {
            log::info!("Could not load filesystem {}", DosType::CDFS);
            return Err(MountError::NoFileSystem(DosType::CDFS));
        };
        if config.iso_probe && !has_iso_volume(reader)? {
            log::info!("Unit {}: no ISO9660 volume", unit_number);
            return Err(MountError::NotIsoVolume);
        }

        let mut name = format!("CD{}", self.mounted);
        let taken = host.mounted_names();
        fix_device_name(&mut name, &taken[..]);

        let mut node = DeviceNode::new(name, &config.device_name, unit_number, 0, optical_envec());
        node.apply_patch(&fs);
        log::info!("Mounting {} as bootable: pri {}", node.name, OPTICAL_BOOT_PRI);
        host.add_boot_node(OPTICAL_BOOT_PRI, true, node);
        self.mounted += 1;
        Ok(())
    }
}
