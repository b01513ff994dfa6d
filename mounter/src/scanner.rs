//! RDB scanner
//!
//! Finds the Rigid Disk Block of one unit, walks its partition list and
//! mounts every partition not flagged NOMOUNT. The filesystem for each
//! partition is looked up in the FSHD list; a matching driver that is not
//! yet resident (or only in an older version) is loaded from its LSEG chain
//! and published in the registry before the partition is registered.

use alloc::vec::Vec;

use rdb::format::chain::Chain;
use rdb::format::filesys::{FileSysHeaderBlock, Version};
use rdb::format::partition::PartitionBlock;
use rdb::format::rigid::find_rigid_disk;
use rdb::hunk::LoadedImage;
use rdb::{
    load_hunks, BlockNum, BlockReader, DeviceCommand, DosType, HunkAllocator, SegmentStream,
    UnitIo,
};

use crate::config::MountConfig;
use crate::dosnode::{fix_device_name, DeviceNode};
use crate::error::{MountError, Result};
use crate::host::{register_node, HostCapabilities, MountHost};
use crate::registry::{FileSystemRegistry, FsHandler};

/// Outcome of scanning one unit with an RDB
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RdbScan {
    /// Block the RDB was found in
    pub rdb_block: BlockNum,
    /// Partition blocks read
    pub partitions: u32,
    /// Partitions handed to the host
    pub mounted: u32,
    /// Filesystem images loaded into the registry
    pub filesystems_loaded: u32,
    /// The RDB says no further units follow
    pub last_device: bool,
    /// The RDB says no further LUNs follow on this target
    pub last_lun: bool,
}

/// Allocate a zeroed block buffer
pub(crate) fn block_buffer(size: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(size)
        .map_err(|_| MountError::OutOfMemory)?;
    buf.resize(size, 0);
    Ok(buf)
}

/// Scanner for one opened unit
pub struct RdbScanner<'s, U> {
    reader: &'s mut BlockReader<U>,
    registry: &'s FileSystemRegistry,
    config: &'s MountConfig,
    caps: HostCapabilities,
    unit_number: u32,
}

impl<'s, U: UnitIo> RdbScanner<'s, U> {
    /// Create a scanner over `reader`
    pub fn new(
        reader: &'s mut BlockReader<U>,
        registry: &'s FileSystemRegistry,
        config: &'s MountConfig,
        caps: HostCapabilities,
        unit_number: u32,
    ) -> Self {
        Self {
            reader,
            registry,
            config,
            caps,
            unit_number,
        }
    }

    /// Scan the unit and mount its partitions
    ///
    /// Fails only when no RDB is found. The motor is switched off
    /// afterwards either way.
    pub fn scan<A, H>(&mut self, alloc: &mut A, host: &mut H) -> Result<RdbScan>
    where
        A: HunkAllocator,
        H: MountHost + ?Sized,
    {
        let res = self.scan_partitions(alloc, host);
        self.reader.command(DeviceCommand::Motor { on: false });
        res
    }

    fn scan_partitions<A, H>(&mut self, alloc: &mut A, host: &mut H) -> Result<RdbScan>
    where
        A: HunkAllocator,
        H: MountHost + ?Sized,
    {
        let block_size = self.reader.block_size();
        let mut buf = block_buffer(block_size)?;
        let rdb = find_rigid_disk(self.reader, &mut buf)?;
        log::info!("Unit {}: RDB at block {}", self.unit_number, rdb.location);

        let mut scan = RdbScan {
            rdb_block: rdb.location,
            ..Default::default()
        };
        let mut fs_buf = block_buffer(block_size)?;
        let mut parts = Chain::new(rdb.partition_list, self.config.partition_budget);
        while let Some(res) = parts.fetch::<PartitionBlock, _>(self.reader, &mut buf) {
            let (block, part) = match res {
                Ok(p) => p,
                Err(e) => {
                    log::debug!("Partition list ended: {}", e);
                    break;
                }
            };
            scan.partitions += 1;
            log::debug!("PART found, block {}, '{}'", block, part.drive_name);
            if part.is_no_mount() {
                continue;
            }

            let dos_type = part.environment.dos_type;
            let (fs, loaded) =
                self.resolve_filesystem(rdb.filesys_header_list, dos_type, &mut fs_buf, alloc);
            if loaded {
                scan.filesystems_loaded += 1;
            }
            self.mount_partition(host, &part, fs.as_ref());
            scan.mounted += 1;
        }

        scan.last_device = !self.config.ignore_last && rdb.is_last_device();
        scan.last_lun = rdb.is_last_lun();
        Ok(scan)
    }

    /// Find the driver for `dos_type`, loading it from the disk if needed
    ///
    /// Returns the registry's current entry for the dostype and whether
    /// this call published a new one.
    fn resolve_filesystem<A: HunkAllocator>(
        &mut self,
        head: BlockNum,
        dos_type: DosType,
        buf: &mut [u8],
        alloc: &mut A,
    ) -> (Option<FsHandler>, bool) {
        let mut loaded = false;
        let mut headers = Chain::new(head, self.config.filesystem_budget);
        while let Some(res) = headers.fetch::<FileSysHeaderBlock, _>(self.reader, buf) {
            let Ok((block, fshd)) = res else {
                break;
            };
            log::debug!(
                "FSHD found, block {}, dostype {}, looking for dostype {}",
                block,
                fshd.dos_type,
                dos_type
            );
            if fshd.dos_type != dos_type {
                continue;
            }

            if let Some(mut entry) = self
                .registry
                .lookup_or_prepare(&fshd, self.config.creator_name())
            {
                match self.load_filesystem(fshd.seglist_blocks(), alloc) {
                    Ok(image) => entry.attach(image),
                    Err(e) => log::warn!(
                        "Filesystem {} {} failed to load: {}",
                        fshd.dos_type,
                        Version(fshd.version),
                        e
                    ),
                }
                loaded = match self.registry.commit(entry) {
                    Ok(()) => true,
                    Err(rejected) => {
                        rejected.discard(alloc);
                        false
                    }
                };
            }
            break;
        }
        (self.registry.find(dos_type), loaded)
    }

    fn load_filesystem<A: HunkAllocator>(&mut self, head: BlockNum, alloc: &mut A) -> Result<LoadedImage> {
        let mut stream = SegmentStream::new(self.reader, head, self.config.segment_budget)?;
        Ok(load_hunks(&mut stream, alloc)?)
    }

    fn mount_partition<H: MountHost + ?Sized>(
        &mut self,
        host: &mut H,
        part: &PartitionBlock,
        fs: Option<&FsHandler>,
    ) {
        let mut name = part.drive_name.clone();
        let taken = host.mounted_names();
        fix_device_name(&mut name, &taken[..]);

        let mut node = DeviceNode::new(
            name,
            &self.config.device_name,
            self.unit_number,
            part.dev_flags,
            part.environment,
        );
        if let Some(fs) = fs {
            node.apply_patch(fs);
        }
        register_node(host, self.caps, node, part.boot_priority());
    }
}
