//! Mount pass over one host adapter
//!
//! Walks SCSI targets 0-7 (and LUNs 0-7 when enabled), classifies every
//! unit that opens by its INQUIRY data and mounts what it finds: RDB
//! partitions on disks and optical units, or the resident CD filesystem on
//! optical units without an RDB.

use alloc::vec::Vec;

use rdb::types::{DISK_BLOCK_SIZE, OPTICAL_BLOCK_SIZE};
use rdb::{BlockReader, HunkAllocator, RdbError};

use crate::config::MountConfig;
use crate::device::{DeviceClass, ScsiBus, ScsiUnit};
use crate::error::{MountError, Result};
use crate::host::{HostCapabilities, MountHost};
use crate::optical::OpticalBoot;
use crate::registry::{self, FileSystemRegistry};
use crate::scanner::{RdbScan, RdbScanner};

/// SCSI targets per bus
pub const MAX_TARGETS: u32 = 8;

/// LUNs per target
pub const MAX_LUNS: u32 = 8;

/// Exec unit number of `target` / `lun`
pub const fn unit_number(target: u32, lun: u32) -> u32 {
    target + lun * 10
}

/// What happened to one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOutcome {
    /// RDB found and its partitions processed
    Rdb(RdbScan),
    /// Mounted through the optical fallback
    Optical,
    /// Device class not mounted (unsupported or disabled)
    Skipped,
    /// Unit did not open
    OpenFailed(MountError),
    /// Unit opened but nothing was mounted
    Failed(MountError),
}

/// Report for one unit visited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitReport {
    /// Exec unit number
    pub unit: u32,
    /// Class from INQUIRY, if the unit answered
    pub class: Option<DeviceClass>,
    /// Outcome
    pub outcome: UnitOutcome,
}

impl UnitReport {
    /// Volumes this unit contributed
    pub fn mounted(&self) -> u32 {
        match self.outcome {
            UnitOutcome::Rdb(scan) => scan.mounted,
            UnitOutcome::Optical => 1,
            _ => 0,
        }
    }

    fn last_flags(&self) -> Option<(bool, bool)> {
        match self.outcome {
            UnitOutcome::Rdb(scan) => Some((scan.last_device, scan.last_lun)),
            _ => None,
        }
    }
}

/// Result of a mount pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountSummary {
    /// Every unit visited, in scan order
    pub units: Vec<UnitReport>,
    /// Volumes handed to the host
    pub mounted: u32,
}

impl MountSummary {
    /// Report for `unit`, if it was visited
    pub fn unit(&self, unit: u32) -> Option<&UnitReport> {
        self.units.iter().find(|r| r.unit == unit)
    }
}

/// Automounter for one host adapter
pub struct Mounter<'r> {
    config: MountConfig,
    registry: &'r FileSystemRegistry,
    optical: OpticalBoot,
}

impl Mounter<'static> {
    /// Create a mounter publishing to the process-wide registry
    pub fn new(config: MountConfig) -> Self {
        Self::with_registry(config, registry::global())
    }
}

impl<'r> Mounter<'r> {
    /// Create a mounter publishing to `registry`
    pub fn with_registry(config: MountConfig, registry: &'r FileSystemRegistry) -> Self {
        Self {
            config,
            registry,
            optical: OpticalBoot::new(),
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &MountConfig {
        &self.config
    }

    /// Registry in use
    pub fn registry(&self) -> &'r FileSystemRegistry {
        self.registry
    }

    /// Scan every unit on `bus` and mount what is found
    ///
    /// Never fails as a whole; per-unit errors end up in the reports.
    ///
    /// The LAST and LASTLUN flags come from the most recently scanned RDB
    /// and stay in effect until another RDB is read, so a unit without one
    /// does not clear them.
    pub fn mount_all<B, A, H>(&mut self, bus: &mut B, alloc: &mut A, host: &mut H) -> MountSummary
    where
        B: ScsiBus,
        A: HunkAllocator,
        H: MountHost + ?Sized,
    {
        let caps = host.capabilities();
        let luns = if self.config.luns { MAX_LUNS } else { 1 };
        let mut summary = MountSummary::default();
        let mut last_device = false;
        let mut last_lun = false;

        'targets: for target in 0..MAX_TARGETS {
            if self.config.host_id == Some(target) {
                log::debug!("Skipping host adapter id {}", target);
                continue;
            }
            for lun in 0..luns {
                let unit = unit_number(target, lun);
                let mut dev = match bus.open(unit) {
                    Ok(dev) => dev,
                    Err(e) => {
                        log::debug!("OpenDevice({}, {}) failed: {}", self.config.device_name, unit, e);
                        summary.units.push(UnitReport {
                            unit,
                            class: None,
                            outcome: UnitOutcome::OpenFailed(e),
                        });
                        break;
                    }
                };

                let report = self.mount_unit(&mut dev, unit, caps, alloc, host);
                bus.close(dev);

                if let Some(flags) = report.last_flags() {
                    (last_device, last_lun) = flags;
                }
                summary.mounted += report.mounted();
                summary.units.push(report);
                if last_device {
                    log::debug!("RDBFF_LAST exit");
                    break 'targets;
                }
                if last_lun {
                    break;
                }
            }
        }

        log::info!("Mounted {} volumes", summary.mounted);
        summary
    }

    fn mount_unit<U, A, H>(
        &mut self,
        dev: &mut U,
        unit: u32,
        caps: HostCapabilities,
        alloc: &mut A,
        host: &mut H,
    ) -> UnitReport
    where
        U: ScsiUnit,
        A: HunkAllocator,
        H: MountHost + ?Sized,
    {
        let class = match dev.inquiry() {
            Ok(inq) => inq.class(),
            Err(e) => {
                log::debug!("Unit {}: INQUIRY failed: {}", unit, e);
                return UnitReport {
                    unit,
                    class: None,
                    outcome: UnitOutcome::Failed(MountError::Inquiry(e)),
                };
            }
        };

        let outcome = match class {
            DeviceClass::Disk => self.scan_disk(dev, unit, caps, alloc, host),
            DeviceClass::Optical if !self.config.cdrom_boot => {
                log::info!("CDROM boot disabled.");
                UnitOutcome::Skipped
            }
            DeviceClass::Optical => self.scan_optical(dev, unit, caps, alloc, host),
            DeviceClass::Other(t) => {
                log::info!("Don't know how to boot from device type {}.", t);
                UnitOutcome::Skipped
            }
        };
        UnitReport {
            unit,
            class: Some(class),
            outcome,
        }
    }

    fn scan_disk<U, A, H>(
        &mut self,
        dev: &mut U,
        unit: u32,
        caps: HostCapabilities,
        alloc: &mut A,
        host: &mut H,
    ) -> UnitOutcome
    where
        U: ScsiUnit,
        A: HunkAllocator,
        H: MountHost + ?Sized,
    {
        let res = BlockReader::new(dev, DISK_BLOCK_SIZE, self.config.retry_policy())
            .map_err(MountError::from)
            .and_then(|mut reader| self.scan_rdb(&mut reader, unit, caps, alloc, host));
        match res {
            Ok(scan) => UnitOutcome::Rdb(scan),
            Err(e) => {
                log::info!("Unit {}: {}", unit, e);
                UnitOutcome::Failed(e)
            }
        }
    }

    fn scan_optical<U, A, H>(
        &mut self,
        dev: &mut U,
        unit: u32,
        caps: HostCapabilities,
        alloc: &mut A,
        host: &mut H,
    ) -> UnitOutcome
    where
        U: ScsiUnit,
        A: HunkAllocator,
        H: MountHost + ?Sized,
    {
        let mut reader = match BlockReader::new(dev, OPTICAL_BLOCK_SIZE, self.config.retry_policy()) {
            Ok(r) => r,
            Err(e) => return UnitOutcome::Failed(e.into()),
        };
        match self.scan_rdb(&mut reader, unit, caps, alloc, host) {
            Ok(scan) => return UnitOutcome::Rdb(scan),
            Err(MountError::Rdb(RdbError::NoRigidDisk)) => {}
            Err(e) => {
                log::info!("Unit {}: {}", unit, e);
                return UnitOutcome::Failed(e);
            }
        }

        match self
            .optical
            .mount(&mut reader, self.registry, &self.config, host, unit)
        {
            Ok(()) => UnitOutcome::Optical,
            Err(e) => UnitOutcome::Failed(e),
        }
    }

    fn scan_rdb<U, A, H>(
        &self,
        reader: &mut BlockReader<U>,
        unit: u32,
        caps: HostCapabilities,
        alloc: &mut A,
        host: &mut H,
    ) -> Result<RdbScan>
    where
        U: rdb::UnitIo,
        A: HunkAllocator,
        H: MountHost + ?Sized,
    {
        RdbScanner::new(reader, self.registry, &self.config, caps, unit).scan(alloc, host)
    }
}
