//! Mount configuration.
//!
//! Options for one automount pass over a host adapter.

use alloc::string::String;

use rdb::{ChainBudget, RetryPolicy};

/// Exec device name used when none is configured.
pub const DEFAULT_DEVICE_NAME: &str = "scsi.device";

/// Board DIP switch bits.
pub mod switches {
    /// Host adapter SCSI id (bits 0-2).
    pub const HOST_ID_MASK: u8 = 0x07;
    /// Set: short spin-up. Clear: wait for slow drives.
    pub const SHORT_SPINUP: u8 = 1 << 4;
    /// Set: LUNs disabled.
    pub const LUNS_DISABLED: u8 = 1 << 7;
}

/// Automount configuration.
#[derive(Debug, Clone)]
pub struct MountConfig {
    /// Device driver name put into every device node.
    pub device_name: String,
    /// Creator recorded in filesystem registry entries.
    /// If None, the device name is used.
    pub creator: Option<String>,
    /// Probe LUNs 1-7 behind each target.
    pub luns: bool,
    /// Allow drives a long time to spin up.
    pub slow_spinup: bool,
    /// Mount and boot from optical units.
    pub cdrom_boot: bool,
    /// Require an ISO9660 volume before the optical fallback mounts.
    pub iso_probe: bool,
    /// Keep scanning after an RDB with the LAST flag.
    pub ignore_last: bool,
    /// SCSI id of the host adapter itself, never scanned.
    pub host_id: Option<u32>,
    /// Step budget of the partition list.
    pub partition_budget: ChainBudget,
    /// Step budget of the filesystem header list.
    pub filesystem_budget: ChainBudget,
    /// Step budget of one load segment list.
    pub segment_budget: ChainBudget,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            device_name: String::from(DEFAULT_DEVICE_NAME),
            creator: None,
            luns: false,
            slow_spinup: false,
            cdrom_boot: true,
            iso_probe: false,
            ignore_last: false,
            host_id: None,
            partition_budget: ChainBudget::PARTITIONS,
            filesystem_budget: ChainBudget::FILESYSTEMS,
            segment_budget: ChainBudget::SEGMENTS,
        }
    }
}

impl MountConfig {
    /// Create config from the board's DIP switches.
    pub fn from_dip_switches(dip: u8) -> Self {
        Self {
            host_id: Some(u32::from(dip & switches::HOST_ID_MASK)),
            luns: dip & switches::LUNS_DISABLED == 0,
            slow_spinup: dip & switches::SHORT_SPINUP == 0,
            ..Default::default()
        }
    }

    /// Set device name.
    pub fn device(mut self, name: &str) -> Self {
        self.device_name = String::from(name);
        self
    }

    /// Set registry creator.
    pub fn creator(mut self, name: &str) -> Self {
        self.creator = Some(String::from(name));
        self
    }

    /// Enable or disable LUN scanning.
    pub fn luns(mut self, enabled: bool) -> Self {
        self.luns = enabled;
        self
    }

    /// Enable or disable the long spin-up wait.
    pub fn slow_spinup(mut self, enabled: bool) -> Self {
        self.slow_spinup = enabled;
        self
    }

    /// Enable or disable optical boot.
    pub fn cdrom_boot(mut self, enabled: bool) -> Self {
        self.cdrom_boot = enabled;
        self
    }

    /// Enable or disable the ISO9660 check of the optical fallback.
    pub fn iso_probe(mut self, enabled: bool) -> Self {
        self.iso_probe = enabled;
        self
    }

    /// Ignore the RDB LAST flag.
    pub fn ignore_last(mut self, ignore: bool) -> Self {
        self.ignore_last = ignore;
        self
    }

    /// Set the host adapter id to skip.
    pub fn host_id(mut self, id: u32) -> Self {
        self.host_id = Some(id);
        self
    }

    /// Set list traversal budgets.
    pub fn budgets(mut self, partitions: u32, filesystems: u32, segments: u32) -> Self {
        self.partition_budget = ChainBudget(partitions);
        self.filesystem_budget = ChainBudget(filesystems);
        self.segment_budget = ChainBudget(segments);
        self
    }

    /// Creator string for registry entries.
    pub fn creator_name(&self) -> &str {
        self.creator.as_deref().unwrap_or(&self.device_name)
    }

    /// Not-ready retry policy from the spin-up setting.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::for_spinup(self.slow_spinup)
    }
}
