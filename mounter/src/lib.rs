//! Boot-time automounter for RDB partitioned SCSI units
//!
//! Runs once per host adapter before DOS comes up (or later, when a driver
//! is loaded by hand). Every unit on the bus is inquired; disks and optical
//! units are searched for a Rigid Disk Block, their partitions registered
//! with the host and any filesystem driver stored on the disk loaded into
//! the shared filesystem registry. Optical units without an RDB boot from
//! the resident CD filesystem.
//!
//! # Usage
//!
//! ```ignore
//! use mounter::{MountConfig, Mounter};
//!
//! let config = MountConfig::from_dip_switches(dip);
//! let mut mounter = Mounter::new(config);
//! let summary = mounter.mount_all(&mut bus, &mut allocator, &mut host);
//! log::info!("{} volumes", summary.mounted);
//! ```

#![no_std]
#![warn(missing_docs)]

extern crate alloc;

pub mod config;
pub mod device;
pub mod dosnode;
pub mod error;
pub mod host;
pub mod optical;
pub mod orchestrator;
pub mod registry;
pub mod scanner;

#[cfg(test)]
mod testutil;

pub use config::MountConfig;
pub use device::{DeviceClass, ImageBus, ImageUnit, InquiryData, ScsiBus, ScsiUnit};
pub use dosnode::{fix_device_name, DeviceNode};
pub use error::{MountError, Result};
pub use host::{register_node, HostCapabilities, HostEra, MountHost, MountPath};
pub use optical::OpticalBoot;
pub use orchestrator::{MountSummary, Mounter, UnitOutcome, UnitReport};
pub use registry::{FileSystemRegistry, FsHandler, FsListing, PreparedEntry};
pub use scanner::{RdbScan, RdbScanner};
