//! Host operating system interface
//!
//! Registration differs between host generations: a native host starts
//! handlers itself and keeps a boot list, a legacy host needs boot nodes
//! queued by hand and handlers started by name once DOS is up. The
//! capability descriptor is read once per mount pass and every node goes
//! through [`register_node`].

use alloc::string::String;
use alloc::vec::Vec;

use rdb::format::partition::NOT_BOOTABLE_PRI;

use crate::dosnode::DeviceNode;

/// Expansion library version from which the host is native
pub const NATIVE_EXPANSION_VERSION: u16 = 37;

/// Host generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEra {
    /// Boot nodes and handler start-up handled by the host
    Native,
    /// Manual boot node queueing, handlers started by name
    Legacy,
}

/// What the host can do, resolved once per mount pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostCapabilities {
    /// Host generation
    pub era: HostEra,
    /// DOS is already running (mounting after boot)
    pub dos_running: bool,
}

impl HostCapabilities {
    /// Derive from the expansion library version
    pub fn from_version(expansion_version: u16, dos_running: bool) -> Self {
        let era = if expansion_version >= NATIVE_EXPANSION_VERSION {
            HostEra::Native
        } else {
            HostEra::Legacy
        };
        Self { era, dos_running }
    }

    /// Pick how a node with `boot_pri` is registered
    pub fn choose(&self, boot_pri: i32) -> MountPath {
        let boot = !self.dos_running && boot_pri > NOT_BOOTABLE_PRI;
        match (self.era, boot) {
            (HostEra::Native, true) => MountPath::BootNode,
            (HostEra::Native, false) => MountPath::DosNode {
                start_proc: true,
                start_handler: false,
            },
            (HostEra::Legacy, true) => MountPath::EnqueuedBootNode,
            (HostEra::Legacy, false) => MountPath::DosNode {
                start_proc: false,
                start_handler: self.dos_running,
            },
        }
    }
}

/// How a node was handed to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountPath {
    /// Added to the boot list, handler started by the host
    BootNode,
    /// Boot node built and queued by priority
    EnqueuedBootNode,
    /// Mounted without boot list entry
    DosNode {
        /// Host starts the handler
        start_proc: bool,
        /// Handler started explicitly by name
        start_handler: bool,
    },
}

/// Host services the mounter needs
pub trait MountHost {
    /// Host capabilities
    fn capabilities(&self) -> HostCapabilities;

    /// Names of every mounted volume
    fn mounted_names(&self) -> Vec<String>;

    /// Add a bootable node to the boot list
    fn add_boot_node(&mut self, boot_pri: i32, start_proc: bool, node: DeviceNode);

    /// Add a node without boot list entry
    fn add_dos_node(&mut self, boot_pri: i32, start_proc: bool, node: DeviceNode);

    /// Queue a boot node by priority on a host without boot list support
    fn enqueue_boot_node(&mut self, boot_pri: i32, node: DeviceNode);

    /// Start the handler of `dos_name` (`"DH0:"`)
    fn start_handler(&mut self, dos_name: &str);
}

/// Hand `node` to the host the way `caps` demands
pub fn register_node<H: MountHost + ?Sized>(
    host: &mut H,
    caps: HostCapabilities,
    node: DeviceNode,
    boot_pri: i32,
) -> MountPath {
    let path = caps.choose(boot_pri);
    match path {
        MountPath::BootNode => {
            log::info!("Mounting {} as bootable: pri {}", node.name, boot_pri);
            host.add_boot_node(boot_pri, true, node);
        }
        MountPath::EnqueuedBootNode => {
            log::info!("Mounting {} as bootable (queued): pri {}", node.name, boot_pri);
            host.enqueue_boot_node(boot_pri, node);
        }
        MountPath::DosNode {
            start_proc,
            start_handler,
        } => {
            log::info!("Mounting {} as non-bootable", node.name);
            let dos_name = node.dos_name();
            host.add_dos_node(boot_pri, start_proc, node);
            if start_handler {
                host.start_handler(&dos_name);
            }
        }
    }
    path
}
