//! Device nodes
//!
//! A device node tells the host which driver, unit and geometry a volume
//! lives on, and which handler serves it. Nodes start with the host's
//! default handler fields and are patched from the filesystem registry.

use alloc::string::String;

use rdb::format::filesys::HandlerFields;
use rdb::format::partition::DosEnvec;

use crate::registry::FsHandler;

/// Handler stack size of a fresh node, in bytes
pub const DEFAULT_STACK_SIZE: u32 = 600;

/// Handler process priority of a fresh node
pub const DEFAULT_PRIORITY: u32 = 10;

/// A volume ready to be handed to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceNode {
    /// Volume name without colon
    pub name: String,
    /// Exec device driver name
    pub device: String,
    /// Exec unit number
    pub unit: u32,
    /// OpenDevice flags
    pub flags: u32,
    /// Geometry and filesystem type
    pub environment: DosEnvec,
    /// Handler fields
    pub handler: HandlerFields,
}

impl DeviceNode {
    /// Build a node with default handler fields
    pub fn new(name: String, device: &str, unit: u32, flags: u32, environment: DosEnvec) -> Self {
        let mut handler = HandlerFields::default();
        handler.set(HandlerFields::STACK_SIZE, DEFAULT_STACK_SIZE);
        handler.set(HandlerFields::PRIORITY, DEFAULT_PRIORITY);
        Self {
            name,
            device: String::from(device),
            unit,
            flags,
            environment,
            handler,
        }
    }

    /// Replace the handler fields selected by the filesystem's patch flags
    pub fn apply_patch(&mut self, fs: &FsHandler) {
        self.handler.patch_from(&fs.handler, fs.patch_flags);
    }

    /// Name as used in paths (`DH0:`)
    pub fn dos_name(&self) -> String {
        let mut s = self.name.clone();
        s.push(':');
        s
    }
}

/// Rename `name` until it collides with none of `taken`
///
/// Names compare case-insensitively. A name ending in `.<digit>` below 9
/// has its digit bumped, any other name gets `.1` appended.
pub fn fix_device_name<S: AsRef<str>>(name: &mut String, taken: &[S]) {
    while taken.iter().any(|t| t.as_ref().eq_ignore_ascii_case(name)) {
        log::debug!("Duplicate device name '{}'", name);
        bump_suffix(name);
        log::debug!("-> new device name '{}'", name);
    }
}

fn bump_suffix(name: &mut String) {
    let b = name.as_bytes();
    let len = b.len();
    if len > 2 && b[len - 2] == b'.' && (b'0'..b'9').contains(&b[len - 1]) {
        let next = (b[len - 1] + 1) as char;
        name.pop();
        name.push(next);
    } else {
        name.push_str(".1");
    }
}
