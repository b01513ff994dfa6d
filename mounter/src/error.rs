//! Mount errors

use core::fmt;

use rdb::block::UnitError;
use rdb::{DosType, HunkError, RdbError};

/// Result type for mount operations
pub type Result<T> = core::result::Result<T, MountError>;

/// Why a unit or partition was not mounted
///
/// None of these abort the whole mount pass; they end the current unit
/// and are recorded in its report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountError {
    /// Unit could not be opened (device error code)
    OpenFailed(i32),
    /// INQUIRY failed
    Inquiry(UnitError),
    /// RDB structures could not be read
    Rdb(RdbError),
    /// Filesystem image failed to load
    Hunk(HunkError),
    /// No registered filesystem for the dostype
    NoFileSystem(DosType),
    /// Optical medium has no ISO9660 primary volume descriptor
    NotIsoVolume,
    /// Allocation failure
    OutOfMemory,
}

impl fmt::Display for MountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenFailed(code) => write!(f, "OpenDevice failed: {}", code),
            Self::Inquiry(e) => write!(f, "INQUIRY failed: {}", e),
            Self::Rdb(e) => write!(f, "{}", e),
            Self::Hunk(e) => write!(f, "{}", e),
            Self::NoFileSystem(t) => write!(f, "Could not load filesystem {}", t),
            Self::NotIsoVolume => write!(f, "No ISO9660 volume"),
            Self::OutOfMemory => write!(f, "Out of memory"),
        }
    }
}

impl From<RdbError> for MountError {
    fn from(e: RdbError) -> Self {
        match e {
            RdbError::OutOfMemory => MountError::OutOfMemory,
            e => MountError::Rdb(e),
        }
    }
}

impl From<HunkError> for MountError {
    fn from(e: HunkError) -> Self {
        match e {
            HunkError::OutOfMemory => MountError::OutOfMemory,
            e => MountError::Hunk(e),
        }
    }
}
