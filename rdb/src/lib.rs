//! Rigid Disk Block (RDB) volume loader
//!
//! A `no_std` implementation of the on-disk partition table used by SCSI
//! boot firmware, together with the relocating loader for the filesystem
//! driver images stored inside it.
//!
//! # Overview
//!
//! A disk carrying an RDB stores three linked lists of checksummed blocks:
//! - `PART` blocks describing partitions (geometry, boot priority, dostype)
//! - `FSHD` blocks describing filesystem drivers, keyed by dostype
//! - `LSEG` blocks carrying a driver's executable image in hunk format
//!
//! # Architecture
//!
//! The implementation is layered:
//! 1. **Block layer** - unit I/O contract, retrying checksummed reads
//! 2. **Format layer** - typed views over RDSK/PART/FSHD/LSEG blocks
//! 3. **Segment layer** - flattens an LSEG chain into a word stream
//! 4. **Hunk layer** - allocates, loads and relocates an executable image
//!
//! # Usage
//!
//! ```ignore
//! use rdb::{BlockReader, RetryPolicy, SegmentStream, load_hunks};
//!
//! let mut reader = BlockReader::new(&mut unit, 512, RetryPolicy::default())?;
//! let mut stream = SegmentStream::new(&mut reader, fshd.seglist_blocks(), budget)?;
//! let image = load_hunks(&mut stream, &mut allocator)?;
//! ```

#![no_std]
#![warn(missing_docs)]

extern crate alloc;

pub mod block;
pub mod error;
pub mod format;
pub mod hunk;
pub mod segment;
pub mod types;

pub use error::{RdbError, Result};
pub use types::{BlockNum, DosType, END_OF_CHAIN};

// High-level API exports
pub use block::reader::{BlockReader, RetryPolicy};
pub use block::{BlockIoUnit, DeviceCommand, UnitError, UnitIo};
pub use format::chain::ChainBudget;
pub use hunk::loader::load_hunks;
pub use hunk::memory::{HunkAllocator, MemFlags, RegionAllocator};
pub use hunk::{HunkError, LoadedImage};
pub use segment::SegmentStream;
