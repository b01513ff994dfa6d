//! On-disk RDB structures
//!
//! Every block starts with its four-character id followed by the number of
//! summed longs, the checksum and the id of the host adapter that wrote it:
//!
//! ```text
//! long  0    1             2          3        4      5 ...
//!      +----+-------------+----------+--------+------+---------
//!      | id | summed_longs| checksum | hostid | next | payload
//!      +----+-------------+----------+--------+------+---------
//! ```
//!
//! RDSK has no `next` field; PART, FSHD and LSEG chain through it.

pub mod chain;
pub mod filesys;
pub mod loadseg;
pub mod partition;
pub mod rigid;

pub use chain::{Chain, ChainBlock, ChainBudget};
pub use filesys::{FileSysHeaderBlock, HandlerFields};
pub use partition::{DosEnvec, PartitionBlock};
pub use rigid::{find_rigid_disk, RigidDiskBlock};
