//! Disk-resident linked lists
//!
//! PART, FSHD and LSEG blocks are chained through the `next` long at the
//! same position in every block. A [`Chain`] walks such a list one fetch at
//! a time: each fetch costs a (possibly retried) read, so the walk is never
//! replayed. The format itself has no cycle detection, a step budget bounds
//! every walk.

use crate::block::reader::BlockReader;
use crate::block::UnitIo;
use crate::error::{RdbError, Result};
use crate::types::{long_at, BlockNum, END_OF_CHAIN};

/// Longword index of the `next` pointer in chained blocks
pub const NEXT_LONG: usize = 4;

/// Maximum number of blocks a single list walk may visit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainBudget(pub u32);

impl ChainBudget {
    /// Partition list
    pub const PARTITIONS: ChainBudget = ChainBudget(128);
    /// Filesystem header list
    pub const FILESYSTEMS: ChainBudget = ChainBudget(128);
    /// Load segment list of one filesystem image (8 MiB of 512-byte blocks)
    pub const SEGMENTS: ChainBudget = ChainBudget(16 * 1024);
}

/// A block that is a node of an on-disk list
pub trait ChainBlock: Sized {
    /// Signature every node must carry
    const ID: u32;

    /// Decode a validated block
    fn parse(buf: &[u8]) -> Self;
}

/// Cursor over an on-disk list
#[derive(Debug)]
pub struct Chain {
    next: BlockNum,
    budget: ChainBudget,
    visited: u32,
}

impl Chain {
    /// Start a walk at `head`
    pub fn new(head: BlockNum, budget: ChainBudget) -> Self {
        Self {
            next: head,
            budget,
            visited: 0,
        }
    }

    /// Whether the walk has ended
    pub fn is_done(&self) -> bool {
        self.next == END_OF_CHAIN
    }

    /// Number of blocks fetched so far
    pub fn visited(&self) -> u32 {
        self.visited
    }

    /// Block the next fetch will read
    pub fn peek(&self) -> Option<BlockNum> {
        (!self.is_done()).then_some(self.next)
    }

    /// Read the next node into `buf` and advance
    ///
    /// `None` once the sentinel is reached. An error ends the walk: later
    /// calls return `None`.
    pub fn fetch_raw<U: UnitIo>(
        &mut self,
        reader: &mut BlockReader<U>,
        id: u32,
        buf: &mut [u8],
    ) -> Option<Result<BlockNum>> {
        if self.is_done() {
            return None;
        }
        if self.visited >= self.budget.0 {
            log::warn!(
                "Block chain exceeded {} blocks at block {}, giving up",
                self.budget.0,
                self.next
            );
            self.next = END_OF_CHAIN;
            return Some(Err(RdbError::ChainBudgetExceeded));
        }
        self.visited += 1;

        let block = self.next;
        match reader.read(block, id, buf) {
            Ok(()) => {
                self.next = long_at(buf, NEXT_LONG);
                Some(Ok(block))
            }
            Err(e) => {
                self.next = END_OF_CHAIN;
                Some(Err(e))
            }
        }
    }

    /// Read and decode the next node
    pub fn fetch<T: ChainBlock, U: UnitIo>(
        &mut self,
        reader: &mut BlockReader<U>,
        buf: &mut [u8],
    ) -> Option<Result<(BlockNum, T)>> {
        self.fetch_raw(reader, T::ID, buf)
            .map(|res| res.map(|block| (block, T::parse(buf))))
    }
}
