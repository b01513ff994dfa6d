//! Retrying, validating single-block reader
//!
//! Spin-up latency deserves patience, persistent faults do not: only
//! [`UnitError::NotReady`] is retried, everything else fails at once since
//! the command layer below already retried internally.

use alloc::vec::Vec;

use super::checksum::block_sum;
use super::{transfer, DeviceCommand, IoData, IoOffset, UnitError, UnitIo};
use crate::error::{RdbError, Result};
use crate::types::{be_u32, BlockNum, ANY_ID, DISK_BLOCK_SIZE, MAX_BLOCK_SIZE};

/// Attempts while the drive reports not ready
pub const MAX_RETRIES: u16 = 3;

/// Attempts with the slow spin-up switch set
pub const MAX_RETRIES_SLOW_SPINUP: u16 = 15;

/// Pause between not-ready attempts
pub const SPINUP_DELAY_US: u32 = 1_000_000;

/// Retry budget for not-ready units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per block
    pub attempts: u16,
    /// Delay between attempts in microseconds
    pub delay_us: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: MAX_RETRIES,
            delay_us: SPINUP_DELAY_US,
        }
    }
}

impl RetryPolicy {
    /// Policy for drives that need a long time to spin up
    pub fn slow_spinup() -> Self {
        Self {
            attempts: MAX_RETRIES_SLOW_SPINUP,
            ..Default::default()
        }
    }

    /// Pick the policy from the spin-up switch
    pub fn for_spinup(slow: bool) -> Self {
        if slow {
            Self::slow_spinup()
        } else {
            Self::default()
        }
    }
}

/// Block reader bound to one unit and one session block size
pub struct BlockReader<U> {
    unit: U,
    block_size: usize,
    policy: RetryPolicy,
    scratch: Vec<u8>,
}

impl<U: UnitIo> BlockReader<U> {
    /// Create a reader. `block_size` must be a multiple of 512 up to 2048.
    pub fn new(unit: U, block_size: usize, policy: RetryPolicy) -> Result<Self> {
        if block_size == 0 || block_size % DISK_BLOCK_SIZE != 0 || block_size > MAX_BLOCK_SIZE {
            return Err(RdbError::UnsupportedBlockSize(block_size));
        }
        let mut scratch = Vec::new();
        scratch
            .try_reserve_exact(block_size)
            .map_err(|_| RdbError::OutOfMemory)?;
        scratch.resize(block_size, 0);
        Ok(Self {
            unit,
            block_size,
            policy,
            scratch,
        })
    }

    /// Session block size in bytes
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Longs per block
    pub fn block_longs(&self) -> usize {
        self.block_size / 4
    }

    /// Underlying unit
    pub fn unit_mut(&mut self) -> &mut U {
        &mut self.unit
    }

    /// Release the unit
    pub fn into_unit(self) -> U {
        self.unit
    }

    /// Read `block` and validate its id and checksum
    ///
    /// `id` may be [`ANY_ID`] to skip the signature check. On error `out`
    /// is left untouched.
    pub fn read(&mut self, block: BlockNum, id: u32, out: &mut [u8]) -> Result<()> {
        if out.len() < self.block_size {
            return Err(RdbError::ShortRead);
        }
        self.fetch(block)?;

        let found = be_u32(&self.scratch, 0);
        #[cfg(feature = "trace-lseg")]
        log::trace!("Read block {} {:08X}", block, found);
        if id != ANY_ID && found != id {
            return Err(RdbError::SignatureMismatch {
                expected: id,
                found,
            });
        }
        let sum = block_sum(&self.scratch);
        if sum != 0 {
            log::debug!("Checksum error {:08X} in block {}", sum, block);
            return Err(RdbError::ChecksumFailed(sum));
        }

        out[..self.block_size].copy_from_slice(&self.scratch);
        Ok(())
    }

    /// Read `block` without id or checksum validation
    pub fn read_raw(&mut self, block: BlockNum, out: &mut [u8]) -> Result<()> {
        if out.len() < self.block_size {
            return Err(RdbError::ShortRead);
        }
        self.fetch(block)?;
        out[..self.block_size].copy_from_slice(&self.scratch);
        Ok(())
    }

    /// Send a data-less command, failures are only logged
    pub fn command(&mut self, cmd: DeviceCommand) {
        if let Err(e) = self.unit.send_command(cmd) {
            log::debug!("{:?} failed: {}", cmd, e);
        }
    }

    /// Transfer one block into the scratch buffer, retrying while not ready
    fn fetch(&mut self, block: BlockNum) -> Result<()> {
        let attempts = self.policy.attempts.max(1);
        for attempt in 0..attempts {
            let res = transfer(
                &mut self.unit,
                IoOffset::for_block(block),
                IoData::In(&mut self.scratch),
            );
            match res {
                Ok(n) if n < self.block_size => {
                    log::debug!("Read block {} short: {} bytes", block, n);
                    return Err(RdbError::ShortRead);
                }
                Ok(_) => return Ok(()),
                Err(UnitError::NotReady) => {
                    // Give the drive more time to spin up
                    log::debug!("Drive not ready.");
                    if attempt + 1 < attempts {
                        self.unit.settle(self.policy.delay_us);
                    }
                }
                Err(UnitError::Io(code)) => {
                    log::debug!("Read block {} error {}", block, code);
                    return Err(RdbError::IoError(code));
                }
            }
        }
        Err(RdbError::NotReady)
    }
}
