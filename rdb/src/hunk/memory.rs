//! Hunk memory
//!
//! Hunks are placed in a 32-bit address space split into memory classes
//! (chip RAM reachable by the custom chips, fast RAM that is not). Relocation
//! needs the bus address of every hunk, so an allocation hands out both the
//! address and the backing bytes.
//!
//! # Usage
//!
//! ```ignore
//! use rdb::hunk::memory::{MemoryRegion, RegionAllocator};
//!
//! let mut alloc = RegionAllocator::new(
//!     MemoryRegion::new(0x0000_4000, 512 * 1024),
//!     MemoryRegion::new(0x0020_0000, 8 * 1024 * 1024),
//! );
//! ```

use alloc::vec::Vec;
use core::ops::BitOr;

/// Memory class and allocation attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemFlags(pub u32);

impl MemFlags {
    /// Any memory
    pub const PUBLIC: MemFlags = MemFlags(1 << 0);
    /// Chip RAM only
    pub const CHIP: MemFlags = MemFlags(1 << 1);
    /// Fast RAM only
    pub const FAST: MemFlags = MemFlags(1 << 2);
    /// Zero-fill the allocation
    pub const CLEAR: MemFlags = MemFlags(1 << 16);

    /// All bits of `other` are set
    pub const fn contains(self, other: MemFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for MemFlags {
    type Output = MemFlags;

    fn bitor(self, rhs: MemFlags) -> MemFlags {
        MemFlags(self.0 | rhs.0)
    }
}

/// One allocation: its bus address and backing bytes
#[derive(Debug, PartialEq, Eq)]
pub struct HunkBuffer {
    /// Bus address of `bytes[0]`
    pub addr: u32,
    /// Backing storage
    pub bytes: Vec<u8>,
}

impl HunkBuffer {
    /// Allocation size in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the allocation is empty
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Source of hunk memory
pub trait HunkAllocator {
    /// Allocate `bytes` bytes of the class selected by `flags`
    fn allocate(&mut self, bytes: usize, flags: MemFlags) -> Option<HunkBuffer>;

    /// Return an allocation
    fn free(&mut self, buf: HunkBuffer);

    /// Make freshly written code visible to instruction fetch
    fn flush_caches(&mut self) {}
}

impl<A: HunkAllocator + ?Sized> HunkAllocator for &mut A {
    fn allocate(&mut self, bytes: usize, flags: MemFlags) -> Option<HunkBuffer> {
        (**self).allocate(bytes, flags)
    }

    fn free(&mut self, buf: HunkBuffer) {
        (**self).free(buf)
    }

    fn flush_caches(&mut self) {
        (**self).flush_caches()
    }
}

/// Allocation granularity
pub const MEM_BLOCK_SIZE: u32 = 8;

/// Align a value up to the given power-of-two alignment.
#[inline]
pub const fn align_up(val: u32, align: u32) -> u32 {
    (val + align - 1) & !(align - 1)
}

/// An address range of one memory class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    /// Base address
    pub base: u32,
    /// Size in bytes
    pub size: u32,
}

impl MemoryRegion {
    /// Create a new memory region.
    pub const fn new(base: u32, size: u32) -> Self {
        Self { base, size }
    }

    /// A region with no space
    pub const fn empty() -> Self {
        Self { base: 0, size: 0 }
    }

    /// One past the last address
    pub fn end(&self) -> u64 {
        u64::from(self.base) + u64::from(self.size)
    }
}

#[derive(Debug)]
struct Arena {
    region: MemoryRegion,
    next: u32,
}

impl Arena {
    fn new(region: MemoryRegion) -> Self {
        Self {
            region,
            next: align_up(region.base, MEM_BLOCK_SIZE),
        }
    }

    fn carve(&mut self, bytes: usize) -> Option<u32> {
        let len = u32::try_from(bytes).ok()?;
        let len = len.checked_add(MEM_BLOCK_SIZE - 1)? & !(MEM_BLOCK_SIZE - 1);
        let addr = self.next;
        if u64::from(addr) + u64::from(len) > self.region.end() {
            return None;
        }
        self.next = addr + len;
        Some(addr)
    }

    fn contains(&self, addr: u32) -> bool {
        addr >= self.region.base && u64::from(addr) < self.region.end()
    }
}

/// Bump allocator over one chip and one fast region
///
/// Public requests prefer fast memory and fall back to chip. Freed memory
/// is only accounted, the address range is not reused.
#[derive(Debug)]
pub struct RegionAllocator {
    chip: Arena,
    fast: Arena,
    allocations: u32,
    frees: u32,
    live_bytes: usize,
    flushes: u32,
}

impl RegionAllocator {
    /// Create an allocator over the given regions
    pub fn new(chip: MemoryRegion, fast: MemoryRegion) -> Self {
        Self {
            chip: Arena::new(chip),
            fast: Arena::new(fast),
            allocations: 0,
            frees: 0,
            live_bytes: 0,
            flushes: 0,
        }
    }

    /// Successful allocations so far
    pub fn allocations(&self) -> u32 {
        self.allocations
    }

    /// Frees so far
    pub fn frees(&self) -> u32 {
        self.frees
    }

    /// Allocations not yet freed
    pub fn live(&self) -> u32 {
        self.allocations.saturating_sub(self.frees)
    }

    /// Bytes held by live allocations
    pub fn live_bytes(&self) -> usize {
        self.live_bytes
    }

    /// Cache flush requests so far
    pub fn flushes(&self) -> u32 {
        self.flushes
    }

    /// Address lies in chip memory
    pub fn is_chip(&self, addr: u32) -> bool {
        self.chip.contains(addr)
    }
}

impl HunkAllocator for RegionAllocator {
    fn allocate(&mut self, bytes: usize, flags: MemFlags) -> Option<HunkBuffer> {
        let addr = if flags.contains(MemFlags::CHIP) {
            self.chip.carve(bytes)
        } else if flags.contains(MemFlags::FAST) {
            self.fast.carve(bytes)
        } else {
            self.fast.carve(bytes).or_else(|| self.chip.carve(bytes))
        }?;

        let mut storage = Vec::new();
        storage.try_reserve_exact(bytes).ok()?;
        // Backing storage always starts zeroed, CLEAR is implied
        storage.resize(bytes, 0);

        self.allocations += 1;
        self.live_bytes += bytes;
        Some(HunkBuffer {
            addr,
            bytes: storage,
        })
    }

    fn free(&mut self, buf: HunkBuffer) {
        self.frees += 1;
        self.live_bytes = self.live_bytes.saturating_sub(buf.len());
    }

    fn flush_caches(&mut self) {
        self.flushes += 1;
    }
}
