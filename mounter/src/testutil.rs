//! In-crate test helpers

use alloc::vec;
use alloc::vec::Vec;

use rdb::block::checksum::fix_checksum;
use rdb::block::{DeviceCommand, UnitError, UnitIo};
use rdb::format::loadseg::{data_longs, LOAD_DATA_LONG};
use rdb::hunk::memory::{MemoryRegion, RegionAllocator};
use rdb::hunk::{HUNK_CODE, HUNK_END, HUNK_HEADER};
use rdb::types::{put_be_u32, END_OF_CHAIN, IDNAME_LOADSEG};
use rdb::{load_hunks, BlockReader, ChainBudget, LoadedImage, RetryPolicy, SegmentStream};

/// Byte-addressed unit over a vector
pub(crate) struct VecUnit {
    pub data: Vec<u8>,
}

impl UnitIo for VecUnit {
    fn read_sectors(&mut self, sector: u64, buf: &mut [u8]) -> Result<usize, UnitError> {
        let off = sector as usize * 512;
        let src = self.data.get(off..off + buf.len()).ok_or(UnitError::Io(-5))?;
        buf.copy_from_slice(src);
        Ok(buf.len())
    }

    fn write_sectors(&mut self, _sector: u64, _buf: &[u8]) -> Result<usize, UnitError> {
        Err(UnitError::Io(-3))
    }

    fn send_command(&mut self, _cmd: DeviceCommand) -> Result<(), UnitError> {
        Ok(())
    }
}

/// LSEG chain holding `payload`, starting at block 0
pub(crate) fn lseg_chain(payload: &[u32]) -> Vec<u8> {
    let chunks: Vec<&[u32]> = payload.chunks(data_longs(512)).collect();
    let mut data = vec![0u8; (chunks.len() + 1) * 512];
    for (i, chunk) in chunks.iter().enumerate() {
        let b = &mut data[i * 512..(i + 1) * 512];
        put_be_u32(b, 0, IDNAME_LOADSEG);
        put_be_u32(b, 4, 128);
        let next = if i + 1 == chunks.len() { END_OF_CHAIN } else { i as u32 + 1 };
        put_be_u32(b, 16, next);
        for (j, &v) in chunk.iter().enumerate() {
            put_be_u32(b, (LOAD_DATA_LONG + j) * 4, v);
        }
        fix_checksum(b);
    }
    data
}

/// Test allocator with roomy chip and fast regions
pub(crate) fn allocator() -> RegionAllocator {
    RegionAllocator::new(
        MemoryRegion::new(0x0000_4000, 0x1_0000),
        MemoryRegion::new(0x0020_0000, 0x1_0000),
    )
}

/// Load a one-hunk image
pub(crate) fn tiny_image(alloc: &mut RegionAllocator) -> LoadedImage {
    let payload = [HUNK_HEADER, 0, 1, 0, 0, 1, HUNK_CODE, 1, 0x4E75_0000, HUNK_END];
    let unit = VecUnit {
        data: lseg_chain(&payload),
    };
    let mut reader = BlockReader::new(unit, 512, RetryPolicy::default()).unwrap();
    let mut stream = SegmentStream::new(&mut reader, 0, ChainBudget::SEGMENTS).unwrap();
    load_hunks(&mut stream, alloc).unwrap()
}
