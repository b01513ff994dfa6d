//! Relocating hunk loader
//!
//! Two passes over the segment stream: the header pass allocates every hunk
//! up front, the load pass copies contents and applies relocations. Hunks
//! are kept in an indexed vector until the whole image is loaded; only then
//! are the link longs written and the image handed out. Any failure returns
//! every allocation to the allocator.

use alloc::vec::Vec;

use super::memory::{HunkAllocator, MemFlags};
use super::{
    HunkError, LoadedHunk, LoadedImage, HUNKF_CHIP, HUNKF_FAST, HUNK_BSS, HUNK_CODE, HUNK_DATA,
    HUNK_END, HUNK_HEADER, HUNK_LINK_LONGS, HUNK_RELOC32, HUNK_RELOC32SHORT,
};
use crate::block::UnitIo;
use crate::segment::SegmentStream;

type Result<T> = core::result::Result<T, HunkError>;

/// Load, relocate and link the hunk image read from `stream`
pub fn load_hunks<U: UnitIo, A: HunkAllocator>(
    stream: &mut SegmentStream<'_, U>,
    alloc: &mut A,
) -> Result<LoadedImage> {
    let mut hunks = Vec::new();
    match load_into(stream, alloc, &mut hunks) {
        Ok(()) => {
            let image = LoadedImage::link(hunks);
            alloc.flush_caches();
            log::debug!("reloc ok, first hunk {:08X}", image.entry_address());
            Ok(image)
        }
        Err(e) => {
            log::debug!("reloc failed: {}", e);
            for hunk in hunks.drain(..) {
                alloc.free(hunk.buffer);
            }
            Err(e)
        }
    }
}

fn load_into<U: UnitIo, A: HunkAllocator>(
    stream: &mut SegmentStream<'_, U>,
    alloc: &mut A,
    hunks: &mut Vec<LoadedHunk>,
) -> Result<()> {
    let header = stream.read_long()?;
    if header != HUNK_HEADER {
        return Err(HunkError::BadHeader(header));
    }
    // Resident library list terminator and table size
    stream.read_long()?;
    stream.read_long()?;
    let first = stream.read_long()? as i32;
    let last = stream.read_long()? as i32;
    if first < 0 || last < 0 || first > last {
        return Err(HunkError::InvalidHunkRange { first, last });
    }
    let total = (last - first + 1) as usize;
    log::debug!("first hunk {}, last hunk {}", first, last);

    hunks
        .try_reserve_exact(total)
        .map_err(|_| HunkError::OutOfMemory)?;
    allocate_hunks(stream, alloc, hunks, total)?;
    log::debug!("hunks allocated");

    let mut loaded = 0usize;
    let mut current: Option<usize> = None;
    loop {
        let token = match stream.read_long() {
            Ok(t) => t,
            // Stream may end without a final HUNK_END
            Err(_) if loaded >= total => break,
            Err(e) => return Err(e.into()),
        };
        match token {
            HUNK_CODE | HUNK_DATA | HUNK_BSS => {
                if loaded >= total {
                    return Err(HunkError::TooManyHunks);
                }
                let index = loaded;
                loaded += 1;
                current = Some(index);

                let size = stream.read_long()?;
                let hunk = &mut hunks[index];
                if size > hunk.size_longs {
                    return Err(HunkError::OversizeLoad { hunk: index, size });
                }
                if token != HUNK_BSS {
                    let len = size as usize * 4;
                    stream.read_longs_into(&mut hunk.data_mut()[..len])?;
                }
            }
            HUNK_RELOC32 | HUNK_RELOC32SHORT => {
                let index = current.ok_or(HunkError::RelocWithoutHunk)?;
                relocate(stream, hunks, index, first as u32, token == HUNK_RELOC32SHORT)?;
            }
            HUNK_END => {
                if loaded >= total {
                    break;
                }
            }
            other => {
                log::debug!("Unexpected HUNK {:08X}", other);
                return Err(HunkError::UnexpectedToken(other));
            }
        }
    }
    Ok(())
}

/// Header pass: one allocation per declared hunk
fn allocate_hunks<U: UnitIo, A: HunkAllocator>(
    stream: &mut SegmentStream<'_, U>,
    alloc: &mut A,
    hunks: &mut Vec<LoadedHunk>,
    total: usize,
) -> Result<()> {
    for index in 0..total {
        let head = stream.read_long()?;
        let flags = if head & (HUNKF_CHIP | HUNKF_FAST) == (HUNKF_CHIP | HUNKF_FAST) {
            MemFlags(stream.read_long()?)
        } else if head & HUNKF_CHIP != 0 {
            MemFlags::PUBLIC | MemFlags::CHIP
        } else {
            MemFlags::PUBLIC
        };
        let size_longs = head & !(HUNKF_CHIP | HUNKF_FAST);
        let bytes = (size_longs as usize)
            .checked_add(HUNK_LINK_LONGS)
            .and_then(|n| n.checked_mul(4))
            .ok_or(HunkError::OutOfMemory)?;
        let buffer = alloc
            .allocate(bytes, flags | MemFlags::CLEAR)
            .ok_or(HunkError::OutOfMemory)?;
        log::debug!(
            "hunk {}: addr {:08X}, size {}, memory flags {:08X}",
            index,
            buffer.addr,
            size_longs,
            flags.0
        );
        hunks.push(LoadedHunk {
            buffer,
            size_longs,
            flags,
        });
    }
    Ok(())
}

/// Apply one relocation table to hunk `index`
///
/// Each group is `count, target, offset * count`, terminated by a zero
/// count. Count and target are always longs; the short form stores the
/// offsets as words, and a long read after an odd number of them picks up
/// the buffered half.
fn relocate<U: UnitIo>(
    stream: &mut SegmentStream<'_, U>,
    hunks: &mut [LoadedHunk],
    index: usize,
    first: u32,
    short: bool,
) -> Result<()> {
    loop {
        let count = stream.read_long()?;
        if count == 0 {
            break;
        }
        let raw_target = stream.read_long()?;
        let target = raw_target.wrapping_sub(first) as usize;
        if target >= hunks.len() {
            return Err(HunkError::RelocTargetOutOfRange(raw_target));
        }
        log::debug!("HUNK_RELOC32: relocs {} hunk {}", count, raw_target);
        let value = hunks[target].base();

        let hunk = &mut hunks[index];
        let limit = hunk.size_longs as usize * 4;
        for _ in 0..count {
            let offset = if short {
                u32::from(stream.read_word()?)
            } else {
                stream.read_long()?
            };
            let at = offset as usize;
            if at.checked_add(4).map_or(true, |end| end > limit) {
                return Err(HunkError::RelocOffsetOutOfRange(offset));
            }
            // Byte-wise so odd offsets work as well
            let data = &mut hunk.data_mut()[at..at + 4];
            let v = u32::from_be_bytes([data[0], data[1], data[2], data[3]]).wrapping_add(value);
            data.copy_from_slice(&v.to_be_bytes());
        }
    }
    Ok(())
}
