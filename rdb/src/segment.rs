//! LSEG chain as a word stream
//!
//! Presents the payload of a load segment chain as a flat sequence of
//! big-endian longs, with half-word reads for the short relocation format.
//! Blocks are fetched lazily through the retrying reader, one at a time.

use alloc::vec::Vec;

use crate::block::reader::BlockReader;
use crate::block::UnitIo;
use crate::error::{RdbError, Result};
use crate::format::chain::{Chain, ChainBudget};
use crate::format::loadseg::{data_longs, LOAD_DATA_LONG};
use crate::types::{long_at, BlockNum, IDNAME_LOADSEG};

/// Reader over the payload of one LSEG chain
pub struct SegmentStream<'r, U> {
    reader: &'r mut BlockReader<U>,
    chain: Chain,
    block: Vec<u8>,
    /// Longs left in `block`
    remaining: usize,
    /// Next payload long to hand out
    offset: usize,
    /// Low half of a long split by `read_word`
    word: Option<u16>,
}

impl<'r, U: UnitIo> SegmentStream<'r, U> {
    /// Start streaming the chain beginning at `head`
    pub fn new(reader: &'r mut BlockReader<U>, head: BlockNum, budget: ChainBudget) -> Result<Self> {
        let size = reader.block_size();
        let mut block = Vec::new();
        block
            .try_reserve_exact(size)
            .map_err(|_| RdbError::OutOfMemory)?;
        block.resize(size, 0);
        Ok(Self {
            reader,
            chain: Chain::new(head, budget),
            block,
            remaining: 0,
            offset: 0,
            word: None,
        })
    }

    /// Number of LSEG blocks fetched so far
    pub fn blocks_read(&self) -> u32 {
        self.chain.visited()
    }

    /// A half-word is buffered
    pub fn has_word(&self) -> bool {
        self.word.is_some()
    }

    /// Drop a buffered half-word (long realignment)
    pub fn align(&mut self) {
        self.word = None;
    }

    /// Fill `out` with whole longs, big-endian as stored on disk
    ///
    /// Bulk reads are always long aligned: a buffered half-word is dropped.
    /// `out` must hold a whole number of longs.
    pub fn read_longs_into(&mut self, out: &mut [u8]) -> Result<()> {
        if out.len() % 4 != 0 {
            return Err(RdbError::UnalignedLength(out.len()));
        }
        self.word = None;
        let mut done = 0;
        while done < out.len() {
            if self.remaining == 0 {
                self.next_block()?;
            }
            let want = (out.len() - done) / 4;
            let take = want.min(self.remaining);
            let src = (LOAD_DATA_LONG + self.offset) * 4;
            out[done..done + take * 4].copy_from_slice(&self.block[src..src + take * 4]);
            self.offset += take;
            self.remaining -= take;
            done += take * 4;
        }
        Ok(())
    }

    /// Read `out.len()` longs
    pub fn read_longs(&mut self, out: &mut [u32]) -> Result<()> {
        self.word = None;
        for v in out.iter_mut() {
            *v = self.next_long()?;
        }
        Ok(())
    }

    /// Read one long, honouring a buffered half-word
    pub fn read_long(&mut self) -> Result<u32> {
        let v = match self.word.take() {
            Some(high) => {
                let temp = self.next_long()?;
                self.word = Some(temp as u16);
                (u32::from(high) << 16) | (temp >> 16)
            }
            None => self.next_long()?,
        };
        #[cfg(feature = "trace-lseg")]
        log::trace!("lseg long {:08X}", v);
        Ok(v)
    }

    /// Read one half-word; every second call is served from the buffer
    pub fn read_word(&mut self) -> Result<u16> {
        if let Some(low) = self.word.take() {
            return Ok(low);
        }
        let temp = self.next_long()?;
        self.word = Some(temp as u16);
        Ok((temp >> 16) as u16)
    }

    fn next_long(&mut self) -> Result<u32> {
        if self.remaining == 0 {
            self.next_block()?;
        }
        let v = long_at(&self.block, LOAD_DATA_LONG + self.offset);
        self.offset += 1;
        self.remaining -= 1;
        Ok(v)
    }

    fn next_block(&mut self) -> Result<()> {
        match self.chain.fetch_raw(self.reader, IDNAME_LOADSEG, &mut self.block) {
            None => {
                log::debug!("LSEG premature end!");
                Err(RdbError::EndOfChain)
            }
            Some(Err(e)) => Err(e),
            Some(Ok(_block)) => {
                #[cfg(feature = "trace-lseg")]
                log::trace!("LSEG block {} loaded, next {:?}", _block, self.chain.peek());
                self.remaining = data_longs(self.block.len());
                self.offset = 0;
                Ok(())
            }
        }
    }
}
