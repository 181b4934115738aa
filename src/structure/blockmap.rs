use tracing::{trace, warn};

use crate::consts::{BlockPointer, BLOCK_SIZE, FREEMAP_INDEX};
use crate::driver::DeviceDriver;
use crate::io::IO;
use crate::structure::superblock::SuperBlock;
use crate::util::error::{Error, Result};

/// Free-block bitmap. A set bit marks a free block, a cleared bit an
/// allocated one.
pub struct BlockMap {
    pub(crate) first_block: BlockPointer,
    block_count: u32,
    protected_until: BlockPointer,
    data: Vec<u8>,
}

impl BlockMap {
    /// A fresh map for a newly formatted volume: metadata blocks allocated,
    /// everything else free.
    pub fn new(superblock: &SuperBlock) -> BlockMap {
        let mut map = BlockMap {
            first_block: FREEMAP_INDEX,
            block_count: superblock.block_count,
            protected_until: superblock.first_data_block(),
            data: vec![0; superblock.bitmap_blocks() as usize * BLOCK_SIZE],
        };
        for i in map.protected_until..map.block_count {
            map.mark_free_mem(i);
        }
        map
    }

    pub(crate) fn read<A: DeviceDriver>(io: &IO<A>, superblock: &SuperBlock) -> Result<BlockMap> {
        let mut data = Vec::with_capacity(superblock.bitmap_blocks() as usize * BLOCK_SIZE);
        for i in 0..superblock.bitmap_blocks() {
            data.append(&mut io.read_block(FREEMAP_INDEX + i)?);
        }
        Ok(BlockMap {
            first_block: FREEMAP_INDEX,
            block_count: superblock.block_count,
            protected_until: superblock.first_data_block(),
            data,
        })
    }

    fn write_part<A: DeviceDriver>(&self, io: &mut IO<A>, including_index: BlockPointer) -> Result<()> {
        let block = including_index as usize / BLOCK_SIZE / 8;
        let data = &self.data[block * BLOCK_SIZE..(block + 1) * BLOCK_SIZE];
        io.write_block(self.first_block + block as BlockPointer, data)
    }

    pub(crate) fn write_full<A: DeviceDriver>(&self, io: &mut IO<A>) -> Result<()> {
        for (i, chunk) in self.data.chunks(BLOCK_SIZE).enumerate() {
            io.write_block(self.first_block + i as BlockPointer, chunk)?;
        }
        Ok(())
    }

    /// Hands out the lowest free block at or after the bitmap itself. The
    /// block's contents are left as they are.
    pub(crate) fn allocate<A: DeviceDriver>(&mut self, io: &mut IO<A>) -> Result<BlockPointer> {
        let index = (self.first_block..self.block_count)
            .find(|&i| self.is_free(i))
            .ok_or(Error::NoSpace)?;
        self.mark_used_mem(index);
        if let Err(err) = self.write_part(io, index) {
            self.mark_free_mem(index);
            return Err(err);
        }
        trace!(block = index, "allocated block");
        Ok(index)
    }

    /// Returns a block to the pool. Metadata blocks and indices past the end
    /// of the volume are ignored.
    pub(crate) fn free<A: DeviceDriver>(&mut self, io: &mut IO<A>, index: BlockPointer) -> Result<()> {
        if index < self.protected_until || index >= self.block_count {
            warn!(block = index, "refusing to free protected or out-of-range block");
            return Ok(());
        }
        self.mark_free_mem(index);
        self.write_part(io, index)?;
        trace!(block = index, "freed block");
        Ok(())
    }

    pub fn is_free(&self, index: BlockPointer) -> bool {
        index < self.block_count && self.data[(index / 8) as usize] & (1 << (index % 8)) != 0
    }

    pub fn free_count(&self) -> u32 {
        (0..self.block_count).filter(|&i| self.is_free(i)).count() as u32
    }

    pub fn block_count(&self) -> u32 {
        self.block_count
    }

    fn mark_used_mem(&mut self, index: BlockPointer) {
        let byte_index = (index / 8) as usize;
        let bit_index = index % 8;
        self.data[byte_index] &= !(1 << bit_index);
    }

    fn mark_free_mem(&mut self, index: BlockPointer) {
        let byte_index = (index / 8) as usize;
        let bit_index = index % 8;
        self.data[byte_index] |= 1 << bit_index;
    }
}
