use crate::consts::{
    BlockPointer, BITS_PER_BLOCK, BLOCK_SIZE, FREEMAP_INDEX, INODES_PER_BLOCK, MAGIC, SUPERBLOCK_INDEX,
};
use crate::driver::DeviceDriver;
use crate::io::IO;
use crate::util::error::{Error, Result};
use crate::util::serializable::{read_u32, write_u32, ByteSerializable, KnownSize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
    pub magic: u32,
    pub block_count: u32,
    pub inode_count: u32,
    pub first_inode_block: BlockPointer,
}

impl SuperBlock {
    pub fn new(block_count: u32, inode_count: u32) -> SuperBlock {
        let bitmap_blocks = Self::bitmap_blocks_for(block_count);
        SuperBlock {
            magic: MAGIC,
            block_count,
            inode_count,
            first_inode_block: FREEMAP_INDEX + bitmap_blocks,
        }
    }

    fn bitmap_blocks_for(block_count: u32) -> u32 {
        (block_count as usize).div_ceil(BITS_PER_BLOCK) as u32
    }

    pub fn bitmap_blocks(&self) -> u32 {
        Self::bitmap_blocks_for(self.block_count)
    }

    pub fn inode_blocks(&self) -> u32 {
        (self.inode_count as usize).div_ceil(INODES_PER_BLOCK) as u32
    }

    /// First block past the boot block, superblock, bitmap and inode table.
    pub fn first_data_block(&self) -> BlockPointer {
        self.first_inode_block + self.inode_blocks()
    }

    pub(crate) fn read<A: DeviceDriver>(io: &IO<A>) -> Result<SuperBlock> {
        let buffer = io.read_block(SUPERBLOCK_INDEX)?;
        SuperBlock::from_bytes(&buffer)
    }

    pub(crate) fn write<A: DeviceDriver>(&self, io: &mut IO<A>) -> Result<()> {
        let mut buffer = self.to_bytes();
        buffer.resize(BLOCK_SIZE, 0);
        io.write_block(SUPERBLOCK_INDEX, &buffer)
    }
}

impl KnownSize for SuperBlock {
    fn size_on_disk() -> usize {
        16
    }
}

impl ByteSerializable for SuperBlock {
    fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = vec![0u8; Self::size_on_disk()];
        write_u32(&mut buffer, 0, self.magic);
        write_u32(&mut buffer, 4, self.block_count);
        write_u32(&mut buffer, 8, self.inode_count);
        write_u32(&mut buffer, 12, self.first_inode_block);
        buffer
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::size_on_disk() {
            return Err(Error::corrupt("superblock truncated"));
        }
        let magic = read_u32(bytes, 0);
        if magic != MAGIC {
            return Err(Error::BadMagic(magic));
        }
        Ok(SuperBlock {
            magic,
            block_count: read_u32(bytes, 4),
            inode_count: read_u32(bytes, 8),
            first_inode_block: read_u32(bytes, 12),
        })
    }
}
