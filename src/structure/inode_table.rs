use crate::consts::{BlockPointer, InodePointer, FIRST_FREE_INODE, INODES_PER_BLOCK, INODE_SIZE};
use crate::driver::DeviceDriver;
use crate::io::IO;
use crate::structure::inode::Inode;
use crate::structure::superblock::SuperBlock;
use crate::util::error::{Error, Result};
use crate::util::serializable::{read_u32, ByteSerializable};

const NLINK_OFFSET: usize = 8;

pub struct InodeTable {
    table_index: BlockPointer,
    pub(crate) inode_count: u32,
    pub(crate) block_count: u32,
}

impl InodeTable {
    pub fn new(superblock: &SuperBlock) -> InodeTable {
        InodeTable {
            table_index: superblock.first_inode_block,
            inode_count: superblock.inode_count,
            block_count: superblock.inode_blocks(),
        }
    }

    pub(crate) fn format<A: DeviceDriver>(&self, io: &mut IO<A>) -> Result<()> {
        for i in 0..self.block_count {
            io.zero_block(self.table_index + i)?;
        }
        Ok(())
    }

    pub(crate) fn read_inode<A: DeviceDriver>(&self, io: &IO<A>, index: InodePointer) -> Result<Inode> {
        self.check(index)?;
        let block = io.read_block(self.inode_block(index))?;
        let offset = Self::inode_offset(index);
        let mut inode = Inode::from_bytes(&block[offset..offset + INODE_SIZE])?;
        inode.id = index;
        Ok(inode)
    }

    pub(crate) fn write_inode<A: DeviceDriver>(&self, io: &mut IO<A>, inode: &Inode) -> Result<()> {
        self.check(inode.id)?;
        let inode_block = self.inode_block(inode.id);
        let offset = Self::inode_offset(inode.id);

        let mut block = io.read_block(inode_block)?;
        block[offset..offset + INODE_SIZE].copy_from_slice(&inode.to_bytes());
        io.write_block(inode_block, &block)
    }

    /// Lowest unused inode number; inodes 0 and 1 are never handed out.
    pub(crate) fn find_free<A: DeviceDriver>(&self, io: &IO<A>) -> Result<InodePointer> {
        self.scan_free(io, true)?.first().copied().ok_or(Error::NoInodes)
    }

    pub(crate) fn count_free<A: DeviceDriver>(&self, io: &IO<A>) -> Result<u32> {
        Ok(self.scan_free(io, false)?.len() as u32)
    }

    fn scan_free<A: DeviceDriver>(&self, io: &IO<A>, first_only: bool) -> Result<Vec<InodePointer>> {
        let mut free = Vec::new();
        let mut index = FIRST_FREE_INODE;
        while index < self.inode_count {
            let block = io.read_block(self.inode_block(index))?;
            loop {
                let offset = Self::inode_offset(index);
                if read_u32(&block, offset + NLINK_OFFSET) == 0 {
                    free.push(index);
                    if first_only {
                        return Ok(free);
                    }
                }
                index += 1;
                if index >= self.inode_count || Self::inode_offset(index) == 0 {
                    break;
                }
            }
        }
        Ok(free)
    }

    fn check(&self, index: InodePointer) -> Result<()> {
        if index >= self.inode_count {
            return Err(Error::InvalidInode(index as u64));
        }
        Ok(())
    }

    #[inline]
    fn inode_block(&self, index: InodePointer) -> BlockPointer {
        self.table_index + index / INODES_PER_BLOCK as u32
    }

    #[inline]
    fn inode_offset(index: InodePointer) -> usize {
        (index as usize % INODES_PER_BLOCK) * INODE_SIZE
    }
}
