use tracing::info;

use crate::consts::{InodePointer, BOOT_BLOCK, ROOT_INODE};
use crate::driver::DeviceDriver;
use crate::io::IO;
use crate::structure::blockmap::BlockMap;
use crate::structure::index::Tiers;
use crate::structure::inode::{FileType, Inode};
use crate::structure::inode_table::InodeTable;
use crate::structure::superblock::SuperBlock;
use crate::util::error::{Error, Result};

pub mod blockmap;
mod chain;
pub mod index;
pub mod inode;
pub mod inode_table;
pub mod superblock;

pub const ROOT_MODE: u32 = 0o755;

/// A mounted volume: the device plus the superblock, bitmap and inode table
/// loaded from it. Everything that touches on-disk state goes through here.
pub struct Volume<A: DeviceDriver> {
    pub(crate) io: IO<A>,
    pub superblock: SuperBlock,
    pub(crate) block_map: BlockMap,
    pub(crate) inode_table: InodeTable,
    pub(crate) tiers: Tiers,
}

impl<A: DeviceDriver> Volume<A> {
    /// Lays out an empty file system over the whole device.
    pub fn format(device: A, inode_count: u32) -> Result<Volume<A>> {
        let mut io = IO::new(device)?;
        let block_count = u32::try_from(io.block_count)
            .map_err(|_| Error::Geometry(format!("{} blocks do not fit a 32-bit index", io.block_count)))?;
        if inode_count <= ROOT_INODE + 1 {
            return Err(Error::Geometry(format!("at least 3 inodes are needed, got {}", inode_count)));
        }
        let superblock = SuperBlock::new(block_count, inode_count);
        if superblock.first_data_block() >= block_count {
            return Err(Error::Geometry(format!(
                "{} blocks cannot hold the metadata for {} inodes",
                block_count, inode_count
            )));
        }

        io.zero_block(BOOT_BLOCK)?;
        superblock.write(&mut io)?;
        let block_map = BlockMap::new(&superblock);
        block_map.write_full(&mut io)?;
        let inode_table = InodeTable::new(&superblock);
        inode_table.format(&mut io)?;
        inode_table.write_inode(&mut io, &Inode::directory(ROOT_INODE, ROOT_MODE))?;
        io.flush()?;

        info!(
            blocks = block_count,
            inodes = inode_count,
            first_data_block = superblock.first_data_block(),
            "formatted volume"
        );
        Ok(Volume { io, superblock, block_map, inode_table, tiers: Tiers::ON_DISK })
    }

    pub fn mount(device: A) -> Result<Volume<A>> {
        let io = IO::new(device)?;
        let superblock = SuperBlock::read(&io)?;
        if superblock.block_count as u64 > io.block_count {
            return Err(Error::Geometry(format!(
                "superblock claims {} blocks, device holds {}",
                superblock.block_count, io.block_count
            )));
        }
        if superblock.first_data_block() >= superblock.block_count {
            return Err(Error::corrupt("metadata overruns the volume"));
        }

        let block_map = BlockMap::read(&io, &superblock)?;
        let inode_table = InodeTable::new(&superblock);
        let root = inode_table.read_inode(&io, ROOT_INODE)?;
        if root.kind() != FileType::Directory {
            return Err(Error::corrupt("root inode is not a directory"));
        }

        info!(
            blocks = superblock.block_count,
            inodes = superblock.inode_count,
            free_blocks = block_map.free_count(),
            "mounted volume"
        );
        Ok(Volume { io, superblock, block_map, inode_table, tiers: Tiers::ON_DISK })
    }

    /// Flushes and hands the device back.
    pub fn unmount(mut self) -> Result<A> {
        self.io.flush()?;
        info!(free_blocks = self.block_map.free_count(), "unmounted volume");
        Ok(self.io.device)
    }

    pub fn read_inode(&self, id: InodePointer) -> Result<Inode> {
        self.inode_table.read_inode(&self.io, id)
    }

    pub fn write_inode(&mut self, inode: &Inode) -> Result<()> {
        self.inode_table.write_inode(&mut self.io, inode)
    }

    /// Lowest free inode number. The slot stays free until an inode is
    /// written to it.
    pub fn allocate_inode(&self) -> Result<InodePointer> {
        self.inode_table.find_free(&self.io)
    }

    pub fn free_blocks(&self) -> u32 {
        self.block_map.free_count()
    }

    pub fn free_inodes(&self) -> Result<u32> {
        self.inode_table.count_free(&self.io)
    }

    pub fn tiers(&self) -> Tiers {
        self.tiers
    }

    #[cfg(test)]
    pub(crate) fn with_tiers(mut self, tiers: Tiers) -> Volume<A> {
        self.tiers = tiers;
        self
    }
}

#[cfg(test)]
pub(crate) fn scratch_volume(
    block_count: usize,
    inode_count: u32,
) -> Volume<crate::driver::memory_drive::MemoryDrive> {
    use crate::consts::{BLOCK_SIZE, SECTOR_SIZE};
    use crate::driver::memory_drive::MemoryDrive;

    Volume::format(MemoryDrive::new(block_count * BLOCK_SIZE, SECTOR_SIZE), inode_count).unwrap()
}

#[cfg(test)]
pub(crate) fn scratch_faulty_volume(
    block_count: usize,
    inode_count: u32,
) -> Volume<crate::driver::memory_drive::FaultyDrive> {
    use crate::consts::{BLOCK_SIZE, SECTOR_SIZE};
    use crate::driver::memory_drive::FaultyDrive;

    Volume::format(FaultyDrive::new(block_count * BLOCK_SIZE, SECTOR_SIZE), inode_count).unwrap()
}
