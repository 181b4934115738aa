use std::mem::size_of;

pub type BlockPointer = u32;
pub type InodePointer = u32;

pub const BLOCK_SIZE: usize = 1024;
pub const SECTOR_SIZE: usize = 512;
pub const MAGIC: u32 = 0x0131_01AE;

pub const BOOT_BLOCK: BlockPointer = 0;
pub const SUPERBLOCK_INDEX: BlockPointer = 1;
pub const FREEMAP_INDEX: BlockPointer = 2;
pub const BITS_PER_BLOCK: usize = BLOCK_SIZE * 8;

pub const NDIRECT: usize = 10;
pub const NINDIRECT: usize = BLOCK_SIZE / size_of::<BlockPointer>();
pub const NULL_POINTER: BlockPointer = 0;
pub type DirectPointers = [BlockPointer; NDIRECT];

pub const INODE_SIZE: usize = 64;
pub const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_SIZE;
pub const ROOT_INODE: InodePointer = 1;
pub const FIRST_FREE_INODE: InodePointer = 2;

pub const MAX_NAME_LENGTH: usize = 59;
pub const DIRENTRY_SIZE: usize = size_of::<InodePointer>() + MAX_NAME_LENGTH + 1;
pub const ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / DIRENTRY_SIZE;

// size, type and link count precede the payload; one byte is kept for the NUL
pub const SYMLINK_OFFSET: usize = 3 * size_of::<u32>();
pub const MAX_SYMLINK_LENGTH: usize = INODE_SIZE - SYMLINK_OFFSET - 1;
