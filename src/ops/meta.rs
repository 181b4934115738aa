use crate::consts::InodePointer;
use crate::structure::inode::{FileType, Inode};
use crate::util::mode::ModeBitsHelper;

/// What a caller can learn about an inode without reading its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub ino: InodePointer,
    pub kind: FileType,
    pub size: u64,
    /// Data blocks only; indirect blocks are not counted.
    pub blocks: u64,
    pub permissions: u16,
    pub nlink: u32,
}

impl From<&Inode> for Metadata {
    fn from(inode: &Inode) -> Self {
        Metadata {
            ino: inode.id,
            kind: inode.kind(),
            size: inode.size() as u64,
            blocks: inode.chain().map_or(0, |chain| chain.block_count() as u64),
            permissions: inode.mode().get_permissions(),
            nlink: inode.nlink,
        }
    }
}

/// Volume-wide usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub block_size: u32,
    pub blocks: u32,
    pub free_blocks: u32,
    pub inodes: u32,
    pub free_inodes: u32,
    pub max_name_length: u32,
}
