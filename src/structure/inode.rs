use crate::consts::{
    BlockPointer, DirectPointers, InodePointer, BLOCK_SIZE, INODE_SIZE, MAX_SYMLINK_LENGTH, NDIRECT, NULL_POINTER,
    SYMLINK_OFFSET,
};
use crate::util::error::{Error, Result};
use crate::util::serializable::{read_u32, write_u32, ByteSerializable, KnownSize};

const SIZE_OFFSET: usize = 0;
const TYPE_OFFSET: usize = 4;
const NLINK_OFFSET: usize = 8;
const MODE_OFFSET: usize = 12;
const DIRECT_OFFSET: usize = 16;
const INDIRECT_OFFSET: usize = DIRECT_OFFSET + NDIRECT * 4;
const INDIRECT2_OFFSET: usize = INDIRECT_OFFSET + 4;

const SYMLINK_MODE: u32 = 0o777;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Regular,
    Directory,
    Symlink,
}

impl FileType {
    fn to_raw(self) -> u32 {
        match self {
            FileType::Regular => 0,
            FileType::Directory => 1,
            FileType::Symlink => 2,
        }
    }

    fn from_raw(raw: u32) -> Option<FileType> {
        match raw {
            0 => Some(FileType::Regular),
            1 => Some(FileType::Directory),
            2 => Some(FileType::Symlink),
            _ => None,
        }
    }
}

/// Roots of a file's block chain together with its byte size.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chain {
    pub size: u32,
    pub direct: DirectPointers,
    pub indirect: BlockPointer,
    pub indirect2: BlockPointer,
}

impl Chain {
    pub fn new() -> Chain {
        Chain::default()
    }

    pub fn block_count(&self) -> usize {
        blocks_for_size(self.size as u64)
    }
}

/// Number of blocks needed to hold `size` bytes.
pub fn blocks_for_size(size: u64) -> usize {
    size.div_ceil(BLOCK_SIZE as u64) as usize
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InodeBody {
    Regular { mode: u32, chain: Chain },
    Directory { mode: u32, chain: Chain },
    Symlink { target: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    pub id: InodePointer,
    pub nlink: u32,
    pub body: InodeBody,
}

impl Inode {
    pub fn regular(id: InodePointer, mode: u32) -> Inode {
        Inode { id, nlink: 1, body: InodeBody::Regular { mode, chain: Chain::new() } }
    }

    pub fn directory(id: InodePointer, mode: u32) -> Inode {
        Inode { id, nlink: 1, body: InodeBody::Directory { mode, chain: Chain::new() } }
    }

    pub fn symlink(id: InodePointer, target: &[u8]) -> Inode {
        Inode { id, nlink: 1, body: InodeBody::Symlink { target: target.to_vec() } }
    }

    pub fn kind(&self) -> FileType {
        match self.body {
            InodeBody::Regular { .. } => FileType::Regular,
            InodeBody::Directory { .. } => FileType::Directory,
            InodeBody::Symlink { .. } => FileType::Symlink,
        }
    }

    pub fn size(&self) -> u32 {
        match &self.body {
            InodeBody::Regular { chain, .. } | InodeBody::Directory { chain, .. } => chain.size,
            InodeBody::Symlink { target } => target.len() as u32,
        }
    }

    pub fn mode(&self) -> u32 {
        match self.body {
            InodeBody::Regular { mode, .. } | InodeBody::Directory { mode, .. } => mode,
            InodeBody::Symlink { .. } => SYMLINK_MODE,
        }
    }

    pub fn chain(&self) -> Option<&Chain> {
        match &self.body {
            InodeBody::Regular { chain, .. } | InodeBody::Directory { chain, .. } => Some(chain),
            InodeBody::Symlink { .. } => None,
        }
    }

    pub fn is_free(&self) -> bool {
        self.nlink == 0
    }
}

impl KnownSize for Inode {
    fn size_on_disk() -> usize {
        INODE_SIZE
    }
}

impl ByteSerializable for Inode {
    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; INODE_SIZE];
        write_u32(&mut bytes, SIZE_OFFSET, self.size());
        write_u32(&mut bytes, TYPE_OFFSET, self.kind().to_raw());
        write_u32(&mut bytes, NLINK_OFFSET, self.nlink);
        match &self.body {
            InodeBody::Regular { mode, chain } | InodeBody::Directory { mode, chain } => {
                write_u32(&mut bytes, MODE_OFFSET, *mode);
                for (i, pointer) in chain.direct.iter().enumerate() {
                    write_u32(&mut bytes, DIRECT_OFFSET + i * 4, *pointer);
                }
                write_u32(&mut bytes, INDIRECT_OFFSET, chain.indirect);
                write_u32(&mut bytes, INDIRECT2_OFFSET, chain.indirect2);
            }
            InodeBody::Symlink { target } => {
                let len = target.len().min(MAX_SYMLINK_LENGTH);
                bytes[SYMLINK_OFFSET..SYMLINK_OFFSET + len].copy_from_slice(&target[..len]);
            }
        }
        bytes
    }

    /// Decodes a record. The id is not stored on disk; the inode table fills it in.
    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < INODE_SIZE {
            return Err(Error::corrupt("inode record truncated"));
        }
        let size = read_u32(bytes, SIZE_OFFSET);
        let nlink = read_u32(bytes, NLINK_OFFSET);
        let raw_type = read_u32(bytes, TYPE_OFFSET);
        let kind = match FileType::from_raw(raw_type) {
            Some(kind) => kind,
            // the type of an unused slot carries no meaning
            None if nlink == 0 => FileType::Regular,
            None => return Err(Error::corrupt(format!("unknown inode type {}", raw_type))),
        };

        let body = match kind {
            FileType::Symlink => {
                let payload = &bytes[SYMLINK_OFFSET..INODE_SIZE];
                let len = payload.iter().position(|&b| b == 0).unwrap_or(MAX_SYMLINK_LENGTH);
                InodeBody::Symlink { target: payload[..len].to_vec() }
            }
            FileType::Regular | FileType::Directory => {
                let mut direct = [NULL_POINTER; NDIRECT];
                for (i, pointer) in direct.iter_mut().enumerate() {
                    *pointer = read_u32(bytes, DIRECT_OFFSET + i * 4);
                }
                let chain = Chain {
                    size,
                    direct,
                    indirect: read_u32(bytes, INDIRECT_OFFSET),
                    indirect2: read_u32(bytes, INDIRECT2_OFFSET),
                };
                let mode = read_u32(bytes, MODE_OFFSET);
                if kind == FileType::Directory {
                    InodeBody::Directory { mode, chain }
                } else {
                    InodeBody::Regular { mode, chain }
                }
            }
        };

        Ok(Inode { id: 0, nlink, body })
    }
}

#[cfg(test)]
mod tests {
    use super::{blocks_for_size, Chain, FileType, Inode, InodeBody};
    use crate::consts::INODE_SIZE;
    use crate::util::serializable::{ByteSerializable, KnownSize};

    #[test]
    fn test_inode_to_bytes() {
        let inode = Inode {
            id: 42,
            nlink: 2,
            body: InodeBody::Regular {
                mode: 0o644,
                chain: Chain {
                    size: 12 * 1024,
                    direct: [1, 2, 3, 4, 5, 6, 7, 8, 9, 10],
                    indirect: 11,
                    indirect2: 0,
                },
            },
        };

        let bytes = inode.to_bytes();
        assert_eq!(bytes.len(), Inode::size_on_disk());
        assert_eq!(&bytes[0..4], &(12u32 * 1024).to_le_bytes());
        assert_eq!(&bytes[4..8], &0u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &2u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &0o644u32.to_le_bytes());
        assert_eq!(&bytes[16..20], &1u32.to_le_bytes());
        assert_eq!(&bytes[56..60], &11u32.to_le_bytes());
    }

    #[test]
    fn test_inode_from_bytes() {
        let mut inode = Inode::directory(0, 0o755);
        if let InodeBody::Directory { chain, .. } = &mut inode.body {
            chain.size = 2048;
            chain.direct[0] = 30;
            chain.direct[1] = 31;
        }

        let decoded = Inode::from_bytes(&inode.to_bytes()).unwrap();
        assert_eq!(decoded, inode);
        assert_eq!(decoded.kind(), FileType::Directory);
        assert_eq!(decoded.chain().unwrap().block_count(), 2);
    }

    #[test]
    fn symlink_payload() {
        let inode = Inode::symlink(0, b"root?/admin:/guest");
        let bytes = inode.to_bytes();
        assert_eq!(bytes.len(), INODE_SIZE);
        assert_eq!(&bytes[12..30], b"root?/admin:/guest");
        assert_eq!(bytes[30], 0);

        let decoded = Inode::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.size(), 18);
        assert_eq!(decoded.body, InodeBody::Symlink { target: b"root?/admin:/guest".to_vec() });
    }

    #[test]
    fn free_slot_with_unknown_type() {
        let mut bytes = vec![0u8; INODE_SIZE];
        bytes[4] = 9;
        let inode = Inode::from_bytes(&bytes).unwrap();
        assert!(inode.is_free());

        bytes[8] = 1;
        assert!(Inode::from_bytes(&bytes).is_err());
    }

    #[test]
    fn block_rounding() {
        assert_eq!(blocks_for_size(0), 0);
        assert_eq!(blocks_for_size(1), 1);
        assert_eq!(blocks_for_size(1024), 1);
        assert_eq!(blocks_for_size(1025), 2);
    }
}
