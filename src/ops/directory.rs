use tracing::debug;

use crate::consts::{InodePointer, BLOCK_SIZE, DIRENTRY_SIZE, ENTRIES_PER_BLOCK, MAX_NAME_LENGTH};
use crate::driver::DeviceDriver;
use crate::structure::inode::{Chain, Inode, InodeBody};
use crate::structure::Volume;
use crate::util::error::{Error, Result};
use crate::util::serializable::{read_u32, write_u32, ByteSerializable, KnownSize};

const NAME_OFFSET: usize = 4;

/// One fixed-size directory record. An `ino` of 0 marks an empty slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub ino: InodePointer,
    pub name: Vec<u8>,
}

impl DirEntry {
    pub fn new(ino: InodePointer, name: &[u8]) -> DirEntry {
        DirEntry { ino, name: name.to_vec() }
    }

    pub fn is_empty(&self) -> bool {
        self.ino == 0
    }
}

impl KnownSize for DirEntry {
    fn size_on_disk() -> usize {
        DIRENTRY_SIZE
    }
}

impl ByteSerializable for DirEntry {
    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; DIRENTRY_SIZE];
        write_u32(&mut bytes, 0, self.ino);
        let len = self.name.len().min(MAX_NAME_LENGTH);
        bytes[NAME_OFFSET..NAME_OFFSET + len].copy_from_slice(&self.name[..len]);
        bytes
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < DIRENTRY_SIZE {
            return Err(Error::corrupt("directory entry truncated"));
        }
        let field = &bytes[NAME_OFFSET..DIRENTRY_SIZE];
        let len = field.iter().position(|&b| b == 0).unwrap_or(MAX_NAME_LENGTH);
        Ok(DirEntry { ino: read_u32(bytes, 0), name: field[..len].to_vec() })
    }
}

pub struct Directory {
    pub id: InodePointer,
    pub nlink: u32,
    pub mode: u32,
    pub chain: Chain,
}

impl Directory {
    pub fn from_inode(inode: Inode) -> Result<Directory> {
        match inode.body {
            InodeBody::Directory { mode, chain } => Ok(Directory { id: inode.id, nlink: inode.nlink, mode, chain }),
            _ => Err(Error::NotDirectory(inode.id)),
        }
    }

    pub fn to_inode(&self) -> Inode {
        Inode {
            id: self.id,
            nlink: self.nlink,
            body: InodeBody::Directory { mode: self.mode, chain: self.chain.clone() },
        }
    }

    pub fn slot_count(&self) -> usize {
        self.chain.size as usize / DIRENTRY_SIZE
    }

    /// Every record of the directory, empty slots included, in slot order.
    pub fn records<A: DeviceDriver>(&self, volume: &Volume<A>) -> Result<Vec<DirEntry>> {
        let count = self.slot_count();
        let mut records = Vec::with_capacity(count);
        for b in 0..self.chain.block_count() {
            let block = volume.io.read_block(volume.block_at(&self.chain, b)?)?;
            for record in block.chunks(DIRENTRY_SIZE) {
                if records.len() == count {
                    break;
                }
                records.push(DirEntry::from_bytes(record)?);
            }
        }
        Ok(records)
    }

    /// Occupied records starting at `slot`, paired with their slot numbers.
    pub fn entries_from<A: DeviceDriver>(&self, volume: &Volume<A>, slot: usize) -> Result<Vec<(usize, DirEntry)>> {
        Ok(self
            .records(volume)?
            .into_iter()
            .enumerate()
            .skip(slot)
            .filter(|(_, entry)| !entry.is_empty())
            .collect())
    }

    /// First occupied record whose name matches exactly.
    pub fn find<A: DeviceDriver>(&self, volume: &Volume<A>, name: &[u8]) -> Result<Option<(usize, DirEntry)>> {
        Ok(self
            .records(volume)?
            .into_iter()
            .enumerate()
            .find(|(_, entry)| !entry.is_empty() && entry.name == name))
    }

    /// Returns the first empty slot, growing the directory by one zeroed block
    /// when there is none. Growth is persisted immediately.
    pub fn allocate_slot<A: DeviceDriver>(&mut self, volume: &mut Volume<A>) -> Result<usize> {
        if let Some(slot) = self.records(volume)?.iter().position(DirEntry::is_empty) {
            return Ok(slot);
        }
        let slot = self.slot_count();
        volume.grow(&mut self.chain)?;
        volume.write_inode(&self.to_inode())?;
        debug!(dir = self.id, slots = ENTRIES_PER_BLOCK, "extended directory");
        Ok(slot)
    }

    pub fn write_entry<A: DeviceDriver>(&self, volume: &mut Volume<A>, slot: usize, entry: &DirEntry) -> Result<()> {
        let (block, offset) = self.locate(volume, slot)?;
        let mut data = volume.io.read_block(block)?;
        data[offset..offset + DIRENTRY_SIZE].copy_from_slice(&entry.to_bytes());
        volume.io.write_block(block, &data)
    }

    /// Marks a slot empty. The name bytes are left behind and the directory
    /// is never compacted.
    pub fn clear_entry<A: DeviceDriver>(&self, volume: &mut Volume<A>, slot: usize) -> Result<()> {
        let (block, offset) = self.locate(volume, slot)?;
        let mut data = volume.io.read_block(block)?;
        write_u32(&mut data, offset, 0);
        volume.io.write_block(block, &data)
    }

    fn locate<A: DeviceDriver>(&self, volume: &Volume<A>, slot: usize) -> Result<(u32, usize)> {
        if slot >= self.slot_count() {
            return Err(Error::corrupt(format!("directory slot {} out of range", slot)));
        }
        let position = slot * DIRENTRY_SIZE;
        Ok((volume.block_at(&self.chain, position / BLOCK_SIZE)?, position % BLOCK_SIZE))
    }
}
