use tracing::{debug, info};

use crate::consts::{InodePointer, BLOCK_SIZE, MAX_NAME_LENGTH};
use crate::driver::DeviceDriver;
use crate::ops::directory::Directory;
use crate::ops::meta::{Metadata, Stats};
use crate::ops::node::Node;
use crate::ops::symlink::Symlink;
use crate::structure::inode::{FileType, Inode, InodeBody};
use crate::structure::Volume;
use crate::util::error::{Error, Result};
use crate::util::mode::ModeBitsHelper;

pub mod directory;
pub mod file;
pub mod link;
pub mod meta;
pub mod node;
pub mod symlink;

/// Directory listing item. `next` is the cursor that resumes after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirItem {
    pub ino: InodePointer,
    pub kind: FileType,
    pub name: Vec<u8>,
    pub next: u64,
}

const CURSOR_DOT: u64 = 0;
const CURSOR_DOTDOT: u64 = 1;
const CURSOR_FIRST_ENTRY: u64 = 2;

pub struct FlatFS<A: DeviceDriver> {
    volume: Volume<A>,
}

impl<A: DeviceDriver> FlatFS<A> {
    pub fn format(device: A, inode_count: u32) -> Result<FlatFS<A>> {
        Ok(FlatFS { volume: Volume::format(device, inode_count)? })
    }

    pub fn mount(device: A) -> Result<FlatFS<A>> {
        Ok(FlatFS { volume: Volume::mount(device)? })
    }

    pub fn unmount(self) -> Result<A> {
        self.volume.unmount()
    }

    pub fn volume(&self) -> &Volume<A> {
        &self.volume
    }

    pub fn metadata(&self, ino: InodePointer) -> Result<Metadata> {
        let inode = self.read_live(ino)?;
        Ok(Metadata::from(&inode))
    }

    pub fn lookup(&self, dir: InodePointer, name: &[u8]) -> Result<Metadata> {
        if name.len() > MAX_NAME_LENGTH {
            return Err(Error::NameTooLong);
        }
        let dir = self.directory(dir)?;
        let (_, entry) = dir.find(&self.volume, name)?.ok_or(Error::NotFound)?;
        self.metadata(entry.ino)
    }

    /// Lists `dir` from `cursor` on. Cursors 0 and 1 are `.` and `..`; cursor
    /// `k` past those is record `k - 2`.
    pub fn read_dir(&self, dir: InodePointer, parent: InodePointer, cursor: u64) -> Result<Vec<DirItem>> {
        let node = Node::from(self.read_live(dir)?);
        let mut items = Vec::new();
        if cursor <= CURSOR_DOT {
            items.push(DirItem { ino: dir, kind: FileType::Directory, name: b".".to_vec(), next: CURSOR_DOTDOT });
        }
        if cursor <= CURSOR_DOTDOT {
            items.push(DirItem {
                ino: parent,
                kind: FileType::Directory,
                name: b"..".to_vec(),
                next: CURSOR_FIRST_ENTRY,
            });
        }

        let first_slot = cursor.saturating_sub(CURSOR_FIRST_ENTRY) as usize;
        for (slot, entry) in node.list_entries(&self.volume, first_slot)? {
            let kind = self.volume.read_inode(entry.ino)?.kind();
            items.push(DirItem { ino: entry.ino, kind, name: entry.name, next: slot as u64 + CURSOR_FIRST_ENTRY + 1 });
        }
        Ok(items)
    }

    /// New empty regular file. The inode is picked before a directory slot so
    /// a full inode table never extends the directory.
    pub fn create(&mut self, dir: InodePointer, name: &[u8], mode: u32) -> Result<Metadata> {
        link::check_name(name)?;
        let mut dir = self.directory(dir)?;
        if dir.find(&self.volume, name)?.is_some() {
            return Err(Error::Exists);
        }
        let ino = self.volume.allocate_inode()?;
        let mut inode = Inode::regular(ino, mode.get_permissions() as u32);
        inode.nlink = 0;
        link::link(&mut self.volume, &mut dir, &mut inode, name)?;
        info!(dir = dir.id, ino, "created file");
        Ok(Metadata::from(&inode))
    }

    pub fn link(&mut self, ino: InodePointer, dir: InodePointer, name: &[u8]) -> Result<Metadata> {
        let mut target = self.read_live(ino)?;
        let mut dir = self.directory(dir)?;
        link::link(&mut self.volume, &mut dir, &mut target, name)?;
        Ok(Metadata::from(&target))
    }

    pub fn symlink(&mut self, dir: InodePointer, name: &[u8], target: &[u8]) -> Result<Metadata> {
        symlink::validate(target)?;
        self.create_symlink(dir, name, target)
    }

    /// Symlink that points at `root_target` for privileged callers and at
    /// `other_target` for everyone else.
    pub fn symlink_conditional(
        &mut self,
        dir: InodePointer,
        name: &[u8],
        root_target: &[u8],
        other_target: &[u8],
    ) -> Result<Metadata> {
        let payload = symlink::encode_conditional(root_target, other_target)?;
        self.create_symlink(dir, name, &payload)
    }

    fn create_symlink(&mut self, dir: InodePointer, name: &[u8], payload: &[u8]) -> Result<Metadata> {
        link::check_name(name)?;
        let mut dir = self.directory(dir)?;
        if dir.find(&self.volume, name)?.is_some() {
            return Err(Error::Exists);
        }
        let ino = self.volume.allocate_inode()?;
        let mut inode = Symlink::new(ino, payload)?.to_inode();
        link::link(&mut self.volume, &mut dir, &mut inode, name)?;
        info!(dir = dir.id, ino, "created symlink");
        Ok(Metadata::from(&inode))
    }

    /// Removes a name. The last name going away returns the file's blocks.
    pub fn unlink(&mut self, dir: InodePointer, name: &[u8]) -> Result<()> {
        let dir = self.directory(dir)?;
        let inode = link::unlink(&mut self.volume, &dir, name)?;
        if inode.nlink > 0 {
            return Ok(());
        }

        let mut node = Node::from(inode);
        if let Node::Regular(_) = node {
            node.resize(&mut self.volume, 0)?;
            self.volume.write_inode(&node.to_inode())?;
        }
        debug!(ino = node.id(), "reclaimed inode");
        Ok(())
    }

    pub fn set_size(&mut self, ino: InodePointer, size: u64) -> Result<Metadata> {
        let mut node = Node::from(self.read_live(ino)?);
        let result = node.resize(&mut self.volume, size);
        self.save(&node, result)?;
        self.metadata(ino)
    }

    pub fn set_mode(&mut self, ino: InodePointer, mode: u32) -> Result<Metadata> {
        let mut inode = self.read_live(ino)?;
        match &mut inode.body {
            InodeBody::Regular { mode: current, .. } | InodeBody::Directory { mode: current, .. } => {
                *current = mode.get_permissions() as u32;
            }
            InodeBody::Symlink { .. } => return Err(Error::InvalidArgument("symlinks have no mode of their own")),
        }
        self.volume.write_inode(&inode)?;
        Ok(Metadata::from(&inode))
    }

    pub fn read(&self, ino: InodePointer, offset: u64, length: usize) -> Result<Vec<u8>> {
        let node = Node::from(self.read_live(ino)?);
        let size = node.to_inode().size() as u64;
        let mut out = vec![0u8; length.min(size.saturating_sub(offset) as usize)];
        let copied = node.read(&self.volume, offset, length, &mut out)?;
        out.truncate(copied);
        Ok(out)
    }

    pub fn write(&mut self, ino: InodePointer, offset: u64, data: &[u8], append: bool) -> Result<usize> {
        let mut node = Node::from(self.read_live(ino)?);
        let result = node.write(&mut self.volume, offset, data, append);
        self.save(&node, result)
    }

    pub fn read_link(&self, ino: InodePointer, privileged: bool) -> Result<Vec<u8>> {
        let node = Node::from(self.read_live(ino)?);
        Ok(node.resolve_target(privileged)?.to_vec())
    }

    pub fn stats(&self) -> Result<Stats> {
        let superblock = &self.volume.superblock;
        Ok(Stats {
            block_size: BLOCK_SIZE as u32,
            blocks: superblock.block_count,
            free_blocks: self.volume.free_blocks(),
            inodes: superblock.inode_count,
            free_inodes: self.volume.free_inodes()?,
            max_name_length: MAX_NAME_LENGTH as u32,
        })
    }

    /// Writes the node back whether or not the operation succeeded, since a
    /// failed copy may already have changed the chain.
    fn save<T>(&mut self, node: &Node, result: Result<T>) -> Result<T> {
        match result {
            Err(err @ (Error::NotPermitted(_) | Error::IsDirectory(_) | Error::InvalidArgument(_))) => Err(err),
            result => {
                self.volume.write_inode(&node.to_inode())?;
                result
            }
        }
    }

    fn read_live(&self, ino: InodePointer) -> Result<Inode> {
        let inode = self.volume.read_inode(ino)?;
        if inode.is_free() {
            return Err(Error::InvalidInode(ino as u64));
        }
        Ok(inode)
    }

    fn directory(&self, ino: InodePointer) -> Result<Directory> {
        Directory::from_inode(self.read_live(ino)?)
    }
}

#[cfg(test)]
mod tests {
    use super::{DirItem, FlatFS};
    use crate::consts::{BLOCK_SIZE, ENTRIES_PER_BLOCK, ROOT_INODE, SECTOR_SIZE};
    use crate::driver::file_drive::FileDrive;
    use crate::driver::memory_drive::MemoryDrive;
    use crate::structure::inode::FileType;
    use crate::util::error::Error;

    fn scratch(blocks: usize, inodes: u32) -> FlatFS<MemoryDrive> {
        FlatFS::format(MemoryDrive::new(blocks * BLOCK_SIZE, SECTOR_SIZE), inodes).unwrap()
    }

    #[test]
    fn create_write_read() {
        let mut fs = scratch(128, 32);
        let meta = fs.create(ROOT_INODE, b"hello.txt", 0o100644).unwrap();
        assert_eq!(meta.ino, 2);
        assert_eq!(meta.nlink, 1);
        assert_eq!(meta.permissions, 0o644);

        assert_eq!(fs.write(meta.ino, 0, b"hello, world", false).unwrap(), 12);
        assert_eq!(fs.lookup(ROOT_INODE, b"hello.txt").unwrap().size, 12);
        assert_eq!(fs.read(meta.ino, 7, 100).unwrap(), b"world");
        assert!(fs.read(meta.ino, 12, 100).unwrap().is_empty());

        assert!(matches!(fs.create(ROOT_INODE, b"hello.txt", 0o644), Err(Error::Exists)));
        assert!(matches!(fs.lookup(ROOT_INODE, b"missing"), Err(Error::NotFound)));
        assert!(matches!(fs.lookup(ROOT_INODE, &[b'x'; 60]), Err(Error::NameTooLong)));
    }

    #[test]
    fn append_writes_at_end() {
        let mut fs = scratch(128, 32);
        let ino = fs.create(ROOT_INODE, b"log", 0o644).unwrap().ino;
        fs.write(ino, 0, b"one\n", false).unwrap();
        fs.write(ino, 0, b"two\n", true).unwrap();
        assert_eq!(fs.read(ino, 0, 64).unwrap(), b"one\ntwo\n");
    }

    #[test]
    fn truncate_then_extend_exposes_no_old_bytes() {
        let mut fs = scratch(128, 32);
        let ino = fs.create(ROOT_INODE, b"t", 0o644).unwrap().ino;
        fs.write(ino, 0, &[0x41; 100], false).unwrap();
        fs.set_size(ino, 10).unwrap();
        fs.set_size(ino, 100).unwrap();
        let data = fs.read(ino, 0, 100).unwrap();
        assert_eq!(&data[..10], &[0x41; 10]);
        assert!(data[10..].iter().all(|&b| b == 0));

        fs.set_size(ino, 10).unwrap();
        fs.write(ino, 50, b"Z", false).unwrap();
        let data = fs.read(ino, 0, 100).unwrap();
        assert_eq!(data.len(), 51);
        assert!(data[10..50].iter().all(|&b| b == 0));
        assert_eq!(data[50], b'Z');
    }

    #[test]
    fn read_dir_resumes_from_cursor() {
        let mut fs = scratch(128, 32);
        for name in ["a", "b", "c"] {
            fs.create(ROOT_INODE, name.as_bytes(), 0o644).unwrap();
        }
        fs.unlink(ROOT_INODE, b"b").unwrap();

        let all = fs.read_dir(ROOT_INODE, ROOT_INODE, 0).unwrap();
        let names: Vec<Vec<u8>> = all.iter().map(|item| item.name.clone()).collect();
        assert_eq!(names, vec![b".".to_vec(), b"..".to_vec(), b"a".to_vec(), b"c".to_vec()]);
        assert_eq!(all[3], DirItem { ino: 4, kind: FileType::Regular, name: b"c".to_vec(), next: 5 });

        let rest = fs.read_dir(ROOT_INODE, ROOT_INODE, all[2].next).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].name, b"c");
        assert!(fs.read_dir(ROOT_INODE, ROOT_INODE, 5).unwrap().is_empty());
    }

    #[test]
    fn unlink_reclaims_blocks_after_last_link() {
        let mut fs = scratch(128, 32);
        let free = fs.stats().unwrap().free_blocks;
        let ino = fs.create(ROOT_INODE, b"data", 0o644).unwrap().ino;
        fs.write(ino, 0, &vec![1u8; 20 * BLOCK_SIZE], false).unwrap();
        fs.link(ino, ROOT_INODE, b"alias").unwrap();
        let dir_blocks = 1;
        assert_eq!(fs.stats().unwrap().free_blocks, free - dir_blocks - 21);

        fs.unlink(ROOT_INODE, b"data").unwrap();
        assert_eq!(fs.metadata(ino).unwrap().nlink, 1);
        assert_eq!(fs.read(ino, 0, 4).unwrap(), vec![1u8; 4]);

        fs.unlink(ROOT_INODE, b"alias").unwrap();
        assert_eq!(fs.stats().unwrap().free_blocks, free - dir_blocks);
        assert!(matches!(fs.metadata(ino), Err(Error::InvalidInode(_))));
        assert_eq!(fs.create(ROOT_INODE, b"next", 0o644).unwrap().ino, ino);
    }

    #[test]
    fn unlinked_slot_is_reused() {
        let mut fs = scratch(128, 64);
        for i in 0..ENTRIES_PER_BLOCK {
            fs.create(ROOT_INODE, format!("entry-{}", i).as_bytes(), 0o644).unwrap();
        }
        let size = fs.metadata(ROOT_INODE).unwrap().size;
        fs.unlink(ROOT_INODE, b"entry-3").unwrap();
        fs.create(ROOT_INODE, b"e3", 0o644).unwrap();
        assert_eq!(fs.metadata(ROOT_INODE).unwrap().size, size);
    }

    #[test]
    fn conditional_symlink() {
        let mut fs = scratch(64, 16);
        let ino = fs.symlink_conditional(ROOT_INODE, b"home", b"/admin", b"/guest").unwrap().ino;
        assert_eq!(fs.read_link(ino, true).unwrap(), b"/admin");
        assert_eq!(fs.read_link(ino, false).unwrap(), b"/guest");

        let plain = fs.symlink(ROOT_INODE, b"plain", b"/plain/path").unwrap();
        assert_eq!(plain.kind, FileType::Symlink);
        assert_eq!(fs.read_link(plain.ino, true).unwrap(), b"/plain/path");
        assert_eq!(fs.read_link(plain.ino, false).unwrap(), b"/plain/path");

        assert!(matches!(fs.symlink(ROOT_INODE, b"long", &[b'p'; 52]), Err(Error::TargetTooLong)));
        assert!(matches!(fs.read_link(ROOT_INODE, true), Err(Error::NotSymlink(1))));

        fs.unlink(ROOT_INODE, b"home").unwrap();
        assert!(matches!(fs.read_link(ino, true), Err(Error::InvalidInode(_))));
    }

    #[test]
    fn attribute_changes() {
        let mut fs = scratch(64, 16);
        let ino = fs.create(ROOT_INODE, b"f", 0o600).unwrap().ino;
        assert_eq!(fs.set_size(ino, 3000).unwrap().size, 3000);
        assert_eq!(fs.read(ino, 0, 3000).unwrap(), vec![0u8; 3000]);
        assert_eq!(fs.set_size(ino, 10).unwrap().blocks, 1);
        assert_eq!(fs.set_mode(ino, 0o100755).unwrap().permissions, 0o755);

        assert!(matches!(fs.set_size(ROOT_INODE, 0), Err(Error::NotPermitted(1))));
        assert!(matches!(fs.write(ROOT_INODE, 0, b"x", false), Err(Error::IsDirectory(1))));
        assert!(matches!(fs.link(ROOT_INODE, ROOT_INODE, b"again"), Err(Error::NotPermitted(1))));
    }

    #[test]
    fn no_space_leaves_file_unchanged() {
        let mut fs = scratch(32, 16);
        let ino = fs.create(ROOT_INODE, b"big", 0o644).unwrap().ino;
        fs.write(ino, 0, b"start", false).unwrap();
        let before = fs.metadata(ino).unwrap();
        let free = fs.stats().unwrap().free_blocks;

        assert!(matches!(fs.write(ino, 0, &vec![0u8; 40 * BLOCK_SIZE], false), Err(Error::NoSpace)));
        assert!(matches!(fs.set_size(ino, 40 * BLOCK_SIZE as u64), Err(Error::NoSpace)));
        assert_eq!(fs.metadata(ino).unwrap(), before);
        assert_eq!(fs.stats().unwrap().free_blocks, free);
        assert_eq!(fs.read(ino, 0, 5).unwrap(), b"start");
    }

    #[test]
    fn full_inode_table_does_not_grow_directory() {
        let mut fs = scratch(64, 4);
        fs.create(ROOT_INODE, b"a", 0o644).unwrap();
        fs.create(ROOT_INODE, b"b", 0o644).unwrap();
        let size = fs.metadata(ROOT_INODE).unwrap().size;
        let free = fs.stats().unwrap().free_blocks;

        assert!(matches!(fs.create(ROOT_INODE, b"c", 0o644), Err(Error::NoInodes)));
        assert_eq!(fs.metadata(ROOT_INODE).unwrap().size, size);
        assert_eq!(fs.stats().unwrap().free_blocks, free);
    }

    #[test]
    fn persists_across_remount() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("volume.img");

        let drive = FileDrive::create(&path, 256 * BLOCK_SIZE as u64, SECTOR_SIZE).unwrap();
        let mut fs = FlatFS::format(drive, 64).unwrap();
        let ino = fs.create(ROOT_INODE, b"kept", 0o644).unwrap().ino;
        let data: Vec<u8> = (0..300 * 40).map(|i| (i % 256) as u8).collect();
        fs.write(ino, 0, &data, false).unwrap();
        fs.symlink_conditional(ROOT_INODE, b"where", b"/r", b"/u").unwrap();
        let stats = fs.stats().unwrap();
        fs.unmount().unwrap();

        let fs = FlatFS::mount(FileDrive::open(&path, SECTOR_SIZE).unwrap()).unwrap();
        assert_eq!(fs.stats().unwrap(), stats);
        assert_eq!(fs.read(ino, 0, data.len()).unwrap(), data);
        let link = fs.lookup(ROOT_INODE, b"where").unwrap();
        assert_eq!(fs.read_link(link.ino, false).unwrap(), b"/u");
    }
}
