use crate::consts::InodePointer;
use crate::driver::DeviceDriver;
use crate::ops::directory::{DirEntry, Directory};
use crate::ops::file::File;
use crate::ops::symlink::Symlink;
use crate::structure::inode::{Inode, InodeBody};
use crate::structure::Volume;
use crate::util::error::{Error, Result};

/// An inode viewed through what it can do.
pub enum Node {
    Regular(File),
    Directory(Directory),
    Symlink(Symlink),
}

impl From<Inode> for Node {
    fn from(inode: Inode) -> Self {
        let Inode { id, nlink, body } = inode;
        match body {
            InodeBody::Regular { mode, chain } => Node::Regular(File { id, nlink, mode, chain }),
            InodeBody::Directory { mode, chain } => Node::Directory(Directory { id, nlink, mode, chain }),
            InodeBody::Symlink { target } => Node::Symlink(Symlink { id, nlink, target }),
        }
    }
}

impl Node {
    pub fn id(&self) -> InodePointer {
        match self {
            Node::Regular(file) => file.id,
            Node::Directory(dir) => dir.id,
            Node::Symlink(link) => link.id,
        }
    }

    pub fn to_inode(&self) -> Inode {
        match self {
            Node::Regular(file) => file.to_inode(),
            Node::Directory(dir) => dir.to_inode(),
            Node::Symlink(link) => link.to_inode(),
        }
    }

    pub fn read<A: DeviceDriver>(&self, volume: &Volume<A>, offset: u64, length: usize, out: &mut [u8]) -> Result<usize> {
        match self {
            Node::Regular(file) => file.read(volume, offset, length, out),
            Node::Directory(dir) => Err(Error::IsDirectory(dir.id)),
            Node::Symlink(_) => Err(Error::InvalidArgument("symlinks are read with readlink")),
        }
    }

    pub fn write<A: DeviceDriver>(&mut self, volume: &mut Volume<A>, offset: u64, data: &[u8], append: bool) -> Result<usize> {
        match self {
            Node::Regular(file) => file.write(volume, offset, data, append),
            Node::Directory(dir) => Err(Error::IsDirectory(dir.id)),
            Node::Symlink(_) => Err(Error::InvalidArgument("symlinks cannot be written")),
        }
    }

    pub fn resize<A: DeviceDriver>(&mut self, volume: &mut Volume<A>, size: u64) -> Result<()> {
        match self {
            Node::Regular(file) => file.resize(volume, size),
            Node::Directory(dir) => Err(Error::NotPermitted(dir.id)),
            Node::Symlink(_) => Err(Error::InvalidArgument("symlinks cannot be resized")),
        }
    }

    pub fn list_entries<A: DeviceDriver>(&self, volume: &Volume<A>, slot: usize) -> Result<Vec<(usize, DirEntry)>> {
        match self {
            Node::Directory(dir) => dir.entries_from(volume, slot),
            Node::Regular(_) | Node::Symlink(_) => Err(Error::NotDirectory(self.id())),
        }
    }

    pub fn resolve_target(&self, privileged: bool) -> Result<&[u8]> {
        match self {
            Node::Symlink(link) => Ok(link.resolve(privileged)),
            Node::Regular(_) | Node::Directory(_) => Err(Error::NotSymlink(self.id())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Node;
    use crate::structure::inode::Inode;
    use crate::structure::scratch_volume;
    use crate::util::error::Error;

    #[test]
    fn capabilities_by_kind() {
        let mut volume = scratch_volume(64, 16);
        let mut dir = Node::from(Inode::directory(1, 0o755));
        let mut link = Node::from(Inode::symlink(3, b"root?/a:/b"));
        let mut file = Node::from(Inode::regular(2, 0o644));
        let mut out = [0u8; 8];

        assert!(matches!(dir.read(&volume, 0, 8, &mut out), Err(Error::IsDirectory(1))));
        assert!(matches!(dir.write(&mut volume, 0, b"x", false), Err(Error::IsDirectory(1))));
        assert!(matches!(dir.resize(&mut volume, 0), Err(Error::NotPermitted(1))));
        assert!(dir.list_entries(&volume, 0).unwrap().is_empty());
        assert!(matches!(dir.resolve_target(true), Err(Error::NotSymlink(1))));

        assert!(matches!(link.read(&volume, 0, 8, &mut out), Err(Error::InvalidArgument(_))));
        assert!(matches!(link.resize(&mut volume, 0), Err(Error::InvalidArgument(_))));
        assert!(matches!(link.write(&mut volume, 0, b"x", false), Err(Error::InvalidArgument(_))));
        assert_eq!(link.resolve_target(true).unwrap(), b"/a");

        assert_eq!(file.write(&mut volume, 0, b"payload", false).unwrap(), 7);
        assert_eq!(file.read(&volume, 0, 8, &mut out).unwrap(), 7);
        assert!(matches!(file.list_entries(&volume, 0), Err(Error::NotDirectory(2))));
        assert_eq!(file.to_inode().size(), 7);
    }
}
