use tracing::{debug, warn};

use crate::consts::MAX_NAME_LENGTH;
use crate::driver::DeviceDriver;
use crate::ops::directory::{DirEntry, Directory};
use crate::structure::inode::{FileType, Inode};
use crate::structure::Volume;
use crate::util::error::{Error, Result};

pub fn check_name(name: &[u8]) -> Result<()> {
    if name.len() > MAX_NAME_LENGTH {
        return Err(Error::NameTooLong);
    }
    if name.is_empty() || name == b"." || name == b".." {
        return Err(Error::InvalidArgument("reserved or empty name"));
    }
    if name.iter().any(|&b| b == b'/' || b == 0) {
        return Err(Error::InvalidArgument("name contains '/' or NUL"));
    }
    Ok(())
}

/// Adds `name` in `dir` pointing at `target` and bumps the target's link
/// count. Both the target inode and the new entry are written out.
pub fn link<A: DeviceDriver>(volume: &mut Volume<A>, dir: &mut Directory, target: &mut Inode, name: &[u8]) -> Result<()> {
    check_name(name)?;
    if target.kind() == FileType::Directory {
        return Err(Error::NotPermitted(target.id));
    }
    if dir.find(volume, name)?.is_some() {
        return Err(Error::Exists);
    }
    let slot = dir.allocate_slot(volume)?;

    dir.write_entry(volume, slot, &DirEntry::new(target.id, name))?;
    target.nlink += 1;
    if let Err(err) = volume.write_inode(target) {
        target.nlink -= 1;
        if let Err(undo) = dir.clear_entry(volume, slot) {
            warn!(%undo, dir = dir.id, slot, "could not remove entry after failed link");
        }
        return Err(err);
    }
    debug!(dir = dir.id, ino = target.id, slot, nlink = target.nlink, "linked");
    Ok(())
}

/// Removes `name` from `dir` and drops the link count of the inode it named.
/// Returns that inode as written back; reclaiming its blocks is up to the
/// caller once the count reaches zero.
pub fn unlink<A: DeviceDriver>(volume: &mut Volume<A>, dir: &Directory, name: &[u8]) -> Result<Inode> {
    if name.len() > MAX_NAME_LENGTH {
        return Err(Error::NameTooLong);
    }
    let (slot, entry) = dir.find(volume, name)?.ok_or(Error::NotFound)?;
    let mut inode = volume.read_inode(entry.ino)?;
    if inode.kind() == FileType::Directory {
        return Err(Error::IsDirectory(inode.id));
    }

    dir.clear_entry(volume, slot)?;
    inode.nlink = inode.nlink.saturating_sub(1);
    volume.write_inode(&inode)?;
    debug!(dir = dir.id, ino = inode.id, slot, nlink = inode.nlink, "unlinked");
    Ok(inode)
}
