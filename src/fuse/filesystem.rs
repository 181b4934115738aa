use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::time::{Duration, SystemTime};

use fuser::{
    FileAttr, FileType, Filesystem, KernelConfig, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory, ReplyEmpty,
    ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, Request, TimeOrNow,
};
use libc::c_int;
use tracing::{debug, info};

use crate::consts::{InodePointer, BLOCK_SIZE, ROOT_INODE, SECTOR_SIZE};
use crate::driver::DeviceDriver;
use crate::ops::meta::Metadata;
use crate::ops::FlatFS;
use crate::structure::inode;
use crate::util::error::{Error, Result};

const TTL: Duration = Duration::from_secs(1);

/// Bridges kernel requests to a mounted [`FlatFS`].
pub struct FuseDriver<A: DeviceDriver> {
    fs: FlatFS<A>,
    // nothing on disk records ownership or times
    uid: u32,
    gid: u32,
    mounted_at: SystemTime,
}

impl<A: DeviceDriver> FuseDriver<A> {
    pub fn new(fs: FlatFS<A>) -> FuseDriver<A> {
        FuseDriver { fs, uid: 0, gid: 0, mounted_at: SystemTime::now() }
    }

    fn attr(&self, meta: &Metadata) -> FileAttr {
        to_file_attr(meta, self.uid, self.gid, self.mounted_at)
    }
}

pub(crate) fn to_file_attr(meta: &Metadata, uid: u32, gid: u32, time: SystemTime) -> FileAttr {
    FileAttr {
        ino: meta.ino as u64,
        size: meta.size,
        blocks: meta.blocks * (BLOCK_SIZE / SECTOR_SIZE) as u64,
        atime: time,
        mtime: time,
        ctime: time,
        crtime: time,
        kind: to_file_type(meta.kind),
        perm: meta.permissions,
        nlink: meta.nlink,
        uid,
        gid,
        rdev: 0,
        blksize: BLOCK_SIZE as u32,
        flags: 0,
    }
}

pub(crate) fn to_file_type(kind: inode::FileType) -> FileType {
    match kind {
        inode::FileType::Regular => FileType::RegularFile,
        inode::FileType::Directory => FileType::Directory,
        inode::FileType::Symlink => FileType::Symlink,
    }
}

pub(crate) fn to_inode(ino: u64) -> Result<InodePointer> {
    InodePointer::try_from(ino).map_err(|_| Error::InvalidInode(ino))
}

fn fail(op: &str, err: Error) -> c_int {
    debug!(op, %err, "request failed");
    err.errno()
}

impl<A: DeviceDriver> Filesystem for FuseDriver<A> {
    fn init(&mut self, req: &Request<'_>, _config: &mut KernelConfig) -> std::result::Result<(), c_int> {
        self.uid = req.uid();
        self.gid = req.gid();
        info!(uid = self.uid, gid = self.gid, "file system ready");
        Ok(())
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let result = to_inode(parent).and_then(|parent| self.fs.lookup(parent, name.as_bytes()));
        match result {
            Ok(meta) => reply.entry(&TTL, &self.attr(&meta), 0),
            Err(err) => reply.error(fail("lookup", err)),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        match to_inode(ino).and_then(|ino| self.fs.metadata(ino)) {
            Ok(meta) => reply.attr(&TTL, &self.attr(&meta)),
            Err(err) => reply.error(fail("getattr", err)),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let result = to_inode(ino).and_then(|ino| {
            if let Some(mode) = mode {
                self.fs.set_mode(ino, mode)?;
            }
            if let Some(size) = size {
                self.fs.set_size(ino, size)?;
            }
            self.fs.metadata(ino)
        });
        match result {
            Ok(meta) => reply.attr(&TTL, &self.attr(&meta)),
            Err(err) => reply.error(fail("setattr", err)),
        }
    }

    fn readlink(&mut self, req: &Request<'_>, ino: u64, reply: ReplyData) {
        let privileged = req.uid() == 0;
        match to_inode(ino).and_then(|ino| self.fs.read_link(ino, privileged)) {
            Ok(target) => reply.data(&target),
            Err(err) => reply.error(fail("readlink", err)),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        match to_inode(parent).and_then(|parent| self.fs.unlink(parent, name.as_bytes())) {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(fail("unlink", err)),
        }
    }

    fn symlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, link: &std::path::Path, reply: ReplyEntry) {
        let result =
            to_inode(parent).and_then(|parent| self.fs.symlink(parent, name.as_bytes(), link.as_os_str().as_bytes()));
        match result {
            Ok(meta) => reply.entry(&TTL, &self.attr(&meta), 0),
            Err(err) => reply.error(fail("symlink", err)),
        }
    }

    fn link(&mut self, _req: &Request<'_>, ino: u64, newparent: u64, newname: &OsStr, reply: ReplyEntry) {
        let result = to_inode(ino)
            .and_then(|ino| Ok((ino, to_inode(newparent)?)))
            .and_then(|(ino, parent)| self.fs.link(ino, parent, newname.as_bytes()));
        match result {
            Ok(meta) => reply.entry(&TTL, &self.attr(&meta), 0),
            Err(err) => reply.error(fail("link", err)),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        match to_inode(ino).and_then(|ino| self.fs.metadata(ino)) {
            Ok(meta) if meta.kind == inode::FileType::Directory => reply.error(libc::EISDIR),
            Ok(_) => reply.opened(0, 0),
            Err(err) => reply.error(fail("open", err)),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        if offset < 0 {
            reply.error(libc::EINVAL);
            return;
        }
        match to_inode(ino).and_then(|ino| self.fs.read(ino, offset as u64, size as usize)) {
            Ok(data) => reply.data(&data),
            Err(err) => reply.error(fail("read", err)),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        if offset < 0 {
            reply.error(libc::EINVAL);
            return;
        }
        let append = flags & libc::O_APPEND != 0;
        match to_inode(ino).and_then(|ino| self.fs.write(ino, offset as u64, data, append)) {
            Ok(written) => reply.written(written as u32),
            Err(err) => reply.error(fail("write", err)),
        }
    }

    fn readdir(&mut self, _req: &Request<'_>, ino: u64, _fh: u64, offset: i64, mut reply: ReplyDirectory) {
        let cursor = offset.max(0) as u64;
        // only the root directory exists, so every parent is the root
        let items = match to_inode(ino).and_then(|ino| self.fs.read_dir(ino, ROOT_INODE, cursor)) {
            Ok(items) => items,
            Err(err) => {
                reply.error(fail("readdir", err));
                return;
            }
        };
        for item in items {
            let name = OsStr::from_bytes(&item.name);
            if reply.add(item.ino as u64, item.next as i64, to_file_type(item.kind), name) {
                break;
            }
        }
        reply.ok();
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let result = to_inode(parent).and_then(|parent| self.fs.create(parent, name.as_bytes(), mode & !umask));
        match result {
            Ok(meta) => reply.created(&TTL, &self.attr(&meta), 0, 0, 0),
            Err(err) => reply.error(fail("create", err)),
        }
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        match self.fs.stats() {
            Ok(stats) => reply.statfs(
                stats.blocks as u64,
                stats.free_blocks as u64,
                stats.free_blocks as u64,
                stats.inodes as u64,
                stats.free_inodes as u64,
                stats.block_size,
                stats.max_name_length,
                stats.block_size,
            ),
            Err(err) => reply.error(fail("statfs", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use fuser::FileType;

    use super::{to_file_attr, to_inode};
    use crate::ops::meta::Metadata;
    use crate::structure::inode;
    use crate::util::error::Error;

    #[test]
    fn attributes() {
        let meta = Metadata {
            ino: 7,
            kind: inode::FileType::Symlink,
            size: 11,
            blocks: 3,
            permissions: 0o777,
            nlink: 2,
        };
        let now = SystemTime::now();
        let attr = to_file_attr(&meta, 1000, 100, now);
        assert_eq!(attr.ino, 7);
        assert_eq!(attr.kind, FileType::Symlink);
        assert_eq!(attr.blocks, 6);
        assert_eq!(attr.blksize, 1024);
        assert_eq!(attr.nlink, 2);
        assert_eq!(attr.uid, 1000);
        assert_eq!(attr.mtime, now);
    }

    #[test]
    fn inode_numbers() {
        assert_eq!(to_inode(1).unwrap(), 1);
        assert!(matches!(to_inode(u64::MAX), Err(Error::InvalidInode(u64::MAX))));
    }
}
