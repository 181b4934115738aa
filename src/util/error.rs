use std::os::raw::c_int;

use thiserror::Error;

use crate::consts::{InodePointer, MAX_NAME_LENGTH, MAX_SYMLINK_LENGTH};

pub type ErrorNum = c_int;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no free blocks left on the volume")]
    NoSpace,

    #[error("no free inodes left on the volume")]
    NoInodes,

    #[error("corrupt block chain: {0}")]
    Corrupt(String),

    #[error("device error: {0}")]
    Device(#[from] std::io::Error),

    #[error("name is longer than {MAX_NAME_LENGTH} bytes")]
    NameTooLong,

    #[error("symlink destination is longer than {MAX_SYMLINK_LENGTH} bytes")]
    TargetTooLong,

    #[error("entry already exists")]
    Exists,

    #[error("entry not found")]
    NotFound,

    #[error("output buffer too small: need {needed} bytes, got {available}")]
    Fault { needed: usize, available: usize },

    #[error("file would exceed the maximum file size")]
    FileTooLarge,

    #[error("inode {0} is not a directory")]
    NotDirectory(InodePointer),

    #[error("inode {0} is a directory")]
    IsDirectory(InodePointer),

    #[error("inode {0} is not a symlink")]
    NotSymlink(InodePointer),

    #[error("operation not permitted on inode {0}")]
    NotPermitted(InodePointer),

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("invalid inode number {0}")]
    InvalidInode(u64),

    #[error("bad superblock magic {0:#010x}")]
    BadMagic(u32),

    #[error("invalid volume geometry: {0}")]
    Geometry(String),
}

impl Error {
    pub fn errno(&self) -> ErrorNum {
        match self {
            Error::NoSpace | Error::NoInodes => libc::ENOSPC,
            Error::Corrupt(_) | Error::Device(_) => libc::EIO,
            Error::NameTooLong | Error::TargetTooLong => libc::ENAMETOOLONG,
            Error::Exists => libc::EEXIST,
            Error::NotFound | Error::InvalidInode(_) => libc::ENOENT,
            Error::Fault { .. } => libc::EFAULT,
            Error::FileTooLarge => libc::EFBIG,
            Error::NotDirectory(_) => libc::ENOTDIR,
            Error::IsDirectory(_) => libc::EISDIR,
            Error::NotPermitted(_) => libc::EPERM,
            Error::NotSymlink(_)
            | Error::InvalidArgument(_)
            | Error::BadMagic(_)
            | Error::Geometry(_) => libc::EINVAL,
        }
    }

    pub(crate) fn corrupt(message: impl Into<String>) -> Error {
        Error::Corrupt(message.into())
    }
}
