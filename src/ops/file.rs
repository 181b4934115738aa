use tracing::debug;

use crate::consts::{InodePointer, BLOCK_SIZE};
use crate::driver::DeviceDriver;
use crate::structure::inode::{Chain, Inode, InodeBody};
use crate::structure::Volume;
use crate::util::error::{Error, Result};

/// A regular file: its chain plus the bits of the inode that travel with it.
pub struct File {
    pub id: InodePointer,
    pub nlink: u32,
    pub mode: u32,
    pub chain: Chain,
}

impl File {
    pub fn from_inode(inode: Inode) -> Result<File> {
        match inode.body {
            InodeBody::Regular { mode, chain } => Ok(File { id: inode.id, nlink: inode.nlink, mode, chain }),
            InodeBody::Directory { .. } => Err(Error::IsDirectory(inode.id)),
            InodeBody::Symlink { .. } => Err(Error::InvalidArgument("not a regular file")),
        }
    }

    pub fn to_inode(&self) -> Inode {
        Inode {
            id: self.id,
            nlink: self.nlink,
            body: InodeBody::Regular { mode: self.mode, chain: self.chain.clone() },
        }
    }

    pub fn size(&self) -> u64 {
        self.chain.size as u64
    }

    /// Copies up to `length` bytes at `offset` into `out`, stopping at the end
    /// of the file. Returns the number of bytes copied.
    pub fn read<A: DeviceDriver>(&self, volume: &Volume<A>, offset: u64, length: usize, out: &mut [u8]) -> Result<usize> {
        let length = length.min(self.size().saturating_sub(offset) as usize);
        if out.len() < length {
            return Err(Error::Fault { needed: length, available: out.len() });
        }

        let mut copied = 0;
        while copied < length {
            let position = offset as usize + copied;
            let in_block = position % BLOCK_SIZE;
            let run = (BLOCK_SIZE - in_block).min(length - copied);
            let data = volume.io.read_block(volume.block_at(&self.chain, position / BLOCK_SIZE)?)?;
            out[copied..copied + run].copy_from_slice(&data[in_block..in_block + run]);
            copied += run;
        }
        Ok(copied)
    }

    /// Writes `data` at `offset`, growing the file first when the write runs
    /// past its end. With `append` the offset is the current size.
    pub fn write<A: DeviceDriver>(&mut self, volume: &mut Volume<A>, offset: u64, data: &[u8], append: bool) -> Result<usize> {
        let offset = if append { self.size() } else { offset };
        let end = offset.checked_add(data.len() as u64).ok_or(Error::FileTooLarge)?;
        if end > self.size() {
            volume.resize(&mut self.chain, end)?;
        }

        let mut written = 0;
        while written < data.len() {
            let position = offset as usize + written;
            let in_block = position % BLOCK_SIZE;
            let run = (BLOCK_SIZE - in_block).min(data.len() - written);
            let block = volume.block_at(&self.chain, position / BLOCK_SIZE)?;
            if run == BLOCK_SIZE {
                volume.io.write_block(block, &data[written..written + run])?;
            } else {
                let mut buffer = volume.io.read_block(block)?;
                buffer[in_block..in_block + run].copy_from_slice(&data[written..written + run]);
                volume.io.write_block(block, &buffer)?;
            }
            written += run;
        }
        debug!(ino = self.id, offset, len = written, "wrote file");
        Ok(written)
    }

    pub fn resize<A: DeviceDriver>(&mut self, volume: &mut Volume<A>, size: u64) -> Result<()> {
        volume.resize(&mut self.chain, size)
    }
}

#[cfg(test)]
mod tests {
    use super::File;
    use crate::consts::BLOCK_SIZE;
    use crate::structure::inode::Inode;
    use crate::structure::scratch_volume;
    use crate::util::error::Error;

    fn new_file() -> File {
        File::from_inode(Inode::regular(2, 0o644)).unwrap()
    }

    #[test]
    fn write_then_read_across_blocks() {
        let mut volume = scratch_volume(64, 16);
        let mut file = new_file();
        let data: Vec<u8> = (0..3000u32).map(|i| (i % 251) as u8).collect();

        assert_eq!(file.write(&mut volume, 100, &data, false).unwrap(), 3000);
        assert_eq!(file.size(), 3100);

        let mut out = vec![0u8; 3100];
        assert_eq!(file.read(&volume, 0, 3100, &mut out).unwrap(), 3100);
        assert!(out[..100].iter().all(|&b| b == 0));
        assert_eq!(&out[100..], &data[..]);
    }

    #[test]
    fn read_clips_at_end_of_file() {
        let mut volume = scratch_volume(64, 16);
        let mut file = new_file();
        file.write(&mut volume, 0, b"hello world", false).unwrap();

        let mut out = vec![0xFFu8; 64];
        assert_eq!(file.read(&volume, 6, 64, &mut out).unwrap(), 5);
        assert_eq!(&out[..5], b"world");
        assert_eq!(out[5], 0xFF);
        assert_eq!(file.read(&volume, 11, 10, &mut out).unwrap(), 0);
        assert_eq!(file.read(&volume, 500, 10, &mut out).unwrap(), 0);
    }

    #[test]
    fn short_buffer_faults() {
        let mut volume = scratch_volume(64, 16);
        let mut file = new_file();
        file.write(&mut volume, 0, &[1u8; 100], false).unwrap();

        let mut out = [0u8; 10];
        assert!(matches!(
            file.read(&volume, 0, 100, &mut out),
            Err(Error::Fault { needed: 100, available: 10 })
        ));
    }

    #[test]
    fn append_ignores_offset() {
        let mut volume = scratch_volume(64, 16);
        let mut file = new_file();
        file.write(&mut volume, 0, b"abc", false).unwrap();
        file.write(&mut volume, 0, b"def", true).unwrap();

        let mut out = [0u8; 6];
        file.read(&volume, 0, 6, &mut out).unwrap();
        assert_eq!(&out, b"abcdef");

        // without append the same call overwrites
        file.write(&mut volume, 0, b"xy", false).unwrap();
        file.read(&volume, 0, 6, &mut out).unwrap();
        assert_eq!(&out, b"xycdef");
        assert_eq!(file.size(), 6);
    }

    #[test]
    fn failed_growth_leaves_file_untouched() {
        let mut volume = scratch_volume(64, 16);
        let mut file = new_file();
        file.write(&mut volume, 0, b"keep", false).unwrap();
        let chain = file.chain.clone();

        let huge = vec![7u8; 80 * BLOCK_SIZE];
        assert!(matches!(file.write(&mut volume, 0, &huge, false), Err(Error::NoSpace)));
        assert_eq!(file.chain, chain);
        assert_eq!(volume.free_blocks(), 59);
    }

    #[test]
    fn truncated_bytes_read_back_as_zeroes() {
        let mut volume = scratch_volume(64, 16);
        let mut file = new_file();
        file.write(&mut volume, 0, &[9u8; 2 * BLOCK_SIZE], false).unwrap();
        file.resize(&mut volume, 10).unwrap();
        file.resize(&mut volume, 2 * BLOCK_SIZE as u64).unwrap();

        let mut out = vec![0u8; 2 * BLOCK_SIZE];
        file.read(&volume, 0, out.len(), &mut out).unwrap();
        assert!(out[..10].iter().all(|&b| b == 9));
        assert!(out[10..].iter().all(|&b| b == 0));
    }

    #[test]
    fn write_past_truncated_end_fills_gap_with_zeroes() {
        let mut volume = scratch_volume(64, 16);
        let mut file = new_file();
        file.write(&mut volume, 0, &[0x41; 100], false).unwrap();
        file.resize(&mut volume, 10).unwrap();
        file.write(&mut volume, 50, b"Z", false).unwrap();
        assert_eq!(file.size(), 51);

        let mut out = vec![0u8; 51];
        file.read(&volume, 0, out.len(), &mut out).unwrap();
        assert!(out[..10].iter().all(|&b| b == 0x41));
        assert!(out[10..50].iter().all(|&b| b == 0));
        assert_eq!(out[50], b'Z');
    }

    #[test]
    fn directories_and_symlinks_are_rejected() {
        assert!(matches!(File::from_inode(Inode::directory(1, 0o755)), Err(Error::IsDirectory(1))));
        assert!(matches!(File::from_inode(Inode::symlink(3, b"/x")), Err(Error::InvalidArgument(_))));
    }
}
