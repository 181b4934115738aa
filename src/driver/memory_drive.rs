use std::io;

use crate::driver::{check_sector, DeviceDriver};

/// A drive backed by a byte vector.
pub struct MemoryDrive {
    data: Vec<u8>,
    sector_size: usize,
}

impl MemoryDrive {
    pub fn new(bytes: usize, sector_size: usize) -> MemoryDrive {
        MemoryDrive { data: vec![0; bytes - bytes % sector_size], sector_size }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl DeviceDriver for MemoryDrive {
    fn get_sector_count(&self) -> u64 {
        (self.data.len() / self.sector_size) as u64
    }

    fn get_sector_size(&self) -> usize {
        self.sector_size
    }

    fn read_sector(&self, index: u64) -> io::Result<Vec<u8>> {
        check_sector(self, index, None)?;
        let start = index as usize * self.sector_size;
        Ok(self.data[start..start + self.sector_size].to_vec())
    }

    fn write_sector(&mut self, index: u64, data: &[u8]) -> io::Result<()> {
        check_sector(self, index, Some(data.len()))?;
        let start = index as usize * self.sector_size;
        self.data[start..start + self.sector_size].copy_from_slice(data);
        Ok(())
    }
}

/// A memory drive that refuses writes to one block. Lets tests fail an
/// operation halfway through.
#[cfg(test)]
pub(crate) struct FaultyDrive {
    pub(crate) inner: MemoryDrive,
    pub(crate) broken_block: Option<u32>,
}

#[cfg(test)]
impl FaultyDrive {
    pub(crate) fn new(bytes: usize, sector_size: usize) -> FaultyDrive {
        FaultyDrive { inner: MemoryDrive::new(bytes, sector_size), broken_block: None }
    }
}

#[cfg(test)]
impl DeviceDriver for FaultyDrive {
    fn get_sector_count(&self) -> u64 {
        self.inner.get_sector_count()
    }

    fn get_sector_size(&self) -> usize {
        self.inner.get_sector_size()
    }

    fn read_sector(&self, index: u64) -> io::Result<Vec<u8>> {
        self.inner.read_sector(index)
    }

    fn write_sector(&mut self, index: u64, data: &[u8]) -> io::Result<()> {
        let per_block = (crate::consts::BLOCK_SIZE / self.inner.sector_size) as u64;
        if self.broken_block.is_some_and(|block| index / per_block == block as u64) {
            return Err(io::Error::new(io::ErrorKind::Other, format!("sector {} is broken", index)));
        }
        self.inner.write_sector(index, data)
    }
}
