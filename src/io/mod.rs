use std::mem::size_of;

use raw::{raw_read_block, raw_write_block};

use crate::consts::{BlockPointer, BLOCK_SIZE, NINDIRECT};
use crate::driver::DeviceDriver;
use crate::util::error::{Error, Result};
use crate::util::serializable::{read_u32, write_u32};

mod raw;

/// Whole-block access on top of a sector device.
pub(crate) struct IO<A: DeviceDriver> {
    pub(crate) device: A,
    pub block_count: u64,
}

impl<A: DeviceDriver> IO<A> {
    pub fn new(device: A) -> Result<IO<A>> {
        let sector_size = device.get_sector_size();
        if sector_size == 0 || sector_size > BLOCK_SIZE || BLOCK_SIZE % sector_size != 0 {
            return Err(Error::Geometry(format!(
                "block size {} is not a multiple of sector size {}",
                BLOCK_SIZE, sector_size
            )));
        }
        let block_count = device.get_size() / BLOCK_SIZE as u64;
        Ok(IO { device, block_count })
    }

    pub(crate) fn write_block(&mut self, index: BlockPointer, block: &[u8]) -> Result<()> {
        if block.len() != BLOCK_SIZE {
            return Err(Error::Geometry(format!("block size mismatch: {} bytes", block.len())));
        }
        self.check_range(index)?;
        raw_write_block(&mut self.device, block, index)
    }

    pub(crate) fn read_block(&self, index: BlockPointer) -> Result<Vec<u8>> {
        self.check_range(index)?;
        raw_read_block(&self.device, index)
    }

    pub(crate) fn zero_block(&mut self, index: BlockPointer) -> Result<()> {
        self.write_block(index, &[0u8; BLOCK_SIZE])
    }

    /// Reads entry `slot` of an indirect or doubly-indirect block.
    pub(crate) fn read_pointer(&self, block: BlockPointer, slot: usize) -> Result<BlockPointer> {
        Self::check_slot(slot)?;
        let data = self.read_block(block)?;
        Ok(read_u32(&data, slot * size_of::<BlockPointer>()))
    }

    pub(crate) fn write_pointer(&mut self, block: BlockPointer, slot: usize, value: BlockPointer) -> Result<()> {
        Self::check_slot(slot)?;
        let mut data = self.read_block(block)?;
        write_u32(&mut data, slot * size_of::<BlockPointer>(), value);
        self.write_block(block, &data)
    }

    pub(crate) fn flush(&mut self) -> Result<()> {
        Ok(self.device.flush()?)
    }

    fn check_range(&self, index: BlockPointer) -> Result<()> {
        if index as u64 >= self.block_count {
            return Err(Error::corrupt(format!(
                "block {} out of range ({} blocks)",
                index, self.block_count
            )));
        }
        Ok(())
    }

    fn check_slot(slot: usize) -> Result<()> {
        if slot >= NINDIRECT {
            return Err(Error::corrupt(format!("pointer slot {} out of range", slot)));
        }
        Ok(())
    }
}
