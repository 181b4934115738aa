use crate::consts::{BlockPointer, BLOCK_SIZE};
use crate::driver::DeviceDriver;
use crate::util::error::Result;

pub(crate) fn raw_write_block<A: DeviceDriver>(drive: &mut A, data: &[u8], index: BlockPointer) -> Result<()> {
    let sector_size = drive.get_sector_size();
    if sector_size == BLOCK_SIZE {
        drive.write_sector(index as u64, data)?;
        return Ok(());
    }

    let ratio = (BLOCK_SIZE / sector_size) as u64;
    let start = index as u64 * ratio;
    for i in start..start + ratio {
        let offset = (i - start) as usize * sector_size;
        drive.write_sector(i, &data[offset..offset + sector_size])?;
    }
    Ok(())
}

pub(crate) fn raw_read_block<A: DeviceDriver>(drive: &A, index: BlockPointer) -> Result<Vec<u8>> {
    let sector_size = drive.get_sector_size();
    if sector_size == BLOCK_SIZE {
        return Ok(drive.read_sector(index as u64)?);
    }

    let ratio = (BLOCK_SIZE / sector_size) as u64;
    let start = index as u64 * ratio;
    let mut buffer = Vec::with_capacity(BLOCK_SIZE);
    for i in start..start + ratio {
        buffer.append(&mut drive.read_sector(i)?);
    }
    Ok(buffer)
}
